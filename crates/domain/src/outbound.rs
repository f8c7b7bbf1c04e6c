//! # 送信用メッセージ
//!
//! トランスポートクライアントに渡す、宛先・送信元・添付が確定したメッセージ。
//! [`OutboundEmail::builder`] がトランスポート向けメッセージのファクトリになる。
//!
//! 入力メッセージ（[`crate::message`]）との違いは、送信元アドレスと送信日時が
//! 解決済みであること、添付ファイルの内容が読み込み済みであること。

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::transport::TransportError;

/// 本文
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailBody {
    /// プレーンテキスト
    Text(String),
    /// HTML
    Html(String),
}

impl EmailBody {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(body) | Self::Html(body) => body,
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self, Self::Html(_))
    }
}

/// 添付ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// メール上のファイル名
    pub filename:     String,
    /// Content-Type
    pub content_type: String,
    /// ファイル内容
    pub content:      Bytes,
}

impl Attachment {
    /// Content-Type 未指定時の既定値
    pub const DEFAULT_CONTENT_TYPE: &'static str = "application/octet-stream";

    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename:     filename.into(),
            content_type: Self::DEFAULT_CONTENT_TYPE.to_string(),
            content:      content.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// 送信用メッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    /// 送信元アドレス
    pub from:        String,
    /// 宛先
    pub to:          Vec<String>,
    /// CC
    pub cc:          Vec<String>,
    /// 送信日時
    pub date:        DateTime<Utc>,
    /// 件名
    pub subject:     String,
    /// 本文
    pub body:        EmailBody,
    /// 添付ファイル
    pub attachments: Vec<Attachment>,
}

impl OutboundEmail {
    /// ビルダーを作成する
    pub fn builder() -> OutboundEmailBuilder {
        OutboundEmailBuilder::default()
    }

    /// 添付ファイル名の一覧を返す
    pub fn attachment_names(&self) -> Vec<&str> {
        self.attachments.iter().map(|a| a.filename.as_str()).collect()
    }
}

/// [`OutboundEmail`] のビルダー
#[derive(Debug, Default)]
pub struct OutboundEmailBuilder {
    from:        Option<String>,
    to:          Vec<String>,
    cc:          Vec<String>,
    date:        Option<DateTime<Utc>>,
    subject:     Option<String>,
    body:        Option<EmailBody>,
    attachments: Vec<Attachment>,
}

impl OutboundEmailBuilder {
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    pub fn cc_many(mut self, addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cc.extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// プレーンテキスト本文を設定する
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(EmailBody::Text(text.into()));
        self
    }

    /// HTML 本文を設定する
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.body = Some(EmailBody::Html(html.into()));
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// メッセージを構築する
    ///
    /// # エラー
    ///
    /// 送信元・宛先・送信日時・件名・本文のいずれかが欠けている場合は
    /// `TransportError::Build` を返す。
    pub fn build(self) -> Result<OutboundEmail, TransportError> {
        let from = self
            .from
            .ok_or_else(|| TransportError::Build("送信元アドレスは必須です".to_string()))?;
        if self.to.is_empty() {
            return Err(TransportError::Build("宛先は 1 件以上必要です".to_string()));
        }
        let date = self
            .date
            .ok_or_else(|| TransportError::Build("送信日時は必須です".to_string()))?;
        let subject = self
            .subject
            .ok_or_else(|| TransportError::Build("件名は必須です".to_string()))?;
        let body = self
            .body
            .ok_or_else(|| TransportError::Build("本文は必須です".to_string()))?;

        Ok(OutboundEmail {
            from,
            to: self.to,
            cc: self.cc,
            date,
            subject,
            body,
            attachments: self.attachments,
        })
    }
}
