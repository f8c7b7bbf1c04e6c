//! # トランスポート
//!
//! 送信先 SMTP サーバーごとの設定と、それを識別するテンプレート名を定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`TemplateName`] | メールテンプレート名 | トランスポート設定を選択するための識別子 |
//! | [`TransportConfig`] | トランスポート設定 | ホスト・認証情報・プロトコル・追加プロパティ |
//! | [`TransportError`] | 送信エラー | メッセージ構築またはトランスポート送信の失敗 |
//!
//! テンプレート名 `"default"` は予約済みで、常にプロセス全体の既定トランスポートを指す。

use std::{collections::BTreeMap, fmt};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::DomainError;

/// メールテンプレート名（値オブジェクト）
///
/// レジストリのキー。空白のみの名前は作成できない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(try_from = "String", into = "String")]
#[display("{_0}")]
pub struct TemplateName(String);

impl TemplateName {
    /// 既定テンプレートの予約名
    pub const DEFAULT: &'static str = "default";

    /// テンプレート名を作成する
    ///
    /// # エラー
    ///
    /// 空文字列・空白のみの場合は `DomainError::Validation` を返す。
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::Validation(
                "テンプレート名は必須です".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// 既定テンプレート名を返す
    pub fn default_template() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// 既定テンプレートかどうか
    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TemplateName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TemplateName> for String {
    fn from(value: TemplateName) -> Self {
        value.0
    }
}

/// 送信プロトコル
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    /// SMTP（平文、または `mail.smtp.starttls.enable` で STARTTLS）
    #[default]
    Smtp,
    /// SMTPS（接続時点から TLS）
    Smtps,
    /// 送信しない（ログ出力のみ）
    Noop,
}

/// STARTTLS を有効にするプロパティキー
pub const PROPERTY_STARTTLS_ENABLE: &str = "mail.smtp.starttls.enable";
/// STARTTLS を必須にするプロパティキー
pub const PROPERTY_STARTTLS_REQUIRED: &str = "mail.smtp.starttls.required";
/// 送受信タイムアウト（ミリ秒）のプロパティキー
pub const PROPERTY_TIMEOUT: &str = "mail.smtp.timeout";
/// 接続タイムアウト（ミリ秒）のプロパティキー
pub const PROPERTY_CONNECTION_TIMEOUT: &str = "mail.smtp.connectiontimeout";

fn default_encoding() -> String {
    "UTF-8".to_string()
}

/// トランスポート設定
///
/// 1 つの送信先 SMTP サーバーを表す。起動時に読み込まれ、以後変更されない。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// SMTP サーバーのホスト名
    pub host:             String,
    /// ポート番号（未設定の場合はプロトコルの既定ポート）
    #[serde(default)]
    pub port:             Option<u16>,
    /// 認証ユーザー名（送信元アドレスの既定値も兼ねる）
    #[serde(default)]
    pub username:         Option<String>,
    /// 認証パスワード
    #[serde(default)]
    pub password:         Option<String>,
    /// 送信プロトコル
    #[serde(default)]
    pub protocol:         Protocol,
    /// 既定の文字エンコーディング
    #[serde(default = "default_encoding")]
    pub default_encoding: String,
    /// 送信元アドレス（未設定の場合は `username` を使用）
    #[serde(default)]
    pub from:             Option<String>,
    /// 追加プロパティ（`mail.smtp.*` 形式）
    #[serde(default)]
    pub properties:       BTreeMap<String, String>,
}

impl TransportConfig {
    /// ホスト名のみを指定した設定を作成する
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host:             host.into(),
            port:             None,
            username:         None,
            password:         None,
            protocol:         Protocol::default(),
            default_encoding: default_encoding(),
            from:             None,
            properties:       BTreeMap::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// 送信元アドレスを返す
    ///
    /// `from` が設定されていればそれを、なければ `username` を返す。
    pub fn sender_address(&self) -> Option<&str> {
        self.from
            .as_deref()
            .or(self.username.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// 追加プロパティを取得する
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// 真偽値プロパティを取得する（`"true"` のみ真、大文字小文字は区別しない）
    pub fn flag(&self, key: &str) -> bool {
        self.property(key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// ミリ秒指定のプロパティを取得する（数値でない値は無視する）
    pub fn millis(&self, key: &str) -> Option<u64> {
        self.property(key).and_then(|v| v.trim().parse().ok())
    }
}

// パスワードをログに出さない
impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("protocol", &self.protocol)
            .field("default_encoding", &self.default_encoding)
            .field("from", &self.from)
            .field("properties", &self.properties)
            .finish()
    }
}

/// 送信エラー
///
/// トランスポート向けメッセージの構築、またはトランスポートでの送信に失敗した場合に使用する。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// 送信元アドレスが決定できない
    #[error("送信元アドレスが設定されていません: テンプレート {template}")]
    MissingSender { template: String },

    /// メールアドレスとして解釈できない
    #[error("メールアドレスが不正です: {0}")]
    InvalidAddress(String),

    /// 添付ファイルを読み込めない
    #[error("添付ファイルの読み込みに失敗: {path}: {reason}")]
    Attachment { path: String, reason: String },

    /// メッセージの構築に失敗
    #[error("メッセージ構築失敗: {0}")]
    Build(String),

    /// トランスポートでの送信に失敗（接続・認証・プロトコルエラー）
    #[error("メール送信失敗: {0}")]
    Send(String),
}
