//! SMTP 送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用してメールを送信する。
//! 接続方式はトランスポート設定のプロトコルとプロパティで決まる:
//!
//! | 設定 | 接続方式 |
//! |------|---------|
//! | `protocol = "smtps"` | 接続時点から TLS（既定ポート 465） |
//! | `mail.smtp.starttls.required = true` | STARTTLS 必須（既定ポート 587） |
//! | `mail.smtp.starttls.enable = true` | STARTTLS（サーバーが対応していれば） |
//! | 上記以外 | 平文（既定ポート 25） |

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{
        Attachment as LettreAttachment,
        Mailbox,
        Message,
        MultiPart,
        SinglePart,
        header::ContentType,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use mailroute_domain::{
    outbound::{EmailBody, OutboundEmail},
    transport::{
        PROPERTY_CONNECTION_TIMEOUT,
        PROPERTY_STARTTLS_ENABLE,
        PROPERTY_STARTTLS_REQUIRED,
        PROPERTY_TIMEOUT,
        Protocol,
        TransportConfig,
        TransportError,
    },
};

use super::TransportClient;

/// SMTP 送信クライアント
///
/// `lettre::AsyncSmtpTransport<Tokio1Executor>` をラップする。
/// 1 つのトランスポート設定につき 1 インスタンスを構築し、全ワーカーで共有する。
pub struct SmtpTransportClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransportClient {
    /// トランスポート設定からクライアントを構築する
    ///
    /// # エラー
    ///
    /// TLS パラメータの構築に失敗した場合は失敗理由を返す。
    pub fn from_config(config: &TransportConfig) -> Result<Self, String> {
        let host = config.host.as_str();

        let mut builder = if config.protocol == Protocol::Smtps {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| format!("TLS 接続設定に失敗: {e}"))?
        } else if config.flag(PROPERTY_STARTTLS_REQUIRED) {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| format!("STARTTLS 接続設定に失敗: {e}"))?
        } else if config.flag(PROPERTY_STARTTLS_ENABLE) {
            let parameters = TlsParameters::new(host.to_string())
                .map_err(|e| format!("STARTTLS 接続設定に失敗: {e}"))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                .tls(Tls::Opportunistic(parameters))
        } else {
            // 平文接続（Mailpit 等のローカル SMTP 向け）
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        if let Some(port) = config.port {
            builder = builder.port(port);
        }

        let timeout_ms = config
            .millis(PROPERTY_TIMEOUT)
            .or_else(|| config.millis(PROPERTY_CONNECTION_TIMEOUT));
        if let Some(ms) = timeout_ms {
            builder = builder.timeout(Some(Duration::from_millis(ms)));
        }

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        if !config.default_encoding.eq_ignore_ascii_case("UTF-8") {
            tracing::warn!(
                host,
                encoding = %config.default_encoding,
                "UTF-8 以外のエンコーディングは未対応のため UTF-8 で送信します"
            );
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

pub(super) fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse()
        .map_err(|e| TransportError::InvalidAddress(format!("{address}: {e}")))
}

/// 送信用メッセージを lettre の `Message` に変換する
///
/// 添付ファイルがない場合は単一パート、ある場合は `multipart/mixed` で本文と添付を並べる。
pub(crate) fn build_message(email: &OutboundEmail) -> Result<Message, TransportError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&email.from)?)
        .subject(email.subject.as_str())
        .date(SystemTime::from(email.date));

    for to in &email.to {
        builder = builder.to(parse_mailbox(to)?);
    }
    for cc in &email.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }

    let body = match &email.body {
        EmailBody::Text(text) => SinglePart::plain(text.clone()),
        EmailBody::Html(html) => SinglePart::html(html.clone()),
    };

    let message = if email.attachments.is_empty() {
        builder.singlepart(body)
    } else {
        let mut multipart = MultiPart::mixed().singlepart(body);
        for attachment in &email.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                TransportError::Build(format!(
                    "Content-Type が不正です: {}: {e}",
                    attachment.content_type
                ))
            })?;
            multipart = multipart.singlepart(
                LettreAttachment::new(attachment.filename.clone())
                    .body(attachment.content.to_vec(), content_type),
            );
        }
        builder.multipart(multipart)
    };

    message.map_err(|e| TransportError::Build(e.to_string()))
}

#[async_trait]
impl TransportClient for SmtpTransportClient {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        let message = build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| TransportError::Send(format!("SMTP 送信失敗: {e}")))?;

        Ok(())
    }
}
