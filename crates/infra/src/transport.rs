//! # トランスポートクライアント
//!
//! 送信用メッセージを外部 SMTP サーバーへ届けるインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `TransportClient` trait でメール送信を抽象化
//! - **2 つの実装**: SMTP（lettre）、Noop（ログ出力のみ）
//! - **設定で切替**: `TransportConfig::protocol` で `DefaultClientFactory` が実装を選ぶ
//! - **共有前提**: クライアントは複数のワーカーから同時に `send` される

mod noop;
mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use mailroute_domain::{
    outbound::OutboundEmail,
    transport::{Protocol, TemplateName, TransportConfig, TransportError},
};
pub use noop::NoopTransportClient;
pub use smtp::SmtpTransportClient;

use crate::error::InfraError;

/// メール送信トレイト
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// メールを送信する
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError>;
}

/// トランスポートクライアントのファクトリ
///
/// レジストリ構築時にテンプレートごとに 1 回だけ呼ばれる。
pub trait TransportClientFactory: Send + Sync {
    /// 設定からクライアントを構築する
    fn create(
        &self,
        template: &TemplateName,
        config: &TransportConfig,
    ) -> Result<Arc<dyn TransportClient>, InfraError>;
}

/// 送信元・宛先・CC をメールボックスとして解釈できるか確認する
///
/// ワーカープールへ投入する前に呼ぶ。解釈できないアドレスがあれば
/// `TransportError::InvalidAddress` を返す。
pub fn check_addresses(email: &OutboundEmail) -> Result<(), TransportError> {
    smtp::parse_mailbox(&email.from)?;
    for address in email.to.iter().chain(&email.cc) {
        smtp::parse_mailbox(address)?;
    }
    Ok(())
}

/// プロトコル設定に応じて SMTP / Noop を選ぶファクトリ
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClientFactory;

impl TransportClientFactory for DefaultClientFactory {
    fn create(
        &self,
        template: &TemplateName,
        config: &TransportConfig,
    ) -> Result<Arc<dyn TransportClient>, InfraError> {
        match config.protocol {
            Protocol::Noop => Ok(Arc::new(NoopTransportClient::new(template.clone()))),
            Protocol::Smtp | Protocol::Smtps => {
                let client = SmtpTransportClient::from_config(config)
                    .map_err(|reason| InfraError::client_build(template.as_str(), reason))?;
                Ok(Arc::new(client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use rstest::rstest;

    use super::*;

    fn email(from: &str, to: &str, cc: &[&str]) -> OutboundEmail {
        OutboundEmail::builder()
            .from(from)
            .to(to)
            .cc_many(cc.iter().copied())
            .date(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
            .subject("件名")
            .text("本文")
            .build()
            .unwrap()
    }

    #[test]
    fn test_正しいアドレスは確認を通る() {
        let email = email(
            "noreply@example.com",
            "user@example.com",
            &["cc@example.com", "Team <team@example.com>"],
        );
        assert!(check_addresses(&email).is_ok());
    }

    #[rstest]
    #[case::from("not an address", "user@example.com", &[])]
    #[case::to("noreply@example.com", "user@", &[])]
    #[case::cc("noreply@example.com", "user@example.com", &["cc@example.com", "not an address"])]
    fn test_解釈できないアドレスはinvalid_addressになる(
        #[case] from: &str,
        #[case] to: &str,
        #[case] cc: &[&str],
    ) {
        let email = email(from, to, cc);
        assert!(matches!(
            check_addresses(&email),
            Err(TransportError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_トレイトオブジェクトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn TransportClient>();
        assert_send_sync::<DefaultClientFactory>();
    }

    #[tokio::test]
    async fn test_noopプロトコルはnoopクライアントを構築する() {
        let config = TransportConfig::new("localhost").with_protocol(Protocol::Noop);
        let template = TemplateName::default_template();

        let client = DefaultClientFactory.create(&template, &config).unwrap();
        let email = OutboundEmail::builder()
            .from("noreply@example.com")
            .to("user@example.com")
            .date(chrono::Utc::now())
            .subject("件名")
            .text("本文")
            .build()
            .unwrap();

        assert!(client.send(&email).await.is_ok());
    }

    #[tokio::test]
    async fn test_smtpプロトコルでクライアントを構築できる() {
        let config = TransportConfig::new("localhost").with_port(1025);
        let template = TemplateName::default_template();

        assert!(DefaultClientFactory.create(&template, &config).is_ok());
    }
}
