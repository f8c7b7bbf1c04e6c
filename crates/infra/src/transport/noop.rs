//! Noop 送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。
//! `protocol = "noop"` のテンプレートや、送信を無効化した環境で使用する。

use async_trait::async_trait;
use mailroute_domain::{
    outbound::OutboundEmail,
    transport::{TemplateName, TransportError},
};

use super::TransportClient;

/// Noop 送信（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct NoopTransportClient {
    template: TemplateName,
}

impl NoopTransportClient {
    pub fn new(template: TemplateName) -> Self {
        Self { template }
    }
}

#[async_trait]
impl TransportClient for NoopTransportClient {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        tracing::info!(
            template = %self.template,
            to = ?email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "Noop: メール送信をスキップ"
        );
        Ok(())
    }
}
