//! # テスト用モック送信クライアント
//!
//! ユースケーステストで使用するインメモリのトランスポートクライアントとファクトリ。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! mailroute-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use mailroute_domain::{
    outbound::OutboundEmail,
    transport::{TemplateName, TransportConfig, TransportError},
};
use tokio::sync::Semaphore;

use crate::{
    error::InfraError,
    transport::{TransportClient, TransportClientFactory},
};

// ===== RecordingTransportClient =====

/// 送信されたメールを記録するだけのクライアント
#[derive(Clone, Default)]
pub struct RecordingTransportClient {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl RecordingTransportClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_emails(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl TransportClient for RecordingTransportClient {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// ===== FailingTransportClient =====

/// 常に指定のエラーを返すクライアント
#[derive(Clone)]
pub struct FailingTransportClient {
    error:    TransportError,
    attempts: Arc<AtomicUsize>,
}

impl FailingTransportClient {
    pub fn new(error: TransportError) -> Self {
        Self {
            error,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportClient for FailingTransportClient {
    async fn send(&self, _email: &OutboundEmail) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

// ===== GatedTransportClient =====

/// `release` されるまで送信を完了しないクライアント
///
/// ワーカープールの飽和やキャンセルのテストで、送信中の状態を作るために使う。
#[derive(Clone)]
pub struct GatedTransportClient {
    gate:    Arc<Semaphore>,
    started: Arc<AtomicUsize>,
    inner:   RecordingTransportClient,
}

impl GatedTransportClient {
    pub fn new() -> Self {
        Self {
            gate:    Arc::new(Semaphore::new(0)),
            started: Arc::new(AtomicUsize::new(0)),
            inner:   RecordingTransportClient::new(),
        }
    }

    /// 送信を `n` 件完了させる
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// 送信を開始した件数
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn sent_emails(&self) -> Vec<OutboundEmail> {
        self.inner.sent_emails()
    }
}

impl Default for GatedTransportClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportClient for GatedTransportClient {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        permit.forget();
        self.inner.send(email).await
    }
}

// ===== RecordingClientFactory =====

/// テンプレートごとに [`RecordingTransportClient`] を構築するファクトリ
///
/// `with_client` で特定テンプレートのクライアントを差し替えられる。
#[derive(Clone, Default)]
pub struct RecordingClientFactory {
    clients:   Arc<Mutex<HashMap<String, RecordingTransportClient>>>,
    overrides: HashMap<String, Arc<dyn TransportClient>>,
    created:   Arc<Mutex<Vec<TemplateName>>>,
    failing:   Option<String>,
}

impl RecordingClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定テンプレートのクライアントを差し替える
    pub fn with_client(mut self, template: &str, client: Arc<dyn TransportClient>) -> Self {
        self.overrides.insert(template.to_string(), client);
        self
    }

    /// 指定テンプレートのクライアント構築を失敗させる
    pub fn failing_for(mut self, template: &str) -> Self {
        self.failing = Some(template.to_string());
        self
    }

    /// 構築したテンプレート名（構築順）
    pub fn created_templates(&self) -> Vec<TemplateName> {
        self.created.lock().unwrap().clone()
    }

    /// 指定テンプレート用に構築した記録クライアント
    pub fn client_for(&self, template: &str) -> Option<RecordingTransportClient> {
        self.clients.lock().unwrap().get(template).cloned()
    }
}

impl TransportClientFactory for RecordingClientFactory {
    fn create(
        &self,
        template: &TemplateName,
        config: &TransportConfig,
    ) -> Result<Arc<dyn TransportClient>, InfraError> {
        if self.failing.as_deref() == Some(template.as_str()) {
            return Err(InfraError::client_build(
                template.as_str(),
                format!("接続できません: {}", config.host),
            ));
        }

        self.created.lock().unwrap().push(template.clone());

        if let Some(client) = self.overrides.get(template.as_str()) {
            return Ok(Arc::clone(client));
        }

        let client = RecordingTransportClient::new();
        self.clients
            .lock()
            .unwrap()
            .insert(template.as_str().to_string(), client.clone());
        Ok(Arc::new(client))
    }
}
