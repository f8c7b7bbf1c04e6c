//! # Mailroute インフラ層
//!
//! 外部 SMTP サーバーとの通信と、送信処理を支える実行基盤を担当する。
//!
//! ## 責務
//!
//! - **トランスポートクライアント**: lettre を使った SMTP 送信（[`transport`]）
//! - **テンプレートレジストリ**: テンプレート名 → (設定, クライアント) の対応表（[`registry`]）
//! - **ワーカープール**: 送信 I/O を呼び出し元から切り離す有界の実行基盤（[`worker_pool`]）
//!
//! ## 依存関係
//!
//! ```text
//! mail-service → infra → domain
//!      ↘                   ↑
//!        ──────────────────
//! ```
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use mailroute_domain::transport::{TemplateName, TransportConfig};
//! use mailroute_infra::{registry::TemplateRegistry, transport::DefaultClientFactory};
//!
//! let registry = TemplateRegistry::builder(TransportConfig::new("smtp.example.com"))
//!     .register(TemplateName::new("EmailOffice365")?, office365_config)
//!     .build(&DefaultClientFactory)?;
//! ```

pub mod error;
pub mod registry;
pub mod transport;
pub mod worker_pool;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use error::{InfraError, InfraErrorKind};
pub use registry::{TemplateRegistry, TransportBinding};
pub use transport::{TransportClient, TransportClientFactory};
pub use worker_pool::{WorkerPool, WorkerPoolConfig};
