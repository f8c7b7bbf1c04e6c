//! テスト共通フィクスチャ
//!
//! 統合テストで共通利用するレジストリ・ディスパッチャの組み立てヘルパー。
//! Rust の統合テスト規約に従い `tests/common/mod.rs` に配置。

// 各テストファイルが独立したクレートとしてコンパイルされるため、
// 使用しない関数に dead_code 警告が出る。モジュール全体で抑制する。
#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use mailroute_domain::{
    clock::FixedClock,
    transport::{TemplateName, TransportConfig},
};
use mailroute_infra::{TemplateRegistry, WorkerPool, WorkerPoolConfig, mock::RecordingClientFactory};
use mailroute_mail_service::usecase::{MailDispatcher, TemplateSelector};

pub const DEFAULT_FROM: &str = "noreply@default.example.com";
pub const OFFICE365: &str = "EmailOffice365";
pub const OFFICE365_FROM: &str = "office@example.com";
pub const QQ: &str = "EmailQQ";
pub const QQ_FROM: &str = "qq@example.com";

/// テスト用の組み立て済みコンポーネント
pub struct Harness {
    pub factory:    RecordingClientFactory,
    pub pool:       WorkerPool,
    pub dispatcher: MailDispatcher,
    pub selector:   TemplateSelector,
}

pub fn name(value: &str) -> TemplateName {
    TemplateName::new(value).unwrap()
}

pub fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn pool_config(core: usize, max: usize, capacity: usize) -> WorkerPoolConfig {
    WorkerPoolConfig {
        core_pool_size: core,
        maximum_pool_size: max,
        capacity,
        ..Default::default()
    }
}

/// 既定 + `EmailOffice365` + `EmailQQ` の 3 トランスポートで組み立てる
pub fn harness_with(factory: RecordingClientFactory, pool: WorkerPoolConfig) -> Harness {
    let registry = TemplateRegistry::builder(
        TransportConfig::new("smtp.default.example.com")
            .with_port(25)
            .with_from(DEFAULT_FROM),
    )
    .register(
        name(OFFICE365),
        TransportConfig::new("smtp.office365.com")
            .with_port(587)
            .with_credentials(OFFICE365_FROM, "office-secret"),
    )
    .register(
        name(QQ),
        TransportConfig::new("smtp.qq.com")
            .with_port(465)
            .with_credentials(QQ_FROM, "qq-secret"),
    )
    .build(&factory)
    .unwrap();
    let registry = Arc::new(registry);

    let pool = WorkerPool::new(&pool).unwrap();
    let dispatcher = MailDispatcher::new(
        Arc::clone(&registry),
        pool.clone(),
        Arc::new(FixedClock::new(fixed_now())),
    );

    Harness {
        factory,
        pool,
        dispatcher,
        selector: TemplateSelector::new(registry),
    }
}

pub fn harness() -> Harness {
    harness_with(RecordingClientFactory::new(), WorkerPoolConfig::default())
}

/// 条件が満たされるまで待つ（最大 5 秒）
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("条件が満たされないままタイムアウトしました");
}
