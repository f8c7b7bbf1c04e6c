//! # Clock（時刻プロバイダ）
//!
//! 送信日時が未指定のメッセージに現在時刻を補うための抽象化。
//! テストでは [`FixedClock`] を注入して送信日時を固定する。

use chrono::{DateTime, Utc};

/// 現在時刻を提供するトレイト
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// システム時刻を返す実装
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 常に同じ時刻を返すテスト用実装
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
