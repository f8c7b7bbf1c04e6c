//! # ワーカープール
//!
//! 遅い送信 I/O を呼び出し元のタスクから切り離す、有界の実行基盤。
//!
//! ## 設計方針
//!
//! - **コア数と最大数**: コアワーカーは常駐し、コアを超えたワーカーはアイドルが
//!   `keep_alive` を超えると退役する
//! - **有界キュー**: キュー容量を超えて溜め込まない
//! - **明示的な拒否**: ワーカー数が最大かつキューが満杯なら即座に `PoolSaturated` を返す
//!
//! ## 投入の優先順位
//!
//! 1. ワーカー数がコア数未満ならワーカーを起動し、ジョブを直接渡す
//! 2. キューに空きがあれば積む
//! 3. ワーカー数が最大数未満なら追加ワーカーを起動し、ジョブを直接渡す
//! 4. いずれも不可なら拒否する
//!
//! ワーカーは tokio タスクとして起動するため、[`WorkerPool::submit`] は
//! tokio ランタイム上で呼び出す必要がある。

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::{
    Mutex,
    mpsc::{self, error::TrySendError},
};
use tracing::Instrument as _;

use crate::error::InfraError;

/// ワーカーが実行するジョブ
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// keep-alive の時間単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    /// 指定量の `Duration` に変換する
    pub fn duration(self, amount: u64) -> Duration {
        match self {
            Self::Milliseconds => Duration::from_millis(amount),
            Self::Seconds => Duration::from_secs(amount),
            Self::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            Self::Hours => Duration::from_secs(amount.saturating_mul(3600)),
        }
    }
}

/// ワーカープールの設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// 常駐ワーカー数
    pub core_pool_size:    usize,
    /// 最大ワーカー数
    pub maximum_pool_size: usize,
    /// コアを超えたワーカーのアイドル許容時間
    pub keep_alive_time:   u64,
    /// `keep_alive_time` の単位
    pub time_unit:         TimeUnit,
    /// キュー容量
    pub capacity:          usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core_pool_size:    5,
            maximum_pool_size: 50,
            keep_alive_time:   10,
            time_unit:         TimeUnit::Seconds,
            capacity:          200,
        }
    }
}

impl WorkerPoolConfig {
    pub fn keep_alive(&self) -> Duration {
        self.time_unit.duration(self.keep_alive_time)
    }

    /// 設定値を検証する
    ///
    /// # エラー
    ///
    /// 最大ワーカー数が 0、コア数が最大数を超える、キュー容量が 0 の場合は
    /// `InvalidPoolConfig` を返す。
    pub fn validate(&self) -> Result<(), InfraError> {
        if self.maximum_pool_size == 0 {
            return Err(InfraError::invalid_pool_config(
                "最大ワーカー数は 1 以上である必要があります",
            ));
        }
        if self.core_pool_size > self.maximum_pool_size {
            return Err(InfraError::invalid_pool_config(format!(
                "コアワーカー数 {} が最大ワーカー数 {} を超えています",
                self.core_pool_size, self.maximum_pool_size
            )));
        }
        if self.capacity == 0 {
            return Err(InfraError::invalid_pool_config(
                "キュー容量は 1 以上である必要があります",
            ));
        }
        Ok(())
    }
}

struct Shared {
    receiver:   Mutex<mpsc::Receiver<Job>>,
    workers:    AtomicUsize,
    next_id:    AtomicUsize,
    core:       usize,
    max:        usize,
    capacity:   usize,
    keep_alive: Duration,
}

enum NextJob {
    Job(Job),
    Idle,
    Closed,
}

/// 有界ワーカープール
///
/// clone したハンドルは同じプールを指す。全ハンドルを drop するとキューが閉じ、
/// ワーカーは残りのジョブを処理してから終了する。
#[derive(Clone)]
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// 設定からプールを作成する
    ///
    /// ワーカーは最初の投入時に起動する。
    pub fn new(config: &WorkerPoolConfig) -> Result<Self, InfraError> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.capacity);
        let shared = Arc::new(Shared {
            receiver:   Mutex::new(receiver),
            workers:    AtomicUsize::new(0),
            next_id:    AtomicUsize::new(1),
            core:       config.core_pool_size,
            max:        config.maximum_pool_size,
            capacity:   config.capacity,
            keep_alive: config.keep_alive(),
        });

        Ok(Self { sender, shared })
    }

    /// ジョブを投入する
    ///
    /// 実行完了は待たない。結果が必要な場合はジョブ側でチャネル等を使って返す。
    ///
    /// # エラー
    ///
    /// - ワーカー数が最大かつキューが満杯の場合は `PoolSaturated`
    /// - キューが閉じている場合は `PoolClosed`
    pub fn submit<F>(&self, job: F) -> Result<(), InfraError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let job: Job = Box::pin(job);

        if self.reserve_worker(self.shared.core) {
            self.spawn_worker(Some(job));
            return Ok(());
        }

        match self.sender.try_send(job) {
            Ok(()) => {
                // コア数 0 の場合、キューを処理するワーカーが 1 つもいない可能性がある
                if self.reserve_worker(1) {
                    self.spawn_worker(None);
                }
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                if self.reserve_worker(self.shared.max) {
                    self.spawn_worker(Some(job));
                    return Ok(());
                }
                tracing::warn!(
                    max_workers = self.shared.max,
                    queue_capacity = self.shared.capacity,
                    "ワーカープールが飽和したためジョブを拒否しました"
                );
                Err(InfraError::pool_saturated(
                    self.shared.max,
                    self.shared.capacity,
                ))
            }
            Err(TrySendError::Closed(_)) => Err(InfraError::pool_closed()),
        }
    }

    /// 現在のワーカー数
    pub fn worker_count(&self) -> usize {
        self.shared.workers.load(Ordering::SeqCst)
    }

    /// キューで待機中のジョブ数
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    fn reserve_worker(&self, limit: usize) -> bool {
        self.shared.reserve(limit)
    }

    fn spawn_worker(&self, first: Option<Job>) {
        let shared = Arc::clone(&self.shared);
        let worker_id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        let span = tracing::debug_span!("mail_worker", worker_id);
        tokio::spawn(shared.run(worker_id, first).instrument(span));
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("core", &self.shared.core)
            .field("max", &self.shared.max)
            .field("capacity", &self.shared.capacity)
            .field("workers", &self.worker_count())
            .field("queued", &self.queued())
            .finish()
    }
}

impl Shared {
    async fn run(self: Arc<Self>, worker_id: usize, mut next: Option<Job>) {
        tracing::debug!(worker_id, "ワーカーを起動しました");

        loop {
            if let Some(job) = next.take() {
                Self::execute(worker_id, job).await;
            }

            match self.next_job().await {
                NextJob::Job(job) => next = Some(job),
                NextJob::Idle => {
                    if self.retire_idle().await {
                        tracing::debug!(worker_id, "アイドル時間を超えたためワーカーを停止しました");
                        return;
                    }
                }
                NextJob::Closed => {
                    self.workers.fetch_sub(1, Ordering::SeqCst);
                    tracing::debug!(worker_id, "キューが閉じたためワーカーを停止しました");
                    return;
                }
            }
        }
    }

    async fn next_job(&self) -> NextJob {
        let receive = async {
            let mut receiver = self.receiver.lock().await;
            receiver.recv().await
        };

        if self.workers.load(Ordering::SeqCst) > self.core {
            match tokio::time::timeout(self.keep_alive, receive).await {
                Ok(Some(job)) => NextJob::Job(job),
                Ok(None) => NextJob::Closed,
                Err(_) => NextJob::Idle,
            }
        } else {
            match receive.await {
                Some(job) => NextJob::Job(job),
                None => NextJob::Closed,
            }
        }
    }

    /// ワーカー数が `limit` 未満なら 1 つ予約する
    fn reserve(&self, limit: usize) -> bool {
        self.workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok()
    }

    /// コア数を超えている場合のみワーカー数を 1 減らし、残りのワーカー数を返す
    fn retire(&self) -> Option<usize> {
        self.workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > self.core).then(|| n - 1)
            })
            .ok()
            .map(|previous| previous - 1)
    }

    /// アイドルになったワーカーを退役させる。退役した場合は `true`
    ///
    /// 投入側は「キューに積む → ワーカー数を確認する」の順で動くため、
    /// 最後のワーカーが退役する直前にワーカー数を見た投入はワーカーを起動しない。
    /// ワーカー数が 0 になった場合はキューを確認し、ジョブが残っていれば復帰する。
    async fn retire_idle(&self) -> bool {
        let Some(remaining) = self.retire() else {
            return false;
        };
        if remaining > 0 {
            return true;
        }

        let pending = !self.receiver.lock().await.is_empty();
        if pending && self.reserve(self.max) {
            tracing::debug!("キューにジョブが残っているためワーカーを継続します");
            return false;
        }
        true
    }

    /// ジョブを実行する
    ///
    /// ジョブのパニックでワーカーが停止しないよう、別タスクとして実行して完了を待つ。
    async fn execute(worker_id: usize, job: Job) {
        tracing::debug!(worker_id, "ジョブを実行します");
        if let Err(e) = tokio::spawn(job).await {
            tracing::error!(worker_id, error = %e, "ジョブが異常終了しました");
        }
    }
}
