//! ワーカープール飽和の統合テスト
//!
//! 送信中のジョブでワーカーとキューを埋め、超過分の送信が待たされずに
//! `PoolSaturated` で失敗することを確認する。
//!
//! 実行方法:
//! ```bash
//! cargo test -p mailroute-mail-service --test saturation_test
//! ```

mod common;

use std::sync::Arc;

use common::{harness_with, pool_config, wait_until};
use mailroute_domain::message::SimpleMessage;
use mailroute_infra::mock::{GatedTransportClient, RecordingClientFactory};
use mailroute_mail_service::{DispatchError, MailContext, usecase::MailDispatcher};
use pretty_assertions::assert_eq;
use tokio::task::JoinHandle;

fn spawn_send(dispatcher: &Arc<MailDispatcher>, n: usize) -> JoinHandle<Result<(), DispatchError>> {
    let dispatcher = Arc::clone(dispatcher);
    tokio::spawn(async move {
        dispatcher
            .send_simple(
                &MailContext::new(),
                SimpleMessage::new("user@example.com", format!("送信 {n}"), "本文"),
            )
            .await
    })
}

#[tokio::test]
async fn test_最大ワーカー数とキュー容量を超えた送信はpool_saturatedになる() {
    let gated = GatedTransportClient::new();
    let factory = RecordingClientFactory::new().with_client("default", Arc::new(gated.clone()));
    // 最大 2 ワーカー + キュー 1 = 同時に 3 件まで
    let h = harness_with(factory, pool_config(1, 2, 1));
    let pool = h.pool.clone();
    let dispatcher = Arc::new(h.dispatcher);

    // 1 件目: コアワーカーで送信中
    let first = spawn_send(&dispatcher, 1);
    wait_until(|| gated.started() == 1).await;

    // 2 件目: キューで待機
    let second = spawn_send(&dispatcher, 2);
    wait_until(|| pool.queued() == 1).await;

    // 3 件目: 追加ワーカーで送信中
    let third = spawn_send(&dispatcher, 3);
    wait_until(|| gated.started() == 2).await;
    assert_eq!(pool.worker_count(), 2);

    // 4 件目: 受け付けられない
    let result = dispatcher
        .send_simple(
            &MailContext::new(),
            SimpleMessage::new("user@example.com", "送信 4", "本文"),
        )
        .await;
    assert!(matches!(result, Err(DispatchError::PoolSaturated(_))));
    assert_eq!(gated.started(), 2);

    gated.release(3);
    for handle in [first, second, third] {
        handle.await.unwrap().unwrap();
    }

    let mut subjects: Vec<_> = gated.sent_emails().into_iter().map(|e| e.subject).collect();
    subjects.sort();
    assert_eq!(subjects, vec!["送信 1", "送信 2", "送信 3"]);
}

#[tokio::test]
async fn test_飽和が解消すると再び受け付ける() {
    let gated = GatedTransportClient::new();
    let factory = RecordingClientFactory::new().with_client("default", Arc::new(gated.clone()));
    let h = harness_with(factory, pool_config(1, 1, 1));
    let pool = h.pool.clone();
    let dispatcher = Arc::new(h.dispatcher);

    let first = spawn_send(&dispatcher, 1);
    wait_until(|| gated.started() == 1).await;
    let second = spawn_send(&dispatcher, 2);
    wait_until(|| pool.queued() == 1).await;

    let rejected = spawn_send(&dispatcher, 3).await.unwrap();
    assert!(matches!(rejected, Err(DispatchError::PoolSaturated(_))));

    gated.release(2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    gated.release(1);
    spawn_send(&dispatcher, 4).await.unwrap().unwrap();
    assert_eq!(gated.sent_emails().len(), 3);
}
