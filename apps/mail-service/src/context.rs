//! # 呼び出しコンテキスト
//!
//! 1 回の論理的な呼び出しに紐づく状態を、引数として明示的に受け渡す。
//!
//! ## 設計方針
//!
//! - **スレッドローカルを使わない**: タスクがスレッドをまたいでも状態が失われず、
//!   無関係な並行呼び出しから見えることもない
//! - **不変値**: トランスポートの選択は子コンテキストを作って行い、呼び出し元の
//!   コンテキストは変更しない。スコープを抜けると子コンテキストごと破棄される
//! - **キャンセル**: 呼び出し元は [`CancellationToken`] で送信結果の待機を打ち切れる

use mailroute_infra::TransportBinding;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 呼び出しコンテキスト
#[derive(Debug, Clone)]
pub struct MailContext {
    request_id:   String,
    cancellation: CancellationToken,
    active:       Option<TransportBinding>,
}

impl MailContext {
    /// 新しいリクエスト ID を採番してコンテキストを作成する
    pub fn new() -> Self {
        Self {
            request_id:   Uuid::now_v7().to_string(),
            cancellation: CancellationToken::new(),
            active:       None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// 現在のスコープで選択されているトランスポート
    ///
    /// 未選択の場合は `None`（送信時は既定のトランスポートを使う）。
    pub fn active_transport(&self) -> Option<&TransportBinding> {
        self.active.as_ref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// トランスポートを選択した子コンテキストを作成する
    pub(crate) fn bound_to(&self, binding: TransportBinding) -> Self {
        Self {
            request_id:   self.request_id.clone(),
            cancellation: self.cancellation.clone(),
            active:       Some(binding),
        }
    }
}

impl Default for MailContext {
    fn default() -> Self {
        Self::new()
    }
}
