//! # Mail Service エラー定義
//!
//! 送信ユースケースが呼び出し元に返すエラー。

use mailroute_domain::{DomainError, transport::TransportError};
use mailroute_infra::InfraError;
use thiserror::Error;

/// 送信処理で発生するエラー
#[derive(Debug, Error)]
pub enum DispatchError {
    /// メッセージの検証に失敗（トランスポートには触れていない）
    #[error("入力値が不正です: {0}")]
    Validation(#[from] DomainError),

    /// メッセージ構築またはトランスポートでの送信に失敗
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// ワーカープールが受け付けなかった（送信は試行していない）
    #[error("送信を受け付けられません: {0}")]
    PoolSaturated(InfraError),

    /// ワーカーが結果を返さずに終了した
    #[error("送信結果の待機が中断されました")]
    Interrupted,

    /// 呼び出し元が待機をキャンセルした（送信済みのジョブは取り消されない）
    #[error("送信結果の待機がキャンセルされました")]
    Canceled,

    /// その他のインフラエラー
    #[error("インフラエラー: {0}")]
    Infra(InfraError),
}

impl From<InfraError> for DispatchError {
    fn from(e: InfraError) -> Self {
        if e.is_pool_saturated() {
            Self::PoolSaturated(e)
        } else {
            Self::Infra(e)
        }
    }
}
