//! # インフラ層エラー定義
//!
//! レジストリの構築・参照やワーカープールへの投入で発生するエラーを表現する。
//!
//! ## 構造
//!
//! `std::io::Error` と同じ struct + enum パターンを採用:
//! - [`InfraError`]: エラー種別（[`InfraErrorKind`]）と [`SpanTrace`] を保持するラッパー
//! - [`InfraErrorKind`]: エラーの具体的な種別
//!
//! convenience constructor でエラーを生成すると、その時点のスパン情報が自動的にキャプチャされる。

use std::fmt;

use derive_more::Display;
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層で発生するエラー
///
/// エラー種別（[`InfraErrorKind`]）と [`SpanTrace`]（呼び出し経路）を保持する。
///
/// ## パターンマッチ
///
/// ```ignore
/// match error.kind() {
///     InfraErrorKind::PoolSaturated { .. } => { /* 過負荷として報告 */ }
///     _ => { /* その他 */ }
/// }
/// ```
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InfraErrorKind {
    /// レジストリに存在しないテンプレート名
    #[error("メールテンプレートが見つかりません: {0}")]
    TemplateNotFound(String),

    /// 同名のテンプレートが複数設定されている
    #[error("メールテンプレートが重複しています: {0}")]
    DuplicateTemplate(String),

    /// トランスポートクライアントを構築できない
    #[error("送信クライアントの構築に失敗: テンプレート {template}: {reason}")]
    ClientBuild {
        /// テンプレート名
        template: String,
        /// 失敗理由
        reason:   String,
    },

    /// ワーカープールの設定値が不正
    #[error("ワーカープールの設定が不正です: {0}")]
    InvalidPoolConfig(String),

    /// ワーカー数が上限に達し、キューも満杯
    #[error(
        "ワーカープールが飽和しています: 最大ワーカー数 {max_workers}, キュー容量 {queue_capacity}"
    )]
    PoolSaturated {
        max_workers:    usize,
        queue_capacity: usize,
    },

    /// ワーカープールが停止している
    #[error("ワーカープールは停止しています")]
    PoolClosed,
}

impl InfraError {
    /// エラー種別を取得する
    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    /// SpanTrace を取得する
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// ワーカープールの飽和によるエラーかどうか
    pub fn is_pool_saturated(&self) -> bool {
        matches!(self.kind, InfraErrorKind::PoolSaturated { .. })
    }

    fn capture(kind: InfraErrorKind) -> Self {
        Self {
            kind,
            span_trace: SpanTrace::capture(),
        }
    }

    // ===== Convenience constructors =====

    pub fn template_not_found(name: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::TemplateNotFound(name.into()))
    }

    pub fn duplicate_template(name: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::DuplicateTemplate(name.into()))
    }

    pub fn client_build(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::ClientBuild {
            template: template.into(),
            reason:   reason.into(),
        })
    }

    pub fn invalid_pool_config(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::InvalidPoolConfig(msg.into()))
    }

    pub fn pool_saturated(max_workers: usize, queue_capacity: usize) -> Self {
        Self::capture(InfraErrorKind::PoolSaturated {
            max_workers,
            queue_capacity,
        })
    }

    pub fn pool_closed() -> Self {
        Self::capture(InfraErrorKind::PoolClosed)
    }
}

impl fmt::Debug for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfraError")
            .field("kind", &self.kind)
            .field("span_trace", &self.span_trace)
            .finish()
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::layer::SubscriberExt as _;

    use super::*;

    /// テスト用に ErrorLayer 付き subscriber を設定する
    fn with_error_layer(f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(tracing_error::ErrorLayer::default());
        let _guard = tracing::subscriber::set_default(subscriber);
        f();
    }

    #[test]
    fn test_template_not_foundでspan_traceがキャプチャされる() {
        with_error_layer(|| {
            let span = tracing::info_span!("test_resolve", template = "EmailOffice365");
            let _enter = span.enter();

            let err = InfraError::template_not_found("EmailOffice365");

            assert_eq!(
                err.kind(),
                &InfraErrorKind::TemplateNotFound("EmailOffice365".to_string())
            );
            let trace_str = format!("{}", err.span_trace());
            assert!(
                trace_str.contains("test_resolve"),
                "SpanTrace がスパン名を含むこと: {trace_str}",
            );
        });
    }

    #[test]
    fn test_pool_saturatedを判定できる() {
        let err = InfraError::pool_saturated(2, 1);
        assert!(err.is_pool_saturated());
        assert!(!InfraError::pool_closed().is_pool_saturated());
    }

    #[test]
    fn test_displayがinfra_error_kindのメッセージを出力する() {
        let err = InfraError::pool_saturated(50, 200);
        assert_eq!(
            format!("{err}"),
            "ワーカープールが飽和しています: 最大ワーカー数 50, キュー容量 200"
        );
    }

    #[test]
    fn test_client_buildのメッセージにテンプレート名が含まれる() {
        let err = InfraError::client_build("EmailOffice365", "invalid host");
        assert!(err.to_string().contains("EmailOffice365"));
    }
}
