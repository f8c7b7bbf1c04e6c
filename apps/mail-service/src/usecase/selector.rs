//! # テンプレートセレクタ
//!
//! 呼び出し単位でトランスポートを選択し、その呼び出しの間だけ
//! コンテキストに公開する。
//!
//! ## 設計方針
//!
//! - **マーカーは値**: 呼び出し側がユニット単位・呼び出し単位のマーカーを組み立てて渡す
//! - **呼び出し単位が優先**: 両方ある場合は呼び出し単位のマーカーを使う
//! - **内側が優先**: ネストした呼び出しが自分のマーカーを持つ場合はそのスコープの間だけ上書きし、
//!   持たない場合は外側の選択を引き継ぐ
//! - **未登録は既定にフォールバック**: 未登録のテンプレート名は警告を出して既定のトランスポートを使う
//! - **必ず解放**: 成功・失敗・キャンセルのいずれでもスコープを抜けると選択は解除される
//!
//! ## 使用例
//!
//! ```rust,ignore
//! let marker = TemplateMarker::unit(TemplateName::new("EmailOffice365")?);
//! selector
//!     .intercept(&ctx, &marker, "send_report", |ctx| async move {
//!         dispatcher.send_simple(&ctx, message).await
//!     })
//!     .await?;
//! ```

use std::{fmt, future::Future, sync::Arc, time::Instant};

use mailroute_domain::transport::TemplateName;
use mailroute_infra::TemplateRegistry;
use tracing::Instrument as _;

use crate::context::MailContext;

/// テンプレート選択マーカー
///
/// ユニット（呼び出しをまとめる単位）に付くマーカーと、個々の呼び出しに付くマーカーを持つ。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateMarker {
    unit: Option<TemplateName>,
    call: Option<TemplateName>,
}

impl TemplateMarker {
    /// マーカーなし（外側の選択を引き継ぐ）
    pub fn none() -> Self {
        Self::default()
    }

    pub fn unit(template: TemplateName) -> Self {
        Self {
            unit: Some(template),
            call: None,
        }
    }

    pub fn call(template: TemplateName) -> Self {
        Self {
            unit: None,
            call: Some(template),
        }
    }

    /// 呼び出し単位のマーカーを追加する
    pub fn with_call(mut self, template: TemplateName) -> Self {
        self.call = Some(template);
        self
    }

    /// 実際に適用するテンプレート名
    pub fn effective(&self) -> Option<&TemplateName> {
        self.call.as_ref().or(self.unit.as_ref())
    }
}

/// テンプレートセレクタ
#[derive(Clone)]
pub struct TemplateSelector {
    registry: Arc<TemplateRegistry>,
}

impl TemplateSelector {
    pub fn new(registry: Arc<TemplateRegistry>) -> Self {
        Self { registry }
    }

    /// マーカーに従ってトランスポートを選択したコンテキストを作成する
    ///
    /// マーカーがない場合は `ctx` の選択をそのまま引き継ぐ。
    pub fn scope(&self, ctx: &MailContext, marker: &TemplateMarker) -> MailContext {
        let Some(template) = marker.effective() else {
            return ctx.clone();
        };

        let binding = match self.registry.resolve(template) {
            Ok(binding) => binding,
            Err(e) => {
                tracing::warn!(
                    template = %template,
                    error = %e,
                    "未登録のテンプレートのため既定のトランスポートを使用します"
                );
                self.registry.default_binding()
            }
        };
        ctx.bound_to(binding)
    }

    /// 選択したトランスポートを公開した状態で `operation` を実行する
    ///
    /// `f` には選択済みの子コンテキストが渡される。`f` のエラーはログに記録したうえで
    /// そのまま返す。
    pub async fn intercept<F, Fut, T, E>(
        &self,
        ctx: &MailContext,
        marker: &TemplateMarker,
        operation: &str,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(MailContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let scoped = self.scope(ctx, marker);
        let template = scoped
            .active_transport()
            .map_or(TemplateName::DEFAULT, |b| b.template().as_str())
            .to_string();

        let span = tracing::info_span!(
            "mail_template",
            template = %template,
            operation,
            request_id = %ctx.request_id()
        );
        let _release = ReleaseGuard {
            template:  &template,
            operation,
        };

        let started = Instant::now();
        tracing::debug!(template = %template, operation, "トランスポートを選択しました");

        let result = f(scoped).instrument(span).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                tracing::info!(template = %template, operation, elapsed_ms, "メール送信処理が完了しました");
            }
            Err(e) => {
                tracing::error!(
                    template = %template,
                    operation,
                    elapsed_ms,
                    error = %e,
                    "メール送信処理が失敗しました"
                );
            }
        }

        result
    }
}

/// スコープ終了時に選択の解除を記録する
///
/// 待機中の future が drop された場合も含め、1 回の呼び出しにつき 1 回だけ実行される。
struct ReleaseGuard<'a> {
    template:  &'a str,
    operation: &'a str,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        tracing::debug!(
            template = self.template,
            operation = self.operation,
            "トランスポートの選択を解除しました"
        );
    }
}
