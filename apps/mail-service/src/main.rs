//! # Mail Service デモ
//!
//! 設定を読み込み、既定のトランスポートと名前付きトランスポートでそれぞれメールを送信する。
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `MAIL_CONFIG` | No | 設定ファイルのパス（TOML 等） |
//! | `MAIL__DEFAULT__HOST` | 設定ファイルがない場合 | 既定トランスポートのホスト |
//! | `MAIL_DEMO_TO` | No | 宛先（デフォルト: `test@example.com`） |
//! | `MAIL_DEMO_TEMPLATE` | No | 名前付きテンプレート（デフォルト: `EmailOffice365`） |
//! | `LOG_FORMAT` | No | `json` または `pretty` |
//!
//! ## 起動方法
//!
//! ```bash
//! # Mailpit 等のローカル SMTP へ送信
//! MAIL__DEFAULT__HOST=localhost MAIL__DEFAULT__PORT=1025 \
//!   MAIL__DEFAULT__FROM=noreply@example.com cargo run -p mailroute-mail-service
//!
//! # 設定ファイルを使う
//! MAIL_CONFIG=mail.toml cargo run -p mailroute-mail-service
//! ```

use std::{env, path::PathBuf, sync::Arc};

use mailroute_domain::{
    clock::SystemClock,
    message::{RichMessage, SimpleMessage, UploadedFile},
    transport::TemplateName,
};
use mailroute_infra::{WorkerPool, transport::DefaultClientFactory};
use mailroute_mail_service::{
    MailContext,
    config::MailSettings,
    usecase::{MailDispatcher, TemplateMarker, TemplateSelector},
};
use mailroute_shared::observability::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    init_tracing(&TracingConfig::from_env("mail-service"));

    let config_path = env::var("MAIL_CONFIG").ok().map(PathBuf::from);
    let settings = MailSettings::load(config_path.as_deref())?;

    let registry = Arc::new(settings.build_registry(&DefaultClientFactory)?);
    let pool = WorkerPool::new(&settings.pool)?;
    let dispatcher = MailDispatcher::new(Arc::clone(&registry), pool, Arc::new(SystemClock));
    let selector = TemplateSelector::new(registry);

    let to = env::var("MAIL_DEMO_TO").unwrap_or_else(|_| "test@example.com".to_string());
    let template = TemplateName::new(
        env::var("MAIL_DEMO_TEMPLATE").unwrap_or_else(|_| "EmailOffice365".to_string()),
    )?;
    let to = to.as_str();
    let dispatcher = &dispatcher;

    // マーカーなし: 既定のトランスポートで送信
    let ctx = MailContext::new();
    let result = selector
        .intercept(&ctx, &TemplateMarker::none(), "send_simple", |ctx| async move {
            let message = SimpleMessage::new(to, "Simple email", "Sent with the default transport.");
            dispatcher.send_simple(&ctx, message).await
        })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "既定のトランスポートでの送信に失敗しました");
    }

    // ユニット単位のマーカー: 内側の送信は名前付きトランスポートを使う
    let unit = TemplateMarker::unit(template.clone());
    let result = selector
        .intercept(&ctx, &unit, "send_nested", |ctx| async move {
            let message = SimpleMessage::new(
                to,
                "Test Subject from Nested Call",
                "This is a test message sent with a specific template.",
            );
            dispatcher.send_simple(&ctx, message).await
        })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, template = %template, "名前付きトランスポートでの送信に失敗しました");
    }

    let result = selector
        .intercept(&ctx, &unit, "send_rich", |ctx| async move {
            let message = RichMessage::new(to, "Rich email", "<p>Sent with an attachment.</p>");
            let upload = UploadedFile::new("hello.txt", "hello from mailroute")
                .with_content_type("text/plain");
            dispatcher.send_rich(&ctx, message, Some(upload)).await
        })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, template = %template, "添付ファイル付きメールの送信に失敗しました");
    }

    Ok(())
}
