//! # メール送信ディスパッチャ
//!
//! メッセージの検証 → トランスポートの決定 → 送信用メッセージの構築 →
//! ワーカープールでの送信 → 結果の待機、を一続きで行う。
//!
//! ## 設計方針
//!
//! - **検証が先**: 検証に失敗したメッセージはトランスポートに一切触れない
//! - **コンテキストのトランスポートを使う**: 選択されていなければ既定のトランスポートを使う
//! - **呼び出し元の文脈を引き継ぐ**: ワーカーで実行されるジョブは、投入時のスパン
//!   （リクエスト ID・テンプレート名）の中で実行される
//! - **結果を握りつぶさない**: 送信エラー・中断・キャンセルはすべて呼び出し元に返す。
//!   キャンセルしても投入済みの送信は取り消されない

use std::{path::Path, sync::Arc};

use mailroute_domain::{
    clock::Clock,
    message::{RichMessage, SimpleMessage, UploadedFile},
    outbound::{Attachment, OutboundEmail},
    transport::TransportError,
};
use mailroute_infra::{
    TemplateRegistry,
    TransportBinding,
    WorkerPool,
    transport::check_addresses,
};
use mailroute_shared::{event_log::event, log_business_event};
use tokio::sync::oneshot;
use tracing::Instrument as _;

use crate::{context::MailContext, error::DispatchError};

/// メール送信ディスパッチャ
pub struct MailDispatcher {
    registry: Arc<TemplateRegistry>,
    pool:     WorkerPool,
    clock:    Arc<dyn Clock>,
}

impl MailDispatcher {
    pub fn new(registry: Arc<TemplateRegistry>, pool: WorkerPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            pool,
            clock,
        }
    }

    /// テキストメールを送信する
    ///
    /// # エラー
    ///
    /// - 検証に失敗した場合は `Validation`
    /// - メッセージ構築・送信に失敗した場合は `Transport`。解釈できない送信元・宛先・CC は
    ///   投入前に `Transport(TransportError::InvalidAddress)` になる
    /// - ワーカープールが飽和している場合は `PoolSaturated`
    /// - 待機が中断・キャンセルされた場合は `Interrupted` / `Canceled`
    pub async fn send_simple(
        &self,
        ctx: &MailContext,
        message: SimpleMessage,
    ) -> Result<(), DispatchError> {
        message.validate_message()?;

        let binding = self.active_binding(ctx);
        let email = OutboundEmail::builder()
            .from(sender_address(&binding)?)
            .to(message.to)
            .cc_many(message.cc)
            .date(message.sent_date.unwrap_or_else(|| self.clock.now()))
            .subject(message.subject)
            .text(message.text)
            .build()?;

        self.deliver(ctx, binding, email).await
    }

    /// 添付ファイル付きの HTML メールを送信する
    ///
    /// `upload` は空でなければ宣言されたファイル名で、`message.filepath` のファイルは
    /// そのファイル名で添付する。
    ///
    /// # エラー
    ///
    /// [`send_simple`](Self::send_simple) に加え、添付ファイルを読み込めない場合は
    /// `Transport(TransportError::Attachment)` を返す。
    pub async fn send_rich(
        &self,
        ctx: &MailContext,
        message: RichMessage,
        upload: Option<UploadedFile>,
    ) -> Result<(), DispatchError> {
        message.validate_message()?;
        if let Some(upload) = &upload {
            upload.validate_upload()?;
        }

        let binding = self.active_binding(ctx);

        let mut attachments = Vec::new();
        if let Some(upload) = upload.filter(|u| !u.is_empty()) {
            attachments.push(uploaded_attachment(upload));
        }
        if let Some(path) = message.attachment_path() {
            attachments.push(read_attachment(path).await?);
        }

        let email = attachments
            .into_iter()
            .fold(OutboundEmail::builder(), |builder, attachment| {
                builder.attach(attachment)
            })
            .from(sender_address(&binding)?)
            .to(message.to)
            .cc_many(message.cc)
            .date(message.sent_date.unwrap_or_else(|| self.clock.now()))
            .subject(message.subject)
            .html(message.text)
            .build()?;

        self.deliver(ctx, binding, email).await
    }

    fn active_binding(&self, ctx: &MailContext) -> TransportBinding {
        ctx.active_transport()
            .cloned()
            .unwrap_or_else(|| self.registry.default_binding())
    }

    /// ワーカープールに送信を投入し、結果を待つ
    async fn deliver(
        &self,
        ctx: &MailContext,
        binding: TransportBinding,
        email: OutboundEmail,
    ) -> Result<(), DispatchError> {
        // 送れないアドレスのメッセージはワーカーに渡さない
        check_addresses(&email)?;

        let template = binding.template().clone();
        let recipients = email.to.join(", ");

        if ctx.cancellation_token().is_cancelled() {
            return Err(DispatchError::Canceled);
        }

        // 呼び出し元のスパンの子としてジョブのスパンを作り、ワーカー上でも同じ文脈でログを出す
        let span = tracing::info_span!(
            "mail_delivery",
            request_id = %ctx.request_id(),
            template = %template
        );
        let client = Arc::clone(binding.client());
        let (tx, rx) = oneshot::channel();
        let job = async move {
            let result = client.send(&email).await;
            // 呼び出し元がキャンセル済みの場合は受け手がいない
            let _ = tx.send(result);
        }
        .instrument(span);

        if let Err(e) = self.pool.submit(job) {
            log_business_event!(
                event.category = event::category::MAIL,
                event.action = event::action::MAIL_REJECTED,
                event.result = event::result::FAILURE,
                mail.template = %template,
                mail.recipient = %recipients,
                error = %e,
                "メール送信をワーカープールが受け付けませんでした"
            );
            return Err(e.into());
        }

        let result = tokio::select! {
            biased;
            () = ctx.cancellation_token().cancelled() => {
                tracing::warn!(
                    template = %template,
                    request_id = %ctx.request_id(),
                    "送信結果の待機がキャンセルされました"
                );
                return Err(DispatchError::Canceled);
            }
            received = rx => received.map_err(|_| DispatchError::Interrupted)?,
        };

        match result {
            Ok(()) => {
                log_business_event!(
                    event.category = event::category::MAIL,
                    event.action = event::action::MAIL_SENT,
                    event.result = event::result::SUCCESS,
                    mail.template = %template,
                    mail.recipient = %recipients,
                    "メール送信成功"
                );
                Ok(())
            }
            Err(e) => {
                log_business_event!(
                    event.category = event::category::MAIL,
                    event.action = event::action::MAIL_FAILED,
                    event.result = event::result::FAILURE,
                    mail.template = %template,
                    mail.recipient = %recipients,
                    error = %e,
                    "メール送信失敗"
                );
                Err(e.into())
            }
        }
    }
}

fn sender_address(binding: &TransportBinding) -> Result<String, TransportError> {
    binding
        .config()
        .sender_address()
        .map(str::to_string)
        .ok_or_else(|| TransportError::MissingSender {
            template: binding.template().to_string(),
        })
}

fn uploaded_attachment(upload: UploadedFile) -> Attachment {
    // 検証済みのため、空でないアップロードには必ずファイル名がある
    let filename = upload.filename.unwrap_or_default();
    let content_type = upload.content_type.unwrap_or_else(|| guess_content_type(&filename));
    Attachment::new(filename, upload.content).with_content_type(content_type)
}

async fn read_attachment(path: &Path) -> Result<Attachment, TransportError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| TransportError::Attachment {
            path:   path.display().to_string(),
            reason: e.to_string(),
        })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| TransportError::Attachment {
            path:   path.display().to_string(),
            reason: "ファイル名を取得できません".to_string(),
        })?;

    let content_type = guess_content_type(&filename);
    Ok(Attachment::new(filename, content).with_content_type(content_type))
}

fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}
