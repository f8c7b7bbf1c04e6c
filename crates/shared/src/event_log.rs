//! # ビジネスイベントログの構造化ヘルパー
//!
//! メール送信の結果を `jq` で抽出しやすい形で出力するための、
//! ログフィールドの命名規約とヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`mail.template`）を使用する。JSON 出力ではフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const MAIL: &str = "mail";
    }

    /// イベントアクション
    pub mod action {
        /// トランスポートでの送信に成功
        pub const MAIL_SENT: &str = "mail.sent";
        /// トランスポートでの送信に失敗
        pub const MAIL_FAILED: &str = "mail.failed";
        /// ワーカープールが受け付けなかった
        pub const MAIL_REJECTED: &str = "mail.rejected";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use tracing_subscriber::fmt::MakeWriter;

    use super::event;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_log_business_eventはイベントマーカーを付与する() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            crate::log_business_event!(
                event.category = event::category::MAIL,
                event.action = event::action::MAIL_SENT,
                event.result = event::result::SUCCESS,
                "メール送信成功"
            );
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("event.kind=\"business_event\""), "{output}");
        assert!(output.contains("event.action=\"mail.sent\""), "{output}");
        assert!(output.contains("メール送信成功"), "{output}");
    }
}
