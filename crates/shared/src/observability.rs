//! # Observability 基盤
//!
//! トレーシング初期化とログ出力形式の設定を提供する。
//! 環境変数 `LOG_FORMAT` による JSON / Pretty 出力の切り替えに対応する。

/// ログ出力形式
///
/// 環境変数 `LOG_FORMAT` で切り替える。
/// 値が未設定または不正な場合は [`Pretty`](LogFormat::Pretty) にフォールバックする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON 形式（本番環境向け）
    Json,
    /// 人間が読みやすい形式（開発環境向け）
    #[default]
    Pretty,
}

impl LogFormat {
    /// 文字列からログ形式をパースする
    ///
    /// 不正な値の場合は [`Pretty`](LogFormat::Pretty) にフォールバックし、
    /// stderr に警告を出力する（トレーシング初期化前に呼ばれるため）。
    pub fn parse(s: &str) -> Self {
        match s {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            other => {
                eprintln!("WARNING: unknown LOG_FORMAT={other:?}, falling back to pretty");
                Self::Pretty
            }
        }
    }

    /// 環境変数 `LOG_FORMAT` から読み取る
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|val| Self::parse(&val))
            .unwrap_or_default()
    }
}

/// `RUST_LOG` 未設定時のフィルタ
///
/// mailroute の各クレート（`mailroute_infra` 等）はターゲットの前方一致で debug まで出す。
pub const DEFAULT_LOG_FILTER: &str = "info,mailroute=debug";

/// トレーシング初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// サービス名（起動ログに出力）
    pub service_name: String,
    /// ログ出力形式
    pub log_format:   LogFormat,
    /// `EnvFilter` のディレクティブ
    pub filter:       String,
}

impl TracingConfig {
    pub fn new(service_name: impl Into<String>, log_format: LogFormat) -> Self {
        Self {
            service_name: service_name.into(),
            log_format,
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    /// `LOG_FORMAT` と `RUST_LOG` 環境変数から設定を決定する
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let config = Self::new(service_name, LogFormat::from_env());
        match std::env::var("RUST_LOG") {
            Ok(filter) if !filter.trim().is_empty() => config.with_filter(filter),
            _ => config,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// 設定からサブスクライバーを組み立てる
///
/// `tracing_error::ErrorLayer` を含むため、このサブスクライバーの下で作られた
/// インフラ層エラーの `SpanTrace` には送信時のスパン（`mail_delivery` 等）が記録される。
/// フィルタのディレクティブが不正な場合は [`DEFAULT_LOG_FILTER`] を使う。
#[cfg(feature = "observability")]
pub fn build_subscriber(
    config: &TracingConfig,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    use tracing_subscriber::{EnvFilter, Layer as _, layer::SubscriberExt};

    let env_filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|e| {
        eprintln!(
            "WARNING: invalid log filter {:?} ({e}), falling back to {DEFAULT_LOG_FILTER:?}",
            config.filter
        );
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_thread_names(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(tracing_error::ErrorLayer::default())
}

/// トレーシングを初期化する
///
/// [`build_subscriber`] の結果をグローバルのサブスクライバーとして登録する。
#[cfg(feature = "observability")]
pub fn init_tracing(config: &TracingConfig) {
    use tracing_subscriber::util::SubscriberInitExt as _;

    build_subscriber(config).init();

    tracing::debug!(
        service = %config.service_name,
        filter = %config.filter,
        "トレーシングを初期化しました"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newは既定のフィルタを使う() {
        let config = TracingConfig::new("mail-service", LogFormat::Json);

        assert_eq!(config.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_with_filterでフィルタを上書きできる() {
        let config = TracingConfig::new("mail-service", LogFormat::Pretty)
            .with_filter("warn,mailroute_infra=trace");

        assert_eq!(config.filter, "warn,mailroute_infra=trace");
    }

    #[cfg(feature = "observability")]
    #[test]
    fn test_組み立てたサブスクライバーの下ではspan_traceに送信スパンが記録される() {
        use tracing_error::SpanTrace;

        let subscriber = build_subscriber(&TracingConfig::new("mail-service", LogFormat::Json));

        let trace = tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("mail_delivery", template = "EmailQQ");
            let _entered = span.enter();
            SpanTrace::capture().to_string()
        });

        assert!(trace.contains("mail_delivery"), "{trace}");
        assert!(trace.contains("EmailQQ"), "{trace}");
    }

    #[cfg(feature = "observability")]
    #[test]
    fn test_不正なフィルタでもサブスクライバーを組み立てられる() {
        use tracing_error::SpanTrace;

        let config =
            TracingConfig::new("mail-service", LogFormat::Pretty).with_filter("mailroute=loud");
        let subscriber = build_subscriber(&config);

        let trace = tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("mail_template");
            let _entered = span.enter();
            SpanTrace::capture().to_string()
        });

        assert!(trace.contains("mail_template"), "{trace}");
    }
}
