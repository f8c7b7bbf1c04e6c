//! # Mail Service 設定
//!
//! 既定のトランスポート、名前付きトランスポート、ワーカープールの設定を読み込む。
//!
//! ## 読み込み順（後勝ち）
//!
//! 1. 設定ファイル（TOML 等、拡張子で形式を判定。指定時のみ）
//! 2. 環境変数 `MAIL__*`（区切りは `__`。例: `MAIL__DEFAULT__HOST`）
//!
//! ```toml
//! [default]
//! host = "smtp.example.com"
//! port = 25
//! username = "noreply@example.com"
//! password = "secret"
//!
//! [[templates]]
//! template_name = "EmailOffice365"
//!
//! [templates.mail]
//! host = "smtp.office365.com"
//! port = 587
//! properties = { "mail.smtp.starttls.enable" = "true" }
//!
//! [pool]
//! core_pool_size = 5
//! maximum_pool_size = 50
//! keep_alive_time = 10
//! time_unit = "seconds"
//! capacity = 200
//! ```

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use mailroute_domain::transport::{TemplateName, TransportConfig};
use mailroute_infra::{
    InfraError,
    TemplateRegistry,
    TransportClientFactory,
    WorkerPoolConfig,
};
use serde::Deserialize;

/// 環境変数のプレフィックス
const ENV_PREFIX: &str = "MAIL";
/// 環境変数の階層区切り
const ENV_SEPARATOR: &str = "__";

/// Mail Service の設定
#[derive(Debug, Clone, Deserialize)]
pub struct MailSettings {
    /// 既定のトランスポート
    pub default:   TransportConfig,
    /// 名前付きトランスポート
    #[serde(default)]
    pub templates: Vec<TemplateSettings>,
    /// ワーカープール
    #[serde(default)]
    pub pool:      WorkerPoolConfig,
}

/// 名前付きトランスポートの設定
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSettings {
    pub template_name: TemplateName,
    pub mail:          TransportConfig,
}

impl MailSettings {
    /// 設定ファイルと環境変数から読み込む
    ///
    /// # エラー
    ///
    /// ファイルが読めない場合や必須項目（`default.host`）がない場合は `ConfigError` を返す。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder.add_source(env).build()?;
        Self::from_config(config)
    }

    /// 構築済みの `Config` から読み込む
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }

    /// 設定内容でテンプレートレジストリを構築する
    pub fn build_registry(
        &self,
        factory: &dyn TransportClientFactory,
    ) -> Result<TemplateRegistry, InfraError> {
        self.templates
            .iter()
            .fold(
                TemplateRegistry::builder(self.default.clone()),
                |builder, template| {
                    builder.register(template.template_name.clone(), template.mail.clone())
                },
            )
            .build(factory)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
