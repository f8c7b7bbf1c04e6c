//! # TemplateRegistry
//!
//! テンプレート名ごとのトランスポート設定と送信クライアントを保持する。
//!
//! ## 設計方針
//!
//! - **起動時に一括構築**: クライアントの構築はコストが高く、トランスポートの集合は
//!   プロセスの生存期間中変わらないため、構築時に全テンプレート分を 1 回だけ作る
//! - **読み取り専用**: 構築後は変更しない。`Arc` で共有し、任意のスレッドから並行に参照できる
//! - **既定テンプレートは常に存在**: 名前付きテンプレートが 0 件でも `"default"` は解決できる

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use mailroute_domain::transport::{TemplateName, TransportConfig};

use crate::{
    error::InfraError,
    transport::{TransportClient, TransportClientFactory},
};

/// テンプレートに紐づくトランスポート（設定 + 送信クライアント）
///
/// clone は `Arc` のコピーのみ。
#[derive(Clone)]
pub struct TransportBinding {
    template: TemplateName,
    config:   Arc<TransportConfig>,
    client:   Arc<dyn TransportClient>,
}

impl TransportBinding {
    pub fn new(
        template: TemplateName,
        config: TransportConfig,
        client: Arc<dyn TransportClient>,
    ) -> Self {
        Self {
            template,
            config: Arc::new(config),
            client,
        }
    }

    pub fn template(&self) -> &TemplateName {
        &self.template
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn TransportClient> {
        &self.client
    }
}

impl fmt::Debug for TransportBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportBinding")
            .field("template", &self.template)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// テンプレートレジストリ
pub struct TemplateRegistry {
    default: TransportBinding,
    entries: HashMap<TemplateName, TransportBinding>,
}

impl TemplateRegistry {
    /// ビルダーを作成する
    ///
    /// `default` はプロセス全体の既定トランスポート設定。
    pub fn builder(default: TransportConfig) -> TemplateRegistryBuilder {
        TemplateRegistryBuilder {
            default,
            templates: Vec::new(),
        }
    }

    /// テンプレート名からトランスポートを解決する
    ///
    /// # エラー
    ///
    /// 未登録のテンプレート名の場合は `InfraErrorKind::TemplateNotFound` を返す。
    pub fn resolve(&self, name: &TemplateName) -> Result<TransportBinding, InfraError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| InfraError::template_not_found(name.as_str()))
    }

    /// 既定テンプレートのトランスポートを返す
    pub fn default_binding(&self) -> TransportBinding {
        self.default.clone()
    }

    /// 登録済みテンプレート名の一覧を返す（名前順）
    pub fn template_names(&self) -> Vec<&TemplateName> {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &TemplateName) -> bool {
        self.entries.contains_key(name)
    }
}

/// [`TemplateRegistry`] のビルダー
pub struct TemplateRegistryBuilder {
    default:   TransportConfig,
    templates: Vec<(TemplateName, TransportConfig)>,
}

impl TemplateRegistryBuilder {
    /// 名前付きテンプレートを登録する
    ///
    /// 重複チェックは [`build`](Self::build) 時に行う。
    pub fn register(mut self, name: TemplateName, config: TransportConfig) -> Self {
        self.templates.push((name, config));
        self
    }

    /// 全テンプレートのクライアントを構築してレジストリを作成する
    ///
    /// `"default"` という名前のテンプレートが登録されている場合、
    /// プロセス全体の既定設定を置き換える。
    ///
    /// # エラー
    ///
    /// - 同名のテンプレートが複数登録されている場合は `DuplicateTemplate`
    /// - クライアントの構築に失敗した場合はファクトリのエラー
    pub fn build(self, factory: &dyn TransportClientFactory) -> Result<TemplateRegistry, InfraError> {
        let mut configs = BTreeMap::new();
        configs.insert(TemplateName::default_template(), self.default);

        let mut seen = BTreeSet::new();
        for (name, config) in self.templates {
            if !seen.insert(name.clone()) {
                return Err(InfraError::duplicate_template(name.as_str()));
            }
            if name.is_default() {
                tracing::warn!(
                    host = %config.host,
                    "既定テンプレートの設定を名前付きテンプレートで上書きします"
                );
            }
            configs.insert(name, config);
        }

        let mut entries = HashMap::with_capacity(configs.len());
        for (name, config) in configs {
            let client = factory.create(&name, &config)?;
            tracing::info!(
                template = %name,
                host = %config.host,
                protocol = %config.protocol,
                "メール送信クライアントを読み込みました"
            );
            entries.insert(name.clone(), TransportBinding::new(name, config, client));
        }

        let default = entries
            .get(&TemplateName::default_template())
            .cloned()
            .ok_or_else(|| InfraError::template_not_found(TemplateName::DEFAULT))?;

        Ok(TemplateRegistry { default, entries })
    }
}
