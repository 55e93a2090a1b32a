use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{MemoriaError, Result};

pub const DEFAULT_PORT: u16 = 8019;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const MAX_PROFILE_CONFIG_BYTES: usize = 65_535;

/// A single allowed sub-topic under a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTopicSpec {
    pub name: String,
    pub description: Option<String>,
    pub update_description: Option<String>,
    #[serde(default)]
    pub validate_value: Option<bool>,
}

impl SubTopicSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: crate::types::normalize_attr(&name.into()),
            description: None,
            update_description: None,
            validate_value: None,
        }
    }
}

/// A topic and its allowed sub-topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSpec {
    pub topic: String,
    pub description: Option<String>,
    #[serde(default)]
    pub sub_topics: Vec<SubTopicSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTagSpec {
    pub name: String,
    pub description: Option<String>,
}

/// Per-project profile configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectProfileConfig {
    pub language: Option<String>,
    pub strict_mode: Option<bool>,
    pub validate_mode: Option<bool>,
    #[serde(default)]
    pub additional_user_profiles: Vec<TopicSpec>,
    pub overwrite_user_profiles: Option<Vec<TopicSpec>>,
    #[serde(default)]
    pub event_tags: Vec<EventTagSpec>,
    pub enable_event_summary: Option<bool>,
}

impl ProjectProfileConfig {
    /// Parse and size-validate a project's stored `profile_config` JSON
    /// column.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() > MAX_PROFILE_CONFIG_BYTES {
            return Err(MemoriaError::BadRequest(format!(
                "profile_config exceeds {} bytes",
                MAX_PROFILE_CONFIG_BYTES
            )));
        }
        serde_json::from_str(raw)
            .map_err(|e| MemoriaError::BadRequest(format!("invalid profile_config: {e}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Root token bypasses project scoping entirely.
    pub root_token: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            root_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "./memoria.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAi,
    Jina,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub llm_api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default)]
    pub embedding_provider: Option<EmbeddingProvider>,
    pub embedding_api_key: Option<String>,
    #[serde(default = "default_jina_base_url")]
    pub embedding_base_url: String,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_jina_base_url() -> String {
    "https://api.jina.ai".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_base_url: default_llm_base_url(),
            embedding_provider: None,
            embedding_api_key: None,
            embedding_base_url: default_jina_base_url(),
        }
    }
}

/// Top-level process configuration (TOML file + `MEMORIA_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoriaConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_best_model")]
    pub best_llm_model: String,
    #[serde(default = "default_summary_model")]
    pub summary_llm_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_embedding_max_tokens")]
    pub embedding_max_token_size: usize,
    #[serde(default)]
    pub enable_event_embedding: bool,

    #[serde(default = "default_buffer_flush_interval")]
    pub buffer_flush_interval: i64,
    #[serde(default = "default_max_buffer_tokens")]
    pub max_chat_blob_buffer_token_size: usize,
    #[serde(default = "default_max_profile_subtopics")]
    pub max_profile_subtopics: usize,
    #[serde(default = "default_max_pre_profile_tokens")]
    pub max_pre_profile_token_size: usize,
    #[serde(default = "default_cache_ttl")]
    pub cache_user_profiles_ttl: i64,
    #[serde(default)]
    pub persistent_chat_blobs: bool,
    #[serde(default = "default_timezone")]
    pub use_timezone: String,

    #[serde(default)]
    pub profile_strict_mode: bool,
    #[serde(default)]
    pub profile_validate_mode: bool,
    #[serde(default)]
    pub additional_user_profiles: Vec<TopicSpec>,
    pub overwrite_user_profiles: Option<Vec<TopicSpec>>,
    #[serde(default)]
    pub event_tags: Vec<EventTagSpec>,
    #[serde(default = "default_tab_separator")]
    pub llm_tab_separator: String,
    #[serde(default)]
    pub enable_event_summary: bool,
    #[serde(default = "default_min_event_summary_tokens")]
    pub minimum_chats_token_size_for_event_summary: usize,
    pub telemetry_deployment_environment: Option<String>,

    #[serde(default = "default_user_lock_ttl")]
    pub user_lock_ttl_secs: u64,
    #[serde(default = "default_user_lock_wait")]
    pub user_lock_max_wait_secs: u64,
}

fn default_language() -> String {
    "en".to_string()
}
fn default_best_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_summary_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dim() -> usize {
    1536
}
fn default_embedding_max_tokens() -> usize {
    8192
}
fn default_buffer_flush_interval() -> i64 {
    3600
}
fn default_max_buffer_tokens() -> usize {
    1024
}
fn default_max_profile_subtopics() -> usize {
    15
}
fn default_max_pre_profile_tokens() -> usize {
    128
}
fn default_cache_ttl() -> i64 {
    1200
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_tab_separator() -> String {
    "::".to_string()
}
fn default_min_event_summary_tokens() -> usize {
    256
}
fn default_user_lock_ttl() -> u64 {
    128
}
fn default_user_lock_wait() -> u64 {
    32
}

impl Default for MemoriaConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            providers: ProvidersConfig::default(),
            language: default_language(),
            best_llm_model: default_best_model(),
            summary_llm_model: default_summary_model(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            embedding_max_token_size: default_embedding_max_tokens(),
            enable_event_embedding: false,
            buffer_flush_interval: default_buffer_flush_interval(),
            max_chat_blob_buffer_token_size: default_max_buffer_tokens(),
            max_profile_subtopics: default_max_profile_subtopics(),
            max_pre_profile_token_size: default_max_pre_profile_tokens(),
            cache_user_profiles_ttl: default_cache_ttl(),
            persistent_chat_blobs: false,
            use_timezone: default_timezone(),
            profile_strict_mode: false,
            profile_validate_mode: false,
            additional_user_profiles: Vec::new(),
            overwrite_user_profiles: None,
            event_tags: Vec::new(),
            llm_tab_separator: default_tab_separator(),
            enable_event_summary: false,
            minimum_chats_token_size_for_event_summary: default_min_event_summary_tokens(),
            telemetry_deployment_environment: None,
            user_lock_ttl_secs: default_user_lock_ttl(),
            user_lock_max_wait_secs: default_user_lock_wait(),
        }
    }
}

impl MemoriaConfig {
    /// Load config from a TOML file with `MEMORIA_*` env var overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut figment = Figment::from(figment::providers::Serialized::defaults(
            MemoriaConfig::default(),
        ));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("MEMORIA_").split("__"));
        figment
            .extract()
            .map_err(|e| MemoriaError::BadRequest(format!("config error: {e}")))
    }
}

/// The fields a request actually needs, after merging global defaults with
/// a project's `ProfileConfig`.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub language: String,
    pub strict_mode: bool,
    pub validate_mode: bool,
    pub topics: Vec<TopicSpec>,
    pub event_tags: Vec<EventTagSpec>,
    pub enable_event_summary: bool,
}

pub struct ConfigResolver;

impl ConfigResolver {
    /// Merge global defaults with a project's profile config.
    /// `overwrite_user_profiles` replaces the default topic list;
    /// `additional_user_profiles` appends to it.
    pub fn resolve(global: &MemoriaConfig, project: Option<&ProjectProfileConfig>) -> EffectiveConfig {
        let mut topics = global
            .overwrite_user_profiles
            .clone()
            .unwrap_or_else(|| global.additional_user_profiles.clone());

        let mut event_tags = global.event_tags.clone();
        let mut language = global.language.clone();
        let mut strict_mode = global.profile_strict_mode;
        let mut validate_mode = global.profile_validate_mode;
        let mut enable_event_summary = global.enable_event_summary;

        if let Some(p) = project {
            if let Some(ow) = &p.overwrite_user_profiles {
                topics = ow.clone();
            } else if !p.additional_user_profiles.is_empty() {
                topics.extend(p.additional_user_profiles.clone());
            }
            if !p.event_tags.is_empty() {
                event_tags = p.event_tags.clone();
            }
            if let Some(lang) = &p.language {
                language = lang.clone();
            }
            if let Some(s) = p.strict_mode {
                strict_mode = s;
            }
            if let Some(v) = p.validate_mode {
                validate_mode = v;
            }
            if let Some(e) = p.enable_event_summary {
                enable_event_summary = e;
            }
        }

        EffectiveConfig {
            language,
            strict_mode,
            validate_mode,
            topics,
            event_tags,
            enable_event_summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_falls_back_to_global_defaults() {
        let global = MemoriaConfig::default();
        let eff = ConfigResolver::resolve(&global, None);
        assert_eq!(eff.language, "en");
        assert!(!eff.strict_mode);
    }

    #[test]
    fn resolve_overwrite_replaces_additional_appends() {
        let mut global = MemoriaConfig::default();
        global.additional_user_profiles.push(TopicSpec {
            topic: "basic_info".into(),
            description: None,
            sub_topics: vec![SubTopicSpec::new("name")],
        });

        let mut proj = ProjectProfileConfig::default();
        proj.additional_user_profiles.push(TopicSpec {
            topic: "interest".into(),
            description: None,
            sub_topics: vec![SubTopicSpec::new("hobby")],
        });
        let eff = ConfigResolver::resolve(&global, Some(&proj));
        assert_eq!(eff.topics.len(), 2);

        proj.overwrite_user_profiles = Some(vec![TopicSpec {
            topic: "only_one".into(),
            description: None,
            sub_topics: vec![],
        }]);
        let eff2 = ConfigResolver::resolve(&global, Some(&proj));
        assert_eq!(eff2.topics.len(), 1);
        assert_eq!(eff2.topics[0].topic, "only_one");
    }

    #[test]
    fn profile_config_rejects_oversized_payload() {
        let huge = "x".repeat(MAX_PROFILE_CONFIG_BYTES + 1);
        assert!(ProjectProfileConfig::parse(&huge).is_err());
    }
}
