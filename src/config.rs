use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时评估的准则数量
    pub max_concurrent_criteria: usize,
    /// 单个准则内同时评估的段落数量
    pub max_concurrent_paragraphs: usize,
    /// 上下文向量的平滑系数（偏向历史）
    pub context_alpha: f32,
    /// 相邻段落连贯性告警阈值
    pub coherence_threshold: f32,
    /// 主题特征的潜在成分数量
    pub latent_components: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_output_tokens: u32,
    // --- Embedding API 配置 ---
    pub embedding_api_key: String,
    pub embedding_api_base_url: String,
    pub embedding_model_name: String,
    pub embedding_context_model_name: String,
    pub embedding_dimensions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_criteria: 10,
            max_concurrent_paragraphs: 5,
            context_alpha: 0.7,
            coherence_threshold: 0.5,
            latent_components: 5,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_temperature: 0.3,
            llm_max_output_tokens: 1024,
            embedding_api_key: String::new(),
            embedding_api_base_url: "https://api.openai.com/v1".to_string(),
            embedding_model_name: "text-embedding-3-small".to_string(),
            embedding_context_model_name: "text-embedding-3-large".to_string(),
            embedding_dimensions: 256,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_criteria: std::env::var("MAX_CONCURRENT_CRITERIA").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_criteria),
            max_concurrent_paragraphs: std::env::var("MAX_CONCURRENT_PARAGRAPHS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_paragraphs),
            context_alpha: std::env::var("CONTEXT_ALPHA").ok().and_then(|v| v.parse().ok()).unwrap_or(default.context_alpha),
            coherence_threshold: std::env::var("COHERENCE_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.coherence_threshold),
            latent_components: std::env::var("LATENT_COMPONENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.latent_components),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_temperature: std::env::var("LLM_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_temperature),
            llm_max_output_tokens: std::env::var("LLM_MAX_OUTPUT_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_max_output_tokens),
            embedding_api_key: std::env::var("EMBEDDING_API_KEY").or_else(|_| std::env::var("LLM_API_KEY")).unwrap_or(default.embedding_api_key),
            embedding_api_base_url: std::env::var("EMBEDDING_API_BASE_URL").unwrap_or(default.embedding_api_base_url),
            embedding_model_name: std::env::var("EMBEDDING_MODEL_NAME").unwrap_or(default.embedding_model_name),
            embedding_context_model_name: std::env::var("EMBEDDING_CONTEXT_MODEL_NAME").unwrap_or(default.embedding_context_model_name),
            embedding_dimensions: std::env::var("EMBEDDING_DIMENSIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.embedding_dimensions),
        }
    }

    /// 从 TOML 文件加载配置
    ///
    /// 文件中缺省的字段使用默认值
    pub async fn from_toml_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;

        Ok(config)
    }
}
