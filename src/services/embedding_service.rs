//! Embedding 服务 - 业务能力层
//!
//! 调用 OpenAI 兼容的 /embeddings 端点。
//! 紧凑模型产出连贯性比较用的向量，大上下文模型产出
//! 上下文平滑用的表示；两者请求同一维度，便于逐元素运算。

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::Config;
use crate::services::embedding::EmbeddingService;

/// Embedding API 客户端
pub struct OpenAiEmbeddingService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model_name: String,
    context_model_name: String,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingService {
    /// 创建新的 Embedding 服务
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.embedding_api_key.clone(),
            base_url: config.embedding_api_base_url.clone(),
            model_name: config.embedding_model_name.clone(),
            context_model_name: config.embedding_context_model_name.clone(),
            dimensions: config.embedding_dimensions,
        }
    }

    /// 调用一次 /embeddings
    async fn request_embedding(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        debug!("调用 Embedding API，模型: {}", model);

        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": model,
            "input": text,
            "dimensions": self.dimensions,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Embedding API 请求失败: {}", e);
                anyhow::anyhow!("Embedding API 请求失败: {}", e)
            })?
            .error_for_status()
            .map_err(|e| anyhow::anyhow!("Embedding API 返回错误状态: {}", e))?;

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("无法解析 Embedding API 响应")?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow::anyhow!("Embedding API 返回空结果"))?;

        if vector.len() != self.dimensions {
            warn!(
                "Embedding 维度与请求不符: 期望 {}, 实际 {}",
                self.dimensions,
                vector.len()
            );
        }

        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request_embedding(&self.model_name, text).await
    }

    async fn embed_with_context(&self, text: &str) -> Result<(Vec<f32>, Vec<f32>)> {
        // 两个模型相互独立，同时发出
        let (compact, context) = tokio::join!(
            self.request_embedding(&self.model_name, text),
            self.request_embedding(&self.context_model_name, text),
        );
        Ok((compact?, context?))
    }
}
