//! 向量服务契约
//!
//! 假定对相同输入足够确定、无副作用；失败与推理服务同样
//! 建模为可恢复错误。

use anyhow::Result;
use async_trait::async_trait;

/// 向量服务
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// 获取固定维度的向量，用于段落间连贯性比较
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 获取向量及配套的大上下文表示
    ///
    /// 返回 `(compact, context)`，两者维度一致；
    /// context 供上下文向量的指数平滑折叠使用
    async fn embed_with_context(&self, text: &str) -> Result<(Vec<f32>, Vec<f32>)>;
}
