//! 推理服务契约
//!
//! 评估流水线对远端推理服务的全部要求：结构化输入输出、
//! 可失败、可替换。测试中用确定性假实现替换真实客户端。

use anyhow::Result;
use async_trait::async_trait;

/// 推理服务（LLM 风格）
///
/// 调用可能因网络/超时/限流失败，失败建模为可恢复错误而不是崩溃。
/// 即使请求了结构化输出，调用方也必须防御性解析返回文本
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// 发送一次推理请求
    ///
    /// # 参数
    /// - `system_prompt`: 系统消息
    /// - `user_prompt`: 用户消息
    /// - `temperature`: 采样温度
    /// - `max_output_tokens`: 输出 token 上限
    /// - `structured`: 是否要求只返回结构化（JSON）输出
    ///
    /// # 返回
    /// 返回模型的响应文本
    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
        structured: bool,
    ) -> Result<String>;
}
