//! LLM 服务 - 业务能力层
//!
//! 只负责"调用推理模型"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::services::reasoning::ReasoningService;

/// 结构化输出的收尾指令
///
/// 追加在用户消息末尾，让兼容端点在不支持 response_format
/// 参数时也只返回 JSON；调用方仍需防御性解析
const STRUCTURED_OUTPUT_SUFFIX: &str =
    "\n\nRespond with valid JSON only. Do not add commentary before or after the JSON.";

/// LLM 服务
///
/// 职责：
/// - 调用推理 API 并返回响应文本
/// - 不出现 Vec<Paragraph> / Vec<RubricCriterion>
/// - 不关心流程顺序
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
        }
    }
}

#[async_trait]
impl ReasoningService for LlmService {
    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
        structured: bool,
    ) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_prompt.len());

        // 构建消息列表
        let mut messages = Vec::new();

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()?;
        messages.push(ChatCompletionRequestMessage::System(system_msg));

        let user_content = if structured {
            format!("{}{}", user_prompt, STRUCTURED_OUTPUT_SUFFIX)
        } else {
            user_prompt.to_string()
        };

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_content)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(temperature)
            .max_tokens(max_output_tokens)
            .build()?;

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败: {}", e)
        })?;

        debug!("LLM API 调用成功");

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}
