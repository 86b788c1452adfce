//! 文章分段 - 业务能力层
//!
//! 两个相互独立的推理调用：段落切分和主题提取。
//! 分段是强制步骤，任一调用失败都让整个请求失败——
//! 下游所有评估都以段落索引为准，没有段落就没有可评的对象。

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{EvalError, EvalResult};
use crate::models::essay::Paragraph;
use crate::services::reasoning::ReasoningService;

const SYSTEM_PROMPT: &str =
    "You are an expert essay evaluator. Provide detailed, constructive feedback based on the given rubric.";

/// 文章分段器
pub struct EssaySegmenter {
    reasoning: Arc<dyn ReasoningService>,
    temperature: f32,
    max_output_tokens: u32,
}

impl EssaySegmenter {
    /// 创建新的分段器
    pub fn new(reasoning: Arc<dyn ReasoningService>, config: &Config) -> Self {
        Self {
            reasoning,
            temperature: config.llm_temperature,
            max_output_tokens: config.llm_max_output_tokens,
        }
    }

    /// 把文章切分为（主题，有序段落列表）
    pub async fn segment(&self, essay_text: &str) -> EvalResult<(String, Vec<Paragraph>)> {
        // 两个调用没有共享输入，逻辑上并行
        let (split_result, theme_result) = tokio::join!(
            self.split_into_paragraphs(essay_text),
            self.extract_theme(essay_text),
        );

        let paragraphs = split_result.map_err(EvalError::split_failed)?;
        let theme = theme_result.map_err(EvalError::theme_failed)?;

        if paragraphs.is_empty() {
            return Err(EvalError::no_paragraphs());
        }

        info!(
            "✓ 分段完成: {} 个段落, 主题: {}",
            paragraphs.len(),
            crate::utils::logging::truncate_text(&theme, 60)
        );

        let paragraphs = paragraphs
            .into_iter()
            .enumerate()
            .map(|(index, text)| Paragraph { index, text })
            .collect();

        Ok((theme, paragraphs))
    }

    /// 段落切分调用
    async fn split_into_paragraphs(&self, essay_text: &str) -> Result<Vec<String>> {
        let user_prompt = format!(
            r#"Split the following essay into logical paragraphs, honoring topic shifts.

ESSAY:
{}

Return the paragraphs as a numbered list, one paragraph per line, in the original order:
1. <first paragraph>
2. <second paragraph>
Do not add commentary."#,
            essay_text
        );

        let response = self
            .reasoning
            .invoke(
                SYSTEM_PROMPT,
                &user_prompt,
                self.temperature,
                self.max_output_tokens,
                false,
            )
            .await
            .context("段落切分调用失败")?;

        let paragraphs = parse_numbered_list(&response);
        debug!("切分响应共 {} 行有效段落", paragraphs.len());

        Ok(paragraphs)
    }

    /// 主题提取调用
    async fn extract_theme(&self, essay_text: &str) -> Result<String> {
        let user_prompt = format!(
            r#"State the theme of the following essay in one single sentence.

ESSAY:
{}"#,
            essay_text
        );

        let theme = self
            .reasoning
            .invoke(SYSTEM_PROMPT, &user_prompt, self.temperature, 256, false)
            .await
            .context("主题提取调用失败")?;

        Ok(theme.trim().to_string())
    }
}

/// 解析编号列表
///
/// 只接受 "N. 内容" 形式的行，其余行静默丢弃
fn parse_numbered_list(response: &str) -> Vec<String> {
    let re = match Regex::new(r"^\s*\d+\.\s+(.+)$") {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };

    response
        .lines()
        .filter_map(|line| {
            re.captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|text| !text.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedReasoning {
        split: String,
        theme: String,
    }

    #[async_trait]
    impl ReasoningService for CannedReasoning {
        async fn invoke(&self, _: &str, user: &str, _: f32, _: u32, _: bool) -> Result<String> {
            if user.contains("numbered list") {
                Ok(self.split.clone())
            } else {
                Ok(self.theme.clone())
            }
        }
    }

    struct FailingReasoning;

    #[async_trait]
    impl ReasoningService for FailingReasoning {
        async fn invoke(&self, _: &str, _: &str, _: f32, _: u32, _: bool) -> Result<String> {
            anyhow::bail!("timeout")
        }
    }

    #[test]
    fn test_parse_numbered_list() {
        let response = "1. First paragraph.\n2. Second paragraph.\n3. Third paragraph.";
        let items = parse_numbered_list(response);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], "First paragraph.");
        assert_eq!(items[2], "Third paragraph.");
    }

    #[test]
    fn test_parse_numbered_list_drops_unnumbered_lines() {
        let response = "Here are the paragraphs:\n1. First.\n\nnote without number\n2. Second.";
        let items = parse_numbered_list(response);
        assert_eq!(items, vec!["First.".to_string(), "Second.".to_string()]);
    }

    #[tokio::test]
    async fn test_segment_preserves_order_and_indices() {
        let segmenter = EssaySegmenter::new(
            Arc::new(CannedReasoning {
                split: "1. Alpha.\n2. Beta.\n3. Gamma.".to_string(),
                theme: "An essay about letters.".to_string(),
            }),
            &Config::default(),
        );

        let (theme, paragraphs) = segmenter.segment("Alpha. Beta. Gamma.").await.expect("分段失败");

        assert_eq!(theme, "An essay about letters.");
        assert_eq!(paragraphs.len(), 3);
        for (i, p) in paragraphs.iter().enumerate() {
            assert_eq!(p.index, i);
        }
        assert_eq!(paragraphs[1].text, "Beta.");
    }

    #[tokio::test]
    async fn test_segment_failure_is_fatal() {
        let segmenter = EssaySegmenter::new(Arc::new(FailingReasoning), &Config::default());
        let result = segmenter.segment("essay").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_split_is_fatal() {
        let segmenter = EssaySegmenter::new(
            Arc::new(CannedReasoning {
                split: "no numbered lines here".to_string(),
                theme: "theme".to_string(),
            }),
            &Config::default(),
        );
        let result = segmenter.segment("essay").await;
        assert!(result.is_err());
    }
}
