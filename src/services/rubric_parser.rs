//! 评分标准解析 - 业务能力层
//!
//! 把自由文本的评分标准结构化为准则列表。
//! 提取失败永远不让请求失败：降级为兜底准则，
//! 让下游扇出在"空"评分标准上照常进行。

use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::rubric::{RubricCriterion, ScoreLevel};
use crate::services::reasoning::ReasoningService;

const SYSTEM_PROMPT: &str =
    "You are an expert essay evaluator. You convert grading rubrics into structured data exactly as written.";

/// LLM 返回的准则原始结构
#[derive(Debug, Deserialize)]
struct RawCriterion {
    name: String,
    #[serde(default)]
    levels: Vec<RawLevel>,
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    label: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    value: Option<f64>,
}

/// 评分标准解析器
pub struct RubricParser {
    reasoning: Arc<dyn ReasoningService>,
    temperature: f32,
    max_output_tokens: u32,
}

impl RubricParser {
    /// 创建新的解析器
    pub fn new(reasoning: Arc<dyn ReasoningService>, config: &Config) -> Self {
        Self {
            reasoning,
            temperature: config.llm_temperature,
            max_output_tokens: config.llm_max_output_tokens,
        }
    }

    /// 把评分标准文本解析为准则列表
    ///
    /// 调用失败或响应无法解析时返回兜底准则，不返回错误
    pub async fn parse(&self, rubric_text: &str) -> Vec<RubricCriterion> {
        let user_prompt = build_parse_prompt(rubric_text);

        let response = match self
            .reasoning
            .invoke(
                SYSTEM_PROMPT,
                &user_prompt,
                self.temperature,
                self.max_output_tokens,
                true,
            )
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("⚠️ 评分标准提取调用失败，使用兜底准则: {}", e);
                return vec![RubricCriterion::extraction_failed()];
            }
        };

        match parse_criteria_response(&response) {
            Some(raw) if !raw.is_empty() => {
                let criteria: Vec<RubricCriterion> =
                    raw.into_iter().map(normalize_criterion).collect();
                debug!("评分标准解析成功，共 {} 个准则", criteria.len());
                criteria
            }
            _ => {
                warn!(
                    "⚠️ 评分标准响应无法解析，使用兜底准则: {}",
                    crate::utils::logging::truncate_text(&response, 120)
                );
                vec![RubricCriterion::extraction_failed()]
            }
        }
    }
}

/// 构建解析提示词
fn build_parse_prompt(rubric_text: &str) -> String {
    format!(
        r#"Convert the following grading rubric into JSON.

RUBRIC:
{}

Return a JSON array where each element is one criterion:
[{{"name": "...", "levels": [{{"label": "...", "description": "...", "value": 4}}]}}]

Rules:
- Include ONLY criteria that appear as distinct rows or sections of the rubric above. Do not invent, merge or split criteria.
- List each criterion's score levels in the order they appear, highest first.
- "value" is the numeric score of the level; omit it if the rubric gives none."#,
        rubric_text
    )
}

/// 解析准则响应
///
/// 先尝试整体解析；模型偶尔会把 JSON 包在说明文字里，
/// 此时截取首尾方括号之间的内容再试一次
fn parse_criteria_response(response: &str) -> Option<Vec<RawCriterion>> {
    if let Ok(parsed) = serde_json::from_str::<Vec<RawCriterion>>(response.trim()) {
        return Some(parsed);
    }

    let start = response.find('[')?;
    let end = response.rfind(']')?;
    if end <= start {
        return None;
    }

    serde_json::from_str::<Vec<RawCriterion>>(&response[start..=end]).ok()
}

/// 归一化单个准则
///
/// 补齐缺失的数值并保证档位非空、数值互不相同
fn normalize_criterion(raw: RawCriterion) -> RubricCriterion {
    let mut levels = backfill_level_values(raw.levels);

    if levels.is_empty() {
        warn!("准则 '{}' 不含任何档位，补一个默认档位", raw.name);
        levels.push(ScoreLevel {
            label: "Unspecified".to_string(),
            description: String::new(),
            value: 1.0,
        });
    }

    RubricCriterion {
        name: raw.name,
        levels,
    }
}

/// 补齐档位数值
///
/// 优先级：显式 value > 标签中的数字 > 位置（最高档位分数最高）。
/// 补齐后若出现重复值，整体退回位置值，保证档位互不相同
fn backfill_level_values(raw_levels: Vec<RawLevel>) -> Vec<ScoreLevel> {
    let total = raw_levels.len();
    let digit_re = Regex::new(r"(\d+(?:\.\d+)?)").ok();

    let mut levels: Vec<ScoreLevel> = raw_levels
        .into_iter()
        .enumerate()
        .map(|(position, raw)| {
            let value = raw
                .value
                .or_else(|| {
                    digit_re
                        .as_ref()
                        .and_then(|re| re.find(&raw.label))
                        .and_then(|m| m.as_str().parse::<f64>().ok())
                })
                .unwrap_or((total - position) as f64);
            ScoreLevel {
                label: raw.label,
                description: raw.description,
                value,
            }
        })
        .collect();

    // 同一准则内档位数值必须互不相同
    let mut seen = Vec::new();
    let distinct = levels.iter().all(|l| {
        if seen.iter().any(|v: &f64| (v - l.value).abs() < f64::EPSILON) {
            false
        } else {
            seen.push(l.value);
            true
        }
    });

    if !distinct {
        warn!("档位数值出现重复，退回位置值");
        for (position, level) in levels.iter_mut().enumerate() {
            level.value = (total - position) as f64;
        }
    }

    levels
}
