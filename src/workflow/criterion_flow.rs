//! 准则评估流程 - 流程层
//!
//! 核心职责：定义"一个准则"的完整评估流程
//!
//! 流程顺序：
//! 1. 段落扇出：每个段落一个受限并发任务，只评这一段、只评这一个准则
//! 2. 聚合扇入：所有段落结论（含降级结论）齐了之后发一次聚合调用
//!
//! 位置完整性是硬约束：段落任务失败记录为 `score = None` 的降级结论，
//! 绝不从结果集中消失，聚合调用永远收到全部 N 条结论。

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::models::essay::MetaAnalysis;
use crate::models::rubric::RubricCriterion;
use crate::models::verdict::{CriterionResult, ParagraphVerdict, RawVerdict};
use crate::services::reasoning::ReasoningService;
use crate::workflow::criterion_ctx::CriterionCtx;

const SYSTEM_PROMPT: &str =
    "You are an expert essay evaluator. Provide detailed, constructive feedback based on the given rubric.";

/// 段落响应的解析结果
///
/// 消费方必须同时处理两个分支，不允许对半解析的结构做字段猜测
enum VerdictParse {
    Parsed(RawVerdict),
    Unparsable(String),
}

/// 准则评估流程
///
/// - 编排单个准则的段落扇出与聚合扇入
/// - 不持有 MetaAnalysis（由编排层以 Arc 传入，只读共享）
/// - 只依赖推理能力（services）
pub struct CriterionFlow {
    reasoning: Arc<dyn ReasoningService>,
    max_concurrent_paragraphs: usize,
    temperature: f32,
    max_output_tokens: u32,
    verbose_logging: bool,
}

impl CriterionFlow {
    /// 创建新的准则评估流程
    pub fn new(reasoning: Arc<dyn ReasoningService>, config: &Config) -> Self {
        Self {
            reasoning,
            max_concurrent_paragraphs: config.max_concurrent_paragraphs,
            temperature: config.llm_temperature,
            max_output_tokens: config.llm_max_output_tokens,
            verbose_logging: config.verbose_logging,
        }
    }

    /// 评估单个准则
    ///
    /// 永远产出一个 CriterionResult；聚合失败时 summary_feedback
    /// 是诊断信息，但段落均分仍然保留
    pub async fn evaluate(
        &self,
        criterion: &RubricCriterion,
        meta: &Arc<MetaAnalysis>,
        ctx: &CriterionCtx,
    ) -> Result<CriterionResult> {
        info!(
            "[准则 {}] 开始评估: {} ({} 个段落)",
            ctx.criterion_index, ctx.criterion_name, ctx.paragraph_count
        );

        // ========== 阶段 1: 段落扇出 ==========
        let verdicts = self.evaluate_paragraphs(criterion, meta, ctx).await?;

        if self.verbose_logging {
            self.log_verdicts(ctx.criterion_index, &verdicts);
        }

        let failed = verdicts.iter().filter(|v| v.score.is_none()).count();
        if failed > 0 {
            warn!(
                "[准则 {}] ⚠️ {}/{} 个段落评估降级",
                ctx.criterion_index,
                failed,
                verdicts.len()
            );
        }

        // 段落均分在聚合之前算好，聚合失败也不丢
        let overall_score = mean_score(&verdicts);

        // ========== 阶段 2: 聚合扇入 ==========
        let summary_feedback = match self.aggregate(criterion, meta, &verdicts, ctx).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("[准则 {}] ❌ 聚合调用失败: {}", ctx.criterion_index, e);
                format!(
                    "Summary generation failed for criterion '{}': {}",
                    ctx.criterion_name, e
                )
            }
        };

        info!("[准则 {}] ✅ 评估完成", ctx.criterion_index);

        Ok(CriterionResult {
            criterion_name: criterion.name.clone(),
            overall_score,
            max_score: criterion.max_value(),
            summary_feedback,
        })
    }

    /// 阶段 1: 每个段落一个受限并发任务
    ///
    /// 返回值按段落索引排列，与完成顺序无关
    async fn evaluate_paragraphs(
        &self,
        criterion: &RubricCriterion,
        meta: &Arc<MetaAnalysis>,
        ctx: &CriterionCtx,
    ) -> Result<Vec<ParagraphVerdict>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_paragraphs));
        let mut handles = Vec::new();

        for paragraph in &meta.paragraphs {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("段落并发信号量已关闭")?;

            let user_prompt = build_paragraph_prompt(criterion, meta, paragraph.index);
            let reasoning = self.reasoning.clone();
            let criterion_name = criterion.name.clone();
            let min_value = criterion.min_value();
            let max_value = criterion.max_value();
            let paragraph_index = paragraph.index;
            let temperature = self.temperature;
            let max_output_tokens = self.max_output_tokens;

            let handle = tokio::spawn(async move {
                let _permit = permit;
                evaluate_paragraph(
                    reasoning,
                    user_prompt,
                    paragraph_index,
                    criterion_name,
                    min_value,
                    max_value,
                    temperature,
                    max_output_tokens,
                )
                .await
            });
            handles.push((paragraph_index, handle));
        }

        // handles 按段落顺序创建，逐个等待即可保持索引顺序；
        // 任务崩溃同样记录为降级结论，不丢段落
        let mut verdicts = Vec::with_capacity(handles.len());
        for (paragraph_index, handle) in handles {
            let verdict = match handle.await {
                Ok(verdict) => verdict,
                Err(e) => {
                    error!(
                        "[准则 {}] 段落 {} 任务执行失败: {}",
                        ctx.criterion_index, paragraph_index, e
                    );
                    ParagraphVerdict::degraded(
                        paragraph_index,
                        &ctx.criterion_name,
                        format!("paragraph evaluation task failed: {}", e),
                    )
                }
            };
            verdicts.push(verdict);
        }

        Ok(verdicts)
    }

    /// 阶段 2: 聚合调用
    async fn aggregate(
        &self,
        criterion: &RubricCriterion,
        meta: &Arc<MetaAnalysis>,
        verdicts: &[ParagraphVerdict],
        ctx: &CriterionCtx,
    ) -> Result<String> {
        info!("[准则 {}] 📤 正在聚合 {} 条段落结论...", ctx.criterion_index, verdicts.len());

        let user_prompt = build_aggregation_prompt(criterion, meta, verdicts)?;

        let response = self
            .reasoning
            .invoke(
                SYSTEM_PROMPT,
                &user_prompt,
                self.temperature,
                self.max_output_tokens,
                false,
            )
            .await?;

        // 结构性保证：评分已经在段落粒度完成，聚合文本必须保持定性
        let (summary, scrubbed) = scrub_score_tokens(&response);
        if scrubbed > 0 {
            warn!(
                "[准则 {}] ⚠️ 聚合文本中清除了 {} 处数字分数",
                ctx.criterion_index, scrubbed
            );
        }

        Ok(summary)
    }

    // ========== 日志辅助方法 ==========

    fn log_verdicts(&self, criterion_index: usize, verdicts: &[ParagraphVerdict]) {
        for verdict in verdicts {
            info!(
                "[准则 {}]   段落 {}: 分数 {:?}, {}",
                criterion_index,
                verdict.paragraph_index,
                verdict.score,
                crate::utils::logging::truncate_text(&verdict.feedback, 60)
            );
        }
    }
}

/// 单个段落的评估调用
///
/// 永远返回一个结论：调用失败或解析失败都降级为 `score = None`
async fn evaluate_paragraph(
    reasoning: Arc<dyn ReasoningService>,
    user_prompt: String,
    paragraph_index: usize,
    criterion_name: String,
    min_value: f64,
    max_value: f64,
    temperature: f32,
    max_output_tokens: u32,
) -> ParagraphVerdict {
    let response = match reasoning
        .invoke(SYSTEM_PROMPT, &user_prompt, temperature, max_output_tokens, true)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!("段落 {} 评估调用失败: {}", paragraph_index, e);
            return ParagraphVerdict::degraded(
                paragraph_index,
                criterion_name,
                format!("paragraph evaluation call failed: {}", e),
            );
        }
    };

    match parse_verdict_response(&response) {
        VerdictParse::Parsed(raw) => {
            to_verdict(raw, paragraph_index, criterion_name, min_value, max_value)
        }
        VerdictParse::Unparsable(raw) => {
            warn!(
                "段落 {} 评估响应无法解析: {}",
                paragraph_index,
                crate::utils::logging::truncate_text(&raw, 80)
            );
            ParagraphVerdict::degraded(
                paragraph_index,
                criterion_name,
                "paragraph evaluation returned unparsable output",
            )
        }
    }
}

/// 解析段落评估响应
///
/// 先整体解析；模型把 JSON 包进说明文字时截取首尾花括号再试
fn parse_verdict_response(response: &str) -> VerdictParse {
    if let Ok(raw) = serde_json::from_str::<RawVerdict>(response.trim()) {
        return VerdictParse::Parsed(raw);
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if end > start {
            if let Ok(raw) = serde_json::from_str::<RawVerdict>(&response[start..=end]) {
                return VerdictParse::Parsed(raw);
            }
        }
    }

    VerdictParse::Unparsable(response.to_string())
}

/// 把原始响应转为结论，校验索引与分数范围
fn to_verdict(
    raw: RawVerdict,
    expected_index: usize,
    criterion_name: String,
    min_value: f64,
    max_value: f64,
) -> ParagraphVerdict {
    if let Some(reported) = raw.paragraph {
        if reported != expected_index {
            // 位置完整性以调用方为准
            warn!(
                "段落索引不一致: 响应报告 {}, 实际 {}",
                reported, expected_index
            );
        }
    }

    let score = match raw.score {
        Some(s) if s < min_value || s > max_value => {
            warn!(
                "段落 {} 分数 {} 超出范围 [{}, {}]，裁剪",
                expected_index, s, min_value, max_value
            );
            Some(s.clamp(min_value, max_value))
        }
        Some(s) => Some(s),
        None => {
            debug!("段落 {} 响应缺少 score 字段", expected_index);
            return ParagraphVerdict::degraded(
                expected_index,
                criterion_name,
                "evaluation response did not include a score",
            );
        }
    };

    let feedback = match raw.feedback {
        Some(text) if !text.trim().is_empty() => text,
        _ => "(no feedback provided)".to_string(),
    };

    ParagraphVerdict {
        paragraph_index: expected_index,
        criterion_name,
        score,
        feedback,
        suggestions: raw.suggestions,
    }
}

/// 构建段落评估提示词
fn build_paragraph_prompt(
    criterion: &RubricCriterion,
    meta: &MetaAnalysis,
    paragraph_index: usize,
) -> String {
    let paragraph = &meta.paragraphs[paragraph_index];

    let previous_excerpt = if paragraph_index == 0 {
        "(this is the first paragraph)".to_string()
    } else {
        meta.paragraphs[paragraph_index - 1].excerpt(200)
    };

    let transition_flag = match meta.issue_before(paragraph_index) {
        None => "(not applicable)".to_string(),
        Some(true) => "yes".to_string(),
        Some(false) => "no".to_string(),
    };

    format!(
        r#"Score one paragraph of an essay against one rubric criterion.

CRITERION: {name}
SCORE LEVELS (highest to lowest):
{levels}

ESSAY THEME: {theme}

PARAGRAPH {index}:
{text}

CONTEXT:
- Dominant topical feature id of this paragraph: {feature}
- Previous paragraph excerpt: {excerpt}
- Transition from the previous paragraph flagged as low-coherence: {flag}

Score ONLY this paragraph against ONLY this criterion, on the criterion's scale ({min}-{max}).
Respond with a JSON object:
{{"paragraph": {index}, "criterion": "{name}", "score": <number>, "feedback": "<2-3 sentences>", "suggestions": ["<concrete improvement>"]}}"#,
        name = criterion.name,
        levels = format_levels(criterion),
        theme = meta.theme,
        index = paragraph_index,
        text = paragraph.text,
        feature = meta.dominant_feature.get(paragraph_index).copied().unwrap_or(0),
        excerpt = previous_excerpt,
        flag = transition_flag,
        min = criterion.min_value(),
        max = criterion.max_value(),
    )
}

/// 构建聚合提示词
fn build_aggregation_prompt(
    criterion: &RubricCriterion,
    meta: &MetaAnalysis,
    verdicts: &[ParagraphVerdict],
) -> Result<String> {
    let verdicts_json =
        serde_json::to_string_pretty(verdicts).context("无法序列化段落结论")?;

    let issue_pairs = meta.issue_pairs();
    let transitions = if issue_pairs.is_empty() {
        "none detected".to_string()
    } else {
        issue_pairs
            .iter()
            .map(|i| format!("between paragraphs {} and {}", i, i + 1))
            .collect::<Vec<_>>()
            .join("; ")
    };

    Ok(format!(
        r#"Write the final evaluation of an essay against one rubric criterion.

CRITERION: {name}
SCORE LEVELS (highest to lowest):
{levels}

ESSAY THEME: {theme}
AVERAGE COHERENCE: {coherence:.2}
LOW-COHERENCE TRANSITIONS: {transitions}

PER-PARAGRAPH VERDICTS (JSON):
{verdicts}

Write one cohesive feedback summary for this criterion:
- Judge the essay as a whole against the criterion's score levels above.
- Cite concrete phrases from at least two distinct paragraphs and give a rewritten alternative for each citation.
- A verdict with a null score means that paragraph's evaluation failed; weigh the remaining paragraphs instead.
- Do NOT include any numeric score or grade in the text. The summary must stay qualitative."#,
        name = criterion.name,
        levels = format_levels(criterion),
        theme = meta.theme,
        coherence = meta.average_coherence,
        transitions = transitions,
        verdicts = verdicts_json,
    ))
}

/// 档位列表的提示词片段
fn format_levels(criterion: &RubricCriterion) -> String {
    criterion
        .levels
        .iter()
        .map(|level| {
            if level.description.is_empty() {
                format!("- {} ({})", level.label, level.value)
            } else {
                format!("- {} ({}): {}", level.label, level.value, level.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 成功段落分数的算术平均
fn mean_score(verdicts: &[ParagraphVerdict]) -> Option<f64> {
    let scores: Vec<f64> = verdicts.iter().filter_map(|v| v.score).collect();
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

/// 清除聚合文本中的数字分数标记
///
/// 返回 (清理后文本, 清除数量)。匹配 "3/4"、"3 out of 4"、
/// "score: 3"、"$85$" 之类的独立分数标记
fn scrub_score_tokens(text: &str) -> (String, usize) {
    let patterns = [
        r"(?i)\b\d+(?:\.\d+)?\s*(?:/|out of)\s*\d+(?:\.\d+)?\b",
        r"(?i)\b(?:score|grade|rating)s?\s*(?:is|was|of|:|=)\s*\d+(?:\.\d+)?\b",
        r"\$\d+(?:\.\d+)?\$",
    ];

    let mut result = text.to_string();
    let mut scrubbed = 0;

    for pattern in patterns {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(_) => continue,
        };
        scrubbed += re.find_iter(&result).count();
        result = re.replace_all(&result, "").to_string();
    }

    (result, scrubbed)
}
