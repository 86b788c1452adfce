//! 流水线集成测试
//!
//! 用确定性的假服务驱动完整流水线，不依赖任何远端 API

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use essay_rubric_eval::report::render_report;
use essay_rubric_eval::services::{EmbeddingService, ReasoningService};
use essay_rubric_eval::{Config, EvaluationPipeline};

const TWO_CRITERIA_JSON: &str = r#"[
    {"name": "Clarity", "levels": [
        {"label": "4", "description": "Crystal clear"},
        {"label": "3", "description": "Mostly clear"},
        {"label": "2", "description": "Often unclear"},
        {"label": "1", "description": "Unclear"}
    ]},
    {"name": "Evidence", "levels": [
        {"label": "4", "description": "Strong sources"},
        {"label": "3", "description": "Adequate sources"},
        {"label": "2", "description": "Weak sources"},
        {"label": "1", "description": "No sources"}
    ]}
]"#;

const THREE_PARAGRAPH_SPLIT: &str = "1. First paragraph about the thesis.\n2. Second paragraph with supporting evidence.\n3. Third concluding paragraph.";

/// 按提示词路由的推理服务假实现
///
/// 记录聚合提示词，便于断言聚合调用收到了全部段落结论
struct ScriptedBackend {
    /// 评估调用（段落评分 + 聚合）全部失败
    fail_all_evaluations: bool,
    /// 段落提示词包含该子串时注入失败
    fail_paragraph_needle: Option<String>,
    /// 评分标准提取调用失败
    fail_rubric: bool,
    /// 段落切分调用失败
    fail_split: bool,
    /// 收到的聚合提示词
    aggregation_prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn happy() -> Self {
        Self {
            fail_all_evaluations: false,
            fail_paragraph_needle: None,
            fail_rubric: false,
            fail_split: false,
            aggregation_prompts: Mutex::new(Vec::new()),
        }
    }

    fn recorded_aggregations(&self) -> Vec<String> {
        self.aggregation_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningService for ScriptedBackend {
    async fn invoke(&self, _: &str, user: &str, _: f32, _: u32, _: bool) -> Result<String> {
        if user.contains("Convert the following grading rubric") {
            if self.fail_rubric {
                anyhow::bail!("rubric backend unavailable")
            }
            return Ok(TWO_CRITERIA_JSON.to_string());
        }

        if user.contains("numbered list") {
            if self.fail_split {
                anyhow::bail!("split backend unavailable")
            }
            return Ok(THREE_PARAGRAPH_SPLIT.to_string());
        }

        if user.contains("State the theme") {
            return Ok("The essay argues for structured writing.".to_string());
        }

        if user.contains("Score one paragraph") {
            if self.fail_all_evaluations {
                anyhow::bail!("evaluation backend unavailable")
            }
            if let Some(needle) = &self.fail_paragraph_needle {
                if user.contains(needle) {
                    anyhow::bail!("injected paragraph failure")
                }
            }
            return Ok(r#"{"paragraph": 0, "criterion": "Clarity", "score": 3, "feedback": "Reads well.", "suggestions": ["Vary openings."]}"#.to_string());
        }

        if user.contains("PER-PARAGRAPH VERDICTS") {
            self.aggregation_prompts
                .lock()
                .unwrap()
                .push(user.to_string());
            if self.fail_all_evaluations {
                anyhow::bail!("aggregation backend unavailable")
            }
            return Ok("The thesis phrase \"structured writing\" lands well, though \"supporting evidence\" in the second paragraph would be stronger as \"primary-source evidence\".".to_string());
        }

        anyhow::bail!("unexpected prompt: {}", user)
    }
}

/// 固定向量的假实现
struct FixedEmbeddings;

#[async_trait]
impl EmbeddingService for FixedEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 文本长度决定方向，保证确定性
        if text.len() % 2 == 0 {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        } else {
            Ok(vec![0.8, 0.6, 0.0, 0.0])
        }
    }

    async fn embed_with_context(&self, text: &str) -> Result<(Vec<f32>, Vec<f32>)> {
        let v = self.embed(text).await?;
        Ok((v.clone(), v))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding_dimensions = 4;
    config
}

fn pipeline_with(backend: Arc<ScriptedBackend>) -> EvaluationPipeline {
    EvaluationPipeline::with_services(test_config(), backend, Arc::new(FixedEmbeddings))
}

#[tokio::test]
async fn test_end_to_end_two_criteria_three_paragraphs() {
    let backend = Arc::new(ScriptedBackend::happy());
    let pipeline = pipeline_with(backend.clone());

    let report = pipeline
        .run("A three paragraph essay.", "Clarity and Evidence rubric.")
        .await
        .expect("流水线不应失败");

    // 每个准则一个结果，顺序跟随完成顺序
    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        assert!(
            result.criterion_name == "Clarity" || result.criterion_name == "Evidence",
            "意外的准则名: {}",
            result.criterion_name
        );
        assert_eq!(result.overall_score, Some(3.0));
        assert_eq!(result.max_score, 4.0);
        assert!(!result.summary_feedback.is_empty());
    }

    // 每个准则一次聚合调用，各自收到全部 3 条段落结论
    let aggregations = backend.recorded_aggregations();
    assert_eq!(aggregations.len(), 2);
    for prompt in &aggregations {
        for index in 0..3 {
            assert!(
                prompt.contains(&format!("\"paragraph_index\": {}", index)),
                "聚合提示词缺少段落 {}",
                index
            );
        }
    }

    // 渲染：3/4 = 75
    let text = render_report(&report);
    assert!(text.contains("**Clarity:** 75/100"));
    assert!(text.contains("OVERALL SCORE: $75$"));
}

#[tokio::test]
async fn test_always_failing_evaluations_still_produce_full_report() {
    let backend = Arc::new(ScriptedBackend {
        fail_all_evaluations: true,
        ..ScriptedBackend::happy()
    });
    let pipeline = pipeline_with(backend.clone());

    let report = pipeline
        .run("A three paragraph essay.", "Clarity and Evidence rubric.")
        .await
        .expect("评估调用失败不应让流水线失败");

    // 仍然是 2 个结果，而不是报错
    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        assert_eq!(result.overall_score, None);
        assert!(
            result.summary_feedback.contains("failed"),
            "降级结果应携带诊断信息: {}",
            result.summary_feedback
        );
    }

    // 聚合调用仍然收到了全部 3 条结论，且全部 score 为 null
    let aggregations = backend.recorded_aggregations();
    assert_eq!(aggregations.len(), 2);
    for prompt in &aggregations {
        assert_eq!(prompt.matches("\"score\": null").count(), 3);
    }
}

#[tokio::test]
async fn test_one_failed_paragraph_keeps_siblings_intact() {
    // 只匹配段落标题行，"上一段摘录"不会误触发
    let backend = Arc::new(ScriptedBackend {
        fail_paragraph_needle: Some("PARAGRAPH 1:".to_string()),
        ..ScriptedBackend::happy()
    });
    let pipeline = pipeline_with(backend.clone());

    let report = pipeline
        .run("A three paragraph essay.", "Clarity and Evidence rubric.")
        .await
        .expect("单段落失败不应让流水线失败");

    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        // 两个成功段落的均分仍然存在
        assert_eq!(result.overall_score, Some(3.0));
    }

    // 聚合调用收到全部 3 条结论：2 条完整 + 1 条降级
    for prompt in backend.recorded_aggregations() {
        assert_eq!(prompt.matches("\"paragraph_index\"").count(), 3);
        assert_eq!(prompt.matches("\"score\": null").count(), 1);
        assert_eq!(prompt.matches("\"score\": 3").count(), 2);
    }
}

#[tokio::test]
async fn test_segmentation_failure_is_fatal() {
    let backend = Arc::new(ScriptedBackend {
        fail_split: true,
        ..ScriptedBackend::happy()
    });
    let pipeline = pipeline_with(backend);

    let result = pipeline.run("essay", "rubric").await;
    assert!(result.is_err(), "分段失败必须让整个请求失败");
}

#[tokio::test]
async fn test_rubric_failure_degrades_to_sentinel_criterion() {
    let backend = Arc::new(ScriptedBackend {
        fail_rubric: true,
        ..ScriptedBackend::happy()
    });
    let pipeline = pipeline_with(backend);

    let report = pipeline
        .run("A three paragraph essay.", "unreadable rubric")
        .await
        .expect("评分标准失败应降级而不是报错");

    // 兜底准则照常走完整个评估流程
    assert_eq!(report.results.len(), 1);
    assert_eq!(
        report.results[0].criterion_name,
        essay_rubric_eval::models::rubric::EXTRACTION_FAILED_CRITERION
    );
}
