//! 元分析装配器 - 编排层
//!
//! ## 职责
//!
//! 1. **并行结构化**：评分标准解析与文章分段同时进行（无共享输入）
//! 2. **连贯性分析**：对分段结果计算向量信号
//! 3. **装配**：产出全部准则评估共享的只读 MetaAnalysis
//!
//! ## 失败策略
//!
//! - 分段失败对整个请求致命（没有段落就没有可评的对象）
//! - 评分标准失败降级为兜底准则，流水线照常评这一个伪准则

use std::sync::Arc;
use tracing::info;

use crate::error::EvalResult;
use crate::models::essay::MetaAnalysis;
use crate::models::rubric::RubricCriterion;
use crate::services::{CoherenceAnalyzer, EssaySegmenter, RubricParser};

/// 元分析装配器
pub struct MetaAssembler {
    rubric_parser: RubricParser,
    segmenter: EssaySegmenter,
    coherence: CoherenceAnalyzer,
}

impl MetaAssembler {
    /// 创建新的装配器
    pub fn new(
        rubric_parser: RubricParser,
        segmenter: EssaySegmenter,
        coherence: CoherenceAnalyzer,
    ) -> Self {
        Self {
            rubric_parser,
            segmenter,
            coherence,
        }
    }

    /// 装配（准则列表，元分析）
    ///
    /// MetaAnalysis 每个请求构建一次，之后以 Arc 只读共享，
    /// 任何消费者不得修改
    pub async fn assemble(
        &self,
        essay_text: &str,
        rubric_text: &str,
    ) -> EvalResult<(Vec<RubricCriterion>, Arc<MetaAnalysis>)> {
        info!("📁 开始结构化: 评分标准解析 + 文章分段");

        // 两者相互独立，并行执行；分段失败快速返回
        let (criteria, segmented) = tokio::join!(
            self.rubric_parser.parse(rubric_text),
            self.segmenter.segment(essay_text),
        );
        let (theme, paragraphs) = segmented?;

        info!(
            "✓ 结构化完成: {} 个准则, {} 个段落",
            criteria.len(),
            paragraphs.len()
        );

        // 连贯性分析依赖分段结果，只能在其后执行
        let signals = self.coherence.analyze(&paragraphs).await;

        let meta = MetaAnalysis {
            theme,
            paragraphs,
            dominant_feature: signals.dominant_feature,
            coherence_issues: signals.coherence_issues,
            average_coherence: signals.average_coherence,
        };

        Ok((criteria, Arc::new(meta)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::{EmbeddingService, ReasoningService};
    use anyhow::Result;
    use async_trait::async_trait;

    struct HappyReasoning;

    #[async_trait]
    impl ReasoningService for HappyReasoning {
        async fn invoke(&self, _: &str, user: &str, _: f32, _: u32, _: bool) -> Result<String> {
            if user.contains("Convert the following grading rubric") {
                Ok(r#"[{"name": "Clarity", "levels": [{"label": "4"}, {"label": "3"}, {"label": "2"}, {"label": "1"}]}]"#.to_string())
            } else if user.contains("numbered list") {
                Ok("1. One.\n2. Two.\n3. Three.".to_string())
            } else {
                Ok("A theme sentence.".to_string())
            }
        }
    }

    struct UnitEmbeddings;

    #[async_trait]
    impl EmbeddingService for UnitEmbeddings {
        async fn embed(&self, _: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_with_context(&self, _: &str) -> Result<(Vec<f32>, Vec<f32>)> {
            Ok((vec![1.0, 0.0], vec![1.0, 0.0]))
        }
    }

    fn assembler(reasoning: Arc<dyn ReasoningService>) -> MetaAssembler {
        let config = Config::default();
        MetaAssembler::new(
            RubricParser::new(reasoning.clone(), &config),
            EssaySegmenter::new(reasoning, &config),
            CoherenceAnalyzer::new(Arc::new(UnitEmbeddings), &config),
        )
    }

    #[tokio::test]
    async fn test_assemble_alignment() {
        let assembler = assembler(Arc::new(HappyReasoning));
        let (criteria, meta) = assembler
            .assemble("essay text", "rubric text")
            .await
            .expect("装配失败");

        assert_eq!(criteria.len(), 1);
        assert_eq!(meta.paragraphs.len(), 3);
        assert_eq!(meta.dominant_feature.len(), 3);
        assert_eq!(meta.coherence_issues.len(), 2);
        assert_eq!(meta.theme, "A theme sentence.");
    }

    #[tokio::test]
    async fn test_rubric_failure_degrades_segmentation_failure_is_fatal() {
        /// 评分标准调用失败、分段正常的假实现
        struct RubricFails;

        #[async_trait]
        impl ReasoningService for RubricFails {
            async fn invoke(&self, _: &str, user: &str, _: f32, _: u32, _: bool) -> Result<String> {
                if user.contains("Convert the following grading rubric") {
                    anyhow::bail!("rubric backend down")
                }
                HappyReasoning.invoke("", user, 0.0, 0, false).await
            }
        }

        let rubric_fails_assembler = assembler(Arc::new(RubricFails));
        let (criteria, meta) = rubric_fails_assembler
            .assemble("essay", "rubric")
            .await
            .expect("评分标准失败不应让装配失败");

        assert_eq!(criteria.len(), 1);
        assert_eq!(
            criteria[0].name,
            crate::models::rubric::EXTRACTION_FAILED_CRITERION
        );
        assert_eq!(meta.paragraphs.len(), 3);

        /// 分段调用失败的假实现
        struct SplitFails;

        #[async_trait]
        impl ReasoningService for SplitFails {
            async fn invoke(&self, _: &str, user: &str, _: f32, _: u32, _: bool) -> Result<String> {
                if user.contains("numbered list") {
                    anyhow::bail!("split backend down")
                }
                HappyReasoning.invoke("", user, 0.0, 0, false).await
            }
        }

        let assembler = assembler(Arc::new(SplitFails));
        assert!(assembler.assemble("essay", "rubric").await.is_err());
    }
}
