//! 评估流水线 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个评估的入口，负责准则层的扇出和资源管理。
//!
//! ## 核心功能
//!
//! 1. **服务构建**：从配置构建推理/向量客户端（测试可注入假实现）
//! 2. **元分析**：每个请求装配一次 MetaAnalysis，之后只读共享
//! 3. **并发控制**：使用 Semaphore 限制同时评估的准则数量
//! 4. **按完成顺序收集**：结果顺序跟随完成顺序，不跟随评分标准顺序
//! 5. **隔离降级**：单个准则彻底失败只降级该准则，不取消兄弟任务
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个准则的细节，委托 workflow::CriterionFlow
//! - **无跨任务可变共享**：唯一的共享可变状态是完成顺序的结果收集器

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{EvalError, EvalResult};
use crate::models::verdict::{CriterionResult, EvaluationReport};
use crate::orchestrator::meta_assembler::MetaAssembler;
use crate::services::{
    CoherenceAnalyzer, EmbeddingService, EssaySegmenter, LlmService, OpenAiEmbeddingService,
    ReasoningService, RubricParser,
};
use crate::utils::logging;
use crate::workflow::{CriterionCtx, CriterionFlow};

/// 评估流水线
pub struct EvaluationPipeline {
    config: Config,
    assembler: MetaAssembler,
    criterion_flow: Arc<CriterionFlow>,
}

impl EvaluationPipeline {
    /// 用真实客户端创建流水线
    pub fn new(config: Config) -> Self {
        let reasoning: Arc<dyn ReasoningService> = Arc::new(LlmService::new(&config));
        let embeddings: Arc<dyn EmbeddingService> = Arc::new(OpenAiEmbeddingService::new(&config));
        Self::with_services(config, reasoning, embeddings)
    }

    /// 用注入的服务创建流水线
    ///
    /// 测试用确定性假实现替换远端客户端
    pub fn with_services(
        config: Config,
        reasoning: Arc<dyn ReasoningService>,
        embeddings: Arc<dyn EmbeddingService>,
    ) -> Self {
        let assembler = MetaAssembler::new(
            RubricParser::new(reasoning.clone(), &config),
            EssaySegmenter::new(reasoning.clone(), &config),
            CoherenceAnalyzer::new(embeddings, &config),
        );
        let criterion_flow = Arc::new(CriterionFlow::new(reasoning, &config));

        Self {
            config,
            assembler,
            criterion_flow,
        }
    }

    /// 评估一篇文章
    ///
    /// # 参数
    /// - `essay_text`: 已归一化的文章文本
    /// - `rubric_text`: 已归一化的评分标准文本
    ///
    /// # 返回
    /// 返回按完成顺序排列的评估报告；只有分段失败会返回错误
    pub async fn run(&self, essay_text: &str, rubric_text: &str) -> EvalResult<EvaluationReport> {
        logging::log_startup(
            self.config.max_concurrent_criteria,
            self.config.max_concurrent_paragraphs,
        );

        // 元分析每个请求只构建一次，所有准则任务只读共享
        let (criteria, meta) = self.assembler.assemble(essay_text, rubric_text).await?;

        let total = criteria.len();
        info!("📋 将评估 {} 个准则，最大并发 {}\n", total, self.config.max_concurrent_criteria);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_criteria));
        let mut tasks = FuturesUnordered::new();

        for (index, criterion) in criteria.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| EvalError::other(format!("准则并发信号量已关闭: {}", e)))?;

            let flow = self.criterion_flow.clone();
            let meta = meta.clone();
            let criterion_name = criterion.name.clone();
            let ctx = CriterionCtx::new(index + 1, criterion.name.clone(), meta.paragraphs.len());

            let handle = tokio::spawn(async move {
                let _permit = permit;
                flow.evaluate(&criterion, &meta, &ctx).await
            });
            tasks.push(async move { (index + 1, criterion_name, handle.await) });
        }

        // 完成顺序收集；单个准则失败降级为诊断结果，不影响兄弟准则
        let mut results = Vec::with_capacity(total);
        while let Some((criterion_index, criterion_name, joined)) = tasks.next().await {
            let result = match joined {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    error!("[准则 {}] ❌ 评估过程中发生错误: {}", criterion_index, e);
                    CriterionResult::degraded(
                        &criterion_name,
                        format!("criterion evaluation failed: {}", e),
                    )
                }
                Err(e) => {
                    error!("[准则 {}] 任务执行失败: {}", criterion_index, e);
                    CriterionResult::degraded(
                        &criterion_name,
                        format!("criterion evaluation task failed: {}", e),
                    )
                }
            };
            results.push(result);
        }

        let report = EvaluationReport { results };
        logging::print_final_stats(
            report.scored_count(),
            report.results.len() - report.scored_count(),
            report.results.len(),
        );

        Ok(report)
    }
}
