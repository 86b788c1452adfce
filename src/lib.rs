//! # Essay Rubric Eval
//!
//! 按评分标准并发评估文章的 Rust 库
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 纯数据类型
//! - `RubricCriterion` / `ScoreLevel` - 结构化的评分标准
//! - `Paragraph` / `MetaAnalysis` - 分段与只读共享的元分析
//! - `ParagraphVerdict` / `CriterionResult` / `EvaluationReport` - 评估结论
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个单元
//! - `RubricParser` - 评分标准结构化能力（失败降级为兜底准则）
//! - `EssaySegmenter` - 分段与主题提取能力（失败对请求致命）
//! - `CoherenceAnalyzer` - 向量连贯性信号能力
//! - `LlmService` / `OpenAiEmbeddingService` - 远端客户端
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个准则"的完整评估流程
//! - `CriterionCtx` - 上下文封装（criterion_index + name）
//! - `CriterionFlow` - 流程编排（段落扇出 → 聚合扇入）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/meta_assembler` - 元分析装配器
//! - `orchestrator/evaluation_pipeline` - 评估流水线，管理服务与并发
//!
//! ## 并发模型
//!
//! 每个扇出点一个受限工作池（准则层默认 10，段落层默认 5），
//! 远端调用是唯一的挂起点。MetaAnalysis 构建一次后只读共享，
//! 热路径无锁；唯一的共享可变状态是各扇出点的结果收集器。
//! 失败策略是隔离降级而不是快速失败——只有文章分段例外。

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{EvalError, EvalResult};
pub use models::essay::{MetaAnalysis, Paragraph};
pub use models::rubric::{RubricCriterion, ScoreLevel};
pub use models::verdict::{CriterionResult, EvaluationReport, ParagraphVerdict};
pub use orchestrator::{EvaluationPipeline, MetaAssembler};
pub use report::render_report;
pub use services::{EmbeddingService, ReasoningService};
pub use workflow::{CriterionCtx, CriterionFlow};
