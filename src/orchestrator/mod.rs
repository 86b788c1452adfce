//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责元分析装配和准则层扇出，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `evaluation_pipeline` - 评估流水线
//! - 构建/持有服务客户端
//! - 装配一次 MetaAnalysis
//! - 控制准则层并发数量（Semaphore）
//! - 按完成顺序收集结果，隔离降级失败的准则
//!
//! ### `meta_assembler` - 元分析装配器
//! - 并行运行评分标准解析与文章分段
//! - 对分段结果做连贯性分析
//! - 装配只读共享的 MetaAnalysis
//!
//! ## 层次关系
//!
//! ```text
//! evaluation_pipeline (处理 Vec<RubricCriterion>)
//!     ↓
//! workflow::CriterionFlow (处理单个 RubricCriterion × Vec<Paragraph>)
//!     ↓
//! services (能力层：rubric_parser / essay_segmenter / coherence / llm / embedding)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：pipeline 管准则扇出，meta_assembler 管前置装配
//! 2. **隔离继续**：除分段外任何失败都不取消兄弟任务
//! 3. **无业务逻辑**：只做调度和统计，不做具体评分判断

pub mod evaluation_pipeline;
pub mod meta_assembler;

// 重新导出主要类型
pub use evaluation_pipeline::EvaluationPipeline;
pub use meta_assembler::MetaAssembler;
