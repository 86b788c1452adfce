pub mod criterion_ctx;
pub mod criterion_flow;

pub use criterion_ctx::CriterionCtx;
pub use criterion_flow::CriterionFlow;
