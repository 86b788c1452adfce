pub mod essay;
pub mod rubric;
pub mod verdict;

pub use essay::{MetaAnalysis, Paragraph, ParagraphEmbedding};
pub use rubric::{RubricCriterion, ScoreLevel};
pub use verdict::{CriterionResult, EvaluationReport, ParagraphVerdict, RawVerdict};
