pub mod coherence;
pub mod embedding;
pub mod embedding_service;
pub mod essay_segmenter;
pub mod llm_service;
pub mod reasoning;
pub mod rubric_parser;

pub use coherence::{CoherenceAnalyzer, CoherenceSignals};
pub use embedding::EmbeddingService;
pub use embedding_service::OpenAiEmbeddingService;
pub use essay_segmenter::EssaySegmenter;
pub use llm_service::LlmService;
pub use reasoning::ReasoningService;
pub use rubric_parser::RubricParser;
