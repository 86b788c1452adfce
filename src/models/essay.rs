use serde::{Deserialize, Serialize};

/// 文章中的一个段落
///
/// 段落顺序由分段器确定一次，下游不得重排：
/// "上一段"的上下文全部依赖 index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    /// 段落在文章中的位置（从 0 开始）
    pub index: usize,
    pub text: String,
}

impl Paragraph {
    /// 段落开头摘录，用于给后一段提供上下文
    pub fn excerpt(&self, max_chars: usize) -> String {
        crate::utils::logging::truncate_text(&self.text, max_chars)
    }
}

/// 单个段落的向量表示
///
/// 由连贯性分析器产出，对消费者只读
#[derive(Debug, Clone)]
pub struct ParagraphEmbedding {
    pub index: usize,
    pub vector: Vec<f32>,
}

/// 每篇文章构建一次的元分析
///
/// 所有准则评估共享同一份只读数据（Arc 共享，无消费者可变引用），
/// 因此热路径上不需要任何锁
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaAnalysis {
    /// 一句话主题
    pub theme: String,
    /// 段落序列（顺序有语义，不可重排）
    pub paragraphs: Vec<Paragraph>,
    /// 每个段落的主导主题特征编号，与 paragraphs 一一对应
    pub dominant_feature: Vec<usize>,
    /// 相邻段落对的低连贯性标记，长度 = paragraphs.len() - 1
    pub coherence_issues: Vec<bool>,
    /// 相邻段落相似度的算术平均（不足两段时为 0）
    pub average_coherence: f64,
}

impl MetaAnalysis {
    /// 取某段落之前一对段落的低连贯性标记
    ///
    /// 第 0 段没有"上一段"，返回 None
    pub fn issue_before(&self, paragraph_index: usize) -> Option<bool> {
        if paragraph_index == 0 {
            None
        } else {
            self.coherence_issues.get(paragraph_index - 1).copied()
        }
    }

    /// 低连贯性段落对的序号列表（pair i = 段落 i 与 i+1 之间）
    pub fn issue_pairs(&self) -> Vec<usize> {
        self.coherence_issues
            .iter()
            .enumerate()
            .filter(|(_, flagged)| **flagged)
            .map(|(i, _)| i)
            .collect()
    }
}
