use serde::{Deserialize, Serialize};

/// 单个（准则 × 段落）的评分结论
///
/// `score == None` 当且仅当该次评估调用失败或返回无法解析，
/// 此时 feedback 携带诊断信息而不是评语
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphVerdict {
    pub paragraph_index: usize,
    pub criterion_name: String,
    pub score: Option<f64>,
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ParagraphVerdict {
    /// 评估失败时的降级结论
    ///
    /// 段落绝不从结果集中消失，聚合阶段依赖位置完整性
    pub fn degraded(
        paragraph_index: usize,
        criterion_name: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            paragraph_index,
            criterion_name: criterion_name.into(),
            score: None,
            feedback: diagnostic.into(),
            suggestions: Vec::new(),
        }
    }
}

/// LLM 返回的段落评分原始结构
///
/// 与 ParagraphVerdict 分开：这里是对方的输出格式，
/// 字段都可能缺失，转换时再校验
#[derive(Debug, Clone, Deserialize)]
pub struct RawVerdict {
    #[serde(default)]
    pub paragraph: Option<usize>,
    #[serde(default)]
    pub criterion: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// 单个准则的最终结论
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion_name: String,
    /// 该准则下成功段落分数的算术平均（原始量表），全部降级时为 None
    pub overall_score: Option<f64>,
    /// 准则量表的最高分，供展示层换算百分比
    pub max_score: f64,
    /// 聚合评语（定性文本，不含数字分数）
    pub summary_feedback: String,
}

impl CriterionResult {
    /// 聚合失败时的降级结论
    pub fn degraded(criterion_name: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            criterion_name: criterion_name.into(),
            overall_score: None,
            max_score: 0.0,
            summary_feedback: diagnostic.into(),
        }
    }
}

impl std::fmt::Display for CriterionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let preview = crate::utils::logging::truncate_text(&self.summary_feedback, 80);
        match self.overall_score {
            Some(score) => write!(f, "{} [{:.1}/{}] {}", self.criterion_name, score, self.max_score, preview),
            None => write!(f, "{} [无分数] {}", self.criterion_name, preview),
        }
    }
}

/// 评估终产物
///
/// results 按完成顺序排列，与评分标准中的准则顺序无关，
/// 这是有意保留的非确定性
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub results: Vec<CriterionResult>,
}

impl EvaluationReport {
    /// 带有效分数的准则数量
    pub fn scored_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.overall_score.is_some())
            .count()
    }
}
