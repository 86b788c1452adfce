use serde::{Deserialize, Serialize};

/// 评分标准提取失败时的兜底准则名称
pub const EXTRACTION_FAILED_CRITERION: &str = "Rubric extraction failed";

/// 单个分数档位
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreLevel {
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub value: f64,
}

/// 单个评分准则
///
/// 由评分标准文本解析得到，档位按原文顺序保存，创建后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub name: String,
    pub levels: Vec<ScoreLevel>,
}

impl RubricCriterion {
    /// 准则的最低分
    pub fn min_value(&self) -> f64 {
        self.levels
            .iter()
            .map(|l| l.value)
            .fold(f64::INFINITY, f64::min)
    }

    /// 准则的最高分
    pub fn max_value(&self) -> f64 {
        self.levels
            .iter()
            .map(|l| l.value)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// 提取失败时的兜底准则
    ///
    /// 只有一个 0 分档位，让下游的扇出在"空"评分标准上照常进行，
    /// 而不是让整个请求失败
    pub fn extraction_failed() -> Self {
        Self {
            name: EXTRACTION_FAILED_CRITERION.to_string(),
            levels: vec![ScoreLevel {
                label: "Extraction failed".to_string(),
                description: "The rubric text could not be parsed into criteria.".to_string(),
                value: 0.0,
            }],
        }
    }
}

impl std::fmt::Display for RubricCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{} 档, {}-{}]",
            self.name,
            self.levels.len(),
            self.min_value(),
            self.max_value()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(values: &[f64]) -> RubricCriterion {
        RubricCriterion {
            name: "Clarity".to_string(),
            levels: values
                .iter()
                .map(|v| ScoreLevel {
                    label: format!("Level {}", v),
                    description: String::new(),
                    value: *v,
                })
                .collect(),
        }
    }

    #[test]
    fn test_min_max_value() {
        let c = criterion(&[4.0, 3.0, 2.0, 1.0]);
        assert_eq!(c.min_value(), 1.0);
        assert_eq!(c.max_value(), 4.0);
    }

    #[test]
    fn test_extraction_failed_sentinel() {
        let c = RubricCriterion::extraction_failed();
        assert_eq!(c.name, EXTRACTION_FAILED_CRITERION);
        assert_eq!(c.levels.len(), 1);
        assert_eq!(c.levels[0].value, 0.0);
    }
}
