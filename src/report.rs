//! 报告渲染
//!
//! 把评估报告渲染成前端使用的文本格式：
//! 每个准则一行 `**NAME:** n/100` 加 Feedback 块，
//! 整体分数用美元符号包裹（`OVERALL SCORE: $n$`），
//! 最后是强弱项汇总的 GENERAL FEEDBACK 段。
//!
//! 百分比换算：准则均分 / 准则最高分 × 100；
//! 75 分以上计为强项。没有有效分数的准则显示 N/A，
//! 不计入整体平均。

use crate::models::verdict::EvaluationReport;

/// 强项阈值（百分比）
const STRENGTH_THRESHOLD: f64 = 75.0;

/// 渲染评估报告
pub fn render_report(report: &EvaluationReport) -> String {
    let mut out = String::new();
    let mut percents: Vec<f64> = Vec::new();
    let mut strengths: Vec<&str> = Vec::new();
    let mut weaknesses: Vec<&str> = Vec::new();

    for result in &report.results {
        let percent = criterion_percent(result.overall_score, result.max_score);

        match percent {
            Some(p) => {
                out.push_str(&format!("**{}:** {}/100\n", result.criterion_name, p.round() as i64));
                percents.push(p);
                if p >= STRENGTH_THRESHOLD {
                    strengths.push(&result.criterion_name);
                } else {
                    weaknesses.push(&result.criterion_name);
                }
            }
            None => {
                out.push_str(&format!("**{}:** N/A\n", result.criterion_name));
                weaknesses.push(&result.criterion_name);
            }
        }
        out.push_str(&format!("Feedback: {}\n\n", result.summary_feedback));
    }

    let overall = if percents.is_empty() {
        0
    } else {
        (percents.iter().sum::<f64>() / percents.len() as f64).round() as i64
    };
    out.push_str(&format!("OVERALL SCORE: ${}$\n\n", overall));

    out.push_str("GENERAL FEEDBACK:\n");
    if !strengths.is_empty() {
        out.push_str(&format!("Strengths include {}. ", strengths.join(", ")));
    }
    if !weaknesses.is_empty() {
        out.push_str(&format!("Areas for improvement include {}.", weaknesses.join(", ")));
    }
    out.push('\n');

    out
}

/// 准则百分比分数
fn criterion_percent(overall_score: Option<f64>, max_score: f64) -> Option<f64> {
    let score = overall_score?;
    if max_score <= 0.0 {
        return None;
    }
    Some((score / max_score * 100.0).clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::verdict::CriterionResult;

    fn result(name: &str, score: Option<f64>, max: f64) -> CriterionResult {
        CriterionResult {
            criterion_name: name.to_string(),
            overall_score: score,
            max_score: max,
            summary_feedback: format!("Feedback for {}.", name),
        }
    }

    #[test]
    fn test_render_scores_and_overall() {
        let report = EvaluationReport {
            results: vec![
                result("Clarity", Some(4.0), 4.0),
                result("Evidence", Some(2.0), 4.0),
            ],
        };
        let text = render_report(&report);

        assert!(text.contains("**Clarity:** 100/100"));
        assert!(text.contains("**Evidence:** 50/100"));
        assert!(text.contains("OVERALL SCORE: $75$"));
        assert!(text.contains("Strengths include Clarity."));
        assert!(text.contains("Areas for improvement include Evidence."));
    }

    #[test]
    fn test_render_degraded_criterion_is_na() {
        let report = EvaluationReport {
            results: vec![
                result("Clarity", Some(3.0), 4.0),
                CriterionResult::degraded("Evidence", "aggregation failed"),
            ],
        };
        let text = render_report(&report);

        assert!(text.contains("**Evidence:** N/A"));
        // N/A 不计入整体平均: 3/4 = 75
        assert!(text.contains("OVERALL SCORE: $75$"));
    }

    #[test]
    fn test_render_empty_report() {
        let report = EvaluationReport { results: vec![] };
        let text = render_report(&report);
        assert!(text.contains("OVERALL SCORE: $0$"));
    }
}
