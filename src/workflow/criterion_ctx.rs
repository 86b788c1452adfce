//! 准则评估上下文
//!
//! 封装"我正在评估哪个准则"这一信息

use std::fmt::Display;

/// 准则评估上下文
#[derive(Debug, Clone)]
pub struct CriterionCtx {
    /// 准则在评分标准中的序号（从 1 开始，仅用于日志显示）
    pub criterion_index: usize,

    /// 准则名称
    pub criterion_name: String,

    /// 本篇文章的段落总数
    pub paragraph_count: usize,
}

impl CriterionCtx {
    /// 创建新的准则上下文
    pub fn new(criterion_index: usize, criterion_name: String, paragraph_count: usize) -> Self {
        Self {
            criterion_index,
            criterion_name,
            paragraph_count,
        }
    }
}

impl Display for CriterionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[准则 #{} {} 段落数#{}]",
            self.criterion_index, self.criterion_name, self.paragraph_count
        )
    }
}
