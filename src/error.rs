use std::fmt;

/// 评估流水线错误类型
///
/// 错误恢复策略：只有分段错误会让整个请求失败，
/// 其余错误在最小单元内降级为结果中的诊断数据。
#[derive(Debug)]
pub enum EvalError {
    /// 文章分段错误（致命：下游全部依赖段落索引）
    Segmentation(SegmentationError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Segmentation(e) => write!(f, "分段错误: {}", e),
            EvalError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvalError::Segmentation(e) => Some(e),
            EvalError::Other(_) => None,
        }
    }
}

/// 文章分段错误
#[derive(Debug)]
pub enum SegmentationError {
    /// 段落切分调用失败
    SplitFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 主题提取调用失败
    ThemeFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 切分结果不含任何段落
    NoParagraphs,
}

impl fmt::Display for SegmentationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentationError::SplitFailed { source } => {
                write!(f, "段落切分失败: {}", source)
            }
            SegmentationError::ThemeFailed { source } => {
                write!(f, "主题提取失败: {}", source)
            }
            SegmentationError::NoParagraphs => {
                write!(f, "文章切分后不含任何段落")
            }
        }
    }
}

impl std::error::Error for SegmentationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentationError::SplitFailed { source }
            | SegmentationError::ThemeFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            SegmentationError::NoParagraphs => None,
        }
    }
}

// ========== 便捷构造函数 ==========

impl EvalError {
    /// 创建段落切分失败错误
    pub fn split_failed(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        EvalError::Segmentation(SegmentationError::SplitFailed {
            source: source.into(),
        })
    }

    /// 创建主题提取失败错误
    pub fn theme_failed(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        EvalError::Segmentation(SegmentationError::ThemeFailed {
            source: source.into(),
        })
    }

    /// 创建空段落错误
    pub fn no_paragraphs() -> Self {
        EvalError::Segmentation(SegmentationError::NoParagraphs)
    }

    /// 创建其他错误
    pub fn other(msg: impl Into<String>) -> Self {
        EvalError::Other(msg.into())
    }
}

// ========== Result 类型别名 ==========

/// 评估流水线结果类型
pub type EvalResult<T> = Result<T, EvalError>;
