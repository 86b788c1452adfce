//! 连贯性分析 - 业务能力层
//!
//! 对有序段落序列计算三类信号：
//! - 相邻段落的余弦相似度与低连贯性标记
//! - 全文平均连贯性
//! - 每个段落的主导主题特征（按本篇文章拟合的线性降维，
//!   是相对信号，不是全局分类，每次请求重新计算）
//!
//! 远端只有 embedding 调用；单个段落取向量失败降级为零向量，
//! 绝不打乱段落索引对齐。

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::essay::{Paragraph, ParagraphEmbedding};
use crate::services::embedding::EmbeddingService;

/// 连贯性分析结果片段
///
/// dominant_feature 与段落一一对应；
/// coherence_issues 对齐相邻段落对（长度 = 段落数 - 1）
#[derive(Debug, Clone)]
pub struct CoherenceSignals {
    pub dominant_feature: Vec<usize>,
    pub coherence_issues: Vec<bool>,
    pub average_coherence: f64,
}

/// 连贯性分析器
pub struct CoherenceAnalyzer {
    embeddings: Arc<dyn EmbeddingService>,
    alpha: f32,
    issue_threshold: f32,
    latent_components: usize,
    dimensions: usize,
}

impl CoherenceAnalyzer {
    /// 创建新的分析器
    pub fn new(embeddings: Arc<dyn EmbeddingService>, config: &Config) -> Self {
        Self {
            embeddings,
            alpha: config.context_alpha,
            issue_threshold: config.coherence_threshold,
            latent_components: config.latent_components,
            dimensions: config.embedding_dimensions,
        }
    }

    /// 分析有序段落序列
    ///
    /// 逐段落顺序处理：上下文向量的平滑折叠依赖段落顺序
    pub async fn analyze(&self, paragraphs: &[Paragraph]) -> CoherenceSignals {
        let mut coherence_vecs: Vec<ParagraphEmbedding> = Vec::with_capacity(paragraphs.len());
        let mut combined: Vec<Vec<f32>> = Vec::with_capacity(paragraphs.len());
        let mut context: Option<Vec<f32>> = None;

        for paragraph in paragraphs {
            // (1) 连贯性比较用向量
            let compact = match self.embeddings.embed(&paragraph.text).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        "[段落 {}] ⚠️ 向量获取失败，使用零向量: {}",
                        paragraph.index, e
                    );
                    vec![0.0; self.dimensions]
                }
            };

            // (2) 大上下文表示，折叠进平滑上下文向量
            let context_raw = match self.embeddings.embed_with_context(&paragraph.text).await {
                Ok((_, ctx)) => ctx,
                Err(e) => {
                    warn!(
                        "[段落 {}] ⚠️ 上下文向量获取失败，使用零向量: {}",
                        paragraph.index, e
                    );
                    vec![0.0; self.dimensions]
                }
            };

            let smoothed = match &context {
                None => context_raw,
                Some(prev) => smooth(prev, &context_raw, self.alpha),
            };

            combined.push(elementwise_average(&compact, &smoothed));
            context = Some(smoothed);
            coherence_vecs.push(ParagraphEmbedding {
                index: paragraph.index,
                vector: compact,
            });
        }

        // 相邻段落相似度
        let mut similarities = Vec::new();
        let mut coherence_issues = Vec::new();
        for pair in coherence_vecs.windows(2) {
            let similarity = cosine_similarity(&pair[0].vector, &pair[1].vector);
            coherence_issues.push(similarity < self.issue_threshold);
            similarities.push(similarity);
        }

        let average_coherence = if similarities.is_empty() {
            0.0
        } else {
            similarities.iter().map(|s| *s as f64).sum::<f64>() / similarities.len() as f64
        };

        let dominant_feature = dominant_components(&combined, self.latent_components);
        debug!("主导特征分布: {:?}", dominant_feature);

        info!(
            "✓ 连贯性分析完成: 平均相似度 {:.3}, 低连贯过渡 {} 处",
            average_coherence,
            coherence_issues.iter().filter(|f| **f).count()
        );

        CoherenceSignals {
            dominant_feature,
            coherence_issues,
            average_coherence,
        }
    }
}

// ========== 向量运算 ==========

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// 余弦相似度
///
/// 任一向量为零向量时定义为 0（零向量来自降级的段落）
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let na = norm(a);
    let nb = norm(b);
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    dot(a, b) / (na * nb)
}

/// 指数平滑: alpha·prev + (1-alpha)·next
pub fn smooth(prev: &[f32], next: &[f32], alpha: f32) -> Vec<f32> {
    prev.iter()
        .zip(next)
        .map(|(p, n)| alpha * p + (1.0 - alpha) * n)
        .collect()
}

/// 逐元素平均
pub fn elementwise_average(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| (x + y) / 2.0).collect()
}

/// 中心化（逐维减去均值）
fn center_rows(rows: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let dims = rows.first().map(|r| r.len()).unwrap_or(0);
    let count = rows.len() as f32;
    let mut mean = vec![0.0; dims];
    for row in rows {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v / count;
        }
    }
    rows.iter()
        .map(|row| row.iter().zip(&mean).map(|(v, m)| v - m).collect())
        .collect()
}

/// 幂迭代提取前 count 个主成分（带收缩）
///
/// 数据规模是一篇文章的段落数，不值得引入完整的线性代数库
fn principal_components(rows: &[Vec<f32>], count: usize, iterations: usize) -> Vec<Vec<f32>> {
    let dims = rows.first().map(|r| r.len()).unwrap_or(0);
    if dims == 0 {
        return Vec::new();
    }

    let mut work: Vec<Vec<f32>> = rows.to_vec();
    let mut components = Vec::new();

    for _ in 0..count.min(dims) {
        // 确定性初始化，避免随机数导致结果不可复现
        let mut v = vec![1.0 / (dims as f32).sqrt(); dims];

        for _ in 0..iterations {
            let mut w = vec![0.0; dims];
            for row in &work {
                let projection = dot(row, &v);
                for (wj, rj) in w.iter_mut().zip(row) {
                    *wj += projection * rj;
                }
            }
            let n = norm(&w);
            if n <= f32::EPSILON {
                // 方差耗尽
                break;
            }
            for x in w.iter_mut() {
                *x /= n;
            }
            v = w;
        }

        // 收缩：去掉已提取方向上的分量
        for row in work.iter_mut() {
            let projection = dot(row, &v);
            for (rj, vj) in row.iter_mut().zip(&v) {
                *rj -= projection * vj;
            }
        }

        components.push(v);
    }

    components
}

/// 每行的主导成分编号（|投影| 最大者）
///
/// 不足两行或无成分时退化为全 0
pub fn dominant_components(rows: &[Vec<f32>], count: usize) -> Vec<usize> {
    let n = rows.len();
    if n < 2 || count == 0 {
        return vec![0; n];
    }

    let centered = center_rows(rows);
    let components = principal_components(&centered, count, 50);
    if components.is_empty() {
        return vec![0; n];
    }

    centered
        .iter()
        .map(|row| {
            let mut best = 0;
            let mut best_magnitude = f32::NEG_INFINITY;
            for (index, component) in components.iter().enumerate() {
                let magnitude = dot(row, component).abs();
                if magnitude > best_magnitude {
                    best_magnitude = magnitude;
                    best = index;
                }
            }
            best
        })
        .collect()
}
