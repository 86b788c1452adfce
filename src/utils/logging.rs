/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// 通过 RUST_LOG 环境变量控制级别，默认 info。
/// 重复调用安全（测试中每个用例都可以调用）
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_criteria`: 准则层最大并发数
/// - `max_paragraphs`: 段落层最大并发数
pub fn log_startup(max_criteria: usize, max_paragraphs: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 开始评估 - 并发评分流水线");
    info!("📊 准则层最大并发数: {}", max_criteria);
    info!("📊 段落层最大并发数: {}", max_paragraphs);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `scored`: 带有效分数的准则数量
/// - `degraded`: 降级的准则数量
/// - `total`: 准则总数
pub fn print_final_stats(scored: usize, degraded: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部评估完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 有分数: {}/{}", scored, total);
    info!("❌ 降级: {}", degraded);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a very long sentence", 6), "a very...");
    }
}
