use anyhow::{Context, Result};
use std::path::Path;

use essay_rubric_eval::report::render_report;
use essay_rubric_eval::{Config, EvaluationPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    essay_rubric_eval::utils::logging::init();

    // 解析参数
    let mut args = std::env::args().skip(1);
    let (essay_path, rubric_path) = match (args.next(), args.next()) {
        (Some(essay), Some(rubric)) => (essay, rubric),
        _ => {
            anyhow::bail!("用法: essay_rubric_eval <essay.txt> <rubric.txt> [config.toml]")
        }
    };

    // 加载配置（可选第三个参数指定 TOML 配置文件）
    let config = match args.next() {
        Some(config_path) => Config::from_toml_file(Path::new(&config_path)).await?,
        None => Config::from_env(),
    };

    // 读取输入文本（文档到文本的转换由外部完成，这里只接受纯文本）
    let essay_text = tokio::fs::read_to_string(&essay_path)
        .await
        .with_context(|| format!("无法读取文章文件: {}", essay_path))?;
    let rubric_text = tokio::fs::read_to_string(&rubric_path)
        .await
        .with_context(|| format!("无法读取评分标准文件: {}", rubric_path))?;

    // 运行流水线并输出报告
    let pipeline = EvaluationPipeline::new(config);
    let report = pipeline.run(&essay_text, &rubric_text).await?;

    println!("{}", render_report(&report));

    Ok(())
}
