// ==========================================
// GraphRAG DGraph 导入工具 - 命令行入口
// ==========================================
// 退出码: 0 全部成功 / 1 有类别失败 / 2 配置、连接或 schema 致命错误
// ==========================================

use anyhow::Context;
use clap::Parser;
use graphrag_dgraph_import::config::{AppConfig, CategorySelection};
use graphrag_dgraph_import::domain::ConflictStrategy;
use graphrag_dgraph_import::repository::{open_store, GraphStore, StoreBackend};
use graphrag_dgraph_import::{logging, run_import, schema, VERSION};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "graphrag-dgraph-import",
    version,
    about = "将 GraphRAG 索引产物（parquet/CSV）导入 DGraph"
)]
struct Cli {
    /// GraphRAG 输出目录
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// DGraph Alpha 主机
    #[arg(long)]
    host: Option<String>,

    /// DGraph Alpha HTTP 端口
    #[arg(long)]
    port: Option<u16>,

    /// 存储后端: dgraph | sqlite
    #[arg(long)]
    store: Option<StoreBackend>,

    /// 本地图存储文件（--store sqlite）
    #[arg(long)]
    sqlite_path: Option<String>,

    /// 导入前清空全部 schema 与数据（随后重新应用 schema）
    #[arg(long)]
    drop_existing: bool,

    /// 导入前初始化 schema
    #[arg(long)]
    init_schema: bool,

    /// complete 或单个类别名
    #[arg(long)]
    schema_type: Option<String>,

    /// 每批记录数
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: Option<u64>,

    /// 导入类别（可多个，或 all）
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    types: Option<Vec<String>>,

    /// 冲突策略: upsert | insert | skip
    #[arg(long)]
    conflict: Option<ConflictStrategy>,

    /// 任一类别失败即停止（仅 --types all）
    #[arg(long)]
    fail_fast: bool,

    /// 连接错误最大重试次数
    #[arg(long)]
    max_retries: Option<u32>,

    /// TOML 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON 格式日志
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// 命令行参数覆盖配置文件
    fn apply(&self, config: &mut AppConfig) -> anyhow::Result<()> {
        if let Some(dir) = &self.data_dir {
            config.import.data_dir = dir.clone();
        }
        if let Some(host) = &self.host {
            config.store.host = host.clone();
        }
        if let Some(port) = self.port {
            config.store.port = port;
        }
        if let Some(backend) = self.store {
            config.store.backend = backend;
        }
        if let Some(path) = &self.sqlite_path {
            config.store.sqlite_path = path.clone();
        }
        if self.drop_existing {
            config.schema.drop_existing = true;
        }
        if self.init_schema {
            config.schema.init_schema = true;
        }
        if let Some(schema_type) = &self.schema_type {
            config.schema.schema_type = schema_type.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.import.batch_size = usize::try_from(batch_size).context("batch-size 超出范围")?;
        }
        if let Some(types) = &self.types {
            config.import.categories =
                CategorySelection::parse(types).map_err(anyhow::Error::msg)?;
        }
        if let Some(conflict) = self.conflict {
            config.import.conflict_strategy = conflict;
        }
        if self.fail_fast {
            config.import.fail_fast = true;
        }
        if let Some(max_retries) = self.max_retries {
            config.import.max_retries = max_retries;
        }
        if self.log_json {
            config.logging.json = true;
        }
        Ok(())
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("读取配置文件失败")?;
    cli.apply(&mut config)?;
    config.import.validate()?;
    schema::resolve_schema_type(&config.schema.schema_type)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("配置错误: {:#}", e);
            return ExitCode::from(2);
        }
    };

    logging::init(&config.logging.level, config.logging.json);
    info!(version = VERSION, backend = %config.store.backend, "GraphRAG DGraph 导入工具启动");

    match run(&config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("导入中止: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// # 返回
/// - Ok(true): 全部类别成功
/// - Ok(false): 存在失败类别
/// - Err: 致命错误
async fn run(config: &AppConfig) -> anyhow::Result<bool> {
    let store = open_store(&config.store)
        .await
        .with_context(|| format!("无法连接图存储 ({})", config.store.backend))?;

    let result = execute(store.as_ref(), config).await;

    if let Err(e) = store.close().await {
        warn!(error = %e, "关闭图存储失败");
    }
    result
}

async fn execute(store: &dyn GraphStore, config: &AppConfig) -> anyhow::Result<bool> {
    if config.schema.init_schema || config.schema.drop_existing {
        schema::initialize(store, &config.schema.schema_type, config.schema.drop_existing)
            .await
            .context("schema 初始化失败")?;
    }

    let report = run_import(store, &config.import).await?;

    for line in report.summary_lines() {
        println!("{}", line);
    }
    for category_report in report.categories.values() {
        for message in &category_report.errors {
            println!("[{}] {}", category_report.category, message);
        }
        if category_report.errors_truncated > 0 {
            println!(
                "[{}] ... 另有 {} 条错误未显示",
                category_report.category, category_report.errors_truncated
            );
        }
    }
    if report.halted_by_fail_fast {
        println!("fail-fast: 后续类别未执行");
    }

    Ok(!report.has_failures())
}
