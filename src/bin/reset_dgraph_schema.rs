// 清空 DGraph 中的全部数据与 schema，然后重新应用完整 schema。
//
// Usage:
//   cargo run --bin reset_dgraph_schema -- [host] [port]
//
// 连接参数缺省时读取默认配置文件。

use anyhow::Context;
use graphrag_dgraph_import::config::AppConfig;
use graphrag_dgraph_import::repository::{open_store, GraphStore};
use graphrag_dgraph_import::{logging, schema};
use std::time::Instant;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = AppConfig::load(None).context("加载配置失败")?;
    logging::init(&config.logging.level, config.logging.json);

    let mut args = std::env::args().skip(1);
    if let Some(host) = args.next() {
        config.store.host = host;
    }
    if let Some(port) = args.next() {
        config.store.port = port
            .parse()
            .with_context(|| format!("非法端口: {}", port))?;
    }

    let started = Instant::now();
    info!(host = %config.store.host, port = config.store.port, "开始重置 DGraph schema");

    let store = open_store(&config.store).await?;
    reset(store.as_ref()).await?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "DGraph schema 已重置");
    Ok(())
}

/// 重置并关闭存储；关闭失败只告警，不覆盖重置结果
async fn reset(store: &dyn GraphStore) -> anyhow::Result<()> {
    let result = schema::initialize(store, schema::COMPLETE, true).await;
    if let Err(e) = &result {
        error!(error = %e, "重置 DGraph schema 失败");
    }

    if let Err(e) = store.close().await {
        warn!(error = %e, "关闭图存储失败");
    }
    Ok(result?)
}
