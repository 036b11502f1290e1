pub mod config;
pub mod content;
pub mod editor;
pub mod engine;
pub mod error;
pub mod i18n;
pub mod interpolate;
pub mod markup;
pub mod paint;
pub mod pdf;
pub mod record;
pub mod render;
pub mod scene;
pub mod schema;
pub mod server;
pub mod session;
pub mod store;
pub mod surface;
pub mod text;
pub mod visibility;
pub mod worker;

use crate::config::Config;
use crate::i18n::Catalog;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 启动本地 Agent：加载配置与语言包后在 tokio 运行时中启动 HTTP 服务
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = Config::load()?;
    let catalog = Arc::new(Catalog::builtin()?);
    tracing::info!(
        bind = %config.bind,
        output_dir = %config.output_dir.display(),
        locales = ?catalog.locales(),
        "configuration loaded"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::start_server(config, catalog))?;
    Ok(())
}
