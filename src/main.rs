//! Сервер матриц

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use matrix_proxy::service::{MatrixService, Server};
use matrix_proxy::ServerConfig;

/// Сервер именованных матриц
#[derive(Parser, Debug)]
#[command(name = "matrix_proxy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON-файл конфигурации
    #[arg(long)]
    config: Option<PathBuf>,

    /// Адрес для прослушивания, например 127.0.0.1:50051
    #[arg(long)]
    listen: Option<String>,

    /// Число потоков для ядер (0 - по числу CPU)
    #[arg(long)]
    threads: Option<usize>,

    /// Каталог для относительных путей загрузки
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(listen) = &args.listen {
        config.listen_addr = listen.clone();
    }
    if let Some(threads) = args.threads {
        config.kernel_threads = threads;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    config.apply_env();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args).context("Не удалось загрузить конфигурацию")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Некорректный уровень логирования")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    info!(?config, "starting matrix server");
    let service = MatrixService::from_config(&config)?;
    Server::new(config, Arc::new(service)).run().await
}
