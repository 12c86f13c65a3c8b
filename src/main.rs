//! medical-rag CLI 진입점

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // CLI 파싱 (--verbose가 로그 레벨을 결정)
    let cli = medical_rag::cli::Cli::parse();

    // 로깅 초기화 (stderr, RUST_LOG 우선)
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(medical_rag::cli::run(cli))
}
