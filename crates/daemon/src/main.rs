use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use blawg_daemon::ServiceConfig;

mod cli;

use cli::op::{Op, OpContext};
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = OpContext {
        config_path: cli.config.clone(),
    };

    // a broken config is reported by the command itself
    let log_level = ServiceConfig::load(ctx.config_path.as_deref())
        .map(|config| config.log_level)
        .unwrap_or_else(|_| "info".to_string());
    let _guard = init_tracing(&log_level);

    match cli.command {
        Command::Serve(op) => run(op, &ctx).await,
        Command::Sync(op) => run(op, &ctx).await,
        Command::Health(op) => run(op, &ctx).await,
        Command::Version(op) => run(op, &ctx).await,
    }
}

async fn run<O: Op>(op: O, ctx: &OpContext) -> anyhow::Result<()> {
    let output = op.execute(ctx).await?;
    println!("{}", output);
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(default_level: &str) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();

    guard
}
