mod cli;

use clap::Parser;

use crate::cli::{run_cli, CliArgs};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 日志写 stderr，stdout 只留给 JSON
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    let success = rt.block_on(run_cli(args))?;
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
