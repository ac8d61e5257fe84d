use std::path::Path;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = novel_splitter::cli::Cli::parse();
    novel_splitter::logging::init(cli.log_file.as_deref().map(Path::new))
        .context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        novel_splitter::cli::Command::Split(args) => {
            let interrupts = novel_splitter::interrupt::Interrupts::install();
            novel_splitter::batch::run(args, interrupts)
                .await
                .context("split")?;
        }
        novel_splitter::cli::Command::Detect(args) => {
            novel_splitter::detect::run(args).context("detect")?;
        }
    }

    Ok(())
}
