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
    let _ = dotenvy::dotenv();
    knowledge_station::logging::init().context("init logging")?;

    let cli = knowledge_station::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        knowledge_station::cli::Command::Search(args) => {
            knowledge_station::commands::search(args).context("search")?;
        }
        knowledge_station::cli::Command::RebuildTags(args) => {
            knowledge_station::commands::rebuild_tags(args)
                .await
                .context("rebuild-tags")?;
        }
        knowledge_station::cli::Command::Tags(args) => {
            knowledge_station::commands::tags(args)
                .await
                .context("tags")?;
        }
    }

    Ok(())
}
