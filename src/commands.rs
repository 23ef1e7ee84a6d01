use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::app::runner::{RefreshRunner, RefreshTrigger};
use crate::app::tag_store::{LocalFsTagStore, TagStore as _};
use crate::cli::{RebuildTagsArgs, SearchArgs, TagsArgs};
use crate::config::Settings;
use crate::corpus;
use crate::tagging::{TagBuilder, TagBuilderConfig};

pub fn search(args: SearchArgs) -> anyhow::Result<()> {
    let rows = corpus::search(&args.resources, &args.query).context("search corpus")?;

    let mut out = std::io::stdout().lock();
    if args.links {
        for link in corpus::unique_links(&rows) {
            writeln!(out, "{link}").context("write stdout")?;
        }
    } else {
        for row in &rows {
            serde_json::to_writer(&mut out, row).context("encode row")?;
            writeln!(out).context("write stdout")?;
        }
    }
    Ok(())
}

pub async fn rebuild_tags(args: RebuildTagsArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env().context("load settings")?;
    let generator = Arc::new(settings.gemini_client()?);
    let store = Arc::new(LocalFsTagStore::new(&args.cache));

    let config = TagBuilderConfig {
        corpus_dir: args.resources,
        model: settings.tag_model.clone(),
        batch_size: args.batch_size.unwrap_or(settings.batch_size).max(1),
        batch_delay: args
            .batch_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(settings.batch_delay),
    };
    let runner = RefreshRunner::new(TagBuilder::new(generator, store, config));

    let (_, summary) = runner.rebuild(RefreshTrigger::Cli).await?;
    println!(
        "{}",
        serde_json::to_string(&summary).context("encode summary")?
    );
    Ok(())
}

pub async fn tags(args: TagsArgs) -> anyhow::Result<()> {
    let index = LocalFsTagStore::new(&args.cache)
        .read()
        .await
        .context("read tag cache")?;

    if args.names {
        let mut out = std::io::stdout().lock();
        for tag in index.tags() {
            writeln!(out, "{tag}").context("write stdout")?;
        }
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(&index).context("encode tag cache")?
        );
    }
    Ok(())
}
