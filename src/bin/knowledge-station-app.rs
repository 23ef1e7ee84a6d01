use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use axum::response::Html;
use clap::Parser;
use tower_http::services::{ServeDir, ServeFile};

use knowledge_station::app::router::{AppState, router};
use knowledge_station::app::runner::RefreshRunner;
use knowledge_station::app::scheduler;
use knowledge_station::app::tag_store::LocalFsTagStore;
use knowledge_station::articles::ArticleTagger;
use knowledge_station::config::Settings;
use knowledge_station::gemini::TextGenerator;
use knowledge_station::tagging::{TagBuilder, TagBuilderConfig};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: SocketAddr,

    /// Directory holding the `.csv` corpus files.
    #[arg(long, default_value = "resources")]
    resources: PathBuf,

    /// Path of the tag cache.
    #[arg(long, default_value = "resources/cache/tags.json")]
    cache: PathBuf,

    /// Static web assets directory (serve if exists).
    #[arg(long, default_value = "web/dist")]
    web_dir: PathBuf,

    /// Do not rebuild the tag cache every day.
    #[arg(long)]
    no_scheduler: bool,

    /// Do not build the tag cache at startup when it is missing.
    #[arg(long)]
    no_startup_build: bool,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    knowledge_station::logging::init()?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting knowledge-station-app");

    let settings = Settings::from_env().context("load settings")?;
    let http = settings.http_client()?;
    let generator: Arc<dyn TextGenerator> = Arc::new(settings.gemini_client()?);

    let builder = TagBuilder::new(
        Arc::clone(&generator),
        Arc::new(LocalFsTagStore::new(&args.cache)),
        TagBuilderConfig {
            corpus_dir: args.resources.clone(),
            model: settings.tag_model.clone(),
            batch_size: settings.batch_size,
            batch_delay: settings.batch_delay,
        },
    );
    let runner = Arc::new(RefreshRunner::new(builder));

    if !args.no_startup_build {
        scheduler::spawn_startup_build(Arc::clone(&runner)).await?;
    }
    let refresh_scheduler = if args.no_scheduler {
        None
    } else {
        Some(
            scheduler::start_daily_refresh(Arc::clone(&runner), &settings.refresh_cron)
                .await?,
        )
    };

    let state = AppState {
        corpus_dir: args.resources,
        runner,
        tagger: ArticleTagger::new(
            http.clone(),
            Arc::clone(&generator),
            settings.chat_model.clone(),
        ),
        generator,
        http,
        chat_model: settings.chat_model,
        fast_model: settings.tag_model,
        pmc_base_url: settings.pmc_base_url,
    };

    let mut app = router(state);
    let web_index = args.web_dir.join("index.html");
    if web_index.exists() {
        let static_files = ServeDir::new(args.web_dir).not_found_service(ServeFile::new(web_index));
        app = app.fallback_service(static_files);
    } else {
        app = app.fallback(|| async {
            Html(
                r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>knowledge-station-app</title></head>
  <body>
    <h1>knowledge-station-app</h1>
    <p>web assets not found. Build the web client into <code>web/dist</code> or run a dev server.</p>
  </body>
</html>
"#,
            )
        });
    }

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("bind {}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    if let Some(mut refresh_scheduler) = refresh_scheduler {
        refresh_scheduler
            .shutdown()
            .await
            .context("stop refresh scheduler")?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
