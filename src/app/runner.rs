use std::fmt;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::sync::Mutex;

use crate::app::tag_store::TagStore;
use crate::formats::{BuildSummary, TagIndex};
use crate::tagging::TagBuilder;

/// What asked for a cache build. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Startup,
    Scheduled,
    Manual,
    ReadThrough,
    Cli,
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Startup => "startup",
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
            Self::ReadThrough => "read_through",
            Self::Cli => "cli",
        };
        f.write_str(name)
    }
}

/// Single entry point for every tag cache build. Builds never overlap: a
/// caller that arrives while one is running waits for it to finish and then
/// runs its own.
pub struct RefreshRunner {
    builder: TagBuilder,
    guard: Mutex<()>,
}

impl RefreshRunner {
    pub fn new(builder: TagBuilder) -> Self {
        Self {
            builder,
            guard: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn TagStore> {
        self.builder.store()
    }

    pub async fn rebuild(
        &self,
        trigger: RefreshTrigger,
    ) -> anyhow::Result<(TagIndex, BuildSummary)> {
        let _guard = self.guard.lock().await;
        tracing::info!(%trigger, "tag cache refresh started");
        self.builder
            .build()
            .await
            .with_context(|| format!("{trigger} tag cache refresh"))
    }

    /// Like [`RefreshRunner::rebuild`], for fire-and-forget callers.
    pub async fn run(&self, trigger: RefreshTrigger) {
        match self.rebuild(trigger).await {
            Ok((_, summary)) => {
                tracing::info!(%trigger, tags = summary.tags, "tag cache refresh finished");
            }
            Err(err) => tracing::error!(%trigger, ?err, "tag cache refresh failed"),
        }
    }

    /// Returns the cached index, building it first when the cache is absent.
    pub async fn read_or_build(&self) -> anyhow::Result<TagIndex> {
        if let Some(index) = self.store().read_optional().await.context("read tag cache")? {
            return Ok(index);
        }

        let _guard = self.guard.lock().await;
        // A build may have finished while we waited.
        if let Some(index) = self.store().read_optional().await.context("read tag cache")? {
            return Ok(index);
        }

        tracing::info!(trigger = %RefreshTrigger::ReadThrough, "tag cache missing; building");
        let (index, _) = self
            .builder
            .build()
            .await
            .context("read_through tag cache refresh")?;
        Ok(index)
    }
}
