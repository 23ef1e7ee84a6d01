use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::app::runner::{RefreshRunner, RefreshTrigger};

/// Every day at 02:00 local time (`sec min hour day month weekday`).
pub const DEFAULT_REFRESH_CRON: &str = "0 0 2 * * *";

pub fn parse_schedule(expr: &str) -> anyhow::Result<Schedule> {
    expr.trim()
        .parse::<Schedule>()
        .map_err(|err| anyhow::anyhow!("invalid cron expression {expr:?}: {err}"))
}

/// First fire time strictly after `now`, in `now`'s zone. A wall-clock time
/// that a DST gap skips does not fire that day; an ambiguous one fires at its
/// earlier instant.
pub fn next_fire_after<Tz: TimeZone>(
    schedule: &Schedule,
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    schedule.after(now).next()
}

/// Spawns a build when the cache does not exist yet.
pub async fn spawn_startup_build(
    runner: Arc<RefreshRunner>,
) -> anyhow::Result<Option<JoinHandle<()>>> {
    if runner
        .store()
        .exists()
        .await
        .context("check tag cache")?
    {
        tracing::info!("tag cache present; skipping startup build");
        return Ok(None);
    }

    tracing::info!("tag cache missing; building on startup");
    Ok(Some(tokio::spawn(async move {
        runner.run(RefreshTrigger::Startup).await;
    })))
}

/// Starts a scheduler that rebuilds the cache on `cron` in local time,
/// regardless of whether it exists. The returned scheduler keeps running
/// until it is shut down.
pub async fn start_daily_refresh(
    runner: Arc<RefreshRunner>,
    cron: &str,
) -> anyhow::Result<JobScheduler> {
    let schedule = parse_schedule(cron)?;
    let sched = JobScheduler::new()
        .await
        .context("create refresh scheduler")?;

    let job = Job::new_async_tz(cron.trim(), Local, move |_uuid, _lock| {
        let runner = Arc::clone(&runner);
        Box::pin(async move {
            runner.run(RefreshTrigger::Scheduled).await;
        })
    })
    .with_context(|| format!("create refresh job for cron {cron}"))?;

    sched.add(job).await.context("add refresh job")?;
    sched.start().await.context("start refresh scheduler")?;

    if let Some(next) = next_fire_after(&schedule, &Local::now()) {
        tracing::info!(%cron, next = %next.to_rfc3339(), "daily tag cache refresh scheduled");
    }
    Ok(sched)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{FixedOffset, Utc};
    use chrono_tz::America::New_York;

    use super::*;
    use crate::app::tag_store::{LocalFsTagStore, TagStore as _};
    use crate::formats::TagIndex;
    use crate::gemini::{GenerateError, TextGenerator};
    use crate::tagging::{TagBuilder, TagBuilderConfig};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn next(cron: &str, now: &DateTime<impl TimeZone>) -> DateTime<Utc> {
        let schedule = parse_schedule(cron).unwrap();
        next_fire_after(&schedule, now).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn default_cron_fires_daily_at_two() {
        assert_eq!(
            next(DEFAULT_REFRESH_CRON, &utc(2024, 5, 1, 1, 30, 0)),
            utc(2024, 5, 1, 2, 0, 0)
        );
        assert_eq!(
            next(DEFAULT_REFRESH_CRON, &utc(2024, 5, 1, 2, 0, 0)),
            utc(2024, 5, 2, 2, 0, 0)
        );
        assert_eq!(
            next(DEFAULT_REFRESH_CRON, &utc(2024, 12, 31, 23, 59, 59)),
            utc(2025, 1, 1, 2, 0, 0)
        );
    }

    #[test]
    fn fire_time_keeps_the_callers_zone() {
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap();

        let next = next_fire_after(&parse_schedule(DEFAULT_REFRESH_CRON).unwrap(), &now).unwrap();

        assert_eq!(next, tz.with_ymd_and_hms(2024, 5, 2, 2, 0, 0).unwrap());
    }

    #[test]
    fn time_skipped_by_spring_forward_fires_next_day() {
        // 02:00-03:00 does not exist in New York on 2024-03-10.
        let now = New_York.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();

        let fire = next("0 30 2 * * *", &now);

        assert_eq!(fire, New_York.with_ymd_and_hms(2024, 3, 11, 2, 30, 0).unwrap());
        assert_eq!(fire, utc(2024, 3, 11, 6, 30, 0));
    }

    #[test]
    fn time_repeated_by_fall_back_fires_at_earlier_instant() {
        // 01:00-02:00 happens twice in New York on 2024-11-03 (EDT, then EST).
        let now = New_York.with_ymd_and_hms(2024, 11, 3, 0, 0, 0).unwrap();

        assert_eq!(next("0 30 1 * * *", &now), utc(2024, 11, 3, 5, 30, 0));
        // 02:30 is unambiguous that day and is already on EST.
        assert_eq!(next("0 30 2 * * *", &now), utc(2024, 11, 3, 7, 30, 0));
    }

    #[test]
    fn invalid_cron_is_rejected() {
        assert!(parse_schedule("every night").is_err());
        assert!(parse_schedule("").is_err());
    }

    #[derive(Default)]
    struct CountingGenerator {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GenerateError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(r#"{"Mars Rover": ["Space"]}"#.to_owned())
        }
    }

    fn runner(generator: Arc<CountingGenerator>, dir: &std::path::Path) -> Arc<RefreshRunner> {
        let mut config = TagBuilderConfig::new(dir);
        config.batch_delay = Duration::ZERO;
        Arc::new(RefreshRunner::new(TagBuilder::new(
            generator,
            Arc::new(LocalFsTagStore::new(dir.join("tags.json"))),
            config,
        )))
    }

    #[tokio::test]
    async fn startup_builds_when_cache_is_absent() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        std::fs::write(
            temp.path().join("pubs.csv"),
            "Title,Link\nMars Rover,https://example.com/mars\n",
        )?;
        let generator = Arc::new(CountingGenerator::default());
        let runner = runner(generator.clone(), temp.path());

        let handle = spawn_startup_build(Arc::clone(&runner))
            .await?
            .expect("startup build spawned");
        handle.await?;

        let index = runner.store().read().await?;
        assert_eq!(index.get("Space").map(<[_]>::len), Some(1));
        assert_eq!(generator.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn startup_skips_existing_cache() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let generator = Arc::new(CountingGenerator::default());
        let runner = runner(generator.clone(), temp.path());
        runner.store().write(&TagIndex::default()).await?;

        assert!(spawn_startup_build(runner).await?.is_none());
        assert_eq!(generator.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn scheduled_job_rebuilds_existing_cache() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        std::fs::write(
            temp.path().join("pubs.csv"),
            "Title,Link\nMars Rover,https://example.com/mars\n",
        )?;
        let generator = Arc::new(CountingGenerator::default());
        let runner = runner(generator.clone(), temp.path());
        runner.store().write(&TagIndex::default()).await?;

        let mut sched = start_daily_refresh(Arc::clone(&runner), "* * * * * *").await?;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while generator.calls.load(std::sync::atomic::Ordering::SeqCst) == 0
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        sched.shutdown().await?;

        assert!(generator.calls.load(std::sync::atomic::Ordering::SeqCst) >= 1);
        Ok(())
    }

    #[tokio::test]
    async fn daily_refresh_rejects_invalid_cron() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = runner(Arc::new(CountingGenerator::default()), temp.path());

        let Err(err) = start_daily_refresh(runner, "daily").await else {
            panic!("expected invalid cron expression error");
        };

        assert!(err.to_string().contains("invalid cron expression"));
    }
}
