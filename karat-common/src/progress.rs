//! Progress phases and reporting
//!
//! The phase table below is the single source of truth for UI progress:
//! a fixed, ordered enumeration with strictly increasing percentages. No
//! other component invents percentages. Workers publish the mapped
//! percent (as a string) on the channel named by the job's correlation
//! id; the API streams the channel to clients.

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Pipeline progress phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Started,
    CloningStarted,
    CloningRemote,
    CloningReceiving,
    CloningResolving,
    CloningDone,
    AppraisingStarted,
    AppraisingDone,
    CachingStarted,
    Finished,
}

/// Canonical phase table: symbol, completion percent.
const PHASE_TABLE: &[(Phase, &str, u8)] = &[
    (Phase::Started, "started", 15),
    (Phase::CloningStarted, "cloning_started", 20),
    (Phase::CloningRemote, "cloning_remote", 35),
    (Phase::CloningReceiving, "cloning_receiving", 40),
    (Phase::CloningResolving, "cloning_resolving", 45),
    (Phase::CloningDone, "cloning_done", 50),
    (Phase::AppraisingStarted, "appraising_started", 55),
    (Phase::AppraisingDone, "appraising_done", 85),
    (Phase::CachingStarted, "caching_started", 90),
    (Phase::Finished, "finished", 100),
];

/// Raw clone-tool output prefixes mapped to clone sub-phases. Matching is
/// case-insensitive; unrecognized lines map to no phase change.
const CLONE_LINE_TABLE: &[(&str, Phase)] = &[
    ("cloning", Phase::CloningStarted),
    ("remote:", Phase::CloningRemote),
    ("receiving", Phase::CloningReceiving),
    ("resolving", Phase::CloningResolving),
    ("checking", Phase::CloningDone),
];

impl Phase {
    /// Completion percent for this phase.
    pub fn percent(self) -> u8 {
        PHASE_TABLE
            .iter()
            .find(|(phase, _, _)| *phase == self)
            .map(|(_, _, percent)| *percent)
            .unwrap_or_else(|| unreachable!("phase missing from table"))
    }

    pub fn as_str(self) -> &'static str {
        PHASE_TABLE
            .iter()
            .find(|(phase, _, _)| *phase == self)
            .map(|(_, symbol, _)| *symbol)
            .unwrap_or_else(|| unreachable!("phase missing from table"))
    }

    /// Parse a phase symbol. Symbols outside the table are a programmer
    /// error and fail closed rather than defaulting.
    pub fn parse(symbol: &str) -> Result<Phase> {
        PHASE_TABLE
            .iter()
            .find(|(_, name, _)| *name == symbol)
            .map(|(phase, _, _)| *phase)
            .ok_or_else(|| Error::UnknownPhase(symbol.to_string()))
    }
}

/// Map a phase symbol to its percent. Fails on unknown symbols.
pub fn map(symbol: &str) -> Result<u8> {
    Phase::parse(symbol).map(Phase::percent)
}

/// Map one line of raw clone output to a clone sub-phase, by
/// case-insensitive prefix. `None` means no phase change.
pub fn phase_for_clone_line(line: &str) -> Option<Phase> {
    let line = line.trim_start().to_ascii_lowercase();
    CLONE_LINE_TABLE
        .iter()
        .find(|(prefix, _)| line.starts_with(prefix))
        .map(|(_, phase)| *phase)
}

/// Publishes progress for one job on its correlation-id channel.
#[derive(Clone)]
pub struct ProgressReporter {
    pool: SqlitePool,
    channel: String,
}

impl ProgressReporter {
    pub fn new(pool: SqlitePool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish the phase's percent (as a decimal string) on the channel.
    pub async fn report(&self, phase: Phase) -> Result<()> {
        let percent = phase.percent().to_string();

        sqlx::query(
            "INSERT INTO progress_events (channel, percent, published_at) VALUES (?, ?, ?)",
        )
        .bind(&self.channel)
        .bind(&percent)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        debug!(channel = %self.channel, phase = phase.as_str(), percent = %percent, "Progress reported");
        Ok(())
    }

    /// Re-publish the same phase once a second for `seconds` seconds, so
    /// subscribers that connect after the terminal event still see it.
    /// Best effort: publish failures are logged, not propagated.
    pub async fn report_each_second(&self, seconds: u64, phase: Phase) {
        for _ in 0..seconds {
            if let Err(e) = self.report(phase).await {
                warn!(channel = %self.channel, error = %e, "Progress re-announce failed");
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

/// Read side used by the API's SSE stream: events on `channel` with an id
/// greater than `after_id`, oldest first.
pub async fn events_after(
    pool: &SqlitePool,
    channel: &str,
    after_id: i64,
) -> Result<Vec<(i64, String)>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, percent FROM progress_events
         WHERE channel = ? AND id > ?
         ORDER BY id",
    )
    .bind(channel)
    .bind(after_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn phase_table_percentages() {
        assert_eq!(map("started").unwrap(), 15);
        assert_eq!(map("cloning_started").unwrap(), 20);
        assert_eq!(map("cloning_remote").unwrap(), 35);
        assert_eq!(map("cloning_receiving").unwrap(), 40);
        assert_eq!(map("cloning_resolving").unwrap(), 45);
        assert_eq!(map("cloning_done").unwrap(), 50);
        assert_eq!(map("appraising_started").unwrap(), 55);
        assert_eq!(map("appraising_done").unwrap(), 85);
        assert_eq!(map("caching_started").unwrap(), 90);
        assert_eq!(map("finished").unwrap(), 100);
    }

    #[test]
    fn phase_table_strictly_increases() {
        let percents: Vec<u8> = PHASE_TABLE.iter().map(|(_, _, p)| *p).collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn unknown_phase_fails_closed() {
        let err = map("warp_speed").unwrap_err();
        assert!(matches!(err, Error::UnknownPhase(_)));
    }

    #[test]
    fn clone_lines_map_by_prefix() {
        assert_eq!(
            phase_for_clone_line("Cloning into 'hello'..."),
            Some(Phase::CloningStarted)
        );
        assert_eq!(
            phase_for_clone_line("remote: Enumerating objects: 312, done."),
            Some(Phase::CloningRemote)
        );
        assert_eq!(
            phase_for_clone_line("Receiving objects:  42% (131/312)"),
            Some(Phase::CloningReceiving)
        );
        assert_eq!(
            phase_for_clone_line("Resolving deltas: 100% (88/88), done."),
            Some(Phase::CloningResolving)
        );
        assert_eq!(
            phase_for_clone_line("Checking out files: 100%"),
            Some(Phase::CloningDone)
        );
    }

    #[test]
    fn clone_line_match_is_case_insensitive() {
        assert_eq!(
            phase_for_clone_line("RECEIVING objects: 10%"),
            Some(Phase::CloningReceiving)
        );
    }

    #[test]
    fn unrecognized_clone_lines_are_ignored() {
        assert_eq!(phase_for_clone_line("Total 312 (delta 40)"), None);
        assert_eq!(phase_for_clone_line(""), None);
    }

    #[tokio::test]
    async fn report_publishes_percent_string() {
        let pool = db::connect_memory().await.unwrap();
        db::init_schema(&pool).await.unwrap();

        let reporter = ProgressReporter::new(pool.clone(), "req-1");
        reporter.report(Phase::Started).await.unwrap();
        reporter.report(Phase::Finished).await.unwrap();

        let events = events_after(&pool, "req-1", 0).await.unwrap();
        let percents: Vec<&str> = events.iter().map(|(_, p)| p.as_str()).collect();
        assert_eq!(percents, vec!["15", "100"]);
    }

    #[tokio::test]
    async fn events_after_skips_seen_rows_and_other_channels() {
        let pool = db::connect_memory().await.unwrap();
        db::init_schema(&pool).await.unwrap();

        ProgressReporter::new(pool.clone(), "req-1")
            .report(Phase::Started)
            .await
            .unwrap();
        ProgressReporter::new(pool.clone(), "req-2")
            .report(Phase::Finished)
            .await
            .unwrap();

        let events = events_after(&pool, "req-1", 0).await.unwrap();
        assert_eq!(events.len(), 1);

        let last_id = events[0].0;
        assert!(events_after(&pool, "req-1", last_id).await.unwrap().is_empty());
    }
}
