use chrono::{Duration, NaiveDate, Utc};

use crate::error::Result;
use crate::storage::{self, id_key, Storage};

use super::dto::{
    PluginEventType, PluginStats, PluginUsageLog, StatsSummary, TrendPoint, UsageLogCreate,
};

pub struct StatsAggregator {
    storage: Storage,
}

impl StatsAggregator {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Appends the immutable log row, then applies the counter delta to
    /// today's stats row. The daily row is updated with an upsert-increment
    /// CAS loop, so two concurrent events for the same plugin/day cannot
    /// race a get-or-create.
    pub fn log_event(&self, user_id: &str, data: UsageLogCreate) -> Result<PluginUsageLog> {
        let log = PluginUsageLog {
            id: self.storage.next_id()?,
            plugin_id: data.plugin_id,
            user_id: user_id.to_string(),
            machine_id: data.machine_id,
            event_type: data.event_type,
            version: data.version,
            created_at: Utc::now(),
        };
        self.storage
            .usage_logs
            .insert(id_key(log.id), storage::encode(&log)?)?;

        self.apply_delta(data.plugin_id, |stats| match data.event_type {
            PluginEventType::Install => {
                stats.new_installs += 1;
                stats.active_installs += 1;
            }
            PluginEventType::Uninstall => {
                stats.uninstalls += 1;
                // floored at 0, an uninstall without a tracked install is
                // not an error
                stats.active_installs = stats.active_installs.saturating_sub(1);
            }
            PluginEventType::Update => {
                stats.updates += 1;
            }
            // reserved, no counter change
            PluginEventType::Activate | PluginEventType::Deactivate => {}
        })?;

        Ok(log)
    }

    /// Daily download counter, best-effort: failures are logged, never
    /// surfaced, so a download response cannot be blocked by stats.
    pub fn record_download(&self, plugin_id: u64) {
        if let Err(err) = self.apply_delta(plugin_id, |stats| stats.downloads += 1) {
            tracing::warn!(
                "Failed to record download for plugin {}: {}",
                plugin_id,
                err
            );
        }
    }

    fn apply_delta<F>(&self, plugin_id: u64, mut delta: F) -> Result<()>
    where
        F: FnMut(&mut PluginStats),
    {
        let today = Utc::now().date_naive();
        let key = stats_key(plugin_id, today);
        storage::modify::<PluginStats, _>(&self.storage.daily_stats, &key, |current| {
            let mut stats = current.unwrap_or_else(|| PluginStats::empty(plugin_id, today));
            delta(&mut stats);
            Ok(Some(stats))
        })?;
        Ok(())
    }

    /// Day rows within [start, end], ordered by date.
    pub fn range(&self, plugin_id: u64, start: NaiveDate, end: NaiveDate) -> Result<Vec<PluginStats>> {
        let mut rows = Vec::new();
        // ISO date strings sort lexicographically, so the prefix scan is
        // already date-ordered
        for entry in self.storage.daily_stats.scan_prefix(id_key(plugin_id)) {
            let (_, bytes) = entry?;
            let stats: PluginStats = storage::decode(&bytes)?;
            if stats.date >= start && stats.date <= end {
                rows.push(stats);
            }
        }
        Ok(rows)
    }

    /// Aggregate summary: all-time totals plus a windowed average and trend.
    pub fn summary(&self, plugin_id: u64, days: i64) -> Result<StatsSummary> {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(days.max(0));

        let mut total_installs: u64 = 0;
        let mut total_uninstalls: u64 = 0;
        let mut total_downloads: u64 = 0;
        let mut window_installs: u64 = 0;
        let mut trend = Vec::new();

        for entry in self.storage.daily_stats.scan_prefix(id_key(plugin_id)) {
            let (_, bytes) = entry?;
            let stats: PluginStats = storage::decode(&bytes)?;
            total_installs += stats.new_installs;
            total_uninstalls += stats.uninstalls;
            total_downloads += stats.downloads;
            if stats.date >= start && stats.date <= end {
                window_installs += stats.new_installs;
                trend.push(TrendPoint {
                    date: stats.date,
                    installs: stats.new_installs,
                    uninstalls: stats.uninstalls,
                    updates: stats.updates,
                    downloads: stats.downloads,
                });
            }
        }

        let average_daily_installs = if days > 0 {
            window_installs as f64 / days as f64
        } else {
            0.0
        };

        Ok(StatsSummary {
            total_installs,
            active_installs: total_installs.saturating_sub(total_uninstalls),
            total_downloads,
            average_daily_installs,
            install_trend: trend,
        })
    }

    /// A user's event log, newest first.
    pub fn user_events(
        &self,
        user_id: &str,
        plugin_id: Option<u64>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PluginUsageLog>> {
        let mut events = Vec::new();
        for entry in self.storage.usage_logs.iter().rev() {
            let (_, bytes) = entry?;
            let log: PluginUsageLog = storage::decode(&bytes)?;
            if log.user_id != user_id {
                continue;
            }
            if let Some(plugin_id) = plugin_id {
                if log.plugin_id != plugin_id {
                    continue;
                }
            }
            events.push(log);
        }
        Ok(events.into_iter().skip(skip).take(limit).collect())
    }
}

// plugin_id(be) + "YYYY-MM-DD"
fn stats_key(plugin_id: u64, date: NaiveDate) -> Vec<u8> {
    let mut key = Vec::with_capacity(18);
    key.extend_from_slice(&plugin_id.to_be_bytes());
    key.extend_from_slice(date.format("%Y-%m-%d").to_string().as_bytes());
    key
}
