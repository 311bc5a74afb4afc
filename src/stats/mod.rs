pub mod dto;
pub(crate) mod handler;
pub mod store;

pub use dto::{
    PluginEventType, PluginStats, PluginUsageLog, StatsSummary, TrendPoint, UsageLogCreate,
};
pub use store::StatsAggregator;
