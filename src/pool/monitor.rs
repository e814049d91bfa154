//! Pool statistics and health classification.

use log::{info, warn};
use serde::Serialize;
use std::fmt;

use crate::utils::config::HealthThresholds;

/// Point-in-time view of the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub active: usize,
    pub idle: usize,
    pub max_total: usize,
    /// Sessions created since start (or last counter reset).
    pub created: u64,
    pub destroyed: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolHealth {
    Healthy,
    Warning,
    Degraded,
    Critical,
}

impl fmt::Display for PoolHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolHealth::Healthy => "HEALTHY",
            PoolHealth::Warning => "WARNING",
            PoolHealth::Degraded => "DEGRADED",
            PoolHealth::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// [`PoolStats`] plus borrow counters and derived health.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ExtendedPoolStats {
    #[serde(flatten)]
    pub stats: PoolStats,
    pub borrows: u64,
    pub returns: u64,
    pub failures: u64,
    /// Active sessions as a percentage of `max_total`.
    pub utilization: f64,
    pub health: PoolHealth,
}

impl ExtendedPoolStats {
    pub fn new(stats: PoolStats, borrows: u64, returns: u64, failures: u64) -> Self {
        let utilization = if stats.max_total == 0 {
            0.0
        } else {
            stats.active as f64 / stats.max_total as f64 * 100.0
        };
        Self {
            stats,
            borrows,
            returns,
            failures,
            utilization,
            health: classify(utilization, borrows, failures),
        }
    }

    fn failure_rate_exceeded(&self) -> bool {
        self.failures as f64 > self.borrows as f64 * HealthThresholds::MAX_FAILURE_RATE
    }

    /// Utilisation under 90% and failures at most 10% of borrows.
    pub fn is_healthy(&self) -> bool {
        self.utilization < HealthThresholds::HEALTHY_UTILIZATION && !self.failure_rate_exceeded()
    }
}

/// Utilisation is checked before the failure rate: a saturated pool is reported as such
/// even when it also fails.
pub fn classify(utilization: f64, borrows: u64, failures: u64) -> PoolHealth {
    if utilization > HealthThresholds::CRITICAL_UTILIZATION {
        PoolHealth::Critical
    } else if utilization > HealthThresholds::WARNING_UTILIZATION {
        PoolHealth::Warning
    } else if failures as f64 > borrows as f64 * HealthThresholds::MAX_FAILURE_RATE {
        PoolHealth::Degraded
    } else {
        PoolHealth::Healthy
    }
}

/// Warn when the pool is near capacity or destroys most of what it creates.
pub fn check_health(stats: &ExtendedPoolStats) {
    let s = &stats.stats;
    if s.max_total > 0
        && s.active as f64 >= s.max_total as f64 * HealthThresholds::NEAR_CAPACITY
    {
        warn!(
            "Session pool near capacity: {}/{} active",
            s.active, s.max_total
        );
    }
    if s.created > HealthThresholds::DESTRUCTION_MIN_CREATED
        && s.destroyed as f64 > s.created as f64 * HealthThresholds::DESTRUCTION_RATE
    {
        warn!(
            "High session destruction rate: {} destroyed of {} created",
            s.destroyed, s.created
        );
    }
}

pub fn log_stats(stats: &ExtendedPoolStats) {
    let s = &stats.stats;
    info!(
        "Session pool: active={} idle={} max={} created={} destroyed={} borrows={} returns={} failures={} utilization={:.1}% health={}",
        s.active,
        s.idle,
        s.max_total,
        s.created,
        s.destroyed,
        stats.borrows,
        stats.returns,
        stats.failures,
        stats.utilization,
        stats.health
    );
}
