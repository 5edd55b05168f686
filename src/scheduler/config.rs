use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub check_interval: Duration,
    pub max_starts_per_check: usize,
    pub timezone: String,
    /// A missed window is skipped, not replayed, when this is `false`.
    pub run_missed_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: Duration::from_secs(10),
            max_starts_per_check: 100,
            timezone: "UTC".to_string(),
            run_missed_on_startup: false,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            enabled: std::env::var("SCHEDULER_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.enabled),
            check_interval: std::env::var("SCHEDULER_CHECK_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.check_interval),
            max_starts_per_check: std::env::var("SCHEDULER_MAX_STARTS_PER_CHECK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_starts_per_check),
            timezone: std::env::var("SCHEDULER_TIMEZONE").unwrap_or(default.timezone),
            run_missed_on_startup: std::env::var("SCHEDULER_RUN_MISSED_ON_STARTUP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.run_missed_on_startup),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_contract() {
        let config = SchedulerConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(10));
        assert_eq!(config.max_starts_per_check, 100);
        assert!(!config.run_missed_on_startup);
    }
}
