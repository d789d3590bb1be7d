//! Engine, scheduler and runtime configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconciliation engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Audit-log reason attached to every ban
    pub ban_reason: String,
    /// Pause after a successful ban
    pub success_delay: Duration,
    /// Pause after a handled ban failure
    pub failure_delay: Duration,
    /// Posted once when the bot lacks the ban permission
    pub permission_notice: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ban_reason: "Listed in shared ban-list registry".to_string(),
            success_delay: Duration::from_secs(1),
            failure_delay: Duration::from_millis(200),
            permission_notice:
                "I lack the 'Ban Members' permission. Please adjust role permissions.".to_string(),
        }
    }
}

impl EngineConfig {
    /// Notice posted when a cached member was removed and banned.
    pub fn member_removed_notice(&self, label: &str) -> String {
        format!("User {label} was in the server and was removed and banned (on banlist).")
    }
}

/// Fleet scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between periodic fleet passes
    pub fleet_interval: Duration,
    /// Exclusive upper bound of the delay before each periodic pass
    pub periodic_jitter: Duration,
    /// Exclusive upper bound of the delay before each guild in a fleet pass
    pub guild_jitter: Duration,
    /// Whether the lazy-start rule may launch the periodic loop
    pub periodic_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fleet_interval: Duration::from_secs(60 * 60),
            periodic_jitter: Duration::from_secs(300),
            guild_jitter: Duration::from_secs(3),
            periodic_enabled: true,
        }
    }
}

/// Everything `BanlistRuntime` needs besides its effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Engine settings
    pub engine: EngineConfig,
    /// Scheduler settings
    pub scheduler: SchedulerConfig,
    /// How often to poll the joined-guild list for new guilds; `None` disables
    pub join_poll_interval: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_pacing() {
        let engine = EngineConfig::default();
        assert_eq!(engine.success_delay, Duration::from_secs(1));
        assert_eq!(engine.failure_delay, Duration::from_millis(200));

        let scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.fleet_interval, Duration::from_secs(3600));
        assert_eq!(scheduler.periodic_jitter, Duration::from_secs(300));
        assert_eq!(scheduler.guild_jitter, Duration::from_secs(3));
    }

    #[test]
    fn member_notice_wording() {
        assert_eq!(
            EngineConfig::default().member_removed_notice("alice (5)"),
            "User alice (5) was in the server and was removed and banned (on banlist)."
        );
    }
}
