use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use snafu::ResultExt as _;
use url::Url;

use crate::completion::Settings;
use crate::error::{ApplicationError, CalendarSnafu, ConfigLoadSnafu, TierTableSnafu};
use crate::policy::PolicyKind;
use crate::streak::{Calendar, TierTable};

/// Process configuration, read from the environment (and a `.env` file, if present).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,
    pub surreal_url: Url,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Reference time zone for calendar days, in minutes east of UTC.
    #[serde(default)]
    pub offensive_utc_offset_minutes: i32,
    /// First day of SUPER, ULTRA, KING and INFINITY.
    #[serde(default = "default_thresholds")]
    pub offensive_tier_thresholds: Vec<u32>,
    #[serde(default = "default_max_retries")]
    pub offensive_max_retries: usize,

    #[serde(default)]
    pub access_policy: PolicyKind,
}

fn default_host() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_thresholds() -> Vec<u32> {
    TierTable::DEFAULT_THRESHOLDS.to_vec()
}

fn default_max_retries() -> usize {
    5
}

pub fn load() -> Result<Config, ApplicationError> {
    envy::from_env::<Config>().context(ConfigLoadSnafu)
}

impl Config {
    pub fn settings(&self) -> Result<Settings, ApplicationError> {
        let calendar =
            Calendar::with_offset_minutes(self.offensive_utc_offset_minutes).context(CalendarSnafu)?;
        let tiers = TierTable::new(&self.offensive_tier_thresholds).context(TierTableSnafu)?;

        Ok(Settings {
            calendar,
            tiers,
            max_retries: self.offensive_max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
    }

    #[test]
    fn defaults() {
        let config = config(&[("SURREAL_URL", "mem://?ns=edu&db=edu")]).unwrap();

        assert_eq!(config.host, default_host());
        assert_eq!(config.offensive_utc_offset_minutes, 0);
        assert_eq!(config.offensive_tier_thresholds, vec![7, 30, 90, 365]);
        assert_eq!(config.access_policy, PolicyKind::AllowAll);

        let settings = config.settings().unwrap();
        assert_eq!(settings.calendar, Calendar::utc());
        assert_eq!(settings.tiers, TierTable::default());
        assert_eq!(settings.max_retries, 5);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("SURREAL_URL", "ws://root:root@localhost:8000?ns=edu&db=edu"),
            ("HOST_ADDRESS", "127.0.0.1:9000"),
            ("OFFENSIVE_UTC_OFFSET_MINUTES", "-180"),
            ("OFFENSIVE_TIER_THRESHOLDS", "3,10,20,50"),
            ("OFFENSIVE_MAX_RETRIES", "2"),
            ("ACCESS_POLICY", "owner_only"),
        ])
        .unwrap();

        assert_eq!(config.host, SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert_eq!(config.access_policy, PolicyKind::OwnerOnly);

        let settings = config.settings().unwrap();
        assert_eq!(settings.calendar, Calendar::with_offset_minutes(-180).unwrap());
        assert_eq!(settings.tiers, TierTable::new(&[3, 10, 20, 50]).unwrap());
        assert_eq!(settings.max_retries, 2);
    }

    #[test]
    fn invalid_thresholds_fail_settings() {
        let config = config(&[
            ("SURREAL_URL", "mem://?ns=edu&db=edu"),
            ("OFFENSIVE_TIER_THRESHOLDS", "30,7,90,365"),
        ])
        .unwrap();

        assert!(matches!(
            config.settings(),
            Err(ApplicationError::TierTable { .. })
        ));
    }

    #[test]
    fn missing_database_url() {
        assert!(config(&[]).is_err());
    }
}
