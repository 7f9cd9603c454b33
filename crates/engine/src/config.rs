use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    Validation(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for LoadError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Rows fetched per inventory page.
    pub batch_size: u64,
    /// Batch cap for on-demand checks and the sweep.
    pub max_batches: u32,
    /// Batch cap for a backfill's full-corpus walk.
    pub backfill_max_batches: u32,
    /// Sweep only considers auctions ending within this window.
    pub sweep_window_days: u32,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_batches: 10,
            backfill_max_batches: 40,
            sweep_window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Wall-clock budget per pattern per batch, in milliseconds.
    pub eval_budget_ms: u64,
    /// Minimum interval between on-demand checks for one owner, in seconds.
    pub debounce_secs: u64,
    /// Plan limit consumed as a plain integer; billing owns its derivation.
    pub max_patterns_per_owner: usize,
    /// Alert ledger retention horizon, in days.
    pub retention_days: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            eval_budget_ms: 2_000,
            debounce_secs: 30,
            max_patterns_per_owner: 20,
            retention_days: crate::ledger::DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub push_relay_url: Option<String>,
    pub push_relay_secret: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub email_from: String,
    /// Owner id to delivery address, loaded into the address book at startup.
    pub email_addresses: HashMap<String, String>,
    /// Domain names spelled out in a push before "+K more".
    pub summary_cap: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            push_relay_url: None,
            push_relay_secret: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            email_from: "alerts@domainwatch.local".into(),
            email_addresses: HashMap::new(),
            summary_cap: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Interval between scheduled sweeps, in seconds.
    pub sweep_interval_secs: u64,
    /// Interval between ledger retention purges, in seconds.
    pub retention_interval_secs: u64,
    /// Spread fraction so parallel workers do not sweep in lockstep.
    pub jitter_fraction: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 1_800,
            retention_interval_secs: 21_600,
            jitter_fraction: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database_url: Option<String>,
    pub batching: BatchingConfig,
    pub limits: LimitsConfig,
    pub notify: NotifyConfig,
    pub schedule: ScheduleConfig,
}

pub fn load_from_file(path: &Path) -> Result<EngineConfig, LoadError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

pub fn load_from_str(yaml: &str) -> Result<EngineConfig, LoadError> {
    let cfg: EngineConfig = serde_yaml::from_str(yaml)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &EngineConfig) -> Result<(), LoadError> {
    if cfg.batching.batch_size == 0 {
        return Err(LoadError::Validation("batch_size must be positive".into()));
    }
    if cfg.batching.max_batches == 0 || cfg.batching.backfill_max_batches == 0 {
        return Err(LoadError::Validation("batch caps must be positive".into()));
    }
    if cfg.limits.eval_budget_ms == 0 {
        return Err(LoadError::Validation(
            "eval_budget_ms must be positive".into(),
        ));
    }
    if cfg.notify.summary_cap == 0 {
        return Err(LoadError::Validation("summary_cap must be positive".into()));
    }
    if !(0.0..=1.0).contains(&cfg.schedule.jitter_fraction) {
        return Err(LoadError::Validation(
            "jitter_fraction must be within [0, 1]".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let cfg = load_from_str("{}").unwrap();
        assert_eq!(cfg.batching.batch_size, 500);
        assert_eq!(cfg.limits.retention_days, 8);
        assert_eq!(cfg.notify.summary_cap, 3);
    }

    #[test]
    fn overrides_apply() {
        let cfg = load_from_str(
            "batching:\n  batch_size: 100\nlimits:\n  debounce_secs: 5\n",
        )
        .unwrap();
        assert_eq!(cfg.batching.batch_size, 100);
        assert_eq!(cfg.limits.debounce_secs, 5);
        assert_eq!(cfg.batching.max_batches, 10);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let err = load_from_str("batching:\n  batch_size: 0\n").unwrap_err();
        assert!(matches!(err, LoadError::Validation(_)));
    }

    #[test]
    fn jitter_out_of_range_rejected() {
        let err = load_from_str("schedule:\n  jitter_fraction: 1.5\n").unwrap_err();
        assert!(matches!(err, LoadError::Validation(_)));
    }
}
