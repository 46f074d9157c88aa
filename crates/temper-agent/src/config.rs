//! Configuration for the agent
//!
//! Defines the retention table, sweep interval and which classes are watched.

use crate::{AgentError, RetentionPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use temper_domain::RetentionClass;

/// Name of the optional configuration file inside the managed root
pub const CONFIG_FILE_NAME: &str = "temper.toml";

/// Default database file name inside the managed root
pub const DEFAULT_DATABASE_NAME: &str = "temper.sqlite";

/// Configuration for the agent
///
/// # Examples
///
/// ```
/// use temper_agent::AgentConfig;
///
/// // Default configuration
/// let config = AgentConfig::default();
/// assert_eq!(config.sweep_interval_secs, 60);
///
/// // Aggressive cleanup
/// let config = AgentConfig::aggressive();
/// assert_eq!(config.retention.daily_hours, 12);
///
/// // Lenient cleanup
/// let config = AgentConfig::lenient();
/// assert_eq!(config.retention.daily_hours, 48);
/// ```
///
/// The same settings can be written as TOML in `<root>/temper.toml`:
///
/// ```toml
/// sweep_interval_secs = 60
/// classes = ["daily", "weekly", "monthly"]
/// dry_run = false
///
/// [retention]
/// daily_hours = 24
/// weekly_hours = 168
/// monthly_hours = 720
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum age per retention class
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// How often the expiry sweep runs (in seconds)
    /// Default: 60
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Retention classes to watch, each under `<root>/<class>`
    /// Default: daily, weekly, monthly
    #[serde(default = "default_classes", with = "class_names")]
    pub classes: Vec<RetentionClass>,

    /// Database location; relative paths resolve against the managed root
    /// Default: `<root>/temper.sqlite`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Dry-run mode: log what would be deleted without deleting anything
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_classes() -> Vec<RetentionClass> {
    RetentionClass::ALL.to_vec()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            sweep_interval_secs: default_sweep_interval_secs(),
            classes: default_classes(),
            database_path: None,
            dry_run: false,
        }
    }
}

impl AgentConfig {
    /// Aggressive cleanup configuration (shorter retention, frequent sweeps)
    ///
    /// - Daily: 12 hours
    /// - Weekly: 72 hours
    /// - Monthly: 336 hours (14 days)
    /// - Sweep interval: 30 seconds
    pub fn aggressive() -> Self {
        Self {
            retention: RetentionPolicy {
                daily_hours: 12,
                weekly_hours: 72,
                monthly_hours: 14 * 24,
            },
            sweep_interval_secs: 30,
            ..Self::default()
        }
    }

    /// Lenient cleanup configuration (longer retention, infrequent sweeps)
    ///
    /// - Daily: 48 hours
    /// - Weekly: 336 hours (14 days)
    /// - Monthly: 1440 hours (60 days)
    /// - Sweep interval: 300 seconds
    pub fn lenient() -> Self {
        Self {
            retention: RetentionPolicy {
                daily_hours: 48,
                weekly_hours: 14 * 24,
                monthly_hours: 60 * 24,
            },
            sweep_interval_secs: 300,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| AgentError::filesystem(path, e))?;
        let config: AgentConfig = toml::from_str(&contents)
            .map_err(|e| AgentError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<root>/temper.toml` if present, otherwise the defaults
    pub fn load_for_root(root: &Path) -> Result<Self, AgentError> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.exists() {
            tracing::info!("Loading configuration from {}", path.display());
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check the configuration for values the agent cannot run with
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.sweep_interval_secs == 0 {
            return Err(AgentError::Config("sweep_interval_secs must be at least 1".into()));
        }
        if self.classes.is_empty() {
            return Err(AgentError::Config("at least one retention class must be watched".into()));
        }
        for (i, class) in self.classes.iter().enumerate() {
            if self.classes[..i].contains(class) {
                return Err(AgentError::Config(format!("retention class '{}' listed twice", class)));
            }
        }
        if !self.retention.is_monotonic() {
            tracing::warn!("Retention table is not monotonic: {:?}", self.retention);
        }
        Ok(())
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Resolve the database location for a managed root
    pub fn database_path_for(&self, root: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => root.join(DEFAULT_DATABASE_NAME),
        }
    }
}

/// Serialize retention classes by their lowercase names
mod class_names {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use temper_domain::RetentionClass;

    pub fn serialize<S: Serializer>(classes: &[RetentionClass], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(classes.iter().map(|c| c.as_str()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<RetentionClass>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|name| name.parse().map_err(D::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.retention, RetentionPolicy::default());
        assert_eq!(config.sweep_interval_secs, 60);
        assert_eq!(config.classes, RetentionClass::ALL.to_vec());
        assert!(config.database_path.is_none());
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let aggressive = AgentConfig::aggressive();
        let lenient = AgentConfig::lenient();
        let default = AgentConfig::default();

        assert!(aggressive.retention.daily_hours < default.retention.daily_hours);
        assert!(lenient.retention.daily_hours > default.retention.daily_hours);
        assert!(aggressive.retention.is_monotonic());
        assert!(lenient.retention.is_monotonic());
    }

    #[test]
    fn test_toml_parsing() {
        let config: AgentConfig = toml::from_str(
            r#"
            sweep_interval_secs = 5
            classes = ["Weekly", "daily"]
            dry_run = true

            [retention]
            daily_hours = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.sweep_interval(), Duration::from_secs(5));
        assert_eq!(config.classes, vec![RetentionClass::Weekly, RetentionClass::Daily]);
        assert!(config.dry_run);
        assert_eq!(config.retention.daily_hours, 2);
        assert_eq!(config.retention.monthly_hours, 720);
    }

    #[test]
    fn test_unknown_class_rejected() {
        let result: Result<AgentConfig, _> = toml::from_str(r#"classes = ["yearly"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let zero_interval = AgentConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert!(matches!(zero_interval.validate(), Err(AgentError::Config(_))));

        let no_classes = AgentConfig {
            classes: Vec::new(),
            ..Default::default()
        };
        assert!(no_classes.validate().is_err());

        let duplicated = AgentConfig {
            classes: vec![RetentionClass::Daily, RetentionClass::Daily],
            ..Default::default()
        };
        assert!(duplicated.validate().is_err());
    }

    #[test]
    fn test_database_path_resolution() {
        let root = Path::new("/srv/temp");
        let mut config = AgentConfig::default();
        assert_eq!(config.database_path_for(root), root.join("temper.sqlite"));

        config.database_path = Some(PathBuf::from("state/db.sqlite"));
        assert_eq!(config.database_path_for(root), root.join("state/db.sqlite"));

        config.database_path = Some(PathBuf::from("/var/lib/temper.sqlite"));
        assert_eq!(config.database_path_for(root), PathBuf::from("/var/lib/temper.sqlite"));
    }

    #[test]
    fn test_load_for_root() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(AgentConfig::load_for_root(dir.path()).unwrap(), AgentConfig::default());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "sweep_interval_secs = 0").unwrap();
        assert!(AgentConfig::load_for_root(dir.path()).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = AgentConfig::aggressive();
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: AgentConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
