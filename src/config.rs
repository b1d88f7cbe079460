use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub current_user_name: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_browse_limit")]
    pub browse_limit: u32,

    #[serde(skip)]
    path: Option<PathBuf>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gator");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("gator.db").to_string_lossy().to_string()
}

fn default_request_timeout() -> u64 {
    20
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("gator/{}", env!("CARGO_PKG_VERSION"))
}

fn default_browse_limit() -> u32 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            current_user_name: None,
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
            browse_limit: default_browse_limit(),
            path: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Reads the config at `path`, writing a default one there if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let mut config = Config::default();
            config.path = Some(path.to_path_buf());
            config.save()?;
            config
        };
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.path.clone().unwrap_or_else(Self::config_path);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Records `name` as the current user and writes the file back.
    pub fn set_user(&mut self, name: &str) -> Result<()> {
        self.current_user_name = Some(name.to_string());
        self.save()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gator")
            .join("config.toml")
    }
}

fn interval_unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d*)?|\.\d+)(ns|us|µs|μs|ms|s|m|h)")
            .unwrap_or_else(|e| panic!("interval pattern is invalid: {e}"))
    })
}

/// Parses a polling interval such as `30s`, `1m`, `1h30m` or `1.5h`.
///
/// The whole string must be a sequence of `<number><unit>` pairs. Zero,
/// negative and unitless values are rejected.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AppError::Config("interval is empty".to_string()));
    }
    if s.starts_with('-') {
        return Err(AppError::Config(format!(
            "interval must be positive, got '{input}'"
        )));
    }
    let s = s.strip_prefix('+').unwrap_or(s);

    let mut total = 0f64;
    let mut consumed = 0;
    for cap in interval_unit_re().captures_iter(s) {
        let (Some(whole), Some(number), Some(unit)) = (cap.get(0), cap.get(1), cap.get(2)) else {
            continue;
        };
        if whole.start() != consumed {
            break;
        }
        consumed = whole.end();

        let value: f64 = number
            .as_str()
            .parse()
            .map_err(|_| AppError::Config(format!("invalid number in interval '{input}'")))?;
        let seconds_per_unit = match unit.as_str() {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => unreachable!("unit alternatives are fixed by the pattern"),
        };
        total += value * seconds_per_unit;
    }

    if consumed != s.len() {
        return Err(AppError::Config(format!(
            "unknown duration format '{input}', expected e.g. 30s, 1m or 1h30m"
        )));
    }

    let interval = Duration::try_from_secs_f64(total)
        .map_err(|e| AppError::Config(format!("interval '{input}' is out of range: {e}")))?;
    if interval.is_zero() {
        return Err(AppError::Config(format!(
            "interval must be positive, got '{input}'"
        )));
    }
    Ok(interval)
}
