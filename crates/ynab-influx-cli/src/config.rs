use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.json";
const DEFAULT_YNAB_API_URL: &str = "https://api.ynab.com/v1";

/// Port given either as a number or as a numeric string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPort")]
pub struct Port(pub u16);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u16),
    Text(String),
}

impl TryFrom<RawPort> for Port {
    type Error = String;

    fn try_from(raw: RawPort) -> Result<Self, Self::Error> {
        match raw {
            RawPort::Number(port) => Ok(Port(port)),
            RawPort::Text(text) => text
                .trim()
                .parse()
                .map(Port)
                .map_err(|_| format!("'{text}' is not a valid port")),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(rename = "InfluxDBHost")]
    pub influx_host: String,
    #[serde(rename = "InfluxDBPort")]
    pub influx_port: Port,
    #[serde(rename = "InfluxDBIndex")]
    pub influx_database: String,
    #[serde(rename = "InfluxDBUser", default)]
    pub influx_user: String,
    #[serde(rename = "InfluxDBPass", default)]
    pub influx_password: String,
    #[serde(rename = "InfluxDBScheme", default = "default_scheme")]
    pub influx_scheme: String,
    #[serde(rename = "YNAB_API_Key")]
    pub ynab_api_key: String,
    #[serde(rename = "YNAB_Budget_ID")]
    pub ynab_budget_id: String,
    #[serde(rename = "YNAB_API_URL", default = "default_ynab_api_url")]
    pub ynab_api_url: String,
    #[serde(rename = "DetectChanges", default)]
    pub detect_changes: bool,
}

fn default_scheme() -> String {
    "http".to_owned()
}

fn default_ynab_api_url() -> String {
    DEFAULT_YNAB_API_URL.to_owned()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("influx_host", &self.influx_host)
            .field("influx_port", &self.influx_port.0)
            .field("influx_database", &self.influx_database)
            .field("influx_user", &self.influx_user)
            .field("influx_password", &"<redacted>")
            .field("influx_scheme", &self.influx_scheme)
            .field("ynab_api_key", &"<redacted>")
            .field("ynab_budget_id", &self.ynab_budget_id)
            .field("ynab_api_url", &self.ynab_api_url)
            .field("detect_changes", &self.detect_changes)
            .finish()
    }
}

impl Config {
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Look for `config.json` in the working directory, then next to the executable.
    pub fn find_and_load() -> Result<(PathBuf, Self)> {
        let mut locations = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Ok(exe) = std::env::current_exe()
            && let Some(dir) = exe.parent()
        {
            locations.push(dir.join(CONFIG_FILE_NAME));
        }

        for location in &locations {
            if location.exists() {
                let config = Self::load_from_file(location)?;
                return Ok((location.clone(), config));
            }
        }

        bail!(
            "No {CONFIG_FILE_NAME} found in the working directory or next to the executable, pass --config"
        )
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("InfluxDBHost", &self.influx_host),
            ("InfluxDBIndex", &self.influx_database),
            ("YNAB_API_Key", &self.ynab_api_key),
            ("YNAB_Budget_ID", &self.ynab_budget_id),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                bail!("'{key}' must not be empty");
            }
        }
        if !matches!(self.influx_scheme.as_str(), "http" | "https") {
            bail!(
                "'InfluxDBScheme' must be http or https, got '{}'",
                self.influx_scheme
            );
        }
        Ok(())
    }

    pub fn influx_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.influx_scheme, self.influx_host, self.influx_port.0
        )
    }
}
