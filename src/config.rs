use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub detector: DetectorConfig,
    pub matcher: MatcherConfig,
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectorConfig {
    /// Debounce window for collapsing event bursts into one recomputation.
    pub debounce_ms: u64,
    /// Override for the event socket path; `None` derives it from
    /// `XDG_RUNTIME_DIR` / `HYPRLAND_INSTANCE_SIGNATURE`.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
    /// Override for the command (hyprctl) socket path.
    #[serde(default)]
    pub command_socket_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatcherConfig {
    /// How many characters beyond the application name a title must carry
    /// before it is considered a distinct document/instance title rather
    /// than a restatement of the app name. Empirically chosen.
    pub distinct_title_threshold: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreviewConfig {
    pub hover_delay_ms: u64,
    pub hide_delay_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            filter: "hyprtask=info".to_string(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 30,
            socket_path: None,
            command_socket_path: None,
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            distinct_title_threshold: 10,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            hover_delay_ms: 800,
            hide_delay_ms: 100,
        }
    }
}

impl Config {
    /// Load config by layering defaults, an optional TOML file and
    /// `HYPRTASK_`-prefixed environment variables.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("HYPRTASK_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("failed to load configuration from {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("invalid log level: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("invalid log format: {}", self.logging.format),
        }

        if self.detector.debounce_ms == 0 {
            anyhow::bail!("detector.debounce_ms must be greater than 0");
        }

        if self.matcher.distinct_title_threshold == 0 {
            anyhow::bail!("matcher.distinct_title_threshold must be greater than 0");
        }

        if self.preview.hover_delay_ms == 0 || self.preview.hide_delay_ms == 0 {
            anyhow::bail!("preview delays must be greater than 0");
        }

        Ok(())
    }
}
