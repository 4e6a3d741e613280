use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the process engine
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Transition engine limits
    pub engine: EngineSettings,
    /// Labels written on closing audit entries
    pub audit: AuditLabels,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human readable output
    pub json_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Longest chain of consecutive gateways one action may cross
    pub max_gateway_hops: usize,
    /// Fail path enumeration on cyclic definitions
    pub detect_cycles: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditLabels {
    pub ended_label: String,
    pub denied_label: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_gateway_hops: 64,
            detect_cycles: true,
        }
    }
}

impl Default for AuditLabels {
    fn default() -> Self {
        Self {
            ended_label: "ended".to_string(),
            denied_label: "denied".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (process-engine.toml, .process-engine-rc)
    /// 3. Environment variables (prefixed with PROCESS_ENGINE, `__` between levels)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`EngineConfig::load`] with config files looked up in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        let main_file = dir.join("process-engine.toml");
        if main_file.exists() {
            builder = builder.add_source(File::from(main_file));
        }

        let rc_file = dir.join(".process-engine-rc");
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("PROCESS_ENGINE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<EngineConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = EngineConfig::load_env_file();
        EngineConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static EngineConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration and logging (called at startup)
pub fn init_config() -> Result<&'static EngineConfig> {
    EngineConfig::load_env_file()?;
    let config = config()?;
    crate::telemetry::init_telemetry(&config.observability)?;
    tracing::debug!(
        max_gateway_hops = config.engine.max_gateway_hops,
        json_logs = config.observability.json_logs,
        "Configuration loaded successfully"
    );
    Ok(config)
}
