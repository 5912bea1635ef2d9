use crate::domain::config::{
    ConnectionConfig, GlobalConfig, LegacySettings, ProfileConfig, ProtocolKind, SessionSettings, SimConfig,
};
use crate::domain::error::{SimError, SimResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const CONFIG_DIR_NAME: &str = "analyzersim";
const PROJECT_DIR_NAME: &str = ".analyzersim";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> SimResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Manager rooted at explicit paths
    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    /// Load configuration from files
    ///
    /// Global settings come from the user config; profiles from both files,
    /// project profiles shadowing global ones of the same name.
    pub fn load_config(&self) -> SimResult<SimConfig> {
        let mut config = SimConfig::default();

        if self.global_config_path.exists() {
            let global_config = self.load_config_from_path(&self.global_config_path)?;
            config.global = global_config.global;
            config.profiles = global_config.profiles;
        }

        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                let project_config = self.load_config_from_path(project_path)?;
                for profile in project_config.profiles {
                    config.profiles.retain(|p| p.name != profile.name);
                    config.profiles.push(profile);
                }
            }
        }

        Ok(config)
    }

    /// Get global configuration path
    fn get_global_config_path() -> SimResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| SimError::config("Could not determine home directory"))?;

        Ok(home.join(".config").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(PROJECT_DIR_NAME).join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> SimResult<SimConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            SimError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: SimConfig = toml::from_str(&content).map_err(|e| {
            SimError::config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        for profile in &config.profiles {
            profile.settings.validate().map_err(|e| {
                SimError::config(format!("Profile '{}' in {}: {}", profile.name, path.display(), e.status_text()))
            })?;
        }
        Ok(config)
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &SimConfig) -> SimResult<()> {
        let content = toml::to_string_pretty(config)
            .map_err(|e| SimError::config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SimError::config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content).map_err(|e| {
            SimError::config(format!("Failed to write config file {}: {}", path.display(), e))
        })
    }

    /// Create default project configuration
    pub fn init_project_config(&self, path: &Path) -> SimResult<PathBuf> {
        let config_file = path.join(PROJECT_DIR_NAME).join(CONFIG_FILE_NAME);

        if config_file.exists() {
            return Err(SimError::config("Project configuration already exists"));
        }

        let default_config = SimConfig {
            global: GlobalConfig::default(),
            profiles: vec![
                ProfileConfig {
                    name: "lis-client".to_string(),
                    description: "Analyzer connecting to a LIS listening on port 5000".to_string(),
                    settings: SessionSettings::new(
                        ProtocolKind::Astm,
                        ConnectionConfig::tcp_client("localhost", 5000),
                    ),
                },
                ProfileConfig {
                    name: "lis-server".to_string(),
                    description: "Analyzer waiting for the LIS on port 5000, auto-acknowledging".to_string(),
                    settings: SessionSettings::new(ProtocolKind::Hl7, ConnectionConfig::tcp_server(5000))
                        .with_auto_respond(true),
                },
                ProfileConfig {
                    name: "bench-serial".to_string(),
                    description: "Analyzer on a serial line".to_string(),
                    settings: SessionSettings::new(
                        ProtocolKind::Astm,
                        ConnectionConfig::serial("/dev/ttyUSB0", 9600),
                    ),
                },
            ],
        };

        self.save_config_to_path(&config_file, &default_config)?;
        info!("Created project configuration at {}", config_file.display());

        Ok(config_file)
    }

    /// Get the current project config path (if any)
    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Get the global config path
    pub fn get_global_config_path_ref(&self) -> &PathBuf {
        &self.global_config_path
    }
}

/// Look up a profile by name
pub fn find_profile<'a>(config: &'a SimConfig, name: &str) -> SimResult<&'a ProfileConfig> {
    config
        .profiles
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| SimError::config(format!("Profile '{}' not found", name)))
}

/// JSON files holding one session's settings
pub struct SettingsStore;

impl SettingsStore {
    pub fn save(path: &Path, settings: &SessionSettings) -> SimResult<()> {
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| SimError::config(format!("Failed to serialize settings: {}", e)))?;

        fs::write(path, content).map_err(|e| {
            SimError::config(format!("Failed to write settings file {}: {}", path.display(), e))
        })?;

        info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> SimResult<SessionSettings> {
        let content = fs::read_to_string(path).map_err(|e| {
            SimError::config(format!("Failed to read settings file {}: {}", path.display(), e))
        })?;

        let settings: SessionSettings = serde_json::from_str(&content).map_err(|e| {
            SimError::config(format!("Failed to parse settings file {}: {}", path.display(), e))
        })?;
        settings.validate()?;

        info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Read a settings file written by the desktop simulator.
    pub fn import_legacy(path: &Path) -> SimResult<SessionSettings> {
        let content = fs::read_to_string(path).map_err(|e| {
            SimError::config(format!("Failed to read settings file {}: {}", path.display(), e))
        })?;

        let legacy: LegacySettings = serde_json::from_str(&content).map_err(|e| {
            SimError::config(format!("Failed to parse legacy settings {}: {}", path.display(), e))
        })?;

        SessionSettings::try_from(legacy)
    }
}
