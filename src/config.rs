use serde::Deserialize;
use std::{fs, path::PathBuf, error::Error};

/// Returns the path to the user's data directory for homebrew-setup.
pub fn get_user_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|path| path.join(".local/share/homebrew-setup"))
}

/// Gets the full path to the config.toml file.
fn get_config_path() -> Result<PathBuf, Box<dyn Error>> {
    let mut config_path = get_user_data_dir().ok_or("Could not find user's data directory.")?;
    config_path.push("config.toml");
    Ok(config_path)
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Root of the removable storage everything is installed onto
    pub storage_root: PathBuf,
    /// Directory holding the bundled trust anchors (*.pem)
    pub cert_dir: PathBuf,
    /// Replaces the built-in profile table when set
    pub profiles_file: Option<PathBuf>,
    /// Runs this profile straight away instead of showing the menu
    pub auto_profile: Option<String>,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub resolution: String,
    pub fullscreen: bool,
    pub font_color: String,
    pub console_lines: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("/vol/external01"),
            cert_dir: PathBuf::from("romfs"),
            profiles_file: None,
            auto_profile: None,
            user_agent: format!("homebrew-setup/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 30,
            resolution: "854x480".to_string(),
            fullscreen: false,
            font_color: "WHITE".to_string(),
            console_lines: 16,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from config.toml, or returns a default if it fails.
    pub fn load() -> Self {
        if let Ok(config_path) = get_config_path() {
            if let Ok(content) = fs::read_to_string(&config_path) {
                match Self::parse(&content) {
                    Ok(config) => return config,
                    // logging is not up yet when the window config is built
                    Err(e) => eprintln!("[Warn] Ignoring {}: {}", config_path.display(), e),
                }
            }
        }
        Self::default()
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        // a zero-line console cannot show anything
        config.console_lines = config.console_lines.max(4);
        Ok(config)
    }
}
