//! `taskgate config`: the settings file at `~/.taskgate/config.toml`.
//!
//! Only two settings exist, the server URL and the bearer token. Flags and
//! `TASKGATE_*` environment variables take precedence over both.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::output::{self, OutputFormat};

/// A setting the CLI reads from its config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Base URL of the Taskgate server
    ApiUrl,
    /// Bearer token sent with every request
    Token,
}

impl ConfigKey {
    const ALL: [ConfigKey; 2] = [ConfigKey::ApiUrl, ConfigKey::Token];

    fn name(self) -> &'static str {
        match self {
            Self::ApiUrl => "api-url",
            Self::Token => "token",
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Store a setting
    Set {
        #[arg(value_enum)]
        key: ConfigKey,
        value: String,
    },

    /// Print one setting
    Get {
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Print every stored setting, token shortened
    Show,

    /// Delete the settings file
    Reset {
        /// Delete without asking
        #[arg(short, long)]
        force: bool,
    },
}

/// Contents of the settings file. Unknown entries are ignored on load.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

impl CliConfig {
    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        match key {
            ConfigKey::ApiUrl => self.api_url.as_deref(),
            ConfigKey::Token => self.token.as_deref(),
        }
    }

    pub fn set(&mut self, key: ConfigKey, value: String) {
        let slot = match key {
            ConfigKey::ApiUrl => &mut self.api_url,
            ConfigKey::Token => &mut self.token,
        };
        *slot = Some(value);
    }
}

fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("No home directory to keep CLI settings in")?;
    Ok(home.join(".taskgate").join("config.toml"))
}

/// The stored settings; empty when nothing has been saved yet.
pub(crate) fn load_config() -> Result<CliConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("{} is not valid TOML", path.display()))
}

pub(crate) fn save_config(cfg: &CliConfig) -> Result<()> {
    let path = config_path()?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create {}", dir.display()))?;
    }
    let text = toml::to_string_pretty(cfg).context("Cannot encode CLI settings")?;
    std::fs::write(&path, text).with_context(|| format!("Cannot write {}", path.display()))
}

/// A stored setting, or `None` if it is unset or the file is unreadable.
pub fn lookup(key: ConfigKey) -> Option<String> {
    load_config().ok()?.get(key).map(str::to_owned)
}

/// Tokens are shown as their first six and last four characters.
fn display_value(key: ConfigKey, value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if key != ConfigKey::Token || chars.len() <= 12 {
        return value.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

fn print_setting(key: ConfigKey, value: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => output::print_detail(key.name(), value),
        _ => output::print_serialized(
            &serde_json::json!({ "key": key.name(), "value": value }),
            format,
        )?,
    }
    Ok(())
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Set { key, value } => {
            let mut cfg = load_config()?;
            let shown = display_value(key, &value);
            cfg.set(key, value);
            save_config(&cfg)?;
            print_setting(key, &shown, format)?;
            if matches!(format, OutputFormat::Table) {
                output::print_success(&format!("Saved {}", key.name()));
            }
        }

        ConfigCommands::Get { key } => match load_config()?.get(key) {
            Some(value) if matches!(format, OutputFormat::Table) => println!("{value}"),
            Some(value) => print_setting(key, value, format)?,
            None => output::print_error(&format!("{} is not set", key.name())),
        },

        ConfigCommands::Show => {
            let cfg = load_config()?;
            let stored: Vec<(ConfigKey, String)> = ConfigKey::ALL
                .into_iter()
                .filter_map(|key| cfg.get(key).map(|v| (key, display_value(key, v))))
                .collect();

            if stored.is_empty() {
                output::print_info("No settings stored.");
                return Ok(());
            }
            match format {
                OutputFormat::Table => {
                    output::print_header("CLI settings");
                    for (key, value) in &stored {
                        output::print_detail(key.name(), value);
                    }
                }
                _ => {
                    let map: serde_json::Map<String, serde_json::Value> = stored
                        .into_iter()
                        .map(|(key, value)| (key.name().to_string(), value.into()))
                        .collect();
                    output::print_serialized(&map, format)?;
                }
            }
        }

        ConfigCommands::Reset { force } => {
            if !force {
                output::print_info("Pass --force to delete the stored settings.");
                return Ok(());
            }
            let path = config_path()?;
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Cannot remove {}", path.display()))?;
            }
            output::print_success("Stored settings deleted");
        }
    }

    Ok(())
}
