//! Handles settings for the application.
//!
//! Settings are read, in increasing priority, from the TOML file
//! (`config/splitbot.toml` unless `--config` is given), from `SPLITBOT__*`
//! environment variables and from the command line.
//!
//! ```toml
//! level = "info"
//! plugins = ["split", "pingpong"]
//!
//! [split]
//! data_dir = "data"
//! group_key = "as_received" # or "sorted"
//! timezone = "Europe/Rome"  # host time zone when absent
//! ```
use std::path::PathBuf;

use clap::Parser;
use engine::{ExportZone, GroupKeyOrdering};
use serde::Deserialize;
use signal_bot::SplitConfig;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/splitbot";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub level: String,
    pub plugins: Vec<String>,
    pub split: Option<Split>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            plugins: vec!["split".to_string()],
            split: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Split {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub group_key: GroupKeyOrdering,
    pub timezone: Option<String>,
}

impl Split {
    fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            group_key: GroupKeyOrdering::default(),
            timezone: None,
        }
    }

    pub fn to_config(&self) -> Result<SplitConfig> {
        let zone = match self.timezone.as_deref() {
            Some(name) => ExportZone::from_name(name)?,
            None => ExportZone::Local,
        };
        Ok(SplitConfig {
            data_dir: self.data_dir.clone(),
            group_key: self.group_key,
            zone,
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "splitbot", about = "Shared-expense bot for group chats")]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Data directory of the split plugin.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    level: Option<String>,
    /// Plugins to load, in dispatch order (split, pingpong).
    plugins: Vec<String>,
}

pub fn load() -> Result<Settings> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("SPLITBOT").separator("__"));
    let mut settings: Settings = builder.build()?.try_deserialize()?;

    if let Some(level) = args.level {
        settings.level = level;
    }
    if !args.plugins.is_empty() {
        settings.plugins = args.plugins;
    }
    if let Some(data_dir) = args.data_dir {
        match settings.split.as_mut() {
            Some(split) => split.data_dir = data_dir,
            None => settings.split = Some(Split::new(data_dir)),
        }
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(raw: &str) -> Settings {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_load_split_only() {
        let settings = from_toml("");
        assert_eq!(settings.level, "info");
        assert_eq!(settings.plugins, vec!["split"]);
        assert!(settings.split.is_none());
    }

    #[test]
    fn split_section_becomes_plugin_config() {
        let settings = from_toml(
            r#"
            plugins = ["split", "pingpong"]

            [split]
            data_dir = "/var/lib/splitbot"
            group_key = "sorted"
            timezone = "Europe/Rome"
            "#,
        );
        let config = settings.split.unwrap().to_config().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/splitbot"));
        assert_eq!(config.group_key, GroupKeyOrdering::Sorted);
        assert_eq!(config.zone, ExportZone::from_name("Europe/Rome").unwrap());
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        let split = Split {
            timezone: Some("Nowhere/Special".to_string()),
            ..Split::new(PathBuf::from("data"))
        };
        assert!(split.to_config().is_err());
    }
}
