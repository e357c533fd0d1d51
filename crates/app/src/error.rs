use engine::EngineError;
use signal_bot::PluginError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),
    #[error("settings error: {0}")]
    Settings(#[from] EngineError),
}
