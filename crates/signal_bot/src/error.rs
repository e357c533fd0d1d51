use engine::EngineError;
use thiserror::Error;

/// Errors escaping a plugin. User mistakes never end up here: they are
/// answered in the chat.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0}")]
    Config(String),
}
