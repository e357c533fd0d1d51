//! Chat bot core.
//!
//! The bot does not talk to any messaging backend itself: the transport
//! hands it one [`Message`] at a time and delivers the [`Outbound`] replies
//! it returns. Behavior lives in [`Plugin`]s, registered by name when the bot
//! is built.

use std::{
    fs,
    path::{Path, PathBuf},
};

pub use error::PluginError;
pub use pingpong::PingPong;
pub use split::{Split, SplitConfig};

mod commands;
mod error;
mod parsing;
mod pingpong;
mod split;

/// An inbound chat message.
#[derive(Clone, Debug, Default)]
pub struct Message {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub sender: String,
    /// Members of the group, empty for a direct message.
    pub group_id: Vec<i64>,
    pub text: String,
    pub attachments: Vec<PathBuf>,
}

impl Message {
    pub fn is_group(&self) -> bool {
        !self.group_id.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipient {
    Group(Vec<i64>),
    Direct(String),
}

impl Recipient {
    /// Replies go back to the group, or to the sender of a direct message.
    pub fn for_message(message: &Message) -> Self {
        if message.is_group() {
            Self::Group(message.group_id.clone())
        } else {
            Self::Direct(message.sender.clone())
        }
    }
}

/// A file sent along with a reply.
///
/// The attachment owns its file: it is deleted from disk when dropped, that
/// is once the transport is done with it.
#[derive(Debug)]
pub struct Attachment {
    path: PathBuf,
}

impl Attachment {
    pub fn transient(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(
                "failed to remove attachment {}: {err}",
                self.path.display()
            );
        }
    }
}

#[derive(Debug)]
pub struct Reply {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn success(message: &str) -> Self {
        Self::text(format!("{message} ✔"))
    }

    pub fn error(message: &str) -> Self {
        Self::text(format!("{message} ❌"))
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// A reply with its destination.
#[derive(Debug)]
pub struct Outbound {
    pub recipient: Recipient,
    pub reply: Reply,
}

/// Replies queued while one message is handled.
#[derive(Debug)]
pub struct Outbox {
    recipient: Recipient,
    queued: Vec<Outbound>,
}

impl Outbox {
    pub fn for_message(message: &Message) -> Self {
        Self {
            recipient: Recipient::for_message(message),
            queued: Vec::new(),
        }
    }

    pub fn send(&mut self, reply: Reply) {
        self.queued.push(Outbound {
            recipient: self.recipient.clone(),
            reply,
        });
    }

    pub fn into_outbound(self) -> Vec<Outbound> {
        self.queued
    }
}

/// A capability of the bot.
pub trait Plugin {
    fn name(&self) -> &str;

    /// Handle one message, queueing replies in `outbox`.
    ///
    /// Replies queued before an error are still delivered.
    fn receive(&mut self, message: &Message, outbox: &mut Outbox) -> Result<(), PluginError>;
}

pub struct Bot {
    plugins: Vec<Box<dyn Plugin>>,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    /// Offer `message` to every plugin, in registration order.
    pub fn receive(&mut self, message: &Message) -> Vec<Outbound> {
        let mut outbox = Outbox::for_message(message);
        for plugin in &mut self.plugins {
            if let Err(err) = plugin.receive(message, &mut outbox) {
                tracing::error!(
                    "plugin {} failed on message from {}: {err}",
                    plugin.name(),
                    message.sender
                );
            }
        }
        outbox.into_outbound()
    }
}

#[derive(Default, Debug)]
pub struct BotBuilder {
    plugins: Vec<String>,
    split: Option<SplitConfig>,
}

impl BotBuilder {
    pub fn plugins<I, S>(mut self, names: I) -> BotBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plugins.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn split(mut self, config: SplitConfig) -> BotBuilder {
        self.split = Some(config);
        self
    }

    pub fn build(self) -> Result<Bot, PluginError> {
        tracing::info!("Initializing bot...");
        let mut plugins: Vec<Box<dyn Plugin>> = Vec::with_capacity(self.plugins.len());
        for name in &self.plugins {
            let plugin: Box<dyn Plugin> = match name.as_str() {
                "split" => {
                    let config = self.split.clone().ok_or_else(|| {
                        PluginError::Config("Please specify split data dir!".to_string())
                    })?;
                    Box::new(Split::new(config)?)
                }
                "pingpong" => Box::new(PingPong),
                other => {
                    return Err(PluginError::Config(format!("unknown plugin: {other}")));
                }
            };
            tracing::info!("Loaded plugin {name}");
            plugins.push(plugin);
        }
        Ok(Bot { plugins })
    }
}
