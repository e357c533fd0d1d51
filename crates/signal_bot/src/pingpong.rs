use crate::{Message, Outbox, Plugin, PluginError, Reply};

/// Answers `pong` to `ping`. Handy to check the bot is alive.
#[derive(Debug, Default)]
pub struct PingPong;

impl Plugin for PingPong {
    fn name(&self) -> &str {
        "pingpong"
    }

    fn receive(&mut self, message: &Message, outbox: &mut Outbox) -> Result<(), PluginError> {
        if message.text == "ping" {
            outbox.send(Reply::text("pong"));
        }
        Ok(())
    }
}
