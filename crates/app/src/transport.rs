//! JSON-lines transport over stdin/stdout.
//!
//! Every input line is one inbound message:
//!
//! ```json
//! {"timestamp": 1700000000000, "sender": "+391234", "group_id": [1, 2], "message": "status", "attachments": []}
//! ```
//!
//! Every output line is one reply. Attachments are inlined as base64 and
//! transient ones are removed from disk right after being written out.

use std::{
    fs,
    io::{BufRead, Write},
    path::PathBuf,
};

use base64::Engine;
use serde::{Deserialize, Serialize};
use signal_bot::{Attachment, Bot, Message, Outbound, Recipient};

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct InboundMessage {
    timestamp: i64,
    sender: String,
    #[serde(default)]
    group_id: Vec<i64>,
    message: String,
    #[serde(default)]
    attachments: Vec<PathBuf>,
}

impl From<InboundMessage> for Message {
    fn from(inbound: InboundMessage) -> Self {
        Message {
            timestamp: inbound.timestamp,
            sender: inbound.sender,
            group_id: inbound.group_id,
            text: inbound.message,
            attachments: inbound.attachments,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum WireRecipient<'a> {
    Group(&'a [i64]),
    Direct(&'a str),
}

#[derive(Debug, Serialize)]
struct WireAttachment {
    file_name: String,
    content_base64: String,
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    recipient: WireRecipient<'a>,
    text: &'a str,
    attachments: Vec<WireAttachment>,
}

/// Feed every message of `input` to `bot` and write the replies to `output`
/// until `input` is exhausted.
pub fn run<R: BufRead, W: Write>(bot: &mut Bot, input: R, mut output: W) -> Result<()> {
    tracing::info!("Waiting for messages on stdin...");
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let inbound: InboundMessage = match serde_json::from_str(&line) {
            Ok(inbound) => inbound,
            Err(err) => {
                tracing::warn!("skipping malformed message: {err}");
                continue;
            }
        };

        let message = Message::from(inbound);
        for outbound in bot.receive(&message) {
            deliver(&mut output, outbound)?;
        }
    }
    Ok(())
}

fn deliver<W: Write>(output: &mut W, outbound: Outbound) -> Result<()> {
    // An unreadable attachment is dropped, the reply text still goes out.
    let attachments = outbound
        .reply
        .attachments
        .iter()
        .filter_map(|attachment| match encode_attachment(attachment) {
            Ok(wire) => Some(wire),
            Err(err) => {
                tracing::error!(
                    "failed to read attachment {}: {err}",
                    attachment.path().display()
                );
                None
            }
        })
        .collect();

    let recipient = match &outbound.recipient {
        Recipient::Group(members) => WireRecipient::Group(members),
        Recipient::Direct(sender) => WireRecipient::Direct(sender),
    };
    let wire = OutboundMessage {
        recipient,
        text: &outbound.reply.text,
        attachments,
    };

    serde_json::to_writer(&mut *output, &wire)?;
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}

fn encode_attachment(attachment: &Attachment) -> Result<WireAttachment> {
    let content = fs::read(attachment.path())?;
    Ok(WireAttachment {
        file_name: attachment.file_name().unwrap_or("attachment").to_string(),
        content_base64: base64::prelude::BASE64_STANDARD.encode(content),
    })
}
