//! Shared-expense bookkeeping for group chats.
//!
//! Every line of a group message is a command. Lines are handled one by one
//! against the same [`GroupSession`]: a rejected line is answered with an
//! error and the next line is processed anyway. Storage failures abort the
//! rest of the message.

use std::path::PathBuf;

use engine::{
    EngineError, ExportZone, GroupKey, GroupKeyOrdering, GroupSession, GroupStore, NewCost,
};

use crate::{
    Attachment, Message, Outbox, Plugin, PluginError, Reply,
    commands::{Command, CostLine, HELP, Identity},
    parsing::{parse_line, parse_shares},
};

#[derive(Clone, Debug)]
pub struct SplitConfig {
    pub data_dir: PathBuf,
    pub group_key: GroupKeyOrdering,
    pub zone: ExportZone,
}

impl SplitConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            group_key: GroupKeyOrdering::default(),
            zone: ExportZone::default(),
        }
    }
}

#[derive(Debug)]
pub struct Split {
    store: GroupStore,
    group_key: GroupKeyOrdering,
    zone: ExportZone,
}

/// What a command needs to know about the message it came from.
#[derive(Clone, Copy, Debug)]
struct LineContext<'a> {
    sender: &'a str,
    timestamp: i64,
}

impl Split {
    pub fn new(config: SplitConfig) -> Result<Self, PluginError> {
        if !config.data_dir.is_dir() {
            return Err(PluginError::Config(format!(
                "split data dir {} does not exist",
                config.data_dir.display()
            )));
        }

        Ok(Self {
            store: GroupStore::new(config.data_dir),
            group_key: config.group_key,
            zone: config.zone,
        })
    }

    fn process_line(
        &self,
        session: &mut GroupSession,
        ctx: LineContext<'_>,
        line: &str,
    ) -> Result<Option<Reply>, EngineError> {
        let command = match parse_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::warn!("rejected line from {}: {err}", ctx.sender);
                return Ok(Some(Reply::error(&err.to_string())));
            }
        };

        match self.execute(session, ctx, command) {
            Ok(reply) => Ok(Some(reply)),
            Err(err) if err.is_user_error() => {
                tracing::warn!("rejected command from {}: {err}", ctx.sender);
                Ok(Some(Reply::error(&err.to_string())))
            }
            Err(err) => Err(err),
        }
    }

    fn execute(
        &self,
        session: &mut GroupSession,
        ctx: LineContext<'_>,
        command: Command,
    ) -> Result<Reply, EngineError> {
        match command {
            Command::AddCost(cost) => add_cost(session, ctx, cost),
            Command::Help => Ok(Reply::text(HELP)),
            Command::AddUser { name, identity } => {
                let identity = match identity {
                    Identity::Myself => ctx.sender.to_string(),
                    Identity::Explicit(identity) => identity,
                };
                session.add_user(&name, &identity)?;
                Ok(Reply::success(&format!("User {name} added")))
            }
            Command::ListUsers => Ok(Reply::text(list_users(session))),
            Command::CloseUsers => {
                session.close_users()?;
                Ok(Reply::success("Users closed"))
            }
            Command::Status => status(session),
            Command::ExportCsv => {
                let path = session.export(self.zone)?;
                Ok(Reply::text("Exported CSV is attached")
                    .with_attachment(Attachment::transient(path)))
            }
        }
    }
}

impl Plugin for Split {
    fn name(&self) -> &str {
        "split"
    }

    fn receive(&mut self, message: &Message, outbox: &mut Outbox) -> Result<(), PluginError> {
        // Direct messages have no ledger.
        if !message.is_group() {
            return Ok(());
        }

        let key = GroupKey::new(&message.group_id, self.group_key);
        let mut session = self.store.open(&key)?;
        let ctx = LineContext {
            sender: &message.sender,
            timestamp: message.timestamp,
        };

        for line in message.text.lines() {
            tracing::debug!("group {key}: {line}");
            if let Some(reply) = self.process_line(&mut session, ctx, line)? {
                outbox.send(reply);
            }
        }

        session.commit()?;
        Ok(())
    }
}

fn add_cost(
    session: &mut GroupSession,
    ctx: LineContext<'_>,
    cost: CostLine,
) -> Result<Reply, EngineError> {
    let registry = session.registry();
    if !registry.is_closed() {
        return Err(EngineError::State(
            "Please close users before adding costs".to_string(),
        ));
    }

    let ratios = match cost.shares.as_deref() {
        Some(expr) => {
            let shares =
                parse_shares(expr).map_err(|err| EngineError::Validation(err.to_string()))?;
            registry.ratios_from_shares(&shares)?
        }
        None => vec![1.0; registry.len()],
    };

    session.add_cost(NewCost {
        timestamp: ctx.timestamp,
        amount: cost.amount,
        note: cost.note,
        payer: cost.payer.unwrap_or_else(|| ctx.sender.to_string()),
        ratios,
    })?;
    Ok(Reply::success("Cost added"))
}

fn list_users(session: &GroupSession) -> String {
    let registry = session.registry();
    let mut lines = vec![if registry.is_closed() {
        "Users (closed):".to_string()
    } else {
        "Users (open):".to_string()
    }];

    for (identity, user) in registry.list() {
        match user.pos {
            Some(pos) if registry.is_closed() => {
                lines.push(format!("{pos} {} {identity}", user.name));
            }
            _ => lines.push(format!("{} {identity}", user.name)),
        }
    }
    lines.join("\n")
}

fn status(session: &GroupSession) -> Result<Reply, EngineError> {
    let balances = session.balances()?;
    let registry = session.registry();

    let mut lines = vec!["Status (actual - goal):".to_string()];
    for (identity, user) in registry.list() {
        let saldo = registry
            .position_of(identity)
            .and_then(|pos| balances.saldo(pos))
            .ok_or_else(|| EngineError::CorruptLedger(format!("{identity} has no position")))?;
        lines.push(format!("{} {saldo:+.2}", user.name));
    }
    Ok(Reply::text(lines.join("\n")))
}
