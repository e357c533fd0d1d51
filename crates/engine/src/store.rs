//! File-backed group state.
//!
//! Every group lives in the data directory as two files:
//!
//! - `users-<key>.json`: the [`UserRegistry`], rewritten as a whole;
//! - `amounts-<key>.csv`: the [`Ledger`], append only.
//!
//! A [`GroupSession`] holds the registry of one group for the duration of one
//! inbound message. Registry changes are written once, when the session is
//! committed or dropped, and only if something changed. Ledger rows are
//! written immediately by [`GroupSession::add_cost`].
//!
//! There is no locking: sessions must be serialized by the caller.

use std::{
    fs::{self, File},
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::{
    Balances, CostEntry, ExportZone, GroupKey, Ledger, NewCost, ResultEngine, UserRegistry,
};

#[derive(Clone, Debug)]
pub struct GroupStore {
    data_dir: PathBuf,
}

impl GroupStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn users_path(&self, key: &GroupKey) -> PathBuf {
        self.data_dir.join(format!("users-{key}.json"))
    }

    pub fn amounts_path(&self, key: &GroupKey) -> PathBuf {
        self.data_dir.join(format!("amounts-{key}.csv"))
    }

    pub fn export_path(&self, key: &GroupKey) -> PathBuf {
        self.data_dir.join(format!("export-{key}.csv"))
    }

    /// Load the group's registry. A group without a registry file starts
    /// with an empty, open registry.
    pub fn open(&self, key: &GroupKey) -> ResultEngine<GroupSession> {
        let registry_path = self.users_path(key);
        let registry = load_registry(&registry_path)?;
        tracing::debug!(
            "opened group {key} ({} users, closed: {})",
            registry.len(),
            registry.is_closed()
        );

        Ok(GroupSession {
            key: key.clone(),
            registry,
            registry_path,
            ledger: Ledger::new(self.amounts_path(key)),
            export_path: self.export_path(key),
            dirty: false,
        })
    }
}

/// Exclusive handle on one group's state while a message is processed.
#[derive(Debug)]
pub struct GroupSession {
    key: GroupKey,
    registry: UserRegistry,
    registry_path: PathBuf,
    ledger: Ledger,
    export_path: PathBuf,
    dirty: bool,
}

impl GroupSession {
    pub fn registry(&self) -> &UserRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Whether the registry changed since the session was opened.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn add_user(&mut self, name: &str, identity: &str) -> ResultEngine<()> {
        self.registry.add_user(name, identity)?;
        self.dirty = true;
        Ok(())
    }

    pub fn close_users(&mut self) -> ResultEngine<()> {
        self.registry.close()?;
        self.dirty = true;
        Ok(())
    }

    pub fn add_cost(&mut self, cost: NewCost) -> ResultEngine<CostEntry> {
        self.ledger.add_entry(&self.registry, cost)
    }

    pub fn balances(&self) -> ResultEngine<Balances> {
        self.ledger.compute_balances(&self.registry)
    }

    /// Write the export table next to the group's files and return its path.
    /// The caller owns the file from then on.
    pub fn export(&self, zone: ExportZone) -> ResultEngine<PathBuf> {
        // Fail before touching the file system.
        self.registry.names_by_position()?;

        if let Err(err) = self.write_export(zone) {
            if let Err(remove_err) = fs::remove_file(&self.export_path)
                && remove_err.kind() != ErrorKind::NotFound
            {
                tracing::warn!(
                    "failed to remove partial export {}: {remove_err}",
                    self.export_path.display()
                );
            }
            return Err(err);
        }
        Ok(self.export_path.clone())
    }

    fn write_export(&self, zone: ExportZone) -> ResultEngine<()> {
        let file = File::create(&self.export_path)?;
        let mut writer = BufWriter::new(file);
        self.ledger.export(&self.registry, zone, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Persist pending registry changes and end the session.
    pub fn commit(mut self) -> ResultEngine<()> {
        self.persist()
    }

    fn persist(&mut self) -> ResultEngine<()> {
        if !self.dirty {
            return Ok(());
        }
        write_json_file(&self.registry_path, &self.registry)?;
        self.dirty = false;
        tracing::debug!("saved registry of group {}", self.key);
        Ok(())
    }
}

impl Drop for GroupSession {
    fn drop(&mut self) {
        if let Err(err) = self.persist() {
            tracing::error!("failed to save registry of group {}: {err}", self.key);
        }
    }
}

fn load_registry(path: &Path) -> ResultEngine<UserRegistry> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Ok(UserRegistry::default());
        }
        Err(err) => return Err(err.into()),
    };
    Ok(serde_json::from_str(&content)?)
}

fn write_json_file(path: &Path, registry: &UserRegistry) -> ResultEngine<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string(registry)?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(&tmp, path)?;
            let _ = fs::remove_file(&tmp);
            Ok(())
        }
    }
}
