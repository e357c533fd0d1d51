//! Per-group user registry.
//!
//! Users are registered while the registry is open. Closing it assigns every
//! user a position, in registration order, and from then on costs can be
//! recorded against those positions. There is no way to reopen a registry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Characters the command grammar splits on, forbidden in names and
/// identities.
pub const RESERVED_DELIMITERS: [char; 2] = [',', ':'];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<usize>,
}

/// Persisted form: `{"closed": bool, "users": {identity: {name, pos?}}}`.
///
/// `users` keeps insertion order, both in memory and on disk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRegistry {
    closed: bool,
    users: IndexMap<String, User>,
}

fn has_reserved_delimiter(value: &str) -> bool {
    value.contains(RESERVED_DELIMITERS)
}

impl UserRegistry {
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Register `name` for `identity`. Registering an identity again while
    /// open renames it in place, keeping its place in the order.
    pub fn add_user(&mut self, name: &str, identity: &str) -> ResultEngine<()> {
        if self.closed {
            return Err(EngineError::State("Users are closed".to_string()));
        }
        if has_reserved_delimiter(name) || has_reserved_delimiter(identity) {
            return Err(EngineError::Validation(
                "No commas and colons allowed in names".to_string(),
            ));
        }
        if self.users.values().any(|user| user.name == name) {
            return Err(EngineError::Validation(
                "User name already exists".to_string(),
            ));
        }

        self.users.insert(
            identity.to_string(),
            User {
                name: name.to_string(),
                pos: None,
            },
        );
        Ok(())
    }

    pub fn close(&mut self) -> ResultEngine<()> {
        if self.closed {
            return Err(EngineError::State("Users are already closed".to_string()));
        }

        for (pos, user) in self.users.values_mut().enumerate() {
            user.pos = Some(pos);
        }
        self.closed = true;
        Ok(())
    }

    /// Resolve an identity or, failing that, a user name.
    pub fn lookup(&self, value: &str) -> ResultEngine<(&str, &User)> {
        if let Some((identity, user)) = self.users.get_key_value(value) {
            return Ok((identity.as_str(), user));
        }

        self.users
            .iter()
            .find(|(_, user)| user.name == value)
            .map(|(identity, user)| (identity.as_str(), user))
            .ok_or_else(|| EngineError::NotFound(format!("User not found {value}")))
    }

    /// Users in registration order, as `(identity, user)`.
    pub fn list(&self) -> impl Iterator<Item = (&str, &User)> {
        self.users
            .iter()
            .map(|(identity, user)| (identity.as_str(), user))
    }

    /// Position of an identity, once closed.
    pub fn position_of(&self, identity: &str) -> Option<usize> {
        self.users.get(identity).and_then(|user| user.pos)
    }

    /// User names indexed by position.
    pub fn names_by_position(&self) -> ResultEngine<Vec<&str>> {
        self.ensure_closed("Please close users first")?;

        let mut names = vec![""; self.users.len()];
        for user in self.users.values() {
            if let Some(slot) = user.pos.and_then(|pos| names.get_mut(pos)) {
                *slot = user.name.as_str();
            }
        }
        Ok(names)
    }

    /// Build a ratio vector from `(user, share)` pairs. Users not mentioned
    /// get a share of 0.
    pub fn ratios_from_shares(&self, shares: &[(String, f64)]) -> ResultEngine<Vec<f64>> {
        self.ensure_closed("Please close users before adding costs")?;

        let mut ratios = vec![0.0; self.users.len()];
        for (reference, share) in shares {
            let (identity, _) = self.lookup(reference)?;
            let pos = self.position_of(identity).ok_or_else(|| {
                EngineError::State(format!("User {reference} has no position"))
            })?;
            ratios[pos] = *share;
        }
        Ok(ratios)
    }

    pub(crate) fn ensure_closed(&self, message: &str) -> ResultEngine<()> {
        if self.closed {
            Ok(())
        } else {
            Err(EngineError::State(message.to_string()))
        }
    }
}
