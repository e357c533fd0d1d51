//! Group identity.
//!
//! A group conversation is identified by the ids of its members. The ids are
//! joined with `-` into a key that names every file of the group.

use std::fmt;

use serde::Deserialize;

/// How member ids are ordered before being joined into a [`GroupKey`].
///
/// With [`AsReceived`] two messages listing the same members in a different
/// order address two different ledgers. [`Sorted`] makes the key independent
/// of member order, but it renames the files of groups created with the
/// other policy.
///
/// [`AsReceived`]: GroupKeyOrdering::AsReceived
/// [`Sorted`]: GroupKeyOrdering::Sorted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKeyOrdering {
    #[default]
    AsReceived,
    Sorted,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupKey(String);

impl GroupKey {
    /// Build the key from the member ids of a group message.
    pub fn new(members: &[i64], ordering: GroupKeyOrdering) -> Self {
        let mut members = members.to_vec();
        if ordering == GroupKeyOrdering::Sorted {
            members.sort_unstable();
        }
        let key = members
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join("-");
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_are_joined_in_received_order() {
        let key = GroupKey::new(&[3, 1, 2], GroupKeyOrdering::AsReceived);
        assert_eq!(key.as_str(), "3-1-2");
    }

    #[test]
    fn sorted_ordering_ignores_member_order() {
        let a = GroupKey::new(&[3, 1, 2], GroupKeyOrdering::Sorted);
        let b = GroupKey::new(&[2, 3, 1], GroupKeyOrdering::Sorted);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "1-2-3");
    }

    #[test]
    fn negative_ids_keep_their_sign() {
        let key = GroupKey::new(&[-7, 12], GroupKeyOrdering::AsReceived);
        assert_eq!(key.as_str(), "-7-12");
    }
}
