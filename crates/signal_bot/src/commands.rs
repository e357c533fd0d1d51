//! Line commands understood by the split plugin.

/// Who a new user is.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Identity {
    /// The sender of the message.
    Myself,
    Explicit(String),
}

/// `amount[, note[, payer[, u:s:e:r=1:2:3:4]]]`
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CostLine {
    pub amount: f64,
    pub note: Option<String>,
    /// Identity or name; the sender when absent.
    pub payer: Option<String>,
    /// Raw `u:s:e:r=1:2:3:4` expression; an equal split when absent. Parsed
    /// only once the registry is known to be closed.
    pub shares: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Command {
    AddCost(CostLine),
    Help,
    AddUser { name: String, identity: Identity },
    ListUsers,
    CloseUsers,
    Status,
    ExportCsv,
}

pub(crate) const HELP: &str = "HELP
  Available line commands:

  12.34, [note]
  12.34, [note], [user]
  12.34, [note], [user], [u:s:e:r=1:2:3:4]

  . [text ignored by splitbot]

  exportcsv

  adduser [name] [number]
  adduser [name] myself
  listusers
  closeusers

  help

  status";
