use crate::commands::{Command, CostLine, Identity};

#[derive(Debug, PartialEq, thiserror::Error)]
pub(crate) enum ParseError {
    #[error("First parameter must be numeric")]
    InvalidAmount,
    #[error("Need exactly 2 parameters")]
    AddUserArity,
    #[error("Ratios must contain exactly one = sign")]
    RatioSeparator,
    #[error("Users and ratios don't occur in same number")]
    RatioCount,
    #[error("{0} is not numeric")]
    RatioNotNumeric(String),
    #[error("{0} is negative")]
    RatioNegative(String),
    #[error("There must be at least one non-zero value in ratios")]
    RatioAllZero,
    #[error("Invalid command (or not yet implemented)")]
    UnknownCommand,
}

/// Parses one line of a message.
///
/// Returns `Ok(None)` for lines that are ignored: empty lines and lines
/// starting with `.`.
pub(crate) fn parse_line(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('.') {
        return Ok(None);
    }

    if line.starts_with(|c: char| c.is_ascii_digit()) {
        return parse_cost(line).map(|cost| Some(Command::AddCost(cost)));
    }

    let mut tokens = line.split_whitespace();
    let command = match tokens.next() {
        Some("help") => Command::Help,
        Some("adduser") => {
            let rest = line.strip_prefix("adduser").unwrap_or_default();
            parse_add_user(rest)?
        }
        Some("listusers") => Command::ListUsers,
        Some("closeusers") => Command::CloseUsers,
        Some("status") => Command::Status,
        Some("exportcsv") => Command::ExportCsv,
        _ => return Err(ParseError::UnknownCommand),
    };
    Ok(Some(command))
}

/// `adduser <name> <number|myself>`. Arguments may be separated by spaces or
/// commas.
fn parse_add_user(args: &str) -> Result<Command, ParseError> {
    let params: Vec<&str> = args
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .collect();
    let [name, identity] = params.as_slice() else {
        return Err(ParseError::AddUserArity);
    };

    let identity = match *identity {
        "myself" => Identity::Myself,
        other => Identity::Explicit(other.to_string()),
    };
    Ok(Command::AddUser {
        name: name.to_string(),
        identity,
    })
}

fn parse_cost(line: &str) -> Result<CostLine, ParseError> {
    // Fields past the fourth are ignored.
    let mut params = line.split(',').map(str::trim);

    let amount = params
        .next()
        .and_then(|a| a.parse::<f64>().ok())
        .filter(|a| a.is_finite())
        .ok_or(ParseError::InvalidAmount)?;
    let note = params
        .next()
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    let payer = params
        .next()
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    let shares = params.next().map(str::to_string);

    Ok(CostLine {
        amount,
        note,
        payer,
        shares,
    })
}

/// `u1:u2:..:un=v1:v2:..:vn`
pub(crate) fn parse_shares(expr: &str) -> Result<Vec<(String, f64)>, ParseError> {
    let Some((users, values)) = expr.split_once('=') else {
        return Err(ParseError::RatioSeparator);
    };
    if values.contains('=') {
        return Err(ParseError::RatioSeparator);
    }

    let users: Vec<&str> = users.trim().split(':').map(str::trim).collect();
    let values: Vec<&str> = values.trim().split(':').map(str::trim).collect();
    if users.len() != values.len() {
        return Err(ParseError::RatioCount);
    }

    let mut shares = Vec::with_capacity(users.len());
    for (user, value) in users.into_iter().zip(values) {
        let ratio = value
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite())
            .ok_or_else(|| ParseError::RatioNotNumeric(value.to_string()))?;
        if ratio < 0.0 {
            return Err(ParseError::RatioNegative(value.to_string()));
        }
        shares.push((user.to_string(), ratio));
    }

    if shares.iter().all(|(_, ratio)| *ratio == 0.0) {
        return Err(ParseError::RatioAllZero);
    }
    Ok(shares)
}
