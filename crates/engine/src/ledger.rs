//! Append-only cost ledger.
//!
//! Each group owns one CSV file without header. A row is
//! `timestamp, amount, note, payer, ratio_0, .., ratio_{n-1}` where `payer`
//! is the payer's identity and `n` is the number of users at close time.
//! Rows are appended and flushed to disk one at a time; nothing is ever
//! rewritten.

use std::{
    fs::{File, OpenOptions},
    io::{self, ErrorKind},
    path::PathBuf,
};

use chrono::{Local, TimeZone};
use chrono_tz::Tz;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, WriterBuilder};

use crate::{EngineError, ResultEngine, UserRegistry};

/// One immutable ledger row.
#[derive(Clone, Debug, PartialEq)]
pub struct CostEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub amount: f64,
    pub note: Option<String>,
    /// Payer identity.
    pub payer: String,
    /// One weight per user position.
    pub ratios: Vec<f64>,
}

/// A cost as submitted, before the payer is resolved.
#[derive(Clone, Debug)]
pub struct NewCost {
    pub timestamp: i64,
    pub amount: f64,
    pub note: Option<String>,
    /// Identity or name of the payer.
    pub payer: String,
    pub ratios: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Validate `cost` against `registry` and durably append it.
    pub fn add_entry(&self, registry: &UserRegistry, cost: NewCost) -> ResultEngine<CostEntry> {
        registry.ensure_closed("Please close users before adding costs")?;

        if !cost.amount.is_finite() {
            return Err(EngineError::Validation(
                "First parameter must be numeric".to_string(),
            ));
        }

        let (payer, _) = registry.lookup(&cost.payer)?;
        validate_ratios(&cost.ratios, registry.len())?;

        let entry = CostEntry {
            timestamp: cost.timestamp,
            amount: cost.amount,
            note: cost.note,
            payer: payer.to_string(),
            ratios: cost.ratios,
        };
        self.append(&entry)?;
        Ok(entry)
    }

    fn append(&self, entry: &CostEntry) -> ResultEngine<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        let mut record = vec![
            entry.timestamp.to_string(),
            entry.amount.to_string(),
            entry.note.clone().unwrap_or_default(),
            entry.payer.clone(),
        ];
        record.extend(entry.ratios.iter().map(f64::to_string));
        writer.write_record(&record)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        tracing::debug!(
            "appended cost {} paid by {} to {}",
            entry.amount,
            entry.payer,
            self.path.display()
        );
        Ok(())
    }

    /// Stream the entries in file order. A missing file is an empty ledger.
    pub fn entries(&self) -> ResultEngine<LedgerEntries> {
        let file = match File::open(&self.path) {
            Ok(file) => Some(file),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        let records = file.map(|file| {
            ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(file)
                .into_records()
        });
        Ok(LedgerEntries { records })
    }

    /// Net balance of every position: what each user paid minus their
    /// proportional share of every cost.
    pub fn compute_balances(&self, registry: &UserRegistry) -> ResultEngine<Balances> {
        registry.ensure_closed("Please close users first")?;

        let mut balances = Balances::zeroed(registry.len());
        for entry in self.entries()? {
            balances.apply(&entry?, registry)?;
        }
        Ok(balances)
    }

    /// Write the ledger as a CSV table with a `date, amount, note, payer,
    /// <names>` header. Dates are rendered in `zone`.
    pub fn export<W: io::Write>(
        &self,
        registry: &UserRegistry,
        zone: ExportZone,
        writer: W,
    ) -> ResultEngine<()> {
        let names = registry.names_by_position()?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

        let mut header = vec!["date", "amount", "note", "payer"];
        header.extend(names.iter().copied());
        writer.write_record(&header)?;

        for entry in self.entries()? {
            let entry = entry?;
            let payer = registry
                .list()
                .find(|(identity, _)| *identity == entry.payer)
                .map(|(_, user)| user.name.clone())
                .ok_or_else(|| {
                    EngineError::CorruptLedger(format!("unknown payer {}", entry.payer))
                })?;

            let mut row = vec![
                zone.render(entry.timestamp)?,
                entry.amount.to_string(),
                entry.note.unwrap_or_default(),
                payer,
            ];
            row.extend(entry.ratios.iter().map(f64::to_string));
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }
}

fn validate_ratios(ratios: &[f64], users: usize) -> ResultEngine<()> {
    if ratios.len() != users {
        return Err(EngineError::Validation(format!(
            "Expected {users} ratios, got {}",
            ratios.len()
        )));
    }
    for ratio in ratios {
        if !ratio.is_finite() {
            return Err(EngineError::Validation(format!("{ratio} is not numeric")));
        }
        if *ratio < 0.0 {
            return Err(EngineError::Validation(format!("{ratio} is negative")));
        }
    }
    if ratios.iter().sum::<f64>() <= 0.0 {
        return Err(EngineError::Validation(
            "There must be at least one non-zero value in ratios".to_string(),
        ));
    }
    Ok(())
}

/// Iterator over the rows of a ledger file.
pub struct LedgerEntries {
    records: Option<StringRecordsIntoIter<File>>,
}

impl Iterator for LedgerEntries {
    type Item = ResultEngine<CostEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.as_mut()?.next()?;
        Some(record.map_err(EngineError::from).and_then(|r| decode(&r)))
    }
}

fn decode(record: &StringRecord) -> ResultEngine<CostEntry> {
    let corrupt = || EngineError::CorruptLedger(format!("malformed row {record:?}"));
    if record.len() < 4 {
        return Err(corrupt());
    }

    let timestamp = parse_timestamp(&record[0]).ok_or_else(corrupt)?;
    let amount = record[1].trim().parse::<f64>().map_err(|_| corrupt())?;
    let note = Some(record[2].to_string()).filter(|note| !note.is_empty());
    let payer = record[3].to_string();
    let ratios = record
        .iter()
        .skip(4)
        .map(|value| value.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| corrupt())?;

    Ok(CostEntry {
        timestamp,
        amount,
        note,
        payer,
        ratios,
    })
}

fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|v| v as i64))
}

/// Paid and owed totals per position.
#[derive(Clone, Debug, PartialEq)]
pub struct Balances {
    pub paid_actual: Vec<f64>,
    pub paid_goal: Vec<f64>,
}

impl Balances {
    fn zeroed(users: usize) -> Self {
        Self {
            paid_actual: vec![0.0; users],
            paid_goal: vec![0.0; users],
        }
    }

    fn apply(&mut self, entry: &CostEntry, registry: &UserRegistry) -> ResultEngine<()> {
        let payer_pos = registry.position_of(&entry.payer).ok_or_else(|| {
            EngineError::CorruptLedger(format!("unknown payer {}", entry.payer))
        })?;
        if entry.ratios.len() != self.paid_goal.len() {
            return Err(EngineError::CorruptLedger(format!(
                "entry has {} ratios for {} users",
                entry.ratios.len(),
                self.paid_goal.len()
            )));
        }
        let ratios_sum: f64 = entry.ratios.iter().sum();
        if ratios_sum <= 0.0 {
            return Err(EngineError::CorruptLedger(
                "entry ratios sum to zero".to_string(),
            ));
        }

        self.paid_actual[payer_pos] += entry.amount;
        for (goal, ratio) in self.paid_goal.iter_mut().zip(&entry.ratios) {
            *goal += entry.amount * ratio / ratios_sum;
        }
        Ok(())
    }

    /// `paid_actual - paid_goal` for `pos`.
    pub fn saldo(&self, pos: usize) -> Option<f64> {
        Some(self.paid_actual.get(pos)? - self.paid_goal.get(pos)?)
    }

    pub fn saldi(&self) -> Vec<f64> {
        self.paid_actual
            .iter()
            .zip(&self.paid_goal)
            .map(|(actual, goal)| actual - goal)
            .collect()
    }
}

/// Time zone used to render export dates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ExportZone {
    /// The host's local time zone.
    #[default]
    Local,
    Named(Tz),
}

impl ExportZone {
    /// Parse an IANA time zone name such as `Europe/Rome`.
    pub fn from_name(name: &str) -> ResultEngine<Self> {
        name.parse::<Tz>()
            .map(Self::Named)
            .map_err(|err| EngineError::Validation(format!("invalid timezone {name}: {err}")))
    }

    /// Render epoch milliseconds as an ISO-8601 wall-clock timestamp.
    pub fn render(self, millis: i64) -> ResultEngine<String> {
        const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
        let rendered = match self {
            Self::Local => Local
                .timestamp_millis_opt(millis)
                .single()
                .map(|dt| dt.format(FORMAT).to_string()),
            Self::Named(tz) => tz
                .timestamp_millis_opt(millis)
                .single()
                .map(|dt| dt.format(FORMAT).to_string()),
        };
        rendered.ok_or_else(|| EngineError::CorruptLedger(format!("invalid timestamp {millis}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(payer: &str, amount: f64, ratios: Vec<f64>) -> CostEntry {
        CostEntry {
            timestamp: 0,
            amount,
            note: None,
            payer: payer.to_string(),
            ratios,
        }
    }

    fn closed_registry() -> UserRegistry {
        let mut registry = UserRegistry::default();
        registry.add_user("alice", "A").unwrap();
        registry.add_user("bob", "B").unwrap();
        registry.close().unwrap();
        registry
    }

    #[test]
    fn weighted_split_attributes_goal_by_ratio() {
        let registry = closed_registry();
        let mut balances = Balances::zeroed(2);
        balances
            .apply(&entry("B", 60.0, vec![1.0, 2.0]), &registry)
            .unwrap();

        assert_eq!(balances.paid_actual, vec![0.0, 60.0]);
        assert!((balances.paid_goal[0] - 20.0).abs() < 1e-9);
        assert!((balances.paid_goal[1] - 40.0).abs() < 1e-9);
        assert!((balances.saldo(0).unwrap() + 20.0).abs() < 1e-9);
        assert!(balances.saldo(2).is_none());
    }

    #[test]
    fn width_mismatch_is_corruption() {
        let registry = closed_registry();
        let mut balances = Balances::zeroed(2);
        let err = balances
            .apply(&entry("A", 10.0, vec![1.0]), &registry)
            .unwrap_err();
        assert!(matches!(err, EngineError::CorruptLedger(_)));
    }

    #[test]
    fn ratios_are_validated() {
        assert!(validate_ratios(&[1.0, 0.0], 2).is_ok());
        assert!(validate_ratios(&[1.0], 2).is_err());
        assert!(validate_ratios(&[0.0, 0.0], 2).is_err());
        assert!(validate_ratios(&[-1.0, 2.0], 2).is_err());
        assert!(validate_ratios(&[f64::NAN, 2.0], 2).is_err());
    }

    #[test]
    fn decodes_rows_written_with_float_timestamps() {
        let record = StringRecord::from(vec!["1700000000000.0", "12.5", "", "A", "1", "0.5"]);
        let entry = decode(&record).unwrap();
        assert_eq!(entry.timestamp, 1_700_000_000_000);
        assert_eq!(entry.amount, 12.5);
        assert_eq!(entry.note, None);
        assert_eq!(entry.ratios, vec![1.0, 0.5]);
    }

    #[test]
    fn short_rows_are_rejected() {
        let record = StringRecord::from(vec!["1", "2", "note"]);
        assert!(matches!(
            decode(&record),
            Err(EngineError::CorruptLedger(_))
        ));
    }

    #[test]
    fn renders_dates_in_named_zone() {
        let utc = ExportZone::from_name("UTC").unwrap();
        assert_eq!(utc.render(1_500).unwrap(), "1970-01-01T00:00:01.500");

        let rome = ExportZone::from_name("Europe/Rome").unwrap();
        assert_eq!(rome.render(0).unwrap(), "1970-01-01T01:00:00.000");

        assert!(ExportZone::from_name("Mars/Olympus").is_err());
    }
}
