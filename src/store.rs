use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp layout shared by both CSV files.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub mod slot_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIME_FORMAT;

    pub fn serialize<S: Serializer>(
        value: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

/// One voted slot. Unique by `start_time`; `votes` counts submissions for
/// that exact start time and only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoteRow {
    #[serde(with = "slot_time")]
    pub start_time: NaiveDateTime,
    pub votes: u32,
}

/// In-memory vote table backed by a `start_time,votes` CSV file.
///
/// The file is shared mutable state with no locking: concurrent writers are
/// last-writer-wins.
#[derive(Debug, Clone, Default)]
pub struct VoteTable {
    rows: Vec<VoteRow>,
}

impl VoteTable {
    /// Reads the persisted table. A missing file is an empty poll, not an
    /// error; a malformed row is.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed opening votes file: {}", path.display()))?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            let row: VoteRow =
                row.with_context(|| format!("malformed votes row in {}", path.display()))?;
            rows.push(row);
        }
        Ok(Self { rows })
    }

    /// Records one submission: increments the matching row, or inserts a new
    /// row with a count of 1. Returns the slot's vote count afterwards.
    pub fn upsert(&mut self, start_time: NaiveDateTime) -> u32 {
        if let Some(row) = self.rows.iter_mut().find(|r| r.start_time == start_time) {
            row.votes = row.votes.saturating_add(1);
            return row.votes;
        }
        self.rows.push(VoteRow {
            start_time,
            votes: 1,
        });
        1
    }

    /// Overwrites the persisted file with the full current table.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating data directory: {}", parent.display()))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed writing votes file: {}", path.display()))?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn rows(&self) -> &[VoteRow] {
        &self.rows
    }

    /// Rows ordered by start time, for display.
    pub fn sorted_rows(&self) -> Vec<VoteRow> {
        let mut rows = self.rows.clone();
        rows.sort_by_key(|r| r.start_time);
        rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// One audit entry: who voted and when. Header names match the historical
/// file layout (`Voted At,Player`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ballot {
    #[serde(rename = "Voted At", with = "slot_time")]
    pub voted_at: NaiveDateTime,
    #[serde(rename = "Player")]
    pub player: String,
}

/// Append-only log of named submissions. No uniqueness constraint; entries
/// are never mutated or deleted.
#[derive(Debug, Clone, Default)]
pub struct BallotLog {
    entries: Vec<Ballot>,
}

impl BallotLog {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed opening ballots file: {}", path.display()))?;
        let mut entries = Vec::new();
        for entry in reader.deserialize() {
            let entry: Ballot =
                entry.with_context(|| format!("malformed ballot in {}", path.display()))?;
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating data directory: {}", parent.display()))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed writing ballots file: {}", path.display()))?;
        for entry in &self.entries {
            writer.serialize(entry)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn push(&mut self, voted_at: NaiveDateTime, player: impl Into<String>) {
        self.entries.push(Ballot {
            voted_at,
            player: player.into(),
        });
    }

    /// Loads the log, appends one entry stamped with the local wall clock,
    /// and rewrites the file.
    pub fn record(path: &Path, player: &str) -> Result<()> {
        let mut log = Self::load(path)?;
        log.push(Local::now().naive_local(), player);
        log.save(path)
    }

    pub fn entries(&self) -> &[Ballot] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
