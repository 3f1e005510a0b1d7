//! Cache generations and their partition names.
//!
//! A generation is one deployed version of the cache contents. Its id is
//! `<prefix>-v<YYYY-MM-DD>`; it owns exactly three partitions named
//! `<prefix>-<kind>-v<YYYY-MM-DD>`.

use std::fmt;

use chrono::NaiveDate;

use crate::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The three partitions every generation owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    /// Documents the application cannot start without.
    Critical,
    /// Precached and cache-first static assets.
    Static,
    /// Responses stored at runtime.
    Dynamic,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [PartitionKind::Critical, PartitionKind::Static, PartitionKind::Dynamic];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionKind::Critical => "critical",
            PartitionKind::Static => "static",
            PartitionKind::Dynamic => "dynamic",
        }
    }
}

/// Identifies which version of the cache contents is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Generation {
    prefix: String,
    build_date: NaiveDate,
}

impl Generation {
    pub fn new(prefix: impl Into<String>, build_date: NaiveDate) -> Self {
        Self { prefix: prefix.into(), build_date }
    }

    /// Build a generation from a `YYYY-MM-DD` build date.
    pub fn parse(prefix: impl Into<String>, build_date: &str) -> Result<Self, Error> {
        let date = NaiveDate::parse_from_str(build_date.trim(), DATE_FORMAT)
            .map_err(|e| Error::InvalidGeneration(format!("{build_date}: {e}")))?;
        Ok(Self::new(prefix, date))
    }

    /// Generation stamped with today's UTC date.
    pub fn today(prefix: impl Into<String>) -> Self {
        Self::new(prefix, chrono::Utc::now().date_naive())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn build_date(&self) -> NaiveDate {
        self.build_date
    }

    pub fn id(&self) -> String {
        format!("{}-v{}", self.prefix, self.build_date.format(DATE_FORMAT))
    }

    pub fn partition(&self, kind: PartitionKind) -> String {
        format!("{}-{}-v{}", self.prefix, kind.as_str(), self.build_date.format(DATE_FORMAT))
    }

    /// Partition names in lookup order: critical, static, dynamic.
    pub fn partitions(&self) -> [String; 3] {
        PartitionKind::ALL.map(|kind| self.partition(kind))
    }

    /// Whether `name` is one of this generation's partitions.
    pub fn owns(&self, name: &str) -> bool {
        PartitionKind::ALL.iter().any(|kind| self.partition(*kind) == name)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}
