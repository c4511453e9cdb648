//! MCM periods: the monthly reporting cycles that scope where DARs and their
//! rows are stored.
//!
//! The [`PeriodIndex`] is the single source of truth for which periods
//! exist. Removing a period from the index never deletes the folder or
//! spreadsheet it points at.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Month;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("month must be 1-12, got {0}")]
    InvalidMonth(u32),
    #[error("invalid period key '{0}', expected YYYY-MM")]
    InvalidKey(String),
    #[error("period {0} already exists")]
    Duplicate(PeriodKey),
    #[error("period {0} not found")]
    NotFound(PeriodKey),
}

/// Year + month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// English month name, e.g. "March".
    pub fn month_name(&self) -> &'static str {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("Unknown")
    }

    /// Title of the Drive folder holding this period's DAR PDFs.
    pub fn folder_title(&self) -> String {
        format!("MCM_DARs_{}_{}", self.month_name(), self.year)
    }

    /// Title of this period's tracker spreadsheet.
    pub fn spreadsheet_title(&self) -> String {
        format!("MCM_Tracker_{}_{}", self.month_name(), self.year)
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidKey(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        PeriodKey::new(year, month)
    }
}

/// One period's record in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McmPeriod {
    pub year: i32,
    pub month_num: u32,
    pub month_name: String,
    pub folder_id: String,
    pub folder_url: String,
    pub spreadsheet_id: String,
    pub spreadsheet_url: String,
    pub active: bool,
}

/// External resources created for a new period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodResources {
    pub folder_id: String,
    pub folder_url: String,
    pub spreadsheet_id: String,
    pub spreadsheet_url: String,
}

impl McmPeriod {
    /// A new, active period record.
    pub fn new(key: PeriodKey, resources: PeriodResources) -> Self {
        Self {
            year: key.year,
            month_num: key.month,
            month_name: key.month_name().to_string(),
            folder_id: resources.folder_id,
            folder_url: resources.folder_url,
            spreadsheet_id: resources.spreadsheet_id,
            spreadsheet_url: resources.spreadsheet_url,
            active: true,
        }
    }

    pub fn key(&self) -> Result<PeriodKey, PeriodError> {
        PeriodKey::new(self.year, self.month_num)
    }
}

/// Keyed mapping `YYYY-MM → McmPeriod`, serialised as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodIndex {
    periods: BTreeMap<String, McmPeriod>,
}

impl PeriodIndex {
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn get(&self, key: PeriodKey) -> Option<&McmPeriod> {
        self.periods.get(&key.to_string())
    }

    /// Add a period. Refuses to overwrite an existing key.
    pub fn insert(&mut self, period: McmPeriod) -> Result<PeriodKey, PeriodError> {
        let key = period.key()?;
        let k = key.to_string();
        if self.periods.contains_key(&k) {
            return Err(PeriodError::Duplicate(key));
        }
        info!(period = %key, "period added to index");
        self.periods.insert(k, period);
        Ok(key)
    }

    pub fn set_active(&mut self, key: PeriodKey, active: bool) -> Result<(), PeriodError> {
        let period = self
            .periods
            .get_mut(&key.to_string())
            .ok_or(PeriodError::NotFound(key))?;
        period.active = active;
        info!(period = %key, active, "period status changed");
        Ok(())
    }

    /// Drop a period from the index. Its folder and spreadsheet are left alone.
    pub fn remove(&mut self, key: PeriodKey) -> Result<McmPeriod, PeriodError> {
        let removed = self
            .periods
            .remove(&key.to_string())
            .ok_or(PeriodError::NotFound(key))?;
        info!(period = %key, "period removed from index");
        Ok(removed)
    }

    /// All periods, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &McmPeriod)> {
        self.periods.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Active periods, newest first (the order an upload picker wants).
    pub fn active(&self) -> Vec<(&str, &McmPeriod)> {
        let mut active: Vec<_> = self.iter().filter(|(_, p)| p.active).collect();
        active.reverse();
        active
    }
}
