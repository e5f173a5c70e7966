//! Core types - participant table, prizes and candidates
//!
//! These types are shared by the state machine, the scheduler and the
//! exporters. The table is immutable once loaded.

use std::collections::HashMap;

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of a participant in the loaded table
pub type RowIndex = usize;

/// One participant: column name -> cell value
pub type Row = HashMap<String, String>;

// =============================================================================
// PRIZES
// =============================================================================

/// Prize tiers a draw can be bound to.
///
/// Configuration names them in snake_case (`"grand"`, `"second"`, `"third"`);
/// the numeric ids are stable for hosts that key prizes by number.
#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Prize {
    Grand = 1,
    Second = 2,
    Third = 3,
}

impl Prize {
    pub const ALL: [Prize; 3] = [Prize::Grand, Prize::Second, Prize::Third];

    /// Get the raw prize id
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human-readable label for summaries
    pub fn label(self) -> &'static str {
        match self {
            Prize::Grand => "Grand prize",
            Prize::Second => "Second prize",
            Prize::Third => "Third prize",
        }
    }
}

// =============================================================================
// CANDIDATE
// =============================================================================

/// Outcome of a draw: a real row, or the reserved marker when the forced
/// winner has no backing row in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "row", rename_all = "snake_case")]
pub enum Candidate {
    Row(RowIndex),
    Reserved,
}

impl Candidate {
    /// Row backing this candidate, if any
    pub fn row(self) -> Option<RowIndex> {
        match self {
            Candidate::Row(index) => Some(index),
            Candidate::Reserved => None,
        }
    }
}

// =============================================================================
// PARTICIPANT TABLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("participant table has no rows")]
    NoRows,
    #[error("participant table has no columns")]
    NoColumns,
    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },
}

/// Ordered participant rows plus their column names
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantTable {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl ParticipantTable {
    /// Build a table from already keyed rows.
    ///
    /// Fails if there is no row or no column; the engine stays unloaded then.
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Result<Self, TableError> {
        if headers.is_empty() {
            return Err(TableError::NoColumns);
        }
        if rows.is_empty() {
            return Err(TableError::NoRows);
        }
        Ok(Self { headers, rows })
    }

    /// Build a table from positional records (one `Vec` of cells per row)
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<String>>) -> Result<Self, TableError> {
        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            if record.len() != headers.len() {
                return Err(TableError::RaggedRow {
                    row: index,
                    got: record.len(),
                    expected: headers.len(),
                });
            }
            rows.push(headers.iter().cloned().zip(record).collect());
        }
        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn row(&self, index: RowIndex) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Cell value, or "" when the row or column is missing
    pub fn value(&self, index: RowIndex, column: &str) -> &str {
        self.rows
            .get(index)
            .and_then(|row| row.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// All values of one column, in row order (used to label the reel)
    pub fn column_values(&self, column: &str) -> Vec<&str> {
        (0..self.rows.len())
            .map(|index| self.value(index, column))
            .collect()
    }

    /// First row whose `column` value equals `needle` exactly
    pub fn find_row(&self, column: &str, needle: &str) -> Option<RowIndex> {
        self.rows
            .iter()
            .position(|row| row.get(column).is_some_and(|v| v == needle))
    }

    /// Pick the first preferred column name that exists in this table
    pub fn resolve_column<'a>(&self, preferred: &'a [String]) -> Option<&'a str> {
        preferred
            .iter()
            .find(|name| self.has_column(name))
            .map(String::as_str)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::names_table;
    use super::*;

    #[test]
    fn test_prize_ids() {
        assert_eq!(Prize::Grand.as_u8(), 1);
        assert_eq!(Prize::try_from(2u8).unwrap(), Prize::Second);
        assert!(Prize::try_from(9u8).is_err());
    }

    #[test]
    fn test_prize_serde_names() {
        let json = serde_json::to_string(&Prize::Third).unwrap();
        assert_eq!(json, "\"third\"");
        let parsed: Prize = serde_json::from_str("\"grand\"").unwrap();
        assert_eq!(parsed, Prize::Grand);
    }

    #[test]
    fn test_candidate_row() {
        assert_eq!(Candidate::Row(4).row(), Some(4));
        assert_eq!(Candidate::Reserved.row(), None);
    }

    #[test]
    fn test_table_rejects_empty() {
        assert_eq!(
            ParticipantTable::new(vec!["name".to_string()], vec![]),
            Err(TableError::NoRows)
        );
        assert_eq!(
            ParticipantTable::new(vec![], vec![Row::new()]),
            Err(TableError::NoColumns)
        );
    }

    #[test]
    fn test_table_rejects_ragged_record() {
        let err = ParticipantTable::from_records(
            vec!["name".to_string(), "city".to_string()],
            vec![vec!["Ann".to_string()]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TableError::RaggedRow {
                row: 0,
                got: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn test_table_lookup() {
        let table = names_table(&["Ann", "Bob", "Cid"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.value(1, "name"), "Bob");
        assert_eq!(table.value(7, "name"), "");
        assert_eq!(table.value(0, "missing"), "");
        assert_eq!(table.find_row("name", "Cid"), Some(2));
        assert_eq!(table.find_row("name", "cid"), None);
        assert_eq!(table.column_values("name"), vec!["Ann", "Bob", "Cid"]);
    }

    #[test]
    fn test_resolve_column() {
        let table = names_table(&["Ann"]);
        let preferred = vec!["Full Name".to_string(), "name".to_string()];
        assert_eq!(table.resolve_column(&preferred), Some("name"));
        assert_eq!(table.resolve_column(&["x".to_string()]), None);
    }
}
