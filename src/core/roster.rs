//! Roster - the loaded table plus everything derived from it at load time
//!
//! A `Roster` is built once per load: it fixes the display column, the prize
//! catalog (if any) and resolves the reserved assignment by matching the
//! well-known name against the display column.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::types::{ParticipantTable, Prize, RowIndex, TableError};

// =============================================================================
// CATALOG / RESERVED
// =============================================================================

/// Fixed set of prizes a session draws for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrizeCatalog {
    prizes: BTreeSet<Prize>,
}

impl PrizeCatalog {
    /// Build a catalog; returns None for an empty list (single-pool mode)
    pub fn new(prizes: impl IntoIterator<Item = Prize>) -> Option<Self> {
        let prizes: BTreeSet<Prize> = prizes.into_iter().collect();
        if prizes.is_empty() {
            None
        } else {
            Some(Self { prizes })
        }
    }

    pub fn contains(&self, prize: Prize) -> bool {
        self.prizes.contains(&prize)
    }

    pub fn prizes(&self) -> impl Iterator<Item = Prize> + '_ {
        self.prizes.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.prizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prizes.is_empty()
    }
}

/// Configured forced assignment: whoever is called `name` gets `prize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedSpec {
    pub name: String,
    pub prize: Prize,
}

/// Reserved assignment resolved against a loaded table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedAssignment {
    /// Prize that is always awarded to the reserved participant
    pub prize: Prize,
    /// Name that was searched for
    pub name: String,
    /// Matching row, or None if the name is absent from the table
    pub row: Option<RowIndex>,
}

// =============================================================================
// ROSTER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("display column '{0}' is not in the table")]
    UnknownDisplayColumn(String),
    #[error("reserved prize {0:?} is not in the prize catalog")]
    ReservedPrizeNotInCatalog(Prize),
}

#[derive(Debug, Clone)]
pub struct Roster {
    table: Arc<ParticipantTable>,
    display_column: String,
    catalog: Option<PrizeCatalog>,
    reserved: Option<ReservedAssignment>,
}

impl Roster {
    /// Bind a table to its display column and draw configuration.
    ///
    /// `reserved` is ignored in single-pool mode: without a catalog there is
    /// no prize to force.
    pub fn new(
        table: ParticipantTable,
        display_column: &str,
        prizes: &[Prize],
        reserved: Option<&ReservedSpec>,
    ) -> Result<Self, RosterError> {
        if !table.has_column(display_column) {
            return Err(RosterError::UnknownDisplayColumn(
                display_column.to_string(),
            ));
        }

        let catalog = PrizeCatalog::new(prizes.iter().copied());
        let reserved = match (&catalog, reserved) {
            (Some(catalog), Some(spec)) => {
                if !catalog.contains(spec.prize) {
                    return Err(RosterError::ReservedPrizeNotInCatalog(spec.prize));
                }
                let row = table.find_row(display_column, &spec.name);
                info!(
                    prize = ?spec.prize,
                    row = ?row,
                    "[ROSTER] Reserved assignment resolved"
                );
                Some(ReservedAssignment {
                    prize: spec.prize,
                    name: spec.name.clone(),
                    row,
                })
            }
            (None, Some(_)) => {
                debug!("[ROSTER] Reserved assignment ignored in single-pool mode");
                None
            }
            _ => None,
        };

        Ok(Self {
            table: Arc::new(table),
            display_column: display_column.to_string(),
            catalog,
            reserved,
        })
    }

    pub fn table(&self) -> &ParticipantTable {
        &self.table
    }

    /// Shared handle to the table for readers that outlive a borrow
    pub fn shared_table(&self) -> Arc<ParticipantTable> {
        Arc::clone(&self.table)
    }

    pub fn display_column(&self) -> &str {
        &self.display_column
    }

    pub fn row_count(&self) -> usize {
        self.table.len()
    }

    pub fn catalog(&self) -> Option<&PrizeCatalog> {
        self.catalog.as_ref()
    }

    pub fn is_prize_mode(&self) -> bool {
        self.catalog.is_some()
    }

    pub fn reserved(&self) -> Option<&ReservedAssignment> {
        self.reserved.as_ref()
    }

    /// Display label of a row
    pub fn display_name(&self, index: RowIndex) -> &str {
        self.table.value(index, &self.display_column)
    }

    /// Labels for every row, in reel order
    pub fn reel_labels(&self) -> Vec<&str> {
        self.table.column_values(&self.display_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::fixtures::names_table;

    fn spec(name: &str, prize: Prize) -> ReservedSpec {
        ReservedSpec {
            name: name.to_string(),
            prize,
        }
    }

    #[test]
    fn test_unknown_display_column() {
        let err = Roster::new(names_table(&["Ann"]), "nom", &[], None).unwrap_err();
        assert_eq!(err, RosterError::UnknownDisplayColumn("nom".to_string()));
    }

    #[test]
    fn test_single_pool_mode_ignores_reserved() {
        let roster = Roster::new(
            names_table(&["Ann", "Bob"]),
            "name",
            &[],
            Some(&spec("Bob", Prize::Grand)),
        )
        .unwrap();
        assert!(!roster.is_prize_mode());
        assert!(roster.reserved().is_none());
    }

    #[test]
    fn test_reserved_resolves_row() {
        let roster = Roster::new(
            names_table(&["Ann", "Bob", "Cid"]),
            "name",
            &[Prize::Grand, Prize::Second],
            Some(&spec("Cid", Prize::Second)),
        )
        .unwrap();
        let reserved = roster.reserved().unwrap();
        assert_eq!(reserved.prize, Prize::Second);
        assert_eq!(reserved.row, Some(2));
    }

    #[test]
    fn test_reserved_absent_name() {
        let roster = Roster::new(
            names_table(&["Ann"]),
            "name",
            &[Prize::Grand],
            Some(&spec("Zed", Prize::Grand)),
        )
        .unwrap();
        assert_eq!(roster.reserved().unwrap().row, None);
    }

    #[test]
    fn test_reserved_prize_must_be_in_catalog() {
        let err = Roster::new(
            names_table(&["Ann"]),
            "name",
            &[Prize::Grand],
            Some(&spec("Ann", Prize::Third)),
        )
        .unwrap_err();
        assert_eq!(err, RosterError::ReservedPrizeNotInCatalog(Prize::Third));
    }

    #[test]
    fn test_catalog_dedupes() {
        let catalog = PrizeCatalog::new([Prize::Grand, Prize::Grand, Prize::Third]).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(PrizeCatalog::new(Vec::new()).is_none());
    }

    #[test]
    fn test_reel_labels() {
        let roster = Roster::new(names_table(&["Ann", "Bob"]), "name", &[], None).unwrap();
        assert_eq!(roster.reel_labels(), vec!["Ann", "Bob"]);
        assert_eq!(roster.display_name(1), "Bob");
    }
}
