//! Formatting utilities for the reel display and result exports.
//!
//! Everything here returns strings; writing files is up to the host.

use chrono::NaiveDate;

use super::constants::{CSV_BOM, VISIBLE_SLOTS};
use super::draw_state::{Tally, TallyEntry};
use super::roster::Roster;
use super::types::{Candidate, RowIndex};

// =============================================================================
// REEL WINDOW
// =============================================================================

/// One visible slot of the reel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSlot {
    pub index: RowIndex,
    /// Signed distance from the centre slot (0 = the display index)
    pub offset: i32,
}

/// Slots centred on `display_index`, wrapping over all rows.
///
/// With fewer rows than slots, rows repeat.
pub fn visible_window(
    display_index: RowIndex,
    row_count: usize,
    slots: usize,
) -> Vec<WindowSlot> {
    if row_count == 0 || slots == 0 {
        return Vec::new();
    }
    let half = (slots / 2) as i64;
    let count = row_count as i64;
    (-half..slots as i64 - half)
        .map(|offset| WindowSlot {
            index: (display_index as i64 + offset).rem_euclid(count) as RowIndex,
            offset: offset as i32,
        })
        .collect()
}

/// The standard 7-slot reel window
pub fn reel_window(display_index: RowIndex, row_count: usize) -> Vec<WindowSlot> {
    visible_window(display_index, row_count, VISIBLE_SLOTS)
}

// =============================================================================
// TEXT SUMMARY
// =============================================================================

fn entry_line(position: usize, entry: &TallyEntry) -> String {
    match entry.prize {
        Some(prize) => format!("{}. {} ({})", position, entry.name, prize.label()),
        None => format!("{}. {}", position, entry.name),
    }
}

/// Plain-text summary: total, numbered winners, numbered skipped.
pub fn format_results_text(tally: &Tally) -> String {
    let mut out = String::from("Draw results\n============\n\n");
    out.push_str(&format!(
        "Total participants: {}\n\n",
        tally.total_participants
    ));

    out.push_str(&format!("Winners ({}):\n", tally.winners.len()));
    for (i, entry) in tally.winners.iter().enumerate() {
        out.push_str(&entry_line(i + 1, entry));
        out.push('\n');
    }

    out.push_str(&format!("\nSkipped ({}):\n", tally.skipped.len()));
    for (i, entry) in tally.skipped.iter().enumerate() {
        out.push_str(&entry_line(i + 1, entry));
        out.push('\n');
    }
    out
}

// =============================================================================
// CSV
// =============================================================================

/// Quote a CSV field if it contains a separator, a quote or a newline
pub fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r')
    {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields
        .into_iter()
        .map(csv_escape)
        .collect::<Vec<_>>()
        .join(",")
}

/// Cells of one tally entry in header order.
///
/// The reserved marker has no row: only its display column is filled.
fn entry_cells<'a>(roster: &'a Roster, entry: &'a TallyEntry) -> Vec<&'a str> {
    let table = roster.table();
    table
        .headers()
        .iter()
        .map(|header| match entry.candidate {
            Candidate::Row(row) => table.value(row, header),
            Candidate::Reserved if header == roster.display_column() => entry.name.as_str(),
            Candidate::Reserved => "",
        })
        .collect()
}

/// Winners with their full rows, prefixed by a UTF-8 BOM.
///
/// Returns None when nobody was awarded; callers fall back to the text
/// summary then.
pub fn format_winners_csv(roster: &Roster, tally: &Tally) -> Option<String> {
    if tally.winners.is_empty() {
        return None;
    }
    let with_prize = roster.is_prize_mode();

    let mut header: Vec<&str> = vec!["Winner #"];
    if with_prize {
        header.push("Prize");
    }
    header.extend(roster.table().headers().iter().map(String::as_str));

    let mut lines = vec![csv_line(header)];
    for (i, entry) in tally.winners.iter().enumerate() {
        let position = (i + 1).to_string();
        let mut fields = vec![position.as_str()];
        if with_prize {
            fields.push(entry.prize.map_or("", |p| p.label()));
        }
        fields.extend(entry_cells(roster, entry));
        lines.push(csv_line(fields));
    }
    Some(format!("{}{}", CSV_BOM, lines.join("\n")))
}

/// Winners then skipped rows, each with a status and its order
pub fn format_all_results_csv(roster: &Roster, tally: &Tally) -> String {
    let mut header: Vec<&str> = vec!["Status", "Order"];
    header.extend(roster.table().headers().iter().map(String::as_str));

    let mut lines = vec![csv_line(header)];
    let sections = [("Winner", &tally.winners), ("Skipped", &tally.skipped)];
    for (status, entries) in sections {
        for (i, entry) in entries.iter().enumerate() {
            let position = (i + 1).to_string();
            let mut fields = vec![status, position.as_str()];
            fields.extend(entry_cells(roster, entry));
            lines.push(csv_line(fields));
        }
    }
    format!("{}{}", CSV_BOM, lines.join("\n"))
}

// =============================================================================
// JSON / FILE NAMES
// =============================================================================

/// Tally as pretty JSON, for hosts that persist results
pub fn tally_to_json(tally: &Tally) -> serde_json::Result<String> {
    serde_json::to_string_pretty(tally)
}

/// `<prefix>-YYYY-MM-DD.<ext>`
pub fn export_file_name(prefix: &str, extension: &str, date: NaiveDate) -> String {
    format!("{}-{}.{}", prefix, date.format("%Y-%m-%d"), extension)
}

/// Local calendar date used to stamp export file names
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::draw_state::{DrawAction, DrawState};
    use crate::core::roster::ReservedSpec;
    use crate::core::types::fixtures::names_table;
    use crate::core::types::{ParticipantTable, Prize};

    fn entry(name: &str, row: RowIndex, prize: Option<Prize>) -> TallyEntry {
        TallyEntry {
            candidate: Candidate::Row(row),
            prize,
            name: name.to_string(),
        }
    }

    fn decide(
        state: DrawState,
        roster: &Roster,
        prize: Option<Prize>,
        index: RowIndex,
        action: DrawAction,
    ) -> DrawState {
        let state = state.apply(roster, DrawAction::BeginDraw { prize }).state;
        let state = state
            .apply(roster, DrawAction::CandidateChosen { index, prize })
            .state;
        state.apply(roster, action).state
    }

    // -------------------------------------------------------------------------
    // Window
    // -------------------------------------------------------------------------

    #[test]
    fn test_window_centred_and_wrapping() {
        let window = reel_window(0, 10);
        let indices: Vec<_> = window.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![7, 8, 9, 0, 1, 2, 3]);
        let offsets: Vec<_> = window.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![-3, -2, -1, 0, 1, 2, 3]);
    }

    #[test]
    fn test_window_repeats_small_tables() {
        let indices: Vec<_> = reel_window(1, 2).iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_window_empty_table() {
        assert!(reel_window(0, 0).is_empty());
    }

    // -------------------------------------------------------------------------
    // Text
    // -------------------------------------------------------------------------

    #[test]
    fn test_results_text() {
        let tally = Tally {
            total_participants: 3,
            winners: vec![entry("Ann", 0, Some(Prize::Grand)), entry("Cid", 2, None)],
            skipped: vec![entry("Bob", 1, None)],
        };
        let text = format_results_text(&tally);
        assert_eq!(
            text,
            "Draw results\n============\n\nTotal participants: 3\n\n\
             Winners (2):\n1. Ann (Grand prize)\n2. Cid\n\n\
             Skipped (1):\n1. Bob\n"
        );
    }

    // -------------------------------------------------------------------------
    // CSV
    // -------------------------------------------------------------------------

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_winners_csv_none_without_winners() {
        let roster = Roster::new(names_table(&["Ann"]), "name", &[], None).unwrap();
        let tally = DrawState::new().tally(&roster);
        assert_eq!(format_winners_csv(&roster, &tally), None);
    }

    #[test]
    fn test_winners_csv_full_rows() {
        let table = ParticipantTable::from_records(
            vec!["name".to_string(), "city".to_string()],
            vec![
                vec!["Ann".to_string(), "Oslo".to_string()],
                vec!["Bob".to_string(), "Rome, IT".to_string()],
            ],
        )
        .unwrap();
        let roster = Roster::new(table, "name", &[], None).unwrap();
        let state = decide(DrawState::new(), &roster, None, 1, DrawAction::Accept);
        let csv = format_winners_csv(&roster, &state.tally(&roster)).unwrap();
        assert!(csv.starts_with('\u{FEFF}'));
        assert_eq!(
            csv.trim_start_matches('\u{FEFF}'),
            "Winner #,name,city\n1,Bob,\"Rome, IT\""
        );
    }

    #[test]
    fn test_winners_csv_prize_mode_with_marker() {
        let roster = Roster::new(
            names_table(&["Ann", "Bob"]),
            "name",
            &[Prize::Grand, Prize::Second],
            Some(&ReservedSpec {
                name: "Zed".to_string(),
                prize: Prize::Grand,
            }),
        )
        .unwrap();
        let state = decide(
            DrawState::new(),
            &roster,
            Some(Prize::Second),
            0,
            DrawAction::Accept,
        );
        let state = decide(state, &roster, Some(Prize::Grand), 1, DrawAction::Accept);
        let csv = format_winners_csv(&roster, &state.tally(&roster)).unwrap();
        assert_eq!(
            csv.trim_start_matches('\u{FEFF}'),
            "Winner #,Prize,name\n1,Second prize,Ann\n2,Grand prize,Zed"
        );
    }

    #[test]
    fn test_all_results_csv() {
        let roster =
            Roster::new(names_table(&["Ann", "Bob", "Cid"]), "name", &[], None).unwrap();
        let state = decide(DrawState::new(), &roster, None, 2, DrawAction::Skip);
        let state = decide(state, &roster, None, 0, DrawAction::Accept);
        let csv = format_all_results_csv(&roster, &state.tally(&roster));
        assert_eq!(
            csv.trim_start_matches('\u{FEFF}'),
            "Status,Order,name\nWinner,1,Ann\nSkipped,1,Cid"
        );
    }

    // -------------------------------------------------------------------------
    // JSON / names
    // -------------------------------------------------------------------------

    #[test]
    fn test_tally_json() {
        let tally = Tally {
            total_participants: 1,
            winners: vec![entry("Ann", 0, Some(Prize::Third))],
            skipped: vec![],
        };
        let json: serde_json::Value =
            serde_json::from_str(&tally_to_json(&tally).unwrap()).unwrap();
        assert_eq!(json["total_participants"], 1);
        assert_eq!(json["winners"][0]["name"], "Ann");
        assert_eq!(json["winners"][0]["prize"], "third");
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            export_file_name("winners", "csv", date),
            "winners-2024-03-09.csv"
        );
    }
}
