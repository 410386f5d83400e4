//! Date-based eligibility filter over leader and fixed-field codes
//!
//! A record is eligible when its publication dates (008/07-10 "Date 1",
//! 008/11-14 "Date 2") fall on or before a cutoff year. The decision is a
//! total function: malformed codes degrade to a fixed outcome plus a
//! diagnostic, never to an error.

use crate::diagnostic::{Category, DiagnosticEvent};
use crate::record::{CatalogRecord, TAG_CARRIER, TAG_FIXED};

/// Cutoff for everything except maps
pub const DEFAULT_CUTOFF: u16 = 1992;
/// Cutoff for cartographic material (leader/06 `e` or `f`)
pub const CARTOGRAPHIC_CUTOFF: u16 = 1994;
/// Date 2 value for resources still being published
pub const OPEN_ENDED: u16 = 9999;

const LEADER_LEN: usize = 24;
const FIXED_LEN: usize = 40;

/// Keep/drop outcome plus the anomalies seen on the way, in detection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityDecision {
    pub keep: bool,
    pub diagnostics: Vec<DiagnosticEvent>,
}

impl EligibilityDecision {
    /// Categories only, for assertions and counting.
    pub fn categories(&self) -> Vec<Category> {
        self.diagnostics.iter().map(|d| d.category).collect()
    }
}

/// Cutoff year for a leader. Malformed leaders get the default.
pub fn cutoff_year(leader: &str) -> u16 {
    if leader.chars().count() != LEADER_LEN {
        return DEFAULT_CUTOFF;
    }
    match char_at(leader, 6) {
        Some('e' | 'f') => CARTOGRAPHIC_CUTOFF,
        _ => DEFAULT_CUTOFF,
    }
}

/// Decide whether `record` belongs in the merged output.
pub fn evaluate(record: &CatalogRecord) -> EligibilityDecision {
    let id = record.id();
    let leader = record.leader.as_str();
    let mut diagnostics = Vec::new();

    if leader.chars().count() != LEADER_LEN {
        diagnostics.push(DiagnosticEvent::new(
            Category::LeaderMalformed,
            id,
            Some(leader),
        ));
    }
    let cutoff = cutoff_year(leader);

    let keep = match record.field(TAG_FIXED).filter(|f| !f.is_empty()) {
        None => {
            diagnostics.push(DiagnosticEvent::new(
                Category::FixedFieldMissing,
                id,
                None,
            ));
            false
        }
        Some(fixed) => {
            let mut flags = Vec::new();
            let keep = decide(leader, fixed, record.field(TAG_CARRIER), cutoff, &mut flags);
            diagnostics.extend(
                flags
                    .into_iter()
                    .map(|category| DiagnosticEvent::new(category, id, Some(fixed))),
            );
            keep
        }
    };

    EligibilityDecision { keep, diagnostics }
}

/// Decision over a present, non-empty 008.
fn decide(
    leader: &str,
    fixed: &str,
    carrier: Option<&str>,
    cutoff: u16,
    flags: &mut Vec<Category>,
) -> bool {
    let len = fixed.chars().count();
    let date1 = char_window(fixed, 7, 11);
    let date2 = char_window(fixed, 11, 15);

    if len > FIXED_LEN {
        flags.push(Category::FixedFieldTooLong);
        let within = |w: &str| year(w).is_some_and(|y| y <= cutoff);
        if within(date1) || within(date2) {
            return true;
        }
        flags.push(Category::NoRuleMatched);
        return false;
    }
    if len < FIXED_LEN {
        flags.push(Category::FixedFieldTooShort);
        return false;
    }

    let bib_level = char_at(leader, 7);
    match (bib_level, char_at(fixed, 6)) {
        (Some(_), Some('s')) => single_date(date1, date2, cutoff, flags),
        _ => date_range(bib_level, date1, date2, carrier, cutoff),
    }
}

/// Date type `s`: only Date 1 should be filled in.
fn single_date(date1: &str, date2: &str, cutoff: u16, flags: &mut Vec<Category>) -> bool {
    let date2_filled = year(date2).is_some() || date2.contains(['u', 'n']);
    if date2_filled {
        flags.push(Category::YearMiscoded);
        return date1.contains('u') || year(date1).is_some_and(|y| y <= cutoff);
    }
    match year(date1) {
        None => true,
        Some(y) => y <= cutoff,
    }
}

/// Every other date type: ranges, serials, reprints, unknown detail.
fn date_range(
    bib_level: Option<char>,
    date1: &str,
    date2: &str,
    carrier: Option<&str>,
    cutoff: u16,
) -> bool {
    match (year(date1), year(date2)) {
        (None, None) => true,
        (Some(y1), None) => y1 <= cutoff,
        (Some(y1), Some(y2)) => y1 <= cutoff || y2 == OPEN_ENDED || y2 <= cutoff,
        (None, Some(y2)) => {
            if y2 == OPEN_ENDED || y2 <= cutoff {
                return !is_remote_electronic(carrier);
            }
            match bib_level {
                // Serials begun in the 19th/20th century, e.g. "19uu"
                Some('b' | 'i' | 's') => date1.starts_with("18") || date1.starts_with("19"),
                // Collections with an unknown start
                Some('c' | 'd') => date1.contains('u'),
                _ => false,
            }
        }
    }
}

/// 007/00-01 `cr`: remote electronic resource
fn is_remote_electronic(carrier: Option<&str>) -> bool {
    carrier.is_some_and(|c| c.starts_with("cr"))
}

/// Four ASCII digits as a year, anything else is `None`.
fn year(window: &str) -> Option<u16> {
    if window.len() == 4 && window.bytes().all(|b| b.is_ascii_digit()) {
        window.parse().ok()
    } else {
        None
    }
}

fn char_at(s: &str, idx: usize) -> Option<char> {
    s.chars().nth(idx)
}

/// Characters `[start, end)` of `s`, clamped to its length.
fn char_window(s: &str, start: usize, end: usize) -> &str {
    let mut offsets = s.char_indices().map(|(i, _)| i).chain(std::iter::once(s.len()));
    let from = offsets.nth(start).unwrap_or(s.len());
    let to = offsets.nth(end - start - 1).unwrap_or(s.len());
    &s[from..to]
}
