//! Decides which notes are approaching their due date and should be shown.
//!
//! One-off notes become visible a fixed number of days before their due date
//! and stay visible while pending. Notes in the `repeat` tag group ignore the
//! year (annual) or year and month (monthly) of their stored due date: the
//! date is re-anchored onto the present and checked against the current,
//! previous and next cycle.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{Note, RepeatTags};

pub mod clock;
pub mod projector;
pub mod window;

pub use clock::{Clock, FixedClock, SystemClock};
pub use window::{
    is_within_repeat_window, matching_anchor, CycleAnchors, Tolerance, SECONDS_PER_DAY,
};

use self::projector::{
    decompose, decompose_day, project_to_current_year, project_to_current_year_month,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum View {
    /// Everyday display: short lead times.
    Default,
    /// Look-ahead review covering roughly the next 52 weeks.
    Long,
}

impl Default for View {
    fn default() -> Self {
        View::Default
    }
}

impl View {
    /// Days before its due date a one-off note becomes visible.
    pub fn lookahead_days(self) -> i64 {
        match self {
            View::Default => 7,
            View::Long => 365,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RepeatKind {
    Annual,
    Monthly,
}

impl RepeatKind {
    pub fn period_days(self) -> i64 {
        match self {
            RepeatKind::Annual => 365,
            RepeatKind::Monthly => 30,
        }
    }

    pub fn tolerance(self, view: View) -> Tolerance {
        match (self, view) {
            (RepeatKind::Annual, View::Default) => Tolerance::new(3, 7),
            (RepeatKind::Annual, View::Long) => Tolerance::new(365, 7),
            (RepeatKind::Monthly, View::Default) => Tolerance::new(1, 3),
            (RepeatKind::Monthly, View::Long) => Tolerance::new(31, 3),
        }
    }
}

/// A note selected for display together with the due date it is shown under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Approaching<'a> {
    pub note: &'a Note,
    /// For repeating notes, the cycle anchor that matched; otherwise the stored due date.
    pub effective_due: i64,
    pub repeat: Option<RepeatKind>,
}

impl Approaching<'_> {
    /// The stored due date rewrite this selection implies, if any.
    pub fn rollover(&self) -> Option<DueUpdate> {
        if self.repeat.is_none() || self.effective_due == self.note.complete_by {
            return None;
        }
        Some(DueUpdate {
            note_id: self.note.id,
            complete_by: self.effective_due,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueUpdate {
    pub note_id: i64,
    pub complete_by: i64,
}

/// Selects the pending notes that are approaching due, in input order.
///
/// Notes are never modified; use [`roll_forward`] to persist the re-anchored
/// due dates of repeating notes. A note tagged both annually and monthly is
/// selected at most once, under the annual anchor when both rules match.
pub fn select_approaching<'a>(
    notes: &'a [Note],
    repeat_tags: &RepeatTags,
    view: View,
    clock: &dyn Clock,
) -> Vec<Approaching<'a>> {
    let now = clock.now_unix();
    let lookahead = view.lookahead_days() * SECONDS_PER_DAY;

    let mut selected = Vec::new();
    for note in notes.iter().filter(|note| note.is_pending()) {
        if !note.has_due_date() {
            continue;
        }
        if repeat_tags.is_repeating(note) {
            if let Some((kind, effective_due)) = match_repeating(note, repeat_tags, view, clock, now)
            {
                selected.push(Approaching {
                    note,
                    effective_due,
                    repeat: Some(kind),
                });
            }
        } else if now >= note.complete_by.saturating_sub(lookahead) {
            selected.push(Approaching {
                note,
                effective_due: note.complete_by,
                repeat: None,
            });
        }
    }

    tracing::debug!(
        %view,
        considered = notes.len(),
        selected = selected.len(),
        "selected approaching notes"
    );
    selected
}

/// Collects the due date rewrites implied by a selection.
pub fn rollovers(selection: &[Approaching<'_>]) -> Vec<DueUpdate> {
    selection.iter().filter_map(Approaching::rollover).collect()
}

/// Applies due date rewrites by note id and returns how many notes changed.
pub fn roll_forward(notes: &mut [Note], updates: &[DueUpdate]) -> usize {
    let mut changed = 0;
    for update in updates {
        if let Some(note) = notes.iter_mut().find(|note| note.id == update.note_id) {
            if note.complete_by != update.complete_by {
                note.complete_by = update.complete_by;
                changed += 1;
            }
        }
    }
    changed
}

// Both rules read the stored due date; the annual anchor wins when both match.
fn match_repeating(
    note: &Note,
    repeat_tags: &RepeatTags,
    view: View,
    clock: &dyn Clock,
    now: i64,
) -> Option<(RepeatKind, i64)> {
    let annual = if repeat_tags.repeats_annually(note) {
        match_cycle(note, RepeatKind::Annual, view, clock, now)
    } else {
        None
    };
    let monthly = if repeat_tags.repeats_monthly(note) {
        match_cycle(note, RepeatKind::Monthly, view, clock, now)
    } else {
        None
    };
    annual
        .map(|due| (RepeatKind::Annual, due))
        .or_else(|| monthly.map(|due| (RepeatKind::Monthly, due)))
}

fn match_cycle(
    note: &Note,
    kind: RepeatKind,
    view: View,
    clock: &dyn Clock,
    now: i64,
) -> Option<i64> {
    let current = match kind {
        RepeatKind::Annual => {
            let (month, day) = decompose(note.complete_by)?;
            project_to_current_year(clock, month, day)?
        }
        RepeatKind::Monthly => {
            let day = decompose_day(note.complete_by)?;
            project_to_current_year_month(clock, day)?
        }
    };
    let anchors = CycleAnchors::around(current, kind.period_days());
    matching_anchor(now, anchors, kind.tolerance(view))
}
