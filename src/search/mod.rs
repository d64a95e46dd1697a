use std::cmp::{max, min};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use time::format_description::{self, FormatItem};
use time::{Date, Duration, Time};

use crate::model::{Note, NoteStatus};
use crate::storage::NoteStore;

static DATE_FORMAT: Lazy<Vec<FormatItem<'static>>> = Lazy::new(|| {
    format_description::parse("[year]-[month]-[day]").expect("valid date format description")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeFilter {
    pub from: Option<i64>,
    pub to: Option<i64>, // exclusive
}

impl RangeFilter {
    pub fn has_range(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    pub fn merge(&mut self, other: RangeFilter) {
        if let Some(from) = other.from {
            self.from = Some(match self.from {
                Some(existing) => max(existing, from),
                None => from,
            });
        }
        if let Some(to) = other.to {
            self.to = Some(match self.to {
                Some(existing) => min(existing, to),
                None => to,
            });
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        self.from.map_or(true, |from| value >= from) && self.to.map_or(true, |to| value < to)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub title_terms: Vec<String>,
    pub tags: Vec<String>,
    pub statuses: Vec<NoteStatus>,
    pub due: RangeFilter,
    pub regex_pattern: Option<String>,
}

impl SearchQuery {
    pub fn has_terms(&self) -> bool {
        !self.terms.is_empty() || !self.title_terms.is_empty()
    }

    pub fn has_filters(&self) -> bool {
        !self.tags.is_empty() || !self.statuses.is_empty() || self.due.has_range()
    }

    /// Checks a note against the query. `tag_slugs` are the slugs of the note's tags.
    pub fn matches(&self, note: &Note, tag_slugs: &[&str], regex: Option<&Regex>) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&note.status) {
            return false;
        }
        if self.due.has_range() && (!note.has_due_date() || !self.due.contains(note.complete_by)) {
            return false;
        }
        if !self.tags.iter().all(|tag| tag_slugs.contains(&tag.as_str())) {
            return false;
        }

        let title = note.title.to_lowercase();
        if !self
            .title_terms
            .iter()
            .all(|term| title.contains(&term.to_lowercase()))
        {
            return false;
        }

        if let Some(regex) = regex {
            return regex.is_match(&note.title) || regex.is_match(&note.body);
        }
        let body = note.body.to_lowercase();
        self.terms.iter().all(|term| {
            let term = term.to_lowercase();
            title.contains(&term) || body.contains(&term)
        })
    }
}

pub fn parse_query(input: &str) -> SearchQuery {
    let mut query = SearchQuery::default();
    for raw in input.split_whitespace() {
        if let Some(tag) = raw.strip_prefix("tag:") {
            if let Some(value) = sanitize_term(tag) {
                query.tags.push(value.to_lowercase());
            }
            continue;
        }
        if let Some(term) = raw.strip_prefix("title:") {
            if let Some(value) = sanitize_term(term) {
                query.title_terms.push(value);
            }
            continue;
        }
        if let Some(status) = raw.strip_prefix("status:") {
            match status.parse::<NoteStatus>() {
                Ok(status) => query.statuses.push(status),
                Err(_) => tracing::warn!(status, "ignoring unknown status filter"),
            }
            continue;
        }
        if let Some(range) = raw.strip_prefix("due:") {
            let parsed = parse_date_range(range);
            query.due.merge(parsed);
            continue;
        }
        if let Some(value) = sanitize_term(raw) {
            query.terms.push(value);
        }
    }
    query
}

pub fn regex_pattern_from_input(input: &str) -> Option<String> {
    let mut parts = Vec::new();
    for raw in input.split_whitespace() {
        if raw.starts_with("tag:")
            || raw.starts_with("title:")
            || raw.starts_with("status:")
            || raw.starts_with("due:")
        {
            continue;
        }
        parts.push(raw.to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Runs a query over the store, returning at most `limit` notes in store order.
pub fn filter_notes<'a>(
    store: &'a NoteStore,
    query: &SearchQuery,
    limit: usize,
) -> Result<Vec<&'a Note>> {
    let regex = match &query.regex_pattern {
        Some(pattern) => Some(
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("compiling search regex '{pattern}'"))?,
        ),
        None => None,
    };
    Ok(store
        .notes()
        .iter()
        .filter(|note| query.matches(note, &store.note_tag_slugs(note), regex.as_ref()))
        .take(limit)
        .collect())
}

/// Parses `YYYY-MM-DD` into UTC midnight of that day.
pub fn parse_date(input: &str) -> Option<i64> {
    parse_single_date(input).map(|(from, _)| from)
}

fn sanitize_term(raw: &str) -> Option<String> {
    let term: String = raw
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/'))
        .collect();
    if term.is_empty() {
        None
    } else {
        Some(term)
    }
}

fn parse_date_range(spec: &str) -> RangeFilter {
    let mut range = RangeFilter::default();
    let parts: Vec<&str> = spec.split("..").collect();
    match parts.as_slice() {
        [single] => {
            if let Some((from, to)) = parse_single_date(single) {
                range.from = Some(from);
                range.to = Some(to);
            }
        }
        [from, to] => {
            if !from.is_empty() {
                if let Some((start, _)) = parse_single_date(from) {
                    range.from = Some(start);
                }
            }
            if !to.is_empty() {
                if let Some((_, end)) = parse_single_date(to) {
                    range.to = Some(end);
                }
            }
        }
        _ => {}
    }
    range
}

fn parse_single_date(input: &str) -> Option<(i64, i64)> {
    let date = Date::parse(input, &*DATE_FORMAT).ok()?;
    let from = date.with_time(Time::MIDNIGHT).assume_utc().unix_timestamp();
    let to = date
        .checked_add(Duration::days(1))?
        .with_time(Time::MIDNIGHT)
        .assume_utc()
        .unix_timestamp();
    Some((from, to))
}
