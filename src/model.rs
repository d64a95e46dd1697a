use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Tag group whose members mark a note as recurring.
pub const REPEAT_GROUP: &str = "repeat";
/// Group assigned to tags created implicitly from the CLI.
pub const GENERAL_GROUP: &str = "general";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum NoteStatus {
    Pending,
    Suspended,
    Done,
}

impl Default for NoteStatus {
    fn default() -> Self {
        NoteStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub status: NoteStatus,
    /// Due date in unix seconds; 0 means the note has no due date.
    #[serde(default)]
    pub complete_by: i64,
    #[serde(default)]
    pub tag_ids: BTreeSet<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Note {
    pub fn has_due_date(&self) -> bool {
        self.complete_by != 0
    }

    pub fn is_pending(&self) -> bool {
        self.status == NoteStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub slug: String,
    #[serde(default)]
    pub group: String,
}

impl Tag {
    pub fn is_repeat_group(&self) -> bool {
        self.group == REPEAT_GROUP
    }

    pub fn role(&self) -> Option<TagRole> {
        TagRole::from_str(&self.slug).ok()
    }
}

/// Well-known tags the due-date engine gives meaning to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum TagRole {
    RepeatAnnually,
    RepeatMonthly,
}

impl TagRole {
    pub fn slug(self) -> &'static str {
        self.into()
    }
}

/// Repeat-related tag ids, resolved once from the tag set so the due-date
/// engine never compares tag strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeatTags {
    pub group: HashSet<i64>,
    pub annually: Option<i64>,
    pub monthly: Option<i64>,
}

impl RepeatTags {
    pub fn resolve<'a, I>(tags: I) -> Self
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        let mut resolved = RepeatTags::default();
        for tag in tags {
            if tag.is_repeat_group() {
                resolved.group.insert(tag.id);
            }
            match tag.role() {
                Some(TagRole::RepeatAnnually) => resolved.annually = Some(tag.id),
                Some(TagRole::RepeatMonthly) => resolved.monthly = Some(tag.id),
                None => {}
            }
        }
        resolved
    }

    pub fn is_repeating(&self, note: &Note) -> bool {
        note.tag_ids.iter().any(|id| self.group.contains(id))
    }

    pub fn repeats_annually(&self, note: &Note) -> bool {
        self.annually
            .map(|id| note.tag_ids.contains(&id))
            .unwrap_or(false)
    }

    pub fn repeats_monthly(&self, note: &Note) -> bool {
        self.monthly
            .map(|id| note.tag_ids.contains(&id))
            .unwrap_or(false)
    }
}

/// Lowercases and trims a user-supplied tag slug.
pub fn normalize_slug(raw: &str) -> String {
    raw.trim().to_lowercase()
}
