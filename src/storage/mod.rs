use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};
use crate::due::{self, DueUpdate};
use crate::model::{
    normalize_slug, Note, NoteStatus, RepeatTags, Tag, TagRole, GENERAL_GROUP, REPEAT_GROUP,
};

mod backup;

const TMP_EXTENSION: &str = "json.tmp";
const MAX_TAG_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("note #{0} not found")]
    NoteNotFound(i64),
    #[error("tag '{0}' not found")]
    TagNotFound(String),
    #[error("tag '{0}' already exists")]
    TagExists(String),
    #[error("tag '{tag}' not associated with note #{note_id}")]
    TagNotOnNote { note_id: i64, tag: String },
    #[error("{} changed on disk since it was loaded (revision {loaded} -> {found})", .path.display())]
    Conflict {
        path: PathBuf,
        loaded: u64,
        found: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDeleteOutcome {
    pub tag: String,
    pub detached: usize,
}

/// On-disk layout of the notes file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NoteFile {
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    modified_at: i64,
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    tags: Vec<Tag>,
}

/// In-memory copy of the notes file.
///
/// Writes are guarded by the revision read at load time: if another process
/// saved in between, [`NoteStore::save`] fails with [`StorageError::Conflict`]
/// instead of overwriting its changes.
#[derive(Debug)]
pub struct NoteStore {
    path: PathBuf,
    options: StorageOptions,
    revision: u64,
    notes: Vec<Note>,
    tags: IndexMap<i64, Tag>,
    dirty: bool,
}

impl NoteStore {
    pub fn load(path: &Path, options: &StorageOptions) -> Result<Self> {
        let file = read_note_file(path)?;
        tracing::debug!(
            path = %path.display(),
            revision = file.revision,
            notes = file.notes.len(),
            tags = file.tags.len(),
            "loaded notes file"
        );
        Ok(Self {
            path: path.to_path_buf(),
            options: options.clone(),
            revision: file.revision,
            notes: file.notes,
            tags: file.tags.into_iter().map(|tag| (tag.id, tag)).collect(),
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn save(&mut self) -> Result<()> {
        let found = persisted_revision(&self.path)?;
        if found != self.revision {
            return Err(StorageError::Conflict {
                path: self.path.clone(),
                loaded: self.revision,
                found,
            }
            .into());
        }

        if self.options.backup_on_save && self.path.exists() {
            let backup = backup::create(&self.path, &self.options.backup_dir, self.revision)?;
            tracing::info!(path = %backup.display(), "backed up notes file");
            let pruned = backup::prune(&self.options.backup_dir, self.options.backup_keep)?;
            if pruned > 0 {
                tracing::debug!(pruned, "pruned old backups");
            }
        }

        let file = NoteFile {
            revision: self.revision + 1,
            modified_at: OffsetDateTime::now_utc().unix_timestamp(),
            notes: self.notes.clone(),
            tags: self.tags.values().cloned().collect(),
        };
        write_note_file(&self.path, &file)?;
        self.revision = file.revision;
        self.dirty = false;
        tracing::info!(
            path = %self.path.display(),
            revision = self.revision,
            "saved notes file"
        );
        Ok(())
    }

    /// Saves only when something changed since the last load or save.
    pub fn save_if_dirty(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, note_id: i64) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == note_id)
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn tag_by_slug(&self, slug: &str) -> Option<&Tag> {
        let slug = canonical_slug(slug);
        self.tags.values().find(|tag| tag.slug == slug)
    }

    pub fn repeat_tags(&self) -> RepeatTags {
        RepeatTags::resolve(self.tags.values())
    }

    /// Tag slugs of a note in tag creation order; unknown ids are skipped.
    pub fn note_tag_slugs(&self, note: &Note) -> Vec<&str> {
        self.tags
            .values()
            .filter(|tag| note.tag_ids.contains(&tag.id))
            .map(|tag| tag.slug.as_str())
            .collect()
    }

    pub fn create_note(&mut self, title: &str, body: &str) -> Result<i64> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            bail!("note title cannot be empty");
        }
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let id = self.notes.iter().map(|note| note.id).max().unwrap_or(0) + 1;
        self.notes.push(Note {
            id,
            title: trimmed.to_owned(),
            body: body.to_owned(),
            status: NoteStatus::Pending,
            complete_by: 0,
            tag_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        });
        self.dirty = true;
        Ok(id)
    }

    pub fn set_status(&mut self, note_id: i64, status: NoteStatus) -> Result<()> {
        let note = self.note_mut(note_id)?;
        note.status = status;
        touch(note);
        self.dirty = true;
        Ok(())
    }

    /// Sets the due date in unix seconds; 0 clears it.
    pub fn set_complete_by(&mut self, note_id: i64, complete_by: i64) -> Result<()> {
        let note = self.note_mut(note_id)?;
        note.complete_by = complete_by;
        touch(note);
        self.dirty = true;
        Ok(())
    }

    pub fn create_tag(&mut self, slug: &str, group: &str) -> Result<i64> {
        let slug = clean_slug(slug)?;
        if self.tag_by_slug(&slug).is_some() {
            return Err(StorageError::TagExists(slug).into());
        }
        Ok(self.insert_tag(slug, group.trim()))
    }

    /// Attaches a tag, creating it in the general group when it does not exist yet.
    pub fn add_tag_to_note(&mut self, note_id: i64, slug: &str) -> Result<()> {
        let slug = clean_slug(slug)?;
        self.note_mut(note_id)?;
        let tag_id = match self.tag_by_slug(&slug) {
            Some(tag) => tag.id,
            None => self.insert_tag(slug, GENERAL_GROUP),
        };
        let note = self.note_mut(note_id)?;
        if note.tag_ids.insert(tag_id) {
            touch(note);
            self.dirty = true;
        }
        Ok(())
    }

    pub fn remove_tag_from_note(&mut self, note_id: i64, slug: &str) -> Result<()> {
        let slug = clean_slug(slug)?;
        let tag_id = self
            .tag_by_slug(&slug)
            .map(|tag| tag.id)
            .ok_or_else(|| StorageError::TagNotFound(slug.clone()))?;
        let note = self.note_mut(note_id)?;
        if !note.tag_ids.remove(&tag_id) {
            return Err(StorageError::TagNotOnNote { note_id, tag: slug }.into());
        }
        touch(note);
        self.dirty = true;
        Ok(())
    }

    pub fn delete_tag(&mut self, slug: &str) -> Result<TagDeleteOutcome> {
        let slug = clean_slug(slug)?;
        let tag_id = self
            .tag_by_slug(&slug)
            .map(|tag| tag.id)
            .ok_or_else(|| StorageError::TagNotFound(slug.clone()))?;
        let mut detached = 0;
        for note in &mut self.notes {
            if note.tag_ids.remove(&tag_id) {
                touch(note);
                detached += 1;
            }
        }
        self.tags.shift_remove(&tag_id);
        self.dirty = true;
        Ok(TagDeleteOutcome {
            tag: slug,
            detached,
        })
    }

    /// Persists re-anchored due dates of repeating notes.
    pub fn roll_forward(&mut self, updates: &[DueUpdate]) -> usize {
        let effective: Vec<DueUpdate> = updates
            .iter()
            .copied()
            .filter(|update| {
                self.note(update.note_id)
                    .map(|note| note.complete_by != update.complete_by)
                    .unwrap_or(false)
            })
            .collect();
        let changed = due::roll_forward(&mut self.notes, &effective);
        for update in &effective {
            if let Some(note) = self.notes.iter_mut().find(|n| n.id == update.note_id) {
                touch(note);
            }
        }
        if changed > 0 {
            self.dirty = true;
        }
        changed
    }

    fn note_mut(&mut self, note_id: i64) -> Result<&mut Note> {
        self.notes
            .iter_mut()
            .find(|note| note.id == note_id)
            .ok_or_else(|| StorageError::NoteNotFound(note_id).into())
    }

    fn insert_tag(&mut self, slug: String, group: &str) -> i64 {
        let id = self.tags.keys().copied().max().unwrap_or(0) + 1;
        self.tags.insert(
            id,
            Tag {
                id,
                slug,
                group: group.to_owned(),
            },
        );
        self.dirty = true;
        id
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<NoteStore> {
    let notes_path = &paths.notes_path;
    if let Some(parent) = notes_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let mut options = storage.clone();
    if options.backup_dir.as_os_str().is_empty() {
        options.backup_dir = paths.backup_dir.clone();
    }
    let mut store = NoteStore::load(notes_path, &options)?;
    if store.revision == 0 && store.tags.is_empty() && store.notes.is_empty() {
        seed_initial_tags(&mut store);
        store.save()?;
    }
    Ok(store)
}

fn seed_initial_tags(store: &mut NoteStore) {
    tracing::info!("seeding first-run tags");
    for role in [TagRole::RepeatAnnually, TagRole::RepeatMonthly] {
        store.insert_tag(role.slug().to_owned(), REPEAT_GROUP);
    }
    store.insert_tag("inbox".to_owned(), GENERAL_GROUP);
}

fn clean_slug(raw: &str) -> Result<String> {
    let slug = canonical_slug(raw);
    if slug.is_empty() {
        bail!("tag cannot be empty");
    }
    if slug.chars().any(char::is_whitespace) {
        bail!("tag '{slug}' cannot contain whitespace");
    }
    Ok(slug)
}

/// Normalised slug cut to `MAX_TAG_LEN` bytes on a char boundary.
fn canonical_slug(raw: &str) -> String {
    let mut slug = normalize_slug(raw);
    if slug.len() > MAX_TAG_LEN {
        let cut = (0..=MAX_TAG_LEN)
            .rev()
            .find(|idx| slug.is_char_boundary(*idx))
            .unwrap_or(0);
        slug.truncate(cut);
    }
    slug
}

fn touch(note: &mut Note) {
    note.updated_at = OffsetDateTime::now_utc().unix_timestamp();
}

fn read_note_file(path: &Path) -> Result<NoteFile> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(NoteFile::default()),
        Err(err) => {
            return Err(err).with_context(|| format!("reading notes file {}", path.display()))
        }
    };
    serde_json::from_slice(&raw).with_context(|| format!("parsing notes file {}", path.display()))
}

fn persisted_revision(path: &Path) -> Result<u64> {
    Ok(read_note_file(path)?.revision)
}

fn write_note_file(path: &Path, file: &NoteFile) -> Result<()> {
    let json = serde_json::to_vec_pretty(file).context("serialising notes file")?;
    let tmp_path = path.with_extension(TMP_EXTENSION);
    fs::write(&tmp_path, &json)
        .with_context(|| format!("writing temporary notes file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("atomically persisting notes file {}", path.display()))?;
    Ok(())
}
