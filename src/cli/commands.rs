use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use time::format_description::{self, FormatItem};
use time::OffsetDateTime;

use crate::config::{AppConfig, SortDirection, SortField, SortSpec};
use crate::due::{rollovers, select_approaching, Approaching, Clock, View, SECONDS_PER_DAY};
use crate::model::{Note, NoteStatus};
use crate::search::{filter_notes, parse_date, parse_query, regex_pattern_from_input};
use crate::storage::NoteStore;

#[derive(Args, Debug, Clone, Default)]
pub struct DueArgs {
    /// Look-ahead mode: default or long (overrides the configured default_view)
    #[arg(long)]
    pub view: Option<View>,
    /// Persist the matched cycle date as the new due date of repeating notes
    #[arg(long)]
    pub commit: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note (prompted if omitted)
    #[arg()]
    pub title: Option<String>,
    /// Provide the note body inline. If omitted, reads from stdin.
    #[arg(long)]
    pub body: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
    /// Tag to attach (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Search query terms (supports tag:, title:, status: and due: ranges)
    #[arg()]
    pub query: Vec<String>,
    /// Treat the free terms as a regular expression
    #[arg(long)]
    pub regex: bool,
    /// Limit the number of results printed
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct NoteIdArgs {
    /// Note identifier
    pub note_id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Note identifier
    pub note_id: i64,
    /// New status: pending, suspended or done
    pub status: NoteStatus,
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    /// Note identifier
    pub note_id: i64,
    /// Due date (YYYY-MM-DD), or "none" to clear it
    pub date: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TagCommand {
    /// Attach a tag to a note
    Add(TagNoteArgs),
    /// Remove a tag from a note
    Remove(TagNoteArgs),
    /// List tags associated with a note
    List(NoteIdArgs),
    /// Create a tag in a group (use group "repeat" for recurring tags)
    Create(TagCreateArgs),
    /// Delete a tag from all notes
    Delete(TagDeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TagNoteArgs {
    /// Note identifier
    pub note_id: i64,
    /// Tag slug (whitespace trimmed, lowercased)
    pub tag: String,
}

#[derive(Args, Debug, Clone)]
pub struct TagCreateArgs {
    /// Tag slug
    pub tag: String,
    /// Group the tag belongs to
    #[arg(long, default_value = "general")]
    pub group: String,
}

#[derive(Args, Debug, Clone)]
pub struct TagDeleteArgs {
    /// Tag slug to delete
    pub tag: String,
}

#[derive(Args, Debug, Clone)]
pub struct TagArgs {
    #[command(subcommand)]
    pub command: TagCommand,
}

pub fn show_due(
    config: Arc<AppConfig>,
    store: &mut NoteStore,
    clock: &dyn Clock,
    args: DueArgs,
) -> Result<()> {
    let output = run_due(&config, store, clock, &args)?;
    print!("{output}");
    Ok(())
}

fn run_due(
    config: &AppConfig,
    store: &mut NoteStore,
    clock: &dyn Clock,
    args: &DueArgs,
) -> Result<String> {
    let view = args.view.unwrap_or(config.default_view);
    let date_format = format_description::parse(&config.display.date_format)
        .with_context(|| format!("parsing date format '{}'", config.display.date_format))?;
    let now = clock.now_unix();
    let repeat_tags = store.repeat_tags();

    let (mut output, updates) = {
        let mut selection = select_approaching(store.notes(), &repeat_tags, view, clock);
        let updates = if args.commit {
            rollovers(&selection)
        } else {
            Vec::new()
        };
        sort_selection(&mut selection, config.display.sort);
        (
            format_due_listing(store, &selection, now, &date_format),
            updates,
        )
    };

    if args.commit && !updates.is_empty() {
        let changed = store.roll_forward(&updates);
        store.save().context("saving rolled-forward due dates")?;
        let _ = writeln!(
            &mut output,
            "Rolled {} repeating note{} forward",
            changed,
            if changed == 1 { "" } else { "s" }
        );
    }
    Ok(output)
}

fn sort_selection(selection: &mut [Approaching<'_>], sort: SortSpec) {
    selection.sort_by(|a, b| {
        let ordering = match sort.field {
            SortField::Due => a.effective_due.cmp(&b.effective_due),
            SortField::Created => a.note.created_at.cmp(&b.note.created_at),
            SortField::Title => a
                .note
                .title
                .to_lowercase()
                .cmp(&b.note.title.to_lowercase()),
        }
        .then(a.note.id.cmp(&b.note.id));
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

fn format_due_listing(
    store: &NoteStore,
    selection: &[Approaching<'_>],
    now: i64,
    date_format: &[FormatItem<'_>],
) -> String {
    if selection.is_empty() {
        return "Nothing due.\n".to_string();
    }
    let mut out = String::new();
    for entry in selection {
        let _ = writeln!(&mut out, "{}", due_headline(entry, now, date_format));
        let tags = store.note_tag_slugs(entry.note);
        if !tags.is_empty() {
            let _ = writeln!(&mut out, "    tags    {}", format_tags(&tags));
        }
    }
    out
}

fn due_headline(entry: &Approaching<'_>, now: i64, date_format: &[FormatItem<'_>]) -> String {
    let mut headline = format!(
        "#{}  {}  due {} ({})",
        entry.note.id,
        entry.note.title,
        format_date(entry.effective_due, date_format),
        relative_label(now, entry.effective_due)
    );
    if let Some(kind) = entry.repeat {
        let _ = write!(&mut headline, "  repeats {kind}");
    }
    headline
}

fn relative_label(now: i64, due: i64) -> String {
    let days = due.div_euclid(SECONDS_PER_DAY) - now.div_euclid(SECONDS_PER_DAY);
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        -1 => "yesterday".to_string(),
        d if d > 1 => format!("in {d} days"),
        d => format!("{} days overdue", -d),
    }
}

pub fn new_note(store: &mut NoteStore, args: NewArgs) -> Result<()> {
    let title = match args.title.clone() {
        Some(t) => t,
        None => prompt("Title")?,
    };
    let body = match args.body.clone() {
        Some(body) => body,
        None => read_stdin()?.unwrap_or_default(),
    };
    let note_id = create_note(store, &title, &body, &args)?;
    store.save().context("saving new note")?;
    println!("Created note #{note_id}");
    Ok(())
}

fn create_note(store: &mut NoteStore, title: &str, body: &str, args: &NewArgs) -> Result<i64> {
    let complete_by = match args.due.as_deref() {
        Some(date) => parse_due_date(date)?,
        None => 0,
    };
    let note_id = store.create_note(title, body).context("creating note")?;
    if complete_by != 0 {
        store.set_complete_by(note_id, complete_by)?;
    }
    for tag in &args.tags {
        store
            .add_tag_to_note(note_id, tag)
            .with_context(|| format!("adding tag '{tag}' to note {note_id}"))?;
    }
    Ok(note_id)
}

pub fn list_notes(config: Arc<AppConfig>, store: &NoteStore, args: ListArgs) -> Result<()> {
    let output = run_search(&config, store, &args)?;
    print!("{output}");
    Ok(())
}

fn run_search(config: &AppConfig, store: &NoteStore, args: &ListArgs) -> Result<String> {
    let raw_query = args.query.join(" ");
    let trimmed = raw_query.trim();
    let mut query = parse_query(trimmed);
    if args.regex || config.search.regex_default {
        query.regex_pattern = regex_pattern_from_input(trimmed);
    }
    let limit = args.limit.unwrap_or(config.search.max_results);
    let date_format = format_description::parse(&config.display.date_format)
        .with_context(|| format!("parsing date format '{}'", config.display.date_format))?;

    let results = filter_notes(store, &query, limit).context("executing search")?;
    Ok(format_search_results(store, &results, &date_format))
}

fn format_search_results(
    store: &NoteStore,
    notes: &[&Note],
    date_format: &[FormatItem<'_>],
) -> String {
    if notes.is_empty() {
        return "No matches found.\n".to_string();
    }
    let mut out = String::new();
    for note in notes {
        let mut headline = format!("#{}  {}", note.id, note.title);
        match note.status {
            NoteStatus::Pending => {}
            NoteStatus::Suspended => headline.push_str("  [SUSPENDED]"),
            NoteStatus::Done => headline.push_str("  [DONE]"),
        }
        let _ = writeln!(&mut out, "{headline}");
        if note.has_due_date() {
            let _ = writeln!(
                &mut out,
                "    due     {}",
                format_date(note.complete_by, date_format)
            );
        }
        let tags = store.note_tag_slugs(note);
        if !tags.is_empty() {
            let _ = writeln!(&mut out, "    tags    {}", format_tags(&tags));
        }
        if let Some(snippet) = build_snippet(note, 2) {
            let _ = writeln!(&mut out, "    {snippet}");
        }
        out.push('\n');
    }
    out
}

pub fn mark_done(store: &mut NoteStore, args: NoteIdArgs) -> Result<()> {
    set_status(
        store,
        StatusArgs {
            note_id: args.note_id,
            status: NoteStatus::Done,
        },
    )
}

pub fn set_status(store: &mut NoteStore, args: StatusArgs) -> Result<()> {
    store
        .set_status(args.note_id, args.status)
        .with_context(|| format!("updating status of note {}", args.note_id))?;
    store.save()?;
    println!("Note #{} is now {}", args.note_id, args.status);
    Ok(())
}

pub fn schedule(store: &mut NoteStore, args: ScheduleArgs) -> Result<()> {
    let message = apply_schedule(store, &args)?;
    store.save()?;
    println!("{message}");
    Ok(())
}

fn apply_schedule(store: &mut NoteStore, args: &ScheduleArgs) -> Result<String> {
    let date = args.date.trim();
    if date.eq_ignore_ascii_case("none") {
        store.set_complete_by(args.note_id, 0)?;
        return Ok(format!("Cleared due date of note #{}", args.note_id));
    }
    let complete_by = parse_due_date(date)?;
    store.set_complete_by(args.note_id, complete_by)?;
    Ok(format!("Note #{} is due {}", args.note_id, date))
}

pub fn handle_tag_command(store: &mut NoteStore, args: TagArgs) -> Result<()> {
    let message = apply_tag_command(store, args.command)?;
    store.save_if_dirty()?;
    print!("{message}");
    Ok(())
}

fn apply_tag_command(store: &mut NoteStore, command: TagCommand) -> Result<String> {
    match command {
        TagCommand::Add(args) => {
            store
                .add_tag_to_note(args.note_id, &args.tag)
                .with_context(|| format!("adding tag '{}' to note {}", args.tag, args.note_id))?;
            Ok(format!(
                "Added tag '{}' to note #{} ({})\n",
                args.tag.trim(),
                args.note_id,
                note_title(store, args.note_id)
            ))
        }
        TagCommand::Remove(args) => {
            store
                .remove_tag_from_note(args.note_id, &args.tag)
                .with_context(|| {
                    format!("removing tag '{}' from note {}", args.tag, args.note_id)
                })?;
            Ok(format!(
                "Removed tag '{}' from note #{} ({})\n",
                args.tag.trim(),
                args.note_id,
                note_title(store, args.note_id)
            ))
        }
        TagCommand::List(args) => {
            let Some(note) = store.note(args.note_id) else {
                bail!("note #{} not found", args.note_id);
            };
            let mut out = format!("Tags for note #{} ({})\n", note.id, note.title);
            let tags = store.note_tag_slugs(note);
            if tags.is_empty() {
                out.push_str("(no tags)\n");
            }
            for tag in tags {
                let _ = writeln!(&mut out, "- {tag}");
            }
            Ok(out)
        }
        TagCommand::Create(args) => {
            let group = args.group.trim();
            if group.is_empty() {
                bail!("tag group cannot be empty");
            }
            store
                .create_tag(&args.tag, group)
                .with_context(|| format!("creating tag '{}'", args.tag))?;
            Ok(format!(
                "Created tag '{}' in group '{}'\n",
                args.tag.trim(),
                group
            ))
        }
        TagCommand::Delete(args) => {
            let outcome = store
                .delete_tag(&args.tag)
                .with_context(|| format!("deleting tag '{}'", args.tag))?;
            let plural = if outcome.detached == 1 { "" } else { "s" };
            Ok(format!(
                "Deleted tag '{}' (removed from {} note{})\n",
                outcome.tag, outcome.detached, plural
            ))
        }
    }
}

pub fn list_tags(store: &NoteStore) -> Result<()> {
    print!("{}", format_tag_table(store));
    Ok(())
}

fn format_tag_table(store: &NoteStore) -> String {
    let mut out = String::new();
    for tag in store.tags() {
        let uses = store
            .notes()
            .iter()
            .filter(|note| note.tag_ids.contains(&tag.id))
            .count();
        let _ = writeln!(&mut out, "#{:<20} {:<10} {uses}", tag.slug, tag.group);
    }
    if out.is_empty() {
        out.push_str("(no tags)\n");
    }
    out
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn parse_due_date(input: &str) -> Result<i64> {
    match parse_date(input.trim()) {
        Some(ts) => Ok(ts),
        None => bail!("invalid due date '{input}', expected YYYY-MM-DD"),
    }
}

fn note_title(store: &NoteStore, note_id: i64) -> String {
    store
        .note(note_id)
        .map(|note| note.title.clone())
        .unwrap_or_else(|| "<untitled>".into())
}

fn build_snippet(note: &Note, fallback_lines: usize) -> Option<String> {
    if fallback_lines == 0 {
        return None;
    }
    let mut segments = Vec::new();
    for line in note.body.lines().take(fallback_lines) {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            segments.push(trimmed.to_string());
        }
    }
    if segments.is_empty() {
        None
    } else {
        let snippet = segments.join(" ");
        let truncated = snippet.chars().take(160).collect::<String>();
        Some(truncated)
    }
}

fn format_tags(tags: &[&str]) -> String {
    tags.iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_date(epoch: i64, date_format: &[FormatItem<'_>]) -> String {
    OffsetDateTime::from_unix_timestamp(epoch)
        .ok()
        .and_then(|dt| dt.format(date_format).ok())
        .unwrap_or_else(|| epoch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, StorageOptions};
    use crate::due::FixedClock;
    use crate::model::REPEAT_GROUP;
    use crate::storage;
    use insta::assert_snapshot;
    use tempfile::TempDir;
    use time::macros::datetime;

    type TestResult<T = ()> = Result<T>;

    fn new_args(due: Option<&str>, tags: &[&str]) -> NewArgs {
        NewArgs {
            title: None,
            body: None,
            due: due.map(str::to_string),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    fn date_items() -> Vec<FormatItem<'static>> {
        format_description::parse("[year]-[month]-[day]").expect("valid format")
    }

    #[test]
    fn due_lists_repeating_and_one_off_notes_sorted_by_effective_date() -> TestResult {
        let (_temp_dir, mut store) = setup_storage()?;
        let far = create_note(
            &mut store,
            "Book flights",
            "",
            &new_args(Some("2025-12-01"), &[]),
        )?;
        let soon = create_note(
            &mut store,
            "Dentist",
            "",
            &new_args(Some("2025-08-20"), &["health"]),
        )?;
        let rent = create_note(
            &mut store,
            "Pay rent",
            "",
            &new_args(Some("2020-01-15"), &["repeat-monthly"]),
        )?;

        let clock = FixedClock(datetime!(2025-08-14 09:00 UTC));
        let output = run_due(&AppConfig::default(), &mut store, &clock, &DueArgs::default())?;

        let rent_pos = output
            .find(&format!("#{rent}  Pay rent  due 2025-08-15 (tomorrow)  repeats monthly"))
            .expect("rent listed");
        let soon_pos = output
            .find(&format!("#{soon}  Dentist  due 2025-08-20 (in 6 days)"))
            .expect("dentist listed");
        assert!(rent_pos < soon_pos);
        assert!(output.contains("    tags    #health"));
        assert!(!output.contains(&format!("#{far} ")));
        Ok(())
    }

    #[test]
    fn long_view_reaches_further() -> TestResult {
        let (_temp_dir, mut store) = setup_storage()?;
        create_note(
            &mut store,
            "Book flights",
            "",
            &new_args(Some("2025-12-01"), &[]),
        )?;
        let clock = FixedClock(datetime!(2025-08-14 09:00 UTC));

        let output = run_due(&AppConfig::default(), &mut store, &clock, &DueArgs::default())?;
        assert_eq!(output, "Nothing due.\n");

        let args = DueArgs {
            view: Some(View::Long),
            commit: false,
        };
        let output = run_due(&AppConfig::default(), &mut store, &clock, &args)?;
        assert!(output.contains("Book flights  due 2025-12-01 (in 109 days)"));
        Ok(())
    }

    #[test]
    fn due_commit_persists_matched_cycle() -> TestResult {
        let (_temp_dir, mut store) = setup_storage()?;
        let birthday = create_note(
            &mut store,
            "Call Sam",
            "",
            &new_args(Some("1990-03-02"), &["repeat-annually"]),
        )?;
        store.save()?;

        let clock = FixedClock(datetime!(2026-02-28 08:00 UTC));
        let args = DueArgs {
            view: None,
            commit: true,
        };
        let output = run_due(&AppConfig::default(), &mut store, &clock, &args)?;
        assert!(output.contains("due 2026-03-02 (in 2 days)  repeats annual"));
        assert!(output.ends_with("Rolled 1 repeating note forward\n"));

        let reloaded = NoteStore::load(store.path(), &StorageOptions::default())?;
        assert_eq!(
            reloaded.note(birthday).map(|note| note.complete_by),
            Some(datetime!(2026-03-02 0:00 UTC).unix_timestamp())
        );

        // A second commit finds nothing left to roll.
        let output = run_due(&AppConfig::default(), &mut store, &clock, &args)?;
        assert!(!output.contains("Rolled"));
        Ok(())
    }

    #[test]
    fn custom_repeat_group_tag_without_role_is_hidden() -> TestResult {
        let (_temp_dir, mut store) = setup_storage()?;
        apply_tag_command(
            &mut store,
            TagCommand::Create(TagCreateArgs {
                tag: "birthdays".into(),
                group: REPEAT_GROUP.into(),
            }),
        )?;
        create_note(
            &mut store,
            "Mystery",
            "",
            &new_args(Some("2025-08-14"), &["birthdays"]),
        )?;
        let clock = FixedClock(datetime!(2025-08-14 09:00 UTC));
        let output = run_due(&AppConfig::default(), &mut store, &clock, &DueArgs::default())?;
        assert_eq!(output, "Nothing due.\n");
        Ok(())
    }

    #[test]
    fn due_headline_snapshot() {
        let note = Note {
            id: 3,
            title: "Pay rent".into(),
            body: String::new(),
            status: NoteStatus::Pending,
            complete_by: 0,
            tag_ids: Default::default(),
            created_at: 0,
            updated_at: 0,
        };
        let entry = Approaching {
            note: &note,
            effective_due: datetime!(2025-08-12 0:00 UTC).unix_timestamp(),
            repeat: Some(crate::due::RepeatKind::Monthly),
        };
        let now = datetime!(2025-08-14 09:00 UTC).unix_timestamp();
        assert_snapshot!(
            due_headline(&entry, now, &date_items()),
            @"#3  Pay rent  due 2025-08-12 (2 days overdue)  repeats monthly"
        );
    }

    #[test]
    fn relative_labels() {
        let now = datetime!(2025-08-14 23:00 UTC).unix_timestamp();
        let midnight = |d: time::Date| d.midnight().assume_utc().unix_timestamp();
        assert_eq!(relative_label(now, midnight(time::macros::date!(2025-08-14))), "today");
        assert_eq!(relative_label(now, midnight(time::macros::date!(2025-08-15))), "tomorrow");
        assert_eq!(relative_label(now, midnight(time::macros::date!(2025-08-13))), "yesterday");
        assert_eq!(
            relative_label(now, midnight(time::macros::date!(2025-08-04))),
            "10 days overdue"
        );
    }

    #[test]
    fn sort_by_title_descending() -> TestResult {
        let (_temp_dir, mut store) = setup_storage()?;
        for title in ["alpha", "Charlie", "bravo"] {
            create_note(&mut store, title, "", &new_args(Some("2025-08-15"), &[]))?;
        }
        let mut config = AppConfig::default();
        config.display.sort = SortSpec {
            field: SortField::Title,
            direction: SortDirection::Descending,
        };
        let clock = FixedClock(datetime!(2025-08-14 09:00 UTC));
        let output = run_due(&config, &mut store, &clock, &DueArgs::default())?;
        let titles: Vec<&str> = output
            .lines()
            .filter_map(|line| line.split("  ").nth(1))
            .collect();
        assert_eq!(titles, vec!["Charlie", "bravo", "alpha"]);
        Ok(())
    }

    #[test]
    fn list_filters_tags_and_marks_status() -> TestResult {
        let (_temp_dir, mut store) = setup_storage()?;
        let project = create_note(
            &mut store,
            "Project Plan",
            "Timeline overview",
            &new_args(Some("2025-09-01"), &["project"]),
        )?;
        store.set_status(project, NoteStatus::Done)?;
        create_note(&mut store, "Misc Note", "Just chatter", &new_args(None, &["misc"]))?;

        let args = ListArgs {
            query: vec!["tag:project".into()],
            regex: false,
            limit: None,
        };
        let output = run_search(&AppConfig::default(), &store, &args)?;

        assert!(output.contains("Project Plan  [DONE]"));
        assert!(output.contains("    due     2025-09-01"));
        assert!(output.contains("    Timeline overview"));
        assert!(!output.contains("Misc Note"));
        Ok(())
    }

    #[test]
    fn list_supports_regex_and_empty_query() -> TestResult {
        let (_temp_dir, mut store) = setup_storage()?;
        create_note(&mut store, "Regex Note", "alpha foo123bar omega", &new_args(None, &[]))?;
        create_note(&mut store, "Regex Miss", "alpha foozzz omega", &new_args(None, &[]))?;

        let args = ListArgs {
            query: vec!["foo[0-9]+bar".into()],
            regex: true,
            limit: None,
        };
        let output = run_search(&AppConfig::default(), &store, &args)?;
        assert!(output.contains("Regex Note"));
        assert!(!output.contains("Regex Miss"));

        let everything = ListArgs {
            query: Vec::new(),
            regex: false,
            limit: Some(1),
        };
        let output = run_search(&AppConfig::default(), &store, &everything)?;
        assert!(output.contains("Regex Note"));
        assert!(!output.contains("Regex Miss"));
        Ok(())
    }

    #[test]
    fn schedule_sets_and_clears_due_date() -> TestResult {
        let (_temp_dir, mut store) = setup_storage()?;
        let id = create_note(&mut store, "Taxes", "", &new_args(None, &[]))?;

        let message = apply_schedule(
            &mut store,
            &ScheduleArgs {
                note_id: id,
                date: "2026-04-30".into(),
            },
        )?;
        assert_eq!(message, format!("Note #{id} is due 2026-04-30"));
        assert_eq!(
            store.note(id).map(|note| note.complete_by),
            Some(datetime!(2026-04-30 0:00 UTC).unix_timestamp())
        );

        apply_schedule(
            &mut store,
            &ScheduleArgs {
                note_id: id,
                date: "None".into(),
            },
        )?;
        assert_eq!(store.note(id).map(|note| note.complete_by), Some(0));

        assert!(apply_schedule(
            &mut store,
            &ScheduleArgs {
                note_id: id,
                date: "30/04/2026".into(),
            },
        )
        .is_err());
        Ok(())
    }

    #[test]
    fn tag_commands_round_trip() -> TestResult {
        let (_temp_dir, mut store) = setup_storage()?;
        let id = create_note(&mut store, "Groceries", "", &new_args(None, &[]))?;

        let added = apply_tag_command(
            &mut store,
            TagCommand::Add(TagNoteArgs {
                note_id: id,
                tag: " Errands ".into(),
            }),
        )?;
        assert_eq!(added, format!("Added tag 'Errands' to note #{id} (Groceries)\n"));

        let listed = apply_tag_command(&mut store, TagCommand::List(NoteIdArgs { note_id: id }))?;
        assert_eq!(listed, format!("Tags for note #{id} (Groceries)\n- errands\n"));

        let deleted = apply_tag_command(
            &mut store,
            TagCommand::Delete(TagDeleteArgs {
                tag: "errands".into(),
            }),
        )?;
        assert_eq!(deleted, "Deleted tag 'errands' (removed from 1 note)\n");

        let listed = apply_tag_command(&mut store, TagCommand::List(NoteIdArgs { note_id: id }))?;
        assert!(listed.ends_with("(no tags)\n"));
        Ok(())
    }

    #[test]
    fn tag_table_counts_usage() -> TestResult {
        let (_temp_dir, mut store) = setup_storage()?;
        create_note(&mut store, "Rent", "", &new_args(None, &["repeat-monthly"]))?;
        let table = format_tag_table(&store);
        let monthly = table
            .lines()
            .find(|line| line.starts_with("#repeat-monthly"))
            .expect("monthly tag listed");
        assert!(monthly.contains("repeat"));
        assert!(monthly.ends_with(" 1"));
        Ok(())
    }

    fn setup_storage() -> TestResult<(TempDir, NoteStore)> {
        let temp = TempDir::new().context("creating temp dir")?;
        let root = temp.path();
        let paths = ConfigPaths::rooted(
            root.join("config"),
            root.join("config/config.toml"),
            root.join("data"),
        );
        paths.ensure_directories()?;
        let mut storage_opts = StorageOptions::default();
        storage_opts.notes_path = paths.notes_path.clone();
        storage_opts.backup_dir = paths.backup_dir.clone();
        storage_opts.backup_on_save = false;

        let store = storage::init(&paths, &storage_opts)?;
        Ok((temp, store))
    }
}
