use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::OffsetDateTime;

const BACKUP_PREFIX: &str = "notes-";
const BACKUP_EXTENSION: &str = ".json";

/// Copies the current notes file into `backup_dir` before it is overwritten.
pub fn create(notes_path: &Path, backup_dir: &Path, revision: u64) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)
        .with_context(|| format!("creating backup directory {}", backup_dir.display()))?;
    let stamp = OffsetDateTime::now_utc().unix_timestamp();
    let target = backup_dir.join(format!(
        "{BACKUP_PREFIX}{stamp:012}-{revision:08}{BACKUP_EXTENSION}"
    ));
    fs::copy(notes_path, &target).with_context(|| {
        format!(
            "copying {} to {}",
            notes_path.display(),
            target.display()
        )
    })?;
    Ok(target)
}

/// Removes all but the newest `keep` backups. `keep == 0` keeps everything.
pub fn prune(backup_dir: &Path, keep: usize) -> Result<usize> {
    if keep == 0 {
        return Ok(0);
    }
    let mut backups = Vec::new();
    for entry in fs::read_dir(backup_dir)
        .with_context(|| format!("reading backup directory {}", backup_dir.display()))?
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(?err, "skipping unreadable backup entry");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_EXTENSION) {
            backups.push((name, entry.path()));
        }
    }
    if backups.len() <= keep {
        return Ok(0);
    }

    // Zero-padded names sort oldest first.
    backups.sort();
    let excess = backups.len() - keep;
    for (_, path) in backups.iter().take(excess) {
        fs::remove_file(path)
            .with_context(|| format!("removing old backup {}", path.display()))?;
    }
    Ok(excess)
}
