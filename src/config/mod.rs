use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use time::format_description;

use crate::due::View;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Duenote";
const APP_NAME: &str = "duenote";

pub const DEFAULT_DATE_FORMAT: &str = "[year]-[month]-[day]";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Loads `config.toml`, writing the defaults first when it does not exist yet.
    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        let config_file = &self.paths.config_file;
        if config_file.exists() {
            return self.load();
        }

        let mut defaults = AppConfig::default();
        defaults.post_load(&self.paths)?;
        let rendered = toml::to_string_pretty(&defaults).context("rendering default config")?;
        fs::write(config_file, rendered)
            .with_context(|| format!("writing default config {}", config_file.display()))?;
        tracing::info!(path = %config_file.display(), "wrote default config");
        Ok(defaults)
    }

    pub fn load(&self) -> Result<AppConfig> {
        let config_file = &self.paths.config_file;
        let raw = fs::read_to_string(config_file)
            .with_context(|| format!("reading config {}", config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config {}", config_file.display()))?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub notes_path: PathBuf,
    pub backup_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("DUENOTE_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("DUENOTE_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        Ok(Self::rooted(config_dir, config_file, data_root))
    }

    /// Lays out the data files under `data_dir`.
    pub fn rooted(config_dir: PathBuf, config_file: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_dir,
            config_file,
            notes_path: data_dir.join("notes.json"),
            backup_dir: data_dir.join("backups"),
            data_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.backup_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_view: View,
    pub display: DisplayOptions,
    pub storage: StorageOptions,
    pub search: SearchOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_view: View::Default,
            display: DisplayOptions::default(),
            storage: StorageOptions::default(),
            search: SearchOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if format_description::parse(&self.display.date_format).is_err() {
            tracing::warn!(
                format = %self.display.date_format,
                "invalid date format in config, falling back to {DEFAULT_DATE_FORMAT}"
            );
            self.display.date_format = DEFAULT_DATE_FORMAT.to_string();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// `time` format description used when printing due dates.
    pub date_format: String,
    pub sort: SortSpec,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            sort: SortSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub notes_path: PathBuf,
    #[serde(skip)]
    pub backup_dir: PathBuf,
    pub backup_on_save: bool,
    /// Number of backups kept in the backup directory (0 = keep all)
    pub backup_keep: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            notes_path: PathBuf::new(),
            backup_dir: PathBuf::new(),
            backup_on_save: true,
            backup_keep: 20,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.notes_path.as_os_str().is_empty() {
            self.notes_path = paths.notes_path.clone();
        }
        if self.backup_dir.as_os_str().is_empty() {
            self.backup_dir = paths.backup_dir.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub max_results: usize,
    pub regex_default: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 200,
            regex_default: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Due,
            direction: SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SortField {
    Due,
    Created,
    Title,
}

impl Default for SortField {
    fn default() -> Self {
        SortField::Due
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Ascending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        ConfigPaths::rooted(
            config_dir.clone(),
            config_dir.join("config.toml"),
            base.join("data"),
        )
    }

    #[test]
    fn first_load_writes_default_config() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        let loader = ConfigLoader::with_paths(paths.clone());

        let cfg = loader.load_or_init()?;
        assert!(paths.config_file.exists());
        assert!(paths.backup_dir.is_dir());
        assert_eq!(cfg.default_view, View::Default);
        assert_eq!(cfg.storage.notes_path, paths.notes_path);
        assert_eq!(cfg.storage.backup_dir, paths.backup_dir);

        let reloaded = loader.load()?;
        assert_eq!(reloaded.display.sort, SortSpec::default());
        assert_eq!(reloaded.storage.backup_keep, 20);
        Ok(())
    }

    #[test]
    fn partial_config_keeps_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "default_view = \"long\"\n\n[display]\ndate_format = \"[oops\"\n\n[display.sort]\nfield = \"title\"\n",
        )?;

        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.default_view, View::Long);
        assert_eq!(cfg.display.sort.field, SortField::Title);
        assert_eq!(cfg.display.sort.direction, SortDirection::Ascending);
        assert_eq!(cfg.display.date_format, DEFAULT_DATE_FORMAT);
        assert!(cfg.storage.backup_on_save);
        Ok(())
    }
}
