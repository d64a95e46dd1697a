pub mod cli;
pub mod config;
pub mod due;
pub mod model;
pub mod search;
pub mod storage;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use due::{select_approaching, Approaching, Clock, View};
pub use storage::NoteStore;
