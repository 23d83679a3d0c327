use std::env;
use std::path::{Path, PathBuf};

use crate::config::LibrarySettings;
use crate::library::{Library, scan};

/// Directory to scan: the first CLI argument, else `Music`.
pub fn music_dir() -> PathBuf {
    env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Music"))
}

pub fn load_library(dir: &Path, settings: &LibrarySettings) -> Library {
    Library::new(scan(dir, settings))
}
