use std::path::{Path, PathBuf};
use std::time::Duration;

/// One playable item of the library. Immutable once scanned.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Path relative to the scanned root; unique within a library.
    pub id: String,
    pub path: PathBuf,
    /// Locator handed to the output device.
    pub url: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Tag-reported length, if the file could be probed.
    pub duration: Option<Duration>,
    pub display: String,
}

impl Track {
    /// Build a track for `path` with an id relative to `root` and no tag data.
    pub fn from_path(root: &Path, path: &Path) -> Self {
        let id = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN")
            .to_string();

        Self {
            id,
            path: path.to_path_buf(),
            url: file_url(path),
            display: title.clone(),
            title,
            artist: None,
            album: None,
            duration: None,
        }
    }

    /// `artist • album` line for secondary display, skipping missing parts.
    pub fn byline(&self) -> String {
        [self.artist.as_deref(), self.album.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" • ")
    }
}

pub(crate) fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}
