use std::path::Path;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::ItemKey;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::display::{artist_title, display_from_fields};
use super::model::Track;

fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn non_blank(v: &str) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// Fill title/artist/album/duration from the file's tags, when readable.
fn read_tags(track: &mut Track) {
    let tagged = match lofty::read_from_path(&track.path) {
        Ok(t) => t,
        Err(e) => {
            debug!(path = %track.path.display(), error = %e, "no readable tags");
            return;
        }
    };

    track.duration = Some(tagged.properties().duration());

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        if let Some(v) = tag.get_string(ItemKey::TrackTitle).and_then(non_blank) {
            track.title = v;
        }
        track.artist = tag.get_string(ItemKey::TrackArtist).and_then(non_blank);
        track.album = tag.get_string(ItemKey::AlbumTitle).and_then(non_blank);
    }
}

/// Walk `dir` and return every audio file as a `Track`, sorted by display label.
pub fn scan(dir: &Path, settings: &LibrarySettings) -> Vec<Track> {
    let mut tracks: Vec<Track> = Vec::new();

    // Track urls are built from walked paths and must be absolute.
    let root = match dir.canonicalize() {
        Ok(root) => root,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot resolve library directory");
            return tracks;
        }
    };

    let mut walker = WalkDir::new(&root).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    for entry in walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !path.is_file()
            || (!settings.include_hidden && is_hidden(path))
            || !is_audio_file(path, settings)
        {
            continue;
        }

        let mut track = Track::from_path(&root, path);
        read_tags(&mut track);
        // Base label, which `TrackDisplayField::Display` refers to.
        track.display = artist_title(&track.title, track.artist.as_deref());
        track.display =
            display_from_fields(&track, &settings.display_fields, &settings.display_separator);
        tracks.push(track);
    }

    tracks.sort_by(|a, b| a.display.to_lowercase().cmp(&b.display.to_lowercase()));
    info!(dir = %root.display(), count = tracks.len(), "library scanned");
    tracks
}
