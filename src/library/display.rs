use crate::config::TrackDisplayField;

use super::model::Track;

/// Compose a label for `track` from `fields`, joined by `sep`.
///
/// Empty or missing fields are skipped; when nothing is produced the title is used.
pub fn display_from_fields(track: &Track, fields: &[TrackDisplayField], sep: &str) -> String {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    let parts: Vec<String> = fields
        .iter()
        .filter_map(|f| match f {
            TrackDisplayField::Display => non_empty(&track.display),
            TrackDisplayField::Title => non_empty(&track.title),
            TrackDisplayField::Artist => track.artist.as_deref().and_then(non_empty),
            TrackDisplayField::Album => track.album.as_deref().and_then(non_empty),
            TrackDisplayField::Filename => track
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(non_empty),
            TrackDisplayField::Path => Some(track.path.display().to_string()),
        })
        .collect();

    if parts.is_empty() {
        track.title.clone()
    } else {
        parts.join(sep)
    }
}

/// `Artist - Title`, or just the title when there is no artist.
pub(super) fn artist_title(title: &str, artist: Option<&str>) -> String {
    match artist.map(str::trim).filter(|a| !a.is_empty()) {
        Some(a) => format!("{} - {}", a, title),
        None => title.to_string(),
    }
}
