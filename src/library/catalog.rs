//! In-memory library service: song listing, search and playlist CRUD.
//!
//! The playback engine only ever receives `Vec<Track>` values from here;
//! it never writes back into the library.

use std::fmt;

use tracing::info;

use crate::error::LibraryError;

use super::model::Track;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaylistId(String);

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, ordered list of track ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub track_ids: Vec<String>,
}

/// Lower-cased title/artist/album, computed once per track for search.
struct SearchKey {
    title: String,
    artist: String,
    album: String,
}

impl SearchKey {
    fn new(track: &Track) -> Self {
        Self {
            title: track.title.to_lowercase(),
            artist: track.artist.as_deref().unwrap_or_default().to_lowercase(),
            album: track.album.as_deref().unwrap_or_default().to_lowercase(),
        }
    }

    fn matches(&self, query_lower: &str) -> bool {
        self.title.contains(query_lower)
            || self.artist.contains(query_lower)
            || self.album.contains(query_lower)
    }
}

pub struct Library {
    songs: Vec<Track>,
    keys: Vec<SearchKey>,
    playlists: Vec<Playlist>,
    next_playlist: u64,
}

impl Library {
    pub fn new(songs: Vec<Track>) -> Self {
        let keys = songs.iter().map(SearchKey::new).collect();
        Self {
            songs,
            keys,
            playlists: Vec::new(),
            next_playlist: 1,
        }
    }

    pub fn list_songs(&self) -> &[Track] {
        &self.songs
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.songs.iter().find(|t| t.id == id)
    }

    /// Case-insensitive substring match over title, artist and album.
    ///
    /// The query is trimmed; an empty query returns every song.
    pub fn search(&self, query: &str) -> Vec<Track> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return self.list_songs().to_vec();
        }
        self.songs
            .iter()
            .zip(&self.keys)
            .filter(|(_, key)| key.matches(&q))
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn playlist(&self, id: &PlaylistId) -> Option<&Playlist> {
        self.playlists.iter().find(|p| &p.id == id)
    }

    fn playlist_mut(&mut self, id: &PlaylistId) -> Result<&mut Playlist, LibraryError> {
        self.playlists
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| LibraryError::UnknownPlaylist(id.to_string()))
    }

    /// Create an empty playlist. Newest playlists are listed first.
    pub fn create_playlist(&mut self, name: &str) -> Result<PlaylistId, LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::EmptyName);
        }

        let id = PlaylistId(format!("pl-{}", self.next_playlist));
        self.next_playlist += 1;
        self.playlists.insert(
            0,
            Playlist {
                id: id.clone(),
                name: name.to_string(),
                track_ids: Vec::new(),
            },
        );
        info!(playlist = %id, name, "playlist created");
        Ok(id)
    }

    /// Append `track_id` unless it is already present. Returns whether it was added.
    pub fn add_to_playlist(
        &mut self,
        playlist_id: &PlaylistId,
        track_id: &str,
    ) -> Result<bool, LibraryError> {
        if self.track(track_id).is_none() {
            return Err(LibraryError::UnknownTrack(track_id.to_string()));
        }
        let playlist = self.playlist_mut(playlist_id)?;
        if playlist.track_ids.iter().any(|id| id == track_id) {
            return Ok(false);
        }
        playlist.track_ids.push(track_id.to_string());
        Ok(true)
    }

    /// Remove `track_id`. Returns whether anything was removed.
    pub fn remove_from_playlist(
        &mut self,
        playlist_id: &PlaylistId,
        track_id: &str,
    ) -> Result<bool, LibraryError> {
        let playlist = self.playlist_mut(playlist_id)?;
        let before = playlist.track_ids.len();
        playlist.track_ids.retain(|id| id != track_id);
        Ok(playlist.track_ids.len() != before)
    }

    pub fn delete_playlist(&mut self, playlist_id: &PlaylistId) -> Result<Playlist, LibraryError> {
        let pos = self
            .playlists
            .iter()
            .position(|p| &p.id == playlist_id)
            .ok_or_else(|| LibraryError::UnknownPlaylist(playlist_id.to_string()))?;
        let removed = self.playlists.remove(pos);
        info!(playlist = %removed.id, name = %removed.name, "playlist deleted");
        Ok(removed)
    }

    /// Resolve a playlist to its tracks, in playlist order. Ids no longer in
    /// the library are skipped.
    pub fn get_playlist(&self, playlist_id: &PlaylistId) -> Result<Vec<Track>, LibraryError> {
        let playlist = self
            .playlist(playlist_id)
            .ok_or_else(|| LibraryError::UnknownPlaylist(playlist_id.to_string()))?;
        Ok(playlist
            .track_ids
            .iter()
            .filter_map(|id| self.track(id).cloned())
            .collect())
    }
}
