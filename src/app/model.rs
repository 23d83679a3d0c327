//! Application model: which list is on screen, what is selected, and the
//! text being typed.
//!
//! `App` owns the `Library` and never talks to the playback engine. Actions
//! that start playback return a `PlayRequest` for the runtime to hand over.

use crate::library::{Library, PlaylistId, Track};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// All songs, filtered by the search query.
    Library,
    /// Index of playlists.
    Playlists,
    Playlist(PlaylistId),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Keys edit the search query.
    Search,
    /// Keys edit the name of a playlist about to be created.
    NewPlaylist,
}

/// A track to start and the queue it should play within.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub track: Track,
    pub context: Vec<Track>,
}

pub struct App {
    pub library: Library,
    pub view: View,
    pub mode: InputMode,
    pub query: String,
    pub name_input: String,
    pub selected: usize,
    /// Playlist that "add" appends to: the most recently opened one.
    pub add_target: Option<PlaylistId>,
    pub status: Option<String>,
    pub metadata_window: bool,
    pending_delete: Option<PlaylistId>,
}

impl App {
    pub fn new(library: Library) -> Self {
        Self {
            library,
            view: View::Library,
            mode: InputMode::Normal,
            query: String::new(),
            name_input: String::new(),
            selected: 0,
            add_target: None,
            status: None,
            metadata_window: false,
            pending_delete: None,
        }
    }

    pub fn toggle_metadata_window(&mut self) {
        self.metadata_window = !self.metadata_window;
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some(msg.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Tracks shown in the current view. Empty for the playlist index.
    pub fn visible_tracks(&self) -> Vec<Track> {
        match &self.view {
            View::Library => self.library.search(&self.query),
            View::Playlists => Vec::new(),
            View::Playlist(id) => self.library.get_playlist(id).unwrap_or_default(),
        }
    }

    pub fn row_count(&self) -> usize {
        match &self.view {
            View::Playlists => self.library.playlists().len(),
            _ => self.visible_tracks().len(),
        }
    }

    pub fn selected_track(&self) -> Option<Track> {
        self.visible_tracks().into_iter().nth(self.selected)
    }

    fn selected_playlist_id(&self) -> Option<PlaylistId> {
        match &self.view {
            View::Playlists => self
                .library
                .playlists()
                .get(self.selected)
                .map(|p| p.id.clone()),
            View::Playlist(id) => Some(id.clone()),
            View::Library => None,
        }
    }

    /// Heading for the main list.
    pub fn list_title(&self) -> String {
        match &self.view {
            View::Library => "Songs".to_string(),
            View::Playlists => "Playlists".to_string(),
            View::Playlist(id) => self
                .library
                .playlist(id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
        }
    }

    // ---- selection ----

    /// Move selection down, wrapping to the top.
    pub fn next(&mut self) {
        let n = self.row_count();
        if n > 0 {
            self.selected = (self.selected + 1) % n;
        }
    }

    /// Move selection up, wrapping to the bottom.
    pub fn prev(&mut self) {
        let n = self.row_count();
        if n > 0 {
            self.selected = if self.selected == 0 {
                n - 1
            } else {
                self.selected - 1
            };
        }
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.row_count().saturating_sub(1);
    }

    /// Keep `selected` inside the visible list after it changed.
    fn clamp_selection(&mut self) {
        let n = self.row_count();
        if self.selected >= n {
            self.selected = n.saturating_sub(1);
        }
    }

    // ---- views ----

    pub fn show_library(&mut self) {
        self.view = View::Library;
        self.selected = 0;
    }

    pub fn show_playlists(&mut self) {
        self.view = View::Playlists;
        self.selected = 0;
    }

    /// Library -> Playlists -> Library. An open playlist goes back to the index.
    pub fn cycle_view(&mut self) {
        match self.view {
            View::Library => self.show_playlists(),
            View::Playlists => self.show_library(),
            View::Playlist(_) => self.show_playlists(),
        }
    }

    pub fn open_playlist(&mut self, id: PlaylistId) {
        self.add_target = Some(id.clone());
        self.view = View::Playlist(id);
        self.selected = 0;
    }

    // ---- playback intents ----

    /// Enter on a row: play the selected song within the visible list, or
    /// open the selected playlist.
    pub fn activate_selected(&mut self) -> Option<PlayRequest> {
        if self.view == View::Playlists {
            if let Some(id) = self.selected_playlist_id() {
                self.open_playlist(id);
            }
            return None;
        }

        let context = self.visible_tracks();
        let track = context.get(self.selected)?.clone();
        Some(PlayRequest { track, context })
    }

    /// Play the visible list from its first song.
    pub fn play_all(&self) -> Option<PlayRequest> {
        let context = self.visible_tracks();
        let track = context.first()?.clone();
        Some(PlayRequest { track, context })
    }

    // ---- search ----

    pub fn enter_search(&mut self) {
        self.mode = InputMode::Search;
        if self.view != View::Library {
            self.show_library();
        }
    }

    /// Leave search mode, keeping the query applied.
    pub fn exit_search(&mut self) {
        self.mode = InputMode::Normal;
    }

    pub fn clear_search(&mut self) {
        self.query.clear();
        self.mode = InputMode::Normal;
        self.clamp_selection();
    }

    pub fn push_query_char(&mut self, c: char) {
        self.query.push(c);
        self.selected = 0;
    }

    pub fn pop_query_char(&mut self) {
        self.query.pop();
        self.selected = 0;
    }

    // ---- playlists ----

    pub fn begin_new_playlist(&mut self) {
        self.name_input.clear();
        self.mode = InputMode::NewPlaylist;
    }

    pub fn cancel_new_playlist(&mut self) {
        self.name_input.clear();
        self.mode = InputMode::Normal;
    }

    pub fn push_name_char(&mut self, c: char) {
        self.name_input.push(c);
    }

    pub fn pop_name_char(&mut self) {
        self.name_input.pop();
    }

    /// Create the playlist being named and open it. A blank name keeps the
    /// prompt open.
    pub fn commit_new_playlist(&mut self) {
        match self.library.create_playlist(&self.name_input) {
            Ok(id) => {
                self.name_input.clear();
                self.mode = InputMode::Normal;
                self.set_status(format!("Created playlist \"{}\"", self.playlist_name(&id)));
                self.open_playlist(id);
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    fn playlist_name(&self, id: &PlaylistId) -> String {
        self.library
            .playlist(id)
            .map(|p| p.name.clone())
            .unwrap_or_default()
    }

    /// Append the selected song to the add target.
    pub fn add_selected_to_target(&mut self) {
        let Some(target) = self.add_target.clone() else {
            self.set_status("Open a playlist first to choose where songs are added");
            return;
        };
        let Some(track) = self.selected_track() else {
            return;
        };

        let name = self.playlist_name(&target);
        match self.library.add_to_playlist(&target, &track.id) {
            Ok(true) => self.set_status(format!("Added \"{}\" to \"{name}\"", track.title)),
            Ok(false) => self.set_status(format!("\"{}\" is already in \"{name}\"", track.title)),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    /// Remove the selected song from the open playlist.
    pub fn remove_selected_from_playlist(&mut self) {
        let View::Playlist(id) = self.view.clone() else {
            return;
        };
        let Some(track) = self.selected_track() else {
            return;
        };

        match self.library.remove_from_playlist(&id, &track.id) {
            Ok(_) => {
                self.set_status(format!("Removed \"{}\"", track.title));
                self.clamp_selection();
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    /// Delete the open playlist (or the one selected in the index). The first
    /// press only arms the deletion; a second press on the same playlist
    /// performs it.
    pub fn request_delete(&mut self) {
        let Some(id) = self.selected_playlist_id() else {
            return;
        };

        if self.pending_delete.as_ref() != Some(&id) {
            let name = self.playlist_name(&id);
            self.set_status(format!("Press D again to delete \"{name}\""));
            self.pending_delete = Some(id);
            return;
        }

        self.pending_delete = None;
        match self.library.delete_playlist(&id) {
            Ok(removed) => {
                if self.add_target.as_ref() == Some(&id) {
                    self.add_target = None;
                }
                if self.view == View::Playlist(id) {
                    self.show_playlists();
                } else {
                    self.clamp_selection();
                }
                self.set_status(format!("Deleted playlist \"{}\"", removed.name));
            }
            Err(e) => self.set_status(e.to_string()),
        }
    }

    /// Any other action disarms a pending deletion.
    pub fn cancel_pending_delete(&mut self) {
        if self.pending_delete.take().is_some() {
            self.clear_status();
        }
    }

    #[cfg(test)]
    pub fn delete_pending(&self) -> bool {
        self.pending_delete.is_some()
    }
}
