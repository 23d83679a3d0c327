//! Music library: track model, directory scanning and the in-memory
//! catalog with search and playlists.

mod catalog;
mod display;
mod model;
mod scan;

pub use catalog::{Library, Playlist, PlaylistId};
pub use display::display_from_fields;
pub use model::Track;
pub use scan::scan;
