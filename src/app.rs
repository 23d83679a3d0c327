//! Application module: the view model the TUI renders and the runtime
//! drives from key input.

mod model;

pub use model::*;
