//! Audio output: the device seam the playback engine drives, and its rodio
//! implementation running on a dedicated thread.

mod device;
mod locator;
mod player;
mod sink;
mod thread;
mod types;

pub use device::{DeviceEvent, Generation, MediaOutputDevice, PlayTicket};
pub use player::RodioDevice;
