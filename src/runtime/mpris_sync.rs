use crate::audio::MediaOutputDevice;
use crate::engine::PlaybackEngine;
use crate::mpris::MprisHandle;

pub fn update_mpris<D: MediaOutputDevice>(mpris: &MprisHandle, engine: &PlaybackEngine<D>) {
    mpris.update(&engine.snapshot());
}
