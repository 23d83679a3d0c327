//! D-Bus MPRIS service so desktop media keys and `playerctl` can drive the
//! player. Commands are forwarded over a channel; properties are read from
//! the latest playback snapshot pushed by the runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc::Sender};

use async_io::{Timer, block_on};
use tracing::{info, warn};
use zbus::{Connection, interface};
use zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::engine::{PlaybackSnapshot, Transport};


const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.cadence";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    /// Pause and rewind to the start of the current track.
    Stop,
    Next,
    Prev,
    /// Relative seek in microseconds.
    Seek(i64),
    /// Absolute position in microseconds.
    SetPosition(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Status {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl Status {
    fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

impl From<Transport> for Status {
    fn from(t: Transport) -> Self {
        match t {
            Transport::Playing(_) => Self::Playing,
            // A pending start is reported as paused until the device confirms it.
            Transport::Loading(_) | Transport::Paused(_) => Self::Paused,
            Transport::Idle | Transport::Ended(_) => Self::Stopped,
        }
    }
}

#[derive(Debug, Default)]
struct SharedState {
    status: Status,
    track_id: Option<OwnedObjectPath>,
    title: Option<String>,
    artist: Vec<String>,
    album: Option<String>,
    url: Option<String>,
    length_micros: Option<i64>,
    position_micros: i64,
    volume: f64,
}

impl SharedState {
    fn from_snapshot(snap: &PlaybackSnapshot) -> Self {
        let track = snap.track.as_ref();
        Self {
            status: snap.transport.into(),
            track_id: track.and_then(|t| track_object_path(&t.id)),
            title: track.map(|t| t.title.clone()),
            artist: track.and_then(|t| t.artist.clone()).into_iter().collect(),
            album: track.and_then(|t| t.album.clone()),
            url: track.map(|t| t.url.clone()),
            length_micros: (snap.duration > 0.0).then(|| secs_to_micros(snap.duration)),
            position_micros: secs_to_micros(snap.current_time),
            volume: snap.volume,
        }
    }
}

/// Object path naming a library track. Path elements only allow
/// `[A-Za-z0-9_]`, so the id is hex-encoded.
fn track_object_path(id: &str) -> Option<OwnedObjectPath> {
    if id.is_empty() {
        return None;
    }
    let hex: String = id.bytes().map(|b| format!("{b:02x}")).collect();
    OwnedObjectPath::try_from(format!("{OBJECT_PATH}/track/t{hex}")).ok()
}

fn secs_to_micros(secs: f64) -> i64 {
    (secs * 1_000_000.0).round() as i64
}

pub fn micros_to_secs(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}

fn owned<'a>(v: impl Into<Value<'a>>) -> Option<OwnedValue> {
    OwnedValue::try_from(v.into()).ok()
}

pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
}

impl MprisHandle {
    /// Publish the latest playback state.
    pub fn update(&self, snap: &PlaybackSnapshot) {
        if let Ok(mut s) = self.state.lock() {
            *s = SharedState::from_snapshot(snap);
        }
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // No-op for TUI.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "cadence"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    fn seek(&self, offset: i64) {
        let _ = self.tx.send(ControlCmd::Seek(offset));
    }

    /// Ignored unless `track_id` names the current track.
    fn set_position(&self, track_id: OwnedObjectPath, position: i64) {
        let current = self.state.lock().ok().and_then(|s| s.track_id.clone());
        if current.as_ref() == Some(&track_id) && position >= 0 {
            let _ = self.tx.send(ControlCmd::SetPosition(position));
        }
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        self.state
            .lock()
            .map(|s| s.status.as_str())
            .unwrap_or("Stopped")
    }

    #[zbus(property)]
    fn position(&self) -> i64 {
        self.state.lock().map(|s| s.position_micros).unwrap_or(0)
    }

    #[zbus(property)]
    fn volume(&self) -> f64 {
        self.state.lock().map(|s| s.volume).unwrap_or(0.0)
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };

        let mut put = |key: &str, value: Option<OwnedValue>| {
            if let Some(v) = value {
                map.insert(key.to_string(), v);
            }
        };

        put(
            "mpris:trackid",
            s.track_id
                .as_ref()
                .and_then(|p| owned(p.clone().into_inner())),
        );
        put("xesam:title", s.title.clone().and_then(owned));
        if !s.artist.is_empty() {
            put("xesam:artist", owned(s.artist.clone()));
        }
        put("xesam:album", s.album.clone().and_then(owned));
        put("xesam:url", s.url.clone().and_then(owned));
        put("mpris:length", s.length_micros.and_then(owned));
        map
    }
}

/// Register the MPRIS service on the session bus from a background thread.
/// Bus failures are logged; the player keeps running without MPRIS.
pub fn spawn_mpris(tx: Sender<ControlCmd>) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState::default()));

    let state_for_thread = state.clone();
    let spawned = std::thread::Builder::new()
        .name("cadence-mpris".to_string())
        .spawn(move || {
            block_on(async move {
                let connection = match Connection::session().await {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "MPRIS: failed to connect to session bus");
                        return;
                    }
                };

                if let Err(e) = connection.request_name(BUS_NAME).await {
                    warn!(error = %e, "MPRIS: failed to acquire name");
                    return;
                }

                let object_server = connection.object_server();

                if let Err(e) = object_server
                    .at(OBJECT_PATH, RootIface { tx: tx.clone() })
                    .await
                {
                    warn!(error = %e, "MPRIS: failed to register root iface");
                    return;
                }

                if let Err(e) = object_server
                    .at(
                        OBJECT_PATH,
                        PlayerIface {
                            tx,
                            state: state_for_thread,
                        },
                    )
                    .await
                {
                    warn!(error = %e, "MPRIS: failed to register player iface");
                    return;
                }

                info!(name = BUS_NAME, "MPRIS service registered");

                // Keep the service alive.
                loop {
                    Timer::after(std::time::Duration::from_secs(3600)).await;
                }
            });
        });

    if let Err(e) = spawned {
        warn!(error = %e, "MPRIS: failed to start thread");
    }

    MprisHandle { state }
}
