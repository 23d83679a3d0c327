use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use approx::assert_relative_eq;

use super::*;
use crate::audio::{DeviceEvent, Generation, MediaOutputDevice, PlayTicket};
use crate::error::{DeviceError, PlaybackError};
use crate::library::Track;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load(String, Generation),
    Play(PlayTicket),
    Pause,
    SetPosition(f64),
    SetVolume(f64),
}

/// Records every call; never emits anything on its own.
#[derive(Default)]
struct FakeDevice {
    calls: Vec<Call>,
}

impl FakeDevice {
    fn last_ticket(&self) -> PlayTicket {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Play(t) => Some(*t),
                _ => None,
            })
            .expect("no play() call recorded")
    }

    fn last_load(&self) -> (String, Generation) {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Load(url, g) => Some((url.clone(), *g)),
                _ => None,
            })
            .expect("no load() call recorded")
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl MediaOutputDevice for FakeDevice {
    fn load(&mut self, url: &str, generation: Generation) {
        self.calls.push(Call::Load(url.to_string(), generation));
    }

    fn play(&mut self, ticket: PlayTicket) {
        self.calls.push(Call::Play(ticket));
    }

    fn pause(&mut self) {
        self.calls.push(Call::Pause);
    }

    fn set_position(&mut self, time: f64) {
        self.calls.push(Call::SetPosition(time));
    }

    fn set_volume(&mut self, volume: f64) {
        self.calls.push(Call::SetVolume(volume));
    }
}

fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        path: PathBuf::from(format!("/music/{id}.mp3")),
        url: format!("file:///music/{id}.mp3"),
        title: id.to_uppercase(),
        artist: None,
        album: None,
        duration: None,
        display: id.to_string(),
    }
}

fn abc() -> Vec<Track> {
    vec![track("a"), track("b"), track("c")]
}

fn engine() -> PlaybackEngine<FakeDevice> {
    PlaybackEngine::new(FakeDevice::default(), EngineSettings::default())
}

fn resolve(e: &mut PlaybackEngine<FakeDevice>, outcome: Result<(), DeviceError>) {
    let ticket = e.device().last_ticket();
    e.handle_device_event(DeviceEvent::PlayResolved { ticket, outcome });
}

fn metadata(e: &mut PlaybackEngine<FakeDevice>, duration: f64) {
    let (_, generation) = e.device().last_load();
    e.handle_device_event(DeviceEvent::MetadataReady {
        generation,
        duration,
    });
}

fn position(e: &mut PlaybackEngine<FakeDevice>, time: f64) {
    let (_, generation) = e.device().last_load();
    e.handle_device_event(DeviceEvent::PositionAdvanced { generation, time });
}

/// Engine playing `abc()[index]` with a 200 s track loaded.
fn playing_at(index: usize) -> PlaybackEngine<FakeDevice> {
    let mut e = engine();
    let tracks = abc();
    e.play_track(tracks[index].clone(), Some(tracks));
    resolve(&mut e, Ok(()));
    metadata(&mut e, 200.0);
    e
}

fn drain(rx: &Receiver<EngineEvent>) -> Vec<EngineEvent> {
    rx.try_iter().collect()
}

#[test]
fn new_engine_is_idle_with_default_volume() {
    let e = engine();
    assert_eq!(e.transport(), Transport::Idle);
    assert_eq!(e.cursor(), None);
    assert!(e.current_track().is_none());
    assert!(!e.is_playing());
    assert_relative_eq!(e.volume(), 0.8);
    assert_eq!(e.device().calls, vec![Call::SetVolume(0.8)]);
}

#[test]
fn play_track_with_context_replaces_queue_and_starts_target() {
    let mut e = engine();
    e.play_track(track("x"), Some(vec![track("x"), track("y")]));

    let tracks = abc();
    e.play_track(tracks[1].clone(), Some(tracks.clone()));

    assert_eq!(e.queue(), tracks.as_slice());
    assert_eq!(e.cursor(), Some(1));
    assert_eq!(e.transport(), Transport::Loading(1));
    assert!(!e.is_playing());

    let (url, _) = e.device().last_load();
    assert_eq!(url, "file:///music/b.mp3");
    assert_eq!(e.device().calls.last(), Some(&Call::Play(e.device().last_ticket())));

    resolve(&mut e, Ok(()));
    assert_eq!(e.transport(), Transport::Playing(1));
    assert!(e.is_playing());
    assert_eq!(e.current_track().map(|t| t.id.as_str()), Some("b"));
}

#[test]
fn play_track_without_context_reuses_or_appends() {
    let mut e = engine();
    let tracks = abc();
    e.play_track(tracks[0].clone(), Some(tracks));

    e.play_track(track("c"), None);
    assert_eq!(e.cursor(), Some(2));
    assert_eq!(e.queue().len(), 3);

    e.play_track(track("z"), None);
    assert_eq!(e.cursor(), Some(3));
    assert_eq!(e.queue().len(), 4);
    assert_eq!(e.queue()[3].id, "z");
}

#[test]
fn play_track_into_empty_engine_without_context_queues_it() {
    let mut e = engine();
    e.play_track(track("solo"), None);
    assert_eq!(e.queue().len(), 1);
    assert_eq!(e.cursor(), Some(0));
}

#[test]
fn track_missing_from_context_falls_back_to_first_entry() {
    let mut e = engine();
    e.play_track(track("zzz"), Some(abc()));
    assert_eq!(e.cursor(), Some(0));
    assert_eq!(e.current_track().map(|t| t.id.as_str()), Some("a"));
}

#[test]
fn empty_context_plays_the_track_alone() {
    let mut e = engine();
    e.play_track(track("solo"), Some(Vec::new()));
    assert_eq!(e.queue().len(), 1);
    assert_eq!(e.current_track().map(|t| t.id.as_str()), Some("solo"));
}

#[test]
fn each_load_uses_a_new_generation() {
    let mut e = engine();
    e.play_track(track("a"), None);
    let (_, g1) = e.device().last_load();
    e.play_track(track("a"), None);
    let (_, g2) = e.device().last_load();
    assert!(g2 > g1);
}

#[test]
fn failed_start_leaves_track_current_and_paused() {
    let mut e = engine();
    let events = e.subscribe();
    let tracks = abc();
    e.play_track(tracks[2].clone(), Some(tracks));

    let err = DeviceError::Unreadable {
        locator: "file:///music/c.mp3".into(),
        reason: "gone".into(),
    };
    resolve(&mut e, Err(err.clone()));

    assert_eq!(e.transport(), Transport::Paused(2));
    assert!(!e.is_playing());
    assert_eq!(e.current_track().map(|t| t.id.as_str()), Some("c"));
    assert_relative_eq!(e.duration(), 0.0);

    let failures: Vec<_> = drain(&events)
        .into_iter()
        .filter_map(|ev| match ev {
            EngineEvent::PlaybackFailed(f) => Some(f),
            _ => None,
        })
        .collect();
    assert_eq!(
        failures,
        vec![PlaybackError::StartFailed {
            track_id: "c".into(),
            title: "C".into(),
            source: err,
        }]
    );

    // retry
    e.play();
    assert_eq!(e.transport(), Transport::Loading(2));
    resolve(&mut e, Ok(()));
    assert!(e.is_playing());
}

#[test]
fn device_failure_mid_track_pauses_and_reports() {
    let mut e = playing_at(1);
    let events = e.subscribe();
    let (_, generation) = e.device().last_load();
    let err = DeviceError::Unreadable {
        locator: "file:///music/b.mp3".into(),
        reason: "truncated".into(),
    };

    e.handle_device_event(DeviceEvent::Failed {
        generation,
        error: err.clone(),
    });

    assert_eq!(e.transport(), Transport::Paused(1));
    assert!(!e.is_playing());
    assert_eq!(
        drain(&events),
        vec![
            EngineEvent::TransportChanged(Transport::Paused(1)),
            EngineEvent::PlaybackFailed(PlaybackError::Interrupted {
                track_id: "b".into(),
                title: "B".into(),
                source: err,
            }),
        ]
    );

    // play() hands the retry to the device
    e.play();
    assert_eq!(e.transport(), Transport::Loading(1));
    resolve(&mut e, Ok(()));
    assert!(e.is_playing());
}

#[test]
fn stale_device_failure_is_dropped() {
    let mut e = engine();
    e.play_track(track("a"), None);
    let (_, old) = e.device().last_load();
    e.play_track(track("b"), None);
    resolve(&mut e, Ok(()));

    e.handle_device_event(DeviceEvent::Failed {
        generation: old,
        error: DeviceError::NothingLoaded,
    });
    assert_eq!(e.transport(), Transport::Playing(1));
}

#[test]
fn stale_play_resolution_does_not_override_newer_track() {
    let mut e = engine();
    e.play_track(track("a"), None);
    let ticket_a = e.device().last_ticket();
    e.play_track(track("b"), None);
    let ticket_b = e.device().last_ticket();
    assert_ne!(ticket_a, ticket_b);

    e.handle_device_event(DeviceEvent::PlayResolved {
        ticket: ticket_a,
        outcome: Ok(()),
    });
    assert_eq!(e.current_track().map(|t| t.id.as_str()), Some("b"));
    assert_eq!(e.transport(), Transport::Loading(1));

    e.handle_device_event(DeviceEvent::PlayResolved {
        ticket: ticket_b,
        outcome: Err(DeviceError::NothingLoaded),
    });
    assert_eq!(e.transport(), Transport::Paused(1));
    assert!(!e.is_playing());
}

#[test]
fn stale_failure_does_not_pause_newer_track() {
    let mut e = engine();
    e.play_track(track("a"), None);
    let ticket_a = e.device().last_ticket();
    e.play_track(track("b"), None);
    resolve(&mut e, Ok(()));

    e.handle_device_event(DeviceEvent::PlayResolved {
        ticket: ticket_a,
        outcome: Err(DeviceError::NothingLoaded),
    });
    assert_eq!(e.transport(), Transport::Playing(1));
}

#[test]
fn resolution_after_pause_is_ignored() {
    let mut e = engine();
    e.play_track(track("a"), None);
    e.pause();
    resolve(&mut e, Ok(()));
    assert_eq!(e.transport(), Transport::Paused(0));
}

#[test]
fn events_from_superseded_load_are_dropped() {
    let mut e = engine();
    e.play_track(track("a"), None);
    let (_, old) = e.device().last_load();
    e.play_track(track("b"), None);

    e.handle_device_event(DeviceEvent::MetadataReady {
        generation: old,
        duration: 300.0,
    });
    e.handle_device_event(DeviceEvent::PositionAdvanced {
        generation: old,
        time: 42.0,
    });
    e.handle_device_event(DeviceEvent::Ended { generation: old });

    assert_relative_eq!(e.duration(), 0.0);
    assert_relative_eq!(e.current_time(), 0.0);
    assert_eq!(e.cursor(), Some(1));

    metadata(&mut e, 120.0);
    position(&mut e, 7.5);
    assert_relative_eq!(e.duration(), 120.0);
    assert_relative_eq!(e.current_time(), 7.5);
}

#[test]
fn position_is_clamped_to_duration() {
    let mut e = playing_at(0);
    position(&mut e, 500.0);
    assert_relative_eq!(e.current_time(), 200.0);
    position(&mut e, -3.0);
    assert_relative_eq!(e.current_time(), 0.0);
}

#[test]
fn invalid_durations_count_as_unknown() {
    let mut e = playing_at(0);
    metadata(&mut e, f64::NAN);
    assert_relative_eq!(e.duration(), 0.0);
    metadata(&mut e, f64::INFINITY);
    assert_relative_eq!(e.duration(), 0.0);
    metadata(&mut e, -1.0);
    assert_relative_eq!(e.duration(), 0.0);
}

#[test]
fn seek_updates_time_immediately_and_clamps() {
    let mut e = playing_at(0);

    e.seek_to(42.5);
    assert_relative_eq!(e.current_time(), 42.5);
    assert_eq!(e.device().calls.last(), Some(&Call::SetPosition(42.5)));

    e.seek_to(-5.0);
    assert_relative_eq!(e.current_time(), 0.0);

    e.seek_to(300.0);
    assert_relative_eq!(e.current_time(), 200.0);

    e.seek_to(f64::NAN);
    assert_relative_eq!(e.current_time(), 0.0);
}

#[test]
fn seek_with_unknown_duration_goes_to_zero() {
    let mut e = engine();
    e.play_track(track("a"), None);
    e.seek_to(30.0);
    assert_relative_eq!(e.current_time(), 0.0);
    assert_eq!(e.device().calls.last(), Some(&Call::SetPosition(0.0)));
}

#[test]
fn set_volume_clamps_and_ignores_nan() {
    let mut e = engine();
    e.set_volume(-0.2);
    assert_relative_eq!(e.volume(), 0.0);
    e.set_volume(1.5);
    assert_relative_eq!(e.volume(), 1.0);
    e.set_volume(0.3);
    assert_relative_eq!(e.volume(), 0.3);
    e.set_volume(f64::NAN);
    assert_relative_eq!(e.volume(), 0.3);
    assert_eq!(e.device().calls.last(), Some(&Call::SetVolume(0.3)));
}

#[test]
fn initial_volume_is_clamped() {
    let e = PlaybackEngine::new(
        FakeDevice::default(),
        EngineSettings {
            initial_volume: 4.0,
            restart_threshold: 3.0,
        },
    );
    assert_relative_eq!(e.volume(), 1.0);
}

#[test]
fn pause_twice_calls_device_once() {
    let mut e = playing_at(1);
    e.pause();
    assert!(!e.is_playing());
    e.pause();
    assert!(!e.is_playing());
    assert_eq!(e.device().count(|c| *c == Call::Pause), 1);
    assert_eq!(e.transport(), Transport::Paused(1));
}

#[test]
fn toggle_play_switches_between_pause_and_play() {
    let mut e = engine();
    e.toggle_play();
    assert_eq!(e.device().calls, vec![Call::SetVolume(0.8)]);

    let mut e = playing_at(0);
    e.toggle_play();
    assert_eq!(e.transport(), Transport::Paused(0));
    e.toggle_play();
    assert_eq!(e.transport(), Transport::Loading(0));
    resolve(&mut e, Ok(()));
    assert_eq!(e.transport(), Transport::Playing(0));
}

#[test]
fn play_without_current_track_is_noop() {
    let mut e = engine();
    e.play();
    assert_eq!(e.transport(), Transport::Idle);
    assert_eq!(e.device().count(|c| matches!(c, Call::Play(_))), 0);
}

#[test]
fn resume_keeps_queue_position_and_generation() {
    let mut e = playing_at(1);
    position(&mut e, 12.0);
    let (_, generation) = e.device().last_load();
    e.pause();
    e.play();

    let ticket = e.device().last_ticket();
    assert_eq!(ticket.generation, generation);
    assert_eq!(e.cursor(), Some(1));
    assert_relative_eq!(e.current_time(), 12.0);
    assert_relative_eq!(e.duration(), 200.0);
    assert_eq!(e.device().count(|c| matches!(c, Call::Load(..))), 1);
}

#[test]
fn next_advances_and_resets_duration() {
    let mut e = playing_at(0);
    position(&mut e, 50.0);
    e.next();

    assert_eq!(e.cursor(), Some(1));
    assert_eq!(e.transport(), Transport::Loading(1));
    assert_relative_eq!(e.duration(), 0.0);
    assert_relative_eq!(e.current_time(), 0.0);
    assert_eq!(e.device().last_load().0, "file:///music/b.mp3");
}

#[test]
fn next_at_last_track_stops_in_place() {
    let mut e = playing_at(2);
    position(&mut e, 80.0);
    e.next();

    assert_eq!(e.transport(), Transport::Ended(2));
    assert!(!e.is_playing());
    assert_eq!(e.cursor(), Some(2));
    assert_eq!(e.queue().len(), 3);
    assert_relative_eq!(e.current_time(), 0.0);

    let tail = &e.device().calls[e.device().calls.len() - 2..];
    assert_eq!(tail, &[Call::Pause, Call::SetPosition(0.0)]);
}

#[test]
fn play_after_end_restarts_last_track() {
    let mut e = playing_at(2);
    e.next();
    e.play();
    assert_eq!(e.transport(), Transport::Loading(2));
    resolve(&mut e, Ok(()));
    assert_eq!(e.transport(), Transport::Playing(2));
}

#[test]
fn ended_event_moves_to_next_track() {
    let mut e = playing_at(0);
    let (_, generation) = e.device().last_load();
    e.handle_device_event(DeviceEvent::Ended { generation });
    assert_eq!(e.cursor(), Some(1));
    assert_eq!(e.transport(), Transport::Loading(1));
}

#[test]
fn prev_restarts_after_threshold() {
    let mut e = playing_at(2);
    position(&mut e, 10.0);
    e.prev();

    assert_eq!(e.cursor(), Some(2));
    assert_relative_eq!(e.current_time(), 0.0);
    assert_eq!(e.device().calls.last(), Some(&Call::SetPosition(0.0)));
    assert_eq!(e.transport(), Transport::Playing(2));
}

#[test]
fn prev_goes_back_within_threshold() {
    let mut e = playing_at(2);
    position(&mut e, 1.0);
    e.prev();

    assert_eq!(e.cursor(), Some(1));
    assert_eq!(e.transport(), Transport::Loading(1));
    assert_eq!(e.device().last_load().0, "file:///music/b.mp3");
}

#[test]
fn prev_at_exactly_threshold_goes_back() {
    let mut e = playing_at(1);
    position(&mut e, 3.0);
    e.prev();
    assert_eq!(e.cursor(), Some(0));
}

#[test]
fn prev_at_first_track_restarts() {
    let mut e = playing_at(0);
    position(&mut e, 2.0);
    let loads = e.device().count(|c| matches!(c, Call::Load(..)));
    e.prev();

    assert_eq!(e.cursor(), Some(0));
    assert_relative_eq!(e.current_time(), 0.0);
    assert_eq!(e.device().count(|c| matches!(c, Call::Load(..))), loads);
}

#[test]
fn next_and_prev_on_empty_queue_do_nothing() {
    let mut e = engine();
    e.next();
    e.prev();
    assert_eq!(e.transport(), Transport::Idle);
    assert_eq!(e.device().calls, vec![Call::SetVolume(0.8)]);
}

#[test]
fn subscribers_see_track_and_transport_changes_in_order() {
    let mut e = engine();
    let rx = e.subscribe();
    e.play_track(track("a"), None);
    resolve(&mut e, Ok(()));

    assert_eq!(
        drain(&rx),
        vec![
            EngineEvent::TrackChanged {
                index: 0,
                track: track("a"),
            },
            EngineEvent::TransportChanged(Transport::Loading(0)),
            EngineEvent::TransportChanged(Transport::Playing(0)),
        ]
    );
}

#[test]
fn dropped_subscribers_are_forgotten() {
    let mut e = engine();
    drop(e.subscribe());
    let rx = e.subscribe();
    e.play_track(track("a"), None);
    assert!(!drain(&rx).is_empty());
}

#[test]
fn snapshot_reflects_state() {
    let mut e = playing_at(1);
    position(&mut e, 65.0);
    let snap = e.snapshot();

    assert_eq!(snap.track.map(|t| t.id), Some("b".to_string()));
    assert_eq!(snap.transport, Transport::Playing(1));
    assert!(snap.is_playing);
    assert_eq!(snap.cursor, Some(1));
    assert_eq!(snap.queue_len, 3);
    assert_relative_eq!(snap.current_time, 65.0);
    assert_relative_eq!(snap.duration, 200.0);
}

#[test]
fn format_time_renders_minutes_and_padded_seconds() {
    assert_eq!(format_time(0.0), "0:00");
    assert_eq!(format_time(65.0), "1:05");
    assert_eq!(format_time(59.9), "0:59");
    assert_eq!(format_time(3600.0), "60:00");
    assert_eq!(format_time(f64::NAN), "0:00");
    assert_eq!(format_time(-4.0), "0:00");
    assert_eq!(format_time(f64::INFINITY), "0:00");
}
