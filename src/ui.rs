//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::Line,
    widgets::{Block, Borders, Clear, LineGauge, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use std::time::Duration;

use crate::app::{App, InputMode, View};
use crate::config::{ControlsSettings, TimeField, UiSettings};
use crate::engine::{PlaybackSnapshot, Transport, format_time};
use crate::library::{Track, display_from_fields};


const CONTROLS: &[(&str, &str)] = &[
    ("j/k", "up/down"),
    ("gg/G", "top/bottom"),
    ("enter", "play / open"),
    ("A", "play all"),
    ("space/p", "play/pause"),
    ("h/l", "prev/next song"),
    // H/L is filled in from config.
    ("H/L", ""),
    ("+/-", "volume"),
    ("/", "search"),
    ("tab", "songs/playlists"),
    ("c", "new playlist"),
    ("a", "add to playlist"),
    ("x", "remove"),
    ("D", "delete playlist"),
    ("K", "metadata"),
    ("q", "quit"),
];

const LEFT_PAD: Padding = Padding {
    left: 1,
    right: 0,
    top: 0,
    bottom: 0,
};

/// Render the controls help text, incorporating scrub seconds.
fn controls_text(scrub_seconds: u64) -> String {
    CONTROLS
        .iter()
        .map(|(k, v)| {
            if *k == "H/L" {
                format!("[H/L] scrub -/+{scrub_seconds}s")
            } else {
                format!("[{k}] {v}")
            }
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

/// Build the now-playing time text (elapsed/total/remaining) per `UiSettings`.
/// Total and remaining are left out while the duration is unknown.
fn now_playing_time_text(elapsed: f64, total: f64, ui: &UiSettings) -> Option<String> {
    let known = total > 0.0;
    let parts: Vec<String> = ui
        .now_playing_time_fields
        .iter()
        .filter_map(|f| match f {
            TimeField::Elapsed => Some(format_time(elapsed)),
            TimeField::Total if known => Some(format_time(total)),
            TimeField::Remaining if known => {
                Some(format!("-{}", format_time((total - elapsed).max(0.0))))
            }
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(&ui.now_playing_time_separator))
    }
}

fn transport_glyph(transport: Transport) -> &'static str {
    match transport {
        Transport::Playing(_) => "▶",
        Transport::Loading(_) => "…",
        Transport::Paused(_) => "⏸",
        Transport::Idle | Transport::Ended(_) => "■",
    }
}

/// `3/12  ` style position in the queue, empty without a cursor.
fn queue_position(cursor: Option<usize>, len: usize) -> String {
    match cursor {
        Some(i) if len > 0 => format!("{}/{len}  ", i + 1),
        _ => String::new(),
    }
}

fn progress_ratio(current: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        (current / duration).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Format a track length, rounding up partial seconds. Unknown is `-`.
fn format_length(d: Option<Duration>) -> String {
    let Some(d) = d else {
        return "-".to_string();
    };
    let mut secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs = secs.saturating_add(1);
    }
    format_time(secs as f64)
}

/// Window `[start, end)` of a list of `total` rows that fits `height` rows
/// and keeps `selected` centered when possible. Also returns the selected
/// row's position inside the window.
fn visible_window(total: usize, height: usize, selected: usize) -> (usize, usize, usize) {
    if total <= height || height == 0 {
        return (0, total, selected);
    }
    let half = height / 2;
    let mut start = selected.saturating_sub(half);
    if start + height > total {
        start = total - height;
    }
    (start, start + height, selected - start)
}

/// Compute a centered rectangle with given size constrained to `r`.
fn centered_rect_sized(mut width: u16, mut height: u16, r: Rect) -> Rect {
    width = width.min(r.width.saturating_sub(2)).max(10);
    height = height.min(r.height.saturating_sub(2)).max(5);

    let x = r.x + (r.width.saturating_sub(width) / 2);
    let y = r.y + (r.height.saturating_sub(height) / 2);
    Rect {
        x,
        y,
        width,
        height,
    }
}

fn header_text(app: &App, ui: &UiSettings) -> String {
    match app.mode {
        InputMode::Search => format!("/{}▏", app.query),
        InputMode::NewPlaylist => format!("New playlist: {}▏", app.name_input),
        InputMode::Normal if !app.query.trim().is_empty() => format!("Search: {}", app.query.trim()),
        InputMode::Normal => ui.header_text.clone(),
    }
}

fn track_row(track: &Track, now_playing: Option<&Track>) -> String {
    let marker = if now_playing.is_some_and(|p| p.id == track.id) {
        "♪ "
    } else {
        "  "
    };
    let byline = track.byline();
    let length = format_length(track.duration);
    if byline.is_empty() {
        format!("{marker}{}  [{length}]", track.display)
    } else {
        format!("{marker}{}  ({byline})  [{length}]", track.display)
    }
}

/// Render the entire UI into the provided `frame`.
pub fn draw(
    frame: &mut Frame,
    app: &App,
    playback: &PlaybackSnapshot,
    ui_settings: &UiSettings,
    controls_settings: &ControlsSettings,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(5),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(app, ui_settings))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" cadence ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(26), Constraint::Min(10)])
        .split(chunks[1]);

    draw_sidebar(frame, app, body[0]);
    draw_main_list(frame, app, playback, body[1]);

    if let Some(status) = &app.status {
        frame.render_widget(Paragraph::new(format!(" {status}")).bold(), chunks[2]);
    }

    draw_now_playing(frame, playback, ui_settings, chunks[3]);

    if app.metadata_window {
        // Keep the popup inside the list area so it doesn't cover header/footer.
        let popup_area = centered_rect_sized(72, 9, body[1]);
        frame.render_widget(Clear, popup_area);

        let meta = match app.selected_track() {
            Some(track) => format!(
                "Title: {}\nArtist: {}\nAlbum: {}\nDuration: {}\nPath: {}",
                track.title,
                track.artist.as_deref().unwrap_or("-"),
                track.album.as_deref().unwrap_or("-"),
                format_length(track.duration),
                track.path.display()
            ),
            None => "No track selected".to_string(),
        };
        let meta_paragraph = Paragraph::new(meta)
            .block(
                Block::default()
                    .padding(LEFT_PAD)
                    .borders(Borders::ALL)
                    .title(" metadata (K closes) "),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(meta_paragraph, popup_area);
    }

    let footer = Paragraph::new(controls_text(controls_settings.scrub_seconds))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(LEFT_PAD),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[4]);
}

fn draw_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let mut items = vec![ListItem::new("Browse"), ListItem::new("Playlists")];
    let playlists = app.library.playlists();
    if playlists.is_empty() {
        items.push(
            ListItem::new("  No playlists yet")
                .style(Style::default().add_modifier(Modifier::ITALIC)),
        );
    }
    items.extend(
        playlists
            .iter()
            .map(|p| ListItem::new(format!("♪ {}", p.name))),
    );

    let active = match &app.view {
        View::Library => Some(0),
        View::Playlists => Some(1),
        View::Playlist(id) => playlists.iter().position(|p| &p.id == id).map(|i| i + 2),
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" library "))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));
    let mut state = ListState::default();
    state.select(active);
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_main_list(frame: &mut Frame, app: &App, playback: &PlaybackSnapshot, area: Rect) {
    let rows: Vec<String> = match &app.view {
        View::Playlists => app
            .library
            .playlists()
            .iter()
            .map(|p| format!("♪ {}  ({} tracks)", p.name, p.track_ids.len()))
            .collect(),
        _ => app
            .visible_tracks()
            .iter()
            .map(|t| track_row(t, playback.track.as_ref()))
            .collect(),
    };

    let title = format!(" {} ({}) ", app.list_title(), rows.len());
    let block = Block::default().borders(Borders::ALL).title(title);

    if rows.is_empty() {
        let empty = match &app.view {
            View::Library => "No songs match your search.",
            View::Playlists => "No playlists yet. Press c to create one.",
            View::Playlist(_) => "This playlist has no songs yet.",
        };
        frame.render_widget(Paragraph::new(empty).italic().block(block), area);
        return;
    }

    // Only build ListItems for the visible window.
    let height = area.height.saturating_sub(2) as usize;
    let (start, end, selected_in_window) = visible_window(rows.len(), height, app.selected);
    let items: Vec<ListItem> = rows[start..end]
        .iter()
        .map(|r| ListItem::new(r.as_str()))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(Some(selected_in_window));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_now_playing(frame: &mut Frame, playback: &PlaybackSnapshot, ui: &UiSettings, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" now playing ")
        .padding(LEFT_PAD);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(track) = &playback.track else {
        frame.render_widget(Paragraph::new("Nothing playing").italic(), inner);
        return;
    };

    let lines = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let song = display_from_fields(
        track,
        &ui.now_playing_track_fields,
        &ui.now_playing_track_separator,
    );
    let title = format!(
        "{} {song}   {}vol {:.0}%",
        transport_glyph(playback.transport),
        queue_position(playback.cursor, playback.queue_len),
        playback.volume * 100.0
    );
    frame.render_widget(Paragraph::new(Line::from(title).bold()), lines[0]);
    frame.render_widget(Paragraph::new(track.byline()), lines[1]);

    let label = now_playing_time_text(playback.current_time, playback.duration, ui)
        .unwrap_or_default();
    let gauge = LineGauge::default()
        .ratio(progress_ratio(playback.current_time, playback.duration))
        .label(label);
    frame.render_widget(gauge, lines[2]);
}
