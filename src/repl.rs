use std::cell::Cell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};

use crate::engine::{AudioSink, Engine, SessionConfig, Snapshot};
use crate::error::{Error, Result};
use crate::note::{AnswerResult, GameMode, NoteName, NoteNotation};
use crate::parser::char_to_note;
use crate::scheduler::Timeline;
use crate::stats::{StatsAggregator, StatsStore};
use crate::synth::{AudioEngine, Silence};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const COLUMN_WIDTH: usize = 5;
const STAFF_TOP: i32 = 4;
const STAFF_BOTTOM: i32 = -4;

/// Run one interactive session until the player quits
pub fn run<S: StatsStore>(
    config: SessionConfig,
    notation: NoteNotation,
    muted: bool,
    stats: &mut StatsAggregator<S>,
) -> Result<()> {
    let audio = match AudioEngine::new() {
        Ok(audio) => {
            audio.set_muted(muted);
            Some(audio)
        }
        Err(e) => {
            log::warn!("continuing without sound: {}", e);
            None
        }
    };
    let sink: &dyn AudioSink = match &audio {
        Some(audio) => audio,
        None => &Silence,
    };

    let mut stdout = io::stdout();
    terminal::enable_raw_mode().map_err(|e| Error::Terminal(format!("failed to enable raw mode: {}", e)))?;
    execute!(stdout, EnterAlternateScreen, Hide)
        .map_err(|e| Error::Terminal(format!("alternate screen: {}", e)))?;

    stats.start_session();
    let result = {
        let mut engine = Engine::new(config.clone(), Timeline::new(), sink, &mut *stats);
        let dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty);
        let redraw = engine.subscribe(move |_| flag.set(true));
        engine.start_session(config);

        let result = event_loop(&mut engine, audio.as_ref(), &mut stdout, notation, &dirty);
        engine.unsubscribe(redraw);
        engine.stop_all_timers();
        result
    };
    stats.end_session();

    // Restore terminal
    let _ = execute!(stdout, Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    result
}

fn event_loop<S: StatsStore>(
    engine: &mut Engine<Timeline, &dyn AudioSink, &mut StatsAggregator<S>>,
    audio: Option<&AudioEngine>,
    stdout: &mut io::Stdout,
    notation: NoteNotation,
    dirty: &Cell<bool>,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        let now = Instant::now();
        engine.advance(now - last_tick);
        last_tick = now;

        if dirty.replace(false) {
            let muted = audio.is_none_or(|a| a.is_muted());
            render(stdout, &engine.snapshot(), notation, muted)?;
        }

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }

        match event::read()? {
            Event::Key(KeyEvent {
                code: KeyCode::Esc,
                kind: KeyEventKind::Press,
                ..
            }) => return Ok(()),

            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: KeyEventKind::Press,
                ..
            }) => match c {
                'q' => return Ok(()),
                'r' => engine.reset_game(),
                'm' => {
                    let enabled = !engine.config().metronome_enabled;
                    let speed = engine.config().metronome_speed;
                    engine.set_metronome(enabled, speed);
                }
                'x' => {
                    if let Some(audio) = audio {
                        audio.set_muted(!audio.is_muted());
                    }
                    dirty.set(true);
                }
                _ => {
                    if let Some(note) = char_to_note(c) {
                        engine.submit_answer(note);
                    }
                }
            },

            Event::Resize(..) => dirty.set(true),

            _ => {}
        }
    }
}

fn render(
    stdout: &mut io::Stdout,
    snapshot: &Snapshot,
    notation: NoteNotation,
    muted: bool,
) -> Result<()> {
    let mut out = String::from("\x1b[2J\x1b[H");
    out.push_str(&format!(
        "staffdrill - {} ({})\r\n\r\n",
        snapshot.mode.display_name(),
        snapshot.mode.description()
    ));
    out.push_str(&format!("  {} clef\r\n\r\n", snapshot.clef.display_name()));
    for line in staff_lines(snapshot) {
        out.push_str(&line);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.push_str(&status_line(snapshot));
    out.push_str("\r\n");
    out.push_str(&feedback_line(snapshot, notation));
    out.push_str("\r\n\r\n");
    out.push_str(&key_help(notation));
    out.push_str(&format!(
        "  r: restart   m: metronome   x: sound {}   q/Esc: quit\r\n",
        if muted { "off" } else { "on" }
    ));

    write!(stdout, "{}", out)?;
    stdout.flush()?;
    Ok(())
}

/// ASCII staff for the round: one column per note, current note as `O`,
/// others as `o`, ledger lines only where a note needs them.
fn staff_lines(snapshot: &Snapshot) -> Vec<String> {
    let top = snapshot
        .notes
        .iter()
        .map(|n| n.position)
        .max()
        .unwrap_or(0)
        .max(STAFF_TOP + 1);
    let bottom = snapshot
        .notes
        .iter()
        .map(|n| n.position)
        .min()
        .unwrap_or(0)
        .min(STAFF_BOTTOM - 1);

    let mut lines = Vec::new();
    for pos in (bottom..=top).rev() {
        let on_staff = pos % 2 == 0 && (STAFF_BOTTOM..=STAFF_TOP).contains(&pos);
        let fill = if on_staff { '-' } else { ' ' };
        let mut line = String::from("  ");
        line.push(fill);

        for (i, note) in snapshot.notes.iter().enumerate() {
            let ledger = pos % 2 == 0
                && ((pos > STAFF_TOP && note.position >= pos)
                    || (pos < STAFF_BOTTOM && note.position <= pos));
            let line_char = if on_staff || ledger { '-' } else { ' ' };
            let head = if i == snapshot.current_index { 'O' } else { 'o' };

            let mut cell = vec![line_char; COLUMN_WIDTH];
            if ledger && !on_staff {
                cell[0] = ' ';
                cell[COLUMN_WIDTH - 1] = ' ';
            }
            if note.position == pos {
                cell[COLUMN_WIDTH / 2] = head;
            }
            line.extend(cell);
            line.push(fill);
        }
        lines.push(line);
    }

    let mut marker = String::from("   ");
    for i in 0..snapshot.notes.len() {
        let mut cell = vec![' '; COLUMN_WIDTH + 1];
        if i == snapshot.current_index {
            cell[COLUMN_WIDTH / 2] = '^';
        }
        marker.extend(cell);
    }
    lines.push(marker.trim_end().to_string());
    lines
}

fn status_line(s: &Snapshot) -> String {
    let mut line = format!(
        "  Score {}/{} ({:.0}%)",
        s.correct_count,
        s.total_attempts,
        s.accuracy()
    );
    match s.mode {
        GameMode::Practice => {}
        GameMode::TimedChallenge => line.push_str(&format!("   Time {}s", s.time_remaining)),
        GameMode::Streak => line.push_str(&format!(
            "   Streak {} (best {})",
            s.current_streak, s.best_streak
        )),
    }
    if s.metronome_pulse {
        line.push_str("   *");
    }
    line
}

fn feedback_line(s: &Snapshot, notation: NoteNotation) -> String {
    if s.game_over {
        let reason = match s.mode {
            GameMode::TimedChallenge => "Time's up!".to_string(),
            _ => match s.current_note() {
                Some(note) => format!("Missed! It was {}.", note.name.display_name(notation)),
                None => "Missed!".to_string(),
            },
        };
        return format!("  {} Game over. Press r to play again.", reason);
    }
    if !s.feedback_visible {
        return String::new();
    }
    match s.last_result {
        AnswerResult::Correct => "  Correct!".to_string(),
        AnswerResult::Incorrect => "  Not quite, try again.".to_string(),
        AnswerResult::Pending => String::new(),
    }
}

fn key_help(notation: NoteNotation) -> String {
    let mut keys = String::from("  ");
    let mut names = String::from("  ");
    for (key, note) in ['a', 's', 'd', 'f', 'g', 'h', 'j'].into_iter().zip(NoteName::ALL) {
        let name = note.display_name(notation);
        let width = name.len().max(1) + 2;
        keys.push_str(&format!("{:<width$}", key, width = width));
        names.push_str(&format!("{:<width$}", name, width = width));
    }
    format!("{}\r\n{}\r\n", keys.trim_end(), names.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Phase;
    use crate::note::{Clef, MusicNote};

    fn snapshot(positions: &[i32], current_index: usize) -> Snapshot {
        Snapshot {
            mode: GameMode::Practice,
            notes: positions.iter().map(|&p| MusicNote::new(p, Clef::Treble)).collect(),
            current_index,
            clef: Clef::Treble,
            phase: Phase::RoundInProgress,
            feedback_visible: false,
            last_result: AnswerResult::Pending,
            correct_count: 0,
            total_attempts: 0,
            current_streak: 0,
            best_streak: 0,
            time_remaining: 60,
            game_over: false,
            metronome_pulse: false,
        }
    }

    #[test]
    fn test_staff_has_five_lines_and_marker() {
        let lines = staff_lines(&snapshot(&[0, 2], 1));
        // positions 5..=-5 plus the marker row
        assert_eq!(lines.len(), 12);
        let staff_rows = lines.iter().filter(|l| l.trim_start().starts_with('-')).count();
        assert_eq!(staff_rows, 5);
        assert!(lines.last().unwrap().contains('^'));
    }

    #[test]
    fn test_note_heads_land_on_their_rows() {
        let lines = staff_lines(&snapshot(&[0, 2], 1));
        // row index = top - position, top = 5
        assert!(lines[5].contains('o'));
        assert!(lines[3].contains('O'));
    }

    #[test]
    fn test_ledger_lines_only_where_needed() {
        let lines = staff_lines(&snapshot(&[8, 0], 0));
        // top = 8: row 0 is position 8, row 2 is position 6
        assert!(lines[0].contains("-O-"));
        assert!(lines[2].contains("---"));
        assert!(!lines[1].contains('-'));
        // the note on the middle line gets no ledger line up there
        assert_eq!(lines[2].matches("---").count(), 1);
    }

    #[test]
    fn test_feedback_text() {
        let mut s = snapshot(&[0], 0);
        assert!(feedback_line(&s, NoteNotation::Solfege).is_empty());
        s.feedback_visible = true;
        s.last_result = AnswerResult::Correct;
        assert!(feedback_line(&s, NoteNotation::Solfege).contains("Correct"));

        s.mode = GameMode::Streak;
        s.game_over = true;
        assert!(feedback_line(&s, NoteNotation::Letter).contains("It was B"));
    }

    #[test]
    fn test_key_help_follows_notation() {
        assert!(key_help(NoteNotation::Solfege).contains("Sol"));
        assert!(key_help(NoteNotation::Letter).contains('G'));
    }
}
