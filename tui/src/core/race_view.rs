use std::io::{self, Write};
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal,
};
use flume::Sender;
use helpers::buffer::RingBuffer;
use racesim::core::race::RaceOutcome;
use racesim::core::racer::RacerStatus;
use racesim::interfaces::tui_interface::{
    RaceSnapshot, RgbColor, NAME_COL_WIDTH, ROWS_PER_LANE, TRACK_START_COL, TRACK_TOP_ROW,
};
use racesim::post::race_result::RaceResult;

use crate::interfaces::racesim_interface::RacesimInterface;

// glyphs taken over from the terminal animation
const TORTOISE: &str = "\u{1f422}";
const BOMB: &str = "\u{1f4a3}";
const BOOM: &str = "BOOOOOOM!";

/// RaceView draws race snapshots onto the terminal with a full redraw per frame and handles the
/// keyboard. Every draw is clipped to the terminal bounds, out-of-bounds draws are silently
/// ignored and never an error.
pub struct RaceView {
    stdout: io::Stdout,
    width: u16,
    height: u16,
    show_frame_stats: bool,
    frame_durations: RingBuffer<u32>,
}

impl RaceView {
    pub fn new(width: u16, height: u16, show_frame_stats: bool) -> RaceView {
        RaceView {
            stdout: io::stdout(),
            width,
            height,
            show_frame_stats,
            frame_durations: RingBuffer::new(20),
        }
    }

    pub fn enter(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        queue!(
            self.stdout,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            terminal::DisableLineWrap
        )?;
        self.stdout.flush()?;
        Ok(())
    }

    pub fn exit(&mut self) -> Result<()> {
        queue!(
            self.stdout,
            ResetColor,
            SetAttribute(Attribute::Reset),
            terminal::EnableLineWrap,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        self.stdout.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // SCREENS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// draw_lineup shows the static starting grid with the start prompt.
    pub fn draw_lineup(&mut self, snapshot: &RaceSnapshot) -> Result<()> {
        queue!(self.stdout, terminal::Clear(terminal::ClearType::All))?;

        for racer in snapshot.racer_states.iter() {
            let row = lane_row(racer.lane);
            let color = rgb_to_color(&racer.color);

            self.put_str(
                row,
                0,
                &format!("{:<width$}", racer.name, width = NAME_COL_WIDTH),
                Some(color),
                false,
            )?;
            self.put_str(row, TRACK_START_COL as i32, TORTOISE, Some(color), false)?;
        }

        let col_mid = self.width as i32 / 2;
        self.put_str(self.height - 2, col_mid - 10, "Choose your fighter!!", None, true)?;
        self.put_str(
            self.height - 1,
            col_mid - 15,
            "Press any key to start the race!",
            None,
            true,
        )?;

        self.stdout.flush()?;
        Ok(())
    }

    /// run_countdown shows the READY, STEADY, GO! sequence, one second per step.
    pub fn run_countdown(&mut self) -> Result<()> {
        queue!(self.stdout, terminal::Clear(terminal::ClearType::All))?;

        let row_mid = self.height / 2;
        let col_mid = self.width as i32 / 2;

        self.put_str(row_mid - 2, col_mid - 6, "READY!", None, true)?;
        self.stdout.flush()?;
        sleep(Duration::from_secs(1));

        self.put_str(row_mid - 1, col_mid - 7, "STEADY!", None, true)?;
        self.stdout.flush()?;
        sleep(Duration::from_secs(1));

        self.put_str(row_mid, col_mid - 4, "GO!", None, true)?;
        self.stdout.flush()?;
        sleep(Duration::from_secs(1));

        Ok(())
    }

    /// draw_race renders one animation frame from a snapshot.
    pub fn draw_race(&mut self, snapshot: &RaceSnapshot) -> Result<()> {
        let t_start = Instant::now();

        queue!(self.stdout, terminal::Clear(terminal::ClearType::All))?;

        let finish_col = TRACK_START_COL as i32 + snapshot.finish_line as i32;
        let track_line = "-".repeat(self.width as usize);

        // track and finish-line markers
        for racer in snapshot.racer_states.iter() {
            let row = lane_row(racer.lane);
            self.put_str(row, 0, &track_line, None, false)?;
            self.put_str(row + 1, finish_col, "|", None, false)?;
        }

        // racers
        for racer in snapshot.racer_states.iter() {
            let row = lane_row(racer.lane);
            let color = rgb_to_color(&racer.color);

            self.put_str(
                row,
                0,
                &format!("{:<width$}", racer.name, width = NAME_COL_WIDTH),
                Some(color),
                false,
            )?;

            match racer.status {
                RacerStatus::Finished => {
                    if let Some(rank) = racer.rank {
                        self.put_str(row, finish_col + 2, &format!("{}!", rank), Some(color), true)?;
                    }
                }
                RacerStatus::Dnf => match &racer.hazard {
                    Some(hazard) if hazard.detonated => {
                        let boom_col = TRACK_START_COL as i32 + hazard.s_trigger as i32;
                        self.put_str(row, boom_col, BOOM, None, true)?;
                    }
                    _ => {
                        // taken out without a bomb (grace period): left standing where it stopped
                        let racer_col = TRACK_START_COL as i32 + racer.s_track as i32;
                        self.put_str(row, racer_col, TORTOISE, Some(color), false)?;
                        self.put_str(row, finish_col + 2, "DNF", Some(color), false)?;
                    }
                },
                RacerStatus::Running => {
                    let racer_col = TRACK_START_COL as i32 + racer.s_track as i32;
                    self.put_str(row, racer_col, TORTOISE, Some(color), false)?;

                    if let Some(hazard) = &racer.hazard {
                        if !hazard.detonated {
                            let bomb_col = TRACK_START_COL as i32 + hazard.s_trigger as i32;
                            self.put_str(row, bomb_col, BOMB, None, true)?;
                            self.put_str(
                                row,
                                bomb_col + 2,
                                &hazard.countdown_s.to_string(),
                                None,
                                false,
                            )?;
                        }
                    }
                }
            }
        }

        if self.show_frame_stats && !self.frame_durations.is_empty() {
            let info = format!(
                "frame {:5.1}ms | tick {}",
                self.frame_durations.mean(),
                snapshot.tick
            );
            self.put_str(self.height - 1, 0, &info, None, false)?;
        }

        self.stdout.flush()?;
        self.frame_durations.push(t_start.elapsed().as_millis() as u32);
        Ok(())
    }

    /// draw_results shows the final classification with podium coloring.
    pub fn draw_results(&mut self, result: &RaceResult) -> Result<()> {
        queue!(self.stdout, terminal::Clear(terminal::ClearType::All))?;

        let col_mid = self.width as i32 / 2;
        self.put_str(0, col_mid - 7, "Final Results", None, true)?;

        let headline = match &result.outcome {
            Some(RaceOutcome::Winner { name }) => format!("The winner is: {}!", name),
            Some(RaceOutcome::NoWinner) => String::from("All tortoises exploded! No winner."),
            Some(RaceOutcome::Interrupted) => String::from("Race interrupted!"),
            None => String::from("Race still running!"),
        };
        self.put_str(2, col_mid - headline.len() as i32 / 2, &headline, None, true)?;

        for (i, entry) in result.classification.iter().enumerate() {
            let color = match entry.rank {
                Some(1) => Some(Color::Yellow),  // gold
                Some(2) => Some(Color::White),   // silver
                Some(3) => Some(Color::Magenta), // bronze
                _ => None,
            };

            let pos = match entry.rank {
                Some(rank) => rank.to_string(),
                None => String::from("DNF"),
            };
            let suffix = if entry.exploded { " (Exploded)" } else { "" };
            let line = format!("{}. {}{}", pos, entry.name, suffix);

            self.put_str(4 + i as u16, col_mid - 15, &line, color, false)?;
        }

        self.put_str(self.height - 1, col_mid - 11, "Press any key to exit.", None, true)?;

        self.stdout.flush()?;
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // KEYBOARD ------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// wait_key blocks until any key is pressed and returns it.
    pub fn wait_key(&mut self) -> Result<KeyEvent> {
        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(key);
                }
            }
        }
    }

    /// poll_quit waits up to `timeout` for input and returns true if a quit key was pressed.
    /// Doubles as the frame pacing of the render loop.
    pub fn poll_quit(&mut self, timeout: Duration) -> Result<bool> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && is_quit_key(&key) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    // ---------------------------------------------------------------------------------------------
    // RENDER LOOP ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// run draws snapshots until the final result arrives or the user quits. Returns the shown
    /// result, or None if the race was quit resp. the simulator went away.
    pub fn run(
        &mut self,
        iface: &mut RacesimInterface,
        quit_tx: &Sender<()>,
    ) -> Result<Option<RaceResult>> {
        loop {
            iface.update_snapshot();

            if let Some(result) = iface.snapshot.final_result.take() {
                self.draw_results(&result)?;
                self.wait_key()?;
                return Ok(Some(result));
            }

            if iface.disconnected() {
                return Ok(None);
            }

            if self.poll_quit(Duration::from_millis(25))? {
                let _ = quit_tx.send(());
                return Ok(None);
            }

            self.draw_race(&iface.snapshot)?;
        }
    }

    /// put_str draws a text span at (row, col), clipped to the terminal bounds. A column left of
    /// the display is partially drawn, anything outside is dropped without error.
    fn put_str(
        &mut self,
        row: u16,
        col: i32,
        text: &str,
        color: Option<Color>,
        bold: bool,
    ) -> Result<()> {
        if row >= self.height {
            return Ok(());
        }

        let (start_col, skip, draw_len) =
            match visible_span(col, text.chars().count(), self.width) {
                Some(span) => span,
                None => return Ok(()),
            };

        let visible: String = text.chars().skip(skip).take(draw_len).collect();

        queue!(self.stdout, cursor::MoveTo(start_col, row))?;
        if let Some(color) = color {
            queue!(self.stdout, SetForegroundColor(color))?;
        }
        if bold {
            queue!(self.stdout, SetAttribute(Attribute::Bold))?;
        }
        queue!(
            self.stdout,
            Print(visible),
            ResetColor,
            SetAttribute(Attribute::Reset)
        )?;

        Ok(())
    }
}

fn lane_row(lane: usize) -> u16 {
    TRACK_TOP_ROW + lane as u16 * ROWS_PER_LANE
}

fn rgb_to_color(rgb: &RgbColor) -> Color {
    Color::Rgb {
        r: rgb.r,
        g: rgb.g,
        b: rgb.b,
    }
}

/// is_quit_key returns true for the keys that abort the race (`q`, `Esc`, `Ctrl-C`).
pub fn is_quit_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// visible_span clips a text span of `len` characters starting at column `col` (possibly
/// negative) to a display of `width` columns. Returns the start column, the number of characters
/// to skip, and the number of characters to draw, or None if nothing is visible.
fn visible_span(col: i32, len: usize, width: u16) -> Option<(u16, usize, usize)> {
    if len == 0 || col >= width as i32 {
        return None;
    }

    let end = col + len as i32;
    if end <= 0 {
        return None;
    }

    let start = col.max(0);
    let skip = (start - col) as usize;
    let draw_len = (end.min(width as i32) - start) as usize;

    Some((start as u16, skip, draw_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_span_clips_both_edges() {
        // fully visible
        assert_eq!(visible_span(5, 3, 80), Some((5, 0, 3)));
        // hangs over the right edge
        assert_eq!(visible_span(78, 5, 80), Some((78, 0, 2)));
        // starts left of the display
        assert_eq!(visible_span(-2, 5, 80), Some((0, 2, 3)));
        // fully outside
        assert_eq!(visible_span(80, 3, 80), None);
        assert_eq!(visible_span(-5, 5, 80), None);
        assert_eq!(visible_span(10, 0, 80), None);
    }

    #[test]
    fn quit_keys_are_recognized() {
        let quit = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let other = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);

        assert!(is_quit_key(&quit));
        assert!(is_quit_key(&ctrl_c));
        assert!(!is_quit_key(&other));
    }
}
