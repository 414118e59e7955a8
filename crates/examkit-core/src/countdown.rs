//! Per-second exam clock.
//!
//! Each tick takes exactly one second off the remaining time. Ticks are not
//! reconciled against wall-clock time: a suspended session resumes from where
//! it stopped rather than catching up the missed seconds.

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The countdown is not running; nothing changed.
    Idle,
    /// One second elapsed; this many remain.
    Running(u32),
    /// Time is up. The countdown has stopped itself.
    Expired,
}

#[derive(Debug, Default)]
pub struct Countdown {
    running: bool,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance by one second.
    ///
    /// At one second or less the countdown stops, pins `time_left` to zero and
    /// reports `Expired` exactly once.
    pub fn tick(&mut self, time_left: &mut u32) -> Tick {
        if !self.running {
            return Tick::Idle;
        }
        if *time_left <= 1 {
            self.running = false;
            *time_left = 0;
            return Tick::Expired;
        }
        *time_left -= 1;
        Tick::Running(*time_left)
    }
}

/// Format seconds as `MM:SS`, or `H:MM:SS` past an hour.
pub fn format_remaining(secs: u32) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
