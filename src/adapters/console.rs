//! Console status presenter.
//!
//! Implements [`StatusObserver`] by rendering the status as a 4×20
//! character display page and writing it through the logger.  The page
//! depends on the mode:
//!
//! ```text
//!  standby              media exchange        error
//!  ┌────────────────────┐┌────────────────────┐┌────────────────────┐
//!  │T 37.0 36.2 37.4    ││Target Vol: 125.0mL ││ERR 2024-01-01 00:15│
//!  │In 1.25L Out 1.25L  ││Volume In : 80.00mL ││Calibration failed  │
//!  │Next in 14:32       ││Volume Out: 125.0mL ││after 63s. Water    │
//!  │Up 02:11:09         ││State calib T37.0   ││level sensor may be │
//!  └────────────────────┘└────────────────────┘└────────────────────┘
//! ```
//!
//! Identical pages are skipped, and a page of the same view is not
//! redrawn more often than the refresh interval.

use std::time::{Duration, Instant};

use chrono::TimeDelta;
use log::{info, warn};

use crate::app::ports::StatusObserver;
use crate::status::{SystemMode, SystemStatus};

pub const COLS: usize = 20;
pub const ROWS: usize = 4;

pub type Page = [String; ROWS];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Standby,
    Cycle,
    Error,
}

impl View {
    pub fn for_status(status: &SystemStatus) -> Self {
        match status.mode {
            SystemMode::Standby => Self::Standby,
            SystemMode::MediaExchange => Self::Cycle,
            SystemMode::Error { .. } => Self::Error,
        }
    }
}

pub struct ConsolePresenter {
    refresh: Duration,
    last_view: Option<View>,
    last_drawn: Option<Instant>,
    last_page: Page,
    pages_drawn: u64,
}

impl ConsolePresenter {
    pub fn new(refresh: Duration) -> Self {
        Self {
            refresh,
            last_view: None,
            last_drawn: None,
            last_page: Default::default(),
            pages_drawn: 0,
        }
    }

    pub fn pages_drawn(&self) -> u64 {
        self.pages_drawn
    }
}

impl StatusObserver for ConsolePresenter {
    fn notify(&mut self, status: &SystemStatus) {
        let view = View::for_status(status);
        let page = render(status);
        if page == self.last_page {
            return;
        }
        let same_view = self.last_view == Some(view);
        if same_view && self.last_drawn.is_some_and(|t| t.elapsed() < self.refresh) {
            return;
        }

        for line in &page {
            if line.chars().count() > COLS {
                warn!("Display line over {} columns: '{}'", COLS, line);
            }
        }
        info!("LCD | {} | {} | {} | {}", page[0], page[1], page[2], page[3]);

        self.last_view = Some(view);
        self.last_drawn = Some(Instant::now());
        self.last_page = page;
        self.pages_drawn += 1;
    }
}

// ───────────────────────────────────────────────────────────────
// Rendering
// ───────────────────────────────────────────────────────────────

/// Render the page for the current mode.
pub fn render(status: &SystemStatus) -> Page {
    match &status.mode {
        SystemMode::Standby => render_standby(status),
        SystemMode::MediaExchange => render_cycle(status),
        SystemMode::Error { description, at } => {
            let mut page: Page = Default::default();
            page[0] = format!("ERR {}", at.format("%Y-%m-%d %H:%M"));
            for (row, line) in wrap(description, COLS, ROWS - 1).into_iter().enumerate() {
                page[row + 1] = line;
            }
            page
        }
    }
}

fn render_standby(status: &SystemStatus) -> Page {
    let t = &status.temperature;
    let current = if t.sensor_ok { t.last_c } else { None };
    let next = match status.next_cycle_time {
        Some(at) => format!("Next in {}", clock(at - status.as_of)),
        None => "Next --:--".to_string(),
    };
    [
        format!("T {} {} {}", temp(current), temp(t.min_c), temp(t.max_c)),
        format!(
            "In {:.2}L Out {:.2}L",
            status.media_in_ml / 1000.0,
            status.media_out_ml / 1000.0
        ),
        next,
        format!("Up {}", clock(status.as_of - status.started_at)),
    ]
}

fn render_cycle(status: &SystemStatus) -> Page {
    let cycle = &status.cycle;
    let t = &status.temperature;
    let current = if t.sensor_ok { t.last_c } else { None };
    [
        format!("Target Vol: {}mL", volume(cycle.target_volume_ml())),
        format!("Volume In : {}mL", volume(cycle.in_volume())),
        format!("Volume Out: {}mL", volume(cycle.out_volume())),
        format!("State {} T{}", cycle.phase(), temp(current)),
    ]
}

/// Four significant digits so the value fits a 5-wide field.
fn volume(ml: f32) -> String {
    if ml < 100.0 {
        format!("{ml:.2}")
    } else if ml < 1000.0 {
        format!("{ml:.1}")
    } else {
        format!("{ml:.0}")
    }
}

fn temp(c: Option<f32>) -> String {
    c.map_or_else(|| "--".to_string(), |c| format!("{c:.1}"))
}

/// `[-]hh:mm:ss`, or `mm:ss` under an hour.
fn clock(d: TimeDelta) -> String {
    let secs = d.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Greedy word wrap into at most `max_lines` lines of `width` columns.
/// Words longer than `width` are split; text beyond the last line is
/// dropped.
pub fn wrap(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    let options = textwrap::Options::new(width)
        .break_words(true)
        .wrap_algorithm(textwrap::WrapAlgorithm::FirstFit);
    textwrap::wrap(text, options)
        .into_iter()
        .take(max_lines)
        .map(|line| line.into_owned())
        .collect()
}
