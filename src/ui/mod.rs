pub mod calendar;
pub mod card;

use crate::core::models::{Contributions, NowPlayingSnapshot};
use chrono::Local;

pub use calendar::Theme;
pub use card::{format_line, CardUpdate, NowPlayingCard};

/// Presentation side of the now-playing widget.
pub trait NowPlayingRenderer: Send + 'static {
    fn show(&mut self, snapshot: &NowPlayingSnapshot, update: &CardUpdate);
    fn hide(&mut self);
}

/// Presentation side of the contribution calendar widget.
pub trait CalendarRenderer: Send + 'static {
    fn render(&mut self, data: &Contributions);
}

/// Prints card changes to stdout, one line per update.
#[derive(Default)]
pub struct TerminalCard;

impl NowPlayingRenderer for TerminalCard {
    fn show(&mut self, snapshot: &NowPlayingSnapshot, update: &CardUpdate) {
        if update.new_track {
            println!();
        }
        println!("{}", format_line(snapshot, update.percent, update.target_percent));
    }

    fn hide(&mut self) {
        println!("Nothing playing");
    }
}

/// Prints the calendar grid to stdout whenever it is rendered.
#[derive(Default)]
pub struct TerminalCalendar;

impl CalendarRenderer for TerminalCalendar {
    fn render(&mut self, data: &Contributions) {
        let today = Local::now().date_naive();
        print!("{}", calendar::render_terminal(data, today));
    }
}
