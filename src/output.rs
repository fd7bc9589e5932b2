use std::io::{self, Write};

use serde::Serialize;

use crate::app::{EnrichResult, ProgressEvent, ProgressSink};
use crate::deck::DeckResult;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Live progress lines on stdout, one per event.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let mut stdout = io::stdout().lock();
        match event.elapsed {
            Some(elapsed) => writeln!(stdout, "{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => writeln!(stdout, "{}", event.message),
        }
        .ok();
    }
}

/// Silent while running; prints one JSON document at the end.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_enrich(result: &EnrichResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_decks(result: &DeckResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
