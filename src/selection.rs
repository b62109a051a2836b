//! Genre selection for manual mode.
//!
//! The tagging loop asks a [`SelectionProvider`] for a genre and blocks
//! until one is returned. Providers:
//! - [`ScriptedSelection`]: fixed answers, for tests and batch replays
//! - [`ChannelSelection`]: forwards requests to a front end on another thread
//! - [`TerminalSelection`]: numbered prompt on a reader/writer pair

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::collections::VecDeque;
use std::io::{BufRead, Write};

use crate::error::{Result, TagMateError};

pub trait SelectionProvider {
    /// Return the genre chosen for `track`. `preview_url` lets the operator
    /// listen before choosing.
    fn select_genre(&mut self, track: &str, preview_url: Option<&str>) -> Result<String>;
}

fn selection_error(track: &str, reason: impl ToString) -> TagMateError {
    TagMateError::Selection {
        track: track.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// Scripted
// ============================================================================

#[derive(Debug, Default)]
pub struct ScriptedSelection {
    answers: VecDeque<String>,
    /// Tracks asked about, in order
    pub asked: Vec<String>,
}

impl ScriptedSelection {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }
}

impl SelectionProvider for ScriptedSelection {
    fn select_genre(&mut self, track: &str, _preview_url: Option<&str>) -> Result<String> {
        self.asked.push(track.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| selection_error(track, "no scripted answer left"))
    }
}

// ============================================================================
// Channel
// ============================================================================

/// One genre request sent to the front end. Answer through `reply`.
#[derive(Debug)]
pub struct GenreRequest {
    pub track: String,
    pub preview_url: Option<String>,
    pub reply: Sender<String>,
}

pub struct ChannelSelection {
    requests: Sender<GenreRequest>,
}

impl ChannelSelection {
    /// Create a provider and the receiver the front end listens on.
    pub fn pair() -> (Self, Receiver<GenreRequest>) {
        let (tx, rx) = unbounded();
        (Self { requests: tx }, rx)
    }
}

impl SelectionProvider for ChannelSelection {
    fn select_genre(&mut self, track: &str, preview_url: Option<&str>) -> Result<String> {
        let (reply_tx, reply_rx) = bounded(1);
        self.requests
            .send(GenreRequest {
                track: track.to_string(),
                preview_url: preview_url.map(str::to_string),
                reply: reply_tx,
            })
            .map_err(|_| selection_error(track, "front end is gone"))?;
        reply_rx
            .recv()
            .map_err(|_| selection_error(track, "front end closed without answering"))
    }
}

// ============================================================================
// Terminal
// ============================================================================

pub struct TerminalSelection<R, W> {
    genres: Vec<String>,
    input: R,
    output: W,
}

impl TerminalSelection<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio(genres: Vec<String>) -> Self {
        Self::new(genres, std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalSelection<R, W> {
    pub fn new(genres: Vec<String>, input: R, output: W) -> Self {
        Self {
            genres,
            input,
            output,
        }
    }

    fn prompt(&mut self, track: &str, preview_url: Option<&str>) -> std::io::Result<()> {
        writeln!(self.output, "\n{}", track)?;
        match preview_url {
            Some(url) => writeln!(self.output, "  Preview: {}", url)?,
            None => writeln!(self.output, "  No preview")?,
        }
        for (i, genre) in self.genres.iter().enumerate() {
            writeln!(self.output, "  [{}] {}", i + 1, genre)?;
        }
        write!(self.output, "Genre (number or text): ")?;
        self.output.flush()
    }

    /// Interpret one input line. Numbers pick from the list, other text is
    /// taken verbatim, blank lines yield nothing.
    fn interpret(&self, line: &str) -> Option<String> {
        let answer = line.trim();
        if answer.is_empty() {
            return None;
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=self.genres.len()).contains(&n) => Some(self.genres[n - 1].clone()),
            Ok(_) => None,
            Err(_) => Some(answer.to_string()),
        }
    }
}

impl<R: BufRead, W: Write> SelectionProvider for TerminalSelection<R, W> {
    fn select_genre(&mut self, track: &str, preview_url: Option<&str>) -> Result<String> {
        loop {
            self.prompt(track, preview_url)?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(selection_error(track, "input closed"));
            }
            if let Some(genre) = self.interpret(&line) {
                return Ok(genre);
            }
        }
    }
}
