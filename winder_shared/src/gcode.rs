//! G-code text produced for the winder and the helpers to read it back.

use crate::coordinate::{Axis, PartialCoordinate};
use crate::wind::{MandrelParameters, TowParameters};
use serde::{Deserialize, Serialize};

pub const COMMENT_PREFIX: char = ';';
pub const MOVE_VERB: &str = "G0";
pub const SET_POSITION_VERB: &str = "G92";

/// How many leading lines are searched for the parameter header.
const HEADER_SEARCH_LINES: usize = 16;

/// Round to 6 decimal digits (ties to even) and fold `-0` into `0`.
pub fn strip_precision(value: f64) -> f64 {
    let rounded = (value * 1e6).round_ties_even() / 1e6;
    if rounded == 0.0 { 0.0 } else { rounded }
}

pub fn format_value(value: f64) -> String {
    strip_precision(value).to_string()
}

fn axis_words(verb: &str, partial: &PartialCoordinate) -> String {
    let mut command = verb.to_string();
    for (axis, value) in partial.axes() {
        command.push(' ');
        command.push(axis.letter());
        command.push_str(&format_value(value));
    }
    command
}

/// `G0` carrying every axis present in `partial`.
pub fn move_command(partial: &PartialCoordinate) -> String {
    axis_words(MOVE_VERB, partial)
}

/// `G92` redefining the origin of every axis present in `partial`.
pub fn set_position_command(partial: &PartialCoordinate) -> String {
    axis_words(SET_POSITION_VERB, partial)
}

pub fn feed_rate_command(feed_rate: f64) -> String {
    format!("{} F{}", MOVE_VERB, format_value(feed_rate))
}

pub fn comment(text: &str) -> String {
    format!("{} {}", COMMENT_PREFIX, text)
}

pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with(COMMENT_PREFIX)
}

/// Text of a comment line without the prefix, or `None` for commands.
pub fn comment_payload(line: &str) -> Option<&str> {
    line.trim_start()
        .strip_prefix(COMMENT_PREFIX)
        .map(str::trim)
}

/// A line of winder G-code, as understood by the simulator and the header reader.
#[derive(Debug, Clone, PartialEq)]
pub enum GCodeLine {
    Move {
        target: PartialCoordinate,
        feed_rate: Option<f64>,
    },
    SetPosition(PartialCoordinate),
    Comment(String),
    Empty,
    Other(String),
}

pub fn parse_line(line: &str) -> GCodeLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return GCodeLine::Empty;
    }
    if let Some(payload) = comment_payload(trimmed) {
        return GCodeLine::Comment(payload.to_string());
    }

    let mut words = trimmed.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let mut target = PartialCoordinate::new();
    let mut feed_rate = None;
    for word in words {
        let mut chars = word.chars();
        let Some(letter) = chars.next() else { continue };
        let Ok(value) = chars.as_str().parse::<f64>() else {
            tracing::warn!("Ignoring malformed word '{}' in '{}'", word, trimmed);
            continue;
        };
        if letter.eq_ignore_ascii_case(&'F') {
            feed_rate = Some(value);
        } else if let Some(axis) = Axis::from_letter(letter) {
            target = target.with(axis, value);
        }
    }

    match verb {
        MOVE_VERB => GCodeLine::Move { target, feed_rate },
        SET_POSITION_VERB => GCodeLine::SetPosition(target),
        _ => GCodeLine::Other(trimmed.to_string()),
    }
}

/// Physical parameters recorded at the top of a generated program so that
/// downstream tools can size their output without the wind file.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ParameterHeader {
    pub mandrel: MandrelParameters,
    pub tow: TowParameters,
}

impl ParameterHeader {
    pub const LABEL: &'static str = "Parameters";

    pub fn new(mandrel: MandrelParameters, tow: TowParameters) -> Self {
        Self { mandrel, tow }
    }

    pub fn to_comment(&self) -> Result<String, serde_json::Error> {
        let encoded = serde_json::to_string(self)?;
        Ok(comment(&format!("{} {}", Self::LABEL, encoded)))
    }

    pub fn from_comment(line: &str) -> Option<Self> {
        let payload = comment_payload(line)?;
        let encoded = payload.strip_prefix(Self::LABEL)?;
        serde_json::from_str(encoded.trim()).ok()
    }

    /// Looks for the header among the leading lines of a program.
    pub fn find_in<'a, I>(lines: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .take(HEADER_SEARCH_LINES)
            .find_map(Self::from_comment)
    }
}
