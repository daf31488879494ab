//! WebVTT cue parsing.
//!
//! Parses the subset of WebVTT the packager repackages: the header line,
//! optional cue identifiers, timing lines with settings, and multi-line cue
//! payloads. NOTE/STYLE/REGION blocks are skipped.

use crate::error::{Result, TextError};

/// One parsed cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// Optional cue identifier line.
    pub identifier: Option<String>,
    /// Start time in milliseconds.
    pub start_ms: u64,
    /// End time in milliseconds.
    pub end_ms: u64,
    /// Cue settings after the timing line, unparsed.
    pub settings: String,
    /// Cue payload text.
    pub payload: String,
}

/// Parse a WebVTT document into cues.
pub fn parse_cues(input: &str) -> Result<Vec<Cue>> {
    let mut lines = input.lines().peekable();

    let first_line = lines
        .next()
        .ok_or_else(|| TextError::InvalidWebVtt("empty document".into()))?;
    if !first_line.trim_start_matches('\u{FEFF}').starts_with("WEBVTT") {
        return Err(TextError::InvalidWebVtt(
            "document must start with WEBVTT".into(),
        ));
    }

    let mut cues = Vec::new();

    while lines.peek().is_some() {
        // Skip blank lines between blocks.
        while matches!(lines.peek(), Some(line) if line.trim().is_empty()) {
            lines.next();
        }
        let Some(first_block_line) = lines.next() else {
            break;
        };
        let first_block_line = first_block_line.trim();
        if first_block_line.is_empty() {
            continue;
        }

        // Skip comment and styling blocks wholesale.
        if first_block_line.starts_with("NOTE")
            || first_block_line.starts_with("STYLE")
            || first_block_line.starts_with("REGION")
        {
            while matches!(lines.peek(), Some(line) if !line.trim().is_empty()) {
                lines.next();
            }
            continue;
        }

        let (identifier, timing_line) = if first_block_line.contains("-->") {
            (None, first_block_line)
        } else {
            let timing = lines
                .next()
                .ok_or_else(|| TextError::InvalidWebVtt("cue without timing line".into()))?
                .trim();
            (Some(first_block_line.to_string()), timing)
        };

        let (start_ms, end_ms, settings) = parse_timing_line(timing_line)?;

        let mut payload_lines = Vec::new();
        while matches!(lines.peek(), Some(line) if !line.trim().is_empty()) {
            payload_lines.push(lines.next().unwrap_or_default());
        }

        cues.push(Cue {
            identifier,
            start_ms,
            end_ms,
            settings,
            payload: payload_lines.join("\n"),
        });
    }

    Ok(cues)
}

fn parse_timing_line(line: &str) -> Result<(u64, u64, String)> {
    let (start_part, rest) = line
        .split_once("-->")
        .ok_or_else(|| TextError::InvalidWebVtt(format!("bad timing line: {line}")))?;

    let rest = rest.trim();
    let (end_part, settings) = match rest.split_once(char::is_whitespace) {
        Some((end, settings)) => (end, settings.trim().to_string()),
        None => (rest, String::new()),
    };

    let start_ms = parse_timestamp(start_part.trim())?;
    let end_ms = parse_timestamp(end_part.trim())?;
    if end_ms <= start_ms {
        return Err(TextError::InvalidWebVtt(format!(
            "cue ends at {end_ms}ms, before its start {start_ms}ms"
        )));
    }

    Ok((start_ms, end_ms, settings))
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` into milliseconds.
fn parse_timestamp(text: &str) -> Result<u64> {
    let bad = || TextError::InvalidWebVtt(format!("bad timestamp: {text}"));

    let (clock, millis) = text.split_once('.').ok_or_else(bad)?;
    if millis.len() != 3 {
        return Err(bad());
    }
    let millis: u64 = millis.parse().map_err(|_| bad())?;

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds): (u64, u64, u64) = match parts.as_slice() {
        [h, m, s] => (
            h.parse().map_err(|_| bad())?,
            m.parse().map_err(|_| bad())?,
            s.parse().map_err(|_| bad())?,
        ),
        [m, s] => (0u64, m.parse().map_err(|_| bad())?, s.parse().map_err(|_| bad())?),
        _ => return Err(bad()),
    };
    if minutes >= 60 || seconds >= 60 {
        return Err(bad());
    }

    Ok(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}
