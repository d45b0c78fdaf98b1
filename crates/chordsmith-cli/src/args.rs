//! Command-line parsing

use chordsmith_core::{ArpPattern, Chord, ChordsmithError, SequenceStep, Tonality};
use thiserror::Error;

pub const USAGE: &str = "\
Usage:
  chordsmith chords <key> [--sevenths]
  chordsmith play <key> <chord>... [--tempo N] [--arp PATTERN] [--octaves N] [--loop] [--metronome]
  chordsmith export <key> <chord>... [--tempo N] [--json]
  chordsmith save <key> <name> <chord>...
  chordsmith track [--tempo N] [--arp PATTERN] [--octaves N] [--loop] [--metronome]
  chordsmith config [--init]

Chords are symbols (C, F#m7, Bbmaj9) or scale degrees 1-7 of the key.
`%` is a rest, `|` starts a new section, `:N` sets a duration in whole notes (Am:0.5).
Patterns: up, down, updown, downup, random.";

#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Unknown option: {0}")]
    UnknownOption(String),
    #[error("Invalid value for {option}: {value}")]
    InvalidValue { option: &'static str, value: String },
    #[error(transparent)]
    Chord(#[from] ChordsmithError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayOptions {
    pub tempo: Option<u32>,
    pub arp: Option<ArpPattern>,
    pub octaves: Option<u8>,
    pub looping: bool,
    pub metronome: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chords { key: String, sevenths: bool },
    Play { key: String, chords: Vec<String>, options: PlayOptions },
    Export { key: String, chords: Vec<String>, tempo: Option<u32>, json: bool },
    Save { key: String, name: String, chords: Vec<String> },
    Track { options: PlayOptions },
    Config { init: bool },
    Help,
}

pub fn parse(args: &[String]) -> Result<Command, ArgsError> {
    let Some((command, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };

    let mut positional = Vec::new();
    let mut options = PlayOptions::default();
    let mut sevenths = false;
    let mut json = false;
    let mut init = false;

    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--tempo" => options.tempo = Some(value(&mut iter, "--tempo")?),
            "--octaves" => options.octaves = Some(value(&mut iter, "--octaves")?),
            "--arp" => {
                let name = iter.next().ok_or(ArgsError::Missing("--arp pattern"))?;
                let pattern = ArpPattern::from_name(name).ok_or_else(|| ArgsError::InvalidValue {
                    option: "--arp",
                    value: name.clone(),
                })?;
                options.arp = Some(pattern);
            }
            "--loop" => options.looping = true,
            "--metronome" => options.metronome = true,
            "--sevenths" => sevenths = true,
            "--json" => json = true,
            "--init" => init = true,
            "-h" | "--help" => return Ok(Command::Help),
            flag if flag.starts_with("--") => return Err(ArgsError::UnknownOption(flag.to_string())),
            _ => positional.push(arg.clone()),
        }
    }

    let mut positional = positional.into_iter();
    let positional = &mut positional;

    let command = match command.as_str() {
        "chords" => Command::Chords { key: next(positional, "key")?, sevenths },
        "play" => {
            let key = next(positional, "key")?;
            Command::Play { key, chords: chords(positional)?, options }
        }
        "export" => {
            let key = next(positional, "key")?;
            Command::Export { key, chords: chords(positional)?, tempo: options.tempo, json }
        }
        "save" => {
            let key = next(positional, "key")?;
            let name = next(positional, "block name")?;
            Command::Save { key, name, chords: chords(positional)? }
        }
        "track" => Command::Track { options },
        "config" => Command::Config { init },
        "help" => Command::Help,
        other => return Err(ArgsError::UnknownCommand(other.to_string())),
    };
    Ok(command)
}

fn value<'a, T: std::str::FromStr>(
    iter: &mut impl Iterator<Item = &'a String>,
    option: &'static str,
) -> Result<T, ArgsError> {
    let raw = iter.next().ok_or(ArgsError::Missing(option))?;
    raw.parse().map_err(|_| ArgsError::InvalidValue {
        option,
        value: raw.clone(),
    })
}

fn next(rest: &mut impl Iterator<Item = String>, what: &'static str) -> Result<String, ArgsError> {
    rest.next().ok_or(ArgsError::Missing(what))
}

fn chords(rest: &mut impl Iterator<Item = String>) -> Result<Vec<String>, ArgsError> {
    let chords: Vec<String> = rest.collect();
    if chords.is_empty() {
        return Err(ArgsError::Missing("chords"));
    }
    Ok(chords)
}

/// Turn chord tokens into steps in `tonality`
pub fn parse_steps(tonality: &Tonality, tokens: &[String]) -> Result<Vec<SequenceStep>, ArgsError> {
    tokens.iter().map(|t| parse_step(tonality, t)).collect()
}

fn parse_step(tonality: &Tonality, token: &str) -> Result<SequenceStep, ArgsError> {
    if token == "|" {
        return Ok(SequenceStep::SectionBoundary);
    }

    let (symbol, duration) = match token.rsplit_once(':') {
        Some((symbol, raw)) => {
            let duration: f64 = raw.parse().map_err(|_| ArgsError::InvalidValue {
                option: "duration",
                value: raw.to_string(),
            })?;
            if !(duration.is_finite() && duration > 0.0) {
                return Err(ArgsError::InvalidValue {
                    option: "duration",
                    value: raw.to_string(),
                });
            }
            (symbol, duration)
        }
        None => (token, 1.0),
    };

    if symbol == "%" {
        return Ok(SequenceStep::Rest { duration });
    }

    let chord = match symbol.parse::<u8>() {
        Ok(degree) => tonality
            .degree(degree)
            .map(|d| d.chord())
            .ok_or_else(|| ArgsError::InvalidValue {
                option: "degree",
                value: symbol.to_string(),
            })?,
        Err(_) => Chord::parse_symbol(symbol)?,
    };
    Ok(SequenceStep::Chord { chord, duration })
}
