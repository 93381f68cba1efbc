//! Camelot-wheel key parsing and harmonic compatibility scoring.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CamelotError {
    #[error("invalid camelot key: {0:?}")]
    InvalidKey(String),
}

/// Minor (`A`) or major (`B`) half of the wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Minor,
    Major,
}

impl Mode {
    fn letter(self) -> char {
        match self {
            Mode::Minor => 'A',
            Mode::Major => 'B',
        }
    }
}

/// A parsed Camelot key, e.g. `8A`. `number` is always in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CamelotKey {
    pub number: u8,
    pub mode: Mode,
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.mode.letter())
    }
}

/// Standard Camelot-wheel mapping, indexed by pitch class 0..11 (C=0).
/// `MINOR_TABLE[pc]` / `MAJOR_TABLE[pc]` give the wheel number for that
/// pitch class's minor / major key.
const MINOR_TABLE: [u8; 12] = [5, 12, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10];
const MAJOR_TABLE: [u8; 12] = [8, 3, 10, 5, 12, 7, 2, 9, 4, 11, 6, 1];

/// Parse a Camelot key string like `"8A"` or `"12B"`.
pub fn parse(key: &str) -> Result<CamelotKey, CamelotError> {
    let key = key.trim();
    let (digits, letter) = key.split_at(key.len().saturating_sub(1));
    let mode = match letter {
        "A" | "a" => Mode::Minor,
        "B" | "b" => Mode::Major,
        _ => return Err(CamelotError::InvalidKey(key.to_string())),
    };
    let number: u8 = digits
        .parse()
        .map_err(|_| CamelotError::InvalidKey(key.to_string()))?;
    if !(1..=12).contains(&number) {
        return Err(CamelotError::InvalidKey(key.to_string()));
    }
    Ok(CamelotKey { number, mode })
}

/// Map a detected (pitch class, mode) pair to its Camelot key.
/// `pc` is 0..11 with C=0; `mode` is 0=minor, 1=major.
pub fn from_pitch_class_mode(pc: u8, mode: u8) -> CamelotKey {
    let pc = (pc % 12) as usize;
    match mode {
        1 => CamelotKey {
            number: MAJOR_TABLE[pc],
            mode: Mode::Major,
        },
        _ => CamelotKey {
            number: MINOR_TABLE[pc],
            mode: Mode::Minor,
        },
    }
}

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Traditional note-name notation for a Camelot key (e.g. `8A` -> `Am`),
/// inverting [`from_pitch_class_mode`]'s table.
pub fn traditional_notation(key: &CamelotKey) -> String {
    let table = match key.mode {
        Mode::Minor => &MINOR_TABLE,
        Mode::Major => &MAJOR_TABLE,
    };
    let pc = table.iter().position(|&n| n == key.number).unwrap_or(0);
    match key.mode {
        Mode::Minor => format!("{}m", NOTE_NAMES[pc]),
        Mode::Major => NOTE_NAMES[pc].to_string(),
    }
}

/// Score how well two Camelot keys mix, 0..100. Unparseable keys degrade
/// to a neutral 50 rather than failing the caller.
pub fn compatibility_score(a: &str, b: &str) -> u8 {
    let (a, b) = match (parse(a), parse(b)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return 50,
    };
    score_keys(&a, &b)
}

fn score_keys(a: &CamelotKey, b: &CamelotKey) -> u8 {
    if a == b {
        return 100;
    }
    if a.number == b.number {
        return 90; // relative major/minor
    }
    if a.mode != b.mode {
        return 30;
    }
    let diff = (b.number as i16 - a.number as i16).rem_euclid(12);
    match diff {
        1 | 11 => 85,
        5 | 7 => 75, // +/-7: energy boost
        2 | 10 => 60,
        _ => 30,
    }
}

/// `areCompatible(a, b) ≡ score ≥ 75`.
pub fn are_compatible(a: &str, b: &str) -> bool {
    compatibility_score(a, b) >= 75
}

/// Short human label for a transition between two keys.
pub fn describe_transition(a: &str, b: &str) -> String {
    let score = compatibility_score(a, b);
    let (pa, pb) = (parse(a), parse(b));
    match (pa, pb) {
        (Ok(a), Ok(b)) if a == b => format!("same key ({a})"),
        (Ok(a), Ok(b)) if a.number == b.number => format!("relative {a} \u{2192} {b}"),
        (Ok(a), Ok(b)) if score >= 85 => format!("adjacent wheel move {a} \u{2192} {b}"),
        (Ok(a), Ok(b)) if score >= 75 => format!("energy boost {a} \u{2192} {b}"),
        (Ok(a), Ok(b)) if score >= 60 => format!("compatible {a} \u{2192} {b}"),
        (Ok(a), Ok(b)) => format!("key change {a} \u{2192} {b}"),
        _ => "unknown key relationship".to_string(),
    }
}
