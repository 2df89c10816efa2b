// Period labels ("enero 2025", "Mar-2025", "2025-03-01") to sortable keys.
use crate::util::normalize_text;
use serde::{Serialize, Serializer};
use std::fmt;

pub const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

const MONTHS_EN: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const MONTH_ALIAS: [(&str, u32); 13] = [
    ("ene", 1),
    ("feb", 2),
    ("mar", 3),
    ("abr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("ago", 8),
    ("sep", 9),
    ("set", 9),
    ("oct", 10),
    ("nov", 11),
    ("dic", 12),
];

const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2100;

/// Chronological key of a period label.
///
/// Ordering is by `year * 100 + month`; every `Unparseable` key sorts after
/// all valid months (and by label among themselves).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodKey {
    Month { year: i32, month: u32 },
    Unparseable(String),
}

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && YEAR_RANGE.contains(&year) {
            Some(PeriodKey::Month { year, month })
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, PeriodKey::Month { .. })
    }

    /// `year * 100 + month`, `None` for unparseable labels.
    pub fn sort_value(&self) -> Option<i32> {
        match self {
            PeriodKey::Month { year, month } => Some(year * 100 + *month as i32),
            PeriodKey::Unparseable(_) => None,
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Month { year, month } => {
                write!(f, "{} {}", MONTHS_ES[(*month as usize) - 1], year)
            }
            PeriodKey::Unparseable(label) if label.is_empty() => write!(f, "sin fecha"),
            PeriodKey::Unparseable(label) => f.write_str(label),
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn month_from_token(token: &str) -> Option<u32> {
    if let Some(idx) = MONTHS_ES.iter().position(|m| *m == token) {
        return Some(idx as u32 + 1);
    }
    if let Some(idx) = MONTHS_EN.iter().position(|m| *m == token) {
        return Some(idx as u32 + 1);
    }
    if let Some((_, m)) = MONTH_ALIAS.iter().find(|(alias, _)| *alias == token) {
        return Some(*m);
    }
    if token.len() <= 2 && token.chars().all(|c| c.is_ascii_digit()) {
        return token.parse::<u32>().ok().filter(|m| (1..=12).contains(m));
    }
    None
}

fn year_from_token(token: &str) -> Option<i32> {
    if token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()) {
        token.parse::<i32>().ok()
    } else {
        None
    }
}

/// Parse a free-text period label. Never fails: labels that are not a
/// month plus a four-digit year come back as `PeriodKey::Unparseable`
/// holding the trimmed source text.
pub fn parse_period(label: &str) -> PeriodKey {
    let unparseable = || PeriodKey::Unparseable(label.trim().to_string());
    let norm = normalize_text(label);
    if norm.is_empty() {
        return unparseable();
    }

    // ISO dates and months: 2025-03, 2025-03-01, 2025-03-01t00:00:00
    let iso: Vec<&str> = norm
        .split(|c: char| c == '-' || c == '/' || c == 't' || c == ' ')
        .filter(|t| !t.is_empty())
        .collect();
    if iso.len() >= 2 {
        if let (Some(year), true) = (year_from_token(iso[0]), iso[1].len() <= 2) {
            return iso[1]
                .parse::<u32>()
                .ok()
                .and_then(|m| PeriodKey::new(year, m))
                .unwrap_or_else(unparseable);
        }
    }

    let tokens: Vec<&str> = norm
        .split(|c: char| c == '-' || c == '/' || c == ' ')
        .filter(|t| !t.is_empty())
        .collect();
    match tokens.as_slice() {
        [month, year] => match (month_from_token(month), year_from_token(year)) {
            (Some(m), Some(y)) => PeriodKey::new(y, m).unwrap_or_else(unparseable),
            _ => unparseable(),
        },
        _ => unparseable(),
    }
}
