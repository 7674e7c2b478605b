//! Destination layout: `<root>/<YYYY>/<MM-YY>/<artist>/<file name>`.

use chrono::{Datelike, NaiveDate};
use std::path::{Component, Path, PathBuf};

/// Windows/FAT32 reserved device names that are invalid as directory names.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Year and month a track is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateStamp {
    year: i32,
    month: u32,
}

impl DateStamp {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// `2023` for any date in 2023.
    pub fn year_segment(&self) -> String {
        format!("{:04}", self.year)
    }

    /// `05-23` for May 2023, `11-23` for November 2023.
    pub fn month_segment(&self) -> String {
        format!("{:02}-{:02}", self.month, self.year.rem_euclid(100))
    }
}

/// Make a tag value usable as a single directory name.
///
/// Path separators become `-`, characters Windows forbids and control
/// characters are dropped, whitespace is collapsed, and leading/trailing
/// dots and spaces are trimmed. Reserved device names get a `_` prefix.
/// Returns `None` when nothing usable is left.
pub fn sanitize_segment(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());

    for c in s.chars() {
        match c {
            '/' | '\\' => out.push('-'),
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => {}
            c if c.is_control() => {}
            _ => out.push(c),
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");

    let trimmed = collapsed
        .trim_matches(|c: char| c == '.' || c == ' ')
        .to_string();

    if trimmed.is_empty() {
        return None;
    }

    if RESERVED_NAMES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(&trimmed))
    {
        return Some(format!("_{}", trimmed));
    }

    Some(trimmed)
}

/// Directory a track by `artist` belongs in, without the file name.
pub fn artist_dir(root: &Path, date: DateStamp, artist: &str) -> Option<PathBuf> {
    let artist = sanitize_segment(artist)?;
    Some(
        root.join(date.year_segment())
            .join(date.month_segment())
            .join(artist),
    )
}

/// Full destination for `source`, keeping its file name.
pub fn destination_for(
    root: &Path,
    date: DateStamp,
    artist: &str,
    source: &Path,
) -> Option<PathBuf> {
    let file_name = source.file_name()?;
    Some(artist_dir(root, date, artist)?.join(file_name))
}

/// Segments recovered from a path laid out under `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDestination {
    pub year: String,
    pub month: String,
    pub artist: String,
    pub file_name: String,
}

/// Split a placed path back into its year, month, artist and file name.
pub fn parse_destination(root: &Path, path: &Path) -> Option<ParsedDestination> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = relative.components().map(|c| match c {
        Component::Normal(s) => s.to_str(),
        _ => None,
    });

    let year = parts.next()??.to_string();
    let month = parts.next()??.to_string();
    let artist = parts.next()??.to_string();
    let file_name = parts.next()??.to_string();
    if parts.next().is_some() {
        return None;
    }

    Some(ParsedDestination {
        year,
        month,
        artist,
        file_name,
    })
}
