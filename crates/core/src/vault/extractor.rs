//! Metadata extraction: title and date of a note.

use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static FILENAME_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());

/// Title: the first non-empty line when it is a heading, else the file stem.
pub fn extract_title(content: &str, file_path: &Path) -> String {
    let first = content.lines().map(str::trim).find(|line| !line.is_empty());

    if let Some(line) = first
        && let Some(heading) = line.strip_prefix('#')
    {
        let heading = heading.trim_start_matches('#').trim();
        if !heading.is_empty() {
            return heading.to_string();
        }
    }

    file_path.file_stem().and_then(|s| s.to_str()).unwrap_or("Untitled").to_string()
}

/// Date encoded in the file name: `YYYY-MM-DD` anywhere in the stem, or a
/// stem that is exactly `YY-MM-DD`.
pub fn extract_date(file_path: &Path) -> Option<NaiveDate> {
    let stem = file_path.file_stem()?.to_str()?;

    for caps in FILENAME_DATE_RE.captures_iter(stem) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if stem.len() == 8 {
        return NaiveDate::parse_from_str(stem, "%y-%m-%d").ok();
    }

    None
}
