use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static NOT_NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(0[1-9]|1[012])-(0[1-9]|[12]\d|3[01])\b").unwrap()
});

/// Maps an ISO 639-2 code of an official EU language to its ISO 639-1 code.
pub fn alpha3_to_alpha2(code: &str) -> Option<&'static str> {
    let alpha2 = match code {
        "bul" => "bg",
        "ces" => "cs",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "gle" => "ga",
        "hrv" => "hr",
        "hun" => "hu",
        "ita" => "it",
        "lav" => "lv",
        "lit" => "lt",
        "mlt" => "mt",
        "nld" => "nl",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "slk" => "sk",
        "slv" => "sl",
        "spa" => "es",
        "swe" => "sv",
        _ => return None,
    };
    Some(alpha2)
}

/// Returns the percent-decoded file stem of an absolute URL.
pub fn url_stem(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = percent_decode(last);
    let stem = match decoded.rfind('.') {
        Some(0) | None => decoded.as_str(),
        Some(pos) => &decoded[..pos],
    };
    Some(stem.to_string())
}

fn percent_decode(input: &str) -> String {
    url::form_urlencoded::parse(format!("x={}", input.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| input.to_string())
}

/// Language code from the last `-` or `_` separated part of a file stem.
pub fn language_from_stem(stem: &str) -> Option<String> {
    let normalized = stem.replace('_', "-");
    let last = normalized.rsplit('-').next()?;
    if last.is_empty() || !last.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let lower = last.to_ascii_lowercase();
    match lower.len() {
        2 => Some(lower),
        3 => alpha3_to_alpha2(&lower).map(str::to_string),
        _ => None,
    }
}

/// Fixes language codes commonly confused with country codes.
pub fn correct_language_code(language: Option<String>, country: Option<&str>) -> Option<String> {
    let language = language?;
    let fixed = match (country, language.as_str()) {
        (Some("CZ"), "cz") => "cs",
        (Some("SE"), "se") => "sv",
        (Some("DK"), "dk") => "da",
        (Some("NO"), "nb" | "nn") => "no",
        _ => return Some(language),
    };
    Some(fixed.to_string())
}

/// Last valid `YYYY-MM-DD` date token found in a file stem.
pub fn date_from_stem(stem: &str) -> Option<NaiveDate> {
    let normalized = NOT_NUM_RE.replace_all(stem, "-");
    let caps = DATE_RE.captures_iter(&normalized).last()?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Short human readable form of a reporting date.
pub fn simple_filing_date(date: NaiveDate) -> String {
    if date.month() == 12 && date.day() == 31 {
        return date.year().to_string();
    }
    match date.succ_opt() {
        Some(next) if next.month() != date.month() => date.format("%b-%Y").to_string(),
        _ => date.to_string(),
    }
}
