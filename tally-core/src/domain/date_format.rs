//! Token-based date formats (`yyyy-MM-dd`, `dd.MM.yyyy HH:mm`, ...)
//!
//! Bank exports are configured with the familiar letter tokens. They are
//! translated to a chrono format once. A format that already contains `%` is
//! used as a chrono format directly.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A user-facing date format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateFormat(String);

impl DateFormat {
    pub fn new(format: impl Into<String>) -> Self {
        Self(format.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The equivalent chrono format string
    pub fn to_chrono(&self) -> String {
        if self.0.contains('%') {
            return self.0.clone();
        }
        translate_tokens(&self.0)
    }

    /// Parse `text` into a timestamp. Date-only formats yield midnight.
    pub fn parse(&self, text: &str) -> Option<NaiveDateTime> {
        if text.is_empty() {
            return None;
        }
        let format = self.to_chrono();

        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, &format) {
            return Some(datetime);
        }
        NaiveDate::parse_from_str(text, &format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self("yyyy-MM-dd".to_string())
    }
}

fn translate_tokens(format: &str) -> String {
    let chars: Vec<char> = format.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // Quoted literal text: 'T', 'at'
        if c == '\'' {
            let mut j = i + 1;
            while j < chars.len() && chars[j] != '\'' {
                push_literal(&mut out, chars[j]);
                j += 1;
            }
            i = j + 1;
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        let token = match (c, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1) | ('M', 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', _) => Some("%d"),
            ('H', _) => Some("%H"),
            ('h', _) => Some("%I"),
            ('m', _) => Some("%M"),
            ('s', _) => Some("%S"),
            ('S', _) => Some("%3f"),
            ('a', _) => Some("%p"),
            _ => None,
        };

        match token {
            Some(t) => out.push_str(t),
            None => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
            }
        }
        i += run;
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn test_translate() {
        assert_eq!(DateFormat::new("yyyy-MM-dd").to_chrono(), "%Y-%m-%d");
        assert_eq!(DateFormat::new("dd.MM.yy HH:mm:ss").to_chrono(), "%d.%m.%y %H:%M:%S");
        assert_eq!(DateFormat::new("yyyy-MM-dd'T'HH:mm").to_chrono(), "%Y-%m-%dT%H:%M");
        assert_eq!(DateFormat::new("d MMM yyyy").to_chrono(), "%d %b %Y");
    }

    #[test]
    fn test_chrono_format_passthrough() {
        let fmt = DateFormat::new("%m/%d/%Y");
        assert_eq!(fmt.parse("01/02/2024"), Some(ts(2024, 1, 2, 0, 0, 0)));
    }

    #[test]
    fn test_date_only_is_midnight() {
        let fmt = DateFormat::default();
        assert_eq!(fmt.parse("2024-01-02"), Some(ts(2024, 1, 2, 0, 0, 0)));
    }

    #[test]
    fn test_date_time() {
        let fmt = DateFormat::new("dd.MM.yyyy HH:mm");
        assert_eq!(fmt.parse("31.12.2023 17:45"), Some(ts(2023, 12, 31, 17, 45, 0)));
    }

    #[test]
    fn test_mismatch_is_none() {
        let fmt = DateFormat::default();
        assert_eq!(fmt.parse("02/01/2024"), None);
        assert_eq!(fmt.parse(""), None);
        assert_eq!(fmt.parse("2024-02-30"), None);
    }
}
