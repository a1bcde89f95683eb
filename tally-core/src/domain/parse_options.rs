//! Parse options - the per-field text cleanup applied to every raw column value
//!
//! A `ParseOptions` value can only be built from a regex that compiles, so an
//! invalid user pattern is rejected when the profile is edited or loaded and
//! `apply` never has to deal with it.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Serialized form of [`ParseOptions`] as stored in import profiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOptionsSpec {
    #[serde(default = "default_trim")]
    pub trim_whitespace: bool,
    /// Regex source; empty means "no regex"
    #[serde(default)]
    pub regex: String,
    /// Replacement pattern with `{0}`, `{1}`, ... capture tokens
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_trim() -> bool {
    true
}

fn default_pattern() -> String {
    "{0}".to_string()
}

impl Default for ParseOptionsSpec {
    fn default() -> Self {
        Self {
            trim_whitespace: default_trim(),
            regex: String::new(),
            pattern: default_pattern(),
        }
    }
}

/// Trim and/or regex-capture-to-pattern substitution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ParseOptionsSpec", into = "ParseOptionsSpec")]
pub struct ParseOptions {
    trim_whitespace: bool,
    pattern: String,
    regex: Option<Regex>,
}

impl ParseOptions {
    /// Build parse options, compiling `regex` if non-empty
    pub fn new(trim_whitespace: bool, regex: &str, pattern: impl Into<String>) -> Result<Self> {
        let regex = if regex.is_empty() {
            None
        } else {
            let compiled = Regex::new(regex)
                .map_err(|e| Error::config(format!("invalid regex '{}': {}", regex, e)))?;
            Some(compiled)
        };

        Ok(Self {
            trim_whitespace,
            pattern: pattern.into(),
            regex,
        })
    }

    /// Options that only trim surrounding whitespace
    pub fn trim() -> Self {
        Self {
            trim_whitespace: true,
            pattern: default_pattern(),
            regex: None,
        }
    }

    /// Options that pass the input through untouched
    pub fn identity() -> Self {
        Self {
            trim_whitespace: false,
            pattern: default_pattern(),
            regex: None,
        }
    }

    pub fn trim_whitespace(&self) -> bool {
        self.trim_whitespace
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    /// Apply the options to a raw value. Absent input is treated as `""`.
    ///
    /// With a regex: no match yields `""`, a match substitutes `{0}` (whole
    /// match) and `{n}` (capture group n) into the pattern. Tokens past the
    /// last group are kept literally. Trimming happens last.
    pub fn apply(&self, input: Option<&str>) -> String {
        let input = input.unwrap_or("");

        let output = match &self.regex {
            Some(regex) => match regex.captures(input) {
                Some(captures) => substitute(&self.pattern, &captures),
                None => String::new(),
            },
            None => input.to_string(),
        };

        if self.trim_whitespace {
            output.trim().to_string()
        } else {
            output
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::trim()
    }
}

impl PartialEq for ParseOptions {
    fn eq(&self, other: &Self) -> bool {
        self.trim_whitespace == other.trim_whitespace
            && self.pattern == other.pattern
            && self.regex.as_ref().map(Regex::as_str) == other.regex.as_ref().map(Regex::as_str)
    }
}

impl TryFrom<ParseOptionsSpec> for ParseOptions {
    type Error = Error;

    fn try_from(spec: ParseOptionsSpec) -> Result<Self> {
        Self::new(spec.trim_whitespace, &spec.regex, spec.pattern)
    }
}

impl From<ParseOptions> for ParseOptionsSpec {
    fn from(options: ParseOptions) -> Self {
        Self {
            trim_whitespace: options.trim_whitespace,
            regex: options
                .regex
                .as_ref()
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            pattern: options.pattern,
        }
    }
}

/// Replace `{n}` tokens in `pattern` with capture group n
fn substitute(pattern: &str, captures: &regex::Captures<'_>) -> String {
    let mut output = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let token = after
            .find('}')
            .map(|close| (&after[..close], close))
            .filter(|(digits, _)| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));

        match token {
            Some((digits, close)) => {
                match digits.parse::<usize>().ok().filter(|&n| n < captures.len()) {
                    Some(group) => {
                        output.push_str(captures.get(group).map_or("", |m| m.as_str()));
                    }
                    None => {
                        output.push('{');
                        output.push_str(digits);
                        output.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                output.push('{');
                rest = after;
            }
        }
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_only() {
        let opts = ParseOptions::trim();
        assert_eq!(opts.apply(Some("  Groceries \t")), "Groceries");
        assert_eq!(opts.apply(None), "");
    }

    #[test]
    fn test_trim_is_idempotent() {
        let opts = ParseOptions::trim();
        for input in ["", "  a  ", "a b", "\n x\n", "plain"] {
            let once = opts.apply(Some(input));
            assert_eq!(opts.apply(Some(&once)), once);
        }
    }

    #[test]
    fn test_identity_keeps_whitespace() {
        let opts = ParseOptions::identity();
        assert_eq!(opts.apply(Some("  x ")), "  x ");
    }

    #[test]
    fn test_regex_substitution() {
        let opts = ParseOptions::new(true, r"(\d{2})\.(\d{2})\.(\d{4})", "{3}-{2}-{1}").unwrap();
        assert_eq!(opts.apply(Some("Booked 02.01.2024 ")), "2024-01-02");
    }

    #[test]
    fn test_regex_no_match_is_empty() {
        let opts = ParseOptions::new(true, r"^IBAN: (\w+)$", "{1}").unwrap();
        assert_eq!(opts.apply(Some("no iban here")), "");
    }

    #[test]
    fn test_whole_match_token() {
        let opts = ParseOptions::new(false, r"[A-Z]{2}\d{2}", "<{0}>").unwrap();
        assert_eq!(opts.apply(Some("acct NL91 x")), "<NL91>");
    }

    #[test]
    fn test_tokens_beyond_groups_stay_literal() {
        let opts = ParseOptions::new(false, r"(a)(b)", "{1}{2}{3}{9}").unwrap();
        assert_eq!(opts.apply(Some("ab")), "ab{3}{9}");
    }

    #[test]
    fn test_non_participating_group_is_empty() {
        let opts = ParseOptions::new(false, r"(x)?(y)", "[{1}][{2}]").unwrap();
        assert_eq!(opts.apply(Some("y")), "[][y]");
    }

    #[test]
    fn test_braces_without_digits_are_literal() {
        let opts = ParseOptions::new(false, r"(\w+)", "{name} {1} {").unwrap();
        assert_eq!(opts.apply(Some("foo")), "{name} foo {");
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let err = ParseOptions::new(true, r"(unclosed", "{1}").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_deserialize_rejects_invalid_regex() {
        let json = r#"{"trimWhitespace": true, "regex": "[a-", "pattern": "{0}"}"#;
        assert!(serde_json::from_str::<ParseOptions>(json).is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_regex_source() {
        let opts = ParseOptions::new(false, r"(\d+)", "#{1}").unwrap();
        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains(r#""regex":"(\\d+)""#));
        let back: ParseOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, opts);
    }

    #[test]
    fn test_defaults_from_empty_object() {
        let opts: ParseOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, ParseOptions::trim());
    }
}
