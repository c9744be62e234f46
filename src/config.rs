//! Parse-time configuration, deserializable from TOML or JSON the way the
//! dump-file importer this crate's grammar was distilled from loads its own
//! CSV options.

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;

use crate::error::{ParseError, Result};

/// A field that accepts either a bare string or a list of strings in the
/// source document, always normalized to a list internally.
///
/// Mirrors `StringOrStringSlice` from the original Go configuration loader:
/// a lone `null = "\\N"` and a `null = ["\\N", ""]` must both deserialize
/// cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringOrStringSlice(pub Vec<String>);

impl<'de> Deserialize<'de> for StringOrStringSlice {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StringOrVec;

        impl<'de> Visitor<'de> for StringOrVec {
            type Value = StringOrStringSlice;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or a list of strings")
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(StringOrStringSlice(vec![v.to_owned()]))
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut out = Vec::new();
                while let Some(elem) = seq.next_element::<String>()? {
                    out.push(elem);
                }
                Ok(StringOrStringSlice(out))
            }
        }

        deserializer.deserialize_any(StringOrVec)
    }
}

fn default_separator() -> String {
    ",".to_owned()
}

fn default_backslash_escape() -> bool {
    true
}

/// Immutable parser configuration.
///
/// Field names mirror the configuration surface's external keys via
/// `#[serde(rename = "...")]` so the struct can be deserialized directly
/// from a TOML/JSON document using those kebab-case keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "separator", default = "default_separator")]
    pub separator: String,

    #[serde(rename = "delimiter", default)]
    pub delimiter: String,

    #[serde(rename = "terminator", default)]
    pub terminator: String,

    #[serde(rename = "null", default)]
    pub null_tokens: StringOrStringSlice,

    #[serde(rename = "header", default)]
    pub header: bool,

    /// Reserved for the downstream consumer; this crate does not act on it.
    #[serde(rename = "header-schema-match", default)]
    pub header_schema_match: bool,

    #[serde(rename = "trim-last-separator", default)]
    pub trim_last_sep: bool,

    #[serde(rename = "not-null", default)]
    pub not_null: bool,

    #[serde(rename = "backslash-escape", default = "default_backslash_escape")]
    pub backslash_escape: bool,

    #[serde(rename = "escaped-by", default)]
    pub escaped_by: String,

    #[serde(rename = "starting-by", default)]
    pub starting_by: String,

    #[serde(rename = "allow-empty-line", default)]
    pub allow_empty_line: bool,

    #[serde(rename = "quoted-null-is-text", default)]
    pub quoted_null_is_text: bool,

    #[serde(rename = "unescaped-quote", default)]
    pub unescaped_quote: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            separator: default_separator(),
            delimiter: String::new(),
            terminator: String::new(),
            null_tokens: StringOrStringSlice::default(),
            header: false,
            header_schema_match: false,
            trim_last_sep: false,
            not_null: false,
            backslash_escape: default_backslash_escape(),
            escaped_by: String::new(),
            starting_by: String::new(),
            allow_empty_line: false,
            quoted_null_is_text: false,
            unescaped_quote: false,
        }
    }
}

impl Config {
    /// Resolves the effective escape character: `escaped-by` wins outright,
    /// otherwise `backslash-escape` supplies a literal `\`, otherwise there
    /// is no escape character at all.
    pub fn escape_char(&self) -> Option<u8> {
        if !self.escaped_by.is_empty() {
            self.escaped_by.as_bytes().first().copied()
        } else if self.backslash_escape {
            Some(b'\\')
        } else {
            None
        }
    }

    /// Validates the configuration, returning `InvalidConfig` on anything
    /// the grammar can't make sense of. Called once at `Parser` construction.
    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(ParseError::InvalidConfig {
                reason: "separator must not be empty".to_owned(),
            });
        }
        if self.escaped_by.len() > 1 {
            return Err(ParseError::InvalidConfig {
                reason: "escaped-by must be at most one byte".to_owned(),
            });
        }
        Ok(())
    }

    pub(crate) fn null_tokens_bytes(&self) -> Vec<Vec<u8>> {
        self.null_tokens
            .0
            .iter()
            .map(|s| s.as_bytes().to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_comma_separated_no_quoting() {
        let cfg = Config::default();
        assert_eq!(cfg.separator, ",");
        assert!(cfg.delimiter.is_empty());
        assert_eq!(cfg.escape_char(), Some(b'\\'));
    }

    #[test]
    fn empty_separator_is_rejected() {
        let mut cfg = Config::default();
        cfg.separator.clear();
        assert!(matches!(
            cfg.validate(),
            Err(ParseError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn escaped_by_overrides_backslash_escape() {
        let mut cfg = Config::default();
        cfg.escaped_by = "!".to_owned();
        assert_eq!(cfg.escape_char(), Some(b'!'));
    }

    #[test]
    fn backslash_escape_false_with_no_escaped_by_disables_escaping() {
        let mut cfg = Config::default();
        cfg.backslash_escape = false;
        assert_eq!(cfg.escape_char(), None);
    }

    #[test]
    fn string_or_string_slice_accepts_bare_string() {
        let v: StringOrStringSlice = serde_json::from_str(r#""\\N""#).unwrap();
        assert_eq!(v.0, vec!["\\N".to_owned()]);
    }

    #[test]
    fn string_or_string_slice_accepts_list() {
        let v: StringOrStringSlice = serde_json::from_str(r#"["\\N", ""]"#).unwrap();
        assert_eq!(v.0, vec!["\\N".to_owned(), String::new()]);
    }

    #[test]
    fn config_deserializes_from_toml() {
        let cfg: Config = toml::from_str(
            r#"
            separator = "|"
            trim-last-separator = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.separator, "|");
        assert!(cfg.trim_last_sep);
        assert!(cfg.delimiter.is_empty());
    }

    #[test]
    fn config_deserializes_null_as_bare_string_from_json() {
        let cfg: Config = serde_json::from_str(r#"{"separator": ",", "null": "\\N"}"#).unwrap();
        assert_eq!(cfg.null_tokens.0, vec!["\\N".to_owned()]);
    }
}
