//! Enrich tag syntax: `key[,modifier]`

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Modifier {
    #[default]
    Optional,
    /// The value must be present; an empty value is accepted
    Required,
    /// The value must be present and non-empty (non-zero for integers)
    NotEmpty,
}

impl Modifier {
    pub fn requires_value(&self) -> bool {
        matches!(self, Modifier::Required | Modifier::NotEmpty)
    }
}

/// Source key plus modifier for one bound field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub modifier: Modifier,
}

impl Tag {
    /// Parse `key`, `key,required` or `key,notEmpty`
    ///
    /// Whitespace after the comma is ignored; whitespace before it is rejected.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTag(raw.to_string());

        let (key, modifier) = match raw.split_once(',') {
            None => (raw, Modifier::Optional),
            Some((key, modifier)) => {
                if key.ends_with(char::is_whitespace) {
                    return Err(invalid());
                }
                let modifier = match modifier.trim() {
                    "required" => Modifier::Required,
                    "notEmpty" => Modifier::NotEmpty,
                    _ => return Err(invalid()),
                };
                (key, modifier)
            }
        };

        if key.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            key: key.to_string(),
            modifier,
        })
    }

    pub fn is_not_empty(&self) -> bool {
        self.modifier == Modifier::NotEmpty
    }
}

impl FromStr for Tag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            Modifier::Optional => write!(f, "{}", self.key),
            Modifier::Required => write!(f, "{},required", self.key),
            Modifier::NotEmpty => write!(f, "{},notEmpty", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key() {
        let tag = Tag::parse("X-Supplier-Id").unwrap();
        assert_eq!(tag.key, "X-Supplier-Id");
        assert_eq!(tag.modifier, Modifier::Optional);
        assert!(!tag.modifier.requires_value());
    }

    #[test]
    fn test_modifiers_with_optional_space_after_comma() {
        assert_eq!(Tag::parse("id,required").unwrap().modifier, Modifier::Required);
        assert_eq!(Tag::parse("id, required").unwrap().modifier, Modifier::Required);
        assert_eq!(Tag::parse("id,notEmpty").unwrap().modifier, Modifier::NotEmpty);
        assert_eq!(Tag::parse("id,\tnotEmpty ").unwrap().key, "id");
    }

    #[test]
    fn test_syntax_errors() {
        for raw in ["id ,required", "id,optional", "id,", ",required", "", "id,NotEmpty"] {
            assert_eq!(
                Tag::parse(raw),
                Err(ConfigError::InvalidTag(raw.to_string())),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_round_trips() {
        for raw in ["a", "a,required", "a,notEmpty"] {
            assert_eq!(raw.parse::<Tag>().unwrap().to_string(), raw);
        }
    }
}
