//! Core types used within a [crate::descriptor::Descriptor].
//!
//! These have value validation, so their inner value is private.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("got {value:?} which is not {expected}")]
pub struct ValueError {
    pub value: String,
    pub expected: &'static str,
}

/// Unique identifier of an input, group, or output within a
/// [crate::descriptor::Descriptor].
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct InputId(String);

impl InputId {
    const EXPECTED: &str = r#"an identifier string matching ^[0-9a-zA-Z_]+$"#;

    #[cfg(any(test, feature = "testing"))]
    pub fn test_id(s: &str) -> Self {
        s.try_into().expect("expected valid InputId value")
    }

    fn valid_regex() -> &'static lazy_regex::Regex {
        lazy_regex::regex!(r#"^[0-9a-zA-Z_]+$"#)
    }

    fn try_from_string<S>(value: S) -> Result<Self, S>
    where
        S: Into<String> + AsRef<str>,
    {
        if Self::valid_regex().is_match(value.as_ref()) {
            Ok(Self(value.into()))
        } else {
            Err(value)
        }
    }
}

impl From<&InputId> for InputId {
    fn from(value: &InputId) -> Self {
        value.clone()
    }
}

impl TryFrom<&str> for InputId {
    type Error = ValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from_string(value).map_err(|value| ValueError {
            value: value.to_string(),
            expected: Self::EXPECTED,
        })
    }
}

impl TryFrom<String> for InputId {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from_string(value).map_err(|value| ValueError {
            value,
            expected: Self::EXPECTED,
        })
    }
}

impl<'de> Deserialize<'de> for InputId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        Self::try_from_string(s).map_err(|s| {
            serde::de::Error::invalid_value(serde::de::Unexpected::Str(&s), &Self::EXPECTED)
        })
    }
}

impl AsRef<str> for InputId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InputId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    #[gtest]
    fn test_accepts_valid_ids() {
        expect_that!(InputId::try_from("infile"), ok(anything()));
        expect_that!(InputId::try_from("in_file_2"), ok(anything()));
        expect_that!(InputId::try_from("X"), ok(anything()));
    }

    #[gtest]
    fn test_rejects_invalid_ids() {
        expect_that!(InputId::try_from(""), err(anything()));
        expect_that!(InputId::try_from("in-file"), err(anything()));
        expect_that!(InputId::try_from("in file"), err(anything()));
        expect_that!(InputId::try_from("[INFILE]"), err(anything()));
    }

    #[gtest]
    fn test_rejects_invalid_id_when_deserializing() {
        let result: Result<InputId, _> = serde_json::from_str(r#""in file""#);
        expect_that!(result, err(anything()));
    }
}
