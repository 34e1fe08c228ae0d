//! Response envelope and payload types of the Dog CEO API

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use qa_common::{QaError, QaResult};

static IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://.+\.(jpg|jpeg|png|gif|webp)$").expect("valid image url pattern")
});

static BREED_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"breeds/([^/]+)").expect("valid breed segment pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Success,
    Error,
}

/// The `{status, message}` wrapper shared by every endpoint.
///
/// `message` is kept as raw JSON: its shape depends on the endpoint and is
/// checked by the validators.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub status: ApiStatus,
    pub message: Value,
}

impl Envelope {
    pub fn from_value(body: Value) -> QaResult<Self> {
        let Value::Object(mut fields) = body else {
            return Err(QaError::assertion("body", "JSON object", kind_of(&body)));
        };

        let status = match fields.get("status") {
            Some(Value::String(s)) if s == "success" => ApiStatus::Success,
            Some(Value::String(s)) if s == "error" => ApiStatus::Error,
            Some(other) => {
                return Err(QaError::assertion(
                    "status",
                    "\"success\" or \"error\"",
                    other,
                ))
            }
            None => return Err(QaError::assertion("status", "present", "missing")),
        };

        let message = fields
            .remove("message")
            .ok_or_else(|| QaError::assertion("message", "present", "missing"))?;

        Ok(Self { status, message })
    }
}

/// Breed name → sub-breed names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreedMap(BTreeMap<String, Vec<String>>);

impl BreedMap {
    /// Decode a `message` object, citing the first offending entry
    pub fn from_message(message: &Value) -> QaResult<Self> {
        let Value::Object(entries) = message else {
            return Err(QaError::assertion("message", "object", kind_of(message)));
        };

        let mut breeds = BTreeMap::new();
        for (breed, subs) in entries {
            if breed.trim().is_empty() {
                return Err(QaError::assertion("message key", "non-empty breed name", "\"\""));
            }
            let Value::Array(items) = subs else {
                return Err(QaError::assertion(
                    format!("message.{}", breed),
                    "array",
                    kind_of(subs),
                ));
            };
            let mut names = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) => names.push(s.clone()),
                    other => {
                        return Err(QaError::assertion(
                            format!("message.{}[{}]", breed, i),
                            "string",
                            kind_of(other),
                        ))
                    }
                }
            }
            breeds.insert(breed.clone(), names);
        }
        Ok(Self(breeds))
    }

    pub fn sub_breeds(&self, breed: &str) -> Option<&[String]> {
        self.0.get(breed).map(Vec::as_slice)
    }

    pub fn contains(&self, breed: &str) -> bool {
        self.0.contains_key(breed)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An absolute HTTP(S) URL pointing at an image file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageUrl(String);

impl ImageUrl {
    pub fn parse(url: &str) -> QaResult<Self> {
        if IMAGE_URL.is_match(url) {
            Ok(Self(url.to_string()))
        } else {
            Err(QaError::assertion("image url", IMAGE_URL.as_str(), format!("{:?}", url)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segment after `breeds/`, e.g. `hound-afghan`
    pub fn breed_segment(&self) -> Option<&str> {
        BREED_SEGMENT
            .captures(&self.0)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

impl std::fmt::Display for ImageUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short JSON type name for assertion messages
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
