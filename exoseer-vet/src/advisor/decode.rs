//! Decoding of free-form advisor replies into typed structures

use serde::de::DeserializeOwned;
use serde_json::error::Category;
use thiserror::Error;

/// Semantic check applied after a reply has been deserialized
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("reply contains no JSON object")]
    NoJsonObject,

    #[error("reply is not valid JSON: {0}")]
    Syntax(String),

    #[error("reply does not match the expected shape: {0}")]
    Schema(String),

    #[error("reply failed validation: {0}")]
    Invalid(String),
}

/// Locate the outermost JSON object in `raw`, ignoring prose and code fences
pub fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Extract, deserialize and validate an advisor reply
pub fn decode<T>(raw: &str) -> Result<T, DecodeError>
where
    T: DeserializeOwned + Validate,
{
    let object = extract_json(raw).ok_or(DecodeError::NoJsonObject)?;

    let value: T = serde_json::from_str(object).map_err(|e| match e.classify() {
        Category::Data => DecodeError::Schema(e.to_string()),
        _ => DecodeError::Syntax(e.to_string()),
    })?;

    value.validate().map_err(DecodeError::Invalid)?;
    Ok(value)
}

/// Probability-like value check shared by reply validators
pub(crate) fn check_unit(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{} = {} is outside [0, 1]", name, value))
    }
}

/// Finite, non-negative check shared by reply validators
pub(crate) fn check_non_negative(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{} = {} must be finite and non-negative", name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Pair {
        a: f64,
        b: f64,
    }

    impl Validate for Pair {
        fn validate(&self) -> Result<(), String> {
            check_non_negative("a", self.a)?;
            check_non_negative("b", self.b)
        }
    }

    #[test]
    fn test_extract_json_from_prose() {
        let raw = "Sure! Here is the result:\n```json\n{\"a\": 1, \"b\": {\"c\": 2}}\n```\nHope it helps.";
        assert_eq!(extract_json(raw), Some("{\"a\": 1, \"b\": {\"c\": 2}}"));
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_decode_error_categories() {
        assert_eq!(decode::<Pair>("nothing").unwrap_err(), DecodeError::NoJsonObject);
        assert!(matches!(decode::<Pair>("{\"a\": 1,}"), Err(DecodeError::Syntax(_))));
        assert!(matches!(decode::<Pair>("{\"a\": 1}"), Err(DecodeError::Schema(_))));
        assert!(matches!(
            decode::<Pair>("{\"a\": 1, \"b\": -2}"),
            Err(DecodeError::Invalid(_))
        ));
    }

    #[test]
    fn test_decode_valid_reply() {
        let pair = decode::<Pair>("{\"a\": 0.5, \"b\": 2}").unwrap();
        assert_eq!(pair.a, 0.5);
        assert_eq!(pair.b, 2.0);
    }

    #[test]
    fn test_check_unit_rejects_nan() {
        assert!(check_unit("p", f64::NAN).is_err());
        assert!(check_unit("p", 1.0).is_ok());
    }
}
