use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A single column value as it travels between entities and the store.
///
/// Booleans are kept distinct on the way in, but relational backends
/// commonly hand them back as integers, so [`Value::as_bool`] accepts
/// `Integer(0 | 1)` as well. Bytes that are not valid UTF-8 are carried as
/// [`Value::Blob`] so they are written back unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Name of the variant, used in type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_integer(&self) -> Result<i64, TypeError> {
        match self {
            Self::Integer(v) => Ok(*v),
            Self::Bool(b) => Ok(i64::from(*b)),
            other => Err(mismatch("integer", other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, TypeError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Integer(0) => Ok(false),
            Self::Integer(1) => Ok(true),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn as_real(&self) -> Result<f64, TypeError> {
        match self {
            Self::Real(v) => Ok(*v),
            Self::Integer(v) => Ok(*v as f64),
            other => Err(mismatch("real", other)),
        }
    }

    pub fn as_text(&self) -> Result<&str, TypeError> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(mismatch("text", other)),
        }
    }

    pub fn as_blob(&self) -> Result<&[u8], TypeError> {
        match self {
            Self::Blob(b) => Ok(b),
            other => Err(mismatch("blob", other)),
        }
    }

    /// Text or null.
    pub fn as_optional_text(&self) -> Result<Option<&str>, TypeError> {
        match self {
            Self::Null => Ok(None),
            Self::Text(s) => Ok(Some(s)),
            other => Err(mismatch("text or null", other)),
        }
    }
}

fn mismatch(expected: &'static str, found: &Value) -> TypeError {
    TypeError::ValueType {
        expected,
        found: found.type_name(),
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_accepts_integer_storage_form() {
        assert!(Value::Integer(1).as_bool().unwrap());
        assert!(!Value::Integer(0).as_bool().unwrap());
        assert!(Value::Bool(true).as_bool().unwrap());
        assert_eq!(
            Value::Integer(7).as_bool(),
            Err(TypeError::ValueType {
                expected: "bool",
                found: "integer"
            })
        );
    }

    #[test]
    fn text_accessors() {
        let v = Value::from("Burial");
        assert_eq!(v.as_text().unwrap(), "Burial");
        assert_eq!(v.as_optional_text().unwrap(), Some("Burial"));
        assert_eq!(Value::Null.as_optional_text().unwrap(), None);
        assert!(Value::Integer(3).as_text().is_err());
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Integer(5));
    }

    #[test]
    fn json_is_untagged() {
        let values = vec![Value::Null, Value::Bool(true), Value::from("x"), Value::Integer(2)];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,true,"x",2]"#);
    }

    #[test]
    fn blob_accessor() {
        let v = Value::from(vec![0xff, 0x00]);
        assert_eq!(v.as_blob().unwrap(), &[0xff, 0x00]);
        assert_eq!(v.type_name(), "blob");
        assert!(v.as_text().is_err());
        assert!(Value::from("x").as_blob().is_err());
    }
}
