//! XML-RPC faults.
//!
//! A fault response carries a struct with exactly two interesting members,
//! `faultCode` and `faultString`. The server uses them for every rejected
//! call (unknown method, bad arguments, permission denied) and the client
//! surfaces them as [`GbxError::Fault`] without retrying.

use serde::{Deserialize, Serialize};

use crate::codec::{from_value, to_value};
use crate::error::{GbxError, Result};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    #[serde(rename = "faultCode")]
    pub code: i32,
    #[serde(rename = "faultString")]
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Read a fault out of the value carried by a fault response.
    ///
    /// A value without both members is a protocol error, since there is no
    /// call result to fall back on.
    pub fn from_value(value: Value) -> Result<Self> {
        from_value(value).map_err(|e| GbxError::Protocol(format!("malformed fault: {e}")))
    }

    pub fn to_value(&self) -> Result<Value> {
        to_value(self)
    }
}

impl From<Fault> for GbxError {
    fn from(fault: Fault) -> Self {
        GbxError::Fault {
            code: fault.code,
            message: fault.message,
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fault {}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fault_struct() {
        let value = Value::Struct(vec![
            ("faultCode".into(), Value::Int(-1000)),
            ("faultString".into(), Value::from("Login unknown.")),
        ]);

        let fault = Fault::from_value(value).unwrap();
        assert_eq!(fault, Fault::new(-1000, "Login unknown."));

        let err: GbxError = fault.into();
        assert!(err.is_fault());
        assert_eq!(err.to_string(), "Fault -1000: Login unknown.");
    }

    #[test]
    fn test_member_order_irrelevant() {
        let value = Value::Struct(vec![
            ("faultString".into(), Value::from("Not in script mode.")),
            ("faultCode".into(), Value::Int(-1000)),
        ]);
        assert_eq!(Fault::from_value(value).unwrap().code, -1000);
    }

    #[test]
    fn test_missing_code_is_protocol_error() {
        let value = Value::Struct(vec![("faultString".into(), Value::from("oops"))]);
        let err = Fault::from_value(value).unwrap_err();
        assert!(matches!(err, GbxError::Protocol(ref m) if m.contains("malformed fault")));
    }

    #[test]
    fn test_to_value_uses_wire_names() {
        let value = Fault::new(3, "x").to_value().unwrap();
        assert_eq!(value.get("faultCode"), Some(&Value::Int(3)));
        assert_eq!(value.get("faultString"), Some(&Value::from("x")));
    }
}
