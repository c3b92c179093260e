//! Call parameter lists.
//!
//! Each tuple element becomes one `<param>`:
//!
//! ```
//! use gbxremote::codec::Params;
//! use gbxremote::Value;
//!
//! let params = ("RestartMap", 0.5, 30, 1).into_params().unwrap();
//! assert_eq!(params[1], Value::Double(0.5));
//! assert!(().into_params().unwrap().is_empty());
//! ```

use serde::Serialize;

use super::to_value;
use crate::error::Result;
use crate::value::Value;

/// Something that can be turned into an ordered XML-RPC parameter list.
pub trait Params {
    fn into_params(self) -> Result<Vec<Value>>;
}

/// Prebuilt values are re-checked, so a non-finite `Double` is rejected
/// here rather than written to the wire.
impl Params for Vec<Value> {
    fn into_params(self) -> Result<Vec<Value>> {
        self.iter().map(|value| to_value(value)).collect()
    }
}

macro_rules! tuple_params {
    ($($name:ident),*) => {
        impl<$($name: Serialize),*> Params for ($($name,)*) {
            #[allow(non_snake_case)]
            fn into_params(self) -> Result<Vec<Value>> {
                let ($($name,)*) = self;
                Ok(vec![$(to_value(&$name)?),*])
            }
        }
    };
}

tuple_params!();
tuple_params!(A);
tuple_params!(A, B);
tuple_params!(A, B, C);
tuple_params!(A, B, C, D);
tuple_params!(A, B, C, D, E);
tuple_params!(A, B, C, D, E, F);
tuple_params!(A, B, C, D, E, F, G);
tuple_params!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GbxError;

    #[test]
    fn test_single_element_tuple() {
        let params = ("login",).into_params().unwrap();
        assert_eq!(params, vec![Value::from("login")]);
    }

    #[test]
    fn test_nested_params() {
        let ratios = vec![("a", 1)];
        let params = (true, ratios).into_params().unwrap();
        assert_eq!(params.len(), 2);
        assert!(matches!(params[1], Value::Array(_)));
    }

    #[test]
    fn test_prebuilt_values_checked() {
        let params = vec![Value::from("a"), Value::Array(vec![Value::Int(1)])];
        assert_eq!(params.clone().into_params().unwrap(), params);

        let bad = vec![Value::Array(vec![Value::Double(f64::NAN)])];
        assert!(matches!(bad.into_params(), Err(GbxError::TypeMismatch(_))));
    }

    #[test]
    fn test_unencodable_param_fails() {
        let err = (1, None::<i32>).into_params().unwrap_err();
        assert!(matches!(err, GbxError::TypeMismatch(_)));
    }
}
