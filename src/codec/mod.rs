//! Codec module - native values ⇄ [`Value`] ⇄ XML-RPC text.
//!
//! - [`to_value`] / [`from_value`] - serde bridge between Rust types and [`Value`]
//! - [`Params`] - tuples of serializable values as call parameter lists
//! - [`xml`] - `methodCall` / `methodResponse` documents
//!
//! # Example
//!
//! ```
//! use gbxremote::codec::{from_value, to_value, CurrentNextValue};
//!
//! let pair = CurrentNextValue { current_value: 30, next_value: 60 };
//! let wire = to_value(&pair).unwrap();
//! assert!(wire.get("NextValue").is_some());
//!
//! let back: CurrentNextValue<i32> = from_value(wire).unwrap();
//! assert_eq!(back, pair);
//! ```

mod de;
mod params;
mod ser;
pub mod xml;

use serde::{Deserialize, Serialize};

pub use de::from_value;
pub use params::Params;
pub use ser::{to_value, ValueSerializer};

/// A setting that takes effect later: the value in force now and the one
/// queued for the next map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CurrentNextValue<T> {
    pub current_value: T,
    pub next_value: T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    #[serde(rename_all = "PascalCase")]
    struct PlayerInfo {
        login: String,
        nick_name: String,
        player_id: i32,
        ladder_ranking: i32,
        is_in_official_mode: bool,
        avatar: serde_bytes::ByteBuf,
        scores: Vec<f64>,
        timeout: CurrentNextValue<i32>,
    }

    #[test]
    fn test_round_trip_nested_record() {
        let info = PlayerInfo {
            login: "login123".to_string(),
            nick_name: "$f00Nick & <Co>".to_string(),
            player_id: 236,
            ladder_ranking: -1,
            is_in_official_mode: false,
            avatar: serde_bytes::ByteBuf::from(vec![0xde, 0xad]),
            scores: vec![1.5, -0.25],
            timeout: CurrentNextValue {
                current_value: 0,
                next_value: 30_000,
            },
        };

        let wire = to_value(&info).unwrap();
        let back: PlayerInfo = from_value(wire).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_current_next_field_names() {
        let wire = to_value(&CurrentNextValue {
            current_value: true,
            next_value: false,
        })
        .unwrap();
        assert_eq!(
            wire,
            Value::Struct(vec![
                ("CurrentValue".into(), Value::Boolean(true)),
                ("NextValue".into(), Value::Boolean(false)),
            ])
        );
    }

    #[test]
    fn test_current_next_requires_both_fields() {
        let wire = Value::Struct(vec![("CurrentValue".into(), Value::Int(1))]);
        assert!(from_value::<CurrentNextValue<i32>>(wire).is_err());
    }
}
