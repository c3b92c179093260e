//! The `Votes` method category.
//!
//! Most setters are admin-only and return `true` on success; the server
//! answers with a fault otherwise.

use serde::{Deserialize, Serialize};

use crate::client::GbxClient;
use crate::codec::CurrentNextValue;
use crate::error::Result;

/// The vote currently in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CurrentCallVote {
    pub caller_login: String,
    pub cmd_name: String,
    pub cmd_param: String,
}

/// Pass ratio for one vote command. A ratio of `-1` disables the command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallVoteRatio {
    pub command: String,
    pub ratio: f64,
}

impl CallVoteRatio {
    pub fn new(command: impl Into<String>, ratio: f64) -> Self {
        Self {
            command: command.into(),
            ratio,
        }
    }
}

/// Who may take part in a vote started with [`GbxClient::call_vote_ex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voters {
    /// Only players currently playing.
    Active,
    /// Any player, including those in spectator mode.
    Players,
    /// Everybody, pure spectators included.
    Everybody,
}

impl Voters {
    fn code(self) -> i32 {
        match self {
            Voters::Active => 0,
            Voters::Players => 1,
            Voters::Everybody => 2,
        }
    }
}

impl GbxClient {
    /// Start a vote for `cmd`, an XML-RPC `methodCall` document.
    pub async fn call_vote(&self, cmd: &str) -> Result<bool> {
        self.call("CallVote", (cmd,)).await
    }

    /// Start a vote with its own ratio, timeout, and electorate.
    ///
    /// A `ratio` of `-1` uses the default. A `timeout` of `0` uses the
    /// default and `1` means indefinite.
    pub async fn call_vote_ex(&self, cmd: &str, ratio: f64, timeout: i32, voters: Voters) -> Result<bool> {
        self.call("CallVoteEx", (cmd, ratio, timeout, voters.code()))
            .await
    }

    /// Used internally by the game.
    pub async fn internal_call_vote(&self) -> Result<bool> {
        self.call("InternalCallVote", ()).await
    }

    pub async fn cancel_vote(&self) -> Result<bool> {
        self.call("CancelVote", ()).await
    }

    pub async fn get_current_call_vote(&self) -> Result<CurrentCallVote> {
        self.call("GetCurrentCallVote", ()).await
    }

    /// Set the time allowed for voting, in milliseconds. Zero disables
    /// call votes. Takes effect on the next map.
    pub async fn set_call_vote_time_out(&self, timeout: i32) -> Result<bool> {
        self.call("SetCallVoteTimeOut", (timeout,)).await
    }

    pub async fn get_call_vote_time_out(&self) -> Result<CurrentNextValue<i32>> {
        self.call("GetCallVoteTimeOut", ()).await
    }

    /// Set the default pass ratio, between 0 and 1.
    pub async fn set_call_vote_ratio(&self, ratio: f64) -> Result<bool> {
        self.call("SetCallVoteRatio", (ratio,)).await
    }

    pub async fn get_call_vote_ratio(&self) -> Result<f64> {
        self.call("GetCallVoteRatio", ()).await
    }

    pub async fn set_call_vote_ratios(&self, ratios: &[CallVoteRatio]) -> Result<bool> {
        self.call("SetCallVoteRatios", (ratios,)).await
    }

    pub async fn get_call_vote_ratios(&self) -> Result<Vec<CallVoteRatio>> {
        self.call("GetCallVoteRatios", ()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{from_value, to_value, Params};
    use crate::value::Value;

    #[test]
    fn test_ratios_encode_as_struct_array() {
        let ratios = [
            CallVoteRatio::new("RestartMap", 0.6),
            CallVoteRatio::new("Ban", -1.0),
        ];
        let params = (&ratios[..],).into_params().unwrap();

        let Value::Array(items) = &params[0] else {
            panic!("expected array, got {:?}", params[0]);
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].get("Command"), Some(&Value::from("Ban")));
        assert_eq!(items[1].get("Ratio"), Some(&Value::Double(-1.0)));
    }

    #[test]
    fn test_current_call_vote_ignores_extra_members() {
        let value = Value::Struct(vec![
            ("CallerLogin".into(), Value::from("admin")),
            ("CmdName".into(), Value::from("RestartMap")),
            ("CmdParam".into(), Value::from("")),
            ("Extra".into(), Value::Int(7)),
        ]);
        let vote: CurrentCallVote = from_value(value).unwrap();
        assert_eq!(vote.cmd_name, "RestartMap");
    }

    #[test]
    fn test_voters_codes() {
        assert_eq!(Voters::Active.code(), 0);
        assert_eq!(Voters::Players.code(), 1);
        assert_eq!(Voters::Everybody.code(), 2);
    }

    #[test]
    fn test_ratio_round_trip() {
        let ratio = CallVoteRatio::new("NextMap", 0.5);
        let back: CallVoteRatio = from_value(to_value(&ratio).unwrap()).unwrap();
        assert_eq!(back, ratio);
    }
}
