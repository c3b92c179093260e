//! Session setup and introspection.
//!
//! A fresh connection can only call a handful of methods until it has
//! authenticated, and receives no callbacks until it asks for them:
//!
//! ```no_run
//! # async fn run(client: gbxremote::GbxClient) -> gbxremote::Result<()> {
//! client.authenticate("SuperAdmin", "SuperAdmin").await?;
//! client.set_api_version("2013-04-16").await?;
//! client.enable_callbacks(true).await?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::client::GbxClient;
use crate::codec::Params;
use crate::error::{GbxError, Result};
use crate::fault::Fault;
use crate::value::Value;

/// Result of `GetVersion`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerVersion {
    pub name: String,
    pub title_id: String,
    pub version: String,
    pub build: String,
    pub api_version: String,
}

/// A batch of calls sent as one `system.multicall` request.
///
/// ```
/// use gbxremote::methods::MultiCall;
///
/// let batch = MultiCall::new()
///     .add("GetCallVoteRatio", ())?
///     .add("SetCallVoteTimeOut", (60_000,))?;
/// assert_eq!(batch.len(), 2);
/// # Ok::<(), gbxremote::GbxError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MultiCall {
    calls: Vec<Value>,
}

impl MultiCall {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call. Fails if a parameter cannot be encoded.
    pub fn add<P: Params>(mut self, method: &str, params: P) -> Result<Self> {
        let params = params.into_params()?;
        self.calls.push(Value::Struct(vec![
            ("methodName".to_string(), Value::from(method)),
            ("params".to_string(), Value::Array(params)),
        ]));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Split a `system.multicall` result into per-call outcomes.
fn multicall_results(value: Value, expected: usize) -> Result<Vec<std::result::Result<Value, Fault>>> {
    let Value::Array(entries) = value else {
        return Err(GbxError::TypeMismatch(format!(
            "expected array from system.multicall, got {}",
            value.type_name()
        )));
    };
    if entries.len() != expected {
        return Err(GbxError::Protocol(format!(
            "system.multicall returned {} results for {} calls",
            entries.len(),
            expected
        )));
    }

    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Array(mut items) if items.len() == 1 => Ok(Ok(items.remove(0))),
            fault @ Value::Struct(_) => Ok(Err(Fault::from_value(fault)?)),
            other => Err(GbxError::Protocol(format!(
                "unexpected system.multicall entry: {}",
                other.type_name()
            ))),
        })
        .collect()
}

impl GbxClient {
    /// Log in as one of the server's built-in accounts (`SuperAdmin`,
    /// `Admin`, `User`).
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<bool> {
        self.call("Authenticate", (login, password)).await
    }

    /// Ask the server to start (or stop) sending callbacks.
    pub async fn enable_callbacks(&self, enable: bool) -> Result<bool> {
        self.call("EnableCallbacks", (enable,)).await
    }

    /// Select the API revision that shapes callback parameters, e.g.
    /// `"2013-04-16"`.
    pub async fn set_api_version(&self, version: &str) -> Result<bool> {
        self.call("SetApiVersion", (version,)).await
    }

    pub async fn list_methods(&self) -> Result<Vec<String>> {
        self.call("system.listMethods", ()).await
    }

    pub async fn get_version(&self) -> Result<ServerVersion> {
        self.call("GetVersion", ()).await
    }

    /// Send every call in `batch` as one request.
    ///
    /// The outer `Result` fails only if the request as a whole does; each
    /// entry carries its own value or fault, in the order the calls were
    /// added.
    pub async fn multicall(&self, batch: MultiCall) -> Result<Vec<std::result::Result<Value, Fault>>> {
        let expected = batch.len();
        let value = self
            .call_value("system.multicall", vec![Value::Array(batch.calls)])
            .await?;
        multicall_results(value, expected)
    }
}
