//! Typed wrappers over [`GbxClient::call`](crate::GbxClient::call), grouped
//! by method category. Each wrapper is an inherent method on the client.
//!
//! - [`system`] - session setup, introspection, and `system.multicall`
//! - [`votes`] - the `Votes` category

pub mod system;
pub mod votes;

pub use system::{MultiCall, ServerVersion};
pub use votes::{CallVoteRatio, CurrentCallVote, Voters};
