//! Pending-call table.
//!
//! Every outgoing call gets a handle with [`CLIENT_HANDLE_BIT`] set and a
//! `oneshot` slot. The read loop completes the slot when the matching
//! response arrives; teardown drops every slot so their callers see
//! `ConnectionClosed`. Each entry leaves the table exactly once: on
//! completion, on close, or when the caller's [`PendingGuard`] drops.
//!
//! ```text
//! call() ── register ──► ┌──────────────────────────────┐
//!                        │ calls: HashMap<handle,       │ ◄── complete ── read loop
//!   guard drop ─ cancel ►│        oneshot::Sender>      │ ◄── close ───── teardown
//!                        └──────────────────────────────┘
//! ```

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::codec::xml::MethodResponse;
use crate::error::{GbxError, Result};
use crate::protocol::CLIENT_HANDLE_BIT;

/// What a pending call eventually receives: a parsed response, or the
/// error hit while parsing it.
pub type Completion = Result<MethodResponse>;

struct Table {
    calls: HashMap<u32, oneshot::Sender<Completion>>,
    next_handle: u32,
    closed: bool,
}

impl Table {
    /// Next free client handle. Wraps from `u32::MAX` back to the marker bit
    /// and skips handles still waiting for a response.
    fn allocate(&mut self) -> u32 {
        loop {
            let candidate = self.next_handle;
            self.next_handle = match candidate.checked_add(1) {
                Some(next) => next,
                None => CLIENT_HANDLE_BIT,
            };
            if !self.calls.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

pub struct PendingCalls {
    table: Mutex<Table>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                calls: HashMap::new(),
                next_handle: CLIENT_HANDLE_BIT,
                closed: false,
            }),
        }
    }

    /// Allocate a handle and register its completion slot under one lock.
    ///
    /// Fails with `ConnectionClosed` once [`close`](Self::close) has run.
    pub fn register(&self) -> Result<(u32, oneshot::Receiver<Completion>)> {
        let mut table = self.table.lock();
        if table.closed {
            return Err(GbxError::ConnectionClosed);
        }
        // Half the handle space in flight at once cannot happen over one
        // socket, but the allocator would spin forever if it did.
        if table.calls.len() >= CLIENT_HANDLE_BIT as usize {
            return Err(GbxError::Protocol("handle space exhausted".to_string()));
        }
        let handle = table.allocate();
        let (tx, rx) = oneshot::channel();
        table.calls.insert(handle, tx);
        Ok((handle, rx))
    }

    /// Hand a response to its caller.
    ///
    /// Returns `false` if nobody is waiting on `handle` any more, which is
    /// how late responses to cancelled calls show up.
    pub fn complete(&self, handle: u32, completion: Completion) -> bool {
        let sender = self.table.lock().calls.remove(&handle);
        match sender {
            // The receiver can be gone if the caller dropped between the
            // lookup and the send; that is a cancellation as well.
            Some(tx) => tx.send(completion).is_ok(),
            None => false,
        }
    }

    pub fn cancel(&self, handle: u32) -> bool {
        self.table.lock().calls.remove(&handle).is_some()
    }

    /// Refuse new registrations and fail every waiting call.
    ///
    /// Returns how many calls were failed. Idempotent.
    pub fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut table = self.table.lock();
            table.closed = true;
            table.calls.drain().collect()
        };
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(GbxError::ConnectionClosed));
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }

    pub fn len(&self) -> usize {
        self.table.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, handle: u32) -> bool {
        self.table.lock().calls.contains_key(&handle)
    }

    #[cfg(test)]
    fn set_next_handle(&self, handle: u32) {
        self.table.lock().next_handle = handle;
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

/// Unregisters a pending call when the awaiting future goes away.
///
/// Call [`disarm`](Self::disarm) once the response has been taken so drop
/// does not touch the table again.
pub struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    handle: u32,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    pub fn new(pending: &'a PendingCalls, handle: u32) -> Self {
        Self {
            pending,
            handle,
            armed: true,
        }
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.pending.cancel(self.handle) {
            tracing::debug!(handle = self.handle, "pending call cancelled");
        }
    }
}
