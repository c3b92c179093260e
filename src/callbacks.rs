//! Callback listeners and the router task that feeds them.
//!
//! The read loop never runs user code. It pushes every server callback onto
//! an unbounded channel, and a single router task drains that channel in
//! wire order. For each notification the router invokes the listeners
//! registered under its method name, then the catch-all listeners, one
//! after the other.
//!
//! A listener that fails to decode its arguments, returns `Err`, or panics
//! is logged and skipped. Nothing it does reaches the other listeners or the
//! connection.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codec::from_value;
use crate::error::Result;
use crate::value::Value;

/// Boxed future returned by listeners.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A server-initiated method call.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub name: String,
    pub params: Vec<Value>,
}

impl Notification {
    pub fn new(name: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Decode the parameter list into `T`, positionally.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        from_value(Value::Array(self.params.clone()))
    }
}

/// Something that reacts to notifications.
pub trait Listener: Send + Sync + 'static {
    fn call(&self, notification: &Notification) -> BoxFuture<'static, Result<()>>;
}

/// Wrapper that decodes the parameter list before calling the handler.
pub struct TypedListener<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedListener<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Listener for TypedListener<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn call(&self, notification: &Notification) -> BoxFuture<'static, Result<()>> {
        let args: T = match notification.decode() {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        Box::pin((self.handler)(args))
    }
}

/// Listener that receives every notification undecoded.
pub struct AnyListener<F, Fut>
where
    F: Fn(Notification) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    handler: F,
}

impl<F, Fut> AnyListener<F, Fut>
where
    F: Fn(Notification) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F, Fut> Listener for AnyListener<F, Fut>
where
    F: Fn(Notification) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn call(&self, notification: &Notification) -> BoxFuture<'static, Result<()>> {
        Box::pin((self.handler)(notification.clone()))
    }
}

#[derive(Default)]
struct Listeners {
    by_name: HashMap<String, Vec<Arc<dyn Listener>>>,
    any: Vec<Arc<dyn Listener>>,
}

/// Registry mapping callback names to listeners.
#[derive(Default)]
pub struct CallbackRegistry {
    listeners: Mutex<Listeners>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener for `name`. Listeners run in registration order and
    /// the same handler may be added twice.
    pub fn register(&self, name: &str, listener: Arc<dyn Listener>) {
        self.listeners
            .lock()
            .by_name
            .entry(name.to_string())
            .or_default()
            .push(listener);
        tracing::debug!(callback = name, "listener registered");
    }

    /// Add a listener that sees every notification after the named ones.
    pub fn register_any(&self, listener: Arc<dyn Listener>) {
        self.listeners.lock().any.push(listener);
        tracing::debug!("catch-all listener registered");
    }

    /// Number of listeners that would run for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        let listeners = self.listeners.lock();
        listeners.by_name.get(name).map_or(0, Vec::len) + listeners.any.len()
    }

    fn snapshot(&self, name: &str) -> Vec<Arc<dyn Listener>> {
        let listeners = self.listeners.lock();
        listeners
            .by_name
            .get(name)
            .into_iter()
            .flatten()
            .chain(listeners.any.iter())
            .cloned()
            .collect()
    }

    /// Run every matching listener in order and return how many failed.
    pub async fn deliver(&self, notification: &Notification) -> usize {
        let listeners = self.snapshot(&notification.name);
        if listeners.is_empty() {
            tracing::trace!(callback = %notification.name, "no listeners");
            return 0;
        }

        let mut failures = 0;
        for listener in listeners {
            let started = std::panic::catch_unwind(AssertUnwindSafe(|| listener.call(notification)));
            let outcome = match started {
                Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
                Err(panic) => Err(panic),
            };

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::error!(callback = %notification.name, error = %e, "listener failed");
                }
                Err(panic) => {
                    failures += 1;
                    tracing::error!(
                        callback = %notification.name,
                        panic = panic_message(panic.as_ref()),
                        "listener panicked"
                    );
                }
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Queued callbacks at which the router logs a backlog warning.
pub const BACKLOG_WARN_THRESHOLD: usize = 1024;

/// Spawn the router task. It stops once every sender is dropped and the
/// queue is drained.
///
/// The queue is unbounded so the read loop never waits on listeners. A
/// listener that never finishes stalls delivery and the queue keeps growing;
/// a warning is logged each time the backlog reaches
/// [`BACKLOG_WARN_THRESHOLD`].
pub fn spawn_router(
    registry: Arc<CallbackRegistry>,
) -> (mpsc::UnboundedSender<Notification>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
    let task = tokio::spawn(async move {
        let mut warned = false;
        while let Some(notification) = rx.recv().await {
            let backlog = rx.len();
            if backlog >= BACKLOG_WARN_THRESHOLD && !warned {
                tracing::warn!(
                    backlog,
                    callback = %notification.name,
                    "callback listeners are falling behind"
                );
                warned = true;
            } else if backlog < BACKLOG_WARN_THRESHOLD / 2 {
                warned = false;
            }
            registry.deliver(&notification).await;
        }
        tracing::debug!("callback router stopped");
    });
    (tx, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GbxError;
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Connect {
        login: String,
        is_spectator: bool,
    }

    fn player_connect(login: &str) -> Notification {
        Notification::new(
            "ManiaPlanet.PlayerConnect",
            vec![Value::from(login), Value::Boolean(false)],
        )
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder() -> (Log, Log) {
        let log = Log::default();
        (log.clone(), log)
    }

    #[tokio::test]
    async fn test_listeners_run_in_registration_order() {
        let registry = CallbackRegistry::new();
        let (log, seen) = recorder();

        for tag in ["first", "second"] {
            let log = log.clone();
            registry.register(
                "ManiaPlanet.PlayerConnect",
                Arc::new(TypedListener::new(move |(login, _): (String, bool)| {
                    log.lock().push(format!("{tag}:{login}"));
                    async { Ok(()) }
                })),
            );
        }
        let any_log = log.clone();
        registry.register_any(Arc::new(AnyListener::new(move |n: Notification| {
            any_log.lock().push(format!("any:{}", n.name));
            async { Ok(()) }
        })));

        let failures = registry.deliver(&player_connect("login123")).await;

        assert_eq!(failures, 0);
        assert_eq!(
            *seen.lock(),
            vec![
                "first:login123",
                "second:login123",
                "any:ManiaPlanet.PlayerConnect"
            ]
        );
    }

    #[tokio::test]
    async fn test_listeners_decode_independently() {
        let registry = CallbackRegistry::new();
        let (log, seen) = recorder();

        let l1 = log.clone();
        registry.register(
            "ManiaPlanet.PlayerConnect",
            Arc::new(TypedListener::new(move |args: Connect| {
                l1.lock().push(format!("{}/{}", args.login, args.is_spectator));
                async { Ok(()) }
            })),
        );
        let l2 = log.clone();
        registry.register(
            "ManiaPlanet.PlayerConnect",
            Arc::new(TypedListener::new(move |(login,): (String,)| {
                l2.lock().push(login);
                async { Ok(()) }
            })),
        );

        registry.deliver(&player_connect("abc")).await;
        assert_eq!(*seen.lock(), vec!["abc/false", "abc"]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let registry = CallbackRegistry::new();
        let (log, seen) = recorder();

        registry.register(
            "ManiaPlanet.PlayerConnect",
            Arc::new(TypedListener::new(|_: (i32,)| async { Ok(()) })),
        );
        registry.register(
            "ManiaPlanet.PlayerConnect",
            Arc::new(TypedListener::new(|_: (String, bool)| async {
                Err(GbxError::Protocol("listener refused".into()))
            })),
        );
        registry.register(
            "ManiaPlanet.PlayerConnect",
            Arc::new(TypedListener::new(|(login, _): (String, bool)| async move {
                if !login.is_empty() {
                    panic!("listener exploded");
                }
                Ok(())
            })),
        );
        registry.register(
            "ManiaPlanet.PlayerConnect",
            Arc::new(TypedListener::new(|_: (String, bool)| -> BoxFuture<'static, Result<()>> {
                panic!("panicked before returning a future")
            })),
        );
        let l = log.clone();
        registry.register(
            "ManiaPlanet.PlayerConnect",
            Arc::new(TypedListener::new(move |(login, _): (String, bool)| {
                l.lock().push(login);
                async { Ok(()) }
            })),
        );

        let failures = registry.deliver(&player_connect("survivor")).await;

        assert_eq!(failures, 4);
        assert_eq!(*seen.lock(), vec!["survivor"]);
    }

    #[tokio::test]
    async fn test_unrelated_names_not_delivered() {
        let registry = CallbackRegistry::new();
        let (log, seen) = recorder();
        let l = log.clone();
        registry.register(
            "ManiaPlanet.PlayerChat",
            Arc::new(TypedListener::new(move |_: Vec<Value>| {
                l.lock().push("chat".to_string());
                async { Ok(()) }
            })),
        );

        assert_eq!(registry.deliver(&player_connect("x")).await, 0);
        assert!(seen.lock().is_empty());
        assert_eq!(registry.listener_count("ManiaPlanet.PlayerChat"), 1);
        assert_eq!(registry.listener_count("ManiaPlanet.PlayerConnect"), 0);
    }

    #[tokio::test]
    async fn test_router_preserves_wire_order_and_drains() {
        let registry = Arc::new(CallbackRegistry::new());
        let (log, seen) = recorder();
        let l = log.clone();
        registry.register(
            "ManiaPlanet.PlayerConnect",
            Arc::new(TypedListener::new(move |(login, _): (String, bool)| {
                let l = l.clone();
                async move {
                    tokio::task::yield_now().await;
                    l.lock().push(login);
                    Ok(())
                }
            })),
        );

        let (tx, task) = spawn_router(registry);
        for login in ["a", "b", "c"] {
            tx.send(player_connect(login)).unwrap();
        }
        drop(tx);
        task.await.unwrap();

        assert_eq!(*seen.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_stalled_listener_queues_without_blocking_senders() {
        let registry = Arc::new(CallbackRegistry::new());
        let (log, seen) = recorder();
        let gate = Arc::new(tokio::sync::Notify::new());
        let (l, g) = (log.clone(), gate.clone());
        registry.register_any(Arc::new(AnyListener::new(move |n: Notification| {
            let (l, g) = (l.clone(), g.clone());
            async move {
                if l.lock().is_empty() {
                    g.notified().await;
                }
                l.lock().push(n.name);
                Ok(())
            }
        })));

        let (tx, task) = spawn_router(registry);
        let total = BACKLOG_WARN_THRESHOLD * 2;
        for i in 0..total {
            tx.send(Notification::new(format!("cb{i}"), vec![])).unwrap();
        }
        tokio::task::yield_now().await;
        assert!(seen.lock().is_empty());

        gate.notify_one();
        drop(tx);
        task.await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), total);
        assert_eq!(seen[0], "cb0");
        assert_eq!(seen[total - 1], format!("cb{}", total - 1));
    }
}
