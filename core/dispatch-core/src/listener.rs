//! Bridges push invalidations to a handler.
//!
//! A mounted listener owns one hub subscription and a pump thread that calls
//! the handler once per signal. Dropping the listener unsubscribes, which
//! closes the channel and ends the pump.

use dispatch_protocol::SocketEvent;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

use crate::error::{DispatchError, Result};
use crate::push::{Invalidation, PushHub, PushSubscription};
use crate::reconcile::Reconciler;
use crate::transport::Transport;

type Handler = Arc<dyn Fn(Invalidation) + Send + Sync>;

pub struct StatusListener {
    hub: PushHub,
    handler: Handler,
    subscription: PushSubscription,
}

impl StatusListener {
    pub fn mount<F>(hub: &PushHub, event: SocketEvent, handler: F) -> Result<Self>
    where
        F: Fn(Invalidation) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let subscription = bind(hub, event, Arc::clone(&handler))?;
        Ok(Self {
            hub: hub.clone(),
            handler,
            subscription,
        })
    }

    pub fn event(&self) -> SocketEvent {
        self.subscription.event()
    }

    /// Moves the listener to `event`. A no-op when it is already bound there.
    pub fn rebind(&mut self, event: SocketEvent) -> Result<()> {
        if self.event() == event {
            return Ok(());
        }
        debug!(from = %self.event(), to = %event, "Rebinding status listener");
        // The old pump exits once its subscription is dropped here.
        self.subscription = bind(&self.hub, event, Arc::clone(&self.handler))?;
        Ok(())
    }
}

fn bind(hub: &PushHub, event: SocketEvent, handler: Handler) -> Result<PushSubscription> {
    let (subscription, receiver) = hub.subscribe(event);
    thread::Builder::new()
        .name(format!("listen-{}", event))
        .spawn(move || {
            for signal in receiver {
                handler(signal);
            }
        })
        .map_err(|source| DispatchError::Io {
            context: format!("spawning listener for {}", event),
            source,
        })?;
    Ok(subscription)
}

/// Refetches the active unit on every status event for the reconciler's
/// unit kind.
///
/// Each signal gets its own thread and fetch. Nothing is coalesced, so
/// fetches may overlap; the reconciler's stale-response policy decides which
/// answer sticks.
pub fn watch_unit_status<T>(hub: &PushHub, reconciler: Arc<Reconciler<T>>) -> Result<StatusListener>
where
    T: Transport + 'static,
{
    let event = reconciler.kind().status_event();
    StatusListener::mount(hub, event, move |signal| {
        let reconciler = Arc::clone(&reconciler);
        let spawned = thread::Builder::new()
            .name("reconcile".to_string())
            .spawn(move || {
                let outcome = reconciler.reconcile();
                debug!(event = %signal.event, ?outcome, "Reconciled after push event");
            });
        if let Err(err) = spawned {
            warn!(event = %signal.event, error = %err, "Could not start reconcile");
        }
    })
}
