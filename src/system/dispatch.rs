//! Two-stage event dispatch.
//!
//! ```text
//! I/O tasks ──announce──→ [inbound queue] ──→ main handler (tokio task)
//!                                                  │ mutates under manager lock
//! public operations ──────────────emit─────────────┤
//!                                                  ▼
//!                                   [outbound queue] ──→ walletcore-listener thread
//!                                                             └── SystemListener
//! ```
//!
//! Both queues are unbounded: a slow listener delays delivery, never ingestion.

use super::listener::{ListenerEvent, SystemListener};
use super::SystemInner;
use crate::manager::Announcement;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Weak;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

pub(crate) const LISTENER_THREAD: &str = "walletcore-listener";

pub(crate) enum Delivery {
    Event(ListenerEvent),
    Flush(oneshot::Sender<()>),
    Stop,
}

#[derive(Clone)]
pub(crate) struct Dispatcher {
    main: mpsc::UnboundedSender<Announcement>,
    listener: mpsc::UnboundedSender<Delivery>,
}

impl Dispatcher {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Announcement>, mpsc::UnboundedReceiver<Delivery>) {
        let (main, main_rx) = mpsc::unbounded_channel();
        let (listener, listener_rx) = mpsc::unbounded_channel();
        (Self { main, listener }, main_rx, listener_rx)
    }

    /// Post to the main handler.
    pub(crate) fn announce(&self, announcement: Announcement) {
        if self.main.send(announcement).is_err() {
            debug!("main handler gone; announcement dropped");
        }
    }

    /// Queue for the listener.
    pub(crate) fn emit(&self, event: ListenerEvent) {
        trace!(kind = event.kind(), "event queued");
        if self.listener.send(Delivery::Event(event)).is_err() {
            debug!("listener thread gone; event dropped");
        }
    }

    fn deliver(&self, delivery: Delivery) {
        let _ = self.listener.send(delivery);
    }

    /// Ask the listener thread to exit once it has drained what is queued.
    pub(crate) fn stop_listener(&self) { self.deliver(Delivery::Stop) }
}

/// Dedicated OS thread calling the listener sequentially.
pub(crate) fn spawn_listener_thread(
    listener: Weak<dyn SystemListener>,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
) -> std::io::Result<()> {
    std::thread::Builder::new().name(LISTENER_THREAD.into()).spawn(move || {
        while let Some(delivery) = rx.blocking_recv() {
            match delivery {
                Delivery::Event(event) => {
                    let Some(listener) = listener.upgrade() else {
                        trace!("listener dropped; event discarded");
                        continue;
                    };
                    let kind = event.kind();
                    if panic::catch_unwind(AssertUnwindSafe(|| event.deliver(listener.as_ref()))).is_err() {
                        warn!(kind, "listener panicked");
                    }
                }
                Delivery::Flush(done) => {
                    let _ = done.send(());
                }
                Delivery::Stop => break,
            }
        }
        debug!("listener thread stopped");
    })?;
    Ok(())
}

/// Main handler: applies announcements one at a time until shutdown.
pub(crate) fn spawn_main_handler(
    handle: &Handle,
    system: Weak<SystemInner>,
    dispatcher: Dispatcher,
    mut rx: mpsc::UnboundedReceiver<Announcement>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    handle.spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                announcement = rx.recv() => match announcement {
                    Some(Announcement::Flush(done)) => dispatcher.deliver(Delivery::Flush(done)),
                    Some(Announcement::Manager { manager, epoch, update }) => {
                        let Some(system) = system.upgrade() else { break };
                        match system.manager(manager) {
                            Some(target) => target.handle_announcement(epoch, update),
                            None => debug!(%manager, "announcement for removed manager"),
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("main handler stopped");
    })
}
