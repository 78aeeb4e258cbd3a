//! # In-Process Bus
//!
//! `LocalBus` implements `Transport` with tokio channels. Each consumer owns
//! an unbounded inbox drained by its own pump task, so one consumer handles
//! its messages one at a time. Point-to-point sends rotate through the
//! consumers of an address; publish reaches all of them.
//!
//! Pump tasks and reply timers run on the tokio runtime the bus was built
//! in (or the one given to `LocalBusBuilder::runtime`). A bus built outside
//! any runtime uses whichever runtime the caller is in; with none, sends
//! that expect a reply fail with `TransportError::Closed`.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::transport::Consumer;
use crate::transport::DeliveryOptions;
use crate::transport::Envelope;
use crate::transport::Headers;
use crate::transport::Inbound;
use crate::transport::MessageHandler;
use crate::transport::ReplyHandler;
use crate::transport::Responder;
use crate::transport::Result;
use crate::transport::Transport;
use crate::transport::TransportError;

/// Reply timeout used when neither the bus nor the send sets one.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

struct Slot {
    id: u64,
    inbox: mpsc::UnboundedSender<Inbound>,
}

struct BusInner {
    consumers: DashMap<String, Vec<Slot>>,
    cursor: AtomicUsize,
    next_id: AtomicU64,
    reply_timeout: Duration,
    runtime: Option<Handle>,
}

impl BusInner {
    fn runtime(&self) -> Result<Handle> {
        match &self.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| TransportError::Closed("LocalBus needs a tokio runtime".into())),
        }
    }

    /// Next consumer of `address`, round-robin.
    fn pick(&self, address: &str) -> Option<mpsc::UnboundedSender<Inbound>> {
        let slots = self.consumers.get(address)?;
        if slots.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % slots.len();
        Some(slots[index].inbox.clone())
    }

    fn all(&self, address: &str) -> Vec<mpsc::UnboundedSender<Inbound>> {
        self.consumers
            .get(address)
            .map(|slots| slots.iter().map(|slot| slot.inbox.clone()).collect())
            .unwrap_or_default()
    }

    fn remove(&self, address: &str, id: u64) {
        if let Some(mut slots) = self.consumers.get_mut(address) {
            slots.retain(|slot| slot.id != id);
        }
        self.consumers.remove_if(address, |_, slots| slots.is_empty());
    }
}

/// An in-process message bus.
///
/// Cloning is cheap; clones share the same consumers.
#[derive(Clone)]
pub struct LocalBus {
    inner: Arc<BusInner>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> LocalBusBuilder {
        LocalBusBuilder { reply_timeout: DEFAULT_REPLY_TIMEOUT, runtime: None }
    }

    /// Number of live consumers on `address`.
    pub fn consumer_count(&self, address: &str) -> usize {
        self.inner.consumers.get(address).map_or(0, |slots| slots.len())
    }

    fn stamp(envelope: Envelope, options: &DeliveryOptions) -> Envelope {
        if options.headers.is_empty() {
            return envelope;
        }
        let mut headers = options.headers.clone();
        headers.extend(envelope.headers());
        Envelope::new(headers, envelope.into_body())
    }
}

pub struct LocalBusBuilder {
    reply_timeout: Duration,
    runtime: Option<Handle>,
}

impl LocalBusBuilder {
    /// Reply timeout for sends whose options do not set one.
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Runtime for pump tasks and reply timers. Defaults to the current one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> LocalBus {
        LocalBus {
            inner: Arc::new(BusInner {
                consumers: DashMap::new(),
                cursor: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                reply_timeout: self.reply_timeout,
                runtime: self.runtime.or_else(|| Handle::try_current().ok()),
            }),
        }
    }
}

/// Answers by completing the oneshot the sender is waiting on.
struct LocalResponder {
    tx: oneshot::Sender<Result<Envelope>>,
}

impl Responder for LocalResponder {
    fn reply(self: Box<Self>, body: Vec<u8>) {
        let _ = self.tx.send(Ok(Envelope::new(Headers::new(), body)));
    }

    fn fail(self: Box<Self>, code: i32, message: String) {
        let _ = self.tx.send(Err(TransportError::Recipient { code, message }));
    }
}

#[async_trait::async_trait]
impl Transport for LocalBus {
    fn send(&self, address: &str, envelope: Envelope, options: &DeliveryOptions, on_reply: Option<ReplyHandler>) {
        let envelope = Self::stamp(envelope, options);
        trace!(address, method = envelope.method(), expects_reply = on_reply.is_some(), "send");

        let Some(inbox) = self.inner.pick(address) else {
            match on_reply {
                Some(on_reply) => on_reply(Err(TransportError::NoHandlers(address.to_owned()))),
                None => warn!(address, "dropping message: no handlers"),
            }
            return;
        };

        let Some(on_reply) = on_reply else {
            if inbox.send(Inbound::new(envelope, None)).is_err() {
                warn!(address, "dropping message: consumer closed");
            }
            return;
        };

        let runtime = match self.inner.runtime() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(address, error = %e, "cannot wait for a reply");
                on_reply(Err(e));
                return;
            }
        };

        let (tx, rx) = oneshot::channel();
        let responder: Box<dyn Responder> = Box::new(LocalResponder { tx });
        if inbox.send(Inbound::new(envelope, Some(responder))).is_err() {
            on_reply(Err(TransportError::NoHandlers(address.to_owned())));
            return;
        }

        let timeout = options.timeout.unwrap_or(self.inner.reply_timeout);
        runtime.spawn(async move {
            let outcome = match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => Err(TransportError::Closed("consumer dropped the message without answering".into())),
                Err(_) => Err(TransportError::Timeout),
            };
            on_reply(outcome);
        });
    }

    fn publish(&self, address: &str, envelope: Envelope, options: &DeliveryOptions) {
        let envelope = Self::stamp(envelope, options);
        let inboxes = self.inner.all(address);
        trace!(address, method = envelope.method(), subscribers = inboxes.len(), "publish");

        for inbox in inboxes {
            if inbox.send(Inbound::new(envelope.clone(), None)).is_err() {
                warn!(address, "dropping published message: consumer closed");
            }
        }
    }

    async fn register_consumer(&self, address: &str) -> Result<Box<dyn Consumer>> {
        let runtime = self.inner.runtime()?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (inbox, messages) = mpsc::unbounded_channel();
        let (handler_tx, handler_rx) = watch::channel(None);

        self.inner.consumers.entry(address.to_owned()).or_default().push(Slot { id, inbox });
        runtime.spawn(pump(messages, handler_rx));
        debug!(address, id, "registered consumer");

        Ok(Box::new(LocalConsumer {
            address: address.to_owned(),
            id,
            bus: self.inner.clone(),
            handler: handler_tx,
            registered: true,
        }))
    }
}

/// Feeds one consumer's inbox to its current handler.
async fn pump(mut messages: mpsc::UnboundedReceiver<Inbound>, mut handler: watch::Receiver<Option<MessageHandler>>) {
    while let Some(message) = messages.recv().await {
        let waiting = handler.borrow().is_none();
        if waiting && handler.wait_for(Option::is_some).await.is_err() {
            return;
        }
        let current = handler.borrow().clone();
        if let Some(current) = current {
            current(message);
        }
    }
}

struct LocalConsumer {
    address: String,
    id: u64,
    bus: Arc<BusInner>,
    handler: watch::Sender<Option<MessageHandler>>,
    registered: bool,
}

impl Consumer for LocalConsumer {
    fn address(&self) -> &str {
        &self.address
    }

    fn on_message(&mut self, handler: MessageHandler) {
        self.handler.send_replace(Some(handler));
    }

    fn unregister(&mut self) {
        if std::mem::take(&mut self.registered) {
            self.bus.remove(&self.address, self.id);
            debug!(address = %self.address, id = self.id, "unregistered consumer");
        }
    }
}
