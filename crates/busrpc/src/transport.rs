//! # Transport Abstraction
//!
//! The addressable message bus this crate is layered on.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: The transport moves envelopes of headers and opaque
//!   bodies. It knows nothing about methods, arguments or faults.
//! - **Callback Replies**: A point-to-point send may carry a `ReplyHandler`,
//!   called exactly once with the reply or the reason there is none. Turning
//!   that into an awaitable result is the job of `bridge`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Header naming the invoked method.
pub const METHOD_HEADER: &str = "method";

/// Failure code for an envelope whose method the dispatcher does not know.
pub const FAILURE_METHOD_NOT_FOUND: i32 = 1;

/// Failure code for anything that goes wrong outside the implementation.
pub const FAILURE_INTERNAL: i32 = -1;

/// Errors that occur at the delivery layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Nobody is consuming the address.
    NoHandlers(String),
    /// No reply arrived in time.
    Timeout,
    /// The recipient answered through its failure path.
    Recipient { code: i32, message: String },
    /// The recipient went away without answering.
    Closed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHandlers(address) => write!(f, "No handlers for address {}", address),
            Self::Timeout => write!(f, "Timed out waiting for a reply"),
            Self::Recipient { code, message } => write!(f, "Recipient failure {}: {}", code, message),
            Self::Closed(msg) => write!(f, "Closed: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// String headers carried with every envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every header of `other` over this set.
    pub fn extend(&mut self, other: &Headers) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }
}

/// A message on the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    headers: Headers,
    body: Vec<u8>,
}

impl Envelope {
    pub fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// The invoked method, if the envelope names one.
    pub fn method(&self) -> Option<&str> {
        self.headers.get(METHOD_HEADER)
    }
}

/// Per-send settings handed through to the transport untouched.
#[derive(Debug, Clone, Default)]
pub struct DeliveryOptions {
    /// How long to wait for a reply. `None` uses the transport's default.
    pub timeout: Option<Duration>,
    /// Added to every envelope sent with these options.
    pub headers: Headers,
}

impl DeliveryOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }
}

/// Called once with the reply to a point-to-point send.
pub type ReplyHandler = Box<dyn FnOnce(Result<Envelope>) + Send>;

/// Called for every message delivered to a consumer.
pub type MessageHandler = Arc<dyn Fn(Inbound) + Send + Sync>;

/// The transport's side of answering one inbound message.
pub trait Responder: Send {
    fn reply(self: Box<Self>, body: Vec<u8>);
    fn fail(self: Box<Self>, code: i32, message: String);
}

/// A message delivered to a consumer.
///
/// Answering consumes the message, so at most one answer is ever sent.
/// Messages sent without a reply handler accept answers and drop them.
pub struct Inbound {
    envelope: Envelope,
    responder: Option<Box<dyn Responder>>,
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbound")
            .field("envelope", &self.envelope)
            .field("expects_reply", &self.expects_reply())
            .finish()
    }
}

impl Inbound {
    pub fn new(envelope: Envelope, responder: Option<Box<dyn Responder>>) -> Self {
        Self { envelope, responder }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn headers(&self) -> &Headers {
        self.envelope.headers()
    }

    pub fn body(&self) -> &[u8] {
        self.envelope.body()
    }

    pub fn expects_reply(&self) -> bool {
        self.responder.is_some()
    }

    pub fn reply(self, body: Vec<u8>) {
        if let Some(responder) = self.responder {
            responder.reply(body);
        }
    }

    pub fn fail(self, code: i32, message: impl Into<String>) {
        if let Some(responder) = self.responder {
            responder.fail(code, message.into());
        }
    }
}

/// A mechanism to move envelopes between addresses.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Delivers to one consumer of `address`.
    ///
    /// # Invariants
    /// - If `on_reply` is given it must be called exactly once, with the
    ///   reply or with the reason there will be none.
    /// - Must not block the caller waiting for the reply.
    fn send(&self, address: &str, envelope: Envelope, options: &DeliveryOptions, on_reply: Option<ReplyHandler>);

    /// Delivers to every current consumer of `address`. Nothing is awaited.
    fn publish(&self, address: &str, envelope: Envelope, options: &DeliveryOptions);

    /// Starts consuming `address`.
    async fn register_consumer(&self, address: &str) -> Result<Box<dyn Consumer>>;
}

/// A live subscription to an address.
pub trait Consumer: Send + Sync {
    fn address(&self) -> &str;

    /// Installs (or replaces) the handler. Messages that arrive before the
    /// first handler is installed are held until then.
    fn on_message(&mut self, handler: MessageHandler);

    /// Stops consuming. Calling it twice is harmless.
    fn unregister(&mut self);
}
