//! # Busrpc
//!
//! Typed request/response services over an addressable message bus.
//!
//! A service is a trait plus a `Contract`: the bus address it lives at and
//! the shape of each method. Clients talk to it through a `Stub`; servers
//! put an implementation on the bus with `Server::register`. Methods either
//! return nothing (sent or published, never answered) or an `Eventual`
//! value, answered with one reply that carries the value or the `Fault`
//! the implementation failed with.
//!
//! The bus itself sits behind the `Transport` trait. `LocalBus` is an
//! in-process implementation.

pub mod args;
pub mod bridge;
pub mod contract;
pub mod dispatcher;
pub mod error;
pub mod eventual;
pub mod local;
pub mod resolver;
pub mod stub;
pub mod transport;

#[cfg(test)]
mod tests;

pub use args::Args;
pub use contract::Contract;
pub use contract::ContractBuilder;
pub use contract::MethodSpec;
pub use contract::MethodTable;
pub use contract::ReturnShape;
pub use dispatcher::Binder;
pub use dispatcher::Interface;
pub use dispatcher::Registration;
pub use dispatcher::Server;
pub use error::Error;
pub use error::Result;
pub use eventual::Completer;
pub use eventual::Eventual;
pub use local::LocalBus;
pub use resolver::Resolver;
pub use stub::Stub;
pub use transport::Consumer;
pub use transport::DeliveryOptions;
pub use transport::Envelope;
pub use transport::FAILURE_INTERNAL;
pub use transport::FAILURE_METHOD_NOT_FOUND;
pub use transport::Headers;
pub use transport::Inbound;
pub use transport::METHOD_HEADER;
pub use transport::MessageHandler;
pub use transport::ReplyHandler;
pub use transport::Responder;
pub use transport::Transport;
pub use transport::TransportError;

pub use buspack::Fault;
pub use buspack::Throwable;
