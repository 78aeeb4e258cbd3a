//! # Server Dispatch
//!
//! A `Server` puts an implementation on the bus. Registration binds one
//! handler per declared method (see `Interface`), then registers a single
//! consumer at the contract's address; the `method` header picks the
//! handler for each inbound message.
//!
//! ## Failure routing
//!
//! - Unknown method: `fail(FAILURE_METHOD_NOT_FOUND, "Method <name> not found")`.
//! - Panic in the implementation: a `Fault` reply. A panic payload that is
//!   itself a `Fault` is sent as is; anything else becomes kind `"panic"`.
//! - Failed eventual: the error's fault, as a reply.
//! - Anything else (bad arguments, unencodable result): `fail(FAILURE_INTERNAL, ..)`.

use std::any::Any;
use std::collections::HashMap;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use buspack::Codec;
use buspack::CodecConfig;
use buspack::Fault;
use buspack::Pack;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::args;
use crate::args::Args;
use crate::contract::Contract;
use crate::contract::ReturnShape;
use crate::error::Error;
use crate::error::Result;
use crate::eventual::Eventual;
use crate::resolver::Resolver;
use crate::transport::Consumer;
use crate::transport::FAILURE_INTERNAL;
use crate::transport::FAILURE_METHOD_NOT_FOUND;
use crate::transport::Inbound;
use crate::transport::METHOD_HEADER;
use crate::transport::Transport;

/// A result on its way back to the caller.
pub(crate) type Reply = Box<dyn Pack + Send>;

pub(crate) enum Invoked {
    Done,
    Pending(Eventual<Reply>),
}

pub(crate) type Handler<I> = Box<dyn Fn(&I, &Codec, &[u8]) -> buspack::Result<Invoked> + Send + Sync>;

/// A service interface that can be served on the bus.
///
/// Implemented for the service's trait object type, binding every method
/// of its contract:
///
/// ```ignore
/// impl Interface for dyn Calculator {
///     fn bind(binder: &mut Binder<Self>) {
///         binder
///             .eventual("add", |calc, (a, b): (i64, i64)| calc.add(a, b))
///             .one_way("reset", |calc, ()| calc.reset());
///     }
/// }
/// ```
pub trait Interface: Send + Sync + 'static {
    fn bind(binder: &mut Binder<Self>);
}

/// Collects the handlers of one interface and checks them against its contract.
pub struct Binder<I: ?Sized> {
    contract: Arc<Contract>,
    handlers: HashMap<String, Handler<I>>,
    problems: Vec<String>,
}

impl<I: ?Sized + Send + Sync + 'static> Binder<I> {
    pub(crate) fn new(contract: Arc<Contract>) -> Self {
        Self { contract, handlers: HashMap::new(), problems: Vec::new() }
    }

    fn admit(&mut self, method: &str, arity: usize, returns: ReturnShape) -> bool {
        let Some(spec) = self.contract.method(method) else {
            self.problems.push(format!("{} is not declared", method));
            return false;
        };
        if spec.arity() != arity {
            self.problems.push(format!("{} takes {} arguments, handler takes {}", method, spec.arity(), arity));
            return false;
        }
        if spec.returns() != &returns {
            self.problems.push(format!("{} is declared {:?}, handler is {:?}", method, spec.returns(), returns));
            return false;
        }
        if self.handlers.contains_key(method) {
            self.problems.push(format!("{} is bound twice", method));
            return false;
        }
        true
    }

    /// Binds a method with no return value.
    pub fn one_way<A: Args>(&mut self, method: &str, f: impl Fn(&I, A) + Send + Sync + 'static) -> &mut Self {
        if self.admit(method, A::ARITY, ReturnShape::Unit) {
            let handler: Handler<I> = Box::new(move |service: &I, codec: &Codec, body: &[u8]| {
                let args = args::decode_body::<A>(codec, body)?;
                f(service, args);
                Ok(Invoked::Done)
            });
            self.handlers.insert(method.to_owned(), handler);
        }
        self
    }

    /// Binds a method whose value arrives later.
    pub fn eventual<A: Args, R: Pack + Send + 'static>(
        &mut self,
        method: &str,
        f: impl Fn(&I, A) -> Eventual<R> + Send + Sync + 'static,
    ) -> &mut Self {
        if self.admit(method, A::ARITY, ReturnShape::Eventual) {
            let handler: Handler<I> = Box::new(move |service: &I, codec: &Codec, body: &[u8]| {
                let args = args::decode_body::<A>(codec, body)?;
                let pending = f(service, args).map(|value| Box::new(value) as Reply);
                Ok(Invoked::Pending(pending))
            });
            self.handlers.insert(method.to_owned(), handler);
        }
        self
    }

    pub(crate) fn finish(mut self) -> Result<HashMap<String, Handler<I>>> {
        for spec in self.contract.methods().iter() {
            let servable = !matches!(spec.returns(), ReturnShape::Unsupported(_));
            if servable && !self.handlers.contains_key(spec.name()) {
                self.problems.push(format!("{} has no handler", spec.name()));
            }
        }
        if !self.problems.is_empty() {
            self.problems.sort();
            return Err(Error::Configuration(format!(
                "cannot serve {}: {}",
                self.contract.address(),
                self.problems.join("; ")
            )));
        }
        Ok(self.handlers)
    }
}

/// Puts implementations on a transport.
pub struct Server {
    transport: Arc<dyn Transport>,
    codec: CodecConfig,
}

impl Server {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, codec: CodecConfig::default() }
    }

    pub fn codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    /// Serves `service` at the address of the contract `resolver` finds for `I`.
    pub async fn register<I: Interface + ?Sized>(&self, resolver: &Resolver, service: Arc<I>) -> Result<Registration> {
        self.register_contract(resolver.resolve::<I>()?, service).await
    }

    /// Serves `service` under an explicit contract.
    pub async fn register_contract<I: Interface + ?Sized>(
        &self,
        contract: Arc<Contract>,
        service: Arc<I>,
    ) -> Result<Registration> {
        let mut binder = Binder::new(contract.clone());
        I::bind(&mut binder);
        let handlers = binder.finish()?;
        let methods = handlers.len();

        let address = contract.address().to_owned();
        let dispatcher = Arc::new(Dispatcher { contract, service, handlers, codec: self.codec.clone() });

        let mut consumer = self.transport.register_consumer(&address).await?;
        consumer.on_message(Arc::new(move |message| dispatcher.handle(message)));
        debug!(address = %address, methods, "registered service");

        Ok(Registration { address, consumer })
    }
}

/// A served implementation.
///
/// Dropping the registration leaves the service on the bus; call
/// `unregister` to take it off.
pub struct Registration {
    address: String,
    consumer: Box<dyn Consumer>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("address", &self.address).finish()
    }
}

impl Registration {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn unregister(mut self) {
        self.consumer.unregister();
        debug!(address = %self.address, "unregistered service");
    }
}

struct Dispatcher<I: ?Sized> {
    contract: Arc<Contract>,
    service: Arc<I>,
    handlers: HashMap<String, Handler<I>>,
    codec: CodecConfig,
}

impl<I: ?Sized + Send + Sync + 'static> Dispatcher<I> {
    fn handle(&self, message: Inbound) {
        let address = self.contract.address();
        let method = message.headers().get(METHOD_HEADER).map(str::to_owned);
        let Some((name, handler)) = method.as_deref().and_then(|m| self.handlers.get_key_value(m)) else {
            let text = format!("Method {} not found", method.as_deref().unwrap_or("<none>"));
            error!(address, "{}", text);
            message.fail(FAILURE_METHOD_NOT_FOUND, text);
            return;
        };

        let invoked = self.codec.with_codec(|codec| {
            panic::catch_unwind(AssertUnwindSafe(|| handler(&*self.service, &*codec, message.body())))
        });

        match invoked {
            Ok(Ok(Invoked::Done)) => {}
            Ok(Ok(Invoked::Pending(pending))) => {
                let codec = self.codec.clone();
                pending.on_complete(move |outcome| respond(&codec, message, outcome));
            }
            Ok(Err(e)) => {
                error!(address, method = %name, error = %e, "dispatch failed");
                message.fail(FAILURE_INTERNAL, e.to_string());
            }
            Err(payload) => {
                let fault = panic_fault(payload);
                warn!(address, method = %name, fault = %fault, "implementation panicked");
                let codec = self.codec.clone();
                respond(&codec, message, Err(Error::Remote(fault)));
            }
        }
    }
}

/// Encodes the outcome of a call as the reply body.
fn respond(codec: &CodecConfig, message: Inbound, outcome: Result<Reply>) {
    let encoded = codec.with_codec(|codec| match &outcome {
        Ok(value) => codec.encode(value),
        Err(e) => codec.encode(&e.to_fault()),
    });
    match encoded {
        Ok(body) => message.reply(body),
        Err(e) => {
            error!(error = %e, "cannot encode reply");
            message.fail(FAILURE_INTERNAL, e.to_string());
        }
    }
}

fn panic_fault(payload: Box<dyn Any + Send>) -> Fault {
    let payload = match payload.downcast::<Fault>() {
        Ok(fault) => return *fault,
        Err(payload) => payload,
    };
    let message = match payload.downcast::<String>() {
        Ok(text) => *text,
        Err(payload) => match payload.downcast_ref::<&'static str>() {
            Some(text) => (*text).to_owned(),
            None => "handler panicked".to_owned(),
        },
    };
    Fault::new("panic", message)
}
