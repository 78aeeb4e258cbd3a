//! # Client Stubs
//!
//! A `Stub` turns method calls into bus traffic for one contract. Every
//! call goes through `invoke`; `call` and `notify` are typed shorthands for
//! the two supported return shapes.
//!
//! Service traits are implemented on a newtype around `Stub`, each method
//! forwarding to `call` or `notify`:
//!
//! ```ignore
//! struct CalculatorClient(Stub);
//!
//! impl Calculator for CalculatorClient {
//!     fn add(&self, a: i64, b: i64) -> Eventual<i64> {
//!         self.0.call("add", (a, b))
//!     }
//! }
//! ```

use std::sync::Arc;

use buspack::CodecConfig;
use buspack::Unpack;
use tracing::trace;
use tracing::warn;

use crate::args;
use crate::args::Args;
use crate::bridge;
use crate::contract::Contract;
use crate::contract::MethodSpec;
use crate::contract::ReturnShape;
use crate::error::Error;
use crate::error::Result;
use crate::eventual::Eventual;
use crate::resolver::Resolver;
use crate::transport::DeliveryOptions;
use crate::transport::Envelope;
use crate::transport::METHOD_HEADER;
use crate::transport::Transport;

struct StubInner {
    transport: Arc<dyn Transport>,
    contract: Arc<Contract>,
    codec: CodecConfig,
    options: DeliveryOptions,
}

/// The client side of a contract. Cloning is cheap.
#[derive(Clone)]
pub struct Stub {
    inner: Arc<StubInner>,
}

impl std::fmt::Debug for Stub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stub").field("address", &self.address()).finish()
    }
}

impl Stub {
    pub fn new(transport: Arc<dyn Transport>, contract: Arc<Contract>) -> Self {
        Self::builder(transport, contract).build()
    }

    pub fn builder(transport: Arc<dyn Transport>, contract: Arc<Contract>) -> StubBuilder {
        StubBuilder { transport, contract, codec: None, options: DeliveryOptions::default() }
    }

    /// A stub for the contract `resolver` finds for `T`.
    pub fn resolve<T: ?Sized + 'static>(transport: Arc<dyn Transport>, resolver: &Resolver) -> Result<Self> {
        Ok(Self::new(transport, resolver.resolve::<T>()?))
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.inner.contract
    }

    pub fn address(&self) -> &str {
        self.inner.contract.address()
    }

    fn spec(&self, method: &str) -> Result<&MethodSpec> {
        self.inner.contract.method(method).ok_or_else(|| Error::UndeclaredMethod {
            address: self.address().to_owned(),
            method: method.to_owned(),
        })
    }

    /// Sends one call.
    ///
    /// Returns `Ok(None)` for `Unit` methods, which are sent (or published)
    /// without waiting for anything, and the pending result for `Eventual`
    /// methods.
    ///
    /// # Errors
    /// Fails before touching the bus if the method is undeclared, the
    /// argument count is wrong, the return shape is unsupported, or the
    /// arguments cannot be encoded.
    pub fn invoke<A: Args, R: Unpack + Send + 'static>(&self, method: &str, args: A) -> Result<Option<Eventual<R>>> {
        let spec = self.spec(method)?;
        if let ReturnShape::Unsupported(returns) = spec.returns() {
            return Err(Error::Unsupported { method: method.to_owned(), returns: returns.clone() });
        }
        if A::ARITY != spec.arity() {
            return Err(Error::ArityMismatch { method: method.to_owned(), expected: spec.arity(), found: A::ARITY });
        }

        let inner = &self.inner;
        let body = inner.codec.with_codec(|codec| args::encode_body(codec, &args))?;
        let mut envelope = Envelope::new(inner.options.headers.clone(), body);
        envelope.headers_mut().insert(METHOD_HEADER, method);

        let address = inner.contract.address();
        if spec.returns() == &ReturnShape::Eventual {
            trace!(address, method, "call");
            let (completer, eventual) = Eventual::pending();
            let on_reply = bridge::reply_handler(inner.codec.clone(), completer);
            inner.transport.send(address, envelope, &inner.options, Some(on_reply));
            return Ok(Some(eventual));
        }

        if spec.is_publish() {
            trace!(address, method, "publish");
            inner.transport.publish(address, envelope, &inner.options);
        } else {
            trace!(address, method, "send");
            inner.transport.send(address, envelope, &inner.options, None);
        }
        Ok(None)
    }

    /// Calls an `Eventual` method. Synchronous failures come back as an
    /// already-failed handle.
    pub fn call<A: Args, R: Unpack + Send + 'static>(&self, method: &str, args: A) -> Eventual<R> {
        let declared = match self.spec(method) {
            Ok(spec) => spec.returns().clone(),
            Err(e) => return Eventual::failed(e),
        };
        if declared == ReturnShape::Unit {
            return Eventual::failed(Error::ShapeMismatch { method: method.to_owned(), declared });
        }
        match self.invoke(method, args) {
            Ok(Some(eventual)) => eventual,
            Ok(None) => Eventual::failed(Error::ShapeMismatch { method: method.to_owned(), declared }),
            Err(e) => Eventual::failed(e),
        }
    }

    /// Calls a `Unit` method.
    ///
    /// Failures are logged as well as returned, since one-way service
    /// methods usually have nowhere to report them.
    pub fn notify<A: Args>(&self, method: &str, args: A) -> Result<()> {
        let outcome = self.spec(method).and_then(|spec| match spec.returns() {
            ReturnShape::Eventual => {
                Err(Error::ShapeMismatch { method: method.to_owned(), declared: ReturnShape::Eventual })
            }
            _ => self.invoke::<A, ()>(method, args).map(|_| ()),
        });
        if let Err(e) = &outcome {
            warn!(address = self.address(), method, error = %e, "notify failed");
        }
        outcome
    }
}

pub struct StubBuilder {
    transport: Arc<dyn Transport>,
    contract: Arc<Contract>,
    codec: Option<CodecConfig>,
    options: DeliveryOptions,
}

impl StubBuilder {
    pub fn codec(mut self, codec: CodecConfig) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Timeout and extra headers passed to the transport on every send.
    pub fn options(mut self, options: DeliveryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Stub {
        Stub {
            inner: Arc::new(StubInner {
                transport: self.transport,
                contract: self.contract,
                codec: self.codec.unwrap_or_default(),
                options: self.options,
            }),
        }
    }
}
