//! # Contracts
//!
//! A contract pairs a fixed bus address with the methods served there.
//! Stubs and dispatchers share one `Arc<Contract>` and never mutate it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::error::Result;

/// What a method hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnShape {
    /// Nothing. The call is fire-and-forget.
    Unit,
    /// One value, delivered later through an `Eventual`.
    Eventual,
    /// Anything else, named by its type. Calls fail before reaching the bus.
    Unsupported(String),
}

/// One method of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    name: String,
    arity: usize,
    returns: ReturnShape,
    publish: bool,
}

impl MethodSpec {
    pub fn new(name: impl Into<String>, arity: usize, returns: ReturnShape) -> Self {
        Self { name: name.into(), arity, returns, publish: false }
    }

    /// A `Unit` method sent to one consumer.
    pub fn one_way(name: impl Into<String>, arity: usize) -> Self {
        Self::new(name, arity, ReturnShape::Unit)
    }

    /// A `Unit` method broadcast to every consumer of the address.
    pub fn publish(name: impl Into<String>, arity: usize) -> Self {
        Self::new(name, arity, ReturnShape::Unit).broadcast()
    }

    pub fn eventual(name: impl Into<String>, arity: usize) -> Self {
        Self::new(name, arity, ReturnShape::Eventual)
    }

    pub fn unsupported(name: impl Into<String>, arity: usize, returns: impl Into<String>) -> Self {
        Self::new(name, arity, ReturnShape::Unsupported(returns.into()))
    }

    /// Sets the publish flag. It only takes effect on `Unit` methods.
    pub fn broadcast(mut self) -> Self {
        self.publish = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn returns(&self) -> &ReturnShape {
        &self.returns
    }

    /// True if calls are published rather than sent.
    pub fn is_publish(&self) -> bool {
        self.publish && self.returns == ReturnShape::Unit
    }
}

/// Method name to spec.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, MethodSpec>,
}

impl MethodTable {
    pub fn get(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodSpec> {
        self.methods.values()
    }
}

/// A service declaration: its address and its methods.
#[derive(Debug)]
pub struct Contract {
    address: String,
    methods: MethodTable,
}

impl Contract {
    /// Starts declaring the contract served at `address`.
    ///
    /// ```
    /// use busrpc::{Contract, MethodSpec};
    ///
    /// let contract = Contract::builder("calculator")
    ///     .method(MethodSpec::eventual("add", 2))
    ///     .method(MethodSpec::publish("reset", 0))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(contract.address(), "calculator");
    /// assert!(contract.method("reset").unwrap().is_publish());
    /// ```
    pub fn builder(address: impl Into<String>) -> ContractBuilder {
        ContractBuilder { address: address.into(), methods: Vec::new() }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.get(name)
    }
}

pub struct ContractBuilder {
    address: String,
    methods: Vec<MethodSpec>,
}

impl ContractBuilder {
    pub fn method(mut self, spec: MethodSpec) -> Self {
        self.methods.push(spec);
        self
    }

    /// # Errors
    /// `Error::Configuration` for an empty address or a repeated method name.
    pub fn build(self) -> Result<Arc<Contract>> {
        if self.address.is_empty() {
            return Err(Error::Configuration("contract address is empty".into()));
        }
        let mut methods = HashMap::with_capacity(self.methods.len());
        for spec in self.methods {
            if methods.contains_key(spec.name()) {
                return Err(Error::Configuration(format!(
                    "method {} declared twice on {}",
                    spec.name(),
                    self.address
                )));
            }
            methods.insert(spec.name.clone(), spec);
        }
        Ok(Arc::new(Contract { address: self.address, methods: MethodTable { methods } }))
    }
}
