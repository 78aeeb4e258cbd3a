//! Shared fixtures: a test service exercising every supported method shape.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use buspack::Decoder;
use buspack::Encoder;
use buspack::Pack;
use buspack::Unpack;
use busrpc::Binder;
use busrpc::Contract;
use busrpc::Eventual;
use busrpc::Fault;
use busrpc::Interface;
use busrpc::LocalBus;
use busrpc::MethodSpec;
use busrpc::Registration;
use busrpc::Resolver;
use busrpc::Server;
use busrpc::Stub;
use busrpc::Throwable;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

pub const ADDRESS: &str = "test.service";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Pack for Point {
    fn pack(&self, enc: &mut Encoder) -> buspack::Result<()> {
        enc.record("Point", |enc| {
            enc.entry("x", &self.x)?;
            enc.entry("y", &self.y)
        })
    }
}

impl Unpack for Point {
    fn unpack(dec: &mut Decoder<'_>) -> buspack::Result<Self> {
        let mut fields = dec.record("Point")?;
        Ok(Point { x: fields.take("x")?, y: fields.take("y")? })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestObject {
    pub str: Option<String>,
    pub num: i32,
    pub point: Option<Point>,
}

impl TestObject {
    pub fn sample() -> Self {
        TestObject { str: Some("test".into()), num: 10, point: Some(Point { x: 5, y: 10 }) }
    }
}

impl Pack for TestObject {
    fn pack(&self, enc: &mut Encoder) -> buspack::Result<()> {
        enc.record("TestObject", |enc| {
            enc.entry("str", &self.str)?;
            enc.entry("num", &self.num)?;
            enc.entry("point", &self.point)
        })
    }
}

impl Unpack for TestObject {
    fn unpack(dec: &mut Decoder<'_>) -> buspack::Result<Self> {
        let mut fields = dec.record("TestObject")?;
        Ok(TestObject { str: fields.take("str")?, num: fields.take("num")?, point: fields.take("point")? })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestError {
    pub code: i16,
    pub message: String,
}

impl TestError {
    pub fn sample() -> Self {
        TestError { code: 10, message: "test".into() }
    }
}

impl Throwable for TestError {
    const KIND: &'static str = "TestError";

    fn to_fault(&self) -> Fault {
        Fault::new(Self::KIND, self.message.clone()).with_code(self.code.into())
    }

    fn from_fault(fault: &Fault) -> Option<Self> {
        let code = i16::try_from(fault.code()).ok()?;
        Some(TestError { code, message: fault.message().to_owned() })
    }
}

fn unexpected(method: &str) -> ! {
    panic!("unexpected call to {method}")
}

/// Every supported method shape. Implementations override what a test needs.
pub trait TestService: Send + Sync {
    fn void_method(&self) { unexpected("voidMethod") }
    fn void_method_string_params(&self, _param: Option<String>) { unexpected("voidMethodStringParams") }
    fn void_method_bean_params(&self, _param: TestObject) { unexpected("voidMethodBeanParams") }
    fn announce(&self, _text: String) { unexpected("announce") }
    fn string_method(&self) -> Eventual<Option<String>> { unexpected("stringMethod") }
    fn string_method_string_params(&self, _param: Option<String>) -> Eventual<Option<String>> {
        unexpected("stringMethodStringParams")
    }
    fn string_method_bean_params(&self, _param: TestObject) -> Eventual<Option<String>> {
        unexpected("stringMethodBeanParams")
    }
    fn bean_method(&self) -> Eventual<TestObject> { unexpected("beanMethod") }
    fn bean_method_string_params(&self, _param: String) -> Eventual<TestObject> {
        unexpected("beanMethodStringParams")
    }
    fn bean_method_bean_params(&self, _param: TestObject) -> Eventual<TestObject> {
        unexpected("beanMethodBeanParams")
    }
    fn map_method_bean_string_params(&self, _param: TestObject, _text: String) -> Eventual<HashMap<String, String>> {
        unexpected("mapMethodBeanStringParams")
    }
}

impl Interface for dyn TestService {
    fn bind(binder: &mut Binder<Self>) {
        binder
            .one_way("voidMethod", |s, ()| s.void_method())
            .one_way("voidMethodStringParams", |s, (param,): (Option<String>,)| s.void_method_string_params(param))
            .one_way("voidMethodBeanParams", |s, (param,): (TestObject,)| s.void_method_bean_params(param))
            .one_way("announce", |s, (text,): (String,)| s.announce(text))
            .eventual("stringMethod", |s, ()| s.string_method())
            .eventual("stringMethodStringParams", |s, (param,): (Option<String>,)| s.string_method_string_params(param))
            .eventual("stringMethodBeanParams", |s, (param,): (TestObject,)| s.string_method_bean_params(param))
            .eventual("beanMethod", |s, ()| s.bean_method())
            .eventual("beanMethodStringParams", |s, (param,): (String,)| s.bean_method_string_params(param))
            .eventual("beanMethodBeanParams", |s, (param,): (TestObject,)| s.bean_method_bean_params(param))
            .eventual("mapMethodBeanStringParams", |s, (param, text): (TestObject, String)| {
                s.map_method_bean_string_params(param, text)
            });
    }
}

pub fn contract() -> Arc<Contract> {
    contract_builder(ADDRESS).build().expect("valid contract")
}

/// The test contract, open for additions.
pub fn contract_builder(address: &str) -> busrpc::ContractBuilder {
    Contract::builder(address)
        .method(MethodSpec::one_way("voidMethod", 0))
        .method(MethodSpec::one_way("voidMethodStringParams", 1))
        .method(MethodSpec::one_way("voidMethodBeanParams", 1))
        .method(MethodSpec::publish("announce", 1))
        .method(MethodSpec::eventual("stringMethod", 0))
        .method(MethodSpec::eventual("stringMethodStringParams", 1))
        .method(MethodSpec::eventual("stringMethodBeanParams", 1))
        .method(MethodSpec::eventual("beanMethod", 0))
        .method(MethodSpec::eventual("beanMethodStringParams", 1))
        .method(MethodSpec::eventual("beanMethodBeanParams", 1))
        .method(MethodSpec::eventual("mapMethodBeanStringParams", 2))
        .method(MethodSpec::unsupported("counter", 0, "u64"))
}

pub fn resolver() -> Resolver {
    let mut resolver = Resolver::new();
    resolver.declare::<dyn TestService>(contract());
    resolver
}

/// The client side of `TestService`.
#[derive(Debug, Clone)]
pub struct TestServiceClient(pub Stub);

impl TestService for TestServiceClient {
    fn void_method(&self) {
        let _ = self.0.notify("voidMethod", ());
    }

    fn void_method_string_params(&self, param: Option<String>) {
        let _ = self.0.notify("voidMethodStringParams", (param,));
    }

    fn void_method_bean_params(&self, param: TestObject) {
        let _ = self.0.notify("voidMethodBeanParams", (param,));
    }

    fn announce(&self, text: String) {
        let _ = self.0.notify("announce", (text,));
    }

    fn string_method(&self) -> Eventual<Option<String>> {
        self.0.call("stringMethod", ())
    }

    fn string_method_string_params(&self, param: Option<String>) -> Eventual<Option<String>> {
        self.0.call("stringMethodStringParams", (param,))
    }

    fn string_method_bean_params(&self, param: TestObject) -> Eventual<Option<String>> {
        self.0.call("stringMethodBeanParams", (param,))
    }

    fn bean_method(&self) -> Eventual<TestObject> {
        self.0.call("beanMethod", ())
    }

    fn bean_method_string_params(&self, param: String) -> Eventual<TestObject> {
        self.0.call("beanMethodStringParams", (param,))
    }

    fn bean_method_bean_params(&self, param: TestObject) -> Eventual<TestObject> {
        self.0.call("beanMethodBeanParams", (param,))
    }

    fn map_method_bean_string_params(&self, param: TestObject, text: String) -> Eventual<HashMap<String, String>> {
        self.0.call("mapMethodBeanStringParams", (param, text))
    }
}

pub async fn serve(bus: &LocalBus, service: impl TestService + 'static) -> Registration {
    let service: Arc<dyn TestService> = Arc::new(service);
    Server::new(Arc::new(bus.clone()))
        .register(&resolver(), service)
        .await
        .expect("service registers")
}

pub fn client(bus: &LocalBus) -> TestServiceClient {
    let stub = Stub::resolve::<dyn TestService>(Arc::new(bus.clone()), &resolver()).expect("contract resolves");
    TestServiceClient(stub)
}

/// Waits for the next value a service reported, failing the test after a few seconds.
pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for the service")
        .expect("service dropped its reporter")
}
