use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use buspack::Codec;
use buspack::CodecConfig;
use buspack::Decoder;
use buspack::Encoder;
use buspack::Fault;
use buspack::Pack;
use buspack::Unpack;

use crate::args;
use crate::args::Args;
use crate::bridge;
use crate::contract::Contract;
use crate::contract::MethodSpec;
use crate::contract::ReturnShape;
use crate::error::Error;
use crate::eventual::Eventual;
use crate::resolver::Resolver;
use crate::transport::TransportError;

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: i32,
    y: i32,
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

// --- Contracts ---

#[test]
fn test_contract_rejects_duplicate_methods() {
    let err = Contract::builder("svc")
        .method(MethodSpec::eventual("get", 0))
        .method(MethodSpec::one_way("get", 1))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(msg) if msg.contains("get")));
}

#[test]
fn test_contract_rejects_empty_address() {
    let err = Contract::builder("").build().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_publish_flag_only_applies_to_unit() {
    let contract = Contract::builder("svc")
        .method(MethodSpec::publish("tick", 0))
        .method(MethodSpec::eventual("count", 0).broadcast())
        .build()
        .expect("valid contract");

    assert!(contract.method("tick").expect("tick").is_publish());
    assert!(!contract.method("count").expect("count").is_publish());
    assert_eq!(contract.methods().len(), 2);
}

// --- Resolver ---

trait Greeter {}
trait Auditor {}
trait Plain {}
struct Base;
struct Derived;
struct Orphan;

fn contract_at(address: &str) -> Arc<Contract> {
    Contract::builder(address).build().expect("valid contract")
}

#[test]
fn test_resolve_declared_type() -> crate::Result<()> {
    let mut resolver = Resolver::new();
    resolver.declare::<dyn Greeter>(contract_at("greeter"));
    assert_eq!(resolver.resolve::<dyn Greeter>()?.address(), "greeter");
    Ok(())
}

#[test]
fn test_resolve_first_capability_in_declaration_order() -> crate::Result<()> {
    let mut resolver = Resolver::new();
    resolver
        .declare::<dyn Greeter>(contract_at("greeter"))
        .declare::<dyn Auditor>(contract_at("auditor"))
        .implements::<Base, dyn Plain>()
        .implements::<Base, dyn Auditor>()
        .implements::<Base, dyn Greeter>();

    assert_eq!(resolver.resolve::<Base>()?.address(), "auditor");
    Ok(())
}

#[test]
fn test_resolve_walks_capabilities_before_parents() -> crate::Result<()> {
    let mut resolver = Resolver::new();
    resolver
        .declare::<dyn Greeter>(contract_at("greeter"))
        .declare::<dyn Auditor>(contract_at("auditor"))
        .implements::<Base, dyn Auditor>()
        .implements::<Derived, dyn Greeter>()
        .extends::<Derived, Base>();

    assert_eq!(resolver.resolve::<Derived>()?.address(), "greeter");
    Ok(())
}

#[test]
fn test_resolve_through_parent() -> crate::Result<()> {
    let mut resolver = Resolver::new();
    resolver
        .declare::<dyn Greeter>(contract_at("greeter"))
        .implements::<Base, dyn Greeter>()
        .implements::<Derived, dyn Plain>()
        .extends::<Derived, Base>();

    assert_eq!(resolver.resolve::<Derived>()?.address(), "greeter");
    // Cached results stay stable.
    assert_eq!(resolver.resolve::<Derived>()?.address(), "greeter");
    Ok(())
}

#[test]
fn test_resolve_missing_names_the_type() {
    let mut resolver = Resolver::new();
    resolver.extends::<Derived, Orphan>().extends::<Orphan, Derived>();
    let err = resolver.resolve::<Derived>().unwrap_err();
    assert!(matches!(err, Error::Configuration(msg) if msg.contains("Derived")));
}

// --- Arguments ---

fn roundtrip<A: Args + Clone>(args: A) -> buspack::Result<A> {
    let mut codec = Codec::new();
    let body = args::encode_body(&mut codec, &args)?;
    args::decode_body::<A>(&codec, &body)
}

#[test]
fn test_args_zero_arity_has_empty_body() -> buspack::Result<()> {
    let mut codec = Codec::new();
    assert!(args::encode_body(&mut codec, &())?.is_empty());
    // The body is never read for zero arguments.
    args::decode_body::<()>(&codec, &[0xFF, 0xFF])?;
    Ok(())
}

#[test]
fn test_args_roundtrip_by_arity() -> buspack::Result<()> {
    assert_eq!(roundtrip((Some("one".to_string()),))?, (Some("one".to_string()),));
    assert_eq!(roundtrip((None::<String>,))?, (None,));

    let point = Point { x: 1, y: -1 };
    let nested = (point.clone(), "text".to_string(), vec![Some(point.clone()), None]);
    assert_eq!(roundtrip(nested.clone())?, nested);
    Ok(())
}

#[test]
fn test_args_reject_trailing_values() -> buspack::Result<()> {
    let mut codec = Codec::new();
    let body = args::encode_body(&mut codec, &(1u8, 2u8))?;
    let err = args::decode_body::<(u8,)>(&codec, &body).unwrap_err();
    assert!(matches!(err, buspack::Error::TrailingBytes(_)));
    Ok(())
}

#[test]
fn test_args_reject_missing_values() -> buspack::Result<()> {
    let mut codec = Codec::new();
    let body = args::encode_body(&mut codec, &(1u8,))?;
    let err = args::decode_body::<(u8, u8)>(&codec, &body).unwrap_err();
    assert_eq!(err, buspack::Error::UnexpectedEnd);
    Ok(())
}

// --- Eventual ---

#[tokio::test]
async fn test_eventual_completes_once() {
    let (completer, eventual) = Eventual::<u32>::pending();
    assert!(!eventual.is_complete());
    completer.succeed(7);
    assert!(eventual.is_complete());
    assert_eq!(eventual.await.expect("value"), 7);
}

#[tokio::test]
async fn test_eventual_wakes_waiting_task() {
    let (completer, eventual) = Eventual::<String>::pending();
    let waiter = tokio::spawn(eventual);
    tokio::task::yield_now().await;
    completer.succeed("late".into());
    assert_eq!(waiter.await.expect("join").expect("value"), "late");
}

#[tokio::test]
async fn test_dropped_completer_abandons() {
    let (completer, eventual) = Eventual::<u32>::pending();
    drop(completer);
    assert!(matches!(eventual.await, Err(Error::Abandoned)));
}

#[test]
fn test_on_complete_runs_on_completing_context() {
    let seen = Arc::new(AtomicUsize::new(0));
    let (completer, eventual) = Eventual::<usize>::pending();

    let sink = seen.clone();
    eventual.on_complete(move |result| {
        sink.store(result.expect("value"), Ordering::SeqCst);
    });
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    completer.succeed(3);
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

#[test]
fn test_on_complete_runs_immediately_when_ready() {
    let seen = Arc::new(AtomicUsize::new(0));
    let sink = seen.clone();
    Eventual::ready(5usize).on_complete(move |result| {
        sink.store(result.expect("value"), Ordering::SeqCst);
    });
    assert_eq!(seen.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_eventual_map_and_failure() {
    let doubled = Eventual::ready(21u32).map(|v| v * 2);
    assert_eq!(doubled.await.expect("value"), 42);

    let failed = Eventual::<u32>::fault(Fault::new("Nope", "bad")).map(|v| v + 1);
    let err = failed.await.unwrap_err();
    assert!(matches!(err, Error::Remote(f) if f.kind() == "Nope"));
}

// --- Reply bridge ---

#[test]
fn test_decode_reply_empty_body_is_absent() {
    let codec = CodecConfig::new();
    assert_eq!(bridge::decode_reply::<Option<String>>(&codec, &[]).expect("absent"), None);
    let err = bridge::decode_reply::<String>(&codec, &[]).unwrap_err();
    assert!(matches!(err, Error::Codec(buspack::Error::Absent)));
}

#[test]
fn test_decode_reply_value_or_fault() -> anyhow::Result<()> {
    let codec = CodecConfig::new();
    let value = codec.with_codec(|c| c.encode(&Point { x: 2, y: 3 }))?;
    assert_eq!(bridge::decode_reply::<Point>(&codec, &value)?, Point { x: 2, y: 3 });

    let fault = codec.with_codec(|c| c.encode(&Fault::new("Boom", "remote").with_code(4)))?;
    let err = bridge::decode_reply::<Point>(&codec, &fault).unwrap_err();
    let Error::Remote(fault) = &err else {
        anyhow::bail!("expected a remote failure, got {err:?}");
    };
    assert_eq!((fault.kind(), fault.message(), fault.code()), ("Boom", "remote", 4));
    Ok(())
}

#[tokio::test]
async fn test_reply_handler_completes_with_transport_errors() {
    let codec = CodecConfig::new();

    let (completer, eventual) = Eventual::<u8>::pending();
    bridge::reply_handler(codec.clone(), completer)(Err(TransportError::Timeout));
    assert!(matches!(eventual.await, Err(Error::Transport(TransportError::Timeout))));

    let (completer, eventual) = Eventual::<u8>::pending();
    let not_found = TransportError::Recipient { code: crate::FAILURE_METHOD_NOT_FOUND, message: "Method x not found".into() };
    bridge::reply_handler(codec.clone(), completer)(Err(not_found));
    assert!(matches!(eventual.await, Err(Error::MethodNotFound(msg)) if msg == "Method x not found"));

    let (completer, eventual) = Eventual::<u8>::pending();
    let internal = TransportError::Recipient { code: crate::FAILURE_INTERNAL, message: "broken".into() };
    bridge::reply_handler(codec.clone(), completer)(Err(internal));
    assert!(matches!(eventual.await, Err(Error::Dispatch(_))));

    let (completer, eventual) = Eventual::<u8>::pending();
    let other = TransportError::Recipient { code: 42, message: "custom".into() };
    bridge::reply_handler(codec, completer)(Err(other));
    assert!(matches!(eventual.await, Err(Error::Transport(TransportError::Recipient { code: 42, .. }))));
}

// --- Binder ---

trait Counter: Send + Sync {
    fn add(&self, n: u32) -> Eventual<u32>;
    fn reset(&self);
}

impl crate::Interface for dyn Counter {
    fn bind(binder: &mut crate::Binder<Self>) {
        binder
            .eventual("add", |counter, (n,): (u32,)| counter.add(n))
            .one_way("reset", |counter, ()| counter.reset());
    }
}

fn counter_contract(extra: Option<MethodSpec>) -> Arc<Contract> {
    let mut builder = Contract::builder("counter")
        .method(MethodSpec::eventual("add", 1))
        .method(MethodSpec::one_way("reset", 0));
    if let Some(extra) = extra {
        builder = builder.method(extra);
    }
    builder.build().expect("valid contract")
}

fn bind_counter(contract: Arc<Contract>) -> crate::Result<usize> {
    let mut binder = crate::Binder::<dyn Counter>::new(contract);
    <dyn Counter as crate::Interface>::bind(&mut binder);
    binder.finish().map(|handlers| handlers.len())
}

#[test]
fn test_binder_accepts_complete_binding() -> crate::Result<()> {
    assert_eq!(bind_counter(counter_contract(None))?, 2);
    // Unsupported methods cannot be served and need no handler.
    assert_eq!(bind_counter(counter_contract(Some(MethodSpec::unsupported("peek", 0, "u32"))))?, 2);
    Ok(())
}

#[test]
fn test_binder_reports_unbound_method() {
    let err = bind_counter(counter_contract(Some(MethodSpec::eventual("total", 0)))).unwrap_err();
    assert!(matches!(err, Error::Configuration(msg) if msg.contains("total has no handler")));
}

#[test]
fn test_binder_reports_shape_and_arity_mismatch() {
    let contract = Contract::builder("counter")
        .method(MethodSpec::eventual("add", 2))
        .method(MethodSpec::eventual("reset", 0))
        .build()
        .expect("valid contract");
    let Err(Error::Configuration(msg)) = bind_counter(contract) else {
        panic!("expected a configuration error");
    };
    assert!(msg.contains("add takes 2 arguments"));
    assert!(msg.contains(&format!("reset is declared {:?}", ReturnShape::Eventual)));
}
