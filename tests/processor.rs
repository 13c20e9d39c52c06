//! End-to-end processing over in-memory streams.

mod common;

use common::{key_not_found, KeyNotFound, KvStore};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::io::Cursor;
use std::sync::Arc;
use thriftmw::codec::{pack_args, unpack_results};
use thriftmw::protocol::{
    BinaryInputProtocol, BinaryOutputProtocol, InputProtocol, MessageIdentifier, MessageType,
    OutputProtocol, TType,
};
use thriftmw::server::context::from_fn;
use thriftmw::server::middleware::{self, TRACE_ID_KEY};
use thriftmw::server::{ServerConfig, TokenValidator};
use thriftmw::{
    ApplicationException, ApplicationExceptionKind, CallContext, Processor, RpcError, TypeDesc,
    Value,
};

/// Encodes a CALL message.
fn encode_call(name: &str, seq_id: i32, args: &[Value]) -> Vec<u8> {
    let mut out = BinaryOutputProtocol::new(Vec::new());
    out.write_message_begin(&MessageIdentifier::new(name, MessageType::Call, seq_id))
        .unwrap();
    pack_args(&format!("{name}_args"), args, &mut out).unwrap();
    out.write_message_end().unwrap();
    out.flush().unwrap();
    out.into_inner()
}

type Reply = (MessageIdentifier, Result<Vec<Value>, ApplicationException>);

/// Reads one reply message.
fn read_reply(iprot: &mut dyn InputProtocol, result_types: &[TypeDesc]) -> Reply {
    let header = iprot.read_message_begin().unwrap();
    let body = match header.message_type {
        MessageType::Exception => Err(ApplicationException::read(iprot).unwrap()),
        _ => Ok(unpack_results(result_types, iprot).unwrap()),
    };
    iprot.read_message_end().unwrap();
    (header, body)
}

fn decode_reply(bytes: Vec<u8>, result_types: &[TypeDesc]) -> Reply {
    let mut iprot = BinaryInputProtocol::new(Cursor::new(bytes));
    read_reply(&mut iprot, result_types)
}

fn call(processor: &Processor, request: Vec<u8>) -> (Result<(), RpcError>, Vec<u8>) {
    let mut iprot = BinaryInputProtocol::new(Cursor::new(request));
    let mut oprot = BinaryOutputProtocol::new(Vec::new());
    let outcome = processor.process(&mut iprot, &mut oprot);
    (outcome, oprot.into_inner())
}

fn put(processor: &Processor, key: &str, value: &str) {
    let (outcome, reply) = call(
        processor,
        encode_call("put", 1, &[Value::from(key), Value::from(value)]),
    );
    outcome.unwrap();
    let results = decode_reply(reply, &[TypeDesc::Error]).1.unwrap();
    assert!(results[0].is_null());
}

#[test]
fn test_put_then_get() {
    let processor = Processor::new(Arc::new(KvStore::default()));
    put(&processor, "color", "teal");

    let (outcome, reply) = call(&processor, encode_call("get", 2, &[Value::from("color")]));
    outcome.unwrap();

    let (header, body) = decode_reply(reply, &[key_not_found(), TypeDesc::String]);
    assert_eq!(header.name, "get");
    assert_eq!(header.sequence_id, 2);
    assert_eq!(body.unwrap(), vec![Value::Null, Value::from("teal")]);
}

#[test]
fn test_declared_exception_round_trip() {
    let processor = Processor::new(Arc::new(KvStore::default()));

    let (outcome, reply) = call(&processor, encode_call("get", 3, &[Value::from("nope")]));
    outcome.unwrap();

    let (header, body) = decode_reply(reply, &[key_not_found(), TypeDesc::String]);
    assert_eq!(header.message_type, MessageType::Reply);
    let results = body.unwrap();
    assert_eq!(
        results[0].downcast_struct::<KeyNotFound>(),
        Some(&KeyNotFound { key: "nope".into() })
    );
    assert!(results[1].is_null());
}

#[test]
fn test_handler_error_becomes_internal_error() {
    let processor = Processor::new(Arc::new(KvStore::default()));

    let (outcome, reply) = call(
        &processor,
        encode_call("put", 4, &[Value::from(""), Value::from("x")]),
    );

    assert!(matches!(outcome, Err(RpcError::Handler { .. })));
    let exc = decode_reply(reply, &[TypeDesc::Error]).1.unwrap_err();
    assert_eq!(exc.kind, ApplicationExceptionKind::InternalError);
    assert_eq!(exc.message, "Internal error processing put: empty key");
}

#[test]
fn test_containers() {
    let processor = Processor::new(Arc::new(KvStore::default()));
    put(&processor, "b", "22");
    put(&processor, "a", "1");

    let (_, reply) = call(&processor, encode_call("keys", 5, &[]));
    let keys = decode_reply(reply, &[TypeDesc::list(TypeDesc::String)]).1.unwrap();
    assert_eq!(
        keys[0],
        Value::list(TType::String, vec![Value::from("a"), Value::from("b")])
    );

    let (_, reply) = call(&processor, encode_call("lengths", 6, &[]));
    let lengths = decode_reply(reply, &[TypeDesc::map(TypeDesc::String, TypeDesc::I64)])
        .1
        .unwrap();
    let map = lengths[0].as_map().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&Value::from("b")), Some(&Value::I64(2)));
    assert_eq!(map.get(&Value::from("a")), Some(&Value::I64(1)));
}

#[test]
fn test_session_with_mixed_outcomes() {
    let store = Arc::new(KvStore::default());
    let processor = Processor::new(Arc::clone(&store));

    let mut request = encode_call("put", 1, &[Value::from("k"), Value::from("v")]);
    request.extend(encode_call("missing_method", 2, &[Value::from("k")]));
    request.extend(encode_call("put", 3, &[Value::from(""), Value::from("v")]));
    request.extend(encode_call("get", 4, &[Value::from("k")]));

    let mut output = Vec::new();
    processor.serve_io(Cursor::new(request), &mut output).unwrap();

    let mut replies = BinaryInputProtocol::new(Cursor::new(output));
    assert!(read_reply(&mut replies, &[TypeDesc::Error]).1.is_ok());

    let (header, unknown) = read_reply(&mut replies, &[]);
    assert_eq!(header.sequence_id, 2);
    assert_eq!(unknown.unwrap_err().kind, ApplicationExceptionKind::UnknownMethod);

    let failed = read_reply(&mut replies, &[TypeDesc::Error]).1;
    assert_eq!(failed.unwrap_err().kind, ApplicationExceptionKind::InternalError);

    let (header, found) = read_reply(&mut replies, &[key_not_found(), TypeDesc::String]);
    assert_eq!(header.sequence_id, 4);
    assert_eq!(found.unwrap()[1], Value::from("v"));

    assert_eq!(store.calls(), vec!["put", "put", "get"]);
}

#[test]
fn test_built_in_middleware_stack() {
    let store = Arc::new(KvStore::default());
    let mut processor = Processor::new(Arc::clone(&store));
    let trace_ids = Arc::new(Mutex::new(Vec::new()));
    let observer = {
        let trace_ids = Arc::clone(&trace_ids);
        from_fn(move |ctx: &mut CallContext| {
            if let Some(id) = ctx.metadata(TRACE_ID_KEY) {
                trace_ids.lock().push(id.to_string());
            }
        })
    };

    let validator = TokenValidator::new(vec![TokenValidator::hash_token("open-sesame")]);
    processor
        .use_middleware([middleware::logging(), middleware::tracing_span(), observer])
        .use_for_method("secure_get", [middleware::token_auth(validator, 0)]);

    put(&processor, "vault", "gold");

    let (outcome, reply) = call(
        &processor,
        encode_call(
            "secure_get",
            2,
            &[Value::from("open-sesame"), Value::from("vault")],
        ),
    );
    outcome.unwrap();
    let results = decode_reply(reply, &[key_not_found(), TypeDesc::String]).1.unwrap();
    assert_eq!(results[1], Value::from("gold"));

    let (outcome, reply) = call(
        &processor,
        encode_call("secure_get", 3, &[Value::from("guess"), Value::from("vault")]),
    );
    assert!(matches!(outcome, Err(RpcError::Aborted { .. })));
    let exc = decode_reply(reply, &[]).1.unwrap_err();
    assert_eq!(
        exc.message,
        "user middleware error processing secure_get: authentication failed"
    );

    // put needs no token
    assert_eq!(store.calls(), vec!["put", "secure_get"]);

    let ids = trace_ids.lock();
    assert_eq!(ids.len(), 3);
    assert!(ids[0] != ids[1] && ids[1] != ids[2]);
}

#[test]
fn test_configured_rate_limit_and_auth() {
    let mut config = ServerConfig::default();
    config.auth.required = true;
    config.auth.token_arg = 0;
    config.auth.token_hashes = vec![TokenValidator::hash_token("t0ken")];
    config.rate_limit.max_in_flight = 4;

    let store = Arc::new(KvStore::default());
    let mut processor = Processor::new(Arc::clone(&store));
    processor.apply_config(&config).unwrap();

    let (outcome, _) = call(
        &processor,
        encode_call("secure_get", 1, &[Value::from("t0ken"), Value::from("k")]),
    );
    outcome.unwrap();

    let (outcome, _) = call(&processor, encode_call("keys", 2, &[]));
    assert!(matches!(outcome, Err(RpcError::Aborted { .. })));
    assert_eq!(store.calls(), vec!["secure_get"]);
}

#[test]
fn test_concurrent_processing() {
    let processor = Arc::new(Processor::new(Arc::new(KvStore::default())));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let processor = Arc::clone(&processor);
            std::thread::spawn(move || {
                for i in 0..25 {
                    let key = format!("w{worker}-{i}");
                    put(&processor, &key, &i.to_string());
                    let (outcome, reply) =
                        call(&processor, encode_call("get", i, &[Value::from(key.as_str())]));
                    outcome.unwrap();
                    let results =
                        decode_reply(reply, &[key_not_found(), TypeDesc::String]).1.unwrap();
                    assert_eq!(results[1], Value::from(i.to_string()));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

proptest! {
    #[test]
    fn prop_put_get_round_trip(key in "[a-z]{1,16}", value in ".{0,64}") {
        let processor = Processor::new(Arc::new(KvStore::default()));
        put(&processor, &key, &value);

        let (outcome, reply) = call(&processor, encode_call("get", 7, &[Value::from(key.as_str())]));
        prop_assert!(outcome.is_ok());
        let results = decode_reply(reply, &[key_not_found(), TypeDesc::String]).1.unwrap();
        prop_assert_eq!(&results[1], &Value::from(value));
    }
}
