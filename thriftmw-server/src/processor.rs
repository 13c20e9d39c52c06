//! Call processing.
//!
//! For every inbound message the processor decodes the arguments, runs the
//! middleware chain around the handler and writes exactly one reply: the
//! packed results, or an application exception.

use crate::config::{ConfigError, ServerConfig};
use crate::context::{ContextPool, Middleware};
use crate::dispatch::{DispatchTable, Service};
use crate::error::RpcError;
use crate::middleware;
use crate::TokenValidator;
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use thriftmw_codec::{pack, unpack, Value};
use thriftmw_protocol::{
    ApplicationException, ApplicationExceptionKind, BinaryInputProtocol, BinaryOutputProtocol,
    InputProtocol, MessageIdentifier, MessageType, OutputProtocol, TType,
};

/// Dispatches calls to a [`Service`] through a middleware chain.
///
/// Register middleware before sharing the processor; `process` takes
/// `&self` and may run concurrently from many connections.
pub struct Processor {
    table: DispatchTable,
    global: Vec<Middleware>,
    per_method: HashMap<String, Vec<Middleware>>,
    contexts: ContextPool,
    max_message_size: usize,
    strict_read: bool,
}

impl Processor {
    pub fn new<S: Service>(service: Arc<S>) -> Self {
        Self::with_table(DispatchTable::build(service))
    }

    pub fn with_table(table: DispatchTable) -> Self {
        let defaults = ServerConfig::default();
        Self {
            table,
            global: Vec::new(),
            per_method: HashMap::new(),
            contexts: ContextPool::default(),
            max_message_size: defaults.max_message_size,
            strict_read: defaults.strict_read,
        }
    }

    /// Appends middleware that runs for every method.
    pub fn use_middleware<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Middleware>,
    {
        self.global.extend(middleware);
        self
    }

    /// Appends middleware that runs only for `method`, after all global
    /// middleware.
    pub fn use_for_method<I>(&mut self, method: impl Into<String>, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Middleware>,
    {
        let method = method.into();
        if !self.table.contains(&method) {
            tracing::warn!("Middleware registered for unknown method {}", method);
        }
        self.per_method.entry(method).or_default().extend(middleware);
        self
    }

    /// Applies limits and installs the rate limit and token auth middleware
    /// the configuration asks for.
    pub fn apply_config(&mut self, config: &ServerConfig) -> Result<&mut Self, ConfigError> {
        config.validate()?;
        self.max_message_size = config.max_message_size;
        self.strict_read = config.strict_read;

        if config.rate_limit.is_enabled() {
            tracing::info!(
                "Limiting to {} calls in flight",
                config.rate_limit.max_in_flight
            );
            self.global
                .push(middleware::rate_limit(config.rate_limit.max_in_flight));
        }

        if config.auth.required {
            let validator = TokenValidator::from_config(&config.auth);
            tracing::info!(
                "Token authentication enabled ({} tokens, argument {})",
                validator.token_count(),
                config.auth.token_arg
            );
            self.global
                .push(middleware::token_auth(validator, config.auth.token_arg));
        }

        Ok(self)
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// Handles one call.
    ///
    /// Returns `Ok` when a normal reply was written. Every error other than
    /// a fatal one (see [`RpcError::is_fatal`]) has already been answered
    /// with an application exception.
    pub fn process(
        &self,
        iprot: &mut dyn InputProtocol,
        oprot: &mut dyn OutputProtocol,
    ) -> Result<(), RpcError> {
        let message = iprot.read_message_begin().map_err(|e| {
            if e.is_eof() {
                RpcError::Closed
            } else {
                RpcError::Transport(e)
            }
        })?;
        let name = message.name;
        let seq_id = message.sequence_id;
        tracing::debug!("Received call {} (seq {})", name, seq_id);

        let Some(method) = self.table.get(&name).cloned() else {
            tracing::warn!("Unknown method {} (seq {})", name, seq_id);
            let skipped = iprot
                .skip(TType::Struct)
                .and_then(|()| iprot.read_message_end());
            let exc = ApplicationException::new(
                ApplicationExceptionKind::UnknownMethod,
                format!("Unknown function {name}"),
            );
            write_exception(oprot, &name, seq_id, &exc)?;
            skipped?;
            return Err(RpcError::UnknownMethod(name));
        };

        let mut args = match unpack(method.params(), iprot) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("Bad arguments for {} (seq {}): {}", name, seq_id, e);
                if let Err(end) = iprot.read_message_end() {
                    tracing::debug!("Failed to finish reading {}: {}", name, end);
                }
                let exc =
                    ApplicationException::new(ApplicationExceptionKind::ProtocolError, e.to_string());
                write_exception(oprot, &name, seq_id, &exc)?;
                return Err(RpcError::Protocol(e));
            }
        };
        iprot.read_message_end()?;
        // trailing arguments the caller left out
        args.resize_with(method.params().len(), || Value::Null);

        let (results, abort_error) = {
            let mut ctx = self.contexts.get();
            ctx.populate(&name, seq_id, Arc::clone(&method), args);
            let per_method = self.per_method.get(&name).map_or(&[][..], Vec::as_slice);
            ctx.set_chain(&self.global, per_method);
            ctx.next();
            (ctx.take_results(), ctx.take_error())
        };

        if let Some(err) = abort_error {
            let exc = ApplicationException::new(
                ApplicationExceptionKind::InternalError,
                format!("user middleware error processing {name}: {err}"),
            );
            write_exception(oprot, &name, seq_id, &exc)?;
            return Err(RpcError::Aborted {
                method: name,
                source: err,
            });
        }

        let handler_error = results.iter().find_map(|value| match value {
            Value::Error(e) => Some(e.to_string()),
            _ => None,
        });
        if let Some(message) = handler_error {
            tracing::warn!("Handler error in {} (seq {}): {}", name, seq_id, message);
            let exc = ApplicationException::new(
                ApplicationExceptionKind::InternalError,
                format!("Internal error processing {name}: {message}"),
            );
            write_exception(oprot, &name, seq_id, &exc)?;
            return Err(RpcError::Handler {
                method: name,
                message,
            });
        }

        let reply = MessageIdentifier::new(name.as_str(), MessageType::Reply, seq_id);
        let struct_name = format!("{name}_result");
        write_message(oprot, &reply, |oprot| {
            pack(&struct_name, &results, oprot).map_err(RpcError::Encode)
        })
    }

    /// Processes calls until the peer disconnects or the stream breaks.
    ///
    /// Returns `Ok` when the peer closes the connection between calls.
    pub fn serve(
        &self,
        iprot: &mut dyn InputProtocol,
        oprot: &mut dyn OutputProtocol,
    ) -> Result<(), RpcError> {
        loop {
            match self.process(iprot, oprot) {
                Ok(()) => {}
                Err(RpcError::Closed) => {
                    tracing::debug!("Peer closed the connection");
                    return Ok(());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::debug!("Call failed: {}", e),
            }
        }
    }

    /// Serves a connection over the binary protocol, applying the
    /// configured size limit and header strictness.
    pub fn serve_io<R: Read, W: Write>(&self, reader: R, writer: W) -> Result<(), RpcError> {
        let mut iprot = BinaryInputProtocol::new(reader)
            .with_strict_read(self.strict_read)
            .with_max_size(self.max_message_size);
        let mut oprot = BinaryOutputProtocol::new(writer);
        self.serve(&mut iprot, &mut oprot)
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("methods", &self.table.names())
            .field("global_middleware", &self.global.len())
            .field("method_middleware", &self.per_method.len())
            .field("max_message_size", &self.max_message_size)
            .finish()
    }
}

fn write_exception(
    oprot: &mut dyn OutputProtocol,
    name: &str,
    seq_id: i32,
    exc: &ApplicationException,
) -> Result<(), RpcError> {
    let header = MessageIdentifier::new(name, MessageType::Exception, seq_id);
    write_message(oprot, &header, |oprot| exc.write(oprot).map_err(RpcError::from))
}

/// Writes begin, payload, end and flush. All four steps are attempted; the
/// first failure is returned.
fn write_message<F>(
    oprot: &mut dyn OutputProtocol,
    header: &MessageIdentifier,
    payload: F,
) -> Result<(), RpcError>
where
    F: FnOnce(&mut dyn OutputProtocol) -> Result<(), RpcError>,
{
    let begin = oprot.write_message_begin(header).map_err(RpcError::from);
    let body = payload(&mut *oprot);
    let end = oprot.write_message_end().map_err(RpcError::from);
    let flush = oprot.flush().map_err(RpcError::from);
    begin.and(body).and(end).and(flush)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{from_fn, CallContext};
    use crate::dispatch::MethodRegistry;
    use parking_lot::Mutex;
    use std::any::Any;
    use std::io::{self, Cursor};
    use thriftmw_codec::{pack_args, unpack_results, TypeDesc, WireStruct};
    use thriftmw_protocol::{FieldIdentifier, ProtocolError};

    #[derive(Debug, Default, PartialEq)]
    struct NotFound {
        key: String,
    }

    impl WireStruct for NotFound {
        fn read(&mut self, iprot: &mut dyn InputProtocol) -> Result<(), ProtocolError> {
            iprot.read_struct_begin()?;
            loop {
                let field = iprot.read_field_begin()?;
                if field.is_stop() {
                    break;
                }
                match (field.id, field.field_type) {
                    (1, TType::String) => self.key = iprot.read_string()?,
                    (_, other) => iprot.skip(other)?,
                }
                iprot.read_field_end()?;
            }
            iprot.read_struct_end()
        }

        fn write(&self, oprot: &mut dyn OutputProtocol) -> Result<(), ProtocolError> {
            oprot.write_struct_begin("NotFound")?;
            oprot.write_field_begin(&FieldIdentifier::named("key", TType::String, 1))?;
            oprot.write_string(&self.key)?;
            oprot.write_field_end()?;
            oprot.write_field_stop()?;
            oprot.write_struct_end()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn error_message(&self) -> Option<String> {
            Some(format!("no such key: {}", self.key))
        }
    }

    struct Store {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Service for Store {
        fn register(self: Arc<Self>, registry: &mut MethodRegistry) {
            let this = Arc::clone(&self);
            registry
                .method(
                    "add",
                    vec![TypeDesc::I32, TypeDesc::I32],
                    vec![TypeDesc::I32],
                    move |args| {
                        this.log.lock().push("terminal".into());
                        vec![Value::I32(args.iter().filter_map(Value::as_i32).sum())]
                    },
                )
                .method("fail", vec![], vec![TypeDesc::Error], |_| {
                    vec![Value::error("disk full")]
                })
                .method(
                    "lookup",
                    vec![TypeDesc::String],
                    vec![TypeDesc::of_struct::<NotFound>("NotFound"), TypeDesc::String],
                    |args| match args[0].as_str() {
                        Some("missing") => vec![
                            Value::from_struct(NotFound {
                                key: "missing".into(),
                            }),
                            Value::Null,
                        ],
                        Some(key) => vec![Value::Null, Value::from(format!("value of {key}"))],
                        None => vec![Value::Null, Value::Null],
                    },
                );
        }
    }

    fn store() -> (Processor, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let processor = Processor::new(Arc::new(Store {
            log: Arc::clone(&log),
        }));
        (processor, log)
    }

    fn call(name: &str, seq_id: i32, args: &[Value]) -> Vec<u8> {
        let mut out = BinaryOutputProtocol::new(Vec::new());
        out.write_message_begin(&MessageIdentifier::new(name, MessageType::Call, seq_id))
            .unwrap();
        pack_args(&format!("{name}_args"), args, &mut out).unwrap();
        out.write_message_end().unwrap();
        out.flush().unwrap();
        out.into_inner()
    }

    fn run(processor: &Processor, request: Vec<u8>) -> (Result<(), RpcError>, Vec<u8>) {
        let mut iprot = BinaryInputProtocol::new(Cursor::new(request));
        let mut oprot = BinaryOutputProtocol::new(Vec::new());
        let outcome = processor.process(&mut iprot, &mut oprot);
        (outcome, oprot.into_inner())
    }

    type Reply = (MessageIdentifier, Result<Vec<Value>, ApplicationException>);

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

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Middleware {
        let log = Arc::clone(log);
        from_fn(move |ctx: &mut CallContext| {
            log.lock().push(name.to_string());
            ctx.next();
        })
    }

    #[test]
    fn test_normal_reply() {
        let (processor, _) = store();
        let (outcome, reply) = run(&processor, call("add", 11, &[Value::I32(2), Value::I32(40)]));
        outcome.unwrap();

        let (header, body) = decode_reply(reply, &[TypeDesc::I32]);
        assert_eq!(header.name, "add");
        assert_eq!(header.message_type, MessageType::Reply);
        assert_eq!(header.sequence_id, 11);
        assert_eq!(body.unwrap(), vec![Value::I32(42)]);
    }

    #[test]
    fn test_chain_order() {
        let (mut processor, log) = store();
        processor
            .use_middleware([recording(&log, "A"), recording(&log, "B")])
            .use_for_method("add", [recording(&log, "C")]);

        let (outcome, _) = run(&processor, call("add", 1, &[Value::I32(1), Value::I32(1)]));
        outcome.unwrap();

        assert_eq!(*log.lock(), vec!["A", "B", "C", "terminal"]);
    }

    #[test]
    fn test_method_middleware_is_not_shared() {
        let (mut processor, log) = store();
        processor.use_for_method("lookup", [recording(&log, "C")]);

        let (outcome, _) = run(&processor, call("add", 1, &[Value::I32(1), Value::I32(1)]));
        outcome.unwrap();

        assert_eq!(*log.lock(), vec!["terminal"]);
    }

    #[test]
    fn test_abort_skips_rest_of_chain() {
        let (mut processor, log) = store();
        let blocker = {
            let log = Arc::clone(&log);
            from_fn(move |ctx: &mut CallContext| {
                log.lock().push("B".into());
                ctx.abort("quota exceeded");
            })
        };
        processor
            .use_middleware([recording(&log, "A"), blocker])
            .use_for_method("add", [recording(&log, "C")]);

        let (outcome, reply) = run(&processor, call("add", 5, &[Value::I32(1), Value::I32(2)]));

        assert!(matches!(outcome, Err(RpcError::Aborted { .. })));
        assert_eq!(*log.lock(), vec!["A", "B"]);

        let (header, body) = decode_reply(reply, &[TypeDesc::I32]);
        assert_eq!(header.message_type, MessageType::Exception);
        assert_eq!(header.sequence_id, 5);
        let exc = body.unwrap_err();
        assert_eq!(exc.kind, ApplicationExceptionKind::InternalError);
        assert_eq!(exc.message, "user middleware error processing add: quota exceeded");
    }

    #[test]
    fn test_abort_wins_over_results() {
        let (mut processor, log) = store();
        let late = from_fn(|ctx: &mut CallContext| {
            ctx.next();
            assert_eq!(ctx.results(), &[Value::I32(3)]);
            ctx.abort("rejected after the fact");
        });
        processor.use_middleware([late]);

        let (outcome, reply) = run(&processor, call("add", 2, &[Value::I32(1), Value::I32(2)]));

        assert!(matches!(outcome, Err(RpcError::Aborted { .. })));
        assert_eq!(*log.lock(), vec!["terminal"]);
        let exc = decode_reply(reply, &[TypeDesc::I32]).1.unwrap_err();
        assert_eq!(exc.kind, ApplicationExceptionKind::InternalError);
    }

    #[test]
    fn test_abort_wins_over_handler_error() {
        let (mut processor, _) = store();
        let late = from_fn(|ctx: &mut CallContext| {
            ctx.next();
            ctx.abort("checksum mismatch");
        });
        processor.use_for_method("fail", [late]);

        let (outcome, reply) = run(&processor, call("fail", 5, &[]));

        assert!(matches!(outcome, Err(RpcError::Aborted { ref method, .. }) if method == "fail"));
        let exc = decode_reply(reply, &[TypeDesc::Error]).1.unwrap_err();
        assert_eq!(exc.kind, ApplicationExceptionKind::InternalError);
        assert_eq!(
            exc.message,
            "user middleware error processing fail: checksum mismatch"
        );
    }

    #[test]
    fn test_unknown_method() {
        let (mut processor, log) = store();
        processor.use_middleware([recording(&log, "A")]);

        let (outcome, reply) = run(&processor, call("nope", 9, &[Value::from("x")]));

        assert!(matches!(outcome, Err(RpcError::UnknownMethod(ref m)) if m == "nope"));
        assert!(log.lock().is_empty());
        let (header, body) = decode_reply(reply, &[]);
        assert_eq!(header.sequence_id, 9);
        let exc = body.unwrap_err();
        assert_eq!(exc.kind, ApplicationExceptionKind::UnknownMethod);
        assert_eq!(exc.message, "Unknown function nope");
    }

    #[test]
    fn test_unknown_method_keeps_stream_framed() {
        let (processor, _) = store();
        let mut request = call("nope", 1, &[Value::list(TType::I32, vec![Value::I32(1)])]);
        request.extend(call("add", 2, &[Value::I32(5), Value::I32(6)]));

        let mut iprot = BinaryInputProtocol::new(Cursor::new(request));
        let mut oprot = BinaryOutputProtocol::new(Vec::new());
        processor.serve(&mut iprot, &mut oprot).unwrap();

        let mut replies = BinaryInputProtocol::new(Cursor::new(oprot.into_inner()));
        let (_, first) = read_reply(&mut replies, &[]);
        assert!(first.is_err());
        let (header, second) = read_reply(&mut replies, &[TypeDesc::I32]);
        assert_eq!(header.sequence_id, 2);
        assert_eq!(second.unwrap(), vec![Value::I32(11)]);
    }

    #[test]
    fn test_bad_arguments() {
        let (processor, log) = store();
        let request = call(
            "add",
            4,
            &[Value::I32(1), Value::I32(2), Value::I32(3)],
        );

        let (outcome, reply) = run(&processor, request);

        assert!(matches!(outcome, Err(RpcError::Protocol(_))));
        assert!(log.lock().is_empty());
        let exc = decode_reply(reply, &[TypeDesc::I32]).1.unwrap_err();
        assert_eq!(exc.kind, ApplicationExceptionKind::ProtocolError);
        assert!(exc.message.contains("unexpected field 2"));
    }

    #[test]
    fn test_bad_arguments_keep_stream_framed() {
        let (processor, log) = store();
        let mut request = call(
            "add",
            1,
            &[Value::I32(1), Value::I32(2), Value::from("xx")],
        );
        request.extend(call("add", 2, &[Value::I32(5)]));

        let mut iprot = BinaryInputProtocol::new(Cursor::new(request));
        let mut oprot = BinaryOutputProtocol::new(Vec::new());
        processor.serve(&mut iprot, &mut oprot).unwrap();

        let mut replies = BinaryInputProtocol::new(Cursor::new(oprot.into_inner()));
        let (_, first) = read_reply(&mut replies, &[TypeDesc::I32]);
        assert_eq!(
            first.unwrap_err().kind,
            ApplicationExceptionKind::ProtocolError
        );
        let (header, second) = read_reply(&mut replies, &[TypeDesc::I32]);
        assert_eq!(header.sequence_id, 2);
        assert_eq!(second.unwrap(), vec![Value::I32(5)]);
        assert_eq!(*log.lock(), vec!["terminal"]);
    }

    #[test]
    fn test_truncated_arguments() {
        let (processor, _) = store();
        let mut request = call("lookup", 4, &[Value::from("some-key")]);
        request.truncate(request.len() - 6);

        let (outcome, reply) = run(&processor, request);

        // the rest of the request is unread, so the connection is done
        let err = outcome.unwrap_err();
        assert!(err.is_fatal());
        let exc = decode_reply(reply, &[]).1.unwrap_err();
        assert_eq!(exc.kind, ApplicationExceptionKind::ProtocolError);
    }

    #[test]
    fn test_handler_error() {
        let (processor, _) = store();
        let (outcome, reply) = run(&processor, call("fail", 3, &[]));

        assert!(matches!(outcome, Err(RpcError::Handler { ref message, .. }) if message == "disk full"));
        let exc = decode_reply(reply, &[TypeDesc::Error]).1.unwrap_err();
        assert_eq!(exc.kind, ApplicationExceptionKind::InternalError);
        assert_eq!(exc.message, "Internal error processing fail: disk full");
    }

    #[test]
    fn test_declared_exception() {
        let (processor, _) = store();
        let types = [TypeDesc::of_struct::<NotFound>("NotFound"), TypeDesc::String];

        let (outcome, reply) = run(&processor, call("lookup", 8, &[Value::from("missing")]));
        outcome.unwrap();

        let (header, body) = decode_reply(reply, &types);
        assert_eq!(header.message_type, MessageType::Reply);
        let results = body.unwrap();
        assert_eq!(
            results[0].downcast_struct::<NotFound>(),
            Some(&NotFound {
                key: "missing".into()
            })
        );
        assert!(results[1].is_null());

        let (_, reply) = run(&processor, call("lookup", 9, &[Value::from("k")]));
        let results = decode_reply(reply, &types).1.unwrap();
        assert!(results[0].is_null());
        assert_eq!(results[1], Value::from("value of k"));
    }

    #[test]
    fn test_missing_arguments_are_null() {
        let (processor, _) = store();
        let (outcome, reply) = run(&processor, call("add", 1, &[Value::I32(7)]));
        outcome.unwrap();
        assert_eq!(
            decode_reply(reply, &[TypeDesc::I32]).1.unwrap(),
            vec![Value::I32(7)]
        );
    }

    #[test]
    fn test_write_failure_is_fatal() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let (processor, _) = store();
        let mut iprot =
            BinaryInputProtocol::new(Cursor::new(call("add", 1, &[Value::I32(1), Value::I32(1)])));
        let mut oprot = BinaryOutputProtocol::new(Broken);

        let err = processor.process(&mut iprot, &mut oprot).unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_serve_stops_on_eof() {
        let (processor, _) = store();
        let mut request = call("add", 1, &[Value::I32(1), Value::I32(2)]);
        request.extend(call("fail", 2, &[]));
        request.extend(call("add", 3, &[Value::I32(3), Value::I32(4)]));

        let mut output = Vec::new();
        processor
            .serve_io(Cursor::new(request), &mut output)
            .unwrap();

        let mut replies = BinaryInputProtocol::new(Cursor::new(output));
        assert!(read_reply(&mut replies, &[TypeDesc::I32]).1.is_ok());
        assert!(read_reply(&mut replies, &[TypeDesc::Error]).1.is_err());
        let (header, last) = read_reply(&mut replies, &[TypeDesc::I32]);
        assert_eq!(header.sequence_id, 3);
        assert_eq!(last.unwrap(), vec![Value::I32(7)]);
    }

    #[test]
    fn test_context_is_recycled() {
        let (processor, _) = store();
        for seq in 0..3 {
            let (outcome, _) = run(&processor, call("add", seq, &[Value::I32(1), Value::I32(1)]));
            outcome.unwrap();
        }
        assert_eq!(processor.contexts.idle(), 1);
    }

    #[test]
    fn test_apply_config_installs_auth() {
        let (mut processor, log) = store();
        let mut config = ServerConfig::default();
        config.auth.required = true;
        config.auth.token_hashes = vec![TokenValidator::hash_token("s3cret")];
        processor.apply_config(&config).unwrap();

        // token is expected in argument 0, which `add` reads as an i32
        let (outcome, reply) = run(&processor, call("add", 1, &[Value::I32(1), Value::I32(1)]));
        assert!(matches!(outcome, Err(RpcError::Aborted { .. })));
        assert!(log.lock().is_empty());
        let exc = decode_reply(reply, &[TypeDesc::I32]).1.unwrap_err();
        assert!(exc.message.contains("missing auth token"));
    }

    #[test]
    fn test_apply_config_rejects_auth_without_tokens() {
        let (mut processor, _) = store();
        let mut config = ServerConfig::default();
        config.auth.required = true;
        assert!(processor.apply_config(&config).is_err());
    }
}
