//! Shared fixture: an in-memory key-value service.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use thriftmw::codec::WireMap;
use thriftmw::protocol::{FieldIdentifier, InputProtocol, OutputProtocol, ProtocolError, TType};
use thriftmw::{MethodRegistry, Service, TypeDesc, Value, WireStruct};

/// Declared exception returned by `get` for absent keys.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeyNotFound {
    pub key: String,
}

impl WireStruct for KeyNotFound {
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
        oprot.write_struct_begin("KeyNotFound")?;
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
        Some(format!("key not found: {}", self.key))
    }
}

pub fn key_not_found() -> TypeDesc {
    TypeDesc::of_struct::<KeyNotFound>("KeyNotFound")
}

/// In-memory string store.
#[derive(Default)]
pub struct KvStore {
    entries: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl KvStore {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, method: &str) {
        self.calls.lock().push(method.to_string());
    }
}

impl Service for KvStore {
    fn register(self: Arc<Self>, registry: &mut MethodRegistry) {
        let store = Arc::clone(&self);
        registry.method(
            "put",
            vec![TypeDesc::String, TypeDesc::String],
            vec![TypeDesc::Error],
            move |args| {
                store.record("put");
                match (args[0].as_str(), args[1].as_str()) {
                    (Some(""), _) | (None, _) => vec![Value::error("empty key")],
                    (Some(key), value) => {
                        store
                            .entries
                            .lock()
                            .insert(key.to_string(), value.unwrap_or_default().to_string());
                        vec![Value::Null]
                    }
                }
            },
        );

        let store = Arc::clone(&self);
        registry.method(
            "get",
            vec![TypeDesc::String],
            vec![key_not_found(), TypeDesc::String],
            move |args| {
                store.record("get");
                let key = args[0].as_str().unwrap_or_default();
                match store.entries.lock().get(key) {
                    Some(value) => vec![Value::Null, Value::from(value.as_str())],
                    None => vec![
                        Value::from_struct(KeyNotFound {
                            key: key.to_string(),
                        }),
                        Value::Null,
                    ],
                }
            },
        );

        let store = Arc::clone(&self);
        registry.method(
            "secure_get",
            vec![TypeDesc::String, TypeDesc::String],
            vec![key_not_found(), TypeDesc::String],
            move |args| {
                store.record("secure_get");
                let key = args[1].as_str().unwrap_or_default();
                let value = store.entries.lock().get(key).cloned();
                vec![Value::Null, Value::optional(value)]
            },
        );

        let store = Arc::clone(&self);
        registry.method("keys", vec![], vec![TypeDesc::list(TypeDesc::String)], move |_| {
            store.record("keys");
            let mut keys: Vec<_> = store.entries.lock().keys().cloned().collect();
            keys.sort();
            vec![Value::list(
                TType::String,
                keys.into_iter().map(Value::from).collect(),
            )]
        });

        let store = self;
        registry.method(
            "lengths",
            vec![],
            vec![TypeDesc::map(TypeDesc::String, TypeDesc::I64)],
            move |_| {
                store.record("lengths");
                let entries = store.entries.lock();
                let mut map = WireMap::with_capacity(TType::String, TType::I64, entries.len());
                for (key, value) in entries.iter() {
                    map.insert(Value::from(key.as_str()), Value::I64(value.len() as i64));
                }
                vec![Value::Map(map)]
            },
        );
    }
}
