//! The `Codec` contract and the shared registry machinery its concrete
//! implementations (the `persistent-pool-bincode` and `persistent-pool-json`
//! crates) build on.
//!
//! A codec turns a [`TaskSet`] into bytes and back. Because tasks are type
//! erased (`Arc<dyn Task>`), turning one back into a concrete value requires
//! knowing its concrete type ahead of time — that's what [`TaskRegistry`]
//! is for. Registration is deliberately a side channel on the concrete
//! codec *instance*, not a capability of the `Codec` trait or of `Pool`
//! itself: the pool never needs to know which variants exist.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use crate::error::CodecError;
use crate::task::Task;
use crate::task_set::TaskSet;

/// One task as it appears on the wire: its id, its kind (used to look up
/// the right reconstruction function), and its opaque serialized payload.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct EncodedTask {
    pub id: String,
    pub kind: String,
    pub payload: Vec<u8>,
}

/// The full wire shape of a TaskSet: every task that was in Memory, plus
/// the ids that were in Queue. Produced by [`Codec::encode`], consumed by
/// [`Codec::decode`].
#[derive(Debug, Clone, Default, Serialize, serde::Deserialize)]
pub struct Envelope {
    pub memory: Vec<EncodedTask>,
    pub queue: Vec<String>,
}

/// Result of decoding: the raw Memory/Queue projections, exactly as they
/// were encoded. [`crate::pool::Pool::restore`] is responsible for
/// repairing in-flight tasks missing from `queue`; this type does not do
/// that itself, so a bare decode stays a faithful transcription.
pub struct DecodedTaskSet {
    pub memory: HashMap<String, Arc<dyn Task>>,
    pub queue: VecDeque<String>,
}

/// Converts a TaskSet to/from bytes.
pub trait Codec: Send + Sync {
    fn encode(&self, task_set: &TaskSet) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<DecodedTaskSet, CodecError>;
}

type SerializeFn = Box<dyn Fn(&dyn Task) -> Result<Vec<u8>, CodecError> + Send + Sync>;
type DeserializeFn = Box<dyn Fn(&[u8]) -> Result<Arc<dyn Task>, CodecError> + Send + Sync>;

/// Per-codec-instance map from task kind to the concrete (de)serialization
/// logic for that kind. A fresh codec instance starts with no variants
/// registered; decoding an unregistered kind is a [`CodecError::UnknownVariant`].
#[derive(Default)]
pub struct TaskRegistry {
    entries: HashMap<String, (SerializeFn, DeserializeFn)>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers how to turn a concrete `T` into bytes and back, under the
    /// given `kind` string. `serialize`/`deserialize` are supplied by the
    /// concrete codec crate so this registry stays agnostic to which wire
    /// format (bincode, JSON, ...) is actually in use.
    pub fn register_with<T, S, D>(&mut self, kind: impl Into<String>, serialize: S, deserialize: D)
    where
        T: Task + 'static,
        S: Fn(&T) -> Result<Vec<u8>, CodecError> + Send + Sync + 'static,
        D: Fn(&[u8]) -> Result<T, CodecError> + Send + Sync + 'static,
    {
        let ser: SerializeFn = Box::new(move |task: &dyn Task| {
            let concrete = task.as_any().downcast_ref::<T>().ok_or_else(|| {
                CodecError::Malformed(format!(
                    "task {:?} claimed kind {:?} but did not downcast to the registered type",
                    task.id(),
                    task.kind()
                ))
            })?;
            serialize(concrete)
        });
        let de: DeserializeFn = Box::new(move |bytes: &[u8]| {
            deserialize(bytes).map(|t| Arc::new(t) as Arc<dyn Task>)
        });
        self.entries.insert(kind.into(), (ser, de));
    }

    pub fn encode_task(&self, task: &dyn Task) -> Result<EncodedTask, CodecError> {
        let kind = task.kind();
        let (ser, _) = self
            .entries
            .get(kind)
            .ok_or_else(|| CodecError::UnknownVariant(kind.to_owned()))?;
        Ok(EncodedTask {
            id: task.id().to_owned(),
            kind: kind.to_owned(),
            payload: ser(task)?,
        })
    }

    pub fn decode_task(&self, encoded: &EncodedTask) -> Result<Arc<dyn Task>, CodecError> {
        let (_, de) = self
            .entries
            .get(&encoded.kind)
            .ok_or_else(|| CodecError::UnknownVariant(encoded.kind.clone()))?;
        de(&encoded.payload)
    }

    /// Encodes a full TaskSet snapshot into the shared wire envelope.
    pub fn encode_envelope(&self, task_set: &TaskSet) -> Result<Envelope, CodecError> {
        let guard = task_set.snapshot_guard();
        let memory = guard
            .memory
            .values()
            .map(|t| self.encode_task(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let queue = guard.queue.iter().cloned().collect();
        Ok(Envelope { memory, queue })
    }

    /// Decodes a wire envelope back into raw Memory/Queue projections.
    pub fn decode_envelope(&self, envelope: Envelope) -> Result<DecodedTaskSet, CodecError> {
        let mut memory = HashMap::with_capacity(envelope.memory.len());
        for encoded in &envelope.memory {
            memory.insert(encoded.id.clone(), self.decode_task(encoded)?);
        }
        let queue = envelope.queue.into_iter().collect();
        Ok(DecodedTaskSet { memory, queue })
    }
}
