//! A self-describing typed binary codec.
//!
//! Unlike the JSON codec, this one has no structural self-description to
//! fall back on: every concrete task variant must be registered on the
//! codec instance with [`BincodeCodec::register`] before the first decode
//! that needs it, or decoding fails with `CodecError::UnknownVariant`.

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use persistent_pool::{Codec, CodecError, DecodedTaskSet, Envelope, Task, TaskRegistry, TaskSet};

#[derive(Default)]
pub struct BincodeCodec {
    registry: Mutex<TaskRegistry>,
}

impl BincodeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a concrete task type under `kind` so it can round-trip
    /// through this codec instance.
    pub fn register<T>(&self, kind: impl Into<String>)
    where
        T: Task + Serialize + DeserializeOwned + 'static,
    {
        self.registry.lock().register_with::<T, _, _>(
            kind,
            |task: &T| bincode::serialize(task).map_err(|e| CodecError::Malformed(e.to_string())),
            |bytes: &[u8]| {
                bincode::deserialize(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
            },
        );
    }
}

impl Codec for BincodeCodec {
    fn encode(&self, task_set: &TaskSet) -> Result<Vec<u8>, CodecError> {
        let registry = self.registry.lock();
        let envelope = registry.encode_envelope(task_set)?;
        bincode::serialize(&envelope).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedTaskSet, CodecError> {
        let envelope: Envelope =
            bincode::deserialize(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;
        self.registry.lock().decode_envelope(envelope)
    }
}
