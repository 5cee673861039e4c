//! A structural text codec. Like the binary codec, it still needs each
//! concrete task variant registered under its `kind` before it can
//! reconstruct one — the dynamic `Task` trait object alone doesn't carry
//! enough type information to deserialize, regardless of wire format.

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use persistent_pool::{Codec, CodecError, DecodedTaskSet, Envelope, Task, TaskRegistry, TaskSet};

#[derive(Default)]
pub struct JsonCodec {
    registry: Mutex<TaskRegistry>,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&self, kind: impl Into<String>)
    where
        T: Task + Serialize + DeserializeOwned + 'static,
    {
        self.registry.lock().register_with::<T, _, _>(
            kind,
            |task: &T| serde_json::to_vec(task).map_err(|e| CodecError::Malformed(e.to_string())),
            |bytes: &[u8]| {
                serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
            },
        );
    }
}

impl Codec for JsonCodec {
    fn encode(&self, task_set: &TaskSet) -> Result<Vec<u8>, CodecError> {
        let registry = self.registry.lock();
        let envelope = registry.encode_envelope(task_set)?;
        serde_json::to_vec(&envelope).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedTaskSet, CodecError> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;
        self.registry.lock().decode_envelope(envelope)
    }
}
