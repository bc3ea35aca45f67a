//! The backend-facing serialization seam.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::entity::{Entity, EntityKind};
use crate::error::{ModelError, ModelResult};

/// Maps typed entities to a backend's native record bytes and back.
///
/// `decode` takes the expected kind from the caller's context (tree refs
/// are typed pointers), never from trusting the record alone. Content ids
/// are always computed over canonical bytes, so two backends with
/// different record shapes still agree on every id.
pub trait EntityCodec: Send + Sync {
    fn encode(&self, entity: &Entity) -> ModelResult<Bytes>;
    fn decode(&self, kind: EntityKind, bytes: &Bytes) -> ModelResult<Entity>;
}

/// Compact record form: a one-byte kind tag followed by the entity's
/// canonical bytes. The tag guards against decoding a record as the
/// wrong kind.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl EntityCodec for BincodeCodec {
    fn encode(&self, entity: &Entity) -> ModelResult<Bytes> {
        let canonical = entity.canonical_bytes()?;
        let mut buf = Vec::with_capacity(1 + canonical.len());
        buf.push(entity.kind().tag());
        buf.extend_from_slice(&canonical);
        Ok(Bytes::from(buf))
    }

    fn decode(&self, kind: EntityKind, bytes: &Bytes) -> ModelResult<Entity> {
        let (&tag, body) = bytes
            .split_first()
            .ok_or_else(|| ModelError::Serialization("empty record".into()))?;
        let actual = EntityKind::from_tag(tag)
            .ok_or_else(|| ModelError::Serialization(format!("unknown kind tag {tag}")))?;
        if actual != kind {
            return Err(ModelError::KindMismatch {
                expected: kind,
                actual,
            });
        }
        Ok(match kind {
            EntityKind::Fragment => Entity::Fragment(deserialize(body)?),
            EntityKind::Index => Entity::Index(deserialize(body)?),
            EntityKind::Commit => Entity::Commit(deserialize(body)?),
            EntityKind::Metadata => Entity::Metadata(deserialize(body)?),
        })
    }
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> ModelResult<T> {
    bincode::deserialize(bytes).map_err(|e| ModelError::Serialization(e.to_string()))
}
