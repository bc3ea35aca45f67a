//! JSON document records for the in-memory backend.
//!
//! Each entity becomes one self-describing JSON object carrying its id,
//! kind, and attributes, e.g. `{"id": "9f..", "kind": "commit", ...}`.
//! This is the backend's native record shape, not a cross-backend wire
//! format: ids are always computed over canonical bytes, so a tree written
//! through this codec and one written through
//! [`BincodeCodec`](tvs_model::BincodeCodec) agree on every id.
//!
//! Encoding replays entities through [`DocumentWriter`]'s consumer
//! implementations; decoding replays parsed fields into the typed
//! builders, whose `finalize()` re-verifies the embedded id against the
//! rebuilt entity.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde_json::{json, Map, Value};
use tvs_model::{
    CommitBuilder, CommitConsumer, Entity, EntityCodec, EntityConsumer, EntityKind,
    FragmentBuilder, FragmentConsumer, IndexBuilder, IndexConsumer, KeyEntry, MetadataBuilder,
    MetadataConsumer, ModelError, ModelResult, Mutation, TreeRef,
};
use tvs_types::{Id, Key, Payload, WithPayload};

/// Codec mapping entities to self-describing JSON documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentCodec;

impl EntityCodec for DocumentCodec {
    fn encode(&self, entity: &Entity) -> ModelResult<Bytes> {
        let mut writer = DocumentWriter::new(entity.kind());
        writer.id(entity.compute_id()?);
        match entity {
            Entity::Fragment(f) => f.produce(&mut writer),
            Entity::Index(i) => i.produce(&mut writer),
            Entity::Commit(c) => c.produce(&mut writer),
            Entity::Metadata(m) => m.produce(&mut writer),
        }
        let bytes = serde_json::to_vec(&writer.finish())
            .map_err(|e| ModelError::Serialization(e.to_string()))?;
        Ok(Bytes::from(bytes))
    }

    fn decode(&self, kind: EntityKind, bytes: &Bytes) -> ModelResult<Entity> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ModelError::Serialization(e.to_string()))?;
        let doc = value
            .as_object()
            .ok_or_else(|| malformed("record is not an object"))?;

        let actual: EntityKind = str_field(doc, "kind")?.parse()?;
        if actual != kind {
            return Err(ModelError::KindMismatch {
                expected: kind,
                actual,
            });
        }
        let id = id_field(doc, "id")?;

        match kind {
            EntityKind::Fragment => {
                let mut builder = FragmentBuilder::new();
                builder.id(id).entries(entries_field(doc)?);
                Ok(Entity::Fragment(builder.finalize()?))
            }
            EntityKind::Index => {
                let mut builder = IndexBuilder::new();
                builder.id(id).buckets(buckets_field(doc)?);
                Ok(Entity::Index(builder.finalize()?))
            }
            EntityKind::Commit => {
                let mut builder = CommitBuilder::new();
                builder.id(id);
                if let Some(parent) = doc.get("parent").filter(|v| !v.is_null()) {
                    builder.parent(parse_id(parent)?);
                }
                builder
                    .metadata(id_field(doc, "metadata")?)
                    .tree(parse_tree_ref(field(doc, "tree")?)?)
                    .mutations(mutations_field(doc)?);
                Ok(Entity::Commit(builder.finalize()?))
            }
            EntityKind::Metadata => {
                let mut builder = MetadataBuilder::new();
                builder
                    .id(id)
                    .author(str_field(doc, "author")?.to_string())
                    .message(str_field(doc, "message")?.to_string())
                    .timestamp_ms(u64_field(doc, "timestamp_ms")?);
                if let Some(props) = doc.get("properties") {
                    builder.properties(parse_properties(props)?);
                }
                Ok(Entity::Metadata(builder.finalize()?))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Write side
// ---------------------------------------------------------------------------

/// Consumer assembling a JSON object field by field.
#[derive(Debug)]
struct DocumentWriter {
    doc: Map<String, Value>,
}

impl DocumentWriter {
    fn new(kind: EntityKind) -> Self {
        let mut doc = Map::new();
        doc.insert("kind".to_string(), Value::String(kind.to_string()));
        Self { doc }
    }

    fn put(&mut self, name: &str, value: Value) -> &mut Self {
        self.doc.insert(name.to_string(), value);
        self
    }

    fn finish(self) -> Value {
        Value::Object(self.doc)
    }
}

impl EntityConsumer for DocumentWriter {
    fn id(&mut self, id: Id) -> &mut Self {
        self.put("id", Value::String(id.to_hex()))
    }
}

impl FragmentConsumer for DocumentWriter {
    fn entries(&mut self, entries: Vec<KeyEntry>) -> &mut Self {
        let docs = entries.iter().map(key_entry_doc).collect();
        self.put("entries", Value::Array(docs))
    }
}

impl IndexConsumer for DocumentWriter {
    fn buckets(&mut self, buckets: Vec<Option<TreeRef>>) -> &mut Self {
        let docs = buckets
            .iter()
            .map(|b| b.map(tree_ref_doc).unwrap_or(Value::Null))
            .collect();
        self.put("buckets", Value::Array(docs))
    }
}

impl CommitConsumer for DocumentWriter {
    fn parent(&mut self, parent: Id) -> &mut Self {
        self.put("parent", Value::String(parent.to_hex()))
    }

    fn metadata(&mut self, metadata: Id) -> &mut Self {
        self.put("metadata", Value::String(metadata.to_hex()))
    }

    fn tree(&mut self, tree: TreeRef) -> &mut Self {
        self.put("tree", tree_ref_doc(tree))
    }

    fn mutations(&mut self, mutations: Vec<Mutation>) -> &mut Self {
        let docs = mutations.iter().map(mutation_doc).collect();
        self.put("mutations", Value::Array(docs))
    }
}

impl MetadataConsumer for DocumentWriter {
    fn author(&mut self, author: String) -> &mut Self {
        self.put("author", Value::String(author))
    }

    fn message(&mut self, message: String) -> &mut Self {
        self.put("message", Value::String(message))
    }

    fn timestamp_ms(&mut self, timestamp_ms: u64) -> &mut Self {
        self.put("timestamp_ms", Value::from(timestamp_ms))
    }

    fn properties(&mut self, properties: BTreeMap<String, String>) -> &mut Self {
        let map: Map<String, Value> = properties
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        self.put("properties", Value::Object(map))
    }
}

fn key_entry_doc(entry: &KeyEntry) -> Value {
    json!({
        "key": entry.key.to_string(),
        "payload": entry.content.payload.tag(),
        "content": entry.content.value.to_hex(),
    })
}

fn tree_ref_doc(tree: TreeRef) -> Value {
    match tree {
        TreeRef::Fragment(id) => json!({ "fragment": id.to_hex() }),
        TreeRef::Index(id) => json!({ "index": id.to_hex() }),
    }
}

fn mutation_doc(mutation: &Mutation) -> Value {
    match mutation {
        Mutation::Put { key, content } => json!({
            "op": "put",
            "key": key.to_string(),
            "payload": content.payload.tag(),
            "content": content.value.to_hex(),
        }),
        Mutation::Delete { key } => json!({
            "op": "delete",
            "key": key.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

fn malformed(reason: impl Into<String>) -> ModelError {
    ModelError::Serialization(reason.into())
}

fn field<'a>(doc: &'a Map<String, Value>, name: &str) -> ModelResult<&'a Value> {
    doc.get(name)
        .ok_or_else(|| malformed(format!("missing field {name:?}")))
}

fn str_field<'a>(doc: &'a Map<String, Value>, name: &str) -> ModelResult<&'a str> {
    field(doc, name)?
        .as_str()
        .ok_or_else(|| malformed(format!("field {name:?} is not a string")))
}

fn u64_field(doc: &Map<String, Value>, name: &str) -> ModelResult<u64> {
    field(doc, name)?
        .as_u64()
        .ok_or_else(|| malformed(format!("field {name:?} is not an unsigned integer")))
}

fn parse_id(value: &Value) -> ModelResult<Id> {
    let hex = value
        .as_str()
        .ok_or_else(|| malformed("id is not a string"))?;
    Id::from_hex(hex).map_err(|e| malformed(e.to_string()))
}

fn id_field(doc: &Map<String, Value>, name: &str) -> ModelResult<Id> {
    parse_id(field(doc, name)?)
}

fn parse_key(value: &Value) -> ModelResult<Key> {
    let path = value
        .as_str()
        .ok_or_else(|| malformed("key is not a string"))?;
    Key::from_path(path).map_err(|e| malformed(e.to_string()))
}

fn payload_field(doc: &Map<String, Value>) -> ModelResult<Payload> {
    let tag = u64_field(doc, "payload")?;
    u8::try_from(tag)
        .map(Payload::new)
        .map_err(|_| malformed(format!("payload tag {tag} out of range")))
}

fn parse_tree_ref(value: &Value) -> ModelResult<TreeRef> {
    let doc = value
        .as_object()
        .ok_or_else(|| malformed("tree ref is not an object"))?;
    if let Some(id) = doc.get("fragment") {
        Ok(TreeRef::Fragment(parse_id(id)?))
    } else if let Some(id) = doc.get("index") {
        Ok(TreeRef::Index(parse_id(id)?))
    } else {
        Err(malformed("tree ref needs a fragment or index field"))
    }
}

fn entries_field(doc: &Map<String, Value>) -> ModelResult<Vec<KeyEntry>> {
    field(doc, "entries")?
        .as_array()
        .ok_or_else(|| malformed("entries is not an array"))?
        .iter()
        .map(parse_key_entry)
        .collect()
}

fn parse_key_entry(value: &Value) -> ModelResult<KeyEntry> {
    let doc = value
        .as_object()
        .ok_or_else(|| malformed("entry is not an object"))?;
    let key = parse_key(field(doc, "key")?)?;
    let content = WithPayload::new(payload_field(doc)?, id_field(doc, "content")?);
    Ok(KeyEntry::new(key, content))
}

fn buckets_field(doc: &Map<String, Value>) -> ModelResult<Vec<Option<TreeRef>>> {
    field(doc, "buckets")?
        .as_array()
        .ok_or_else(|| malformed("buckets is not an array"))?
        .iter()
        .map(|b| {
            if b.is_null() {
                Ok(None)
            } else {
                parse_tree_ref(b).map(Some)
            }
        })
        .collect()
}

fn mutations_field(doc: &Map<String, Value>) -> ModelResult<Vec<Mutation>> {
    field(doc, "mutations")?
        .as_array()
        .ok_or_else(|| malformed("mutations is not an array"))?
        .iter()
        .map(parse_mutation)
        .collect()
}

fn parse_mutation(value: &Value) -> ModelResult<Mutation> {
    let doc = value
        .as_object()
        .ok_or_else(|| malformed("mutation is not an object"))?;
    let key = parse_key(field(doc, "key")?)?;
    match str_field(doc, "op")? {
        "put" => Ok(Mutation::Put {
            key,
            content: WithPayload::new(payload_field(doc)?, id_field(doc, "content")?),
        }),
        "delete" => Ok(Mutation::Delete { key }),
        other => Err(malformed(format!("unknown mutation op {other:?}"))),
    }
}

fn parse_properties(value: &Value) -> ModelResult<BTreeMap<String, String>> {
    let doc = value
        .as_object()
        .ok_or_else(|| malformed("properties is not an object"))?;
    doc.iter()
        .map(|(k, v)| {
            v.as_str()
                .map(|s| (k.clone(), s.to_string()))
                .ok_or_else(|| malformed(format!("property {k:?} is not a string")))
        })
        .collect()
}
