//! Compact binary encoding of audit records.
//!
//! The buffer is a length-prefixed sequence of field frames so a sink can
//! skip fields it does not care about without decoding their values. All
//! integers are little-endian; strings and byte buffers are `u32`
//! length-prefixed; timestamps are truncated to microsecond precision.
//!
//! ```text
//! record  := magic "HA" | version u8 | key | recorded_at i64 | actor str
//!            | field_count u32 | field*
//! field   := frame_len u32 | name str | type_tag u8 | value(old) | value(new)
//! value   := kind u8 | payload
//! key     := kind u8 | payload
//! ```
//!
//! `frame_len` covers everything after itself within the frame. `type_tag`
//! is the changed member's kind (the new side's, falling back to the old
//! side's when the new value is null); each value additionally carries its
//! own kind byte, which is what keeps nullable and union-kind members
//! streamable.
//!
//! Composite arity is a `u16`: a value object or composite key with more
//! than 65 535 members is not representable in this format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use hallmark_core::{EngineError, EngineResult, FieldValue, KeyValue, ValueKind};

use crate::record::{AuditRecord, FieldChange};

const MAGIC: [u8; 2] = *b"HA";
const VERSION: u8 = 1;

const KEY_UNASSIGNED: u8 = 0;
const KEY_INT: u8 = 1;
const KEY_UINT: u8 = 2;
const KEY_STR: u8 = 3;
const KEY_UUID: u8 = 4;
const KEY_BYTES: u8 = 5;
const KEY_COMPOSITE: u8 = 6;

/// Encode `record` into a fresh buffer.
pub fn encode(record: &AuditRecord) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    write_key(&mut buf, &record.entity_key);
    buf.extend_from_slice(&record.recorded_at.timestamp_micros().to_le_bytes());
    write_str(&mut buf, &record.actor);
    buf.extend_from_slice(&(record.changed_fields.len() as u32).to_le_bytes());

    for change in &record.changed_fields {
        let frame_start = buf.len();
        buf.extend_from_slice(&[0; 4]);
        write_str(&mut buf, &change.field);
        buf.push(frame_tag(change).tag());
        write_value(&mut buf, &change.old);
        write_value(&mut buf, &change.new);

        let frame_len = (buf.len() - frame_start - 4) as u32;
        buf[frame_start..frame_start + 4].copy_from_slice(&frame_len.to_le_bytes());
    }
    buf
}

/// Decode a buffer produced by [`encode`].
pub fn decode(buf: &[u8]) -> EngineResult<AuditRecord> {
    let reader = AuditReader::new(buf)?;
    let entity_key = reader.entity_key().clone();
    let recorded_at = reader.recorded_at();
    let actor = reader.actor().to_owned();

    // The declared count is untrusted input; frames prove themselves one at
    // a time, so never size an allocation from the header alone.
    let mut changed_fields = Vec::with_capacity(reader.field_count().min(64));
    for frame in reader {
        let frame = frame?;
        changed_fields.push(FieldChange {
            field: frame.name,
            old: frame.old,
            new: frame.new,
        });
    }

    Ok(AuditRecord {
        entity_key,
        changed_fields,
        recorded_at,
        actor,
    })
}

/// One decoded field frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFrame {
    pub name: String,
    /// Kind of the changed member, per the frame header.
    pub tag: ValueKind,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Streaming reader over an encoded record.
///
/// The header (key, timestamp, actor) is parsed eagerly; field frames decode
/// lazily as the reader is iterated, so a sink can stop early or skip the
/// tail without materializing the whole record.
#[derive(Debug)]
pub struct AuditReader<'a> {
    entity_key: KeyValue,
    recorded_at: DateTime<Utc>,
    actor: String,
    field_count: usize,
    remaining: usize,
    cursor: Cursor<'a>,
}

impl<'a> AuditReader<'a> {
    pub fn new(buf: &'a [u8]) -> EngineResult<Self> {
        let mut cursor = Cursor::new(buf);
        if cursor.take(2)? != MAGIC {
            return Err(EngineError::malformed_record("bad magic"));
        }
        let version = cursor.u8()?;
        if version != VERSION {
            return Err(EngineError::malformed_record(format!(
                "unsupported version {version}"
            )));
        }
        let entity_key = read_key(&mut cursor, 0)?;
        let micros = cursor.i64()?;
        let recorded_at = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| EngineError::malformed_record("timestamp out of range"))?;
        let actor = cursor.str()?;
        let field_count = cursor.u32()? as usize;

        Ok(Self {
            entity_key,
            recorded_at,
            actor,
            field_count,
            remaining: field_count,
            cursor,
        })
    }

    pub fn entity_key(&self) -> &KeyValue {
        &self.entity_key
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Declared number of field frames in the buffer.
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Skip the next field frame without decoding its values.
    pub fn skip_frame(&mut self) -> EngineResult<()> {
        if self.remaining == 0 {
            return Err(EngineError::malformed_record("no frames left to skip"));
        }
        let frame_len = self.cursor.u32()? as usize;
        self.cursor.take(frame_len)?;
        self.remaining -= 1;
        Ok(())
    }

    fn read_frame(&mut self) -> EngineResult<FieldFrame> {
        let frame_len = self.cursor.u32()? as usize;
        let frame_end = self.cursor.pos + frame_len;
        if frame_end > self.cursor.buf.len() {
            return Err(EngineError::malformed_record("field frame truncated"));
        }

        let name = self.cursor.str()?;
        let tag_byte = self.cursor.u8()?;
        let tag = ValueKind::from_tag(tag_byte)
            .ok_or_else(|| EngineError::malformed_record(format!("unknown type tag {tag_byte}")))?;
        let old = read_value(&mut self.cursor, 0)?;
        let new = read_value(&mut self.cursor, 0)?;

        if self.cursor.pos != frame_end {
            return Err(EngineError::malformed_record("field frame length mismatch"));
        }
        Ok(FieldFrame { name, tag, old, new })
    }
}

impl Iterator for AuditReader<'_> {
    type Item = EngineResult<FieldFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let frame = self.read_frame();
        if frame.is_err() {
            // A malformed frame poisons the rest of the buffer.
            self.remaining = 0;
        }
        Some(frame)
    }
}

fn frame_tag(change: &FieldChange) -> ValueKind {
    if change.new.is_null() {
        change.old.kind()
    } else {
        change.new.kind()
    }
}

// Nested composites share the value depth cap; a hostile buffer cannot
// recurse the decoder off the stack.
const MAX_NESTING: usize = 32;

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn write_value(buf: &mut Vec<u8>, value: &FieldValue) {
    buf.push(value.kind().tag());
    match value {
        FieldValue::Null => {}
        FieldValue::Bool(v) => buf.push(*v as u8),
        FieldValue::Int(v) => buf.extend_from_slice(&v.to_le_bytes()),
        FieldValue::UInt(v) => buf.extend_from_slice(&v.to_le_bytes()),
        FieldValue::Float(v) => buf.extend_from_slice(&v.to_le_bytes()),
        FieldValue::Str(v) => write_str(buf, v),
        FieldValue::Bytes(v) => write_bytes(buf, v),
        FieldValue::Uuid(v) => buf.extend_from_slice(v.as_bytes()),
        FieldValue::Timestamp(v) => buf.extend_from_slice(&v.timestamp_micros().to_le_bytes()),
        FieldValue::Composite(parts) => {
            buf.extend_from_slice(&(parts.len() as u16).to_le_bytes());
            for part in parts {
                write_value(buf, part);
            }
        }
    }
}

fn read_value(cursor: &mut Cursor<'_>, depth: usize) -> EngineResult<FieldValue> {
    if depth > MAX_NESTING {
        return Err(EngineError::malformed_record("value nesting too deep"));
    }
    let tag = cursor.u8()?;
    let kind = ValueKind::from_tag(tag)
        .ok_or_else(|| EngineError::malformed_record(format!("unknown value kind {tag}")))?;
    Ok(match kind {
        ValueKind::Null => FieldValue::Null,
        ValueKind::Bool => FieldValue::Bool(cursor.u8()? != 0),
        ValueKind::Int => FieldValue::Int(cursor.i64()?),
        ValueKind::UInt => FieldValue::UInt(u64::from_le_bytes(cursor.array()?)),
        ValueKind::Float => FieldValue::Float(f64::from_le_bytes(cursor.array()?)),
        ValueKind::Str => FieldValue::Str(cursor.str()?),
        ValueKind::Bytes => {
            let len = cursor.u32()? as usize;
            FieldValue::Bytes(cursor.take(len)?.to_vec())
        }
        ValueKind::Uuid => FieldValue::Uuid(Uuid::from_bytes(cursor.array()?)),
        ValueKind::Timestamp => {
            let micros = cursor.i64()?;
            let ts = DateTime::from_timestamp_micros(micros)
                .ok_or_else(|| EngineError::malformed_record("timestamp out of range"))?;
            FieldValue::Timestamp(ts)
        }
        ValueKind::Nested => {
            let count = u16::from_le_bytes(cursor.array()?) as usize;
            let mut parts = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                parts.push(read_value(cursor, depth + 1)?);
            }
            FieldValue::Composite(parts)
        }
    })
}

fn write_key(buf: &mut Vec<u8>, key: &KeyValue) {
    match key {
        KeyValue::Unassigned => buf.push(KEY_UNASSIGNED),
        KeyValue::Int(v) => {
            buf.push(KEY_INT);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        KeyValue::UInt(v) => {
            buf.push(KEY_UINT);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        KeyValue::Str(v) => {
            buf.push(KEY_STR);
            write_str(buf, v);
        }
        KeyValue::Uuid(v) => {
            buf.push(KEY_UUID);
            buf.extend_from_slice(v.as_bytes());
        }
        KeyValue::Bytes(v) => {
            buf.push(KEY_BYTES);
            write_bytes(buf, v);
        }
        KeyValue::Composite(parts) => {
            buf.push(KEY_COMPOSITE);
            buf.extend_from_slice(&(parts.len() as u16).to_le_bytes());
            for part in parts {
                write_key(buf, part);
            }
        }
    }
}

fn read_key(cursor: &mut Cursor<'_>, depth: usize) -> EngineResult<KeyValue> {
    if depth > MAX_NESTING {
        return Err(EngineError::malformed_record("key nesting too deep"));
    }
    let tag = cursor.u8()?;
    Ok(match tag {
        KEY_UNASSIGNED => KeyValue::Unassigned,
        KEY_INT => KeyValue::Int(cursor.i64()?),
        KEY_UINT => KeyValue::UInt(u64::from_le_bytes(cursor.array()?)),
        KEY_STR => KeyValue::Str(cursor.str()?),
        KEY_UUID => KeyValue::Uuid(Uuid::from_bytes(cursor.array()?)),
        KEY_BYTES => {
            let len = cursor.u32()? as usize;
            KeyValue::Bytes(cursor.take(len)?.to_vec())
        }
        KEY_COMPOSITE => {
            let count = u16::from_le_bytes(cursor.array()?) as usize;
            let mut parts = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                parts.push(read_key(cursor, depth + 1)?);
            }
            KeyValue::Composite(parts)
        }
        other => {
            return Err(EngineError::malformed_record(format!(
                "unknown key kind {other}"
            )));
        }
    })
}

/// Bounds-checked reader over an input buffer.
#[derive(Debug)]
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> EngineResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| EngineError::malformed_record("unexpected end of buffer"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> EngineResult<[u8; N]> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u8(&mut self) -> EngineResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> EngineResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> EngineResult<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn str(&mut self) -> EngineResult<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| EngineError::malformed_record("invalid utf-8 in string"))
    }
}
