//! URP message headers: requests, replies and their first/second-level caches.
//!
//! Every message starts with a flags byte. Short requests reuse the type,
//! OID and TID of the previous message; long headers say which of the three
//! are new and carry them behind the flags.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::cache::{InboundCache, OutboundCache, NO_CACHE};
use crate::error::{Result, UrpError};
use crate::marshal::{self, ReadCaches, WriteCaches};
use crate::types::{type_names, Type, UnoValue};

const FLAG_LONGHEADER: u8 = 0x80;
const FLAG_REQUEST: u8 = 0x40;
const FLAG_NEWTYPE: u8 = 0x20;
const FLAG_NEWOID: u8 = 0x10;
const FLAG_NEWTID: u8 = 0x08;
const FLAG_FUNCTIONID16: u8 = 0x04;
const FLAG_MOREFLAGS: u8 = 0x01;

const FLAG_EXCEPTION: u8 = 0x20;

const FLAG_MUSTREPLY: u8 = 0x80;
const FLAG_SYNCHRONOUS: u8 = 0x40;

/// Short request header with a 14-bit function id.
const SHORT_FUNCTIONID14: u8 = 0x40;

/// Object the bridges negotiate protocol properties through.
pub const OID_PROTOCOL_PROPERTIES: &str = "UrpProtocolProperties";
/// Thread id reserved for protocol property negotiation.
pub const TID_PROTOCOL_PROPERTIES: &[u8] = b".UrpProtocolPropertiesTid";

pub const FN_QUERY_INTERFACE: u16 = 0;
pub const FN_RELEASE: u16 = 2;
pub const FN_REQUEST_CHANGE: u16 = 4;
pub const FN_COMMIT_CHANGE: u16 = 5;

/// An incoming call.
#[derive(Debug, Clone)]
pub struct UrpRequest {
    pub function_id: u16,
    pub interface: Type,
    pub oid: String,
    pub tid: Vec<u8>,
    pub must_reply: bool,
    pub synchronous: bool,
    /// In-parameters, still encoded.
    pub body: Bytes,
}

/// An incoming reply.
#[derive(Debug, Clone)]
pub struct UrpReply {
    pub tid: Vec<u8>,
    pub is_exception: bool,
    /// Return value and out-parameters, or an exception as `any`.
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub enum UrpMessage {
    Request(UrpRequest),
    Reply(UrpReply),
}

/// Decoding side of a connection.
#[derive(Debug, Default)]
pub struct ReaderState {
    /// Shared with value decoding of message bodies.
    pub caches: ReadCaches,
    tids: InboundCache<Vec<u8>>,
    last_type: Option<Type>,
    last_oid: Option<String>,
    last_tid: Option<Vec<u8>>,
}

impl ReaderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode_message(&mut self, mut data: Bytes) -> Result<UrpMessage> {
        if data.is_empty() {
            return Err(UrpError::Protocol("empty message".into()));
        }
        let flags = data.get_u8();
        if flags & FLAG_LONGHEADER == 0 {
            self.decode_short_request(flags, data)
        } else if flags & FLAG_REQUEST != 0 {
            self.decode_long_request(flags, data)
        } else {
            self.decode_reply(flags, data)
        }
    }

    fn decode_short_request(&mut self, flags: u8, mut data: Bytes) -> Result<UrpMessage> {
        let function_id = if flags & SHORT_FUNCTIONID14 != 0 {
            expect_bytes(&data, 1, "short request function id")?;
            (u16::from(flags & 0x3F) << 8) | u16::from(data.get_u8())
        } else {
            u16::from(flags & 0x3F)
        };
        Ok(UrpMessage::Request(UrpRequest {
            function_id,
            interface: remembered(&self.last_type, "type")?,
            oid: remembered(&self.last_oid, "OID")?,
            tid: remembered(&self.last_tid, "TID")?,
            must_reply: true,
            synchronous: true,
            body: data,
        }))
    }

    fn decode_long_request(&mut self, flags: u8, mut data: Bytes) -> Result<UrpMessage> {
        let (must_reply, synchronous) = if flags & FLAG_MOREFLAGS != 0 {
            expect_bytes(&data, 1, "more-flags byte")?;
            let more = data.get_u8();
            (more & FLAG_MUSTREPLY != 0, more & FLAG_SYNCHRONOUS != 0)
        } else {
            (true, true)
        };

        let function_id = if flags & FLAG_FUNCTIONID16 != 0 {
            expect_bytes(&data, 2, "function id")?;
            data.get_u16()
        } else {
            expect_bytes(&data, 1, "function id")?;
            u16::from(data.get_u8())
        };

        if flags & FLAG_NEWTYPE != 0 {
            let ty = marshal::read_type(&mut data, &mut self.caches.types)?;
            self.last_type = Some(ty);
        }
        if flags & FLAG_NEWOID != 0 {
            let oid = marshal::read_string(&mut data)?;
            expect_bytes(&data, 2, "OID cache index")?;
            let index = data.get_u16();
            let oid = if oid.is_empty() {
                self.caches.oids.lookup(index, "OID")?
            } else {
                self.caches.oids.store(index, oid.clone())?;
                oid
            };
            self.last_oid = Some(oid);
        }
        if flags & FLAG_NEWTID != 0 {
            self.read_tid(&mut data)?;
        }

        Ok(UrpMessage::Request(UrpRequest {
            function_id,
            interface: remembered(&self.last_type, "type")?,
            oid: remembered(&self.last_oid, "OID")?,
            tid: remembered(&self.last_tid, "TID")?,
            must_reply,
            synchronous,
            body: data,
        }))
    }

    fn decode_reply(&mut self, flags: u8, mut data: Bytes) -> Result<UrpMessage> {
        if flags & FLAG_NEWTID != 0 {
            self.read_tid(&mut data)?;
        }
        Ok(UrpMessage::Reply(UrpReply {
            tid: remembered(&self.last_tid, "TID")?,
            is_exception: flags & FLAG_EXCEPTION != 0,
            body: data,
        }))
    }

    fn read_tid(&mut self, data: &mut Bytes) -> Result<()> {
        let raw = marshal::read_byte_run(data, "TID")?.to_vec();
        expect_bytes(data, 2, "TID cache index")?;
        let index = data.get_u16();
        let tid = if raw.is_empty() {
            self.tids.lookup(index, "TID")?
        } else {
            self.tids.store(index, raw.clone())?;
            raw
        };
        self.last_tid = Some(tid);
        Ok(())
    }
}

/// Encoding side of a connection.
#[derive(Debug, Default)]
pub struct WriterState {
    /// Shared with value encoding of message bodies.
    pub caches: WriteCaches,
    tids: OutboundCache<Vec<u8>>,
    last_type: Option<Type>,
    last_oid: Option<String>,
    last_tid: Option<Vec<u8>>,
}

impl WriterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header for a call of `function_id` on `oid` through `interface`.
    ///
    /// The encoded in-parameters are appended by the caller.
    pub fn encode_request(
        &mut self,
        function_id: u16,
        interface: &Type,
        oid: &str,
        tid: &[u8],
        must_reply: bool,
    ) -> BytesMut {
        let mut buf = BytesMut::with_capacity(128);
        let new_type = self.last_type.as_ref() != Some(interface);
        let new_oid = self.last_oid.as_deref() != Some(oid);
        let new_tid = self.last_tid.as_deref() != Some(tid);

        if !(new_type || new_oid || new_tid) && must_reply {
            if function_id < 0x40 {
                buf.put_u8(function_id as u8);
                return buf;
            }
            if function_id < 0x4000 {
                buf.put_u16(function_id | (u16::from(SHORT_FUNCTIONID14) << 8));
                return buf;
            }
        }

        let mut flags = FLAG_LONGHEADER | FLAG_REQUEST;
        if new_type {
            flags |= FLAG_NEWTYPE;
        }
        if new_oid {
            flags |= FLAG_NEWOID;
        }
        if new_tid {
            flags |= FLAG_NEWTID;
        }
        if function_id > 0xFF {
            flags |= FLAG_FUNCTIONID16;
        }
        if !must_reply {
            flags |= FLAG_MOREFLAGS;
        }
        buf.put_u8(flags);
        if !must_reply {
            // One-way: neither must-reply nor synchronous.
            buf.put_u8(0);
        }

        if function_id > 0xFF {
            buf.put_u16(function_id);
        } else {
            buf.put_u8(function_id as u8);
        }

        if new_type {
            marshal::write_type(&mut buf, interface, Some(&mut self.caches.types));
            self.last_type = Some(interface.clone());
        }
        if new_oid {
            let (index, is_new) = self.caches.oids.intern(&oid.to_string());
            marshal::write_string(&mut buf, if is_new { oid } else { "" });
            buf.put_u16(index);
            self.last_oid = Some(oid.to_string());
        }
        if new_tid {
            self.write_tid(&mut buf, tid);
        }
        buf
    }

    /// Header for a reply on `tid`; the caller appends the body.
    pub fn encode_reply(&mut self, tid: &[u8], is_exception: bool) -> BytesMut {
        let mut buf = BytesMut::with_capacity(64);
        let new_tid = self.last_tid.as_deref() != Some(tid);
        let mut flags = FLAG_LONGHEADER;
        if is_exception {
            flags |= FLAG_EXCEPTION;
        }
        if new_tid {
            flags |= FLAG_NEWTID;
        }
        buf.put_u8(flags);
        if new_tid {
            self.write_tid(&mut buf, tid);
        }
        buf
    }

    fn write_tid(&mut self, buf: &mut BytesMut, tid: &[u8]) {
        let (index, is_new) = self.tids.intern(&tid.to_vec());
        if is_new {
            marshal::write_compressed(buf, tid.len() as u32);
            buf.put_slice(tid);
        } else {
            marshal::write_compressed(buf, 0);
        }
        buf.put_u16(index);
        self.last_tid = Some(tid.to_vec());
    }
}

/// Body of a `requestChange` call: a random number for tie-breaking.
pub fn request_change_body(random: i32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_i32(random);
    buf
}

/// Body of a `commitChange` call enabling the given property names.
pub fn commit_change_body(properties: &[&str], caches: &mut WriteCaches) -> BytesMut {
    let mut buf = BytesMut::new();
    let items = properties
        .iter()
        .map(|name| {
            UnoValue::Struct(vec![
                UnoValue::String((*name).to_string()),
                UnoValue::any(Type::void(), UnoValue::Void),
            ])
        })
        .collect();
    marshal::write_value(
        &mut buf,
        &UnoValue::Sequence(items),
        &Type::sequence(type_names::PROTOCOL_PROPERTY),
        caches,
    );
    buf
}

/// Null `XCurrentContext` prefixed to calls once the peer accepted the
/// `CurrentContext` property.
pub fn write_null_current_context(buf: &mut BytesMut) {
    marshal::write_string(buf, "");
    buf.put_u16(NO_CACHE);
}


fn remembered<T: Clone>(slot: &Option<T>, what: &str) -> Result<T> {
    slot.clone()
        .ok_or_else(|| UrpError::Protocol(format!("message reuses {what} but none was sent yet")))
}

fn expect_bytes(data: &Bytes, needed: usize, what: &str) -> Result<()> {
    if data.remaining() < needed {
        return Err(UrpError::Protocol(format!("truncated header: missing {what}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(msg: UrpMessage) -> UrpRequest {
        match msg {
            UrpMessage::Request(req) => req,
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn long_request_then_short_request() {
        let iface = Type::interface(type_names::X_INDEX_ACCESS);
        let mut writer = WriterState::new();
        let mut reader = ReaderState::new();

        let mut first = writer.encode_request(5, &iface, "sheets-oid", b"tid-1", true);
        first.put_slice(b"xyz");
        let second = writer.encode_request(6, &iface, "sheets-oid", b"tid-1", true);
        assert_eq!(second.as_ref(), &[6]);

        let r1 = request(reader.decode_message(first.freeze()).unwrap());
        assert_eq!(r1.function_id, 5);
        assert_eq!(r1.interface, iface);
        assert_eq!(r1.oid, "sheets-oid");
        assert_eq!(r1.tid, b"tid-1");
        assert_eq!(r1.body.as_ref(), b"xyz");

        let r2 = request(reader.decode_message(second.freeze()).unwrap());
        assert_eq!(r2.function_id, 6);
        assert_eq!(r2.oid, "sheets-oid");
    }

    #[test]
    fn switching_objects_reuses_cached_oid() {
        let iface = Type::interface(type_names::X_NAMED);
        let mut writer = WriterState::new();
        let mut reader = ReaderState::new();
        let msgs = [
            writer.encode_request(3, &iface, "a", b"t", true),
            writer.encode_request(3, &iface, "b", b"t", true),
            writer.encode_request(3, &iface, "a", b"t", true),
        ];
        let oids: Vec<String> = msgs
            .into_iter()
            .map(|m| request(reader.decode_message(m.freeze()).unwrap()).oid)
            .collect();
        assert_eq!(oids, ["a", "b", "a"]);
    }

    #[test]
    fn one_way_request_sets_more_flags() {
        let mut writer = WriterState::new();
        let msg = writer.encode_request(
            FN_RELEASE,
            &Type::interface(type_names::X_INTERFACE),
            "gone",
            b"t",
            false,
        );
        assert_ne!(msg[0] & FLAG_MOREFLAGS, 0);
        let req = request(ReaderState::new().decode_message(msg.freeze()).unwrap());
        assert!(!req.must_reply);
        assert!(!req.synchronous);
        assert_eq!(req.function_id, FN_RELEASE);
    }

    #[test]
    fn large_function_id_round_trips() {
        let iface = Type::interface(type_names::X_INTERFACE);
        let mut writer = WriterState::new();
        let mut reader = ReaderState::new();
        let long = writer.encode_request(300, &iface, "o", b"t", true);
        let short = writer.encode_request(300, &iface, "o", b"t", true);
        assert_eq!(short.len(), 2);
        assert_eq!(request(reader.decode_message(long.freeze()).unwrap()).function_id, 300);
        assert_eq!(request(reader.decode_message(short.freeze()).unwrap()).function_id, 300);
    }

    #[test]
    fn reply_carries_exception_flag_and_tid() {
        let mut writer = WriterState::new();
        let mut reader = ReaderState::new();
        let mut msg = writer.encode_reply(b"tid-9", true);
        msg.put_slice(b"payload");
        match reader.decode_message(msg.freeze()).unwrap() {
            UrpMessage::Reply(reply) => {
                assert!(reply.is_exception);
                assert_eq!(reply.tid, b"tid-9");
                assert_eq!(reply.body.as_ref(), b"payload");
            }
            other => panic!("expected reply, got {other:?}"),
        }
        // Same TID again: header is the bare flags byte.
        assert_eq!(writer.encode_reply(b"tid-9", false).as_ref(), &[FLAG_LONGHEADER]);
    }

    #[test]
    fn short_request_without_history_is_rejected() {
        let err = ReaderState::new()
            .decode_message(Bytes::from_static(&[3]))
            .unwrap_err();
        assert!(matches!(err, UrpError::Protocol(_)));
    }
}
