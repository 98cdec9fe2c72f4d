//! Binary encoding of UNO values in the URP wire format.
//!
//! Integers are big-endian. Strings are UTF-8 behind a compressed length:
//! one byte for lengths below `0xFF`, otherwise `0xFF` followed by a `u32`.
//! Types and interface references go through the connection's second-level
//! caches, which are shared between message headers and message bodies.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::cache::{InboundCache, OutboundCache, NO_CACHE};
use crate::error::{Result, UrpError};
use crate::types::{type_names, Type, TypeClass, UnoException, UnoValue};

const TYPE_CACHE_FLAG: u8 = 0x80;

/// Caches consulted while decoding values.
#[derive(Debug, Default)]
pub struct ReadCaches {
    pub types: InboundCache<Type>,
    pub oids: InboundCache<String>,
}

/// Caches updated while encoding values.
#[derive(Debug, Default)]
pub struct WriteCaches {
    pub types: OutboundCache<Type>,
    pub oids: OutboundCache<String>,
}

pub fn write_compressed(buf: &mut BytesMut, value: u32) {
    if value < 0xFF {
        buf.put_u8(value as u8);
    } else {
        buf.put_u8(0xFF);
        buf.put_u32(value);
    }
}

pub fn read_compressed(buf: &mut Bytes) -> Result<u32> {
    need(buf, 1, "compressed number")?;
    match buf.get_u8() {
        0xFF => {
            need(buf, 4, "compressed number")?;
            Ok(buf.get_u32())
        }
        small => Ok(u32::from(small)),
    }
}

pub fn write_string(buf: &mut BytesMut, s: &str) {
    write_compressed(buf, s.len() as u32);
    buf.put_slice(s.as_bytes());
}

pub fn read_string(buf: &mut Bytes) -> Result<String> {
    let raw = read_byte_run(buf, "string")?;
    String::from_utf8(raw.to_vec())
        .map_err(|e| UrpError::Marshal(format!("string is not UTF-8: {e}")))
}

/// Read a compressed length followed by that many raw bytes.
pub fn read_byte_run(buf: &mut Bytes, what: &str) -> Result<Bytes> {
    let len = read_compressed(buf)? as usize;
    need(buf, len, what)?;
    Ok(buf.copy_to_bytes(len))
}

/// Write a type descriptor.
///
/// Simple types are a single byte. Complex types carry a cache index and,
/// the first time they are sent, their name. Without a cache the name is
/// always sent with index `0xFFFF`.
pub fn write_type(buf: &mut BytesMut, ty: &Type, cache: Option<&mut OutboundCache<Type>>) {
    let class = ty.class as u8;
    if ty.class.is_simple() {
        buf.put_u8(class);
        return;
    }
    match cache {
        Some(cache) => {
            let (index, is_new) = cache.intern(ty);
            if is_new {
                buf.put_u8(class | TYPE_CACHE_FLAG);
                buf.put_u16(index);
                write_string(buf, &ty.name);
            } else {
                buf.put_u8(class);
                buf.put_u16(index);
            }
        }
        None => {
            buf.put_u8(class | TYPE_CACHE_FLAG);
            buf.put_u16(NO_CACHE);
            write_string(buf, &ty.name);
        }
    }
}

/// Read a type descriptor, resolving cache references.
pub fn read_type(buf: &mut Bytes, cache: &mut InboundCache<Type>) -> Result<Type> {
    need(buf, 1, "type")?;
    let byte = buf.get_u8();
    let class = TypeClass::try_from(byte).map_err(UrpError::UnknownTypeClass)?;
    if class.is_simple() {
        return Ok(Type::simple(class));
    }
    need(buf, 2, "type cache index")?;
    let index = buf.get_u16();
    if byte & TYPE_CACHE_FLAG != 0 {
        let ty = Type::named(class, read_string(buf)?);
        cache.store(index, ty.clone())?;
        Ok(ty)
    } else {
        cache.lookup(index, "type")
    }
}

/// Write `value` as an instance of `ty`.
pub fn write_value(buf: &mut BytesMut, value: &UnoValue, ty: &Type, caches: &mut WriteCaches) {
    match value {
        UnoValue::Void => {}
        UnoValue::Bool(b) => buf.put_u8(u8::from(*b)),
        UnoValue::Byte(b) => buf.put_u8(*b),
        UnoValue::Short(n) => buf.put_i16(*n),
        UnoValue::UnsignedShort(n) => buf.put_u16(*n),
        UnoValue::Long(n) | UnoValue::Enum(n) => buf.put_i32(*n),
        UnoValue::UnsignedLong(n) => buf.put_u32(*n),
        UnoValue::Hyper(n) => buf.put_i64(*n),
        UnoValue::UnsignedHyper(n) => buf.put_u64(*n),
        UnoValue::Float(f) => buf.put_f32(*f),
        UnoValue::Double(d) => buf.put_f64(*d),
        UnoValue::Char(c) => buf.put_u16(*c),
        UnoValue::String(s) => write_string(buf, s),
        UnoValue::Type(t) => write_type(buf, t, Some(&mut caches.types)),
        UnoValue::Any(any) => {
            write_type(buf, &any.type_desc, Some(&mut caches.types));
            write_value(buf, &any.value, &any.type_desc, caches);
        }
        UnoValue::Struct(members) => {
            let layout = struct_layout(&ty.name);
            for (i, member) in members.iter().enumerate() {
                let member_type = layout
                    .as_ref()
                    .and_then(|l| l.get(i).cloned())
                    .unwrap_or_else(|| member.infer_type());
                write_value(buf, member, &member_type, caches);
            }
        }
        UnoValue::Exception(exc) => {
            write_string(buf, &exc.message);
            write_value(buf, &UnoValue::null_interface(), &Type::interface(""), caches);
        }
        UnoValue::Sequence(items) => {
            write_compressed(buf, items.len() as u32);
            let element = ty.element().unwrap_or_else(Type::any);
            for item in items {
                write_value(buf, item, &element, caches);
            }
        }
        UnoValue::Interface(oid) => {
            if oid.is_empty() {
                write_string(buf, "");
                buf.put_u16(NO_CACHE);
                return;
            }
            let (index, is_new) = caches.oids.intern(oid);
            write_string(buf, if is_new { oid } else { "" });
            buf.put_u16(index);
        }
    }
}

/// Read an instance of `ty`.
pub fn read_value(buf: &mut Bytes, ty: &Type, caches: &mut ReadCaches) -> Result<UnoValue> {
    let value = match ty.class {
        TypeClass::Void => UnoValue::Void,
        TypeClass::Boolean => {
            need(buf, 1, "boolean")?;
            UnoValue::Bool(buf.get_u8() != 0)
        }
        TypeClass::Byte => {
            need(buf, 1, "byte")?;
            UnoValue::Byte(buf.get_u8())
        }
        TypeClass::Short => {
            need(buf, 2, "short")?;
            UnoValue::Short(buf.get_i16())
        }
        TypeClass::UnsignedShort => {
            need(buf, 2, "unsigned short")?;
            UnoValue::UnsignedShort(buf.get_u16())
        }
        TypeClass::Long => {
            need(buf, 4, "long")?;
            UnoValue::Long(buf.get_i32())
        }
        TypeClass::UnsignedLong => {
            need(buf, 4, "unsigned long")?;
            UnoValue::UnsignedLong(buf.get_u32())
        }
        TypeClass::Hyper => {
            need(buf, 8, "hyper")?;
            UnoValue::Hyper(buf.get_i64())
        }
        TypeClass::UnsignedHyper => {
            need(buf, 8, "unsigned hyper")?;
            UnoValue::UnsignedHyper(buf.get_u64())
        }
        TypeClass::Float => {
            need(buf, 4, "float")?;
            UnoValue::Float(buf.get_f32())
        }
        TypeClass::Double => {
            need(buf, 8, "double")?;
            UnoValue::Double(buf.get_f64())
        }
        TypeClass::Char => {
            need(buf, 2, "char")?;
            UnoValue::Char(buf.get_u16())
        }
        TypeClass::String => UnoValue::String(read_string(buf)?),
        TypeClass::Type => UnoValue::Type(read_type(buf, &mut caches.types)?),
        TypeClass::Any => {
            let inner = read_type(buf, &mut caches.types)?;
            let value = read_value(buf, &inner, caches)?;
            UnoValue::any(inner, value)
        }
        TypeClass::Enum => {
            need(buf, 4, "enum")?;
            UnoValue::Enum(buf.get_i32())
        }
        TypeClass::Struct => {
            let layout = struct_layout(&ty.name)
                .ok_or_else(|| UrpError::Marshal(format!("unknown struct type {}", ty.name)))?;
            let mut members = Vec::with_capacity(layout.len());
            for member_type in &layout {
                members.push(read_value(buf, member_type, caches)?);
            }
            UnoValue::Struct(members)
        }
        TypeClass::Exception => {
            let message = read_string(buf)?;
            // Context; derived exception members are not decoded.
            read_value(buf, &Type::interface(type_names::X_INTERFACE), caches)?;
            UnoValue::Exception(UnoException {
                type_name: ty.name.clone(),
                message,
            })
        }
        TypeClass::Sequence => {
            let element = ty
                .element()
                .ok_or_else(|| UrpError::Marshal(format!("bad sequence type {}", ty.name)))?;
            if element.class == TypeClass::Byte {
                let raw = read_byte_run(buf, "byte sequence")?;
                UnoValue::Sequence(raw.iter().map(|b| UnoValue::Byte(*b)).collect())
            } else {
                let count = read_compressed(buf)? as usize;
                let mut items = Vec::with_capacity(count.min(4096));
                for _ in 0..count {
                    items.push(read_value(buf, &element, caches)?);
                }
                UnoValue::Sequence(items)
            }
        }
        TypeClass::Interface => {
            let oid = read_string(buf)?;
            need(buf, 2, "interface cache index")?;
            let index = buf.get_u16();
            if oid.is_empty() {
                if index == NO_CACHE {
                    UnoValue::null_interface()
                } else {
                    UnoValue::Interface(caches.oids.lookup(index, "OID")?)
                }
            } else {
                caches.oids.store(index, oid.clone())?;
                UnoValue::Interface(oid)
            }
        }
    };
    Ok(value)
}

/// Member types of the structs this client exchanges, in declaration order.
pub fn struct_layout(name: &str) -> Option<Vec<Type>> {
    let layout = match name {
        type_names::PROPERTY_VALUE => vec![
            Type::string(),
            Type::long(),
            Type::any(),
            Type::r#enum("com.sun.star.beans.PropertyState"),
        ],
        type_names::PROTOCOL_PROPERTY => vec![Type::string(), Type::any()],
        type_names::CELL_ADDRESS => vec![Type::short(), Type::long(), Type::long()],
        type_names::CELL_RANGE_ADDRESS => vec![
            Type::short(),
            Type::long(),
            Type::long(),
            Type::long(),
            Type::long(),
        ],
        _ => return None,
    };
    Some(layout)
}

/// A `com.sun.star.beans.PropertyValue` with a direct value.
pub fn property_value(name: &str, value_type: Type, value: UnoValue) -> UnoValue {
    UnoValue::Struct(vec![
        UnoValue::String(name.to_string()),
        UnoValue::Long(0),
        UnoValue::any(value_type, value),
        UnoValue::Enum(0),
    ])
}

fn need(buf: &Bytes, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(UrpError::Marshal(format!(
            "truncated {what}: need {needed} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encode(value: &UnoValue, ty: &Type) -> Bytes {
        let mut buf = BytesMut::new();
        write_value(&mut buf, value, ty, &mut WriteCaches::default());
        buf.freeze()
    }

    #[test]
    fn compressed_number_boundaries() {
        for (value, len) in [(0u32, 1usize), (254, 1), (255, 5), (100_000, 5)] {
            let mut buf = BytesMut::new();
            write_compressed(&mut buf, value);
            assert_eq!(buf.len(), len, "encoded length of {value}");
            assert_eq!(read_compressed(&mut buf.freeze()).unwrap(), value);
        }
    }

    #[test]
    fn truncated_string_is_an_error() {
        let mut bytes = Bytes::from_static(&[5, b'a', b'b']);
        assert!(matches!(read_string(&mut bytes), Err(UrpError::Marshal(_))));
    }

    #[test]
    fn complex_type_is_sent_once_then_by_index() {
        let ty = Type::interface(type_names::X_TEXT_RANGE);
        let mut out = OutboundCache::new();
        let mut buf = BytesMut::new();
        write_type(&mut buf, &ty, Some(&mut out));
        let first_len = buf.len();
        write_type(&mut buf, &ty, Some(&mut out));
        assert_eq!(buf.len() - first_len, 3);

        let mut bytes = buf.freeze();
        let mut cache = InboundCache::new();
        assert_eq!(read_type(&mut bytes, &mut cache).unwrap(), ty);
        assert_eq!(read_type(&mut bytes, &mut cache).unwrap(), ty);
        assert!(bytes.is_empty());
    }

    #[test]
    fn uncached_type_reference_is_a_cache_error() {
        let mut bytes = Bytes::from_static(&[TypeClass::Interface as u8, 0, 9]);
        let err = read_type(&mut bytes, &mut InboundCache::new()).unwrap_err();
        assert!(matches!(err, UrpError::Cache(_)));
    }

    #[test]
    fn any_carrying_long_color() {
        let value = UnoValue::any(Type::long(), UnoValue::Long(0xFF0000));
        let mut bytes = encode(&value, &Type::any());
        assert_eq!(bytes.as_ref(), &[TypeClass::Long as u8, 0x00, 0xFF, 0x00, 0x00]);
        let back = read_value(&mut bytes, &Type::any(), &mut ReadCaches::default()).unwrap();
        assert_eq!(back.as_i64(), Some(0xFF0000));
    }

    #[test]
    fn cell_range_address_struct() {
        let ty = Type::r#struct(type_names::CELL_RANGE_ADDRESS);
        let mut buf = BytesMut::new();
        buf.put_i16(0);
        for n in [0i32, 0, 3, 9] {
            buf.put_i32(n);
        }
        let value = read_value(&mut buf.freeze(), &ty, &mut ReadCaches::default()).unwrap();
        assert_eq!(
            value,
            UnoValue::Struct(vec![
                UnoValue::Short(0),
                UnoValue::Long(0),
                UnoValue::Long(0),
                UnoValue::Long(3),
                UnoValue::Long(9),
            ])
        );
    }

    #[test]
    fn property_value_sequence_uses_struct_layout() {
        let props = UnoValue::Sequence(vec![property_value(
            "Hidden",
            Type::boolean(),
            UnoValue::Bool(true),
        )]);
        let ty = Type::sequence(type_names::PROPERTY_VALUE);
        let mut bytes = encode(&props, &ty);
        let back = read_value(&mut bytes, &ty, &mut ReadCaches::default()).unwrap();
        assert_eq!(back, props);
        assert!(bytes.is_empty());
    }

    #[test]
    fn interface_reference_resolves_through_oid_cache() {
        let ty = Type::interface(type_names::X_CELL);
        let mut write = WriteCaches::default();
        let mut buf = BytesMut::new();
        let iface = UnoValue::Interface("cell-oid".into());
        write_value(&mut buf, &iface, &ty, &mut write);
        write_value(&mut buf, &iface, &ty, &mut write);
        write_value(&mut buf, &UnoValue::null_interface(), &ty, &mut write);

        let mut bytes = buf.freeze();
        let mut read = ReadCaches::default();
        for expected in [iface.clone(), iface, UnoValue::null_interface()] {
            assert_eq!(read_value(&mut bytes, &ty, &mut read).unwrap(), expected);
        }
    }

    #[test]
    fn exception_reads_message_and_skips_context() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "no such sheet");
        write_string(&mut buf, "");
        buf.put_u16(NO_CACHE);
        let ty = Type::named(TypeClass::Exception, "com.sun.star.lang.IndexOutOfBoundsException");
        let value = read_value(&mut buf.freeze(), &ty, &mut ReadCaches::default()).unwrap();
        assert_eq!(
            value,
            UnoValue::Exception(UnoException {
                type_name: "com.sun.star.lang.IndexOutOfBoundsException".into(),
                message: "no such sheet".into(),
            })
        );
    }

    #[test]
    fn unknown_struct_is_rejected() {
        let ty = Type::r#struct("com.example.Unknown");
        let err = read_value(&mut Bytes::new(), &ty, &mut ReadCaches::default()).unwrap_err();
        assert!(matches!(err, UrpError::Marshal(_)));
    }
}
