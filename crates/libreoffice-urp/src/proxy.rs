//! Handles for remote UNO objects and the parameter codec for calls on them.

use bytes::{Bytes, BytesMut};

use crate::error::{Result, UrpError};
use crate::interface::{MethodDef, ParamType};
use crate::marshal::{self, ReadCaches, WriteCaches};
use crate::types::{Type, TypeClass, UnoValue};

/// A remote object seen through one of its interfaces.
///
/// Cheap to clone; all traffic goes through the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnoProxy {
    pub oid: String,
    pub interface: Type,
}

impl UnoProxy {
    pub fn new(oid: impl Into<String>, interface: Type) -> Self {
        Self {
            oid: oid.into(),
            interface,
        }
    }

    /// The same object, viewed through another interface name.
    pub fn retyped(&self, interface_name: &str) -> Self {
        Self::new(self.oid.clone(), Type::interface(interface_name))
    }
}

/// Encode the in-parameters of a call.
pub fn encode_params(
    method: &MethodDef,
    args: &[UnoValue],
    caches: &mut WriteCaches,
) -> Result<BytesMut> {
    if args.len() != method.params.len() {
        return Err(UrpError::Marshal(format!(
            "{} takes {} argument(s), got {}",
            method.name,
            method.params.len(),
            args.len()
        )));
    }
    let mut buf = BytesMut::with_capacity(64);
    for (arg, param) in args.iter().zip(method.params) {
        marshal::write_value(&mut buf, arg, &param.to_type(), caches);
    }
    Ok(buf)
}

/// Decode the return value of a successful call.
pub fn decode_return(method: &MethodDef, mut body: Bytes, caches: &mut ReadCaches) -> Result<UnoValue> {
    if method.returns == ParamType::Void {
        return Ok(UnoValue::Void);
    }
    marshal::read_value(&mut body, &method.returns.to_type(), caches)
}

/// The interface reference a call returned, typed the way the office sent
/// it: the declared return type, or the type of a returned `any`. `None`
/// for a null reference or a result that is not an interface.
pub fn returned_proxy(method: &MethodDef, value: &UnoValue) -> Option<UnoProxy> {
    match (value, method.returns) {
        (UnoValue::Interface(oid), ParamType::Interface(name)) if !oid.is_empty() => {
            Some(UnoProxy::new(oid.clone(), Type::interface(name)))
        }
        (UnoValue::Any(any), _) if any.type_desc.class == TypeClass::Interface => {
            match &any.value {
                UnoValue::Interface(oid) if !oid.is_empty() => {
                    Some(UnoProxy::new(oid.clone(), any.type_desc.clone()))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Interpret a `queryInterface` result: a void `any` means "not supported".
pub fn query_interface_result(value: UnoValue, requested: Type) -> Result<Option<UnoProxy>> {
    match value {
        UnoValue::Any(any) if any.type_desc.class == TypeClass::Void => Ok(None),
        UnoValue::Any(any) => match any.value {
            UnoValue::Interface(oid) if !oid.is_empty() => Ok(Some(UnoProxy::new(oid, requested))),
            _ => Ok(None),
        },
        other => Err(UrpError::Protocol(format!(
            "queryInterface returned {other:?} instead of an any"
        ))),
    }
}
