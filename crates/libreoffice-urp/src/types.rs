//! UNO type descriptors and values as they travel over URP.

use std::fmt;

/// UNO TypeClass. Discriminants are the wire encoding (low 7 bits of a
/// type byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeClass {
    Void = 0,
    Char = 1,
    Boolean = 2,
    Byte = 3,
    Short = 4,
    UnsignedShort = 5,
    Long = 6,
    UnsignedLong = 7,
    Hyper = 8,
    UnsignedHyper = 9,
    Float = 10,
    Double = 11,
    String = 12,
    Type = 13,
    Any = 14,
    Enum = 15,
    Struct = 17,
    Exception = 19,
    Sequence = 20,
    Interface = 22,
}

impl TypeClass {
    /// Simple type classes carry no name and are never cached.
    pub fn is_simple(self) -> bool {
        (self as u8) <= TypeClass::Any as u8
    }
}

impl TryFrom<u8> for TypeClass {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        let class = match byte & 0x7F {
            0 => TypeClass::Void,
            1 => TypeClass::Char,
            2 => TypeClass::Boolean,
            3 => TypeClass::Byte,
            4 => TypeClass::Short,
            5 => TypeClass::UnsignedShort,
            6 => TypeClass::Long,
            7 => TypeClass::UnsignedLong,
            8 => TypeClass::Hyper,
            9 => TypeClass::UnsignedHyper,
            10 => TypeClass::Float,
            11 => TypeClass::Double,
            12 => TypeClass::String,
            13 => TypeClass::Type,
            14 => TypeClass::Any,
            15 => TypeClass::Enum,
            17 => TypeClass::Struct,
            19 => TypeClass::Exception,
            20 => TypeClass::Sequence,
            22 => TypeClass::Interface,
            other => return Err(other),
        };
        Ok(class)
    }
}

/// A UNO type: its class plus, for complex classes, the qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub class: TypeClass,
    pub name: String,
}

impl Type {
    pub fn simple(class: TypeClass) -> Self {
        debug_assert!(class.is_simple());
        Self {
            class,
            name: String::new(),
        }
    }

    pub fn named(class: TypeClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }

    pub fn void() -> Self {
        Self::simple(TypeClass::Void)
    }

    pub fn boolean() -> Self {
        Self::simple(TypeClass::Boolean)
    }

    pub fn short() -> Self {
        Self::simple(TypeClass::Short)
    }

    pub fn long() -> Self {
        Self::simple(TypeClass::Long)
    }

    pub fn string() -> Self {
        Self::simple(TypeClass::String)
    }

    pub fn any() -> Self {
        Self::simple(TypeClass::Any)
    }

    pub fn r#type() -> Self {
        Self::simple(TypeClass::Type)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::named(TypeClass::Interface, name)
    }

    pub fn r#struct(name: impl Into<String>) -> Self {
        Self::named(TypeClass::Struct, name)
    }

    pub fn r#enum(name: impl Into<String>) -> Self {
        Self::named(TypeClass::Enum, name)
    }

    /// `[]element` sequence type.
    pub fn sequence(element: &str) -> Self {
        Self::named(TypeClass::Sequence, format!("[]{element}"))
    }

    /// Element type of a sequence type, derived from its name.
    pub fn element(&self) -> Option<Type> {
        let name = self.name.strip_prefix("[]")?;
        let class = class_for_name(name);
        Some(if class.is_simple() {
            Type::simple(class)
        } else {
            Type::named(class, name)
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{:?}", self.class)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Best-effort TypeClass for a bare type name.
///
/// UNO interface names follow the `X...` convention; other dotted names are
/// treated as structs.
pub fn class_for_name(name: &str) -> TypeClass {
    match name {
        "" | "void" => TypeClass::Void,
        "char" => TypeClass::Char,
        "boolean" => TypeClass::Boolean,
        "byte" => TypeClass::Byte,
        "short" => TypeClass::Short,
        "unsigned short" => TypeClass::UnsignedShort,
        "long" => TypeClass::Long,
        "unsigned long" => TypeClass::UnsignedLong,
        "hyper" => TypeClass::Hyper,
        "unsigned hyper" => TypeClass::UnsignedHyper,
        "float" => TypeClass::Float,
        "double" => TypeClass::Double,
        "string" => TypeClass::String,
        "type" => TypeClass::Type,
        "any" => TypeClass::Any,
        n if n.starts_with("[]") => TypeClass::Sequence,
        n if n.rsplit('.').next().is_some_and(|last| last.starts_with('X')) => {
            TypeClass::Interface
        }
        n if n.contains('.') => TypeClass::Struct,
        _ => TypeClass::Interface,
    }
}

/// A value that can be sent or received over URP.
#[derive(Debug, Clone, PartialEq)]
pub enum UnoValue {
    Void,
    Bool(bool),
    Byte(u8),
    Short(i16),
    UnsignedShort(u16),
    Long(i32),
    UnsignedLong(u32),
    Hyper(i64),
    UnsignedHyper(u64),
    Float(f32),
    Double(f64),
    Char(u16),
    String(String),
    Type(Type),
    Any(Box<Any>),
    Enum(i32),
    Struct(Vec<UnoValue>),
    Exception(UnoException),
    Sequence(Vec<UnoValue>),
    /// Interface reference by OID; an empty OID is the null reference.
    Interface(String),
}

impl UnoValue {
    /// Wrap a value together with its type descriptor.
    pub fn any(type_desc: Type, value: UnoValue) -> Self {
        UnoValue::Any(Box::new(Any { type_desc, value }))
    }

    pub fn null_interface() -> Self {
        UnoValue::Interface(String::new())
    }

    /// Look through an `Any` wrapper, if there is one.
    pub fn unwrap_any(&self) -> &UnoValue {
        match self {
            UnoValue::Any(a) => &a.value,
            other => other,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.unwrap_any(), UnoValue::Void)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.unwrap_any() {
            UnoValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.unwrap_any() {
            UnoValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of any of the integral variants.
    pub fn as_i64(&self) -> Option<i64> {
        match self.unwrap_any() {
            UnoValue::Byte(n) => Some(i64::from(*n)),
            UnoValue::Short(n) => Some(i64::from(*n)),
            UnoValue::UnsignedShort(n) => Some(i64::from(*n)),
            UnoValue::Long(n) | UnoValue::Enum(n) => Some(i64::from(*n)),
            UnoValue::UnsignedLong(n) => Some(i64::from(*n)),
            UnoValue::Hyper(n) => Some(*n),
            _ => None,
        }
    }

    /// OID of a non-null interface reference, directly or inside an `Any`.
    pub fn interface_oid(&self) -> Option<&str> {
        match self.unwrap_any() {
            UnoValue::Interface(oid) if !oid.is_empty() => Some(oid),
            _ => None,
        }
    }

    /// The wire type implied by the variant alone.
    ///
    /// Struct members are marshalled without type tags, so a struct built by
    /// hand must use correctly-typed members (e.g. `CellAddress` is
    /// `[Short, Long, Long]`).
    pub fn infer_type(&self) -> Type {
        let class = match self {
            UnoValue::Void => TypeClass::Void,
            UnoValue::Bool(_) => TypeClass::Boolean,
            UnoValue::Byte(_) => TypeClass::Byte,
            UnoValue::Short(_) => TypeClass::Short,
            UnoValue::UnsignedShort(_) => TypeClass::UnsignedShort,
            UnoValue::Long(_) => TypeClass::Long,
            UnoValue::UnsignedLong(_) => TypeClass::UnsignedLong,
            UnoValue::Hyper(_) => TypeClass::Hyper,
            UnoValue::UnsignedHyper(_) => TypeClass::UnsignedHyper,
            UnoValue::Float(_) => TypeClass::Float,
            UnoValue::Double(_) => TypeClass::Double,
            UnoValue::Char(_) => TypeClass::Char,
            UnoValue::String(_) => TypeClass::String,
            UnoValue::Type(_) => TypeClass::Type,
            UnoValue::Any(_) => TypeClass::Any,
            UnoValue::Enum(_) => return Type::r#enum(""),
            UnoValue::Struct(_) => return Type::r#struct(""),
            UnoValue::Exception(_) => return Type::named(TypeClass::Exception, ""),
            UnoValue::Sequence(_) => return Type::sequence(""),
            UnoValue::Interface(_) => return Type::interface(""),
        };
        Type::simple(class)
    }
}

/// A value tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub struct Any {
    pub type_desc: Type,
    pub value: UnoValue,
}

/// A UNO exception. Only the base `com.sun.star.uno.Exception` members are
/// decoded; derived members are left unread.
#[derive(Debug, Clone, PartialEq)]
pub struct UnoException {
    pub type_name: String,
    pub message: String,
}

/// Qualified names of the UNO interfaces, structs and services this crate
/// and its users talk to.
pub mod type_names {
    pub const X_INTERFACE: &str = "com.sun.star.uno.XInterface";
    pub const X_COMPONENT_CONTEXT: &str = "com.sun.star.uno.XComponentContext";
    pub const X_MULTI_COMPONENT_FACTORY: &str = "com.sun.star.lang.XMultiComponentFactory";
    pub const X_COMPONENT_LOADER: &str = "com.sun.star.frame.XComponentLoader";
    pub const X_DESKTOP: &str = "com.sun.star.frame.XDesktop";
    pub const X_COMPONENT: &str = "com.sun.star.lang.XComponent";
    pub const X_CLOSEABLE: &str = "com.sun.star.util.XCloseable";
    pub const X_PROTOCOL_PROPERTIES: &str = "com.sun.star.bridge.XProtocolProperties";

    pub const X_SPREADSHEET_DOCUMENT: &str = "com.sun.star.sheet.XSpreadsheetDocument";
    pub const X_SPREADSHEETS: &str = "com.sun.star.sheet.XSpreadsheets";
    pub const X_SPREADSHEET: &str = "com.sun.star.sheet.XSpreadsheet";
    pub const X_USED_AREA_CURSOR: &str = "com.sun.star.sheet.XUsedAreaCursor";
    pub const X_CELL_RANGE_ADDRESSABLE: &str = "com.sun.star.sheet.XCellRangeAddressable";
    pub const X_CELL_RANGE: &str = "com.sun.star.table.XCellRange";
    pub const X_CELL: &str = "com.sun.star.table.XCell";
    pub const X_INDEX_ACCESS: &str = "com.sun.star.container.XIndexAccess";
    pub const X_NAMED: &str = "com.sun.star.container.XNamed";
    pub const X_ENUMERATION_ACCESS: &str = "com.sun.star.container.XEnumerationAccess";
    pub const X_ENUMERATION: &str = "com.sun.star.container.XEnumeration";
    pub const X_TEXT_RANGE: &str = "com.sun.star.text.XTextRange";
    pub const X_PROPERTY_SET: &str = "com.sun.star.beans.XPropertySet";

    pub const PROPERTY_VALUE: &str = "com.sun.star.beans.PropertyValue";
    pub const PROTOCOL_PROPERTY: &str = "com.sun.star.bridge.ProtocolProperty";
    pub const CELL_ADDRESS: &str = "com.sun.star.table.CellAddress";
    pub const CELL_RANGE_ADDRESS: &str = "com.sun.star.table.CellRangeAddress";

    pub const SERVICE_DESKTOP: &str = "com.sun.star.frame.Desktop";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_class_from_wire_byte() {
        assert_eq!(TypeClass::try_from(6), Ok(TypeClass::Long));
        // Cache flag bit is ignored.
        assert_eq!(TypeClass::try_from(0x80 | 22), Ok(TypeClass::Interface));
        assert_eq!(TypeClass::try_from(16), Err(16));
    }

    #[test]
    fn class_for_name_guesses() {
        assert_eq!(class_for_name("long"), TypeClass::Long);
        assert_eq!(class_for_name("com.sun.star.uno.XInterface"), TypeClass::Interface);
        assert_eq!(class_for_name(type_names::PROPERTY_VALUE), TypeClass::Struct);
        assert_eq!(class_for_name("[]string"), TypeClass::Sequence);
    }

    #[test]
    fn sequence_element_type() {
        let seq = Type::sequence(type_names::PROPERTY_VALUE);
        let elem = seq.element().unwrap();
        assert_eq!(elem.class, TypeClass::Struct);
        assert_eq!(elem.name, type_names::PROPERTY_VALUE);

        assert_eq!(Type::sequence("long").element(), Some(Type::long()));
        assert_eq!(Type::long().element(), None);
    }

    #[test]
    fn value_accessors_look_through_any() {
        let v = UnoValue::any(Type::long(), UnoValue::Long(-1));
        assert_eq!(v.as_i64(), Some(-1));
        assert!(!v.is_void());

        let iface = UnoValue::any(Type::interface("x.XFoo"), UnoValue::Interface("oid1".into()));
        assert_eq!(iface.interface_oid(), Some("oid1"));
        assert_eq!(UnoValue::null_interface().interface_oid(), None);
        assert!(UnoValue::any(Type::void(), UnoValue::Void).is_void());
    }
}
