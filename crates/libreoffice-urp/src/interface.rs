//! Signatures of the UNO methods this client calls.
//!
//! Method indices are absolute across the inheritance chain: `XInterface`
//! owns 0..=2, so an interface deriving directly from it starts at 3, and
//! each further base adds its own methods before the derived ones.

use crate::types::{type_names, Type};

/// One remote method.
#[derive(Debug, Clone, Copy)]
pub struct MethodDef {
    pub name: &'static str,
    pub index: u16,
    pub params: &'static [ParamType],
    pub returns: ParamType,
    /// One-way calls get no reply.
    pub one_way: bool,
}

/// Wire type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Void,
    Bool,
    Short,
    Long,
    String,
    Type,
    Any,
    Interface(&'static str),
    Struct(&'static str),
    Sequence(&'static str),
}

impl ParamType {
    pub fn to_type(self) -> Type {
        match self {
            ParamType::Void => Type::void(),
            ParamType::Bool => Type::boolean(),
            ParamType::Short => Type::short(),
            ParamType::Long => Type::long(),
            ParamType::String => Type::string(),
            ParamType::Type => Type::r#type(),
            ParamType::Any => Type::any(),
            ParamType::Interface(name) => Type::interface(name),
            ParamType::Struct(name) => Type::r#struct(name),
            ParamType::Sequence(element) => Type::sequence(element),
        }
    }
}

const fn method(
    name: &'static str,
    index: u16,
    params: &'static [ParamType],
    returns: ParamType,
) -> MethodDef {
    MethodDef {
        name,
        index,
        params,
        returns,
        one_way: false,
    }
}

pub mod x_interface {
    use super::*;

    pub const QUERY_INTERFACE: MethodDef =
        method("queryInterface", 0, &[ParamType::Type], ParamType::Any);
    pub const RELEASE: MethodDef = MethodDef {
        one_way: true,
        ..method("release", 2, &[], ParamType::Void)
    };
}

/// Protocol-property negotiation on the bridge itself.
pub mod x_protocol_properties {
    use super::*;

    pub const REQUEST_CHANGE: MethodDef =
        method("requestChange", 4, &[ParamType::Long], ParamType::Long);
    pub const COMMIT_CHANGE: MethodDef = method(
        "commitChange",
        5,
        &[ParamType::Sequence(type_names::PROTOCOL_PROPERTY)],
        ParamType::Void,
    );
}

pub mod x_component_context {
    use super::*;

    pub const GET_SERVICE_MANAGER: MethodDef = method(
        "getServiceManager",
        4,
        &[],
        ParamType::Interface(type_names::X_MULTI_COMPONENT_FACTORY),
    );
}

pub mod x_multi_component_factory {
    use super::*;

    pub const CREATE_INSTANCE_WITH_CONTEXT: MethodDef = method(
        "createInstanceWithContext",
        3,
        &[
            ParamType::String,
            ParamType::Interface(type_names::X_COMPONENT_CONTEXT),
        ],
        ParamType::Interface(type_names::X_INTERFACE),
    );
}

pub mod x_component_loader {
    use super::*;

    pub const LOAD_COMPONENT_FROM_URL: MethodDef = method(
        "loadComponentFromURL",
        3,
        &[
            ParamType::String,
            ParamType::String,
            ParamType::Long,
            ParamType::Sequence(type_names::PROPERTY_VALUE),
        ],
        ParamType::Interface(type_names::X_COMPONENT),
    );
}

pub mod x_desktop {
    use super::*;

    pub const TERMINATE: MethodDef = method("terminate", 3, &[], ParamType::Bool);
}

pub mod x_closeable {
    use super::*;

    pub const CLOSE: MethodDef = method("close", 5, &[ParamType::Bool], ParamType::Void);
}

pub mod x_spreadsheet_document {
    use super::*;

    pub const GET_SHEETS: MethodDef = method(
        "getSheets",
        3,
        &[],
        ParamType::Interface(type_names::X_SPREADSHEETS),
    );
}

pub mod x_index_access {
    use super::*;

    pub const GET_COUNT: MethodDef = method("getCount", 5, &[], ParamType::Long);
    pub const GET_BY_INDEX: MethodDef =
        method("getByIndex", 6, &[ParamType::Long], ParamType::Any);
}

pub mod x_named {
    use super::*;

    pub const GET_NAME: MethodDef = method("getName", 3, &[], ParamType::String);
}

pub mod x_cell_range {
    use super::*;

    pub const GET_CELL_BY_POSITION: MethodDef = method(
        "getCellByPosition",
        3,
        &[ParamType::Long, ParamType::Long],
        ParamType::Interface(type_names::X_CELL),
    );
}

/// `XSpreadsheet` → `XSheetCellRange` → `XCellRange`.
pub mod x_spreadsheet {
    use super::*;

    pub const CREATE_CURSOR: MethodDef = method(
        "createCursor",
        7,
        &[],
        ParamType::Interface("com.sun.star.sheet.XSheetCellCursor"),
    );
}

pub mod x_used_area_cursor {
    use super::*;

    pub const GOTO_START_OF_USED_AREA: MethodDef =
        method("gotoStartOfUsedArea", 3, &[ParamType::Bool], ParamType::Void);
    pub const GOTO_END_OF_USED_AREA: MethodDef =
        method("gotoEndOfUsedArea", 4, &[ParamType::Bool], ParamType::Void);
}

pub mod x_cell_range_addressable {
    use super::*;

    pub const GET_RANGE_ADDRESS: MethodDef = method(
        "getRangeAddress",
        3,
        &[],
        ParamType::Struct(type_names::CELL_RANGE_ADDRESS),
    );
}

pub mod x_text_range {
    use super::*;

    pub const GET_STRING: MethodDef = method("getString", 6, &[], ParamType::String);
}

pub mod x_enumeration_access {
    use super::*;

    pub const CREATE_ENUMERATION: MethodDef = method(
        "createEnumeration",
        5,
        &[],
        ParamType::Interface(type_names::X_ENUMERATION),
    );
}

pub mod x_enumeration {
    use super::*;

    pub const HAS_MORE_ELEMENTS: MethodDef = method("hasMoreElements", 3, &[], ParamType::Bool);
    pub const NEXT_ELEMENT: MethodDef = method("nextElement", 4, &[], ParamType::Any);
}

pub mod x_property_set {
    use super::*;

    pub const GET_PROPERTY_VALUE: MethodDef =
        method("getPropertyValue", 5, &[ParamType::String], ParamType::Any);
}
