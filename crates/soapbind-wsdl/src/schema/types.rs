use std::fmt::Display;

use crate::names::QualifiedName;

/// The simple XML Schema types the engine converts to and from native scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Integer,
    UnsignedByte,
    UnsignedShort,
    UnsignedInt,
    UnsignedLong,
    NonNegativeInteger,
    PositiveInteger,
    NonPositiveInteger,
    NegativeInteger,
    Float,
    Double,
    Decimal,
    DateTime,
    Date,
}

impl ScalarType {
    /// Maps a built-in XML Schema type name to a scalar. String-like built-ins the
    /// engine does not interpret (`anyURI`, `base64Binary`, `duration`, ...) read
    /// as strings. Returns `None` for `anyType`/`anySimpleType` and unknown names.
    pub fn from_xsd(local: &str) -> Option<Self> {
        let scalar = match local {
            "string" | "normalizedString" | "token" | "language" | "Name" | "NCName" | "ID"
            | "IDREF" | "IDREFS" | "ENTITY" | "ENTITIES" | "NMTOKEN" | "NMTOKENS" | "anyURI"
            | "QName" | "NOTATION" | "base64Binary" | "hexBinary" | "duration" | "time"
            | "gYear" | "gYearMonth" | "gMonth" | "gMonthDay" | "gDay" => Self::String,
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "integer" => Self::Integer,
            "unsignedByte" => Self::UnsignedByte,
            "unsignedShort" => Self::UnsignedShort,
            "unsignedInt" => Self::UnsignedInt,
            "unsignedLong" => Self::UnsignedLong,
            "nonNegativeInteger" => Self::NonNegativeInteger,
            "positiveInteger" => Self::PositiveInteger,
            "nonPositiveInteger" => Self::NonPositiveInteger,
            "negativeInteger" => Self::NegativeInteger,
            "float" => Self::Float,
            "double" => Self::Double,
            "decimal" => Self::Decimal,
            "dateTime" => Self::DateTime,
            "date" => Self::Date,
            _ => return None,
        };
        Some(scalar)
    }

    pub fn xsd_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Integer => "integer",
            Self::UnsignedByte => "unsignedByte",
            Self::UnsignedShort => "unsignedShort",
            Self::UnsignedInt => "unsignedInt",
            Self::UnsignedLong => "unsignedLong",
            Self::NonNegativeInteger => "nonNegativeInteger",
            Self::PositiveInteger => "positiveInteger",
            Self::NonPositiveInteger => "nonPositiveInteger",
            Self::NegativeInteger => "negativeInteger",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::DateTime => "dateTime",
            Self::Date => "date",
        }
    }

    /// Inclusive bounds for the integer kinds, `None` for everything else.
    pub fn integer_bounds(self) -> Option<(i128, i128)> {
        let bounds = match self {
            Self::Byte => (i8::MIN.into(), i8::MAX.into()),
            Self::Short => (i16::MIN.into(), i16::MAX.into()),
            Self::Int => (i32::MIN.into(), i32::MAX.into()),
            Self::Long | Self::Integer => (i64::MIN.into(), i64::MAX.into()),
            Self::UnsignedByte => (0, u8::MAX.into()),
            Self::UnsignedShort => (0, u16::MAX.into()),
            Self::UnsignedInt => (0, u32::MAX.into()),
            Self::UnsignedLong | Self::NonNegativeInteger => (0, i64::MAX.into()),
            Self::PositiveInteger => (1, i64::MAX.into()),
            Self::NonPositiveInteger => (i64::MIN.into(), 0),
            Self::NegativeInteger => (i64::MIN.into(), -1),
            _ => return None,
        };
        Some(bounds)
    }
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "xsd:{}", self.xsd_name())
    }
}

/// Index of a complex type in [`super::Schema`]. Named and anonymous types share the
/// same table, which keeps recursive type graphs representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComplexTypeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Scalar(ScalarType),
    Complex(ComplexTypeId),
    /// `anyType` or content the engine does not model; handled generically.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl MaxOccurs {
    pub fn is_repeated(self) -> bool {
        !matches!(self, Self::Bounded(0 | 1))
    }
}

/// A child element declared in a complex type's content model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Wire name; unqualified unless the schema's form rules say otherwise.
    pub name: QualifiedName,
    pub type_ref: TypeRef,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub nillable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplexType {
    pub name: Option<QualifiedName>,
    pub base: Option<ComplexTypeId>,
    pub fields: Vec<FieldDecl>,
    /// Content the schema subset does not model (`any`, `simpleContent`, `group`).
    pub open: bool,
}

/// A global element declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDecl {
    pub name: QualifiedName,
    pub type_ref: TypeRef,
    pub nillable: bool,
}
