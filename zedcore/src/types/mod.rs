//! Types module
//!
//! ZED types come in two flavours:
//!
//! - *Primitive* types ([`PrimitiveId`]) have fixed IDs below
//!   [`FIRST_STRUCTURAL_ID`](crate::magic::FIRST_STRUCTURAL_ID) and exist once
//!   per process.
//! - *Structural* types (records, arrays, sets, maps, unions, enums, errors
//!   and named types) are interned by a [`TypeContext`], which hands out IDs
//!   from 32 upward.
//!
//! A [`Type`] is a cheap, reference-counted handle. Because every structural
//! type is interned exactly once per context, two handles are the same type
//! iff they point at the same node; `==` and `Hash` are therefore pointer
//! based.
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use once_cell::sync::Lazy;
use strum::{Display, EnumIs, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

pub mod compare;
pub mod context;
pub mod fmt_type;
pub mod tv;

pub use compare::compare_types;
pub use context::TypeContext;

/// Stable IDs of the primitive types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum PrimitiveId {
    Uint8 = 0,
    Uint16 = 1,
    Uint32 = 2,
    Uint64 = 3,
    Int8 = 6,
    Int16 = 7,
    Int32 = 8,
    Int64 = 9,
    Duration = 12,
    Time = 13,
    Float16 = 14,
    Float32 = 15,
    Float64 = 16,
    Bool = 23,
    Bytes = 24,
    String = 25,
    Ip = 26,
    Net = 27,
    Type = 28,
    Null = 29,
}

impl PrimitiveId {
    pub fn from_id(id: u32) -> Option<Self> {
        PrimitiveId::iter().find(|p| *p as u32 == id)
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn is_unsigned(self) -> bool {
        (self as u8) <= PrimitiveId::Uint64 as u8
    }

    /// Signed integers, including the integer-backed `duration` and `time`.
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveId::Int8
                | PrimitiveId::Int16
                | PrimitiveId::Int32
                | PrimitiveId::Int64
                | PrimitiveId::Duration
                | PrimitiveId::Time
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_unsigned() || self.is_signed()
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            PrimitiveId::Float16 | PrimitiveId::Float32 | PrimitiveId::Float64
        )
    }

    pub fn is_number(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width class of an integer type (0 for 8 bits ... 3 for 64 bits).
    pub fn int_rank(self) -> u8 {
        match self {
            PrimitiveId::Uint8 | PrimitiveId::Int8 => 0,
            PrimitiveId::Uint16 | PrimitiveId::Int16 => 1,
            PrimitiveId::Uint32 | PrimitiveId::Int32 => 2,
            _ => 3,
        }
    }
}

/// Coarse classification of a type, as reported by the `kind` function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIs)]
#[strum(serialize_all = "lowercase")]
pub enum Kind {
    Primitive,
    Record,
    Array,
    Set,
    Map,
    Union,
    Enum,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Structure of a type. Children are interned [`Type`] handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum TypeDef {
    Primitive(PrimitiveId),
    Record(Vec<Field>),
    Array(Type),
    Set(Type),
    Map(Type, Type),
    Union(Vec<Type>),
    Enum(Vec<String>),
    Error(Type),
    Named(String, Type),
}

struct TypeNode {
    id: u32,
    def: TypeDef,
}

/// Handle to an interned type.
#[derive(Clone)]
pub struct Type(Arc<TypeNode>);

static PRIMITIVES: Lazy<[Option<Type>; 32]> = Lazy::new(|| {
    std::array::from_fn(|id| {
        PrimitiveId::from_id(id as u32).map(|p| {
            Type(Arc::new(TypeNode {
                id: id as u32,
                def: TypeDef::Primitive(p),
            }))
        })
    })
});

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state)
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

impl Type {
    pub(crate) fn new_structural(id: u32, def: TypeDef) -> Self {
        Type(Arc::new(TypeNode { id, def }))
    }

    /// The process-wide handle for a primitive type.
    pub fn primitive(p: PrimitiveId) -> Type {
        match &PRIMITIVES[p as usize] {
            Some(t) => t.clone(),
            None => unreachable!("every PrimitiveId has a table entry"),
        }
    }

    /// Primitive type with the given ID, if `id` names one.
    pub fn lookup_primitive(id: u32) -> Option<Type> {
        PRIMITIVES.get(id as usize)?.clone()
    }

    pub fn null() -> Type {
        Self::primitive(PrimitiveId::Null)
    }
    pub fn bool() -> Type {
        Self::primitive(PrimitiveId::Bool)
    }
    pub fn int64() -> Type {
        Self::primitive(PrimitiveId::Int64)
    }
    pub fn uint64() -> Type {
        Self::primitive(PrimitiveId::Uint64)
    }
    pub fn float64() -> Type {
        Self::primitive(PrimitiveId::Float64)
    }
    pub fn string() -> Type {
        Self::primitive(PrimitiveId::String)
    }
    pub fn bytes() -> Type {
        Self::primitive(PrimitiveId::Bytes)
    }
    pub fn ip() -> Type {
        Self::primitive(PrimitiveId::Ip)
    }
    pub fn net() -> Type {
        Self::primitive(PrimitiveId::Net)
    }
    pub fn duration() -> Type {
        Self::primitive(PrimitiveId::Duration)
    }
    pub fn time() -> Type {
        Self::primitive(PrimitiveId::Time)
    }
    pub fn typ() -> Type {
        Self::primitive(PrimitiveId::Type)
    }

    /// Numeric ID. Named types share the ID of their underlying type.
    pub fn id(&self) -> u32 {
        self.0.id
    }

    pub fn def(&self) -> &TypeDef {
        &self.0.def
    }

    /// Strip any number of named-type layers.
    pub fn under(&self) -> &Type {
        let mut t = self;
        while let TypeDef::Named(_, under) = t.def() {
            t = under;
        }
        t
    }

    pub fn kind(&self) -> Kind {
        match self.under().def() {
            TypeDef::Primitive(_) => Kind::Primitive,
            TypeDef::Record(_) => Kind::Record,
            TypeDef::Array(_) => Kind::Array,
            TypeDef::Set(_) => Kind::Set,
            TypeDef::Map(_, _) => Kind::Map,
            TypeDef::Union(_) => Kind::Union,
            TypeDef::Enum(_) => Kind::Enum,
            TypeDef::Error(_) => Kind::Error,
            // under() never returns a named type
            TypeDef::Named(_, _) => Kind::Primitive,
        }
    }

    /// Primitive ID of the underlying type, if it is primitive.
    pub fn primitive_id(&self) -> Option<PrimitiveId> {
        match self.under().def() {
            TypeDef::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive_id().is_some()
    }

    pub fn is(&self, p: PrimitiveId) -> bool {
        self.primitive_id() == Some(p)
    }

    pub fn is_null(&self) -> bool {
        self.is(PrimitiveId::Null)
    }

    pub fn is_number(&self) -> bool {
        self.primitive_id().is_some_and(PrimitiveId::is_number)
    }

    pub fn is_record(&self) -> bool {
        self.under().def().is_record()
    }

    pub fn is_union(&self) -> bool {
        self.under().def().is_union()
    }

    pub fn is_error(&self) -> bool {
        self.under().def().is_error()
    }

    pub fn is_named(&self) -> bool {
        self.def().is_named()
    }

    /// Whether values of this type are encoded as container bodies.
    pub fn is_container(&self) -> bool {
        match self.under().def() {
            TypeDef::Record(_)
            | TypeDef::Array(_)
            | TypeDef::Set(_)
            | TypeDef::Map(_, _)
            | TypeDef::Union(_) => true,
            TypeDef::Error(inner) => inner.is_container(),
            _ => false,
        }
    }

    /// Name of a named type.
    pub fn name(&self) -> Option<&str> {
        match self.def() {
            TypeDef::Named(name, _) => Some(name),
            _ => None,
        }
    }

    pub fn fields(&self) -> Option<&[Field]> {
        match self.under().def() {
            TypeDef::Record(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn index_of_field(&self, name: &str) -> Option<usize> {
        self.fields()?.iter().position(|f| f.name == name)
    }

    pub fn field_type(&self, name: &str) -> Option<&Type> {
        self.fields()?.iter().find(|f| f.name == name).map(|f| &f.ty)
    }

    /// Element type of an array or set.
    pub fn inner(&self) -> Option<&Type> {
        match self.under().def() {
            TypeDef::Array(t) | TypeDef::Set(t) => Some(t),
            _ => None,
        }
    }

    pub fn members(&self) -> Option<&[Type]> {
        match self.under().def() {
            TypeDef::Union(types) => Some(types),
            _ => None,
        }
    }

    /// Selector of `t` within this union type.
    pub fn tag_of(&self, t: &Type) -> Option<usize> {
        self.members()?.iter().position(|m| m == t)
    }

    pub fn symbols(&self) -> Option<&[String]> {
        match self.under().def() {
            TypeDef::Enum(symbols) => Some(symbols),
            _ => None,
        }
    }

    /// Payload type of an error type.
    pub fn error_inner(&self) -> Option<&Type> {
        match self.under().def() {
            TypeDef::Error(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_handles_are_shared() {
        assert_eq!(Type::int64(), Type::primitive(PrimitiveId::Int64));
        assert_ne!(Type::int64(), Type::uint64());
        assert_eq!(Type::string().id(), 25);
        assert_eq!(Type::null().id(), 29);
    }

    #[test]
    fn primitive_names() {
        assert_eq!(PrimitiveId::Float16.name(), "float16");
        assert_eq!("uint32".parse::<PrimitiveId>().unwrap(), PrimitiveId::Uint32);
        assert_eq!(PrimitiveId::from_id(26), Some(PrimitiveId::Ip));
        assert_eq!(PrimitiveId::from_id(4), None);
    }

    #[test]
    fn classification() {
        assert!(PrimitiveId::Time.is_signed());
        assert!(!PrimitiveId::Uint8.is_signed());
        assert!(PrimitiveId::Float32.is_number());
        assert!(!PrimitiveId::String.is_number());
        assert!(!Type::string().is_container());
    }
}
