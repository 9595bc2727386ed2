//! Core types for the heap object model
//!
//! This module defines the foundational types:
//! - Handle: Identity of a heap object (arena index)
//! - Value: Content of one pointer-shaped slot
//! - ClassId: Closed set of object categories
//! - Space: Allocation space hint (young/old generation)

use std::fmt;

/// Identity of an object living in a heap
///
/// A Handle is an index into the owning heap's arena. Handles are never
/// written to a snapshot; the stream uses its own object-id space instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    /// Create a handle from a raw arena index
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Raw arena index
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Content of one pointer-shaped slot
///
/// `Null`, booleans and small integers are immediates: they are not heap
/// objects and carry no identity. Everything else is a `Ref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Value {
    /// The null object
    #[default]
    Null,
    /// One of the two boolean singletons
    Bool(bool),
    /// Immediate small integer
    Smi(i64),
    /// Reference to a heap object
    Ref(Handle),
}

impl Value {
    /// Referenced handle, if this slot holds a heap reference
    pub fn as_ref(&self) -> Option<Handle> {
        match self {
            Value::Ref(h) => Some(*h),
            _ => None,
        }
    }

    /// True for `Value::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<Handle> for Value {
    fn from(h: Handle) -> Self {
        Value::Ref(h)
    }
}

/// Allocation space hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Space {
    /// Young generation; ordinary constructor path
    New,
    /// Old generation / permanent arena; full-snapshot path
    Old,
}

/// Object category identifier
///
/// These values are part of the snapshot wire format and MUST NOT change.
/// Abstract categories (`AbstractType`, `AbstractTypeArguments`, `String`,
/// `ByteArray`, `Instance`) and `Bool` exist so that every category of the
/// object model has a stable number, but never carry a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ClassId {
    /// Class descriptor
    Class = 1,
    /// Class reference not yet resolved
    UnresolvedClass = 2,
    /// Abstract base of all types
    AbstractType = 3,
    /// Parameterized type
    Type = 4,
    /// Type parameter descriptor
    TypeParameter = 5,
    /// Type instantiated at run time
    InstantiatedType = 6,
    /// Abstract base of all type-argument vectors
    AbstractTypeArguments = 7,
    /// Type-argument vector
    TypeArguments = 8,
    /// Type-argument vector instantiated at run time
    InstantiatedTypeArguments = 9,
    /// Function or method descriptor
    Function = 10,
    /// Field descriptor
    Field = 11,
    /// Literal token
    LiteralToken = 12,
    /// Token stream of a compiled unit
    TokenStream = 13,
    /// Source script
    Script = 14,
    /// Library descriptor
    Library = 15,
    /// Library import prefix (alias)
    LibraryPrefix = 16,
    /// Compiled code
    Code = 17,
    /// Instruction stream
    Instructions = 18,
    /// Program-counter descriptors
    PcDescriptors = 19,
    /// Stack map
    Stackmap = 20,
    /// Local variable descriptors
    LocalVarDescriptors = 21,
    /// Exception handler table
    ExceptionHandlers = 22,
    /// Lexical context record
    Context = 23,
    /// Context scope record
    ContextScope = 24,
    /// Inline cache data
    IcData = 25,
    /// Abstract error value
    Error = 26,
    /// API error value
    ApiError = 27,
    /// Language (compile) error value
    LanguageError = 28,
    /// Unhandled exception value
    UnhandledException = 29,
    /// Unwind error value
    UnwindError = 30,
    /// Plain instance
    Instance = 31,
    /// 64-bit integer
    Mint = 32,
    /// Arbitrary-precision integer
    Bigint = 33,
    /// Double-precision float
    Double = 34,
    /// Abstract base of all strings
    String = 35,
    /// String of 8-bit code units
    OneByteString = 36,
    /// String of 16-bit code units
    TwoByteString = 37,
    /// String of 32-bit code units
    FourByteString = 38,
    /// Externally backed 8-bit string
    ExternalOneByteString = 39,
    /// Externally backed 16-bit string
    ExternalTwoByteString = 40,
    /// Externally backed 32-bit string
    ExternalFourByteString = 41,
    /// Boolean
    Bool = 42,
    /// Fixed array
    Array = 43,
    /// Fixed array that cannot be mutated
    ImmutableArray = 44,
    /// Growable array
    GrowableObjectArray = 45,
    /// Abstract base of byte arrays
    ByteArray = 46,
    /// Byte array stored in the heap
    InternalByteArray = 47,
    /// Externally backed byte array
    ExternalByteArray = 48,
    /// Closure
    Closure = 49,
    /// Stack trace
    Stacktrace = 50,
    /// Regular expression
    JsRegExp = 51,
}

impl ClassId {
    /// Every class id, in numeric order
    pub const ALL: [ClassId; 51] = [
        ClassId::Class,
        ClassId::UnresolvedClass,
        ClassId::AbstractType,
        ClassId::Type,
        ClassId::TypeParameter,
        ClassId::InstantiatedType,
        ClassId::AbstractTypeArguments,
        ClassId::TypeArguments,
        ClassId::InstantiatedTypeArguments,
        ClassId::Function,
        ClassId::Field,
        ClassId::LiteralToken,
        ClassId::TokenStream,
        ClassId::Script,
        ClassId::Library,
        ClassId::LibraryPrefix,
        ClassId::Code,
        ClassId::Instructions,
        ClassId::PcDescriptors,
        ClassId::Stackmap,
        ClassId::LocalVarDescriptors,
        ClassId::ExceptionHandlers,
        ClassId::Context,
        ClassId::ContextScope,
        ClassId::IcData,
        ClassId::Error,
        ClassId::ApiError,
        ClassId::LanguageError,
        ClassId::UnhandledException,
        ClassId::UnwindError,
        ClassId::Instance,
        ClassId::Mint,
        ClassId::Bigint,
        ClassId::Double,
        ClassId::String,
        ClassId::OneByteString,
        ClassId::TwoByteString,
        ClassId::FourByteString,
        ClassId::ExternalOneByteString,
        ClassId::ExternalTwoByteString,
        ClassId::ExternalFourByteString,
        ClassId::Bool,
        ClassId::Array,
        ClassId::ImmutableArray,
        ClassId::GrowableObjectArray,
        ClassId::ByteArray,
        ClassId::InternalByteArray,
        ClassId::ExternalByteArray,
        ClassId::Closure,
        ClassId::Stacktrace,
        ClassId::JsRegExp,
    ];

    /// Wire value
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Try to create from a wire value
    pub fn from_u32(value: u32) -> Option<Self> {
        let index = value.checked_sub(1)? as usize;
        Self::ALL.get(index).copied()
    }

    /// Human-readable category name
    pub fn name(self) -> &'static str {
        match self {
            ClassId::Class => "Class",
            ClassId::UnresolvedClass => "UnresolvedClass",
            ClassId::AbstractType => "AbstractType",
            ClassId::Type => "Type",
            ClassId::TypeParameter => "TypeParameter",
            ClassId::InstantiatedType => "InstantiatedType",
            ClassId::AbstractTypeArguments => "AbstractTypeArguments",
            ClassId::TypeArguments => "TypeArguments",
            ClassId::InstantiatedTypeArguments => "InstantiatedTypeArguments",
            ClassId::Function => "Function",
            ClassId::Field => "Field",
            ClassId::LiteralToken => "LiteralToken",
            ClassId::TokenStream => "TokenStream",
            ClassId::Script => "Script",
            ClassId::Library => "Library",
            ClassId::LibraryPrefix => "LibraryPrefix",
            ClassId::Code => "Code",
            ClassId::Instructions => "Instructions",
            ClassId::PcDescriptors => "PcDescriptors",
            ClassId::Stackmap => "Stackmap",
            ClassId::LocalVarDescriptors => "LocalVarDescriptors",
            ClassId::ExceptionHandlers => "ExceptionHandlers",
            ClassId::Context => "Context",
            ClassId::ContextScope => "ContextScope",
            ClassId::IcData => "ICData",
            ClassId::Error => "Error",
            ClassId::ApiError => "ApiError",
            ClassId::LanguageError => "LanguageError",
            ClassId::UnhandledException => "UnhandledException",
            ClassId::UnwindError => "UnwindError",
            ClassId::Instance => "Instance",
            ClassId::Mint => "Mint",
            ClassId::Bigint => "Bigint",
            ClassId::Double => "Double",
            ClassId::String => "String",
            ClassId::OneByteString => "OneByteString",
            ClassId::TwoByteString => "TwoByteString",
            ClassId::FourByteString => "FourByteString",
            ClassId::ExternalOneByteString => "ExternalOneByteString",
            ClassId::ExternalTwoByteString => "ExternalTwoByteString",
            ClassId::ExternalFourByteString => "ExternalFourByteString",
            ClassId::Bool => "Bool",
            ClassId::Array => "Array",
            ClassId::ImmutableArray => "ImmutableArray",
            ClassId::GrowableObjectArray => "GrowableObjectArray",
            ClassId::ByteArray => "ByteArray",
            ClassId::InternalByteArray => "InternalByteArray",
            ClassId::ExternalByteArray => "ExternalByteArray",
            ClassId::Closure => "Closure",
            ClassId::Stacktrace => "Stacktrace",
            ClassId::JsRegExp => "JSRegExp",
        }
    }

    /// Internal class id an object of this class is written as
    ///
    /// Externally backed strings and byte arrays have no wire form of their
    /// own; they are flattened into the matching internal representation.
    pub fn wire_class(self) -> ClassId {
        match self {
            ClassId::ExternalOneByteString => ClassId::OneByteString,
            ClassId::ExternalTwoByteString => ClassId::TwoByteString,
            ClassId::ExternalFourByteString => ClassId::FourByteString,
            ClassId::ExternalByteArray => ClassId::InternalByteArray,
            other => other,
        }
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u32())
    }
}
