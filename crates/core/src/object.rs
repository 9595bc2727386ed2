//! Heap objects
//!
//! A [`HeapObject`] is a class id, a tag word and a body. The body variant is
//! fixed by the class id; [`HeapObject::new`] rejects mismatched pairs, so
//! code holding a `HeapObject` can match on the body without re-checking the
//! category.

use crate::bigint::Bigint;
use crate::error::{HeapError, Result};
use crate::layout::Record;
use crate::tags::ObjectTags;
use crate::types::{ClassId, Value};
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

/// Slots stored per captured variable of a context scope
pub const SLOTS_PER_VARIABLE: usize = 6;

const HASH_BITS: u32 = 30;

/// Width of one string code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharWidth {
    /// 8-bit code units
    One,
    /// 16-bit code units
    Two,
    /// 32-bit code units
    Four,
}

impl CharWidth {
    /// Bytes per code unit
    pub fn bytes(self) -> usize {
        match self {
            CharWidth::One => 1,
            CharWidth::Two => 2,
            CharWidth::Four => 4,
        }
    }

    /// Internal class id of strings with this width
    pub fn class_id(self) -> ClassId {
        match self {
            CharWidth::One => ClassId::OneByteString,
            CharWidth::Two => ClassId::TwoByteString,
            CharWidth::Four => ClassId::FourByteString,
        }
    }

    /// External class id of strings with this width
    pub fn external_class_id(self) -> ClassId {
        match self {
            CharWidth::One => ClassId::ExternalOneByteString,
            CharWidth::Two => ClassId::ExternalTwoByteString,
            CharWidth::Four => ClassId::ExternalFourByteString,
        }
    }

    /// Width of an internal string class
    pub fn of_class(class_id: ClassId) -> Option<Self> {
        match class_id {
            ClassId::OneByteString | ClassId::ExternalOneByteString => Some(CharWidth::One),
            ClassId::TwoByteString | ClassId::ExternalTwoByteString => Some(CharWidth::Two),
            ClassId::FourByteString | ClassId::ExternalFourByteString => Some(CharWidth::Four),
            _ => None,
        }
    }
}

/// Code units of a string at one fixed width
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodeUnits {
    /// 8-bit code units
    One(Vec<u8>),
    /// 16-bit code units
    Two(Vec<u16>),
    /// 32-bit code units
    Four(Vec<u32>),
}

impl CodeUnits {
    /// Narrowest representation of a Rust string
    pub fn from_text(text: &str) -> Self {
        let max = text.chars().map(|c| c as u32).max().unwrap_or(0);
        if max <= 0xff {
            CodeUnits::One(text.chars().map(|c| c as u8).collect())
        } else if max <= 0xffff {
            CodeUnits::Two(text.chars().map(|c| c as u16).collect())
        } else {
            CodeUnits::Four(text.chars().map(|c| c as u32).collect())
        }
    }

    /// Width of the code units
    pub fn width(&self) -> CharWidth {
        match self {
            CodeUnits::One(_) => CharWidth::One,
            CodeUnits::Two(_) => CharWidth::Two,
            CodeUnits::Four(_) => CharWidth::Four,
        }
    }

    /// Number of code units
    pub fn len(&self) -> usize {
        match self {
            CodeUnits::One(u) => u.len(),
            CodeUnits::Two(u) => u.len(),
            CodeUnits::Four(u) => u.len(),
        }
    }

    /// True for the empty string
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Code points widened to `u32`
    pub fn code_points(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            CodeUnits::One(u) => Box::new(u.iter().map(|&c| c as u32)),
            CodeUnits::Two(u) => Box::new(u.iter().map(|&c| c as u32)),
            CodeUnits::Four(u) => Box::new(u.iter().copied()),
        }
    }

    /// Lossy conversion to a Rust string
    pub fn to_string_lossy(&self) -> String {
        self.code_points()
            .map(|c| char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    /// Content hash, independent of width
    ///
    /// xxh3 over the code points as little-endian `u32`, folded to 30 bits.
    /// Never returns 0, which marks a hash that has not been computed.
    pub fn compute_hash(&self) -> u32 {
        let mut bytes = Vec::with_capacity(self.len() * 4);
        for c in self.code_points() {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
        let h = xxh3_64(&bytes);
        let folded = (h ^ (h >> HASH_BITS) ^ (h >> (2 * HASH_BITS))) as u32 & ((1 << HASH_BITS) - 1);
        if folded == 0 {
            1
        } else {
            folded
        }
    }
}

/// Backing storage of a string
#[derive(Debug, Clone, PartialEq)]
pub enum StringStorage {
    /// Code units live in the object
    Internal(CodeUnits),
    /// Code units live outside the heap
    External(Arc<CodeUnits>),
}

/// String body
#[derive(Debug, Clone, PartialEq)]
pub struct StringObject {
    /// Backing storage
    pub storage: StringStorage,
    /// Cached hash; 0 when not yet computed
    pub hash: u32,
}

impl StringObject {
    /// Internal string with a lazily computed hash
    pub fn internal(units: CodeUnits) -> Self {
        StringObject {
            storage: StringStorage::Internal(units),
            hash: 0,
        }
    }

    /// Externally backed string
    pub fn external(units: Arc<CodeUnits>) -> Self {
        StringObject {
            storage: StringStorage::External(units),
            hash: 0,
        }
    }

    /// Code units regardless of storage
    pub fn units(&self) -> &CodeUnits {
        match &self.storage {
            StringStorage::Internal(u) => u,
            StringStorage::External(u) => u,
        }
    }

    /// True when the code units live outside the heap
    pub fn is_external(&self) -> bool {
        matches!(self.storage, StringStorage::External(_))
    }

    /// Cached hash, or the computed one when nothing is cached
    pub fn hash(&self) -> u32 {
        if self.hash != 0 {
            self.hash
        } else {
            self.units().compute_hash()
        }
    }

    /// Fill the hash cache
    pub fn ensure_hash(&mut self) -> u32 {
        if self.hash == 0 {
            self.hash = self.units().compute_hash();
        }
        self.hash
    }

    fn class_id(&self) -> ClassId {
        let width = self.units().width();
        if self.is_external() {
            width.external_class_id()
        } else {
            width.class_id()
        }
    }
}

/// Backing storage of a byte array
#[derive(Debug, Clone, PartialEq)]
pub enum ByteStorage {
    /// Bytes live in the object
    Internal(Vec<u8>),
    /// Bytes live outside the heap
    External(Arc<[u8]>),
}

impl ByteStorage {
    /// Bytes regardless of storage
    pub fn bytes(&self) -> &[u8] {
        match self {
            ByteStorage::Internal(b) => b,
            ByteStorage::External(b) => b,
        }
    }
}

/// Fixed array body (mutable or immutable)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArrayObject {
    /// Type-argument vector of the array
    pub type_arguments: Value,
    /// Elements
    pub elements: Vec<Value>,
}

/// Regular expression body
#[derive(Debug, Clone, PartialEq)]
pub struct RegExpObject {
    /// Number of capture groups
    pub num_bracket_expressions: usize,
    /// Pattern string
    pub pattern: Value,
    /// Kind of pattern (simple, complex, uninitialized)
    pub type_flags: i64,
    /// Matching flags (global, ignore-case, multiline)
    pub flags: i64,
    /// Compiled matching program; never transmitted
    pub program: Option<Arc<[u8]>>,
}

/// Category-specific payload of a heap object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    /// Fixed-shape metadata or executable descriptor
    Record(Record),
    /// Type-argument vector
    TypeArguments {
        /// Argument types
        types: Vec<Value>,
    },
    /// Token stream of a compiled unit
    TokenStream {
        /// Tokens and literals
        tokens: Vec<Value>,
    },
    /// Lexical context
    Context {
        /// Enclosing context
        parent: Value,
        /// Captured variables
        variables: Vec<Value>,
    },
    /// Context scope
    ContextScope {
        /// Number of captured variables described
        num_variables: usize,
        /// `num_variables * SLOTS_PER_VARIABLE` descriptor slots
        slots: Vec<Value>,
    },
    /// 64-bit integer
    Mint(i64),
    /// Arbitrary-precision integer
    Bigint(Bigint),
    /// Double-precision float
    Double(f64),
    /// String at any width
    String(StringObject),
    /// Fixed array
    Array(ArrayObject),
    /// Growable array backed by a fixed array
    GrowableArray {
        /// Used length
        length: usize,
        /// Backing array
        data: Value,
    },
    /// Byte array
    ByteArray(ByteStorage),
    /// Regular expression
    RegExp(RegExpObject),
    /// Object of a category that has no codec
    Opaque {
        /// Pointer slots
        slots: Vec<Value>,
    },
}

impl ObjectBody {
    /// Short name of the body variant, for diagnostics
    pub fn variant_name(&self) -> &'static str {
        match self {
            ObjectBody::Record(_) => "record",
            ObjectBody::TypeArguments { .. } => "type-arguments",
            ObjectBody::TokenStream { .. } => "token-stream",
            ObjectBody::Context { .. } => "context",
            ObjectBody::ContextScope { .. } => "context-scope",
            ObjectBody::Mint(_) => "mint",
            ObjectBody::Bigint(_) => "bigint",
            ObjectBody::Double(_) => "double",
            ObjectBody::String(_) => "string",
            ObjectBody::Array(_) => "array",
            ObjectBody::GrowableArray { .. } => "growable-array",
            ObjectBody::ByteArray(_) => "byte-array",
            ObjectBody::RegExp(_) => "regexp",
            ObjectBody::Opaque { .. } => "opaque",
        }
    }

    fn fits(&self, class_id: ClassId) -> bool {
        use ClassId::*;
        match self {
            ObjectBody::Record(r) => r.class_id() == class_id,
            ObjectBody::TypeArguments { .. } => class_id == TypeArguments,
            ObjectBody::TokenStream { .. } => class_id == TokenStream,
            ObjectBody::Context { .. } => class_id == Context,
            ObjectBody::ContextScope {
                num_variables,
                slots,
            } => {
                class_id == ContextScope
                    && num_variables.checked_mul(SLOTS_PER_VARIABLE) == Some(slots.len())
            }
            ObjectBody::Mint(_) => class_id == Mint,
            ObjectBody::Bigint(_) => class_id == ClassId::Bigint,
            ObjectBody::Double(_) => class_id == Double,
            ObjectBody::String(s) => s.class_id() == class_id,
            ObjectBody::Array(_) => matches!(class_id, Array | ImmutableArray),
            ObjectBody::GrowableArray { .. } => class_id == GrowableObjectArray,
            ObjectBody::ByteArray(ByteStorage::Internal(_)) => class_id == InternalByteArray,
            ObjectBody::ByteArray(ByteStorage::External(_)) => class_id == ExternalByteArray,
            ObjectBody::RegExp(_) => class_id == JsRegExp,
            ObjectBody::Opaque { .. } => matches!(
                class_id,
                Code | Instructions
                    | PcDescriptors
                    | Stackmap
                    | LocalVarDescriptors
                    | ExceptionHandlers
                    | IcData
                    | Error
                    | ApiError
                    | LanguageError
                    | UnhandledException
                    | UnwindError
                    | Instance
                    | Closure
                    | Stacktrace
            ),
        }
    }
}

/// Key under which a canonical value is interned
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalKey {
    /// String content as code points
    String(Vec<u32>),
    /// 64-bit integer
    Mint(i64),
    /// Arbitrary-precision integer
    Bigint(Bigint),
    /// Double, by bit pattern
    Double(u64),
    /// Parameterized type by its fields
    Type {
        /// Scalar fields
        scalars: Vec<crate::layout::Scalar>,
        /// Reference fields
        refs: Vec<Value>,
    },
    /// Type-argument vector by its elements
    TypeArguments(Vec<Value>),
}

/// Object living in a heap
#[derive(Debug, Clone, PartialEq)]
pub struct HeapObject {
    class_id: ClassId,
    /// Header flags
    pub tags: ObjectTags,
    /// Category payload
    pub body: ObjectBody,
}

impl HeapObject {
    /// Pair a body with its class id
    pub fn new(class_id: ClassId, tags: ObjectTags, body: ObjectBody) -> Result<Self> {
        if !body.fits(class_id) {
            return Err(HeapError::BodyMismatch {
                class_id,
                body: body.variant_name(),
            });
        }
        Ok(HeapObject {
            class_id,
            tags,
            body,
        })
    }

    /// Object with default tags whose class id follows from the body
    pub fn from_body(body: ObjectBody) -> Result<Self> {
        let class_id = match &body {
            ObjectBody::Record(r) => r.class_id(),
            ObjectBody::TypeArguments { .. } => ClassId::TypeArguments,
            ObjectBody::TokenStream { .. } => ClassId::TokenStream,
            ObjectBody::Context { .. } => ClassId::Context,
            ObjectBody::ContextScope { .. } => ClassId::ContextScope,
            ObjectBody::Mint(_) => ClassId::Mint,
            ObjectBody::Bigint(_) => ClassId::Bigint,
            ObjectBody::Double(_) => ClassId::Double,
            ObjectBody::String(s) => s.class_id(),
            ObjectBody::Array(_) => ClassId::Array,
            ObjectBody::GrowableArray { .. } => ClassId::GrowableObjectArray,
            ObjectBody::ByteArray(ByteStorage::Internal(_)) => ClassId::InternalByteArray,
            ObjectBody::ByteArray(ByteStorage::External(_)) => ClassId::ExternalByteArray,
            ObjectBody::RegExp(_) => ClassId::JsRegExp,
            ObjectBody::Opaque { .. } => ClassId::Instance,
        };
        HeapObject::new(class_id, ObjectTags::default(), body)
    }

    /// Category of this object
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// Pointer-shaped slots in wire order
    pub fn pointers(&self) -> Vec<Value> {
        match &self.body {
            ObjectBody::Record(r) => r.refs().to_vec(),
            ObjectBody::TypeArguments { types } => types.clone(),
            ObjectBody::TokenStream { tokens } => tokens.clone(),
            ObjectBody::Context { parent, variables } => {
                let mut out = Vec::with_capacity(variables.len() + 1);
                out.push(*parent);
                out.extend_from_slice(variables);
                out
            }
            ObjectBody::ContextScope { slots, .. } => slots.clone(),
            ObjectBody::Array(a) => {
                let mut out = Vec::with_capacity(a.elements.len() + 1);
                out.push(a.type_arguments);
                out.extend_from_slice(&a.elements);
                out
            }
            ObjectBody::GrowableArray { data, .. } => vec![*data],
            ObjectBody::RegExp(r) => vec![r.pattern],
            ObjectBody::Opaque { slots } => slots.clone(),
            ObjectBody::Mint(_)
            | ObjectBody::Bigint(_)
            | ObjectBody::Double(_)
            | ObjectBody::String(_)
            | ObjectBody::ByteArray(_) => Vec::new(),
        }
    }

    /// Interning key, for categories that can be canonical
    pub fn canonical_key(&self) -> Result<CanonicalKey> {
        match &self.body {
            ObjectBody::String(s) => Ok(CanonicalKey::String(s.units().code_points().collect())),
            ObjectBody::Mint(v) => Ok(CanonicalKey::Mint(*v)),
            ObjectBody::Bigint(b) => Ok(CanonicalKey::Bigint(b.clone())),
            ObjectBody::Double(d) => Ok(CanonicalKey::Double(d.to_bits())),
            ObjectBody::TypeArguments { types } => Ok(CanonicalKey::TypeArguments(types.clone())),
            ObjectBody::Record(r) if r.class_id() == ClassId::Type => Ok(CanonicalKey::Type {
                scalars: r.scalars().to_vec(),
                refs: r.refs().to_vec(),
            }),
            _ => Err(HeapError::NotCanonicalizable(self.class_id)),
        }
    }

    /// String body, if this is a string
    pub fn as_string(&self) -> Option<&StringObject> {
        match &self.body {
            ObjectBody::String(s) => Some(s),
            _ => None,
        }
    }

    /// Record body, if this is a fixed-shape category
    pub fn as_record(&self) -> Option<&Record> {
        match &self.body {
            ObjectBody::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Mutable record body
    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match &mut self.body {
            ObjectBody::Record(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Handle;

    #[test]
    fn test_narrowest_width_is_chosen() {
        assert_eq!(CodeUnits::from_text("abc").width(), CharWidth::One);
        assert_eq!(CodeUnits::from_text("caf\u{e9}").width(), CharWidth::One);
        assert_eq!(CodeUnits::from_text("\u{3b1}\u{3b2}").width(), CharWidth::Two);
        assert_eq!(CodeUnits::from_text("\u{1f600}").width(), CharWidth::Four);
    }

    #[test]
    fn test_hash_ignores_width() {
        let narrow = CodeUnits::One(b"hello".to_vec());
        let wide = CodeUnits::Four("hello".chars().map(|c| c as u32).collect());
        assert_eq!(narrow.compute_hash(), wide.compute_hash());
        assert_ne!(narrow.compute_hash(), 0);
        assert!(narrow.compute_hash() < (1 << 30));
    }

    #[test]
    fn test_body_must_fit_class() {
        let err = HeapObject::new(ClassId::Double, ObjectTags::default(), ObjectBody::Mint(1));
        assert!(matches!(err, Err(HeapError::BodyMismatch { .. })));

        let scope = ObjectBody::ContextScope {
            num_variables: 2,
            slots: vec![Value::Null; 11],
        };
        assert!(HeapObject::new(ClassId::ContextScope, ObjectTags::default(), scope).is_err());
    }

    #[test]
    fn test_external_string_class() {
        let s = StringObject::external(Arc::new(CodeUnits::from_text("x")));
        let obj = HeapObject::from_body(ObjectBody::String(s)).unwrap();
        assert_eq!(obj.class_id(), ClassId::ExternalOneByteString);
        assert_eq!(obj.class_id().wire_class(), ClassId::OneByteString);
    }

    #[test]
    fn test_pointers_order() {
        let ta = Value::Ref(Handle::from_index(1));
        let obj = HeapObject::from_body(ObjectBody::Array(ArrayObject {
            type_arguments: ta,
            elements: vec![Value::Smi(1), Value::Bool(true)],
        }))
        .unwrap();
        assert_eq!(obj.pointers(), vec![ta, Value::Smi(1), Value::Bool(true)]);
    }

    #[test]
    fn test_canonical_key_matches_across_widths() {
        let a = HeapObject::from_body(ObjectBody::String(StringObject::internal(
            CodeUnits::One(b"k".to_vec()),
        )))
        .unwrap();
        let b = HeapObject::from_body(ObjectBody::String(StringObject::internal(
            CodeUnits::Two(vec![b'k' as u16]),
        )))
        .unwrap();
        assert_eq!(a.canonical_key().unwrap(), b.canonical_key().unwrap());

        let arr = HeapObject::from_body(ObjectBody::Array(ArrayObject::default())).unwrap();
        assert!(arr.canonical_key().is_err());
    }
}
