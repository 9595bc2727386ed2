//! Snapshot kind policy
//!
//! Decides, per (category, kind), whether an object may appear in the
//! stream, whether it is abbreviated as a resident reference, and whether
//! canonical values are interned on read.
//!
//! | Category                                      | Full   | Script             | Message  |
//! |-----------------------------------------------|--------|--------------------|----------|
//! | Class                                         | inline | inline or class id | class id |
//! | UnresolvedClass, Type, TypeParameter, TypeArguments, Context | yes | yes | yes |
//! | InstantiatedType(Arguments), ContextScope, JsRegExp | no | no           | yes      |
//! | Function, Field, LiteralToken, TokenStream, Script, Library, LibraryPrefix | yes | yes | no |
//! | numbers, strings, arrays, byte arrays         | yes    | yes                | yes      |
//! | code and execution bookkeeping, Error         | forbidden everywhere                |
//! | other error values, Closure, Stacktrace       | unimplemented everywhere            |

use std::fmt;

use heapsnap_core::{ClassId, ObjectTags, Space};

use crate::error::{Result, SnapshotError};

/// Kind of a snapshot, fixed for one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    /// Whole heap image used to bootstrap a fresh context
    Full,
    /// Program unit loaded into a running context
    Script,
    /// Bounded value graph passed between contexts
    Message,
}

impl SnapshotKind {
    /// Envelope byte
    pub fn as_u8(self) -> u8 {
        match self {
            SnapshotKind::Full => 1,
            SnapshotKind::Script => 2,
            SnapshotKind::Message => 3,
        }
    }

    /// Parse an envelope byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(SnapshotKind::Full),
            2 => Some(SnapshotKind::Script),
            3 => Some(SnapshotKind::Message),
            _ => None,
        }
    }

    /// Canonical values are interned on read in every kind but `Full`
    pub fn interns(self) -> bool {
        self != SnapshotKind::Full
    }

    /// Space objects are allocated in when read
    pub fn space(self) -> Space {
        match self {
            SnapshotKind::Full => Space::Old,
            SnapshotKind::Script | SnapshotKind::Message => Space::New,
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SnapshotKind::Full => "full",
            SnapshotKind::Script => "script",
            SnapshotKind::Message => "message",
        })
    }
}

/// How a category may appear in a snapshot of some kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Always written in full
    Inline,
    /// Written as a class-id reference when resident, in full otherwise
    InlineOrClassId,
    /// Always written as a class-id reference
    ClassIdOnly,
    /// Legal category, but not in this kind
    NotInKind,
    /// Never transmissible
    Forbidden,
    /// Reserved but without a codec
    Unimplemented,
    /// Abstract category that no object is ever an instance of
    Abstract,
}

/// Permission of a category under a kind
pub fn permission(class_id: ClassId, kind: SnapshotKind) -> Permission {
    use ClassId::*;

    let only_message = |kind: SnapshotKind| {
        if kind == SnapshotKind::Message {
            Permission::Inline
        } else {
            Permission::NotInKind
        }
    };
    let not_message = |kind: SnapshotKind| {
        if kind == SnapshotKind::Message {
            Permission::NotInKind
        } else {
            Permission::Inline
        }
    };

    match class_id {
        Class => match kind {
            SnapshotKind::Full => Permission::Inline,
            SnapshotKind::Script => Permission::InlineOrClassId,
            SnapshotKind::Message => Permission::ClassIdOnly,
        },
        UnresolvedClass | Type | TypeParameter | TypeArguments | Context => Permission::Inline,
        InstantiatedType | InstantiatedTypeArguments | ContextScope | JsRegExp => {
            only_message(kind)
        }
        Function | Field | LiteralToken | TokenStream | Script | Library | LibraryPrefix => {
            not_message(kind)
        }
        Mint | Bigint | Double | OneByteString | TwoByteString | FourByteString
        | ExternalOneByteString | ExternalTwoByteString | ExternalFourByteString | Array
        | ImmutableArray | GrowableObjectArray | InternalByteArray | ExternalByteArray => {
            Permission::Inline
        }
        Code | Instructions | PcDescriptors | Stackmap | LocalVarDescriptors
        | ExceptionHandlers | IcData | Error => Permission::Forbidden,
        ApiError | LanguageError | UnhandledException | UnwindError | Closure | Stacktrace => {
            Permission::Unimplemented
        }
        AbstractType | AbstractTypeArguments | ClassId::String | ByteArray | Instance | Bool => {
            Permission::Abstract
        }
    }
}

/// True when the writer emits a class-id reference instead of the object
pub fn by_class_reference(class_id: ClassId, tags: ObjectTags, kind: SnapshotKind) -> bool {
    match permission(class_id, kind) {
        Permission::ClassIdOnly => true,
        Permission::InlineOrClassId => tags.created_from_snapshot,
        _ => false,
    }
}

/// True when a library is transmitted as its URL key only
pub fn library_by_key(tags: ObjectTags, kind: SnapshotKind) -> bool {
    kind == SnapshotKind::Script && tags.created_from_snapshot
}

/// Fail unless the category may be written or read in full under `kind`
pub fn check_inline(class_id: ClassId, kind: SnapshotKind) -> Result<()> {
    match permission(class_id, kind) {
        Permission::Inline | Permission::InlineOrClassId => Ok(()),
        Permission::ClassIdOnly | Permission::NotInKind | Permission::Forbidden => {
            Err(SnapshotError::Forbidden { class_id, kind })
        }
        Permission::Unimplemented => Err(SnapshotError::Unimplemented { class_id, kind }),
        Permission::Abstract => Err(SnapshotError::NoCodec(class_id)),
    }
}

/// Fail when a resident program-structure object would be re-transmitted
///
/// In script snapshots, resident classes are abbreviated and resident
/// libraries are sent by key. Any other resident program structure means the
/// unit being written is entangled with the already-loaded image. A resident
/// class inlined in full can only come from a malformed stream.
pub fn check_transmissible(class_id: ClassId, tags: ObjectTags, kind: SnapshotKind) -> Result<()> {
    use ClassId::*;
    if kind != SnapshotKind::Script || !tags.created_from_snapshot {
        return Ok(());
    }
    match class_id {
        Class | Function | Field | LiteralToken | TokenStream | Script | LibraryPrefix => {
            Err(SnapshotError::NotTransmissible(class_id))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [SnapshotKind; 3] = [SnapshotKind::Full, SnapshotKind::Script, SnapshotKind::Message];

    #[test]
    fn test_code_is_forbidden_in_every_kind() {
        for kind in KINDS {
            for cid in [ClassId::Code, ClassId::Instructions, ClassId::IcData, ClassId::Error] {
                assert_eq!(
                    check_inline(cid, kind),
                    Err(SnapshotError::Forbidden { class_id: cid, kind })
                );
            }
        }
    }

    #[test]
    fn test_unimplemented_categories() {
        for kind in KINDS {
            let err = check_inline(ClassId::Closure, kind).unwrap_err();
            assert!(err.is_unimplemented());
        }
    }

    #[test]
    fn test_message_only_categories() {
        assert!(check_inline(ClassId::JsRegExp, SnapshotKind::Message).is_ok());
        assert!(check_inline(ClassId::JsRegExp, SnapshotKind::Script).is_err());
        assert!(check_inline(ClassId::ContextScope, SnapshotKind::Full).is_err());
        assert!(check_inline(ClassId::InstantiatedType, SnapshotKind::Message).is_ok());
    }

    #[test]
    fn test_program_structure_never_in_messages() {
        for cid in [ClassId::Function, ClassId::Library, ClassId::Script] {
            assert!(check_inline(cid, SnapshotKind::Message).is_err());
            assert!(check_inline(cid, SnapshotKind::Script).is_ok());
            assert!(check_inline(cid, SnapshotKind::Full).is_ok());
        }
    }

    #[test]
    fn test_class_reference_rules() {
        let fresh = ObjectTags::default();
        let resident = ObjectTags::resident();
        assert!(!by_class_reference(ClassId::Class, resident, SnapshotKind::Full));
        assert!(!by_class_reference(ClassId::Class, fresh, SnapshotKind::Script));
        assert!(by_class_reference(ClassId::Class, resident, SnapshotKind::Script));
        assert!(by_class_reference(ClassId::Class, fresh, SnapshotKind::Message));
        assert!(!by_class_reference(ClassId::Type, resident, SnapshotKind::Message));
        assert!(check_inline(ClassId::Class, SnapshotKind::Message).is_err());
    }

    #[test]
    fn test_resident_functions_not_transmissible_in_script() {
        let resident = ObjectTags::resident();
        assert_eq!(
            check_transmissible(ClassId::Function, resident, SnapshotKind::Script),
            Err(SnapshotError::NotTransmissible(ClassId::Function))
        );
        assert!(check_transmissible(ClassId::Function, resident, SnapshotKind::Full).is_ok());
        assert!(check_transmissible(ClassId::Library, resident, SnapshotKind::Script).is_ok());
    }

    #[test]
    fn test_resident_class_never_inlined_in_script() {
        let resident = ObjectTags::resident();
        assert_eq!(
            check_transmissible(ClassId::Class, resident, SnapshotKind::Script),
            Err(SnapshotError::NotTransmissible(ClassId::Class))
        );
        assert!(check_transmissible(ClassId::Class, ObjectTags::default(), SnapshotKind::Script).is_ok());
        assert!(check_transmissible(ClassId::Class, resident, SnapshotKind::Full).is_ok());
    }

    #[test]
    fn test_abstract_categories_have_no_codec() {
        assert_eq!(
            check_inline(ClassId::Instance, SnapshotKind::Full),
            Err(SnapshotError::NoCodec(ClassId::Instance))
        );
    }

    #[test]
    fn test_kind_bytes() {
        for kind in KINDS {
            assert_eq!(SnapshotKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(SnapshotKind::from_u8(0), None);
        assert!(!SnapshotKind::Full.interns());
        assert_eq!(SnapshotKind::Full.space(), Space::Old);
    }
}
