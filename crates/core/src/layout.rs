//! Declarative field layouts
//!
//! Fixed-shape metadata and executable categories are described by an
//! ordered table of field descriptors. Both the snapshot writer and reader
//! iterate the same table: all scalar fields in declaration order, then all
//! reference fields in declaration order.
//!
//! A [`Record`] is the in-heap representation of such an object. It stores
//! scalars and references in two dense vectors indexed through the layout.

use crate::error::{HeapError, Result};
use crate::types::{ClassId, Value};
use smallvec::SmallVec;

/// Kind of a scalar (non-pointer) field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// Pointer-sized signed integer
    Int,
    /// Signed byte (small enumerations, states)
    Byte,
    /// Boolean flag
    Bool,
}

/// Value of a scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    /// Pointer-sized signed integer
    Int(i64),
    /// Signed byte
    Byte(i8),
    /// Boolean flag
    Bool(bool),
}

impl Scalar {
    /// Kind of this scalar
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Int(_) => ScalarKind::Int,
            Scalar::Byte(_) => ScalarKind::Byte,
            Scalar::Bool(_) => ScalarKind::Bool,
        }
    }

    /// Zero value of a kind
    pub fn zero(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Int => Scalar::Int(0),
            ScalarKind::Byte => Scalar::Byte(0),
            ScalarKind::Bool => Scalar::Bool(false),
        }
    }
}

/// Kind of a field slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-pointer field
    Scalar(ScalarKind),
    /// Pointer-shaped field holding a [`Value`]
    Ref,
}

/// One entry of a layout table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: &'static str,
    /// Slot kind
    pub kind: FieldKind,
}

const fn int(name: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        name,
        kind: FieldKind::Scalar(ScalarKind::Int),
    }
}

const fn byte(name: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        name,
        kind: FieldKind::Scalar(ScalarKind::Byte),
    }
}

const fn flag(name: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        name,
        kind: FieldKind::Scalar(ScalarKind::Bool),
    }
}

const fn ptr(name: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        name,
        kind: FieldKind::Ref,
    }
}

/// Ordered field table of one category
#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    /// Category described by this table
    pub class_id: ClassId,
    /// Fields in declaration order
    pub fields: &'static [FieldDescriptor],
}

static CLASS: Layout = Layout {
    class_id: ClassId::Class,
    fields: &[
        int("class_index"),
        int("instance_size"),
        int("type_arguments_field_offset"),
        int("next_field_offset"),
        int("num_native_fields"),
        int("token_index"),
        byte("class_state"),
        flag("is_interface"),
        ptr("name"),
        ptr("functions"),
        ptr("fields"),
        ptr("interfaces"),
        ptr("script"),
        ptr("library"),
        ptr("type_parameters"),
        ptr("type_parameter_bounds"),
        ptr("super_type"),
        ptr("factory_class"),
        ptr("canonical_types"),
        ptr("constants"),
    ],
};

static UNRESOLVED_CLASS: Layout = Layout {
    class_id: ClassId::UnresolvedClass,
    fields: &[
        int("token_index"),
        ptr("library_prefix"),
        ptr("ident"),
        ptr("factory_signature_class"),
    ],
};

static TYPE: Layout = Layout {
    class_id: ClassId::Type,
    fields: &[
        int("token_index"),
        byte("type_state"),
        ptr("type_class"),
        ptr("arguments"),
    ],
};

static TYPE_PARAMETER: Layout = Layout {
    class_id: ClassId::TypeParameter,
    fields: &[
        int("index"),
        int("token_index"),
        byte("type_state"),
        ptr("parameterized_class"),
        ptr("name"),
        ptr("bound"),
    ],
};

static INSTANTIATED_TYPE: Layout = Layout {
    class_id: ClassId::InstantiatedType,
    fields: &[
        ptr("uninstantiated_type"),
        ptr("instantiator_type_arguments"),
    ],
};

static INSTANTIATED_TYPE_ARGUMENTS: Layout = Layout {
    class_id: ClassId::InstantiatedTypeArguments,
    fields: &[
        ptr("uninstantiated_type_arguments"),
        ptr("instantiator_type_arguments"),
    ],
};

static FUNCTION: Layout = Layout {
    class_id: ClassId::Function,
    fields: &[
        int("token_index"),
        int("end_token_index"),
        int("num_fixed_parameters"),
        int("num_optional_parameters"),
        int("usage_counter"),
        int("deoptimization_counter"),
        int("kind"),
        flag("is_optimizable"),
        ptr("name"),
        ptr("owner"),
        ptr("result_type"),
        ptr("parameter_types"),
        ptr("parameter_names"),
        ptr("context_scope"),
        ptr("parent_function"),
        ptr("signature_class"),
        ptr("implicit_closure_function"),
    ],
};

static FIELD: Layout = Layout {
    class_id: ClassId::Field,
    fields: &[
        int("token_index"),
        flag("has_initializer"),
        ptr("name"),
        ptr("owner"),
        ptr("type"),
        ptr("value"),
    ],
};

static LITERAL_TOKEN: Layout = Layout {
    class_id: ClassId::LiteralToken,
    fields: &[int("kind"), ptr("literal"), ptr("value")],
};

static SCRIPT: Layout = Layout {
    class_id: ClassId::Script,
    fields: &[ptr("url"), ptr("source"), ptr("tokens")],
};

static LIBRARY: Layout = Layout {
    class_id: ClassId::Library,
    fields: &[
        int("num_imports"),
        int("num_imported_into"),
        int("num_anonymous"),
        flag("corelib_imported"),
        byte("load_state"),
        ptr("name"),
        ptr("url"),
        ptr("private_key"),
        ptr("dictionary"),
        ptr("anonymous_classes"),
        ptr("imports"),
        ptr("imported_into"),
    ],
};

static LIBRARY_PREFIX: Layout = Layout {
    class_id: ClassId::LibraryPrefix,
    fields: &[int("num_libs"), ptr("name"), ptr("libraries")],
};

impl Layout {
    /// Layout table of a fixed-shape category
    pub fn of(class_id: ClassId) -> Option<&'static Layout> {
        match class_id {
            ClassId::Class => Some(&CLASS),
            ClassId::UnresolvedClass => Some(&UNRESOLVED_CLASS),
            ClassId::Type => Some(&TYPE),
            ClassId::TypeParameter => Some(&TYPE_PARAMETER),
            ClassId::InstantiatedType => Some(&INSTANTIATED_TYPE),
            ClassId::InstantiatedTypeArguments => Some(&INSTANTIATED_TYPE_ARGUMENTS),
            ClassId::Function => Some(&FUNCTION),
            ClassId::Field => Some(&FIELD),
            ClassId::LiteralToken => Some(&LITERAL_TOKEN),
            ClassId::Script => Some(&SCRIPT),
            ClassId::Library => Some(&LIBRARY),
            ClassId::LibraryPrefix => Some(&LIBRARY_PREFIX),
            _ => None,
        }
    }

    /// Scalar fields in declaration order
    pub fn scalar_fields(&self) -> impl Iterator<Item = (&'static str, ScalarKind)> + '_ {
        self.fields.iter().filter_map(|f| match f.kind {
            FieldKind::Scalar(kind) => Some((f.name, kind)),
            FieldKind::Ref => None,
        })
    }

    /// Reference fields in declaration order
    pub fn ref_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Ref)
            .map(|f| f.name)
    }

    /// Number of scalar fields
    pub fn num_scalars(&self) -> usize {
        self.scalar_fields().count()
    }

    /// Number of reference fields
    pub fn num_refs(&self) -> usize {
        self.ref_fields().count()
    }

    fn scalar_index(&self, name: &str) -> Option<(usize, ScalarKind)> {
        self.scalar_fields()
            .enumerate()
            .find(|(_, (n, _))| *n == name)
            .map(|(i, (_, kind))| (i, kind))
    }

    fn ref_index(&self, name: &str) -> Option<usize> {
        self.ref_fields().position(|n| n == name)
    }
}

/// In-heap body of a fixed-shape category
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    layout: &'static Layout,
    scalars: SmallVec<[Scalar; 8]>,
    refs: Vec<Value>,
}

impl Record {
    /// Zero-initialized record of a fixed-shape category
    ///
    /// Returns `None` for categories without a layout table.
    pub fn new(class_id: ClassId) -> Option<Self> {
        let layout = Layout::of(class_id)?;
        Some(Record {
            layout,
            scalars: layout.scalar_fields().map(|(_, k)| Scalar::zero(k)).collect(),
            refs: vec![Value::Null; layout.num_refs()],
        })
    }

    /// Category of this record
    pub fn class_id(&self) -> ClassId {
        self.layout.class_id
    }

    /// Layout table of this record
    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    /// Scalars in layout order
    pub fn scalars(&self) -> &[Scalar] {
        &self.scalars
    }

    /// Mutable scalars in layout order
    pub fn scalars_mut(&mut self) -> &mut [Scalar] {
        &mut self.scalars
    }

    /// References in layout order
    pub fn refs(&self) -> &[Value] {
        &self.refs
    }

    /// Mutable references in layout order
    pub fn refs_mut(&mut self) -> &mut [Value] {
        &mut self.refs
    }

    /// Scalar field by name
    pub fn scalar(&self, name: &str) -> Option<Scalar> {
        let (i, _) = self.layout.scalar_index(name)?;
        Some(self.scalars[i])
    }

    /// Integer field by name
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.scalar(name)? {
            Scalar::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean field by name
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.scalar(name)? {
            Scalar::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Reference field by name
    pub fn get(&self, name: &str) -> Option<Value> {
        let i = self.layout.ref_index(name)?;
        Some(self.refs[i])
    }

    /// Assign a scalar field
    pub fn set_scalar(&mut self, name: &str, value: Scalar) -> Result<()> {
        let (i, kind) = self
            .layout
            .scalar_index(name)
            .ok_or_else(|| self.unknown(name))?;
        if value.kind() != kind {
            return Err(HeapError::FieldType {
                class_id: self.class_id(),
                field: name.to_string(),
                expected: kind,
            });
        }
        self.scalars[i] = value;
        Ok(())
    }

    /// Assign a reference field
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let i = self.layout.ref_index(name).ok_or_else(|| self.unknown(name))?;
        self.refs[i] = value;
        Ok(())
    }

    /// Builder form of [`Record::set_scalar`]
    pub fn with_scalar(mut self, name: &str, value: Scalar) -> Result<Self> {
        self.set_scalar(name, value)?;
        Ok(self)
    }

    /// Builder form of [`Record::set`]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value.into())?;
        Ok(self)
    }

    fn unknown(&self, name: &str) -> HeapError {
        HeapError::UnknownField {
            class_id: self.class_id(),
            field: name.to_string(),
        }
    }
}
