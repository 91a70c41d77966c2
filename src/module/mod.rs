//! Module and instance descriptors.
//!
//! A [`Module`] is the static description the emitter works against: types,
//! imports, function declarations, globals, memories, tables, and exception
//! types. A [`ModuleInstance`] supplies the runtime half: native addresses
//! for imports, data offsets for mutable globals, canonical type tags, and
//! the ids runtime intrinsics use to identify memories.
//!
//! The emitter never allocates or links any of this; it only reads it.

pub mod binary;

pub use self::binary::read_module;

use crate::types::{FunctionType, ValueType};

// ---------------------------------------------------------------------------
// Runtime layout contract
// ---------------------------------------------------------------------------
// These offsets are shared with the runtime and must match its #[repr(C)]
// structures exactly.

/// Offset of the memory base pointer within the context structure.
pub const CONTEXT_MEMORY_BASE_OFFSET: u64 = 0;
/// Offset of the table base pointer within the context structure.
pub const CONTEXT_TABLE_BASE_OFFSET: u64 = 8;
/// Offset of the mutable-global data region within the context structure.
pub const CONTEXT_GLOBAL_DATA_OFFSET: u64 = 16;

/// Size of one table element: `{ type_tag: ptr, code: ptr }`.
pub const TABLE_ELEMENT_SIZE: u64 = 16;
pub const TABLE_ELEMENT_TYPE_TAG_OFFSET: u64 = 0;
pub const TABLE_ELEMENT_CODE_OFFSET: u64 = 8;

/// Exception record layout: `{ i64 type_instance; u8 is_user; pad;
/// UntaggedValue arguments[] }`. Arguments are stored with the last declared
/// parameter at index 0.
pub const EXCEPTION_TYPE_INSTANCE_OFFSET: u64 = 0;
pub const EXCEPTION_IS_USER_OFFSET: u64 = 8;
pub const EXCEPTION_ARGUMENTS_OFFSET: u64 = 16;
/// Stride of one exception argument slot (sized for v128).
pub const UNTAGGED_VALUE_SIZE: u64 = 16;

// ---------------------------------------------------------------------------
// Static module description
// ---------------------------------------------------------------------------

/// What kind of entity an import provides.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportKind {
    Function { type_index: u32 },
    Table,
    Memory,
    Global { ty: ValueType, mutable: bool },
    ExceptionType { params: Vec<ValueType> },
}

#[derive(Debug, Clone)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub kind: ImportKind,
}

/// A function declared (not imported) by the module.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDecl {
    pub type_index: u32,
}

/// A constant initialiser for a global or data segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitExpr {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
    GlobalGet(u32),
}

#[derive(Debug, Clone)]
pub struct GlobalDef {
    pub ty: ValueType,
    pub mutable: bool,
    pub init: InitExpr,
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryDef {
    pub min_pages: u64,
    pub max_pages: Option<u64>,
    pub shared: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub min_elements: u64,
    pub max_elements: Option<u64>,
}

/// An exception type: the value types thrown with it.
#[derive(Debug, Clone)]
pub struct ExceptionTypeDef {
    pub params: Vec<ValueType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Function,
    Table,
    Memory,
    Global,
}

#[derive(Debug, Clone)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
    pub index: u32,
}

/// The body of a declared function: its signature, extra locals, and raw
/// code bytes for the operator decoder.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub type_index: u32,
    /// Local types beyond the parameters.
    pub non_parameter_locals: Vec<ValueType>,
    /// The function body, ending with the implicit `end`.
    pub code: Vec<u8>,
}

/// A complete module description.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub types: Vec<FunctionType>,
    pub imports: Vec<Import>,
    pub functions: Vec<FunctionDecl>,
    pub tables: Vec<TableDef>,
    pub memories: Vec<MemoryDef>,
    pub globals: Vec<GlobalDef>,
    pub exception_types: Vec<ExceptionTypeDef>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub function_defs: Vec<FunctionDef>,
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }

    /// Number of imported functions; defined functions index after these.
    pub fn imported_function_count(&self) -> u32 {
        self.imports
            .iter()
            .filter(|i| matches!(i.kind, ImportKind::Function { .. }))
            .count() as u32
    }

    /// The signature of any function by its module-wide index.
    pub fn function_type(&self, function_index: u32) -> Option<&FunctionType> {
        let imported = self.imported_function_count();
        let type_index = if function_index < imported {
            match self
                .imports
                .iter()
                .filter(|i| matches!(i.kind, ImportKind::Function { .. }))
                .nth(function_index as usize)?
                .kind
            {
                ImportKind::Function { type_index } => type_index,
                _ => unreachable!(),
            }
        } else {
            self.functions
                .get((function_index - imported) as usize)?
                .type_index
        };
        self.types.get(type_index as usize)
    }

    /// All params of an exception type, imports first.
    pub fn exception_type(&self, index: u32) -> Option<&[ValueType]> {
        self.exception_types.get(index as usize).map(|t| t.params.as_slice())
    }
}

// ---------------------------------------------------------------------------
// Runtime instance description
// ---------------------------------------------------------------------------

/// Where a global's value lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalLayout {
    /// Mutable: stored in the context's global data region at this offset.
    Mutable { data_offset: u64 },
    /// Immutable and word-sized: inlined into generated code.
    ImmutableValue(InitExpr),
    /// Immutable but wider than a word: loaded from this address.
    ImmutableAddress { address: u64 },
}

/// The runtime addresses and ids the emitter bakes into generated code.
#[derive(Debug, Clone, Default)]
pub struct ModuleInstance {
    /// Id passed to memory intrinsics (`growMemory`, `atomic_wait_*`).
    pub memory_id: u64,
    /// Native entry addresses for imported functions, by import order.
    pub imported_function_addresses: Vec<u64>,
    /// Layout of every global, imports first.
    pub global_layouts: Vec<GlobalLayout>,
    /// Canonical type tag per module type, compared by identity in
    /// `call_indirect` and stored in table elements.
    pub type_tags: Vec<u64>,
    /// Runtime exception type instance per module exception type.
    pub exception_type_instances: Vec<u64>,
}

impl ModuleInstance {
    /// Build a placeholder instance for offline emission (dumping IR without
    /// a live runtime). Addresses and tags are synthetic but distinct.
    pub fn stub(module: &Module) -> Self {
        let mut data_offset = 0u64;
        let global_layouts = module
            .globals
            .iter()
            .map(|g| {
                if g.mutable {
                    let layout = GlobalLayout::Mutable { data_offset };
                    data_offset += g.ty.byte_width().max(8) as u64;
                    layout
                } else if g.ty == ValueType::V128 || matches!(g.init, InitExpr::GlobalGet(_)) {
                    // Wide values and import-initialised globals are only
                    // known by address at instantiation time.
                    GlobalLayout::ImmutableAddress {
                        address: 0x1000_0000 + data_offset,
                    }
                } else {
                    GlobalLayout::ImmutableValue(g.init)
                }
            })
            .collect();

        ModuleInstance {
            memory_id: 0,
            imported_function_addresses: (0..module.imported_function_count() as u64)
                .map(|i| 0x2000_0000 + i * 8)
                .collect(),
            global_layouts,
            type_tags: (0..module.types.len() as u64)
                .map(|i| 0x3000_0000 + i * 8)
                .collect(),
            exception_type_instances: (0..module.exception_types.len() as u64)
                .map(|i| 0x4000_0000 + i * 8)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_type_module() -> Module {
        let mut module = Module::new();
        module.types.push(FunctionType::new(vec![], vec![ValueType::I32]));
        module
            .types
            .push(FunctionType::new(vec![ValueType::I64], vec![]));
        module.imports.push(Import {
            module: "env".into(),
            name: "imported".into(),
            kind: ImportKind::Function { type_index: 1 },
        });
        module.functions.push(FunctionDecl { type_index: 0 });
        module
    }

    #[test]
    fn function_index_spans_imports_then_defs() {
        let module = two_type_module();
        assert_eq!(module.imported_function_count(), 1);
        assert_eq!(
            module.function_type(0).unwrap().params,
            vec![ValueType::I64]
        );
        assert_eq!(
            module.function_type(1).unwrap().results,
            vec![ValueType::I32]
        );
        assert!(module.function_type(2).is_none());
    }

    #[test]
    fn stub_instance_lays_out_globals() {
        let mut module = two_type_module();
        module.globals.push(GlobalDef {
            ty: ValueType::I32,
            mutable: true,
            init: InitExpr::I32(0),
        });
        module.globals.push(GlobalDef {
            ty: ValueType::F64,
            mutable: false,
            init: InitExpr::F64(0),
        });
        module.globals.push(GlobalDef {
            ty: ValueType::I64,
            mutable: true,
            init: InitExpr::I64(0),
        });

        let instance = ModuleInstance::stub(&module);
        assert_eq!(
            instance.global_layouts[0],
            GlobalLayout::Mutable { data_offset: 0 }
        );
        assert_eq!(
            instance.global_layouts[1],
            GlobalLayout::ImmutableValue(InitExpr::F64(0))
        );
        assert_eq!(
            instance.global_layouts[2],
            GlobalLayout::Mutable { data_offset: 8 }
        );
        assert_eq!(instance.type_tags.len(), 2);
    }
}
