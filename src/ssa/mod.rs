//! SSA intermediate representation.
//!
//! This is the seam between the emitter and a native code generator: basic
//! blocks, φ-nodes, and a typed instruction set covering exactly what
//! WebAssembly lowering needs — arithmetic (including constrained floating
//! point), casts, volatile/atomic memory operations, calls and invokes,
//! conditional branches with likelihood hints, switches, vector operations,
//! and the unwind-handling instructions for both table-based and
//! funclet-based exception models.
//!
//! Everything is index-based: [`ValueId`], [`BlockId`], [`InstId`] and
//! [`SlotId`] are handles into per-function tables. φ-nodes are created
//! eagerly with empty incoming lists and appended to as predecessor
//! terminators are emitted, which is how values that flow backwards into
//! loop headers are formed without back-pointers.

pub mod builder;
pub mod display;

pub use self::builder::FunctionBuilder;

use crate::types::ValueType;

/// A handle to an SSA value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

/// A handle to a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

/// A handle to an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstId(pub u32);

/// A handle to a stack slot (the IR analogue of an entry-block alloca).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub u32);

/// A handle to a function within an emitted module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

/// Machine-level value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    V128,
    Ptr,
}

impl IrType {
    /// The IR type corresponding to a WebAssembly value type.
    pub fn from_value_type(vt: ValueType) -> IrType {
        match vt {
            ValueType::I32 => IrType::I32,
            ValueType::I64 => IrType::I64,
            ValueType::F32 => IrType::F32,
            ValueType::F64 => IrType::F64,
            ValueType::V128 => IrType::V128,
            ValueType::Any => unreachable!("the validator placeholder type is never materialised"),
        }
    }

    pub fn is_vector(self) -> bool {
        self == IrType::V128
    }
}

/// A literal constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    I8(u8),
    I32(i32),
    I64(i64),
    /// f32 bits, kept exact.
    F32(u32),
    /// f64 bits, kept exact.
    F64(u64),
    V128([u8; 16]),
    /// A pointer-width address baked into generated code.
    Ptr(u64),
}

impl Literal {
    pub fn ty(self) -> IrType {
        match self {
            Literal::I8(_) => IrType::I8,
            Literal::I32(_) => IrType::I32,
            Literal::I64(_) => IrType::I64,
            Literal::F32(_) => IrType::F32,
            Literal::F64(_) => IrType::F64,
            Literal::V128(_) => IrType::V128,
            Literal::Ptr(_) => IrType::Ptr,
        }
    }

    /// The zero constant of a WebAssembly value type.
    pub fn zero_of(vt: ValueType) -> Literal {
        match vt {
            ValueType::I32 => Literal::I32(0),
            ValueType::I64 => Literal::I64(0),
            ValueType::F32 => Literal::F32(0),
            ValueType::F64 => Literal::F64(0),
            ValueType::V128 => Literal::V128([0; 16]),
            ValueType::Any => unreachable!(),
        }
    }
}

/// Integer and float binary operations.
///
/// Saturating vector forms are included directly; they map to the target's
/// saturating vector instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    AShr,
    LShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
    Copysign,
    SAddSat,
    UAddSat,
    SSubSat,
    USubSat,
    /// Target-native float min/max (x86-style NaN handling); vector lanes
    /// only. Scalar min/max goes through the IEEE-strict runtime intrinsics.
    FMin,
    FMax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Count leading zeros (defined at zero).
    Clz,
    /// Count trailing zeros (defined at zero).
    Ctz,
    Popcnt,
    FNeg,
    FAbs,
    /// Non-strict square root (vector lanes).
    FSqrt,
    Not,
}

/// Strict floating-point operations: round-to-nearest, exceptions preserved.
/// The code generator must not fuse, reassociate, or constant-fold these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstrainedOp {
    FAdd,
    FSub,
    FMul,
    FDiv,
    FSqrt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    SLt,
    SLe,
    SGt,
    SGe,
    ULt,
    ULe,
    UGt,
    UGe,
    /// Ordered float comparisons: false if either operand is NaN.
    FOeq,
    FOlt,
    FOle,
    FOgt,
    FOge,
    /// Unordered not-equal: true if either operand is NaN.
    FUne,
    /// Unordered test: true iff either operand is NaN.
    FUno,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    Zext,
    Sext,
    Trunc,
    FpTrunc,
    FpExt,
    SiToFp,
    UiToFp,
    FpToSi,
    FpToUi,
    Bitcast,
    PtrToInt,
    IntToPtr,
}

/// Atomic read-modify-write operations; all are sequentially consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicRmwOp {
    Xchg,
    Add,
    Sub,
    And,
    Or,
    Xor,
}

/// What a call targets.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// A function defined in the same emitted module.
    Function(FuncId),
    /// A native entry point at a known address (imported functions).
    Address(u64),
    /// A runtime intrinsic, referenced by name and resolved at
    /// instantiation time.
    Intrinsic(&'static str),
    /// A computed pointer (indirect calls).
    Value(ValueId),
}

/// One SSA instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// An incoming function argument. Index 0 is the context pointer;
    /// WebAssembly parameters follow.
    Argument { index: u32 },
    Const(Literal),
    Binary { op: BinaryOp, lhs: ValueId, rhs: ValueId },
    Unary { op: UnaryOp, operand: ValueId },
    Constrained { op: ConstrainedOp, args: Vec<ValueId> },
    Compare { op: CmpOp, lhs: ValueId, rhs: ValueId },
    Cast { op: CastOp, operand: ValueId, to: IrType },
    Select { cond: ValueId, on_true: ValueId, on_false: ValueId },

    /// φ-node; incoming edges are appended as predecessors terminate.
    Phi { ty: IrType, incomings: Vec<(BlockId, ValueId)> },

    /// Address of a stack slot.
    SlotAddr { slot: SlotId },
    /// Byte-offset pointer arithmetic (an inbounds GEP on i8).
    PtrAdd { ptr: ValueId, offset: ValueId },
    Load {
        ptr: ValueId,
        ty: IrType,
        align: u32,
        volatile: bool,
        atomic: bool,
    },
    Store {
        ptr: ValueId,
        value: ValueId,
        align: u32,
        volatile: bool,
        atomic: bool,
    },
    AtomicRmw {
        op: AtomicRmwOp,
        ptr: ValueId,
        value: ValueId,
        ty: IrType,
    },
    /// Compare-and-exchange; yields the previous memory value.
    AtomicCmpxchg {
        ptr: ValueId,
        expected: ValueId,
        replacement: ValueId,
        ty: IrType,
    },

    /// Call or invoke. With `unwind` set, exceptional control transfers to
    /// that block; normal control continues in the current block.
    Call {
        callee: Callee,
        args: Vec<ValueId>,
        result_types: Vec<IrType>,
        unwind: Option<BlockId>,
    },

    // Vector operations. Bitwise and/or/xor/not on v128 go through the
    // scalar Binary/Unary kinds (they are lane-agnostic); everything whose
    // meaning depends on the lane interpretation carries `lanes`.
    VectorSplat { lanes: u32, scalar: ValueId },
    ExtractElement { vector: ValueId, lanes: u32, scalar_ty: IrType, lane: u32 },
    InsertElement { vector: ValueId, scalar: ValueId, lanes: u32, lane: u32 },
    ShuffleVector { a: ValueId, b: ValueId, mask: [u8; 16] },
    VectorBinary { op: BinaryOp, lanes: u32, lhs: ValueId, rhs: ValueId },
    VectorUnary { op: UnaryOp, lanes: u32, operand: ValueId },
    /// Lane-wise comparison; result lanes are all-ones or all-zero.
    VectorCompare { op: CmpOp, lanes: u32, lhs: ValueId, rhs: ValueId },
    /// Lane-wise conversion (int/float casts within 128 bits).
    VectorCast { op: CastOp, lanes: u32, operand: ValueId },

    // Exception handling
    /// Table-based unwinder entry point. Yields the raw exception object
    /// handed over by the personality routine. Clauses are type-info
    /// addresses this pad catches.
    LandingPad { clauses: Vec<u64> },
    /// Funclet-based unwinder dispatch; a terminator in its own block.
    CatchSwitch { handlers: Vec<BlockId> },
    /// A handler entry reached through `filter`; yields a funclet token.
    CatchPad { catch_switch: InstId, filter: FuncId },
    /// Return from a catch funclet to normal code.
    CatchRet { pad: ValueId, dest: BlockId },
    /// Declare slots whose addresses unwinder filter functions may recover.
    LocalEscape { slots: Vec<SlotId> },
    /// Recover the address of an escaped slot of the parent function from
    /// inside a filter function.
    LocalRecover { escape_index: u32, frame: ValueId },

    // Terminators
    Br { dest: BlockId },
    CondBr {
        cond: ValueId,
        on_true: BlockId,
        on_false: BlockId,
        /// Branch-weight hint: `Some(true)` means the true edge is likely.
        likely: Option<bool>,
    },
    Switch {
        index: ValueId,
        default: BlockId,
        cases: Vec<(u32, BlockId)>,
    },
    Ret { values: Vec<ValueId> },
    Unreachable,
}

impl InstKind {
    /// Whether this instruction ends its block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Br { .. }
                | InstKind::CondBr { .. }
                | InstKind::Switch { .. }
                | InstKind::Ret { .. }
                | InstKind::Unreachable
                | InstKind::CatchSwitch { .. }
                | InstKind::CatchRet { .. }
        )
    }

    /// Blocks this terminator can transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstKind::Br { dest } => vec![*dest],
            InstKind::CondBr { on_true, on_false, .. } => vec![*on_true, *on_false],
            InstKind::Switch { default, cases, .. } => {
                let mut out = vec![*default];
                out.extend(cases.iter().map(|(_, b)| *b));
                out
            }
            InstKind::CatchRet { dest, .. } => vec![*dest],
            InstKind::CatchSwitch { handlers } => handlers.clone(),
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Inst {
    pub kind: InstKind,
    /// Values this instruction produces (empty for stores, terminators...).
    pub results: Vec<ValueId>,
}

/// Where a value comes from.
#[derive(Debug, Clone, Copy)]
pub struct ValueInfo {
    pub ty: IrType,
    pub def: InstId,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    pub insts: Vec<InstId>,
    /// Number of leading φ instructions.
    pub phi_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotInfo {
    pub ty: IrType,
    /// Number of elements (for byte arrays such as throw argument frames).
    pub count: u32,
    /// Whether unwinder filter functions may recover this slot's address.
    pub escaped: bool,
}

/// A fully-emitted SSA function.
#[derive(Debug, Clone)]
pub struct SsaFunction {
    pub name: String,
    /// Parameter types; index 0 is always the context pointer.
    pub param_types: Vec<IrType>,
    pub result_types: Vec<IrType>,
    pub slots: Vec<SlotInfo>,
    pub blocks: Vec<Block>,
    /// Layout order of blocks for display and code generation.
    pub block_order: Vec<BlockId>,
    pub insts: Vec<Inst>,
    pub values: Vec<ValueInfo>,
    pub entry: BlockId,
}

impl SsaFunction {
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.0 as usize]
    }

    pub fn value_type(&self, id: ValueId) -> IrType {
        self.values[id.0 as usize].ty
    }

    /// The instruction that defines a value.
    pub fn def_of(&self, id: ValueId) -> InstId {
        self.values[id.0 as usize].def
    }

    /// Compute every block's predecessors from the terminators.
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for (index, block) in self.blocks.iter().enumerate() {
            let from = BlockId(index as u32);
            for &inst_id in &block.insts {
                let inst = self.inst(inst_id);
                if inst.kind.is_terminator() {
                    for succ in inst.kind.successors() {
                        let list = &mut preds[succ.0 as usize];
                        if !list.contains(&from) {
                            list.push(from);
                        }
                    }
                }
                // Invoke edges are also predecessors of their unwind block.
                if let InstKind::Call { unwind: Some(unwind), .. } = &inst.kind {
                    let list = &mut preds[unwind.0 as usize];
                    if !list.contains(&from) {
                        list.push(from);
                    }
                }
            }
        }
        preds
    }

    /// Check structural invariants: every reachable block is terminated,
    /// φ-nodes sit at block heads, and every φ has exactly one incoming per
    /// predecessor with a matching type.
    pub fn validate(&self) -> Result<(), String> {
        let preds = self.predecessors();

        for (index, block) in self.blocks.iter().enumerate() {
            let id = BlockId(index as u32);

            match block.insts.last() {
                Some(&last) if self.inst(last).kind.is_terminator() => {}
                _ => {
                    // Unterminated unreachable blocks can survive dead-code
                    // paths; only flag blocks with predecessors or entry.
                    if id == self.entry || !preds[index].is_empty() {
                        return Err(format!("block {} is not terminated", block.name));
                    }
                }
            }

            for (position, &inst_id) in block.insts.iter().enumerate() {
                let inst = self.inst(inst_id);
                let is_phi = matches!(inst.kind, InstKind::Phi { .. });
                if is_phi != (position < block.phi_count) {
                    return Err(format!(
                        "φ placement violated in block {} at {position}",
                        block.name
                    ));
                }

                if let InstKind::Phi { ty, incomings } = &inst.kind {
                    let mut expected = preds[index].clone();
                    expected.sort_by_key(|b| b.0);
                    // A switch can reach the same block through several
                    // edges (duplicate br_table targets), contributing one
                    // incoming per edge; compare the block sets.
                    let mut got: Vec<BlockId> = incomings.iter().map(|(b, _)| *b).collect();
                    got.sort_by_key(|b| b.0);
                    got.dedup();
                    if expected != got {
                        return Err(format!(
                            "φ in block {} has incomings {:?} but predecessors {:?}",
                            block.name, got, expected
                        ));
                    }
                    for (_, value) in incomings {
                        if self.value_type(*value) != *ty {
                            return Err(format!(
                                "φ in block {} mixes {:?} and {:?}",
                                block.name,
                                ty,
                                self.value_type(*value)
                            ));
                        }
                    }
                }

                if inst.kind.is_terminator() && position + 1 != block.insts.len() {
                    return Err(format!(
                        "terminator in the middle of block {}",
                        block.name
                    ));
                }
            }
        }
        Ok(())
    }
}

/// The functions produced by emitting one module: wasm function definitions
/// first, then any synthesised helper functions (unwind filters).
#[derive(Debug, Clone, Default)]
pub struct SsaModule {
    pub functions: Vec<SsaFunction>,
}

impl SsaModule {
    pub fn add(&mut self, function: SsaFunction) -> FuncId {
        self.functions.push(function);
        FuncId(self.functions.len() as u32 - 1)
    }
}
