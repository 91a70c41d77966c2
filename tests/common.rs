//! Shared test support: module fixtures and a small SSA evaluator.
//!
//! The evaluator executes emitted functions directly so the end-to-end
//! tests can observe real results and traps. It models the runtime
//! contract the generated code assumes: a context structure holding the
//! memory/table base pointers and mutable global data, a guarded linear
//! memory, and the runtime intrinsics (traps, IEEE-strict float helpers,
//! memory management). It is test tooling, not an interpreter feature.

use kiln::emit::{emit_module, EmissionContext};
use kiln::module::{
    read_module, GlobalLayout, InitExpr, Module, ModuleInstance, CONTEXT_GLOBAL_DATA_OFFSET,
};
use kiln::ssa::{
    AtomicRmwOp, BinaryOp, Callee, CastOp, CmpOp, ConstrainedOp, FuncId, InstKind, IrType,
    Literal, SsaFunction, SsaModule, UnaryOp, ValueId,
};
use kiln::types::{FunctionType, ValueType};
use std::collections::HashMap;

pub const PAGE_SIZE: u64 = 65536;
const CONTEXT_BASE: u64 = 0x100;
const MEMORY_BASE: u64 = 0x8000_0000;
const TABLE_BASE: u64 = 0x9000_0000;
const FRAME_BASE: u64 = 0xa000_0000;
const FRAME_STRIDE: u64 = 0x10000;

// ---------------------------------------------------------------------------
// Module fixtures
// ---------------------------------------------------------------------------

/// Build a module with the given types, one defined function (type index
/// 0), locals, and body bytes.
pub fn single_function_module(
    types: Vec<FunctionType>,
    locals: Vec<ValueType>,
    code: Vec<u8>,
) -> Module {
    let mut module = Module::new();
    module.types = types;
    module.functions.push(kiln::module::FunctionDecl { type_index: 0 });
    module.function_defs.push(kiln::module::FunctionDef {
        type_index: 0,
        non_parameter_locals: locals,
        code,
    });
    module
}

/// Emit a single-function module and validate every emitted function.
pub fn emit_single(
    params: &[ValueType],
    results: &[ValueType],
    locals: &[ValueType],
    code: Vec<u8>,
) -> (SsaModule, Module, ModuleInstance) {
    let module = single_function_module(
        vec![FunctionType::new(params.to_vec(), results.to_vec())],
        locals.to_vec(),
        code,
    );
    emit_whole(module)
}

/// Emit any module and validate every emitted function.
pub fn emit_whole(module: Module) -> (SsaModule, Module, ModuleInstance) {
    let instance = ModuleInstance::stub(&module);
    let ssa = emit_module(&module, &instance, &EmissionContext::default())
        .expect("emission succeeds");
    for function in &ssa.functions {
        function
            .validate()
            .unwrap_or_else(|e| panic!("invalid SSA in {}: {e}", function.name));
    }
    (ssa, module, instance)
}

/// Parse `.wasm` bytes, emit, and validate.
#[allow(dead_code)]
pub fn emit_wasm_bytes(bytes: &[u8]) -> (SsaModule, Module, ModuleInstance) {
    let module = read_module(bytes).expect("module bytes parse");
    emit_whole(module)
}

// ---------------------------------------------------------------------------
// Values and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Val {
    Bool(bool),
    I8(u8),
    I16(u16),
    I32(u32),
    I64(u64),
    F32(f32),
    F64(f64),
    V128([u8; 16]),
    Ptr(u64),
}

impl Val {
    pub fn i32(v: i32) -> Val {
        Val::I32(v as u32)
    }

    pub fn i64(v: i64) -> Val {
        Val::I64(v as u64)
    }

    fn as_u64(self) -> u64 {
        match self {
            Val::Bool(b) => b as u64,
            Val::I8(v) => v as u64,
            Val::I16(v) => v as u64,
            Val::I32(v) => v as u64,
            Val::I64(v) => v,
            Val::Ptr(v) => v,
            other => panic!("expected an integer value, got {other:?}"),
        }
    }

    fn of_type(ty: IrType, bits: u64) -> Val {
        match ty {
            IrType::Bool => Val::Bool(bits != 0),
            IrType::I8 => Val::I8(bits as u8),
            IrType::I16 => Val::I16(bits as u16),
            IrType::I32 => Val::I32(bits as u32),
            IrType::I64 => Val::I64(bits),
            IrType::F32 => Val::F32(f32::from_bits(bits as u32)),
            IrType::F64 => Val::F64(f64::from_bits(bits)),
            IrType::Ptr => Val::Ptr(bits),
            IrType::V128 => panic!("v128 does not fit in 64 bits"),
        }
    }

    fn bits(self) -> u64 {
        match self {
            Val::F32(v) => v.to_bits() as u64,
            Val::F64(v) => v.to_bits(),
            other => other.as_u64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrapKind {
    Unreachable,
    DivideByZeroOrIntegerOverflow,
    InvalidFloatOperation,
    MisalignedAtomic,
    IndirectCallSignatureMismatch,
    UserException { type_instance: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Returned(Vec<Val>),
    Trapped(TrapKind),
}

impl Outcome {
    #[track_caller]
    pub fn expect_values(self) -> Vec<Val> {
        match self {
            Outcome::Returned(values) => values,
            Outcome::Trapped(kind) => panic!("unexpected trap: {kind:?}"),
        }
    }

    #[track_caller]
    pub fn expect_trap(self) -> TrapKind {
        match self {
            Outcome::Trapped(kind) => kind,
            Outcome::Returned(values) => panic!("expected a trap, returned {values:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Address space
// ---------------------------------------------------------------------------

struct Segment {
    base: u64,
    bytes: Vec<u8>,
}

struct AddressSpace {
    segments: Vec<Segment>,
}

impl AddressSpace {
    fn new() -> Self {
        AddressSpace { segments: Vec::new() }
    }

    fn add_segment(&mut self, base: u64, size: usize) {
        self.segments.push(Segment {
            base,
            bytes: vec![0; size],
        });
    }

    fn segment_mut(&mut self, addr: u64, len: usize) -> (&mut Segment, usize) {
        let segment = self
            .segments
            .iter_mut()
            .find(|s| addr >= s.base && addr + len as u64 <= s.base + s.bytes.len() as u64)
            .unwrap_or_else(|| panic!("wild pointer {addr:#x} ({len} bytes)"));
        let offset = (addr - segment.base) as usize;
        (segment, offset)
    }

    fn read(&mut self, addr: u64, len: usize) -> &[u8] {
        let (segment, offset) = self.segment_mut(addr, len);
        &segment.bytes[offset..offset + len]
    }

    fn write(&mut self, addr: u64, data: &[u8]) {
        let (segment, offset) = self.segment_mut(addr, data.len());
        segment.bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    fn read_u64(&mut self, addr: u64, len: usize) -> u64 {
        let mut out = [0u8; 8];
        out[..len].copy_from_slice(self.read(addr, len));
        u64::from_le_bytes(out)
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

pub struct Evaluator<'a> {
    ssa: &'a SsaModule,
    space: AddressSpace,
    memory_pages: u64,
    frame_count: u64,
    steps: u64,
}

enum Flow {
    Continue,
    Jump(kiln::ssa::BlockId),
    Return(Vec<Val>),
    Trap(TrapKind),
}

impl<'a> Evaluator<'a> {
    /// Set up the runtime model: context structure, linear memory, table.
    /// Mutable globals are initialised from the module's initialisers using
    /// the instance layout.
    pub fn new(
        ssa: &'a SsaModule,
        module: &Module,
        instance: &ModuleInstance,
        memory_pages: u64,
    ) -> Self {
        let mut space = AddressSpace::new();

        let global_data_size: u64 = module
            .globals
            .iter()
            .map(|g| g.ty.byte_width().max(8) as u64)
            .sum();
        space.add_segment(
            CONTEXT_BASE,
            (CONTEXT_GLOBAL_DATA_OFFSET + global_data_size + 64) as usize,
        );
        space.write(CONTEXT_BASE, &MEMORY_BASE.to_le_bytes());
        space.write(CONTEXT_BASE + 8, &TABLE_BASE.to_le_bytes());

        for (global, layout) in module.globals.iter().zip(&instance.global_layouts) {
            if let GlobalLayout::Mutable { data_offset } = layout {
                let bits = match global.init {
                    InitExpr::I32(v) => v as u32 as u64,
                    InitExpr::I64(v) => v as u64,
                    InitExpr::F32(bits) => bits as u64,
                    InitExpr::F64(bits) => bits,
                    InitExpr::GlobalGet(_) => 0,
                };
                let width = global.ty.byte_width();
                space.write(
                    CONTEXT_BASE + CONTEXT_GLOBAL_DATA_OFFSET + data_offset,
                    &bits.to_le_bytes()[..width],
                );
            }
        }

        space.add_segment(MEMORY_BASE, (memory_pages * PAGE_SIZE) as usize);
        space.add_segment(TABLE_BASE, 16 * 64);

        Evaluator {
            ssa,
            space,
            memory_pages,
            frame_count: 0,
            steps: 0,
        }
    }

    /// Write into linear memory (for test setup).
    #[allow(dead_code)]
    pub fn write_memory(&mut self, offset: u64, data: &[u8]) {
        self.space.write(MEMORY_BASE + offset, data);
    }

    /// Invoke a function by index with WebAssembly arguments.
    pub fn invoke(&mut self, function: usize, args: &[Val]) -> Outcome {
        let mut full_args = vec![Val::Ptr(CONTEXT_BASE)];
        full_args.extend_from_slice(args);
        let ssa = self.ssa;
        match self.run(&ssa.functions[function], &full_args) {
            Ok(values) => Outcome::Returned(values),
            Err(kind) => Outcome::Trapped(kind),
        }
    }

    fn run(&mut self, function: &SsaFunction, args: &[Val]) -> Result<Vec<Val>, TrapKind> {
        // Allocate this frame's stack slots.
        let frame_base = FRAME_BASE + self.frame_count * FRAME_STRIDE;
        self.frame_count += 1;
        self.space.add_segment(frame_base, FRAME_STRIDE as usize);
        let mut slot_addrs = Vec::with_capacity(function.slots.len());
        let mut next = frame_base;
        for slot in &function.slots {
            next = (next + 15) & !15;
            slot_addrs.push(next);
            next += (ty_size(slot.ty) as u64) * slot.count as u64;
        }

        let mut values: HashMap<ValueId, Val> = HashMap::new();
        let mut current = function.entry;
        let mut previous: Option<kiln::ssa::BlockId> = None;

        loop {
            // φ-nodes read their incoming for the edge taken, together,
            // before the block body runs.
            let block = function.block(current);
            let mut phi_updates = Vec::new();
            for &inst_id in &block.insts[..block.phi_count] {
                let inst = function.inst(inst_id);
                if let InstKind::Phi { incomings, .. } = &inst.kind {
                    let from = previous.expect("φ in entry block");
                    let (_, incoming_value) = incomings
                        .iter()
                        .find(|(b, _)| *b == from)
                        .unwrap_or_else(|| panic!("φ missing incoming for {from:?}"));
                    phi_updates.push((inst.results[0], values[incoming_value]));
                }
            }
            for (id, value) in phi_updates {
                values.insert(id, value);
            }

            let mut next_block = None;
            for &inst_id in &block.insts[block.phi_count..] {
                self.steps += 1;
                assert!(self.steps < 50_000_000, "evaluator step budget exhausted");

                let inst = function.inst(inst_id);
                match self.step(&inst.kind, &inst.results, args, &slot_addrs, &mut values)? {
                    Flow::Continue => {}
                    Flow::Jump(block) => {
                        next_block = Some(block);
                        break;
                    }
                    Flow::Return(vals) => return Ok(vals),
                    Flow::Trap(kind) => return Err(kind),
                }
            }

            let next = next_block.expect("block fell off its end");
            previous = Some(current);
            current = next;
        }
    }

    fn step(
        &mut self,
        kind: &InstKind,
        results: &[ValueId],
        args: &[Val],
        slot_addrs: &[u64],
        values: &mut HashMap<ValueId, Val>,
    ) -> Result<Flow, TrapKind> {
        let value_of = |values: &HashMap<ValueId, Val>, id: ValueId| values[&id];

        match kind {
            InstKind::Argument { index } => {
                values.insert(results[0], args[*index as usize]);
            }
            InstKind::Const(literal) => {
                let value = match *literal {
                    Literal::I8(v) => Val::I8(v),
                    Literal::I32(v) => Val::I32(v as u32),
                    Literal::I64(v) => Val::I64(v as u64),
                    Literal::F32(bits) => Val::F32(f32::from_bits(bits)),
                    Literal::F64(bits) => Val::F64(f64::from_bits(bits)),
                    Literal::V128(bytes) => Val::V128(bytes),
                    Literal::Ptr(addr) => Val::Ptr(addr),
                };
                values.insert(results[0], value);
            }
            InstKind::Binary { op, lhs, rhs } => {
                let l = value_of(values, *lhs);
                let r = value_of(values, *rhs);
                values.insert(results[0], eval_binary(*op, l, r));
            }
            InstKind::Unary { op, operand } => {
                let v = value_of(values, *operand);
                values.insert(results[0], eval_unary(*op, v));
            }
            InstKind::Constrained { op, args: op_args } => {
                let vals: Vec<Val> = op_args.iter().map(|a| value_of(values, *a)).collect();
                values.insert(results[0], eval_constrained(*op, &vals));
            }
            InstKind::Compare { op, lhs, rhs } => {
                let l = value_of(values, *lhs);
                let r = value_of(values, *rhs);
                values.insert(results[0], Val::Bool(eval_compare(*op, l, r)));
            }
            InstKind::Cast { op, operand, to } => {
                let v = value_of(values, *operand);
                values.insert(results[0], eval_cast(*op, v, *to));
            }
            InstKind::Select { cond, on_true, on_false } => {
                let c = matches!(value_of(values, *cond), Val::Bool(true));
                let chosen = if c { *on_true } else { *on_false };
                values.insert(results[0], value_of(values, chosen));
            }
            InstKind::Phi { .. } => unreachable!("φ handled at block entry"),
            InstKind::SlotAddr { slot } => {
                values.insert(results[0], Val::Ptr(slot_addrs[slot.0 as usize]));
            }
            InstKind::PtrAdd { ptr, offset } => {
                let base = value_of(values, *ptr).as_u64();
                let off = value_of(values, *offset).as_u64();
                values.insert(results[0], Val::Ptr(base.wrapping_add(off)));
            }
            InstKind::Load { ptr, ty, .. } => {
                let addr = value_of(values, *ptr).as_u64();
                let value = if *ty == IrType::V128 {
                    let mut bytes = [0u8; 16];
                    bytes.copy_from_slice(self.space.read(addr, 16));
                    Val::V128(bytes)
                } else {
                    let bits = self.space.read_u64(addr, ty_size(*ty));
                    Val::of_type(*ty, bits)
                };
                values.insert(results[0], value);
            }
            InstKind::Store { ptr, value, .. } => {
                let addr = value_of(values, *ptr).as_u64();
                let v = value_of(values, *value);
                match v {
                    Val::V128(bytes) => self.space.write(addr, &bytes),
                    other => {
                        let size = val_size(other);
                        let bits = other.bits();
                        self.space.write(addr, &bits.to_le_bytes()[..size]);
                    }
                }
            }
            InstKind::AtomicRmw { op, ptr, value, ty } => {
                let addr = value_of(values, *ptr).as_u64();
                let operand = value_of(values, *value).bits();
                let size = ty_size(*ty);
                let previous = self.space.read_u64(addr, size);
                let mask = width_mask(size);
                let updated = match op {
                    AtomicRmwOp::Xchg => operand,
                    AtomicRmwOp::Add => previous.wrapping_add(operand),
                    AtomicRmwOp::Sub => previous.wrapping_sub(operand),
                    AtomicRmwOp::And => previous & operand,
                    AtomicRmwOp::Or => previous | operand,
                    AtomicRmwOp::Xor => previous ^ operand,
                } & mask;
                self.space.write(addr, &updated.to_le_bytes()[..size]);
                values.insert(results[0], Val::of_type(*ty, previous & mask));
            }
            InstKind::AtomicCmpxchg { ptr, expected, replacement, ty } => {
                let addr = value_of(values, *ptr).as_u64();
                let expected_bits = value_of(values, *expected).bits();
                let replacement_bits = value_of(values, *replacement).bits();
                let size = ty_size(*ty);
                let previous = self.space.read_u64(addr, size);
                if previous == expected_bits {
                    self.space.write(addr, &replacement_bits.to_le_bytes()[..size]);
                }
                values.insert(results[0], Val::of_type(*ty, previous));
            }
            InstKind::Call { callee, args: call_args, unwind: _, .. } => {
                let arg_vals: Vec<Val> = call_args.iter().map(|a| value_of(values, *a)).collect();
                let outputs = match callee {
                    Callee::Intrinsic(name) => self.call_intrinsic(name, &arg_vals)?,
                    Callee::Function(FuncId(index)) => {
                        let ssa = self.ssa;
                        self.run(&ssa.functions[*index as usize], &arg_vals)?
                    }
                    Callee::Address(addr) => panic!("call to external address {addr:#x}"),
                    Callee::Value(_) => panic!("indirect calls are not executed in tests"),
                };
                for (id, value) in results.iter().zip(outputs) {
                    values.insert(*id, value);
                }
            }
            InstKind::VectorSplat { lanes, scalar } => {
                let v = value_of(values, *scalar);
                values.insert(results[0], vector_splat(*lanes, v));
            }
            InstKind::ExtractElement { vector, lanes, scalar_ty, lane } => {
                let v = expect_v128(value_of(values, *vector));
                let bits = read_lane(&v, *lanes, *lane);
                values.insert(results[0], Val::of_type(*scalar_ty, bits));
            }
            InstKind::InsertElement { vector, scalar, lanes, lane } => {
                let mut v = expect_v128(value_of(values, *vector));
                let s = value_of(values, *scalar).bits();
                write_lane(&mut v, *lanes, *lane, s);
                values.insert(results[0], Val::V128(v));
            }
            InstKind::ShuffleVector { a, b, mask } => {
                let va = expect_v128(value_of(values, *a));
                let vb = expect_v128(value_of(values, *b));
                let mut out = [0u8; 16];
                for (i, &sel) in mask.iter().enumerate() {
                    out[i] = if sel < 16 { va[sel as usize] } else { vb[sel as usize - 16] };
                }
                values.insert(results[0], Val::V128(out));
            }
            InstKind::VectorBinary { op, lanes, lhs, rhs } => {
                let l = expect_v128(value_of(values, *lhs));
                let r = expect_v128(value_of(values, *rhs));
                values.insert(results[0], Val::V128(vector_binary(*op, *lanes, l, r)));
            }
            InstKind::VectorUnary { op, lanes, operand } => {
                let v = expect_v128(value_of(values, *operand));
                values.insert(results[0], Val::V128(vector_unary(*op, *lanes, v)));
            }
            InstKind::VectorCompare { op, lanes, lhs, rhs } => {
                let l = expect_v128(value_of(values, *lhs));
                let r = expect_v128(value_of(values, *rhs));
                values.insert(results[0], Val::V128(vector_compare(*op, *lanes, l, r)));
            }
            InstKind::VectorCast { op, lanes, operand } => {
                let v = expect_v128(value_of(values, *operand));
                values.insert(results[0], Val::V128(vector_cast(*op, *lanes, v)));
            }
            InstKind::LandingPad { .. }
            | InstKind::CatchSwitch { .. }
            | InstKind::CatchPad { .. }
            | InstKind::CatchRet { .. }
            | InstKind::LocalEscape { .. }
            | InstKind::LocalRecover { .. } => {
                panic!("unwinder paths are checked structurally, not executed");
            }
            InstKind::Br { dest } => return Ok(Flow::Jump(*dest)),
            InstKind::CondBr { cond, on_true, on_false, .. } => {
                let c = matches!(value_of(values, *cond), Val::Bool(true));
                return Ok(Flow::Jump(if c { *on_true } else { *on_false }));
            }
            InstKind::Switch { index, default, cases } => {
                let v = value_of(values, *index).as_u64() as u32;
                let dest = cases
                    .iter()
                    .find(|(case, _)| *case == v)
                    .map(|(_, block)| *block)
                    .unwrap_or(*default);
                return Ok(Flow::Jump(dest));
            }
            InstKind::Ret { values: ret } => {
                let out = ret.iter().map(|v| value_of(values, *v)).collect();
                return Ok(Flow::Return(out));
            }
            InstKind::Unreachable => return Ok(Flow::Trap(TrapKind::Unreachable)),
        }
        Ok(Flow::Continue)
    }

    fn call_intrinsic(&mut self, name: &str, args: &[Val]) -> Result<Vec<Val>, TrapKind> {
        match name {
            "unreachableTrap" => Err(TrapKind::Unreachable),
            "divideByZeroOrIntegerOverflowTrap" => Err(TrapKind::DivideByZeroOrIntegerOverflow),
            "invalidFloatOperationTrap" => Err(TrapKind::InvalidFloatOperation),
            "misalignedAtomicTrap" => Err(TrapKind::MisalignedAtomic),
            "indirectCallSignatureMismatch" => Err(TrapKind::IndirectCallSignatureMismatch),
            "throwException" => Err(TrapKind::UserException {
                type_instance: args[0].as_u64(),
            }),
            "growMemory" => {
                let delta = args[0].as_u64();
                let previous = self.memory_pages;
                self.memory_pages += delta;
                let added = (delta * PAGE_SIZE) as usize;
                if added > 0 {
                    let segment = self
                        .space
                        .segments
                        .iter_mut()
                        .find(|s| s.base == MEMORY_BASE)
                        .expect("memory segment exists");
                    let len = segment.bytes.len();
                    segment.bytes.resize(len + added, 0);
                }
                Ok(vec![Val::I32(previous as u32)])
            }
            "currentMemory" => Ok(vec![Val::I32(self.memory_pages as u32)]),
            "atomic_wake" => Ok(vec![Val::I32(0)]),
            "atomic_wait_i32" | "atomic_wait_i64" => Ok(vec![Val::I32(0)]),
            "f32.min" => Ok(vec![binary_f32(args, wasm_fmin_f32)]),
            "f32.max" => Ok(vec![binary_f32(args, wasm_fmax_f32)]),
            "f64.min" => Ok(vec![binary_f64(args, wasm_fmin_f64)]),
            "f64.max" => Ok(vec![binary_f64(args, wasm_fmax_f64)]),
            "f32.ceil" => Ok(vec![unary_f32(args, f32::ceil)]),
            "f32.floor" => Ok(vec![unary_f32(args, f32::floor)]),
            "f32.trunc" => Ok(vec![unary_f32(args, f32::trunc)]),
            "f32.nearest" => Ok(vec![unary_f32(args, nearest_f32)]),
            "f64.ceil" => Ok(vec![unary_f64(args, f64::ceil)]),
            "f64.floor" => Ok(vec![unary_f64(args, f64::floor)]),
            "f64.trunc" => Ok(vec![unary_f64(args, f64::trunc)]),
            "f64.nearest" => Ok(vec![unary_f64(args, nearest_f64)]),
            other => panic!("unmodelled intrinsic {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scalar operation semantics
// ---------------------------------------------------------------------------

fn ty_size(ty: IrType) -> usize {
    match ty {
        IrType::Bool | IrType::I8 => 1,
        IrType::I16 => 2,
        IrType::I32 | IrType::F32 => 4,
        IrType::I64 | IrType::F64 | IrType::Ptr => 8,
        IrType::V128 => 16,
    }
}

fn val_size(v: Val) -> usize {
    match v {
        Val::Bool(_) | Val::I8(_) => 1,
        Val::I16(_) => 2,
        Val::I32(_) | Val::F32(_) => 4,
        Val::I64(_) | Val::F64(_) | Val::Ptr(_) => 8,
        Val::V128(_) => 16,
    }
}

fn width_mask(size: usize) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    }
}

fn eval_binary(op: BinaryOp, l: Val, r: Val) -> Val {
    use BinaryOp::*;
    match (l, r) {
        (Val::Bool(a), Val::Bool(b)) => match op {
            And => Val::Bool(a && b),
            Or => Val::Bool(a || b),
            Xor => Val::Bool(a ^ b),
            _ => panic!("{op:?} on bool"),
        },
        (Val::I32(a), Val::I32(b)) => {
            let sa = a as i32;
            let sb = b as i32;
            Val::I32(match op {
                Add => a.wrapping_add(b),
                Sub => a.wrapping_sub(b),
                Mul => a.wrapping_mul(b),
                SDiv => sa.wrapping_div(sb) as u32,
                UDiv => a / b,
                SRem => sa.wrapping_rem(sb) as u32,
                URem => a % b,
                And => a & b,
                Or => a | b,
                Xor => a ^ b,
                Shl => a.wrapping_shl(b),
                AShr => (sa.wrapping_shr(b)) as u32,
                LShr => a.wrapping_shr(b),
                _ => panic!("{op:?} on i32"),
            })
        }
        (Val::I64(a), Val::I64(b)) => {
            let sa = a as i64;
            let sb = b as i64;
            Val::I64(match op {
                Add => a.wrapping_add(b),
                Sub => a.wrapping_sub(b),
                Mul => a.wrapping_mul(b),
                SDiv => sa.wrapping_div(sb) as u64,
                UDiv => a / b,
                SRem => sa.wrapping_rem(sb) as u64,
                URem => a % b,
                And => a & b,
                Or => a | b,
                Xor => a ^ b,
                Shl => a.wrapping_shl(b as u32),
                AShr => (sa.wrapping_shr(b as u32)) as u64,
                LShr => a.wrapping_shr(b as u32),
                _ => panic!("{op:?} on i64"),
            })
        }
        (Val::F32(a), Val::F32(b)) => Val::F32(match op {
            FAdd => a + b,
            FSub => a - b,
            FMul => a * b,
            FDiv => a / b,
            Copysign => a.copysign(b),
            _ => panic!("{op:?} on f32"),
        }),
        (Val::F64(a), Val::F64(b)) => Val::F64(match op {
            FAdd => a + b,
            FSub => a - b,
            FMul => a * b,
            FDiv => a / b,
            Copysign => a.copysign(b),
            _ => panic!("{op:?} on f64"),
        }),
        (Val::V128(a), Val::V128(b)) => {
            // Bitwise ops are lane-agnostic.
            let mut out = [0u8; 16];
            for i in 0..16 {
                out[i] = match op {
                    And => a[i] & b[i],
                    Or => a[i] | b[i],
                    Xor => a[i] ^ b[i],
                    _ => panic!("{op:?} on raw v128"),
                };
            }
            Val::V128(out)
        }
        other => panic!("mismatched binary operands {other:?}"),
    }
}

fn eval_unary(op: UnaryOp, v: Val) -> Val {
    use UnaryOp::*;
    match v {
        Val::I32(a) => Val::I32(match op {
            Clz => a.leading_zeros(),
            Ctz => a.trailing_zeros(),
            Popcnt => a.count_ones(),
            _ => panic!("{op:?} on i32"),
        }),
        Val::I64(a) => Val::I64(match op {
            Clz => a.leading_zeros() as u64,
            Ctz => a.trailing_zeros() as u64,
            Popcnt => a.count_ones() as u64,
            _ => panic!("{op:?} on i64"),
        }),
        Val::F32(a) => Val::F32(match op {
            FNeg => -a,
            FAbs => a.abs(),
            _ => panic!("{op:?} on f32"),
        }),
        Val::F64(a) => Val::F64(match op {
            FNeg => -a,
            FAbs => a.abs(),
            _ => panic!("{op:?} on f64"),
        }),
        Val::V128(a) => {
            let mut out = [0u8; 16];
            for i in 0..16 {
                out[i] = match op {
                    Not => !a[i],
                    _ => panic!("{op:?} on raw v128"),
                };
            }
            Val::V128(out)
        }
        other => panic!("{op:?} on {other:?}"),
    }
}

fn eval_constrained(op: ConstrainedOp, args: &[Val]) -> Val {
    use ConstrainedOp::*;
    match args[0] {
        Val::F32(a) => Val::F32(match op {
            FAdd => a + expect_f32(args[1]),
            FSub => a - expect_f32(args[1]),
            FMul => a * expect_f32(args[1]),
            FDiv => a / expect_f32(args[1]),
            FSqrt => a.sqrt(),
        }),
        Val::F64(a) => Val::F64(match op {
            FAdd => a + expect_f64(args[1]),
            FSub => a - expect_f64(args[1]),
            FMul => a * expect_f64(args[1]),
            FDiv => a / expect_f64(args[1]),
            FSqrt => a.sqrt(),
        }),
        other => panic!("constrained op on {other:?}"),
    }
}

fn eval_compare(op: CmpOp, l: Val, r: Val) -> bool {
    use CmpOp::*;
    match (l, r) {
        (Val::F32(a), Val::F32(b)) => match op {
            FOeq => a == b,
            FOlt => a < b,
            FOle => a <= b,
            FOgt => a > b,
            FOge => a >= b,
            FUne => a != b || a.is_nan() || b.is_nan(),
            FUno => a.is_nan() || b.is_nan(),
            _ => panic!("{op:?} on f32"),
        },
        (Val::F64(a), Val::F64(b)) => match op {
            FOeq => a == b,
            FOlt => a < b,
            FOle => a <= b,
            FOgt => a > b,
            FOge => a >= b,
            FUne => a != b || a.is_nan() || b.is_nan(),
            FUno => a.is_nan() || b.is_nan(),
            _ => panic!("{op:?} on f64"),
        },
        (l, r) => {
            let a = l.as_u64();
            let b = r.as_u64();
            let width = val_size(l) * 8;
            let sign = |v: u64| {
                if width >= 64 {
                    v as i64
                } else {
                    ((v << (64 - width)) as i64) >> (64 - width)
                }
            };
            match op {
                Eq => a == b,
                Ne => a != b,
                ULt => a < b,
                ULe => a <= b,
                UGt => a > b,
                UGe => a >= b,
                SLt => sign(a) < sign(b),
                SLe => sign(a) <= sign(b),
                SGt => sign(a) > sign(b),
                SGe => sign(a) >= sign(b),
                _ => panic!("float comparison {op:?} on integers"),
            }
        }
    }
}

fn eval_cast(op: CastOp, v: Val, to: IrType) -> Val {
    use CastOp::*;
    match op {
        Zext | IntToPtr | PtrToInt => Val::of_type(to, v.as_u64()),
        Sext => {
            let bits = v.as_u64();
            let width = val_size(v) * 8;
            let extended = if width >= 64 {
                bits as i64
            } else {
                ((bits << (64 - width)) as i64) >> (64 - width)
            };
            Val::of_type(to, extended as u64 & width_mask(ty_size(to)))
        }
        Trunc => Val::of_type(to, v.as_u64() & width_mask(ty_size(to))),
        FpTrunc => Val::F32(expect_f64(v) as f32),
        FpExt => Val::F64(expect_f32(v) as f64),
        SiToFp => {
            let signed = match v {
                Val::I32(a) => a as i32 as i64,
                Val::I64(a) => a as i64,
                other => panic!("sitofp on {other:?}"),
            };
            match to {
                IrType::F32 => Val::F32(signed as f32),
                IrType::F64 => Val::F64(signed as f64),
                _ => panic!("sitofp to {to:?}"),
            }
        }
        UiToFp => match to {
            IrType::F32 => Val::F32(v.as_u64() as f32),
            IrType::F64 => Val::F64(v.as_u64() as f64),
            _ => panic!("uitofp to {to:?}"),
        },
        FpToSi => {
            let f = match v {
                Val::F32(a) => a as f64,
                Val::F64(a) => a,
                other => panic!("fptosi on {other:?}"),
            };
            match to {
                IrType::I32 => Val::I32(f as i32 as u32),
                IrType::I64 => Val::I64(f as i64 as u64),
                _ => panic!("fptosi to {to:?}"),
            }
        }
        FpToUi => {
            let f = match v {
                Val::F32(a) => a as f64,
                Val::F64(a) => a,
                other => panic!("fptoui on {other:?}"),
            };
            match to {
                IrType::I32 => Val::I32(f as u32),
                IrType::I64 => Val::I64(f as u64),
                _ => panic!("fptoui to {to:?}"),
            }
        }
        Bitcast => match (v, to) {
            (Val::F32(a), IrType::I32) => Val::I32(a.to_bits()),
            (Val::F64(a), IrType::I64) => Val::I64(a.to_bits()),
            (Val::I32(a), IrType::F32) => Val::F32(f32::from_bits(a)),
            (Val::I64(a), IrType::F64) => Val::F64(f64::from_bits(a)),
            (v, to) => Val::of_type(to, v.bits()),
        },
    }
}

fn expect_f32(v: Val) -> f32 {
    match v {
        Val::F32(a) => a,
        other => panic!("expected f32, got {other:?}"),
    }
}

fn expect_f64(v: Val) -> f64 {
    match v {
        Val::F64(a) => a,
        other => panic!("expected f64, got {other:?}"),
    }
}

fn expect_v128(v: Val) -> [u8; 16] {
    match v {
        Val::V128(bytes) => bytes,
        other => panic!("expected v128, got {other:?}"),
    }
}

// WebAssembly min/max propagate NaN and order -0 before +0, unlike host
// instructions.
fn wasm_fmin_f32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == b {
        if a.is_sign_negative() { a } else { b }
    } else if a < b {
        a
    } else {
        b
    }
}

fn wasm_fmax_f32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == b {
        if a.is_sign_positive() { a } else { b }
    } else if a > b {
        a
    } else {
        b
    }
}

fn wasm_fmin_f64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == b {
        if a.is_sign_negative() { a } else { b }
    } else if a < b {
        a
    } else {
        b
    }
}

fn wasm_fmax_f64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == b {
        if a.is_sign_positive() { a } else { b }
    } else if a > b {
        a
    } else {
        b
    }
}

fn nearest_f32(v: f32) -> f32 {
    let rounded = v.round();
    if (rounded - v).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - v.signum()
    } else {
        rounded
    }
}

fn nearest_f64(v: f64) -> f64 {
    let rounded = v.round();
    if (rounded - v).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - v.signum()
    } else {
        rounded
    }
}

fn unary_f32(args: &[Val], f: impl Fn(f32) -> f32) -> Val {
    Val::F32(f(expect_f32(args[0])))
}

fn unary_f64(args: &[Val], f: impl Fn(f64) -> f64) -> Val {
    Val::F64(f(expect_f64(args[0])))
}

fn binary_f32(args: &[Val], f: impl Fn(f32, f32) -> f32) -> Val {
    Val::F32(f(expect_f32(args[0]), expect_f32(args[1])))
}

fn binary_f64(args: &[Val], f: impl Fn(f64, f64) -> f64) -> Val {
    Val::F64(f(expect_f64(args[0]), expect_f64(args[1])))
}

// ---------------------------------------------------------------------------
// Vector lane semantics
// ---------------------------------------------------------------------------

fn lane_bytes(lanes: u32) -> usize {
    16 / lanes as usize
}

fn read_lane(v: &[u8; 16], lanes: u32, lane: u32) -> u64 {
    let size = lane_bytes(lanes);
    let mut out = [0u8; 8];
    out[..size].copy_from_slice(&v[lane as usize * size..][..size]);
    u64::from_le_bytes(out)
}

fn write_lane(v: &mut [u8; 16], lanes: u32, lane: u32, bits: u64) {
    let size = lane_bytes(lanes);
    v[lane as usize * size..][..size].copy_from_slice(&bits.to_le_bytes()[..size]);
}

fn vector_splat(lanes: u32, scalar: Val) -> Val {
    let mut out = [0u8; 16];
    for lane in 0..lanes {
        write_lane(&mut out, lanes, lane, scalar.bits());
    }
    Val::V128(out)
}

fn lane_f(v: u64, lanes: u32) -> f64 {
    if lanes == 4 {
        f32::from_bits(v as u32) as f64
    } else {
        f64::from_bits(v)
    }
}

fn f_lane(v: f64, lanes: u32) -> u64 {
    if lanes == 4 {
        (v as f32).to_bits() as u64
    } else {
        v.to_bits()
    }
}

fn vector_binary(op: BinaryOp, lanes: u32, l: [u8; 16], r: [u8; 16]) -> [u8; 16] {
    use BinaryOp::*;
    let size = lane_bytes(lanes);
    let width = size * 8;
    let mask = width_mask(size);
    let sign = |v: u64| ((v << (64 - width)) as i64) >> (64 - width);
    let mut out = [0u8; 16];
    for lane in 0..lanes {
        let a = read_lane(&l, lanes, lane);
        let b = read_lane(&r, lanes, lane);
        let result = match op {
            Add => a.wrapping_add(b) & mask,
            Sub => a.wrapping_sub(b) & mask,
            Mul => a.wrapping_mul(b) & mask,
            And => a & b,
            Or => a | b,
            Xor => a ^ b,
            Shl => a.wrapping_shl(b as u32) & mask,
            LShr => (a & mask).wrapping_shr(b as u32),
            AShr => (sign(a) >> (b as u32).min(width as u32 - 1)) as u64 & mask,
            SAddSat => {
                let max = (mask >> 1) as i64;
                let min = -max - 1;
                sign(a).saturating_add(sign(b)).clamp(min, max) as u64 & mask
            }
            UAddSat => (a.saturating_add(b)).min(mask),
            SSubSat => {
                let max = (mask >> 1) as i64;
                let min = -max - 1;
                sign(a).saturating_sub(sign(b)).clamp(min, max) as u64 & mask
            }
            USubSat => a.saturating_sub(b),
            FAdd => f_lane(lane_f(a, lanes) + lane_f(b, lanes), lanes),
            FSub => f_lane(lane_f(a, lanes) - lane_f(b, lanes), lanes),
            FMul => f_lane(lane_f(a, lanes) * lane_f(b, lanes), lanes),
            FDiv => f_lane(lane_f(a, lanes) / lane_f(b, lanes), lanes),
            FMin => {
                // Target-style min: returns the second operand on NaN.
                let (fa, fb) = (lane_f(a, lanes), lane_f(b, lanes));
                f_lane(if fa < fb { fa } else { fb }, lanes)
            }
            FMax => {
                let (fa, fb) = (lane_f(a, lanes), lane_f(b, lanes));
                f_lane(if fa > fb { fa } else { fb }, lanes)
            }
            _ => panic!("{op:?} on vector lanes"),
        };
        write_lane(&mut out, lanes, lane, result);
    }
    out
}

fn vector_unary(op: UnaryOp, lanes: u32, v: [u8; 16]) -> [u8; 16] {
    use UnaryOp::*;
    let mut out = [0u8; 16];
    for lane in 0..lanes {
        let a = read_lane(&v, lanes, lane);
        let result = match op {
            FNeg => f_lane(-lane_f(a, lanes), lanes),
            FAbs => f_lane(lane_f(a, lanes).abs(), lanes),
            FSqrt => f_lane(lane_f(a, lanes).sqrt(), lanes),
            _ => panic!("{op:?} on vector lanes"),
        };
        write_lane(&mut out, lanes, lane, result);
    }
    out
}

fn vector_compare(op: CmpOp, lanes: u32, l: [u8; 16], r: [u8; 16]) -> [u8; 16] {
    use CmpOp::*;
    let size = lane_bytes(lanes);
    let width = size * 8;
    let mask = width_mask(size);
    let sign = |v: u64| ((v << (64 - width)) as i64) >> (64 - width);
    let mut out = [0u8; 16];
    for lane in 0..lanes {
        let a = read_lane(&l, lanes, lane);
        let b = read_lane(&r, lanes, lane);
        let truth = match op {
            Eq => a == b,
            Ne => a != b,
            SLt => sign(a) < sign(b),
            SLe => sign(a) <= sign(b),
            SGt => sign(a) > sign(b),
            SGe => sign(a) >= sign(b),
            ULt => a < b,
            ULe => a <= b,
            UGt => a > b,
            UGe => a >= b,
            FOeq => lane_f(a, lanes) == lane_f(b, lanes),
            FOlt => lane_f(a, lanes) < lane_f(b, lanes),
            FOle => lane_f(a, lanes) <= lane_f(b, lanes),
            FOgt => lane_f(a, lanes) > lane_f(b, lanes),
            FOge => lane_f(a, lanes) >= lane_f(b, lanes),
            FUne => {
                let (fa, fb) = (lane_f(a, lanes), lane_f(b, lanes));
                fa != fb || fa.is_nan() || fb.is_nan()
            }
            FUno => lane_f(a, lanes).is_nan() || lane_f(b, lanes).is_nan(),
        };
        write_lane(&mut out, lanes, lane, if truth { mask } else { 0 });
    }
    out
}

fn vector_cast(op: CastOp, lanes: u32, v: [u8; 16]) -> [u8; 16] {
    use CastOp::*;
    let size = lane_bytes(lanes);
    let width = size * 8;
    let sign = |v: u64| ((v << (64 - width)) as i64) >> (64 - width);
    let mask = width_mask(size);
    let mut out = [0u8; 16];
    for lane in 0..lanes {
        let a = read_lane(&v, lanes, lane);
        let result = match op {
            SiToFp => f_lane(sign(a) as f64, lanes),
            UiToFp => f_lane(a as f64, lanes),
            FpToSi => (lane_f(a, lanes) as i64) as u64 & mask,
            FpToUi => (lane_f(a, lanes) as u64) & mask,
            _ => panic!("{op:?} as vector cast"),
        };
        write_lane(&mut out, lanes, lane, result);
    }
    out
}
