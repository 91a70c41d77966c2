//! The per-function SSA emitter.
//!
//! [`FunctionEmitter`] walks a validated function body operator by operator,
//! maintaining a symbolic operand stack that mirrors the validator's
//! abstract stack, a control stack of open structured blocks, and a parallel
//! branch-target stack. Each operator lowers to SSA instructions appended at
//! the builder's insertion point; structured control flow becomes basic
//! blocks joined by φ-nodes.
//!
//! The joint invariant the whole module hangs on: between operators, the
//! operand stack holds exactly the values the validator says are live, the
//! emitter never pops below the innermost frame's entry depth, and the top
//! entries of the branch-target stack correspond one-to-one with the open
//! control frames.

pub mod calls;
pub mod control;
pub mod exceptions;
pub mod memory;
pub mod numeric;
pub mod simd;
pub mod vars;

pub use self::exceptions::UnwindModel;

use crate::decode::{DecodeError, Operator, OperatorStream};
use crate::intrinsics;
use crate::module::{FunctionDef, Module, ModuleInstance};
use crate::ssa::{
    BlockId, Callee, CmpOp, FunctionBuilder, IrType, Literal, SlotId, SsaFunction, SsaModule,
    ValueId,
};
use crate::types::{FunctionType, ValueType};
use self::exceptions::ExceptionLowering;
use std::fmt::Write as _;
use thiserror::Error;

/// Errors surfaced by emission. Runtime conditions are never errors here;
/// they become in-IR trap calls.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("function index {0} out of range")]
    UnknownFunction(u32),
}

/// Explicit configuration for emission; there is no ambient state.
#[derive(Debug, Clone)]
pub struct EmissionContext {
    /// Which native unwinder model exception lowering targets.
    pub unwind_model: UnwindModel,
    /// Trace every operator with control/operand stack summaries.
    pub trace_operators: bool,
    /// Address of the host's user-exception type info, for landing pad
    /// clause lists.
    pub user_exception_type_info: u64,
}

impl Default for EmissionContext {
    fn default() -> Self {
        EmissionContext {
            unwind_model: UnwindModel::Itanium,
            trace_operators: false,
            user_exception_type_info: 0x5000_0000,
        }
    }
}

/// Emit SSA for every function in a module.
///
/// The returned module holds one function per definition, in definition
/// order, followed by any unwind filter functions the funclet lowering
/// synthesised.
pub fn emit_module(
    module: &Module,
    instance: &ModuleInstance,
    context: &EmissionContext,
) -> Result<SsaModule, EmitError> {
    let mut output = SsaModule::default();
    let mut filters: Vec<SsaFunction> = Vec::new();
    let def_count = module.function_defs.len() as u32;

    for (def_index, _) in module.function_defs.iter().enumerate() {
        let next_filter_id = def_count + filters.len() as u32;
        let (function, new_filters) =
            emit_function_def(module, instance, def_index as u32, context, next_filter_id)?;
        output.add(function);
        filters.extend(new_filters);
    }

    for filter in filters {
        output.add(filter);
    }

    log::debug!(
        "emitted {} function(s) from module with {} type(s)",
        output.functions.len(),
        module.types.len()
    );
    Ok(output)
}

/// Emit SSA for a single function definition.
///
/// Returns the function plus any filter functions it required. Function ids
/// inside the emitted code refer to definition indices; filter ids start at
/// `next_filter_id`.
pub fn emit_function_def(
    module: &Module,
    instance: &ModuleInstance,
    def_index: u32,
    context: &EmissionContext,
    next_filter_id: u32,
) -> Result<(SsaFunction, Vec<SsaFunction>), EmitError> {
    let def = module
        .function_defs
        .get(def_index as usize)
        .ok_or(EmitError::UnknownFunction(def_index))?;
    let func_type = module.types[def.type_index as usize].clone();

    let emitter = FunctionEmitter::new(
        module,
        instance,
        def,
        func_type,
        context,
        &format!("wasm_function{def_index}"),
        next_filter_id,
    );
    emitter.emit()
}

/// The kind of an open control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Function,
    Block,
    IfThen,
    IfElse,
    Loop,
    Try,
    Catch,
}

/// One open structured control construct.
#[derive(Debug, Clone)]
pub struct ControlFrame {
    pub kind: ControlKind,
    pub result_types: Vec<ValueType>,
    /// The block control falls to on normal exit.
    pub end_block: BlockId,
    /// One φ per result, collecting every branch and fallthrough value.
    pub end_phis: Vec<ValueId>,
    /// For `IfThen` only: the pending else arm and the captured parameters
    /// to restore when it is entered.
    pub else_block: Option<BlockId>,
    pub else_args: Vec<ValueId>,
    /// Operand stack depth at frame entry; restored on `end`.
    pub outer_stack_depth: usize,
    /// Branch-target stack depth at frame entry.
    pub outer_branch_target_depth: usize,
    /// Cleared by unconditional control flow; restored by `else`/`catch`.
    pub is_reachable: bool,
}

/// A destination nameable by the `br` family.
#[derive(Debug, Clone)]
pub struct BranchTarget {
    pub params: Vec<ValueType>,
    pub block: BlockId,
    pub phis: Vec<ValueId>,
}

/// State for emitting one function. Created empty, driven across the body
/// in a single pass, and discarded after the terminator.
pub struct FunctionEmitter<'a> {
    pub(crate) module: &'a Module,
    pub(crate) instance: &'a ModuleInstance,
    pub(crate) def: &'a FunctionDef,
    pub(crate) func_type: FunctionType,
    pub(crate) context: &'a EmissionContext,

    pub(crate) builder: FunctionBuilder,
    pub(crate) stack: Vec<ValueId>,
    pub(crate) control_stack: Vec<ControlFrame>,
    pub(crate) branch_target_stack: Vec<BranchTarget>,

    /// One stack slot per parameter and local.
    pub(crate) local_slots: Vec<SlotId>,
    pub(crate) context_slot: SlotId,
    pub(crate) memory_base_slot: SlotId,
    pub(crate) table_base_slot: SlotId,

    /// Innermost unwind destinations for calls inside `try`.
    pub(crate) try_stack: Vec<BlockId>,
    /// Exception lowering backend; taken out of the option while its
    /// methods run so they can borrow the emitter.
    pub(crate) eh: Option<Box<dyn ExceptionLowering>>,
    /// Filter functions synthesised by the funclet backend.
    pub(crate) filter_functions: Vec<SsaFunction>,
    pub(crate) next_filter_id: u32,

    /// Structure depth while skipping operators in unreachable code.
    unreachable_depth: u32,
}

impl<'a> FunctionEmitter<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        module: &'a Module,
        instance: &'a ModuleInstance,
        def: &'a FunctionDef,
        func_type: FunctionType,
        context: &'a EmissionContext,
        name: &str,
        next_filter_id: u32,
    ) -> Self {
        let mut param_types = vec![IrType::Ptr];
        param_types.extend(func_type.params.iter().map(|&t| IrType::from_value_type(t)));
        let result_types = func_type
            .results
            .iter()
            .map(|&t| IrType::from_value_type(t))
            .collect();

        let mut builder = FunctionBuilder::new(name, param_types, result_types);
        let context_slot = builder.create_slot(IrType::Ptr);
        let memory_base_slot = builder.create_slot(IrType::Ptr);
        let table_base_slot = builder.create_slot(IrType::Ptr);

        FunctionEmitter {
            module,
            instance,
            def,
            func_type,
            context,
            builder,
            stack: Vec::new(),
            control_stack: Vec::new(),
            branch_target_stack: Vec::new(),
            local_slots: Vec::new(),
            context_slot,
            memory_base_slot,
            table_base_slot,
            try_stack: Vec::new(),
            eh: Some(exceptions::new_lowering(context.unwind_model)),
            filter_functions: Vec::new(),
            next_filter_id,
            unreachable_depth: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Operand stack
    // -----------------------------------------------------------------------

    pub(crate) fn push(&mut self, value: ValueId) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> ValueId {
        debug_assert!(
            self.stack.len()
                > self
                    .control_stack
                    .last()
                    .map_or(0, |frame| frame.outer_stack_depth),
            "operand stack underflows the innermost control frame"
        );
        self.stack.pop().expect("operand stack is not empty")
    }

    /// Pop `count` values, returned in stack order (deepest first).
    pub(crate) fn pop_multiple(&mut self, count: usize) -> Vec<ValueId> {
        debug_assert!(
            self.stack.len()
                >= self
                    .control_stack
                    .last()
                    .map_or(0, |frame| frame.outer_stack_depth)
                    + count
        );
        self.stack.split_off(self.stack.len() - count)
    }

    /// Read a value `offset` entries below the top without popping.
    pub(crate) fn peek(&self, offset: usize) -> ValueId {
        self.stack[self.stack.len() - offset - 1]
    }

    // -----------------------------------------------------------------------
    // Common helpers
    // -----------------------------------------------------------------------

    /// Create one φ per type at the head of a block.
    pub(crate) fn create_phis(&mut self, block: BlockId, types: &[ValueType]) -> Vec<ValueId> {
        types
            .iter()
            .map(|&t| self.builder.phi(block, IrType::from_value_type(t)))
            .collect()
    }

    /// An i32 is true iff non-zero.
    pub(crate) fn coerce_i32_to_bool(&mut self, value: ValueId) -> ValueId {
        let zero = self.builder.const_i32(0);
        self.builder.compare(CmpOp::Ne, value, zero)
    }

    pub(crate) fn coerce_bool_to_i32(&mut self, value: ValueId) -> ValueId {
        self.builder
            .cast(crate::ssa::CastOp::Zext, value, IrType::I32)
    }

    /// The loaded context pointer.
    pub(crate) fn load_context(&mut self) -> ValueId {
        let addr = self.builder.slot_addr(self.context_slot);
        self.builder.load(addr, IrType::Ptr, 8, false, false)
    }

    /// Re-derive the memory and table base pointers from the context.
    pub(crate) fn reload_memory_and_table_base(&mut self) {
        let context = self.load_context();

        let offset = self
            .builder
            .const_i64(crate::module::CONTEXT_MEMORY_BASE_OFFSET as i64);
        let ptr = self.builder.ptr_add(context, offset);
        let memory_base = self.builder.load(ptr, IrType::Ptr, 8, false, false);
        let slot = self.builder.slot_addr(self.memory_base_slot);
        self.builder.store(slot, memory_base, 8, false, false);

        let offset = self
            .builder
            .const_i64(crate::module::CONTEXT_TABLE_BASE_OFFSET as i64);
        let ptr = self.builder.ptr_add(context, offset);
        let table_base = self.builder.load(ptr, IrType::Ptr, 8, false, false);
        let slot = self.builder.slot_addr(self.table_base_slot);
        self.builder.store(slot, table_base, 8, false, false);
    }

    /// The unwind destination for calls, when inside a `try`.
    pub(crate) fn innermost_unwind_block(&self) -> Option<BlockId> {
        self.try_stack.last().copied()
    }

    /// Emit a call to a named runtime intrinsic, checking its signature
    /// against the registry.
    pub(crate) fn emit_runtime_intrinsic(
        &mut self,
        name: &str,
        args: &[ValueId],
    ) -> Vec<ValueId> {
        let intrinsic = intrinsics::expect(name);
        debug_assert_eq!(intrinsic.ty.params.len(), args.len(), "{name} arity");
        for (arg, &param) in args.iter().zip(&intrinsic.ty.params) {
            debug_assert_eq!(
                self.builder.value_type(*arg),
                IrType::from_value_type(param),
                "{name} argument type"
            );
        }

        let result_types = intrinsic
            .ty
            .results
            .iter()
            .map(|&t| IrType::from_value_type(t))
            .collect();
        let unwind = self.innermost_unwind_block();
        self.builder
            .call(Callee::Intrinsic(intrinsic.name), args.to_vec(), result_types, unwind)
    }

    /// Emit a conditional call to a non-returning trap intrinsic: branch on
    /// the condition to a trap block (marked unlikely), continue in a skip
    /// block.
    pub(crate) fn emit_conditional_trap_intrinsic(
        &mut self,
        condition: ValueId,
        name: &str,
        args: &[ValueId],
    ) {
        let trap_block = self.builder.create_block(&format!("{name}Trap"));
        let skip_block = self.builder.create_block(&format!("{name}Skip"));

        self.builder
            .cond_br(condition, trap_block, skip_block, Some(false));

        self.builder.set_insertion_point(trap_block);
        self.emit_runtime_intrinsic(name, args);
        self.builder.unreachable();

        self.builder.set_insertion_point(skip_block);
    }

    /// Run a closure with the exception lowering temporarily taken out, so
    /// it can borrow the emitter mutably.
    pub(crate) fn with_eh<R>(
        &mut self,
        f: impl FnOnce(&mut Box<dyn ExceptionLowering>, &mut Self) -> R,
    ) -> R {
        let mut eh = self.eh.take().expect("exception lowering is present");
        let result = f(&mut eh, self);
        self.eh = Some(eh);
        result
    }

    // -----------------------------------------------------------------------
    // Prologue, drive loop, epilogue
    // -----------------------------------------------------------------------

    fn emit(mut self) -> Result<(SsaFunction, Vec<SsaFunction>), EmitError> {
        // Create the return block and the root control context.
        let return_block = self.builder.create_block("return");
        let results = self.func_type.results.clone();
        let return_phis = self.create_phis(return_block, &results);
        self.push_control_frame(ControlKind::Function, results.clone(), return_block, return_phis.clone());
        self.push_branch_target(results, return_block, return_phis);

        // Entry block: context/memory/table plumbing, then one stack slot
        // per parameter and local.
        let entry_block = self.builder.create_block("entry");
        self.builder.set_entry(entry_block);
        self.builder.set_insertion_point(entry_block);

        let context_arg = self.builder.argument(0);
        let context_addr = self.builder.slot_addr(self.context_slot);
        self.builder.store(context_addr, context_arg, 8, false, false);
        self.reload_memory_and_table_base();

        let params = self.func_type.params.clone();
        for (index, &param_type) in params.iter().enumerate() {
            let slot = self.builder.create_slot(IrType::from_value_type(param_type));
            self.local_slots.push(slot);
            let incoming = self.builder.argument(index as u32 + 1);
            let addr = self.builder.slot_addr(slot);
            self.builder
                .store(addr, incoming, param_type.byte_width() as u32, false, false);
        }
        let locals = self.def.non_parameter_locals.clone();
        for local_type in locals {
            let slot = self.builder.create_slot(IrType::from_value_type(local_type));
            self.local_slots.push(slot);
            let zero = self.builder.constant(Literal::zero_of(local_type));
            let addr = self.builder.slot_addr(slot);
            self.builder
                .store(addr, zero, local_type.byte_width() as u32, false, false);
        }

        // Decode the body and emit each operator.
        let code = self.def.code.clone();
        let mut stream = OperatorStream::new(&code);
        while stream.has_more() && !self.control_stack.is_empty() {
            if self.context.trace_operators {
                if let Ok(op) = stream.peek() {
                    self.log_operator(&op);
                }
            }

            let op = stream.next()?;
            if self.control_stack.last().unwrap().is_reachable {
                debug_assert_eq!(self.unreachable_depth, 0);
                self.emit_operator(op)?;
            } else {
                self.emit_unreachable_operator(op)?;
            }
        }
        debug_assert_eq!(self.builder.insertion_block(), return_block);

        // The root `end` pushed the merged results; return them.
        let result_count = self.func_type.results.len();
        let results = self.pop_multiple(result_count);
        self.builder.ret(results);

        // Declare filter-visible slots to the unwinder.
        let escaped: Vec<SlotId> = self
            .builder
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, info)| info.escaped)
            .map(|(index, _)| SlotId(index as u32))
            .collect();
        let mut function = self.builder.finish();
        if !escaped.is_empty() {
            // The escape declaration belongs at the top of the entry block.
            exceptions::insert_local_escape(&mut function, entry_block, escaped);
        }

        Ok((function, self.filter_functions))
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Consume operators inside unreachable code, tracking only structure
    /// depth. `else`, `end`, `catch`, and `catch_all` at depth zero belong
    /// to the outermost unreachable frame and are forwarded to the live
    /// handlers; this is how structured control recovers reachability.
    fn emit_unreachable_operator(&mut self, op: Operator) -> Result<(), EmitError> {
        use Operator::*;
        match op {
            Block { .. } | Loop { .. } | If { .. } | Try { .. } => {
                self.unreachable_depth += 1;
            }
            Else => {
                if self.unreachable_depth == 0 {
                    self.emit_operator(Else)?;
                }
            }
            End => {
                if self.unreachable_depth == 0 {
                    self.emit_operator(End)?;
                } else {
                    self.unreachable_depth -= 1;
                }
            }
            Catch { exception_type_index } => {
                if self.unreachable_depth == 0 {
                    self.emit_operator(Catch { exception_type_index })?;
                }
            }
            CatchAll => {
                if self.unreachable_depth == 0 {
                    self.emit_operator(CatchAll)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn emit_operator(&mut self, op: Operator) -> Result<(), EmitError> {
        use crate::ssa::BinaryOp as B;
        use crate::types::ValueType::{F32, F64, I32, I64};
        use Operator::*;

        match op {
            Nop => {}
            Unreachable => self.emit_unreachable_trap(),

            Block { block_type } => self.emit_block(block_type),
            Loop { block_type } => self.emit_loop(block_type),
            If { block_type } => self.emit_if(block_type),
            Else => self.emit_else(),
            End => self.emit_end(),
            Br { depth } => self.emit_br(depth),
            BrIf { depth } => self.emit_br_if(depth),
            BrTable { targets, default } => self.emit_br_table(&targets, default),
            Return => self.emit_return(),
            Drop => {
                self.stack.pop();
            }
            Select => self.emit_select(),

            Try { block_type } => self.emit_try(block_type),
            Catch { exception_type_index } => self.emit_catch(exception_type_index),
            CatchAll => self.emit_catch_all(),
            Throw { exception_type_index } => self.emit_throw(exception_type_index),
            Rethrow { catch_depth } => self.emit_rethrow(catch_depth),

            Call { function_index } => self.emit_call(function_index)?,
            CallIndirect { type_index } => self.emit_call_indirect(type_index),

            LocalGet { local_index } => self.emit_local_get(local_index),
            LocalSet { local_index } => self.emit_local_set(local_index),
            LocalTee { local_index } => self.emit_local_tee(local_index),
            GlobalGet { global_index } => self.emit_global_get(global_index),
            GlobalSet { global_index } => self.emit_global_set(global_index),

            MemorySize => self.emit_memory_size(),
            MemoryGrow => self.emit_memory_grow(),

            I32Load { memarg } => self.emit_load(I32, IrType::I32, memory::Ext::None, memarg),
            I64Load { memarg } => self.emit_load(I64, IrType::I64, memory::Ext::None, memarg),
            F32Load { memarg } => self.emit_load(F32, IrType::F32, memory::Ext::None, memarg),
            F64Load { memarg } => self.emit_load(F64, IrType::F64, memory::Ext::None, memarg),
            I32Load8S { memarg } => self.emit_load(I32, IrType::I8, memory::Ext::Sign, memarg),
            I32Load8U { memarg } => self.emit_load(I32, IrType::I8, memory::Ext::Zero, memarg),
            I32Load16S { memarg } => self.emit_load(I32, IrType::I16, memory::Ext::Sign, memarg),
            I32Load16U { memarg } => self.emit_load(I32, IrType::I16, memory::Ext::Zero, memarg),
            I64Load8S { memarg } => self.emit_load(I64, IrType::I8, memory::Ext::Sign, memarg),
            I64Load8U { memarg } => self.emit_load(I64, IrType::I8, memory::Ext::Zero, memarg),
            I64Load16S { memarg } => self.emit_load(I64, IrType::I16, memory::Ext::Sign, memarg),
            I64Load16U { memarg } => self.emit_load(I64, IrType::I16, memory::Ext::Zero, memarg),
            I64Load32S { memarg } => self.emit_load(I64, IrType::I32, memory::Ext::Sign, memarg),
            I64Load32U { memarg } => self.emit_load(I64, IrType::I32, memory::Ext::Zero, memarg),
            I32Store { memarg } => self.emit_store(IrType::I32, memarg),
            I64Store { memarg } => self.emit_store(IrType::I64, memarg),
            F32Store { memarg } => self.emit_store(IrType::F32, memarg),
            F64Store { memarg } => self.emit_store(IrType::F64, memarg),
            I32Store8 { memarg } | I64Store8 { memarg } => self.emit_store(IrType::I8, memarg),
            I32Store16 { memarg } | I64Store16 { memarg } => self.emit_store(IrType::I16, memarg),
            I64Store32 { memarg } => self.emit_store(IrType::I32, memarg),

            I32Const { value } => {
                let v = self.builder.const_i32(value);
                self.push(v);
            }
            I64Const { value } => {
                let v = self.builder.const_i64(value);
                self.push(v);
            }
            F32Const { value } => {
                let v = self.builder.constant(Literal::F32(value.to_bits()));
                self.push(v);
            }
            F64Const { value } => {
                let v = self.builder.constant(Literal::F64(value.to_bits()));
                self.push(v);
            }

            I32Add => self.int_binary(B::Add),
            I32Sub => self.int_binary(B::Sub),
            I32Mul => self.int_binary(B::Mul),
            I32And => self.int_binary(B::And),
            I32Or => self.int_binary(B::Or),
            I32Xor => self.int_binary(B::Xor),
            I64Add => self.int_binary(B::Add),
            I64Sub => self.int_binary(B::Sub),
            I64Mul => self.int_binary(B::Mul),
            I64And => self.int_binary(B::And),
            I64Or => self.int_binary(B::Or),
            I64Xor => self.int_binary(B::Xor),

            I32DivS => self.emit_div_s(I32),
            I64DivS => self.emit_div_s(I64),
            I32DivU => self.emit_div_u(I32, B::UDiv),
            I64DivU => self.emit_div_u(I64, B::UDiv),
            I32RemU => self.emit_div_u(I32, B::URem),
            I64RemU => self.emit_div_u(I64, B::URem),
            I32RemS => self.emit_rem_s(I32),
            I64RemS => self.emit_rem_s(I64),

            I32Shl => self.emit_shift(I32, B::Shl),
            I32ShrS => self.emit_shift(I32, B::AShr),
            I32ShrU => self.emit_shift(I32, B::LShr),
            I64Shl => self.emit_shift(I64, B::Shl),
            I64ShrS => self.emit_shift(I64, B::AShr),
            I64ShrU => self.emit_shift(I64, B::LShr),
            I32Rotl => self.emit_rotate(I32, true),
            I32Rotr => self.emit_rotate(I32, false),
            I64Rotl => self.emit_rotate(I64, true),
            I64Rotr => self.emit_rotate(I64, false),

            I32Eqz => self.emit_eqz(I32),
            I64Eqz => self.emit_eqz(I64),
            I32Eq | I64Eq => self.int_compare(CmpOp::Eq),
            I32Ne | I64Ne => self.int_compare(CmpOp::Ne),
            I32LtS | I64LtS => self.int_compare(CmpOp::SLt),
            I32LtU | I64LtU => self.int_compare(CmpOp::ULt),
            I32LeS | I64LeS => self.int_compare(CmpOp::SLe),
            I32LeU | I64LeU => self.int_compare(CmpOp::ULe),
            I32GtS | I64GtS => self.int_compare(CmpOp::SGt),
            I32GtU | I64GtU => self.int_compare(CmpOp::UGt),
            I32GeS | I64GeS => self.int_compare(CmpOp::SGe),
            I32GeU | I64GeU => self.int_compare(CmpOp::UGe),

            I32Clz | I64Clz => self.int_unary(crate::ssa::UnaryOp::Clz),
            I32Ctz | I64Ctz => self.int_unary(crate::ssa::UnaryOp::Ctz),
            I32Popcnt | I64Popcnt => self.int_unary(crate::ssa::UnaryOp::Popcnt),

            F32Add | F64Add => self.fp_binary_constrained(crate::ssa::ConstrainedOp::FAdd),
            F32Sub | F64Sub => self.fp_binary_constrained(crate::ssa::ConstrainedOp::FSub),
            F32Mul | F64Mul => self.fp_binary_constrained(crate::ssa::ConstrainedOp::FMul),
            F32Div | F64Div => self.fp_binary_constrained(crate::ssa::ConstrainedOp::FDiv),
            F32Sqrt | F64Sqrt => self.fp_sqrt(),
            F32Neg | F64Neg => self.fp_unary(crate::ssa::UnaryOp::FNeg),
            F32Abs | F64Abs => self.fp_unary(crate::ssa::UnaryOp::FAbs),
            F32Copysign | F64Copysign => self.int_binary(B::Copysign),

            F32Eq | F64Eq => self.fp_compare(CmpOp::FOeq),
            F32Ne | F64Ne => self.fp_compare(CmpOp::FUne),
            F32Lt | F64Lt => self.fp_compare(CmpOp::FOlt),
            F32Le | F64Le => self.fp_compare(CmpOp::FOle),
            F32Gt | F64Gt => self.fp_compare(CmpOp::FOgt),
            F32Ge | F64Ge => self.fp_compare(CmpOp::FOge),

            F32Min => self.fp_intrinsic_binary("f32.min"),
            F32Max => self.fp_intrinsic_binary("f32.max"),
            F64Min => self.fp_intrinsic_binary("f64.min"),
            F64Max => self.fp_intrinsic_binary("f64.max"),
            F32Ceil => self.fp_intrinsic_unary("f32.ceil"),
            F32Floor => self.fp_intrinsic_unary("f32.floor"),
            F32Trunc => self.fp_intrinsic_unary("f32.trunc"),
            F32Nearest => self.fp_intrinsic_unary("f32.nearest"),
            F64Ceil => self.fp_intrinsic_unary("f64.ceil"),
            F64Floor => self.fp_intrinsic_unary("f64.floor"),
            F64Trunc => self.fp_intrinsic_unary("f64.trunc"),
            F64Nearest => self.fp_intrinsic_unary("f64.nearest"),

            I32WrapI64 => self.emit_cast(crate::ssa::CastOp::Trunc, IrType::I32),
            I64ExtendI32S => self.emit_cast(crate::ssa::CastOp::Sext, IrType::I64),
            I64ExtendI32U => self.emit_cast(crate::ssa::CastOp::Zext, IrType::I64),
            F32ConvertI32S | F32ConvertI64S => self.emit_cast(crate::ssa::CastOp::SiToFp, IrType::F32),
            F32ConvertI32U | F32ConvertI64U => self.emit_cast(crate::ssa::CastOp::UiToFp, IrType::F32),
            F64ConvertI32S | F64ConvertI64S => self.emit_cast(crate::ssa::CastOp::SiToFp, IrType::F64),
            F64ConvertI32U | F64ConvertI64U => self.emit_cast(crate::ssa::CastOp::UiToFp, IrType::F64),
            F32DemoteF64 => self.emit_cast(crate::ssa::CastOp::FpTrunc, IrType::F32),
            F64PromoteF32 => self.emit_f64_promote(),
            I32ReinterpretF32 => self.emit_cast(crate::ssa::CastOp::Bitcast, IrType::I32),
            I64ReinterpretF64 => self.emit_cast(crate::ssa::CastOp::Bitcast, IrType::I64),
            F32ReinterpretI32 => self.emit_cast(crate::ssa::CastOp::Bitcast, IrType::F32),
            F64ReinterpretI64 => self.emit_cast(crate::ssa::CastOp::Bitcast, IrType::F64),

            I32Extend8S => self.emit_sign_extend(IrType::I8, IrType::I32),
            I32Extend16S => self.emit_sign_extend(IrType::I16, IrType::I32),
            I64Extend8S => self.emit_sign_extend(IrType::I8, IrType::I64),
            I64Extend16S => self.emit_sign_extend(IrType::I16, IrType::I64),
            I64Extend32S => self.emit_sign_extend(IrType::I32, IrType::I64),

            I32TruncF32S => self.emit_trunc_to_int(I32, true, numeric::Bounds::I32_S_F32),
            I32TruncF64S => self.emit_trunc_to_int(I32, true, numeric::Bounds::I32_S_F64),
            I32TruncF32U => self.emit_trunc_to_int(I32, false, numeric::Bounds::I32_U_F32),
            I32TruncF64U => self.emit_trunc_to_int(I32, false, numeric::Bounds::I32_U_F64),
            I64TruncF32S => self.emit_trunc_to_int(I64, true, numeric::Bounds::I64_S_F32),
            I64TruncF64S => self.emit_trunc_to_int(I64, true, numeric::Bounds::I64_S_F64),
            I64TruncF32U => self.emit_trunc_to_int(I64, false, numeric::Bounds::I64_U_F32),
            I64TruncF64U => self.emit_trunc_to_int(I64, false, numeric::Bounds::I64_U_F64),

            I32TruncSatF32S => self.emit_trunc_to_int_sat(I32, true, numeric::SatBounds::I32_S_F32),
            I32TruncSatF64S => self.emit_trunc_to_int_sat(I32, true, numeric::SatBounds::I32_S_F64),
            I32TruncSatF32U => self.emit_trunc_to_int_sat(I32, false, numeric::SatBounds::I32_U_F32),
            I32TruncSatF64U => self.emit_trunc_to_int_sat(I32, false, numeric::SatBounds::I32_U_F64),
            I64TruncSatF32S => self.emit_trunc_to_int_sat(I64, true, numeric::SatBounds::I64_S_F32),
            I64TruncSatF64S => self.emit_trunc_to_int_sat(I64, true, numeric::SatBounds::I64_S_F64),
            I64TruncSatF32U => self.emit_trunc_to_int_sat(I64, false, numeric::SatBounds::I64_U_F32),
            I64TruncSatF64U => self.emit_trunc_to_int_sat(I64, false, numeric::SatBounds::I64_U_F64),

            Atomic(atomic) => self.emit_atomic(atomic),
            Simd(simd) => self.emit_simd(simd),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Trace logging
    // -----------------------------------------------------------------------

    /// One trace line per operator: control stack shape, the operator, and
    /// the operand stack types.
    fn log_operator(&self, op: &Operator) {
        let mut control_string = String::new();
        for frame in &self.control_stack {
            if !frame.is_reachable {
                control_string.push('(');
            }
            control_string.push(match frame.kind {
                ControlKind::Function => 'F',
                ControlKind::Block => 'B',
                ControlKind::IfThen => 'I',
                ControlKind::IfElse => 'E',
                ControlKind::Loop => 'L',
                ControlKind::Try => 'T',
                ControlKind::Catch => 'C',
            });
            if !frame.is_reachable {
                control_string.push(')');
            }
        }

        let stack_base = self
            .control_stack
            .last()
            .map_or(0, |frame| frame.outer_stack_depth);
        let mut stack_string = String::new();
        for (index, &value) in self.stack.iter().enumerate() {
            if index == stack_base {
                stack_string.push_str("| ");
            }
            let _ = write!(stack_string, "{} ", self.builder.value_type(value));
        }
        if self.stack.len() == stack_base {
            stack_string.push('|');
        }

        log::trace!("{control_string:<20} {op:<40} {stack_string}");
    }
}
