//! Exception handling lowering.
//!
//! Two backends share one contract, selected by the host's native unwinding
//! model:
//!
//! - [`ItaniumLowering`] (table-based unwinders): each `try` gets a landing
//!   pad that recovers the exception data pointer via `beginCatch`; catch
//!   arms chain type-instance comparisons off it, and the chain's end
//!   rethrows anything unhandled.
//! - [`FuncletLowering`] (funclet unwinders): each `try` gets a
//!   catch-switch; every catch arm adds a handler reached through a
//!   synthesised filter function that inspects the exception record, copies
//!   the data pointer into a frame-recoverable slot, and decides by type
//!   instance (or by the user-exception flag for `catch_all`).
//!
//! Throw and rethrow are shared: arguments are spilled to a stack array
//! with the last parameter at index 0, and `throwException` never returns.

use super::{ControlKind, FunctionEmitter};
use crate::module::{
    EXCEPTION_ARGUMENTS_OFFSET, EXCEPTION_IS_USER_OFFSET, EXCEPTION_TYPE_INSTANCE_OFFSET,
    UNTAGGED_VALUE_SIZE,
};
use crate::ssa::{
    BlockId, Callee, CastOp, CmpOp, FuncId, FunctionBuilder, InstId, InstKind, IrType, Literal,
    SlotId, SsaFunction, ValueId,
};
use crate::types::BlockType;

/// The exception code generated WebAssembly exceptions carry in the host's
/// exception record (funclet model only).
pub const SEH_WASM_EXCEPTION_CODE: u32 = 0xe057_6173;

/// Offset of the exception code within the host exception record.
const SEH_RECORD_CODE_OFFSET: u64 = 0;
/// Offset of the first exception-information word within the record, where
/// the thrower places the exception data pointer.
const SEH_RECORD_INFORMATION_OFFSET: u64 = 32;

/// Which native unwinder model exception lowering targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwindModel {
    /// Table-driven unwinding with landing pads (Itanium-style ABIs).
    Itanium,
    /// Funclet-based unwinding with filter functions (Windows SEH).
    Funclet,
}

pub(crate) fn new_lowering(model: UnwindModel) -> Box<dyn ExceptionLowering> {
    match model {
        UnwindModel::Itanium => Box::new(ItaniumLowering { catch_stack: Vec::new() }),
        UnwindModel::Funclet => Box::new(FuncletLowering { catch_stack: Vec::new() }),
    }
}

/// The capability both unwinder backends provide to the emitter.
pub trait ExceptionLowering {
    /// Prepare the unwind destination for a new `try`, returning the block
    /// that invokes inside the region unwind to.
    fn begin_try(&mut self, e: &mut FunctionEmitter) -> BlockId;

    /// Open a typed catch arm; leaves the insertion point in the handler
    /// block with the exception arguments pushed.
    fn handle_catch(&mut self, e: &mut FunctionEmitter, exception_type_index: u32);

    /// Open a catch-all arm.
    fn handle_catch_all(&mut self, e: &mut FunctionEmitter);

    /// A `try` is ending without ever entering a catch arm.
    fn end_try(&mut self, e: &mut FunctionEmitter);

    /// A catch chain is ending; terminate its unhandled path.
    fn end_catch(&mut self, e: &mut FunctionEmitter);

    /// The exception data pointer at a catch depth, for `rethrow`.
    fn exception_pointer(&self, depth: u32) -> ValueId;
}

impl FunctionEmitter<'_> {
    // -----------------------------------------------------------------------
    // Operators
    // -----------------------------------------------------------------------

    pub(crate) fn emit_try(&mut self, block_type: BlockType) {
        let ty = block_type.resolve(&self.module.types);

        let unwind_block = self.with_eh(|eh, e| eh.begin_try(e));
        self.try_stack.push(unwind_block);

        let end_block = self.builder.create_block("tryEnd");
        let end_phis = self.create_phis(end_block, &ty.results);

        let args = self.pop_multiple(ty.params.len());

        self.push_control_frame(ControlKind::Try, ty.results.clone(), end_block, end_phis.clone());
        self.push_branch_target(ty.results, end_block, end_phis);

        for arg in args {
            self.push(arg);
        }
    }

    pub(crate) fn emit_catch(&mut self, exception_type_index: u32) {
        let kind = self.control_stack.last().expect("a control frame is open").kind;
        debug_assert!(matches!(kind, ControlKind::Try | ControlKind::Catch));
        if kind == ControlKind::Try {
            // Calls inside handler arms unwind to the enclosing try, not to
            // this one.
            self.try_stack.pop();
        }

        self.branch_to_end_of_control_context();
        self.with_eh(|eh, e| eh.handle_catch(e, exception_type_index));

        let frame = self.control_stack.last_mut().expect("a control frame is open");
        frame.kind = ControlKind::Catch;
        frame.is_reachable = true;
    }

    pub(crate) fn emit_catch_all(&mut self) {
        let kind = self.control_stack.last().expect("a control frame is open").kind;
        debug_assert!(matches!(kind, ControlKind::Try | ControlKind::Catch));
        if kind == ControlKind::Try {
            self.try_stack.pop();
        }

        self.branch_to_end_of_control_context();
        self.with_eh(|eh, e| eh.handle_catch_all(e));

        let frame = self.control_stack.last_mut().expect("a control frame is open");
        frame.kind = ControlKind::Catch;
        frame.is_reachable = true;
    }

    /// Shared tail of throw and rethrow: call the runtime with the type
    /// instance, the argument array, and the user flag.
    pub(crate) fn emit_throw_call(
        &mut self,
        type_instance: ValueId,
        arguments_pointer: ValueId,
        is_user_exception: bool,
    ) {
        let is_user = self
            .builder
            .const_i32(if is_user_exception { 1 } else { 0 });
        self.emit_runtime_intrinsic("throwException", &[type_instance, arguments_pointer, is_user]);
    }

    pub(crate) fn emit_throw(&mut self, exception_type_index: u32) {
        let params = self
            .module
            .exception_type(exception_type_index)
            .expect("validated exception type index")
            .to_vec();
        let num_args = params.len() as u32;

        // Spill the arguments to a stack array, last parameter at index 0.
        let slot = self
            .builder
            .create_slot_array(IrType::I8, num_args * UNTAGGED_VALUE_SIZE as u32);
        let base = self.builder.slot_addr(slot);
        for index in 0..num_args {
            let value = self.pop();
            let offset = self
                .builder
                .const_i64((index as u64 * UNTAGGED_VALUE_SIZE) as i64);
            let pointer = self.builder.ptr_add(base, offset);
            self.builder.store(pointer, value, 8, false, false);
        }

        let type_instance = self.builder.const_i64(
            self.instance.exception_type_instances[exception_type_index as usize] as i64,
        );
        let arguments = self.builder.cast(CastOp::PtrToInt, base, IrType::I64);
        self.emit_throw_call(type_instance, arguments, true);

        self.builder.unreachable();
        self.enter_unreachable();
    }

    pub(crate) fn emit_rethrow(&mut self, catch_depth: u32) {
        let exception_pointer = self
            .eh
            .as_ref()
            .expect("exception lowering is present")
            .exception_pointer(catch_depth);

        let type_offset = self.builder.const_i64(EXCEPTION_TYPE_INSTANCE_OFFSET as i64);
        let type_pointer = self.builder.ptr_add(exception_pointer, type_offset);
        let type_instance = self.builder.load(type_pointer, IrType::I64, 8, false, false);

        let args_offset = self.builder.const_i64(EXCEPTION_ARGUMENTS_OFFSET as i64);
        let args_pointer = self.builder.ptr_add(exception_pointer, args_offset);
        let arguments = self.builder.cast(CastOp::PtrToInt, args_pointer, IrType::I64);

        self.emit_throw_call(type_instance, arguments, true);
        self.builder.unreachable();
        self.enter_unreachable();
    }

    /// Load the declared arguments out of the exception data and push them
    /// in declaration order. Storage is reversed (last parameter at index
    /// 0), so the first parameter loads from the highest slot.
    fn push_exception_arguments(&mut self, exception_pointer: ValueId, exception_type_index: u32) {
        let params = self
            .module
            .exception_type(exception_type_index)
            .expect("validated exception type index")
            .to_vec();
        let count = params.len();

        for (declaration_index, &param) in params.iter().enumerate() {
            let slot_index = (count - declaration_index - 1) as u64;
            let offset = self
                .builder
                .const_i64((EXCEPTION_ARGUMENTS_OFFSET + slot_index * UNTAGGED_VALUE_SIZE) as i64);
            let pointer = self.builder.ptr_add(exception_pointer, offset);
            let value = self
                .builder
                .load(pointer, IrType::from_value_type(param), 8, false, false);
            self.push(value);
        }
    }
}

// ---------------------------------------------------------------------------
// Table-based unwinding (Itanium-style)
// ---------------------------------------------------------------------------

struct ItaniumCatch {
    /// Where the next `catch` in this chain compares its type; initially
    /// the landing pad itself, then each arm's unhandled block.
    next_handler_block: BlockId,
    /// The exception's type instance, loaded in the landing pad.
    exception_type_value: ValueId,
    exception_pointer: ValueId,
}

pub struct ItaniumLowering {
    catch_stack: Vec<ItaniumCatch>,
}

impl ExceptionLowering for ItaniumLowering {
    fn begin_try(&mut self, e: &mut FunctionEmitter) -> BlockId {
        let landing_pad_block = e.builder.create_block("landingPad");
        let original_block = e.builder.insertion_block();

        e.builder.set_insertion_point(landing_pad_block);
        let pad = e
            .builder
            .landing_pad(vec![e.context.user_exception_type_info]);

        // beginCatch hands back the exception data from the personality
        // routine; a direct call, since the landing pad itself cannot
        // unwind.
        let pad_i64 = e.builder.cast(CastOp::PtrToInt, pad, IrType::I64);
        let data_i64 = e.builder.call(
            Callee::Intrinsic("beginCatch"),
            vec![pad_i64],
            vec![IrType::I64],
            None,
        )[0];
        let exception_pointer = e.builder.cast(CastOp::IntToPtr, data_i64, IrType::Ptr);

        let type_offset = e.builder.const_i64(EXCEPTION_TYPE_INSTANCE_OFFSET as i64);
        let type_pointer = e.builder.ptr_add(exception_pointer, type_offset);
        let exception_type_value = e.builder.load(type_pointer, IrType::I64, 8, false, false);

        e.builder.set_insertion_point(original_block);

        self.catch_stack.push(ItaniumCatch {
            next_handler_block: landing_pad_block,
            exception_type_value,
            exception_pointer,
        });
        landing_pad_block
    }

    fn handle_catch(&mut self, e: &mut FunctionEmitter, exception_type_index: u32) {
        let top = self.catch_stack.last_mut().expect("inside a try");
        e.builder.set_insertion_point(top.next_handler_block);

        let expected = e.builder.const_i64(
            e.instance.exception_type_instances[exception_type_index as usize] as i64,
        );
        let is_expected_type = e
            .builder
            .compare(CmpOp::Eq, top.exception_type_value, expected);

        let catch_block = e.builder.create_block("catch");
        let unhandled_block = e.builder.create_block("unhandled");
        e.builder
            .cond_br(is_expected_type, catch_block, unhandled_block, None);
        top.next_handler_block = unhandled_block;

        e.builder.set_insertion_point(catch_block);
        let exception_pointer = top.exception_pointer;
        e.push_exception_arguments(exception_pointer, exception_type_index);
    }

    fn handle_catch_all(&mut self, e: &mut FunctionEmitter) {
        let top = self.catch_stack.last_mut().expect("inside a try");
        e.builder.set_insertion_point(top.next_handler_block);

        let is_user_offset = e.builder.const_i64(EXCEPTION_IS_USER_OFFSET as i64);
        let is_user_pointer = e.builder.ptr_add(top.exception_pointer, is_user_offset);
        let is_user = e.builder.load(is_user_pointer, IrType::I8, 1, false, false);
        let zero = e.builder.constant(Literal::I8(0));
        let is_user_exception = e.builder.compare(CmpOp::Ne, is_user, zero);

        let catch_block = e.builder.create_block("catch");
        let unhandled_block = e.builder.create_block("unhandled");
        e.builder
            .cond_br(is_user_exception, catch_block, unhandled_block, None);
        top.next_handler_block = unhandled_block;

        e.builder.set_insertion_point(catch_block);
    }

    fn end_try(&mut self, _e: &mut FunctionEmitter) {
        self.catch_stack.pop();
    }

    fn end_catch(&mut self, e: &mut FunctionEmitter) {
        // Whatever no arm matched is rethrown from the chain's end.
        let top = self.catch_stack.pop().expect("inside a catch");
        e.builder.set_insertion_point(top.next_handler_block);

        let type_offset = e.builder.const_i64(EXCEPTION_TYPE_INSTANCE_OFFSET as i64);
        let type_pointer = e.builder.ptr_add(top.exception_pointer, type_offset);
        let type_instance = e.builder.load(type_pointer, IrType::I64, 8, false, false);

        let args_offset = e.builder.const_i64(EXCEPTION_ARGUMENTS_OFFSET as i64);
        let args_pointer = e.builder.ptr_add(top.exception_pointer, args_offset);
        let arguments = e.builder.cast(CastOp::PtrToInt, args_pointer, IrType::I64);

        e.emit_throw_call(type_instance, arguments, false);
        e.builder.unreachable();
    }

    fn exception_pointer(&self, depth: u32) -> ValueId {
        let index = self.catch_stack.len() - depth as usize - 1;
        self.catch_stack[index].exception_pointer
    }
}

// ---------------------------------------------------------------------------
// Funclet-based unwinding (SEH-style)
// ---------------------------------------------------------------------------

struct FuncletCatch {
    catch_switch: InstId,
    /// Set once a catch arm has loaded the recovered data pointer.
    exception_pointer: Option<ValueId>,
}

pub struct FuncletLowering {
    catch_stack: Vec<FuncletCatch>,
}

impl FuncletLowering {
    /// Open a handler arm: synthesise the filter, wire a catch-pad block
    /// into the catch-switch, and land in a normal block with the exception
    /// pointer loaded.
    fn open_handler(
        &mut self,
        e: &mut FunctionEmitter,
        catch_type_instance: Option<u64>,
    ) -> ValueId {
        // A fresh frame-recoverable slot per arm; the filter writes the
        // exception data pointer into it.
        let escape_index = e.builder.slots().iter().filter(|s| s.escaped).count() as u32;
        let data_slot = e.builder.create_slot(IrType::I64);
        e.builder.mark_slot_escaped(data_slot);

        let filter = build_seh_filter(e, catch_type_instance, escape_index);

        let top = self.catch_stack.last_mut().expect("inside a try");
        let catch_pad_block = e.builder.create_block("catchPad");
        e.builder
            .add_catch_switch_handler(top.catch_switch, catch_pad_block);

        e.builder.set_insertion_point(catch_pad_block);
        let pad = e.builder.catch_pad(top.catch_switch, filter);

        let catch_block = e.builder.create_block("catch");
        e.builder.catch_ret(pad, catch_block);
        e.builder.set_insertion_point(catch_block);

        let slot_addr = e.builder.slot_addr(data_slot);
        let data_i64 = e.builder.load(slot_addr, IrType::I64, 8, false, false);
        let exception_pointer = e.builder.cast(CastOp::IntToPtr, data_i64, IrType::Ptr);
        top.exception_pointer = Some(exception_pointer);
        exception_pointer
    }
}

impl ExceptionLowering for FuncletLowering {
    fn begin_try(&mut self, e: &mut FunctionEmitter) -> BlockId {
        let catch_switch_block = e.builder.create_block("catchSwitch");
        let original_block = e.builder.insertion_block();

        e.builder.set_insertion_point(catch_switch_block);
        let catch_switch = e.builder.catch_switch();
        e.builder.set_insertion_point(original_block);

        self.catch_stack.push(FuncletCatch {
            catch_switch,
            exception_pointer: None,
        });
        catch_switch_block
    }

    fn handle_catch(&mut self, e: &mut FunctionEmitter, exception_type_index: u32) {
        let type_instance =
            e.instance.exception_type_instances[exception_type_index as usize];
        let exception_pointer = self.open_handler(e, Some(type_instance));
        e.push_exception_arguments(exception_pointer, exception_type_index);
    }

    fn handle_catch_all(&mut self, e: &mut FunctionEmitter) {
        self.open_handler(e, None);
    }

    fn end_try(&mut self, _e: &mut FunctionEmitter) {
        self.catch_stack.pop();
    }

    fn end_catch(&mut self, _e: &mut FunctionEmitter) {
        // The catch-switch continues the unwind when no filter accepts;
        // nothing to terminate here.
        self.catch_stack.pop();
    }

    fn exception_pointer(&self, depth: u32) -> ValueId {
        let index = self.catch_stack.len() - depth as usize - 1;
        self.catch_stack[index]
            .exception_pointer
            .expect("rethrow inside an entered catch arm")
    }
}

/// Synthesise an unwinder filter function.
///
/// The filter receives the host's exception-pointers structure and the
/// catching frame pointer. It checks the exception code, copies the
/// exception data pointer into the frame's escaped slot, and returns 1 to
/// handle or 0 to keep unwinding.
fn build_seh_filter(
    e: &mut FunctionEmitter,
    catch_type_instance: Option<u64>,
    escape_index: u32,
) -> FuncId {
    let filter_index = e.next_filter_id + e.filter_functions.len() as u32;
    let mut fb = FunctionBuilder::new(
        &format!("sehFilter{filter_index}"),
        vec![IrType::Ptr, IrType::Ptr],
        vec![IrType::I32],
    );

    let entry = fb.create_block("entry");
    fb.set_entry(entry);
    fb.set_insertion_point(entry);

    let exception_pointers = fb.argument(0);
    let frame_pointer = fb.argument(1);

    // The first field of the exception-pointers structure is the record.
    let record_offset = fb.const_i64(0);
    let record_pointer_addr = fb.ptr_add(exception_pointers, record_offset);
    let record_pointer = fb.load(record_pointer_addr, IrType::Ptr, 8, false, false);

    let code_offset = fb.const_i64(SEH_RECORD_CODE_OFFSET as i64);
    let code_pointer = fb.ptr_add(record_pointer, code_offset);
    let code = fb.load(code_pointer, IrType::I32, 4, false, false);

    let expected_code = fb.constant(Literal::I32(SEH_WASM_EXCEPTION_CODE as i32));
    let is_wasm_exception = fb.compare(CmpOp::Eq, code, expected_code);

    let type_check_block = fb.create_block("exceptionTypeCheck");
    let non_wasm_block = fb.create_block("nonWebAssemblyException");
    fb.cond_br(is_wasm_exception, type_check_block, non_wasm_block, None);

    fb.set_insertion_point(non_wasm_block);
    let zero = fb.const_i32(0);
    fb.ret(vec![zero]);

    fb.set_insertion_point(type_check_block);
    let information_offset = fb.const_i64(SEH_RECORD_INFORMATION_OFFSET as i64);
    let data_pointer_addr = fb.ptr_add(record_pointer, information_offset);
    let data_i64 = fb.load(data_pointer_addr, IrType::I64, 8, false, false);

    // Make the exception data visible to the catching frame.
    let recovered = fb.local_recover(escape_index, frame_pointer);
    fb.store(recovered, data_i64, 8, false, false);

    let exception_pointer = fb.cast(CastOp::IntToPtr, data_i64, IrType::Ptr);
    let verdict = match catch_type_instance {
        Some(type_instance) => {
            let type_offset = fb.const_i64(EXCEPTION_TYPE_INSTANCE_OFFSET as i64);
            let type_pointer = fb.ptr_add(exception_pointer, type_offset);
            let loaded = fb.load(type_pointer, IrType::I64, 8, false, false);
            let expected = fb.const_i64(type_instance as i64);
            let matches = fb.compare(CmpOp::Eq, loaded, expected);
            fb.cast(CastOp::Zext, matches, IrType::I32)
        }
        None => {
            let is_user_offset = fb.const_i64(EXCEPTION_IS_USER_OFFSET as i64);
            let is_user_pointer = fb.ptr_add(exception_pointer, is_user_offset);
            let is_user = fb.load(is_user_pointer, IrType::I8, 1, false, false);
            fb.cast(CastOp::Zext, is_user, IrType::I32)
        }
    };
    fb.ret(vec![verdict]);

    e.filter_functions.push(fb.finish());
    FuncId(filter_index)
}

/// Splice a local-escape declaration at the head of the entry block of a
/// finished function, after its φ-nodes.
pub(crate) fn insert_local_escape(function: &mut SsaFunction, entry: BlockId, slots: Vec<SlotId>) {
    let inst_id = InstId(function.insts.len() as u32);
    function.insts.push(crate::ssa::Inst {
        kind: InstKind::LocalEscape { slots },
        results: Vec::new(),
    });
    let block = &mut function.blocks[entry.0 as usize];
    let position = block.phi_count;
    block.insts.insert(position, inst_id);
}
