//! Memory access lowerings: plain loads and stores, atomics, and the
//! memory management operators.
//!
//! Addresses are formed by zero-extending the 32-bit index to 64 bits —
//! never sign-extending, which would let a negative index escape the
//! sandbox — adding the zero-extended static offset, and indexing off the
//! memory base reloaded from the context. The memory is backed by a
//! guard-paged 64-bit virtual address range, so a 32-bit index plus 32-bit
//! offset always lands inside it and no explicit bounds check is emitted.

use super::FunctionEmitter;
use crate::decode::{AtomicOp, MemArg, MemWidth, RmwOp};
use crate::ssa::{AtomicRmwOp, BinaryOp, CastOp, CmpOp, IrType, Literal, ValueId};
use crate::types::ValueType;

/// How a loaded memory value widens to its stack type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ext {
    None,
    Sign,
    Zero,
}

impl FunctionEmitter<'_> {
    /// Form a typed pointer from a popped i32 byte index and the static
    /// offset.
    pub(crate) fn coerce_byte_index_to_pointer(&mut self, byte_index: ValueId, offset: u32) -> ValueId {
        // Zero-extend before any arithmetic: a sign extension here would
        // address memory outside the sandboxed range.
        let mut index = self.builder.cast(CastOp::Zext, byte_index, IrType::I64);

        if offset != 0 {
            let offset = self.builder.const_i64(offset as i64);
            index = self.builder.binary(BinaryOp::Add, index, offset);
        }

        let base_addr = self.builder.slot_addr(self.memory_base_slot);
        let base = self.builder.load(base_addr, IrType::Ptr, 8, false, false);
        self.builder.ptr_add(base, index)
    }

    pub(crate) fn emit_load(&mut self, ty: ValueType, memory_ty: IrType, ext: Ext, memarg: MemArg) {
        let byte_index = self.pop();
        let pointer = self.coerce_byte_index_to_pointer(byte_index, memarg.offset);
        let loaded = self
            .builder
            .load(pointer, memory_ty, 1 << memarg.align, true, false);
        let value = match ext {
            Ext::None => loaded,
            Ext::Sign => self
                .builder
                .cast(CastOp::Sext, loaded, IrType::from_value_type(ty)),
            Ext::Zero => self
                .builder
                .cast(CastOp::Zext, loaded, IrType::from_value_type(ty)),
        };
        self.push(value);
    }

    pub(crate) fn emit_store(&mut self, memory_ty: IrType, memarg: MemArg) {
        let value = self.pop();
        let byte_index = self.pop();
        let pointer = self.coerce_byte_index_to_pointer(byte_index, memarg.offset);
        let memory_value = if self.builder.value_type(value) == memory_ty {
            value
        } else {
            self.builder.cast(CastOp::Trunc, value, memory_ty)
        };
        self.builder
            .store(pointer, memory_value, 1 << memarg.align, true, false);
    }

    pub(crate) fn emit_memory_grow(&mut self) {
        let delta_pages = self.pop();
        let memory_id = self.builder.const_i64(self.instance.memory_id as i64);
        let previous_pages = self.emit_runtime_intrinsic("growMemory", &[delta_pages, memory_id]);
        debug_assert_eq!(previous_pages.len(), 1);
        self.push(previous_pages[0]);
    }

    pub(crate) fn emit_memory_size(&mut self) {
        let memory_id = self.builder.const_i64(self.instance.memory_id as i64);
        let current_pages = self.emit_runtime_intrinsic("currentMemory", &[memory_id]);
        debug_assert_eq!(current_pages.len(), 1);
        self.push(current_pages[0]);
    }

    // -----------------------------------------------------------------------
    // Atomics
    // -----------------------------------------------------------------------

    /// Trap when the low bits of the address are not zero for the access
    /// width. Byte accesses are always aligned.
    fn trap_if_misaligned_atomic(&mut self, address: ValueId, width: MemWidth) {
        let natural_align_log2 = width.align_log2();
        if natural_align_log2 == 0 {
            return;
        }
        let mask = self
            .builder
            .constant(Literal::I32(((1u32 << natural_align_log2) - 1) as i32));
        let low_bits = self.builder.binary(BinaryOp::And, address, mask);
        let zero = self.builder.const_i32(0);
        let misaligned = self.builder.compare(CmpOp::Ne, low_bits, zero);
        self.emit_conditional_trap_intrinsic(misaligned, "misalignedAtomicTrap", &[address]);
    }

    fn mem_ir_type(width: MemWidth) -> IrType {
        match width {
            MemWidth::W8 => IrType::I8,
            MemWidth::W16 => IrType::I16,
            MemWidth::W32 => IrType::I32,
            MemWidth::W64 => IrType::I64,
        }
    }

    /// Narrow a value to the access width, or pass it through when the
    /// width matches.
    fn narrow_to_width(&mut self, value: ValueId, memory_ty: IrType) -> ValueId {
        if self.builder.value_type(value) == memory_ty {
            value
        } else {
            self.builder.cast(CastOp::Trunc, value, memory_ty)
        }
    }

    fn widen_from_width(&mut self, value: ValueId, ty: ValueType) -> ValueId {
        let target = IrType::from_value_type(ty);
        if self.builder.value_type(value) == target {
            value
        } else {
            self.builder.cast(CastOp::Zext, value, target)
        }
    }

    pub(crate) fn emit_atomic(&mut self, op: AtomicOp) {
        match op {
            AtomicOp::Wake { memarg } => {
                let num_waiters = self.pop();
                let address = self.pop();
                let _ = memarg;
                let memory_id = self.builder.const_i64(self.instance.memory_id as i64);
                let results =
                    self.emit_runtime_intrinsic("atomic_wake", &[address, num_waiters, memory_id]);
                self.push(results[0]);
            }
            AtomicOp::I32Wait { memarg } => {
                let _ = memarg;
                let timeout = self.pop();
                let expected = self.pop();
                let address = self.pop();
                let memory_id = self.builder.const_i64(self.instance.memory_id as i64);
                let results = self
                    .emit_runtime_intrinsic("atomic_wait_i32", &[address, expected, timeout, memory_id]);
                self.push(results[0]);
            }
            AtomicOp::I64Wait { memarg } => {
                let _ = memarg;
                let timeout = self.pop();
                let expected = self.pop();
                let address = self.pop();
                let memory_id = self.builder.const_i64(self.instance.memory_id as i64);
                let results = self
                    .emit_runtime_intrinsic("atomic_wait_i64", &[address, expected, timeout, memory_id]);
                self.push(results[0]);
            }
            AtomicOp::Load { ty, width, memarg } => {
                let byte_index = self.pop();
                self.trap_if_misaligned_atomic(byte_index, width);
                let pointer = self.coerce_byte_index_to_pointer(byte_index, memarg.offset);
                let memory_ty = Self::mem_ir_type(width);
                let loaded = self
                    .builder
                    .load(pointer, memory_ty, 1 << memarg.align, true, true);
                let value = self.widen_from_width(loaded, ty);
                self.push(value);
            }
            AtomicOp::Store { ty, width, memarg } => {
                let _ = ty;
                let value = self.pop();
                let byte_index = self.pop();
                self.trap_if_misaligned_atomic(byte_index, width);
                let pointer = self.coerce_byte_index_to_pointer(byte_index, memarg.offset);
                let memory_ty = Self::mem_ir_type(width);
                let memory_value = self.narrow_to_width(value, memory_ty);
                self.builder
                    .store(pointer, memory_value, 1 << memarg.align, true, true);
            }
            AtomicOp::Rmw { ty, width, op, memarg } => {
                let value = self.pop();
                let byte_index = self.pop();
                self.trap_if_misaligned_atomic(byte_index, width);
                let pointer = self.coerce_byte_index_to_pointer(byte_index, memarg.offset);
                let memory_ty = Self::mem_ir_type(width);
                let memory_value = self.narrow_to_width(value, memory_ty);
                let rmw_op = match op {
                    RmwOp::Add => AtomicRmwOp::Add,
                    RmwOp::Sub => AtomicRmwOp::Sub,
                    RmwOp::And => AtomicRmwOp::And,
                    RmwOp::Or => AtomicRmwOp::Or,
                    RmwOp::Xor => AtomicRmwOp::Xor,
                    RmwOp::Xchg => AtomicRmwOp::Xchg,
                };
                let previous = self.builder.atomic_rmw(rmw_op, pointer, memory_value);
                let value = self.widen_from_width(previous, ty);
                self.push(value);
            }
            AtomicOp::Cmpxchg { ty, width, memarg } => {
                let replacement = self.pop();
                let expected = self.pop();
                let byte_index = self.pop();
                self.trap_if_misaligned_atomic(byte_index, width);
                let pointer = self.coerce_byte_index_to_pointer(byte_index, memarg.offset);
                let memory_ty = Self::mem_ir_type(width);
                let expected = self.narrow_to_width(expected, memory_ty);
                let replacement = self.narrow_to_width(replacement, memory_ty);
                let previous = self.builder.atomic_cmpxchg(pointer, expected, replacement);
                let value = self.widen_from_width(previous, ty);
                self.push(value);
            }
        }
    }
}
