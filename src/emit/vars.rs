//! Local and global variable access.
//!
//! Locals live in entry-block stack slots. Mutable globals live in the
//! context's global data region at a per-global offset; immutable
//! word-sized globals are inlined as constants; immutable wide globals are
//! loaded from a fixed instance address.

use super::FunctionEmitter;
use crate::module::{GlobalLayout, InitExpr, CONTEXT_GLOBAL_DATA_OFFSET};
use crate::ssa::{IrType, Literal};
use crate::types::ValueType;

impl FunctionEmitter<'_> {
    fn local_type(&self, local_index: u32) -> ValueType {
        let param_count = self.func_type.params.len();
        if (local_index as usize) < param_count {
            self.func_type.params[local_index as usize]
        } else {
            self.def.non_parameter_locals[local_index as usize - param_count]
        }
    }

    pub(crate) fn emit_local_get(&mut self, local_index: u32) {
        debug_assert!((local_index as usize) < self.local_slots.len());
        let ty = self.local_type(local_index);
        let addr = self.builder.slot_addr(self.local_slots[local_index as usize]);
        let value = self
            .builder
            .load(addr, IrType::from_value_type(ty), ty.byte_width() as u32, false, false);
        self.push(value);
    }

    pub(crate) fn emit_local_set(&mut self, local_index: u32) {
        debug_assert!((local_index as usize) < self.local_slots.len());
        let ty = self.local_type(local_index);
        let value = self.pop();
        debug_assert_eq!(self.builder.value_type(value), IrType::from_value_type(ty));
        let addr = self.builder.slot_addr(self.local_slots[local_index as usize]);
        self.builder
            .store(addr, value, ty.byte_width() as u32, false, false);
    }

    pub(crate) fn emit_local_tee(&mut self, local_index: u32) {
        debug_assert!((local_index as usize) < self.local_slots.len());
        let ty = self.local_type(local_index);
        // The value stays on the operand stack.
        let value = self.peek(0);
        let addr = self.builder.slot_addr(self.local_slots[local_index as usize]);
        self.builder
            .store(addr, value, ty.byte_width() as u32, false, false);
    }

    fn global_type(&self, global_index: u32) -> ValueType {
        let mut imported = 0u32;
        for import in &self.module.imports {
            if let crate::module::ImportKind::Global { ty, .. } = import.kind {
                if imported == global_index {
                    return ty;
                }
                imported += 1;
            }
        }
        self.module.globals[(global_index - imported) as usize].ty
    }

    fn init_literal(init: InitExpr) -> Literal {
        match init {
            InitExpr::I32(v) => Literal::I32(v),
            InitExpr::I64(v) => Literal::I64(v),
            InitExpr::F32(bits) => Literal::F32(bits),
            InitExpr::F64(bits) => Literal::F64(bits),
            InitExpr::GlobalGet(_) => {
                // Import-initialised globals are resolved to addresses or
                // data offsets at instantiation; they never reach here.
                debug_assert!(false, "unresolved global initialiser in instance layout");
                Literal::I64(0)
            }
        }
    }

    pub(crate) fn emit_global_get(&mut self, global_index: u32) {
        debug_assert!((global_index as usize) < self.instance.global_layouts.len());
        let ty = self.global_type(global_index);
        let ir_ty = IrType::from_value_type(ty);

        match self.instance.global_layouts[global_index as usize] {
            GlobalLayout::Mutable { data_offset } => {
                let context = self.load_context();
                let offset = self
                    .builder
                    .const_i64((CONTEXT_GLOBAL_DATA_OFFSET + data_offset) as i64);
                let pointer = self.builder.ptr_add(context, offset);
                let value = self
                    .builder
                    .load(pointer, ir_ty, ty.byte_width() as u32, false, false);
                self.push(value);
            }
            GlobalLayout::ImmutableValue(init) => {
                let value = self.builder.constant(Self::init_literal(init));
                self.push(value);
            }
            GlobalLayout::ImmutableAddress { address } => {
                let pointer = self.builder.constant(Literal::Ptr(address));
                let value = self
                    .builder
                    .load(pointer, ir_ty, ty.byte_width() as u32, false, false);
                self.push(value);
            }
        }
    }

    pub(crate) fn emit_global_set(&mut self, global_index: u32) {
        debug_assert!((global_index as usize) < self.instance.global_layouts.len());
        let ty = self.global_type(global_index);
        let value = self.pop();

        match self.instance.global_layouts[global_index as usize] {
            GlobalLayout::Mutable { data_offset } => {
                let context = self.load_context();
                let offset = self
                    .builder
                    .const_i64((CONTEXT_GLOBAL_DATA_OFFSET + data_offset) as i64);
                let pointer = self.builder.ptr_add(context, offset);
                self.builder
                    .store(pointer, value, ty.byte_width() as u32, false, false);
            }
            // The validator rejects assignments to immutable globals.
            GlobalLayout::ImmutableValue(_) | GlobalLayout::ImmutableAddress { .. } => {
                debug_assert!(false, "global.set on an immutable global");
            }
        }
    }
}
