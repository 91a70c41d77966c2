//! Direct and indirect call lowering.
//!
//! The generated calling convention passes the runtime context pointer as
//! the first argument, ahead of the WebAssembly parameters. Calls inside a
//! `try` become invokes targeting the innermost unwind block.

use super::{EmitError, FunctionEmitter};
use crate::module::{TABLE_ELEMENT_CODE_OFFSET, TABLE_ELEMENT_SIZE};
use crate::ssa::{BinaryOp, Callee, CastOp, CmpOp, FuncId, IrType, Literal};
use crate::types::FunctionType;

impl FunctionEmitter<'_> {
    fn ir_results(ty: &FunctionType) -> Vec<IrType> {
        ty.results.iter().map(|&t| IrType::from_value_type(t)).collect()
    }

    pub(crate) fn emit_call(&mut self, function_index: u32) -> Result<(), EmitError> {
        let callee_type = self
            .module
            .function_type(function_index)
            .ok_or(EmitError::UnknownFunction(function_index))?
            .clone();

        // Imports resolve to native entry addresses from the instance;
        // definitions resolve to functions of this emitted module.
        let imported_count = self.module.imported_function_count();
        let callee = if function_index < imported_count {
            Callee::Address(self.instance.imported_function_addresses[function_index as usize])
        } else {
            Callee::Function(FuncId(function_index - imported_count))
        };

        let mut args = self.pop_multiple(callee_type.params.len());
        let context = self.load_context();
        args.insert(0, context);

        let unwind = self.innermost_unwind_block();
        let results = self
            .builder
            .call(callee, args, Self::ir_results(&callee_type), unwind);

        for result in results {
            self.push(result);
        }
        Ok(())
    }

    pub(crate) fn emit_call_indirect(&mut self, type_index: u32) {
        debug_assert!((type_index as usize) < self.module.types.len());
        let callee_type = self.module.types[type_index as usize].clone();

        let table_element_index = self.pop();
        let args = self.pop_multiple(callee_type.params.len());

        // Index into the table of `{ type_tag, code }` pairs.
        let index64 = self
            .builder
            .cast(CastOp::Zext, table_element_index, IrType::I64);
        let element_size = self.builder.const_i64(TABLE_ELEMENT_SIZE as i64);
        let element_offset = self.builder.binary(BinaryOp::Mul, index64, element_size);

        let table_base_addr = self.builder.slot_addr(self.table_base_slot);
        let table_base = self
            .builder
            .load(table_base_addr, IrType::Ptr, 8, false, false);
        let element_pointer = self.builder.ptr_add(table_base, element_offset);

        // The type tag is compared by identity against this module's
        // canonical tag for the expected signature.
        let loaded_tag = self
            .builder
            .load(element_pointer, IrType::I64, 8, false, false);
        let expected_tag = self
            .builder
            .constant(Literal::I64(self.instance.type_tags[type_index as usize] as i64));
        let tag_mismatch = self.builder.compare(CmpOp::Ne, expected_tag, loaded_tag);
        self.emit_conditional_trap_intrinsic(
            tag_mismatch,
            "indirectCallSignatureMismatch",
            &[table_element_index, expected_tag],
        );

        let code_offset = self.builder.const_i64(TABLE_ELEMENT_CODE_OFFSET as i64);
        let code_pointer_addr = self.builder.ptr_add(element_pointer, code_offset);
        let code_pointer = self
            .builder
            .load(code_pointer_addr, IrType::Ptr, 8, false, false);

        let mut call_args = args;
        let context = self.load_context();
        call_args.insert(0, context);

        let unwind = self.innermost_unwind_block();
        let results = self.builder.call(
            Callee::Value(code_pointer),
            call_args,
            Self::ir_results(&callee_type),
            unwind,
        );

        for result in results {
            self.push(result);
        }
    }
}
