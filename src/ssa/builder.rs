//! Instruction builder with an insertion point.
//!
//! The builder owns the function under construction. Instructions append at
//! the insertion point; φ-nodes insert at the head of their block no matter
//! where the insertion point is, so branch arguments can be wired into a
//! target block long after it was created.

use super::{
    AtomicRmwOp, BinaryOp, Block, BlockId, Callee, CastOp, CmpOp, ConstrainedOp, FuncId, Inst,
    InstId, InstKind, IrType, Literal, SlotId, SlotInfo, SsaFunction, UnaryOp, ValueId, ValueInfo,
};

pub struct FunctionBuilder {
    func: SsaFunction,
    /// Block each instruction lives in (parallel to `func.insts`).
    inst_blocks: Vec<Option<BlockId>>,
    insert: Option<BlockId>,
}

impl FunctionBuilder {
    pub fn new(name: &str, param_types: Vec<IrType>, result_types: Vec<IrType>) -> Self {
        FunctionBuilder {
            func: SsaFunction {
                name: name.to_string(),
                param_types,
                result_types,
                slots: Vec::new(),
                blocks: Vec::new(),
                block_order: Vec::new(),
                insts: Vec::new(),
                values: Vec::new(),
                entry: BlockId(0),
            },
            inst_blocks: Vec::new(),
            insert: None,
        }
    }

    // Blocks -----------------------------------------------------------------

    pub fn create_block(&mut self, name: &str) -> BlockId {
        let id = BlockId(self.func.blocks.len() as u32);
        self.func.blocks.push(Block {
            name: name.to_string(),
            insts: Vec::new(),
            phi_count: 0,
        });
        self.func.block_order.push(id);
        id
    }

    /// Fix a block's position in the layout order, directly after another.
    pub fn move_block_after(&mut self, block: BlockId, after: BlockId) {
        self.func.block_order.retain(|&b| b != block);
        let position = self
            .func
            .block_order
            .iter()
            .position(|&b| b == after)
            .expect("anchor block is in the layout");
        self.func.block_order.insert(position + 1, block);
    }

    pub fn set_entry(&mut self, block: BlockId) {
        self.func.entry = block;
    }

    pub fn set_insertion_point(&mut self, block: BlockId) {
        self.insert = Some(block);
    }

    pub fn insertion_block(&self) -> BlockId {
        self.insert.expect("an insertion point is set")
    }

    /// Whether the insertion block already ends in a terminator.
    pub fn insertion_block_terminated(&self) -> bool {
        let block = &self.func.blocks[self.insertion_block().0 as usize];
        block
            .insts
            .last()
            .is_some_and(|&i| self.func.insts[i.0 as usize].kind.is_terminator())
    }

    // Slots ------------------------------------------------------------------

    pub fn create_slot(&mut self, ty: IrType) -> SlotId {
        self.create_slot_array(ty, 1)
    }

    pub fn create_slot_array(&mut self, ty: IrType, count: u32) -> SlotId {
        let id = SlotId(self.func.slots.len() as u32);
        self.func.slots.push(SlotInfo {
            ty,
            count,
            escaped: false,
        });
        id
    }

    pub fn mark_slot_escaped(&mut self, slot: SlotId) {
        self.func.slots[slot.0 as usize].escaped = true;
    }

    pub fn slots(&self) -> &[SlotInfo] {
        &self.func.slots
    }

    // Core instruction plumbing ----------------------------------------------

    fn push_inst(&mut self, kind: InstKind, result_types: &[IrType]) -> Vec<ValueId> {
        let block = self.insertion_block();
        debug_assert!(
            !self.insertion_block_terminated(),
            "emitting past a terminator in block {}",
            self.func.blocks[block.0 as usize].name
        );
        self.push_inst_into(block, kind, result_types, false)
    }

    fn push_inst_into(
        &mut self,
        block: BlockId,
        kind: InstKind,
        result_types: &[IrType],
        at_head: bool,
    ) -> Vec<ValueId> {
        let inst_id = InstId(self.func.insts.len() as u32);
        let results: Vec<ValueId> = result_types
            .iter()
            .map(|&ty| {
                let value = ValueId(self.func.values.len() as u32);
                self.func.values.push(ValueInfo { ty, def: inst_id });
                value
            })
            .collect();

        self.func.insts.push(Inst {
            kind,
            results: results.clone(),
        });
        self.inst_blocks.push(Some(block));

        let block_data = &mut self.func.blocks[block.0 as usize];
        if at_head {
            block_data.insts.insert(block_data.phi_count, inst_id);
            block_data.phi_count += 1;
        } else {
            block_data.insts.push(inst_id);
        }
        results
    }

    fn single(&mut self, kind: InstKind, ty: IrType) -> ValueId {
        self.push_inst(kind, &[ty])[0]
    }

    pub fn value_type(&self, value: ValueId) -> IrType {
        self.func.value_type(value)
    }

    // Simple instructions ----------------------------------------------------

    pub fn argument(&mut self, index: u32) -> ValueId {
        let ty = self.func.param_types[index as usize];
        self.single(InstKind::Argument { index }, ty)
    }

    pub fn constant(&mut self, literal: Literal) -> ValueId {
        let ty = literal.ty();
        self.single(InstKind::Const(literal), ty)
    }

    pub fn const_i32(&mut self, value: i32) -> ValueId {
        self.constant(Literal::I32(value))
    }

    pub fn const_i64(&mut self, value: i64) -> ValueId {
        self.constant(Literal::I64(value))
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = self.value_type(lhs);
        self.single(InstKind::Binary { op, lhs, rhs }, ty)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ValueId) -> ValueId {
        let ty = self.value_type(operand);
        self.single(InstKind::Unary { op, operand }, ty)
    }

    pub fn constrained(&mut self, op: ConstrainedOp, args: Vec<ValueId>) -> ValueId {
        let ty = self.value_type(args[0]);
        self.single(InstKind::Constrained { op, args }, ty)
    }

    pub fn compare(&mut self, op: CmpOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.single(InstKind::Compare { op, lhs, rhs }, IrType::Bool)
    }

    pub fn cast(&mut self, op: CastOp, operand: ValueId, to: IrType) -> ValueId {
        self.single(InstKind::Cast { op, operand, to }, to)
    }

    pub fn select(&mut self, cond: ValueId, on_true: ValueId, on_false: ValueId) -> ValueId {
        let ty = self.value_type(on_true);
        self.single(InstKind::Select { cond, on_true, on_false }, ty)
    }

    // φ-nodes ----------------------------------------------------------------

    /// Create a φ at the head of `block` with an empty incoming list.
    pub fn phi(&mut self, block: BlockId, ty: IrType) -> ValueId {
        self.push_inst_into(
            block,
            InstKind::Phi {
                ty,
                incomings: Vec::new(),
            },
            &[ty],
            true,
        )[0]
    }

    pub fn add_phi_incoming(&mut self, phi: ValueId, from: BlockId, value: ValueId) {
        let inst = self.func.def_of(phi);
        match &mut self.func.insts[inst.0 as usize].kind {
            InstKind::Phi { incomings, .. } => incomings.push((from, value)),
            other => panic!("add_phi_incoming on non-φ {other:?}"),
        }
    }

    pub fn phi_incoming_count(&self, phi: ValueId) -> usize {
        let inst = self.func.def_of(phi);
        match &self.func.insts[inst.0 as usize].kind {
            InstKind::Phi { incomings, .. } => incomings.len(),
            other => panic!("phi_incoming_count on non-φ {other:?}"),
        }
    }

    /// Remove a φ that ended up with no incoming edges.
    pub fn erase_phi(&mut self, phi: ValueId) {
        let inst = self.func.def_of(phi);
        debug_assert_eq!(self.phi_incoming_count(phi), 0);
        let block = self.inst_blocks[inst.0 as usize]
            .take()
            .expect("φ still belongs to a block");
        let block_data = &mut self.func.blocks[block.0 as usize];
        let position = block_data
            .insts
            .iter()
            .position(|&i| i == inst)
            .expect("φ is in its block");
        block_data.insts.remove(position);
        block_data.phi_count -= 1;
        // The instruction and value table entries stay behind, unreferenced.
    }

    // Memory -----------------------------------------------------------------

    pub fn slot_addr(&mut self, slot: SlotId) -> ValueId {
        self.single(InstKind::SlotAddr { slot }, IrType::Ptr)
    }

    pub fn ptr_add(&mut self, ptr: ValueId, offset: ValueId) -> ValueId {
        self.single(InstKind::PtrAdd { ptr, offset }, IrType::Ptr)
    }

    pub fn load(&mut self, ptr: ValueId, ty: IrType, align: u32, volatile: bool, atomic: bool) -> ValueId {
        self.single(
            InstKind::Load {
                ptr,
                ty,
                align,
                volatile,
                atomic,
            },
            ty,
        )
    }

    pub fn store(&mut self, ptr: ValueId, value: ValueId, align: u32, volatile: bool, atomic: bool) {
        self.push_inst(
            InstKind::Store {
                ptr,
                value,
                align,
                volatile,
                atomic,
            },
            &[],
        );
    }

    pub fn atomic_rmw(&mut self, op: AtomicRmwOp, ptr: ValueId, value: ValueId) -> ValueId {
        let ty = self.value_type(value);
        self.single(InstKind::AtomicRmw { op, ptr, value, ty }, ty)
    }

    pub fn atomic_cmpxchg(&mut self, ptr: ValueId, expected: ValueId, replacement: ValueId) -> ValueId {
        let ty = self.value_type(expected);
        self.single(
            InstKind::AtomicCmpxchg {
                ptr,
                expected,
                replacement,
                ty,
            },
            ty,
        )
    }

    // Calls ------------------------------------------------------------------

    pub fn call(
        &mut self,
        callee: Callee,
        args: Vec<ValueId>,
        result_types: Vec<IrType>,
        unwind: Option<BlockId>,
    ) -> Vec<ValueId> {
        let tys = result_types.clone();
        self.push_inst(
            InstKind::Call {
                callee,
                args,
                result_types,
                unwind,
            },
            &tys,
        )
    }

    // Vectors ----------------------------------------------------------------

    pub fn vector_splat(&mut self, lanes: u32, scalar: ValueId) -> ValueId {
        self.single(InstKind::VectorSplat { lanes, scalar }, IrType::V128)
    }

    pub fn extract_element(&mut self, vector: ValueId, lanes: u32, scalar_ty: IrType, lane: u32) -> ValueId {
        self.single(
            InstKind::ExtractElement {
                vector,
                lanes,
                scalar_ty,
                lane,
            },
            scalar_ty,
        )
    }

    pub fn insert_element(&mut self, vector: ValueId, scalar: ValueId, lanes: u32, lane: u32) -> ValueId {
        self.single(
            InstKind::InsertElement {
                vector,
                scalar,
                lanes,
                lane,
            },
            IrType::V128,
        )
    }

    pub fn shuffle_vector(&mut self, a: ValueId, b: ValueId, mask: [u8; 16]) -> ValueId {
        self.single(InstKind::ShuffleVector { a, b, mask }, IrType::V128)
    }

    pub fn vector_binary(&mut self, op: BinaryOp, lanes: u32, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.single(InstKind::VectorBinary { op, lanes, lhs, rhs }, IrType::V128)
    }

    pub fn vector_unary(&mut self, op: UnaryOp, lanes: u32, operand: ValueId) -> ValueId {
        self.single(InstKind::VectorUnary { op, lanes, operand }, IrType::V128)
    }

    pub fn vector_compare(&mut self, op: CmpOp, lanes: u32, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.single(InstKind::VectorCompare { op, lanes, lhs, rhs }, IrType::V128)
    }

    pub fn vector_cast(&mut self, op: CastOp, lanes: u32, operand: ValueId) -> ValueId {
        self.single(InstKind::VectorCast { op, lanes, operand }, IrType::V128)
    }

    // Exception handling -----------------------------------------------------

    pub fn landing_pad(&mut self, clauses: Vec<u64>) -> ValueId {
        self.single(InstKind::LandingPad { clauses }, IrType::Ptr)
    }

    /// Append a catch-switch terminator to the insertion block, returning
    /// the instruction id so handlers can be added as catches appear.
    pub fn catch_switch(&mut self) -> InstId {
        self.push_inst(InstKind::CatchSwitch { handlers: Vec::new() }, &[]);
        InstId(self.func.insts.len() as u32 - 1)
    }

    pub fn add_catch_switch_handler(&mut self, catch_switch: InstId, handler: BlockId) {
        match &mut self.func.insts[catch_switch.0 as usize].kind {
            InstKind::CatchSwitch { handlers } => handlers.push(handler),
            other => panic!("add_catch_switch_handler on {other:?}"),
        }
    }

    pub fn catch_pad(&mut self, catch_switch: InstId, filter: FuncId) -> ValueId {
        self.single(InstKind::CatchPad { catch_switch, filter }, IrType::Ptr)
    }

    pub fn catch_ret(&mut self, pad: ValueId, dest: BlockId) {
        self.push_inst(InstKind::CatchRet { pad, dest }, &[]);
    }

    pub fn local_escape(&mut self, slots: Vec<SlotId>) {
        self.push_inst(InstKind::LocalEscape { slots }, &[]);
    }

    pub fn local_recover(&mut self, escape_index: u32, frame: ValueId) -> ValueId {
        self.single(InstKind::LocalRecover { escape_index, frame }, IrType::Ptr)
    }

    // Terminators ------------------------------------------------------------

    pub fn br(&mut self, dest: BlockId) {
        self.push_inst(InstKind::Br { dest }, &[]);
    }

    pub fn cond_br(&mut self, cond: ValueId, on_true: BlockId, on_false: BlockId, likely: Option<bool>) {
        self.push_inst(
            InstKind::CondBr {
                cond,
                on_true,
                on_false,
                likely,
            },
            &[],
        );
    }

    pub fn switch(&mut self, index: ValueId, default: BlockId, cases: Vec<(u32, BlockId)>) {
        self.push_inst(InstKind::Switch { index, default, cases }, &[]);
    }

    pub fn ret(&mut self, values: Vec<ValueId>) {
        self.push_inst(InstKind::Ret { values }, &[]);
    }

    pub fn unreachable(&mut self) {
        self.push_inst(InstKind::Unreachable, &[]);
    }

    // Finish -----------------------------------------------------------------

    pub fn finish(self) -> SsaFunction {
        self.func
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_straight_line_function() {
        let mut b = FunctionBuilder::new("add3", vec![IrType::Ptr, IrType::I32], vec![IrType::I32]);
        let entry = b.create_block("entry");
        b.set_entry(entry);
        b.set_insertion_point(entry);

        let arg = b.argument(1);
        let three = b.const_i32(3);
        let sum = b.binary(BinaryOp::Add, arg, three);
        b.ret(vec![sum]);

        let func = b.finish();
        func.validate().unwrap();
        assert_eq!(func.value_type(sum), IrType::I32);
        assert_eq!(func.block(entry).insts.len(), 4);
    }

    #[test]
    fn phis_insert_at_block_head_and_track_predecessors() {
        let mut b = FunctionBuilder::new("phi", vec![IrType::Ptr], vec![IrType::I32]);
        let entry = b.create_block("entry");
        let left = b.create_block("left");
        let right = b.create_block("right");
        let join = b.create_block("join");
        b.set_entry(entry);

        // Create the join φ before any incoming edge exists.
        let phi = b.phi(join, IrType::I32);

        b.set_insertion_point(entry);
        let one = b.const_i32(1);
        let cond = b.compare(CmpOp::Ne, one, one);
        b.cond_br(cond, left, right, None);

        b.set_insertion_point(left);
        let a = b.const_i32(10);
        b.add_phi_incoming(phi, left, a);
        b.br(join);

        b.set_insertion_point(right);
        let z = b.const_i32(20);
        b.add_phi_incoming(phi, right, z);
        b.br(join);

        b.set_insertion_point(join);
        b.ret(vec![phi]);

        let func = b.finish();
        func.validate().unwrap();
        assert_eq!(func.block(join).phi_count, 1);
        assert_eq!(func.predecessors()[join.0 as usize].len(), 2);
    }

    #[test]
    fn validate_rejects_mismatched_phi() {
        let mut b = FunctionBuilder::new("bad", vec![IrType::Ptr], vec![]);
        let entry = b.create_block("entry");
        let join = b.create_block("join");
        b.set_entry(entry);

        let phi = b.phi(join, IrType::I32);

        b.set_insertion_point(entry);
        b.br(join);
        // No incoming added for the edge entry -> join.
        b.set_insertion_point(join);
        b.ret(vec![]);
        let _ = phi;

        let func = b.finish();
        assert!(func.validate().is_err());
    }

    #[test]
    fn erase_phi_removes_from_block() {
        let mut b = FunctionBuilder::new("erase", vec![IrType::Ptr], vec![]);
        let entry = b.create_block("entry");
        b.set_entry(entry);
        let dead = b.phi(entry, IrType::I64);

        b.set_insertion_point(entry);
        b.ret(vec![]);

        b.erase_phi(dead);
        let func = b.finish();
        func.validate().unwrap();
        assert_eq!(func.block(entry).phi_count, 0);
        assert_eq!(func.block(entry).insts.len(), 1);
    }

    #[test]
    fn move_block_after_reorders_layout() {
        let mut b = FunctionBuilder::new("order", vec![IrType::Ptr], vec![]);
        let entry = b.create_block("entry");
        let tail = b.create_block("tail");
        let middle = b.create_block("middle");
        b.set_entry(entry);

        b.move_block_after(tail, middle);
        let func = b.finish();
        assert_eq!(func.block_order, vec![entry, middle, tail]);
    }

    #[test]
    fn call_produces_multiple_results() {
        let mut b = FunctionBuilder::new("call", vec![IrType::Ptr], vec![]);
        let entry = b.create_block("entry");
        b.set_entry(entry);
        b.set_insertion_point(entry);

        let results = b.call(
            Callee::Intrinsic("growMemory"),
            vec![],
            vec![IrType::I32, IrType::I64],
            None,
        );
        assert_eq!(results.len(), 2);
        assert_eq!(b.value_type(results[0]), IrType::I32);
        assert_eq!(b.value_type(results[1]), IrType::I64);
    }
}
