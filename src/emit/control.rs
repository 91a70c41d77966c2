//! Structured control flow lowering.
//!
//! Every structured construct gets an end block with pre-created φ-nodes
//! for its results; branches and fallthroughs feed those φs as their
//! terminators are emitted. Loops differ only in where their branch target
//! points: the loop header with parameter φs, so `br` jumps backwards.

use super::{ControlFrame, ControlKind, FunctionEmitter};
use crate::ssa::{BlockId, Literal, ValueId};
use crate::types::{BlockType, ValueType};

impl FunctionEmitter<'_> {
    pub(crate) fn push_control_frame(
        &mut self,
        kind: ControlKind,
        result_types: Vec<ValueType>,
        end_block: BlockId,
        end_phis: Vec<ValueId>,
    ) {
        self.push_control_frame_with_else(kind, result_types, end_block, end_phis, None, Vec::new());
    }

    pub(crate) fn push_control_frame_with_else(
        &mut self,
        kind: ControlKind,
        result_types: Vec<ValueType>,
        end_block: BlockId,
        end_phis: Vec<ValueId>,
        else_block: Option<BlockId>,
        else_args: Vec<ValueId>,
    ) {
        // The unreachable filtering keeps structured openers away from
        // unreachable frames.
        if let Some(top) = self.control_stack.last() {
            debug_assert!(top.is_reachable);
        }

        self.control_stack.push(ControlFrame {
            kind,
            result_types,
            end_block,
            end_phis,
            else_block,
            else_args,
            outer_stack_depth: self.stack.len(),
            outer_branch_target_depth: self.branch_target_stack.len(),
            is_reachable: true,
        });
    }

    pub(crate) fn push_branch_target(
        &mut self,
        params: Vec<ValueType>,
        block: BlockId,
        phis: Vec<ValueId>,
    ) {
        self.branch_target_stack.push(super::BranchTarget {
            params,
            block,
            phis,
        });
    }

    pub(crate) fn branch_target_by_depth(&self, depth: u32) -> super::BranchTarget {
        debug_assert!((depth as usize) < self.branch_target_stack.len());
        self.branch_target_stack[self.branch_target_stack.len() - depth as usize - 1].clone()
    }

    /// After unconditional control flow: unwind the operand stack to the
    /// innermost frame's entry depth and stop dispatching to the live
    /// handlers until this frame's `else`/`end`.
    pub(crate) fn enter_unreachable(&mut self) {
        let frame = self.control_stack.last_mut().expect("a control frame is open");
        debug_assert!(frame.outer_stack_depth <= self.stack.len());
        self.stack.truncate(frame.outer_stack_depth);
        frame.is_reachable = false;
    }

    /// If the current position is reachable, feed the frame's result values
    /// into its end φs and branch to the end block.
    pub(crate) fn branch_to_end_of_control_context(&mut self) {
        let frame = self.control_stack.last().expect("a control frame is open").clone();

        if frame.is_reachable {
            let from = self.builder.insertion_block();
            for index in (0..frame.result_types.len()).rev() {
                let result = self.pop();
                self.builder.add_phi_incoming(frame.end_phis[index], from, result);
            }
            self.builder.br(frame.end_block);
        }
        debug_assert_eq!(self.stack.len(), frame.outer_stack_depth);
    }

    // -----------------------------------------------------------------------
    // Structured openers
    // -----------------------------------------------------------------------

    pub(crate) fn emit_block(&mut self, block_type: BlockType) {
        let ty = block_type.resolve(&self.module.types);

        let end_block = self.builder.create_block("blockEnd");
        let end_phis = self.create_phis(end_block, &ty.results);

        let args = self.pop_multiple(ty.params.len());

        self.push_control_frame(ControlKind::Block, ty.results.clone(), end_block, end_phis.clone());
        self.push_branch_target(ty.results, end_block, end_phis);

        for arg in args {
            self.push(arg);
        }
    }

    pub(crate) fn emit_loop(&mut self, block_type: BlockType) {
        let ty = block_type.resolve(&self.module.types);
        let entry_block = self.builder.insertion_block();

        let body_block = self.builder.create_block("loopBody");
        let end_block = self.builder.create_block("loopEnd");

        let parameter_phis = self.create_phis(body_block, &ty.params);
        let end_phis = self.create_phis(end_block, &ty.results);

        self.builder.br(body_block);
        self.builder.set_insertion_point(body_block);

        // The initial parameter values arrive over the entry edge; back
        // edges add theirs later.
        for index in (0..ty.params.len()).rev() {
            let value = self.pop();
            self.builder
                .add_phi_incoming(parameter_phis[index], entry_block, value);
        }

        self.push_control_frame(ControlKind::Loop, ty.results, end_block, end_phis);
        // Branches to a loop target the body start, not the end.
        self.push_branch_target(ty.params, body_block, parameter_phis.clone());

        for phi in parameter_phis {
            self.push(phi);
        }
    }

    pub(crate) fn emit_if(&mut self, block_type: BlockType) {
        let ty = block_type.resolve(&self.module.types);

        let then_block = self.builder.create_block("ifThen");
        let else_block = self.builder.create_block("ifElse");
        let end_block = self.builder.create_block("ifElseEnd");
        let end_phis = self.create_phis(end_block, &ty.results);

        let condition = self.pop();
        let condition = self.coerce_i32_to_bool(condition);
        self.builder.cond_br(condition, then_block, else_block, None);

        let args = self.pop_multiple(ty.params.len());

        self.builder.set_insertion_point(then_block);

        self.push_control_frame_with_else(
            ControlKind::IfThen,
            ty.results.clone(),
            end_block,
            end_phis.clone(),
            Some(else_block),
            args.clone(),
        );
        self.push_branch_target(ty.results, end_block, end_phis);

        for arg in args {
            self.push(arg);
        }
    }

    pub(crate) fn emit_else(&mut self) {
        self.branch_to_end_of_control_context();

        let current = self.builder.insertion_block();
        let frame = self.control_stack.last_mut().expect("a control frame is open");
        debug_assert_eq!(frame.kind, ControlKind::IfThen);
        let else_block = frame.else_block.take().expect("if frame holds its else block");
        let else_args = std::mem::take(&mut frame.else_args);
        frame.kind = ControlKind::IfElse;
        frame.is_reachable = true;

        self.builder.move_block_after(else_block, current);
        self.builder.set_insertion_point(else_block);

        for arg in else_args {
            self.push(arg);
        }
    }

    pub(crate) fn emit_end(&mut self) {
        self.branch_to_end_of_control_context();

        let frame = self.control_stack.last().expect("a control frame is open").clone();

        if let Some(else_block) = frame.else_block {
            // An `if` without an `else`: synthesise the else arm as an
            // identity from the captured parameters to the end φs. This only
            // type-checks when the params equal the results, which the
            // validator guarantees.
            let current = self.builder.insertion_block();
            self.builder.move_block_after(else_block, current);
            self.builder.set_insertion_point(else_block);
            self.builder.br(frame.end_block);

            debug_assert_eq!(frame.else_args.len(), frame.end_phis.len());
            for (phi, arg) in frame.end_phis.iter().zip(&frame.else_args) {
                self.builder.add_phi_incoming(*phi, else_block, *arg);
            }
        }

        match frame.kind {
            ControlKind::Try => {
                self.try_stack.pop();
                self.with_eh(|eh, e| eh.end_try(e));
            }
            ControlKind::Catch => {
                self.with_eh(|eh, e| eh.end_catch(e));
            }
            _ => {}
        }

        let current = self.builder.insertion_block();
        self.builder.move_block_after(frame.end_block, current);
        self.builder.set_insertion_point(frame.end_block);

        // Push the merged results. A φ nothing branched to is dead: erase
        // it and substitute a typed zero so the stack shape stays right.
        for (index, &phi) in frame.end_phis.iter().enumerate() {
            if self.builder.phi_incoming_count(phi) > 0 {
                self.push(phi);
            } else {
                self.builder.erase_phi(phi);
                let zero = self
                    .builder
                    .constant(Literal::zero_of(frame.result_types[index]));
                self.push(zero);
            }
        }

        debug_assert!(frame.outer_branch_target_depth <= self.branch_target_stack.len());
        self.branch_target_stack.truncate(frame.outer_branch_target_depth);
        self.control_stack.pop();
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    pub(crate) fn emit_br(&mut self, depth: u32) {
        let target = self.branch_target_by_depth(depth);
        debug_assert_eq!(target.params.len(), target.phis.len());

        let from = self.builder.insertion_block();
        for index in (0..target.params.len()).rev() {
            let argument = self.pop();
            self.builder.add_phi_incoming(target.phis[index], from, argument);
        }

        self.builder.br(target.block);
        self.enter_unreachable();
    }

    pub(crate) fn emit_br_if(&mut self, depth: u32) {
        let condition = self.pop();

        let target = self.branch_target_by_depth(depth);
        debug_assert_eq!(target.params.len(), target.phis.len());

        // Wire the branch arguments into the target's φs without popping:
        // they stay on the operand stack for the fallthrough path.
        let from = self.builder.insertion_block();
        for (index, &phi) in target.phis.iter().enumerate() {
            let argument = self.peek(target.params.len() - index - 1);
            self.builder.add_phi_incoming(phi, from, argument);
        }

        let false_block = self.builder.create_block("br_ifElse");
        let condition = self.coerce_i32_to_bool(condition);
        self.builder.cond_br(condition, target.block, false_block, None);

        self.builder.set_insertion_point(false_block);
    }

    pub(crate) fn emit_br_table(&mut self, target_depths: &[u32], default_depth: u32) {
        let index = self.pop();

        // The default target's parameters apply to every listed target;
        // the validator guarantees they all match.
        let default_target = self.branch_target_by_depth(default_depth);
        let num_args = default_target.params.len();
        let args = self.pop_multiple(num_args);

        let from = self.builder.insertion_block();
        for (arg_index, &phi) in default_target.phis.iter().enumerate() {
            self.builder.add_phi_incoming(phi, from, args[arg_index]);
        }

        let mut cases = Vec::with_capacity(target_depths.len());
        for (case_index, &depth) in target_depths.iter().enumerate() {
            let target = self.branch_target_by_depth(depth);
            cases.push((case_index as u32, target.block));

            debug_assert_eq!(target.phis.len(), num_args);
            for (arg_index, &phi) in target.phis.iter().enumerate() {
                self.builder.add_phi_incoming(phi, from, args[arg_index]);
            }
        }

        self.builder.switch(index, default_target.block, cases);
        self.enter_unreachable();
    }

    pub(crate) fn emit_return(&mut self) {
        // Equivalent to a branch to the function's root frame.
        let root = self.control_stack[0].clone();
        let from = self.builder.insertion_block();
        for index in (0..self.func_type.results.len()).rev() {
            let argument = self.pop();
            self.builder.add_phi_incoming(root.end_phis[index], from, argument);
        }

        self.builder.br(root.end_block);
        self.enter_unreachable();
    }

    pub(crate) fn emit_unreachable_trap(&mut self) {
        self.emit_runtime_intrinsic("unreachableTrap", &[]);
        self.builder.unreachable();
        self.enter_unreachable();
    }

    pub(crate) fn emit_select(&mut self) {
        let condition = self.pop();
        let false_value = self.pop();
        let true_value = self.pop();
        let condition = self.coerce_i32_to_bool(condition);
        let result = self.builder.select(condition, true_value, false_value);
        self.push(result);
    }
}
