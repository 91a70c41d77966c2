//! Textual dump of SSA functions.
//!
//! The format is for humans and tests, not round-tripping: one instruction
//! per line, values named `v0, v1, ...`, blocks by their creation names.

use super::{
    BinaryOp, Callee, CastOp, CmpOp, ConstrainedOp, Inst, InstKind, IrType, Literal, SsaFunction,
    UnaryOp,
};
use std::fmt;

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IrType::Bool => "bool",
            IrType::I8 => "i8",
            IrType::I16 => "i16",
            IrType::I32 => "i32",
            IrType::I64 => "i64",
            IrType::F32 => "f32",
            IrType::F64 => "f64",
            IrType::V128 => "v128",
            IrType::Ptr => "ptr",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::I8(v) => write!(f, "i8 {v}"),
            Literal::I32(v) => write!(f, "i32 {v}"),
            Literal::I64(v) => write!(f, "i64 {v}"),
            Literal::F32(bits) => write!(f, "f32 0x{bits:08x}"),
            Literal::F64(bits) => write!(f, "f64 0x{bits:016x}"),
            Literal::V128(bytes) => {
                write!(f, "v128 0x")?;
                for b in bytes.iter().rev() {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Literal::Ptr(addr) => write!(f, "ptr {addr:#x}"),
        }
    }
}

fn binary_op_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::SDiv => "sdiv",
        BinaryOp::UDiv => "udiv",
        BinaryOp::SRem => "srem",
        BinaryOp::URem => "urem",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Xor => "xor",
        BinaryOp::Shl => "shl",
        BinaryOp::AShr => "ashr",
        BinaryOp::LShr => "lshr",
        BinaryOp::FAdd => "fadd",
        BinaryOp::FSub => "fsub",
        BinaryOp::FMul => "fmul",
        BinaryOp::FDiv => "fdiv",
        BinaryOp::Copysign => "copysign",
        BinaryOp::SAddSat => "sadd_sat",
        BinaryOp::UAddSat => "uadd_sat",
        BinaryOp::SSubSat => "ssub_sat",
        BinaryOp::USubSat => "usub_sat",
        BinaryOp::FMin => "fmin",
        BinaryOp::FMax => "fmax",
    }
}

fn unary_op_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Clz => "clz",
        UnaryOp::Ctz => "ctz",
        UnaryOp::Popcnt => "popcnt",
        UnaryOp::FNeg => "fneg",
        UnaryOp::FAbs => "fabs",
        UnaryOp::FSqrt => "fsqrt",
        UnaryOp::Not => "not",
    }
}

fn cmp_op_name(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "eq",
        CmpOp::Ne => "ne",
        CmpOp::SLt => "slt",
        CmpOp::SLe => "sle",
        CmpOp::SGt => "sgt",
        CmpOp::SGe => "sge",
        CmpOp::ULt => "ult",
        CmpOp::ULe => "ule",
        CmpOp::UGt => "ugt",
        CmpOp::UGe => "uge",
        CmpOp::FOeq => "foeq",
        CmpOp::FOlt => "folt",
        CmpOp::FOle => "fole",
        CmpOp::FOgt => "fogt",
        CmpOp::FOge => "foge",
        CmpOp::FUne => "fune",
        CmpOp::FUno => "funo",
    }
}

fn cast_op_name(op: CastOp) -> &'static str {
    match op {
        CastOp::Zext => "zext",
        CastOp::Sext => "sext",
        CastOp::Trunc => "trunc",
        CastOp::FpTrunc => "fptrunc",
        CastOp::FpExt => "fpext",
        CastOp::SiToFp => "sitofp",
        CastOp::UiToFp => "uitofp",
        CastOp::FpToSi => "fptosi",
        CastOp::FpToUi => "fptoui",
        CastOp::Bitcast => "bitcast",
        CastOp::PtrToInt => "ptrtoint",
        CastOp::IntToPtr => "inttoptr",
    }
}

fn constrained_op_name(op: ConstrainedOp) -> &'static str {
    match op {
        ConstrainedOp::FAdd => "fadd.strict",
        ConstrainedOp::FSub => "fsub.strict",
        ConstrainedOp::FMul => "fmul.strict",
        ConstrainedOp::FDiv => "fdiv.strict",
        ConstrainedOp::FSqrt => "fsqrt.strict",
    }
}

impl SsaFunction {
    fn write_inst(&self, f: &mut fmt::Formatter<'_>, inst: &Inst) -> fmt::Result {
        write!(f, "  ")?;
        if !inst.results.is_empty() {
            for (i, r) in inst.results.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "v{}", r.0)?;
            }
            write!(f, " = ")?;
        }

        let block_name = |id: super::BlockId| self.blocks[id.0 as usize].name.clone();

        match &inst.kind {
            InstKind::Argument { index } => write!(f, "argument {index}")?,
            InstKind::Const(lit) => write!(f, "const {lit}")?,
            InstKind::Binary { op, lhs, rhs } => {
                write!(f, "{} v{}, v{}", binary_op_name(*op), lhs.0, rhs.0)?
            }
            InstKind::Unary { op, operand } => {
                write!(f, "{} v{}", unary_op_name(*op), operand.0)?
            }
            InstKind::Constrained { op, args } => {
                write!(f, "{}", constrained_op_name(*op))?;
                for (i, a) in args.iter().enumerate() {
                    write!(f, "{} v{}", if i == 0 { "" } else { "," }, a.0)?;
                }
            }
            InstKind::Compare { op, lhs, rhs } => {
                write!(f, "cmp.{} v{}, v{}", cmp_op_name(*op), lhs.0, rhs.0)?
            }
            InstKind::Cast { op, operand, to } => {
                write!(f, "{} v{} to {to}", cast_op_name(*op), operand.0)?
            }
            InstKind::Select { cond, on_true, on_false } => {
                write!(f, "select v{}, v{}, v{}", cond.0, on_true.0, on_false.0)?
            }
            InstKind::Phi { ty, incomings } => {
                write!(f, "phi {ty}")?;
                for (block, value) in incomings {
                    write!(f, " [{}: v{}]", block_name(*block), value.0)?;
                }
            }
            InstKind::SlotAddr { slot } => write!(f, "slot_addr s{}", slot.0)?,
            InstKind::PtrAdd { ptr, offset } => write!(f, "ptr_add v{}, v{}", ptr.0, offset.0)?,
            InstKind::Load { ptr, ty, align, volatile, atomic } => {
                write!(f, "load {ty} v{}, align {align}", ptr.0)?;
                if *volatile {
                    write!(f, ", volatile")?;
                }
                if *atomic {
                    write!(f, ", seq_cst")?;
                }
            }
            InstKind::Store { ptr, value, align, volatile, atomic } => {
                write!(f, "store v{} to v{}, align {align}", value.0, ptr.0)?;
                if *volatile {
                    write!(f, ", volatile")?;
                }
                if *atomic {
                    write!(f, ", seq_cst")?;
                }
            }
            InstKind::AtomicRmw { op, ptr, value, ty } => {
                let name = match op {
                    super::AtomicRmwOp::Xchg => "xchg",
                    super::AtomicRmwOp::Add => "add",
                    super::AtomicRmwOp::Sub => "sub",
                    super::AtomicRmwOp::And => "and",
                    super::AtomicRmwOp::Or => "or",
                    super::AtomicRmwOp::Xor => "xor",
                };
                write!(f, "atomic_rmw.{name} {ty} v{}, v{}", ptr.0, value.0)?
            }
            InstKind::AtomicCmpxchg { ptr, expected, replacement, ty } => write!(
                f,
                "atomic_cmpxchg {ty} v{}, v{}, v{}",
                ptr.0, expected.0, replacement.0
            )?,
            InstKind::Call { callee, args, unwind, .. } => {
                match callee {
                    Callee::Function(id) => write!(f, "call fn{}", id.0)?,
                    Callee::Address(addr) => write!(f, "call {addr:#x}")?,
                    Callee::Intrinsic(name) => write!(f, "call @{name}")?,
                    Callee::Value(v) => write!(f, "call_indirect v{}", v.0)?,
                }
                write!(f, "(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "v{}", a.0)?;
                }
                write!(f, ")")?;
                if let Some(unwind) = unwind {
                    write!(f, " unwind {}", block_name(*unwind))?;
                }
            }
            InstKind::VectorSplat { lanes, scalar } => {
                write!(f, "splat x{lanes} v{}", scalar.0)?
            }
            InstKind::ExtractElement { vector, lanes, lane, .. } => {
                write!(f, "extract_lane x{lanes} v{}, {lane}", vector.0)?
            }
            InstKind::InsertElement { vector, scalar, lanes, lane } => {
                write!(f, "insert_lane x{lanes} v{}, v{}, {lane}", vector.0, scalar.0)?
            }
            InstKind::ShuffleVector { a, b, mask } => {
                write!(f, "shuffle v{}, v{},", a.0, b.0)?;
                for m in mask {
                    write!(f, " {m}")?;
                }
            }
            InstKind::VectorBinary { op, lanes, lhs, rhs } => {
                write!(f, "v{}.{} v{}, v{}", lanes, binary_op_name(*op), lhs.0, rhs.0)?
            }
            InstKind::VectorUnary { op, lanes, operand } => {
                write!(f, "v{}.{} v{}", lanes, unary_op_name(*op), operand.0)?
            }
            InstKind::VectorCompare { op, lanes, lhs, rhs } => {
                write!(f, "v{}.cmp.{} v{}, v{}", lanes, cmp_op_name(*op), lhs.0, rhs.0)?
            }
            InstKind::VectorCast { op, lanes, operand } => {
                write!(f, "v{}.{} v{}", lanes, cast_op_name(*op), operand.0)?
            }
            InstKind::LandingPad { clauses } => {
                write!(f, "landing_pad")?;
                for c in clauses {
                    write!(f, " clause {c:#x}")?;
                }
            }
            InstKind::CatchSwitch { handlers } => {
                write!(f, "catch_switch")?;
                for h in handlers {
                    write!(f, " {}", block_name(*h))?;
                }
            }
            InstKind::CatchPad { filter, .. } => write!(f, "catch_pad filter fn{}", filter.0)?,
            InstKind::CatchRet { pad, dest } => {
                write!(f, "catch_ret v{} to {}", pad.0, block_name(*dest))?
            }
            InstKind::LocalEscape { slots } => {
                write!(f, "local_escape")?;
                for s in slots {
                    write!(f, " s{}", s.0)?;
                }
            }
            InstKind::LocalRecover { escape_index, frame } => {
                write!(f, "local_recover {escape_index}, v{}", frame.0)?
            }
            InstKind::Br { dest } => write!(f, "br {}", block_name(*dest))?,
            InstKind::CondBr { cond, on_true, on_false, likely } => {
                write!(
                    f,
                    "cond_br v{}, {}, {}",
                    cond.0,
                    block_name(*on_true),
                    block_name(*on_false)
                )?;
                match likely {
                    Some(true) => write!(f, " [likely]")?,
                    Some(false) => write!(f, " [unlikely]")?,
                    None => {}
                }
            }
            InstKind::Switch { index, default, cases } => {
                write!(f, "switch v{}, default {}", index.0, block_name(*default))?;
                for (value, block) in cases {
                    write!(f, ", {value}: {}", block_name(*block))?;
                }
            }
            InstKind::Ret { values } => {
                write!(f, "ret")?;
                for (i, v) in values.iter().enumerate() {
                    write!(f, "{} v{}", if i == 0 { "" } else { "," }, v.0)?;
                }
            }
            InstKind::Unreachable => write!(f, "unreachable")?,
        }
        writeln!(f)
    }
}

impl fmt::Display for SsaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func {}(", self.name)?;
        for (i, p) in self.param_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> (")?;
        for (i, r) in self.result_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{r}")?;
        }
        writeln!(f, ") {{")?;

        for (i, slot) in self.slots.iter().enumerate() {
            write!(f, "  s{i}: {}", slot.ty)?;
            if slot.count != 1 {
                write!(f, " x{}", slot.count)?;
            }
            if slot.escaped {
                write!(f, " (escaped)")?;
            }
            writeln!(f)?;
        }

        for &block_id in &self.block_order {
            let block = self.block(block_id);
            writeln!(f, "{}:", block.name)?;
            for &inst_id in &block.insts {
                self.write_inst(f, self.inst(inst_id))?;
            }
        }
        write!(f, "}}")
    }
}
