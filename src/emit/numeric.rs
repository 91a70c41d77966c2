//! Numeric operator lowerings.
//!
//! Most operators map to a single instruction; the exceptions are the ones
//! whose host semantics differ from WebAssembly's:
//!
//! - integer division and remainder guard against divide-by-zero and signed
//!   overflow before the instruction,
//! - shift counts are masked to the operand width,
//! - rotates are synthesised from shifts,
//! - float-to-int truncation branches on NaN and range before converting,
//! - min/max and the rounding operators call IEEE-strict runtime intrinsics.

use super::FunctionEmitter;
use crate::ssa::{BinaryOp, CastOp, CmpOp, ConstrainedOp, IrType, Literal, UnaryOp};
use crate::types::ValueType;

/// Trap bounds for the trapping float-to-int truncations.
///
/// These are the widest floats that cannot be truncated to an in-range
/// integer: not the extreme integer values converted to float, but the next
/// representable float beyond them. A value strictly between the bounds
/// truncates in range; a value at or past either bound traps. Bit patterns
/// are fixed by the WebAssembly specification and preserved exactly.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub min: Literal,
    pub max: Literal,
}

impl Bounds {
    pub const I32_S_F32: Bounds = Bounds {
        min: Literal::F32(0xcf00_0001), // -2147483904.0: the next f32 below INT32_MIN
        max: Literal::F32(0x4f00_0000), // 2147483648.0: INT32_MAX + 1 exactly
    };
    pub const I32_S_F64: Bounds = Bounds {
        min: Literal::F64(0xc1e0_0000_0020_0000), // -2147483649.0: INT32_MIN - 1 exactly
        max: Literal::F64(0x41e0_0000_0000_0000), // 2147483648.0
    };
    pub const I32_U_F32: Bounds = Bounds {
        min: Literal::F32(0xbf80_0000), // -1.0: anything in (-1, 0) truncates to 0
        max: Literal::F32(0x4f80_0000), // 4294967296.0
    };
    pub const I32_U_F64: Bounds = Bounds {
        min: Literal::F64(0xbff0_0000_0000_0000), // -1.0
        max: Literal::F64(0x41f0_0000_0000_0000), // 4294967296.0
    };
    pub const I64_S_F32: Bounds = Bounds {
        min: Literal::F32(0xdf00_0001), // -9223373136366403584.0: next f32 below INT64_MIN
        max: Literal::F32(0x5f00_0000), // 9223372036854775808.0
    };
    pub const I64_S_F64: Bounds = Bounds {
        min: Literal::F64(0xc3e0_0000_0000_0001), // -9223372036854777856.0: next f64 below INT64_MIN
        max: Literal::F64(0x43e0_0000_0000_0000), // 9223372036854775808.0
    };
    pub const I64_U_F32: Bounds = Bounds {
        min: Literal::F32(0xbf80_0000), // -1.0
        max: Literal::F32(0x5f80_0000), // 18446744073709551616.0
    };
    pub const I64_U_F64: Bounds = Bounds {
        min: Literal::F64(0xbff0_0000_0000_0000), // -1.0
        max: Literal::F64(0x43f0_0000_0000_0000), // 18446744073709551616.0
    };
}

/// Saturation points for the non-trapping truncations: the extreme integer
/// values as floats, and the integers selected at or past them.
#[derive(Debug, Clone, Copy)]
pub struct SatBounds {
    pub min_float: Literal,
    pub max_float: Literal,
    pub min_int: Literal,
    pub max_int: Literal,
}

impl SatBounds {
    pub const I32_S_F32: SatBounds = SatBounds {
        min_float: Literal::F32(0xcf00_0000), // INT32_MIN as f32
        max_float: Literal::F32(0x4f00_0000), // INT32_MAX rounds up to 2^31
        min_int: Literal::I32(i32::MIN),
        max_int: Literal::I32(i32::MAX),
    };
    pub const I32_S_F64: SatBounds = SatBounds {
        min_float: Literal::F64(0xc1e0_0000_0000_0000),
        max_float: Literal::F64(0x41df_ffff_ffc0_0000), // INT32_MAX exactly
        min_int: Literal::I32(i32::MIN),
        max_int: Literal::I32(i32::MAX),
    };
    pub const I32_U_F32: SatBounds = SatBounds {
        min_float: Literal::F32(0x0000_0000), // 0.0
        max_float: Literal::F32(0x4f80_0000), // UINT32_MAX rounds up to 2^32
        min_int: Literal::I32(0),
        max_int: Literal::I32(-1), // UINT32_MAX
    };
    pub const I32_U_F64: SatBounds = SatBounds {
        min_float: Literal::F64(0x0000_0000_0000_0000),
        max_float: Literal::F64(0x41ef_ffff_ffe0_0000), // UINT32_MAX exactly
        min_int: Literal::I32(0),
        max_int: Literal::I32(-1),
    };
    pub const I64_S_F32: SatBounds = SatBounds {
        min_float: Literal::F32(0xdf00_0000), // INT64_MIN as f32
        max_float: Literal::F32(0x5f00_0000), // INT64_MAX rounds up to 2^63
        min_int: Literal::I64(i64::MIN),
        max_int: Literal::I64(i64::MAX),
    };
    pub const I64_S_F64: SatBounds = SatBounds {
        min_float: Literal::F64(0xc3e0_0000_0000_0000),
        max_float: Literal::F64(0x43e0_0000_0000_0000),
        min_int: Literal::I64(i64::MIN),
        max_int: Literal::I64(i64::MAX),
    };
    pub const I64_U_F32: SatBounds = SatBounds {
        min_float: Literal::F32(0x0000_0000),
        max_float: Literal::F32(0x5f80_0000), // UINT64_MAX rounds up to 2^64
        min_int: Literal::I64(0),
        max_int: Literal::I64(-1), // UINT64_MAX
    };
    pub const I64_U_F64: SatBounds = SatBounds {
        min_float: Literal::F64(0x0000_0000_0000_0000),
        max_float: Literal::F64(0x43f0_0000_0000_0000),
        min_int: Literal::I64(0),
        max_int: Literal::I64(-1),
    };
}

impl FunctionEmitter<'_> {
    // -----------------------------------------------------------------------
    // Straight-line integer and float operators
    // -----------------------------------------------------------------------

    pub(crate) fn int_binary(&mut self, op: BinaryOp) {
        let right = self.pop();
        let left = self.pop();
        let result = self.builder.binary(op, left, right);
        self.push(result);
    }

    pub(crate) fn int_unary(&mut self, op: UnaryOp) {
        let operand = self.pop();
        let result = self.builder.unary(op, operand);
        self.push(result);
    }

    pub(crate) fn int_compare(&mut self, op: CmpOp) {
        let right = self.pop();
        let left = self.pop();
        let result = self.builder.compare(op, left, right);
        let result = self.coerce_bool_to_i32(result);
        self.push(result);
    }

    pub(crate) fn emit_eqz(&mut self, ty: ValueType) {
        let operand = self.pop();
        let zero = self.builder.constant(Literal::zero_of(ty));
        let result = self.builder.compare(CmpOp::Eq, operand, zero);
        let result = self.coerce_bool_to_i32(result);
        self.push(result);
    }

    pub(crate) fn fp_binary_constrained(&mut self, op: ConstrainedOp) {
        let right = self.pop();
        let left = self.pop();
        let result = self.builder.constrained(op, vec![left, right]);
        self.push(result);
    }

    pub(crate) fn fp_sqrt(&mut self) {
        let operand = self.pop();
        let result = self.builder.constrained(ConstrainedOp::FSqrt, vec![operand]);
        self.push(result);
    }

    pub(crate) fn fp_unary(&mut self, op: UnaryOp) {
        let operand = self.pop();
        let result = self.builder.unary(op, operand);
        self.push(result);
    }

    pub(crate) fn fp_compare(&mut self, op: CmpOp) {
        let right = self.pop();
        let left = self.pop();
        let result = self.builder.compare(op, left, right);
        let result = self.coerce_bool_to_i32(result);
        self.push(result);
    }

    pub(crate) fn fp_intrinsic_binary(&mut self, name: &str) {
        let right = self.pop();
        let left = self.pop();
        let results = self.emit_runtime_intrinsic(name, &[left, right]);
        self.push(results[0]);
    }

    pub(crate) fn fp_intrinsic_unary(&mut self, name: &str) {
        let operand = self.pop();
        let results = self.emit_runtime_intrinsic(name, &[operand]);
        self.push(results[0]);
    }

    // -----------------------------------------------------------------------
    // Division and remainder
    // -----------------------------------------------------------------------

    fn int_extremes(&mut self, ty: ValueType) -> (crate::ssa::ValueId, crate::ssa::ValueId) {
        let (min, minus_one) = match ty {
            ValueType::I32 => (Literal::I32(i32::MIN), Literal::I32(-1)),
            ValueType::I64 => (Literal::I64(i64::MIN), Literal::I64(-1)),
            _ => unreachable!("integer extremes of a non-integer type"),
        };
        (self.builder.constant(min), self.builder.constant(minus_one))
    }

    /// Trap when the divisor is zero.
    pub(crate) fn trap_divide_by_zero(&mut self, ty: ValueType, divisor: crate::ssa::ValueId) {
        let zero = self.builder.constant(Literal::zero_of(ty));
        let is_zero = self.builder.compare(CmpOp::Eq, divisor, zero);
        self.emit_conditional_trap_intrinsic(is_zero, "divideByZeroOrIntegerOverflowTrap", &[]);
    }

    /// Trap on (x / 0) or (INT_MIN / -1).
    fn trap_divide_by_zero_or_integer_overflow(
        &mut self,
        ty: ValueType,
        left: crate::ssa::ValueId,
        right: crate::ssa::ValueId,
    ) {
        let (int_min, minus_one) = self.int_extremes(ty);
        let left_is_min = self.builder.compare(CmpOp::Eq, left, int_min);
        let right_is_minus_one = self.builder.compare(CmpOp::Eq, right, minus_one);
        let overflow = self.builder.binary(BinaryOp::And, left_is_min, right_is_minus_one);

        let zero = self.builder.constant(Literal::zero_of(ty));
        let divide_by_zero = self.builder.compare(CmpOp::Eq, right, zero);
        let either = self.builder.binary(BinaryOp::Or, overflow, divide_by_zero);

        self.emit_conditional_trap_intrinsic(either, "divideByZeroOrIntegerOverflowTrap", &[]);
    }

    pub(crate) fn emit_div_s(&mut self, ty: ValueType) {
        let right = self.pop();
        let left = self.pop();
        self.trap_divide_by_zero_or_integer_overflow(ty, left, right);
        let result = self.builder.binary(BinaryOp::SDiv, left, right);
        self.push(result);
    }

    pub(crate) fn emit_div_u(&mut self, ty: ValueType, op: BinaryOp) {
        let right = self.pop();
        let left = self.pop();
        self.trap_divide_by_zero(ty, right);
        let result = self.builder.binary(op, left, right);
        self.push(result);
    }

    /// Signed remainder. The host's remainder is undefined on
    /// INT_MIN % -1, but WebAssembly defines it as 0, so that case branches
    /// around the instruction and merges 0 through a φ.
    pub(crate) fn emit_rem_s(&mut self, ty: ValueType) {
        let right = self.pop();
        let left = self.pop();

        self.trap_divide_by_zero(ty, right);

        let zero = self.builder.constant(Literal::zero_of(ty));
        let (int_min, minus_one) = self.int_extremes(ty);
        let left_not_min = self.builder.compare(CmpOp::Ne, left, int_min);
        let right_not_minus_one = self.builder.compare(CmpOp::Ne, right, minus_one);
        let no_overflow = self
            .builder
            .binary(BinaryOp::Or, left_not_min, right_not_minus_one);

        let pre_overflow_block = self.builder.insertion_block();
        let no_overflow_block = self.builder.create_block("sremNoOverflow");
        let end_block = self.builder.create_block("sremEnd");

        self.builder
            .cond_br(no_overflow, no_overflow_block, end_block, Some(true));

        self.builder.set_insertion_point(no_overflow_block);
        let remainder = self.builder.binary(BinaryOp::SRem, left, right);
        self.builder.br(end_block);

        self.builder.set_insertion_point(end_block);
        let phi = self.builder.phi(end_block, IrType::from_value_type(ty));
        self.builder.add_phi_incoming(phi, pre_overflow_block, zero);
        self.builder.add_phi_incoming(phi, no_overflow_block, remainder);
        self.push(phi);
    }

    // -----------------------------------------------------------------------
    // Shifts and rotates
    // -----------------------------------------------------------------------

    /// Mask a shift count to the operand width. Hosts disagree on
    /// out-of-range counts; WebAssembly wraps them.
    fn emit_shift_count_mask(&mut self, ty: ValueType, count: crate::ssa::ValueId) -> crate::ssa::ValueId {
        let mask = match ty {
            ValueType::I32 => self.builder.constant(Literal::I32(31)),
            ValueType::I64 => self.builder.constant(Literal::I64(63)),
            _ => unreachable!("shift of a non-integer type"),
        };
        self.builder.binary(BinaryOp::And, count, mask)
    }

    pub(crate) fn emit_shift(&mut self, ty: ValueType, op: BinaryOp) {
        let right = self.pop();
        let left = self.pop();
        let masked = self.emit_shift_count_mask(ty, right);
        let result = self.builder.binary(op, left, masked);
        self.push(result);
    }

    /// Rotate as `(x << (n mod W)) | (x >>u ((W - n) mod W))`, direction
    /// chosen by which operand gets the complement count.
    pub(crate) fn emit_rotate(&mut self, ty: ValueType, is_left: bool) {
        let right = self.pop();
        let left = self.pop();

        let bit_width = match ty {
            ValueType::I32 => self.builder.constant(Literal::I32(32)),
            ValueType::I64 => self.builder.constant(Literal::I64(64)),
            _ => unreachable!("rotate of a non-integer type"),
        };
        let complement = self.builder.binary(BinaryOp::Sub, bit_width, right);

        let (shl_count, shr_count) = if is_left {
            (right, complement)
        } else {
            (complement, right)
        };
        let shl_count = self.emit_shift_count_mask(ty, shl_count);
        let shr_count = self.emit_shift_count_mask(ty, shr_count);

        let high = self.builder.binary(BinaryOp::Shl, left, shl_count);
        let low = self.builder.binary(BinaryOp::LShr, left, shr_count);
        let result = self.builder.binary(BinaryOp::Or, high, low);
        self.push(result);
    }

    // -----------------------------------------------------------------------
    // Conversions
    // -----------------------------------------------------------------------

    pub(crate) fn emit_cast(&mut self, op: CastOp, to: IrType) {
        let operand = self.pop();
        let result = self.builder.cast(op, operand, to);
        self.push(result);
    }

    pub(crate) fn emit_sign_extend(&mut self, narrow: IrType, wide: IrType) {
        let operand = self.pop();
        let truncated = self.builder.cast(CastOp::Trunc, operand, narrow);
        let result = self.builder.cast(CastOp::Sext, truncated, wide);
        self.push(result);
    }

    /// `f64.promote_f32`, with a strict multiply by 1.0 after the extend so
    /// the promote cannot be folded into later arithmetic.
    pub(crate) fn emit_f64_promote(&mut self) {
        let operand = self.pop();
        let extended = self.builder.cast(CastOp::FpExt, operand, IrType::F64);
        let one = self.builder.constant(Literal::F64(1.0f64.to_bits()));
        let result = self
            .builder
            .constrained(ConstrainedOp::FMul, vec![extended, one]);
        self.push(result);
    }

    /// Trapping float-to-int: branch to a trap on NaN, then on out-of-range
    /// against the exact bounds, then convert.
    pub(crate) fn emit_trunc_to_int(&mut self, dest: ValueType, signed: bool, bounds: Bounds) {
        let operand = self.pop();

        let nan_block = self.builder.create_block("truncNaN");
        let not_nan_block = self.builder.create_block("truncNotNaN");
        let overflow_block = self.builder.create_block("truncOverflow");
        let in_range_block = self.builder.create_block("truncInRange");

        let is_nan = self.builder.compare(CmpOp::FUno, operand, operand);
        self.builder
            .cond_br(is_nan, nan_block, not_nan_block, Some(false));

        self.builder.set_insertion_point(nan_block);
        self.emit_runtime_intrinsic("invalidFloatOperationTrap", &[]);
        self.builder.unreachable();

        self.builder.set_insertion_point(not_nan_block);
        let max = self.builder.constant(bounds.max);
        let min = self.builder.constant(bounds.min);
        let too_high = self.builder.compare(CmpOp::FOge, operand, max);
        let too_low = self.builder.compare(CmpOp::FOle, operand, min);
        let out_of_range = self.builder.binary(BinaryOp::Or, too_high, too_low);
        self.builder
            .cond_br(out_of_range, overflow_block, in_range_block, Some(false));

        self.builder.set_insertion_point(overflow_block);
        self.emit_runtime_intrinsic("divideByZeroOrIntegerOverflowTrap", &[]);
        self.builder.unreachable();

        self.builder.set_insertion_point(in_range_block);
        let op = if signed { CastOp::FpToSi } else { CastOp::FpToUi };
        let result = self.builder.cast(op, operand, IrType::from_value_type(dest));
        self.push(result);
    }

    /// Saturating float-to-int: a select cascade. NaN chooses zero, values
    /// at or past the bounds choose the extreme integers, everything else
    /// converts.
    pub(crate) fn emit_trunc_to_int_sat(&mut self, dest: ValueType, signed: bool, bounds: SatBounds) {
        let operand = self.pop();

        let op = if signed { CastOp::FpToSi } else { CastOp::FpToUi };
        let converted = self.builder.cast(op, operand, IrType::from_value_type(dest));

        let max_float = self.builder.constant(bounds.max_float);
        let max_int = self.builder.constant(bounds.max_int);
        let too_high = self.builder.compare(CmpOp::FOge, operand, max_float);
        let result = self.builder.select(too_high, max_int, converted);

        let min_float = self.builder.constant(bounds.min_float);
        let min_int = self.builder.constant(bounds.min_int);
        let too_low = self.builder.compare(CmpOp::FOle, operand, min_float);
        let result = self.builder.select(too_low, min_int, result);

        let zero = self.builder.constant(Literal::zero_of(dest));
        let is_nan = self.builder.compare(CmpOp::FUno, operand, operand);
        let result = self.builder.select(is_nan, zero, result);

        self.push(result);
    }
}
