//! Vector (v128) operator lowerings.
//!
//! Bitwise operations work on the raw 128 bits; everything lane-sensitive
//! goes through the vector instruction kinds with an explicit lane count.
//! Comparison results are lane masks (all-ones/all-zero), and the vector
//! select used by saturating conversions is synthesised from bitwise ops
//! the same way as `v128.bitselect`.

use super::FunctionEmitter;
use crate::decode::{
    FloatCmpOp, FloatShape, IntCmpOp, LaneShape, MemArg, SimdFloatBinaryOp, SimdFloatUnaryOp,
    SimdIntBinaryOp, SimdIntUnaryOp, SimdOp, SimdShiftOp,
};
use crate::ssa::{BinaryOp, CastOp, CmpOp, IrType, Literal, UnaryOp, ValueId};

fn lane_ir_type(shape: LaneShape) -> IrType {
    match shape {
        LaneShape::I8x16 => IrType::I8,
        LaneShape::I16x8 => IrType::I16,
        LaneShape::I32x4 => IrType::I32,
        LaneShape::I64x2 => IrType::I64,
    }
}

fn float_lane_ir_type(shape: FloatShape) -> IrType {
    match shape {
        FloatShape::F32x4 => IrType::F32,
        FloatShape::F64x2 => IrType::F64,
    }
}

fn int_cmp(op: IntCmpOp) -> CmpOp {
    match op {
        IntCmpOp::Eq => CmpOp::Eq,
        IntCmpOp::Ne => CmpOp::Ne,
        IntCmpOp::LtS => CmpOp::SLt,
        IntCmpOp::LtU => CmpOp::ULt,
        IntCmpOp::GtS => CmpOp::SGt,
        IntCmpOp::GtU => CmpOp::UGt,
        IntCmpOp::LeS => CmpOp::SLe,
        IntCmpOp::LeU => CmpOp::ULe,
        IntCmpOp::GeS => CmpOp::SGe,
        IntCmpOp::GeU => CmpOp::UGe,
    }
}

fn float_cmp(op: FloatCmpOp) -> CmpOp {
    match op {
        FloatCmpOp::Eq => CmpOp::FOeq,
        FloatCmpOp::Ne => CmpOp::FUne,
        FloatCmpOp::Lt => CmpOp::FOlt,
        FloatCmpOp::Gt => CmpOp::FOgt,
        FloatCmpOp::Le => CmpOp::FOle,
        FloatCmpOp::Ge => CmpOp::FOge,
    }
}

impl FunctionEmitter<'_> {
    /// `or(and(on_true, mask), and(on_false, not mask))` — the bit-select
    /// pattern shared by `v128.bitselect` and vector selects.
    fn emit_bit_select(&mut self, mask: ValueId, on_true: ValueId, on_false: ValueId) -> ValueId {
        let true_bits = self.builder.binary(BinaryOp::And, on_true, mask);
        let inverted = self.builder.unary(UnaryOp::Not, mask);
        let false_bits = self.builder.binary(BinaryOp::And, on_false, inverted);
        self.builder.binary(BinaryOp::Or, true_bits, false_bits)
    }

    fn splat_literal(&mut self, lanes: u32, literal: Literal) -> ValueId {
        let scalar = self.builder.constant(literal);
        self.builder.vector_splat(lanes, scalar)
    }

    pub(crate) fn emit_simd(&mut self, op: SimdOp) {
        match op {
            SimdOp::V128Const { value } => {
                let v = self.builder.constant(Literal::V128(value));
                self.push(v);
            }
            SimdOp::V128Load { memarg } => self.emit_v128_load(memarg),
            SimdOp::V128Store { memarg } => self.emit_v128_store(memarg),

            SimdOp::Shuffle { lanes } => {
                let right = self.pop();
                let left = self.pop();
                let result = self.builder.shuffle_vector(left, right, lanes);
                self.push(result);
            }

            SimdOp::Splat { shape } => {
                let scalar = self.pop();
                let scalar = match shape {
                    LaneShape::I8x16 | LaneShape::I16x8 => {
                        self.builder.cast(CastOp::Trunc, scalar, lane_ir_type(shape))
                    }
                    _ => scalar,
                };
                let result = self.builder.vector_splat(shape.lanes(), scalar);
                self.push(result);
            }
            SimdOp::FloatSplat { shape } => {
                let scalar = self.pop();
                let result = self.builder.vector_splat(shape.lanes(), scalar);
                self.push(result);
            }

            SimdOp::ExtractLane { shape, lane, signed } => {
                let vector = self.pop();
                let scalar = self.builder.extract_element(
                    vector,
                    shape.lanes(),
                    lane_ir_type(shape),
                    lane as u32,
                );
                let result = if shape.lane_bits() < 32 {
                    let op = if signed { CastOp::Sext } else { CastOp::Zext };
                    self.builder.cast(op, scalar, IrType::I32)
                } else {
                    scalar
                };
                self.push(result);
            }
            SimdOp::ReplaceLane { shape, lane } => {
                let scalar = self.pop();
                let vector = self.pop();
                let scalar = if shape.lane_bits() < 32 {
                    self.builder.cast(CastOp::Trunc, scalar, lane_ir_type(shape))
                } else {
                    scalar
                };
                let result = self
                    .builder
                    .insert_element(vector, scalar, shape.lanes(), lane as u32);
                self.push(result);
            }
            SimdOp::FloatExtractLane { shape, lane } => {
                let vector = self.pop();
                let result = self.builder.extract_element(
                    vector,
                    shape.lanes(),
                    float_lane_ir_type(shape),
                    lane as u32,
                );
                self.push(result);
            }
            SimdOp::FloatReplaceLane { shape, lane } => {
                let scalar = self.pop();
                let vector = self.pop();
                let result = self
                    .builder
                    .insert_element(vector, scalar, shape.lanes(), lane as u32);
                self.push(result);
            }

            SimdOp::Not => {
                let operand = self.pop();
                let result = self.builder.unary(UnaryOp::Not, operand);
                self.push(result);
            }
            SimdOp::And => self.int_binary(BinaryOp::And),
            SimdOp::Or => self.int_binary(BinaryOp::Or),
            SimdOp::Xor => self.int_binary(BinaryOp::Xor),
            SimdOp::AndNot => {
                let right = self.pop();
                let left = self.pop();
                let inverted = self.builder.unary(UnaryOp::Not, right);
                let result = self.builder.binary(BinaryOp::And, left, inverted);
                self.push(result);
            }
            SimdOp::Bitselect => {
                let mask = self.pop();
                let on_false = self.pop();
                let on_true = self.pop();
                let result = self.emit_bit_select(mask, on_true, on_false);
                self.push(result);
            }

            SimdOp::AnyTrue => {
                // Any bit set in either 64-bit half.
                let operand = self.pop();
                let low = self.builder.extract_element(operand, 2, IrType::I64, 0);
                let high = self.builder.extract_element(operand, 2, IrType::I64, 1);
                let combined = self.builder.binary(BinaryOp::Or, low, high);
                let zero = self.builder.const_i64(0);
                let any = self.builder.compare(CmpOp::Ne, combined, zero);
                let result = self.coerce_bool_to_i32(any);
                self.push(result);
            }

            SimdOp::IntUnary { shape, op } => self.emit_simd_int_unary(shape, op),
            SimdOp::IntBinary { shape, op } => {
                let bin = match op {
                    SimdIntBinaryOp::Add => BinaryOp::Add,
                    SimdIntBinaryOp::Sub => BinaryOp::Sub,
                    SimdIntBinaryOp::Mul => BinaryOp::Mul,
                    SimdIntBinaryOp::AddSatS => BinaryOp::SAddSat,
                    SimdIntBinaryOp::AddSatU => BinaryOp::UAddSat,
                    SimdIntBinaryOp::SubSatS => BinaryOp::SSubSat,
                    SimdIntBinaryOp::SubSatU => BinaryOp::USubSat,
                };
                let right = self.pop();
                let left = self.pop();
                let result = self.builder.vector_binary(bin, shape.lanes(), left, right);
                self.push(result);
            }
            SimdOp::Shift { shape, op } => self.emit_simd_shift(shape, op),
            SimdOp::IntCompare { shape, op } => {
                let right = self.pop();
                let left = self.pop();
                let result = self
                    .builder
                    .vector_compare(int_cmp(op), shape.lanes(), left, right);
                self.push(result);
            }

            SimdOp::FloatUnary { shape, op } => {
                let un = match op {
                    SimdFloatUnaryOp::Abs => UnaryOp::FAbs,
                    SimdFloatUnaryOp::Neg => UnaryOp::FNeg,
                    SimdFloatUnaryOp::Sqrt => UnaryOp::FSqrt,
                };
                let operand = self.pop();
                let result = self.builder.vector_unary(un, shape.lanes(), operand);
                self.push(result);
            }
            SimdOp::FloatBinary { shape, op } => {
                let bin = match op {
                    SimdFloatBinaryOp::Add => BinaryOp::FAdd,
                    SimdFloatBinaryOp::Sub => BinaryOp::FSub,
                    SimdFloatBinaryOp::Mul => BinaryOp::FMul,
                    SimdFloatBinaryOp::Div => BinaryOp::FDiv,
                    SimdFloatBinaryOp::Min => BinaryOp::FMin,
                    SimdFloatBinaryOp::Max => BinaryOp::FMax,
                };
                let right = self.pop();
                let left = self.pop();
                let result = self.builder.vector_binary(bin, shape.lanes(), left, right);
                self.push(result);
            }
            SimdOp::FloatCompare { shape, op } => {
                let right = self.pop();
                let left = self.pop();
                let result = self
                    .builder
                    .vector_compare(float_cmp(op), shape.lanes(), left, right);
                self.push(result);
            }

            SimdOp::TruncSat { shape, signed } => self.emit_simd_trunc_sat(shape, signed),
            SimdOp::Convert { shape, signed } => {
                let operand = self.pop();
                let op = if signed { CastOp::SiToFp } else { CastOp::UiToFp };
                let result = self.builder.vector_cast(op, shape.lanes(), operand);
                self.push(result);
            }
        }
    }

    fn emit_v128_load(&mut self, memarg: MemArg) {
        let byte_index = self.pop();
        let pointer = self.coerce_byte_index_to_pointer(byte_index, memarg.offset);
        let value = self
            .builder
            .load(pointer, IrType::V128, 1 << memarg.align, true, false);
        self.push(value);
    }

    fn emit_v128_store(&mut self, memarg: MemArg) {
        let value = self.pop();
        let byte_index = self.pop();
        let pointer = self.coerce_byte_index_to_pointer(byte_index, memarg.offset);
        self.builder
            .store(pointer, value, 1 << memarg.align, true, false);
    }

    fn emit_simd_int_unary(&mut self, shape: LaneShape, op: SimdIntUnaryOp) {
        match op {
            SimdIntUnaryOp::Neg => {
                let operand = self.pop();
                let zero = self.builder.constant(Literal::V128([0; 16]));
                let result = self
                    .builder
                    .vector_binary(BinaryOp::Sub, shape.lanes(), zero, operand);
                self.push(result);
            }
            SimdIntUnaryOp::Abs => {
                let operand = self.pop();
                let zero = self.builder.constant(Literal::V128([0; 16]));
                let negative_mask =
                    self.builder
                        .vector_compare(CmpOp::SLt, shape.lanes(), operand, zero);
                let negated = self
                    .builder
                    .vector_binary(BinaryOp::Sub, shape.lanes(), zero, operand);
                let result = self.emit_bit_select(negative_mask, negated, operand);
                self.push(result);
            }
            SimdIntUnaryOp::AllTrue => {
                let operand = self.pop();
                let mut accumulated: Option<ValueId> = None;
                for lane in 0..shape.lanes() {
                    let scalar = self.builder.extract_element(
                        operand,
                        shape.lanes(),
                        lane_ir_type(shape),
                        lane,
                    );
                    let lane_true = if shape == LaneShape::I64x2 {
                        let zero = self.builder.const_i64(0);
                        self.builder.compare(CmpOp::Ne, scalar, zero)
                    } else {
                        let widened = if shape.lane_bits() < 32 {
                            self.builder.cast(CastOp::Zext, scalar, IrType::I32)
                        } else {
                            scalar
                        };
                        let zero = self.builder.const_i32(0);
                        self.builder.compare(CmpOp::Ne, widened, zero)
                    };
                    accumulated = Some(match accumulated {
                        None => lane_true,
                        Some(acc) => self.builder.binary(BinaryOp::And, acc, lane_true),
                    });
                }
                let result = accumulated.expect("vector shapes have lanes");
                let result = self.coerce_bool_to_i32(result);
                self.push(result);
            }
        }
    }

    fn emit_simd_shift(&mut self, shape: LaneShape, op: SimdShiftOp) {
        let count = self.pop();
        let vector = self.pop();

        // Wrap the scalar count to the lane width, then splat it.
        let mask = self
            .builder
            .constant(Literal::I32((shape.lane_bits() - 1) as i32));
        let count = self.builder.binary(BinaryOp::And, count, mask);
        let count = match shape {
            LaneShape::I8x16 | LaneShape::I16x8 => {
                self.builder.cast(CastOp::Trunc, count, lane_ir_type(shape))
            }
            LaneShape::I32x4 => count,
            LaneShape::I64x2 => self.builder.cast(CastOp::Zext, count, IrType::I64),
        };
        let count_vector = self.builder.vector_splat(shape.lanes(), count);

        let bin = match op {
            SimdShiftOp::Shl => BinaryOp::Shl,
            SimdShiftOp::ShrS => BinaryOp::AShr,
            SimdShiftOp::ShrU => BinaryOp::LShr,
        };
        let result = self
            .builder
            .vector_binary(bin, shape.lanes(), vector, count_vector);
        self.push(result);
    }

    /// Saturating lane-wise float-to-int: nested vector selects. NaN lanes
    /// become zero, out-of-range lanes clamp to the extreme integers.
    fn emit_simd_trunc_sat(&mut self, shape: FloatShape, signed: bool) {
        let operand = self.pop();
        let lanes = shape.lanes();

        let (min_float, max_float, min_int, max_int) = match (shape, signed) {
            (FloatShape::F32x4, true) => (
                Literal::F32(0xcf00_0000), // INT32_MIN
                Literal::F32(0x4f00_0000), // INT32_MAX rounds up to 2^31
                Literal::I32(i32::MIN),
                Literal::I32(i32::MAX),
            ),
            (FloatShape::F32x4, false) => (
                Literal::F32(0),
                Literal::F32(0x4f80_0000), // 2^32
                Literal::I32(0),
                Literal::I32(-1), // UINT32_MAX
            ),
            (FloatShape::F64x2, true) => (
                Literal::F64(0xc3e0_0000_0000_0000), // INT64_MIN
                Literal::F64(0x43e0_0000_0000_0000), // 2^63
                Literal::I64(i64::MIN),
                Literal::I64(i64::MAX),
            ),
            (FloatShape::F64x2, false) => (
                Literal::F64(0),
                Literal::F64(0x43f0_0000_0000_0000), // 2^64
                Literal::I64(0),
                Literal::I64(-1), // UINT64_MAX
            ),
        };

        let cast = if signed { CastOp::FpToSi } else { CastOp::FpToUi };
        let converted = self.builder.vector_cast(cast, lanes, operand);

        let max_float_splat = self.splat_literal(lanes, max_float);
        let max_int_splat = self.splat_literal(lanes, max_int);
        let too_high = self
            .builder
            .vector_compare(CmpOp::FOge, lanes, operand, max_float_splat);
        let result = self.emit_bit_select(too_high, max_int_splat, converted);

        let min_float_splat = self.splat_literal(lanes, min_float);
        let min_int_splat = self.splat_literal(lanes, min_int);
        let too_low = self
            .builder
            .vector_compare(CmpOp::FOle, lanes, operand, min_float_splat);
        let result = self.emit_bit_select(too_low, min_int_splat, result);

        let zero = self.builder.constant(Literal::V128([0; 16]));
        let is_nan = self.builder.vector_compare(CmpOp::FUno, lanes, operand, operand);
        let result = self.emit_bit_select(is_nan, zero, result);

        self.push(result);
    }
}
