//! WebAssembly operator records and decoding.
//!
//! This module defines the typed operator records the emitter consumes, and
//! the decoding logic that produces them from function-body bytes. The
//! prefixed opcode spaces (`0xFC` saturating truncations, `0xFD` SIMD,
//! `0xFE` atomics) decode into their own record families.
//!
//! Per the validator contract, decoding fails only on *malformed* input
//! (unknown opcode bytes, truncated immediates), never on type-incorrect
//! operators.

pub mod reader;
pub mod stream;

pub use self::reader::Reader;
pub use self::stream::{decode_with_processor, OperatorProcessor, OperatorStream};

use crate::types::{BlockType, InvalidValueType, ValueType};
use std::fmt;
use thiserror::Error;

/// Error type for operator and module decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("integer encoding overflow at offset {offset}")]
    IntegerOverflow { offset: usize },
    #[error("malformed opcode {opcode:#04x} at offset {offset}")]
    MalformedOpcode { opcode: u32, offset: usize },
    #[error(transparent)]
    InvalidValueType(#[from] InvalidValueType),
    #[error("invalid block type at offset {offset}")]
    InvalidBlockType { offset: usize },
    #[error("invalid utf-8 in name at offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("malformed section: {0}")]
    MalformedSection(String),
}

/// Memory immediate: alignment exponent and static byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    /// Alignment as a power of 2.
    pub align: u32,
    /// Static offset added to the dynamic address.
    pub offset: u32,
}

impl MemArg {
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let align = reader.read_vu32()?;
        let offset = reader.read_vu32()?;
        Ok(MemArg { align, offset })
    }
}

impl BlockType {
    /// Decode a block type: empty marker, single value type, or a signed
    /// 33-bit type index.
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let offset = reader.pos();
        let b = reader.peek_byte()?;
        if b == 0x40 {
            reader.read_byte()?;
            Ok(BlockType::Empty)
        } else if ValueType::is_value_type_byte(b) {
            reader.read_byte()?;
            Ok(BlockType::Value(ValueType::decode(b)?))
        } else {
            let index = reader.read_vs33()?;
            if index < 0 || index > u32::MAX as i64 {
                return Err(DecodeError::InvalidBlockType { offset });
            }
            Ok(BlockType::FuncType(index as u32))
        }
    }
}

/// The access width of a memory operation, independent of the value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemWidth {
    W8,
    W16,
    W32,
    W64,
}

impl MemWidth {
    pub fn bytes(self) -> u32 {
        match self {
            MemWidth::W8 => 1,
            MemWidth::W16 => 2,
            MemWidth::W32 => 4,
            MemWidth::W64 => 8,
        }
    }

    /// Natural alignment, as a power-of-two exponent.
    pub fn align_log2(self) -> u32 {
        self.bytes().trailing_zeros()
    }
}

/// The read-modify-write operations shared by all atomic RMW opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmwOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Xchg,
}

impl RmwOp {
    fn name(self) -> &'static str {
        match self {
            RmwOp::Add => "add",
            RmwOp::Sub => "sub",
            RmwOp::And => "and",
            RmwOp::Or => "or",
            RmwOp::Xor => "xor",
            RmwOp::Xchg => "xchg",
        }
    }
}

/// Atomic operator records (0xFE prefix).
///
/// The load/store/RMW families are stored structurally (type + width + op)
/// rather than as one variant per opcode; every member of a family lowers
/// identically up to those three parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AtomicOp {
    /// Wake waiters at an address.
    Wake { memarg: MemArg },
    I32Wait { memarg: MemArg },
    I64Wait { memarg: MemArg },
    /// Atomic load; narrow widths zero-extend.
    Load {
        ty: ValueType,
        width: MemWidth,
        memarg: MemArg,
    },
    /// Atomic store; narrow widths wrap.
    Store {
        ty: ValueType,
        width: MemWidth,
        memarg: MemArg,
    },
    Rmw {
        ty: ValueType,
        width: MemWidth,
        op: RmwOp,
        memarg: MemArg,
    },
    Cmpxchg {
        ty: ValueType,
        width: MemWidth,
        memarg: MemArg,
    },
}

/// Integer lane interpretation of a v128.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneShape {
    I8x16,
    I16x8,
    I32x4,
    I64x2,
}

impl LaneShape {
    pub fn lanes(self) -> u32 {
        match self {
            LaneShape::I8x16 => 16,
            LaneShape::I16x8 => 8,
            LaneShape::I32x4 => 4,
            LaneShape::I64x2 => 2,
        }
    }

    pub fn lane_bits(self) -> u32 {
        128 / self.lanes()
    }

    fn name(self) -> &'static str {
        match self {
            LaneShape::I8x16 => "i8x16",
            LaneShape::I16x8 => "i16x8",
            LaneShape::I32x4 => "i32x4",
            LaneShape::I64x2 => "i64x2",
        }
    }
}

/// Float lane interpretation of a v128.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatShape {
    F32x4,
    F64x2,
}

impl FloatShape {
    pub fn lanes(self) -> u32 {
        match self {
            FloatShape::F32x4 => 4,
            FloatShape::F64x2 => 2,
        }
    }

    /// The integer shape with the same lane count.
    pub fn int_shape(self) -> LaneShape {
        match self {
            FloatShape::F32x4 => LaneShape::I32x4,
            FloatShape::F64x2 => LaneShape::I64x2,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FloatShape::F32x4 => "f32x4",
            FloatShape::F64x2 => "f64x2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdIntUnaryOp {
    Abs,
    Neg,
    AllTrue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdIntBinaryOp {
    Add,
    Sub,
    Mul,
    AddSatS,
    AddSatU,
    SubSatS,
    SubSatU,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdShiftOp {
    Shl,
    ShrS,
    ShrU,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntCmpOp {
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatCmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdFloatUnaryOp {
    Abs,
    Neg,
    Sqrt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdFloatBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

/// SIMD operator records (0xFD prefix).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimdOp {
    V128Const { value: [u8; 16] },
    V128Load { memarg: MemArg },
    V128Store { memarg: MemArg },
    Shuffle { lanes: [u8; 16] },
    Splat { shape: LaneShape },
    FloatSplat { shape: FloatShape },
    ExtractLane { shape: LaneShape, lane: u8, signed: bool },
    ReplaceLane { shape: LaneShape, lane: u8 },
    FloatExtractLane { shape: FloatShape, lane: u8 },
    FloatReplaceLane { shape: FloatShape, lane: u8 },
    Not,
    And,
    AndNot,
    Or,
    Xor,
    Bitselect,
    AnyTrue,
    IntUnary { shape: LaneShape, op: SimdIntUnaryOp },
    IntBinary { shape: LaneShape, op: SimdIntBinaryOp },
    Shift { shape: LaneShape, op: SimdShiftOp },
    IntCompare { shape: LaneShape, op: IntCmpOp },
    FloatUnary { shape: FloatShape, op: SimdFloatUnaryOp },
    FloatBinary { shape: FloatShape, op: SimdFloatBinaryOp },
    FloatCompare { shape: FloatShape, op: FloatCmpOp },
    /// Saturating float-to-int conversion, lane-wise.
    TruncSat { shape: FloatShape, signed: bool },
    /// Int-to-float conversion, lane-wise.
    Convert { shape: FloatShape, signed: bool },
}

/// A decoded operator record: opcode plus immediates.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    // Control
    Unreachable,
    Nop,
    Block { block_type: BlockType },
    Loop { block_type: BlockType },
    If { block_type: BlockType },
    Else,
    End,
    Br { depth: u32 },
    BrIf { depth: u32 },
    BrTable { targets: Vec<u32>, default: u32 },
    Return,
    Call { function_index: u32 },
    CallIndirect { type_index: u32 },

    // Exceptions
    Try { block_type: BlockType },
    Catch { exception_type_index: u32 },
    CatchAll,
    Throw { exception_type_index: u32 },
    Rethrow { catch_depth: u32 },

    // Parametric
    Drop,
    Select,

    // Variables
    LocalGet { local_index: u32 },
    LocalSet { local_index: u32 },
    LocalTee { local_index: u32 },
    GlobalGet { global_index: u32 },
    GlobalSet { global_index: u32 },

    // Memory
    I32Load { memarg: MemArg },
    I64Load { memarg: MemArg },
    F32Load { memarg: MemArg },
    F64Load { memarg: MemArg },
    I32Load8S { memarg: MemArg },
    I32Load8U { memarg: MemArg },
    I32Load16S { memarg: MemArg },
    I32Load16U { memarg: MemArg },
    I64Load8S { memarg: MemArg },
    I64Load8U { memarg: MemArg },
    I64Load16S { memarg: MemArg },
    I64Load16U { memarg: MemArg },
    I64Load32S { memarg: MemArg },
    I64Load32U { memarg: MemArg },
    I32Store { memarg: MemArg },
    I64Store { memarg: MemArg },
    F32Store { memarg: MemArg },
    F64Store { memarg: MemArg },
    I32Store8 { memarg: MemArg },
    I32Store16 { memarg: MemArg },
    I64Store8 { memarg: MemArg },
    I64Store16 { memarg: MemArg },
    I64Store32 { memarg: MemArg },
    MemorySize,
    MemoryGrow,

    // Constants
    I32Const { value: i32 },
    I64Const { value: i64 },
    F32Const { value: f32 },
    F64Const { value: f64 },

    // i32 numerics
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,

    // i64 numerics
    I64Eqz,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,

    // f32 numerics
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,

    // f64 numerics
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,

    // Conversions
    I32WrapI64,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64ExtendI32S,
    I64ExtendI32U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F32DemoteF64,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,

    // Sign extension
    I32Extend8S,
    I32Extend16S,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,

    // Saturating truncation (0xFC prefix)
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    I64TruncSatF32S,
    I64TruncSatF32U,
    I64TruncSatF64S,
    I64TruncSatF64U,

    // Prefixed families
    Atomic(AtomicOp),
    Simd(SimdOp),
}

impl Operator {
    /// Decode one operator from the reader.
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let offset = reader.pos();
        let opcode = reader.read_byte()?;

        use Operator::*;
        match opcode {
            0x00 => Ok(Unreachable),
            0x01 => Ok(Nop),
            0x02 => Ok(Block {
                block_type: BlockType::decode(reader)?,
            }),
            0x03 => Ok(Loop {
                block_type: BlockType::decode(reader)?,
            }),
            0x04 => Ok(If {
                block_type: BlockType::decode(reader)?,
            }),
            0x05 => Ok(Else),
            0x06 => Ok(Try {
                block_type: BlockType::decode(reader)?,
            }),
            0x07 => Ok(Catch {
                exception_type_index: reader.read_vu32()?,
            }),
            0x08 => Ok(Throw {
                exception_type_index: reader.read_vu32()?,
            }),
            0x09 => Ok(Rethrow {
                catch_depth: reader.read_vu32()?,
            }),
            0x0b => Ok(End),
            0x0c => Ok(Br {
                depth: reader.read_vu32()?,
            }),
            0x0d => Ok(BrIf {
                depth: reader.read_vu32()?,
            }),
            0x0e => {
                let count = reader.read_vu32()?;
                let mut targets = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    targets.push(reader.read_vu32()?);
                }
                let default = reader.read_vu32()?;
                Ok(BrTable { targets, default })
            }
            0x0f => Ok(Return),
            0x10 => Ok(Call {
                function_index: reader.read_vu32()?,
            }),
            0x11 => {
                let type_index = reader.read_vu32()?;
                // The table index byte is reserved.
                reader.read_vu32()?;
                Ok(CallIndirect { type_index })
            }
            0x19 => Ok(CatchAll),

            0x1a => Ok(Drop),
            0x1b => Ok(Select),

            0x20 => Ok(LocalGet {
                local_index: reader.read_vu32()?,
            }),
            0x21 => Ok(LocalSet {
                local_index: reader.read_vu32()?,
            }),
            0x22 => Ok(LocalTee {
                local_index: reader.read_vu32()?,
            }),
            0x23 => Ok(GlobalGet {
                global_index: reader.read_vu32()?,
            }),
            0x24 => Ok(GlobalSet {
                global_index: reader.read_vu32()?,
            }),

            0x28 => Ok(I32Load { memarg: MemArg::decode(reader)? }),
            0x29 => Ok(I64Load { memarg: MemArg::decode(reader)? }),
            0x2a => Ok(F32Load { memarg: MemArg::decode(reader)? }),
            0x2b => Ok(F64Load { memarg: MemArg::decode(reader)? }),
            0x2c => Ok(I32Load8S { memarg: MemArg::decode(reader)? }),
            0x2d => Ok(I32Load8U { memarg: MemArg::decode(reader)? }),
            0x2e => Ok(I32Load16S { memarg: MemArg::decode(reader)? }),
            0x2f => Ok(I32Load16U { memarg: MemArg::decode(reader)? }),
            0x30 => Ok(I64Load8S { memarg: MemArg::decode(reader)? }),
            0x31 => Ok(I64Load8U { memarg: MemArg::decode(reader)? }),
            0x32 => Ok(I64Load16S { memarg: MemArg::decode(reader)? }),
            0x33 => Ok(I64Load16U { memarg: MemArg::decode(reader)? }),
            0x34 => Ok(I64Load32S { memarg: MemArg::decode(reader)? }),
            0x35 => Ok(I64Load32U { memarg: MemArg::decode(reader)? }),
            0x36 => Ok(I32Store { memarg: MemArg::decode(reader)? }),
            0x37 => Ok(I64Store { memarg: MemArg::decode(reader)? }),
            0x38 => Ok(F32Store { memarg: MemArg::decode(reader)? }),
            0x39 => Ok(F64Store { memarg: MemArg::decode(reader)? }),
            0x3a => Ok(I32Store8 { memarg: MemArg::decode(reader)? }),
            0x3b => Ok(I32Store16 { memarg: MemArg::decode(reader)? }),
            0x3c => Ok(I64Store8 { memarg: MemArg::decode(reader)? }),
            0x3d => Ok(I64Store16 { memarg: MemArg::decode(reader)? }),
            0x3e => Ok(I64Store32 { memarg: MemArg::decode(reader)? }),
            0x3f => {
                reader.read_byte()?; // reserved memory index
                Ok(MemorySize)
            }
            0x40 => {
                reader.read_byte()?; // reserved memory index
                Ok(MemoryGrow)
            }

            0x41 => Ok(I32Const {
                value: reader.read_vs32()?,
            }),
            0x42 => Ok(I64Const {
                value: reader.read_vs64()?,
            }),
            0x43 => Ok(F32Const {
                value: reader.read_f32()?,
            }),
            0x44 => Ok(F64Const {
                value: reader.read_f64()?,
            }),

            0x45 => Ok(I32Eqz),
            0x46 => Ok(I32Eq),
            0x47 => Ok(I32Ne),
            0x48 => Ok(I32LtS),
            0x49 => Ok(I32LtU),
            0x4a => Ok(I32GtS),
            0x4b => Ok(I32GtU),
            0x4c => Ok(I32LeS),
            0x4d => Ok(I32LeU),
            0x4e => Ok(I32GeS),
            0x4f => Ok(I32GeU),
            0x50 => Ok(I64Eqz),
            0x51 => Ok(I64Eq),
            0x52 => Ok(I64Ne),
            0x53 => Ok(I64LtS),
            0x54 => Ok(I64LtU),
            0x55 => Ok(I64GtS),
            0x56 => Ok(I64GtU),
            0x57 => Ok(I64LeS),
            0x58 => Ok(I64LeU),
            0x59 => Ok(I64GeS),
            0x5a => Ok(I64GeU),
            0x5b => Ok(F32Eq),
            0x5c => Ok(F32Ne),
            0x5d => Ok(F32Lt),
            0x5e => Ok(F32Gt),
            0x5f => Ok(F32Le),
            0x60 => Ok(F32Ge),
            0x61 => Ok(F64Eq),
            0x62 => Ok(F64Ne),
            0x63 => Ok(F64Lt),
            0x64 => Ok(F64Gt),
            0x65 => Ok(F64Le),
            0x66 => Ok(F64Ge),
            0x67 => Ok(I32Clz),
            0x68 => Ok(I32Ctz),
            0x69 => Ok(I32Popcnt),
            0x6a => Ok(I32Add),
            0x6b => Ok(I32Sub),
            0x6c => Ok(I32Mul),
            0x6d => Ok(I32DivS),
            0x6e => Ok(I32DivU),
            0x6f => Ok(I32RemS),
            0x70 => Ok(I32RemU),
            0x71 => Ok(I32And),
            0x72 => Ok(I32Or),
            0x73 => Ok(I32Xor),
            0x74 => Ok(I32Shl),
            0x75 => Ok(I32ShrS),
            0x76 => Ok(I32ShrU),
            0x77 => Ok(I32Rotl),
            0x78 => Ok(I32Rotr),
            0x79 => Ok(I64Clz),
            0x7a => Ok(I64Ctz),
            0x7b => Ok(I64Popcnt),
            0x7c => Ok(I64Add),
            0x7d => Ok(I64Sub),
            0x7e => Ok(I64Mul),
            0x7f => Ok(I64DivS),
            0x80 => Ok(I64DivU),
            0x81 => Ok(I64RemS),
            0x82 => Ok(I64RemU),
            0x83 => Ok(I64And),
            0x84 => Ok(I64Or),
            0x85 => Ok(I64Xor),
            0x86 => Ok(I64Shl),
            0x87 => Ok(I64ShrS),
            0x88 => Ok(I64ShrU),
            0x89 => Ok(I64Rotl),
            0x8a => Ok(I64Rotr),
            0x8b => Ok(F32Abs),
            0x8c => Ok(F32Neg),
            0x8d => Ok(F32Ceil),
            0x8e => Ok(F32Floor),
            0x8f => Ok(F32Trunc),
            0x90 => Ok(F32Nearest),
            0x91 => Ok(F32Sqrt),
            0x92 => Ok(F32Add),
            0x93 => Ok(F32Sub),
            0x94 => Ok(F32Mul),
            0x95 => Ok(F32Div),
            0x96 => Ok(F32Min),
            0x97 => Ok(F32Max),
            0x98 => Ok(F32Copysign),
            0x99 => Ok(F64Abs),
            0x9a => Ok(F64Neg),
            0x9b => Ok(F64Ceil),
            0x9c => Ok(F64Floor),
            0x9d => Ok(F64Trunc),
            0x9e => Ok(F64Nearest),
            0x9f => Ok(F64Sqrt),
            0xa0 => Ok(F64Add),
            0xa1 => Ok(F64Sub),
            0xa2 => Ok(F64Mul),
            0xa3 => Ok(F64Div),
            0xa4 => Ok(F64Min),
            0xa5 => Ok(F64Max),
            0xa6 => Ok(F64Copysign),
            0xa7 => Ok(I32WrapI64),
            0xa8 => Ok(I32TruncF32S),
            0xa9 => Ok(I32TruncF32U),
            0xaa => Ok(I32TruncF64S),
            0xab => Ok(I32TruncF64U),
            0xac => Ok(I64ExtendI32S),
            0xad => Ok(I64ExtendI32U),
            0xae => Ok(I64TruncF32S),
            0xaf => Ok(I64TruncF32U),
            0xb0 => Ok(I64TruncF64S),
            0xb1 => Ok(I64TruncF64U),
            0xb2 => Ok(F32ConvertI32S),
            0xb3 => Ok(F32ConvertI32U),
            0xb4 => Ok(F32ConvertI64S),
            0xb5 => Ok(F32ConvertI64U),
            0xb6 => Ok(F32DemoteF64),
            0xb7 => Ok(F64ConvertI32S),
            0xb8 => Ok(F64ConvertI32U),
            0xb9 => Ok(F64ConvertI64S),
            0xba => Ok(F64ConvertI64U),
            0xbb => Ok(F64PromoteF32),
            0xbc => Ok(I32ReinterpretF32),
            0xbd => Ok(I64ReinterpretF64),
            0xbe => Ok(F32ReinterpretI32),
            0xbf => Ok(F64ReinterpretI64),
            0xc0 => Ok(I32Extend8S),
            0xc1 => Ok(I32Extend16S),
            0xc2 => Ok(I64Extend8S),
            0xc3 => Ok(I64Extend16S),
            0xc4 => Ok(I64Extend32S),

            0xfc => {
                let sub = reader.read_vu32()?;
                match sub {
                    0 => Ok(I32TruncSatF32S),
                    1 => Ok(I32TruncSatF32U),
                    2 => Ok(I32TruncSatF64S),
                    3 => Ok(I32TruncSatF64U),
                    4 => Ok(I64TruncSatF32S),
                    5 => Ok(I64TruncSatF32U),
                    6 => Ok(I64TruncSatF64S),
                    7 => Ok(I64TruncSatF64U),
                    _ => Err(DecodeError::MalformedOpcode {
                        opcode: 0xfc00 | sub,
                        offset,
                    }),
                }
            }
            0xfd => Ok(Simd(SimdOp::decode(reader, offset)?)),
            0xfe => Ok(Atomic(AtomicOp::decode(reader, offset)?)),

            _ => Err(DecodeError::MalformedOpcode {
                opcode: opcode as u32,
                offset,
            }),
        }
    }
}

impl AtomicOp {
    /// Map an index within a seven-opcode family to (value type, width).
    /// Families are laid out i32, i64, then the narrow widths.
    fn family_slot(index: u32) -> Option<(ValueType, MemWidth)> {
        Some(match index {
            0 => (ValueType::I32, MemWidth::W32),
            1 => (ValueType::I64, MemWidth::W64),
            2 => (ValueType::I32, MemWidth::W8),
            3 => (ValueType::I32, MemWidth::W16),
            4 => (ValueType::I64, MemWidth::W8),
            5 => (ValueType::I64, MemWidth::W16),
            6 => (ValueType::I64, MemWidth::W32),
            _ => return None,
        })
    }

    fn decode(reader: &mut Reader, offset: usize) -> Result<Self, DecodeError> {
        let sub = reader.read_vu32()?;
        let malformed = DecodeError::MalformedOpcode {
            opcode: 0xfe00 | sub,
            offset,
        };

        let op = match sub {
            0x00 => AtomicOp::Wake {
                memarg: MemArg::decode(reader)?,
            },
            0x01 => AtomicOp::I32Wait {
                memarg: MemArg::decode(reader)?,
            },
            0x02 => AtomicOp::I64Wait {
                memarg: MemArg::decode(reader)?,
            },
            0x10..=0x16 => {
                // Loads; narrow slots are the unsigned forms.
                let (ty, width) = Self::family_slot(sub - 0x10).ok_or(malformed)?;
                AtomicOp::Load {
                    ty,
                    width,
                    memarg: MemArg::decode(reader)?,
                }
            }
            0x17..=0x1d => {
                let (ty, width) = Self::family_slot(sub - 0x17).ok_or(malformed)?;
                AtomicOp::Store {
                    ty,
                    width,
                    memarg: MemArg::decode(reader)?,
                }
            }
            0x1e..=0x4e => {
                let family = (sub - 0x1e) / 7;
                let slot = (sub - 0x1e) % 7;
                let (ty, width) = Self::family_slot(slot).ok_or(malformed)?;
                let memarg = MemArg::decode(reader)?;
                match family {
                    0 => AtomicOp::Rmw { ty, width, op: RmwOp::Add, memarg },
                    1 => AtomicOp::Rmw { ty, width, op: RmwOp::Sub, memarg },
                    2 => AtomicOp::Rmw { ty, width, op: RmwOp::And, memarg },
                    3 => AtomicOp::Rmw { ty, width, op: RmwOp::Or, memarg },
                    4 => AtomicOp::Rmw { ty, width, op: RmwOp::Xor, memarg },
                    5 => AtomicOp::Rmw { ty, width, op: RmwOp::Xchg, memarg },
                    6 => AtomicOp::Cmpxchg { ty, width, memarg },
                    _ => unreachable!(),
                }
            }
            _ => return Err(malformed),
        };
        Ok(op)
    }

    /// The memory immediate carried by this operator.
    pub fn memarg(&self) -> MemArg {
        match *self {
            AtomicOp::Wake { memarg }
            | AtomicOp::I32Wait { memarg }
            | AtomicOp::I64Wait { memarg }
            | AtomicOp::Load { memarg, .. }
            | AtomicOp::Store { memarg, .. }
            | AtomicOp::Rmw { memarg, .. }
            | AtomicOp::Cmpxchg { memarg, .. } => memarg,
        }
    }
}

impl SimdOp {
    fn decode(reader: &mut Reader, offset: usize) -> Result<Self, DecodeError> {
        let sub = reader.read_vu32()?;
        let malformed = DecodeError::MalformedOpcode {
            opcode: 0xfd00 | sub,
            offset,
        };

        use SimdOp::*;
        let op = match sub {
            0x00 => V128Load {
                memarg: MemArg::decode(reader)?,
            },
            0x0b => V128Store {
                memarg: MemArg::decode(reader)?,
            },
            0x0c => V128Const {
                value: reader.read_16_bytes()?,
            },
            0x0d => Shuffle {
                lanes: reader.read_16_bytes()?,
            },
            0x0f => Splat { shape: LaneShape::I8x16 },
            0x10 => Splat { shape: LaneShape::I16x8 },
            0x11 => Splat { shape: LaneShape::I32x4 },
            0x12 => Splat { shape: LaneShape::I64x2 },
            0x13 => FloatSplat { shape: FloatShape::F32x4 },
            0x14 => FloatSplat { shape: FloatShape::F64x2 },
            0x15 => ExtractLane {
                shape: LaneShape::I8x16,
                lane: reader.read_byte()?,
                signed: true,
            },
            0x16 => ExtractLane {
                shape: LaneShape::I8x16,
                lane: reader.read_byte()?,
                signed: false,
            },
            0x17 => ReplaceLane {
                shape: LaneShape::I8x16,
                lane: reader.read_byte()?,
            },
            0x18 => ExtractLane {
                shape: LaneShape::I16x8,
                lane: reader.read_byte()?,
                signed: true,
            },
            0x19 => ExtractLane {
                shape: LaneShape::I16x8,
                lane: reader.read_byte()?,
                signed: false,
            },
            0x1a => ReplaceLane {
                shape: LaneShape::I16x8,
                lane: reader.read_byte()?,
            },
            0x1b => ExtractLane {
                shape: LaneShape::I32x4,
                lane: reader.read_byte()?,
                signed: false,
            },
            0x1c => ReplaceLane {
                shape: LaneShape::I32x4,
                lane: reader.read_byte()?,
            },
            0x1d => ExtractLane {
                shape: LaneShape::I64x2,
                lane: reader.read_byte()?,
                signed: false,
            },
            0x1e => ReplaceLane {
                shape: LaneShape::I64x2,
                lane: reader.read_byte()?,
            },
            0x1f => FloatExtractLane {
                shape: FloatShape::F32x4,
                lane: reader.read_byte()?,
            },
            0x20 => FloatReplaceLane {
                shape: FloatShape::F32x4,
                lane: reader.read_byte()?,
            },
            0x21 => FloatExtractLane {
                shape: FloatShape::F64x2,
                lane: reader.read_byte()?,
            },
            0x22 => FloatReplaceLane {
                shape: FloatShape::F64x2,
                lane: reader.read_byte()?,
            },
            0x23..=0x2c => IntCompare {
                shape: LaneShape::I8x16,
                op: int_cmp_from_index(sub - 0x23),
            },
            0x2d..=0x36 => IntCompare {
                shape: LaneShape::I16x8,
                op: int_cmp_from_index(sub - 0x2d),
            },
            0x37..=0x40 => IntCompare {
                shape: LaneShape::I32x4,
                op: int_cmp_from_index(sub - 0x37),
            },
            0x41..=0x46 => FloatCompare {
                shape: FloatShape::F32x4,
                op: float_cmp_from_index(sub - 0x41),
            },
            0x47..=0x4c => FloatCompare {
                shape: FloatShape::F64x2,
                op: float_cmp_from_index(sub - 0x47),
            },
            0x4d => Not,
            0x4e => And,
            0x4f => AndNot,
            0x50 => Or,
            0x51 => Xor,
            0x52 => Bitselect,
            0x53 => AnyTrue,
            0x60 | 0x80 | 0xa0 | 0xc0 => IntUnary {
                shape: int_shape_from_block(sub),
                op: SimdIntUnaryOp::Abs,
            },
            0x61 | 0x81 | 0xa1 | 0xc1 => IntUnary {
                shape: int_shape_from_block(sub),
                op: SimdIntUnaryOp::Neg,
            },
            0x63 | 0x83 | 0xa3 | 0xc3 => IntUnary {
                shape: int_shape_from_block(sub),
                op: SimdIntUnaryOp::AllTrue,
            },
            0x6b | 0x8b | 0xab | 0xcb => Shift {
                shape: int_shape_from_block(sub),
                op: SimdShiftOp::Shl,
            },
            0x6c | 0x8c | 0xac | 0xcc => Shift {
                shape: int_shape_from_block(sub),
                op: SimdShiftOp::ShrS,
            },
            0x6d | 0x8d | 0xad | 0xcd => Shift {
                shape: int_shape_from_block(sub),
                op: SimdShiftOp::ShrU,
            },
            0x6e | 0x8e | 0xae | 0xce => IntBinary {
                shape: int_shape_from_block(sub),
                op: SimdIntBinaryOp::Add,
            },
            0x6f | 0x8f => IntBinary {
                shape: int_shape_from_block(sub),
                op: SimdIntBinaryOp::AddSatS,
            },
            0x70 | 0x90 => IntBinary {
                shape: int_shape_from_block(sub),
                op: SimdIntBinaryOp::AddSatU,
            },
            0x71 | 0x91 | 0xb1 | 0xd1 => IntBinary {
                shape: int_shape_from_block(sub),
                op: SimdIntBinaryOp::Sub,
            },
            0x72 | 0x92 => IntBinary {
                shape: int_shape_from_block(sub),
                op: SimdIntBinaryOp::SubSatS,
            },
            0x73 | 0x93 => IntBinary {
                shape: int_shape_from_block(sub),
                op: SimdIntBinaryOp::SubSatU,
            },
            0x95 | 0xb5 | 0xd5 => IntBinary {
                shape: int_shape_from_block(sub),
                op: SimdIntBinaryOp::Mul,
            },
            0xe0 | 0xec => FloatUnary {
                shape: float_shape_from_block(sub),
                op: SimdFloatUnaryOp::Abs,
            },
            0xe1 | 0xed => FloatUnary {
                shape: float_shape_from_block(sub),
                op: SimdFloatUnaryOp::Neg,
            },
            0xe3 | 0xef => FloatUnary {
                shape: float_shape_from_block(sub),
                op: SimdFloatUnaryOp::Sqrt,
            },
            0xe4 | 0xf0 => FloatBinary {
                shape: float_shape_from_block(sub),
                op: SimdFloatBinaryOp::Add,
            },
            0xe5 | 0xf1 => FloatBinary {
                shape: float_shape_from_block(sub),
                op: SimdFloatBinaryOp::Sub,
            },
            0xe6 | 0xf2 => FloatBinary {
                shape: float_shape_from_block(sub),
                op: SimdFloatBinaryOp::Mul,
            },
            0xe7 | 0xf3 => FloatBinary {
                shape: float_shape_from_block(sub),
                op: SimdFloatBinaryOp::Div,
            },
            0xe8 | 0xf4 => FloatBinary {
                shape: float_shape_from_block(sub),
                op: SimdFloatBinaryOp::Min,
            },
            0xe9 | 0xf5 => FloatBinary {
                shape: float_shape_from_block(sub),
                op: SimdFloatBinaryOp::Max,
            },
            0xf8 => TruncSat {
                shape: FloatShape::F32x4,
                signed: true,
            },
            0xf9 => TruncSat {
                shape: FloatShape::F32x4,
                signed: false,
            },
            0xfa => Convert {
                shape: FloatShape::F32x4,
                signed: true,
            },
            0xfb => Convert {
                shape: FloatShape::F32x4,
                signed: false,
            },
            _ => return Err(malformed),
        };
        Ok(op)
    }
}

fn int_cmp_from_index(index: u32) -> IntCmpOp {
    match index {
        0 => IntCmpOp::Eq,
        1 => IntCmpOp::Ne,
        2 => IntCmpOp::LtS,
        3 => IntCmpOp::LtU,
        4 => IntCmpOp::GtS,
        5 => IntCmpOp::GtU,
        6 => IntCmpOp::LeS,
        7 => IntCmpOp::LeU,
        8 => IntCmpOp::GeS,
        9 => IntCmpOp::GeU,
        _ => unreachable!(),
    }
}

fn float_cmp_from_index(index: u32) -> FloatCmpOp {
    match index {
        0 => FloatCmpOp::Eq,
        1 => FloatCmpOp::Ne,
        2 => FloatCmpOp::Lt,
        3 => FloatCmpOp::Gt,
        4 => FloatCmpOp::Le,
        5 => FloatCmpOp::Ge,
        _ => unreachable!(),
    }
}

/// The 0xFD arithmetic opcodes repeat per shape in 0x20-sized blocks
/// starting at 0x60.
fn int_shape_from_block(sub: u32) -> LaneShape {
    match (sub - 0x60) / 0x20 {
        0 => LaneShape::I8x16,
        1 => LaneShape::I16x8,
        2 => LaneShape::I32x4,
        3 => LaneShape::I64x2,
        _ => unreachable!(),
    }
}

fn float_shape_from_block(sub: u32) -> FloatShape {
    if sub < 0xec {
        FloatShape::F32x4
    } else {
        FloatShape::F64x2
    }
}

impl AtomicOp {
    /// Whether the access width matches the full value width.
    fn is_full_width(ty: ValueType, width: MemWidth) -> bool {
        width.bytes() * 8 == ty.bit_width()
    }
}

impl fmt::Display for AtomicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AtomicOp::Wake { memarg } => write!(f, "atomic.wake {} {}", memarg.align, memarg.offset),
            AtomicOp::I32Wait { memarg } => {
                write!(f, "i32.atomic.wait {} {}", memarg.align, memarg.offset)
            }
            AtomicOp::I64Wait { memarg } => {
                write!(f, "i64.atomic.wait {} {}", memarg.align, memarg.offset)
            }
            AtomicOp::Load { ty, width, memarg } => {
                if Self::is_full_width(ty, width) {
                    write!(f, "{ty}.atomic.load")?;
                } else {
                    write!(f, "{ty}.atomic.load{}_u", width.bytes() * 8)?;
                }
                write!(f, " {} {}", memarg.align, memarg.offset)
            }
            AtomicOp::Store { ty, width, memarg } => {
                if Self::is_full_width(ty, width) {
                    write!(f, "{ty}.atomic.store")?;
                } else {
                    write!(f, "{ty}.atomic.store{}", width.bytes() * 8)?;
                }
                write!(f, " {} {}", memarg.align, memarg.offset)
            }
            AtomicOp::Rmw { ty, width, op, memarg } => {
                if Self::is_full_width(ty, width) {
                    write!(f, "{ty}.atomic.rmw.{}", op.name())?;
                } else {
                    write!(f, "{ty}.atomic.rmw{}.{}_u", width.bytes() * 8, op.name())?;
                }
                write!(f, " {} {}", memarg.align, memarg.offset)
            }
            AtomicOp::Cmpxchg { ty, width, memarg } => {
                if Self::is_full_width(ty, width) {
                    write!(f, "{ty}.atomic.rmw.cmpxchg")?;
                } else {
                    write!(f, "{ty}.atomic.rmw{}.cmpxchg_u", width.bytes() * 8)?;
                }
                write!(f, " {} {}", memarg.align, memarg.offset)
            }
        }
    }
}

impl fmt::Display for SimdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SimdOp::*;
        match *self {
            V128Const { value } => {
                write!(f, "v128.const")?;
                for byte in value {
                    write!(f, " {byte:#04x}")?;
                }
                Ok(())
            }
            V128Load { memarg } => write!(f, "v128.load {} {}", memarg.align, memarg.offset),
            V128Store { memarg } => write!(f, "v128.store {} {}", memarg.align, memarg.offset),
            Shuffle { lanes } => {
                write!(f, "i8x16.shuffle")?;
                for lane in lanes {
                    write!(f, " {lane}")?;
                }
                Ok(())
            }
            Splat { shape } => write!(f, "{}.splat", shape.name()),
            FloatSplat { shape } => write!(f, "{}.splat", shape.name()),
            ExtractLane { shape, lane, signed } => {
                if shape.lane_bits() < 32 {
                    let sign = if signed { "s" } else { "u" };
                    write!(f, "{}.extract_lane_{sign} {lane}", shape.name())
                } else {
                    write!(f, "{}.extract_lane {lane}", shape.name())
                }
            }
            ReplaceLane { shape, lane } => write!(f, "{}.replace_lane {lane}", shape.name()),
            FloatExtractLane { shape, lane } => {
                write!(f, "{}.extract_lane {lane}", shape.name())
            }
            FloatReplaceLane { shape, lane } => {
                write!(f, "{}.replace_lane {lane}", shape.name())
            }
            Not => write!(f, "v128.not"),
            And => write!(f, "v128.and"),
            AndNot => write!(f, "v128.andnot"),
            Or => write!(f, "v128.or"),
            Xor => write!(f, "v128.xor"),
            Bitselect => write!(f, "v128.bitselect"),
            AnyTrue => write!(f, "v128.any_true"),
            IntUnary { shape, op } => {
                let name = match op {
                    SimdIntUnaryOp::Abs => "abs",
                    SimdIntUnaryOp::Neg => "neg",
                    SimdIntUnaryOp::AllTrue => "all_true",
                };
                write!(f, "{}.{name}", shape.name())
            }
            IntBinary { shape, op } => {
                let name = match op {
                    SimdIntBinaryOp::Add => "add",
                    SimdIntBinaryOp::Sub => "sub",
                    SimdIntBinaryOp::Mul => "mul",
                    SimdIntBinaryOp::AddSatS => "add_sat_s",
                    SimdIntBinaryOp::AddSatU => "add_sat_u",
                    SimdIntBinaryOp::SubSatS => "sub_sat_s",
                    SimdIntBinaryOp::SubSatU => "sub_sat_u",
                };
                write!(f, "{}.{name}", shape.name())
            }
            Shift { shape, op } => {
                let name = match op {
                    SimdShiftOp::Shl => "shl",
                    SimdShiftOp::ShrS => "shr_s",
                    SimdShiftOp::ShrU => "shr_u",
                };
                write!(f, "{}.{name}", shape.name())
            }
            IntCompare { shape, op } => {
                let name = match op {
                    IntCmpOp::Eq => "eq",
                    IntCmpOp::Ne => "ne",
                    IntCmpOp::LtS => "lt_s",
                    IntCmpOp::LtU => "lt_u",
                    IntCmpOp::GtS => "gt_s",
                    IntCmpOp::GtU => "gt_u",
                    IntCmpOp::LeS => "le_s",
                    IntCmpOp::LeU => "le_u",
                    IntCmpOp::GeS => "ge_s",
                    IntCmpOp::GeU => "ge_u",
                };
                write!(f, "{}.{name}", shape.name())
            }
            FloatUnary { shape, op } => {
                let name = match op {
                    SimdFloatUnaryOp::Abs => "abs",
                    SimdFloatUnaryOp::Neg => "neg",
                    SimdFloatUnaryOp::Sqrt => "sqrt",
                };
                write!(f, "{}.{name}", shape.name())
            }
            FloatBinary { shape, op } => {
                let name = match op {
                    SimdFloatBinaryOp::Add => "add",
                    SimdFloatBinaryOp::Sub => "sub",
                    SimdFloatBinaryOp::Mul => "mul",
                    SimdFloatBinaryOp::Div => "div",
                    SimdFloatBinaryOp::Min => "min",
                    SimdFloatBinaryOp::Max => "max",
                };
                write!(f, "{}.{name}", shape.name())
            }
            FloatCompare { shape, op } => {
                let name = match op {
                    FloatCmpOp::Eq => "eq",
                    FloatCmpOp::Ne => "ne",
                    FloatCmpOp::Lt => "lt",
                    FloatCmpOp::Gt => "gt",
                    FloatCmpOp::Le => "le",
                    FloatCmpOp::Ge => "ge",
                };
                write!(f, "{}.{name}", shape.name())
            }
            TruncSat { shape, signed } => {
                let sign = if signed { "s" } else { "u" };
                write!(
                    f,
                    "{}.trunc_sat_{}_{sign}",
                    shape.int_shape().name(),
                    shape.name()
                )
            }
            Convert { shape, signed } => {
                let sign = if signed { "s" } else { "u" };
                write!(
                    f,
                    "{}.convert_{}_{sign}",
                    shape.name(),
                    shape.int_shape().name()
                )
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operator::*;
        match self {
            Block { block_type } | Loop { block_type } | If { block_type } | Try { block_type } => {
                let name = match self {
                    Block { .. } => "block",
                    Loop { .. } => "loop",
                    If { .. } => "if",
                    _ => "try",
                };
                match block_type {
                    BlockType::Empty => write!(f, "{name}"),
                    BlockType::Value(vt) => write!(f, "{name} {vt}"),
                    BlockType::FuncType(idx) => write!(f, "{name} type[{idx}]"),
                }
            }
            Br { depth } => write!(f, "br {depth}"),
            BrIf { depth } => write!(f, "br_if {depth}"),
            BrTable { targets, default } => {
                write!(f, "br_table")?;
                for t in targets {
                    write!(f, " {t}")?;
                }
                write!(f, " {default}")
            }
            Call { function_index } => write!(f, "call {function_index}"),
            CallIndirect { type_index } => write!(f, "call_indirect (type {type_index})"),
            Catch { exception_type_index } => write!(f, "catch {exception_type_index}"),
            Throw { exception_type_index } => write!(f, "throw {exception_type_index}"),
            Rethrow { catch_depth } => write!(f, "rethrow {catch_depth}"),
            LocalGet { local_index } => write!(f, "local.get {local_index}"),
            LocalSet { local_index } => write!(f, "local.set {local_index}"),
            LocalTee { local_index } => write!(f, "local.tee {local_index}"),
            GlobalGet { global_index } => write!(f, "global.get {global_index}"),
            GlobalSet { global_index } => write!(f, "global.set {global_index}"),
            I32Const { value } => write!(f, "i32.const {value}"),
            I64Const { value } => write!(f, "i64.const {value}"),
            F32Const { value } => {
                use fhex::ToHex;
                write!(f, "f32.const {}", value.to_hex())
            }
            F64Const { value } => {
                use fhex::ToHex;
                write!(f, "f64.const {}", value.to_hex())
            }
            Atomic(op) => write!(f, "{op}"),
            Simd(op) => write!(f, "{op}"),
            other => {
                if let Some((name, memarg)) = other.memory_access() {
                    write!(f, "{name} {} {}", memarg.align, memarg.offset)
                } else {
                    write!(f, "{}", other.plain_name())
                }
            }
        }
    }
}

impl Operator {
    /// Mnemonic and immediate for the plain memory access operators.
    fn memory_access(&self) -> Option<(&'static str, MemArg)> {
        use Operator::*;
        Some(match *self {
            I32Load { memarg } => ("i32.load", memarg),
            I64Load { memarg } => ("i64.load", memarg),
            F32Load { memarg } => ("f32.load", memarg),
            F64Load { memarg } => ("f64.load", memarg),
            I32Load8S { memarg } => ("i32.load8_s", memarg),
            I32Load8U { memarg } => ("i32.load8_u", memarg),
            I32Load16S { memarg } => ("i32.load16_s", memarg),
            I32Load16U { memarg } => ("i32.load16_u", memarg),
            I64Load8S { memarg } => ("i64.load8_s", memarg),
            I64Load8U { memarg } => ("i64.load8_u", memarg),
            I64Load16S { memarg } => ("i64.load16_s", memarg),
            I64Load16U { memarg } => ("i64.load16_u", memarg),
            I64Load32S { memarg } => ("i64.load32_s", memarg),
            I64Load32U { memarg } => ("i64.load32_u", memarg),
            I32Store { memarg } => ("i32.store", memarg),
            I64Store { memarg } => ("i64.store", memarg),
            F32Store { memarg } => ("f32.store", memarg),
            F64Store { memarg } => ("f64.store", memarg),
            I32Store8 { memarg } => ("i32.store8", memarg),
            I32Store16 { memarg } => ("i32.store16", memarg),
            I64Store8 { memarg } => ("i64.store8", memarg),
            I64Store16 { memarg } => ("i64.store16", memarg),
            I64Store32 { memarg } => ("i64.store32", memarg),
            _ => return None,
        })
    }

    /// Mnemonic for operators with no immediates.
    fn plain_name(&self) -> &'static str {
        use Operator::*;
        match self {
            Unreachable => "unreachable",
            Nop => "nop",
            Else => "else",
            End => "end",
            Return => "return",
            CatchAll => "catch_all",
            Drop => "drop",
            Select => "select",
            MemorySize => "memory.size",
            MemoryGrow => "memory.grow",
            I32Eqz => "i32.eqz",
            I32Eq => "i32.eq",
            I32Ne => "i32.ne",
            I32LtS => "i32.lt_s",
            I32LtU => "i32.lt_u",
            I32GtS => "i32.gt_s",
            I32GtU => "i32.gt_u",
            I32LeS => "i32.le_s",
            I32LeU => "i32.le_u",
            I32GeS => "i32.ge_s",
            I32GeU => "i32.ge_u",
            I32Clz => "i32.clz",
            I32Ctz => "i32.ctz",
            I32Popcnt => "i32.popcnt",
            I32Add => "i32.add",
            I32Sub => "i32.sub",
            I32Mul => "i32.mul",
            I32DivS => "i32.div_s",
            I32DivU => "i32.div_u",
            I32RemS => "i32.rem_s",
            I32RemU => "i32.rem_u",
            I32And => "i32.and",
            I32Or => "i32.or",
            I32Xor => "i32.xor",
            I32Shl => "i32.shl",
            I32ShrS => "i32.shr_s",
            I32ShrU => "i32.shr_u",
            I32Rotl => "i32.rotl",
            I32Rotr => "i32.rotr",
            I64Eqz => "i64.eqz",
            I64Eq => "i64.eq",
            I64Ne => "i64.ne",
            I64LtS => "i64.lt_s",
            I64LtU => "i64.lt_u",
            I64GtS => "i64.gt_s",
            I64GtU => "i64.gt_u",
            I64LeS => "i64.le_s",
            I64LeU => "i64.le_u",
            I64GeS => "i64.ge_s",
            I64GeU => "i64.ge_u",
            I64Clz => "i64.clz",
            I64Ctz => "i64.ctz",
            I64Popcnt => "i64.popcnt",
            I64Add => "i64.add",
            I64Sub => "i64.sub",
            I64Mul => "i64.mul",
            I64DivS => "i64.div_s",
            I64DivU => "i64.div_u",
            I64RemS => "i64.rem_s",
            I64RemU => "i64.rem_u",
            I64And => "i64.and",
            I64Or => "i64.or",
            I64Xor => "i64.xor",
            I64Shl => "i64.shl",
            I64ShrS => "i64.shr_s",
            I64ShrU => "i64.shr_u",
            I64Rotl => "i64.rotl",
            I64Rotr => "i64.rotr",
            F32Eq => "f32.eq",
            F32Ne => "f32.ne",
            F32Lt => "f32.lt",
            F32Gt => "f32.gt",
            F32Le => "f32.le",
            F32Ge => "f32.ge",
            F32Abs => "f32.abs",
            F32Neg => "f32.neg",
            F32Ceil => "f32.ceil",
            F32Floor => "f32.floor",
            F32Trunc => "f32.trunc",
            F32Nearest => "f32.nearest",
            F32Sqrt => "f32.sqrt",
            F32Add => "f32.add",
            F32Sub => "f32.sub",
            F32Mul => "f32.mul",
            F32Div => "f32.div",
            F32Min => "f32.min",
            F32Max => "f32.max",
            F32Copysign => "f32.copysign",
            F64Eq => "f64.eq",
            F64Ne => "f64.ne",
            F64Lt => "f64.lt",
            F64Gt => "f64.gt",
            F64Le => "f64.le",
            F64Ge => "f64.ge",
            F64Abs => "f64.abs",
            F64Neg => "f64.neg",
            F64Ceil => "f64.ceil",
            F64Floor => "f64.floor",
            F64Trunc => "f64.trunc",
            F64Nearest => "f64.nearest",
            F64Sqrt => "f64.sqrt",
            F64Add => "f64.add",
            F64Sub => "f64.sub",
            F64Mul => "f64.mul",
            F64Div => "f64.div",
            F64Min => "f64.min",
            F64Max => "f64.max",
            F64Copysign => "f64.copysign",
            I32WrapI64 => "i32.wrap_i64",
            I32TruncF32S => "i32.trunc_f32_s",
            I32TruncF32U => "i32.trunc_f32_u",
            I32TruncF64S => "i32.trunc_f64_s",
            I32TruncF64U => "i32.trunc_f64_u",
            I64ExtendI32S => "i64.extend_i32_s",
            I64ExtendI32U => "i64.extend_i32_u",
            I64TruncF32S => "i64.trunc_f32_s",
            I64TruncF32U => "i64.trunc_f32_u",
            I64TruncF64S => "i64.trunc_f64_s",
            I64TruncF64U => "i64.trunc_f64_u",
            F32ConvertI32S => "f32.convert_i32_s",
            F32ConvertI32U => "f32.convert_i32_u",
            F32ConvertI64S => "f32.convert_i64_s",
            F32ConvertI64U => "f32.convert_i64_u",
            F32DemoteF64 => "f32.demote_f64",
            F64ConvertI32S => "f64.convert_i32_s",
            F64ConvertI32U => "f64.convert_i32_u",
            F64ConvertI64S => "f64.convert_i64_s",
            F64ConvertI64U => "f64.convert_i64_u",
            F64PromoteF32 => "f64.promote_f32",
            I32ReinterpretF32 => "i32.reinterpret_f32",
            I64ReinterpretF64 => "i64.reinterpret_f64",
            F32ReinterpretI32 => "f32.reinterpret_i32",
            F64ReinterpretI64 => "f64.reinterpret_i64",
            I32Extend8S => "i32.extend8_s",
            I32Extend16S => "i32.extend16_s",
            I64Extend8S => "i64.extend8_s",
            I64Extend16S => "i64.extend16_s",
            I64Extend32S => "i64.extend32_s",
            I32TruncSatF32S => "i32.trunc_sat_f32_s",
            I32TruncSatF32U => "i32.trunc_sat_f32_u",
            I32TruncSatF64S => "i32.trunc_sat_f64_s",
            I32TruncSatF64U => "i32.trunc_sat_f64_u",
            I64TruncSatF32S => "i64.trunc_sat_f32_s",
            I64TruncSatF32U => "i64.trunc_sat_f32_u",
            I64TruncSatF64S => "i64.trunc_sat_f64_s",
            I64TruncSatF64U => "i64.trunc_sat_f64_u",
            _ => "unknown",
        }
    }
}
