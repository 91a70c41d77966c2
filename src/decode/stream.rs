//! Streaming operator decoder.
//!
//! Produces a lazy, forward-only sequence of [`Operator`] records from a
//! function body. Supports peeking at the next operator without consuming
//! it (used by the emitter's trace logging) and driving an
//! [`OperatorProcessor`] over the whole body.

use super::{DecodeError, Operator, Reader};

/// A forward-only stream of operators over a function body.
///
/// The stream is finite and not restartable; it ends when the bytes run out
/// or the caller stops pulling.
pub struct OperatorStream<'a> {
    reader: Reader<'a>,
}

impl<'a> OperatorStream<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        OperatorStream {
            reader: Reader::new(code),
        }
    }

    /// Whether any bytes remain.
    pub fn has_more(&self) -> bool {
        !self.reader.is_empty()
    }

    /// Byte offset of the next operator.
    pub fn offset(&self) -> usize {
        self.reader.pos()
    }

    /// Decode the next operator, consuming it.
    pub fn next(&mut self) -> Result<Operator, DecodeError> {
        Operator::decode(&mut self.reader)
    }

    /// Decode the next operator without consuming it.
    pub fn peek(&self) -> Result<Operator, DecodeError> {
        let mut lookahead = self.reader.clone();
        Operator::decode(&mut lookahead)
    }
}

/// A handler driven by [`decode_with_processor`], one call per operator.
pub trait OperatorProcessor {
    fn process(&mut self, op: Operator) -> Result<(), DecodeError>;

    /// Called once after the final operator.
    fn finish(&mut self) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Decode an entire function body, dispatching each operator to the
/// processor.
pub fn decode_with_processor<P: OperatorProcessor>(
    code: &[u8],
    processor: &mut P,
) -> Result<(), DecodeError> {
    let mut stream = OperatorStream::new(code);
    while stream.has_more() {
        processor.process(stream.next()?)?;
    }
    processor.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{AtomicOp, MemArg, MemWidth, RmwOp, SimdOp};
    use crate::types::{BlockType, ValueType};

    #[test]
    fn stream_decodes_a_simple_body() {
        // i32.const 3, i32.const 4, i32.add, end
        let code = [0x41, 0x03, 0x41, 0x04, 0x6a, 0x0b];
        let mut stream = OperatorStream::new(&code);

        assert_eq!(stream.next().unwrap(), Operator::I32Const { value: 3 });
        assert_eq!(stream.next().unwrap(), Operator::I32Const { value: 4 });
        assert_eq!(stream.next().unwrap(), Operator::I32Add);
        assert_eq!(stream.next().unwrap(), Operator::End);
        assert!(!stream.has_more());
    }

    #[test]
    fn peek_does_not_consume() {
        let code = [0x01, 0x0b];
        let mut stream = OperatorStream::new(&code);

        assert_eq!(stream.peek().unwrap(), Operator::Nop);
        assert_eq!(stream.peek().unwrap(), Operator::Nop);
        assert_eq!(stream.next().unwrap(), Operator::Nop);
        assert_eq!(stream.peek().unwrap(), Operator::End);
    }

    #[test]
    fn malformed_opcode_is_reported_with_offset() {
        let code = [0x01, 0xf0];
        let mut stream = OperatorStream::new(&code);
        stream.next().unwrap();
        match stream.next() {
            Err(DecodeError::MalformedOpcode { opcode: 0xf0, offset: 1 }) => {}
            other => panic!("expected malformed opcode, got {other:?}"),
        }
    }

    #[test]
    fn decodes_control_immediates() {
        // block (result i32) ... end
        let code = [0x02, 0x7f, 0x0b];
        let mut stream = OperatorStream::new(&code);
        assert_eq!(
            stream.next().unwrap(),
            Operator::Block {
                block_type: BlockType::Value(ValueType::I32)
            }
        );

        // br_table 1 2 default 0
        let code = [0x0e, 0x02, 0x01, 0x02, 0x00];
        let mut stream = OperatorStream::new(&code);
        assert_eq!(
            stream.next().unwrap(),
            Operator::BrTable {
                targets: vec![1, 2],
                default: 0
            }
        );
    }

    #[test]
    fn decodes_negative_block_type_as_index() {
        // A multi-value block type is a signed 33-bit index; 0x01 => type 1.
        let code = [0x02, 0x01, 0x0b];
        let mut stream = OperatorStream::new(&code);
        assert_eq!(
            stream.next().unwrap(),
            Operator::Block {
                block_type: BlockType::FuncType(1)
            }
        );
    }

    #[test]
    fn decodes_memory_and_const_operators() {
        // i32.load align=2 offset=16
        let code = [0x28, 0x02, 0x10];
        assert_eq!(
            OperatorStream::new(&code).next().unwrap(),
            Operator::I32Load {
                memarg: MemArg { align: 2, offset: 16 }
            }
        );

        // f32.const 3.0
        let code = [0x43, 0x00, 0x00, 0x40, 0x40];
        match OperatorStream::new(&code).next().unwrap() {
            Operator::F32Const { value } => assert_eq!(value.to_bits(), 3.0f32.to_bits()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decodes_saturating_truncation_prefix() {
        let code = [0xfc, 0x00];
        assert_eq!(
            OperatorStream::new(&code).next().unwrap(),
            Operator::I32TruncSatF32S
        );
        let code = [0xfc, 0x07];
        assert_eq!(
            OperatorStream::new(&code).next().unwrap(),
            Operator::I64TruncSatF64U
        );
        let code = [0xfc, 0x20];
        assert!(OperatorStream::new(&code).next().is_err());
    }

    #[test]
    fn decodes_atomics() {
        // i32.atomic.rmw.add align=2 offset=0
        let code = [0xfe, 0x1e, 0x02, 0x00];
        assert_eq!(
            OperatorStream::new(&code).next().unwrap(),
            Operator::Atomic(AtomicOp::Rmw {
                ty: ValueType::I32,
                width: MemWidth::W32,
                op: RmwOp::Add,
                memarg: MemArg { align: 2, offset: 0 }
            })
        );

        // i64.atomic.rmw32.cmpxchg_u
        let code = [0xfe, 0x4e, 0x02, 0x00];
        assert_eq!(
            OperatorStream::new(&code).next().unwrap(),
            Operator::Atomic(AtomicOp::Cmpxchg {
                ty: ValueType::I64,
                width: MemWidth::W32,
                memarg: MemArg { align: 2, offset: 0 }
            })
        );

        // atomic.wake
        let code = [0xfe, 0x00, 0x02, 0x00];
        assert!(matches!(
            OperatorStream::new(&code).next().unwrap(),
            Operator::Atomic(AtomicOp::Wake { .. })
        ));
    }

    #[test]
    fn decodes_simd() {
        // i32x4.splat
        let code = [0xfd, 0x11];
        assert!(matches!(
            OperatorStream::new(&code).next().unwrap(),
            Operator::Simd(SimdOp::Splat { .. })
        ));

        // v128.const
        let mut code = vec![0xfd, 0x0c];
        code.extend_from_slice(&[7u8; 16]);
        assert_eq!(
            OperatorStream::new(&code).next().unwrap(),
            Operator::Simd(SimdOp::V128Const { value: [7u8; 16] })
        );

        // i8x16.extract_lane_s 3
        let code = [0xfd, 0x15, 0x03];
        match OperatorStream::new(&code).next().unwrap() {
            Operator::Simd(SimdOp::ExtractLane { lane: 3, signed: true, .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn processor_sees_every_operator() {
        struct Counter {
            ops: Vec<String>,
        }
        impl OperatorProcessor for Counter {
            fn process(&mut self, op: Operator) -> Result<(), DecodeError> {
                self.ops.push(op.to_string());
                Ok(())
            }
        }

        let code = [0x41, 0x2a, 0x1a, 0x0b]; // i32.const 42, drop, end
        let mut counter = Counter { ops: Vec::new() };
        decode_with_processor(&code, &mut counter).unwrap();
        assert_eq!(counter.ops, vec!["i32.const 42", "drop", "end"]);
    }

    #[test]
    fn operator_display() {
        assert_eq!(Operator::I32Add.to_string(), "i32.add");
        assert_eq!(Operator::Br { depth: 2 }.to_string(), "br 2");
        assert_eq!(
            Operator::I32Load {
                memarg: MemArg { align: 2, offset: 4 }
            }
            .to_string(),
            "i32.load 2 4"
        );
        assert_eq!(
            Operator::Atomic(AtomicOp::Rmw {
                ty: ValueType::I64,
                width: MemWidth::W16,
                op: RmwOp::Xor,
                memarg: MemArg { align: 1, offset: 0 }
            })
            .to_string(),
            "i64.atomic.rmw16.xor_u 1 0"
        );
        assert_eq!(
            Operator::Simd(SimdOp::IntBinary {
                shape: crate::decode::LaneShape::I16x8,
                op: crate::decode::SimdIntBinaryOp::AddSatS
            })
            .to_string(),
            "i16x8.add_sat_s"
        );
    }
}
