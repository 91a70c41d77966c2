//! An ahead-of-time SSA emitter for WebAssembly.
//!
//! kiln walks validated WebAssembly function bodies and emits equivalent
//! SSA-form intermediate representation for a native code generator,
//! preserving WebAssembly's trap semantics: guarded division, masked
//! shifts, exact float-to-int truncation bounds, sandboxed addressing, and
//! exception handling against both table-based and funclet-based unwinders.
//!
//! # Modules
//!
//! - [`module`] -- Module and instance descriptors, plus a minimal binary
//!   reader to build them from `.wasm` bytes.
//! - [`decode`] -- Operator records and the streaming decoder.
//! - [`emit`] -- The per-function emitter: operand/control/branch-target
//!   stacks, operator lowerings, exception lowering.
//! - [`ssa`] -- The IR the emitter targets: blocks, φ-nodes, typed
//!   instructions, and a builder.
//! - [`intrinsics`] -- The runtime intrinsic name/signature contract.
//! - [`sexpr`] -- S-expression parser for the text format, used by test
//!   harnesses.
//! - [`numeric`] -- Bit-exact float primitives (hex floats, NaN payloads).
//! - [`arena`] -- Bump allocator backing the S-expression tree.
//!
//! # Example
//!
//! Read a module, emit SSA for its functions, and print the result:
//!
//! ```
//! use kiln::emit::{emit_module, EmissionContext};
//! use kiln::module::{read_module, ModuleInstance};
//!
//! // (module (func (param i32) (result i32)
//! //     local.get 0 i32.const 3 i32.add))
//! let bytes: &[u8] = &[
//!     0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, 0x01, 0x06, 0x01,
//!     0x60, 0x01, 0x7f, 0x01, 0x7f, 0x03, 0x02, 0x01, 0x00, 0x0a, 0x09,
//!     0x01, 0x07, 0x00, 0x20, 0x00, 0x41, 0x03, 0x6a, 0x0b,
//! ];
//!
//! let module = read_module(bytes).unwrap();
//! let instance = ModuleInstance::stub(&module);
//! let ssa = emit_module(&module, &instance, &EmissionContext::default()).unwrap();
//! assert_eq!(ssa.functions.len(), 1);
//! println!("{}", ssa.functions[0]);
//! ```

pub mod arena;
pub mod decode;
pub mod emit;
pub mod intrinsics;
pub mod module;
pub mod numeric;
pub mod sexpr;
pub mod ssa;
pub mod types;
