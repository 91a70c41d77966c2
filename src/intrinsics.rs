//! The runtime intrinsic contract.
//!
//! Generated code calls into the runtime through named intrinsics with
//! fixed signatures; their bodies are linked at module instantiation time.
//! The emitter checks every intrinsic call it emits against this registry,
//! which is the Rust side of the contract — the runtime must export
//! matching symbols.
//!
//! Pointer-sized quantities cross this boundary as `i64`.

use crate::types::{FunctionType, ValueType};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One registered intrinsic.
#[derive(Debug, Clone)]
pub struct Intrinsic {
    pub name: &'static str,
    pub ty: FunctionType,
    /// Trap intrinsics never return; calls to them are followed by an
    /// unreachable terminator.
    pub noreturn: bool,
}

use ValueType::{F32, F64, I32, I64};

fn sig(params: &[ValueType], results: &[ValueType]) -> FunctionType {
    FunctionType::new(params.to_vec(), results.to_vec())
}

static REGISTRY: Lazy<HashMap<&'static str, Intrinsic>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let mut add = |name: &'static str, ty: FunctionType, noreturn: bool| {
        table.insert(name, Intrinsic { name, ty, noreturn });
    };

    // Traps
    add("unreachableTrap", sig(&[], &[]), true);
    add("divideByZeroOrIntegerOverflowTrap", sig(&[], &[]), true);
    add("invalidFloatOperationTrap", sig(&[], &[]), true);
    add("misalignedAtomicTrap", sig(&[I32], &[]), true);
    add("indirectCallSignatureMismatch", sig(&[I32, I64], &[]), true);

    // Memory management
    add("growMemory", sig(&[I32, I64], &[I32]), false);
    add("currentMemory", sig(&[I64], &[I32]), false);

    // Atomic waiter operations
    add("atomic_wake", sig(&[I32, I32, I64], &[I32]), false);
    add("atomic_wait_i32", sig(&[I32, I32, F64, I64], &[I32]), false);
    add("atomic_wait_i64", sig(&[I32, I64, F64, I64], &[I32]), false);

    // Exceptions
    add("throwException", sig(&[I64, I64, I32], &[]), true);
    add("beginCatch", sig(&[I64], &[I64]), false);

    // IEEE-strict floating point helpers. Host min/max/rounding
    // instructions disagree with WebAssembly on NaN propagation, so these
    // are runtime calls.
    add("f32.min", sig(&[F32, F32], &[F32]), false);
    add("f32.max", sig(&[F32, F32], &[F32]), false);
    add("f64.min", sig(&[F64, F64], &[F64]), false);
    add("f64.max", sig(&[F64, F64], &[F64]), false);
    add("f32.ceil", sig(&[F32], &[F32]), false);
    add("f32.floor", sig(&[F32], &[F32]), false);
    add("f32.trunc", sig(&[F32], &[F32]), false);
    add("f32.nearest", sig(&[F32], &[F32]), false);
    add("f64.ceil", sig(&[F64], &[F64]), false);
    add("f64.floor", sig(&[F64], &[F64]), false);
    add("f64.trunc", sig(&[F64], &[F64]), false);
    add("f64.nearest", sig(&[F64], &[F64]), false);

    table
});

/// Look up an intrinsic by name.
pub fn get(name: &str) -> Option<&'static Intrinsic> {
    REGISTRY.get(name)
}

/// Look up an intrinsic that the emitter relies on existing.
///
/// Panics on an unknown name: emitting a call to an unregistered intrinsic
/// is an emitter bug, not an input error.
pub fn expect(name: &str) -> &'static Intrinsic {
    get(name).unwrap_or_else(|| panic!("unregistered runtime intrinsic: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_trap_intrinsics_are_registered() {
        for name in [
            "unreachableTrap",
            "divideByZeroOrIntegerOverflowTrap",
            "invalidFloatOperationTrap",
            "misalignedAtomicTrap",
            "indirectCallSignatureMismatch",
            "throwException",
        ] {
            let intrinsic = expect(name);
            assert!(intrinsic.noreturn, "{name} must be noreturn");
            assert!(intrinsic.ty.results.is_empty());
        }
    }

    #[test]
    fn signatures_match_the_contract() {
        assert_eq!(expect("growMemory").ty, sig(&[I32, I64], &[I32]));
        assert_eq!(expect("currentMemory").ty, sig(&[I64], &[I32]));
        assert_eq!(
            expect("atomic_wait_i64").ty,
            sig(&[I32, I64, F64, I64], &[I32])
        );
        assert_eq!(expect("f64.min").ty, sig(&[F64, F64], &[F64]));
        assert_eq!(expect("throwException").ty, sig(&[I64, I64, I32], &[]));
    }

    #[test]
    fn unknown_names_are_absent() {
        assert!(get("notAnIntrinsic").is_none());
    }

    #[test]
    #[should_panic(expected = "unregistered runtime intrinsic")]
    fn expect_panics_on_unknown() {
        expect("notAnIntrinsic");
    }
}
