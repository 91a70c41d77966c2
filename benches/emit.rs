use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kiln::emit::{emit_module, EmissionContext};
use kiln::module::{FunctionDecl, FunctionDef, Module, ModuleInstance};
use kiln::types::{FunctionType, ValueType};

/// A body that leans on the expensive paths: guarded division, masked
/// shifts, structured control flow, and memory traffic.
fn mixed_body() -> Vec<u8> {
    let mut code = Vec::new();
    for _ in 0..50 {
        code.extend_from_slice(&[
            0x20, 0x00, 0x41, 0x03, 0x6d, // local.get 0, i32.const 3, i32.div_s
            0x21, 0x00, // local.set 0
            0x20, 0x00, 0x41, 0x05, 0x74, // shl 5
            0x1a, // drop
            0x02, 0x7f, // block (result i32)
            0x20, 0x00, 0x20, 0x00, 0x0d, 0x00, // local.get, local.get, br_if 0
            0x0b, // end
            0x21, 0x00, // local.set 0
            0x41, 0x00, 0x20, 0x00, 0x36, 0x02, 0x00, // i32.store
        ]);
    }
    code.extend_from_slice(&[0x20, 0x00, 0x0b]);
    code
}

fn bench_emit(c: &mut Criterion) {
    let mut module = Module::new();
    module.types.push(FunctionType::new(
        vec![ValueType::I32],
        vec![ValueType::I32],
    ));
    module.functions.push(FunctionDecl { type_index: 0 });
    module.function_defs.push(FunctionDef {
        type_index: 0,
        non_parameter_locals: vec![],
        code: mixed_body(),
    });
    let instance = ModuleInstance::stub(&module);
    let context = EmissionContext::default();

    c.bench_function("emit_mixed_function", |b| {
        b.iter(|| {
            let ssa = emit_module(black_box(&module), &instance, &context).unwrap();
            black_box(ssa);
        })
    });
}

criterion_group!(benches, bench_emit);
criterion_main!(benches);
