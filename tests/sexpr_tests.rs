//! Integration checks for the text-format front door: the S-expression
//! parser and the bit-exact float primitives it leans on.

use kiln::arena::Arena;
use kiln::numeric;
use kiln::sexpr::{self, NodeKind};

#[test]
fn module_shape_round_trips_through_display() {
    let arena = Arena::new();
    let source = "(module (func (result i32) (i32.const 42)))";

    let nodes = sexpr::parse(&arena, source);
    assert_eq!(nodes.len(), 1);
    let module = nodes[0].as_subtree().unwrap();
    assert_eq!(module.head_symbol(), Some("module"));
    assert!(module.get(1).unwrap().is_subtree_headed_by("func"));

    let printed = nodes[0].to_string();
    let reparsed = sexpr::parse(&arena, &printed);
    assert!(nodes[0].structurally_equal(reparsed[0]));
}

#[test]
fn hex_float_literal_is_three() {
    let arena = Arena::new();
    let nodes = sexpr::parse(&arena, "0x1.8p+1");
    match nodes[0].kind {
        NodeKind::Float { f64_bits, f32_bits } => {
            assert_eq!(f64_bits, 3.0f64.to_bits());
            assert_eq!(f32_bits, 3.0f32.to_bits());
        }
        _ => panic!("expected a float"),
    }
}

#[test]
fn hex_float_bits_survive_print_and_parse() {
    // Parse -> bits -> print -> parse reproduces the pattern for finite,
    // denormal, infinite, NaN, and signed-zero inputs.
    let patterns: &[u64] = &[
        0,
        0x8000_0000_0000_0000,
        1,
        0x000f_ffff_ffff_ffff,
        0x7fef_ffff_ffff_ffff,
        3.0f64.to_bits(),
        f64::INFINITY.to_bits(),
        f64::NEG_INFINITY.to_bits(),
        0x7ff8_0000_0000_0123,
    ];
    for &bits in patterns {
        let printed = numeric::format_hex_f64(bits);
        let (negative, body) = match printed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, printed.as_str()),
        };
        let reparsed = if body == "inf" {
            f64::INFINITY.to_bits() | ((negative as u64) << 63)
        } else if let Some(payload) = body.strip_prefix("nan:0x") {
            numeric::nan_with_payload_f64(negative, u64::from_str_radix(payload, 16).unwrap())
        } else {
            numeric::parse_hex_f64(body, negative).unwrap()
        };
        assert_eq!(reparsed, bits, "pattern {bits:#018x} printed as {printed}");
    }
}

#[test]
fn wast_style_fragment_parses() {
    let arena = Arena::new();
    let source = r#"
        ;; a spec-test style fragment
        (module
          (memory 1)
          (data (i32.const 8) "\00asm")
          (func (export "load") (param i32) (result i32)
            (i32.load offset=4 (local.get 0))))
        (assert_return (invoke "load" (i32.const 4)) (i32.const 0x6d))
    "#;

    let nodes = sexpr::parse(&arena, source);
    assert_eq!(nodes.len(), 2);
    assert!(nodes[0].is_subtree_headed_by("module"));
    assert!(nodes[1].is_subtree_headed_by("assert_return"));

    let module = nodes[0].as_subtree().unwrap();
    let data = module.get(2).unwrap().as_subtree().unwrap();
    assert_eq!(data.head_symbol(), Some("data"));
    assert_eq!(
        data.get(2).unwrap().as_string(),
        Some(b"\x00asm".as_slice())
    );
}

#[test]
fn malformed_input_yields_error_nodes_not_failures() {
    let arena = Arena::new();
    let nodes = sexpr::parse(&arena, r#"(module "unterminated"#);
    // The parse always completes; damage is recorded in the tree.
    let module = nodes[0].as_subtree().unwrap();
    assert!(module.children().any(|n| n.is_error()));
}
