//! Minimal binary-format module reader.
//!
//! Reads just enough of the `.wasm` container to drive per-function
//! emission: type, import, function, table, memory, global, tag, export,
//! start, and code sections. Custom sections and data are skipped. Function
//! bodies are kept as raw byte ranges for the operator decoder.

use super::{
    ExceptionTypeDef, Export, ExportKind, FunctionDecl, FunctionDef, GlobalDef, Import,
    ImportKind, InitExpr, MemoryDef, Module, TableDef,
};
use crate::decode::{DecodeError, Reader};
use crate::types::{FunctionType, ValueType};

const WASM_MAGIC: u32 = 0x6d73_6100;
const WASM_VERSION: u32 = 1;

/// Read a module from `.wasm` bytes.
pub fn read_module(bytes: &[u8]) -> Result<Module, DecodeError> {
    let mut reader = Reader::new(bytes);

    let magic = reader.read_u32()?;
    if magic != WASM_MAGIC {
        return Err(DecodeError::MalformedSection(format!(
            "bad magic number {magic:#010x}"
        )));
    }
    let version = reader.read_u32()?;
    if version != WASM_VERSION {
        return Err(DecodeError::MalformedSection(format!(
            "unsupported version {version}"
        )));
    }

    let mut module = Module::new();
    while !reader.is_empty() {
        let section_id = reader.read_byte()?;
        let section_len = reader.read_vu32()? as usize;
        let section_bytes = reader.read_bytes(section_len)?;
        let mut section = Reader::new(section_bytes);

        match section_id {
            0 => {} // custom section, skipped
            1 => read_type_section(&mut section, &mut module)?,
            2 => read_import_section(&mut section, &mut module)?,
            3 => read_function_section(&mut section, &mut module)?,
            4 => read_table_section(&mut section, &mut module)?,
            5 => read_memory_section(&mut section, &mut module)?,
            6 => read_global_section(&mut section, &mut module)?,
            7 => read_export_section(&mut section, &mut module)?,
            8 => module.start = Some(section.read_vu32()?),
            9 => {}  // element section: runtime concern, not needed for emission
            10 => read_code_section(&mut section, &mut module)?,
            11 => {} // data section: runtime concern
            12 => {} // data count
            13 => read_tag_section(&mut section, &mut module)?,
            other => {
                return Err(DecodeError::MalformedSection(format!(
                    "unknown section id {other}"
                )))
            }
        }
    }

    if module.functions.len() != module.function_defs.len() {
        return Err(DecodeError::MalformedSection(format!(
            "function count mismatch: {} declared, {} bodies",
            module.functions.len(),
            module.function_defs.len()
        )));
    }

    Ok(module)
}

fn read_value_types(reader: &mut Reader) -> Result<Vec<ValueType>, DecodeError> {
    let count = reader.read_vu32()?;
    let mut types = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        types.push(ValueType::decode(reader.read_byte()?)?);
    }
    Ok(types)
}

fn read_type_section(reader: &mut Reader, module: &mut Module) -> Result<(), DecodeError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        let lead = reader.read_byte()?;
        if lead != 0x60 {
            return Err(DecodeError::MalformedSection(format!(
                "expected 0x60 to lead function type, got {lead:#04x}"
            )));
        }
        let params = read_value_types(reader)?;
        let results = read_value_types(reader)?;
        module.types.push(FunctionType::new(params, results));
    }
    Ok(())
}

fn read_limits(reader: &mut Reader) -> Result<(u64, Option<u64>, bool), DecodeError> {
    let flags = reader.read_byte()?;
    let min = reader.read_vu64()?;
    let max = if flags & 0x01 != 0 {
        Some(reader.read_vu64()?)
    } else {
        None
    };
    Ok((min, max, flags & 0x02 != 0))
}

fn read_import_section(reader: &mut Reader, module: &mut Module) -> Result<(), DecodeError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        let import_module = reader.read_name()?;
        let name = reader.read_name()?;
        let kind = match reader.read_byte()? {
            0x00 => ImportKind::Function {
                type_index: reader.read_vu32()?,
            },
            0x01 => {
                reader.read_byte()?; // element type
                read_limits(reader)?;
                ImportKind::Table
            }
            0x02 => {
                read_limits(reader)?;
                ImportKind::Memory
            }
            0x03 => {
                let ty = ValueType::decode(reader.read_byte()?)?;
                let mutable = reader.read_byte()? != 0;
                ImportKind::Global { ty, mutable }
            }
            0x04 => {
                reader.read_byte()?; // attribute
                let type_index = reader.read_vu32()?;
                let params = module
                    .types
                    .get(type_index as usize)
                    .map(|t| t.params.clone())
                    .unwrap_or_default();
                ImportKind::ExceptionType { params }
            }
            other => {
                return Err(DecodeError::MalformedSection(format!(
                    "unknown import kind {other:#04x}"
                )))
            }
        };
        module.imports.push(Import {
            module: import_module,
            name,
            kind,
        });
    }
    Ok(())
}

fn read_function_section(reader: &mut Reader, module: &mut Module) -> Result<(), DecodeError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        let type_index = reader.read_vu32()?;
        if type_index as usize >= module.types.len() {
            return Err(DecodeError::MalformedSection(format!(
                "function type index {type_index} out of range"
            )));
        }
        module.functions.push(FunctionDecl { type_index });
    }
    Ok(())
}

fn read_table_section(reader: &mut Reader, module: &mut Module) -> Result<(), DecodeError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        reader.read_byte()?; // element type
        let (min, max, _) = read_limits(reader)?;
        module.tables.push(TableDef {
            min_elements: min,
            max_elements: max,
        });
    }
    Ok(())
}

fn read_memory_section(reader: &mut Reader, module: &mut Module) -> Result<(), DecodeError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        let (min, max, shared) = read_limits(reader)?;
        module.memories.push(MemoryDef {
            min_pages: min,
            max_pages: max,
            shared,
        });
    }
    Ok(())
}

/// Decode a constant initialiser expression, up to its terminating `end`.
fn read_init_expr(reader: &mut Reader) -> Result<InitExpr, DecodeError> {
    let offset = reader.pos();
    let opcode = reader.read_byte()?;
    let expr = match opcode {
        0x41 => InitExpr::I32(reader.read_vs32()?),
        0x42 => InitExpr::I64(reader.read_vs64()?),
        0x43 => InitExpr::F32(reader.read_f32()?.to_bits()),
        0x44 => InitExpr::F64(reader.read_f64()?.to_bits()),
        0x23 => InitExpr::GlobalGet(reader.read_vu32()?),
        other => {
            return Err(DecodeError::MalformedOpcode {
                opcode: other as u32,
                offset,
            })
        }
    };
    let end = reader.read_byte()?;
    if end != 0x0b {
        return Err(DecodeError::MalformedSection(
            "initialiser expression not terminated by end".into(),
        ));
    }
    Ok(expr)
}

fn read_global_section(reader: &mut Reader, module: &mut Module) -> Result<(), DecodeError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        let ty = ValueType::decode(reader.read_byte()?)?;
        let mutable = reader.read_byte()? != 0;
        let init = read_init_expr(reader)?;
        module.globals.push(GlobalDef { ty, mutable, init });
    }
    Ok(())
}

fn read_export_section(reader: &mut Reader, module: &mut Module) -> Result<(), DecodeError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        let name = reader.read_name()?;
        let kind = match reader.read_byte()? {
            0x00 => ExportKind::Function,
            0x01 => ExportKind::Table,
            0x02 => ExportKind::Memory,
            0x03 => ExportKind::Global,
            other => {
                return Err(DecodeError::MalformedSection(format!(
                    "unknown export kind {other:#04x}"
                )))
            }
        };
        let index = reader.read_vu32()?;
        module.exports.push(Export { name, kind, index });
    }
    Ok(())
}

fn read_tag_section(reader: &mut Reader, module: &mut Module) -> Result<(), DecodeError> {
    let count = reader.read_vu32()?;
    for _ in 0..count {
        reader.read_byte()?; // attribute, must be zero
        let type_index = reader.read_vu32()?;
        let params = module
            .types
            .get(type_index as usize)
            .map(|t| t.params.clone())
            .ok_or_else(|| {
                DecodeError::MalformedSection(format!("tag type index {type_index} out of range"))
            })?;
        module.exception_types.push(ExceptionTypeDef { params });
    }
    Ok(())
}

fn read_code_section(reader: &mut Reader, module: &mut Module) -> Result<(), DecodeError> {
    let count = reader.read_vu32()?;
    if count as usize != module.functions.len() {
        return Err(DecodeError::MalformedSection(format!(
            "code count {count} does not match function count {}",
            module.functions.len()
        )));
    }

    for (index, decl) in module.functions.iter().enumerate() {
        let body_size = reader.read_vu32()? as usize;
        let body_start = reader.pos();
        let body = reader.read_bytes(body_size)?;
        let mut body_reader = Reader::new(body);

        let mut locals = Vec::new();
        let group_count = body_reader.read_vu32()?;
        for _ in 0..group_count {
            let repeat = body_reader.read_vu32()?;
            let ty = ValueType::decode(body_reader.read_byte()?)?;
            if locals.len() as u64 + repeat as u64 > 50_000 {
                return Err(DecodeError::MalformedSection(format!(
                    "function {index} declares too many locals"
                )));
            }
            for _ in 0..repeat {
                locals.push(ty);
            }
        }

        let code = body[body_reader.pos()..].to_vec();
        debug_assert!(body_start + body_size == reader.pos());

        module.function_defs.push(FunctionDef {
            type_index: decl.type_index,
            non_parameter_locals: locals,
            code,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a tiny module image: `(func (result i32) i32.const 7 end)`.
    fn minimal_module_bytes() -> Vec<u8> {
        let mut bytes = vec![
            0x00, 0x61, 0x73, 0x6d, // magic
            0x01, 0x00, 0x00, 0x00, // version
        ];
        // type section: [] -> [i32]
        bytes.extend_from_slice(&[0x01, 0x05, 0x01, 0x60, 0x00, 0x01, 0x7f]);
        // function section: one function of type 0
        bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]);
        // export section: "seven" -> func 0
        bytes.extend_from_slice(&[0x07, 0x09, 0x01, 0x05]);
        bytes.extend_from_slice(b"seven");
        bytes.extend_from_slice(&[0x00, 0x00]);
        // code section: no locals, i32.const 7, end
        bytes.extend_from_slice(&[0x0a, 0x06, 0x01, 0x04, 0x00, 0x41, 0x07, 0x0b]);
        bytes
    }

    #[test]
    fn reads_a_minimal_module() {
        let module = read_module(&minimal_module_bytes()).unwrap();
        assert_eq!(module.types.len(), 1);
        assert_eq!(module.types[0].results, vec![ValueType::I32]);
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.function_defs.len(), 1);
        assert_eq!(module.function_defs[0].code, vec![0x41, 0x07, 0x0b]);
        assert_eq!(module.exports[0].name, "seven");
        assert_eq!(module.exports[0].kind, ExportKind::Function);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = minimal_module_bytes();
        bytes[0] = 0x01;
        assert!(read_module(&bytes).is_err());
    }

    #[test]
    fn rejects_mismatched_code_count() {
        let mut bytes = minimal_module_bytes();
        // Drop the code section entirely.
        bytes.truncate(bytes.len() - 8);
        assert!(read_module(&bytes).is_err());
    }

    #[test]
    fn reads_locals_groups() {
        let mut bytes = vec![
            0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00,
            0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type: [] -> []
            0x03, 0x02, 0x01, 0x00, // one function
        ];
        // code: 2 local groups (3 x i32, 1 x f64), then end
        bytes.extend_from_slice(&[0x0a, 0x08, 0x01, 0x06, 0x02, 0x03, 0x7f, 0x01, 0x7c, 0x0b]);

        let module = read_module(&bytes).unwrap();
        let def = &module.function_defs[0];
        assert_eq!(
            def.non_parameter_locals,
            vec![ValueType::I32, ValueType::I32, ValueType::I32, ValueType::F64]
        );
        assert_eq!(def.code, vec![0x0b]);
    }

    #[test]
    fn reads_globals_and_memory() {
        let bytes = vec![
            0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00,
            // memory: min 1, max 2
            0x05, 0x04, 0x01, 0x01, 0x01, 0x02,
            // global: mutable i32 = 41
            0x06, 0x06, 0x01, 0x7f, 0x01, 0x41, 0x29, 0x0b,
        ];

        let module = read_module(&bytes).unwrap();
        assert_eq!(module.memories[0].min_pages, 1);
        assert_eq!(module.memories[0].max_pages, Some(2));
        let global = &module.globals[0];
        assert!(global.mutable);
        assert_eq!(global.init, InitExpr::I32(41));
    }
}
