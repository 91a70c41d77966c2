use clap::{Parser, Subcommand};
use kiln::arena::Arena;
use kiln::emit::{emit_module, EmissionContext, UnwindModel};
use kiln::module::{read_module, ModuleInstance};
use kiln::sexpr;
use std::fs;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "WebAssembly ahead-of-time SSA emitter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit SSA for every function in a module and print it
    Dump {
        /// Path to the WebAssembly module
        file: String,

        /// Unwinder model for exception lowering
        #[arg(long, value_parser = parse_unwind_model, default_value = "itanium")]
        unwind: UnwindModel,

        /// Trace each operator during emission (requires RUST_LOG=trace)
        #[arg(long)]
        trace: bool,
    },

    /// Parse a text-format file and print the S-expression tree
    Sexpr {
        /// Path to the source file
        file: String,
    },
}

fn parse_unwind_model(text: &str) -> Result<UnwindModel, String> {
    match text {
        "itanium" => Ok(UnwindModel::Itanium),
        "funclet" => Ok(UnwindModel::Funclet),
        other => Err(format!("unknown unwind model '{other}' (itanium, funclet)")),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Dump { file, unwind, trace } => dump_module(&file, unwind, trace),
        Commands::Sexpr { file } => dump_sexpr(&file),
    }
}

fn dump_module(file: &str, unwind: UnwindModel, trace: bool) -> ExitCode {
    let bytes = match fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {file}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let module = match read_module(&bytes) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("Error parsing {file}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let instance = ModuleInstance::stub(&module);
    let context = EmissionContext {
        unwind_model: unwind,
        trace_operators: trace,
        ..EmissionContext::default()
    };

    match emit_module(&module, &instance, &context) {
        Ok(ssa) => {
            for function in &ssa.functions {
                println!("{function}");
                println!();
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error emitting {file}: {e}");
            ExitCode::FAILURE
        }
    }
}

fn dump_sexpr(file: &str) -> ExitCode {
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {file}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let arena = Arena::new();
    let nodes = sexpr::parse(&arena, &source);
    let mut had_error = false;
    for node in &nodes {
        println!("{node}");
        had_error |= node.is_error();
    }
    if had_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
