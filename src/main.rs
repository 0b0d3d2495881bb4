//! Command-line driver.
//!
//! Usage: `c0vm <FILE> [--entry N] [--trace] [--max-depth N] [--json] [--no-color] [--dump]`

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use c0vm::diagnostic::{Diagnostic, Output, registry};
use c0vm::native::NativeTable;
use c0vm::vm::{Vm, VmConfig};
use c0vm::{fault, loader};

#[derive(Parser, Debug)]
#[command(name = "c0vm", version)]
#[command(about = "Run a C0 bytecode module (.bc0)")]
struct Cli {
    /// Path to the module, or `-` to read it from stdin
    #[arg(required_unless_present = "explain")]
    file: Option<PathBuf>,

    /// Index of the function to start in
    #[arg(long, default_value_t = 0)]
    entry: u16,

    /// Print each executed instruction to stderr
    #[arg(long)]
    trace: bool,

    /// Fault once this many calls are active
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Report errors as one-line JSON
    #[arg(long)]
    json: bool,

    /// Disable colored error output
    #[arg(long)]
    no_color: bool,

    /// Print the loaded module as JSON and exit without running it
    #[arg(long)]
    dump: bool,

    /// Explain a diagnostic code (e.g. C0VM-M001) and exit
    #[arg(long, value_name = "CODE")]
    explain: Option<String>,
}

fn read_source(path: &Path) -> io::Result<String> {
    if path == Path::new("-") {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        fs::read_to_string(path)
    }
}

fn fail(output: Output, d: &Diagnostic) -> ! {
    let rendered = output.render(d);
    eprint!("{rendered}");
    if !rendered.ends_with('\n') {
        eprintln!();
    }
    process::exit(1)
}

fn main() {
    let cli = Cli::parse();
    let output = if cli.json {
        Output::Json
    } else {
        Output::Text { use_color: !cli.no_color && io::stderr().is_terminal() }
    };

    if let Some(code) = &cli.explain {
        match registry::lookup(code) {
            Some(entry) => {
                print!("{}", entry.long);
                return;
            }
            None => fail(output, &Diagnostic::error(format!("unknown diagnostic code '{code}'"))),
        }
    }

    let Some(path) = cli.file.as_deref() else {
        fail(output, &Diagnostic::error("no module given"));
    };
    let source = match read_source(path) {
        Ok(s) => s,
        Err(e) => fail(output, &Diagnostic::error(format!("cannot read {}: {e}", path.display()))),
    };
    let program = match loader::parse(&source) {
        Ok(p) => p,
        Err(e) => fail(output, &Diagnostic::from(&e).with_source(source)),
    };

    if cli.dump {
        match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{json}"),
            Err(e) => fail(output, &Diagnostic::error(format!("serialization error: {e}"))),
        }
        return;
    }

    let natives = NativeTable::standard();
    let config = VmConfig { entry: cli.entry, trace: cli.trace, max_call_depth: cli.max_depth };
    match Vm::new(&program, &natives, config).and_then(|mut vm| vm.run()) {
        Ok(result) => {
            println!("{result}");
            process::exit(result)
        }
        Err(f) => fault::abort(&f, output),
    }
}
