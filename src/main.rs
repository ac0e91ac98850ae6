// src/main.rs
use std::env;
use std::fs;

use anyhow::{bail, Context, Result};

use rill::{compile, execute};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let (path, dump_quads) = match args.len() {
        2 => (args[1].as_str(), false),
        3 if args[2] == "--quads" => (args[1].as_str(), true),
        _ => bail!("usage: rill <file.rill> [--quads]"),
    };

    if !path.ends_with(".rill") {
        bail!("source files must have the .rill extension");
    }

    let source = fs::read_to_string(path).with_context(|| format!("reading '{}'", path))?;

    let program = compile(&source)?;
    if dump_quads {
        print!("{}", program.listing());
    }

    let output = execute(&program)?;
    print!("{}", output);
    Ok(())
}
