// src/lib.rs
pub mod ast;
pub mod codegen;
pub mod cube;
pub mod error;
pub mod lexer;
pub mod memory;
pub mod parser;
pub mod symbols;
pub mod vm;

pub use codegen::CompiledProgram;
pub use error::Error;

/// Front half of the pipeline: source text to a frozen quadruple program.
pub fn compile(source: &str) -> Result<CompiledProgram, Error> {
    let tokens = lexer::Lexer::new(source).lex()?;
    let program = parser::Parser::new(tokens).parse()?;
    codegen::Codegen::new().compile(&program)
}

/// Back half: run a compiled program and collect everything it printed.
pub fn execute(program: &CompiledProgram) -> Result<String, Error> {
    let mut vm = vm::Vm::new(program);
    vm.run().map_err(Error::Runtime)?;
    Ok(vm.output)
}
