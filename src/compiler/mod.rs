//! C4/C5: the MOO compiler front end (lexer, parser, AST) and back end
//! (bytecode codegen, `Program` representation).

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod program;

pub use parser::{parse_program, ParseError};
pub use program::Program;

/// Lexes, parses and compiles verb source text to a bytecode `Program` in
/// one step, the entry point used by `define_verb`/`set_verb_code`-style
/// store operations.
pub fn compile_verb(source: &[String]) -> Result<Program, ParseError> {
    let joined = source.join("\n");
    let ast = parser::parse_program(&joined)?;
    Ok(codegen::compile(&ast))
}
