// src/error.rs
use crate::ast::{BinOp, Type};

/// One skipped character or malformed literal, reported with its line.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticError {
    DuplicateVariable { name: String, scope: String },
    DuplicateFunction { name: String },
    UndeclaredVariable { name: String },
    UndeclaredFunction { name: String },
    TypeMismatch { op: BinOp, left: Type, right: Type },
    BadNegation { found: Type },
    IncompatibleAssignment { name: String, expected: Type, found: Type },
    NonBoolCondition { found: Type },
    TooManyArguments { func: String, expected: usize },
    TooFewArguments { func: String, expected: usize, found: usize },
    ArgumentType { func: String, index: usize, expected: Type, found: Type },
    ReturnOutsideFunction,
    ReturnInVoid { func: String },
    ReturnType { func: String, expected: Type, found: Type },
    VoidInExpression { func: String },
}

impl std::fmt::Display for SemanticError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SemanticError::DuplicateVariable { name, scope } => {
                write!(f, "variable '{}' already declared in scope '{}'", name, scope)
            }
            SemanticError::DuplicateFunction { name } => {
                write!(f, "function '{}' already declared", name)
            }
            SemanticError::UndeclaredVariable { name } => {
                write!(f, "undeclared variable '{}'", name)
            }
            SemanticError::UndeclaredFunction { name } => {
                write!(f, "undeclared function '{}'", name)
            }
            SemanticError::TypeMismatch { op, left, right } => {
                write!(f, "operator '{}' cannot combine {} and {}", op, left, right)
            }
            SemanticError::BadNegation { found } => {
                write!(f, "cannot negate a {} value", found)
            }
            SemanticError::IncompatibleAssignment { name, expected, found } => {
                write!(f, "cannot assign {} to '{}' of type {}", found, name, expected)
            }
            SemanticError::NonBoolCondition { found } => {
                write!(f, "condition must be bool, found {}", found)
            }
            SemanticError::TooManyArguments { func, expected } => {
                write!(f, "too many arguments in call to '{}' (expects {})", func, expected)
            }
            SemanticError::TooFewArguments { func, expected, found } => {
                write!(
                    f,
                    "too few arguments in call to '{}' (expects {}, got {})",
                    func, expected, found
                )
            }
            SemanticError::ArgumentType { func, index, expected, found } => {
                write!(
                    f,
                    "argument {} of '{}' expects {}, found {}",
                    index, func, expected, found
                )
            }
            SemanticError::ReturnOutsideFunction => {
                write!(f, "return outside of a function body")
            }
            SemanticError::ReturnInVoid { func } => {
                write!(f, "return with a value in void function '{}'", func)
            }
            SemanticError::ReturnType { func, expected, found } => {
                write!(f, "function '{}' returns {}, found {}", func, expected, found)
            }
            SemanticError::VoidInExpression { func } => {
                write!(f, "void function '{}' used in an expression", func)
            }
        }
    }
}

/// Execution faults. These indicate a generator/machine contract violation
/// and never occur for a semantically accepted program.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    UnresolvedJump { at: usize },
    CallStackUnderflow { at: usize },
    MissingActivationRecord { at: usize },
    UnknownFunction { name: String },
    MissingEntry { func: String },
    MissingReturnSlot { func: String },
    BadParameter { func: String, index: usize },
    UnsupportedOperands { op: String, at: usize },
    BadCondition { at: usize },
    DivisionByZero { at: usize },
    MissingConstant { at: usize },
    WriteToConstant { at: usize },
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RuntimeError::UnresolvedJump { at } => {
                write!(f, "unresolved jump target at quad {}", at)
            }
            RuntimeError::CallStackUnderflow { at } => {
                write!(f, "ENDFUNC with an empty call stack at quad {}", at)
            }
            RuntimeError::MissingActivationRecord { at } => {
                write!(f, "no activation record prepared at quad {}", at)
            }
            RuntimeError::UnknownFunction { name } => {
                write!(f, "call to unknown function '{}'", name)
            }
            RuntimeError::MissingEntry { func } => {
                write!(f, "function '{}' has no recorded entry point", func)
            }
            RuntimeError::MissingReturnSlot { func } => {
                write!(f, "RETURN in function '{}' without a return cell", func)
            }
            RuntimeError::BadParameter { func, index } => {
                write!(f, "parameter {} of '{}' does not exist", index, func)
            }
            RuntimeError::UnsupportedOperands { op, at } => {
                write!(f, "unsupported operands for '{}' at quad {}", op, at)
            }
            RuntimeError::BadCondition { at } => {
                write!(f, "jump condition at quad {} is not bool", at)
            }
            RuntimeError::DivisionByZero { at } => {
                write!(f, "division by zero at quad {}", at)
            }
            RuntimeError::MissingConstant { at } => {
                write!(f, "constant address with no registered value at quad {}", at)
            }
            RuntimeError::WriteToConstant { at } => {
                write!(f, "write into the constant segment at quad {}", at)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Lex(Vec<LexError>),
    Parse { line: usize, message: String },
    Semantic(SemanticError),
    Runtime(RuntimeError),
    /// A generator invariant broke (e.g. an unpatched jump survived to the
    /// frozen program). Not reachable from well-formed input.
    Internal(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Lex(errors) => {
                write!(f, "lexical errors: ")?;
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
            Error::Parse { line, message } => {
                write!(f, "parse error (line {}): {}", line, message)
            }
            Error::Semantic(e) => write!(f, "semantic error: {}", e),
            Error::Runtime(e) => write!(f, "runtime error: {}", e),
            Error::Internal(message) => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl From<SemanticError> for Error {
    fn from(e: SemanticError) -> Self {
        Error::Semantic(e)
    }
}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::Runtime(e)
    }
}
