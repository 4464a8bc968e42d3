//! Attribute expressions for `filter`, `calc`, `sort` and `uniq`.
//!
//! Expressions are compiled by a small sandboxed interpreter; no host code is
//! ever evaluated. A program is a `;`-separated list of statements, each
//! either `field = expr` or a bare expression:
//!
//! ```
//! use topo_shaper::expr::{compile, FeatureContext};
//! use topo_shaper::topology::ArcPool;
//!
//! let program = compile("a = width * 2; b = a + 1").unwrap();
//! let mut record = serde_json::json!({ "width": 3 }).as_object().cloned().unwrap();
//! let pool = ArcPool::new();
//! program.run(&mut record, &FeatureContext::new(0, None, &pool, None)).unwrap();
//! assert_eq!(record["b"], 7);
//! ```

pub mod eval;
pub mod lexer;
pub mod parser;

use thiserror::Error;

use crate::topology::layer::Layer;

pub use eval::{FeatureContext, Val};
pub use parser::{Expr, Program, Statement};

/// Errors raised while compiling or evaluating an expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("syntax error at offset {pos}: {msg}")]
    Syntax { pos: usize, msg: String },
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("type error: {0}")]
    Type(String),
}

/// Compiles an expression program.
pub fn compile(src: &str) -> Result<Program, ExpressionError> {
    parser::parse(src)
}

/// Compiles `src` and checks its field reads against `layer`'s fields.
///
/// An empty layer has no fields to check against and is never evaluated, so
/// only syntax is checked.
pub fn compile_for_layer(src: &str, layer: &Layer) -> Result<Program, ExpressionError> {
    let program = compile(src)?;
    if !layer.is_empty() {
        program.check_fields(layer.field_names())?;
    }
    Ok(program)
}
