//! An embeddable Scheme interpreter.
//!
//! Source text goes through the [`lexer`] and the [`reader`] into values,
//! which the evaluator in [`vm`] runs against a global environment seeded
//! with the primitive library and a small bootstrap library written in Scheme.
#[macro_use]
extern crate gc;
#[macro_use]
extern crate log;

#[macro_use]
mod helpers;

pub mod interpreter;
pub mod lexer;
pub mod reader;
pub mod vm;

pub use crate::interpreter::{interpret, repl};
pub use crate::vm::{ExecutionError, Host, Interpreter, StdHost, Value};
