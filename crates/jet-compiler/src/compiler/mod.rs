//! Bytecode compiler for Jet.
//!
//! Lowers expression trees into function units executed by the VM.
//!
//! # Module Structure
//!
//! - `bytecode`: Bytecode definitions and instructions
//! - `target`: The `CompileTarget` trait lowering emits into
//! - `codegen`: Code generation from the expression tree
//! - `assembler`: The reference target producing a `Module`
//! - `options`: Compiler configuration

mod assembler;
pub mod bytecode;
pub mod codegen;
pub mod options;
mod scope;
pub mod target;

pub use assembler::{Assembler, MAIN_UNIT};
pub use bytecode::{Constant, FunctionUnit, Instruction, Module, OpCode, Operand};
pub use codegen::{ANONYMOUS, Place, Storable};
pub use options::{CompilerOptions, StoreResolution};
pub use target::{ClassLayout, CompileTarget, FunctionSignature, LoopContext, RECEIVER, Usage};
