// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # jet-compiler
//!
//! The expression tree of the Jet scripting language and its lowering to
//! stack-machine bytecode.
//!
//! ## Overview
//!
//! This crate provides:
//! - The closed set of tree nodes and a parent-linking pass
//! - The `CompileTarget` trait that lowering emits into
//! - Per-node lowering of expressions, control flow, functions and classes
//! - A reference `Assembler` producing function units with symbolic labels
//!
//! ## Quick Start
//!
//! ```rust
//! use jet_compiler::ast::{BinaryOperator, Expression};
//! use jet_compiler::{CompilerOptions, compile};
//!
//! let mut tree = Expression::block(1, vec![Expression::assign(
//!     1,
//!     Expression::name(1, "x"),
//!     Expression::binary(1, BinaryOperator::Add, Expression::integer(1, 1), Expression::integer(1, 2)),
//! )]);
//! tree.link_parents();
//!
//! let module = compile(&tree, CompilerOptions::default()).unwrap();
//! assert_eq!(module.units.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod error;

pub use compiler::{
    Assembler, CompileTarget, CompilerOptions, Module, StoreResolution, Storable, Usage,
};
pub use error::{CompileError, Result};

use tracing::debug;

use ast::Expression;

/// Compiles a linked tree as the top-level unit of a new module.
///
/// The root is compiled as a discarded statement, followed by an implicit
/// `return null`.
pub fn compile(root: &Expression, options: CompilerOptions) -> Result<Module> {
    let mut assembler = Assembler::new(options);
    root.compile(&mut assembler, Usage::Discard)?;
    assembler.push_null();
    assembler.return_value();
    let module = assembler.finish()?;
    debug!(
        units = module.units.len(),
        instructions = module.main().instructions.len(),
        "compiled tree"
    );
    Ok(module)
}

/// Compiles independent trees in parallel, one assembler per tree.
#[cfg(feature = "parallel")]
pub fn compile_batch(roots: &[Expression], options: &CompilerOptions) -> Vec<Result<Module>> {
    use rayon::prelude::*;

    debug!(trees = roots.len(), "compiling batch");
    roots
        .par_iter()
        .map(|root| compile(root, options.clone()))
        .collect()
}

/// Compiles independent trees, one assembler per tree.
#[cfg(not(feature = "parallel"))]
pub fn compile_batch(roots: &[Expression], options: &CompilerOptions) -> Vec<Result<Module>> {
    debug!(trees = roots.len(), "compiling batch");
    roots
        .iter()
        .map(|root| compile(root, options.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprKind;

    #[test]
    fn test_compile_empty_tree() {
        let module = compile(&Expression::block(1, vec![]), CompilerOptions::default()).unwrap();
        assert_eq!(module.units.len(), 1);
        assert_eq!(module.main().instructions.len(), 2);
    }

    #[test]
    fn test_compile_batch_keeps_order() {
        let roots = vec![
            Expression::block(1, vec![Expression::name(1, "a")]),
            Expression::new(1, ExprKind::Break),
            Expression::block(1, vec![]),
        ];
        let results = compile_batch(&roots, &CompilerOptions::default());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CompileError::OutsideLoop { .. })));
        assert!(results[2].is_ok());
    }
}
