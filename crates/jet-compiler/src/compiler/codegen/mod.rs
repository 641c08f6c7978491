//! Lowering of expression trees into a [`CompileTarget`].
//!
//! Every node compiles itself under a [`Usage`]. Under [`Usage::Value`] a node
//! leaves exactly one value on the stack, under [`Usage::Discard`] it leaves
//! nothing. Node kinds fall into three groups:
//!
//! - value forms (literals, names, operators, calls, `yield`, `resume`) push
//!   their result and pop it again when discarded
//! - assignment forms duplicate the stored value only when it is used
//! - statement forms push nothing, and push null only when used as a value
//!
//! # Module Structure
//!
//! - `expressions`: value forms, the assignment family and function units
//! - `statements`: blocks, loops, branches, declarations and classes

mod expressions;
mod statements;


use crate::ast::{ExprKind, Expression, IndexExpression, NameExpression};
use crate::compiler::target::{CompileTarget, Usage};
use crate::error::{CompileError, Result};

/// Unit name of functions defined without a name.
pub const ANONYMOUS: &str = "<anonymous>";

/// Nodes that can be the target of an assignment.
pub trait Storable {
    /// Pops the value on top of the stack into the location this node names.
    fn compile_store(&self, target: &mut dyn CompileTarget) -> Result<()>;

    /// Evaluates the operands of the location once, for forms that both
    /// read and write it. The returned [`Place`] must be released.
    fn bind(&self, target: &mut dyn CompileTarget) -> Result<Place>;
}

/// A storage location whose operands have already been evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    /// A variable
    Name(String),
    /// An element, with container and index held in hidden locals
    Element {
        /// Local holding the container
        base: String,
        /// Local holding the index
        index: String,
    },
}

impl Place {
    /// Pushes the current value at this location.
    pub fn load(&self, target: &mut dyn CompileTarget) {
        match self {
            Place::Name(name) => target.load(name),
            Place::Element { base, index } => {
                target.load(base);
                target.load(index);
                target.load_index();
            }
        }
    }

    /// Pops the top value into this location.
    pub fn store(&self, target: &mut dyn CompileTarget) {
        match self {
            Place::Name(name) => target.store(name),
            Place::Element { base, index } => {
                target.load(base);
                target.load(index);
                target.store_index();
            }
        }
    }

    /// Closes the scope holding the hidden locals, if any.
    pub fn release(self, target: &mut dyn CompileTarget) {
        if let Place::Element { .. } = self {
            target.exit_scope();
        }
    }
}

impl Storable for NameExpression {
    fn compile_store(&self, target: &mut dyn CompileTarget) -> Result<()> {
        target.store(&self.name);
        Ok(())
    }

    fn bind(&self, _target: &mut dyn CompileTarget) -> Result<Place> {
        Ok(Place::Name(self.name.clone()))
    }
}

impl Storable for IndexExpression {
    fn compile_store(&self, target: &mut dyn CompileTarget) -> Result<()> {
        self.base.compile(target, Usage::Value)?;
        self.index.compile(target, Usage::Value)?;
        target.store_index();
        Ok(())
    }

    // The operands run before the hidden scope opens, so stores they make
    // resolve exactly as they would anywhere else.
    fn bind(&self, target: &mut dyn CompileTarget) -> Result<Place> {
        self.base.compile(target, Usage::Value)?;
        self.index.compile(target, Usage::Value)?;

        let id = target.fresh_id();
        let base = format!("$base_{}", id);
        let index = format!("$index_{}", id);
        target.enter_scope();
        target.register_local(&base);
        target.register_local(&index);
        target.store(&index);
        target.store(&base);
        Ok(Place::Element { base, index })
    }
}

impl Expression {
    /// The storable capability of this node, if it has one.
    pub fn as_storable(&self) -> Option<&dyn Storable> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            ExprKind::Index(index) => Some(index),
            _ => None,
        }
    }

    /// Like [`Expression::as_storable`], failing for non-storable nodes.
    pub(crate) fn storable(&self) -> Result<&dyn Storable> {
        self.as_storable().ok_or(CompileError::NotStorable {
            node: self.kind.name(),
            line: self.line,
        })
    }

    /// Emits this node into `target`.
    ///
    /// The tree is only read, so the same tree can be compiled any number of
    /// times; each compile draws fresh label suffixes from its target.
    pub fn compile(&self, target: &mut dyn CompileTarget, usage: Usage) -> Result<()> {
        match &self.kind {
            ExprKind::Assign { .. }
            | ExprKind::CompoundAssign { .. }
            | ExprKind::Swap { .. }
            | ExprKind::Prefix { .. }
            | ExprKind::Postfix { .. } => self.compile_assignment(target, usage),

            ExprKind::Function(function) => {
                target.line(self.line);
                function.compile_definition(target, usage)
            }

            ExprKind::Block(_)
            | ExprKind::Scope(_)
            | ExprKind::While { .. }
            | ExprKind::For { .. }
            | ExprKind::ForEach { .. }
            | ExprKind::If { .. }
            | ExprKind::Class(_)
            | ExprKind::Local(_)
            | ExprKind::Global(_)
            | ExprKind::Return(_)
            | ExprKind::Break
            | ExprKind::Continue => {
                self.compile_statement(target)?;
                if usage == Usage::Value {
                    target.push_null();
                }
                Ok(())
            }

            ExprKind::Integer(_)
            | ExprKind::Real(_)
            | ExprKind::String(_)
            | ExprKind::Null
            | ExprKind::Name(_)
            | ExprKind::Array(_)
            | ExprKind::Object(_)
            | ExprKind::Index(_)
            | ExprKind::Unary { .. }
            | ExprKind::Binary { .. }
            | ExprKind::Call { .. }
            | ExprKind::Yield(_)
            | ExprKind::Resume(_) => {
                self.compile_value(target)?;
                if usage == Usage::Discard {
                    target.pop();
                }
                Ok(())
            }
        }
    }
}
