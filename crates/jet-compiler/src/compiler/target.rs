//! The bytecode sink that tree lowering emits into.
//!
//! All mutable compiler state (scopes, loop contexts, the fresh-id counter,
//! open function units) lives behind this trait, so one target serves
//! exactly one compilation at a time.

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::compiler::bytecode::Constant;

/// Whether the enclosing construct consumes a node's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// Leave exactly one value on the stack
    Value,
    /// Leave nothing on the stack (the node is a bare statement)
    Discard,
}

/// Jump targets of the innermost loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopContext {
    /// Where `break` jumps
    pub break_label: String,
    /// Where `continue` jumps
    pub continue_label: String,
}

impl LoopContext {
    /// Creates a loop context.
    pub fn new(break_label: impl Into<String>, continue_label: impl Into<String>) -> Self {
        Self {
            break_label: break_label.into(),
            continue_label: continue_label.into(),
        }
    }
}

/// Shape of a function unit, given when it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    /// Unit name
    pub name: String,
    /// Positional parameter names
    pub params: Vec<String>,
    /// Name collecting the remaining arguments
    pub varargs: Option<String>,
    /// Binds the receiver as the first local
    pub is_method: bool,
}

/// Receiver name bound in slot 0 of methods.
pub const RECEIVER: &str = "this";

/// Member layout of a class, consumed by `define_class`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLayout {
    /// Class name
    pub name: String,
    /// Base class name, unresolved
    pub base: Option<String>,
    /// Field names, in the order their initializers were pushed
    pub fields: Vec<String>,
    /// Method names, in the order their closures were pushed
    pub methods: Vec<String>,
}

/// A bytecode emission target.
pub trait CompileTarget {
    // Scopes and names

    /// Opens a lexical scope.
    fn enter_scope(&mut self);
    /// Closes the innermost lexical scope.
    fn exit_scope(&mut self);
    /// Declares a local in the innermost scope and returns its slot.
    fn register_local(&mut self, name: &str) -> u16;
    /// Marks a name as a global for later stores.
    fn declare_global(&mut self, name: &str);
    /// Pushes the value bound to `name`.
    fn load(&mut self, name: &str);
    /// Pops the top value into `name`.
    fn store(&mut self, name: &str);

    // Control flow

    /// Places a label at the next instruction.
    fn label(&mut self, name: &str);
    /// Unconditional jump.
    fn jump(&mut self, label: &str);
    /// Pops the top value and jumps when it is falsy.
    fn jump_if_false(&mut self, label: &str);

    // Stack

    /// Duplicates the top value.
    fn duplicate(&mut self);
    /// Discards the top value.
    fn pop(&mut self);
    /// Pushes null.
    fn push_null(&mut self);
    /// Pushes a literal.
    fn push_constant(&mut self, value: Constant);
    /// Collects the top `count` values into an array.
    fn new_array(&mut self, count: usize);
    /// Collects the top `count` key/value pairs into an object.
    fn new_object(&mut self, count: usize);
    /// Applies a binary operator to the top two values, both already evaluated.
    fn binary(&mut self, operator: BinaryOperator);
    /// Applies a unary operator to the top value.
    fn unary(&mut self, operator: UnaryOperator);

    // Calls and containers

    /// Calls the callee on top of the stack with the `argc` values below it.
    fn call(&mut self, argc: usize);
    /// `container[index]` with index on top.
    fn load_index(&mut self);
    /// `container[index] = value` with index on top, then container, then value.
    fn store_index(&mut self);
    /// `container[key]` for a constant key.
    fn load_member(&mut self, key: &str);

    // Loops

    /// Enters a loop body.
    fn push_loop(&mut self, context: LoopContext);
    /// Leaves the innermost loop body.
    fn pop_loop(&mut self) -> Option<LoopContext>;
    /// The innermost loop, if any.
    fn current_loop(&self) -> Option<&LoopContext>;

    /// Jumps to the innermost break label. Returns false outside any loop.
    fn break_loop(&mut self) -> bool {
        match self.current_loop().map(|l| l.break_label.clone()) {
            Some(label) => {
                self.jump(&label);
                true
            }
            None => false,
        }
    }

    /// Jumps to the innermost continue label. Returns false outside any loop.
    fn continue_loop(&mut self) -> bool {
        match self.current_loop().map(|l| l.continue_label.clone()) {
            Some(label) => {
                self.jump(&label);
                true
            }
            None => false,
        }
    }

    // Coroutines and returns

    /// Suspends the running coroutine with the top value.
    fn yield_value(&mut self);
    /// Resumes the coroutine on top of the stack.
    fn resume(&mut self);
    /// Returns the top value from the current unit.
    fn return_value(&mut self);

    // Units

    /// Opens a nested function unit; subsequent emission goes into it.
    fn begin_function(&mut self, signature: FunctionSignature);
    /// Closes the innermost unit and pushes a closure over it in the enclosing one.
    fn end_function(&mut self);
    /// Pops field initializers then methods and pushes a class.
    fn define_class(&mut self, layout: ClassLayout);

    // Diagnostics

    /// Tags subsequent instructions with a source line.
    fn line(&mut self, line: u32);
    /// Returns an identifier unique within this compilation.
    fn fresh_id(&mut self) -> String;
}
