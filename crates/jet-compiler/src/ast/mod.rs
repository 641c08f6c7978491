//! Abstract Syntax Tree (AST) definitions for Jet.
//!
//! The parser builds these nodes bottom-up. Every node owns its children
//! exclusively; dropping the root releases the whole tree. After
//! construction the tree is parent-linked once ([`Expression::link_parents`]) and is then
//! read-only for every compile.

mod link;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of a node, assigned in pre-order by the parent-linking pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u32);

/// A source token: text plus the line it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The token text
    pub text: String,
    /// Source line (1-based)
    pub line: u32,
}

impl Token {
    /// Creates a new token.
    pub fn new(text: impl Into<String>, line: u32) -> Self {
        Self {
            text: text.into(),
            line,
        }
    }
}

/// A declared name with an optional initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDefine {
    /// The declared name
    pub name: Token,
    /// Initializer expression, if any
    #[serde(default)]
    pub initializer: Option<Expression>,
}

impl VarDefine {
    /// Creates a declaration.
    pub fn new(name: Token, initializer: Option<Expression>) -> Self {
        Self { name, initializer }
    }
}

/// A node of the expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Pre-order identity, set by [`Expression::link_parents`]
    #[serde(skip)]
    pub id: NodeId,
    /// Identity of the syntactic parent, unset on the root
    #[serde(skip)]
    pub parent: Option<NodeId>,
    /// Source line
    #[serde(default)]
    pub line: u32,
    /// The node variant
    pub kind: ExprKind,
}

/// The closed set of node variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Integer literal
    Integer(i64),
    /// Real literal
    Real(f64),
    /// String literal
    String(String),
    /// `null`
    Null,
    /// Name reference
    Name(NameExpression),
    /// `[a, b, c]`
    Array(Vec<Expression>),
    /// `{ key = value, ... }`
    Object(Vec<ObjectEntry>),
    /// `base[index]`
    Index(IndexExpression),
    /// `target = value`
    Assign {
        /// Must be storable
        target: Box<Expression>,
        /// Assigned value
        value: Box<Expression>,
    },
    /// `target op= value`
    CompoundAssign {
        /// Operator applied between the current and the new value
        operator: BinaryOperator,
        /// Must be storable
        target: Box<Expression>,
        /// Right-hand operand
        value: Box<Expression>,
    },
    /// `left <-> right`
    Swap {
        /// Must be storable
        left: Box<Expression>,
        /// Must be storable
        right: Box<Expression>,
    },
    /// `++x` / `--x`
    Prefix {
        /// The update operator
        operator: UpdateOperator,
        /// Must be storable
        operand: Box<Expression>,
    },
    /// `x++` / `x--`
    Postfix {
        /// The update operator
        operator: UpdateOperator,
        /// Must be storable
        operand: Box<Expression>,
    },
    /// `-x`, `!x`, `~x`
    Unary {
        /// The operator
        operator: UnaryOperator,
        /// The operand
        operand: Box<Expression>,
    },
    /// `left op right`
    Binary {
        /// The operator
        operator: BinaryOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
    /// Statement sequence without a scope of its own
    Block(Vec<Expression>),
    /// Statement sequence bracketed by a scope
    Scope(Vec<Expression>),
    /// `while (condition) body`
    While {
        /// Loop condition
        condition: Box<Expression>,
        /// Scoped body
        body: Box<Expression>,
    },
    /// `for (initial; condition; increment) body`
    For {
        /// Runs once before the first test
        initial: Box<Expression>,
        /// Loop condition
        condition: Box<Expression>,
        /// Runs after every iteration, including continued ones
        increment: Box<Expression>,
        /// Scoped body
        body: Box<Expression>,
    },
    /// `for (variable in container) body`
    ForEach {
        /// Loop variable
        variable: Token,
        /// Iterated container
        container: Box<Expression>,
        /// Scoped body
        body: Box<Expression>,
    },
    /// `if / elseif / else`
    If {
        /// Conditional branches in declaration order
        branches: Vec<Branch>,
        /// Else block
        #[serde(default)]
        otherwise: Option<Box<Expression>>,
    },
    /// `callee(arguments)`
    Call {
        /// Called expression
        callee: Box<Expression>,
        /// Arguments, possibly empty
        #[serde(default)]
        arguments: Vec<Expression>,
    },
    /// Function or method definition
    Function(FunctionExpression),
    /// Class definition
    Class(ClassExpression),
    /// `local a = 1, b`
    Local(Vec<VarDefine>),
    /// `global a = 1, b`
    Global(Vec<VarDefine>),
    /// `return [value]`
    Return(Option<Box<Expression>>),
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `yield [value]`
    Yield(Option<Box<Expression>>),
    /// `resume target`
    Resume(Box<Expression>),
}

/// A name reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameExpression {
    /// The referenced identifier
    pub name: String,
}

/// An indexed access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexExpression {
    /// The indexed container
    pub base: Box<Expression>,
    /// The index
    pub index: Box<Expression>,
}

/// One `key = value` pair of an object literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Member key
    pub key: String,
    /// Member initializer
    pub value: Expression,
}

/// One `(condition, block)` arm of an if chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch condition
    pub condition: Expression,
    /// Branch body
    pub block: Expression,
}

/// A function definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpression {
    /// Where the closure is stored; anonymous when absent
    #[serde(default)]
    pub name: Option<Box<Expression>>,
    /// Positional parameters
    #[serde(default)]
    pub params: Vec<Token>,
    /// Scoped body
    pub body: Box<Expression>,
    /// Name receiving the remaining arguments
    #[serde(default)]
    pub varargs: Option<Token>,
    /// Methods bind an implicit receiver before the parameters
    #[serde(default)]
    pub is_method: bool,
}

/// A class definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassExpression {
    /// Class name
    pub name: Token,
    /// Base class name, resolved at link time
    #[serde(default)]
    pub base: Option<String>,
    /// Methods keyed by name; each value is a `Function` node
    #[serde(default)]
    pub methods: BTreeMap<String, Expression>,
    /// Fields with optional default values
    #[serde(default)]
    pub fields: Vec<VarDefine>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    LeftShift,
    /// `>>`
    RightShift,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `&&`, short-circuit
    And,
    /// `||`, short-circuit
    Or,
}

impl BinaryOperator {
    /// Source spelling of the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::LeftShift => "<<",
            BinaryOperator::RightShift => ">>",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }

    /// Whether the operator short-circuits.
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

/// Prefix operators that do not store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// `-`
    Negate,
    /// `!`
    Not,
    /// `~`
    BitNot,
}

impl UnaryOperator {
    /// Source spelling of the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::BitNot => "~",
        }
    }
}

/// `++` / `--`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateOperator {
    /// `++`
    Increment,
    /// `--`
    Decrement,
}

impl UpdateOperator {
    /// The arithmetic performed against the constant one.
    pub fn arithmetic(&self) -> BinaryOperator {
        match self {
            UpdateOperator::Increment => BinaryOperator::Add,
            UpdateOperator::Decrement => BinaryOperator::Subtract,
        }
    }
}

impl ExprKind {
    /// Short human-readable variant name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Integer(_) => "integer",
            ExprKind::Real(_) => "real",
            ExprKind::String(_) => "string",
            ExprKind::Null => "null",
            ExprKind::Name(_) => "name",
            ExprKind::Array(_) => "array",
            ExprKind::Object(_) => "object",
            ExprKind::Index(_) => "index",
            ExprKind::Assign { .. } => "assignment",
            ExprKind::CompoundAssign { .. } => "compound assignment",
            ExprKind::Swap { .. } => "swap",
            ExprKind::Prefix { .. } => "prefix",
            ExprKind::Postfix { .. } => "postfix",
            ExprKind::Unary { .. } => "unary",
            ExprKind::Binary { .. } => "binary operator",
            ExprKind::Block(_) => "block",
            ExprKind::Scope(_) => "scope",
            ExprKind::While { .. } => "while",
            ExprKind::For { .. } => "for",
            ExprKind::ForEach { .. } => "for-each",
            ExprKind::If { .. } => "if",
            ExprKind::Call { .. } => "call",
            ExprKind::Function(_) => "function",
            ExprKind::Class(_) => "class",
            ExprKind::Local(_) => "local",
            ExprKind::Global(_) => "global",
            ExprKind::Return(_) => "return",
            ExprKind::Break => "break",
            ExprKind::Continue => "continue",
            ExprKind::Yield(_) => "yield",
            ExprKind::Resume(_) => "resume",
        }
    }
}

// ============================================================================
// Construction helpers for parsers and tests
// ============================================================================

impl Expression {
    /// Creates an unlinked node.
    pub fn new(line: u32, kind: ExprKind) -> Self {
        Self {
            id: NodeId::default(),
            parent: None,
            line,
            kind,
        }
    }

    /// Integer literal.
    pub fn integer(line: u32, value: i64) -> Self {
        Self::new(line, ExprKind::Integer(value))
    }

    /// Real literal.
    pub fn real(line: u32, value: f64) -> Self {
        Self::new(line, ExprKind::Real(value))
    }

    /// String literal.
    pub fn string(line: u32, value: impl Into<String>) -> Self {
        Self::new(line, ExprKind::String(value.into()))
    }

    /// `null`.
    pub fn null(line: u32) -> Self {
        Self::new(line, ExprKind::Null)
    }

    /// Name reference.
    pub fn name(line: u32, name: impl Into<String>) -> Self {
        Self::new(line, ExprKind::Name(NameExpression { name: name.into() }))
    }

    /// `base[index]`.
    pub fn index(line: u32, base: Expression, index: Expression) -> Self {
        Self::new(
            line,
            ExprKind::Index(IndexExpression {
                base: Box::new(base),
                index: Box::new(index),
            }),
        )
    }

    /// `target = value`.
    pub fn assign(line: u32, target: Expression, value: Expression) -> Self {
        Self::new(
            line,
            ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
        )
    }

    /// `left op right`.
    pub fn binary(line: u32, operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::new(
            line,
            ExprKind::Binary {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    /// `callee(arguments)`.
    pub fn call(line: u32, callee: Expression, arguments: Vec<Expression>) -> Self {
        Self::new(
            line,
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
        )
    }

    /// Unscoped statement sequence.
    pub fn block(line: u32, statements: Vec<Expression>) -> Self {
        Self::new(line, ExprKind::Block(statements))
    }

    /// Scoped statement sequence.
    pub fn scope(line: u32, statements: Vec<Expression>) -> Self {
        Self::new(line, ExprKind::Scope(statements))
    }

    /// Whether this node is a block or scope with no statements.
    pub fn is_empty_block(&self) -> bool {
        match &self.kind {
            ExprKind::Block(statements) | ExprKind::Scope(statements) => statements.is_empty(),
            _ => false,
        }
    }
}
