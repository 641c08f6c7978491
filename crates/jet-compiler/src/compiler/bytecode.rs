//! Bytecode definitions.
//!
//! Jumps stay symbolic: an instruction names its target label and each unit
//! keeps the label table that maps names to instruction indices.

use std::collections::BTreeMap;
use std::fmt;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::compiler::target::ClassLayout;

/// A constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Integer value
    Integer(i64),
    /// Real value
    Real(f64),
    /// String value (also used for names and member keys)
    String(String),
}

impl Constant {
    fn same(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Integer(a), Constant::Integer(b)) => a == b,
            (Constant::Real(a), Constant::Real(b)) => a.to_bits() == b.to_bits(),
            (Constant::String(a), Constant::String(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Integer(i) => write!(f, "{}", i),
            Constant::Real(r) => write!(f, "{:?}", r),
            Constant::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }

    /// The label a jump instruction targets.
    pub fn jump_label(&self) -> Option<&str> {
        match &self.operand {
            Some(Operand::Label(label)) => Some(label),
            _ => None,
        }
    }
}

/// Instruction operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Constant pool index
    Constant(u16),
    /// Local slot
    Local(u16),
    /// Name index in the constant pool
    Name(u16),
    /// Jump target
    Label(String),
    /// Number of arguments or elements
    Count(u16),
    /// Unit index in the module
    Function(u16),
    /// Class layout index in the module
    Class(u16),
}

/// Operation codes for the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Stack operations
    /// Push a constant
    LoadConst,
    /// Push null
    LoadNull,
    /// Pop the top value
    Pop,
    /// Duplicate the top value
    Dup,

    // Arithmetic
    /// Add
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Divide
    Div,
    /// Modulo
    Mod,
    /// Negate
    Neg,

    // Bitwise
    /// Bitwise AND
    BitAnd,
    /// Bitwise OR
    BitOr,
    /// Bitwise XOR
    BitXor,
    /// Bitwise NOT
    BitNot,
    /// Left shift
    Shl,
    /// Right shift
    Shr,

    // Comparison and logic
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Logical NOT
    Not,
    /// Logical AND of the top two values, both already evaluated
    LogicalAnd,
    /// Logical OR of the top two values, both already evaluated
    LogicalOr,

    // Variables
    /// Push a local slot
    LoadLocal,
    /// Pop into a local slot
    StoreLocal,
    /// Push a global by name
    LoadGlobal,
    /// Pop into a global by name
    StoreGlobal,

    // Containers
    /// Pop index and container, push `container[index]`
    LoadIndex,
    /// Pop index, container and value, store `container[index] = value`
    StoreIndex,
    /// Pop container, push `container[name]`
    LoadMember,
    /// Pop `n` values, push an array
    NewArray,
    /// Pop `n` key/value pairs, push an object
    NewObject,

    // Control flow
    /// Unconditional jump
    Jump,
    /// Pop, jump if falsy
    JumpIfFalse,

    // Functions
    /// Pop callee then `n` arguments, push the result
    Call,
    /// Pop and return from the current unit
    Return,
    /// Push a closure over a unit
    Closure,
    /// Pop field initializers and methods, push a class
    NewClass,

    // Coroutines
    /// Suspend with the top value, push the value resumed with
    Yield,
    /// Pop a coroutine, run it, push what it yielded
    Resume,
}

impl OpCode {
    /// Opcode for a binary operator applied to two evaluated operands.
    pub fn for_binary(operator: BinaryOperator) -> OpCode {
        match operator {
            BinaryOperator::Add => OpCode::Add,
            BinaryOperator::Subtract => OpCode::Sub,
            BinaryOperator::Multiply => OpCode::Mul,
            BinaryOperator::Divide => OpCode::Div,
            BinaryOperator::Modulo => OpCode::Mod,
            BinaryOperator::BitAnd => OpCode::BitAnd,
            BinaryOperator::BitOr => OpCode::BitOr,
            BinaryOperator::BitXor => OpCode::BitXor,
            BinaryOperator::LeftShift => OpCode::Shl,
            BinaryOperator::RightShift => OpCode::Shr,
            BinaryOperator::Equal => OpCode::Eq,
            BinaryOperator::NotEqual => OpCode::Ne,
            BinaryOperator::Less => OpCode::Lt,
            BinaryOperator::LessEqual => OpCode::Le,
            BinaryOperator::Greater => OpCode::Gt,
            BinaryOperator::GreaterEqual => OpCode::Ge,
            BinaryOperator::And => OpCode::LogicalAnd,
            BinaryOperator::Or => OpCode::LogicalOr,
        }
    }

    /// Opcode for a unary operator.
    pub fn for_unary(operator: UnaryOperator) -> OpCode {
        match operator {
            UnaryOperator::Negate => OpCode::Neg,
            UnaryOperator::Not => OpCode::Not,
            UnaryOperator::BitNot => OpCode::BitNot,
        }
    }
}

/// A compiled function-sized instruction sequence.
#[derive(Debug, Clone, Default)]
pub struct FunctionUnit {
    /// Unit name (`<main>` for the top level)
    pub name: String,
    /// Bound positional slots, receiver included
    pub params: u16,
    /// Whether the slot after the parameters collects extra arguments
    pub varargs: bool,
    /// Whether slot 0 is the receiver
    pub is_method: bool,
    /// Frame size: the most locals live at once
    pub locals: u16,
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// Source line of each instruction (empty when line info is off)
    pub lines: Vec<u32>,
    /// The constant pool
    pub constants: Vec<Constant>,
    /// Label name to instruction index
    pub labels: BTreeMap<String, usize>,
}

impl FunctionUnit {
    /// Creates an empty unit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Adds a constant, reusing an equal entry, and returns its index.
    ///
    /// Returns `None` when the pool is full.
    pub fn add_constant(&mut self, value: Constant) -> Option<u16> {
        if let Some(index) = self.constants.iter().position(|c| c.same(&value)) {
            return u16::try_from(index).ok();
        }
        let index = u16::try_from(self.constants.len()).ok()?;
        self.constants.push(value);
        Some(index)
    }

    /// Instruction index a label resolves to.
    pub fn resolve_label(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// String constant behind a `Name` operand.
    pub fn name_at(&self, index: u16) -> Option<&str> {
        match self.constants.get(index as usize) {
            Some(Constant::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Labels of every jump in emission order, paired with the jump opcode.
    pub fn jumps(&self) -> Vec<(OpCode, &str)> {
        self.instructions
            .iter()
            .filter_map(|i| i.jump_label().map(|label| (i.opcode, label)))
            .collect()
    }

    /// Renders one instruction with its operand decoded.
    pub fn describe(&self, instruction: &Instruction) -> String {
        let operand = match &instruction.operand {
            None => return format!("{:?}", instruction.opcode),
            Some(Operand::Constant(i)) => match self.constants.get(*i as usize) {
                Some(c) => format!("{} ({})", i, c),
                None => format!("{} (?)", i),
            },
            Some(Operand::Name(i)) => self.name_at(*i).unwrap_or("?").to_string(),
            Some(Operand::Local(slot)) => format!("${}", slot),
            Some(Operand::Label(label)) => label.clone(),
            Some(Operand::Count(n)) => n.to_string(),
            Some(Operand::Function(unit)) => format!("unit {}", unit),
            Some(Operand::Class(class)) => format!("class {}", class),
        };
        format!("{:?} {}", instruction.opcode, operand)
    }
}

impl fmt::Display for FunctionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} (params {}{}, locals {})",
            self.name,
            self.params,
            if self.varargs { "+" } else { "" },
            self.locals
        )?;

        let mut placed: Vec<(&usize, &String)> =
            self.labels.iter().map(|(name, at)| (at, name)).collect();
        placed.sort();
        let mut pending = placed.into_iter().peekable();

        for (index, instruction) in self.instructions.iter().enumerate() {
            while let Some((_, name)) = pending.next_if(|(at, _)| **at == index) {
                writeln!(f, "  {}:", name)?;
            }
            match self.lines.get(index) {
                Some(line) => write!(f, "    {:04} {:>4}  ", index, line)?,
                None => write!(f, "    {:04}       ", index)?,
            }
            writeln!(f, "{}", self.describe(instruction))?;
        }
        for (_, name) in pending {
            writeln!(f, "  {}:", name)?;
        }
        Ok(())
    }
}

/// The output of one compilation: unit 0 is the top level.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Compiled units
    pub units: Vec<FunctionUnit>,
    /// Class layouts referenced by `NewClass`
    pub classes: Vec<ClassLayout>,
}

impl Module {
    /// The top-level unit.
    pub fn main(&self) -> &FunctionUnit {
        &self.units[0]
    }

    /// Finds a unit by name.
    pub fn unit(&self, name: &str) -> Option<&FunctionUnit> {
        self.units.iter().find(|u| u.name == name)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, unit) in self.units.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "unit {}: {}", index, unit)?;
        }
        for (index, class) in self.classes.iter().enumerate() {
            writeln!(f)?;
            write!(f, "class {}: {}", index, class.name)?;
            if let Some(base) = &class.base {
                write!(f, " : {}", base)?;
            }
            writeln!(f)?;
            writeln!(f, "  fields: {}", class.fields.join(", "))?;
            writeln!(f, "  methods: {}", class.methods.join(", "))?;
        }
        Ok(())
    }
}
