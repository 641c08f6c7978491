//! A small stack machine that runs assembled modules in tests.
//!
//! It covers the instructions lowering emits, except coroutines.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use jet_compiler::ast::Expression;
use jet_compiler::compiler::{Constant, Module, OpCode, Operand};
use jet_compiler::{CompilerOptions, compile};

const STEP_LIMIT: usize = 100_000;

/// Host function callable from compiled code.
pub type NativeFn = Rc<dyn Fn(&[Value]) -> Value>;

#[derive(Clone)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<BTreeMap<String, Value>>>),
    Closure(usize),
    Class(usize),
    Native(NativeFn),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(members: Vec<(&str, Value)>) -> Value {
        Value::Object(Rc::new(RefCell::new(
            members
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )))
    }

    pub fn native(f: impl Fn(&[Value]) -> Value + 'static) -> Value {
        Value::Native(Rc::new(f))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(i) => *i != 0,
            Value::Real(r) => *r != 0.0,
            _ => true,
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            other => panic!("expected an integer, got {:?}", other),
        }
    }

    pub fn items(&self) -> Vec<Value> {
        match self {
            Value::Array(items) => items.borrow().clone(),
            other => panic!("expected an array, got {:?}", other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{:?}", r),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(members) => f.debug_map().entries(members.borrow().iter()).finish(),
            Value::Closure(unit) => write!(f, "<closure {}>", unit),
            Value::Class(class) => write!(f, "<class {}>", class),
            Value::Native(_) => write!(f, "<native>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Int(a), Value::Real(b)) | (Value::Real(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => *a.borrow() == *b.borrow(),
            (Value::Closure(a), Value::Closure(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

pub struct Machine<'m> {
    module: &'m Module,
    pub globals: HashMap<String, Value>,
    steps: usize,
}

impl<'m> Machine<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            globals: HashMap::new(),
            steps: 0,
        }
    }

    pub fn with_global(mut self, name: &str, value: Value) -> Self {
        self.globals.insert(name.to_string(), value);
        self
    }

    pub fn global(&self, name: &str) -> Value {
        self.globals.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Runs the top-level unit.
    pub fn run(&mut self) -> Value {
        self.invoke(0, Vec::new())
    }

    fn invoke(&mut self, index: usize, args: Vec<Value>) -> Value {
        let module = self.module;
        let unit = &module.units[index];

        let bound = unit.params as usize + usize::from(unit.varargs);
        let mut slots = vec![Value::Null; (unit.locals as usize).max(bound)];
        let mut args = args.into_iter();
        for slot in slots.iter_mut().take(unit.params as usize) {
            *slot = args.next().unwrap_or(Value::Null);
        }
        if unit.varargs {
            slots[unit.params as usize] = Value::array(args.collect());
        }

        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;
        while pc < unit.instructions.len() {
            self.steps += 1;
            assert!(self.steps < STEP_LIMIT, "step limit exceeded");

            let instruction = &unit.instructions[pc];
            pc += 1;
            let operand = instruction.operand.as_ref();

            match instruction.opcode {
                OpCode::LoadConst => {
                    let Some(Operand::Constant(i)) = operand else {
                        panic!("bad operand")
                    };
                    stack.push(match &unit.constants[*i as usize] {
                        Constant::Integer(i) => Value::Int(*i),
                        Constant::Real(r) => Value::Real(*r),
                        Constant::String(s) => Value::Str(s.clone()),
                    });
                }
                OpCode::LoadNull => stack.push(Value::Null),
                OpCode::Pop => {
                    stack.pop().expect("pop on empty stack");
                }
                OpCode::Dup => {
                    let top = stack.last().cloned().expect("dup on empty stack");
                    stack.push(top);
                }

                OpCode::Neg => {
                    let value = stack.pop().unwrap();
                    stack.push(match value {
                        Value::Int(i) => Value::Int(-i),
                        Value::Real(r) => Value::Real(-r),
                        other => panic!("cannot negate {:?}", other),
                    });
                }
                OpCode::Not => {
                    let value = stack.pop().unwrap();
                    stack.push(Value::Int(i64::from(!value.truthy())));
                }
                OpCode::BitNot => {
                    let value = stack.pop().unwrap();
                    stack.push(Value::Int(!value.as_int()));
                }

                OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Mod
                | OpCode::BitAnd
                | OpCode::BitOr
                | OpCode::BitXor
                | OpCode::Shl
                | OpCode::Shr
                | OpCode::Eq
                | OpCode::Ne
                | OpCode::Lt
                | OpCode::Le
                | OpCode::Gt
                | OpCode::Ge
                | OpCode::LogicalAnd
                | OpCode::LogicalOr => {
                    let right = stack.pop().unwrap();
                    let left = stack.pop().unwrap();
                    stack.push(binary(instruction.opcode, left, right));
                }

                OpCode::LoadLocal => {
                    let Some(Operand::Local(slot)) = operand else {
                        panic!("bad operand")
                    };
                    stack.push(slots[*slot as usize].clone());
                }
                OpCode::StoreLocal => {
                    let Some(Operand::Local(slot)) = operand else {
                        panic!("bad operand")
                    };
                    slots[*slot as usize] = stack.pop().unwrap();
                }
                OpCode::LoadGlobal => {
                    let name = name_operand(unit, operand);
                    stack.push(self.global(name));
                }
                OpCode::StoreGlobal => {
                    let name = name_operand(unit, operand);
                    let value = stack.pop().unwrap();
                    self.globals.insert(name.to_string(), value);
                }

                OpCode::LoadIndex => {
                    let index = stack.pop().unwrap();
                    let container = stack.pop().unwrap();
                    stack.push(get(&container, &index));
                }
                OpCode::StoreIndex => {
                    let index = stack.pop().unwrap();
                    let container = stack.pop().unwrap();
                    let value = stack.pop().unwrap();
                    set(&container, &index, value);
                }
                OpCode::LoadMember => {
                    let key = name_operand(unit, operand);
                    let container = stack.pop().unwrap();
                    stack.push(get(&container, &Value::Str(key.to_string())));
                }
                OpCode::NewArray => {
                    let n = count_operand(operand);
                    let items = stack.split_off(stack.len() - n);
                    stack.push(Value::array(items));
                }
                OpCode::NewObject => {
                    let n = count_operand(operand);
                    let flat = stack.split_off(stack.len() - 2 * n);
                    let mut members = BTreeMap::new();
                    for pair in flat.chunks(2) {
                        let Value::Str(key) = &pair[0] else {
                            panic!("object key must be a string")
                        };
                        members.insert(key.clone(), pair[1].clone());
                    }
                    stack.push(Value::Object(Rc::new(RefCell::new(members))));
                }

                OpCode::Jump => pc = target(unit, instruction.jump_label()),
                OpCode::JumpIfFalse => {
                    if !stack.pop().unwrap().truthy() {
                        pc = target(unit, instruction.jump_label());
                    }
                }

                OpCode::Call => {
                    let argc = count_operand(operand);
                    let callee = stack.pop().unwrap();
                    let args = stack.split_off(stack.len() - argc);
                    let result = match callee {
                        Value::Closure(index) => self.invoke(index, args),
                        Value::Native(f) => f(&args),
                        other => panic!("cannot call {:?}", other),
                    };
                    stack.push(result);
                }
                OpCode::Return => return stack.pop().unwrap(),
                OpCode::Closure => {
                    let Some(Operand::Function(index)) = operand else {
                        panic!("bad operand")
                    };
                    stack.push(Value::Closure(*index as usize));
                }
                OpCode::NewClass => {
                    let Some(Operand::Class(index)) = operand else {
                        panic!("bad operand")
                    };
                    let layout = &module.classes[*index as usize];
                    let members = layout.fields.len() + layout.methods.len();
                    stack.truncate(stack.len() - members);
                    stack.push(Value::Class(*index as usize));
                }

                OpCode::Yield | OpCode::Resume => panic!("coroutines are not supported here"),
            }
        }
        Value::Null
    }
}

fn name_operand<'u>(unit: &'u jet_compiler::compiler::FunctionUnit, operand: Option<&Operand>) -> &'u str {
    match operand {
        Some(Operand::Name(index)) => unit.name_at(*index).expect("name constant"),
        other => panic!("bad name operand {:?}", other),
    }
}

fn count_operand(operand: Option<&Operand>) -> usize {
    match operand {
        Some(Operand::Count(n)) => *n as usize,
        other => panic!("bad count operand {:?}", other),
    }
}

fn target(unit: &jet_compiler::compiler::FunctionUnit, label: Option<&str>) -> usize {
    let label = label.expect("jump without label");
    unit.resolve_label(label).expect("undefined label")
}

fn get(container: &Value, index: &Value) -> Value {
    match (container, index) {
        (Value::Array(items), Value::Int(i)) => {
            items.borrow().get(*i as usize).cloned().unwrap_or(Value::Null)
        }
        (Value::Object(members), Value::Str(key)) => {
            members.borrow().get(key).cloned().unwrap_or(Value::Null)
        }
        (container, index) => panic!("cannot index {:?} with {:?}", container, index),
    }
}

fn set(container: &Value, index: &Value, value: Value) {
    match (container, index) {
        (Value::Array(items), Value::Int(i)) => {
            let mut items = items.borrow_mut();
            let i = *i as usize;
            if i >= items.len() {
                items.resize(i + 1, Value::Null);
            }
            items[i] = value;
        }
        (Value::Object(members), Value::Str(key)) => {
            members.borrow_mut().insert(key.clone(), value);
        }
        (container, index) => panic!("cannot index {:?} with {:?}", container, index),
    }
}

fn binary(opcode: OpCode, left: Value, right: Value) -> Value {
    let flag = |b: bool| Value::Int(i64::from(b));
    match opcode {
        OpCode::Eq => return flag(left == right),
        OpCode::Ne => return flag(left != right),
        OpCode::LogicalAnd => return flag(left.truthy() && right.truthy()),
        OpCode::LogicalOr => return flag(left.truthy() || right.truthy()),
        _ => {}
    }

    if let (OpCode::Add, Value::Str(a), Value::Str(b)) = (opcode, &left, &right) {
        return Value::Str(format!("{}{}", a, b));
    }

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => match opcode {
            OpCode::Add => Value::Int(a + b),
            OpCode::Sub => Value::Int(a - b),
            OpCode::Mul => Value::Int(a * b),
            OpCode::Div => Value::Int(a / b),
            OpCode::Mod => Value::Int(a % b),
            OpCode::BitAnd => Value::Int(a & b),
            OpCode::BitOr => Value::Int(a | b),
            OpCode::BitXor => Value::Int(a ^ b),
            OpCode::Shl => Value::Int(a << b),
            OpCode::Shr => Value::Int(a >> b),
            OpCode::Lt => flag(a < b),
            OpCode::Le => flag(a <= b),
            OpCode::Gt => flag(a > b),
            OpCode::Ge => flag(a >= b),
            other => panic!("unsupported integer operation {:?}", other),
        },
        (left, right) => {
            let as_real = |v: &Value| match v {
                Value::Int(i) => *i as f64,
                Value::Real(r) => *r,
                other => panic!("expected a number, got {:?}", other),
            };
            let (a, b) = (as_real(&left), as_real(&right));
            match opcode {
                OpCode::Add => Value::Real(a + b),
                OpCode::Sub => Value::Real(a - b),
                OpCode::Mul => Value::Real(a * b),
                OpCode::Div => Value::Real(a / b),
                OpCode::Lt => flag(a < b),
                OpCode::Le => flag(a <= b),
                OpCode::Gt => flag(a > b),
                OpCode::Ge => flag(a >= b),
                other => panic!("unsupported real operation {:?}", other),
            }
        }
    }
}

/// Links and compiles a tree with default options.
pub fn build(mut tree: Expression) -> Module {
    build_with(&mut tree, CompilerOptions::default())
}

pub fn build_with(tree: &mut Expression, options: CompilerOptions) -> Module {
    tree.link_parents();
    compile(tree, options).expect("compilation should succeed")
}
