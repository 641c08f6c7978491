//! The reference [`CompileTarget`]: assembles function units with symbolic
//! labels and hands them back as a [`Module`].

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::compiler::bytecode::{Constant, FunctionUnit, Instruction, Module, OpCode, Operand};
use crate::compiler::options::{CompilerOptions, StoreResolution};
use crate::compiler::scope::Scope;
use crate::compiler::target::{
    ClassLayout, CompileTarget, FunctionSignature, LoopContext, RECEIVER,
};
use crate::error::{CompileError, Result};

/// Name of the top-level unit.
pub const MAIN_UNIT: &str = "<main>";

/// A unit being assembled.
#[derive(Debug)]
struct UnitBuilder {
    /// Index reserved for this unit in the module
    index: usize,
    unit: FunctionUnit,
    scope: Scope,
    loops: Vec<LoopContext>,
    line: u32,
}

impl UnitBuilder {
    fn new(index: usize, unit: FunctionUnit) -> Self {
        Self {
            index,
            unit,
            scope: Scope::new(),
            loops: Vec::new(),
            line: 0,
        }
    }
}

/// Assembles bytecode for one compilation.
#[derive(Debug)]
pub struct Assembler {
    options: CompilerOptions,
    main: UnitBuilder,
    /// Open nested units, innermost last
    nested: Vec<UnitBuilder>,
    /// Finished units; placeholders for units still open
    units: Vec<FunctionUnit>,
    classes: Vec<ClassLayout>,
    globals: FxHashSet<String>,
    next_id: u32,
    /// First integrity violation, reported by `finish`
    fault: Option<CompileError>,
}

impl Assembler {
    /// Creates an assembler with the top-level unit open.
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            main: UnitBuilder::new(0, FunctionUnit::new(MAIN_UNIT)),
            nested: Vec::new(),
            units: vec![FunctionUnit::default()],
            classes: Vec::new(),
            globals: FxHashSet::default(),
            next_id: 0,
            fault: None,
        }
    }

    /// The options this assembler was built with.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Names declared global so far.
    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    /// Whether `name` resolves to a local of the unit being assembled.
    pub fn is_local(&self, name: &str) -> bool {
        self.current_ref().scope.is_local(name)
    }

    /// Closes the top-level unit and returns the module.
    ///
    /// Fails when a label was placed twice, a jump targets a label that was
    /// never placed, or scopes, loops or units were left open.
    pub fn finish(mut self) -> Result<Module> {
        if let Some(fault) = self.fault.take() {
            return Err(fault);
        }
        if !self.nested.is_empty() {
            return Err(CompileError::UnbalancedScope("function unit"));
        }
        if self.main.scope.depth != 0 {
            return Err(CompileError::UnbalancedScope("scope"));
        }
        if !self.main.loops.is_empty() {
            return Err(CompileError::UnbalancedScope("loop context"));
        }

        let main = seal(self.main);
        self.units[0] = main;
        for unit in &self.units {
            check_jumps(unit)?;
        }

        debug!(
            units = self.units.len(),
            classes = self.classes.len(),
            "assembled module"
        );
        Ok(Module {
            units: self.units,
            classes: self.classes,
        })
    }

    fn current(&mut self) -> &mut UnitBuilder {
        self.nested.last_mut().unwrap_or(&mut self.main)
    }

    fn current_ref(&self) -> &UnitBuilder {
        self.nested.last().unwrap_or(&self.main)
    }

    fn fail(&mut self, error: CompileError) {
        if self.fault.is_none() {
            self.fault = Some(error);
        }
    }

    fn overflow(&mut self, what: &'static str) {
        let unit = self.current_ref().unit.name.clone();
        self.fail(CompileError::Limit { what, unit });
    }

    /// Narrows `value` to an operand, faulting when it does not fit.
    fn operand(&mut self, what: &'static str, value: usize) -> u16 {
        match u16::try_from(value) {
            Ok(operand) => operand,
            Err(_) => {
                self.overflow(what);
                u16::MAX
            }
        }
    }

    fn emit(&mut self, instruction: Instruction) -> usize {
        let with_lines = self.options.emit_line_info;
        let builder = self.current();
        if with_lines {
            builder.unit.lines.push(builder.line);
        }
        builder.unit.emit(instruction)
    }

    fn emit_simple(&mut self, opcode: OpCode) {
        self.emit(Instruction::simple(opcode));
    }

    fn emit_name(&mut self, opcode: OpCode, name: &str) {
        let added = self
            .current()
            .unit
            .add_constant(Constant::String(name.to_string()));
        let Some(index) = added else {
            self.overflow("constants");
            return;
        };
        self.emit(Instruction::with_operand(opcode, Operand::Name(index)));
    }

    fn emit_local(&mut self, opcode: OpCode, slot: u16) {
        self.emit(Instruction::with_operand(opcode, Operand::Local(slot)));
    }

    fn emit_count(&mut self, opcode: OpCode, what: &'static str, count: usize) {
        let count = self.operand(what, count);
        self.emit(Instruction::with_operand(opcode, Operand::Count(count)));
    }

    fn at_top_level(&self) -> bool {
        self.nested.is_empty() && self.main.scope.depth == 0
    }
}

/// Closes a builder's unit, recording its frame size.
fn seal(builder: UnitBuilder) -> FunctionUnit {
    let mut unit = builder.unit;
    unit.locals = builder.scope.high_water;
    unit
}

fn check_jumps(unit: &FunctionUnit) -> Result<()> {
    for instruction in &unit.instructions {
        if let Some(label) = instruction.jump_label() {
            if !unit.labels.contains_key(label) {
                return Err(CompileError::UndefinedLabel {
                    label: label.to_string(),
                    unit: unit.name.clone(),
                });
            }
        }
    }
    Ok(())
}

impl CompileTarget for Assembler {
    fn enter_scope(&mut self) {
        self.current().scope.begin_scope();
    }

    fn exit_scope(&mut self) {
        if self.current().scope.end_scope().is_none() {
            self.fail(CompileError::UnbalancedScope("scope"));
        }
    }

    fn register_local(&mut self, name: &str) -> u16 {
        match self.current().scope.declare(name) {
            Some(slot) => slot,
            None => {
                self.overflow("locals");
                u16::MAX
            }
        }
    }

    fn declare_global(&mut self, name: &str) {
        self.globals.insert(name.to_string());
    }

    fn load(&mut self, name: &str) {
        match self.current().scope.resolve(name) {
            Some(slot) => self.emit_local(OpCode::LoadLocal, slot),
            None => self.emit_name(OpCode::LoadGlobal, name),
        }
    }

    fn store(&mut self, name: &str) {
        if let Some(slot) = self.current().scope.resolve(name) {
            self.emit_local(OpCode::StoreLocal, slot);
            return;
        }
        if self.globals.contains(name) {
            self.emit_name(OpCode::StoreGlobal, name);
            return;
        }
        match self.options.store_resolution {
            StoreResolution::ImplicitLocal if !self.at_top_level() => {
                let slot = self.register_local(name);
                trace!(name, slot, "implicit local");
                self.emit_local(OpCode::StoreLocal, slot);
            }
            StoreResolution::Global | StoreResolution::ImplicitLocal => {
                self.emit_name(OpCode::StoreGlobal, name);
            }
        }
    }

    fn label(&mut self, name: &str) {
        let builder = self.current();
        let at = builder.unit.instructions.len();
        if builder.unit.labels.contains_key(name) {
            let unit = builder.unit.name.clone();
            self.fail(CompileError::DuplicateLabel {
                label: name.to_string(),
                unit,
            });
            return;
        }
        builder.unit.labels.insert(name.to_string(), at);
        trace!(label = name, at, "label");
    }

    fn jump(&mut self, label: &str) {
        self.emit(Instruction::with_operand(
            OpCode::Jump,
            Operand::Label(label.to_string()),
        ));
    }

    fn jump_if_false(&mut self, label: &str) {
        self.emit(Instruction::with_operand(
            OpCode::JumpIfFalse,
            Operand::Label(label.to_string()),
        ));
    }

    fn duplicate(&mut self) {
        self.emit_simple(OpCode::Dup);
    }

    fn pop(&mut self) {
        self.emit_simple(OpCode::Pop);
    }

    fn push_null(&mut self) {
        self.emit_simple(OpCode::LoadNull);
    }

    fn push_constant(&mut self, value: Constant) {
        let Some(index) = self.current().unit.add_constant(value) else {
            self.overflow("constants");
            return;
        };
        self.emit(Instruction::with_operand(
            OpCode::LoadConst,
            Operand::Constant(index),
        ));
    }

    fn new_array(&mut self, count: usize) {
        self.emit_count(OpCode::NewArray, "array elements", count);
    }

    fn new_object(&mut self, count: usize) {
        self.emit_count(OpCode::NewObject, "object entries", count);
    }

    fn binary(&mut self, operator: BinaryOperator) {
        self.emit_simple(OpCode::for_binary(operator));
    }

    fn unary(&mut self, operator: UnaryOperator) {
        self.emit_simple(OpCode::for_unary(operator));
    }

    fn call(&mut self, argc: usize) {
        self.emit_count(OpCode::Call, "arguments", argc);
    }

    fn load_index(&mut self) {
        self.emit_simple(OpCode::LoadIndex);
    }

    fn store_index(&mut self) {
        self.emit_simple(OpCode::StoreIndex);
    }

    fn load_member(&mut self, key: &str) {
        self.emit_name(OpCode::LoadMember, key);
    }

    fn push_loop(&mut self, context: LoopContext) {
        trace!(
            break_label = %context.break_label,
            continue_label = %context.continue_label,
            "enter loop"
        );
        self.current().loops.push(context);
    }

    fn pop_loop(&mut self) -> Option<LoopContext> {
        let popped = self.current().loops.pop();
        if popped.is_none() {
            self.fail(CompileError::UnbalancedScope("loop context"));
        }
        popped
    }

    fn current_loop(&self) -> Option<&LoopContext> {
        self.current_ref().loops.last()
    }

    fn yield_value(&mut self) {
        self.emit_simple(OpCode::Yield);
    }

    fn resume(&mut self) {
        self.emit_simple(OpCode::Resume);
    }

    fn return_value(&mut self) {
        self.emit_simple(OpCode::Return);
    }

    fn begin_function(&mut self, signature: FunctionSignature) {
        let index = self.units.len();
        self.units.push(FunctionUnit::default());

        let mut unit = FunctionUnit::new(signature.name.as_str());
        unit.is_method = signature.is_method;
        unit.varargs = signature.varargs.is_some();

        let line = self.current_ref().line;
        let mut builder = UnitBuilder::new(index, unit);
        builder.line = line;
        builder.scope.begin_scope();
        self.nested.push(builder);

        let params = signature.params.len() + usize::from(signature.is_method);
        let params = self.operand("parameters", params);
        self.current().unit.params = params;
        if signature.is_method {
            self.register_local(RECEIVER);
        }
        for param in &signature.params {
            self.register_local(param);
        }
        if let Some(rest) = &signature.varargs {
            self.register_local(rest);
        }

        debug!(unit = %signature.name, index, params, "begin function");
    }

    fn end_function(&mut self) {
        let Some(mut builder) = self.nested.pop() else {
            self.fail(CompileError::UnbalancedScope("function unit"));
            return;
        };
        if !builder.loops.is_empty() {
            self.fail(CompileError::UnbalancedScope("loop context"));
        }
        if builder.scope.end_scope().is_none() || builder.scope.depth != 0 {
            self.fail(CompileError::UnbalancedScope("scope"));
        }

        let index = builder.index;
        let unit = seal(builder);
        debug!(unit = %unit.name, index, size = unit.instructions.len(), "end function");
        self.units[index] = unit;
        let operand = self.operand("function units", index);
        self.emit(Instruction::with_operand(
            OpCode::Closure,
            Operand::Function(operand),
        ));
    }

    fn define_class(&mut self, layout: ClassLayout) {
        let index = self.classes.len();
        debug!(
            class = %layout.name,
            fields = layout.fields.len(),
            methods = layout.methods.len(),
            "define class"
        );
        self.classes.push(layout);
        let operand = self.operand("classes", index);
        self.emit(Instruction::with_operand(
            OpCode::NewClass,
            Operand::Class(operand),
        ));
    }

    fn line(&mut self, line: u32) {
        self.current().line = line;
    }

    fn fresh_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }
}
