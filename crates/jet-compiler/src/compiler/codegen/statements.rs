//! Statement forms: blocks, loops, branches, declarations and classes.

use crate::ast::{Branch, ClassExpression, ExprKind, Expression, Token, VarDefine};
use crate::compiler::target::{ClassLayout, CompileTarget, FunctionSignature, LoopContext, Usage};
use crate::error::{CompileError, Result};

/// Iterator protocol member names.
const ITERATOR: &str = "iterator";
const ADVANCE: &str = "advance";
const CURRENT: &str = "current";

impl Expression {
    /// Emits a statement form. Leaves nothing on the stack.
    pub(super) fn compile_statement(&self, target: &mut dyn CompileTarget) -> Result<()> {
        match &self.kind {
            ExprKind::Block(statements) => compile_sequence(statements, target)?,

            ExprKind::Scope(statements) => {
                target.enter_scope();
                compile_sequence(statements, target)?;
                target.exit_scope();
            }

            ExprKind::While { condition, body } => {
                target.line(self.line);
                let id = target.fresh_id();
                let start = format!("while_start_{}", id);
                let end = format!("while_end_{}", id);

                target.label(&start);
                condition.compile(target, Usage::Value)?;
                target.jump_if_false(&end);

                target.push_loop(LoopContext::new(&end, &start));
                body.compile(target, Usage::Discard)?;
                target.pop_loop();

                target.jump(&start);
                target.label(&end);
            }

            ExprKind::For {
                initial,
                condition,
                increment,
                body,
            } => {
                target.line(self.line);
                let id = target.fresh_id();
                let start = format!("for_start_{}", id);
                let next = format!("for_continue_{}", id);
                let end = format!("for_end_{}", id);

                initial.compile(target, Usage::Discard)?;
                target.label(&start);
                condition.compile(target, Usage::Value)?;
                target.jump_if_false(&end);

                target.push_loop(LoopContext::new(&end, &next));
                body.compile(target, Usage::Discard)?;
                target.pop_loop();

                // `continue` lands here so the increment runs every iteration
                target.label(&next);
                increment.compile(target, Usage::Discard)?;
                target.jump(&start);
                target.label(&end);
            }

            ExprKind::ForEach {
                variable,
                container,
                body,
            } => compile_for_each(self.line, variable, container, body, target)?,

            ExprKind::If {
                branches,
                otherwise,
            } => {
                target.line(self.line);
                compile_branches(branches, otherwise.as_deref(), target)?;
            }

            ExprKind::Class(class) => {
                target.line(self.line);
                class.compile_definition(target)?;
            }

            ExprKind::Local(defines) => {
                target.line(self.line);
                for define in defines {
                    target.register_local(&define.name.text);
                    compile_initializer(define, target)?;
                    target.store(&define.name.text);
                }
            }

            ExprKind::Global(defines) => {
                target.line(self.line);
                for define in defines {
                    target.declare_global(&define.name.text);
                    if let Some(initializer) = &define.initializer {
                        initializer.compile(target, Usage::Value)?;
                        target.store(&define.name.text);
                    }
                }
            }

            ExprKind::Return(value) => {
                match value {
                    Some(value) => value.compile(target, Usage::Value)?,
                    None => target.push_null(),
                }
                target.line(self.line);
                target.return_value();
            }

            ExprKind::Break => {
                target.line(self.line);
                if !target.break_loop() {
                    return Err(CompileError::OutsideLoop {
                        statement: "break",
                        line: self.line,
                    });
                }
            }

            ExprKind::Continue => {
                target.line(self.line);
                if !target.continue_loop() {
                    return Err(CompileError::OutsideLoop {
                        statement: "continue",
                        line: self.line,
                    });
                }
            }

            _ => self.compile(target, Usage::Discard)?,
        }
        Ok(())
    }
}

fn compile_sequence(statements: &[Expression], target: &mut dyn CompileTarget) -> Result<()> {
    for statement in statements {
        target.line(statement.line);
        statement.compile(target, Usage::Discard)?;
    }
    Ok(())
}

fn compile_initializer(define: &VarDefine, target: &mut dyn CompileTarget) -> Result<()> {
    match &define.initializer {
        Some(initializer) => initializer.compile(target, Usage::Value),
        None => {
            target.push_null();
            Ok(())
        }
    }
}

/// Calls `member` on the value on top of the stack, passing it as the only
/// argument.
fn call_member(member: &str, target: &mut dyn CompileTarget) {
    target.duplicate();
    target.load_member(member);
    target.call(1);
}

fn compile_for_each(
    line: u32,
    variable: &Token,
    container: &Expression,
    body: &Expression,
    target: &mut dyn CompileTarget,
) -> Result<()> {
    target.line(line);
    let id = target.fresh_id();
    let start = format!("foreach_start_{}", id);
    let end = format!("foreach_end_{}", id);
    let iterator = format!("$iter_{}", id);

    target.enter_scope();
    target.register_local(&variable.text);
    target.register_local(&iterator);

    container.compile(target, Usage::Value)?;
    call_member(ITERATOR, target);
    target.store(&iterator);

    target.label(&start);
    target.load(&iterator);
    call_member(ADVANCE, target);
    target.jump_if_false(&end);

    target.load(&iterator);
    call_member(CURRENT, target);
    target.store(&variable.text);

    target.push_loop(LoopContext::new(&end, &start));
    body.compile(target, Usage::Discard)?;
    target.pop_loop();

    target.jump(&start);
    target.label(&end);
    target.exit_scope();
    Ok(())
}

/// Lowers an if / elseif / else chain.
///
/// Every branch but the last one falls through to a `next` label placed
/// before the following condition; taken branches jump to the shared end.
fn compile_branches(
    branches: &[Branch],
    otherwise: Option<&Expression>,
    target: &mut dyn CompileTarget,
) -> Result<()> {
    let id = target.fresh_id();
    let next = |k: usize| format!("if_{}_next{}", id, k);
    let end = format!("if_{}_end", id);

    let otherwise = otherwise.filter(|block| !block.is_empty_block());
    let count = branches.len();

    for (i, branch) in branches.iter().enumerate() {
        let last = i + 1 == count;
        if i > 0 {
            target.label(&next(i));
        }

        branch.condition.compile(target, Usage::Value)?;
        if last && otherwise.is_none() {
            target.jump_if_false(&end);
        } else {
            target.jump_if_false(&next(i + 1));
        }

        branch.block.compile(target, Usage::Discard)?;
        if !last || otherwise.is_some() {
            target.jump(&end);
        }
    }

    if let Some(block) = otherwise {
        target.label(&next(count));
        block.compile(target, Usage::Discard)?;
    }
    target.label(&end);
    Ok(())
}

impl ClassExpression {
    /// Builds the class value and stores it under the class name.
    ///
    /// Each field default becomes a zero-argument initializer unit; methods
    /// become method units. Both are pushed before `define_class` collects
    /// them.
    pub(super) fn compile_definition(&self, target: &mut dyn CompileTarget) -> Result<()> {
        let class = &self.name.text;
        let mut layout = ClassLayout {
            name: class.clone(),
            base: self.base.clone(),
            fields: Vec::with_capacity(self.fields.len()),
            methods: Vec::with_capacity(self.methods.len()),
        };

        for field in &self.fields {
            target.begin_function(FunctionSignature {
                name: format!("{}.{}", class, field.name.text),
                params: Vec::new(),
                varargs: None,
                is_method: false,
            });
            compile_initializer(field, target)?;
            target.return_value();
            target.end_function();
            layout.fields.push(field.name.text.clone());
        }

        for (name, method) in &self.methods {
            match &method.kind {
                ExprKind::Function(function) => {
                    target.line(method.line);
                    function.compile_unit(format!("{}.{}", class, name), true, target)?;
                }
                _ => method.compile(target, Usage::Value)?,
            }
            layout.methods.push(name.clone());
        }

        target.define_class(layout);
        target.store(class);
        Ok(())
    }
}
