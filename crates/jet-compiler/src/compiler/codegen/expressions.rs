//! Value forms, the assignment family and function units.

use crate::ast::{BinaryOperator, ExprKind, Expression, FunctionExpression};
use crate::compiler::bytecode::Constant;
use crate::compiler::target::{CompileTarget, FunctionSignature, Usage};
use crate::error::Result;

use super::ANONYMOUS;

impl Expression {
    /// Emits code that leaves exactly one value on the stack.
    pub(super) fn compile_value(&self, target: &mut dyn CompileTarget) -> Result<()> {
        match &self.kind {
            ExprKind::Integer(value) => target.push_constant(Constant::Integer(*value)),
            ExprKind::Real(value) => target.push_constant(Constant::Real(*value)),
            ExprKind::String(value) => target.push_constant(Constant::String(value.clone())),
            ExprKind::Null => target.push_null(),
            ExprKind::Name(name) => target.load(&name.name),

            ExprKind::Array(items) => {
                for item in items {
                    item.compile(target, Usage::Value)?;
                }
                target.new_array(items.len());
            }

            ExprKind::Object(entries) => {
                for entry in entries {
                    target.push_constant(Constant::String(entry.key.clone()));
                    entry.value.compile(target, Usage::Value)?;
                }
                target.new_object(entries.len());
            }

            ExprKind::Index(index) => {
                index.base.compile(target, Usage::Value)?;
                index.index.compile(target, Usage::Value)?;
                target.load_index();
            }

            ExprKind::Unary { operator, operand } => {
                operand.compile(target, Usage::Value)?;
                target.unary(*operator);
            }

            ExprKind::Binary {
                operator,
                left,
                right,
            } if operator.is_logical() => compile_logical(*operator, left, right, target)?,

            ExprKind::Binary {
                operator,
                left,
                right,
            } => {
                left.compile(target, Usage::Value)?;
                right.compile(target, Usage::Value)?;
                target.binary(*operator);
            }

            // Arguments left to right, then the callee
            ExprKind::Call { callee, arguments } => {
                for argument in arguments {
                    argument.compile(target, Usage::Value)?;
                }
                callee.compile(target, Usage::Value)?;
                target.line(self.line);
                target.call(arguments.len());
            }

            ExprKind::Yield(value) => {
                match value {
                    Some(value) => value.compile(target, Usage::Value)?,
                    None => target.push_null(),
                }
                target.line(self.line);
                target.yield_value();
            }

            ExprKind::Resume(coroutine) => {
                coroutine.compile(target, Usage::Value)?;
                target.line(self.line);
                target.resume();
            }

            _ => self.compile(target, Usage::Value)?,
        }
        Ok(())
    }

    /// Emits an assignment form, keeping the stored value only under
    /// [`Usage::Value`].
    pub(super) fn compile_assignment(
        &self,
        target: &mut dyn CompileTarget,
        usage: Usage,
    ) -> Result<()> {
        let keep = usage == Usage::Value;
        match &self.kind {
            ExprKind::Assign {
                target: place,
                value,
            } => {
                let store = place.storable()?;
                value.compile(target, Usage::Value)?;
                if keep {
                    target.duplicate();
                }
                store.compile_store(target)?;
            }

            ExprKind::CompoundAssign {
                operator,
                target: place,
                value,
            } => {
                let place = place.storable()?.bind(target)?;
                place.load(target);
                value.compile(target, Usage::Value)?;
                target.binary(*operator);
                if keep {
                    target.duplicate();
                }
                place.store(target);
                place.release(target);
            }

            // Both values are loaded before either store runs.
            ExprKind::Swap { left, right } => {
                let (left, right) = (left.storable()?, right.storable()?);
                let first = left.bind(target)?;
                let second = right.bind(target)?;
                first.load(target);
                second.load(target);
                first.store(target);
                second.store(target);
                second.release(target);
                first.release(target);
                if keep {
                    target.push_null();
                }
            }

            ExprKind::Prefix { operator, operand } => {
                let place = operand.storable()?.bind(target)?;
                place.load(target);
                target.push_constant(Constant::Integer(1));
                target.binary(operator.arithmetic());
                if keep {
                    target.duplicate();
                }
                place.store(target);
                place.release(target);
            }

            ExprKind::Postfix { operator, operand } => {
                let place = operand.storable()?.bind(target)?;
                place.load(target);
                if keep {
                    target.duplicate();
                }
                target.push_constant(Constant::Integer(1));
                target.binary(operator.arithmetic());
                place.store(target);
                place.release(target);
            }

            _ => self.compile(target, usage)?,
        }
        Ok(())
    }
}

fn compile_logical(
    operator: BinaryOperator,
    left: &Expression,
    right: &Expression,
    target: &mut dyn CompileTarget,
) -> Result<()> {
    let id = target.fresh_id();
    left.compile(target, Usage::Value)?;
    target.duplicate();

    if operator == BinaryOperator::And {
        let end = format!("and_end_{}", id);
        target.jump_if_false(&end);
        target.pop();
        right.compile(target, Usage::Value)?;
        target.label(&end);
    } else {
        let rhs = format!("or_rhs_{}", id);
        let end = format!("or_end_{}", id);
        target.jump_if_false(&rhs);
        target.jump(&end);
        target.label(&rhs);
        target.pop();
        right.compile(target, Usage::Value)?;
        target.label(&end);
    }
    Ok(())
}

impl FunctionExpression {
    /// Emits the closure and, for named functions, stores it under the name.
    pub(super) fn compile_definition(
        &self,
        target: &mut dyn CompileTarget,
        usage: Usage,
    ) -> Result<()> {
        let store = self.name.as_deref().map(Expression::storable).transpose()?;
        let unit_name = match self.name.as_deref().map(|name| &name.kind) {
            Some(ExprKind::Name(name)) => name.name.clone(),
            _ => ANONYMOUS.to_string(),
        };

        self.compile_unit(unit_name, self.is_method, target)?;

        match store {
            Some(store) => {
                if usage == Usage::Value {
                    target.duplicate();
                }
                store.compile_store(target)?;
            }
            None if usage == Usage::Discard => target.pop(),
            None => {}
        }
        Ok(())
    }

    /// Compiles the body as its own unit and pushes a closure over it.
    pub(super) fn compile_unit(
        &self,
        name: String,
        is_method: bool,
        target: &mut dyn CompileTarget,
    ) -> Result<()> {
        target.begin_function(FunctionSignature {
            name,
            params: self.params.iter().map(|param| param.text.clone()).collect(),
            varargs: self.varargs.as_ref().map(|rest| rest.text.clone()),
            is_method,
        });
        self.body.compile(target, Usage::Discard)?;
        target.push_null();
        target.return_value();
        target.end_function();
        Ok(())
    }
}
