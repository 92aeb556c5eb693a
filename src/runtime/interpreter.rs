//! Non-recursive execution core. Every syntax node "emits" the steps that
//! will evaluate it onto the step stack; the pump pops and executes steps one
//! at a time. Nothing here ever calls back into script evaluation on the host
//! call stack, which is what makes deep recursion and mid-run suspension
//! safe.

use crate::language::ast::{BinOp, NodeKind, SyntaxNode, UnOp};
use crate::runtime::async_action::queue_actions;
use crate::runtime::error::{CoralError, RuntimeError, RuntimeResult};
use crate::runtime::interop::NativeOutcome;
use crate::runtime::lvalue::{LValue, Slot};
use crate::runtime::state::State;
use crate::runtime::step::{Action, Step};
use crate::runtime::strings;
use crate::runtime::value::{slice_bounds, FunctionValue, ListValue, MapValue, Value};
use std::rc::Rc;

impl SyntaxNode {
    /// Schedules the steps that evaluate this node. Steps run in LIFO order,
    /// so whatever must execute first is emitted last.
    pub fn emit(self: &Rc<Self>, state: &mut State) {
        match &self.kind {
            NodeKind::Number(value) => {
                state.push_step(Step::with_node(Action::PushValue(Value::Int(*value)), self));
            }
            NodeKind::Str(text) => {
                state.push_step(Step::with_node(
                    Action::PushValue(Value::Str(text.clone())),
                    self,
                ));
            }
            NodeKind::Wrapper(value) => {
                state.push_step(Step::with_node(Action::PushValue(value.clone()), self));
            }
            NodeKind::Ident(name) => {
                state.push_step(Step::with_node(Action::LoadIdent(name.clone()), self));
            }
            NodeKind::Binary { op, left, right } => {
                state.push_step(Step::with_node(Action::Binary(*op), self));
                right.emit(state);
                left.emit(state);
            }
            NodeKind::Unary { op, operand } => {
                state.push_step(Step::with_node(Action::Unary(*op), self));
                operand.emit(state);
            }
            // The right-hand side evaluates before the target.
            NodeKind::Assign { target, value } => {
                state.push_step(Step::with_node(Action::Assign, self));
                target.emit(state);
                value.emit(state);
            }
            NodeKind::AugAssign { target, value } => {
                state.push_step(Step::with_node(Action::AugAssign, self));
                value.emit(state);
                target.emit(state);
            }
            NodeKind::Member { source, name } => {
                state.push_step(Step::with_node(Action::Member(name.clone()), self));
                source.emit(state);
            }
            NodeKind::Index { source, index } => {
                state.push_step(Step::with_node(Action::Index, self));
                source.emit(state);
                index.emit(state);
            }
            NodeKind::Slice { source, begin, end } => {
                state.push_step(Step::with_node(Action::Slice, self));
                source.emit(state);
                match begin {
                    Some(node) => node.emit(state),
                    None => state.push_step(Step::new(Action::PushValue(Value::Null))),
                }
                match end {
                    Some(node) => node.emit(state),
                    None => state.push_step(Step::new(Action::PushValue(Value::Null))),
                }
            }
            NodeKind::Array(elements) => {
                state.push_step(Step::with_node(Action::MakeList(elements.len()), self));
                for element in elements.iter().rev() {
                    element.emit(state);
                }
            }
            NodeKind::Dict(pairs) => {
                state.push_step(Step::with_node(Action::MakeMap(pairs.len()), self));
                for (key, value) in pairs.iter().rev() {
                    value.emit(state);
                    key.emit(state);
                }
            }
            NodeKind::Call { callee, args } => {
                state.push_step(Step::with_node(Action::Call { argc: args.len() }, self));
                for arg in args.iter().rev() {
                    arg.emit(state);
                }
                callee.emit(state);
            }
            NodeKind::FuncDef { .. } => {
                state.push_step(Step::with_node(Action::DefineFunc, self));
            }
            NodeKind::If { clauses } => {
                if let Some(clause) = clauses.first() {
                    state.push_step(Step::with_node(Action::IfDispatch { clause: 0 }, self));
                    if let Some(condition) = &clause.condition {
                        condition.emit(state);
                    }
                }
            }
            NodeKind::While { test, .. } => {
                state.push_step(Step::with_node(Action::LoopMarker, self));
                state.push_step(Step::with_node(Action::WhileTest, self));
                test.emit(state);
            }
            NodeKind::For { over, .. } => {
                state.push_step(Step::with_node(Action::ForSetup, self));
                over.emit(state);
            }
            NodeKind::Break => {
                state.push_step(Step::with_node(Action::Break, self));
            }
            NodeKind::Continue => {
                state.push_step(Step::with_node(Action::Continue, self));
            }
            NodeKind::Pass => {}
            NodeKind::Return(value) => {
                state.push_step(Step::with_node(Action::Return, self));
                match value {
                    Some(node) => node.emit(state),
                    None => state.push_step(Step::new(Action::PushValue(Value::Null))),
                }
            }
            NodeKind::Throw(value) => {
                state.push_step(Step::with_node(Action::Throw, self));
                match value {
                    Some(node) => node.emit(state),
                    None => state.push_step(Step::new(Action::PushValue(Value::Null))),
                }
            }
            NodeKind::Try { body, .. } => {
                let scope = state.current_scope();
                state.push_step(Step::with_node(Action::TryMarker, self).with_scope(scope));
                body.emit(state);
            }
            NodeKind::Statements(statements) => {
                for statement in statements.iter().rev() {
                    state.push_step(Step::new(Action::ClearResults));
                    statement.emit(state);
                    state.push_step(Step::new(Action::MarkResults));
                }
            }
        }
    }
}

/// Drives the machine until the step stack empties or a step suspends it.
/// Failed steps are routed through the script throw protocol; only an
/// unhandled throw escapes to the host.
pub fn pump(state: &mut State) -> RuntimeResult<()> {
    while let Some(step) = state.pop_step() {
        let node = step.node.clone();
        if let Err(err) = execute_step(state, step) {
            dispatch_throw(state, err, node.as_deref())?;
        }
        if state.take_exit() {
            break;
        }
    }
    Ok(())
}

pub fn execute_step(state: &mut State, step: Step) -> Result<(), CoralError> {
    match &step.action {
        Action::Nop
        | Action::LoopMarker
        | Action::CallMarker { .. }
        | Action::ScopeMarker => Ok(()),
        Action::MarkResults => {
            state.mark_results();
            Ok(())
        }
        Action::ClearResults => {
            state.clear_results();
            Ok(())
        }
        Action::PushValue(value) => {
            state.push_value(value.clone());
            Ok(())
        }
        Action::LoadIdent(name) => {
            let scope = state.current_scope();
            state.push_lvalue(LValue::Variable {
                scope,
                name: name.clone(),
            });
            Ok(())
        }
        Action::Binary(op) => {
            let right = state.pop_value()?;
            let left = state.pop_value()?;
            let result = binary_op(*op, &left, &right)?;
            state.push_value(result);
            Ok(())
        }
        Action::Unary(op) => {
            let operand = state.pop_value()?;
            let result = match op {
                UnOp::Neg => Value::Int(operand.coerce_int()?.wrapping_neg()),
                UnOp::Not => Value::Bool(!operand.truthy()),
            };
            state.push_value(result);
            Ok(())
        }
        Action::Assign => {
            let target = state.pop_slot()?;
            let value = state.pop_value()?;
            let Slot::LValue(target) = target else {
                return Err(CoralError::invop("Can't assign to this expression"));
            };
            target.write(state, value.clone())?;
            state.push_value(value);
            Ok(())
        }
        Action::AugAssign => {
            let value = state.pop_value()?;
            let target = state.pop_slot()?;
            let Slot::LValue(target) = target else {
                return Err(CoralError::invop("Can't assign to this expression"));
            };
            let current = target.read(state)?;
            let updated = binary_op(BinOp::Add, &current, &value)?;
            target.write(state, updated.clone())?;
            state.push_value(updated);
            Ok(())
        }
        Action::MakeList(count) => {
            let mut items = Vec::with_capacity(*count);
            for _ in 0..*count {
                items.push(state.pop_value()?);
            }
            items.reverse();
            state.push_value(Value::List(ListValue::from_vec(items)));
            Ok(())
        }
        Action::MakeMap(count) => {
            let mut pairs = Vec::with_capacity(*count);
            for _ in 0..*count {
                let value = state.pop_value()?;
                let key = state.pop_value()?;
                pairs.push((key, value));
            }
            pairs.reverse();
            state.push_value(Value::Map(MapValue::from_pairs(pairs)));
            Ok(())
        }
        Action::Member(name) => {
            let source = state.pop_value()?;
            match source {
                Value::Map(_) => {
                    state.push_lvalue(LValue::Member {
                        object: source,
                        name: name.clone(),
                    });
                    Ok(())
                }
                Value::Native(ref obj) => {
                    if !obj.has_member(name) {
                        return Err(CoralError::arg(format!(
                            "A {} value has no member '{}'",
                            obj.type_name(),
                            name
                        )));
                    }
                    state.push_lvalue(LValue::Member {
                        object: source,
                        name: name.clone(),
                    });
                    Ok(())
                }
                Value::Str(text) => {
                    let method = strings::member(&text, name)?;
                    state.push_value(method);
                    Ok(())
                }
                other => Err(CoralError::arg(format!(
                    "Can't access a {} value as an object",
                    other.type_name()
                ))),
            }
        }
        Action::Index => {
            let source = state.pop_value()?;
            let index = state.pop_value()?;
            match source {
                Value::List(_) | Value::Map(_) | Value::Native(_) => {
                    state.push_lvalue(LValue::Index {
                        object: source,
                        index,
                    });
                    Ok(())
                }
                Value::Str(text) => {
                    let value = strings::index(&text, index.coerce_int()?)?;
                    state.push_value(value);
                    Ok(())
                }
                other => Err(CoralError::arg(format!(
                    "Can't index a {} value",
                    other.type_name()
                ))),
            }
        }
        Action::Slice => {
            let source = state.pop_value()?;
            let begin = slice_bound(state.pop_value()?)?;
            let end = slice_bound(state.pop_value()?)?;
            match source {
                Value::List(items) => {
                    let snapshot = items.snapshot();
                    let (from, to) = slice_bounds(snapshot.len(), begin, end);
                    state.push_value(Value::List(ListValue::from_vec(
                        snapshot[from..to].to_vec(),
                    )));
                    Ok(())
                }
                Value::Str(text) => {
                    state.push_value(strings::slice(&text, begin, end));
                    Ok(())
                }
                other => Err(CoralError::arg(format!(
                    "Can't slice a {} value",
                    other.type_name()
                ))),
            }
        }
        Action::Call { argc } => {
            let mut args = Vec::with_capacity(*argc);
            for _ in 0..*argc {
                args.push(state.pop_value()?);
            }
            args.reverse();
            let callee = state.pop_value()?;
            let Value::Function(func) = callee else {
                return Err(CoralError::arg("Attempted call to non-function"));
            };
            invoke_function(state, &func, args, step.node.as_ref())
        }
        Action::DefineFunc => {
            let node = require_node(&step)?;
            let NodeKind::FuncDef { name, params, body } = &node.kind else {
                return Err(CoralError::invprog("Malformed function definition step"));
            };
            let captured = state.current_scope();
            let func = Value::Function(Rc::new(FunctionValue::Interpreted {
                name: name.clone(),
                params: params.clone(),
                body: Rc::clone(body),
                captured,
            }));
            state.scopes.set(captured, name, func)
        }
        Action::IfDispatch { clause } => {
            let node = require_node(&step)?;
            let NodeKind::If { clauses } = &node.kind else {
                return Err(CoralError::invprog("Malformed if step"));
            };
            let taken = state.pop_value()?.truthy();
            if taken {
                clauses[*clause].block.emit(state);
                return Ok(());
            }
            let next = clause + 1;
            match clauses.get(next) {
                Some(next_clause) => match &next_clause.condition {
                    Some(condition) => {
                        state.push_step(Step::with_node(
                            Action::IfDispatch { clause: next },
                            &node,
                        ));
                        condition.emit(state);
                    }
                    None => next_clause.block.emit(state),
                },
                None => {}
            }
            Ok(())
        }
        Action::WhileTest => {
            let node = require_node(&step)?;
            let NodeKind::While { body, .. } = &node.kind else {
                return Err(CoralError::invprog("Malformed while step"));
            };
            if state.pop_value()?.truthy() {
                state.push_step(Step::with_node(Action::WhileNext, &node));
                body.emit(state);
            }
            Ok(())
        }
        Action::WhileNext => {
            let node = require_node(&step)?;
            let NodeKind::While { test, .. } = &node.kind else {
                return Err(CoralError::invprog("Malformed while step"));
            };
            state.push_step(Step::with_node(Action::WhileTest, &node));
            test.emit(state);
            Ok(())
        }
        Action::ForSetup => {
            let node = require_node(&step)?;
            let NodeKind::For { var, .. } = &node.kind else {
                return Err(CoralError::invprog("Malformed for step"));
            };
            let iterable = state.pop_value()?;
            let items = match iterable {
                Value::List(items) => items.snapshot(),
                Value::Map(map) => map.keys(),
                other => {
                    return Err(CoralError::arg(format!(
                        "A {} value is not enumerable",
                        other.type_name()
                    )))
                }
            };
            let loop_scope = state
                .scopes
                .alloc_parameter(state.current_scope(), &[var.clone()]);
            state.push_step(Step::with_node(Action::LoopMarker, &node).with_scope(loop_scope));
            schedule_for_iteration(state, &node, Rc::new(items), 0);
            Ok(())
        }
        Action::ForNext { items, index } => {
            let node = require_node(&step)?;
            schedule_for_iteration(state, &node, Rc::clone(items), *index);
            Ok(())
        }
        Action::Break => {
            let (matched, deferred) = state.unwind(Step::is_loop_marker, false);
            if matched.is_none() {
                return Err(CoralError::invop("'break' outside of a loop"));
            }
            push_deferred(state, deferred);
            Ok(())
        }
        Action::Continue => {
            let (matched, deferred) = state.unwind(Step::is_iteration, true);
            if matched.is_none() {
                return Err(CoralError::invop("'continue' outside of a loop"));
            }
            push_deferred(state, deferred);
            Ok(())
        }
        Action::Return => {
            let value = state.pop_value()?;
            let (_, deferred) = state.unwind(Step::is_call_marker, false);
            state.push_step(Step::new(Action::PushValue(value)));
            push_deferred(state, deferred);
            Ok(())
        }
        Action::Throw => {
            let value = state.pop_value()?;
            Err(CoralError::raise(value))
        }
        Action::TryMarker => {
            let node = require_node(&step)?;
            if let NodeKind::Try {
                finally_block: Some(block),
                ..
            } = &node.kind
            {
                block.emit(state);
            }
            Ok(())
        }
        Action::EmitNode(node) => {
            if let Some(scope) = step.scope {
                state.push_step(Step::new(Action::ScopeMarker).with_scope(scope));
            }
            node.emit(state);
            Ok(())
        }
        Action::SetVariable { name, value } => {
            let scope = state.current_scope();
            state.scopes.set(scope, name, value.clone())
        }
        Action::Suspend => {
            state.request_exit();
            Ok(())
        }
        Action::Host(f) => f(state),
    }
}

/// Routes a failed or thrown step through the nearest `try` on the step
/// stack. With no handler anywhere, the throw becomes a fatal host error
/// carrying the reconstructed stack trace.
pub fn dispatch_throw(
    state: &mut State,
    mut err: CoralError,
    node: Option<&SyntaxNode>,
) -> RuntimeResult<()> {
    if err.trace.is_none() {
        err.trace = Some(state.stack_trace(node));
    }
    if !state.find_step(Step::is_try_marker) {
        return Err(RuntimeError::Uncaught(err));
    }
    let (matched, deferred) = state.unwind(Step::is_try_marker, false);
    // The nearest try marker is above any other try marker, so the unwind
    // cannot have skipped a finally block.
    debug_assert!(deferred.is_empty());
    let Some(marker) = matched else {
        return Err(RuntimeError::Uncaught(err));
    };
    let Some(node) = marker.node.as_ref() else {
        return Err(RuntimeError::Uncaught(err));
    };
    let NodeKind::Try {
        except_var,
        except_block,
        finally_block,
        ..
    } = &node.kind
    else {
        return Err(RuntimeError::Uncaught(err));
    };

    let try_scope = marker.scope.unwrap_or(state.root_scope);
    if let Some(block) = finally_block {
        state.push_step(Step::new(Action::EmitNode(Rc::clone(block))).with_scope(try_scope));
    }
    match except_var {
        Some(var) => {
            let catch_scope = state.scopes.alloc_parameter(try_scope, &[var.clone()]);
            state.scopes.set_local(catch_scope, var, err.value.clone());
            state.push_step(Step::new(Action::ScopeMarker).with_scope(catch_scope));
        }
        None => {
            state.push_step(Step::new(Action::ScopeMarker).with_scope(try_scope));
        }
    }
    except_block.emit(state);
    Ok(())
}

/// Calls a function value. Interpreted functions get a fresh call scope and a
/// pre-seeded null result below their body; native functions run on the spot.
pub fn invoke_function(
    state: &mut State,
    func: &Rc<FunctionValue>,
    args: Vec<Value>,
    node: Option<&Rc<SyntaxNode>>,
) -> Result<(), CoralError> {
    match &**func {
        FunctionValue::Native { f, .. } => {
            let f = Rc::clone(f);
            match f(state, args)? {
                NativeOutcome::Value(value) => state.push_value(value),
                NativeOutcome::Actions(actions) => queue_actions(state, actions),
            }
            Ok(())
        }
        FunctionValue::Interpreted {
            name,
            params,
            body,
            captured,
        } => {
            let mut names: Vec<String> = params.clone();
            names.push("arguments".to_string());
            let call_scope = state.scopes.alloc_parameter(*captured, &names);
            for (idx, param) in params.iter().enumerate() {
                let value = args.get(idx).cloned().unwrap_or(Value::Null);
                state.scopes.set_local(call_scope, param, value);
            }
            let extras: Vec<Value> = args.iter().skip(params.len()).cloned().collect();
            state
                .scopes
                .set_local(call_scope, "arguments", Value::list_from(extras));

            let mut marker = Step::new(Action::CallMarker {
                function: name.clone(),
            })
            .with_scope(call_scope);
            if let Some(node) = node {
                marker.node = Some(Rc::clone(node));
            }
            state.push_step(marker);
            state.push_step(Step::new(Action::PushValue(Value::Null)));
            body.emit(state);
            Ok(())
        }
    }
}

fn schedule_for_iteration(
    state: &mut State,
    node: &Rc<SyntaxNode>,
    items: Rc<Vec<Value>>,
    index: usize,
) {
    let NodeKind::For { var, body, .. } = &node.kind else {
        return;
    };
    let Some(item) = items.get(index).cloned() else {
        return;
    };
    state.push_step(Step::with_node(
        Action::ForNext {
            items: Rc::clone(&items),
            index: index + 1,
        },
        node,
    ));
    body.emit(state);
    state.push_step(Step::new(Action::SetVariable {
        name: var.clone(),
        value: item,
    }));
}

/// Deferred `finally` blocks arrive innermost first; pushing them outermost
/// first leaves the innermost on top, so it runs before the others and before
/// whatever the unwind scheduled beneath.
fn push_deferred(state: &mut State, deferred: Vec<crate::runtime::state::DeferredBlock>) {
    for entry in deferred.into_iter().rev() {
        state.push_step(Step::new(Action::EmitNode(entry.block)).with_scope(entry.scope));
    }
}

fn require_node(step: &Step) -> Result<Rc<SyntaxNode>, CoralError> {
    step.node
        .as_ref()
        .map(Rc::clone)
        .ok_or_else(|| CoralError::invprog("Step is missing its source node"))
}

fn slice_bound(value: Value) -> Result<Option<i64>, CoralError> {
    match value {
        Value::Null => Ok(None),
        other => Ok(Some(other.coerce_int()?)),
    }
}

fn binary_op(op: BinOp, left: &Value, right: &Value) -> Result<Value, CoralError> {
    match op {
        BinOp::Add => add(left, right),
        BinOp::Sub => Ok(Value::Int(left.coerce_int()?.wrapping_sub(right.coerce_int()?))),
        BinOp::Mul => Ok(Value::Int(left.coerce_int()?.wrapping_mul(right.coerce_int()?))),
        BinOp::Div => {
            let divisor = right.coerce_int()?;
            if divisor == 0 {
                return Err(CoralError::invop("Division by zero"));
            }
            Ok(Value::Int(left.coerce_int()?.wrapping_div(divisor)))
        }
        BinOp::Lt => Ok(Value::Bool(left.coerce_int()? < right.coerce_int()?)),
        BinOp::Gt => Ok(Value::Bool(left.coerce_int()? > right.coerce_int()?)),
        BinOp::Le => Ok(Value::Bool(left.coerce_int()? <= right.coerce_int()?)),
        BinOp::Ge => Ok(Value::Bool(left.coerce_int()? >= right.coerce_int()?)),
        BinOp::Eq => Ok(Value::Bool(left.script_eq(right)?)),
        BinOp::Ne => Ok(Value::Bool(!left.script_eq(right)?)),
        // Both operands are already evaluated; `&&`/`||` do not short-circuit.
        BinOp::And => Ok(Value::Bool(left.truthy() && right.truthy())),
        BinOp::Or => Ok(Value::Bool(left.truthy() || right.truthy())),
    }
}

/// `+` concatenates when either side is a string; booleans are rejected
/// rather than silently treated as numbers.
fn add(left: &Value, right: &Value) -> Result<Value, CoralError> {
    match (left, right) {
        (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!(
            "{}{}",
            left.coerce_string(),
            right.coerce_string()
        ))),
        (Value::Bool(_), _) | (_, Value::Bool(_)) => {
            Err(CoralError::arg("Can't add boolean values"))
        }
        _ => Ok(Value::Int(left.coerce_int()?.wrapping_add(right.coerce_int()?))),
    }
}
