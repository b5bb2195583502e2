use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{BlockStatement, Expression, Identifier, Node, Program, Statement};
use crate::builtins;
use crate::environment::{Env, Environment};
use crate::stack::ensure_sufficient_stack;
use crate::value::{Function, MapValue, Value};

/// Nested user-function calls allowed before evaluation gives up with an error.
pub const MAX_CALL_DEPTH: usize = 10_000;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Counts one active user-function call for as long as it lives.
struct CallDepthGuard {
    depth: usize,
}

impl CallDepthGuard {
    fn enter() -> Self {
        let depth = CALL_DEPTH.with(|d| {
            let depth = d.get() + 1;
            d.set(depth);
            depth
        });
        CallDepthGuard { depth }
    }
}

impl Drop for CallDepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

// --- Evaluate Function ---

/// Evaluates a node within the given environment.
///
/// Runtime failures are returned as `Value::Error`; the only host-level fault
/// is integer division by zero, which panics.
pub fn eval<'a>(node: impl Into<Node<'a>>, env: &Env) -> Value {
    match node.into() {
        Node::Program(program) => eval_program(program, env),
        Node::Statement(statement) => eval_statement(statement, env),
        Node::Block(block) => eval_block(block, env),
        Node::Expression(expression) => eval_expression(expression, env),
    }
}

fn eval_program(program: &Program, env: &Env) -> Value {
    let mut result = Value::Null;
    for statement in &program.statements {
        match eval_statement(statement, env) {
            Value::Return(value) => return *value,
            Value::Error(message) => {
                debug!(%message, "evaluation stopped");
                return Value::Error(message);
            }
            value => result = value,
        }
    }
    result
}

// Unlike a program, a block hands `Return` up unopened so enclosing blocks stop too.
fn eval_block(block: &BlockStatement, env: &Env) -> Value {
    let mut result = Value::Null;
    for statement in &block.statements {
        result = eval_statement(statement, env);
        if matches!(result, Value::Return(_) | Value::Error(_)) {
            return result;
        }
    }
    result
}

fn eval_statement(statement: &Statement, env: &Env) -> Value {
    match statement {
        Statement::Value { name, value, .. } => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            env.borrow_mut().define(name.name.clone(), value);
            Value::Null
        }
        Statement::Update { name, value, .. } => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            let updated = env.borrow_mut().update(&name.name, value);
            match updated {
                Ok(()) => Value::Null,
                Err(error) => Value::error(error.to_string()),
            }
        }
        Statement::Return { value, .. } => {
            let value = match value {
                Some(expression) => eval_expression(expression, env),
                None => Value::Null,
            };
            if value.is_error() {
                return value;
            }
            Value::Return(Box::new(value))
        }
        Statement::Expression { expression, .. } => eval_expression(expression, env),
    }
}

fn eval_expression(expression: &Expression, env: &Env) -> Value {
    ensure_sufficient_stack(|| eval_expression_inner(expression, env))
}

fn eval_expression_inner(expression: &Expression, env: &Env) -> Value {
    match expression {
        Expression::Identifier(identifier) => eval_identifier(identifier, env),
        Expression::Integer { value, .. } => Value::Integer(*value),
        Expression::Boolean { value, .. } => Value::Boolean(*value),
        Expression::Str { value, .. } => Value::string(value.as_str()),
        Expression::Array { elements, .. } => match eval_expressions(elements, env) {
            Ok(elements) => Value::array(elements),
            Err(error) => error,
        },
        Expression::Map { pairs, .. } => eval_map_literal(pairs, env),
        Expression::Prefix {
            operator, right, ..
        } => {
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_prefix(operator, right)
        }
        Expression::Infix {
            operator,
            left,
            right,
            ..
        } => {
            // Right operand first.
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            eval_infix(operator, left, right)
        }
        Expression::If {
            condition,
            consequence,
            alternative,
            ..
        } => {
            let condition = eval_expression(condition, env);
            if condition.is_error() {
                return condition;
            }
            if condition.is_truthy() {
                eval_block(consequence, env)
            } else if let Some(alternative) = alternative {
                eval_block(alternative, env)
            } else {
                Value::Null
            }
        }
        Expression::Function(literal) => {
            Value::Function(Rc::new(Function::new(Rc::clone(literal), Rc::clone(env))))
        }
        Expression::Call {
            function,
            arguments,
            ..
        } => {
            let callee = eval_expression(function, env);
            if callee.is_error() {
                return callee;
            }
            match eval_expressions(arguments, env) {
                Ok(arguments) => apply_function(callee, arguments),
                Err(error) => error,
            }
        }
        Expression::Index { left, index, .. } => {
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            let index = eval_expression(index, env);
            if index.is_error() {
                return index;
            }
            eval_index(left, index)
        }
    }
}

fn eval_identifier(identifier: &Identifier, env: &Env) -> Value {
    let bound = env.borrow().get(&identifier.name);
    if let Some(value) = bound {
        return value;
    }
    match builtins::lookup(&identifier.name) {
        Some(builtin) => Value::Builtin(builtin),
        None => Value::error(format!("identifier not found: {}", identifier.name)),
    }
}

/// Evaluates left to right, stopping at the first error.
fn eval_expressions(expressions: &[Expression], env: &Env) -> Result<Vec<Value>, Value> {
    expressions
        .iter()
        .map(|expression| {
            let value = eval_expression(expression, env);
            if value.is_error() { Err(value) } else { Ok(value) }
        })
        .collect()
}

fn eval_map_literal(pairs: &[(Expression, Expression)], env: &Env) -> Value {
    let mut map = MapValue::new();
    for (key_expression, value_expression) in pairs {
        let key = eval_expression(key_expression, env);
        if key.is_error() {
            return key;
        }
        let Some(hash_key) = key.map_key() else {
            return unusable_key(&key);
        };
        let value = eval_expression(value_expression, env);
        if value.is_error() {
            return value;
        }
        map.insert(hash_key, key, value);
    }
    Value::Map(Rc::new(map))
}

fn unusable_key(key: &Value) -> Value {
    Value::error(format!("unusable as map key: {}", key.type_name()))
}

fn eval_prefix(operator: &str, right: Value) -> Value {
    match (operator, &right) {
        ("!", _) => Value::Boolean(!right.is_truthy()),
        ("-", Value::Integer(n)) => Value::Integer(n.wrapping_neg()),
        _ => Value::error(format!("unknown operator: {}{}", operator, right.type_name())),
    }
}

fn eval_infix(operator: &str, left: Value, right: Value) -> Value {
    match (&left, &right) {
        (Value::Integer(l), Value::Integer(r)) => eval_integer_infix(operator, *l, *r),
        (Value::Str(l), Value::Str(r)) if operator == "+" => {
            let mut joined = String::with_capacity(l.len() + r.len());
            joined.push_str(l);
            joined.push_str(r);
            Value::string(joined)
        }
        (Value::Str(_), Value::Str(_)) => unknown_infix(operator, &left, &right),
        _ => match operator {
            "==" => Value::Boolean(left.is_identical(&right)),
            "!=" => Value::Boolean(!left.is_identical(&right)),
            _ if left.type_name() != right.type_name() => Value::error(format!(
                "type mismatch: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
            _ => eval_boolean_infix(operator, &left, &right),
        },
    }
}

fn eval_boolean_infix(operator: &str, left: &Value, right: &Value) -> Value {
    match (operator, left, right) {
        ("&&", Value::Boolean(l), Value::Boolean(r)) => Value::Boolean(*l && *r),
        ("||", Value::Boolean(l), Value::Boolean(r)) => Value::Boolean(*l || *r),
        _ => unknown_infix(operator, left, right),
    }
}

fn eval_integer_infix(operator: &str, l: i64, r: i64) -> Value {
    match operator {
        "+" => Value::Integer(l.wrapping_add(r)),
        "-" => Value::Integer(l.wrapping_sub(r)),
        "*" => Value::Integer(l.wrapping_mul(r)),
        // A zero divisor panics here; that fault is deliberately left to the host.
        "/" => Value::Integer(l.wrapping_div(r)),
        "<" => Value::Boolean(l < r),
        ">" => Value::Boolean(l > r),
        "<=" => Value::Boolean(l <= r),
        ">=" => Value::Boolean(l >= r),
        "==" => Value::Boolean(l == r),
        "!=" => Value::Boolean(l != r),
        _ => Value::error(format!("unknown operator: INTEGER {} INTEGER", operator)),
    }
}

fn unknown_infix(operator: &str, left: &Value, right: &Value) -> Value {
    Value::error(format!(
        "unknown operator: {} {} {}",
        left.type_name(),
        operator,
        right.type_name()
    ))
}

fn eval_index(left: Value, index: Value) -> Value {
    match (&left, &index) {
        (Value::Array(elements), Value::Integer(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Map(map), _) => match index.map_key() {
            Some(hash_key) => map.get(&hash_key).cloned().unwrap_or(Value::Null),
            None => unusable_key(&index),
        },
        _ => Value::error(format!(
            "index operator not supported: {}",
            left.type_name()
        )),
    }
}

fn apply_function(callee: Value, arguments: Vec<Value>) -> Value {
    match callee {
        Value::Function(function) => call_function(&function, arguments),
        Value::Builtin(builtin) => {
            trace!(name = builtin.name, args = arguments.len(), "calling builtin");
            (builtin.func)(arguments)
        }
        other => Value::error(format!("not a function: {}", other.type_name())),
    }
}

fn call_function(function: &Function, arguments: Vec<Value>) -> Value {
    let guard = CallDepthGuard::enter();
    if guard.depth > MAX_CALL_DEPTH {
        debug!(depth = guard.depth, "call depth limit reached");
        return Value::error("maximum call depth exceeded");
    }
    trace!(depth = guard.depth, args = arguments.len(), "applying function");

    let frame = Environment::new_enclosed(Rc::clone(&function.env));
    {
        let mut frame = frame.borrow_mut();
        let mut arguments = arguments.into_iter();
        // Missing arguments bind null; extras are dropped.
        for parameter in &function.literal.parameters {
            frame.define(
                parameter.name.clone(),
                arguments.next().unwrap_or(Value::Null),
            );
        }
    }

    match eval_block(&function.literal.body, &frame) {
        Value::Return(value) => *value,
        value => value,
    }
}
