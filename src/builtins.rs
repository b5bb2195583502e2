use tracing::trace;

use crate::value::{Builtin, Value};

/// Native functions, consulted after the environment chain misses.
pub static BUILTINS: &[Builtin] = &[
    Builtin { name: "len", func: builtin_len },
    Builtin { name: "first", func: builtin_first },
    Builtin { name: "last", func: builtin_last },
    Builtin { name: "rest", func: builtin_rest },
    Builtin { name: "append", func: builtin_append },
    Builtin { name: "typeof", func: builtin_typeof },
    Builtin { name: "string", func: builtin_string },
    Builtin { name: "bool", func: builtin_bool },
    Builtin { name: "int", func: builtin_int },
    Builtin { name: "print", func: builtin_print },
];

pub fn lookup(name: &str) -> Option<Builtin> {
    let found = BUILTINS.iter().find(|builtin| builtin.name == name).copied();
    if found.is_some() {
        trace!(name, "resolved builtin");
    }
    found
}

pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|builtin| builtin.name)
}

// Returns the arity error from the enclosing builtin.
macro_rules! check_arity {
    ($args:expr, $expected:expr) => {
        if $args.len() != $expected {
            return Value::error(format!(
                "wrong number of arguments. got={}, want={}",
                $args.len(),
                $expected
            ));
        }
    };
}

fn unsupported(name: &str, arg: &Value) -> Value {
    Value::error(format!(
        "argument to `{}` not supported, got {}",
        name,
        arg.type_name()
    ))
}

fn expect_array<'a>(name: &str, arg: &'a Value) -> Result<&'a [Value], Value> {
    match arg {
        Value::Array(elements) => Ok(elements.as_slice()),
        other => Err(Value::error(format!(
            "argument to `{}` must be ARRAY, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn builtin_len(args: Vec<Value>) -> Value {
    check_arity!(args, 1);
    match &args[0] {
        Value::Str(s) => Value::Integer(s.len() as i64),
        Value::Array(elements) => Value::Integer(elements.len() as i64),
        Value::Map(map) => Value::Integer(map.len() as i64),
        other => unsupported("len", other),
    }
}

fn builtin_first(args: Vec<Value>) -> Value {
    check_arity!(args, 1);
    match expect_array("first", &args[0]) {
        Ok(elements) => elements.first().cloned().unwrap_or(Value::Null),
        Err(error) => error,
    }
}

fn builtin_last(args: Vec<Value>) -> Value {
    check_arity!(args, 1);
    match expect_array("last", &args[0]) {
        Ok(elements) => elements.last().cloned().unwrap_or(Value::Null),
        Err(error) => error,
    }
}

fn builtin_rest(args: Vec<Value>) -> Value {
    check_arity!(args, 1);
    match expect_array("rest", &args[0]) {
        Ok([]) => Value::Null,
        Ok([_, tail @ ..]) => Value::array(tail.to_vec()),
        Err(error) => error,
    }
}

fn builtin_append(args: Vec<Value>) -> Value {
    check_arity!(args, 2);
    match expect_array("append", &args[0]) {
        Ok(elements) => {
            let mut appended = Vec::with_capacity(elements.len() + 1);
            appended.extend_from_slice(elements);
            appended.push(args[1].clone());
            Value::array(appended)
        }
        Err(error) => error,
    }
}

fn builtin_typeof(args: Vec<Value>) -> Value {
    check_arity!(args, 1);
    Value::string(args[0].type_name())
}

fn builtin_string(args: Vec<Value>) -> Value {
    check_arity!(args, 1);
    match &args[0] {
        Value::Str(_) => args[0].clone(),
        Value::Integer(_) | Value::Boolean(_) => Value::string(args[0].to_string()),
        other => unsupported("string", other),
    }
}

fn builtin_bool(args: Vec<Value>) -> Value {
    check_arity!(args, 1);
    match &args[0] {
        Value::Boolean(b) => Value::Boolean(*b),
        Value::Integer(n) => Value::Boolean(*n != 0),
        Value::Str(s) => match s.as_ref() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => Value::error(format!("could not parse {:?} as boolean", s)),
        },
        other => unsupported("bool", other),
    }
}

fn builtin_int(args: Vec<Value>) -> Value {
    check_arity!(args, 1);
    match &args[0] {
        Value::Integer(n) => Value::Integer(*n),
        Value::Boolean(b) => Value::Integer(i64::from(*b)),
        Value::Str(s) => match s.trim().parse::<i64>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::error(format!("could not parse {:?} as integer", s)),
        },
        other => unsupported("int", other),
    }
}

fn builtin_print(args: Vec<Value>) -> Value {
    for arg in &args {
        println!("{}", arg);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Value {
        match lookup(name) {
            Some(builtin) => (builtin.func)(args),
            None => panic!("no builtin named {}", name),
        }
    }

    fn ints(values: &[i64]) -> Value {
        Value::array(values.iter().copied().map(Value::Integer).collect())
    }

    fn assert_error(result: Value, expected: &str) {
        match result {
            Value::Error(message) => assert_eq!(message, expected),
            other => panic!("Expected error '{}', got {:?}", expected, other),
        }
    }

    #[test]
    fn test_lookup() {
        assert!(lookup("len").is_some());
        assert!(lookup("puts").is_none());
        assert_eq!(names().count(), BUILTINS.len());
    }

    #[test]
    fn test_len() {
        assert_eq!(call("len", vec![Value::string("")]), Value::Integer(0));
        assert_eq!(call("len", vec![Value::string("four")]), Value::Integer(4));
        assert_eq!(call("len", vec![Value::string("héllo")]), Value::Integer(6));
        assert_eq!(call("len", vec![ints(&[1, 2, 3])]), Value::Integer(3));
        assert_error(
            call("len", vec![Value::Integer(1)]),
            "argument to `len` not supported, got INTEGER",
        );
        assert_error(
            call("len", vec![Value::string("one"), Value::string("two")]),
            "wrong number of arguments. got=2, want=1",
        );
    }

    #[test]
    fn test_array_accessors() {
        assert_eq!(call("first", vec![ints(&[1, 2, 3])]), Value::Integer(1));
        assert_eq!(call("last", vec![ints(&[1, 2, 3])]), Value::Integer(3));
        assert_eq!(call("rest", vec![ints(&[1, 2, 3])]), ints(&[2, 3]));
        assert_eq!(call("rest", vec![ints(&[1])]), ints(&[]));
        for name in ["first", "last", "rest"] {
            assert_eq!(call(name, vec![ints(&[])]), Value::Null, "{}", name);
        }
        assert_error(
            call("first", vec![Value::Integer(1)]),
            "argument to `first` must be ARRAY, got INTEGER",
        );
    }

    #[test]
    fn test_append_leaves_input_untouched() {
        let original = ints(&[1, 2]);
        let appended = call("append", vec![original.clone(), Value::Integer(3)]);
        assert_eq!(appended, ints(&[1, 2, 3]));
        assert_eq!(original, ints(&[1, 2]));
        assert_error(
            call("append", vec![ints(&[])]),
            "wrong number of arguments. got=1, want=2",
        );
    }

    #[test]
    fn test_typeof() {
        assert_eq!(call("typeof", vec![Value::Null]), Value::string("NULL"));
        assert_eq!(call("typeof", vec![ints(&[])]), Value::string("ARRAY"));
    }

    #[test]
    fn test_coercions() {
        assert_eq!(call("string", vec![Value::Integer(42)]), Value::string("42"));
        assert_eq!(call("string", vec![Value::Boolean(false)]), Value::string("false"));
        assert_eq!(call("bool", vec![Value::Integer(0)]), Value::Boolean(false));
        assert_eq!(call("bool", vec![Value::Integer(-3)]), Value::Boolean(true));
        assert_eq!(call("bool", vec![Value::string("true")]), Value::Boolean(true));
        assert_eq!(call("int", vec![Value::Boolean(true)]), Value::Integer(1));
        assert_eq!(call("int", vec![Value::string("-17")]), Value::Integer(-17));

        assert_error(
            call("bool", vec![Value::string("yes")]),
            "could not parse \"yes\" as boolean",
        );
        assert_error(
            call("int", vec![Value::string("abc")]),
            "could not parse \"abc\" as integer",
        );
        assert_error(
            call("string", vec![Value::Null]),
            "argument to `string` not supported, got NULL",
        );
    }

    #[test]
    fn test_print_returns_null() {
        assert_eq!(call("print", vec![]), Value::Null);
        assert_eq!(call("print", vec![Value::Integer(1), Value::Null]), Value::Null);
    }
}
