//! Builtin functions.

use std::cmp::Ordering;

use pdp_core::{EvalError, EvalErrorKind, Type, Value};

use super::function::{
    EagerFn, FunctionRegistry, Implementation, LazyFn, Matcher, Overload, Params, PatternSyntax,
    Quantifier, Returns,
};
use super::Expression;
use crate::context::Context;

use Implementation::{Eager, Lazy, Pattern};

const NUMERIC: &[Type] = &[Type::Integer, Type::Float];
const STRING_COLLECTIONS: &[Type] = &[Type::SetOfStrings, Type::ListOfStrings];

const NUMERIC_PAIRS: [&[Type]; 4] = [
    &[Type::Integer, Type::Integer],
    &[Type::Integer, Type::Float],
    &[Type::Float, Type::Integer],
    &[Type::Float, Type::Float],
];

const CONTAINS: [&[Type]; 8] = [
    &[Type::String, Type::String],
    &[Type::Network, Type::Address],
    &[Type::Network, Type::Network],
    &[Type::SetOfStrings, Type::String],
    &[Type::ListOfStrings, Type::String],
    &[Type::SetOfNetworks, Type::Address],
    &[Type::SetOfNetworks, Type::Network],
    &[Type::SetOfDomains, Type::Domain],
];

/// Patterns first, subjects second; one side is a single String.
const PATTERN_COLLECTIONS: [&[Type]; 4] = [
    &[Type::SetOfStrings, Type::String],
    &[Type::ListOfStrings, Type::String],
    &[Type::String, Type::SetOfStrings],
    &[Type::String, Type::ListOfStrings],
];

pub(super) fn register_all(r: &mut FunctionRegistry) {
    for pair in NUMERIC_PAIRS {
        r.register("equal", Overload::exact(pair, Type::Boolean, Eager(equal)));
        r.register("greater", Overload::exact(pair, Type::Boolean, Eager(greater)));
        r.register("less", Overload::exact(pair, Type::Boolean, Eager(less)));
        r.register("add", arithmetic(pair, add));
        r.register("subtract", arithmetic(pair, subtract));
        r.register("multiply", arithmetic(pair, multiply));
        r.register("divide", arithmetic(pair, divide));
    }

    for ty in [
        Type::Boolean,
        Type::String,
        Type::Address,
        Type::Network,
        Type::Domain,
        Type::SetOfStrings,
        Type::ListOfStrings,
    ] {
        r.register("equal", Overload::exact(same_pair(ty), Type::Boolean, Eager(equal)));
    }
    for ty in [Type::String, Type::Address] {
        r.register("greater", Overload::exact(same_pair(ty), Type::Boolean, Eager(greater)));
        r.register("less", Overload::exact(same_pair(ty), Type::Boolean, Eager(less)));
    }

    r.register(
        "range",
        Overload {
            params: Params::Each {
                types: NUMERIC,
                min: 3,
                max: Some(3),
            },
            returns: Returns::Fixed(Type::String),
            imp: Eager(range),
        },
    );

    for args in CONTAINS {
        r.register("contains", Overload::exact(args, Type::Boolean, Eager(contains)));
    }

    r.register(
        "intersect",
        Overload::exact(
            &[Type::SetOfStrings, Type::SetOfStrings],
            Type::SetOfStrings,
            Eager(intersect),
        ),
    );
    r.register(
        "intersect",
        Overload::exact(
            &[Type::ListOfStrings, Type::ListOfStrings],
            Type::ListOfStrings,
            Eager(intersect),
        ),
    );

    for ty in [
        Type::SetOfStrings,
        Type::ListOfStrings,
        Type::SetOfNetworks,
        Type::SetOfDomains,
    ] {
        r.register("len", Overload::exact(single(ty), Type::Integer, Eager(len)));
    }

    r.register(
        "list of strings",
        Overload {
            params: Params::Each {
                types: STRING_COLLECTIONS,
                min: 1,
                max: Some(1),
            },
            returns: Returns::Fixed(Type::ListOfStrings),
            imp: Eager(concat),
        },
    );
    r.register(
        "concat",
        Overload {
            params: Params::Each {
                types: STRING_COLLECTIONS,
                min: 1,
                max: None,
            },
            returns: Returns::Fixed(Type::ListOfStrings),
            imp: Eager(concat),
        },
    );

    r.register("not", Overload::exact(&[Type::Boolean], Type::Boolean, Eager(not)));
    for (name, f) in [("and", and as LazyFn), ("or", or)] {
        r.register(
            name,
            Overload {
                params: Params::Each {
                    types: &[Type::Boolean],
                    min: 1,
                    max: None,
                },
                returns: Returns::Fixed(Type::Boolean),
                imp: Lazy(f),
            },
        );
    }

    r.register(
        "try",
        Overload {
            params: Params::Same { min: 1 },
            returns: Returns::FirstArg,
            imp: Lazy(first_ok),
        },
    );

    for (syntax, prefix) in [(PatternSyntax::Regex, "regex"), (PatternSyntax::Wildcard, "wildcard")] {
        let one = Matcher {
            syntax,
            quantifier: Quantifier::Any,
        };
        r.register(
            &format!("{prefix}-match"),
            Overload::exact(&[Type::String, Type::String], Type::Boolean, Pattern(one)),
        );

        for (quantifier, suffix) in [(Quantifier::Any, "any"), (Quantifier::All, "all")] {
            let m = Matcher { syntax, quantifier };
            for params in PATTERN_COLLECTIONS {
                r.register(
                    &format!("{prefix}-{suffix}-match"),
                    Overload::exact(params, Type::Boolean, Pattern(m)),
                );
            }
        }
    }
}

fn arithmetic(pair: &'static [Type], f: EagerFn) -> Overload {
    let result = if pair.iter().all(|t| *t == Type::Integer) {
        Type::Integer
    } else {
        Type::Float
    };
    Overload::exact(pair, result, Eager(f))
}

fn same_pair(ty: Type) -> &'static [Type] {
    match ty {
        Type::Boolean => &[Type::Boolean, Type::Boolean],
        Type::String => &[Type::String, Type::String],
        Type::Integer => &[Type::Integer, Type::Integer],
        Type::Float => &[Type::Float, Type::Float],
        Type::Address => &[Type::Address, Type::Address],
        Type::Network => &[Type::Network, Type::Network],
        Type::Domain => &[Type::Domain, Type::Domain],
        Type::SetOfStrings => &[Type::SetOfStrings, Type::SetOfStrings],
        Type::SetOfNetworks => &[Type::SetOfNetworks, Type::SetOfNetworks],
        Type::SetOfDomains => &[Type::SetOfDomains, Type::SetOfDomains],
        Type::ListOfStrings => &[Type::ListOfStrings, Type::ListOfStrings],
    }
}

fn single(ty: Type) -> &'static [Type] {
    match ty {
        Type::Boolean => &[Type::Boolean],
        Type::String => &[Type::String],
        Type::Integer => &[Type::Integer],
        Type::Float => &[Type::Float],
        Type::Address => &[Type::Address],
        Type::Network => &[Type::Network],
        Type::Domain => &[Type::Domain],
        Type::SetOfStrings => &[Type::SetOfStrings],
        Type::SetOfNetworks => &[Type::SetOfNetworks],
        Type::SetOfDomains => &[Type::SetOfDomains],
        Type::ListOfStrings => &[Type::ListOfStrings],
    }
}

fn arity(n: usize, args: &[Value]) -> EvalError {
    EvalErrorKind::External(format!("expected {n} arguments but got {}", args.len())).into()
}

fn two(args: &[Value]) -> Result<(&Value, &Value), EvalError> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(arity(2, args)),
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(v: &Value) -> Result<Num, EvalError> {
        match v {
            Value::Integer(i) => Ok(Num::Int(*i)),
            other => other.as_float().map(Num::Float),
        }
    }

    fn f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn compare_nums(a: Num, b: Num) -> Option<Ordering> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
        _ => a.f64().partial_cmp(&b.f64()),
    }
}

fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>, EvalError> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
        (Value::Address(x), Value::Address(y)) => Ok(Some(x.cmp(y))),
        _ => Ok(compare_nums(Num::of(a)?, Num::of(b)?)),
    }
}

fn equal(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = two(args)?;
    let eq = match (a, b) {
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            compare_nums(Num::of(a)?, Num::of(b)?) == Some(Ordering::Equal)
        }
        _ => a == b,
    };
    Ok(Value::Boolean(eq))
}

fn greater(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = two(args)?;
    Ok(Value::Boolean(compare(a, b)? == Some(Ordering::Greater)))
}

fn less(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = two(args)?;
    Ok(Value::Boolean(compare(a, b)? == Some(Ordering::Less)))
}

fn float_result(x: f64) -> Result<Value, EvalError> {
    if x.is_nan() {
        return Err(EvalErrorKind::FloatNotFinite("NaN").into());
    }
    if x.is_infinite() {
        return Err(EvalErrorKind::FloatNotFinite("Inf").into());
    }
    Ok(Value::Float(x))
}

fn int_result(x: Option<i64>) -> Result<Value, EvalError> {
    x.map(Value::Integer)
        .ok_or_else(|| EvalErrorKind::IntegerOverflow.into())
}

fn add(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = two(args)?;
    match (Num::of(a)?, Num::of(b)?) {
        (Num::Int(x), Num::Int(y)) => int_result(x.checked_add(y)),
        (x, y) => float_result(x.f64() + y.f64()),
    }
}

fn subtract(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = two(args)?;
    match (Num::of(a)?, Num::of(b)?) {
        (Num::Int(x), Num::Int(y)) => int_result(x.checked_sub(y)),
        (x, y) => float_result(x.f64() - y.f64()),
    }
}

fn multiply(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = two(args)?;
    match (Num::of(a)?, Num::of(b)?) {
        (Num::Int(x), Num::Int(y)) => int_result(x.checked_mul(y)),
        (x, y) => float_result(x.f64() * y.f64()),
    }
}

fn divide(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = two(args)?;
    match (Num::of(a)?, Num::of(b)?) {
        (Num::Int(_), Num::Int(0)) => Err(EvalErrorKind::IntegerDivideByZero.into()),
        (Num::Int(x), Num::Int(y)) => int_result(x.checked_div(y)),
        (x, y) => {
            let d = y.f64();
            if d == 0.0 {
                return Err(EvalErrorKind::FloatDivideByZero.into());
            }
            float_result(x.f64() / d)
        }
    }
}

/// `range(min, max, value)`: "Below", "Above" or "Within".
fn range(args: &[Value]) -> Result<Value, EvalError> {
    let [min, max, value] = args else {
        return Err(arity(3, args));
    };
    let (min, max, value) = (Num::of(min)?, Num::of(max)?, Num::of(value)?);

    let position = if compare_nums(value, min) == Some(Ordering::Less) {
        "Below"
    } else if compare_nums(value, max) == Some(Ordering::Greater) {
        "Above"
    } else {
        "Within"
    };
    Ok(Value::string(position))
}

fn contains(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = two(args)?;
    let found = match (a, b) {
        (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
        (Value::Network(n), Value::Address(addr)) => n.contains(addr),
        (Value::Network(n), Value::Network(m)) => n.covers(m),
        (Value::SetOfStrings(set), Value::String(s)) => set.contains(s),
        (Value::ListOfStrings(list), Value::String(s)) => list.contains(s),
        (Value::SetOfNetworks(set), Value::Address(addr)) => set.get_by_addr(addr).is_some(),
        (Value::SetOfNetworks(set), Value::Network(n)) => set.get_by_net(n).is_some(),
        (Value::SetOfDomains(set), Value::Domain(d)) => set.get(d).is_some(),
        _ => {
            return Err(EvalErrorKind::FunctionCast {
                name: "contains".into(),
                args: format!("{}, {}", a.value_type(), b.value_type()),
            }
            .into())
        }
    };
    Ok(Value::Boolean(found))
}

fn intersect(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = two(args)?;
    match (a, b) {
        (Value::SetOfStrings(x), Value::SetOfStrings(y)) => {
            Ok(Value::set_of_strings(x.intersection(y).cloned()))
        }
        _ => {
            let (x, y) = (a.as_list_of_strings()?, b.as_list_of_strings()?);
            Ok(Value::list_of_strings(
                x.iter().filter(|s| y.contains(*s)).cloned(),
            ))
        }
    }
}

fn len(args: &[Value]) -> Result<Value, EvalError> {
    let n = match args {
        [Value::SetOfStrings(s)] => s.len(),
        [Value::ListOfStrings(l)] => l.len(),
        [Value::SetOfNetworks(s)] => s.len(),
        [Value::SetOfDomains(s)] => s.len(),
        [other] => other.as_list_of_strings()?.len(),
        _ => return Err(arity(1, args)),
    };
    Ok(Value::Integer(n as i64))
}

/// Flattens string sets and lists into one list, keeping duplicates.
fn concat(args: &[Value]) -> Result<Value, EvalError> {
    let mut out: Vec<String> = Vec::new();
    for v in args {
        match v {
            Value::SetOfStrings(s) => out.extend(s.iter().cloned()),
            other => out.extend(other.as_list_of_strings()?.iter().cloned()),
        }
    }
    Ok(Value::list_of_strings(out))
}

fn not(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [v] => Ok(Value::Boolean(!v.as_bool()?)),
        _ => Err(arity(1, args)),
    }
}

fn and(args: &[Expression], ctx: &Context) -> Result<Value, EvalError> {
    for (i, a) in args.iter().enumerate() {
        let v = a
            .calculate(ctx)
            .and_then(|v| v.as_bool())
            .map_err(|e| e.bind(format!("argument #{i}")))?;
        if !v {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(Value::Boolean(true))
}

fn or(args: &[Expression], ctx: &Context) -> Result<Value, EvalError> {
    for (i, a) in args.iter().enumerate() {
        let v = a
            .calculate(ctx)
            .and_then(|v| v.as_bool())
            .map_err(|e| e.bind(format!("argument #{i}")))?;
        if v {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

/// Value of the first argument that evaluates without error.
fn first_ok(args: &[Expression], ctx: &Context) -> Result<Value, EvalError> {
    let mut errs = Vec::new();
    for (i, a) in args.iter().enumerate() {
        match a.calculate(ctx) {
            Ok(v) => return Ok(v),
            Err(e) => errs.push(e.bind(format!("argument #{i}"))),
        }
    }
    Err(EvalError::multi(errs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pdp_core::BuildErrorKind;

    use super::*;
    use crate::attribute::Attribute;
    use crate::expression::FunctionCall;

    /// Calls `name` with immediate `patterns` and a designator bound to `subject`.
    fn pattern_call(name: &str, patterns: &str, subject: Value) -> Result<bool, BuildErrorKind> {
        pattern_call_with(name, Value::string(patterns), subject)
    }

    fn pattern_call_with(
        name: &str,
        patterns: Value,
        subject: Value,
    ) -> Result<bool, BuildErrorKind> {
        let attr = Attribute::new("s", subject.value_type());
        let mut ctx = Context::default();
        ctx.insert("s", subject);
        let call = FunctionCall::new(
            &FunctionRegistry::builtin(),
            name,
            vec![patterns.into(), Expression::Designator(attr)],
        )
        .map_err(|e| e.kind().clone())?;
        Ok(call.calculate(&ctx).unwrap().as_bool().unwrap())
    }

    #[test]
    fn mixed_numeric_comparison() {
        let r = equal(&[Value::Integer(3), Value::Float(3.0)]).unwrap();
        assert_eq!(r, Value::Boolean(true));
        let r = greater(&[Value::Float(3.5), Value::Integer(3)]).unwrap();
        assert_eq!(r, Value::Boolean(true));
    }

    #[test]
    fn arithmetic_failures_are_typed() {
        let err = divide(&[Value::Integer(1), Value::Integer(0)]).unwrap_err();
        assert_eq!(err.kind(), &EvalErrorKind::IntegerDivideByZero);

        let err = divide(&[Value::Float(1.0), Value::Float(0.0)]).unwrap_err();
        assert_eq!(err.kind(), &EvalErrorKind::FloatDivideByZero);

        let err = multiply(&[Value::Float(1e308), Value::Float(10.0)]).unwrap_err();
        assert_eq!(err.to_string(), "#10: Float result has a value of Inf");

        let err = add(&[Value::Integer(i64::MAX), Value::Integer(1)]).unwrap_err();
        assert_eq!(err.kind(), &EvalErrorKind::IntegerOverflow);
    }

    #[test]
    fn range_positions() {
        let r = |v: Value| range(&[Value::Integer(1), Value::Integer(5), v]).unwrap();
        assert_eq!(r(Value::Integer(0)), Value::string("Below"));
        assert_eq!(r(Value::Integer(10)), Value::string("Above"));
        assert_eq!(r(Value::Float(3.3)), Value::string("Within"));
        assert_eq!(r(Value::Integer(5)), Value::string("Within"));
    }

    #[test]
    fn list_intersection_keeps_first_order() {
        let r = intersect(&[
            Value::list_of_strings(["foo", "bar", "baz"]),
            Value::list_of_strings(["baz", "foo"]),
        ])
        .unwrap();
        assert_eq!(r, Value::list_of_strings(["foo", "baz"]));
    }

    #[test]
    fn wildcard_match() {
        let m = |p: &str, s: &str| pattern_call("wildcard-match", p, Value::string(s)).unwrap();
        assert!(m("prefix-match-*", "prefix-match-17"));
        assert!(!m("prefix-match-*", "prefix-1-not-match-17"));
        assert!(m("*-infix-match-*", "a-infix-match-b"));
        assert!(m("*-postfix-match", "x-postfix-match"));
        assert!(!m("*-postfix-match", "x-postfix-match-"));
        assert!(m("a*b", "abb"));
        assert!(m("a?c", "abc"));
        assert!(!m("a?c", "ac"));
        assert!(m("a?c", "aжc"));
        assert!(m("\\*x", "*x"));
        assert!(!m("\\*x", "ax"));
        assert!(!m("a.b", "axb"));
        assert!(m("", ""));
        assert!(m("*", "line\nbreak"));

        assert_eq!(
            pattern_call("wildcard-match", "abc\\", Value::string("abc")).unwrap_err(),
            BuildErrorKind::InvalidWildcard("abc\\".into())
        );
    }

    #[test]
    fn pattern_collections() {
        let many = |name: &str, patterns: &Value, s: &str| {
            pattern_call_with(name, patterns.clone(), Value::string(s)).unwrap()
        };

        let domains = Value::set_of_strings(["*.com", "*.org"]);
        assert!(many("wildcard-any-match", &domains, "x.org"));
        assert!(!many("wildcard-all-match", &domains, "x.org"));

        let anchors = Value::list_of_strings(["^a", "b$"]);
        assert!(many("regex-all-match", &anchors, "ab"));
        assert!(!many("regex-all-match", &anchors, "ba"));

        let subjects = Value::list_of_strings(["ba", "ca"]);
        assert!(!pattern_call("regex-any-match", "^a", subjects.clone()).unwrap());
        assert!(pattern_call("regex-any-match", "a$", subjects.clone()).unwrap());
        assert!(pattern_call("wildcard-all-match", "?a", subjects).unwrap());

        let none = Value::set_of_strings(Vec::<String>::new());
        assert!(pattern_call("wildcard-all-match", "x", none.clone()).unwrap());
        assert!(!pattern_call("wildcard-any-match", "x", none).unwrap());
    }

    #[test]
    fn patterns_are_compiled_when_built() {
        assert!(matches!(
            pattern_call("regex-match", "(", Value::string("x")).unwrap_err(),
            BuildErrorKind::InvalidRegex { .. }
        ));

        let attr = Attribute::new("p", Type::String);
        let err = FunctionCall::new(
            &FunctionRegistry::builtin(),
            "wildcard-match",
            vec![Expression::Designator(attr.clone()), Expression::Designator(attr)],
        )
        .unwrap_err();
        assert_eq!(err.kind(), &BuildErrorKind::PatternNotImmediate("wildcard-match".into()));
    }
}
