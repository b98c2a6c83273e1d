use crate::arena::Arena;
use crate::error::{LispError, LispResult};
use crate::printer::print_val;
use crate::reader::Reader;
use crate::stream::{InputStream, OutputStream};
use crate::symbol::is_numeral;
use crate::value::Value;

/// The fixed primitive set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Cons,
    Car,
    Cdr,
    IsPair,
    IsEq,
    Read,
    Write,
    Add,
    Sub,
    Mul,
    Quotient,
    Remainder,
    Less,
    NumEq,
}

impl Primitive {
    pub const ALL: [Primitive; 14] = [
        Primitive::Cons,
        Primitive::Car,
        Primitive::Cdr,
        Primitive::IsPair,
        Primitive::IsEq,
        Primitive::Read,
        Primitive::Write,
        Primitive::Add,
        Primitive::Sub,
        Primitive::Mul,
        Primitive::Quotient,
        Primitive::Remainder,
        Primitive::Less,
        Primitive::NumEq,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Cons => "cons",
            Primitive::Car => "car",
            Primitive::Cdr => "cdr",
            Primitive::IsPair => "pair?",
            Primitive::IsEq => "eq?",
            Primitive::Read => "read",
            Primitive::Write => "write",
            Primitive::Add => "+",
            Primitive::Sub => "-",
            Primitive::Mul => "*",
            Primitive::Quotient => "quotient",
            Primitive::Remainder => "remainder",
            Primitive::Less => "<",
            Primitive::NumEq => "=",
        }
    }

    pub fn from_name(name: &[u8]) -> Option<Primitive> {
        Primitive::ALL
            .iter()
            .copied()
            .find(|p| p.name().as_bytes() == name)
    }
}

/// Everything a primitive may touch besides its arguments.
pub struct PrimContext<'a> {
    pub arena: &'a mut Arena,
    pub input: &'a mut InputStream,
    pub output: &'a mut OutputStream,
    pub max_token_len: usize,
}

/// Apply a primitive to already-evaluated arguments.
/// Missing arguments are nil; surplus ones are ignored.
pub fn call_primitive(prim: Primitive, args: &[Value], cx: PrimContext<'_>) -> LispResult<Value> {
    let a = args.first().copied().unwrap_or(Value::Nil);
    let b = args.get(1).copied().unwrap_or(Value::Nil);

    match prim {
        Primitive::Cons => cx.arena.cons(a, b),
        Primitive::Car | Primitive::Cdr if matches!(a, Value::Atom(_) | Value::Truth) => {
            Err(LispError::TypeMismatch(format!(
                "{} of non-pair {}",
                prim.name(),
                describe(a, cx.arena)
            )))
        }
        Primitive::Car => cx.arena.car_val(a),
        Primitive::Cdr => cx.arena.cdr_val(a),
        Primitive::IsPair => Ok(Value::from_bool(a.is_pair())),
        Primitive::IsEq => prim_eq(a, b, cx.arena).map(Value::from_bool),
        Primitive::Read => {
            let mut reader = Reader::new(cx.input, cx.max_token_len);
            Ok(reader.read(cx.arena)?.unwrap_or(Value::Nil))
        }
        Primitive::Write => {
            let text = print_val(a, cx.arena)?;
            cx.output.write_str(&text)?;
            Ok(Value::Nil)
        }
        Primitive::Add => arithmetic(a, b, i64::checked_add, cx.arena),
        Primitive::Sub => arithmetic(a, b, i64::checked_sub, cx.arena),
        Primitive::Mul => arithmetic(a, b, i64::checked_mul, cx.arena),
        Primitive::Quotient => division(a, b, i64::checked_div, cx.arena),
        Primitive::Remainder => division(a, b, i64::checked_rem, cx.arena),
        Primitive::Less => comparison(a, b, |x, y| x < y, cx.arena),
        Primitive::NumEq => comparison(a, b, |x, y| x == y, cx.arena),
    }
}

type CheckedOp = fn(i64, i64) -> Option<i64>;

fn arithmetic(a: Value, b: Value, op: CheckedOp, arena: &mut Arena) -> LispResult<Value> {
    let (x, y) = operands(a, b, arena)?;
    number(op(x, y), arena)
}

/// `quotient` and `remainder` truncate toward zero.
fn division(a: Value, b: Value, op: CheckedOp, arena: &mut Arena) -> LispResult<Value> {
    let (x, y) = operands(a, b, arena)?;
    if y == 0 {
        return Err(LispError::DivisionByZero);
    }
    number(op(x, y), arena)
}

fn comparison(a: Value, b: Value, op: fn(i64, i64) -> bool, arena: &Arena) -> LispResult<Value> {
    let (x, y) = operands(a, b, arena)?;
    Ok(Value::from_bool(op(x, y)))
}

fn operands(a: Value, b: Value, arena: &Arena) -> LispResult<(i64, i64)> {
    Ok((to_int(a, arena)?, to_int(b, arena)?))
}

/// Encode a checked result as a new atom; None means it overflowed.
fn number(n: Option<i64>, arena: &mut Arena) -> LispResult<Value> {
    let n = n.ok_or(LispError::ArithmeticOverflow)?;
    arena.atom(&n.to_string())
}

/// `eq?`: nil matches nil, atoms match by text, truth matches truth.
/// Pairs never match, not even themselves.
fn prim_eq(a: Value, b: Value, arena: &Arena) -> LispResult<bool> {
    match (a, b) {
        (Value::Nil, Value::Nil) | (Value::Truth, Value::Truth) => Ok(true),
        (Value::Atom(x), Value::Atom(y)) => arena.atom_eq(x, y),
        _ => Ok(false),
    }
}

/// Parse an atom as a base-10 integer.
fn to_int(val: Value, arena: &Arena) -> LispResult<i64> {
    let h = match val {
        Value::Atom(h) => h,
        other => return Err(LispError::MalformedNumeral(describe(other, arena))),
    };
    let bytes = arena.atom_bytes(h)?;
    let text = String::from_utf8_lossy(&bytes);
    if !is_numeral(&bytes) {
        return Err(LispError::MalformedNumeral(text.into_owned()));
    }
    text.parse().map_err(|_| LispError::ArithmeticOverflow)
}

/// Printed form of a value for error messages.
pub fn describe(val: Value, arena: &Arena) -> String {
    print_val(val, arena).unwrap_or_else(|e| format!("<unprintable: {}>", e))
}
