use crate::arena::Arena;
use crate::error::{LispError, LispResult};
use crate::eval::{STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::value::Value;

/// Print a value to a string.
///
/// Nil prints as `()`, atoms as their raw bytes, proper lists as
/// space-separated elements in parentheses. Comparison results print as `#t`.
pub fn print_val(val: Value, arena: &Arena) -> LispResult<String> {
    let mut out = Vec::new();
    print_inner(val, arena, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn print_inner(val: Value, arena: &Arena, out: &mut Vec<u8>) -> LispResult<()> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || print_node(val, arena, out))
}

fn print_node(val: Value, arena: &Arena, out: &mut Vec<u8>) -> LispResult<()> {
    match val {
        Value::Nil => out.extend_from_slice(b"()"),
        Value::Truth => out.extend_from_slice(b"#t"),
        Value::Atom(h) => out.extend_from_slice(&arena.atom_bytes(h)?),
        Value::Pair(h) => {
            out.push(b'(');
            print_inner(arena.car(h)?, arena, out)?;
            let mut current = arena.cdr(h)?;
            loop {
                match current {
                    Value::Nil => break,
                    Value::Pair(next) => {
                        out.push(b' ');
                        print_inner(arena.car(next)?, arena, out)?;
                        current = arena.cdr(next)?;
                    }
                    _ => return Err(LispError::ImproperList),
                }
            }
            out.push(b')');
        }
    }
    Ok(())
}
