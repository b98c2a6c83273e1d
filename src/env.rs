use crate::arena::Arena;
use crate::error::LispResult;
use crate::value::{Handle, Value};

/// An environment: an arena list of alternating keys and values,
/// `(k1 v1 k2 v2 ...)`. It is extended only by prepending, so an extended
/// environment shares its tail with the one it was built from, and the
/// earliest match wins on lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Env(Value);

impl Env {
    pub const EMPTY: Env = Env(Value::Nil);

    pub fn as_value(self) -> Value {
        self.0
    }

    /// Find the value bound to the atom `name`, scanning front to back.
    pub fn lookup(self, name: Handle, arena: &Arena) -> LispResult<Option<Value>> {
        let mut current = self.0;
        while let Value::Pair(h) = current {
            let key = arena.car(h)?;
            let rest = arena.cdr(h)?;
            if let Value::Atom(k) = key {
                if arena.atom_eq(k, name)? {
                    return Ok(Some(arena.car_val(rest)?));
                }
            }
            current = arena.cdr_val(rest)?;
        }
        Ok(None)
    }

    /// Prepend one binding.
    pub fn define(self, key: Value, val: Value, arena: &mut Arena) -> LispResult<Env> {
        let tail = arena.cons(val, self.0)?;
        Ok(Env(arena.cons(key, tail)?))
    }

    /// Bind `params` to `args` by position and prepend the bindings, first
    /// parameter first. Surplus parameters or arguments are dropped.
    pub fn bind(self, params: &[Value], args: &[Value], arena: &mut Arena) -> LispResult<Env> {
        let mut env = self;
        for (&key, &val) in params.iter().zip(args).rev() {
            env = env.define(key, val, arena)?;
        }
        Ok(env)
    }
}
