use std::fmt;

/// Index into the slot arena plus the epoch it was issued in.
/// Index 0 is never handed out.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub index: u32,
    pub epoch: u32,
}

/// One arena slot. Atom text is a run of `Byte` slots closed by `Byte(0)`;
/// a pair is two consecutive `Ref` slots.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Byte(u8),
    Ref(Value),
}

/// The terminator closing every atom's byte run.
pub const TERMINATOR: Slot = Slot::Byte(0);

/// A Lisp value. Copy semantics: atoms and pairs live in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// Empty list and the only false value.
    Nil,
    Atom(Handle),
    Pair(Handle),
    /// Result of a successful comparison or predicate. Not an atom.
    Truth,
}

impl Value {
    pub fn is_nil(self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_pair(self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_atom(self) -> bool {
        matches!(self, Value::Atom(_))
    }

    pub fn is_truthy(self) -> bool {
        !self.is_nil()
    }

    pub fn as_pair(self) -> Option<Handle> {
        match self {
            Value::Pair(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_atom(self) -> Option<Handle> {
        match self {
            Value::Atom(h) => Some(h),
            _ => None,
        }
    }

    pub fn from_bool(b: bool) -> Value {
        if b {
            Value::Truth
        } else {
            Value::Nil
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Atom(h) => write!(f, "Atom({:?})", h),
            Value::Pair(h) => write!(f, "Pair({:?})", h),
            Value::Truth => write!(f, "Truth"),
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.index, self.epoch)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Byte(b) => write!(f, "Byte({})", b),
            Slot::Ref(v) => write!(f, "Ref({:?})", v),
        }
    }
}
