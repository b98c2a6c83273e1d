use tracing::debug;

use crate::error::{LispError, LispResult};
use crate::value::{Handle, Slot, Value, TERMINATOR};

/// The slot arena. Atoms and pairs are laid out contiguously in one
/// append-only vector; slot 0 is a placeholder so no handle has index 0.
///
/// Nothing is ever freed individually. `reset` drops everything at once and
/// moves the arena to a new epoch, after which every earlier handle is stale.
/// Largest capacity whose slot indices all fit a handle.
pub const MAX_CAPACITY: usize = u32::MAX as usize;

pub struct Arena {
    slots: Vec<Slot>,
    capacity: usize,
    epoch: u32,
}

impl Arena {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity.min(1 << 16) + 1);
        slots.push(TERMINATOR);
        Arena {
            slots,
            capacity,
            epoch: 0,
        }
    }

    /// Rewind the cursor to the first slot and start a new epoch.
    pub fn reset(&mut self) {
        debug!(
            used = self.used(),
            capacity = self.capacity(),
            epoch = self.epoch,
            "arena reset"
        );
        self.slots.truncate(1);
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn reserve(&mut self, n: usize) -> LispResult<Handle> {
        let exhausted = || LispError::ArenaExhausted {
            capacity: self.capacity,
        };
        if self.used() + n > self.capacity {
            return Err(exhausted());
        }
        let index = u32::try_from(self.slots.len()).map_err(|_| exhausted())?;
        Ok(Handle {
            index,
            epoch: self.epoch,
        })
    }

    /// Allocate a pair: two consecutive reference slots.
    pub fn allocate_pair(&mut self, car: Value, cdr: Value) -> LispResult<Handle> {
        let h = self.reserve(2)?;
        self.slots.push(Slot::Ref(car));
        self.slots.push(Slot::Ref(cdr));
        Ok(h)
    }

    /// Allocate an atom: its bytes followed by the terminator.
    pub fn allocate_atom(&mut self, bytes: &[u8]) -> LispResult<Handle> {
        if bytes.is_empty() || bytes.contains(&0) {
            return Err(LispError::InvalidAtom);
        }
        let h = self.reserve(bytes.len() + 1)?;
        self.slots.extend(bytes.iter().map(|&b| Slot::Byte(b)));
        self.slots.push(TERMINATOR);
        Ok(h)
    }

    /// Shorthand for `allocate_atom` wrapped as a value.
    pub fn atom(&mut self, text: &str) -> LispResult<Value> {
        Ok(Value::Atom(self.allocate_atom(text.as_bytes())?))
    }

    pub fn cons(&mut self, car: Value, cdr: Value) -> LispResult<Value> {
        Ok(Value::Pair(self.allocate_pair(car, cdr)?))
    }

    /// Read the slot `offset` places after the start of `h`.
    pub fn slot_at(&self, h: Handle, offset: usize) -> LispResult<Slot> {
        let stale = || LispError::StaleHandle {
            index: h.index,
            epoch: h.epoch,
            current: self.epoch,
        };
        if h.epoch != self.epoch || h.index == 0 {
            return Err(stale());
        }
        self.slots
            .get(h.index as usize + offset)
            .copied()
            .ok_or_else(stale)
    }

    pub fn is_reference(slot: Slot) -> bool {
        matches!(slot, Slot::Ref(_))
    }

    fn ref_at(&self, h: Handle, offset: usize) -> LispResult<Value> {
        match self.slot_at(h, offset)? {
            Slot::Ref(v) => Ok(v),
            Slot::Byte(_) => Err(LispError::TypeMismatch(format!(
                "slot {} is atom text, not a reference",
                h.index as usize + offset
            ))),
        }
    }

    #[inline]
    pub fn car(&self, h: Handle) -> LispResult<Value> {
        self.ref_at(h, 0)
    }

    #[inline]
    pub fn cdr(&self, h: Handle) -> LispResult<Value> {
        self.ref_at(h, 1)
    }

    /// Car of a pair, nil of nil.
    pub fn car_val(&self, val: Value) -> LispResult<Value> {
        match val {
            Value::Nil => Ok(Value::Nil),
            Value::Pair(h) => self.car(h),
            _ => Err(LispError::TypeMismatch("car of a non-pair".into())),
        }
    }

    /// Cdr of a pair, nil of nil.
    pub fn cdr_val(&self, val: Value) -> LispResult<Value> {
        match val {
            Value::Nil => Ok(Value::Nil),
            Value::Pair(h) => self.cdr(h),
            _ => Err(LispError::TypeMismatch("cdr of a non-pair".into())),
        }
    }

    fn atom_byte(&self, h: Handle, offset: usize) -> LispResult<u8> {
        match self.slot_at(h, offset)? {
            Slot::Byte(b) => Ok(b),
            Slot::Ref(_) => Err(LispError::TypeMismatch("atom text runs into a pair".into())),
        }
    }

    pub fn atom_bytes(&self, h: Handle) -> LispResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut i = 0;
        loop {
            match self.atom_byte(h, i)? {
                0 => return Ok(out),
                b => out.push(b),
            }
            i += 1;
        }
    }

    /// Compare an atom's text with `text` byte by byte.
    pub fn atom_is(&self, h: Handle, text: &[u8]) -> LispResult<bool> {
        for (i, &b) in text.iter().enumerate() {
            if self.atom_byte(h, i)? != b {
                return Ok(false);
            }
        }
        Ok(self.atom_byte(h, text.len())? == 0)
    }

    /// True when both atoms hold the same bytes.
    pub fn atom_eq(&self, a: Handle, b: Handle) -> LispResult<bool> {
        if a == b {
            return self.slot_at(a, 0).map(|_| true);
        }
        let mut i = 0;
        loop {
            let (x, y) = (self.atom_byte(a, i)?, self.atom_byte(b, i)?);
            if x != y {
                return Ok(false);
            }
            if x == 0 {
                return Ok(true);
            }
            i += 1;
        }
    }

    /// True if `val` is an atom spelled `text`.
    pub fn is_named(&self, val: Value, text: &[u8]) -> LispResult<bool> {
        match val {
            Value::Atom(h) => self.atom_is(h, text),
            _ => Ok(false),
        }
    }

    /// Build a proper list from a slice of values.
    pub fn list(&mut self, values: &[Value]) -> LispResult<Value> {
        let mut result = Value::Nil;
        for &val in values.iter().rev() {
            result = self.cons(val, result)?;
        }
        Ok(result)
    }

    /// Collect a proper list into a Vec.
    pub fn list_to_vec(&self, val: Value) -> LispResult<Vec<Value>> {
        let mut result = Vec::new();
        let mut current = val;
        loop {
            match current {
                Value::Nil => return Ok(result),
                Value::Pair(h) => {
                    result.push(self.car(h)?);
                    current = self.cdr(h)?;
                }
                _ => return Err(LispError::ImproperList),
            }
        }
    }

    /// Element `n` of a list, nil past the end.
    pub fn nth(&self, list: Value, n: usize) -> LispResult<Value> {
        let mut current = list;
        for _ in 0..n {
            current = self.cdr_val(current)?;
        }
        self.car_val(current)
    }

    /// Number of slots in use, not counting the reserved slot 0.
    pub fn used(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}
