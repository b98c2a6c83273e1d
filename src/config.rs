use crate::reader::MAX_TOKEN_LEN;

/// What a reference to an unbound variable evaluates to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnboundPolicy {
    /// Unbound variables are nil, like any other missing value.
    #[default]
    Nil,
    /// Unbound variables raise `LispError::Unbound`.
    Fault,
}

/// Interpreter limits and policies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Arena size in slots. An atom of n bytes takes n + 1 slots, a pair 2.
    pub arena_capacity: usize,
    /// Longest atom the reader accepts.
    pub max_token_len: usize,
    /// Deepest non-tail evaluation nesting before a fatal error.
    pub max_depth: usize,
    pub unbound: UnboundPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            arena_capacity: 1 << 20,
            max_token_len: MAX_TOKEN_LEN,
            max_depth: 10_000,
            unbound: UnboundPolicy::Nil,
        }
    }
}

impl Config {
    pub fn with_arena_capacity(mut self, slots: usize) -> Self {
        self.arena_capacity = slots;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_unbound(mut self, policy: UnboundPolicy) -> Self {
        self.unbound = policy;
        self
    }
}
