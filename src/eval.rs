use tracing::{debug, trace};

use crate::arena::Arena;
use crate::config::{Config, UnboundPolicy};
use crate::env::Env;
use crate::error::{LispError, LispResult};
use crate::primitives::{self, describe, PrimContext, Primitive};
use crate::printer::print_val;
use crate::reader::Reader;
use crate::stream::{InputStream, OutputStream};
use crate::symbol::{is_numeral, sym, SpecialForm};
use crate::value::{Handle, Value};

/// Remaining stack below which recursive walks switch to a fresh segment.
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each segment `stacker` allocates.
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// The evaluation session: the arena plus the I/O the `read` and `write`
/// primitives talk to. One machine evaluates one top-level expression at a
/// time; `reset` between them reclaims the whole arena.
pub struct Machine {
    pub arena: Arena,
    pub config: Config,
    pub input: InputStream,
    pub output: OutputStream,
    /// Current non-tail nesting of `evaluate`.
    depth: usize,
}

/// What an operator evaluated to.
enum Callee {
    Primitive(Primitive),
    /// An atom that names no primitive; the call yields nil.
    Unknown,
    Lambda { params: Vec<Value>, body: Value },
}

impl Machine {
    /// A machine reading standard input and writing standard output.
    pub fn new(config: Config) -> Self {
        Machine::with_io(config, InputStream::stdin(), OutputStream::stdout())
    }

    pub fn with_io(config: Config, input: InputStream, output: OutputStream) -> Self {
        Machine {
            arena: Arena::new(config.arena_capacity),
            config,
            input,
            output,
            depth: 0,
        }
    }

    /// Discard everything allocated since the last reset.
    pub fn reset(&mut self) {
        self.arena.reset();
        self.depth = 0;
    }

    /// Read the next expression from the input stream. None at end of input.
    pub fn read_input(&mut self) -> LispResult<Option<Value>> {
        Reader::new(&mut self.input, self.config.max_token_len).read(&mut self.arena)
    }

    /// Reset, read the first expression of `source`, and evaluate it in the
    /// empty environment.
    pub fn eval_source(&mut self, source: &str) -> LispResult<Value> {
        self.reset();
        let mut text = InputStream::from_text(source);
        let expr = Reader::new(&mut text, self.config.max_token_len)
            .read(&mut self.arena)?
            .ok_or(LispError::UnexpectedEof)?;
        self.evaluate(expr, Env::EMPTY)
    }

    /// `eval_source`, printed.
    pub fn evaluate_one(&mut self, source: &str) -> LispResult<String> {
        let val = self.eval_source(source)?;
        self.print(val)
    }

    pub fn print(&self, val: Value) -> LispResult<String> {
        print_val(val, &self.arena)
    }

    /// Evaluate `expr` in `env`.
    ///
    /// Nesting is bounded by `Config::max_depth` alone: the host stack is
    /// extended as needed, so the limit holds on any thread.
    pub fn evaluate(&mut self, expr: Value, env: Env) -> LispResult<Value> {
        if self.depth >= self.config.max_depth {
            return Err(LispError::DepthExceeded(self.config.max_depth));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_loop(expr, env)
        });
        self.depth -= 1;
        result
    }

    /// Tail positions (`if` branches, `let` expansions, function bodies)
    /// replace `expr` and `env` and go round the loop instead of recursing.
    fn eval_loop(&mut self, mut expr: Value, mut env: Env) -> LispResult<Value> {
        loop {
            let form = match expr {
                Value::Nil | Value::Truth => return Ok(expr),
                Value::Atom(h) => return self.eval_atom(h, env),
                Value::Pair(h) => h,
            };

            let head = self.arena.car(form)?;
            let special = match head {
                Value::Atom(h) => SpecialForm::from_name(&self.arena.atom_bytes(h)?),
                _ => None,
            };

            match special {
                Some(SpecialForm::Quote) => return self.arena.nth(expr, 1),
                Some(SpecialForm::Fn) => return Ok(expr),
                Some(SpecialForm::If) => {
                    let test = self.arena.nth(expr, 1)?;
                    let branch = if self.evaluate(test, env)?.is_truthy() { 2 } else { 3 };
                    expr = self.arena.nth(expr, branch)?;
                }
                Some(SpecialForm::Let) => {
                    expr = self.expand_let(expr)?;
                }
                Some(SpecialForm::Exit) => return Err(LispError::Exit),
                None => {
                    let f = self.evaluate(head, env)?;
                    let operands = self.arena.list_to_vec(self.arena.cdr(form)?)?;
                    let mut args = Vec::with_capacity(operands.len());
                    for operand in operands {
                        args.push(self.evaluate(operand, env)?);
                    }
                    trace!(depth = self.depth, "apply {}", describe(f, &self.arena));

                    match self.callee(f)? {
                        Callee::Primitive(p) => return self.apply_primitive(p, &args),
                        Callee::Unknown => return Ok(Value::Nil),
                        Callee::Lambda { params, body } => {
                            // Dynamic scope: the body sees the caller's bindings.
                            env = env.bind(&params, &args, &mut self.arena)?;
                            expr = body;
                        }
                    }
                }
            }
        }
    }

    /// Primitive names and numerals evaluate to themselves; any other atom is
    /// a variable.
    fn eval_atom(&mut self, h: Handle, env: Env) -> LispResult<Value> {
        let name = self.arena.atom_bytes(h)?;
        if Primitive::from_name(&name).is_some() || is_numeral(&name) {
            return Ok(Value::Atom(h));
        }
        if let Some(val) = env.lookup(h, &self.arena)? {
            return Ok(val);
        }
        let name = String::from_utf8_lossy(&name).into_owned();
        match self.config.unbound {
            UnboundPolicy::Nil => {
                debug!(%name, "unbound variable evaluates to nil");
                Ok(Value::Nil)
            }
            UnboundPolicy::Fault => Err(LispError::Unbound(name)),
        }
    }

    fn callee(&self, f: Value) -> LispResult<Callee> {
        match f {
            Value::Atom(h) => {
                let name = self.arena.atom_bytes(h)?;
                Ok(match Primitive::from_name(&name) {
                    Some(p) => Callee::Primitive(p),
                    None => {
                        debug!(name = %String::from_utf8_lossy(&name), "unknown primitive yields nil");
                        Callee::Unknown
                    }
                })
            }
            Value::Pair(h) => {
                if !self.arena.is_named(self.arena.car(h)?, sym::FN)? {
                    return Err(LispError::NotAFunction(describe(f, &self.arena)));
                }
                let params = match self.arena.nth(f, 1)? {
                    list @ (Value::Nil | Value::Pair(_)) => self.arena.list_to_vec(list)?,
                    _ => return Err(LispError::NotAFunction(describe(f, &self.arena))),
                };
                let body = self.arena.nth(f, 2)?;
                Ok(Callee::Lambda { params, body })
            }
            Value::Nil | Value::Truth => Err(LispError::NotAFunction(describe(f, &self.arena))),
        }
    }

    fn apply_primitive(&mut self, prim: Primitive, args: &[Value]) -> LispResult<Value> {
        let cx = PrimContext {
            arena: &mut self.arena,
            input: &mut self.input,
            output: &mut self.output,
            max_token_len: self.config.max_token_len,
        };
        primitives::call_primitive(prim, args, cx)
    }

    /// Rewrite `(let NAME ((V1 E1) (V2 E2) ...) BODY)` as
    ///
    /// ```text
    /// ((fn (NAME) (NAME E1 E2 ...)) (fn (V1 V2 ...) BODY))
    /// ```
    ///
    /// The loop function is passed in as NAME and every recursive `(NAME ...)`
    /// in BODY finds it again by looking NAME up in the environment of the
    /// call. Nothing is captured, so this only works under dynamic scope.
    fn expand_let(&mut self, expr: Value) -> LispResult<Value> {
        let name = self.arena.nth(expr, 1)?;
        let bindings = self.arena.list_to_vec(self.arena.nth(expr, 2)?)?;
        let body = self.arena.nth(expr, 3)?;

        let mut vars = Vec::with_capacity(bindings.len());
        let mut inits = Vec::with_capacity(bindings.len());
        for binding in bindings {
            vars.push(self.arena.car_val(binding)?);
            inits.push(self.arena.nth(binding, 1)?);
        }

        let fn_atom = Value::Atom(self.arena.allocate_atom(sym::FN)?);
        let vars = self.arena.list(&vars)?;
        let step = self.arena.list(&[fn_atom, vars, body])?;

        let inits = self.arena.list(&inits)?;
        let call = self.arena.cons(name, inits)?;
        let params = self.arena.list(&[name])?;
        let launcher = self.arena.list(&[fn_atom, params, call])?;

        let expanded = self.arena.list(&[launcher, step])?;
        trace!("let expands to {}", describe(expanded, &self.arena));
        Ok(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::SharedBuffer;

    fn machine() -> Machine {
        machine_with(Config::default(), "").0
    }

    fn machine_with(config: Config, stdin: &str) -> (Machine, SharedBuffer) {
        let (output, written) = OutputStream::buffer();
        (
            Machine::with_io(config, InputStream::from_text(stdin), output),
            written,
        )
    }

    fn run(src: &str) -> String {
        machine().evaluate_one(src).unwrap()
    }

    #[test]
    fn self_evaluating_atoms() {
        assert_eq!(run("42"), "42");
        assert_eq!(run("-3"), "-3");
        assert_eq!(run("car"), "car");
        assert_eq!(run("()"), "()");
    }

    #[test]
    fn quote_returns_its_argument() {
        assert_eq!(run("'(a b)"), "(a b)");
        assert_eq!(run("(quote x)"), "x");
    }

    #[test]
    fn fn_form_is_its_own_value() {
        assert_eq!(run("(fn (x) (+ x 1))"), "(fn (x) (+ x 1))");
    }

    #[test]
    fn if_picks_one_branch() {
        assert_eq!(run("(if (< 1 2) 'yes 'no)"), "yes");
        assert_eq!(run("(if (= 1 2) 'yes 'no)"), "no");
        assert_eq!(run("(if () 'yes)"), "()");
    }

    #[test]
    fn untaken_branch_is_not_evaluated() {
        let (mut m, written) = machine_with(Config::default(), "");
        assert_eq!(m.evaluate_one("(if 1 'a (write 'b))").unwrap(), "a");
        assert_eq!(m.evaluate_one("(if () (write 'a) 'b)").unwrap(), "b");
        assert_eq!(written.contents(), "");
    }

    #[test]
    fn applies_lambdas() {
        assert_eq!(run("((fn (x y) (cons y (cons x ()))) 1 2)"), "(2 1)");
        assert_eq!(run("((fn (x y) y) 1)"), "()");
    }

    #[test]
    fn factorial_with_named_let() {
        let src = "(let loop ((n 5) (acc 1)) (if (= n 0) acc (loop (- n 1) (* acc n))))";
        assert_eq!(run(src), "120");
    }

    #[test]
    fn named_let_with_no_bindings() {
        assert_eq!(run("(let f () 'done)"), "done");
    }

    #[test]
    fn named_let_initial_values_see_the_loop_name() {
        // The initial values are evaluated with the loop name already bound.
        assert_eq!(run("(let f ((x (pair? f))) x)"), "#t");
    }

    #[test]
    fn free_variables_resolve_in_the_caller() {
        let src = "((fn (get) ((fn (y) (get)) 'caller)) (fn () y))";
        assert_eq!(run(src), "caller");
    }

    #[test]
    fn shadowing_follows_the_call_chain() {
        let src = "((fn (x f) ((fn (x) (f)) 'inner)) 'outer (fn () x))";
        assert_eq!(run(src), "inner");
    }

    #[test]
    fn tail_loops_run_in_constant_depth() {
        let config = Config::default().with_max_depth(64);
        let (mut m, _) = machine_with(config, "");
        let src = "(let loop ((n 3000)) (if (= n 0) 'done (loop (- n 1))))";
        assert_eq!(m.evaluate_one(src).unwrap(), "done");
    }

    #[test]
    fn deep_non_tail_recursion_is_fatal() {
        let config = Config::default().with_max_depth(64);
        let (mut m, _) = machine_with(config, "");
        let src = "(let f ((n 1000)) (if (= n 0) 0 (+ 1 (f (- n 1)))))";
        let err = m.evaluate_one(src).unwrap_err();
        assert!(matches!(err, LispError::DepthExceeded(64)));
        assert!(err.is_fatal());
        m.reset();
        assert_eq!(m.evaluate_one("(+ 1 1)").unwrap(), "2");
    }

    #[test]
    fn default_depth_limit_fires_before_the_stack_runs_out() {
        let levels = 12_000;
        let src = format!("{}(){}", "(car ".repeat(levels), ")".repeat(levels));
        let err = machine().evaluate_one(&src).unwrap_err();
        assert!(matches!(err, LispError::DepthExceeded(10_000)));
    }

    #[test]
    fn unbound_variable_is_nil_by_default() {
        assert_eq!(run("nothing-here"), "()");
    }

    #[test]
    fn unbound_variable_faults_when_strict() {
        let config = Config::default().with_unbound(UnboundPolicy::Fault);
        let (mut m, _) = machine_with(config, "");
        assert!(matches!(
            m.evaluate_one("nothing-here"),
            Err(LispError::Unbound(name)) if name == "nothing-here"
        ));
    }

    #[test]
    fn unknown_primitive_yields_nil() {
        assert_eq!(run("(5 1 2)"), "()");
    }

    #[test]
    fn non_function_operator_is_a_fault() {
        let mut m = machine();
        assert!(matches!(m.evaluate_one("(() 1)"), Err(LispError::NotAFunction(_))));
        assert!(matches!(m.evaluate_one("('(a b) 1)"), Err(LispError::NotAFunction(_))));
        assert!(matches!(m.evaluate_one("((< 1 2) 1)"), Err(LispError::NotAFunction(_))));
        assert!(matches!(m.evaluate_one("((fn x x) 1)"), Err(LispError::NotAFunction(_))));
    }

    #[test]
    fn exit_unwinds_everything() {
        let (mut m, written) = machine_with(Config::default(), "");
        let err = m.evaluate_one("(cons (write 'a) (exit))").unwrap_err();
        assert!(err.is_exit());
        assert_eq!(written.contents(), "a");
    }

    #[test]
    fn read_primitive_uses_the_input_stream() {
        let (mut m, _) = machine_with(Config::default(), "(1 2 3)");
        assert_eq!(m.evaluate_one("(car (cdr (read)))").unwrap(), "2");
    }

    #[test]
    fn read_input_then_evaluate() {
        let (mut m, _) = machine_with(Config::default(), "(+ 2 3) (* 4 5)");
        for expected in ["5", "20"] {
            m.reset();
            let expr = m.read_input().unwrap().unwrap();
            let val = m.evaluate(expr, Env::EMPTY).unwrap();
            assert_eq!(m.print(val).unwrap(), expected);
        }
        m.reset();
        assert_eq!(m.read_input().unwrap(), None);
    }

    #[test]
    fn stale_values_do_not_resolve_after_reset() {
        let mut m = machine();
        let old = m.eval_source("'(a b c)").unwrap();
        m.reset();
        let fresh = m.eval_source("'(x y z)").unwrap();
        assert_eq!(m.print(fresh).unwrap(), "(x y z)");
        assert!(matches!(m.print(old), Err(LispError::StaleHandle { .. })));
    }

    #[test]
    fn arena_exhaustion_is_fatal() {
        let config = Config::default().with_arena_capacity(256);
        let (mut m, _) = machine_with(config, "");
        let src = "(let loop ((n 1000)) (if (= n 0) 'done (loop (- n 1))))";
        let err = m.evaluate_one(src).unwrap_err();
        assert!(matches!(err, LispError::ArenaExhausted { capacity: 256 }));
        assert!(err.is_fatal());
    }
}
