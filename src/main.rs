use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::builder::FalseyValueParser;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use letlisp::arena::MAX_CAPACITY;
use letlisp::{Config, Env, LispError, LispResult, Machine, UnboundPolicy};

/// Exit status for evaluation faults and fatal errors.
const FAILURE: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "letlisp", version, about = "Pure Lisp with dynamic-scope named let")]
struct Args {
    /// Evaluate the first expression of this file instead of starting the prompt
    file: Option<PathBuf>,

    /// Arena size in slots
    #[arg(
        long,
        env = "LETLISP_ARENA_SLOTS",
        default_value_t = Config::default().arena_capacity,
        value_parser = parse_arena_slots
    )]
    arena_slots: usize,

    /// Deepest non-tail evaluation nesting
    #[arg(long, env = "LETLISP_MAX_DEPTH", default_value_t = Config::default().max_depth)]
    max_depth: usize,

    /// Report unbound variables instead of evaluating them to ()
    #[arg(long, env = "LETLISP_STRICT", value_parser = FalseyValueParser::new())]
    strict: bool,

    /// Evaluator thread stack size in MiB
    #[arg(long, env = "LETLISP_STACK_MB", default_value_t = 256)]
    stack_mb: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> Config {
        let unbound = if self.strict {
            UnboundPolicy::Fault
        } else {
            UnboundPolicy::Nil
        };
        Config::default()
            .with_arena_capacity(self.arena_slots)
            .with_max_depth(self.max_depth)
            .with_unbound(unbound)
    }
}

fn parse_arena_slots(text: &str) -> std::result::Result<usize, String> {
    let slots: usize = text.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
    if slots > MAX_CAPACITY {
        return Err(format!("at most {} slots are addressable", MAX_CAPACITY));
    }
    Ok(slots)
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            FAILURE
        }
    };
    std::process::exit(code);
}

fn run(args: Args) -> Result<i32> {
    let stack_size = args
        .stack_mb
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow!("invalid stack size: {} MiB", args.stack_mb))?;
    let config = args.config();
    info!(version = letlisp::VERSION, ?config, "starting");

    let file = args.file;
    let worker = thread::Builder::new()
        .name("letlisp-eval".to_string())
        .stack_size(stack_size)
        .spawn(move || match file {
            Some(path) => run_file(&path, config),
            None => run_prompt(config),
        })
        .context("failed to start evaluator thread")?;
    worker
        .join()
        .map_err(|_| anyhow!("evaluator thread panicked"))?
}

/// Evaluate the file's first expression once, printing nothing.
fn run_file(path: &Path, config: Config) -> Result<i32> {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot read script");
            println!("{} is not found.", path.display());
            return Ok(1);
        }
    };

    let mut machine = Machine::new(config);
    match machine.eval_source(&source) {
        Ok(_) => Ok(0),
        Err(e) if e.is_exit() => Ok(0),
        Err(e) => {
            report(&e);
            Ok(FAILURE)
        }
    }
}

/// The interactive loop. Every expression starts from an empty arena, and
/// after a read fault the rest of the offending line is dropped.
fn run_prompt(config: Config) -> Result<i32> {
    let mut machine = Machine::new(config);
    let mut stdout = io::stdout();

    loop {
        machine.reset();
        print!("S> ");
        stdout.flush()?;

        match step(&mut machine) {
            Ok(Some(text)) => println!("{}", text),
            Ok(None) => {
                println!();
                return Ok(0);
            }
            Err(e) if e.is_exit() => return Ok(0),
            Err(e) if e.is_fatal() => {
                report(&e);
                return Ok(FAILURE);
            }
            Err(LispError::Io(e)) => return Err(e).context("reading standard input"),
            Err(e) if e.is_read_error() => {
                report(&e);
                machine.input.skip_line()?;
            }
            Err(e) => report(&e),
        }
    }
}

/// Read, evaluate and print one expression. None at end of input.
fn step(machine: &mut Machine) -> LispResult<Option<String>> {
    let Some(expr) = machine.read_input()? else {
        return Ok(None);
    };
    let val = machine.evaluate(expr, Env::EMPTY)?;
    machine.print(val).map(Some)
}

fn report(e: &LispError) {
    if e.is_fatal() {
        eprintln!("fatal: {}", e);
    } else {
        eprintln!("error: {}", e);
    }
}
