use std::io::Write;
use std::process::{Command, Output, Stdio};

use tempfile::NamedTempFile;

fn letlisp() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_letlisp"));
    cmd.env_remove("RUST_LOG")
        .env_remove("LETLISP_STRICT")
        .env_remove("LETLISP_ARENA_SLOTS")
        .env_remove("LETLISP_MAX_DEPTH");
    cmd
}

fn with_stdin(mut cmd: Command, stdin: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start letlisp");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("letlisp did not finish")
}

fn script(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(text.as_bytes()).expect("write script");
    file
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn prompt_prints_each_result() {
    let out = with_stdin(letlisp(), "(+ 1 2)\n'(a b)\n");
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "S> 3\nS> (a b)\nS> \n");
}

#[test]
fn prompt_read_shares_standard_input() {
    let out = with_stdin(letlisp(), "(read) (x y)\n");
    assert_eq!(stdout(&out), "S> (x y)\nS> \n");
}

#[test]
fn prompt_continues_after_a_fault() {
    let out = with_stdin(letlisp(), ")\n(+ 1 1)");
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "S> S> 2\nS> \n");
    assert!(stderr(&out).contains("unexpected ')'"));
}

#[test]
fn read_fault_drops_the_rest_of_the_line() {
    let long = "a".repeat(40);
    let out = with_stdin(letlisp(), &format!("({} b) c)\n(+ 1 2)\n", long));
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "S> S> 3\nS> \n");
    let errors = stderr(&out);
    assert!(errors.contains("token longer than 32 bytes"));
    assert!(!errors.contains("unexpected ')'"));
}

#[test]
fn long_token_at_line_end_keeps_the_next_line() {
    let long = "a".repeat(40);
    let out = with_stdin(letlisp(), &format!("(x {}\n(+ 1 2)\n", long));
    assert_eq!(stdout(&out), "S> S> 3\nS> \n");
}

#[test]
fn unaddressable_arena_size_is_rejected() {
    let mut cmd = letlisp();
    cmd.arg("--arena-slots").arg("5000000000");
    let out = with_stdin(cmd, "");
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("addressable"));
    assert_eq!(stdout(&out), "");
}

#[test]
fn exit_stops_the_prompt() {
    let out = with_stdin(letlisp(), "(exit) (+ 1 2)");
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "S> ");
}

#[test]
fn strict_mode_from_the_environment() {
    let mut cmd = letlisp();
    cmd.env("LETLISP_STRICT", "1");
    let out = with_stdin(cmd, "nowhere");
    assert!(stderr(&out).contains("unbound variable 'nowhere'"));
}

#[test]
fn arena_exhaustion_ends_the_session() {
    let mut cmd = letlisp();
    cmd.arg("--arena-slots").arg("64");
    let out = with_stdin(cmd, "(let f ((n 500)) (if (= n 0) 0 (f (- n 1))))\n(+ 1 1)");
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("fatal: arena exhausted"));
    assert!(!stdout(&out).contains('2'));
}

#[test]
fn file_mode_evaluates_without_printing() {
    let file = script("(write (let loop ((n 5) (acc 1)) (if (= n 0) acc (loop (- n 1) (* acc n)))))");
    let out = with_stdin({
        let mut cmd = letlisp();
        cmd.arg(file.path());
        cmd
    }, "");
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "120");
}

#[test]
fn file_mode_only_evaluates_the_first_expression() {
    let file = script("(write 'first) (write 'second)");
    let mut cmd = letlisp();
    cmd.arg(file.path());
    let out = with_stdin(cmd, "");
    assert_eq!(stdout(&out), "first");
}

#[test]
fn file_mode_exit() {
    let file = script("(cons (write 'bye) (exit))");
    let mut cmd = letlisp();
    cmd.arg(file.path());
    let out = with_stdin(cmd, "");
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "bye");
}

#[test]
fn file_mode_fault_exits_with_failure() {
    let file = script("(+ 'a 1)");
    let mut cmd = letlisp();
    cmd.arg(file.path());
    let out = with_stdin(cmd, "");
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("malformed numeral 'a'"));
}

#[test]
fn missing_file_exits_with_one() {
    let out = with_stdin({
        let mut cmd = letlisp();
        cmd.arg("no/such/script.lisp");
        cmd
    }, "");
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stdout(&out), "no/such/script.lisp is not found.\n");
}
