//! The narrow trait a [`crate::Kernel`] drives, and a reference
//! implementation good enough to exercise every kernel behavior end-to-end
//! without embedding a real language runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

use agent_events::EventBus;

use crate::events::{InputRequest, KernelEvent, StreamData};

/// Filesystem mount requested at `initialize` time.
#[derive(Clone, Debug, Default)]
pub struct FilesystemMount {
    /// Whether the mount is active.
    pub enabled: bool,
    /// Host-side path to expose.
    pub host_root: String,
    /// Guest-visible mount point.
    pub guest_mount: String,
}

/// Options accepted by [`Interpreter::initialize`].
#[derive(Clone, Debug, Default)]
pub struct InitOptions {
    /// Optional filesystem bind mount.
    pub filesystem: Option<FilesystemMount>,
    /// Environment variables to set before any user code runs. Entries with
    /// an absent value are skipped by the caller with a warning rather than
    /// passed here (see [`crate::kernel::Kernel::initialize`]).
    pub env: HashMap<String, String>,
}

/// The outcome of a failed [`Interpreter::run`] or [`Interpreter::initialize`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{ename}: {evalue}")]
pub struct InterpreterError {
    /// Exception type name.
    pub ename: String,
    /// Exception message.
    pub evalue: String,
    /// Traceback lines, if the interpreter produced any.
    pub traceback: Option<Vec<String>>,
}

impl InterpreterError {
    /// Creates an error with no traceback.
    #[must_use]
    pub fn new(ename: impl Into<String>, evalue: impl Into<String>) -> Self {
        Self {
            ename: ename.into(),
            evalue: evalue.into(),
            traceback: None,
        }
    }
}

/// A per-call tap that receives a copy of every event emitted during one
/// `execute` invocation, used by [`crate::kernel::Kernel::execute_stream`]
/// to yield exactly the events published during that call.
pub(crate) type EventTap = Arc<dyn Fn(KernelEvent) + Send + Sync>;

/// Per-call context threaded into [`Interpreter::run`]: lets the
/// interpreter publish events and request interactive input without
/// depending on the owning kernel's internal lock.
#[derive(Clone)]
pub struct ExecutionContext {
    events: EventBus<KernelEvent>,
    pending_input: Arc<tokio::sync::Mutex<Option<oneshot::Sender<String>>>>,
    interrupt_buffer: Option<Arc<AtomicU8>>,
    cooperative_interrupt: Arc<AtomicBool>,
    tap: Option<EventTap>,
}

impl ExecutionContext {
    pub(crate) fn new(
        events: EventBus<KernelEvent>,
        pending_input: Arc<tokio::sync::Mutex<Option<oneshot::Sender<String>>>>,
        interrupt_buffer: Option<Arc<AtomicU8>>,
        cooperative_interrupt: Arc<AtomicBool>,
        tap: Option<EventTap>,
    ) -> Self {
        Self {
            events,
            pending_input,
            interrupt_buffer,
            cooperative_interrupt,
            tap,
        }
    }

    /// Publishes `event` on both its typed channel and the wildcard channel,
    /// and forwards a copy to this call's tap, if one is installed.
    pub fn emit(&self, event: KernelEvent) {
        if let Some(tap) = &self.tap {
            tap(event.clone());
        }
        self.events.publish(event);
    }

    /// Requests interactive input, suspending until `inputReply` fulfills it.
    ///
    /// # Errors
    ///
    /// Returns [`InterpreterError`] if a second request arrives while one is
    /// already outstanding, or if the kernel is torn down before a reply
    /// arrives.
    pub async fn request_input(
        &self,
        prompt: impl Into<String>,
        password: bool,
    ) -> Result<String, InterpreterError> {
        let prompt = prompt.into();
        let mut guard = self.pending_input.lock().await;
        if guard.is_some() {
            return Err(InterpreterError::new(
                "InputRequestInFlight",
                "a second input request arrived before the prior one was answered",
            ));
        }
        let (tx, rx) = oneshot::channel();
        *guard = Some(tx);
        drop(guard);

        self.emit(KernelEvent::InputRequest(InputRequest { prompt, password }));

        rx.await.map_err(|_| {
            InterpreterError::new("KernelTerminated", "kernel closed before input was supplied")
        })
    }

    /// Returns `true` if a cooperative interrupt has been requested and not
    /// yet acknowledged via [`ExecutionContext::acknowledge_interrupt`].
    #[must_use]
    pub fn interrupt_requested(&self) -> bool {
        if let Some(buffer) = &self.interrupt_buffer {
            return buffer.load(Ordering::SeqCst) == 2;
        }
        self.cooperative_interrupt.load(Ordering::SeqCst)
    }

    /// Clears whichever interrupt signal is active, acknowledging it.
    pub fn acknowledge_interrupt(&self) {
        if let Some(buffer) = &self.interrupt_buffer {
            buffer.store(0, Ordering::SeqCst);
        }
        self.cooperative_interrupt.store(false, Ordering::SeqCst);
    }
}

/// The narrow interface between [`crate::Kernel`] and a concrete
/// code-execution backend. Implementors own the actual language runtime;
/// this crate supplies only [`ReferenceInterpreter`].
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Prepares the interpreter to run code: sets up its environment and
    /// optional filesystem mount.
    ///
    /// # Errors
    ///
    /// Returns [`InterpreterError`] if setup fails.
    async fn initialize(&mut self, options: &InitOptions) -> Result<(), InterpreterError>;

    /// Caches the parent header for subsequent emitted messages. Called
    /// before every pass-through delegation and before `execute`.
    fn setup(&mut self, parent_header: Option<String>);

    /// Runs `code` to completion.
    ///
    /// Returns `Ok(Some(value))` for a non-unit expression result,
    /// `Ok(None)` for a statement with no value, or `Err` for a failure.
    /// Implementations should poll `ctx.interrupt_requested()` at
    /// cooperative yield points in long-running code and return a
    /// `KeyboardInterrupt`-named error (after calling
    /// `ctx.acknowledge_interrupt()`) when it is set.
    ///
    /// # Errors
    ///
    /// Returns [`InterpreterError`] on any execution failure.
    async fn run(&mut self, code: &str, ctx: &ExecutionContext) -> Result<Option<Value>, InterpreterError>;

    /// Returns completion candidates for `code` at `cursor_pos`.
    async fn complete(&mut self, code: &str, cursor_pos: usize) -> Vec<String>;

    /// Returns introspection data for `code` at `cursor_pos`, if available.
    async fn inspect(&mut self, code: &str, cursor_pos: usize) -> Option<Value>;

    /// Returns whether `code` is a syntactically complete unit.
    fn is_complete(&self, code: &str) -> bool;

    /// Opens a comm channel.
    async fn comm_open(&mut self, comm_id: &str, target_name: &str, data: Value);

    /// Delivers a message on an open comm channel.
    async fn comm_msg(&mut self, comm_id: &str, data: Value);

    /// Closes a comm channel.
    async fn comm_close(&mut self, comm_id: &str);
}

/// In-memory reference interpreter exercising every kernel behavior
/// (arithmetic expressions, thrown errors, `input`/`getpass` prompts, comm
/// messages) without embedding a real language runtime.
///
/// Supported code forms:
/// - integer arithmetic (`+ - * /` with parentheses), e.g. `"1+1"`;
/// - `"raise <message>"` — fails with `ename = "RuntimeError"`;
/// - `"input(<prompt>)"` / `"getpass(<prompt>)"` — requests interactive input;
/// - `"spin <n>"` — cooperatively yields `n` times, checking for an
///   interrupt signal after each yield.
#[derive(Default)]
pub struct ReferenceInterpreter {
    parent_header: Option<String>,
}

impl ReferenceInterpreter {
    /// Creates a fresh reference interpreter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Interpreter for ReferenceInterpreter {
    async fn initialize(&mut self, _options: &InitOptions) -> Result<(), InterpreterError> {
        Ok(())
    }

    fn setup(&mut self, parent_header: Option<String>) {
        self.parent_header = parent_header;
    }

    async fn run(&mut self, code: &str, ctx: &ExecutionContext) -> Result<Option<Value>, InterpreterError> {
        let code = code.trim();

        if let Some(message) = code.strip_prefix("raise ") {
            return Err(InterpreterError::new("RuntimeError", message.to_owned()));
        }

        if let Some(prompt) = code.strip_prefix("input(").and_then(|s| s.strip_suffix(')')) {
            let value = ctx.request_input(prompt.trim_matches('"'), false).await?;
            return Ok(Some(Value::String(value)));
        }

        if let Some(prompt) = code.strip_prefix("getpass(").and_then(|s| s.strip_suffix(')')) {
            let value = ctx.request_input(prompt.trim_matches('"'), true).await?;
            return Ok(Some(Value::String(value)));
        }

        if let Some(count) = code.strip_prefix("spin ") {
            let iterations: u32 = count
                .trim()
                .parse()
                .map_err(|_| InterpreterError::new("ValueError", "spin count must be an integer"))?;
            for _ in 0..iterations {
                tokio::task::yield_now().await;
                if ctx.interrupt_requested() {
                    ctx.acknowledge_interrupt();
                    return Err(InterpreterError::new("KeyboardInterrupt", "execution interrupted"));
                }
            }
            return Ok(None);
        }

        if code.is_empty() {
            return Ok(None);
        }

        eval_arithmetic(code)
            .map(|value| Some(Value::from(value)))
            .ok_or_else(|| InterpreterError::new("SyntaxError", format!("cannot evaluate: {code}")))
    }

    async fn complete(&mut self, code: &str, cursor_pos: usize) -> Vec<String> {
        let _ = (code, cursor_pos);
        Vec::new()
    }

    async fn inspect(&mut self, _code: &str, _cursor_pos: usize) -> Option<Value> {
        None
    }

    fn is_complete(&self, code: &str) -> bool {
        let opens = code.matches('(').count();
        let closes = code.matches(')').count();
        opens == closes
    }

    async fn comm_open(&mut self, _comm_id: &str, _target_name: &str, _data: Value) {}

    async fn comm_msg(&mut self, _comm_id: &str, _data: Value) {}

    async fn comm_close(&mut self, _comm_id: &str) {}
}

/// Emits an interrupt-acknowledgement pair of events for the "no interrupt
/// buffer, no cooperative hook" path, used directly by [`crate::Kernel`]
/// rather than going through the interpreter.
pub(crate) fn synthesize_keyboard_interrupt() -> (StreamData, InterpreterError) {
    (
        StreamData {
            name: "stderr".to_owned(),
            text: "KeyboardInterrupt: execution interrupted\n".to_owned(),
        },
        InterpreterError::new("KeyboardInterrupt", "execution interrupted"),
    )
}

fn eval_arithmetic(expr: &str) -> Option<i64> {
    let tokens = tokenize(expr)?;
    let mut pos = 0;
    let value = parse_expr(&tokens, &mut pos)?;
    if pos == tokens.len() {
        Some(value)
    } else {
        None
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Token {
    Num(i64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' => {
                chars.next();
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            '/' => {
                tokens.push(Token::Slash);
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(digits.parse().ok()?));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> Option<i64> {
    let mut value = parse_term(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Plus) => {
                *pos += 1;
                value += parse_term(tokens, pos)?;
            }
            Some(Token::Minus) => {
                *pos += 1;
                value -= parse_term(tokens, pos)?;
            }
            _ => break,
        }
    }
    Some(value)
}

fn parse_term(tokens: &[Token], pos: &mut usize) -> Option<i64> {
    let mut value = parse_factor(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Star) => {
                *pos += 1;
                value *= parse_factor(tokens, pos)?;
            }
            Some(Token::Slash) => {
                *pos += 1;
                let divisor = parse_factor(tokens, pos)?;
                if divisor == 0 {
                    return None;
                }
                value /= divisor;
            }
            _ => break,
        }
    }
    Some(value)
}

fn parse_factor(tokens: &[Token], pos: &mut usize) -> Option<i64> {
    match tokens.get(*pos) {
        Some(Token::Num(n)) => {
            *pos += 1;
            Some(*n)
        }
        Some(Token::Minus) => {
            *pos += 1;
            parse_factor(tokens, pos).map(|v| -v)
        }
        Some(Token::LParen) => {
            *pos += 1;
            let value = parse_expr(tokens, pos)?;
            if tokens.get(*pos) == Some(&Token::RParen) {
                *pos += 1;
                Some(value)
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_simple_arithmetic() {
        assert_eq!(eval_arithmetic("1+1"), Some(2));
        assert_eq!(eval_arithmetic("2 * (3 + 4)"), Some(14));
        assert_eq!(eval_arithmetic("10 / 2 - 1"), Some(4));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert_eq!(eval_arithmetic("1 +"), None);
        assert_eq!(eval_arithmetic("1 / 0"), None);
    }

    #[tokio::test]
    async fn second_concurrent_input_request_is_rejected() {
        let ctx = ExecutionContext::new(
            EventBus::new(10),
            Arc::new(tokio::sync::Mutex::new(None)),
            None,
            Arc::new(AtomicBool::new(false)),
            None,
        );

        let first_ctx = ctx.clone();
        let first = tokio::spawn(async move { first_ctx.request_input("first", false).await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let second = ctx.request_input("second", false).await;
        assert_eq!(second.unwrap_err().ename, "InputRequestInFlight");

        first.abort();
    }
}
