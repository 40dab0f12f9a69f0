//! The kernel itself: initialization, execution, interrupt, and comm
//! delegation over a boxed [`Interpreter`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use futures::Stream;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;

use agent_events::EventBus;
use agent_primitives::KernelId;

use crate::error::{Error, Result};
use crate::events::{ExecuteResult, KernelEvent, StreamData};
use crate::interpreter::{synthesize_keyboard_interrupt, EventTap, ExecutionContext, FilesystemMount, InitOptions, Interpreter};
use crate::state::{KernelState, KernelStateMachine, KernelTransition};

const KERNEL_EVENT_LISTENER_CAP: usize = 20;
const INTERRUPT_WAIT: Duration = Duration::from_millis(100);
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Options accepted by [`Kernel::initialize`].
#[derive(Clone, Debug, Default)]
pub struct KernelOptions {
    /// Declared interpreter language: `"python"`, `"typescript"`, or
    /// `"javascript"`. Carried through to the kernel so a host can observe
    /// what it created; the reference interpreter does not itself branch on
    /// it.
    pub lang: &'static str,
    /// Optional filesystem bind mount.
    pub filesystem: Option<FilesystemMount>,
    /// Environment variables to inject. Entries whose value is `None` are
    /// skipped with a warning rather than passed to the interpreter.
    pub env: HashMap<String, Option<String>>,
}

/// The outcome of [`Kernel::execute`].
#[derive(Clone, Debug)]
pub struct ExecuteOutcome {
    /// Whether the code ran to completion without error.
    pub success: bool,
    /// The rendered result, present only on a successful non-unit result.
    pub result: Option<ExecuteResult>,
    /// Structured error details, present only on failure.
    pub error: Option<crate::events::ExecuteError>,
}

/// An item yielded by [`Kernel::execute_stream`]: either an event published
/// during the call, or the terminal summary.
#[derive(Clone, Debug)]
pub enum StreamItem {
    /// An event published during the call, in publication order.
    Event(KernelEvent),
    /// The terminal `{success, result, error}` summary.
    Done(ExecuteOutcome),
}

struct KernelInner {
    state_machine: KernelStateMachine,
    interpreter: Box<dyn Interpreter>,
    execution_count: u64,
    open_comms: HashMap<String, String>,
    lang: Option<&'static str>,
}

/// A single kernel: an embedded interpreter wrapped in the initialization
/// state machine, streaming execution, input-request round trip, and
/// interrupt protocol described for this system.
///
/// Cloning a `Kernel` shares the same backing state (it is a thin `Arc`
/// handle); this lets [`Kernel::execute_stream`] move a copy into a spawned
/// task.
#[derive(Clone)]
pub struct Kernel {
    id: KernelId,
    inner: Arc<Mutex<KernelInner>>,
    events: EventBus<KernelEvent>,
    pending_input: Arc<Mutex<Option<oneshot::Sender<String>>>>,
    interrupt_buffer: Arc<StdRwLock<Option<Arc<AtomicU8>>>>,
    cooperative_interrupt: Arc<AtomicBool>,
}

impl Kernel {
    /// Creates a kernel wrapping `interpreter`, starting in
    /// [`KernelState::Uninit`].
    #[must_use]
    pub fn new(id: KernelId, interpreter: Box<dyn Interpreter>) -> Self {
        Self {
            id,
            inner: Arc::new(Mutex::new(KernelInner {
                state_machine: KernelStateMachine::new(id),
                interpreter,
                execution_count: 0,
                open_comms: HashMap::new(),
                lang: None,
            })),
            events: EventBus::new(KERNEL_EVENT_LISTENER_CAP),
            pending_input: Arc::new(Mutex::new(None)),
            interrupt_buffer: Arc::new(StdRwLock::new(None)),
            cooperative_interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns this kernel's id.
    #[must_use]
    pub const fn id(&self) -> KernelId {
        self.id
    }

    /// Returns the event bus subscribers can register against.
    #[must_use]
    pub fn events(&self) -> &EventBus<KernelEvent> {
        &self.events
    }

    /// Returns the current lifecycle state.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned by a prior panic.
    pub async fn state(&self) -> KernelState {
        self.inner.lock().await.state_machine.state()
    }

    /// Returns the monotonically increasing count of successful expression
    /// results.
    pub async fn execution_count(&self) -> u64 {
        self.inner.lock().await.execution_count
    }

    /// Returns the declared interpreter language passed to
    /// [`Kernel::initialize`], if the kernel has been initialized.
    pub async fn lang(&self) -> Option<&'static str> {
        self.inner.lock().await.lang
    }

    /// Idempotently initializes the kernel. Concurrent callers serialize on
    /// the same internal lock; once initialization has completed, further
    /// calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] if the underlying interpreter fails to
    /// initialize, and [`Error::State`] if called on a terminated kernel.
    pub async fn initialize(&self, options: KernelOptions) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.state_machine.state() == KernelState::Active {
            return Ok(());
        }

        inner.state_machine.transition(KernelTransition::BeginInit)?;
        inner.lang = Some(options.lang);

        let mut env = HashMap::new();
        for (key, value) in options.env {
            match value {
                Some(value) => {
                    env.insert(key, value);
                }
                None => tracing::warn!(%key, "skipping null/undefined environment value"),
            }
        }
        let init_options = InitOptions {
            filesystem: options.filesystem,
            env,
        };

        match inner.interpreter.initialize(&init_options).await {
            Ok(()) => {
                inner.state_machine.transition(KernelTransition::InitSucceeded)?;
                drop(inner);
                self.events.publish(KernelEvent::KernelReady);
                Ok(())
            }
            Err(err) => {
                inner.state_machine.transition(KernelTransition::InitFailed)?;
                Err(Error::Interpreter(err))
            }
        }
    }

    fn execution_context(&self, tap: Option<EventTap>) -> ExecutionContext {
        let buffer = self.interrupt_buffer.read().expect("interrupt buffer lock poisoned").clone();
        ExecutionContext::new(
            self.events.clone(),
            Arc::clone(&self.pending_input),
            buffer,
            Arc::clone(&self.cooperative_interrupt),
            tap,
        )
    }

    /// Runs `code` to completion, ensuring the kernel is initialized first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] only if implicit initialization
    /// fails; execution failures are reported in the returned
    /// [`ExecuteOutcome`], never as an `Err`.
    pub async fn execute(&self, code: &str, parent_header: Option<String>) -> Result<ExecuteOutcome> {
        self.ensure_initialized().await?;
        Ok(self.run_execute(code, parent_header, None).await)
    }

    /// Runs `code` to completion, yielding every event published during the
    /// call (in publication order) followed by the terminal summary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] only if implicit initialization
    /// fails, before the returned stream begins.
    pub async fn execute_stream(
        &self,
        code: impl Into<String>,
        parent_header: Option<String>,
    ) -> Result<impl Stream<Item = StreamItem> + Send + 'static> {
        self.ensure_initialized().await?;

        let code = code.into();
        let (out_tx, out_rx) = mpsc::unbounded_channel::<StreamItem>();
        let kernel = self.clone();

        let tap_tx = out_tx.clone();
        let tap: EventTap = Arc::new(move |event| {
            let _ = tap_tx.send(StreamItem::Event(event));
        });

        tokio::spawn(async move {
            let outcome = kernel.run_execute(&code, parent_header, Some(tap)).await;
            let _ = out_tx.send(StreamItem::Done(outcome));
        });

        Ok(UnboundedReceiverStream::new(out_rx))
    }

    async fn ensure_initialized(&self) -> Result<()> {
        let needs_init = {
            let inner = self.inner.lock().await;
            inner.state_machine.state() != KernelState::Active
        };
        if needs_init {
            self.initialize(KernelOptions::default()).await?;
        }
        Ok(())
    }

    async fn run_execute(&self, code: &str, parent_header: Option<String>, tap: Option<EventTap>) -> ExecuteOutcome {
        let mut inner = self.inner.lock().await;
        if let Err(err) = inner.state_machine.transition(KernelTransition::BeginExecute) {
            drop(inner);
            tracing::warn!(%err, "execute called while kernel was not active");
            return ExecuteOutcome {
                success: false,
                result: None,
                error: Some(crate::events::ExecuteError {
                    ename: "KernelBusy".to_owned(),
                    evalue: err.to_string(),
                    traceback: Vec::new(),
                }),
            };
        }

        inner.interpreter.setup(parent_header);

        let ctx = self.execution_context(tap);
        ctx.emit(KernelEvent::KernelBusy);

        let outcome = match inner.interpreter.run(code, &ctx).await {
            Ok(Some(value)) => {
                inner.execution_count += 1;
                let result = ExecuteResult {
                    execution_count: inner.execution_count,
                    data: [("text/plain".to_owned(), Value::String(render_text_plain(&value)))]
                        .into_iter()
                        .collect(),
                    metadata: HashMap::new(),
                };
                ctx.emit(KernelEvent::ExecuteResult(result.clone()));
                ExecuteOutcome {
                    success: true,
                    result: Some(result),
                    error: None,
                }
            }
            Ok(None) => ExecuteOutcome {
                success: true,
                result: None,
                error: None,
            },
            Err(err) => {
                if err.ename == "KeyboardInterrupt" {
                    ctx.emit(KernelEvent::Stream(StreamData {
                        name: "stderr".to_owned(),
                        text: format!("KeyboardInterrupt: {}\n", err.evalue),
                    }));
                }
                let execute_error = crate::events::ExecuteError {
                    ename: err.ename,
                    evalue: err.evalue,
                    traceback: err
                        .traceback
                        .unwrap_or_else(|| vec!["No traceback available".to_owned()]),
                };
                ctx.emit(KernelEvent::ExecuteError(execute_error.clone()));
                ExecuteOutcome {
                    success: false,
                    result: None,
                    error: Some(execute_error),
                }
            }
        };

        let _ = inner.state_machine.transition(KernelTransition::EndExecute);
        drop(inner);
        ctx.emit(KernelEvent::KernelIdle);
        outcome
    }

    /// Fulfills the most recent outstanding input request. A no-op if none
    /// is outstanding.
    pub async fn input_reply(&self, value: impl Into<String>) {
        let mut guard = self.pending_input.lock().await;
        if let Some(sender) = guard.take() {
            let _ = sender.send(value.into());
        }
    }

    /// Installs a single-byte shared-memory cell used to signal SIGINT to
    /// the interpreter.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_interrupt_buffer(&self, buffer: Arc<AtomicU8>) {
        *self
            .interrupt_buffer
            .write()
            .expect("interrupt buffer lock poisoned") = Some(buffer);
    }

    /// Requests cancellation of the currently running `execute`. Never
    /// blocks on the in-flight execution.
    ///
    /// Returns `true` once the interrupt has been acknowledged (or
    /// synthesized, in the no-buffer/no-cooperative-hook case).
    pub async fn interrupt(&self) -> bool {
        let buffer = self.interrupt_buffer.read().expect("interrupt buffer lock poisoned").clone();

        if let Some(buffer) = buffer {
            buffer.store(2, Ordering::SeqCst);
            let mut waited = Duration::ZERO;
            while waited < INTERRUPT_WAIT {
                if buffer.load(Ordering::SeqCst) == 0 {
                    return true;
                }
                tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
                waited += INTERRUPT_POLL_INTERVAL;
            }
            return buffer.load(Ordering::SeqCst) == 0;
        }

        if self.execution_in_flight() {
            // An `execute` call is running; it will observe this flag at its
            // next cooperative yield point and raise `KeyboardInterrupt`.
            self.cooperative_interrupt.store(true, Ordering::SeqCst);
            return true;
        }

        let (stream_event, error) = synthesize_keyboard_interrupt();
        self.events.publish(KernelEvent::Stream(stream_event));
        self.events.publish(KernelEvent::ExecuteError(crate::events::ExecuteError {
            ename: error.ename,
            evalue: error.evalue,
            traceback: error.traceback.unwrap_or_default(),
        }));
        self.events.publish(KernelEvent::ExecutionInterrupted);
        true
    }

    /// Returns `true` without blocking if an `execute` call currently holds
    /// the kernel's lock.
    fn execution_in_flight(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Returns completion candidates for `code` at `cursor_pos`.
    pub async fn complete(&self, code: &str, cursor_pos: usize, parent_header: Option<String>) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        inner.interpreter.setup(parent_header);
        inner.interpreter.complete(code, cursor_pos).await
    }

    /// Returns introspection data for `code` at `cursor_pos`, if available.
    pub async fn inspect(&self, code: &str, cursor_pos: usize, parent_header: Option<String>) -> Option<Value> {
        let mut inner = self.inner.lock().await;
        inner.interpreter.setup(parent_header);
        inner.interpreter.inspect(code, cursor_pos).await
    }

    /// Returns whether `code` is a syntactically complete unit.
    pub async fn is_complete(&self, code: &str) -> bool {
        self.inner.lock().await.interpreter.is_complete(code)
    }

    /// Opens a comm channel and records it for [`Kernel::comm_info`].
    pub async fn comm_open(&self, comm_id: impl Into<String>, target_name: impl Into<String>, data: Value, parent_header: Option<String>) {
        let comm_id = comm_id.into();
        let target_name = target_name.into();
        let mut inner = self.inner.lock().await;
        inner.interpreter.setup(parent_header);
        inner.interpreter.comm_open(&comm_id, &target_name, data).await;
        inner.open_comms.insert(comm_id.clone(), target_name.clone());
        drop(inner);
        self.events.publish(KernelEvent::CommOpen { comm_id, target_name });
    }

    /// Delivers a message on an open comm channel.
    pub async fn comm_msg(&self, comm_id: impl Into<String>, data: Value, parent_header: Option<String>) {
        let comm_id = comm_id.into();
        let mut inner = self.inner.lock().await;
        inner.interpreter.setup(parent_header);
        inner.interpreter.comm_msg(&comm_id, data.clone()).await;
        drop(inner);
        self.events.publish(KernelEvent::CommMsg { comm_id, data });
    }

    /// Closes a comm channel.
    pub async fn comm_close(&self, comm_id: impl Into<String>, parent_header: Option<String>) {
        let comm_id = comm_id.into();
        let mut inner = self.inner.lock().await;
        inner.interpreter.setup(parent_header);
        inner.interpreter.comm_close(&comm_id).await;
        inner.open_comms.remove(&comm_id);
        drop(inner);
        self.events.publish(KernelEvent::CommClose { comm_id });
    }

    /// Returns a snapshot of currently open comms, keyed by comm id.
    pub async fn comm_info(&self) -> HashMap<String, String> {
        self.inner.lock().await.open_comms.clone()
    }

    /// Marks the kernel terminated. Idempotent.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub async fn terminate(&self) {
        let mut inner = self.inner.lock().await;
        let _ = inner.state_machine.transition(KernelTransition::Destroy);
        drop(inner);
        self.events.publish(KernelEvent::KernelTerminated);
    }
}

fn render_text_plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt;

    use super::*;
    use crate::interpreter::ReferenceInterpreter;

    fn make_kernel() -> Kernel {
        Kernel::new(KernelId::random(), Box::new(ReferenceInterpreter::new()))
    }

    #[tokio::test]
    async fn executes_arithmetic_and_increments_execution_count() {
        let kernel = make_kernel();
        let outcome = kernel.execute("1+1", None).await.unwrap();

        assert!(outcome.success);
        let result = outcome.result.expect("arithmetic yields a result");
        assert_eq!(result.execution_count, 1);
        assert_eq!(result.data.get("text/plain").unwrap(), "2");
        assert_eq!(kernel.execution_count().await, 1);
        assert!(kernel.state().await.is_active());
    }

    #[tokio::test]
    async fn execute_stream_yields_events_in_order_then_done() {
        let kernel = make_kernel();
        let mut stream = Box::pin(kernel.execute_stream("1+1", None).await.unwrap());

        let mut saw_busy = false;
        let mut saw_result = false;
        let mut outcome = None;
        while let Some(item) = stream.next().await {
            match item {
                StreamItem::Event(KernelEvent::KernelBusy) => saw_busy = true,
                StreamItem::Event(KernelEvent::ExecuteResult(_)) => saw_result = true,
                StreamItem::Done(done) => {
                    outcome = Some(done);
                    break;
                }
                StreamItem::Event(_) => {}
            }
        }

        assert!(saw_busy, "expected a kernel_busy event before completion");
        assert!(saw_result, "expected an execute_result event before completion");
        let outcome = outcome.expect("stream ends with a Done item");
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn interrupt_with_no_execution_in_flight_synthesizes_keyboard_interrupt() {
        let kernel = make_kernel();
        kernel.initialize(KernelOptions::default()).await.unwrap();

        assert!(kernel.interrupt().await);
    }

    #[tokio::test]
    async fn input_round_trip_resolves_the_outstanding_request() {
        let kernel = make_kernel();
        let running = kernel.clone();
        let handle = tokio::spawn(async move { running.execute("input(\"name?\")", None).await.unwrap() });

        tokio::time::sleep(Duration::from_millis(10)).await;
        kernel.input_reply("Ada").await;

        let outcome = handle.await.unwrap();
        assert!(outcome.success);
        let result = outcome.result.expect("input() yields its reply as a result");
        assert_eq!(result.data.get("text/plain").unwrap(), "Ada");
    }

    #[tokio::test]
    async fn execute_after_terminate_reports_the_invalid_transition() {
        let kernel = make_kernel();
        kernel.initialize(KernelOptions::default()).await.unwrap();
        kernel.terminate().await;

        let result = kernel.execute("1+1", None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn raised_error_is_reported_without_incrementing_execution_count() {
        let kernel = make_kernel();
        let outcome = kernel.execute("raise boom", None).await.unwrap();

        assert!(!outcome.success);
        let error = outcome.error.expect("raise produces an execute error");
        assert_eq!(error.ename, "RuntimeError");
        assert_eq!(kernel.execution_count().await, 0);
    }
}
