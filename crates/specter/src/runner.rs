//! The test executor.
//!
//! Runs a compiled test list sequentially, establishing the per-test context
//! around each test, playing the hook cascades, capturing panics from sync
//! and async bodies alike, and emitting per-test and end-of-run events.
//!
//! Teardown policy: a failure in a `before_each` hook or in the test body
//! skips the remaining befores and the body, but the entire `after_each`
//! cascade still runs. The first failure wins; an after-hook failure is
//! recorded only when nothing failed earlier.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, trace};

use crate::compile::{self, CompiledTest, Scope};
use crate::config::RunConfig;
use crate::context;
use crate::error::{ExpectationError, RunError, SpyError};
use crate::report;
use crate::spec::{Body, Spec, SpecRegistration};
use crate::spy;
use crate::types::{RunSummary, SkipReason, TestFailure, TestOutcome, TestResult};

/// At most one test owns the ambient context and spy registry at a time;
/// concurrent runs serialise here.
static SINGLE_TEST: Lazy<Semaphore> = Lazy::new(|| Semaphore::new(1));

type TestListener = Box<dyn Fn(&TestResult) + Send + Sync>;
type RunListener = Box<dyn Fn(&[TestResult]) + Send + Sync>;

/// Requests cancellation of a run. Checked between tests only; the
/// in-flight test always completes.
#[derive(Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An ordered, immutable test list plus the state of its execution.
pub struct TestRun {
    tests: Vec<CompiledTest>,
    cancel: Arc<AtomicBool>,
    executing: AtomicBool,
    test_listeners: Mutex<Vec<TestListener>>,
    run_listeners: Mutex<Vec<RunListener>>,
}

impl TestRun {
    pub fn new(tests: Vec<CompiledTest>) -> Self {
        TestRun {
            tests,
            cancel: Arc::new(AtomicBool::new(false)),
            executing: AtomicBool::new(false),
            test_listeners: Mutex::new(Vec::new()),
            run_listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn from_specs(specs: &[Spec], config: &RunConfig) -> Self {
        TestRun::new(compile::compile(specs, config))
    }

    pub fn tests(&self) -> &[CompiledTest] {
        &self.tests
    }

    /// Registers a completed-per-test listener. Listener panics are
    /// swallowed.
    pub fn on_test_completed(&self, listener: impl Fn(&TestResult) + Send + Sync + 'static) {
        self.test_listeners.lock().push(Box::new(listener));
    }

    /// Registers a completed-run listener, invoked once with every result
    /// after the last per-test event.
    pub fn on_run_completed(&self, listener: impl Fn(&[TestResult]) + Send + Sync + 'static) {
        self.run_listeners.lock().push(Box::new(listener));
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancel.clone())
    }

    /// Executes the list in order and resolves to the accumulated results.
    ///
    /// Fails with [`RunError::AlreadyRunning`] while a previous execution of
    /// this run is still in progress; a completed run may be executed again.
    pub async fn execute(&self) -> Result<Vec<TestResult>, RunError> {
        if self.executing.swap(true, Ordering::SeqCst) {
            return Err(RunError::AlreadyRunning);
        }
        let _guard = ExecutingGuard(&self.executing);
        self.cancel.store(false, Ordering::SeqCst);

        let any_focused = self.tests.iter().any(|t| t.is_focused);
        debug!(tests = self.tests.len(), any_focused, "run starting");

        let mut results = Vec::with_capacity(self.tests.len());
        let mut active_scopes: Vec<Arc<Scope>> = Vec::new();

        for test in &self.tests {
            if self.cancel.load(Ordering::SeqCst) {
                debug!(completed = results.len(), "cancellation requested");
                break;
            }

            let permit = SINGLE_TEST
                .acquire()
                .await
                .expect("single-test semaphore never closes");
            let handle = context::enter(test.full_name.clone());

            let result = if test.is_excluded {
                skipped(test, SkipReason::Excluded)
            } else if any_focused && !test.is_focused {
                skipped(test, SkipReason::NotFocused)
            } else {
                run_test(test, &mut active_scopes, &handle).await
            };

            spy::registry().clear_all();
            context::exit();
            drop(permit);

            self.emit_test(&result);
            results.push(result);
        }

        unwind_scopes(&mut active_scopes).await;
        self.emit_run(&results);
        debug!(results = results.len(), "run finished");
        Ok(results)
    }

    fn emit_test(&self, result: &TestResult) {
        for listener in self.test_listeners.lock().iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(result))).is_err() {
                error!(test = %result.full_name, "per-test listener panicked");
            }
        }
    }

    fn emit_run(&self, results: &[TestResult]) {
        for listener in self.run_listeners.lock().iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(results))).is_err() {
                error!("run-completed listener panicked");
            }
        }
    }
}

struct ExecutingGuard<'a>(&'a AtomicBool);

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn skipped(test: &CompiledTest, reason: SkipReason) -> TestResult {
    trace!(test = %test.full_name, reason = reason.as_str(), "skipped");
    TestResult {
        full_name: test.full_name.clone(),
        outcome: TestOutcome::Skipped(reason),
        output: String::new(),
        duration: Duration::ZERO,
    }
}

async fn run_test(
    test: &CompiledTest,
    active_scopes: &mut Vec<Arc<Scope>>,
    handle: &Arc<context::CurrentTest>,
) -> TestResult {
    trace!(test = %test.full_name, "starting");
    let start = Instant::now();

    let mut failure = sync_scopes(active_scopes, &test.scopes).await;

    if failure.is_none() {
        for hook in &test.before_cascade {
            if let Err(payload) = play(hook).await {
                failure = Some(failure_from_panic(payload));
                break;
            }
        }
    }

    if failure.is_none()
        && let Err(payload) = play(&test.body).await
    {
        failure = Some(failure_from_panic(payload));
    }

    for hook in &test.after_cascade {
        if let Err(payload) = play(hook).await
            && failure.is_none()
        {
            failure = Some(failure_from_panic(payload));
        }
    }

    let duration = start.elapsed();
    let outcome = match failure {
        None => {
            handle.write_line("Test completed successfully.");
            TestOutcome::Passed
        }
        Some(failure) => {
            handle.write_line(&failure.message);
            TestOutcome::Failed(failure)
        }
    };

    TestResult {
        full_name: test.full_name.clone(),
        outcome,
        output: handle.output(),
        duration,
    }
}

/// Leaves scopes the next test no longer shares (innermost-first
/// `after_all`), then enters the new ones (outermost-first `before_all`).
/// A scope hook failure is attributed to the test that triggered the
/// transition; deeper scopes are not entered after a failure.
async fn sync_scopes(
    active: &mut Vec<Arc<Scope>>,
    target: &[Arc<Scope>],
) -> Option<TestFailure> {
    let shared = active
        .iter()
        .zip(target)
        .take_while(|(a, b)| Arc::ptr_eq(a, b))
        .count();

    let mut failure = None;

    while active.len() > shared {
        let scope = active.pop().expect("active scopes above the shared prefix");
        for hook in &scope.after_all {
            if let Err(payload) = play(hook).await
                && failure.is_none()
            {
                failure = Some(failure_from_panic(payload));
            }
        }
    }

    for scope in &target[shared..] {
        if failure.is_some() {
            break;
        }
        active.push(scope.clone());
        for hook in &scope.before_all {
            if let Err(payload) = play(hook).await {
                failure = Some(failure_from_panic(payload));
                break;
            }
        }
    }

    failure
}

/// Runs `after_all` for every still-active scope at end of run or
/// cancellation. Failures here have no test to fail, so they are logged and
/// swallowed.
async fn unwind_scopes(active: &mut Vec<Arc<Scope>>) {
    while let Some(scope) = active.pop() {
        for hook in &scope.after_all {
            if let Err(payload) = play(hook).await {
                let failure = failure_from_panic(payload);
                error!(message = %failure.message, "after_all hook failed during teardown");
            }
        }
    }
}

async fn play(body: &Body) -> Result<(), Box<dyn Any + Send>> {
    match body {
        Body::Sync(f) => panic::catch_unwind(AssertUnwindSafe(|| f())),
        Body::Async(f) => catch_unwind_future(f()).await,
    }
}

/// Like `std::panic::catch_unwind` but for futures: wraps each `poll` call
/// in `catch_unwind` so panics inside awaited bodies are caught without
/// requiring the future itself to be `UnwindSafe`.
async fn catch_unwind_future<F: Future>(f: F) -> Result<F::Output, Box<dyn Any + Send>> {
    let mut f = Box::pin(f);
    std::future::poll_fn(move |cx| {
        match panic::catch_unwind(AssertUnwindSafe(|| f.as_mut().poll(cx))) {
            Ok(Poll::Ready(value)) => Poll::Ready(Ok(value)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(payload)),
        }
    })
    .await
}

/// Unwraps a panic payload to the innermost message, keeping the full cause
/// chain when the payload carried one.
fn failure_from_panic(payload: Box<dyn Any + Send>) -> TestFailure {
    if let Some(expectation) = payload.downcast_ref::<ExpectationError>() {
        TestFailure {
            message: expectation.message.clone(),
            detail: None,
        }
    } else if let Some(spy_error) = payload.downcast_ref::<SpyError>() {
        let chain = spy_error.chain();
        TestFailure {
            message: spy_error.to_string(),
            detail: (chain.len() > 1).then(|| chain.join("\ncaused by: ")),
        }
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        TestFailure {
            message: message.to_string(),
            detail: None,
        }
    } else if let Some(message) = payload.downcast_ref::<String>() {
        TestFailure {
            message: message.clone(),
            detail: None,
        }
    } else {
        TestFailure {
            message: "test panicked".to_string(),
            detail: None,
        }
    }
}

/// Builds a [`TestRun`] from every [`SpecRegistration`] in the binary,
/// name-sorted for a stable order, using environment configuration.
pub fn discover() -> TestRun {
    discover_with(&RunConfig::from_env())
}

pub fn discover_with(config: &RunConfig) -> TestRun {
    let mut registrations: Vec<&SpecRegistration> =
        inventory::iter::<SpecRegistration>.into_iter().collect();
    registrations.sort_by_key(|reg| reg.name);

    let specs: Vec<Spec> = registrations
        .iter()
        .map(|reg| Spec::build(reg.name, |ctx| (reg.define)(ctx)))
        .collect();
    TestRun::from_specs(&specs, config)
}

/// Discovers, reports, and executes every registered spec: the whole-binary
/// entry point.
pub async fn run_registered() -> RunSummary {
    let config = RunConfig::from_env();
    let run = discover_with(&config);
    report::print_header(run.tests().len(), &config);
    report::install(&run, &config);

    let start = Instant::now();
    let results = run
        .execute()
        .await
        .expect("a freshly-built run cannot already be executing");
    let summary = RunSummary {
        results,
        total_duration: start.elapsed(),
    };
    report::print_summary(&summary, &config);
    summary
}
