//! The ambient per-test context.
//!
//! While the executor is running a test, a process-wide slot holds that
//! test's identity and output buffer. Hook bodies, test bodies, and the
//! matcher library reach it through [`current`] and [`write_line`]; the
//! single-test semaphore in the runner guarantees at most one context is
//! live at a time.

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::spy::{self, SpyRegistry};

static CURRENT: Lazy<RwLock<Option<Arc<CurrentTest>>>> = Lazy::new(|| RwLock::new(None));

/// A handle on the currently-executing test.
#[derive(Debug)]
pub struct CurrentTest {
    full_name: String,
    output: Mutex<String>,
}

impl CurrentTest {
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Appends a line to the test's output buffer.
    pub fn write_line(&self, line: &str) {
        let mut output = self.output.lock();
        output.push_str(line);
        output.push('\n');
    }

    /// A snapshot of everything written so far.
    pub fn output(&self) -> String {
        self.output.lock().clone()
    }
}

/// The running test's context, or `None` outside a test.
pub fn current() -> Option<Arc<CurrentTest>> {
    CURRENT.read().clone()
}

/// Appends a line to the running test's output buffer. A no-op when called
/// outside a test.
pub fn write_line(line: &str) {
    if let Some(test) = current() {
        test.write_line(line);
    }
}

/// The shared spy registry, reachable from test bodies without threading a
/// handle through the spec tree.
pub fn spies() -> &'static SpyRegistry {
    spy::registry()
}

pub(crate) fn enter(full_name: String) -> Arc<CurrentTest> {
    let test = Arc::new(CurrentTest {
        full_name,
        output: Mutex::new(String::new()),
    });
    *CURRENT.write() = Some(test.clone());
    test
}

pub(crate) fn exit() {
    *CURRENT.write() = None;
}
