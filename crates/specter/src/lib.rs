//! A Jasmine-inspired spec framework: nested suites with stackable hooks,
//! and spies that intercept named functions.
//!
//! Specter has two cores. The **spec engine** records a tree of describes,
//! tests, and hooks, flattens it into an ordered test list, and executes
//! that list sequentially with the exact setup/teardown cascade each test's
//! lexical position implies. The **spy subsystem** installs observable
//! stand-ins over named functions: every intercepted call is logged, and a
//! FIFO queue of behaviours decides whether it returns a fixed value,
//! throws, calls through to the original, runs a fake, or yields the result
//! type's default.
//!
//! # Hook execution order
//!
//! For the single test in this tree:
//!
//! ```text
//! outer::before_all        (once per describe block)
//!   outer::before_each
//!     inner::before_each
//!       TEST
//!     inner::after_each
//!   outer::after_each
//! outer::after_all         (once, after the block's last test)
//! ```
//!
//! A hook registered earlier runs earlier in setup and later in teardown;
//! inner describes fully nest within outer ones.
//!
//! # Quick start
//!
//! ```
//! use specter::prelude::*;
//!
//! let spec = Spec::build("arithmetic", |ctx| {
//!     ctx.it("adds two numbers", || {
//!         expect(2 + 2).to_equal(4);
//!     });
//!
//!     ctx.describe("multiplication", |ctx| {
//!         ctx.it("multiplies two numbers", || {
//!             expect(3 * 7).to_equal(21);
//!         });
//!     });
//! });
//!
//! let run = TestRun::from_specs(&[spec], &RunConfig::default());
//! assert_eq!(run.tests().len(), 2);
//! ```
//!
//! Executing is asynchronous; bodies registered with the `_async` variants
//! are awaited in place:
//!
//! ```no_run
//! # use specter::prelude::*;
//! # async fn demo(run: TestRun) {
//! let results = match run.execute().await {
//!     Ok(results) => results,
//!     Err(error) => panic!("{error}"),
//! };
//! # }
//! ```
//!
//! # Focus and exclusion
//!
//! `fit` / `fdescribe` focus a test or a whole group: when any focus marker
//! exists in a run, every non-focused test is skipped. `xit` / `xdescribe`
//! exclude; exclusion dominates focus.
//!
//! # Spies
//!
//! ```
//! use specter::prelude::*;
//!
//! let fetch = Method::free::<i32>("fetch")
//!     .call_through(|_args| Box::new(100i32))
//!     .build();
//! let call = intercepted(&fetch);
//!
//! let spy = registry().install(&fetch, InstanceKey::Static);
//! spy.and().times(2).returns(42i32).and().calls_through();
//!
//! assert_eq!(call(vec![]).downcast_ref::<i32>(), Some(&42));
//! assert_eq!(call(vec![]).downcast_ref::<i32>(), Some(&42));
//! assert_eq!(call(vec![]).downcast_ref::<i32>(), Some(&100));
//! assert_eq!(spy.call_count(), 3);
//! # registry().clear_all();
//! ```
//!
//! The executor clears the registry between tests, so spies installed by a
//! hook or a test body never leak into the next test.
//!
//! # Discovery
//!
//! Specs registered through [`spec::SpecRegistration`] are collected at
//! link time; [`runner::run_registered`] builds, reports, and executes all
//! of them.

pub mod compile;
pub mod config;
pub mod context;
pub mod error;
pub mod expect;
pub mod report;
pub mod runner;
pub mod spec;
pub mod spy;
pub mod types;

pub use config::RunConfig;
pub use error::{ExpectationError, RunError, SpyError};
pub use expect::expect;
pub use runner::{CancelHandle, TestRun, discover, run_registered};
pub use spec::{Context, Modifier, Spec, SpecRegistration};
pub use types::{RunSummary, SkipReason, TestFailure, TestOutcome, TestResult};

/// Convenience re-export of the surface most specs touch.
///
/// ```
/// use specter::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::RunConfig;
    pub use crate::expect::expect;
    pub use crate::runner::TestRun;
    pub use crate::spec::{Context, Spec, SpecRegistration};
    pub use crate::spy::{InstanceKey, Method, MethodKind, arg, intercepted, registry};
    pub use crate::types::{SkipReason, TestOutcome, TestResult};
}
