//! Spec registration: the `describe` / `it` / hook DSL and the tree it
//! records.
//!
//! Building is purely structural — no hook or test body runs while the tree
//! is recorded. A thread-local stack tracks the currently-open describes;
//! each registration attaches to the innermost one.
//!
//! ```
//! use specter::spec::Spec;
//! use specter::expect::expect;
//!
//! let spec = Spec::build("calculator", |ctx| {
//!     ctx.describe("addition", |ctx| {
//!         ctx.before_each(|| { /* per-test setup */ });
//!
//!         ctx.it("adds two numbers", || {
//!             expect(2 + 3).to_equal(5);
//!         });
//!     });
//! });
//! assert_eq!(spec.name(), "calculator");
//! ```

use futures::FutureExt;
use futures::future::BoxFuture;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

/// A hook or test body: synchronous, or asynchronous and awaited by the
/// executor.
pub(crate) enum Body {
    Sync(Box<dyn Fn() + Send + Sync>),
    Async(Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>),
}

pub(crate) type Hook = Arc<Body>;

fn sync_hook(body: impl Fn() + Send + Sync + 'static) -> Hook {
    Arc::new(Body::Sync(Box::new(body)))
}

fn async_hook<F, Fut>(body: F) -> Hook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(Body::Async(Box::new(move || body().boxed())))
}

/// Focus/exclude marker on a describe or test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    None,
    Focused,
    Excluded,
}

pub(crate) struct DescribeNode {
    pub(crate) name: String,
    pub(crate) modifier: Modifier,
    pub(crate) before_each: Vec<Hook>,
    pub(crate) after_each: Vec<Hook>,
    pub(crate) before_all: Vec<Hook>,
    pub(crate) after_all: Vec<Hook>,
    pub(crate) children: Vec<SpecNode>,
}

impl DescribeNode {
    fn new(name: String, modifier: Modifier) -> Self {
        DescribeNode {
            name,
            modifier,
            before_each: Vec::new(),
            after_each: Vec::new(),
            before_all: Vec::new(),
            after_all: Vec::new(),
            children: Vec::new(),
        }
    }
}

pub(crate) struct TestNode {
    pub(crate) name: String,
    pub(crate) modifier: Modifier,
    pub(crate) body: Hook,
}

pub(crate) enum SpecNode {
    Describe(DescribeNode),
    Test(TestNode),
}

/// A fully-recorded spec tree, ready for compilation.
pub struct Spec {
    pub(crate) root: DescribeNode,
}

impl Spec {
    /// Records a spec tree. The builder closure registers describes, tests,
    /// and hooks through the [`Context`] handle; nothing it registers runs
    /// here.
    pub fn build(name: &str, body: impl FnOnce(Context)) -> Spec {
        BUILDER.with(|cell| {
            let mut slot = cell.borrow_mut();
            assert!(
                slot.is_none(),
                "Spec::build may not be nested inside another Spec::build"
            );
            *slot = Some(SpecBuilder {
                stack: vec![DescribeNode::new(name.to_string(), Modifier::None)],
            });
        });

        body(Context);

        let mut builder = BUILDER.with(|cell| {
            cell.borrow_mut()
                .take()
                .expect("spec builder missing after build")
        });
        assert_eq!(
            builder.stack.len(),
            1,
            "unbalanced describe nesting at end of Spec::build"
        );
        Spec {
            root: builder.stack.pop().expect("root describe frame"),
        }
    }

    pub fn name(&self) -> &str {
        &self.root.name
    }
}

/// A spec definition registered for link-time discovery.
///
/// ```
/// use specter::spec::{Context, SpecRegistration};
///
/// fn define(ctx: Context) {
///     ctx.it("is discovered", || {});
/// }
///
/// inventory::submit! {
///     SpecRegistration { name: "discovered spec", define }
/// }
/// # fn main() {}
/// ```
pub struct SpecRegistration {
    pub name: &'static str,
    pub define: fn(Context),
}

inventory::collect!(SpecRegistration);

thread_local! {
    static BUILDER: RefCell<Option<SpecBuilder>> = const { RefCell::new(None) };
}

struct SpecBuilder {
    stack: Vec<DescribeNode>,
}

impl SpecBuilder {
    fn current(&mut self) -> &mut DescribeNode {
        self.stack.last_mut().expect("builder stack is never empty")
    }
}

fn with_builder<R>(f: impl FnOnce(&mut SpecBuilder) -> R) -> R {
    BUILDER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let builder = slot
            .as_mut()
            .expect("spec registration used outside Spec::build");
        f(builder)
    })
}

/// The registration handle passed to spec construction bodies. `Copy`, so it
/// moves into nested closures without ceremony.
#[derive(Clone, Copy)]
pub struct Context;

impl Context {
    // ---- describes ----------------------------------------------------

    /// Opens a named group; registrations inside `body` attach to it.
    pub fn describe(&self, name: &str, body: impl FnOnce(Context)) {
        self.describe_impl(name, Modifier::None, body);
    }

    /// A focused describe: when any focus marker exists in a run, only
    /// focused tests execute.
    pub fn fdescribe(&self, name: &str, body: impl FnOnce(Context)) {
        self.describe_impl(name, Modifier::Focused, body);
    }

    /// An excluded describe: every test beneath it is skipped. Exclusion
    /// dominates focus.
    pub fn xdescribe(&self, name: &str, body: impl FnOnce(Context)) {
        self.describe_impl(name, Modifier::Excluded, body);
    }

    /// Alias for [`describe`](Self::describe).
    pub fn context(&self, name: &str, body: impl FnOnce(Context)) {
        self.describe(name, body);
    }

    fn describe_impl(&self, name: &str, modifier: Modifier, body: impl FnOnce(Context)) {
        with_builder(|b| {
            b.stack.push(DescribeNode::new(name.to_string(), modifier));
        });
        body(Context);
        with_builder(|b| {
            let node = b.stack.pop().expect("describe frame just pushed");
            b.current().children.push(SpecNode::Describe(node));
        });
    }

    // ---- tests --------------------------------------------------------

    pub fn it(&self, name: &str, body: impl Fn() + Send + Sync + 'static) {
        self.push_test(name, Modifier::None, sync_hook(body));
    }

    pub fn fit(&self, name: &str, body: impl Fn() + Send + Sync + 'static) {
        self.push_test(name, Modifier::Focused, sync_hook(body));
    }

    pub fn xit(&self, name: &str, body: impl Fn() + Send + Sync + 'static) {
        self.push_test(name, Modifier::Excluded, sync_hook(body));
    }

    /// Alias for [`it`](Self::it).
    pub fn specify(&self, name: &str, body: impl Fn() + Send + Sync + 'static) {
        self.it(name, body);
    }

    pub fn it_async<F, Fut>(&self, name: &str, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.push_test(name, Modifier::None, async_hook(body));
    }

    pub fn fit_async<F, Fut>(&self, name: &str, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.push_test(name, Modifier::Focused, async_hook(body));
    }

    pub fn xit_async<F, Fut>(&self, name: &str, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.push_test(name, Modifier::Excluded, async_hook(body));
    }

    fn push_test(&self, name: &str, modifier: Modifier, body: Hook) {
        with_builder(|b| {
            b.current().children.push(SpecNode::Test(TestNode {
                name: name.to_string(),
                modifier,
                body,
            }));
        });
    }

    // ---- hooks --------------------------------------------------------

    /// Runs before every test in this describe and its children.
    pub fn before_each(&self, hook: impl Fn() + Send + Sync + 'static) {
        with_builder(|b| b.current().before_each.push(sync_hook(hook)));
    }

    pub fn before_each_async<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        with_builder(|b| b.current().before_each.push(async_hook(hook)));
    }

    /// Runs after every test in this describe and its children.
    pub fn after_each(&self, hook: impl Fn() + Send + Sync + 'static) {
        with_builder(|b| b.current().after_each.push(sync_hook(hook)));
    }

    pub fn after_each_async<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        with_builder(|b| b.current().after_each.push(async_hook(hook)));
    }

    /// Runs once before the first executed test in this describe's block.
    pub fn before_all(&self, hook: impl Fn() + Send + Sync + 'static) {
        with_builder(|b| b.current().before_all.push(sync_hook(hook)));
    }

    pub fn before_all_async<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        with_builder(|b| b.current().before_all.push(async_hook(hook)));
    }

    /// Runs once after the last executed test in this describe's block.
    pub fn after_all(&self, hook: impl Fn() + Send + Sync + 'static) {
        with_builder(|b| b.current().after_all.push(sync_hook(hook)));
    }

    pub fn after_all_async<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        with_builder(|b| b.current().after_all.push(async_hook(hook)));
    }
}
