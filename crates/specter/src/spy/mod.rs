//! The spy subsystem: observable stand-ins for named functions and methods.
//!
//! A [`Spy`] is installed over a [`Method`] through the process-wide
//! [`SpyRegistry`]. Every intercepted call funnels through the
//! [`Dispatcher`], which records the arguments in the spy's call log and
//! consumes the front of its behaviour queue to decide what the call does:
//! return a fixed value, throw, call through to the original, invoke a fake,
//! or produce the result type's default.
//!
//! ```
//! use specter::spy::{Method, arg, intercepted, registry};
//!
//! let double = Method::free::<i32>("double")
//!     .call_through(|args| {
//!         let n = args[0].downcast_ref::<i32>().copied().unwrap_or(0);
//!         Box::new(n * 2)
//!     })
//!     .build();
//! let call = intercepted(&double);
//!
//! let spy = registry().install(&double, specter::spy::InstanceKey::Static);
//! spy.and().returns(99i32);
//!
//! assert_eq!(call(vec![arg(5i32)]).downcast_ref::<i32>(), Some(&99));
//! assert_eq!(spy.call_count(), 1);
//! # registry().clear_all();
//! ```

mod behaviour;
pub mod dispatch;
mod method;
mod registry;

pub use behaviour::Lifetime;
pub use dispatch::{Dispatcher, intercepted};
pub use method::{CallThroughFn, Method, MethodBuilder, MethodId, MethodKind};
pub use registry::{SpyRegistry, registry};

use parking_lot::Mutex;
use std::any::{Any, type_name};
use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::error::SpyError;
use behaviour::{Behaviour, BehaviourKind};

/// A single argument as it travels through the dispatcher.
pub type Arg = Arc<dyn Any + Send + Sync>;

/// The full argument list of an intercepted call. For instance methods the
/// receiver is the first element.
pub type ArgList = Vec<Arg>;

/// A value coming back out of the dispatcher.
pub type RetValue = Box<dyn Any + Send>;

/// Boxes a value into dispatcher argument form.
pub fn arg<T: Any + Send + Sync>(value: T) -> Arg {
    Arc::new(value)
}

/// Identifies the receiver a spy is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceKey {
    /// The sentinel for static and free functions.
    Static,
    /// A specific receiver, identified by its allocation address.
    Object(usize),
}

impl InstanceKey {
    /// The key of a shared receiver. Stable for the lifetime of the `Arc`'s
    /// allocation, and equal across clones of the same `Arc`.
    pub fn of<T: ?Sized>(receiver: &Arc<T>) -> InstanceKey {
        InstanceKey::Object(Arc::as_ptr(receiver) as *const u8 as usize)
    }
}

/// One logged invocation: an immutable copy of the argument list.
#[derive(Clone)]
pub struct CallRecord {
    args: ArgList,
}

impl CallRecord {
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Downcasts the argument at `index`, if present and of type `T`.
    pub fn arg<T: Any>(&self, index: usize) -> Option<&T> {
        self.args.get(index).and_then(|a| a.downcast_ref::<T>())
    }
}

impl fmt::Debug for CallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallRecord")
            .field("args", &self.args.len())
            .finish()
    }
}

struct SpyState {
    calls: Vec<CallRecord>,
    behaviours: VecDeque<Behaviour>,
    /// Still carrying only the seeded `Default` behaviour; the first explicit
    /// configuration replaces it.
    pristine: bool,
}

/// An observable stand-in installed over one `(method, instance)` pair.
pub struct Spy {
    method: Arc<Method>,
    instance: InstanceKey,
    state: Mutex<SpyState>,
}

impl fmt::Debug for Spy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spy")
            .field("method", &self.method.name())
            .field("instance", &self.instance)
            .field("calls", &self.call_count())
            .finish()
    }
}

impl Spy {
    /// A fresh spy holds a single infinite `Default` behaviour, so its queue
    /// is never empty until a finite configuration exhausts it.
    pub(crate) fn new(method: Arc<Method>, instance: InstanceKey) -> Arc<Spy> {
        let mut behaviours = VecDeque::new();
        behaviours.push_back(Behaviour::new(BehaviourKind::Default, Lifetime::Infinite));
        Arc::new(Spy {
            method,
            instance,
            state: Mutex::new(SpyState {
                calls: Vec::new(),
                behaviours,
                pristine: true,
            }),
        })
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    pub fn instance(&self) -> InstanceKey {
        self.instance
    }

    pub(crate) fn method(&self) -> &Arc<Method> {
        &self.method
    }

    /// An immutable snapshot of the call log.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Starts a behaviour configuration: `spy.and().returns(42)`,
    /// `spy.and().times(3).calls_through()`, and so on.
    pub fn and(&self) -> BehaviourChain<'_> {
        BehaviourChain {
            spy: self,
            lifetime: None,
        }
    }

    pub(crate) fn record_call(&self, args: &ArgList) {
        self.state.lock().calls.push(CallRecord { args: args.clone() });
    }

    /// Takes the front behaviour for one call, dequeuing it if exhausted.
    /// Consumption happens under the lock, before the behaviour body runs,
    /// so reentrant and self-recursive dispatches each observe exactly one
    /// consumption.
    pub(crate) fn take_next_behaviour(&self) -> Option<BehaviourKind> {
        let mut state = self.state.lock();
        let front = state.behaviours.front_mut()?;
        let kind = front.kind.clone();
        if front.consume() {
            state.behaviours.pop_front();
        }
        Some(kind)
    }

    fn enqueue(&self, kind: BehaviourKind, lifetime: Lifetime) {
        let mut state = self.state.lock();
        if state.pristine {
            state.behaviours.clear();
            state.pristine = false;
        }
        state.behaviours.push_back(Behaviour::new(kind, lifetime));
    }
}

/// Fluent behaviour configuration, appended to the spy's queue on the
/// terminal call. Terminals return the spy so configurations chain:
/// `spy.and().times(2).returns(42).and().returns(7)`.
pub struct BehaviourChain<'a> {
    spy: &'a Spy,
    lifetime: Option<Lifetime>,
}

impl<'a> BehaviourChain<'a> {
    /// Overrides the behaviour's lifetime (how many calls it serves).
    pub fn times(mut self, calls: u32) -> Self {
        self.lifetime = Some(Lifetime::Finite(calls.max(1)));
        self
    }

    /// The next call(s) return `value` without invoking the original. The
    /// value's type is checked against the method's declared result type;
    /// a mismatch fails the configuring test.
    pub fn returns<T: Any + Clone + Send + Sync>(self, value: T) -> &'a Spy {
        if let Err(error) = self
            .spy
            .method
            .check_return_type(std::any::TypeId::of::<T>(), type_name::<T>())
        {
            error.raise();
        }
        let produce: behaviour::ValueProducer = Arc::new(move || Box::new(value.clone()));
        self.finish(BehaviourKind::Returns(produce), Lifetime::once())
    }

    /// The next call(s) raise `error`.
    pub fn throws<E: StdError + Send + Sync + 'static>(self, error: E) -> &'a Spy {
        self.finish(BehaviourKind::Throws(Arc::new(error)), Lifetime::once())
    }

    /// The next call(s) invoke `fake` with the intercepted arguments; its
    /// return value (or panic) becomes the call's result.
    pub fn calls_fake(
        self,
        fake: impl Fn(&ArgList) -> RetValue + Send + Sync + 'static,
    ) -> &'a Spy {
        self.finish(BehaviourKind::InvokeFake(Arc::new(fake)), Lifetime::once())
    }

    /// The next call(s) invoke the original implementation.
    pub fn calls_through(self) -> &'a Spy {
        self.finish(BehaviourKind::CallThrough, Lifetime::once())
    }

    /// Calls return the declared result type's default value. Infinite
    /// lifetime unless overridden with [`times`](Self::times).
    pub fn returns_default(self) -> &'a Spy {
        self.finish(BehaviourKind::Default, Lifetime::Infinite)
    }

    fn finish(self, kind: BehaviourKind, default_lifetime: Lifetime) -> &'a Spy {
        let lifetime = self.lifetime.unwrap_or(default_lifetime);
        self.spy.enqueue(kind, lifetime);
        self.spy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spy_on_i32(name: &str) -> Arc<Spy> {
        Spy::new(Method::free::<i32>(name).build(), InstanceKey::Static)
    }

    #[test]
    fn fresh_spy_serves_the_default_behaviour_forever() {
        let spy = spy_on_i32("fresh");
        for _ in 0..5 {
            assert!(matches!(
                spy.take_next_behaviour(),
                Some(BehaviourKind::Default)
            ));
        }
    }

    #[test]
    fn first_configuration_replaces_the_seeded_default() {
        let spy = spy_on_i32("configured");
        spy.and().returns(1i32);
        assert!(matches!(
            spy.take_next_behaviour(),
            Some(BehaviourKind::Returns(_))
        ));
        assert!(spy.take_next_behaviour().is_none());
    }

    #[test]
    fn behaviours_are_consumed_in_fifo_order_respecting_lifetimes() {
        let spy = spy_on_i32("fifo");
        spy.and().times(2).calls_through().and().returns(9i32);
        assert!(matches!(
            spy.take_next_behaviour(),
            Some(BehaviourKind::CallThrough)
        ));
        assert!(matches!(
            spy.take_next_behaviour(),
            Some(BehaviourKind::CallThrough)
        ));
        assert!(matches!(
            spy.take_next_behaviour(),
            Some(BehaviourKind::Returns(_))
        ));
        assert!(spy.take_next_behaviour().is_none());
    }

    #[test]
    fn returns_rejects_a_value_of_the_wrong_type() {
        let spy = spy_on_i32("typed");
        let panic = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            spy.and().returns("not an i32");
        }))
        .unwrap_err();
        let error = panic.downcast_ref::<SpyError>().expect("typed payload");
        assert!(matches!(error, SpyError::ReturnTypeMismatch { .. }));
    }

    #[test]
    fn call_log_snapshots_are_immutable_copies() {
        let spy = spy_on_i32("logged");
        spy.record_call(&vec![arg(1i32), arg("x")]);
        let snapshot = spy.calls();
        spy.record_call(&vec![arg(2i32)]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].arg::<i32>(0), Some(&1));
        assert_eq!(snapshot[0].arg::<&str>(1), Some(&"x"));
        assert_eq!(spy.call_count(), 2);
    }

    #[test]
    fn instance_keys_follow_the_allocation_not_the_clone() {
        let first: Arc<String> = Arc::new("receiver".to_string());
        let second = first.clone();
        let other: Arc<String> = Arc::new("receiver".to_string());
        assert_eq!(InstanceKey::of(&first), InstanceKey::of(&second));
        assert_ne!(InstanceKey::of(&first), InstanceKey::of(&other));
    }
}
