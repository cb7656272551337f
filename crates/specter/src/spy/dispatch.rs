//! The invocation dispatcher: the single entry point every intercepted call
//! funnels through.
//!
//! Whatever mechanism redirects a target call — a proxy closure from
//! [`intercepted`], a code-generation step, a link-time shim — must pass the
//! original method descriptor and the full argument list (receiver first for
//! instance methods) to [`Dispatcher::handle`] and honour its returned value
//! or error. Call-through for intercepted methods happens only here; going
//! around the dispatcher would lose the call log.

use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::trace;

use crate::error::SpyError;
use crate::spy::behaviour::BehaviourKind;
use crate::spy::method::{Method, MethodKind};
use crate::spy::registry::{SpyRegistry, registry};
use crate::spy::{ArgList, InstanceKey, RetValue, Spy};

static DISPATCHER: Lazy<Dispatcher> = Lazy::new(|| Dispatcher {
    registry: registry(),
});

pub struct Dispatcher {
    registry: &'static SpyRegistry,
}

impl Dispatcher {
    /// The dispatcher bound to the shared registry.
    pub fn global() -> &'static Dispatcher {
        &DISPATCHER
    }

    /// Routes one intercepted call.
    ///
    /// With no active spy the original implementation runs; a panic inside it
    /// unwinds untouched, so the inner failure surfaces without a wrapper.
    /// With a spy, the arguments are logged and the front behaviour decides
    /// the result.
    pub fn handle(&self, method: &Arc<Method>, args: ArgList) -> Result<RetValue, SpyError> {
        let instance = match method.kind() {
            MethodKind::Free => InstanceKey::Static,
            MethodKind::Instance => {
                let receiver = args.first().ok_or_else(|| SpyError::NullReceiver {
                    method: method.name().to_string(),
                })?;
                InstanceKey::of(receiver)
            }
        };

        match self.registry.get(method, instance) {
            None => {
                trace!(method = method.name(), "no spy, calling through");
                self.call_original(method, &args)
            }
            Some(spy) => {
                trace!(
                    method = method.name(),
                    call = spy.call_count() + 1,
                    "dispatching to spy"
                );
                spy.record_call(&args);
                let kind =
                    spy.take_next_behaviour()
                        .ok_or_else(|| SpyError::UnexpectedCall {
                            method: method.name().to_string(),
                        })?;
                self.run_behaviour(&spy, method, kind, &args)
            }
        }
    }

    fn call_original(&self, method: &Arc<Method>, args: &ArgList) -> Result<RetValue, SpyError> {
        match method.original() {
            Some(original) => Ok(original(args)),
            None => Err(SpyError::Internal(format!(
                "original implementation of `{}` cannot be resolved",
                method.name()
            ))),
        }
    }

    fn run_behaviour(
        &self,
        spy: &Arc<Spy>,
        method: &Arc<Method>,
        kind: BehaviourKind,
        args: &ArgList,
    ) -> Result<RetValue, SpyError> {
        match kind {
            BehaviourKind::CallThrough => self.call_original(method, args),
            BehaviourKind::Returns(produce) => Ok(produce()),
            BehaviourKind::Throws(error) => Err(SpyError::Thrown(error)),
            BehaviourKind::InvokeFake(fake) => Ok(fake(args)),
            BehaviourKind::Default => Ok(spy.method().default_return()),
        }
    }
}

/// Closes a method descriptor into a plain callable routed through the
/// dispatcher — the in-process rendition of an interception hook. Dispatch
/// errors unwind with the [`SpyError`] as payload, failing the surrounding
/// test.
pub fn intercepted(method: &Arc<Method>) -> impl Fn(ArgList) -> RetValue + Send + Sync + 'static {
    let method = method.clone();
    move |args| match Dispatcher::global().handle(&method, args) {
        Ok(value) => value,
        Err(error) => error.raise(),
    }
}
