//! Behaviour variants and their lifetimes.
//!
//! A spy's queue holds behaviours in FIFO order; each is consumed by the
//! dispatcher one call at a time until its lifetime runs out.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::spy::{ArgList, RetValue};

/// Produces the configured return value, once per call it serves.
pub(crate) type ValueProducer = Arc<dyn Fn() -> RetValue + Send + Sync>;

/// A user-supplied substitute invoked in place of the original.
pub(crate) type FakeFn = Arc<dyn Fn(&ArgList) -> RetValue + Send + Sync>;

#[derive(Clone)]
pub(crate) enum BehaviourKind {
    CallThrough,
    Returns(ValueProducer),
    Throws(Arc<dyn StdError + Send + Sync>),
    InvokeFake(FakeFn),
    Default,
}

impl fmt::Debug for BehaviourKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BehaviourKind::CallThrough => "CallThrough",
            BehaviourKind::Returns(_) => "Returns",
            BehaviourKind::Throws(_) => "Throws",
            BehaviourKind::InvokeFake(_) => "InvokeFake",
            BehaviourKind::Default => "Default",
        };
        f.write_str(name)
    }
}

/// How many calls a behaviour serves before it is dequeued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Finite(u32),
    Infinite,
}

impl Lifetime {
    pub(crate) fn once() -> Self {
        Lifetime::Finite(1)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Behaviour {
    pub(crate) kind: BehaviourKind,
    pub(crate) lifetime: Lifetime,
}

impl Behaviour {
    pub(crate) fn new(kind: BehaviourKind, lifetime: Lifetime) -> Self {
        Behaviour { kind, lifetime }
    }

    /// Accounts for one served call; true once the behaviour is exhausted.
    pub(crate) fn consume(&mut self) -> bool {
        match &mut self.lifetime {
            Lifetime::Infinite => false,
            Lifetime::Finite(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_lifetime_exhausts_after_n_calls() {
        let mut behaviour = Behaviour::new(BehaviourKind::Default, Lifetime::Finite(2));
        assert!(!behaviour.consume());
        assert!(behaviour.consume());
    }

    #[test]
    fn infinite_lifetime_never_exhausts() {
        let mut behaviour = Behaviour::new(BehaviourKind::Default, Lifetime::Infinite);
        for _ in 0..1000 {
            assert!(!behaviour.consume());
        }
    }
}
