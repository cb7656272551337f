//! Method descriptors and root-definition identity.
//!
//! Every spiable target is described by a [`Method`]: a stable id, the
//! declared result type, a factory for that type's default value, and the
//! original implementation for call-through. Specialised descriptors (a
//! generic instantiation or a virtual override) share their root's id, and
//! every registry operation canonicalises through the root, so one spy covers
//! a method however it is reached.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SpyError;
use crate::spy::{ArgList, RetValue};

/// A stable key uniquely naming a target callable across the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(u64);

static NEXT_METHOD_ID: AtomicU64 = AtomicU64::new(1);

impl MethodId {
    fn next() -> Self {
        MethodId(NEXT_METHOD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// A static or free function. Dispatch uses the static instance sentinel.
    Free,
    /// An instance-bound method. The receiver travels as the first argument.
    Instance,
}

/// The original implementation of a method, invoked on call-through.
pub type CallThroughFn = Arc<dyn Fn(&ArgList) -> RetValue + Send + Sync>;

type DefaultFn = Arc<dyn Fn() -> RetValue + Send + Sync>;

pub struct Method {
    id: MethodId,
    name: String,
    kind: MethodKind,
    return_type: TypeId,
    return_type_name: &'static str,
    default_return: DefaultFn,
    original: Option<CallThroughFn>,
    root: Option<Arc<Method>>,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("return_type", &self.return_type_name)
            .field("has_original", &self.original.is_some())
            .field("root", &self.root.as_ref().map(|r| r.id))
            .finish()
    }
}

impl Method {
    /// Describes a free function returning `R`, using `R::default()` as the
    /// zero value for the `Default` behaviour.
    pub fn free<R: Any + Default + Send>(name: &str) -> MethodBuilder {
        Method::returning(name, MethodKind::Free, R::default)
    }

    /// Describes an instance method returning `R`.
    pub fn instance<R: Any + Default + Send>(name: &str) -> MethodBuilder {
        Method::returning(name, MethodKind::Instance, R::default)
    }

    /// Describes a method whose result type has no `Default`; the supplied
    /// factory produces the zero value instead.
    pub fn returning<R: Any + Send>(
        name: &str,
        kind: MethodKind,
        default: impl Fn() -> R + Send + Sync + 'static,
    ) -> MethodBuilder {
        MethodBuilder {
            name: name.to_string(),
            kind,
            return_type: TypeId::of::<R>(),
            return_type_name: type_name::<R>(),
            default_return: Arc::new(move || Box::new(default()) as RetValue),
            original: None,
            root: None,
        }
    }

    /// Describes a specialisation of this method: a generic instantiation or
    /// an override further down a virtual chain. The result shares this
    /// method's root identity, so spies installed on either are the same spy.
    pub fn specialize(self: &Arc<Self>, name: &str) -> MethodBuilder {
        let root = self.root.clone().unwrap_or_else(|| self.clone());
        MethodBuilder {
            name: name.to_string(),
            kind: root.kind,
            return_type: root.return_type,
            return_type_name: root.return_type_name,
            default_return: root.default_return.clone(),
            original: None,
            root: Some(root),
        }
    }

    /// This descriptor's own id. Distinct per descriptor, including
    /// specialisations.
    pub fn id(&self) -> MethodId {
        self.id
    }

    /// The canonical id: the root definition's. Registry and dispatcher key
    /// on this.
    pub fn root_id(&self) -> MethodId {
        match &self.root {
            Some(root) => root.id,
            None => self.id,
        }
    }

    pub(crate) fn root_method(self: &Arc<Self>) -> Arc<Method> {
        self.root.clone().unwrap_or_else(|| self.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub(crate) fn default_return(&self) -> RetValue {
        (self.default_return)()
    }

    /// The callable original: this descriptor's own, falling back to the
    /// root's.
    pub(crate) fn original(&self) -> Option<CallThroughFn> {
        self.original
            .clone()
            .or_else(|| self.root.as_ref().and_then(|r| r.original.clone()))
    }

    pub(crate) fn check_return_type(
        &self,
        provided: TypeId,
        provided_name: &'static str,
    ) -> Result<(), SpyError> {
        if provided == self.return_type {
            Ok(())
        } else {
            Err(SpyError::ReturnTypeMismatch {
                method: self.name.clone(),
                declared: self.return_type_name,
                provided: provided_name,
            })
        }
    }
}

pub struct MethodBuilder {
    name: String,
    kind: MethodKind,
    return_type: TypeId,
    return_type_name: &'static str,
    default_return: DefaultFn,
    original: Option<CallThroughFn>,
    root: Option<Arc<Method>>,
}

impl MethodBuilder {
    /// Attaches the original implementation, making call-through possible.
    /// The closure receives the full argument list, receiver included for
    /// instance methods.
    pub fn call_through(
        mut self,
        original: impl Fn(&ArgList) -> RetValue + Send + Sync + 'static,
    ) -> Self {
        self.original = Some(Arc::new(original));
        self
    }

    pub fn build(self) -> Arc<Method> {
        Arc::new(Method {
            id: MethodId::next(),
            name: self.name,
            kind: self.kind,
            return_type: self.return_type,
            return_type_name: self.return_type_name,
            default_return: self.default_return,
            original: self.original,
            root: self.root,
        })
    }
}
