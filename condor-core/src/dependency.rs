//! Dependency descriptors and the resolver capability.
//!
//! A [`Dependency`] names the key it produces, the ordered keys it needs,
//! and the callback that computes the produced payload from them. Callbacks
//! see their inputs through a [`DerivationContext`], which also exposes the
//! driving [`Resolver`] so a callback may pull further values on demand.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::{CondorError, CondorResult, Iov, Key, ResolutionError, Value, ValueError};

// ============================================================================
// RESOLVER CAPABILITY
// ============================================================================

/// Anything that can hand out values for one target window.
///
/// The resolution engine implements this, and so can test stubs.
pub trait Resolver {
    /// The window every returned value must cover.
    fn required_validity(&self) -> &Iov;

    /// Resolve `key` to a value valid over [`Resolver::required_validity`].
    fn get(&mut self, key: Key) -> CondorResult<Value>;
}

// ============================================================================
// CALLBACKS
// ============================================================================

/// Type-erased output of a derivation callback.
///
/// The engine stamps it with the produced key and the session window.
pub struct Derived {
    payload: Arc<dyn Any + Send + Sync>,
    payload_type: &'static str,
}

impl Derived {
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self {
            payload: Arc::new(payload),
            payload_type: type_name::<T>(),
        }
    }

    pub fn payload_type(&self) -> &'static str {
        self.payload_type
    }

    /// Turn the output into a value for `key` over `validity`.
    pub fn into_value(self, key: Key, validity: Iov) -> Value {
        Value::from_erased(key, validity, self.payload, self.payload_type)
    }
}

impl fmt::Debug for Derived {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("payload_type", &self.payload_type)
            .finish()
    }
}

/// Computes a derived payload from resolved prerequisites.
pub trait DerivationCallback: Send + Sync {
    fn derive(&self, ctx: &mut DerivationContext<'_>) -> CondorResult<Derived>;
}

impl<F> DerivationCallback for F
where
    F: Fn(&mut DerivationContext<'_>) -> CondorResult<Derived> + Send + Sync,
{
    fn derive(&self, ctx: &mut DerivationContext<'_>) -> CondorResult<Derived> {
        (self)(ctx)
    }
}

/// What a callback sees while computing one derived value.
pub struct DerivationContext<'a> {
    key: Key,
    validity: Iov,
    inputs: &'a [Value],
    user_param: Option<&'a (dyn Any + Send + Sync)>,
    resolver: &'a mut dyn Resolver,
}

impl<'a> DerivationContext<'a> {
    pub fn new(
        key: Key,
        validity: Iov,
        inputs: &'a [Value],
        user_param: Option<&'a (dyn Any + Send + Sync)>,
        resolver: &'a mut dyn Resolver,
    ) -> Self {
        Self {
            key,
            validity,
            inputs,
            user_param,
            resolver,
        }
    }

    /// The key being produced.
    pub fn key(&self) -> Key {
        self.key
    }

    /// The window the produced value will be stamped with.
    pub fn validity(&self) -> &Iov {
        &self.validity
    }

    /// Resolved prerequisites, in declaration order.
    pub fn inputs(&self) -> &[Value] {
        self.inputs
    }

    pub fn input_value(&self, index: usize) -> CondorResult<&Value> {
        self.inputs.get(index).ok_or_else(|| {
            ValueError::InputOutOfRange {
                key: self.key,
                index,
                len: self.inputs.len(),
            }
            .into()
        })
    }

    /// Typed access to the prerequisite at `index`.
    pub fn input<T: Any>(&self, index: usize) -> CondorResult<&T> {
        self.input_value(index)?.get::<T>()
    }

    /// The caller-supplied parameter of the pass, if it is a `T`.
    pub fn user_param<T: Any>(&self) -> Option<&T> {
        self.user_param.and_then(|p| p.downcast_ref::<T>())
    }

    /// Build the error a callback returns when it cannot produce a value.
    pub fn fail(&self, reason: impl Into<String>) -> CondorError {
        ResolutionError::CallbackFailed {
            key: self.key,
            reason: reason.into(),
        }
        .into()
    }

    /// Resolve a further key through the driving resolver.
    pub fn get(&mut self, key: Key) -> CondorResult<Value> {
        self.resolver.get(key)
    }

    pub fn resolver(&mut self) -> &mut dyn Resolver {
        &mut *self.resolver
    }
}

// ============================================================================
// DEPENDENCY DESCRIPTOR
// ============================================================================

/// Registration record for one derived value.
#[derive(Clone)]
pub struct Dependency {
    target: Key,
    name: Arc<str>,
    depends_on: Vec<Key>,
    applies_to: Option<Iov>,
    callback: Arc<dyn DerivationCallback>,
}

impl Dependency {
    pub fn new<F>(target: Key, name: impl Into<Arc<str>>, depends_on: Vec<Key>, callback: F) -> Self
    where
        F: Fn(&mut DerivationContext<'_>) -> CondorResult<Derived> + Send + Sync + 'static,
    {
        Self::from_callback(target, name, depends_on, callback)
    }

    /// Like [`Dependency::new`], for callbacks implemented as a type.
    pub fn from_callback<C>(
        target: Key,
        name: impl Into<Arc<str>>,
        depends_on: Vec<Key>,
        callback: C,
    ) -> Self
    where
        C: DerivationCallback + 'static,
    {
        Self {
            target,
            name: name.into(),
            depends_on,
            applies_to: None,
            callback: Arc::new(callback),
        }
    }

    /// Restrict bulk resolution of this dependency to windows intersecting `iov`.
    pub fn with_applicability(mut self, iov: Iov) -> Self {
        self.applies_to = Some(iov);
        self
    }

    pub fn target(&self) -> Key {
        self.target
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depends_on(&self) -> &[Key] {
        &self.depends_on
    }

    pub fn applicability(&self) -> Option<&Iov> {
        self.applies_to.as_ref()
    }

    /// True if bulk resolution for `window` should include this dependency.
    pub fn applies_to(&self, window: &Iov) -> bool {
        self.applies_to
            .as_ref()
            .map_or(true, |iov| iov.intersects(window))
    }

    pub fn callback(&self) -> &dyn DerivationCallback {
        self.callback.as_ref()
    }

    pub fn derive(&self, ctx: &mut DerivationContext<'_>) -> CondorResult<Derived> {
        self.callback.derive(ctx)
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("target", &self.target)
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("applies_to", &self.applies_to)
            .finish_non_exhaustive()
    }
}
