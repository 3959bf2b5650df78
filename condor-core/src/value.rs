//! Immutable, typed, keyed values.
//!
//! The payload is type-erased behind an `Arc`, so cloning a [`Value`] or
//! re-stamping it for a different window shares the payload instead of
//! copying it. Typed access goes through [`Value::get`], which reports a
//! mismatch instead of panicking.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::{CondorResult, Iov, Key, ScopeId, ValueError};

type Payload = Arc<dyn Any + Send + Sync>;

/// A keyed payload valid over one window.
#[derive(Clone)]
pub struct Value {
    key: Key,
    validity: Iov,
    owner: Option<ScopeId>,
    name: Option<Arc<str>>,
    payload: Payload,
    payload_type: &'static str,
}

impl Value {
    /// Wrap a payload for `key`, valid over `validity`.
    pub fn new<T>(key: Key, validity: Iov, payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            key,
            validity,
            owner: None,
            name: None,
            payload: Arc::new(payload),
            payload_type: type_name::<T>(),
        }
    }

    /// Build from an already type-erased payload.
    pub fn from_erased(
        key: Key,
        validity: Iov,
        payload: Arc<dyn Any + Send + Sync>,
        payload_type: &'static str,
    ) -> Self {
        Self {
            key,
            validity,
            owner: None,
            name: None,
            payload,
            payload_type,
        }
    }

    /// Attach the owning entity this value annotates.
    pub fn with_owner(mut self, owner: ScopeId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Attach a human-readable name for diagnostics.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// A new value sharing this payload, valid over `validity`.
    ///
    /// The receiver is untouched; holders of it keep seeing the old window.
    pub fn restamp(&self, validity: Iov) -> Self {
        Self {
            validity,
            ..self.clone()
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn validity(&self) -> &Iov {
        &self.validity
    }

    pub fn owner(&self) -> Option<ScopeId> {
        self.owner
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name of the stored payload type.
    pub fn payload_type(&self) -> &'static str {
        self.payload_type
    }

    /// Access the payload as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] if the payload is not a `T`.
    pub fn get<T: Any>(&self) -> CondorResult<&T> {
        self.payload.downcast_ref::<T>().ok_or_else(|| {
            ValueError::TypeMismatch {
                key: self.key,
                expected: type_name::<T>(),
                found: self.payload_type,
            }
            .into()
        })
    }

    pub fn try_get<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    /// True if both values share one payload and one window.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload) && self.validity == other.validity
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("validity", &self.validity)
            .field("owner", &self.owner)
            .field("payload_type", &self.payload_type)
            .finish()
    }
}
