//! Dependency registry snapshots.
//!
//! A [`DependencyRegistry`] is an immutable-once-published map from produced
//! key to descriptor. The manager builds a new one for every registration
//! and swaps it in; engines resolve against whichever snapshot they were
//! handed.

use std::collections::BTreeMap;
use std::sync::Arc;

use condor_core::{CondorResult, Dependency, Iov, Key, RegistryError};

#[derive(Debug, Clone, Default)]
pub struct DependencyRegistry {
    deps: BTreeMap<Key, Arc<Dependency>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `deps`, rejecting the first invalid one.
    pub fn from_dependencies<I>(deps: I) -> CondorResult<Self>
    where
        I: IntoIterator<Item = Dependency>,
    {
        let mut registry = Self::new();
        for dep in deps {
            registry.insert(dep)?;
        }
        Ok(registry)
    }

    /// Add `dep`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::AlreadyRegistered`] if its key already has a descriptor.
    /// - [`RegistryError::SelfReference`] if it lists its own key as a prerequisite.
    pub fn insert(&mut self, dep: Dependency) -> CondorResult<()> {
        let key = dep.target();
        if dep.depends_on().contains(&key) {
            return Err(RegistryError::SelfReference { key }.into());
        }
        if let Some(existing) = self.deps.get(&key) {
            return Err(RegistryError::AlreadyRegistered {
                key,
                name: existing.name().to_string(),
            }
            .into());
        }
        self.deps.insert(key, Arc::new(dep));
        Ok(())
    }

    pub fn get(&self, key: Key) -> Option<Arc<Dependency>> {
        self.deps.get(&key).cloned()
    }

    pub fn contains(&self, key: Key) -> bool {
        self.deps.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Every descriptor, in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Dependency>> + '_ {
        self.deps.values()
    }

    /// Descriptors bulk resolution for `window` should visit, in key order.
    pub fn applicable<'a>(&'a self, window: &'a Iov) -> impl Iterator<Item = &'a Arc<Dependency>> + 'a {
        self.deps.values().filter(move |dep| dep.applies_to(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condor_core::{CondorError, Derived, DerivationContext, IovKind};

    fn constant(target: &str, deps: &[&str]) -> Dependency {
        Dependency::new(
            Key::global(target),
            target,
            deps.iter().map(|d| Key::global(d)).collect(),
            |_ctx: &mut DerivationContext<'_>| Ok(Derived::new(1u8)),
        )
    }

    #[test]
    fn test_insert_and_get() {
        let mut registry = DependencyRegistry::new();
        registry.insert(constant("Area", &["Width", "Height"])).expect("register area");
        let dep = registry.get(Key::global("Area")).expect("area registered");
        assert_eq!(dep.name(), "Area");
        assert_eq!(dep.depends_on().len(), 2);
        assert!(registry.get(Key::global("Width")).is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = DependencyRegistry::new();
        registry.insert(constant("Area", &[])).expect("first");
        let err = registry.insert(constant("Area", &["Width"])).expect_err("second");
        assert_eq!(
            err,
            CondorError::Registry(RegistryError::AlreadyRegistered {
                key: Key::global("Area"),
                name: "Area".to_string(),
            })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut registry = DependencyRegistry::new();
        let err = registry.insert(constant("Loop", &["Loop"])).expect_err("self loop");
        assert!(matches!(err, CondorError::Registry(RegistryError::SelfReference { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_applicable_filters_by_window() {
        let early = Iov::new(IovKind::Run, 0, 100).expect("valid window");
        let late = Iov::new(IovKind::Run, 100, 200).expect("valid window");
        let registry = DependencyRegistry::from_dependencies(vec![
            constant("Always", &[]),
            constant("Early", &[]).with_applicability(early),
        ])
        .expect("registry builds");

        assert_eq!(registry.applicable(&early).count(), 2);
        let names: Vec<&str> = registry.applicable(&late).map(|d| d.name()).collect();
        assert_eq!(names, vec!["Always"]);
    }
}
