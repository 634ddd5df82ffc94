//! Typed per-cycle state store
//!
//! Values are written once under a [`StateKey`] and shared behind `Arc`, so
//! cloning a [`CycleState`] is shallow: the clone sees the same values as the
//! original, while later writes to either side stay private to it.

use crate::error::{BalanceError, BalanceResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// Key of a cycle state slot holding values of type `T`
pub struct StateKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

type Slot = Arc<dyn Any + Send + Sync>;

/// State shared by the pre-filter and score phases of one scheduling cycle
#[derive(Clone, Default)]
pub struct CycleState {
    slots: DashMap<&'static str, Slot>,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the value stored under `key`
    pub fn read<T>(&self, key: &StateKey<T>) -> BalanceResult<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let slot = self
            .slots
            .get(key.name)
            .map(|r| Arc::clone(r.value()))
            .ok_or(BalanceError::StateRead(key.name))?;
        slot.downcast::<T>()
            .map_err(|_| BalanceError::StateRead(key.name))
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn write<T>(&self, key: &StateKey<T>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.slots.insert(key.name, Arc::new(value));
    }

    /// Store `value` only if `key` is empty; returns whatever ends up stored
    pub fn write_if_absent<T>(&self, key: &StateKey<T>, value: T) -> BalanceResult<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let slot = match self.slots.entry(key.name) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let slot: Slot = Arc::new(value);
                entry.insert(Arc::clone(&slot));
                slot
            }
        };
        slot.downcast::<T>()
            .map_err(|_| BalanceError::StateRead(key.name))
    }

    pub fn contains<T>(&self, key: &StateKey<T>) -> bool {
        self.slots.contains_key(key.name)
    }
}

impl std::fmt::Debug for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.slots.iter().map(|r| *r.key()).collect();
        f.debug_struct("CycleState").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMBERS: StateKey<Vec<u32>> = StateKey::new("numbers");
    const LABEL: StateKey<String> = StateKey::new("label");

    #[test]
    fn test_read_missing_key() {
        let state = CycleState::new();
        let err = state.read(&NUMBERS).unwrap_err();
        assert!(matches!(err, BalanceError::StateRead("numbers")));
    }

    #[test]
    fn test_write_then_read() {
        let state = CycleState::new();
        state.write(&NUMBERS, vec![1, 2, 3]);
        assert_eq!(*state.read(&NUMBERS).unwrap(), vec![1, 2, 3]);
        assert!(state.contains(&NUMBERS));
        assert!(!state.contains(&LABEL));
    }

    #[test]
    fn test_write_if_absent_keeps_first_value() {
        let state = CycleState::new();
        let first = state.write_if_absent(&NUMBERS, vec![1]).unwrap();
        let second = state.write_if_absent(&NUMBERS, vec![2]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*state.read(&NUMBERS).unwrap(), vec![1]);
    }

    #[test]
    fn test_clone_shares_values() {
        let state = CycleState::new();
        state.write(&LABEL, "snapshot".to_string());

        let copy = state.clone();
        let original = state.read(&LABEL).unwrap();
        let cloned = copy.read(&LABEL).unwrap();
        assert!(Arc::ptr_eq(&original, &cloned));

        // writes after cloning are not visible to the other side
        copy.write(&NUMBERS, vec![7]);
        assert!(!state.contains(&NUMBERS));
    }

    #[test]
    fn test_mismatched_key_type_is_read_error() {
        let state = CycleState::new();
        let as_text: StateKey<String> = StateKey::new("numbers");
        state.write(&NUMBERS, vec![1]);
        assert!(state.read(&as_text).is_err());
    }
}
