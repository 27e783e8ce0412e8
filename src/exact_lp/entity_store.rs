use anyhow::Result;
use std::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use super::exact_lp_error::ensure_size;

/// A handle into an [`EntityStore`]. Handles are never reused, so the index doubles as a stable
/// ordering key.
pub trait EntityId: Copy {
    fn from_index(index: usize) -> Self;

    fn index(self) -> usize;
}

/// Owning storage of columns or rows, addressed by handle.
#[derive(Clone, Debug)]
pub struct EntityStore<K, T> {
    slots: Vec<Option<T>>,
    live: usize,
    key: PhantomData<K>,
}

impl<K: EntityId, T> EntityStore<K, T> {
    pub fn new() -> Self {
        Self {
            slots: vec![],
            live: 0,
            key: PhantomData,
        }
    }

    /// Stores the entity created by `create`, which receives the handle it will live under.
    pub fn insert_with(&mut self, create: impl FnOnce(K) -> T) -> Result<K> {
        ensure_size(&mut self.slots, 1, "entity store")?;
        let key = K::from_index(self.slots.len());
        self.slots.push(Some(create(key)));
        self.live += 1;
        Ok(key)
    }

    pub fn remove(&mut self, key: K) -> Option<T> {
        let removed = self.slots.get_mut(key.index()).and_then(Option::take);
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.slots.get(key.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots.get_mut(key.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Number of entities currently stored.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|value| (K::from_index(i), value)))
    }

    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(key, _)| key).collect()
    }
}

impl<K: EntityId, T> Default for EntityStore<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityId, T> Index<K> for EntityStore<K, T> {
    type Output = T;

    fn index(&self, key: K) -> &Self::Output {
        match self.slots.get(key.index()) {
            Some(Some(value)) => value,
            _ => panic!("dangling entity handle {}", key.index()),
        }
    }
}

impl<K: EntityId, T> IndexMut<K> for EntityStore<K, T> {
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        match self.slots.get_mut(key.index()) {
            Some(Some(value)) => value,
            _ => panic!("dangling entity handle {}", key.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::exact_lp::{entity_store::EntityStore, exact_column::ColId};

    #[test]
    fn handles_are_not_reused() {
        let mut store: EntityStore<ColId, &str> = EntityStore::new();
        let a = store.insert_with(|_| "a").unwrap();
        let b = store.insert_with(|_| "b").unwrap();
        assert_eq!(store.remove(a), Some("a"));
        assert_eq!(store.remove(a), None);

        let c = store.insert_with(|_| "c").unwrap();
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
        assert_eq!(store.keys(), vec![b, c]);
        assert!(!store.contains(a));
    }

    #[test]
    #[should_panic]
    fn dangling_handle_panics() {
        let mut store: EntityStore<ColId, u32> = EntityStore::new();
        let a = store.insert_with(|_| 1).unwrap();
        store.remove(a);
        let _ = store[a];
    }
}
