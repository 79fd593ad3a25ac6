use std::collections::{HashMap, HashSet};

use crate::core::hashing::DictionaryKey;
use crate::error::{Error, Result};

/// Append-only, content-keyed table of interned attribute groups.
///
/// Entries are never updated or removed except by [`DictionaryTier::clear`].
#[derive(Debug)]
pub struct DictionaryTier<E> {
    name: &'static str,
    entries: HashMap<DictionaryKey, E>,
}

impl<E: PartialEq> DictionaryTier<E> {
    pub fn new(name: &'static str) -> Self {
        DictionaryTier { name, entries: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &DictionaryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &DictionaryKey) -> Option<&E> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DictionaryKey, &E)> {
        self.entries.iter()
    }

    /// Batch existence check: the subset of `keys` not yet interned.
    pub fn missing_keys<'a, I>(&self, keys: I) -> HashSet<DictionaryKey>
    where
        I: IntoIterator<Item = &'a DictionaryKey>,
    {
        keys.into_iter().filter(|key| !self.contains(key)).cloned().collect()
    }

    /// Fails with [`Error::HashCollision`] if `key` is interned with a different entry.
    pub fn check_consistent(&self, key: &DictionaryKey, candidate: &E) -> Result<()> {
        match self.entries.get(key) {
            Some(existing) if existing != candidate => {
                Err(Error::HashCollision { tier: self.name, key: key.clone() })
            }
            _ => Ok(()),
        }
    }

    /// Insert-once. Returns `false` when the identical entry already exists.
    pub fn insert_once(&mut self, key: DictionaryKey, entry: E) -> Result<bool> {
        self.check_consistent(&key, &entry)?;
        if self.contains(&key) {
            return Ok(false);
        }
        self.entries.insert(key, entry);
        Ok(true)
    }

    /// Resolve every key in one pass; a missing key is a referential integrity violation.
    pub fn get_many<'a, I>(&self, keys: I) -> Result<HashMap<DictionaryKey, &E>>
    where
        I: IntoIterator<Item = &'a DictionaryKey>,
    {
        let mut resolved = HashMap::new();
        for key in keys {
            if resolved.contains_key(key) {
                continue;
            }
            let entry = self.entries.get(key).ok_or_else(|| {
                Error::ReferentialIntegrityViolation { tier: self.name, key: key.clone() }
            })?;
            resolved.insert(key.clone(), entry);
        }
        Ok(resolved)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_once_is_idempotent() {
        let mut tier = DictionaryTier::new("subitem");
        let key = DictionaryKey::from("abc");

        assert!(tier.insert_once(key.clone(), "red".to_string()).unwrap());
        assert!(!tier.insert_once(key.clone(), "red".to_string()).unwrap());
        assert_eq!(tier.len(), 1);
        assert_eq!(tier.get(&key).map(String::as_str), Some("red"));

        tier.clear();
        assert!(tier.is_empty());
        assert!(!tier.contains(&key));
    }

    #[test]
    fn test_collision_is_reported() {
        let mut tier = DictionaryTier::new("subitem");
        let key = DictionaryKey::from("abc");
        tier.insert_once(key.clone(), "red".to_string()).unwrap();

        let result = tier.insert_once(key.clone(), "blue".to_string());
        assert!(matches!(result, Err(Error::HashCollision { tier: "subitem", .. })));
        assert_eq!(tier.get(&key).map(String::as_str), Some("red"));
    }

    #[test]
    fn test_missing_keys() {
        let mut tier = DictionaryTier::new("item");
        tier.insert_once(DictionaryKey::from("a"), 1).unwrap();

        let keys = [DictionaryKey::from("a"), DictionaryKey::from("b"), DictionaryKey::from("b")];
        let missing = tier.missing_keys(&keys);
        assert_eq!(missing.len(), 1);
        assert!(missing.contains(&DictionaryKey::from("b")));
    }

    #[test]
    fn test_get_many_reports_dangling_key() {
        let mut tier = DictionaryTier::new("item");
        tier.insert_once(DictionaryKey::from("a"), 1).unwrap();

        let resolved = tier.get_many(&[DictionaryKey::from("a"), DictionaryKey::from("a")]).unwrap();
        assert_eq!(resolved.len(), 1);

        let result = tier.get_many(&[DictionaryKey::from("a"), DictionaryKey::from("zz")]);
        assert!(matches!(
            result,
            Err(Error::ReferentialIntegrityViolation { tier: "item", .. })
        ));
    }
}
