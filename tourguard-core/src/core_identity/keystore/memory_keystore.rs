//! In-memory keystore (non-persistent, for tests)

use super::{Keystore, KeystoreError, StoredIdentity};
use crate::core_identity::Did;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

fn handle_poison<T>(_err: PoisonError<T>) -> KeystoreError {
    KeystoreError::Other("Lock poisoned: a thread panicked while holding the lock".to_string())
}

#[derive(Debug, Default)]
pub struct MemoryKeystore {
    entries: RwLock<BTreeMap<Did, StoredIdentity>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Keystore for MemoryKeystore {
    fn load(&self, identifier: &Did) -> Result<StoredIdentity, KeystoreError> {
        self.entries
            .read()
            .map_err(handle_poison)?
            .get(identifier)
            .cloned()
            .ok_or_else(|| KeystoreError::NotFound(identifier.to_string()))
    }

    fn save(&self, entry: &StoredIdentity) -> Result<(), KeystoreError> {
        self.entries
            .write()
            .map_err(handle_poison)?
            .insert(entry.identifier.clone(), entry.clone());
        Ok(())
    }

    fn delete(&self, identifier: &Did) -> Result<(), KeystoreError> {
        self.entries
            .write()
            .map_err(handle_poison)?
            .remove(identifier)
            .map(|_| ())
            .ok_or_else(|| KeystoreError::NotFound(identifier.to_string()))
    }

    fn list(&self) -> Result<Vec<StoredIdentity>, KeystoreError> {
        Ok(self.entries.read().map_err(handle_poison)?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::stored_identity;

    #[test]
    fn test_save_load_delete() {
        let keystore = MemoryKeystore::new();
        let entry = stored_identity("alice");

        keystore.save(&entry).unwrap();
        assert_eq!(keystore.load(&entry.identifier).unwrap(), entry);
        assert!(keystore.contains(&entry.identifier).unwrap());

        keystore.delete(&entry.identifier).unwrap();
        assert!(matches!(keystore.load(&entry.identifier), Err(KeystoreError::NotFound(_))));
        assert!(matches!(keystore.delete(&entry.identifier), Err(KeystoreError::NotFound(_))));
    }

    #[test]
    fn test_find_by_alias() {
        let keystore = MemoryKeystore::new();
        keystore.save(&stored_identity("alice")).unwrap();
        keystore.save(&stored_identity("bob")).unwrap();

        assert_eq!(keystore.find_by_alias("bob").unwrap().unwrap().alias, "bob");
        assert!(keystore.find_by_alias("carol").unwrap().is_none());
        assert_eq!(keystore.list().unwrap().len(), 2);
    }
}
