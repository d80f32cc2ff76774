//! `put` and `get` commands.

use herdb_core::{Config, Store};
use std::path::Path;

/// Stores `value` under `key`, creating the store if needed.
pub fn put(path: &Path, key: &[u8], value: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path)?;
    store.put(key, value)?;
    store.commit()?;
    Ok(())
}

/// Returns the value stored under `key`.
pub fn get(path: &Path, key: &[u8]) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    let store = Store::open_with_config(path, Config::new().create_if_missing(false))?;
    let value = store.get(key)?;
    store.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_then_get() {
        let temp = tempdir().unwrap();
        put(temp.path(), b"greeting", b"hello").unwrap();
        put(temp.path(), b"greeting", b"hi").unwrap();
        assert_eq!(get(temp.path(), b"greeting").unwrap(), Some(b"hi".to_vec()));
        assert_eq!(get(temp.path(), b"other").unwrap(), None);
    }

    #[test]
    fn get_requires_existing_store() {
        let temp = tempdir().unwrap();
        assert!(get(&temp.path().join("absent"), b"k").is_err());
    }
}
