use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{File, create_dir_all};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Default root of the JSON file store, relative to the working directory.
pub const DATA_DIR: &str = "database";

/// Resolve the data directory from the environment
///
/// Reads `GOALGRID_DATA_DIR`, falling back to [`DATA_DIR`] when unset.
pub fn data_dir() -> PathBuf {
    match std::env::var("GOALGRID_DATA_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DATA_DIR),
    }
}

/// Initialize the store structure
///
/// Creates the data directory plus empty users and workspaces files if they
/// don't exist. This should be called before any other store operations.
///
/// # Arguments
/// * `root` - Root directory of the file store
///
/// # Returns
/// * `std::io::Result<()>` - Success or an IO error
pub fn init_store(root: &Path) -> std::io::Result<()> {
    if !root.exists() {
        create_dir_all(root)?;
    }

    for name in ["users.json", "workspaces.json"] {
        let path = root.join(name);
        if !path.exists() {
            let mut file = File::create(path)?;
            file.write_all(b"{}")?;
        }
    }

    Ok(())
}

/// Directory holding one user's task and subtask files
pub fn user_dir(root: &Path, user_id: &str) -> PathBuf {
    root.join(user_id)
}

/// Read and deserialize a JSON file
///
/// # Arguments
/// * `path` - Path of the file to read
///
/// # Returns
/// * `Result<T, String>` - The deserialized value, or an error message
///
/// # Errors
/// * Returns an error if the file cannot be opened, read, or parsed
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return Err(format!("Failed to open {}", path.display())),
    };

    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_err() {
        return Err(format!("Failed to read {}", path.display()));
    }

    match serde_json::from_str(&contents) {
        Ok(value) => Ok(value),
        Err(_) => Err(format!("Failed to parse {}", path.display())),
    }
}

/// Read a JSON file, falling back to `T::default()` when it doesn't exist
///
/// Per-user task files are created lazily, so a missing file just means
/// "nothing stored yet".
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, String> {
    if !path.exists() {
        return Ok(T::default());
    }
    read_json(path)
}

/// Serialize a value and write it to a JSON file
///
/// The parent directory is created if needed; the file is written
/// pretty-printed.
///
/// # Arguments
/// * `path` - Destination file
/// * `value` - The value to persist
///
/// # Returns
/// * `Result<(), String>` - Success or an error message
///
/// # Errors
/// * Returns an error if serialization or any file operation fails
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let json = match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(_) => return Err(format!("Failed to serialize {}", path.display())),
    };

    if let Some(parent) = path.parent() {
        if !parent.exists() && create_dir_all(parent).is_err() {
            return Err(format!("Failed to create {}", parent.display()));
        }
    }

    let mut file = match File::create(path) {
        Ok(file) => file,
        Err(_) => return Err(format!("Failed to create {}", path.display())),
    };

    if file.write_all(json.as_bytes()).is_err() {
        return Err(format!("Failed to write {}", path.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn init_store_creates_empty_maps() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");

        init_store(&root).unwrap();

        let users: HashMap<String, serde_json::Value> =
            read_json(&root.join("users.json")).unwrap();
        assert!(users.is_empty());
        assert!(root.join("workspaces.json").exists());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("items.json");

        let items = vec!["one".to_string(), "two".to_string()];
        write_json(&path, &items).unwrap();

        let loaded: Vec<String> = read_json(&path).unwrap();
        assert_eq!(loaded, items);
    }

    #[test]
    fn missing_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let loaded: Vec<String> = read_json_or_default(&path).unwrap();
        assert!(loaded.is_empty());

        let err = read_json::<Vec<String>>(&path);
        assert!(err.is_err());
    }
}
