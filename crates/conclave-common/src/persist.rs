//! JSON files on disk.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, io::Error> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write compact JSON to `path` only if nothing exists there yet.
///
/// Returns `Ok(false)` when the file already exists; its content is left
/// untouched. Creation is exclusive, so two racing writers cannot both win.
/// On unix the file is created with mode 0600.
pub fn write_json_new<T: Serialize>(path: &Path, value: &T) -> Result<bool, io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_vec(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };
    file.write_all(&json)?;
    file.sync_all()?;
    Ok(true)
}

/// Replace `path` with compact JSON: written to a sibling temp file, then
/// renamed over the original. Readers see the old or the new content, never
/// a partial write. On unix the file has mode 0600.
pub fn write_json_replace<T: Serialize>(path: &Path, value: &T) -> Result<(), io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_vec(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&tmp)?;
    file.write_all(&json)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::temp_path;

    #[test]
    fn read_json_invalid_returns_invalid_data() {
        let dir = temp_path("persist-invalid");
        let path = dir.join("bad.json");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, "{broken json").unwrap();

        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn write_json_new_is_compact_and_first_write_wins() {
        let path = temp_path("persist-new").join("ring");

        assert!(write_json_new(&path, &vec!["first"]).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"["first"]"#);

        assert!(!write_json_new(&path, &vec!["second"]).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"["first"]"#);
    }

    #[test]
    fn write_json_replace_overwrites_and_leaves_no_temp_file() {
        let dir = temp_path("persist-replace");
        let path = dir.join("ring");

        write_json_new(&path, &vec!["old"]).unwrap();
        write_json_replace(&path, &vec!["new", "old"]).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"["new","old"]"#);
        assert!(!dir.join("ring.tmp").exists());
    }

    #[test]
    fn write_json_replace_fails_on_directory_path() {
        let dir = temp_path("persist-replace-dir");
        std::fs::create_dir_all(&dir).unwrap();
        assert!(write_json_replace(&dir, &vec!["k"]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn write_json_new_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path("persist-mode").join("ring");
        write_json_new(&path, &vec!["k"]).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
