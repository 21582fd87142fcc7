use common::Result;
use std::path::{Path, PathBuf};

/// `*.json` files directly inside `dir`, sorted by file name.
pub fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_json_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_json_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.len() > ".json".len() && name.ends_with(".json"))
}

/// Everything before the first `.` of the file name, e.g. `12345` for
/// `12345.json`. Files are named after the user they were collected for.
pub fn file_key(path: &Path) -> Option<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|key| !key.is_empty())
}
