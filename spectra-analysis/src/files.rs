#[cfg(test)]
#[path = "../tests/unit/files_test.rs"]
mod files_test;

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use serde::Serialize;
use serde_json::Value;
use spectra_capture::{CaptureFile, FormatIssue, validate_capture_value};

use crate::error::{Result, SpectraError};

const FALLBACK_UPLOAD_NAME: &str = "upload.json";

/// A capture file found in the data directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureFileEntry {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
    /// Modification time in seconds since the Unix epoch.
    pub modified: f64,
}

pub fn has_json_extension(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "json")
}

/// Relative paths are resolved inside `data_dir`, absolute ones are kept.
pub fn resolve_capture_path(data_dir: &Path, filepath: &str) -> PathBuf {
    let path = Path::new(filepath);
    if path.is_absolute() { path.to_path_buf() } else { data_dir.join(path) }
}

/// Lists `*.json` files in `data_dir`, newest first.
///
/// A missing directory is created and reported as empty. Entries whose metadata
/// cannot be read are skipped.
pub fn list_capture_files(data_dir: &Path) -> Result<Vec<CaptureFileEntry>> {
    if !data_dir.exists() {
        fs::create_dir_all(data_dir).map_err(|source| SpectraError::io(data_dir, source))?;
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(data_dir).map_err(|source| SpectraError::io(data_dir, source))?;
    let mut files = entries.filter_map(|entry| entry.ok()).filter_map(|entry| describe(&entry.path())).collect::<Vec<_>>();

    files.sort_by(|a, b| b.modified.total_cmp(&a.modified));
    Ok(files)
}

fn describe(path: &Path) -> Option<CaptureFileEntry> {
    if !has_json_extension(path) {
        return None;
    }

    let metadata = fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    let modified = metadata.modified().ok()?.duration_since(UNIX_EPOCH).ok()?.as_secs_f64();

    Some(CaptureFileEntry {
        name: path.file_name()?.to_string_lossy().into_owned(),
        path: path.display().to_string(),
        size_bytes: metadata.len(),
        modified,
    })
}

/// Parses raw bytes into a JSON document that passes the capture structure check.
pub fn parse_capture_document(bytes: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(bytes).map_err(|err| FormatIssue::MalformedJson(err.to_string()))?;
    let document = serde_json::from_str::<Value>(text).map_err(|err| FormatIssue::MalformedJson(err.to_string()))?;
    validate_capture_value(&document)?;
    Ok(document)
}

/// Reads a capture file from disk.
///
/// Checks run in a fixed order: existence, `.json` suffix, JSON syntax, then structure.
pub fn read_capture_file(path: &Path) -> Result<CaptureFile> {
    if !path.exists() {
        return Err(SpectraError::NotFound(format!("File {}", path.display())));
    }
    if !has_json_extension(path) {
        return Err(FormatIssue::UnsupportedExtension.into());
    }

    let bytes = fs::read(path).map_err(|source| SpectraError::io(path, source))?;
    let document = parse_capture_document(&bytes)?;

    Ok(CaptureFile::from_value(document)?)
}

/// Keeps alphanumerics, `_`, `-` and `.`, so the result is a bare file name.
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized =
        filename.chars().filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')).collect::<String>();

    if sanitized.is_empty() { FALLBACK_UPLOAD_NAME.to_string() } else { sanitized }
}

/// Writes `document` as pretty JSON under `data_dir/filename`.
///
/// An existing file is never overwritten: on collision the name becomes
/// `<stem>_<n>.json` with `n` counting up from 1.
pub fn save_upload(data_dir: &Path, filename: &str, document: &Value) -> Result<PathBuf> {
    fs::create_dir_all(data_dir).map_err(|source| SpectraError::io(data_dir, source))?;

    let contents =
        serde_json::to_string_pretty(document).map_err(|err| FormatIssue::Structure(err.to_string()))?;
    let stem = Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let mut candidate = data_dir.join(filename);
    let mut counter = 1usize;
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => {
                fill_new_file(file, &candidate, contents.as_bytes())?;
                return Ok(candidate);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                candidate = data_dir.join(format!("{stem}_{counter}.json"));
                counter += 1;
            }
            Err(source) => return Err(SpectraError::io(&candidate, source)),
        }
    }
}

/// Writes `contents` into a file that was just created at `path`.
/// A failed write removes the file so no truncated capture is left behind.
fn fill_new_file(mut file: impl Write, path: &Path, contents: &[u8]) -> Result<()> {
    if let Err(source) = file.write_all(contents) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(SpectraError::io(path, source));
    }
    Ok(())
}
