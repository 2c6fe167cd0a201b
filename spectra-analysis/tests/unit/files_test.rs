use super::*;
use serde_json::json;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_list_creates_missing_directory() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let data_dir = temp.path().join("data");

    assert!(list_capture_files(&data_dir)?.is_empty());
    assert!(data_dir.is_dir());
    Ok(())
}

#[test]
fn test_list_only_json_files() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    write(temp.path(), "capture.json", "{}");
    write(temp.path(), "notes.txt", "hello");
    write(temp.path(), "capture.JSON.bak", "{}");
    fs::create_dir(temp.path().join("nested.json"))?;

    let files = list_capture_files(temp.path())?;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "capture.json");
    assert_eq!(files[0].size_bytes, 2);
    assert!(files[0].modified > 0.0);
    Ok(())
}

#[test]
fn test_list_is_sorted_newest_first() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let old = write(temp.path(), "old.json", "{}");
    write(temp.path(), "new.json", "{}");

    let an_hour_ago = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
    fs::File::options().write(true).open(&old)?.set_modified(an_hour_ago)?;

    let names = list_capture_files(temp.path())?.into_iter().map(|entry| entry.name).collect::<Vec<_>>();
    assert_eq!(names, vec!["new.json", "old.json"]);
    Ok(())
}

#[test]
fn test_resolve_capture_path() {
    let data_dir = Path::new("/srv/data");
    assert_eq!(resolve_capture_path(data_dir, "a.json"), PathBuf::from("/srv/data/a.json"));
    assert_eq!(resolve_capture_path(data_dir, "/tmp/b.json"), PathBuf::from("/tmp/b.json"));
}

#[test]
fn test_read_capture_file_error_kinds() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let missing = read_capture_file(&temp.path().join("missing.json"));
    assert!(matches!(missing, Err(SpectraError::NotFound(_))));

    let text = write(temp.path(), "capture.txt", r#"{"tensor_order": []}"#);
    assert!(matches!(
        read_capture_file(&text),
        Err(SpectraError::InvalidFormat(FormatIssue::UnsupportedExtension))
    ));

    let broken = write(temp.path(), "broken.json", "{not json");
    assert!(matches!(read_capture_file(&broken), Err(SpectraError::InvalidFormat(FormatIssue::MalformedJson(_)))));

    let unrelated = write(temp.path(), "unrelated.json", r#"{"hello": "world"}"#);
    assert!(matches!(
        read_capture_file(&unrelated),
        Err(SpectraError::InvalidFormat(FormatIssue::MissingCaptureKeys))
    ));
    Ok(())
}

#[test]
fn test_read_capture_file_accepts_trials_only() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let path = write(temp.path(), "trials.json", r#"{"trials": []}"#);

    let capture = read_capture_file(&path)?;
    assert_eq!(capture.model_family, "unknown");
    assert!(capture.tensor_order.is_empty());
    Ok(())
}

#[test]
fn test_parse_capture_document_rejects_invalid_utf8() {
    let result = parse_capture_document(&[0x7b, 0xff, 0x7d]);
    assert!(matches!(result, Err(SpectraError::InvalidFormat(FormatIssue::MalformedJson(_)))));
}

#[test]
fn test_sanitize_filename() {
    assert_eq!(sanitize_filename("capture_01-a.json"), "capture_01-a.json");
    assert_eq!(sanitize_filename("../../etc/passwd.json"), "....etcpasswd.json");
    assert_eq!(sanitize_filename("my capture (2).json"), "mycapture2.json");
    assert_eq!(sanitize_filename("/// "), "upload.json");
}

#[test]
fn test_save_upload_never_overwrites() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let document = json!({"tensor_order": ["tensor_a"]});

    let first = save_upload(temp.path(), "capture.json", &document)?;
    let second = save_upload(temp.path(), "capture.json", &document)?;
    let third = save_upload(temp.path(), "capture.json", &json!({"trials": []}))?;

    assert_eq!(first, temp.path().join("capture.json"));
    assert_eq!(second, temp.path().join("capture_1.json"));
    assert_eq!(third, temp.path().join("capture_2.json"));

    let original: Value = serde_json::from_str(&fs::read_to_string(&first)?)?;
    assert_eq!(original, document);
    assert!(fs::read_to_string(&third)?.contains("\"trials\""));
    Ok(())
}

struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_failed_write_removes_new_file() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("capture.json");
    fs::write(&path, "")?;

    let err = fill_new_file(FailingWriter, &path, b"{}").unwrap_err();
    assert!(matches!(err, SpectraError::Io { .. }));
    assert!(!path.exists());
    assert!(list_capture_files(temp.path())?.is_empty());

    fill_new_file(fs::File::create(&path)?, &path, b"{}")?;
    assert_eq!(fs::read_to_string(&path)?, "{}");
    Ok(())
}
