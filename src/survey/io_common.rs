use chrono::{DateTime, Utc};
use snafu::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::survey::*;

static RESPONSE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A short identifier for a new response: the time of submission, the process and a
/// counter, hashed.
pub fn new_response_id(now: &DateTime<Utc>) -> String {
    let seq = RESPONSE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seed = format!(
        "{}-{}-{}",
        now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp()),
        std::process::id(),
        seq
    );
    sha256::digest(seed.as_str())[..16].to_string()
}

// The canonical form of a path that may not exist yet: the file itself if it exists,
// otherwise its canonical parent joined with the file name.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(p) = fs::canonicalize(path) {
        return p;
    }
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(p), Some(name)) => p.join(name),
        _ => path.to_path_buf(),
    }
}

/// True if both paths name the same file, through `..`, relative paths or symbolic
/// links.
pub fn same_file(a: &Path, b: &Path) -> bool {
    a == b || resolve(a) == resolve(b)
}

/// Writes the record alone in a CSV file, creating the parent directories.
///
/// Refuses to write to `dataset`, the file holding the shared dataset if there is one.
pub fn write_export(
    path: &str,
    record: &ResponseRecord,
    dataset: Option<&Path>,
) -> BSurveyResult<()> {
    if let Some(d) = dataset {
        if same_file(Path::new(path), d) {
            return Err(Box::new(SurveyError::ExportOverwritesDataset {
                path: path.to_string(),
            }));
        }
    }
    let content = record.to_csv().context(ExportEncodingSnafu {})?;
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(ExportSnafu { path })?;
        }
    }
    fs::write(path, content).context(ExportSnafu { path })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let now = Utc::now();
        let a = new_response_id(&now);
        let b = new_response_id(&now);
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn export_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let mut record = ResponseRecord::new("r1");
        record.insert("region", "Europe");
        write_export(path.to_str().unwrap(), &record, None).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "response_id,region\nr1,Europe\n"
        );
    }

    #[test]
    fn aliased_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("x")).unwrap();
        let dataset = dir.path().join("responses.csv");
        let aliased = dir.path().join("x").join("..").join("responses.csv");
        // The dataset does not need to exist.
        assert!(same_file(&aliased, &dataset));
        fs::write(&dataset, "response_id\nr0\n").unwrap();
        assert!(same_file(&aliased, &dataset));
        assert!(!same_file(&dir.path().join("out.csv"), &dataset));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        std::os::unix::fs::symlink(&data, dir.path().join("link")).unwrap();
        assert!(same_file(
            &dir.path().join("link").join("responses.csv"),
            &data.join("responses.csv")
        ));
    }

    #[test]
    fn export_never_replaces_the_dataset() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("x")).unwrap();
        let dataset = dir.path().join("responses.csv");
        fs::write(&dataset, "response_id\nr0\nr1\n").unwrap();
        let aliased = dir.path().join("x").join("..").join("responses.csv");
        let err = write_export(
            aliased.to_str().unwrap(),
            &ResponseRecord::new("r2"),
            Some(&dataset),
        )
        .unwrap_err();
        assert!(matches!(*err, SurveyError::ExportOverwritesDataset { .. }));
        assert_eq!(fs::read_to_string(&dataset).unwrap(), "response_id\nr0\nr1\n");
    }
}
