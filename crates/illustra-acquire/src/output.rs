//! Filesystem bookkeeping for query directories and the default-image store.

use anyhow::{Context, Result};
use illustra_model::ImageExtension;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory name for a query string, safe on every platform.
pub fn query_dir_name(query: &str) -> String {
    let cleaned = sanitize_filename::sanitize(query.trim());
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "query".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Create (idempotently) the directory for `query` under `root`.
pub fn prepare_query_dir(root: &Path, query: &str) -> Result<PathBuf> {
    let dir = root.join(query_dir_name(query));
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create query directory {}", dir.display()))?;
    Ok(dir)
}

/// Longest stem in bytes; leaves room for `_default<N>.<ext>` under NAME_MAX.
const MAX_STEM_BYTES: usize = 200;

/// Alphanumeric-only file stem derived from a directory's name, capped at
/// [`MAX_STEM_BYTES`] on a character boundary.
pub fn file_stem_for(dir: &Path) -> String {
    let mut stem = String::new();
    if let Some(name) = dir.file_name() {
        for c in name.to_string_lossy().chars().filter(|c| c.is_alphanumeric()) {
            if stem.len() + c.len_utf8() > MAX_STEM_BYTES {
                break;
            }
            stem.push(c);
        }
    }
    if stem.is_empty() {
        "image".to_string()
    } else {
        stem
    }
}

/// Image files directly inside `dir`, sorted by file name.
///
/// A missing or unreadable directory yields an empty list.
pub fn list_images(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Failed to read image directory");
            }
            return Vec::new();
        }
    };

    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && ImageExtension::from_path(path).is_some())
        .collect();
    images.sort();
    images
}

/// Place up to `count` of `defaults` into `dest_dir`.
///
/// The default at position `i` is copied to `<stem>_default<i>.<ext>`,
/// keeping its extension. A copy already present under that name is reused,
/// so repeated fallbacks for one query do not pile up duplicates. Individual
/// copy failures are logged and skipped.
pub fn copy_defaults(defaults: &[PathBuf], dest_dir: &Path, count: usize) -> Vec<PathBuf> {
    let stem = file_stem_for(dest_dir);
    let mut placed = Vec::new();

    for (index, source) in defaults.iter().take(count).enumerate() {
        let Some(ext) = source.extension().and_then(|e| e.to_str()) else {
            continue;
        };

        let target = dest_dir.join(format!("{stem}_default{index}.{ext}"));
        if target.is_file() {
            debug!(path = %target.display(), "Reusing default image copy");
            placed.push(target);
            continue;
        }

        match fs::copy(source, &target) {
            Ok(_) => {
                info!(from = %source.display(), to = %target.display(), "Copied default image");
                placed.push(target);
            }
            Err(e) => {
                warn!(from = %source.display(), error = %e, "Failed to copy default image");
            }
        }
    }

    placed
}

/// Every image currently in `dir`, with `produced` first (in the given order)
/// followed by the rest sorted by name, truncated to `count`.
pub fn collect_results(dir: &Path, produced: &[PathBuf], count: usize) -> Vec<PathBuf> {
    let present = list_images(dir);
    let present_set: HashSet<&PathBuf> = present.iter().collect();

    let mut results: Vec<PathBuf> = produced
        .iter()
        .filter(|p| present_set.contains(p))
        .cloned()
        .collect();
    let produced_set: HashSet<&PathBuf> = produced.iter().collect();
    results.extend(present.iter().filter(|p| !produced_set.contains(p)).cloned());

    results.truncate(count);
    results
}

/// Remove every file and query directory under `root`.
///
/// Returns the number of entries removed. Failures are logged per entry.
pub fn clean_root(root: &Path) -> usize {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(root = %root.display(), error = %e, "Error in cleanup");
            }
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Error deleting entry"),
        }
    }

    info!(root = %root.display(), removed, "Cleaned up acquired images");
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_dir_name_strips_separators() {
        assert_eq!(query_dir_name("electric cars"), "electric cars");
        assert_eq!(query_dir_name("a/b\\c:d"), "abcd");
        assert_eq!(query_dir_name("  ..  "), "query");
        assert_eq!(query_dir_name(""), "query");
    }

    #[test]
    fn test_prepare_query_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let first = prepare_query_dir(tmp.path(), "solar panels").unwrap();
        let second = prepare_query_dir(tmp.path(), "solar panels").unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
    }

    #[test]
    fn test_file_stem_for() {
        assert_eq!(file_stem_for(Path::new("/tmp/electric cars-2024!")), "electriccars2024");
        assert_eq!(file_stem_for(Path::new("/tmp/??")), "image");
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.png"), "b").unwrap();
        fs::write(tmp.path().join("a.JPG"), "a").unwrap();
        fs::write(tmp.path().join("notes.txt"), "n").unwrap();
        fs::create_dir(tmp.path().join("sub.jpg")).unwrap();

        let names: Vec<String> = list_images(tmp.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png"]);
    }

    #[test]
    fn test_list_images_missing_dir() {
        assert!(list_images(Path::new("/nonexistent/illustra/defaults")).is_empty());
    }

    #[test]
    fn test_file_stem_is_capped() {
        let long = format!("green energy {}", "x".repeat(300));
        let stem = file_stem_for(Path::new(&long));
        assert_eq!(stem.len(), MAX_STEM_BYTES);
        assert!(stem.starts_with("greenenergyxxx"));

        // Multi-byte characters are never split.
        let wide = "é".repeat(150);
        let stem = file_stem_for(Path::new(&wide));
        assert_eq!(stem.chars().count(), 100);
    }

    #[test]
    fn test_long_query_dir_accepts_default_copies() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("d.jpg"), "d").unwrap();

        let root = tempfile::tempdir().unwrap();
        let query = format!("green energy transition {}", "x".repeat(300));
        let dest = prepare_query_dir(root.path(), &query).unwrap();

        let copied = copy_defaults(&list_images(src.path()), &dest, 3);
        assert_eq!(copied.len(), 1);
        assert!(copied[0].is_file());
    }

    #[test]
    fn test_copy_defaults_reuses_existing_copies() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("one.png"), "1").unwrap();
        fs::write(src.path().join("two.webp"), "2").unwrap();
        fs::write(src.path().join("three.jpg"), "3").unwrap();
        let defaults = list_images(src.path());

        let dest_root = tempfile::tempdir().unwrap();
        let dest = dest_root.path().join("evs");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("evs_default0.png"), "kept").unwrap();

        let copied = copy_defaults(&defaults, &dest, 2);
        let names: Vec<String> = copied
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        // Sorted sources: one.png, three.jpg, two.webp; first two are placed.
        assert_eq!(names, vec!["evs_default0.png", "evs_default1.jpg"]);
        assert_eq!(fs::read_to_string(&copied[0]).unwrap(), "kept");
        assert_eq!(fs::read(&copied[1]).unwrap(), b"3");

        let again = copy_defaults(&defaults, &dest, 2);
        assert_eq!(again, copied);
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 2);
    }

    #[test]
    fn test_collect_results_orders_produced_first_and_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        for name in ["q0.jpg", "q1.png", "q10.jpg", "old.webp"] {
            fs::write(dir.join(name), "x").unwrap();
        }
        let produced = vec![dir.join("q0.jpg"), dir.join("q1.png"), dir.join("q10.jpg")];

        let all = collect_results(dir, &produced, 10);
        assert_eq!(all[..3], produced[..]);
        assert_eq!(all[3], dir.join("old.webp"));

        let capped = collect_results(dir, &produced, 2);
        assert_eq!(capped, produced[..2].to_vec());
    }

    #[test]
    fn test_clean_root_removes_files_and_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("stray.jpg"), "x").unwrap();
        let q = prepare_query_dir(tmp.path(), "wind").unwrap();
        fs::write(q.join("wind0.jpg"), "x").unwrap();

        assert_eq!(clean_root(tmp.path()), 2);
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
        assert_eq!(clean_root(&tmp.path().join("missing")), 0);
    }
}
