//! Recursive filename lookup and listing over the image and data folders.
//!
//! Lookups are a linear walk on every call; there is no index.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
pub const CSV_EXTENSIONS: &[&str] = &["csv"];

pub fn has_extension(name: &str, extensions: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(OsStr::to_str)
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// A bare file name: no separators, no parent references.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Walks files of a directory before descending into its subdirectories,
/// each level in name order.
fn walker(base: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(base)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
}

pub fn find_file_recursively(base: &Path, file_name: &str) -> Option<PathBuf> {
    if !is_plain_file_name(file_name) {
        return None;
    }
    let target = OsStr::new(file_name);
    walker(base)
        .find(|entry| entry.file_name() == target)
        .map(DirEntry::into_path)
}

/// Names of every file under `base` with one of `extensions`, in walk order.
pub fn collect_file_names(base: &Path, extensions: &[&str]) -> Vec<String> {
    walker(base)
        .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
        .filter(|name| has_extension(name, extensions))
        .collect()
}

pub fn list_images(images_dir: &Path) -> Vec<String> {
    let mut images = collect_file_names(images_dir, IMAGE_EXTENSIONS);
    images.sort();
    images
}

/// Non-recursive listing of one directory, sorted by name.
pub fn list_dir_files(dir: &Path, extensions: &[&str]) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
        .filter(|name| has_extension(name, extensions))
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn finds_nested_files_by_basename() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("COVID/COVID-1.png"));
        touch(&dir.path().join("Normal/deep/Normal-7.jpg"));

        let found = find_file_recursively(dir.path(), "Normal-7.jpg").unwrap();
        assert!(found.ends_with("Normal/deep/Normal-7.jpg"));
        assert!(find_file_recursively(dir.path(), "missing.png").is_none());
        assert!(find_file_recursively(dir.path(), "../COVID-1.png").is_none());
        assert!(find_file_recursively(&dir.path().join("nope"), "COVID-1.png").is_none());
    }

    #[test]
    fn shallow_match_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/dup.png"));
        touch(&dir.path().join("dup.png"));
        assert_eq!(
            find_file_recursively(dir.path(), "dup.png").unwrap(),
            dir.path().join("dup.png")
        );
    }

    #[test]
    fn listing_filters_extensions_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b/zeta.PNG"));
        touch(&dir.path().join("a/alpha.jpeg"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("mid.jpg"));

        assert_eq!(
            list_images(dir.path()),
            vec!["alpha.jpeg", "mid.jpg", "zeta.PNG"]
        );
    }

    #[test]
    fn csv_listing_is_not_recursive() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("vitals.csv"));
        touch(&dir.path().join("Labs.CSV"));
        touch(&dir.path().join("nested/hidden.csv"));
        touch(&dir.path().join("readme.md"));

        assert_eq!(
            list_dir_files(dir.path(), CSV_EXTENSIONS),
            vec!["Labs.CSV", "vitals.csv"]
        );
        assert!(list_dir_files(&dir.path().join("absent"), CSV_EXTENSIONS).is_empty());
    }

    #[test]
    fn plain_names() {
        assert!(is_plain_file_name("COVID-1.png"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("a/b.png"));
        assert!(!is_plain_file_name("a\\b.png"));
    }
}
