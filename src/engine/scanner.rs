use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

use crate::config::Settings;

/// File extensions recognized as checkable C/C++ sources.
const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++"];

/// Recursively collect checkable source files under `root`, skipping
/// ignored directories. Result is sorted for deterministic run order.
pub fn scan(root: &Path, settings: &Settings) -> Vec<PathBuf> {
    let ignore_set = build_glob_set(&settings.ignore);
    let mut files = Vec::new();
    walk_dir(root, root, &ignore_set, &mut files);
    files.sort();
    files
}

pub(crate) fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

fn matches_glob(path: &Path, root: &Path, set: &GlobSet) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| set.is_match(name))
        || path.strip_prefix(root).is_ok_and(|rel| set.is_match(rel))
}

fn walk_dir(dir: &Path, root: &Path, ignore: &GlobSet, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if matches_glob(&path, root, ignore) {
            continue;
        }

        if path.is_dir() {
            walk_dir(&path, root, ignore, files);
        } else if is_source_file(&path) {
            files.push(path);
        }
    }
}

fn build_glob_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    patterns
        .iter()
        .filter_map(|p| GlobBuilder::new(p).case_insensitive(true).build().ok())
        .for_each(|glob| {
            builder.add(glob);
        });
    builder.build().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_finds_source_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.c"), "int main() {}\n").unwrap();
        fs::write(dir.path().join("util.cpp"), "\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not source").unwrap();
        fs::write(dir.path().join("header.h"), "\n").unwrap();

        let settings = Settings::default();
        let files = scan(dir.path(), &settings);
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| is_source_file(f)));
    }

    #[test]
    fn test_scan_recurses_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.c"), "\n").unwrap();
        fs::write(dir.path().join("b.cc"), "\n").unwrap();

        let settings = Settings::default();
        let files = scan(dir.path(), &settings);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_scan_skips_ignored_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.c"), "\n").unwrap();
        fs::create_dir(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/gen.c"), "\n").unwrap();

        let settings = Settings::default();
        let files = scan(dir.path(), &settings);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_scan_custom_ignore_glob() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.c"), "\n").unwrap();
        fs::create_dir(dir.path().join("third_party")).unwrap();
        fs::write(dir.path().join("third_party/vendor.c"), "\n").unwrap();

        let mut settings = Settings::default();
        settings.ignore.push("third_*".to_string());
        let files = scan(dir.path(), &settings);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.c"));
    }

    #[test]
    fn test_scan_output_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("z.c"), "\n").unwrap();
        fs::write(dir.path().join("a.c"), "\n").unwrap();
        fs::write(dir.path().join("m.c"), "\n").unwrap();

        let settings = Settings::default();
        let files = scan(dir.path(), &settings);
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.c", "m.c", "z.c"]);
    }

    #[test]
    fn test_extension_case_insensitive() {
        assert!(is_source_file(Path::new("x.C")));
        assert!(is_source_file(Path::new("x.CPP")));
        assert!(!is_source_file(Path::new("x.rs")));
        assert!(!is_source_file(Path::new("Makefile")));
    }
}
