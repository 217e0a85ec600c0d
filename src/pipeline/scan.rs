// src/pipeline/scan.rs

//! Source file discovery.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::models::ScanConfig;

/// Collect source files under `roots`, honoring .gitignore.
///
/// Roots that are files are taken as given; directories are walked and
/// filtered by extension and exclude patterns. The result is sorted and
/// free of duplicates.
pub fn discover_sources(roots: &[PathBuf], scan: &ScanConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for root in roots {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }

        let found = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_exclude(true)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| has_extension(path, &scan.extensions))
            .filter(|path| !is_excluded(path, root, &scan.exclude));
        files.extend(found);
    }

    files.sort();
    files.dedup();
    files
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Check if any component of the path below `root` matches an exclude pattern.
fn is_excluded(path: &Path, root: &Path, patterns: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|component| {
        let component = component.as_os_str().to_string_lossy();
        patterns.iter().any(|p| component == p.as_str())
    })
}
