//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use mutsieve::domain::trinucleotide::leaf_contexts;
use mutsieve::domain::CountsTable;

/// Single-sample table: every leaf at `base` except the given overrides.
pub fn counts_with(overrides: &[(&str, i64)], base: i64) -> CountsTable {
    CountsTable::from_totals(leaf_contexts().into_iter().map(|context| {
        let value = overrides
            .iter()
            .find(|(k, _)| *k == context)
            .map_or(base, |(_, v)| *v);
        (context, value)
    }))
    .expect("valid counts table")
}

/// One dominant leaf, `A[C>A]A = 2100`, on a flat background of 100.
pub fn dominant_leaf_counts() -> CountsTable {
    counts_with(&[("A[C>A]A", 2100)], 100)
}

/// CSV text with a leading sample column.
pub fn counts_csv(samples: &[(&str, Vec<i64>)]) -> String {
    let mut out = String::from("sample");
    for context in leaf_contexts() {
        out.push(',');
        out.push_str(&context);
    }
    out.push('\n');
    for (name, row) in samples {
        out.push_str(name);
        for value in row {
            out.push(',');
            out.push_str(&value.to_string());
        }
        out.push('\n');
    }
    out
}

/// `context,rate` CSV with every rate 1 except the overrides.
pub fn rates_csv(overrides: &[(&str, f64)]) -> String {
    let mut out = String::from("context,rate\n");
    for context in leaf_contexts() {
        let rate = overrides
            .iter()
            .find(|(k, _)| *k == context)
            .map_or(1.0, |(_, v)| *v);
        out.push_str(&format!("{context},{rate}\n"));
    }
    out
}

/// Helper to create temp files for testing
pub fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write test file");
    path
}

/// In-memory filesystem for wiring services without touching disk.
#[derive(Default)]
pub struct MemoryFs {
    files: std::sync::Mutex<std::collections::HashMap<PathBuf, String>>,
}

impl MemoryFs {
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), content.to_string());
        self
    }
}

impl mutsieve::infrastructure::traits::FileSystem for MemoryFs {
    fn read_to_string(&self, path: &std::path::Path) -> std::io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
    }

    fn write(&self, path: &std::path::Path, content: &str) -> std::io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn exists(&self, path: &std::path::Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn create_dir_all(&self, _path: &std::path::Path) -> std::io::Result<()> {
        Ok(())
    }
}
