//! Tests for CSV table loading through TableStore

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use common::{counts_csv, rates_csv, write_file};
use mutsieve::domain::{Hierarchy, Tier, ROOT_FEATURE};
use mutsieve::infrastructure::traits::RealFileSystem;
use mutsieve::infrastructure::{InfraError, TableStore};

fn store() -> TableStore {
    TableStore::new(Arc::new(RealFileSystem))
}

#[test]
fn given_counts_with_sample_column_when_reading_then_keeps_sample_names() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = write_file(
        &temp,
        "counts.csv",
        &counts_csv(&[("tumor_1", vec![1; 96]), ("tumor_2", vec![2; 96])]),
    );

    // Act
    let table = store().read_counts(&path).unwrap();

    // Assert
    assert_eq!(table.samples(), &["tumor_1".to_string(), "tumor_2".to_string()]);
    assert_eq!(table.columns().len(), 96);
    assert_eq!(table.column_sums().unwrap()["T[T>G]T"], 3);
}

#[test]
fn given_ragged_counts_when_reading_then_csv_error_names_file() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "ragged.csv", "a,b,c\n1,2\n");

    // Act
    let err = store().read_counts(&path).unwrap_err();

    // Assert
    assert!(matches!(err, InfraError::Csv { .. }));
    assert!(err.to_string().contains("ragged.csv"));
}

#[test]
fn given_missing_file_when_reading_then_not_found() {
    // Arrange
    let temp = TempDir::new().unwrap();

    // Act
    let err = store().read_counts(&temp.path().join("absent.csv")).unwrap_err();

    // Assert
    assert!(matches!(err, InfraError::NotFound(_)));
}

#[test]
fn given_written_hierarchy_when_reading_back_then_matches() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("hierarchy.csv");
    let mut rates = std::collections::BTreeMap::new();
    for (i, context) in mutsieve::domain::trinucleotide::leaf_contexts().into_iter().enumerate() {
        rates.insert(context, 0.5 + i as f64 / 10.0);
    }
    let original = Hierarchy::trinucleotide(&rates).unwrap();

    // Act
    store().write_hierarchy(&path, &original).unwrap();
    let loaded = store().read_hierarchy(&path).unwrap();

    // Assert
    assert_eq!(loaded.records(), original.records());
}

#[test]
fn given_rates_file_when_loading_background_then_builds_trinucleotide_hierarchy() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "rates.csv", &rates_csv(&[("A[C>T]G", 5.0)]));

    // Act
    let hierarchy = store().load_background(&path).unwrap();

    // Assert
    assert_eq!(hierarchy.features_in(Tier::C).count(), 96);
    assert_eq!(hierarchy.root().unwrap().id, ROOT_FEATURE);
    assert!((hierarchy.get("A[C>T]G").unwrap().background_prob - 5.0 / 8.0).abs() < 1e-12);
}

#[test]
fn given_incomplete_rates_when_loading_background_then_schema_error_names_context() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let content: String = rates_csv(&[])
        .lines()
        .filter(|l| !l.starts_with("G[T>C]A"))
        .map(|l| format!("{l}\n"))
        .collect();
    let path = write_file(&temp, "rates.csv", &content);

    // Act
    let err = store().load_background(&path).unwrap_err();

    // Assert
    assert!(err.to_string().contains("G[T>C]A"));
}
