use std::sync::Arc;

use super::*;
use crate::matrix::{MatrixData, MultiplyMode};
use crate::source::{MatrixSource, SourceError};

/// Источник, отдающий заранее заданные данные
struct FixedSource(Result<MatrixData, String>);

impl MatrixSource for FixedSource {
    fn fetch(&self, descriptor: &str) -> Result<MatrixData, SourceError> {
        self.0.clone().map_err(|reason| SourceError::Malformed {
            descriptor: descriptor.to_owned(),
            reason,
        })
    }
}

fn catalog_with(entries: &[(&str, usize, usize, Vec<f32>)]) -> ObjectCatalog {
    let catalog = ObjectCatalog::new();
    for (name, rows, cols, values) in entries {
        catalog
            .create_with_data(name, MatrixData::new(*rows, *cols, values.clone()))
            .unwrap();
    }
    catalog
}

#[test]
fn create_zero_matrix_reports_shape() {
    let catalog = ObjectCatalog::new();
    let handle = catalog.create("A", 2, 3).unwrap();

    assert_eq!(handle.name(), "A");
    assert_eq!(handle.size(), (2, 3));
    assert_eq!(catalog.size("A"), Ok((2, 3)));
    assert!(handle.read().iter().all(|v| *v == 0.0));
}

#[test]
fn create_rejects_zero_dimensions() {
    let catalog = ObjectCatalog::new();
    assert_eq!(
        catalog.create("A", 0, 3).unwrap_err(),
        CreateError::InvalidDimensions { rows: 0, cols: 3 }
    );
    assert_eq!(
        catalog.create("A", 3, 0).unwrap_err(),
        CreateError::InvalidDimensions { rows: 3, cols: 0 }
    );
    assert!(catalog.is_empty());
}

#[test]
fn create_rejects_oversized_matrix() {
    let catalog = ObjectCatalog::new().with_max_elements(100);
    assert!(matches!(
        catalog.create("big", 11, 10),
        Err(CreateError::TooLarge { max: 100, .. })
    ));
    assert!(matches!(
        catalog.create("huge", usize::MAX, 2),
        Err(CreateError::TooLarge { .. })
    ));
    assert!(catalog.create("ok", 10, 10).is_ok());
}

#[test]
fn duplicate_create_keeps_original() {
    let catalog = ObjectCatalog::new();
    catalog.create("A", 2, 2).unwrap();

    assert_eq!(
        catalog.create("A", 3, 3).unwrap_err(),
        CreateError::AlreadyExists("A".into())
    );
    assert_eq!(catalog.size("A"), Ok((2, 2)));
    assert_eq!(catalog.list(), vec!["A"]);
}

#[test]
fn create_with_data_checks_buffer_length() {
    let catalog = ObjectCatalog::new();
    let err = catalog
        .create_with_data("A", MatrixData::new(2, 2, vec![1.0; 3]))
        .unwrap_err();
    assert!(matches!(err, CreateError::Internal(_)));
    assert!(!catalog.contains("A"));
}

#[test]
fn remove_unbinds_name_and_data() {
    let catalog = ObjectCatalog::new();
    catalog.create("A", 1, 1).unwrap();

    assert!(catalog.remove("A"));
    assert!(!catalog.remove("A"));
    assert!(!catalog.contains("A"));
    assert!(catalog.get("A").is_none());
    assert_eq!(catalog.size("A"), Err(NotFound("A".into())));

    // имя снова свободно
    assert!(catalog.create("A", 4, 4).is_ok());
}

#[test]
fn handle_outlives_removal() {
    let catalog = catalog_with(&[("A", 1, 2, vec![5.0, 6.0])]);
    let handle = catalog.get("A").unwrap();
    catalog.remove("A");

    assert_eq!(&**handle.read(), &[5.0, 6.0]);
}

#[test]
fn multiply_of_zero_matrices() {
    let catalog = ObjectCatalog::new();
    catalog.create("A", 2, 3).unwrap();
    catalog.create("B", 3, 2).unwrap();

    let c = catalog.multiply("A", "B", "C", MultiplyMode::Naive).unwrap();
    assert_eq!(c.size(), (2, 2));
    assert_eq!(catalog.size("C"), Ok((2, 2)));
    assert_eq!(c.to_data().values, vec![0.0; 4]);
}

#[test]
fn multiply_modes_produce_same_values() {
    let catalog = catalog_with(&[
        ("A", 2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        ("B", 3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]),
    ]);

    let naive = catalog.multiply("A", "B", "N", MultiplyMode::Naive).unwrap();
    let transpose = catalog.multiply("A", "B", "T", MultiplyMode::Transpose).unwrap();

    assert_eq!(naive.to_data().values, vec![58.0, 64.0, 139.0, 154.0]);
    assert_eq!(naive.to_data(), transpose.to_data());
}

#[test]
fn multiply_matrix_by_itself() {
    let catalog = catalog_with(&[("A", 2, 2, vec![1.0, 1.0, 0.0, 1.0])]);
    let squared = catalog.multiply("A", "A", "A2", MultiplyMode::Transpose).unwrap();
    assert_eq!(squared.to_data().values, vec![1.0, 2.0, 0.0, 1.0]);
}

#[test]
fn multiply_missing_input_creates_nothing() {
    let catalog = ObjectCatalog::new();
    catalog.create("Y", 2, 2).unwrap();

    assert_eq!(
        catalog.multiply("X", "Y", "Z", MultiplyMode::Naive).unwrap_err(),
        MultiplyError::NotFound("X".into())
    );
    assert_eq!(
        catalog.multiply("Y", "X", "Z", MultiplyMode::Naive).unwrap_err(),
        MultiplyError::NotFound("X".into())
    );
    assert_eq!(catalog.list(), vec!["Y"]);
}

#[test]
fn multiply_dimension_mismatch_creates_nothing() {
    let catalog = ObjectCatalog::new();
    catalog.create("A", 2, 3).unwrap();
    catalog.create("B", 2, 3).unwrap();

    assert_eq!(
        catalog.multiply("A", "B", "C", MultiplyMode::Naive).unwrap_err(),
        MultiplyError::DimensionMismatch { a_cols: 3, b_rows: 2 }
    );
    assert!(!catalog.contains("C"));
}

#[test]
fn multiply_into_existing_name_leaves_it_untouched() {
    let catalog = catalog_with(&[
        ("A", 1, 1, vec![2.0]),
        ("B", 1, 1, vec![3.0]),
        ("C", 1, 1, vec![9.0]),
    ]);

    assert_eq!(
        catalog.multiply("A", "B", "C", MultiplyMode::Naive).unwrap_err(),
        MultiplyError::AlreadyExists("C".into())
    );
    assert_eq!(catalog.get("C").unwrap().to_data().values, vec![9.0]);

    // результат не может совпадать с входом
    assert_eq!(
        catalog.multiply("A", "B", "A", MultiplyMode::Naive).unwrap_err(),
        MultiplyError::AlreadyExists("A".into())
    );
}

#[test]
fn catalog_with_own_pool() {
    let pool = crate::matrix::KernelPool::new(2).unwrap();
    let catalog = ObjectCatalog::new().with_pool(pool);
    catalog
        .create_with_data("A", MatrixData::new(1, 2, vec![1.0, 2.0]))
        .unwrap();
    catalog
        .create_with_data("B", MatrixData::new(2, 1, vec![3.0, 4.0]))
        .unwrap();

    let c = catalog.multiply("A", "B", "C", MultiplyMode::Naive).unwrap();
    assert_eq!(c.to_data().values, vec![11.0]);
}

#[test]
fn load_binds_source_data() {
    let catalog = ObjectCatalog::new();
    let source = FixedSource(Ok(MatrixData::new(2, 1, vec![1.5, 2.5])));

    let handle = catalog.load("L", &source, "anything").unwrap();
    assert_eq!(handle.size(), (2, 1));
    assert_eq!(catalog.get("L").unwrap().to_data().values, vec![1.5, 2.5]);
}

#[test]
fn load_failures_leave_catalog_unchanged() {
    let catalog = ObjectCatalog::new();
    catalog.create("taken", 1, 1).unwrap();

    let good = FixedSource(Ok(MatrixData::new(1, 1, vec![1.0])));
    assert!(matches!(
        catalog.load("taken", &good, "x"),
        Err(LoadError::AlreadyExists(_))
    ));

    let broken = FixedSource(Err("unreadable".into()));
    assert!(matches!(
        catalog.load("L", &broken, "x"),
        Err(LoadError::SourceUnavailable(_))
    ));

    let ragged = FixedSource(Ok(MatrixData::new(2, 2, vec![1.0])));
    assert!(matches!(
        catalog.load("L", &ragged, "x"),
        Err(LoadError::SourceUnavailable(_))
    ));

    let empty = FixedSource(Ok(MatrixData::new(0, 2, vec![])));
    assert!(matches!(
        catalog.load("L", &empty, "x"),
        Err(LoadError::SourceUnavailable(SourceError::Malformed { .. }))
    ));

    assert_eq!(catalog.list(), vec!["taken"]);
}

#[test]
fn load_of_oversized_source_is_source_unavailable() {
    let catalog = ObjectCatalog::new().with_max_elements(4);
    let big = FixedSource(Ok(MatrixData::new(1, 5, vec![0.0; 5])));
    assert!(matches!(
        catalog.load("L", &big, "x"),
        Err(LoadError::SourceUnavailable(_))
    ));
    assert!(catalog.is_empty());
}

#[test]
fn concurrent_creates_have_one_winner() {
    let catalog = Arc::new(ObjectCatalog::new());
    let workers: Vec<_> = (0..16)
        .map(|i| {
            let catalog = Arc::clone(&catalog);
            std::thread::spawn(move || catalog.create("shared", i + 1, 1).is_ok())
        })
        .collect();

    let winners = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(catalog.len(), 1);
}
