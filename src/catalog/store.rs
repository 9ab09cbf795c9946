//! Хранилище матриц по имени

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::matrix::Matrix;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("matrix '{0}' is already stored")]
    AlreadyExists(String),
}

/// Владелец данных матриц.
///
/// Согласованность с реестром имён обеспечивает каталог; хранилище лишь
/// отказывается перезаписывать уже привязанную матрицу.
#[derive(Debug, Default)]
pub struct MatrixStore {
    matrices: HashMap<String, Arc<Matrix>>,
}

impl MatrixStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Привязывает матрицу к имени
    pub fn emplace(&mut self, name: &str, matrix: Arc<Matrix>) -> Result<(), StoreError> {
        if self.matrices.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_owned()));
        }
        self.matrices.insert(name.to_owned(), matrix);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Matrix>> {
        self.matrices.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.matrices.contains_key(name)
    }

    pub fn erase(&mut self, name: &str) -> bool {
        self.matrices.remove(name).is_some()
    }

    /// Удаляет запись, только если она указывает на ту же матрицу
    pub fn erase_if_same(&mut self, name: &str, matrix: &Arc<Matrix>) -> bool {
        match self.matrices.get(name) {
            Some(stored) if Arc::ptr_eq(stored, matrix) => {
                self.matrices.remove(name);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}
