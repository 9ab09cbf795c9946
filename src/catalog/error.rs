//! Ошибки каталога.
//!
//! Все ошибки возвращаются значением; неудачная операция оставляет каталог
//! ровно в том состоянии, в котором он был до вызова.

use thiserror::Error;

use crate::source::SourceError;

/// Ошибка создания объекта
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    /// Число строк или столбцов равно нулю
    #[error("invalid dimensions {rows}x{cols}: rows and cols must be positive")]
    InvalidDimensions { rows: usize, cols: usize },

    /// Матрица превышает настроенный лимит элементов
    #[error("matrix {rows}x{cols} exceeds the limit of {max} elements")]
    TooLarge { rows: usize, cols: usize, max: usize },

    /// Имя уже занято
    #[error("object '{0}' already exists")]
    AlreadyExists(String),

    /// Нарушение внутреннего инварианта (сбой выделения памяти, рассинхронизация)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Ошибка умножения
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultiplyError {
    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("dimension mismatch: A has {a_cols} columns but B has {b_rows} rows")]
    DimensionMismatch { a_cols: usize, b_rows: usize },

    #[error("object '{0}' already exists")]
    AlreadyExists(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Ошибка загрузки из внешнего источника
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("object '{0}' already exists")]
    AlreadyExists(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CreateError> for LoadError {
    fn from(e: CreateError) -> Self {
        match e {
            CreateError::AlreadyExists(name) => LoadError::AlreadyExists(name),
            // форма уже проверена до привязки
            other @ (CreateError::InvalidDimensions { .. } | CreateError::TooLarge { .. }) => {
                LoadError::Internal(other.to_string())
            }
            CreateError::Internal(msg) => LoadError::Internal(msg),
        }
    }
}

/// Объект с таким именем отсутствует
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("object '{0}' not found")]
pub struct NotFound(pub String);
