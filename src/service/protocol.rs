//! Сообщения протокола.
//!
//! Транспорт - JSON по строкам: один запрос в строке, один ответ в строке.
//!
//! ```text
//! -> {"op":"create_zero","name":"A","rows":2,"cols":3}
//! <- {"status":"ok","kind":"matrix_info","name":"A","rows":2,"cols":3}
//! -> {"op":"get_size","name":"missing"}
//! <- {"status":"error","code":"not_found","message":"object 'missing' not found"}
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::{CreateError, LoadError, MultiplyError, NotFound};
use crate::matrix::{MatrixData, MultiplyMode};

/// Тип объектов, хранимых сервисом
pub const MATRIX_OBJECT_TYPE: &str = "Matrix";

/// Запрос клиента
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Создать матрицу из нулей
    CreateZero { name: String, rows: i64, cols: i64 },
    /// Загрузить матрицу из источника на стороне сервера
    Load { name: String, source: String },
    /// Размер матрицы
    GetSize { name: String },
    /// `result = a * b`
    Multiply {
        a: String,
        b: String,
        result: String,
        #[serde(default)]
        mode: MultiplyMode,
    },
    /// Список объектов
    ListObjects,
    /// Удалить объект
    Remove { name: String },
    /// Содержимое матрицы
    GetData { name: String },
}

impl Request {
    /// Короткое имя операции для логов
    pub fn op(&self) -> &'static str {
        match self {
            Request::CreateZero { .. } => "create_zero",
            Request::Load { .. } => "load",
            Request::GetSize { .. } => "get_size",
            Request::Multiply { .. } => "multiply",
            Request::ListObjects => "list_objects",
            Request::Remove { .. } => "remove",
            Request::GetData { .. } => "get_data",
        }
    }
}

/// Ответ сервера
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok(Payload),
    Error { code: ErrorCode, message: String },
}

impl Response {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }
}

/// Полезная нагрузка успешного ответа
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    MatrixInfo(MatrixInfo),
    Size { rows: usize, cols: usize },
    Objects { objects: Vec<ObjectInfo> },
    Removed { existed: bool },
    Data(MatrixData),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixInfo {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Код ошибки на проводе
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidDimensions,
    AlreadyExists,
    NotFound,
    DimensionMismatch,
    SourceUnavailable,
    InvalidRequest,
    ResponseTooLarge,
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCode::InvalidDimensions => "invalid_dimensions",
            ErrorCode::AlreadyExists => "already_exists",
            ErrorCode::NotFound => "not_found",
            ErrorCode::DimensionMismatch => "dimension_mismatch",
            ErrorCode::SourceUnavailable => "source_unavailable",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::ResponseTooLarge => "response_too_large",
            ErrorCode::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl From<&CreateError> for ErrorCode {
    fn from(e: &CreateError) -> Self {
        match e {
            CreateError::InvalidDimensions { .. } | CreateError::TooLarge { .. } => {
                ErrorCode::InvalidDimensions
            }
            CreateError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            CreateError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<&MultiplyError> for ErrorCode {
    fn from(e: &MultiplyError) -> Self {
        match e {
            MultiplyError::NotFound(_) => ErrorCode::NotFound,
            MultiplyError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            MultiplyError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            MultiplyError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<&LoadError> for ErrorCode {
    fn from(e: &LoadError) -> Self {
        match e {
            LoadError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            LoadError::SourceUnavailable(_) => ErrorCode::SourceUnavailable,
            LoadError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<&NotFound> for ErrorCode {
    fn from(_: &NotFound) -> Self {
        ErrorCode::NotFound
    }
}
