//! Обработчик запросов: переводит сообщения протокола в вызовы каталога

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use super::protocol::{ErrorCode, MatrixInfo, ObjectInfo, Payload, Request, Response, MATRIX_OBJECT_TYPE};
use crate::catalog::{MatrixHandle, ObjectCatalog};
use crate::config::{ServerConfig, DEFAULT_MAX_RESPONSE_BYTES};
use crate::matrix::{KernelPool, MultiplyMode};
use crate::source::{CsvFileSource, DefaultSource, MatrixSource};
use crate::utils::{elapsed_ms, measure_time};

/// Верхняя оценка длины одного значения в JSON вместе с запятой
const MAX_ENCODED_VALUE_BYTES: usize = 16;

/// Запас на имя, форму и служебные поля ответа `data`
const DATA_RESPONSE_OVERHEAD: usize = 128;

/// Сервис матриц: каталог и источник данных для загрузки
pub struct MatrixService {
    catalog: Arc<ObjectCatalog>,
    source: Arc<dyn MatrixSource>,
    max_response_bytes: usize,
}

impl MatrixService {
    pub fn new(catalog: Arc<ObjectCatalog>, source: Arc<dyn MatrixSource>) -> Self {
        Self {
            catalog,
            source,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Ответы `get_data` длиннее лимита отклоняются до сериализации
    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    /// Собирает сервис по конфигурации
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let pool = KernelPool::new(config.kernel_threads)
            .context("Не удалось создать пул потоков для ядер")?;
        info!(threads = pool.threads(), "kernel pool ready");

        let catalog = ObjectCatalog::new()
            .with_pool(pool)
            .with_max_elements(config.max_elements);
        let files = match &config.data_dir {
            Some(dir) => CsvFileSource::with_root(dir),
            None => CsvFileSource::new(),
        };
        let source = DefaultSource::new(files).with_max_elements(config.max_elements);

        Ok(Self::new(Arc::new(catalog), Arc::new(source))
            .with_max_response_bytes(config.max_response_bytes))
    }

    pub fn catalog(&self) -> &Arc<ObjectCatalog> {
        &self.catalog
    }

    /// Обрабатывает один запрос. Может долго считать, вызывать вне async-реактора.
    pub fn handle(&self, request: Request) -> Response {
        let op = request.op();
        let (response, elapsed) = measure_time(|| self.dispatch(request));

        match &response {
            Response::Ok(_) => info!(op, elapsed_ms = elapsed_ms(elapsed), "request completed"),
            Response::Error {
                code: ErrorCode::Internal,
                message,
            } => error!(op, %message, "internal error"),
            Response::Error { code, message } => warn!(op, %code, %message, "request failed"),
        }
        response
    }

    fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::CreateZero { name, rows, cols } => self.create_zero(&name, rows, cols),
            Request::Load { name, source } => {
                info!(name = %name, source = %source, "loading matrix");
                match self.catalog.load(&name, self.source.as_ref(), &source) {
                    Ok(handle) => matrix_info(&handle),
                    Err(e) => Response::error(ErrorCode::from(&e), e.to_string()),
                }
            }
            Request::GetSize { name } => match self.catalog.size(&name) {
                Ok((rows, cols)) => Response::Ok(Payload::Size { rows, cols }),
                Err(e) => Response::error(ErrorCode::from(&e), e.to_string()),
            },
            Request::Multiply {
                a,
                b,
                result,
                mode,
            } => self.multiply(&a, &b, &result, mode),
            Request::ListObjects => {
                let objects = self
                    .catalog
                    .list()
                    .into_iter()
                    .map(|name| ObjectInfo {
                        name,
                        kind: MATRIX_OBJECT_TYPE.to_owned(),
                    })
                    .collect();
                Response::Ok(Payload::Objects { objects })
            }
            Request::Remove { name } => Response::Ok(Payload::Removed {
                existed: self.catalog.remove(&name),
            }),
            Request::GetData { name } => self.get_data(&name),
        }
    }

    fn create_zero(&self, name: &str, rows: i64, cols: i64) -> Response {
        info!(name, rows, cols, "creating zero matrix");
        let (rows, cols) = match (usize::try_from(rows), usize::try_from(cols)) {
            (Ok(rows), Ok(cols)) => (rows, cols),
            _ => {
                return Response::error(
                    ErrorCode::InvalidDimensions,
                    format!("invalid dimensions {}x{}: rows and cols must be positive", rows, cols),
                )
            }
        };
        match self.catalog.create(name, rows, cols) {
            Ok(handle) => matrix_info(&handle),
            Err(e) => Response::error(ErrorCode::from(&e), e.to_string()),
        }
    }

    fn get_data(&self, name: &str) -> Response {
        let handle = match self.catalog.get(name) {
            Some(handle) => handle,
            None => return Response::error(ErrorCode::NotFound, format!("object '{}' not found", name)),
        };
        let estimate = handle
            .rows()
            .saturating_mul(handle.cols())
            .saturating_mul(MAX_ENCODED_VALUE_BYTES)
            .saturating_add(DATA_RESPONSE_OVERHEAD);
        if estimate > self.max_response_bytes {
            return Response::error(
                ErrorCode::ResponseTooLarge,
                format!(
                    "matrix '{}' ({}x{}) may exceed the {} byte response limit",
                    name,
                    handle.rows(),
                    handle.cols(),
                    self.max_response_bytes
                ),
            );
        }
        Response::Ok(Payload::Data(handle.to_data()))
    }

    fn multiply(&self, a: &str, b: &str, result: &str, mode: MultiplyMode) -> Response {
        info!(a, b, result, %mode, "multiplying matrices");
        match self.catalog.multiply(a, b, result, mode) {
            Ok(handle) => matrix_info(&handle),
            Err(e) => Response::error(ErrorCode::from(&e), e.to_string()),
        }
    }
}

fn matrix_info(handle: &MatrixHandle) -> Response {
    Response::Ok(Payload::MatrixInfo(MatrixInfo {
        name: handle.name().to_owned(),
        rows: handle.rows(),
        cols: handle.cols(),
    }))
}

impl std::fmt::Debug for MatrixService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixService")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
