//! Каталог объектов: реестр имён и хранилище матриц под одной блокировкой

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, error, info};

use super::error::{CreateError, LoadError, MultiplyError, NotFound};
use super::registry::NameRegistry;
use super::store::MatrixStore;
use crate::matrix::{self, element_count, KernelPool, Matrix, MatrixData, MultiplyMode};
use crate::source::{MatrixSource, SourceError};
use crate::utils::{elapsed_ms, measure_time};

/// Лимит элементов по умолчанию (1 ГиБ данных f32)
pub const DEFAULT_MAX_ELEMENTS: usize = 1 << 28;

/// Ссылка на матрицу, выданная каталогом.
///
/// Пока ссылка жива, данные матрицы не освобождаются, даже если имя уже
/// удалено из каталога. Форма неизменна, поэтому размеры читаются без блокировок.
#[derive(Clone)]
pub struct MatrixHandle {
    name: Arc<str>,
    matrix: Arc<Matrix>,
}

impl MatrixHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> usize {
        self.matrix.rows()
    }

    pub fn cols(&self) -> usize {
        self.matrix.cols()
    }

    pub fn size(&self) -> (usize, usize) {
        (self.matrix.rows(), self.matrix.cols())
    }

    /// Данные только для чтения на время одной операции
    pub fn read(&self) -> RwLockReadGuard<'_, Box<[f32]>> {
        self.matrix.read()
    }

    pub fn to_data(&self) -> MatrixData {
        self.matrix.to_data()
    }
}

impl fmt::Debug for MatrixHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixHandle")
            .field("name", &self.name)
            .field("rows", &self.rows())
            .field("cols", &self.cols())
            .finish()
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    registry: NameRegistry,
    store: MatrixStore,
}

impl CatalogState {
    fn lookup(&self, name: &str) -> Option<Arc<Matrix>> {
        if self.registry.contains(name) {
            self.store.get(name)
        } else {
            None
        }
    }
}

/// Каталог именованных матриц.
///
/// Реестр имён и хранилище изменяются только вместе, под одной блокировкой,
/// поэтому никто не видит имя без данных или данные без имени. Арифметика
/// умножения выполняется вне этой блокировки.
pub struct ObjectCatalog {
    state: RwLock<CatalogState>,
    pool: Option<KernelPool>,
    max_elements: usize,
}

impl Default for ObjectCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectCatalog {
    /// Каталог, ядра которого работают в глобальном пуле rayon
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            pool: None,
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }

    /// Ядра будут работать в отдельном пуле
    pub fn with_pool(mut self, pool: KernelPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.max_elements = max_elements;
        self
    }

    fn check_dimensions(&self, rows: usize, cols: usize) -> Result<(), CreateError> {
        if rows == 0 || cols == 0 {
            return Err(CreateError::InvalidDimensions { rows, cols });
        }
        match element_count(rows, cols) {
            Ok(n) if n <= self.max_elements => Ok(()),
            _ => Err(CreateError::TooLarge {
                rows,
                cols,
                max: self.max_elements,
            }),
        }
    }

    /// Атомарно резервирует имя и привязывает к нему матрицу.
    ///
    /// Если привязка в хранилище не удалась, резерв снимается до выхода.
    fn bind(&self, name: &str, matrix: Arc<Matrix>) -> Result<MatrixHandle, CreateError> {
        let mut state = self.state.write();
        if !state.registry.reserve(name) {
            return Err(CreateError::AlreadyExists(name.to_owned()));
        }
        if let Err(e) = state.store.emplace(name, Arc::clone(&matrix)) {
            state.registry.release(name);
            error!(name, error = %e, "store holds data for an unregistered name");
            return Err(CreateError::Internal(e.to_string()));
        }
        Ok(MatrixHandle {
            name: Arc::from(name),
            matrix,
        })
    }

    /// Снимает привязку, только если имя всё ещё указывает на `matrix`
    fn unbind(&self, name: &str, matrix: &Arc<Matrix>) {
        let mut state = self.state.write();
        if state.store.erase_if_same(name, matrix) {
            state.registry.release(name);
        }
    }

    /// Создает матрицу из нулей
    pub fn create(&self, name: &str, rows: usize, cols: usize) -> Result<MatrixHandle, CreateError> {
        self.check_dimensions(rows, cols)?;
        if self.contains(name) {
            return Err(CreateError::AlreadyExists(name.to_owned()));
        }

        let matrix = Matrix::zeroed(rows, cols).map_err(|e| CreateError::Internal(e.to_string()))?;
        let handle = self.bind(name, Arc::new(matrix))?;
        info!(name, rows, cols, "created matrix");
        Ok(handle)
    }

    /// Создает матрицу с готовыми данными по тому же атомарному контракту, что и [`create`](Self::create)
    pub fn create_with_data(&self, name: &str, data: MatrixData) -> Result<MatrixHandle, CreateError> {
        self.check_dimensions(data.rows, data.cols)?;
        if !data.is_well_formed() {
            return Err(CreateError::Internal(format!(
                "buffer of {} values does not match {}x{}",
                data.values.len(),
                data.rows,
                data.cols
            )));
        }

        let (rows, cols) = (data.rows, data.cols);
        let handle = self.bind(name, Arc::new(Matrix::from_data(data)))?;
        info!(name, rows, cols, "created matrix from data");
        Ok(handle)
    }

    /// Загружает матрицу из внешнего источника.
    ///
    /// Источник читается вне блокировки каталога; данные привязываются
    /// через [`create_with_data`](Self::create_with_data). Неверная форма
    /// данных источника считается недоступностью источника.
    pub fn load(
        &self,
        name: &str,
        source: &dyn MatrixSource,
        descriptor: &str,
    ) -> Result<MatrixHandle, LoadError> {
        if self.contains(name) {
            return Err(LoadError::AlreadyExists(name.to_owned()));
        }

        let data = source.fetch(descriptor)?;
        let malformed = |reason: String| -> LoadError {
            SourceError::Malformed {
                descriptor: descriptor.to_owned(),
                reason,
            }
            .into()
        };
        if let Err(e) = self.check_dimensions(data.rows, data.cols) {
            return Err(malformed(e.to_string()));
        }
        if !data.is_well_formed() {
            return Err(malformed(format!(
                "{} values do not form a {}x{} matrix",
                data.values.len(),
                data.rows,
                data.cols
            )));
        }

        Ok(self.create_with_data(name, data)?)
    }

    /// Удаляет объект; возвращает, существовал ли он
    pub fn remove(&self, name: &str) -> bool {
        let mut state = self.state.write();
        let registered = state.registry.release(name);
        let stored = state.store.erase(name);
        if registered != stored {
            error!(name, registered, stored, "registry and store disagreed on removal");
        }
        if registered {
            info!(name, "removed matrix");
        }
        registered
    }

    pub fn get(&self, name: &str) -> Option<MatrixHandle> {
        let state = self.state.read();
        state.lookup(name).map(|matrix| MatrixHandle {
            name: Arc::from(name),
            matrix,
        })
    }

    /// Размер матрицы `(rows, cols)`
    pub fn size(&self, name: &str) -> Result<(usize, usize), NotFound> {
        self.get(name)
            .map(|handle| handle.size())
            .ok_or_else(|| NotFound(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.read().registry.contains(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.state.read().registry.list()
    }

    /// Каждое занятое имя привязано к матрице, и каждая матрица - к занятому имени.
    /// Проверяется одним снимком под блокировкой каталога.
    pub fn is_consistent(&self) -> bool {
        let state = self.state.read();
        state.registry.len() == state.store.len()
            && state.registry.iter().all(|name| state.store.contains(name))
    }

    pub fn len(&self) -> usize {
        self.state.read().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Умножает `a` на `b` и сохраняет результат под именем `result_name`.
    ///
    /// Имя результата резервируется вместе с буфером под блокировкой каталога,
    /// а заполняется буфер уже после её снятия. Запись в буфер захвачена до
    /// публикации, поэтому читатели результата ждут окончания вычислений.
    pub fn multiply(
        &self,
        a_name: &str,
        b_name: &str,
        result_name: &str,
        mode: MultiplyMode,
    ) -> Result<MatrixHandle, MultiplyError> {
        let (a, b) = {
            let state = self.state.read();
            let a = state
                .lookup(a_name)
                .ok_or_else(|| MultiplyError::NotFound(a_name.to_owned()))?;
            let b = state
                .lookup(b_name)
                .ok_or_else(|| MultiplyError::NotFound(b_name.to_owned()))?;
            (a, b)
        };

        if a.cols() != b.rows() {
            return Err(MultiplyError::DimensionMismatch {
                a_cols: a.cols(),
                b_rows: b.rows(),
            });
        }
        let (a_rows, shared_dim, b_cols) = (a.rows(), a.cols(), b.cols());

        self.check_dimensions(a_rows, b_cols)
            .map_err(|e| MultiplyError::Internal(e.to_string()))?;
        let internal = |e: matrix::AllocError| MultiplyError::Internal(e.to_string());
        let result = Arc::new(Matrix::zeroed(a_rows, b_cols).map_err(internal)?);
        let mut scratch = match mode {
            MultiplyMode::Naive => Vec::new(),
            MultiplyMode::Transpose => matrix::zeroed_buffer(shared_dim, b_cols).map_err(internal)?,
        };

        let mut out = result.write();
        let handle = self
            .bind(result_name, Arc::clone(&result))
            .map_err(|e| match e {
                CreateError::AlreadyExists(name) => MultiplyError::AlreadyExists(name),
                other => MultiplyError::Internal(other.to_string()),
            })?;

        let a_data = a.read();
        let b_guard;
        let b_data: &[f32] = if Arc::ptr_eq(&a, &b) {
            &a_data
        } else {
            b_guard = b.read();
            &b_guard
        };
        let a_data: &[f32] = &a_data;
        let c_data: &mut [f32] = &mut out;

        if a_data.len() != a_rows * shared_dim
            || b_data.len() != shared_dim * b_cols
            || c_data.len() != a_rows * b_cols
        {
            drop(out);
            self.unbind(result_name, &result);
            error!(a_name, b_name, result_name, "buffer lengths disagree with validated shapes");
            return Err(MultiplyError::Internal(format!(
                "buffer lengths disagree with shapes {}x{} * {}x{}",
                a_rows, shared_dim, shared_dim, b_cols
            )));
        }

        let mut compute = || match mode {
            MultiplyMode::Naive => {
                matrix::multiply_naive(a_data, b_data, c_data, shared_dim, a_rows, b_cols)
            }
            MultiplyMode::Transpose => matrix::multiply_transpose(
                a_data,
                b_data,
                &mut scratch,
                c_data,
                shared_dim,
                a_rows,
                b_cols,
            ),
        };
        let ((), elapsed) = measure_time(|| match &self.pool {
            Some(pool) => pool.run(compute),
            None => compute(),
        });
        drop(out);

        debug!(
            a_name, b_name, result_name, %mode, rows = a_rows, cols = b_cols,
            elapsed_ms = elapsed_ms(elapsed),
            "multiplied matrices"
        );
        Ok(handle)
    }
}

impl fmt::Debug for ObjectCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCatalog")
            .field("objects", &self.len())
            .field("pool", &self.pool)
            .field("max_elements", &self.max_elements)
            .finish()
    }
}
