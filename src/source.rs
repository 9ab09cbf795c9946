//! Источники данных для загрузки матриц.
//!
//! Каталог не разбирает файлы сам: он получает от источника готовые
//! `(rows, cols, values)` и привязывает их атомарно.
//!
//! Поддерживаемые дескрипторы [`DefaultSource`]:
//! - `gen:<pattern>:<rows>x<cols>` - сгенерированная матрица
//!   (`zeros`, `ones`, `twos`, `identity`, `random`);
//! - всё остальное - путь к текстовому файлу внутри каталога данных,
//!   значения через запятую или пробелы, по строке файла на строку матрицы.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::catalog::DEFAULT_MAX_ELEMENTS;
use crate::matrix::{element_count, initialize_matrix, MatrixData, MatrixType};

/// Префикс дескрипторов генератора
pub const PATTERN_PREFIX: &str = "gen:";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed matrix source '{descriptor}': {reason}")]
    Malformed { descriptor: String, reason: String },

    #[error("unsupported source descriptor '{0}'")]
    Unsupported(String),

    #[error("matrix source '{descriptor}' rejected: {reason}")]
    Rejected { descriptor: String, reason: String },
}

/// Внешний источник, отдающий готовые данные матрицы
pub trait MatrixSource: Send + Sync {
    fn fetch(&self, descriptor: &str) -> Result<MatrixData, SourceError>;
}

/// Байт текста на одно значение при оценке допустимого размера файла
const MAX_BYTES_PER_VALUE: u64 = 32;

/// Чтение матрицы из CSV-файла внутри каталога данных.
///
/// Без каталога данных файловые дескрипторы отклоняются. Дескриптор -
/// относительный путь без `..`, который после разрешения ссылок обязан
/// остаться внутри каталога.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    root: Option<PathBuf>,
    max_bytes: u64,
}

impl Default for CsvFileSource {
    fn default() -> Self {
        Self {
            root: None,
            max_bytes: max_file_bytes(DEFAULT_MAX_ELEMENTS),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SourceError {
    let path = path.to_path_buf();
    move |source| SourceError::Io { path, source }
}

fn max_file_bytes(max_elements: usize) -> u64 {
    (max_elements as u64).saturating_mul(MAX_BYTES_PER_VALUE)
}

impl CsvFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Файлы читаются только из `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Лимит размера файла по числу элементов матрицы
    pub fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.max_bytes = max_file_bytes(max_elements);
        self
    }

    fn resolve(&self, descriptor: &str) -> Result<PathBuf, SourceError> {
        let rejected = |reason: &str| SourceError::Rejected {
            descriptor: descriptor.to_owned(),
            reason: reason.to_owned(),
        };

        let root = self
            .root
            .as_ref()
            .ok_or_else(|| rejected("file sources are disabled: no data directory configured"))?;
        let relative = Path::new(descriptor);
        if relative.as_os_str().is_empty() {
            return Err(rejected("empty path"));
        }
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(rejected("path must be relative to the data directory without '..'"));
        }

        let root = root.canonicalize().map_err(io_error(root))?;
        let joined = root.join(relative);
        let path = joined.canonicalize().map_err(io_error(&joined))?;
        if !path.starts_with(&root) {
            return Err(rejected("path leaves the data directory"));
        }
        Ok(path)
    }

    fn read_limited(&self, descriptor: &str, path: &Path) -> Result<String, SourceError> {
        let too_large = || SourceError::Rejected {
            descriptor: descriptor.to_owned(),
            reason: format!("file exceeds {} bytes", self.max_bytes),
        };

        let file = File::open(path).map_err(io_error(path))?;
        let metadata = file.metadata().map_err(io_error(path))?;
        if !metadata.is_file() {
            return Err(SourceError::Rejected {
                descriptor: descriptor.to_owned(),
                reason: "not a regular file".to_owned(),
            });
        }
        if metadata.len() > self.max_bytes {
            return Err(too_large());
        }

        // размер в метаданных может отставать от содержимого
        let mut text = String::new();
        file.take(self.max_bytes.saturating_add(1))
            .read_to_string(&mut text)
            .map_err(io_error(path))?;
        if text.len() as u64 > self.max_bytes {
            return Err(too_large());
        }
        Ok(text)
    }
}

impl MatrixSource for CsvFileSource {
    fn fetch(&self, descriptor: &str) -> Result<MatrixData, SourceError> {
        let path = self.resolve(descriptor)?;
        let text = self.read_limited(descriptor, &path)?;
        let data = parse_csv(descriptor, &text)?;
        debug!(path = %path.display(), rows = data.rows, cols = data.cols, "parsed matrix file");
        Ok(data)
    }
}

/// Разбирает текст CSV. Пустые строки и строки с `#` пропускаются.
pub fn parse_csv(descriptor: &str, text: &str) -> Result<MatrixData, SourceError> {
    let malformed = |reason: String| SourceError::Malformed {
        descriptor: descriptor.to_owned(),
        reason,
    };

    let mut values = Vec::new();
    let mut rows = 0;
    let mut cols = None;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let before = values.len();
        for (col_no, field) in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .enumerate()
        {
            let value = match field.parse::<f32>() {
                Ok(value) if value.is_finite() => value,
                Ok(_) => {
                    return Err(malformed(format!(
                        "line {}, column {}: value is not finite",
                        line_no + 1,
                        col_no + 1
                    )))
                }
                Err(_) => {
                    return Err(malformed(format!(
                        "line {}, column {}: not a number",
                        line_no + 1,
                        col_no + 1
                    )))
                }
            };
            values.push(value);
        }

        let width = values.len() - before;
        match cols {
            None => cols = Some(width),
            Some(expected) if expected != width => {
                return Err(malformed(format!(
                    "line {} has {} columns, expected {}",
                    line_no + 1,
                    width,
                    expected
                )));
            }
            Some(_) => {}
        }
        rows += 1;
    }

    match cols {
        Some(cols) if cols > 0 => Ok(MatrixData::new(rows, cols, values)),
        _ => Err(malformed("no values".to_owned())),
    }
}

/// Генератор матриц по шаблону: `gen:<pattern>:<rows>x<cols>`
#[derive(Debug, Clone, Copy)]
pub struct PatternSource {
    max_elements: usize,
}

impl Default for PatternSource {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ELEMENTS)
    }
}

impl PatternSource {
    pub fn new(max_elements: usize) -> Self {
        Self { max_elements }
    }

    fn parse(descriptor: &str) -> Option<(MatrixType, usize, usize)> {
        let spec = descriptor.strip_prefix(PATTERN_PREFIX)?;
        let (pattern, shape) = spec.split_once(':')?;
        let (rows, cols) = shape.split_once('x')?;
        Some((pattern.parse().ok()?, rows.parse().ok()?, cols.parse().ok()?))
    }
}

impl MatrixSource for PatternSource {
    fn fetch(&self, descriptor: &str) -> Result<MatrixData, SourceError> {
        let (pattern, rows, cols) =
            Self::parse(descriptor).ok_or_else(|| SourceError::Unsupported(descriptor.to_owned()))?;
        match element_count(rows, cols) {
            Ok(n) if n <= self.max_elements => {}
            _ => {
                return Err(SourceError::Malformed {
                    descriptor: descriptor.to_owned(),
                    reason: format!("{}x{} exceeds the limit of {} elements", rows, cols, self.max_elements),
                })
            }
        }
        Ok(MatrixData::new(rows, cols, initialize_matrix(pattern, rows, cols)))
    }
}

/// Источник по умолчанию: генератор для `gen:`, иначе CSV-файл
#[derive(Debug, Clone, Default)]
pub struct DefaultSource {
    files: CsvFileSource,
    patterns: PatternSource,
}

impl DefaultSource {
    pub fn new(files: CsvFileSource) -> Self {
        Self {
            files,
            patterns: PatternSource::default(),
        }
    }

    /// Лимит на размер генерируемых матриц и читаемых файлов
    pub fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.files = self.files.with_max_elements(max_elements);
        self.patterns = PatternSource::new(max_elements);
        self
    }
}

impl MatrixSource for DefaultSource {
    fn fetch(&self, descriptor: &str) -> Result<MatrixData, SourceError> {
        if descriptor.starts_with(PATTERN_PREFIX) {
            self.patterns.fetch(descriptor)
        } else {
            self.files.fetch(descriptor)
        }
    }
}
