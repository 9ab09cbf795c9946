//! Конфигурация сервера
//!
//! Порядок применения: значения по умолчанию, JSON-файл (`--config`),
//! флаги командной строки, переменная окружения `MATRIX_PROXY_LISTEN`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::DEFAULT_MAX_ELEMENTS;

/// Адрес по умолчанию
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:50051";

/// Максимальный размер строки запроса (64 МиБ)
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

/// Максимальный размер строки ответа (64 МиБ)
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

/// Переменная окружения, переопределяющая адрес
pub const LISTEN_ENV: &str = "MATRIX_PROXY_LISTEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Адрес, на котором слушает сервер
    pub listen_addr: String,
    /// Потоки для ядер; 0 - по числу CPU
    pub kernel_threads: usize,
    /// Максимальная длина строки запроса в байтах
    pub max_request_bytes: usize,
    /// Максимальная длина строки ответа; больший `get_data` отклоняется
    pub max_response_bytes: usize,
    /// Максимальное число элементов одной матрицы
    pub max_elements: usize,
    /// Каталог, от которого разрешаются относительные пути загрузки
    pub data_dir: Option<PathBuf>,
    /// Уровень логирования, если не задан `RUST_LOG`
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
            kernel_threads: 0,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            max_elements: DEFAULT_MAX_ELEMENTS,
            data_dir: None,
            log_level: "info".to_owned(),
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            ..Self::default()
        }
    }

    /// Читает конфигурацию из JSON; отсутствующие поля берутся по умолчанию
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Применяет переопределения из окружения
    pub fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var(LISTEN_ENV) {
            if !addr.is_empty() {
                self.listen_addr = addr;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"listen_addr": "127.0.0.1:6000", "kernel_threads": 4}}"#).unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:6000");
        assert_eq!(config.kernel_threads, 4);
        assert_eq!(config.max_request_bytes, DEFAULT_MAX_REQUEST_BYTES);
        assert_eq!(config.max_response_bytes, DEFAULT_MAX_RESPONSE_BYTES);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ServerConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            ServerConfig::from_file(Path::new("/definitely/not/here.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
