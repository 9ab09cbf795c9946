//! Сервис именованных плотных матриц: создание, хранение и умножение
//!
//! - [`catalog`] - каталог объектов, атомарно связывающий имена и данные
//! - [`matrix`] - типы матриц и параллельные ядра умножения
//! - [`source`] - внешние источники данных для загрузки
//! - [`service`] - протокол, обработчик запросов, TCP-сервер и клиент

pub mod catalog;
pub mod config;
pub mod matrix;
pub mod service;
pub mod source;
pub mod utils;

// Реэкспорт основных типов для удобства
pub use catalog::{CreateError, LoadError, MatrixHandle, MultiplyError, NotFound, ObjectCatalog};
pub use config::ServerConfig;
pub use matrix::{MatrixData, MatrixType, MultiplyMode};
