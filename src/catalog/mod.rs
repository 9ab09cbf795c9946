//! Каталог именованных матриц
//!
//! ```text
//! ┌──────────────────── ObjectCatalog (одна RwLock) ───────────────────┐
//! │  ┌──────────────┐          ┌──────────────────────────────────┐    │
//! │  │ NameRegistry │  <---->  │ MatrixStore: name -> Arc<Matrix> │    │
//! │  └──────────────┘          └──────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Жизненный цикл имени: `absent -> reserved -> bound -> absent`.
//! Состояние `reserved` существует только внутри критической секции создания.

mod object_catalog;
mod error;
mod registry;
mod store;

pub use object_catalog::{MatrixHandle, ObjectCatalog, DEFAULT_MAX_ELEMENTS};
pub use error::{CreateError, LoadError, MultiplyError, NotFound};
pub use registry::NameRegistry;
pub use store::{MatrixStore, StoreError};

#[cfg(test)]
mod tests;
