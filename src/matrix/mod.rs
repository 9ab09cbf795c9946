//! Модуль для работы с матрицами
//!
//! Предоставляет:
//! - Типы матриц
//! - Операции над матрицами
//! - Параллельные вычислительные ядра

mod types;
pub mod operations;
pub mod kernels;

pub use types::{element_count, zeroed_buffer, AllocError, Matrix, MatrixData, MatrixType, MultiplyMode};
pub use operations::{compare_results, initialize_matrix, reference_multiply, Comparison};
pub use kernels::{multiply_naive, multiply_transpose, transpose, KernelPool};
