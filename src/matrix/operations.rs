//! Операции над матрицами

use super::types::MatrixType;
use ndarray::{Array2, ArrayView2, ShapeError};
use rand::Rng;
use tracing::debug;

/// Инициализирует матрицу заданного типа и размера
pub fn initialize_matrix(matrix_type: MatrixType, rows: usize, cols: usize) -> Vec<f32> {
    let elements = rows * cols;
    match matrix_type {
        MatrixType::Zeros => vec![0.0f32; elements],
        MatrixType::Ones => vec![1.0f32; elements],
        MatrixType::Twos => vec![2.0f32; elements],
        MatrixType::Identity => {
            let mut values = vec![0.0f32; elements];
            for i in 0..rows.min(cols) {
                values[i * cols + i] = 1.0;
            }
            values
        }
        MatrixType::Random => {
            let mut rng = rand::thread_rng();
            (0..elements).map(|_| rng.gen_range(0.0..1.0)).collect()
        }
    }
}

/// Эталонное умножение через ndarray, для проверки ядер
pub fn reference_multiply(
    a: &[f32],
    b: &[f32],
    a_rows: usize,
    shared_dim: usize,
    b_cols: usize,
) -> Result<Vec<f32>, ShapeError> {
    let a = ArrayView2::from_shape((a_rows, shared_dim), a)?;
    let b = ArrayView2::from_shape((shared_dim, b_cols), b)?;
    let c: Array2<f32> = a.dot(&b);
    Ok(c.iter().copied().collect())
}

/// Итог сравнения двух результатов
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub max_diff: f32,
    pub diff_count: usize,
}

impl Comparison {
    pub fn matches(&self) -> bool {
        self.diff_count == 0
    }
}

/// Сравнивает два результата поэлементно с допуском `epsilon`
pub fn compare_results(lhs: &[f32], rhs: &[f32], epsilon: f32) -> Comparison {
    let mut max_diff = 0.0f32;
    let mut diff_count = 0;

    for (x, y) in lhs.iter().zip(rhs) {
        let diff = (x - y).abs();
        if diff > epsilon {
            diff_count += 1;
            max_diff = max_diff.max(diff);
        }
    }
    // Разная длина - это тоже расхождение
    diff_count += lhs.len().abs_diff(rhs.len());

    if diff_count > 0 {
        debug!(diff_count, max_diff, "results differ");
    }
    Comparison { max_diff, diff_count }
}
