//! Вычислительные ядра для матричных операций
//!
//! Все ядра работают с плоскими буферами по строкам и не выделяют память.
//! Распараллеливание идёт только по строкам результата: сумма для каждой
//! ячейки считается одним потоком в порядке `k = 0..shared_dim`, поэтому
//! результат побитово совпадает при любом числе потоков.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Транспонирование: `dst[j * rows + i] = src[i * cols + j]`
pub fn transpose(src: &[f32], rows: usize, cols: usize, dst: &mut [f32]) {
    debug_assert_eq!(src.len(), rows * cols);
    debug_assert_eq!(dst.len(), rows * cols);

    dst.par_chunks_mut(rows)
        .enumerate()
        .for_each(|(j, dst_row)| {
            for (i, value) in dst_row.iter_mut().enumerate() {
                *value = src[i * cols + j];
            }
        });
}

/// Наивное умножение `C[i, j] = Σ_k A[i, k] * B[k, j]`
///
/// `a` имеет форму `a_rows x shared_dim`, `b` - `shared_dim x b_cols`,
/// `c` - `a_rows x b_cols`.
pub fn multiply_naive(
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    shared_dim: usize,
    a_rows: usize,
    b_cols: usize,
) {
    debug_assert_eq!(a.len(), a_rows * shared_dim);
    debug_assert_eq!(b.len(), shared_dim * b_cols);
    debug_assert_eq!(c.len(), a_rows * b_cols);

    c.par_chunks_mut(b_cols)
        .enumerate()
        .for_each(|(i, c_row)| {
            let a_row = &a[i * shared_dim..(i + 1) * shared_dim];
            for (j, cell) in c_row.iter_mut().enumerate() {
                let mut sum = 0.0f32;
                for k in 0..shared_dim {
                    sum += a_row[k] * b[k * b_cols + j];
                }
                *cell = sum;
            }
        });
}

/// Умножение через транспонирование B.
///
/// `b_t` - рабочий буфер длины `shared_dim * b_cols`, куда кладётся `B^T`.
/// Результат совпадает с [`multiply_naive`] побитово: порядок суммирования тот же,
/// меняется только порядок обхода памяти.
pub fn multiply_transpose(
    a: &[f32],
    b: &[f32],
    b_t: &mut [f32],
    c: &mut [f32],
    shared_dim: usize,
    a_rows: usize,
    b_cols: usize,
) {
    debug_assert_eq!(a.len(), a_rows * shared_dim);
    debug_assert_eq!(c.len(), a_rows * b_cols);

    transpose(b, shared_dim, b_cols, b_t);
    let b_t: &[f32] = b_t;

    c.par_chunks_mut(b_cols)
        .enumerate()
        .for_each(|(i, c_row)| {
            let a_row = &a[i * shared_dim..(i + 1) * shared_dim];
            for (j, cell) in c_row.iter_mut().enumerate() {
                let bt_row = &b_t[j * shared_dim..(j + 1) * shared_dim];
                *cell = a_row
                    .iter()
                    .zip(bt_row)
                    .fold(0.0f32, |sum, (x, y)| sum + x * y);
            }
        });
}

/// Пул потоков для ядер.
///
/// Ядра используют текущий пул rayon, поэтому число потоков задаётся тем,
/// внутри какого пула они запущены.
pub struct KernelPool {
    pool: ThreadPool,
}

impl KernelPool {
    /// `threads == 0` означает число потоков по умолчанию (по числу CPU)
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("kernel-{}", index))
            .build()?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Выполняет `f` внутри пула
    pub fn run<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }
}

impl std::fmt::Debug for KernelPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelPool")
            .field("threads", &self.threads())
            .finish()
    }
}
