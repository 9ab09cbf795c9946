//! Тестирование производительности ядер умножения матриц на CPU
use anyhow::{ensure, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use prettytable::{row, Table};
use std::time::Duration;

use matrix_proxy::matrix::{
    compare_results, initialize_matrix, multiply_naive, multiply_transpose, reference_multiply,
    KernelPool, MatrixType, MultiplyMode,
};
use matrix_proxy::utils::measure_time;

/// Допустимое отклонение от эталона ndarray
const EPSILON: f32 = 1e-2;

/// Сравнение ядер на случайных квадратных матрицах
#[derive(Parser, Debug)]
#[command(name = "matrix_multiply")]
#[command(about, long_about = None)]
struct Args {
    /// Размер матриц
    #[arg(long, default_value_t = 512)]
    size: usize,

    /// Число потоков для прогонов
    #[arg(long, value_delimiter = ',', default_values_t = vec![1, 2, 4, 8])]
    threads: Vec<usize>,

    /// Повторов на каждую конфигурацию
    #[arg(long, default_value_t = 3)]
    iterations: u32,
}

struct Run {
    mode: MultiplyMode,
    threads: usize,
    average: Duration,
    matches: bool,
}

fn run_kernel(mode: MultiplyMode, a: &[f32], b: &[f32], c: &mut [f32], b_t: &mut [f32], n: usize) {
    match mode {
        MultiplyMode::Naive => multiply_naive(a, b, c, n, n, n),
        MultiplyMode::Transpose => multiply_transpose(a, b, b_t, c, n, n, n),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let n = args.size;
    ensure!(n > 0, "Размер матрицы должен быть положительным");
    ensure!(args.iterations > 0, "Нужен хотя бы один повтор");

    println!("Начало сравнения ядер умножения матриц");
    println!("Размер матриц: {}x{}", n, n);

    let a = initialize_matrix(MatrixType::Random, n, n);
    let b = initialize_matrix(MatrixType::Random, n, n);

    println!("\nВычисление эталона через ndarray...");
    let (expected, reference_time) = measure_time(|| reference_multiply(&a, &b, n, n, n));
    let expected = expected.context("Не удалось построить эталонное произведение")?;
    println!("Эталон вычислен за {:?}", reference_time);

    let modes = [MultiplyMode::Naive, MultiplyMode::Transpose];
    let total = (modes.len() * args.threads.len()) as u64 * u64::from(args.iterations);
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let mut c = vec![0.0f32; n * n];
    let mut b_t = vec![0.0f32; n * n];
    let mut runs = Vec::new();

    for &threads in &args.threads {
        let pool = KernelPool::new(threads)
            .with_context(|| format!("Не удалось создать пул на {} потоков", threads))?;
        for mode in modes {
            progress.set_message(format!("{} x{}", mode, pool.threads()));
            let mut elapsed = Duration::ZERO;
            for _ in 0..args.iterations {
                let ((), duration) =
                    measure_time(|| pool.run(|| run_kernel(mode, &a, &b, &mut c, &mut b_t, n)));
                elapsed += duration;
                progress.inc(1);
            }
            runs.push(Run {
                mode,
                threads: pool.threads(),
                average: elapsed / args.iterations,
                matches: compare_results(&c, &expected, EPSILON).matches(),
            });
        }
    }
    progress.finish_with_message("готово");

    let baseline = runs
        .iter()
        .find(|run| run.mode == MultiplyMode::Naive)
        .map(|run| run.average.as_secs_f64())
        .unwrap_or(1.0);

    println!("\nИтоговая статистика:");
    let mut table = Table::new();
    table.add_row(row!["Ядро", "Потоки", "Среднее время", "Ускорение", "Совпадает с эталоном"]);
    for run in &runs {
        table.add_row(row![
            run.mode,
            run.threads,
            format!("{:.3} мс", run.average.as_secs_f64() * 1000.0),
            format!("{:.2}x", baseline / run.average.as_secs_f64()),
            if run.matches { "да" } else { "нет" }
        ]);
    }
    table.printstd();

    ensure!(runs.iter().all(|run| run.matches), "Результаты ядер расходятся с эталоном");
    Ok(())
}
