//! Клиент командной строки для сервера матриц
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prettytable::{row, Table};

use matrix_proxy::config::DEFAULT_MAX_RESPONSE_BYTES;
use matrix_proxy::service::{ErrorCode, MatrixClient};
use matrix_proxy::MultiplyMode;

#[derive(Parser, Debug)]
#[command(name = "matrix_client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Адрес сервера
    #[arg(long, default_value = "localhost:50051")]
    server: String,

    /// Максимальная длина ответа в байтах
    #[arg(long, default_value_t = DEFAULT_MAX_RESPONSE_BYTES)]
    max_response_bytes: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Создать матрицу из нулей
    Create { name: String, rows: i64, cols: i64 },

    /// Загрузить матрицу из файла на сервере или из генератора `gen:<pattern>:<rows>x<cols>`
    Load { name: String, source: String },

    /// Размер матрицы
    Size { name: String },

    /// result = a * b
    Multiply {
        a: String,
        b: String,
        result: String,

        /// Использовать ядро с транспонированием
        #[arg(long)]
        transpose: bool,
    },

    /// Список объектов
    List,

    /// Удалить объект
    Remove { name: String },

    /// Вывести содержимое матрицы
    Show { name: String },

    /// Прогнать пример сессии
    Demo,
}

async fn demo(client: &mut MatrixClient) -> Result<()> {
    match client.load_matrix("my_matrix_from_file", "gen:random:3x4").await {
        Ok(info) => println!("Загружена матрица {} ({}x{})", info.name, info.rows, info.cols),
        Err(e) => println!("Не удалось загрузить матрицу: {}", e),
    }

    let zero = client.create_zero_matrix("zero_mat", 4, 10).await?;
    println!("Создана матрица {} ({}x{})", zero.name, zero.rows, zero.cols);

    let (rows, cols) = client.get_matrix_size("zero_mat").await?;
    println!("Размер 'zero_mat' на сервере: {}x{}", rows, cols);

    match client.get_matrix_size("non_existent_matrix").await {
        Err(e) if e.code() == Some(ErrorCode::NotFound) => {
            println!("Для несуществующей матрицы ожидаемо получена ошибка: {}", e)
        }
        other => println!("Неожиданный ответ: {:?}", other),
    }

    let product = client
        .multiply("my_matrix_from_file", "zero_mat", "product", MultiplyMode::Naive)
        .await?;
    println!("Произведение {} ({}x{})", product.name, product.rows, product.cols);

    for name in ["my_matrix_from_file", "zero_mat", "product"] {
        client.remove(name).await?;
    }
    println!("Демонстрация завершена");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut client = MatrixClient::connect(&cli.server)
        .await
        .with_context(|| format!("Не удалось подключиться к {}", cli.server))?
        .with_max_response_bytes(cli.max_response_bytes);

    match cli.command {
        Command::Create { name, rows, cols } => {
            let info = client.create_zero_matrix(&name, rows, cols).await?;
            println!("Создана матрица {} ({}x{})", info.name, info.rows, info.cols);
        }
        Command::Load { name, source } => {
            let info = client.load_matrix(&name, &source).await?;
            println!("Загружена матрица {} ({}x{})", info.name, info.rows, info.cols);
        }
        Command::Size { name } => {
            let (rows, cols) = client.get_matrix_size(&name).await?;
            println!("{}: {}x{}", name, rows, cols);
        }
        Command::Multiply {
            a,
            b,
            result,
            transpose,
        } => {
            let mode = if transpose {
                MultiplyMode::Transpose
            } else {
                MultiplyMode::Naive
            };
            let info = client.multiply(&a, &b, &result, mode).await?;
            println!("Результат {} ({}x{})", info.name, info.rows, info.cols);
        }
        Command::List => {
            let objects = client.list_objects().await?;
            let mut table = Table::new();
            table.add_row(row!["Имя", "Тип"]);
            for object in &objects {
                table.add_row(row![object.name, object.kind]);
            }
            table.printstd();
        }
        Command::Remove { name } => {
            if client.remove(&name).await? {
                println!("Удалена матрица {}", name);
            } else {
                println!("Матрицы {} не было", name);
            }
        }
        Command::Show { name } => {
            let data = client.get_data(&name).await?;
            println!("{} ({}x{}):", name, data.rows, data.cols);
            for row in data.values.chunks(data.cols.max(1)) {
                let cells: Vec<String> = row.iter().map(|v| format!("{:.3}", v)).collect();
                println!("{}", cells.join(" "));
            }
        }
        Command::Demo => demo(&mut client).await?,
    }

    Ok(())
}
