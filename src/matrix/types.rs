//! Типы матриц и связанные структуры

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Шаблон заполнения матриц
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixType {
    /// Матрица из нулей
    Zeros,
    /// Матрица из единиц
    Ones,
    /// Матрица из двоек
    Twos,
    /// Единичная матрица (единицы на главной диагонали)
    Identity,
    /// Случайно заполненная матрица, значения в [0, 1)
    Random,
}

impl FromStr for MatrixType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zeros" => Ok(MatrixType::Zeros),
            "ones" => Ok(MatrixType::Ones),
            "twos" => Ok(MatrixType::Twos),
            "identity" => Ok(MatrixType::Identity),
            "random" => Ok(MatrixType::Random),
            other => Err(format!("unknown matrix pattern '{}'", other)),
        }
    }
}

/// Алгоритм умножения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplyMode {
    /// Прямой тройной цикл
    #[default]
    Naive,
    /// Сначала транспонируем B, затем идём по строкам обеих матриц
    Transpose,
}

impl fmt::Display for MultiplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultiplyMode::Naive => f.write_str("naive"),
            MultiplyMode::Transpose => f.write_str("transpose"),
        }
    }
}

/// Ошибка выделения буфера матрицы
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("matrix {rows}x{cols} overflows the addressable element count")]
    Overflow { rows: usize, cols: usize },

    #[error("failed to allocate {elements} f32 elements")]
    OutOfMemory { elements: usize },
}

/// Количество элементов `rows * cols` с проверкой переполнения
pub fn element_count(rows: usize, cols: usize) -> Result<usize, AllocError> {
    rows.checked_mul(cols)
        .ok_or(AllocError::Overflow { rows, cols })
}

/// Выделяет буфер из нулей, не прерывая процесс при нехватке памяти
pub fn zeroed_buffer(rows: usize, cols: usize) -> Result<Vec<f32>, AllocError> {
    let elements = element_count(rows, cols)?;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(elements)
        .map_err(|_| AllocError::OutOfMemory { elements })?;
    buffer.resize(elements, 0.0);
    Ok(buffer)
}

/// Плотная матрица, хранимая по строкам.
///
/// Форма фиксируется при создании; меняться может только содержимое буфера.
/// Буфер защищён собственной блокировкой, чтобы результат умножения можно
/// было заполнять вне блокировки каталога, а читатели дожидались окончания записи.
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: RwLock<Box<[f32]>>,
}

impl Matrix {
    /// Создает матрицу из нулей
    pub fn zeroed(rows: usize, cols: usize) -> Result<Self, AllocError> {
        let buffer = zeroed_buffer(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            data: RwLock::new(buffer.into_boxed_slice()),
        })
    }

    /// Оборачивает готовые данные. Длина `values` должна равняться `rows * cols`.
    pub fn from_data(data: MatrixData) -> Self {
        debug_assert_eq!(data.values.len(), data.rows * data.cols);
        Self {
            rows: data.rows,
            cols: data.cols,
            data: RwLock::new(data.values.into_boxed_slice()),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Доступ на чтение; блокируется, пока идёт запись результата
    pub fn read(&self) -> RwLockReadGuard<'_, Box<[f32]>> {
        self.data.read()
    }

    /// Доступ на запись
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Box<[f32]>> {
        self.data.write()
    }

    /// Копия содержимого
    pub fn to_data(&self) -> MatrixData {
        MatrixData {
            rows: self.rows,
            cols: self.cols,
            values: self.read().to_vec(),
        }
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish_non_exhaustive()
    }
}

/// Владеющее представление матрицы: форма и значения по строкам
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixData {
    pub rows: usize,
    pub cols: usize,
    #[serde(with = "wire_values")]
    pub values: Vec<f32>,
}

/// Кодирование значений для JSON: конечные числа как есть,
/// `NaN`, `inf` и `-inf` строками.
mod wire_values {
    use std::fmt;

    use serde::de::{self, Deserializer, SeqAccess, Visitor};
    use serde::ser::{Serialize, Serializer};

    struct WireValue(f32);

    impl Serialize for WireValue {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let v = self.0;
            if v.is_finite() {
                serializer.serialize_f32(v)
            } else if v.is_nan() {
                serializer.serialize_str("NaN")
            } else if v > 0.0 {
                serializer.serialize_str("inf")
            } else {
                serializer.serialize_str("-inf")
            }
        }
    }

    struct ValueVisitor;

    impl<'de> Visitor<'de> for ValueVisitor {
        type Value = f32;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or one of \"NaN\", \"inf\", \"-inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f32, E> {
            Ok(v as f32)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f32, E> {
            Ok(v as f32)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f32, E> {
            Ok(v as f32)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f32, E> {
            match v {
                "NaN" => Ok(f32::NAN),
                "inf" => Ok(f32::INFINITY),
                "-inf" => Ok(f32::NEG_INFINITY),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }

    struct OneValue(f32);

    impl<'de> de::Deserialize<'de> for OneValue {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(ValueVisitor).map(OneValue)
        }
    }

    struct SeqVisitor;

    impl<'de> Visitor<'de> for SeqVisitor {
        type Value = Vec<f32>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a sequence of matrix values")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<f32>, A::Error> {
            let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(1 << 20));
            while let Some(OneValue(v)) = seq.next_element()? {
                values.push(v);
            }
            Ok(values)
        }
    }

    pub fn serialize<S: Serializer>(values: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| WireValue(*v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        deserializer.deserialize_seq(SeqVisitor)
    }
}

impl MatrixData {
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> Self {
        Self { rows, cols, values }
    }

    /// Согласованы ли форма и длина буфера
    pub fn is_well_formed(&self) -> bool {
        self.rows > 0
            && self.cols > 0
            && element_count(self.rows, self.cols).map_or(false, |n| n == self.values.len())
    }
}
