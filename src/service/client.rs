//! Асинхронный клиент сервиса матриц

use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use super::protocol::{ErrorCode, MatrixInfo, ObjectInfo, Payload, Request, Response};
use super::server::{read_line_bounded, Line};
use crate::config::DEFAULT_MAX_RESPONSE_BYTES;
use crate::matrix::{MatrixData, MultiplyMode};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("server closed the connection")]
    ConnectionClosed,

    #[error("response exceeds {0} bytes")]
    ResponseTooLarge(usize),

    #[error("server error ({code}): {message}")]
    Server { code: ErrorCode, message: String },

    #[error("unexpected response payload: {0:?}")]
    UnexpectedPayload(Payload),
}

impl ClientError {
    /// Код ошибки сервера, если это ошибка сервера
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Соединение с сервером матриц
pub struct MatrixClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    max_response_bytes: usize,
}

impl MatrixClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        })
    }

    /// Лимит длины строки ответа; должен быть не меньше серверного
    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    /// Отправляет запрос и ждёт ответ
    pub async fn call(&mut self, request: &Request) -> ClientResult<Payload> {
        let mut bytes = serde_json::to_vec(request)?;
        bytes.push(b'\n');
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        debug!(op = request.op(), "request sent");

        let line = match read_line_bounded(&mut self.reader, self.max_response_bytes).await? {
            Line::Data(line) => line,
            Line::TooLong(size) => return Err(ClientError::ResponseTooLarge(size)),
            Line::Eof => return Err(ClientError::ConnectionClosed),
        };
        match serde_json::from_slice(&line)? {
            Response::Ok(payload) => Ok(payload),
            Response::Error { code, message } => Err(ClientError::Server { code, message }),
        }
    }

    async fn matrix_info(&mut self, request: Request) -> ClientResult<MatrixInfo> {
        match self.call(&request).await? {
            Payload::MatrixInfo(info) => Ok(info),
            other => Err(ClientError::UnexpectedPayload(other)),
        }
    }

    pub async fn create_zero_matrix(&mut self, name: &str, rows: i64, cols: i64) -> ClientResult<MatrixInfo> {
        self.matrix_info(Request::CreateZero {
            name: name.to_owned(),
            rows,
            cols,
        })
        .await
    }

    pub async fn load_matrix(&mut self, name: &str, source: &str) -> ClientResult<MatrixInfo> {
        self.matrix_info(Request::Load {
            name: name.to_owned(),
            source: source.to_owned(),
        })
        .await
    }

    pub async fn multiply(
        &mut self,
        a: &str,
        b: &str,
        result: &str,
        mode: MultiplyMode,
    ) -> ClientResult<MatrixInfo> {
        self.matrix_info(Request::Multiply {
            a: a.to_owned(),
            b: b.to_owned(),
            result: result.to_owned(),
            mode,
        })
        .await
    }

    pub async fn get_matrix_size(&mut self, name: &str) -> ClientResult<(usize, usize)> {
        match self.call(&Request::GetSize { name: name.to_owned() }).await? {
            Payload::Size { rows, cols } => Ok((rows, cols)),
            other => Err(ClientError::UnexpectedPayload(other)),
        }
    }

    pub async fn list_objects(&mut self) -> ClientResult<Vec<ObjectInfo>> {
        match self.call(&Request::ListObjects).await? {
            Payload::Objects { objects } => Ok(objects),
            other => Err(ClientError::UnexpectedPayload(other)),
        }
    }

    pub async fn remove(&mut self, name: &str) -> ClientResult<bool> {
        match self.call(&Request::Remove { name: name.to_owned() }).await? {
            Payload::Removed { existed } => Ok(existed),
            other => Err(ClientError::UnexpectedPayload(other)),
        }
    }

    pub async fn get_data(&mut self, name: &str) -> ClientResult<MatrixData> {
        match self.call(&Request::GetData { name: name.to_owned() }).await? {
            Payload::Data(data) => Ok(data),
            other => Err(ClientError::UnexpectedPayload(other)),
        }
    }
}
