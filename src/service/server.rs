//! TCP-сервер: JSON по строкам, задача tokio на каждое соединение

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::handler::MatrixService;
use super::protocol::{ErrorCode, Request, Response};
use crate::config::ServerConfig;

/// Счётчик соединений для корреляции логов
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Результат чтения одной строки
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    /// Полная строка (без перевода строки)
    Data(Vec<u8>),
    /// Строка длиннее лимита; её остаток уже вычитан
    TooLong(usize),
    /// Конец потока
    Eof,
}

/// Читает строку, не выделяя больше `max_bytes` байт
pub async fn read_line_bounded<R>(reader: &mut R, max_bytes: usize) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let mut overflow = 0usize;

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            if line.is_empty() && overflow == 0 {
                return Ok(Line::Eof);
            }
            break;
        }

        let newline = chunk.iter().position(|&b| b == b'\n');
        let take = newline.map_or(chunk.len(), |pos| pos);

        if overflow > 0 || line.len() + take > max_bytes {
            overflow += line.len() + take;
            line.clear();
        } else {
            line.extend_from_slice(&chunk[..take]);
        }

        match newline {
            Some(pos) => {
                reader.consume(pos + 1);
                break;
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
            }
        }
    }

    if overflow > 0 {
        return Ok(Line::TooLong(overflow));
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Line::Data(line))
}

/// Сервер матриц
pub struct Server {
    config: ServerConfig,
    service: Arc<MatrixService>,
}

impl Server {
    pub fn new(config: ServerConfig, service: Arc<MatrixService>) -> Self {
        Self { config, service }
    }

    /// Слушает адрес из конфигурации до Ctrl-C
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("Не удалось открыть порт {}", self.config.listen_addr))?;
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        };
        self.serve(listener, shutdown).await
    }

    /// Принимает соединения на готовом слушателе, пока не завершится `shutdown`.
    ///
    /// После остановки приёма соединения дочитывают текущий запрос,
    /// отправляют ответ и закрываются; метод возвращается, когда все они завершены.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr().context("listener has no local address")?;
        info!(addr = %local_addr, "server listening");

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };
                    let service = Arc::clone(&self.service);
                    let max_bytes = self.config.max_request_bytes;
                    let stop = stop_rx.clone();
                    connections.spawn(async move {
                        let conn_id = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
                        if let Err(e) = handle_connection(stream, peer, conn_id, service, max_bytes, stop).await {
                            warn!(conn_id, %peer, error = %e, "connection closed with error");
                        }
                    });
                }
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_join(finished);
                }
                _ = &mut shutdown => {
                    info!("shutdown requested, server stopping");
                    break;
                }
            }
        }

        drop(listener);
        let _ = stop_tx.send(true);
        info!(open = connections.len(), "waiting for open connections");
        while let Some(finished) = connections.join_next().await {
            log_join(finished);
        }
        info!("server stopped");
        Ok(())
    }
}

fn log_join(finished: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!(error = %e, "connection task failed");
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    conn_id: u64,
    service: Arc<MatrixService>,
    max_bytes: usize,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    info!(conn_id, %peer, "client connected");
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let line = tokio::select! {
            line = read_line_bounded(&mut reader, max_bytes) => line?,
            _ = stop.changed() => {
                info!(conn_id, %peer, "closing connection for shutdown");
                break;
            }
        };
        let response = match line {
            Line::Eof => break,
            Line::TooLong(size) => Response::error(
                ErrorCode::InvalidRequest,
                format!("request of {} bytes exceeds the {} byte limit", size, max_bytes),
            ),
            Line::Data(line) if line.iter().all(u8::is_ascii_whitespace) => continue,
            Line::Data(line) => match serde_json::from_slice::<Request>(&line) {
                Ok(request) => {
                    debug!(conn_id, op = request.op(), "request received");
                    let service = Arc::clone(&service);
                    match tokio::task::spawn_blocking(move || service.handle(request)).await {
                        Ok(response) => response,
                        Err(e) => {
                            error!(conn_id, error = %e, "request handler panicked");
                            Response::error(ErrorCode::Internal, "request handler failed")
                        }
                    }
                }
                Err(e) => Response::error(ErrorCode::InvalidRequest, format!("malformed request: {}", e)),
            },
        };
        write_response(&mut write_half, &response).await?;
    }

    info!(conn_id, %peer, "client disconnected");
    Ok(())
}

async fn write_response<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = serde_json::to_vec(response).context("failed to encode response")?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn lines(input: &[u8], max: usize) -> Vec<Line> {
        let mut reader = BufReader::with_capacity(4, input);
        let mut out = Vec::new();
        loop {
            let line = read_line_bounded(&mut reader, max).await.unwrap();
            let done = line == Line::Eof;
            out.push(line);
            if done {
                return out;
            }
        }
    }

    #[tokio::test]
    async fn splits_lines_across_small_buffers() {
        let got = lines(b"abcdef\r\nxy\nlast", 64).await;
        assert_eq!(
            got,
            vec![
                Line::Data(b"abcdef".to_vec()),
                Line::Data(b"xy".to_vec()),
                Line::Data(b"last".to_vec()),
                Line::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn oversized_line_is_drained() {
        let got = lines(b"0123456789\nok\n", 5).await;
        assert_eq!(
            got,
            vec![Line::TooLong(10), Line::Data(b"ok".to_vec()), Line::Eof]
        );
    }
}
