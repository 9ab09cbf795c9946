//! Сетевой сервис поверх каталога
//!
//! ```text
//! TcpListener -> задача на соединение -> spawn_blocking -> MatrixService -> ObjectCatalog
//! ```

pub mod client;
mod handler;
pub mod protocol;
mod server;

pub use client::{ClientError, ClientResult, MatrixClient};
pub use handler::MatrixService;
pub use protocol::{ErrorCode, MatrixInfo, ObjectInfo, Payload, Request, Response};
pub use server::{read_line_bounded, Line, Server};
