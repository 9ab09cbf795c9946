//! Сквозной тест: TCP-сервер и клиент

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use matrix_proxy::service::{ClientError, ErrorCode, MatrixClient, MatrixService, Server};
use matrix_proxy::{MultiplyMode, ServerConfig};

struct TestServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = Arc::new(MatrixService::from_config(&config).unwrap());
        let (shutdown, rx) = oneshot::channel();
        let task = tokio::spawn(Server::new(config, service).serve(listener, async {
            let _ = rx.await;
        }));
        Self { addr, shutdown, task }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.task.await.unwrap().unwrap();
    }
}

fn config() -> ServerConfig {
    ServerConfig {
        kernel_threads: 2,
        ..ServerConfig::new("127.0.0.1:0")
    }
}

#[tokio::test]
async fn client_session() {
    let server = TestServer::start(config()).await;
    let mut client = MatrixClient::connect(server.addr).await.unwrap();

    let a = client.create_zero_matrix("A", 2, 3).await.unwrap();
    assert_eq!((a.name.as_str(), a.rows, a.cols), ("A", 2, 3));
    client.create_zero_matrix("B", 3, 2).await.unwrap();

    let c = client.multiply("A", "B", "C", MultiplyMode::Naive).await.unwrap();
    assert_eq!((c.rows, c.cols), (2, 2));
    assert_eq!(client.get_matrix_size("C").await.unwrap(), (2, 2));
    assert_eq!(client.get_data("C").await.unwrap().values, vec![0.0; 4]);

    let err = client.create_zero_matrix("A", 3, 3).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::AlreadyExists));
    assert_eq!(client.get_matrix_size("A").await.unwrap(), (2, 3));

    let err = client.multiply("X", "Y", "Z", MultiplyMode::Naive).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotFound));

    let names: Vec<String> = client
        .list_objects()
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.name)
        .collect();
    assert_eq!(names, vec!["A", "B", "C"]);

    assert!(client.remove("C").await.unwrap());
    assert!(!client.remove("C").await.unwrap());

    server.stop().await;
}

#[tokio::test]
async fn load_and_multiply_with_transpose() {
    let server = TestServer::start(config()).await;
    let mut client = MatrixClient::connect(server.addr).await.unwrap();

    client.load_matrix("I", "gen:identity:3x3").await.unwrap();
    client.load_matrix("T", "gen:twos:3x2").await.unwrap();
    let product = client
        .multiply("I", "T", "P", MultiplyMode::Transpose)
        .await
        .unwrap();
    assert_eq!((product.rows, product.cols), (3, 2));
    assert_eq!(client.get_data("P").await.unwrap().values, vec![2.0; 6]);

    let err = client.load_matrix("F", "/no/such/file.csv").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SourceUnavailable));

    server.stop().await;
}

#[tokio::test]
async fn malformed_lines_do_not_close_connection() {
    let server = TestServer::start(ServerConfig {
        max_request_bytes: 128,
        ..config()
    })
    .await;

    let stream = TcpStream::connect(server.addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    let too_long = format!("{}\n", "x".repeat(500));
    let requests = [
        "this is not json\n".to_owned(),
        "{\"op\":\"explode\"}\n".to_owned(),
        too_long,
        "{\"op\":\"list_objects\"}\n".to_owned(),
    ];
    let mut responses = Vec::new();
    for request in &requests {
        write_half.write_all(request.as_bytes()).await.unwrap();
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        responses.push(serde_json::from_str::<serde_json::Value>(&line).unwrap());
    }

    for response in &responses[..3] {
        assert_eq!(response["status"], "error");
        assert_eq!(response["code"], "invalid_request");
    }
    assert_eq!(responses[3]["status"], "ok");
    assert_eq!(responses[3]["kind"], "objects");

    drop(write_half);
    server.stop().await;
}

#[tokio::test]
async fn clients_share_one_catalog() {
    let server = TestServer::start(config()).await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let addr = server.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = MatrixClient::connect(addr).await.unwrap();
            let own = format!("m{}", i);
            client.create_zero_matrix(&own, 4, 4).await.unwrap();
            client.create_zero_matrix("shared", 1, 1).await.is_ok()
        }));
    }
    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let mut client = MatrixClient::connect(server.addr).await.unwrap();
    assert_eq!(client.list_objects().await.unwrap().len(), 9);

    server.stop().await;
}

#[tokio::test]
async fn shutdown_closes_idle_connections() {
    let server = TestServer::start(config()).await;
    let mut client = MatrixClient::connect(server.addr).await.unwrap();
    client.create_zero_matrix("A", 2, 2).await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), server.stop())
        .await
        .expect("server kept running with an idle client");
    assert!(client.list_objects().await.is_err());
}

#[tokio::test]
async fn file_load_stays_inside_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    std::fs::write(data_dir.join("big.csv"), "1e30\n").unwrap();
    std::fs::write(dir.path().join("secret.txt"), "hunter2").unwrap();

    let server = TestServer::start(ServerConfig {
        data_dir: Some(data_dir),
        ..config()
    })
    .await;
    let mut client = MatrixClient::connect(server.addr).await.unwrap();

    let err = client.load_matrix("S", "../secret.txt").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SourceUnavailable));
    assert!(!err.to_string().contains("hunter2"));

    // переполнение до inf переживает передачу по сети
    client.load_matrix("A", "big.csv").await.unwrap();
    client.multiply("A", "A", "C", MultiplyMode::Naive).await.unwrap();
    assert_eq!(client.get_data("C").await.unwrap().values, vec![f32::INFINITY]);

    server.stop().await;
}

#[tokio::test]
async fn response_limits_on_both_sides() {
    let server = TestServer::start(ServerConfig {
        max_response_bytes: 4096,
        ..config()
    })
    .await;
    let mut client = MatrixClient::connect(server.addr)
        .await
        .unwrap()
        .with_max_response_bytes(256);

    client.create_zero_matrix("wide", 1, 100).await.unwrap();
    client.create_zero_matrix("huge", 100, 100).await.unwrap();

    let err = client.get_data("huge").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ResponseTooLarge));

    let err = client.get_data("wide").await.unwrap_err();
    assert!(matches!(err, ClientError::ResponseTooLarge(_)), "{}", err);

    // остаток длинного ответа вычитан, соединение пригодно дальше
    assert_eq!(client.get_matrix_size("wide").await.unwrap(), (1, 100));

    server.stop().await;
}
