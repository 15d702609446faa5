//! A real client talking to a real `TcpServer` over a loopback socket: the
//! client drives the connection from a `tokio` runtime, the server side runs
//! on its own `compio` runtime thread via `Runtime::standalone`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::sleep;

use transit::prelude::*;

async fn poll_until(mut cond: impl FnMut() -> bool, attempts: u32, step: Duration) -> bool {
    for _ in 0..attempts {
        if cond() {
            return true;
        }
        sleep(step).await;
    }
    cond()
}

#[tokio::test]
async fn simplex_in_delivers_bytes_to_input_callback() {
    transit::dev_tracing::init_tracing();
    let port = portpicker::pick_unused_port().expect("unused port");
    let received: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let received_for_cb = Arc::clone(&received);

    let config = EndpointConfig::new(port, TransferType::SimplexIn).with_input_callback(move |buf| {
        received_for_cb.lock().unwrap().extend_from_slice(&buf.to_vec());
        true
    });

    let runtime = Runtime::standalone(2_000);
    let server = TcpServer::with_runtime(config, runtime);
    runtime.start();

    assert!(poll_until(|| server.is_listening(), 50, Duration::from_millis(20)).await);

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
    stream.write_all(b"hello transit").await.expect("write");
    stream.shutdown().await.expect("shutdown");
    drop(stream);

    let got = poll_until(
        || received.lock().unwrap().as_slice() == b"hello transit",
        100,
        Duration::from_millis(20),
    )
    .await;
    assert!(got, "server never observed the bytes written by the client");

    let closed = poll_until(|| server.sockets_count() == 0, 100, Duration::from_millis(20)).await;
    assert!(closed, "session never closed after client EOF");
}

#[tokio::test]
async fn simplex_out_streams_from_output_callback() {
    transit::dev_tracing::init_tracing();
    let port = portpicker::pick_unused_port().expect("unused port");
    let remaining: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(b"streamed-out".to_vec()));
    let remaining_for_cb = Arc::clone(&remaining);

    let config = EndpointConfig::new(port, TransferType::SimplexOut).with_output_callback(move |buf| {
        let mut chunk = remaining_for_cb.lock().unwrap();
        if chunk.is_empty() {
            return false;
        }
        buf.append(&chunk);
        chunk.clear();
        true
    });

    let runtime = Runtime::standalone(2_000);
    let server = TcpServer::with_runtime(config, runtime);
    runtime.start();

    assert!(poll_until(|| server.is_listening(), 50, Duration::from_millis(20)).await);

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
    let mut buf = [0u8; 32];
    let n = tokio::time::timeout(Duration::from_secs(1), tokio::io::AsyncReadExt::read(&mut stream, &mut buf))
        .await
        .expect("read did not time out")
        .expect("read succeeded");
    assert_eq!(&buf[..n], b"streamed-out");
}
