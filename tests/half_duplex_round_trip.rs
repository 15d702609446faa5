//! A `HalfDuplexIn` session receives one request, then replies on the same
//! socket only if that receive produced bytes with no error (spec.md §4.8,
//! invariant P7): the client writes a request, reads back a reply, and a
//! second client that never writes anything never receives one either.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
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
async fn half_duplex_in_replies_only_after_a_real_receive() {
    transit::dev_tracing::init_tracing();
    let port = portpicker::pick_unused_port().expect("unused port");

    let requests: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let requests_for_input = Arc::clone(&requests);

    let config = EndpointConfig::new(port, TransferType::HalfDuplexIn)
        .with_input_callback(move |buf| {
            requests_for_input.lock().unwrap().extend_from_slice(&buf.to_vec());
            true
        })
        .with_output_callback(|buf| {
            buf.append(b"PONG");
            true
        });

    let runtime = Runtime::standalone(2_000);
    let server = TcpServer::with_runtime(config, runtime);
    runtime.start();

    assert!(poll_until(|| server.is_listening(), 50, Duration::from_millis(20)).await);

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
    stream.write_all(b"PING").await.expect("write request");

    let mut reply = [0u8; 4];
    tokio::time::timeout(Duration::from_secs(1), stream.read_exact(&mut reply))
        .await
        .expect("reply did not arrive before the test timeout")
        .expect("read reply");
    assert_eq!(&reply, b"PONG");
    assert_eq!(requests.lock().unwrap().as_slice(), b"PING");
}

#[tokio::test]
async fn half_duplex_in_sends_nothing_to_a_silent_client() {
    transit::dev_tracing::init_tracing();
    let port = portpicker::pick_unused_port().expect("unused port");

    let output_invocations = Arc::new(Mutex::new(0usize));
    let output_invocations_for_cb = Arc::clone(&output_invocations);

    let config = EndpointConfig::new(port, TransferType::HalfDuplexIn)
        .with_input_callback(|_buf| true)
        .with_output_callback(move |buf| {
            *output_invocations_for_cb.lock().unwrap() += 1;
            buf.append(b"should-not-be-sent");
            true
        });

    let runtime = Runtime::standalone(2_000);
    let server = TcpServer::with_runtime(config, runtime);
    runtime.start();

    assert!(poll_until(|| server.is_listening(), 50, Duration::from_millis(20)).await);

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
    assert!(poll_until(|| server.sockets_count() == 1, 50, Duration::from_millis(20)).await);

    // Never write anything: the session's Receive leg sees zero bytes with
    // no error, so per P7 the paired Send leg must never run.
    let mut probe = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_millis(300), stream.read(&mut probe)).await;
    assert!(read.is_err(), "server sent a reply despite receiving nothing");
    assert_eq!(*output_invocations.lock().unwrap(), 0);
}
