//! `sockets_limit` is enforced at the accept loop: once the count reaches
//! the limit the loop sets `ErrSocketCount` and stops accepting entirely
//! rather than silently dropping further connections on the floor.

use std::time::Duration;

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
async fn accept_loop_reports_err_socket_count_at_the_limit() {
    transit::dev_tracing::init_tracing();
    let port = portpicker::pick_unused_port().expect("unused port");
    let config = EndpointConfig::new(port, TransferType::SimplexIn)
        .with_sockets_limit(1)
        .with_socket_deadline_ms(0);

    let runtime = Runtime::standalone(2_000);
    let server = TcpServer::with_runtime(config, runtime);
    runtime.start();

    assert!(poll_until(|| server.is_listening(), 50, Duration::from_millis(20)).await);
    assert_eq!(runtime.state(), RuntimeState::Ok);

    let _first = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
    assert!(poll_until(|| server.sockets_count() == 1, 50, Duration::from_millis(20)).await);

    let hit_limit = poll_until(
        || runtime.state() == RuntimeState::ErrSocketCount,
        50,
        Duration::from_millis(20),
    )
    .await;
    assert!(hit_limit, "accept loop never reported ErrSocketCount at sockets_limit");
}
