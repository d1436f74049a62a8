
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::Level;

use parley_server::{RelayConfig, RelayService, serve_on};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub struct TestRelay {
    pub addr: SocketAddr,
    pub relay: RelayService,
    _shutdown: oneshot::Sender<()>,
}

impl TestRelay {
    /// Poll until exactly `count` channels are registered.
    pub async fn wait_for_connected(&self, count: usize) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(2000) {
            if self.relay.connected() == count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

pub async fn start_test_relay(max_peers: Option<usize>) -> TestRelay {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test relay");
    let addr = listener.local_addr().expect("No local addr");

    let relay = RelayService::new(RelayConfig {
        bind: addr.ip(),
        port: addr.port(),
        max_peers,
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn({
        let relay = relay.clone();
        async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = serve_on(listener, relay, shutdown).await {
                tracing::error!("Test relay failed: {:?}", e);
            }
        }
    });

    TestRelay {
        addr,
        relay,
        _shutdown: shutdown_tx,
    }
}
