use parley_core::{SessionDescription, SignallingMessage};

use crate::integration::{init_tracing, start_test_relay};
use crate::utils::TestClient;

/// Without a capacity limit the relay is one flat broadcast domain: an offer
/// meant for one peer reaches every other peer.
#[tokio::test]
async fn test_three_peers_fan_out() {
    init_tracing();

    let relay = start_test_relay(None).await;

    let mut client_x = TestClient::connect(relay.addr).await.expect("connect x");
    let mut client_y = TestClient::connect(relay.addr).await.expect("connect y");
    let mut client_z = TestClient::connect(relay.addr).await.expect("connect z");
    assert!(relay.wait_for_connected(3).await);

    let offer = SignallingMessage::Offer(SessionDescription::offer("v=0\r\n"));
    client_x.send_signal(&offer).await.expect("send offer");

    assert_eq!(client_y.recv_signal().await.expect("y"), offer);
    assert_eq!(client_z.recv_signal().await.expect("z"), offer);
    assert!(client_x.is_silent().await);
}
