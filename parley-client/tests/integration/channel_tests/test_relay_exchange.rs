use anyhow::Result;
use bytes::Bytes;

use parley_client::{Incoming, SignallingChannel};
use parley_core::{SessionDescription, SignallingMessage};

use crate::integration::{WAIT, eventually, init_tracing};
use crate::utils::test_servers::{fast_config, next_incoming, start_relay};

#[tokio::test]
async fn test_channels_exchange_through_relay() -> Result<()> {
    init_tracing();
    let (addr, relay, _shutdown) = start_relay().await?;

    let (a, mut a_rx) = SignallingChannel::connect(fast_config(addr));
    let (b, mut b_rx) = SignallingChannel::connect(fast_config(addr));
    assert!(a.wait_until_open(WAIT).await);
    assert!(b.wait_until_open(WAIT).await);
    assert!(eventually(|| relay.connected() == 2).await);

    let offer = SignallingMessage::Offer(SessionDescription::offer("v=0 relay test"));
    a.send_signal(&offer)?;
    assert_eq!(next_incoming(&mut b_rx).await, Some(Incoming::Signal(offer)));

    b.send_binary(vec![1u8, 2, 3])?;
    assert_eq!(
        next_incoming(&mut a_rx).await,
        Some(Incoming::Binary(Bytes::from_static(&[1, 2, 3])))
    );

    a.close();
    b.close();
    Ok(())
}
