use anyhow::Result;

use parley_client::{Incoming, SignallingChannel};
use parley_core::SignallingMessage;

use crate::integration::{WAIT, init_tracing};
use crate::utils::test_servers::{fast_config, next_incoming, start_flaky_server};

#[tokio::test]
async fn test_unknown_and_malformed_frames_are_discarded() -> Result<()> {
    init_tracing();
    let greeting = vec![
        r#"{"type":"bogus","data":{}}"#.to_string(),
        "not json at all".to_string(),
        r#"{"type":"hangup","data":""}"#.to_string(),
    ];
    let (addr, _accepted, _frames) = start_flaky_server(0, greeting).await?;

    let (channel, mut rx) = SignallingChannel::connect(fast_config(addr));
    assert!(channel.wait_until_open(WAIT).await);

    assert_eq!(
        next_incoming(&mut rx).await,
        Some(Incoming::Signal(SignallingMessage::Hangup))
    );
    channel.close();
    Ok(())
}
