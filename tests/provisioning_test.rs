//! Integration tests for the credentials handshake.

mod common;

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

use common::{link_manager, next_event, MockAdapter, BRIDGE};
use spp_wifi_provisioner::config::ProvisioningConfig;
use spp_wifi_provisioner::provisioning::CommandFormat;
use spp_wifi_provisioner::{
    ConnectionEvent, CredentialError, LinkError, ProvisionError, ProvisioningResult,
    ProvisioningSession,
};

/// Peripheral side: reads one command line, then writes `replies`.
async fn answer(peer: &mut BufReader<DuplexStream>, replies: &[&str]) -> String {
    let mut line = String::new();
    peer.read_line(&mut line).await.unwrap();
    for reply in replies {
        peer.get_mut().write_all(reply.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    line
}

#[tokio::test]
async fn test_short_password_writes_nothing() {
    let adapter = MockAdapter::new();
    let (link, _events) = link_manager(&adapter);
    let mut peer = adapter.queue_peer();
    link.connect(BRIDGE).await.unwrap();

    let session = ProvisioningSession::new(link.clone(), &ProvisioningConfig::default());
    let result = session.send_credentials("lab", "short").await;
    assert!(matches!(
        result,
        Err(ProvisionError::InvalidInput(CredentialError::PasswordTooShort { len: 5, min: 8 }))
    ));

    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_millis(50), peer.read(&mut buf)).await;
    assert!(read.is_err(), "bytes were written for invalid input");
}

#[tokio::test]
async fn test_not_connected() {
    let adapter = MockAdapter::new();
    let (link, _events) = link_manager(&adapter);

    let session = ProvisioningSession::new(link, &ProvisioningConfig::default());
    let result = session.send_credentials("lab", "longpass1").await;
    assert!(matches!(
        result,
        Err(ProvisionError::Link(LinkError::NotConnected))
    ));
}

#[tokio::test]
async fn test_success_reply() {
    let adapter = MockAdapter::new();
    let (link, _events) = link_manager(&adapter);
    let peer = adapter.queue_peer();
    link.connect(BRIDGE).await.unwrap();

    let bridge = tokio::spawn(async move {
        let mut peer = BufReader::new(peer);
        answer(&mut peer, &["WIFI_SET_OK\n"]).await
    });

    let session = ProvisioningSession::new(link.clone(), &ProvisioningConfig::default());
    let result = session.send_credentials("lab", "longpass1").await.unwrap();
    assert_eq!(result, ProvisioningResult::Success);
    assert_eq!(bridge.await.unwrap(), "SET_WIFI,lab,longpass1\n");
}

#[tokio::test]
async fn test_failure_reply() {
    let adapter = MockAdapter::new();
    let (link, _events) = link_manager(&adapter);
    let peer = adapter.queue_peer();
    link.connect(BRIDGE).await.unwrap();

    let _bridge = tokio::spawn(async move {
        let mut peer = BufReader::new(peer);
        answer(&mut peer, &["WIFI_FAIL\r\n"]).await;
        peer
    });

    let session = ProvisioningSession::new(link.clone(), &ProvisioningConfig::default());
    let result = session.send_credentials("lab", "longpass1").await.unwrap();
    assert_eq!(result, ProvisioningResult::Failure("WIFI_FAIL".to_string()));
}

#[tokio::test]
async fn test_unclassified_lines_are_skipped() {
    let adapter = MockAdapter::new();
    let (link, _events) = link_manager(&adapter);
    let peer = adapter.queue_peer();
    link.connect(BRIDGE).await.unwrap();

    let _bridge = tokio::spawn(async move {
        let mut peer = BufReader::new(peer);
        answer(&mut peer, &["ETH link up\n", "WIFI_SUCC", "ESS\n"]).await;
        peer
    });

    let session = ProvisioningSession::new(link.clone(), &ProvisioningConfig::default());
    let result = session.send_credentials("lab", "longpass1").await.unwrap();
    assert_eq!(result, ProvisioningResult::Success);
}

#[tokio::test]
async fn test_timeout_then_late_reply() {
    let adapter = MockAdapter::new();
    let (link, mut events) = link_manager(&adapter);
    let peer = adapter.queue_peer();
    link.connect(BRIDGE).await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected { .. }
    ));

    let mut peer = BufReader::new(peer);
    let session = ProvisioningSession::new(link.clone(), &ProvisioningConfig::default())
        .with_timeout(Duration::from_millis(100));

    let (result, line) = tokio::join!(
        session.send_credentials("lab", "longpass1"),
        answer(&mut peer, &[])
    );
    assert_eq!(result.unwrap(), ProvisioningResult::Timeout);
    assert_eq!(line, "SET_WIFI,lab,longpass1\n");

    // A late reply resolves nothing but is still delivered as a message.
    peer.get_mut().write_all(b"WIFI_SUCCESS\n").await.unwrap();
    match next_event(&mut events).await {
        ConnectionEvent::MessageReceived(m) => assert_eq!(m.text, "WIFI_SUCCESS"),
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(link.state().is_connected());
}

#[tokio::test]
async fn test_link_lost_while_waiting() {
    let adapter = MockAdapter::new();
    let (link, _events) = link_manager(&adapter);
    let peer = adapter.queue_peer();
    link.connect(BRIDGE).await.unwrap();

    tokio::spawn(async move {
        let mut peer = BufReader::new(peer);
        answer(&mut peer, &[]).await;
        drop(peer);
    });

    let session = ProvisioningSession::new(link.clone(), &ProvisioningConfig::default());
    let result = tokio::time::timeout(
        Duration::from_secs(1),
        session.send_credentials("lab", "longpass1"),
    )
    .await
    .expect("handshake did not notice the lost link");
    assert!(matches!(result, Err(ProvisionError::ConnectionLost)));
}

#[tokio::test]
async fn test_legacy_command_format() {
    let adapter = MockAdapter::new();
    let (link, _events) = link_manager(&adapter);
    let peer = adapter.queue_peer();
    link.connect(BRIDGE).await.unwrap();

    let bridge = tokio::spawn(async move {
        let mut peer = BufReader::new(peer);
        answer(&mut peer, &["WIFI_SUCCESS\n"]).await
    });

    let config = ProvisioningConfig {
        command_format: CommandFormat::Legacy,
        ..Default::default()
    };
    let session = ProvisioningSession::new(link.clone(), &config);
    let result = session.send_credentials(" lab ", "longpass1").await.unwrap();
    assert_eq!(result, ProvisioningResult::Success);
    assert_eq!(bridge.await.unwrap(), "lab,longpass1\n");
}

#[tokio::test]
async fn test_requests_are_serialized() {
    let adapter = MockAdapter::new();
    let (link, _events) = link_manager(&adapter);
    let peer = adapter.queue_peer();
    link.connect(BRIDGE).await.unwrap();

    let bridge = tokio::spawn(async move {
        let mut peer = BufReader::new(peer);
        let first = answer(&mut peer, &["WIFI_SUCCESS\n"]).await;
        let second = answer(&mut peer, &["WIFI_SET_ERROR\n"]).await;
        (first, second)
    });

    let session = ProvisioningSession::new(link.clone(), &ProvisioningConfig::default());
    let (first, second) = tokio::join!(
        session.send_credentials("home", "longpass1"),
        session.send_credentials("office", "longpass2")
    );

    assert_eq!(first.unwrap(), ProvisioningResult::Success);
    assert_eq!(
        second.unwrap(),
        ProvisioningResult::Failure("WIFI_SET_ERROR".to_string())
    );

    let (line1, line2) = bridge.await.unwrap();
    assert_eq!(line1, "SET_WIFI,home,longpass1\n");
    assert_eq!(line2, "SET_WIFI,office,longpass2\n");
}
