//! Integration tests for the client connection lifecycle.
//!
//! Each test runs a scripted cluster node on a local TCP listener and drives
//! the client against it.

use clusterix::{Client, ClientConfig, ConnectionListener, Observer, SpotListener, SpotRecord};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const STEP: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum Event {
    Connection(bool),
    Spot(SpotRecord),
}

struct Recorder {
    tx: mpsc::UnboundedSender<Event>,
}

impl ConnectionListener for Recorder {
    fn on_connection_state(&self, connected: bool) {
        let _ = self.tx.send(Event::Connection(connected));
    }
}

impl SpotListener for Recorder {
    fn on_spot(&self, spot: &SpotRecord) {
        let _ = self.tx.send(Event::Spot(spot.clone()));
    }
}

impl Observer for Recorder {
    fn as_connection_listener(&self) -> Option<&dyn ConnectionListener> {
        Some(self)
    }

    fn as_spot_listener(&self) -> Option<&dyn SpotListener> {
        Some(self)
    }
}

fn recorder() -> (Arc<Recorder>, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Recorder { tx }), rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(STEP, rx.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Event channel closed")
}

async fn expect_connection(rx: &mut mpsc::UnboundedReceiver<Event>, expected: bool) {
    match next_event(rx).await {
        Event::Connection(connected) => assert_eq!(connected, expected),
        other => panic!("Expected connection state {}, got {:?}", expected, other),
    }
}

async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn config(port: u16) -> ClientConfig {
    ClientConfig::new("127.0.0.1")
        .with_server("127.0.0.1", port)
        .with_credentials("dl1abc", "secret")
        .with_quiet_period(Duration::from_millis(20))
        .with_retry_interval(Duration::from_millis(50))
}

async fn accept(listener: &TcpListener) -> BufReader<TcpStream> {
    let (socket, _) = timeout(STEP, listener.accept())
        .await
        .expect("Timed out waiting for client")
        .expect("Accept failed");
    BufReader::new(socket)
}

async fn read_line(node: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    timeout(STEP, node.read_line(&mut line))
        .await
        .expect("Timed out waiting for reply")
        .expect("Read failed");
    line
}

/// Run the login dialogue from the node's side.
async fn login(node: &mut BufReader<TcpStream>) {
    node.write_all(b"Welcome to the test node\r\nlogin: ")
        .await
        .unwrap();
    assert_eq!(read_line(node).await, "dl1abc\r\n");

    node.write_all(b"Password: ").await.unwrap();
    assert_eq!(read_line(node).await, "secret\r\n");

    node.write_all(b"Hello DL1ABC\r\ndl1abc de test 18-Oct-2026 1650Z CCC >")
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_login_and_spot_delivery() {
    let (listener, port) = listen().await;
    let (observer, mut events) = recorder();

    let client = Client::new(config(port));
    client.register(observer);
    client.connect().await.expect("Failed to connect");
    let mut node = accept(&listener).await;

    expect_connection(&mut events, true).await;
    assert!(!client.authenticated());

    login(&mut node).await;
    assert!(client.authenticated());

    node.write_all(
        b"DX de RX7K:       7154.0  RK7R         cq                             1650Z KN75\x07\x07\r\n",
    )
    .await
    .unwrap();

    let Event::Spot(spot) = next_event(&mut events).await else {
        panic!("Expected a spot");
    };
    assert_eq!(spot.spotter, "rx7k");
    assert_eq!(spot.call.to_string(), "RK7R");
    assert_eq!(spot.frequency_hz, 7_154_000);
    assert_eq!(spot.time.format("%H:%M").to_string(), "16:50");
    assert_eq!(spot.locator.map(|l| l.to_string()).as_deref(), Some("KN75"));
    assert_eq!(spot.text, "cq");

    client.disconnect();
}

#[tokio::test]
async fn test_no_spots_before_login() {
    let (listener, port) = listen().await;
    let (observer, mut events) = recorder();

    let client = Client::new(config(port));
    client.register(observer);
    client.connect().await.unwrap();
    let mut node = accept(&listener).await;
    expect_connection(&mut events, true).await;

    node.write_all(b"dx de a1bc:  7000.0  dl2abc  cq  1650z\r\n")
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;
    drop(node);

    // The unauthenticated spot is never delivered; the next event is the disconnect.
    expect_connection(&mut events, false).await;
    assert!(!client.authenticated());
}

#[tokio::test]
async fn test_end_of_stream_notifies_once() {
    let (listener, port) = listen().await;
    let (observer, mut events) = recorder();

    let client = Client::new(config(port));
    client.register(observer);
    client.connect().await.unwrap();
    let mut node = accept(&listener).await;
    expect_connection(&mut events, true).await;
    login(&mut node).await;

    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let fired = fired.clone();
        client.when_disconnected(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }

    drop(node);

    expect_connection(&mut events, false).await;
    timeout(STEP, client.disconnected())
        .await
        .expect("Connection should end");
    sleep(Duration::from_millis(50)).await;

    assert!(!client.connected());
    assert!(!client.is_closed());
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    assert!(events.try_recv().is_err(), "No further events expected");

    // Registered after the fact: fires right away.
    let late = Arc::new(AtomicUsize::new(0));
    let counter = late.clone();
    client.when_disconnected(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    sleep(Duration::from_millis(20)).await;
    assert_eq!(late.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_explicit_disconnect_is_idempotent() {
    let (listener, port) = listen().await;
    let (observer, mut events) = recorder();

    let client = Client::open(config(port)).await.unwrap();
    client.register(observer);
    let mut node = accept(&listener).await;

    client.disconnect();
    client.disconnect();

    expect_connection(&mut events, false).await;
    assert!(!client.connected());
    assert!(client.is_closed());

    // The node sees the connection close.
    let mut rest = String::new();
    let n = timeout(STEP, node.read_line(&mut rest))
        .await
        .expect("Timed out waiting for close")
        .unwrap();
    assert_eq!(n, 0);

    sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_persistent_mode_redials_until_closed() {
    let (listener, port) = listen().await;
    let (observer, mut events) = recorder();

    let client = Client::new(config(port));
    client.register(observer);
    let supervisor = client.keep_connected();

    let first = accept(&listener).await;
    expect_connection(&mut events, true).await;
    drop(first);
    expect_connection(&mut events, false).await;

    let _second = accept(&listener).await;
    expect_connection(&mut events, true).await;
    assert!(client.connected());

    client.disconnect();
    expect_connection(&mut events, false).await;
    timeout(STEP, supervisor)
        .await
        .expect("Supervisor should stop after disconnect")
        .unwrap();

    // No more dial attempts.
    let redial = timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(redial.is_err());
}

#[tokio::test]
async fn test_persistent_mode_retries_failed_dials() {
    let (listener, port) = listen().await;
    drop(listener);

    let client = Client::keep_open(config(port));
    sleep(Duration::from_millis(120)).await;
    assert!(!client.connected());

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("Failed to rebind test port");
    let _node = accept(&listener).await;
    sleep(Duration::from_millis(20)).await;
    assert!(client.connected());

    client.disconnect();
    timeout(STEP, client.disconnected())
        .await
        .expect("Connection should end");
}
