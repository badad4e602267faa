#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use relaygate_core::protocol::{encode_to_bytes, FrameDecoder, MessageBody, ProtocolCategory, TransportMessage};
use relaygate_gateway::{app_state::AppState, config, transport};

async fn start(yaml: &str) -> (AppState, SocketAddr) {
    let cfg = config::load_from_str(yaml).unwrap();
    let state = AppState::new(cfg);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(transport::tcp::serve(state.clone(), listener));
    (state, addr)
}

const CFG: &str = "version: 1\ngateway:\n  handshake_timeout_ms: 300\n";

fn frame(msg: &TransportMessage) -> Vec<u8> {
    encode_to_bytes(msg).unwrap().to_vec()
}

fn online(user: &str) -> Vec<u8> {
    frame(&TransportMessage::body(ProtocolCategory::Online, 0, MessageBody::topic(user, "")))
}

/// Read until one message decodes (or fail after a second).
async fn read_message(stream: &mut TcpStream, dec: &mut FrameDecoder) -> TransportMessage {
    let mut buf = [0u8; 1024];
    loop {
        let n = timeout(Duration::from_secs(1), stream.read(&mut buf)).await.unwrap().unwrap();
        assert!(n > 0, "connection closed before a message arrived");
        if let Some(m) = dec.feed(&buf[..n]).next() {
            return m.unwrap();
        }
    }
}

async fn wait_online(state: &AppState, n: usize) {
    for _ in 0..100 {
        if state.sessions().online_users() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("users never came online");
}

async fn closed_by_peer(stream: &mut TcpStream, within: Duration) -> bool {
    let mut buf = [0u8; 64];
    matches!(timeout(within, stream.read(&mut buf)).await, Ok(Ok(0)) | Ok(Err(_)))
}

#[tokio::test]
async fn one_to_one_over_tcp() {
    let (state, addr) = start(CFG).await;
    let mut a = TcpStream::connect(addr).await.unwrap();
    let mut b = TcpStream::connect(addr).await.unwrap();

    a.write_all(&online("a")).await.unwrap();
    b.write_all(&online("b")).await.unwrap();
    wait_online(&state, 2).await;

    let msg = TransportMessage::body(
        ProtocolCategory::One,
        3,
        MessageBody {
            message_id: 77,
            body: "hi a".into(),
            timestamp: 1_700_000_000,
            ..MessageBody::topic("b", "a")
        },
    );
    // split mid-frame to exercise resumable decoding on the server
    let bytes = frame(&msg);
    let (head, tail) = bytes.split_at(5);
    b.write_all(head).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    b.write_all(tail).await.unwrap();

    let mut dec = FrameDecoder::default();
    let got = read_message(&mut a, &mut dec).await;
    assert_eq!(got, msg);
}

#[tokio::test]
async fn ping_is_answered() {
    let (_state, addr) = start(CFG).await;
    let mut c = TcpStream::connect(addr).await.unwrap();
    c.write_all(&frame(&TransportMessage::ping(0x5))).await.unwrap();

    let mut dec = FrameDecoder::default();
    let got = read_message(&mut c, &mut dec).await;
    assert_eq!(got, TransportMessage::ping(0x5));
}

#[tokio::test]
async fn silent_connection_is_closed_after_handshake_timeout() {
    let (state, addr) = start(CFG).await;
    let mut c = TcpStream::connect(addr).await.unwrap();

    assert!(closed_by_peer(&mut c, Duration::from_secs(2)).await);
    assert_eq!(state.metrics().liveness.get(&[("outcome", "timed_out")]), 1);
}

#[tokio::test]
async fn online_connection_outlives_handshake_timeout() {
    let (state, addr) = start(CFG).await;
    let mut c = TcpStream::connect(addr).await.unwrap();
    c.write_all(&online("u1")).await.unwrap();
    wait_online(&state, 1).await;

    assert!(!closed_by_peer(&mut c, Duration::from_millis(600)).await);
    assert_eq!(state.metrics().liveness.get(&[("outcome", "confirmed")]), 1);
}

#[tokio::test]
async fn oversized_frame_closes_connection() {
    let (state, addr) = start("version: 1\ndecoder:\n  max_frame_bytes: 64\n").await;
    let mut c = TcpStream::connect(addr).await.unwrap();

    let big = TransportMessage::body(
        ProtocolCategory::One,
        0,
        MessageBody {
            body: "x".repeat(200),
            ..MessageBody::topic("u1", "u2")
        },
    );
    c.write_all(&frame(&big)).await.unwrap();

    assert!(closed_by_peer(&mut c, Duration::from_secs(2)).await);
    assert_eq!(
        state.metrics().decode_errors.get(&[("kind", "RESOURCE_EXHAUSTED")]),
        1
    );
}

#[tokio::test]
async fn message_to_offline_user_is_queued() {
    let (state, addr) = start(CFG).await;
    let mut c = TcpStream::connect(addr).await.unwrap();
    c.write_all(&online("u1")).await.unwrap();
    wait_online(&state, 1).await;

    let msg = TransportMessage::body(ProtocolCategory::One, 0, MessageBody::topic("u1", "nobody"));
    c.write_all(&frame(&msg)).await.unwrap();

    for _ in 0..100 {
        if state.offline().backlog() == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("message never reached the offline pipeline");
}
