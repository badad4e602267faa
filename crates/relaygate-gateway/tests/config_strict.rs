#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use relaygate_gateway::config::{self, OverflowPolicy};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
gateway:
  listen: "0.0.0.0:1888"
offline:
  capasity: 10 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.gateway.listen, "0.0.0.0:1888");
    assert_eq!(cfg.decoder.max_frame_bytes, 64 * 1024);
    assert_eq!(cfg.offline.capacity, None);
    assert_eq!(cfg.offline.overflow, OverflowPolicy::Block);
    assert_eq!(cfg.gateway.send_timeout(), Some(std::time::Duration::from_millis(1500)));
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
gateway:
  listen: "127.0.0.1:2000"
  http_listen: "127.0.0.1:2001"
  handshake_timeout_ms: 500
  outbound_queue: 16
  send_timeout_ms: 0
decoder:
  max_frame_bytes: 4096
offline:
  capacity: 100
  overflow: reject
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.gateway.handshake_timeout().as_millis(), 500);
    assert_eq!(cfg.gateway.send_timeout(), None);
    assert_eq!(cfg.decoder.limits().max_frame_bytes, 4096);
    assert_eq!(cfg.offline.capacity, Some(100));
    assert_eq!(cfg.offline.overflow, OverflowPolicy::Reject);
}

#[test]
fn rejects_out_of_range_values() {
    for bad in [
        "version: 2\n",
        "version: 1\ngateway:\n  handshake_timeout_ms: 10\n",
        "version: 1\ngateway:\n  outbound_queue: 0\n",
        "version: 1\ndecoder:\n  max_frame_bytes: 8\n",
        "version: 1\noffline:\n  capacity: 0\n",
        "version: 1\noffline:\n  overflow: drop\n",
    ] {
        let err = config::load_from_str(bad).expect_err(bad);
        assert_eq!(err.kind().as_str(), "CONFIG", "{bad}");
    }
}

#[test]
fn listener_addresses_are_checked() {
    let err = config::load_from_str("version: 1\ngateway:\n  listen: \"localhost\"\n").expect_err("no port");
    assert!(err.to_string().contains("gateway.listen"), "{err}");

    let clash = "version: 1\ngateway:\n  listen: \"127.0.0.1:9000\"\n  http_listen: \"127.0.0.1:9000\"\n";
    let err = config::load_from_str(clash).expect_err("same socket");
    assert_eq!(err.kind().as_str(), "CONFIG");
    assert!(err.to_string().contains("127.0.0.1:9000"), "{err}");

    let cfg = config::load_from_str("version: 1\n").unwrap();
    assert_eq!(cfg.gateway.listen_addr().unwrap().port(), 1888);
    assert_eq!(cfg.gateway.http_addr().unwrap().port(), 8080);
}

#[test]
fn empty_document_is_rejected() {
    let err = config::load_from_str("  \n").expect_err("empty");
    assert_eq!(err.kind().as_str(), "CONFIG");
    assert!(err.to_string().contains("version: 1"), "{err}");
}

#[test]
fn yaml_errors_carry_the_line() {
    let err = config::load_from_str("version: 1\ngateway:\n  outbound_queue: [\n").expect_err("broken yaml");
    assert!(err.to_string().contains("line"), "{err}");
}

#[test]
fn file_errors_name_the_file() {
    let dir = std::env::temp_dir().join(format!("relaygate-cfg-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bad.yaml");
    std::fs::write(&path, "version: 1\ngateway:\n  outbound_queue: 0\n").unwrap();

    let err = config::load_from_file(&path).expect_err("invalid file");
    let msg = err.to_string();
    assert!(msg.contains("bad.yaml"), "{msg}");
    assert!(msg.contains("gateway.outbound_queue"), "{msg}");

    let err = config::load_from_file(dir.join("missing.yaml")).expect_err("missing file");
    assert!(err.to_string().contains("missing.yaml"), "{err}");
    std::fs::remove_dir_all(&dir).unwrap();
}
