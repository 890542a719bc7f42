//! Test client and daemon fixture.

use mtb_daemon::domain::config::{ModuleSeed, SimulatedModule};
use mtb_daemon::{DaemonConfig, DaemonRuntime};
use mtb_types::ModuleAddress;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Module present on the loopback bus.
pub const TEST_MODULE_ADDR: u8 = 1;
/// Module configured but never seen on the bus.
pub const INACTIVE_MODULE_ADDR: u8 = 2;
/// Type code of both fixture modules (MTB-UNI v4).
pub const TEST_MODULE_TYPE: u8 = 0x15;

/// How long to wait for an expected message.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);
/// How long silence must last for `expect_no_message`.
pub const SILENCE: Duration = Duration::from_millis(200);

/// Fixture config: daemon on an ephemeral localhost port.
pub fn test_config() -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.server.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.server.port = 0;
    config.bus.simulated_modules = vec![SimulatedModule {
        address: i64::from(TEST_MODULE_ADDR),
        type_code: TEST_MODULE_TYPE,
    }];
    for (address, name) in [(TEST_MODULE_ADDR, "Test"), (INACTIVE_MODULE_ADDR, "Inactive")] {
        config.modules.insert(
            address.to_string(),
            ModuleSeed {
                type_code: TEST_MODULE_TYPE,
                name: name.into(),
                config: None,
            },
        );
    }
    config
}

/// Start a fixture daemon and wait for the initial bus scan to land.
pub async fn start_daemon() -> DaemonRuntime {
    start_daemon_with(test_config()).await
}

/// [`start_daemon`] with a custom config that keeps module 1 on the bus.
pub async fn start_daemon_with(config: DaemonConfig) -> DaemonRuntime {
    let runtime = DaemonRuntime::start(config)
        .await
        .expect("daemon failed to start");
    let core = runtime.core();
    let address = ModuleAddress::new(i64::from(TEST_MODULE_ADDR)).unwrap();
    timeout(RECEIVE_TIMEOUT, async {
        while !core.module(address).map(|m| m.active).unwrap_or(false) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("test module never became active");
    runtime
}

/// Client speaking the line-JSON protocol.
///
/// Events received while waiting for a response are buffered and handed
/// out by [`expect_event`](Self::expect_event).
pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    pending_events: VecDeque<Value>,
    next_id: u64,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect failed");
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
            pending_events: VecDeque::new(),
            next_id: 1,
        }
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.send_bytes(line.as_bytes()).await;
    }

    /// Send one line of arbitrary bytes.
    pub async fn send_bytes(&mut self, line: &[u8]) {
        self.writer.write_all(line).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn receive(&mut self) -> Option<Value> {
        match timeout(RECEIVE_TIMEOUT, self.lines.next_line()).await {
            Ok(Ok(Some(line))) => Some(serde_json::from_str(&line).expect("invalid JSON")),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => panic!("read failed: {e}"),
            Err(_) => panic!("no message within {RECEIVE_TIMEOUT:?}"),
        }
    }

    /// Next non-event message.
    pub async fn receive_response(&mut self) -> Value {
        loop {
            let message = self.receive().await.expect("connection closed");
            if message["type"] == "event" {
                self.pending_events.push_back(message);
            } else {
                return message;
            }
        }
    }

    /// Send a request and return its response regardless of status.
    pub async fn request(&mut self, mut request: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        request["type"] = json!("request");
        request["id"] = json!(id);
        self.send_raw(&request.to_string()).await;

        let response = self.receive_response().await;
        assert_eq!(response["type"], "response");
        assert_eq!(response["id"], id);
        assert_eq!(response["command"], request["command"]);
        response
    }

    /// Send a request that must succeed.
    pub async fn request_ok(&mut self, request: Value) -> Value {
        let response = self.request(request).await;
        assert_eq!(response["status"], "ok", "unexpected error: {response}");
        response
    }

    /// Send a request that must fail with `code`.
    pub async fn request_error(&mut self, request: Value, code: u16) -> Value {
        let response = self.request(request).await;
        assert_eq!(response["status"], "error", "unexpected success: {response}");
        assert_eq!(response["error"]["code"], code, "wrong error: {response}");
        response
    }

    /// Next event of any kind.
    pub async fn receive_event(&mut self) -> Value {
        let event = match self.pending_events.pop_front() {
            Some(event) => event,
            None => self.receive().await.expect("connection closed"),
        };
        assert_eq!(event["type"], "event", "expected event, got {event}");
        event
    }

    /// Next event, which must be named `command`.
    pub async fn expect_event(&mut self, command: &str) -> Value {
        let event = self.receive_event().await;
        assert_eq!(event["command"], command, "unexpected event {event}");
        event
    }

    /// Assert nothing arrives for a while.
    pub async fn expect_no_message(&mut self) {
        assert!(
            self.pending_events.is_empty(),
            "unexpected buffered events: {:?}",
            self.pending_events
        );
        if let Ok(line) = timeout(SILENCE, self.lines.next_line()).await {
            panic!("unexpected message: {line:?}");
        }
    }

    /// Whether the daemon closed the connection.
    pub async fn is_closed(&mut self) -> bool {
        matches!(
            timeout(RECEIVE_TIMEOUT, self.lines.next_line()).await,
            Ok(Ok(None)) | Ok(Err(_))
        )
    }

    pub async fn subscribe(&mut self, addresses: &[u8]) -> Value {
        self.request_ok(json!({"command": "module_subscribe", "addresses": addresses}))
            .await
    }

    pub async fn unsubscribe(&mut self, addresses: &[u8]) -> Value {
        self.request_ok(json!({"command": "module_unsubscribe", "addresses": addresses}))
            .await
    }

    pub async fn set_single_output(&mut self, address: u8, port: u8, value: u8) {
        self.request_ok(single_output_request(address, port, value))
            .await;
    }
}

/// `module_set_outputs` request for one port.
pub fn single_output_request(address: u8, port: u8, value: u8) -> Value {
    let mut outputs = json!({});
    outputs[port.to_string()] = json!(value);
    json!({
        "command": "module_set_outputs",
        "address": address,
        "outputs": outputs,
    })
}

/// Check a `module_inputs_changed` event.
pub fn validate_ic_event(event: &Value, address: u8, port: u8, value: bool) {
    assert_eq!(event["module"], address);
    assert_eq!(event["port"], port);
    assert_eq!(event["value"], value);
}

/// Check a `module_outputs_changed` event.
pub fn validate_oc_event(event: &Value, address: u8, port: u8, value: u8) {
    assert_eq!(event["module"], address);
    assert_eq!(event["port"], port);
    assert_eq!(event["value"], value);
}
