//! # Request/Response Commands
//!
//! Queries, output writes and protocol-level errors.

#[cfg(test)]
mod tests {
    use crate::client::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_module_query() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        let response = client
            .request_ok(json!({"command": "module", "address": TEST_MODULE_ADDR}))
            .await;
        let module = &response["module"];
        assert_eq!(module["address"], TEST_MODULE_ADDR);
        assert_eq!(module["type_code"], TEST_MODULE_TYPE);
        assert_eq!(module["name"], "Test");
        assert_eq!(module["active"], true);
        assert_eq!(module["inputs"].as_array().unwrap().len(), 16);
        assert_eq!(module["outputs"].as_array().unwrap().len(), 16);
        assert!(module["config"]["outputsSafe"].is_array());

        let response = client
            .request_ok(json!({"command": "module", "address": INACTIVE_MODULE_ADDR}))
            .await;
        assert_eq!(response["module"]["active"], false);

        client
            .request_error(json!({"command": "module", "address": 3}), 1101)
            .await;
        client
            .request_error(json!({"command": "module", "address": 256}), 1100)
            .await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_modules_query() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        let response = client.request_ok(json!({"command": "modules"})).await;
        let modules = response["modules"].as_object().unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules["1"]["name"], "Test");
        assert_eq!(modules["2"]["name"], "Inactive");

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_mtbusb_and_version() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        let response = client.request_ok(json!({"command": "mtbusb"})).await;
        assert_eq!(response["mtbusb"]["connected"], true);
        assert_eq!(response["mtbusb"]["active_modules"], json!([TEST_MODULE_ADDR]));
        assert_eq!(response["mtbusb"]["scans"], 1);

        let response = client.request_ok(json!({"command": "version"})).await;
        assert!(response["version"]["sw_version"].is_string());

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_set_outputs_updates_state() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;
        client.subscribe(&[TEST_MODULE_ADDR]).await;

        client
            .request_ok(json!({
                "command": "module_set_outputs",
                "address": TEST_MODULE_ADDR,
                "outputs": {"0": 1, "15": 1},
            }))
            .await;
        for _ in 0..4 {
            let event = client.receive_event().await;
            assert!(
                event["command"] == "module_outputs_changed"
                    || event["command"] == "module_inputs_changed"
            );
        }

        let response = client
            .request_ok(json!({"command": "module", "address": TEST_MODULE_ADDR}))
            .await;
        let outputs = response["module"]["outputs"].as_array().unwrap();
        assert_eq!(outputs[0], 1);
        assert_eq!(outputs[1], 0);
        assert_eq!(outputs[15], 1);
        assert_eq!(response["module"]["inputs"][15], true);

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_set_outputs_errors() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        let cases = [
            (json!({"command": "module_set_outputs", "address": 0, "outputs": {"0": 1}}), 1100),
            (json!({"command": "module_set_outputs", "address": 99, "outputs": {"0": 1}}), 1101),
            (
                json!({"command": "module_set_outputs", "address": INACTIVE_MODULE_ADDR, "outputs": {"0": 1}}),
                1102,
            ),
            (
                json!({"command": "module_set_outputs", "address": TEST_MODULE_ADDR, "outputs": {"16": 1}}),
                1103,
            ),
            (
                json!({"command": "module_set_outputs", "address": TEST_MODULE_ADDR, "outputs": {"-1": 1}}),
                1103,
            ),
        ];
        for (request, code) in cases {
            client.request_error(request, code).await;
        }

        // Nothing reached the bus.
        let response = client
            .request_ok(json!({"command": "module", "address": TEST_MODULE_ADDR}))
            .await;
        assert!(response["module"]["outputs"]
            .as_array()
            .unwrap()
            .iter()
            .all(|v| v == 0));

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_set_config_creates_and_edits() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        let response = client
            .request_ok(json!({
                "command": "module_set_config",
                "address": 30,
                "type_code": 0x30,
                "name": "Railcom",
            }))
            .await;
        assert_eq!(response["module"]["name"], "Railcom");
        assert_eq!(response["module"]["active"], false);
        assert_eq!(response["module"]["inputs"].as_array().unwrap().len(), 8);
        assert!(response["module"]["outputs"].as_array().unwrap().is_empty());

        // Type is kept when omitted on edit.
        let response = client
            .request_ok(json!({"command": "module_set_config", "address": 30, "name": "RC"}))
            .await;
        assert_eq!(response["module"]["type_code"], 0x30);
        assert_eq!(response["module"]["name"], "RC");

        client
            .request_error(
                json!({"command": "module_set_config", "address": 31, "name": "Untyped"}),
                1021,
            )
            .await;
        client
            .request_error(
                json!({"command": "module_set_config", "address": 0, "type_code": 0x15}),
                1100,
            )
            .await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        client.send_raw("this is not json").await;
        let response = client.receive_response().await;
        assert_eq!(response["status"], "error");
        assert_eq!(response["error"]["code"], 1021);

        client
            .request_error(json!({"command": "self_destruct"}), 1020)
            .await;
        client
            .request_error(json!({"command": "module"}), 1021)
            .await;

        // Connection stays usable.
        client.request_ok(json!({"command": "version"})).await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_addresses_beyond_i64_rejected() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        let cases = [
            r#"{"command": "module_subscribe", "type": "request", "id": 1, "addresses": [5, 18446744073709551615]}"#,
            r#"{"command": "module_delete", "type": "request", "id": 2, "address": 9223372036854775808}"#,
            r#"{"command": "module", "type": "request", "id": 3, "address": 1.0}"#,
        ];
        for request in cases {
            client.send_raw(request).await;
            let response = client.receive_response().await;
            assert_eq!(response["error"]["code"], 1100, "{request}");
        }

        let response = client
            .request_ok(json!({"command": "my_module_subscribes"}))
            .await;
        assert_eq!(response["addresses"], json!([]));

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_utf8_keeps_connection() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        client.send_bytes(b"{\"command\": \"version\", \"x\": \"\xff\xfe\"}").await;
        let response = client.receive_response().await;
        assert_eq!(response["status"], "error");
        assert_eq!(response["error"]["code"], 1021);

        client.request_ok(json!({"command": "version"})).await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_request_rejected() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        let max = test_config().server.max_message_size;
        let huge = json!({"command": "version", "padding": "x".repeat(max)});
        client.send_raw(&huge.to_string()).await;
        let response = client.receive_response().await;
        assert_eq!(response["error"]["code"], 1021);

        // Far beyond the limit; still answered once and the stream resyncs.
        client.send_raw(&"y".repeat(max * 8)).await;
        let response = client.receive_response().await;
        assert_eq!(response["error"]["code"], 1021);

        client.request_ok(json!({"command": "version"})).await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_connections() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;
        client.request_ok(json!({"command": "version"})).await;

        daemon.shutdown().await;
        assert!(client.is_closed().await);
    }
}
