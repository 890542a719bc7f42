//! # Module Lifecycle and Topology
//!
//! Deletion, configuration edits and bus presence changes, as seen by
//! module subscribers and topology subscribers.

#[cfg(test)]
mod tests {
    use crate::client::*;
    use mtb_types::ModuleAddress;
    use serde_json::{json, Value};

    fn address(raw: u8) -> ModuleAddress {
        ModuleAddress::new(i64::from(raw)).unwrap()
    }

    fn recreate_inactive() -> Value {
        json!({
            "command": "module_set_config",
            "address": INACTIVE_MODULE_ADDR,
            "type_code": TEST_MODULE_TYPE,
            "name": "Inactive",
        })
    }

    #[tokio::test]
    async fn test_topology_endpoints_exist() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        client
            .request_ok(json!({"command": "topology_subscribe"}))
            .await;
        client
            .request_ok(json!({"command": "topology_unsubscribe"}))
            .await;
        client.expect_no_message().await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_module_deleted_event_topo_subscribe() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;
        let mut observer = TestClient::connect(daemon.local_addr()).await;
        observer
            .request_ok(json!({"command": "topology_subscribe"}))
            .await;

        client
            .request_ok(json!({"command": "module_delete", "address": INACTIVE_MODULE_ADDR}))
            .await;
        let event = observer.expect_event("module_deleted").await;
        assert_eq!(event["module"], INACTIVE_MODULE_ADDR);

        // Recreation is a topology change too.
        client.request_ok(recreate_inactive()).await;
        let event = observer.expect_event("module").await;
        assert_eq!(event["module"]["address"], INACTIVE_MODULE_ADDR);
        assert_eq!(event["module"]["name"], "Inactive");
        observer.expect_no_message().await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_module_deleted_event_module_subscribe() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;
        let mut observer = TestClient::connect(daemon.local_addr()).await;
        observer.subscribe(&[INACTIVE_MODULE_ADDR]).await;

        client
            .request_ok(json!({"command": "module_delete", "address": INACTIVE_MODULE_ADDR}))
            .await;
        let event = observer.expect_event("module_deleted").await;
        assert_eq!(event["module"], INACTIVE_MODULE_ADDR);

        client
            .request_error(
                json!({"command": "module", "address": INACTIVE_MODULE_ADDR}),
                1101,
            )
            .await;
        client.request_ok(recreate_inactive()).await;
        observer.expect_event("module").await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_module_deleted_no_event_when_not_subscribed() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;
        let mut observer = TestClient::connect(daemon.local_addr()).await;
        observer.subscribe(&[TEST_MODULE_ADDR]).await;

        client
            .request_ok(json!({"command": "module_delete", "address": INACTIVE_MODULE_ADDR}))
            .await;
        observer.expect_no_message().await;
        client.expect_no_message().await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_empty_slot_still_announced() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;
        let mut observer = TestClient::connect(daemon.local_addr()).await;
        observer.subscribe(&[77]).await;

        client
            .request_ok(json!({"command": "module_delete", "address": 77}))
            .await;
        let event = observer.expect_event("module_deleted").await;
        assert_eq!(event["module"], 77);

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_module_changed_event_on_name_edit() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;
        let mut observer = TestClient::connect(daemon.local_addr()).await;
        let mut topology = TestClient::connect(daemon.local_addr()).await;
        observer.subscribe(&[TEST_MODULE_ADDR]).await;
        topology
            .request_ok(json!({"command": "topology_subscribe"}))
            .await;

        client
            .request_ok(json!({
                "command": "module_set_config",
                "address": TEST_MODULE_ADDR,
                "name": "dummyname",
            }))
            .await;
        let event = observer.expect_event("module").await;
        assert_eq!(event["module"]["address"], TEST_MODULE_ADDR);
        assert_eq!(event["module"]["name"], "dummyname");
        observer.expect_no_message().await;

        // A rename is not a topology change.
        topology.expect_no_message().await;

        client
            .request_ok(json!({
                "command": "module_set_config",
                "address": TEST_MODULE_ADDR,
                "name": "Test",
            }))
            .await;
        let event = observer.expect_event("module").await;
        assert_eq!(event["module"]["name"], "Test");

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_identical_config_produces_no_event() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;
        let mut observer = TestClient::connect(daemon.local_addr()).await;
        observer.subscribe(&[TEST_MODULE_ADDR]).await;

        client
            .request_ok(json!({
                "command": "module_set_config",
                "address": TEST_MODULE_ADDR,
                "name": "Test",
            }))
            .await;
        observer.expect_no_message().await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_module_failure_and_return() {
        let daemon = start_daemon().await;
        let mut observer = TestClient::connect(daemon.local_addr()).await;
        observer
            .request_ok(json!({"command": "topology_subscribe"}))
            .await;

        daemon.bus().detach(address(TEST_MODULE_ADDR));
        let event = observer.expect_event("module").await;
        assert_eq!(event["module"]["address"], TEST_MODULE_ADDR);
        assert_eq!(event["module"]["active"], false);

        let response = observer.request_ok(json!({"command": "mtbusb"})).await;
        assert_eq!(response["mtbusb"]["active_modules"], json!([]));
        observer
            .request_error(
                json!({"command": "module_set_outputs", "address": TEST_MODULE_ADDR, "outputs": {"0": 1}}),
                1102,
            )
            .await;

        daemon.bus().attach(address(TEST_MODULE_ADDR), TEST_MODULE_TYPE);
        let event = observer.expect_event("module").await;
        assert_eq!(event["module"]["active"], true);

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_recreated_active_module_accepts_outputs() {
        let daemon = start_daemon().await;
        let mut client = TestClient::connect(daemon.local_addr()).await;

        client
            .request_ok(json!({"command": "module_delete", "address": TEST_MODULE_ADDR}))
            .await;
        let response = client.request_ok(json!({"command": "mtbusb"})).await;
        assert_eq!(response["mtbusb"]["active_modules"], json!([]));

        let response = client
            .request_ok(json!({
                "command": "module_set_config",
                "address": TEST_MODULE_ADDR,
                "type_code": TEST_MODULE_TYPE,
                "name": "Test",
            }))
            .await;
        assert_eq!(response["module"]["active"], true);

        client.set_single_output(TEST_MODULE_ADDR, 0, 1).await;
        let response = client.request_ok(json!({"command": "mtbusb"})).await;
        assert_eq!(response["mtbusb"]["active_modules"], json!([TEST_MODULE_ADDR]));

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_module_reactivated_periodically() {
        let daemon = start_daemon().await;
        let mut observer = TestClient::connect(daemon.local_addr()).await;
        observer
            .request_ok(json!({"command": "topology_subscribe"}))
            .await;

        daemon.bus().detach(address(TEST_MODULE_ADDR));
        let event = observer.expect_event("module").await;
        assert_eq!(event["module"]["active"], false);

        // Answers again without announcing itself.
        daemon
            .bus()
            .reconnect(address(TEST_MODULE_ADDR), TEST_MODULE_TYPE);
        let event = observer.expect_event("module").await;
        assert_eq!(event["module"]["address"], TEST_MODULE_ADDR);
        assert_eq!(event["module"]["active"], true);

        observer.set_single_output(TEST_MODULE_ADDR, 0, 1).await;

        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn test_new_module_discovered() {
        let daemon = start_daemon().await;
        let mut observer = TestClient::connect(daemon.local_addr()).await;
        observer
            .request_ok(json!({"command": "topology_subscribe"}))
            .await;

        daemon.bus().attach(address(40), 0x50);
        let event = observer.expect_event("module").await;
        assert_eq!(event["module"]["address"], 40);
        assert_eq!(event["module"]["type_code"], 0x50);
        assert_eq!(event["module"]["active"], true);

        let response = observer.request_ok(json!({"command": "modules"})).await;
        assert_eq!(response["modules"].as_object().unwrap().len(), 3);

        daemon.shutdown().await;
    }
}
