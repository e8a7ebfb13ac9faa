use serde_json::json;

mod common;

/// Full text report from a device snapshot and kernel log
#[test]
fn test_text_report() {
    let te = common::TestEnv::new();

    let comp = common::read_dump_to_string(common::TEXT_REPORT);

    te.assert_output(
        Some(common::DEVICES_DUMP),
        &["--no-color"],
        comp.as_str(),
        false,
    );
}

#[test]
fn test_json_report() {
    let te = common::TestEnv::new();

    te.assert_output_json(
        Some(common::DEVICES_DUMP),
        &[],
        json!({
            "devices": [
                {"device_id": "1-0", "issues": [], "log_summary": {"total_entries": 0}},
                {
                    "device_id": "1-1.2",
                    "driver": null,
                    "busnum": "1",
                    "devnum": "5",
                    "log_summary": {
                        "total_entries": 4,
                        "reset_count": 3,
                        "over_current_count": 1,
                        "disconnect_count": 0
                    },
                    "log_entries": [
                        {
                            "message": "usb 1-1.2: reset full-speed USB device number 5 using xhci_hcd",
                            "category": "reset",
                            "device_id": "1-1.2",
                            "vendor_product": null,
                            "timestamp": null
                        }
                    ]
                },
                {"device_id": "2-1", "log_summary": {"timeout_count": 1}},
                {"device_id": "2-2", "log_summary": {"timeout_count": 1}}
            ],
            "unmatched_logs": [
                {"message": "usb 3-4: USB disconnect, device number 7", "category": "disconnect", "device_id": "3-4"}
            ],
            "summary": {"total_devices": 4, "devices_with_issues": 3}
        }),
    );

    let value = te.get_output_json(Some(common::DEVICES_DUMP), &[]);
    let issues = value["devices"][1]["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 3);
    assert!(issues[0].as_str().unwrap().starts_with("Multiple resets/reconnects (3 occurrences)"));
    assert!(issues[1].as_str().unwrap().starts_with("Over-current detected (1 times)"));
    assert!(issues[2].as_str().unwrap().starts_with("No driver bound - device class ff"));
}

/// vendor:product log entries go to every device with that pair
#[test]
fn test_vendor_product_fan_out() {
    let te = common::TestEnv::new();

    let value = te.get_output_json(Some(common::DEVICES_DUMP), &[]);
    for i in [2, 3] {
        let entries = value["devices"][i]["log_entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["vendor_product"], json!("046d:c52b"));
        assert_eq!(entries[0]["category"], json!("timeout"));
    }
}

#[test]
fn test_device_filter_bus_path() {
    let te = common::TestEnv::new();

    te.assert_output_json(
        Some(common::DEVICES_DUMP),
        &["--device", "1-1.2"],
        json!({
            "devices": [{"device_id": "1-1.2"}],
            "summary": {"total_devices": 1, "devices_with_issues": 1}
        }),
    );
}

#[test]
fn test_device_filter_vendor_product() {
    let te = common::TestEnv::new();

    let value = te.get_output_json(Some(common::DEVICES_DUMP), &["--device", "046D:C52B"]);
    let ids: Vec<&str> = value["devices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["device_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["2-1", "2-2"]);
}

#[test]
fn test_device_filter_no_match() {
    let te = common::TestEnv::new();

    te.assert_failure_with_error(
        Some(common::DEVICES_DUMP),
        &["--device", "9-9"],
        "No device found matching: 9-9",
    );

    let output = te.run(Some(common::DEVICES_DUMP), &["--device", "9-9", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_json_diff::assert_json_eq!(
        value,
        json!({"devices": [], "unmatched_logs": [], "summary": {"total_devices": 0, "devices_with_issues": 0}})
    );
}

#[test]
fn test_invalid_device_argument() {
    let te = common::TestEnv::new();

    te.assert_failure_with_error(
        Some(common::DEVICES_DUMP),
        &["--device", "bogus"],
        "InvalidArg Error: Invalid device 'bogus'",
    );
}

/// No devices is not an error
#[test]
fn test_no_devices() {
    let te = common::TestEnv::new();

    let output = te.assert_success_and_get_output(Some(common::NO_DEVICES_DUMP), &[]);
    assert!(output.stdout.is_empty());
    assert_eq!(
        String::from_utf8_lossy(&output.stderr).trim(),
        "No USB devices found."
    );

    te.assert_output_json(
        Some(common::NO_DEVICES_DUMP),
        &[],
        json!({"devices": [], "unmatched_logs": [], "summary": {"total_devices": 0, "devices_with_issues": 0}}),
    );
}

/// A device in the history but no longer connected gets its own analysis
#[test]
fn test_known_devices_ghost() {
    let te = common::TestEnv::new();

    let value = te.get_output_json(
        Some(common::DEVICES_DUMP),
        &["--known-devices", common::KNOWN_DEVICES_DUMP],
    );
    let devices = value["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 5);
    assert_eq!(devices[4]["device_id"], json!("3-4"));
    assert_eq!(devices[4]["ghost"], json!(true));
    assert_eq!(devices[4]["log_summary"]["disconnect_count"], json!(1));
    assert!(devices[1].get("ghost").is_none());
    assert_eq!(value["unmatched_logs"], json!([]));
    assert_eq!(value["summary"]["total_devices"], json!(5));

    te.assert_output(
        Some(common::DEVICES_DUMP),
        &["--known-devices", common::KNOWN_DEVICES_DUMP],
        "Not currently connected, only seen in kernel logs",
        true,
    );
}

#[test]
fn test_verbose_entries() {
    let te = common::TestEnv::new();

    te.assert_output(
        Some(common::DEVICES_DUMP),
        &["--verbose"],
        "Recent log entries:\n  [reset] usb 1-1.2: reset full-speed USB device number 5 using xhci_hcd",
        true,
    );
    te.assert_output(
        Some(common::DEVICES_DUMP),
        &["-v"],
        "  [disconnect] usb 3-4: USB disconnect, device number 7",
        true,
    );
}

#[test]
fn test_no_log_entries() {
    let te = common::TestEnv::new().log_file(Some(common::NO_DEVICES_DUMP));

    te.assert_output_json(
        Some(common::DEVICES_DUMP),
        &[],
        json!({
            "unmatched_logs": [],
            "summary": {"total_devices": 4, "devices_with_issues": 1}
        }),
    );
}

#[test]
fn test_missing_log_file() {
    let te = common::TestEnv::new().log_file(Some("./tests/data/nonexistent.log"));

    te.assert_failure(Some(common::DEVICES_DUMP), &[]);
}

#[test]
fn test_missing_device_dump() {
    let te = common::TestEnv::new();

    te.assert_failure_with_error(Some("./tests/data/nonexistent.json"), &[], "Io Error");
}

#[test]
fn test_dump_devices() {
    let te = common::TestEnv::new();

    let output = te.assert_success_and_get_output(Some(common::DEVICES_DUMP), &["--dump-devices"]);
    let devices: Vec<usbwhy::device::Device> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(devices.len(), 4);
    assert_eq!(devices[1].device_id, "1-1.2");
    assert_eq!(devices[1].device_number.as_deref(), Some("5"));
}
