use super::*;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;

use serde_json::json;
use tempfile::TempDir;

use crate::app::config::PacingSettings;

/// Replays scripted outputs in order and records every argument list it was handed.
#[derive(Default)]
struct RecordingExecutor {
    calls: RefCell<Vec<Vec<String>>>,
    scripted: RefCell<VecDeque<CommandOutput>>,
}

impl RecordingExecutor {
    fn with_outputs(outputs: Vec<CommandOutput>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            scripted: RefCell::new(outputs.into()),
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl AdbExecutor for RecordingExecutor {
    fn execute(&self, args: &[String], _timeout: Duration, _trace_id: &str) -> CommandOutput {
        self.calls.borrow_mut().push(args.to_vec());
        self.scripted.borrow_mut().pop_front().unwrap_or_else(|| ok(""))
    }
}

/// Stands in for a device: keeps a remote filesystem in memory and answers the handful of
/// commands the handlers issue.
#[derive(Default)]
struct FakeDevice {
    remote_files: RefCell<HashMap<String, Vec<u8>>>,
    ui_dump: String,
    screen_png: Vec<u8>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl FakeDevice {
    fn with_ui_dump(xml: &str) -> Self {
        Self {
            ui_dump: xml.to_string(),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl AdbExecutor for FakeDevice {
    fn execute(&self, args: &[String], _timeout: Duration, _trace_id: &str) -> CommandOutput {
        self.calls.borrow_mut().push(args.to_vec());
        let args: Vec<&str> = match args {
            [flag, _serial, rest @ ..] if flag == "-s" => rest.iter().map(String::as_str).collect(),
            rest => rest.iter().map(String::as_str).collect(),
        };
        match args.as_slice() {
            ["push", local, remote] => match fs::read(local) {
                Ok(bytes) => {
                    self.remote_files
                        .borrow_mut()
                        .insert(remote.to_string(), bytes);
                    ok(&format!("{local}: 1 file pushed."))
                }
                Err(err) => fail(&format!("adb: error: cannot stat '{local}': {err}")),
            },
            ["pull", remote, local] => match self.remote_files.borrow().get(*remote) {
                Some(bytes) => {
                    fs::write(local, bytes).expect("write pulled file");
                    ok(&format!("{remote}: 1 file pulled."))
                }
                None => fail(&format!(
                    "adb: error: failed to stat remote object '{remote}': No such file or directory"
                )),
            },
            ["shell", "uiautomator", "dump", remote] => {
                self.remote_files
                    .borrow_mut()
                    .insert(remote.to_string(), self.ui_dump.as_bytes().to_vec());
                ok(&format!("UI hierchary dumped to: {remote}"))
            }
            ["shell", "screencap", "-p", remote] => {
                self.remote_files
                    .borrow_mut()
                    .insert(remote.to_string(), self.screen_png.clone());
                ok("")
            }
            _ => ok(""),
        }
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
    }
}

fn fail(stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: Some(1),
    }
}

fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig {
        pacing: PacingSettings::immediate(),
        ..AppConfig::default()
    };
    config.paths.screenshot_local = dir
        .path()
        .join("screen.png")
        .to_string_lossy()
        .to_string();
    config.paths.ui_dump_local = dir.path().join("dump.xml").to_string_lossy().to_string();
    config
}

fn call(
    adb: &dyn AdbExecutor,
    config: &AppConfig,
    session: &mut DeviceSession,
    name: &str,
    arguments: serde_json::Value,
) -> ToolOutput {
    let parsed = ToolCall::parse(name, arguments).expect("parse tool call");
    let mut ctx = ToolContext::new(adb, config, session, "trace-test");
    dispatch(parsed, &mut ctx)
}

fn text_of(output: &ToolOutput) -> &str {
    output.first_text().expect("text content")
}

fn selected() -> DeviceSession {
    DeviceSession::with_serial(Some("emulator-5554".to_string()))
}

const LOGIN_SCREEN: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" text="" resource-id="" class="android.widget.FrameLayout" content-desc="" clickable="false" enabled="true" bounds="[0,0][1080,1920]">
    <node index="0" text="Username" resource-id="com.example:id/user" class="android.widget.EditText" content-desc="" clickable="true" enabled="true" bounds="[40,200][1040,300]" />
    <node index="1" text="Login" resource-id="com.example:id/login" class="android.widget.Button" content-desc="Sign in" clickable="true" enabled="true" bounds="[10,20][110,120]" />
    <node index="2" text="Login help" resource-id="" class="android.widget.TextView" content-desc="" clickable="false" enabled="true" bounds="" />
  </node>
</hierarchy>"#;

#[test]
fn device_tools_refuse_without_selection_and_touch_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let adb = RecordingExecutor::default();
    let mut session = DeviceSession::new();

    let output = call(&adb, &config, &mut session, "press_key", json!({"key": "back"}));
    assert!(output.is_error);
    assert_eq!(text_of(&output), NO_DEVICE_SELECTED);

    let output = call(&adb, &config, &mut session, "get_device_info", json!({}));
    assert_eq!(text_of(&output), NO_DEVICE_SELECTED_HINT);

    let output = call(&adb, &config, &mut session, "clear_proxy", json!({}));
    assert_eq!(text_of(&output), NO_DEVICE_SELECTED);

    assert!(adb.calls().is_empty());
}

#[test]
fn select_device_scopes_later_commands() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let adb = RecordingExecutor::default();
    let mut session = DeviceSession::new();

    let output = call(
        &adb,
        &config,
        &mut session,
        "select_device",
        json!({"serial": "emulator-5556"}),
    );
    assert_eq!(text_of(&output), "Selected device: emulator-5556");
    assert!(adb.calls().is_empty());

    call(&adb, &config, &mut session, "stop_app", json!({"package": "com.example"}));
    assert_eq!(
        adb.calls()[0],
        to_args(&["-s", "emulator-5556", "shell", "am", "force-stop", "com.example"])
    );
}

#[test]
fn list_devices_reports_empty_and_populated_lists() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = DeviceSession::new();

    let adb = RecordingExecutor::with_outputs(vec![ok("List of devices attached\n\n")]);
    let output = call(&adb, &config, &mut session, "list_devices", json!({}));
    assert!(!output.is_error);
    assert_eq!(text_of(&output), device::NO_DEVICES_FOUND);
    assert_eq!(adb.calls()[0], to_args(&["devices", "-l"]));

    let adb = RecordingExecutor::with_outputs(vec![ok(
        "List of devices attached\nemulator-5554          device product:sdk_gphone64 model:sdk_gphone64_x86_64 transport_id:1\n",
    )]);
    let output = call(&adb, &config, &mut session, "list_devices", json!({}));
    let text = text_of(&output);
    assert!(text.starts_with("Available devices:\n"));
    assert!(text.contains(
        "Serial: emulator-5554, State: device, Info: product:sdk_gphone64 model:sdk_gphone64_x86_64 transport_id:1"
    ));
}

#[test]
fn list_devices_surfaces_adb_failure() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = DeviceSession::new();
    let adb = RecordingExecutor::with_outputs(vec![fail("daemon not running\n")]);

    let output = call(&adb, &config, &mut session, "list_devices", json!({}));
    assert!(output.is_error);
    assert_eq!(text_of(&output), "Error listing devices: daemon not running");
}

#[test]
fn press_key_maps_names_and_rejects_unknown_keys() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();

    let adb = RecordingExecutor::default();
    let output = call(&adb, &config, &mut session, "press_key", json!({"key": "back"}));
    assert_eq!(text_of(&output), "Pressed back key");
    assert_eq!(
        adb.calls(),
        vec![to_args(&["-s", "emulator-5554", "shell", "input", "keyevent", "4"])]
    );

    let adb = RecordingExecutor::default();
    let output = call(&adb, &config, &mut session, "press_key", json!({"key": "unknown"}));
    assert!(output.is_error);
    assert_eq!(text_of(&output), "Unknown key: unknown");
    assert!(adb.calls().is_empty());
}

#[test]
fn tap_swipe_and_text_issue_integer_input_commands() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let adb = RecordingExecutor::default();

    let output = call(
        &adb,
        &config,
        &mut session,
        "tap_coordinates",
        json!({"x": 540.7, "y": 960}),
    );
    assert_eq!(text_of(&output), "Tapped at coordinates (540, 960)");

    let output = call(
        &adb,
        &config,
        &mut session,
        "swipe",
        json!({"start_x": 500, "start_y": 1500, "end_x": 500, "end_y": 500}),
    );
    assert_eq!(text_of(&output), "Swiped from (500, 1500) to (500, 500)");

    let output = call(
        &adb,
        &config,
        &mut session,
        "input_text",
        json!({"text": "hello world"}),
    );
    assert_eq!(text_of(&output), "Entered text: hello world");

    let calls = adb.calls();
    assert_eq!(calls[0][2..], to_args(&["shell", "input", "tap", "540", "960"]));
    assert_eq!(
        calls[1][2..],
        to_args(&["shell", "input", "swipe", "500", "1500", "500", "500", "300"])
    );
    assert_eq!(calls[2][2..], to_args(&["shell", "input", "text", "hello%sworld"]));
}

#[test]
fn push_then_pull_round_trips_file_contents() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let device = FakeDevice::default();

    let source = dir.path().join("payload.bin");
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    fs::write(&source, &payload).expect("write payload");
    let source = source.to_string_lossy().to_string();
    let target = dir.path().join("copy.bin").to_string_lossy().to_string();

    let output = call(
        &device,
        &config,
        &mut session,
        "push_file",
        json!({"local_path": source, "remote_path": "/sdcard/payload.bin"}),
    );
    assert!(!output.is_error);
    assert!(text_of(&output).starts_with(&format!(
        "File pushed successfully:\nFrom: {source}\nTo: /sdcard/payload.bin\n"
    )));

    let output = call(
        &device,
        &config,
        &mut session,
        "pull_file",
        json!({"remote_path": "/sdcard/payload.bin", "local_path": target}),
    );
    assert!(!output.is_error);
    assert_eq!(fs::read(&target).expect("read pulled"), payload);
}

#[test]
fn push_file_rejects_missing_local_file_before_calling_adb() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let device = FakeDevice::default();
    let missing = dir.path().join("missing.txt").to_string_lossy().to_string();

    let output = call(
        &device,
        &config,
        &mut session,
        "push_file",
        json!({"local_path": missing, "remote_path": "/sdcard/x"}),
    );
    assert!(output.is_error);
    assert_eq!(text_of(&output), format!("Local file not found: {missing}"));
    assert!(device.calls().is_empty());
}

#[test]
fn pull_file_reports_missing_remote() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let device = FakeDevice::default();
    let target = dir.path().join("out.txt").to_string_lossy().to_string();

    let output = call(
        &device,
        &config,
        &mut session,
        "pull_file",
        json!({"remote_path": "/sdcard/nope", "local_path": target}),
    );
    assert!(output.is_error);
    assert!(text_of(&output).starts_with("Failed to pull file: adb: error: failed to stat"));
}

#[test]
fn find_element_reports_exact_matches_only() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let device = FakeDevice::with_ui_dump(LOGIN_SCREEN);

    let output = call(&device, &config, &mut session, "find_element", json!({"text": "Login"}));
    let expected = r#"Found 1 matching element(s):
[
  {
    "text": "Login",
    "resource-id": "com.example:id/login",
    "class": "android.widget.Button",
    "bounds": "[10,20][110,120]",
    "clickable": "true",
    "enabled": "true"
  }
]"#;
    assert_eq!(text_of(&output), expected);

    let output = call(&device, &config, &mut session, "find_element", json!({"text": "Log"}));
    assert_eq!(text_of(&output), screen::NO_MATCHING_ELEMENTS);
}

#[test]
fn tap_element_taps_centre_of_first_match() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let device = FakeDevice::with_ui_dump(LOGIN_SCREEN);

    let output = call(
        &device,
        &config,
        &mut session,
        "tap_element",
        json!({"resource_id": "com.example:id/login"}),
    );
    assert_eq!(text_of(&output), "Tapped at coordinates (60, 70)");
    let last = device.calls().last().cloned().expect("tap call");
    assert_eq!(last[2..], to_args(&["shell", "input", "tap", "60", "70"]));
}

#[test]
fn tap_element_without_bounds_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let device = FakeDevice::with_ui_dump(LOGIN_SCREEN);

    let output = call(
        &device,
        &config,
        &mut session,
        "tap_element",
        json!({"text": "Login help"}),
    );
    assert!(output.is_error);
    assert_eq!(text_of(&output), "Element has no bounds information.");
}

#[test]
fn tap_element_without_match_taps_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let device = FakeDevice::with_ui_dump(LOGIN_SCREEN);

    let output = call(
        &device,
        &config,
        &mut session,
        "tap_element",
        json!({"text": "Logout"}),
    );
    assert_eq!(text_of(&output), screen::NO_MATCHING_ELEMENTS);
    assert!(device
        .calls()
        .iter()
        .all(|args| !args.iter().any(|arg| arg == "tap")));
}

#[test]
fn get_ui_hierarchy_returns_raw_dump() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let device = FakeDevice::with_ui_dump(LOGIN_SCREEN);

    let output = call(&device, &config, &mut session, "get_ui_hierarchy", json!({}));
    assert_eq!(text_of(&output), format!("UI Hierarchy:\n{LOGIN_SCREEN}"));
}

#[test]
fn capture_screenshot_attaches_png() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(b"pixels");
    let device = FakeDevice {
        screen_png: png,
        ..FakeDevice::default()
    };

    let output = call(&device, &config, &mut session, "capture_screenshot", json!({}));
    assert!(!output.is_error);
    assert_eq!(
        text_of(&output),
        format!(
            "Screenshot captured successfully. Saved to: {}",
            config.paths.screenshot_local
        )
    );
    assert_eq!(output.content.len(), 2);
}

#[test]
fn get_device_info_includes_only_successful_properties() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let adb = RecordingExecutor::with_outputs(vec![
        ok("sdk_gphone64_x86_64\n"),
        ok("14\n"),
        ok("34\n"),
        fail("getprop: permission denied"),
        ok("Physical size: 1080x2400\n"),
    ]);

    let output = call(&adb, &config, &mut session, "get_device_info", json!({}));
    let text = text_of(&output);
    assert!(text.starts_with("Device Information:\n"));
    assert!(text.contains("\"ro.product.model\": \"sdk_gphone64_x86_64\""));
    assert!(text.contains("\"ro.build.version.release\": \"14\""));
    assert!(text.contains("\"ro.build.version.sdk\": \"34\""));
    assert!(text.contains("\"screen_size\": \"Physical size: 1080x2400\""));
    assert!(!text.contains("ro.product.cpu.abi"));
}

#[test]
fn list_packages_filters_on_host_and_truncates() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();

    let listing: String = (0..120)
        .map(|index| format!("package:com.example.app{index}\n"))
        .chain(std::iter::once("package:org.other\n".to_string()))
        .collect();

    let adb = RecordingExecutor::with_outputs(vec![ok(&listing)]);
    let output = call(&adb, &config, &mut session, "list_packages", json!({}));
    let text = text_of(&output);
    assert!(text.starts_with("Found 121 package(s):\ncom.example.app0\n"));
    assert!(text.ends_with("\n... and 21 more"));

    let adb = RecordingExecutor::with_outputs(vec![ok(&listing)]);
    let output = call(
        &adb,
        &config,
        &mut session,
        "list_packages",
        json!({"filter": "other"}),
    );
    assert_eq!(text_of(&output), "Found 1 package(s):\norg.other");
}

#[test]
fn proxy_tools_write_global_setting() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let adb = RecordingExecutor::default();

    let output = call(
        &adb,
        &config,
        &mut session,
        "setup_proxy",
        json!({"host": "10.0.2.2", "port": 8080}),
    );
    assert!(text_of(&output).starts_with("Proxy configured: 10.0.2.2:8080\n"));

    let output = call(&adb, &config, &mut session, "clear_proxy", json!({}));
    assert_eq!(text_of(&output), "Proxy settings cleared.");

    let calls = adb.calls();
    assert_eq!(
        calls[0][2..],
        to_args(&["shell", "settings", "put", "global", "http_proxy", "10.0.2.2:8080"])
    );
    assert_eq!(
        calls[1][2..],
        to_args(&["shell", "settings", "put", "global", "http_proxy", ":0"])
    );
}

#[test]
fn install_certificate_pushes_to_download_dir() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let device = FakeDevice::default();
    let cert = dir.path().join("proxy.pem");
    fs::write(&cert, "-----BEGIN CERTIFICATE-----\n").expect("write cert");

    let output = call(
        &device,
        &config,
        &mut session,
        "install_certificate",
        json!({"cert_path": cert.to_string_lossy()}),
    );
    assert!(text_of(&output).starts_with("Certificate pushed to device: /sdcard/Download/ca_cert.crt"));
    assert!(device
        .remote_files
        .borrow()
        .contains_key("/sdcard/Download/ca_cert.crt"));
}

#[test]
fn execute_shell_reports_exit_code_and_stderr() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let adb = RecordingExecutor::with_outputs(vec![CommandOutput {
        stdout: "partial\n".to_string(),
        stderr: "ls: /nope: No such file or directory\n".to_string(),
        exit_code: Some(1),
    }]);

    let output = call(
        &adb,
        &config,
        &mut session,
        "execute_shell",
        json!({"command": "ls /nope"}),
    );
    assert!(!output.is_error);
    assert_eq!(
        text_of(&output),
        "Command: ls /nope\nReturn Code: 1\n\nOutput:\npartial\n\n\nError Output:\nls: /nope: No such file or directory\n"
    );
}

#[test]
fn install_app_requires_existing_apk() {
    let dir = TempDir::new().expect("tempdir");
    let config = test_config(&dir);
    let mut session = selected();
    let adb = RecordingExecutor::default();

    let output = call(
        &adb,
        &config,
        &mut session,
        "install_app",
        json!({"apk_path": "/does/not/exist.apk"}),
    );
    assert!(output.is_error);
    assert_eq!(text_of(&output), "APK file not found: /does/not/exist.apk");
    assert!(adb.calls().is_empty());

    let apk = dir.path().join("app.apk");
    fs::write(&apk, b"PK").expect("write apk");
    let apk = apk.to_string_lossy().to_string();
    let adb = RecordingExecutor::with_outputs(vec![ok("Performing Streamed Install\nSuccess\n")]);
    let output = call(&adb, &config, &mut session, "install_app", json!({"apk_path": apk}));
    assert_eq!(
        text_of(&output),
        format!("Successfully installed: {apk}\nPerforming Streamed Install\nSuccess\n")
    );
    assert_eq!(adb.calls()[0][2..], to_args(&["install", "-r", apk.as_str()]));
}
