use serde::Serialize;
use serde_json::{json, Value};

use crate::app::keys::SystemKey;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn tool(name: &'static str, description: &'static str, input_schema: Value) -> ToolDescriptor {
    ToolDescriptor {
        name,
        description,
        input_schema,
    }
}

fn no_arguments() -> Value {
    json!({"type": "object", "properties": {}})
}

fn package_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "package": {"type": "string", "description": description}
        },
        "required": ["package"]
    })
}

/// Every tool in the order `tools/list` reports them.
pub fn tool_catalog() -> Vec<ToolDescriptor> {
    let key_names: Vec<&str> = SystemKey::ALL.iter().map(|key| key.name()).collect();
    vec![
        // Device management
        tool(
            "list_devices",
            "List all available Android devices and emulators",
            no_arguments(),
        ),
        tool(
            "select_device",
            "Select a specific device/emulator to interact with",
            json!({
                "type": "object",
                "properties": {
                    "serial": {
                        "type": "string",
                        "description": "Device serial number (e.g., emulator-5554)"
                    }
                },
                "required": ["serial"]
            }),
        ),
        tool(
            "get_device_info",
            "Get detailed information about the current device",
            no_arguments(),
        ),
        // Screen inspection
        tool(
            "capture_screenshot",
            "Capture a screenshot of the current screen",
            json!({
                "type": "object",
                "properties": {
                    "save_path": {
                        "type": "string",
                        "description": "Optional path to save screenshot locally"
                    }
                }
            }),
        ),
        tool(
            "get_ui_hierarchy",
            "Get the XML hierarchy of the current screen UI",
            no_arguments(),
        ),
        tool(
            "find_element",
            "Find UI element by text, resource-id, or other attributes",
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Element text"},
                    "resource_id": {"type": "string", "description": "Resource ID"},
                    "class_name": {"type": "string", "description": "Class name"},
                    "content_desc": {"type": "string", "description": "Content description"}
                }
            }),
        ),
        // UI interaction
        tool(
            "tap_coordinates",
            "Tap at specific screen coordinates",
            json!({
                "type": "object",
                "properties": {
                    "x": {"type": "number", "description": "X coordinate"},
                    "y": {"type": "number", "description": "Y coordinate"}
                },
                "required": ["x", "y"]
            }),
        ),
        tool(
            "tap_element",
            "Tap on a UI element by finding it first",
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Element text"},
                    "resource_id": {"type": "string", "description": "Resource ID"},
                    "content_desc": {"type": "string", "description": "Content description"}
                }
            }),
        ),
        tool(
            "swipe",
            "Perform a swipe gesture",
            json!({
                "type": "object",
                "properties": {
                    "start_x": {"type": "number"},
                    "start_y": {"type": "number"},
                    "end_x": {"type": "number"},
                    "end_y": {"type": "number"},
                    "duration": {"type": "number", "description": "Duration in ms", "default": 300}
                },
                "required": ["start_x", "start_y", "end_x", "end_y"]
            }),
        ),
        tool(
            "input_text",
            "Input text into the currently focused field",
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Text to input"}
                },
                "required": ["text"]
            }),
        ),
        tool(
            "press_key",
            "Press a system key (back, home, recent, etc.)",
            json!({
                "type": "object",
                "properties": {
                    "key": {
                        "type": "string",
                        "enum": key_names,
                        "description": "Key to press"
                    }
                },
                "required": ["key"]
            }),
        ),
        // App management
        tool(
            "install_app",
            "Install an APK on the device",
            json!({
                "type": "object",
                "properties": {
                    "apk_path": {"type": "string", "description": "Path to APK file"}
                },
                "required": ["apk_path"]
            }),
        ),
        tool(
            "launch_app",
            "Launch an app by package name",
            package_schema("Package name (e.g., com.android.settings)"),
        ),
        tool("stop_app", "Force stop an app", package_schema("Package name")),
        tool(
            "clear_app_data",
            "Clear app data and cache",
            package_schema("Package name"),
        ),
        tool(
            "list_packages",
            "List installed packages",
            json!({
                "type": "object",
                "properties": {
                    "filter": {"type": "string", "description": "Optional filter string"}
                }
            }),
        ),
        // Network configuration
        tool(
            "setup_proxy",
            "Configure HTTP proxy settings",
            json!({
                "type": "object",
                "properties": {
                    "host": {"type": "string", "description": "Proxy host"},
                    "port": {"type": "number", "description": "Proxy port"}
                },
                "required": ["host", "port"]
            }),
        ),
        tool("clear_proxy", "Remove proxy settings", no_arguments()),
        tool(
            "install_certificate",
            "Install a CA certificate on the device",
            json!({
                "type": "object",
                "properties": {
                    "cert_path": {
                        "type": "string",
                        "description": "Path to certificate file (.pem or .crt)"
                    }
                },
                "required": ["cert_path"]
            }),
        ),
        // Advanced operations
        tool(
            "execute_shell",
            "Execute a shell command on the device",
            json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "Shell command to execute"}
                },
                "required": ["command"]
            }),
        ),
        tool(
            "pull_file",
            "Pull a file from the device to local system",
            json!({
                "type": "object",
                "properties": {
                    "remote_path": {"type": "string", "description": "Path on device"},
                    "local_path": {"type": "string", "description": "Local destination path"}
                },
                "required": ["remote_path", "local_path"]
            }),
        ),
        tool(
            "push_file",
            "Push a file from local system to device",
            json!({
                "type": "object",
                "properties": {
                    "local_path": {"type": "string", "description": "Local file path"},
                    "remote_path": {"type": "string", "description": "Destination path on device"}
                },
                "required": ["local_path", "remote_path"]
            }),
        ),
    ]
}
