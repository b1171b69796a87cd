//! The closed set of tools the server exposes and their typed arguments.

pub mod catalog;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::app::ui_xml::UiSelector;

pub use catalog::{tool_catalog, ToolDescriptor};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectDeviceArgs {
    pub serial: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CaptureScreenshotArgs {
    #[serde(default)]
    pub save_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TapCoordinatesArgs {
    pub x: f64,
    pub y: f64,
}

fn default_swipe_duration() -> f64 {
    300.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SwipeArgs {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    #[serde(default = "default_swipe_duration")]
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputTextArgs {
    pub text: String,
}

/// Kept as a string so an unknown key reaches the handler and gets a friendly reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PressKeyArgs {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstallAppArgs {
    pub apk_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PackageArgs {
    pub package: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ListPackagesArgs {
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetupProxyArgs {
    pub host: String,
    pub port: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstallCertificateArgs {
    pub cert_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExecuteShellArgs {
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullFileArgs {
    pub remote_path: String,
    pub local_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushFileArgs {
    pub local_path: String,
    pub remote_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    ListDevices,
    SelectDevice(SelectDeviceArgs),
    GetDeviceInfo,
    CaptureScreenshot(CaptureScreenshotArgs),
    GetUiHierarchy,
    FindElement(UiSelector),
    TapCoordinates(TapCoordinatesArgs),
    TapElement(UiSelector),
    Swipe(SwipeArgs),
    InputText(InputTextArgs),
    PressKey(PressKeyArgs),
    InstallApp(InstallAppArgs),
    LaunchApp(PackageArgs),
    StopApp(PackageArgs),
    ClearAppData(PackageArgs),
    ListPackages(ListPackagesArgs),
    SetupProxy(SetupProxyArgs),
    ClearProxy,
    InstallCertificate(InstallCertificateArgs),
    ExecuteShell(ExecuteShellArgs),
    PullFile(PullFileArgs),
    PushFile(PushFileArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallError {
    Unknown(String),
    InvalidArguments { tool: &'static str, message: String },
}

impl fmt::Display for ToolCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolCallError::Unknown(name) => write!(f, "Unknown tool: {name}"),
            ToolCallError::InvalidArguments { tool, message } => {
                write!(f, "Invalid arguments for {tool}: {message}")
            }
        }
    }
}

impl std::error::Error for ToolCallError {}

fn decode<T: DeserializeOwned>(tool: &'static str, arguments: Value) -> Result<T, ToolCallError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|err| ToolCallError::InvalidArguments {
        tool,
        message: err.to_string(),
    })
}

impl ToolCall {
    pub fn parse(name: &str, arguments: Value) -> Result<Self, ToolCallError> {
        let call = match name {
            "list_devices" => ToolCall::ListDevices,
            "select_device" => ToolCall::SelectDevice(decode("select_device", arguments)?),
            "get_device_info" => ToolCall::GetDeviceInfo,
            "capture_screenshot" => {
                ToolCall::CaptureScreenshot(decode("capture_screenshot", arguments)?)
            }
            "get_ui_hierarchy" => ToolCall::GetUiHierarchy,
            "find_element" => ToolCall::FindElement(decode("find_element", arguments)?),
            "tap_coordinates" => ToolCall::TapCoordinates(decode("tap_coordinates", arguments)?),
            "tap_element" => ToolCall::TapElement(decode("tap_element", arguments)?),
            "swipe" => ToolCall::Swipe(decode("swipe", arguments)?),
            "input_text" => ToolCall::InputText(decode("input_text", arguments)?),
            "press_key" => ToolCall::PressKey(decode("press_key", arguments)?),
            "install_app" => ToolCall::InstallApp(decode("install_app", arguments)?),
            "launch_app" => ToolCall::LaunchApp(decode("launch_app", arguments)?),
            "stop_app" => ToolCall::StopApp(decode("stop_app", arguments)?),
            "clear_app_data" => ToolCall::ClearAppData(decode("clear_app_data", arguments)?),
            "list_packages" => ToolCall::ListPackages(decode("list_packages", arguments)?),
            "setup_proxy" => ToolCall::SetupProxy(decode("setup_proxy", arguments)?),
            "clear_proxy" => ToolCall::ClearProxy,
            "install_certificate" => {
                ToolCall::InstallCertificate(decode("install_certificate", arguments)?)
            }
            "execute_shell" => ToolCall::ExecuteShell(decode("execute_shell", arguments)?),
            "pull_file" => ToolCall::PullFile(decode("pull_file", arguments)?),
            "push_file" => ToolCall::PushFile(decode("push_file", arguments)?),
            other => return Err(ToolCallError::Unknown(other.to_string())),
        };
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ListDevices => "list_devices",
            ToolCall::SelectDevice(_) => "select_device",
            ToolCall::GetDeviceInfo => "get_device_info",
            ToolCall::CaptureScreenshot(_) => "capture_screenshot",
            ToolCall::GetUiHierarchy => "get_ui_hierarchy",
            ToolCall::FindElement(_) => "find_element",
            ToolCall::TapCoordinates(_) => "tap_coordinates",
            ToolCall::TapElement(_) => "tap_element",
            ToolCall::Swipe(_) => "swipe",
            ToolCall::InputText(_) => "input_text",
            ToolCall::PressKey(_) => "press_key",
            ToolCall::InstallApp(_) => "install_app",
            ToolCall::LaunchApp(_) => "launch_app",
            ToolCall::StopApp(_) => "stop_app",
            ToolCall::ClearAppData(_) => "clear_app_data",
            ToolCall::ListPackages(_) => "list_packages",
            ToolCall::SetupProxy(_) => "setup_proxy",
            ToolCall::ClearProxy => "clear_proxy",
            ToolCall::InstallCertificate(_) => "install_certificate",
            ToolCall::ExecuteShell(_) => "execute_shell",
            ToolCall::PullFile(_) => "pull_file",
            ToolCall::PushFile(_) => "push_file",
        }
    }

    pub fn requires_device(&self) -> bool {
        !matches!(self, ToolCall::ListDevices | ToolCall::SelectDevice(_))
    }
}
