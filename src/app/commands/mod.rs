//! Tool handlers. Each handler takes a [`ToolContext`] and returns the text (and, for
//! screenshots, image) the caller sees. Failures are `AppError`s whose message is already
//! phrased for the caller; [`dispatch`] turns them into error-flagged text.

pub mod advanced;
pub mod apps;
pub mod device;
pub mod input;
pub mod network;
pub mod screen;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::adb::executor::{to_args, AdbExecutor};
use crate::app::adb::runner::CommandOutput;
use crate::app::config::AppConfig;
use crate::app::error::{AppError, ERR_NO_DEVICE};
use crate::app::models::ToolOutput;
use crate::app::state::DeviceSession;
use crate::app::tools::ToolCall;

pub const NO_DEVICE_SELECTED: &str = "No device selected.";
pub const NO_DEVICE_SELECTED_HINT: &str =
    "No device selected. Use list_devices and select_device first.";

pub struct ToolContext<'a> {
    pub adb: &'a dyn AdbExecutor,
    pub config: &'a AppConfig,
    pub session: &'a mut DeviceSession,
    pub trace_id: String,
}

impl<'a> ToolContext<'a> {
    pub fn new(
        adb: &'a dyn AdbExecutor,
        config: &'a AppConfig,
        session: &'a mut DeviceSession,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            adb,
            config,
            session,
            trace_id: trace_id.into(),
        }
    }

    /// Runs `adb [-s serial] <args>` with the default command timeout.
    pub fn adb(&self, args: &[&str]) -> CommandOutput {
        self.adb_with_timeout(args, self.config.timeouts.command())
    }

    pub fn adb_with_timeout(&self, args: &[&str], timeout: Duration) -> CommandOutput {
        let full_args = self.session.command_args(&to_args(args));
        self.adb.execute(&full_args, timeout, &self.trace_id)
    }

    /// Like [`ToolContext::adb`], but a non-zero exit becomes `"<failure>: <stderr>"`.
    pub fn adb_checked(&self, args: &[&str], failure: &str) -> Result<CommandOutput, AppError> {
        require_success(self.adb(args), failure, &self.trace_id)
    }

    /// Gives the on-device UI time to react before the next read.
    pub fn settle(&self, millis: u64) {
        if millis > 0 {
            std::thread::sleep(Duration::from_millis(millis));
        }
    }
}

pub fn require_success(
    output: CommandOutput,
    failure: &str,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    if output.success() {
        Ok(output)
    } else {
        Err(AppError::dependency(
            format!("{failure}: {}", output.stderr.trim_end()),
            trace_id,
        ))
    }
}

pub fn ensure_local_file(path: &str, label: &str, trace_id: &str) -> Result<(), AppError> {
    if Path::new(path).exists() {
        Ok(())
    } else {
        Err(AppError::validation(format!("{label} not found: {path}"), trace_id))
    }
}

/// Screen coordinates arrive as JSON numbers; adb wants integers.
pub fn coordinate(value: f64) -> i64 {
    value.trunc() as i64
}

fn run_call(call: ToolCall, ctx: &mut ToolContext<'_>) -> Result<ToolOutput, AppError> {
    if call.requires_device() && ctx.session.current().is_none() {
        let message = if matches!(call, ToolCall::GetDeviceInfo) {
            NO_DEVICE_SELECTED_HINT
        } else {
            NO_DEVICE_SELECTED
        };
        return Err(AppError::no_device(message, ctx.trace_id.as_str()));
    }

    match call {
        ToolCall::ListDevices => device::list_devices(ctx),
        ToolCall::SelectDevice(args) => device::select_device(ctx, args),
        ToolCall::GetDeviceInfo => device::get_device_info(ctx),
        ToolCall::CaptureScreenshot(args) => screen::capture_screenshot(ctx, args),
        ToolCall::GetUiHierarchy => screen::get_ui_hierarchy(ctx),
        ToolCall::FindElement(selector) => screen::find_element(ctx, &selector),
        ToolCall::TapCoordinates(args) => input::tap_coordinates(ctx, args),
        ToolCall::TapElement(selector) => input::tap_element(ctx, &selector),
        ToolCall::Swipe(args) => input::swipe(ctx, args),
        ToolCall::InputText(args) => input::input_text(ctx, args),
        ToolCall::PressKey(args) => input::press_key(ctx, args),
        ToolCall::InstallApp(args) => apps::install_app(ctx, args),
        ToolCall::LaunchApp(args) => apps::launch_app(ctx, args),
        ToolCall::StopApp(args) => apps::stop_app(ctx, args),
        ToolCall::ClearAppData(args) => apps::clear_app_data(ctx, args),
        ToolCall::ListPackages(args) => apps::list_packages(ctx, args),
        ToolCall::SetupProxy(args) => network::setup_proxy(ctx, args),
        ToolCall::ClearProxy => network::clear_proxy(ctx),
        ToolCall::InstallCertificate(args) => network::install_certificate(ctx, args),
        ToolCall::ExecuteShell(args) => advanced::execute_shell(ctx, args),
        ToolCall::PullFile(args) => advanced::pull_file(ctx, args),
        ToolCall::PushFile(args) => advanced::push_file(ctx, args),
    }
}

pub fn dispatch(call: ToolCall, ctx: &mut ToolContext<'_>) -> ToolOutput {
    let tool = call.name();
    info!(trace_id = %ctx.trace_id, tool, serial = ?ctx.session.current(), "tool call");
    match run_call(call, ctx) {
        Ok(output) => output,
        Err(err) => {
            if err.is_code(ERR_NO_DEVICE) {
                info!(trace_id = %err.trace_id, tool, "tool call needs a selected device");
            } else {
                warn!(trace_id = %err.trace_id, tool, code = %err.code, error = %err.error, "tool call failed");
            }
            ToolOutput::error(err.error)
        }
    }
}
