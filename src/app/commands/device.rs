use crate::app::adb::parse::parse_adb_devices;
use crate::app::commands::ToolContext;
use crate::app::error::AppError;
use crate::app::models::{DeviceProperties, DeviceSummary, ToolOutput};
use crate::app::tools::SelectDeviceArgs;

pub const NO_DEVICES_FOUND: &str =
    "No devices found. Make sure an emulator is running or a device is connected.";

pub fn render_device_list(devices: &[DeviceSummary]) -> String {
    if devices.is_empty() {
        return NO_DEVICES_FOUND.to_string();
    }
    let lines: Vec<String> = devices
        .iter()
        .map(|device| {
            format!(
                "Serial: {}, State: {}, Info: {}",
                device.serial, device.state, device.info
            )
        })
        .collect();
    format!("Available devices:\n{}", lines.join("\n"))
}

pub fn list_devices(ctx: &mut ToolContext<'_>) -> Result<ToolOutput, AppError> {
    let output = ctx.adb_checked(&["devices", "-l"], "Error listing devices")?;
    let devices = parse_adb_devices(&output.stdout);
    Ok(ToolOutput::text(render_device_list(&devices)))
}

pub fn select_device(
    ctx: &mut ToolContext<'_>,
    args: SelectDeviceArgs,
) -> Result<ToolOutput, AppError> {
    let reply = format!("Selected device: {}", args.serial);
    ctx.session.select(args.serial);
    Ok(ToolOutput::text(reply))
}

/// Each property is reported only when its command succeeded.
pub fn read_device_properties(ctx: &ToolContext<'_>) -> DeviceProperties {
    let getprop = |name: &str| {
        let output = ctx.adb(&["shell", "getprop", name]);
        output.success().then(|| output.stdout.trim().to_string())
    };
    let model = getprop("ro.product.model");
    let android_version = getprop("ro.build.version.release");
    let api_level = getprop("ro.build.version.sdk");
    let cpu_abi = getprop("ro.product.cpu.abi");
    let screen = ctx.adb(&["shell", "wm", "size"]);
    DeviceProperties {
        model,
        android_version,
        api_level,
        cpu_abi,
        screen_size: screen.success().then(|| screen.stdout.trim().to_string()),
    }
}

pub fn get_device_info(ctx: &mut ToolContext<'_>) -> Result<ToolOutput, AppError> {
    let properties = read_device_properties(ctx);
    let rendered = serde_json::to_string_pretty(&properties).map_err(|err| {
        AppError::system(format!("Failed to serialize device info: {err}"), ctx.trace_id.as_str())
    })?;
    Ok(ToolOutput::text(format!("Device Information:\n{rendered}")))
}
