use std::fs;

use crate::app::commands::ToolContext;
use crate::app::error::AppError;
use crate::app::models::ToolOutput;
use crate::app::tools::CaptureScreenshotArgs;
use crate::app::ui_capture::{encode_png, PNG_MIME_TYPE};
use crate::app::ui_xml::{find_matching, parse_ui_nodes, ElementMatch, UiNode, UiSelector};

pub const NO_MATCHING_ELEMENTS: &str = "No matching elements found.";

pub fn capture_screenshot(
    ctx: &mut ToolContext<'_>,
    args: CaptureScreenshotArgs,
) -> Result<ToolOutput, AppError> {
    let remote_path = ctx.config.paths.screenshot_remote.clone();
    ctx.adb_checked(
        &["shell", "screencap", "-p", remote_path.as_str()],
        "Failed to capture screenshot",
    )?;

    let local_path = args
        .save_path
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| {
            ctx.config
                .paths
                .screenshot_local_path()
                .to_string_lossy()
                .to_string()
        });
    ctx.adb_checked(
        &["pull", remote_path.as_str(), local_path.as_str()],
        "Failed to pull screenshot",
    )?;

    let bytes = fs::read(&local_path).map_err(|err| {
        AppError::system(format!("Error reading screenshot: {err}"), ctx.trace_id.as_str())
    })?;
    let encoded = encode_png(&bytes).map_err(|err| {
        AppError::parse(format!("Error reading screenshot: {err}"), ctx.trace_id.as_str())
    })?;

    Ok(
        ToolOutput::text(format!("Screenshot captured successfully. Saved to: {local_path}"))
            .with_image(encoded, PNG_MIME_TYPE),
    )
}

/// Dumps the hierarchy on the device, pulls it and returns the raw XML.
pub fn fetch_ui_dump(ctx: &ToolContext<'_>) -> Result<String, AppError> {
    let remote_path = ctx.config.paths.ui_dump_remote.as_str();
    ctx.adb_checked(&["shell", "uiautomator", "dump", remote_path], "Failed to dump UI")?;

    let local_path = ctx.config.paths.ui_dump_local_path();
    let local = local_path.to_string_lossy().to_string();
    ctx.adb_checked(&["pull", remote_path, local.as_str()], "Failed to pull UI dump")?;

    fs::read_to_string(&local_path).map_err(|err| {
        AppError::system(format!("Error reading UI hierarchy: {err}"), ctx.trace_id.as_str())
    })
}

pub fn capture_ui_nodes(ctx: &ToolContext<'_>) -> Result<Vec<UiNode>, AppError> {
    let xml = fetch_ui_dump(ctx)?;
    parse_ui_nodes(&xml).map_err(|err| {
        AppError::parse(format!("Error parsing UI hierarchy: {err}"), ctx.trace_id.as_str())
    })
}

pub fn get_ui_hierarchy(ctx: &mut ToolContext<'_>) -> Result<ToolOutput, AppError> {
    let xml = fetch_ui_dump(ctx)?;
    Ok(ToolOutput::text(format!("UI Hierarchy:\n{xml}")))
}

pub fn render_matches(matches: &[&UiNode], trace_id: &str) -> Result<String, AppError> {
    if matches.is_empty() {
        return Ok(NO_MATCHING_ELEMENTS.to_string());
    }
    let reported: Vec<ElementMatch<'_>> = matches.iter().map(|node| node.to_match()).collect();
    let rendered = serde_json::to_string_pretty(&reported).map_err(|err| {
        AppError::system(format!("Failed to serialize matches: {err}"), trace_id)
    })?;
    Ok(format!(
        "Found {} matching element(s):\n{rendered}",
        matches.len()
    ))
}

pub fn find_element(
    ctx: &mut ToolContext<'_>,
    selector: &UiSelector,
) -> Result<ToolOutput, AppError> {
    let nodes = capture_ui_nodes(ctx)?;
    let matches = find_matching(&nodes, selector);
    Ok(ToolOutput::text(render_matches(&matches, &ctx.trace_id)?))
}
