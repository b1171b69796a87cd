use crate::app::commands::{coordinate, screen, ToolContext};
use crate::app::error::AppError;
use crate::app::keys::SystemKey;
use crate::app::models::ToolOutput;
use crate::app::tools::{InputTextArgs, PressKeyArgs, SwipeArgs, TapCoordinatesArgs};
use crate::app::ui_xml::{find_matching, UiSelector};

/// Escapes text for `input text`, which goes through the device shell: spaces become `%s`
/// and quotes are backslash-escaped.
pub fn escape_input_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            ' ' => escaped.push_str("%s"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn tap_point(ctx: &ToolContext<'_>, x: i64, y: i64) -> Result<ToolOutput, AppError> {
    let (x_arg, y_arg) = (x.to_string(), y.to_string());
    ctx.adb_checked(
        &["shell", "input", "tap", x_arg.as_str(), y_arg.as_str()],
        "Failed to tap",
    )?;
    ctx.settle(ctx.config.pacing.tap_settle_ms);
    Ok(ToolOutput::text(format!("Tapped at coordinates ({x}, {y})")))
}

pub fn tap_coordinates(
    ctx: &mut ToolContext<'_>,
    args: TapCoordinatesArgs,
) -> Result<ToolOutput, AppError> {
    tap_point(ctx, coordinate(args.x), coordinate(args.y))
}

/// Taps the centre of the first element matching `selector`.
pub fn tap_element(
    ctx: &mut ToolContext<'_>,
    selector: &UiSelector,
) -> Result<ToolOutput, AppError> {
    let nodes = screen::capture_ui_nodes(ctx)?;
    let matches = find_matching(&nodes, selector);
    let Some(first) = matches.first() else {
        return Ok(ToolOutput::text(screen::NO_MATCHING_ELEMENTS));
    };
    let Some(raw_bounds) = first.bounds.as_deref().filter(|raw| !raw.is_empty()) else {
        return Err(AppError::parse(
            "Element has no bounds information.",
            ctx.trace_id.as_str(),
        ));
    };
    let Some(bounds) = first.parsed_bounds() else {
        return Err(AppError::parse(
            format!("Could not parse bounds: {raw_bounds}"),
            ctx.trace_id.as_str(),
        ));
    };
    let (x, y) = bounds.center();
    tap_point(ctx, i64::from(x), i64::from(y))
}

pub fn swipe(ctx: &mut ToolContext<'_>, args: SwipeArgs) -> Result<ToolOutput, AppError> {
    let (start_x, start_y) = (coordinate(args.start_x), coordinate(args.start_y));
    let (end_x, end_y) = (coordinate(args.end_x), coordinate(args.end_y));
    let values = [
        start_x.to_string(),
        start_y.to_string(),
        end_x.to_string(),
        end_y.to_string(),
        coordinate(args.duration).to_string(),
    ];
    let mut command = vec!["shell", "input", "swipe"];
    command.extend(values.iter().map(String::as_str));
    ctx.adb_checked(&command, "Failed to swipe")?;
    ctx.settle(ctx.config.pacing.swipe_settle_ms);
    Ok(ToolOutput::text(format!(
        "Swiped from ({start_x}, {start_y}) to ({end_x}, {end_y})"
    )))
}

pub fn input_text(ctx: &mut ToolContext<'_>, args: InputTextArgs) -> Result<ToolOutput, AppError> {
    let escaped = escape_input_text(&args.text);
    ctx.adb_checked(
        &["shell", "input", "text", escaped.as_str()],
        "Failed to input text",
    )?;
    Ok(ToolOutput::text(format!("Entered text: {}", args.text)))
}

pub fn press_key(ctx: &mut ToolContext<'_>, args: PressKeyArgs) -> Result<ToolOutput, AppError> {
    let key: SystemKey = args
        .key
        .parse()
        .map_err(|message: String| AppError::validation(message, ctx.trace_id.as_str()))?;
    let code = key.key_code().to_string();
    ctx.adb_checked(
        &["shell", "input", "keyevent", code.as_str()],
        "Failed to press key",
    )?;
    ctx.settle(ctx.config.pacing.key_settle_ms);
    Ok(ToolOutput::text(format!("Pressed {key} key")))
}
