use crate::app::commands::{ensure_local_file, ToolContext};
use crate::app::error::AppError;
use crate::app::models::ToolOutput;
use crate::app::tools::{ExecuteShellArgs, PullFileArgs, PushFileArgs};

/// Raw shell access. The exit code is reported, not treated as a failure.
pub fn execute_shell(
    ctx: &mut ToolContext<'_>,
    args: ExecuteShellArgs,
) -> Result<ToolOutput, AppError> {
    let output = ctx.adb_with_timeout(
        &["shell", args.command.as_str()],
        ctx.config.timeouts.shell(),
    );
    let code = output
        .exit_code
        .map(|code| code.to_string())
        .unwrap_or_else(|| "none".to_string());
    let mut rendered = format!(
        "Command: {}\nReturn Code: {code}\n\nOutput:\n{}",
        args.command, output.stdout
    );
    if !output.stderr.is_empty() {
        rendered.push_str(&format!("\n\nError Output:\n{}", output.stderr));
    }
    Ok(ToolOutput::text(rendered))
}

pub fn pull_file(ctx: &mut ToolContext<'_>, args: PullFileArgs) -> Result<ToolOutput, AppError> {
    let output = ctx.adb_checked(
        &["pull", args.remote_path.as_str(), args.local_path.as_str()],
        "Failed to pull file",
    )?;
    Ok(ToolOutput::text(format!(
        "File pulled successfully:\nFrom: {}\nTo: {}\n{}",
        args.remote_path, args.local_path, output.stdout
    )))
}

pub fn push_file(ctx: &mut ToolContext<'_>, args: PushFileArgs) -> Result<ToolOutput, AppError> {
    ensure_local_file(&args.local_path, "Local file", &ctx.trace_id)?;
    let output = ctx.adb_checked(
        &["push", args.local_path.as_str(), args.remote_path.as_str()],
        "Failed to push file",
    )?;
    Ok(ToolOutput::text(format!(
        "File pushed successfully:\nFrom: {}\nTo: {}\n{}",
        args.local_path, args.remote_path, output.stdout
    )))
}
