use crate::app::adb::parse::parse_package_names;
use crate::app::commands::{ensure_local_file, require_success, ToolContext};
use crate::app::error::AppError;
use crate::app::models::ToolOutput;
use crate::app::tools::{InstallAppArgs, ListPackagesArgs, PackageArgs};

const PACKAGE_LIST_LIMIT: usize = 100;

pub fn install_app(ctx: &mut ToolContext<'_>, args: InstallAppArgs) -> Result<ToolOutput, AppError> {
    ensure_local_file(&args.apk_path, "APK file", &ctx.trace_id)?;
    let output = ctx.adb_with_timeout(
        &["install", "-r", args.apk_path.as_str()],
        ctx.config.timeouts.install(),
    );
    let output = require_success(output, "Failed to install app", &ctx.trace_id)?;
    Ok(ToolOutput::text(format!(
        "Successfully installed: {}\n{}",
        args.apk_path, output.stdout
    )))
}

pub fn launch_app(ctx: &mut ToolContext<'_>, args: PackageArgs) -> Result<ToolOutput, AppError> {
    ctx.adb_checked(
        &[
            "shell",
            "monkey",
            "-p",
            args.package.as_str(),
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ],
        "Failed to launch app",
    )?;
    ctx.settle(ctx.config.pacing.launch_settle_ms);
    Ok(ToolOutput::text(format!("Launched app: {}", args.package)))
}

pub fn stop_app(ctx: &mut ToolContext<'_>, args: PackageArgs) -> Result<ToolOutput, AppError> {
    ctx.adb_checked(
        &["shell", "am", "force-stop", args.package.as_str()],
        "Failed to stop app",
    )?;
    Ok(ToolOutput::text(format!("Stopped app: {}", args.package)))
}

pub fn clear_app_data(ctx: &mut ToolContext<'_>, args: PackageArgs) -> Result<ToolOutput, AppError> {
    let output = ctx.adb_checked(
        &["shell", "pm", "clear", args.package.as_str()],
        "Failed to clear app data",
    )?;
    Ok(ToolOutput::text(format!(
        "Cleared data for: {}\n{}",
        args.package, output.stdout
    )))
}

/// At most 100 names are listed; the remainder is summarised as a count.
pub fn render_package_list(packages: &[String]) -> String {
    let shown: Vec<&str> = packages
        .iter()
        .take(PACKAGE_LIST_LIMIT)
        .map(String::as_str)
        .collect();
    let mut rendered = format!("Found {} package(s):\n{}", packages.len(), shown.join("\n"));
    if packages.len() > PACKAGE_LIST_LIMIT {
        rendered.push_str(&format!(
            "\n... and {} more",
            packages.len() - PACKAGE_LIST_LIMIT
        ));
    }
    rendered
}

pub fn list_packages(
    ctx: &mut ToolContext<'_>,
    args: ListPackagesArgs,
) -> Result<ToolOutput, AppError> {
    let output = ctx.adb_checked(&["shell", "pm", "list", "packages"], "Failed to list packages")?;
    let mut packages = parse_package_names(&output.stdout);
    if let Some(filter) = args.filter.as_deref().filter(|value| !value.is_empty()) {
        packages.retain(|name| name.contains(filter));
    }
    Ok(ToolOutput::text(render_package_list(&packages)))
}
