use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use android_emulator_mcp_lib::app::adb::executor::{to_args, AdbExecutor, ProcessAdb};
use android_emulator_mcp_lib::app::adb::locator::resolve_adb_program;
use android_emulator_mcp_lib::app::adb::parse::{
    parse_adb_devices, parse_adb_version, parse_package_names, parse_wm_size,
};
use android_emulator_mcp_lib::app::commands::{dispatch, ToolContext};
use android_emulator_mcp_lib::app::config::{load_config, AppConfig};
use android_emulator_mcp_lib::app::keys::SystemKey;
use android_emulator_mcp_lib::app::models::DeviceSummary;
use android_emulator_mcp_lib::app::state::DeviceSession;
use android_emulator_mcp_lib::app::tools::{
    CaptureScreenshotArgs, ExecuteShellArgs, PressKeyArgs, PullFileArgs, PushFileArgs,
    TapCoordinatesArgs, ToolCall,
};
use android_emulator_mcp_lib::app::ui_xml::parse_ui_nodes;
use serde::Serialize;
use uuid::Uuid;

const SHELL_PROBE: &str = "smoke_test_ok";
const REMOTE_SCRATCH: &str = "/sdcard/smoke_test.txt";

#[derive(Debug, Clone)]
struct Args {
    serial: Option<String>,
    out_dir: Option<PathBuf>,
    json: bool,
}

#[derive(Serialize)]
struct SmokeSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    started_at: String,
    serial: Option<String>,
    adb_program: String,
    out_dir: String,
    passed: usize,
    failed: usize,
    skipped: usize,
    checks: Vec<SmokeCheck>,
}

#[derive(Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: &'static str, // pass|fail|skip
    duration_ms: u128,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut serial = std::env::var("ANDROID_SERIAL")
        .ok()
        .filter(|s| !s.trim().is_empty());
    let mut out_dir: Option<PathBuf> = None;
    let mut json = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--serial" => {
                serial = it
                    .next()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty());
                if serial.is_none() {
                    return Err("--serial requires a value".to_string());
                }
            }
            "--out" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--out requires a value".to_string())?;
                out_dir = Some(PathBuf::from(value));
            }
            "--json" => {
                json = true;
            }
            "-h" | "--help" => {
                return Err(
                    "Usage: cargo run --bin smoke -- [--serial SERIAL] [--out DIR] [--json]\n"
                        .to_string(),
                );
            }
            other => return Err(format!("Unknown arg: {other}")),
        }
    }

    Ok(Args {
        serial,
        out_dir,
        json,
    })
}

fn ensure_dir(path: &Path) -> Result<(), String> {
    fs::create_dir_all(path)
        .map_err(|err| format!("Failed to create dir {}: {err}", path.display()))
}

fn run_check<F>(checks: &mut Vec<SmokeCheck>, name: &'static str, f: F) -> bool
where
    F: FnOnce() -> Result<Vec<String>, String>,
{
    let start = Instant::now();
    let (status, details, error) = match f() {
        Ok(details) => ("pass", details, None),
        Err(err) => ("fail", Vec::new(), Some(err)),
    };
    checks.push(SmokeCheck {
        name,
        status,
        duration_ms: start.elapsed().as_millis(),
        details,
        error,
    });
    status == "pass"
}

fn skip_check(checks: &mut Vec<SmokeCheck>, name: &'static str) {
    checks.push(SmokeCheck {
        name,
        status: "skip",
        duration_ms: 0,
        details: vec![],
        error: None,
    });
}

/// Runs one tool the way the server would and returns its text, or the error text.
fn call_tool(ctx: &mut ToolContext<'_>, call: ToolCall) -> Result<String, String> {
    let output = dispatch(call, ctx);
    let text = output.first_text().unwrap_or_default().to_string();
    if output.is_error {
        Err(text)
    } else {
        Ok(text)
    }
}

fn pick_device(
    adb: &dyn AdbExecutor,
    config: &AppConfig,
    trace_id: &str,
) -> Result<DeviceSummary, String> {
    let out = adb.execute(
        &to_args(&["devices", "-l"]),
        config.timeouts.command(),
        trace_id,
    );
    if !out.success() {
        return Err(format!("adb devices failed: {}", out.stderr.trim()));
    }
    parse_adb_devices(&out.stdout)
        .into_iter()
        .find(|device| device.is_online())
        .ok_or_else(|| {
            "No devices found. Please start an Android emulator or connect a device.".to_string()
        })
}

fn print_check(check: &SmokeCheck) {
    match check.status {
        "pass" => println!("✓ {}", check.name),
        "skip" => println!("⊘ {} (skipped)", check.name),
        _ => println!(
            "✗ {}: {}",
            check.name,
            check.error.as_deref().unwrap_or("failed")
        ),
    }
    for detail in &check.details {
        println!("  {detail}");
    }
}

fn main() {
    let args = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let trace_id = Uuid::new_v4().to_string();
    let started_at = chrono::Local::now().to_rfc3339();

    let out_dir = args.out_dir.unwrap_or_else(|| {
        let mut p = std::env::temp_dir();
        p.push(format!("android_emulator_mcp_smoke_{trace_id}"));
        p
    });
    if let Err(err) = ensure_dir(&out_dir) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let config = match load_config(&trace_id) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Warning: {err}; using defaults");
            AppConfig::default()
        }
    };
    let adb_program = resolve_adb_program(
        &config.adb.command_path,
        config.timeouts.probe(),
        &trace_id,
    );
    let adb = ProcessAdb::new(adb_program.clone());
    let mut checks: Vec<SmokeCheck> = Vec::new();

    run_check(&mut checks, "ADB Available", || {
        let out = adb.execute(&to_args(&["version"]), config.timeouts.probe(), &trace_id);
        if !out.success() {
            return Err(format!("ADB not found: {}", out.stderr.trim()));
        }
        let version = parse_adb_version(&out.stdout).unwrap_or_else(|| "unknown".to_string());
        Ok(vec![format!("Version: {version}")])
    });

    let mut serial: Option<String> = None;
    run_check(&mut checks, "List Devices", || {
        let (picked, model) = match args.serial.clone() {
            Some(s) => (s, None),
            None => {
                let device = pick_device(&adb, &config, &trace_id)?;
                (device.serial, device.model)
            }
        };
        serial = Some(picked.clone());
        let mut details = vec![format!("Using device: {picked}")];
        if let Some(model) = model {
            details.push(format!("Model: {model}"));
        }
        Ok(details)
    });

    let device_checks = [
        "Device Info",
        "Screenshot",
        "UI Hierarchy",
        "Tap Input",
        "Key Press",
        "App Listing",
        "Shell Commands",
        "File Operations",
    ];

    if serial.is_none() {
        for name in device_checks {
            skip_check(&mut checks, name);
        }
    } else {
        let mut session = DeviceSession::with_serial(serial.clone());
        let mut ctx = ToolContext::new(&adb, &config, &mut session, trace_id.clone());

        run_check(&mut checks, "Device Info", || {
            let text = call_tool(&mut ctx, ToolCall::GetDeviceInfo)?;
            Ok(text.lines().skip(1).map(str::to_string).collect())
        });

        run_check(&mut checks, "Screenshot", || {
            let path = out_dir.join("smoke_screenshot.png");
            call_tool(
                &mut ctx,
                ToolCall::CaptureScreenshot(CaptureScreenshotArgs {
                    save_path: Some(path.to_string_lossy().to_string()),
                }),
            )?;
            let size = fs::metadata(&path)
                .map_err(|err| format!("Screenshot file not found: {err}"))?
                .len();
            Ok(vec![
                format!("Saved to: {}", path.display()),
                format!("Size: {size} bytes"),
            ])
        });

        run_check(&mut checks, "UI Hierarchy", || {
            let text = call_tool(&mut ctx, ToolCall::GetUiHierarchy)?;
            let xml = text.strip_prefix("UI Hierarchy:\n").unwrap_or(&text);
            let path = out_dir.join("smoke_ui.xml");
            fs::write(&path, xml).map_err(|err| format!("Failed to write UI dump: {err}"))?;
            let nodes = parse_ui_nodes(xml)?;
            let count_class = |needle: &str| {
                nodes
                    .iter()
                    .filter(|node| {
                        node.class_name
                            .as_deref()
                            .is_some_and(|class| class.contains(needle))
                    })
                    .count()
            };
            Ok(vec![
                format!("Total elements: {}", nodes.len()),
                format!("Buttons: {}", count_class("Button")),
                format!("TextViews: {}", count_class("TextView")),
            ])
        });

        run_check(&mut checks, "Tap Input", || {
            let size = ctx.adb(&["shell", "wm", "size"]);
            let (width, height) = parse_wm_size(&size.stdout)
                .ok_or_else(|| format!("Could not read screen size: {}", size.stderr.trim()))?;
            let text = call_tool(
                &mut ctx,
                ToolCall::TapCoordinates(TapCoordinatesArgs {
                    x: f64::from(width / 2),
                    y: f64::from(height / 2),
                }),
            )?;
            Ok(vec![text])
        });

        run_check(&mut checks, "Key Press", || {
            let text = call_tool(
                &mut ctx,
                ToolCall::PressKey(PressKeyArgs {
                    key: SystemKey::Home.name().to_string(),
                }),
            )?;
            Ok(vec![text])
        });

        run_check(&mut checks, "App Listing", || {
            let out = ctx.adb(&["shell", "pm", "list", "packages"]);
            if !out.success() {
                return Err(format!("Failed to list packages: {}", out.stderr.trim()));
            }
            let packages = parse_package_names(&out.stdout);
            let mut details = vec![format!("Found {} packages", packages.len())];
            details.extend(packages.iter().take(5).map(|name| format!("- {name}")));
            Ok(details)
        });

        run_check(&mut checks, "Shell Commands", || {
            let text = call_tool(
                &mut ctx,
                ToolCall::ExecuteShell(ExecuteShellArgs {
                    command: format!("echo {SHELL_PROBE}"),
                }),
            )?;
            if text.contains(&format!("Output:\n{SHELL_PROBE}")) {
                Ok(vec![format!("echo returned {SHELL_PROBE}")])
            } else {
                Err(format!("Unexpected shell output: {text}"))
            }
        });

        run_check(&mut checks, "File Operations", || {
            let local = out_dir.join("smoke_push.txt");
            let pulled = out_dir.join("smoke_pull.txt");
            let payload = format!("smoke test {trace_id}\n");
            fs::write(&local, &payload).map_err(|err| format!("Failed to write temp file: {err}"))?;
            call_tool(
                &mut ctx,
                ToolCall::PushFile(PushFileArgs {
                    local_path: local.to_string_lossy().to_string(),
                    remote_path: REMOTE_SCRATCH.to_string(),
                }),
            )?;
            call_tool(
                &mut ctx,
                ToolCall::PullFile(PullFileArgs {
                    remote_path: REMOTE_SCRATCH.to_string(),
                    local_path: pulled.to_string_lossy().to_string(),
                }),
            )?;
            let _ = ctx.adb(&["shell", "rm", REMOTE_SCRATCH]);
            let round_trip =
                fs::read(&pulled).map_err(|err| format!("Failed to read pulled file: {err}"))?;
            if round_trip == payload.as_bytes() {
                Ok(vec!["Push and pull round trip matched".to_string()])
            } else {
                Err("Pulled file differs from pushed file".to_string())
            }
        });
    }

    let count = |status: &str| checks.iter().filter(|check| check.status == status).count();
    let (passed, failed, skipped) = (count("pass"), count("fail"), count("skip"));

    let summary = SmokeSummary {
        tool: "android_emulator_mcp_smoke",
        status: if failed == 0 { "pass" } else { "fail" },
        trace_id,
        started_at,
        serial,
        adb_program,
        out_dir: out_dir.to_string_lossy().to_string(),
        passed,
        failed,
        skipped,
        checks,
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        for check in &summary.checks {
            print_check(check);
        }
        println!(
            "\nSummary: {} passed, {} failed, {} skipped ({} total)\nout: {}",
            summary.passed,
            summary.failed,
            summary.skipped,
            summary.checks.len(),
            summary.out_dir
        );
    }

    if summary.status != "pass" {
        std::process::exit(1);
    }
}
