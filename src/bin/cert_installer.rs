use std::path::PathBuf;

use android_emulator_mcp_lib::app::adb::executor::ProcessAdb;
use android_emulator_mcp_lib::app::adb::locator::resolve_adb_program;
use android_emulator_mcp_lib::app::cert_installer::{
    CertificateInstaller, InstallStep, StepStatus, DEFAULT_CERT_NAME,
};
use android_emulator_mcp_lib::app::config::{load_config, AppConfig};
use android_emulator_mcp_lib::app::logging::init_logging;
use uuid::Uuid;

const USAGE: &str = "Usage: cert_installer <certificate_path> [device_serial] [--name NAME]

Example:
  cert_installer mitmproxy-ca-cert.pem
  cert_installer mitmproxy-ca-cert.pem emulator-5554";

#[derive(Debug, Clone)]
struct Args {
    cert_path: PathBuf,
    serial: Option<String>,
    name: String,
}

fn parse_args() -> Result<Args, String> {
    let mut positional: Vec<String> = Vec::new();
    let mut name = DEFAULT_CERT_NAME.to_string();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--name" => {
                name = it
                    .next()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| "--name requires a value".to_string())?;
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if other.starts_with("--") => return Err(format!("Unknown arg: {other}")),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let cert_path = positional
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| USAGE.to_string())?;
    let serial = positional.next().filter(|s| !s.trim().is_empty());
    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {extra}\n\n{USAGE}"));
    }

    Ok(Args {
        cert_path,
        serial,
        name,
    })
}

fn main() {
    let args = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(1);
        }
    };

    if !args.cert_path.exists() {
        eprintln!(
            "Error: Certificate file not found: {}",
            args.cert_path.display()
        );
        std::process::exit(1);
    }

    let trace_id = Uuid::new_v4().to_string();
    let config = load_config(&trace_id).unwrap_or_else(|err| {
        eprintln!("Warning: {err}; using defaults");
        AppConfig::default()
    });
    init_logging(&config.logging.level);

    let adb = ProcessAdb::new(resolve_adb_program(
        &config.adb.command_path,
        config.timeouts.probe(),
        &trace_id,
    ));
    let installer =
        CertificateInstaller::new(&adb, &config, args.serial.clone()).with_cert_name(args.name);

    println!("Starting automated certificate installation...");
    let outcome = installer.install(&args.cert_path);
    for report in &outcome.steps {
        match &report.status {
            StepStatus::Done => println!("✓ {}", report.step),
            StepStatus::Skipped(reason) => println!("⊘ {} ({reason})", report.step),
            StepStatus::Failed(reason) => println!("✗ {}: {reason}", report.step),
        }
    }

    let rule = "=".repeat(50);
    if outcome.succeeded() {
        println!("\n{rule}\nCertificate installed successfully!\n{rule}");
        println!("\nNote: Some apps may still not trust user certificates.");
        println!("For system-wide trust, you may need:");
        println!("1. Rooted device/emulator");
        println!("2. Install as system certificate");
        println!("3. Use Magisk module for certificate injection");
        return;
    }

    println!("\n{rule}\nCertificate installation failed or incomplete\n{rule}");
    println!("\nComplete the installation manually:");
    for (index, instruction) in outcome.manual_instructions().iter().enumerate() {
        println!("{}. {instruction}", index + 1);
    }
    let pushed = outcome.steps.iter().any(|report| {
        report.step == InstallStep::PushCertificate && report.status == StepStatus::Done
    });
    if pushed {
        println!("\nThe certificate has been pushed to: {}", outcome.remote_path);
    }
    std::process::exit(1);
}
