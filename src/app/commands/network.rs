use crate::app::commands::{ensure_local_file, ToolContext};
use crate::app::error::AppError;
use crate::app::models::ToolOutput;
use crate::app::tools::{InstallCertificateArgs, SetupProxyArgs};

pub const CERTIFICATE_FILE_NAME: &str = "ca_cert.crt";

/// `http_proxy` value that Android treats as "no proxy".
const PROXY_CLEARED: &str = ":0";

fn format_port(port: f64) -> String {
    if port.fract() == 0.0 {
        format!("{}", port as i64)
    } else {
        port.to_string()
    }
}

pub fn setup_proxy(ctx: &mut ToolContext<'_>, args: SetupProxyArgs) -> Result<ToolOutput, AppError> {
    let proxy = format!("{}:{}", args.host, format_port(args.port));
    ctx.adb_checked(
        &["shell", "settings", "put", "global", "http_proxy", proxy.as_str()],
        "Failed to set proxy",
    )?;
    Ok(ToolOutput::text(format!(
        "Proxy configured: {proxy}\nNote: You may need to restart apps or reboot for changes to take effect."
    )))
}

pub fn clear_proxy(ctx: &mut ToolContext<'_>) -> Result<ToolOutput, AppError> {
    ctx.adb_checked(
        &["shell", "settings", "put", "global", "http_proxy", PROXY_CLEARED],
        "Failed to clear proxy",
    )?;
    Ok(ToolOutput::text("Proxy settings cleared."))
}

fn certificate_instructions(remote_path: &str) -> String {
    format!(
        "Certificate pushed to device: {remote_path}

To complete installation:
1. Open Settings app
2. Navigate to Security > Encryption & credentials > Install a certificate
3. Select 'CA certificate'
4. Browse to Downloads folder
5. Select the certificate file
6. Confirm installation

For Android 11+, you may need to:
- Use adb root access for system certificate installation, or
- Install as user certificate (apps may not trust it by default)

Alternative automated approach:
Use 'tap_element' and other UI tools to navigate through Settings automatically.
"
    )
}

pub fn install_certificate(
    ctx: &mut ToolContext<'_>,
    args: InstallCertificateArgs,
) -> Result<ToolOutput, AppError> {
    ensure_local_file(&args.cert_path, "Certificate file", &ctx.trace_id)?;
    let remote_path = ctx.config.paths.certificate_remote_path(CERTIFICATE_FILE_NAME);
    ctx.adb_checked(
        &["push", args.cert_path.as_str(), remote_path.as_str()],
        "Failed to push certificate",
    )?;
    Ok(ToolOutput::text(certificate_instructions(&remote_path)))
}
