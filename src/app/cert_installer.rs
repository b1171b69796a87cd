//! Drives the Settings app through the user-CA install flow with taps found in fresh
//! `uiautomator` dumps.
//!
//! The labels are those of stock Android and most emulator images. Vendor skins and newer
//! releases rename or move these screens, so a run can stop part way; the outcome then
//! carries manual instructions for the remaining steps.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use crate::app::adb::executor::{to_args, AdbExecutor};
use crate::app::adb::parse::parse_wm_size;
use crate::app::adb::runner::{run_command_with_timeout, CommandOutput};
use crate::app::commands::input::escape_input_text;
use crate::app::config::AppConfig;
use crate::app::state::DeviceSession;
use crate::app::ui_xml::parse_ui_nodes;

pub const DEFAULT_CERT_NAME: &str = "mitmproxy-ca";

/// Approximate position of the file picker's hamburger icon.
const DRAWER_ICON: (i32, i32) = (50, 150);
const SCROLL_ROUNDS: usize = 3;
const MENU_WAIT: Duration = Duration::from_secs(5);
const WARNING_WAIT: Duration = Duration::from_secs(3);
const SCROLL_DURATION_MS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    ConvertToDer,
    PushCertificate,
    OpenSettings,
    OpenSecurity,
    OpenCredentials,
    OpenInstallCertificate,
    ChooseCaCertificate,
    ConfirmWarning,
    OpenDrawer,
    OpenDownloads,
    SelectCertificate,
    NameCertificate,
    ConfirmInstall,
}

impl InstallStep {
    pub const ALL: [InstallStep; 13] = [
        InstallStep::ConvertToDer,
        InstallStep::PushCertificate,
        InstallStep::OpenSettings,
        InstallStep::OpenSecurity,
        InstallStep::OpenCredentials,
        InstallStep::OpenInstallCertificate,
        InstallStep::ChooseCaCertificate,
        InstallStep::ConfirmWarning,
        InstallStep::OpenDrawer,
        InstallStep::OpenDownloads,
        InstallStep::SelectCertificate,
        InstallStep::NameCertificate,
        InstallStep::ConfirmInstall,
    ];

    /// A failed required step ends the run.
    pub fn is_required(self) -> bool {
        !matches!(
            self,
            InstallStep::ConvertToDer
                | InstallStep::ConfirmWarning
                | InstallStep::OpenDrawer
                | InstallStep::OpenDownloads
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            InstallStep::ConvertToDer => "Convert PEM to DER",
            InstallStep::PushCertificate => "Push certificate",
            InstallStep::OpenSettings => "Open Settings",
            InstallStep::OpenSecurity => "Open Security",
            InstallStep::OpenCredentials => "Open credential storage",
            InstallStep::OpenInstallCertificate => "Open certificate install",
            InstallStep::ChooseCaCertificate => "Choose CA certificate",
            InstallStep::ConfirmWarning => "Confirm warning",
            InstallStep::OpenDrawer => "Open navigation drawer",
            InstallStep::OpenDownloads => "Open Downloads",
            InstallStep::SelectCertificate => "Select certificate file",
            InstallStep::NameCertificate => "Name certificate",
            InstallStep::ConfirmInstall => "Confirm install",
        }
    }

    fn manual_instruction(self, cert_name: &str, remote_path: &str) -> String {
        match self {
            InstallStep::ConvertToDer => format!(
                "Convert the certificate to DER: openssl x509 -inform PEM -in <cert.pem> -outform DER -out {cert_name}.crt"
            ),
            InstallStep::PushCertificate => {
                format!("Push the certificate: adb push <cert> {remote_path}")
            }
            InstallStep::OpenSettings => "Open the Settings app".to_string(),
            InstallStep::OpenSecurity => {
                "Open Security (or Biometrics and security)".to_string()
            }
            InstallStep::OpenCredentials => {
                "Open Encryption & credentials (or Credential storage)".to_string()
            }
            InstallStep::OpenInstallCertificate => {
                "Tap Install a certificate (or Install from storage)".to_string()
            }
            InstallStep::ChooseCaCertificate => "Choose CA certificate".to_string(),
            InstallStep::ConfirmWarning => {
                "Tap Install anyway if a warning appears".to_string()
            }
            InstallStep::OpenDrawer => "Open the file picker's navigation drawer".to_string(),
            InstallStep::OpenDownloads => "Select Downloads".to_string(),
            InstallStep::SelectCertificate => format!("Select {cert_name}.crt"),
            InstallStep::NameCertificate => {
                format!("Enter {cert_name} as the certificate name")
            }
            InstallStep::ConfirmInstall => "Tap OK".to_string(),
        }
    }
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: InstallStep,
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub cert_name: String,
    pub remote_path: String,
    pub steps: Vec<StepReport>,
}

impl InstallOutcome {
    pub fn succeeded(&self) -> bool {
        self.failed_step().is_none()
            && self
                .steps
                .last()
                .is_some_and(|report| report.step == InstallStep::ConfirmInstall)
    }

    pub fn failed_step(&self) -> Option<(InstallStep, &str)> {
        self.steps.iter().find_map(|report| match &report.status {
            StepStatus::Failed(reason) => Some((report.step, reason.as_str())),
            _ => None,
        })
    }

    /// What the user still has to do by hand, starting at the failed step.
    pub fn manual_instructions(&self) -> Vec<String> {
        let Some((failed, _)) = self.failed_step() else {
            return Vec::new();
        };
        InstallStep::ALL
            .iter()
            .skip_while(|step| **step != failed)
            .map(|step| step.manual_instruction(&self.cert_name, &self.remote_path))
            .collect()
    }
}

pub struct CertificateInstaller<'a> {
    adb: &'a dyn AdbExecutor,
    config: &'a AppConfig,
    session: DeviceSession,
    cert_name: String,
    trace_id: String,
}

impl<'a> CertificateInstaller<'a> {
    pub fn new(adb: &'a dyn AdbExecutor, config: &'a AppConfig, serial: Option<String>) -> Self {
        Self {
            adb,
            config,
            session: DeviceSession::with_serial(serial),
            cert_name: DEFAULT_CERT_NAME.to_string(),
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_cert_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.cert_name = name;
        }
        self
    }

    pub fn cert_name(&self) -> &str {
        &self.cert_name
    }

    pub fn remote_path(&self) -> String {
        self.config
            .paths
            .certificate_remote_path(&format!("{}.crt", self.cert_name))
    }

    pub fn install(&self, cert_path: &Path) -> InstallOutcome {
        let mut run = StepRun::new(self.cert_name.clone(), self.remote_path());
        info!(trace_id = %self.trace_id, cert = %cert_path.display(), serial = ?self.session.current(), "certificate install started");

        let local = match self.convert_to_der(cert_path) {
            Ok(converted) => {
                run.record(InstallStep::ConvertToDer, Ok(()));
                converted
            }
            Err(reason) => {
                run.record(InstallStep::ConvertToDer, Err(reason));
                cert_path.to_path_buf()
            }
        };

        let remote = run.outcome.remote_path.clone();
        let local_arg = local.to_string_lossy().to_string();
        let pushed = self.adb_checked(&["push", local_arg.as_str(), remote.as_str()]);
        if !run.record(InstallStep::PushCertificate, pushed.map(|_| ())) {
            return run.finish();
        }

        let opened = self.adb_checked(&["shell", "am", "start", "-a", "android.settings.SETTINGS"]);
        if !run.record(InstallStep::OpenSettings, opened.map(|_| ())) {
            return run.finish();
        }
        self.settle(self.config.pacing.launch_settle_ms);

        let menu_wait = self.wait_cap(MENU_WAIT);
        let security = self.tap_first(&["Security", "Biometrics and security"], menu_wait);
        if !run.record(InstallStep::OpenSecurity, security) {
            return run.finish();
        }

        let credentials = self.tap_with_scroll(&["Encryption & credentials", "Credential storage"]);
        if !run.record(InstallStep::OpenCredentials, credentials) {
            return run.finish();
        }

        let install = self.tap_with_scroll(&[
            "Install a certificate",
            "Install from SD card",
            "Install from storage",
        ]);
        if !run.record(InstallStep::OpenInstallCertificate, install) {
            return run.finish();
        }

        let ca = self.tap_text("CA certificate", self.config.pacing.ui_wait());
        if !run.record(InstallStep::ChooseCaCertificate, ca) {
            return run.finish();
        }

        let warning = self.tap_text("Install anyway", self.wait_cap(WARNING_WAIT));
        run.record(InstallStep::ConfirmWarning, warning);

        let drawer = self.tap(DRAWER_ICON.0, DRAWER_ICON.1);
        run.record(InstallStep::OpenDrawer, drawer);

        let downloads = self.tap_text("Downloads", self.config.pacing.ui_wait());
        run.record(InstallStep::OpenDownloads, downloads);

        let file_label = format!("{}.crt", self.cert_name);
        let selected = self.tap_text(&file_label, self.config.pacing.ui_wait());
        if !run.record(InstallStep::SelectCertificate, selected) {
            return run.finish();
        }

        let escaped = escape_input_text(&self.cert_name);
        let named = self.adb_checked(&["shell", "input", "text", escaped.as_str()]);
        if !run.record(InstallStep::NameCertificate, named.map(|_| ())) {
            return run.finish();
        }

        let confirmed = self.tap_text("OK", self.config.pacing.ui_wait());
        run.record(InstallStep::ConfirmInstall, confirmed);
        run.finish()
    }

    /// `.pem` input is converted next to the original with `openssl`; anything else is
    /// pushed as is.
    fn convert_to_der(&self, cert_path: &Path) -> Result<PathBuf, String> {
        let is_pem = cert_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pem"));
        if !is_pem {
            return Err("not a PEM file".to_string());
        }
        let der_path = cert_path.with_extension("crt");
        let args: Vec<String> = vec![
            "x509".to_string(),
            "-inform".to_string(),
            "PEM".to_string(),
            "-in".to_string(),
            cert_path.to_string_lossy().to_string(),
            "-outform".to_string(),
            "DER".to_string(),
            "-out".to_string(),
            der_path.to_string_lossy().to_string(),
        ];
        let output = run_command_with_timeout(
            "openssl",
            &args,
            self.config.timeouts.command(),
            &self.trace_id,
        )
        .map_err(|err| err.error)?;
        if output.success() {
            info!(trace_id = %self.trace_id, der = %der_path.display(), "converted certificate to DER");
            Ok(der_path)
        } else {
            let reason = format!("openssl failed: {}", output.stderr.trim());
            warn!(trace_id = %self.trace_id, reason = %reason, "could not convert certificate; pushing original");
            Err(reason)
        }
    }

    fn adb(&self, args: &[&str]) -> CommandOutput {
        let full_args = self.session.command_args(&to_args(args));
        self.adb
            .execute(&full_args, self.config.timeouts.command(), &self.trace_id)
    }

    fn adb_checked(&self, args: &[&str]) -> Result<CommandOutput, String> {
        let output = self.adb(args);
        if output.success() {
            Ok(output)
        } else {
            Err(output.stderr.trim().to_string())
        }
    }

    fn settle(&self, millis: u64) {
        if millis > 0 {
            std::thread::sleep(Duration::from_millis(millis));
        }
    }

    /// Fixed per-step waits never exceed the configured UI wait.
    fn wait_cap(&self, wait: Duration) -> Duration {
        wait.min(self.config.pacing.ui_wait())
    }

    fn tap(&self, x: i32, y: i32) -> Result<(), String> {
        let (x_arg, y_arg) = (x.to_string(), y.to_string());
        self.adb_checked(&["shell", "input", "tap", x_arg.as_str(), y_arg.as_str()])?;
        self.settle(self.config.pacing.tap_settle_ms);
        Ok(())
    }

    fn locate_text(&self, text: &str) -> Option<(i32, i32)> {
        let output = self.adb(&["shell", "uiautomator", "dump", "/dev/tty"]);
        if !output.success() {
            return None;
        }
        let nodes = parse_ui_nodes(&output.stdout).ok()?;
        nodes
            .iter()
            .filter(|node| node.text.as_deref() == Some(text))
            .find_map(|node| node.parsed_bounds())
            .map(|bounds| bounds.center())
    }

    /// Polls fresh dumps until a node whose text is exactly `text` shows up, then taps it.
    pub fn tap_text(&self, text: &str, timeout: Duration) -> Result<(), String> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some((x, y)) = self.locate_text(text) {
                return self.tap(x, y);
            }
            if Instant::now() >= deadline {
                return Err(format!("Could not find element with text: {text}"));
            }
            std::thread::sleep(self.config.pacing.poll_interval());
        }
    }

    fn tap_first(&self, labels: &[&str], timeout: Duration) -> Result<(), String> {
        for label in labels {
            if self.tap_text(label, timeout).is_ok() {
                return Ok(());
            }
        }
        Err(format!("Could not find any of: {}", labels.join(", ")))
    }

    fn tap_with_scroll(&self, labels: &[&str]) -> Result<(), String> {
        for _ in 0..SCROLL_ROUNDS {
            if self.tap_first(labels, self.config.pacing.ui_wait()).is_ok() {
                return Ok(());
            }
            self.scroll_down();
        }
        Err(format!(
            "Could not find any of: {} (after {SCROLL_ROUNDS} scrolls)",
            labels.join(", ")
        ))
    }

    pub fn scroll_down(&self) {
        let output = self.adb(&["shell", "wm", "size"]);
        let Some((width, height)) = parse_wm_size(&output.stdout) else {
            warn!(trace_id = %self.trace_id, "could not read screen size; not scrolling");
            return;
        };
        let x = (width / 2).to_string();
        let start_y = (height * 8 / 10).to_string();
        let end_y = (height * 2 / 10).to_string();
        let duration = SCROLL_DURATION_MS.to_string();
        let swiped = self.adb(&[
            "shell",
            "input",
            "swipe",
            x.as_str(),
            start_y.as_str(),
            x.as_str(),
            end_y.as_str(),
            duration.as_str(),
        ]);
        if swiped.success() {
            self.settle(self.config.pacing.swipe_settle_ms);
        }
    }
}

struct StepRun {
    outcome: InstallOutcome,
}

impl StepRun {
    fn new(cert_name: String, remote_path: String) -> Self {
        Self {
            outcome: InstallOutcome {
                cert_name,
                remote_path,
                steps: Vec::new(),
            },
        }
    }

    /// Returns whether the run should go on.
    fn record(&mut self, step: InstallStep, result: Result<(), String>) -> bool {
        let status = match result {
            Ok(()) => StepStatus::Done,
            Err(reason) if step.is_required() => StepStatus::Failed(reason),
            Err(reason) => StepStatus::Skipped(reason),
        };
        let proceed = !matches!(status, StepStatus::Failed(_));
        match &status {
            StepStatus::Done => info!(step = %step, "step done"),
            StepStatus::Skipped(reason) => info!(step = %step, reason = %reason, "step skipped"),
            StepStatus::Failed(reason) => warn!(step = %step, reason = %reason, "step failed"),
        }
        self.outcome.steps.push(StepReport { step, status });
        proceed
    }

    fn finish(self) -> InstallOutcome {
        self.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;

    use tempfile::TempDir;

    use crate::app::config::PacingSettings;

    /// Every dump shows the same labels, stacked 100px apart.
    struct ScriptedScreen {
        labels: Vec<&'static str>,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl ScriptedScreen {
        fn showing(labels: &[&'static str]) -> Self {
            Self {
                labels: labels.to_vec(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn dump(&self) -> String {
            let nodes: String = self
                .labels
                .iter()
                .enumerate()
                .map(|(index, label)| {
                    let top = index * 100;
                    let label = label.replace('&', "&amp;");
                    format!(
                        r#"<node text="{label}" class="android.widget.TextView" clickable="true" enabled="true" bounds="[0,{top}][200,{}]" />"#,
                        top + 80
                    )
                })
                .collect();
            format!(
                "<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation=\"0\">{nodes}</hierarchy>UI hierchary dumped to: /dev/tty"
            )
        }

        fn taps(&self) -> Vec<(String, String)> {
            self.calls
                .borrow()
                .iter()
                .filter(|args| args.len() >= 5 && args[args.len() - 3] == "tap")
                .map(|args| (args[args.len() - 2].clone(), args[args.len() - 1].clone()))
                .collect()
        }
    }

    impl AdbExecutor for ScriptedScreen {
        fn execute(&self, args: &[String], _timeout: Duration, _trace_id: &str) -> CommandOutput {
            self.calls.borrow_mut().push(args.to_vec());
            let stdout = if args.iter().any(|arg| arg == "uiautomator") {
                self.dump()
            } else if args.iter().any(|arg| arg == "wm") {
                "Physical size: 1080x2400\n".to_string()
            } else {
                String::new()
            };
            CommandOutput {
                stdout,
                stderr: String::new(),
                exit_code: Some(0),
            }
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            pacing: PacingSettings::immediate(),
            ..AppConfig::default()
        }
    }

    fn cert_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).expect("write cert");
        path
    }

    const FULL_FLOW: [&str; 8] = [
        "Security",
        "Encryption & credentials",
        "Install a certificate",
        "CA certificate",
        "Install anyway",
        "Downloads",
        "mitmproxy-ca.crt",
        "OK",
    ];

    #[test]
    fn full_flow_completes_every_step() {
        let dir = TempDir::new().expect("tempdir");
        let cert = cert_file(&dir, "ca.crt", "der bytes");
        let screen = ScriptedScreen::showing(&FULL_FLOW);
        let config = config();
        let installer =
            CertificateInstaller::new(&screen, &config, Some("emulator-5554".to_string()));

        let outcome = installer.install(&cert);
        assert!(outcome.succeeded(), "{outcome:?}");
        assert_eq!(outcome.remote_path, "/sdcard/Download/mitmproxy-ca.crt");
        assert_eq!(outcome.steps.len(), InstallStep::ALL.len());
        assert!(matches!(outcome.steps[0].status, StepStatus::Skipped(_)));
        assert!(outcome.manual_instructions().is_empty());

        let cert_arg = cert.to_string_lossy().to_string();
        let calls = screen.calls.borrow();
        assert_eq!(
            calls[0],
            to_args(&[
                "-s",
                "emulator-5554",
                "push",
                cert_arg.as_str(),
                "/sdcard/Download/mitmproxy-ca.crt",
            ])
        );
        assert!(calls
            .iter()
            .any(|args| args[2..] == to_args(&["shell", "input", "text", "mitmproxy-ca"])));
        drop(calls);

        let taps = screen.taps();
        assert_eq!(taps.first(), Some(&("100".to_string(), "40".to_string())));
        assert!(taps.contains(&("50".to_string(), "150".to_string())));
        assert_eq!(taps.last(), Some(&("100".to_string(), "740".to_string())));
    }

    #[test]
    fn missing_optional_warning_is_skipped() {
        let dir = TempDir::new().expect("tempdir");
        let cert = cert_file(&dir, "ca.crt", "der bytes");
        let labels: Vec<&'static str> = FULL_FLOW
            .iter()
            .copied()
            .filter(|label| *label != "Install anyway")
            .collect();
        let screen = ScriptedScreen::showing(&labels);
        let config = config();
        let outcome = CertificateInstaller::new(&screen, &config, None).install(&cert);

        assert!(outcome.succeeded());
        let warning = outcome
            .steps
            .iter()
            .find(|report| report.step == InstallStep::ConfirmWarning)
            .expect("warning step");
        assert!(matches!(warning.status, StepStatus::Skipped(_)));
    }

    #[test]
    fn required_step_failure_aborts_with_manual_instructions() {
        let dir = TempDir::new().expect("tempdir");
        let cert = cert_file(&dir, "ca.crt", "der bytes");
        let screen = ScriptedScreen::showing(&["Security", "Credential storage", "Install from storage"]);
        let config = config();
        let outcome = CertificateInstaller::new(&screen, &config, None).install(&cert);

        assert!(!outcome.succeeded());
        let (step, reason) = outcome.failed_step().expect("failed step");
        assert_eq!(step, InstallStep::ChooseCaCertificate);
        assert_eq!(reason, "Could not find element with text: CA certificate");
        assert_eq!(outcome.steps.last().map(|report| report.step), Some(step));

        let manual = outcome.manual_instructions();
        assert_eq!(manual.first().map(String::as_str), Some("Choose CA certificate"));
        assert_eq!(manual.last().map(String::as_str), Some("Tap OK"));
        assert_eq!(manual.len(), 7);
    }

    #[test]
    fn credentials_search_scrolls_between_rounds() {
        let dir = TempDir::new().expect("tempdir");
        let cert = cert_file(&dir, "ca.crt", "der bytes");
        let screen = ScriptedScreen::showing(&["Security"]);
        let config = config();
        let outcome = CertificateInstaller::new(&screen, &config, None).install(&cert);

        assert_eq!(
            outcome.failed_step().map(|(step, _)| step),
            Some(InstallStep::OpenCredentials)
        );
        let swipes: Vec<Vec<String>> = screen
            .calls
            .borrow()
            .iter()
            .filter(|args| args.iter().any(|arg| arg == "swipe"))
            .cloned()
            .collect();
        assert_eq!(swipes.len(), SCROLL_ROUNDS);
        assert_eq!(
            swipes[0],
            to_args(&["shell", "input", "swipe", "540", "1920", "540", "480", "300"])
        );
    }

    #[test]
    fn custom_name_drives_remote_path_and_file_label() {
        let dir = TempDir::new().expect("tempdir");
        let cert = cert_file(&dir, "ca.crt", "der bytes");
        let screen = ScriptedScreen::showing(&[
            "Security",
            "Encryption & credentials",
            "Install a certificate",
            "CA certificate",
            "Downloads",
            "corp proxy.crt",
            "OK",
        ]);
        let config = config();
        let installer = CertificateInstaller::new(&screen, &config, None).with_cert_name("corp proxy");

        let outcome = installer.install(&cert);
        assert!(outcome.succeeded(), "{outcome:?}");
        assert_eq!(outcome.remote_path, "/sdcard/Download/corp proxy.crt");
        assert!(screen
            .calls
            .borrow()
            .iter()
            .any(|args| *args == to_args(&["shell", "input", "text", "corp%sproxy"])));
    }

    #[test]
    fn unconvertible_pem_is_pushed_as_is() {
        let dir = TempDir::new().expect("tempdir");
        let cert = cert_file(&dir, "broken.pem", "not a certificate");
        let screen = ScriptedScreen::showing(&FULL_FLOW);
        let config = config();
        let outcome = CertificateInstaller::new(&screen, &config, None).install(&cert);

        assert!(matches!(outcome.steps[0].status, StepStatus::Skipped(_)));
        let calls = screen.calls.borrow();
        assert_eq!(calls[0][0], "push");
        assert_eq!(calls[0][1], cert.to_string_lossy());
    }
}
