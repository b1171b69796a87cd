use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::app::adb::runner::run_command_with_timeout;

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|candidate| candidate.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

pub fn validate_adb_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("ADB command is empty".to_string());
    }
    if program == "adb" {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err("ADB path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err("ADB executable not found at the configured path".to_string());
    }
    Ok(())
}

/// `adb` on PATH first, then the default SDK install locations.
pub fn candidate_programs() -> Vec<String> {
    let mut candidates = vec!["adb".to_string()];
    if let Some(home) = dirs::home_dir() {
        for sdk in ["Android/Sdk", "Library/Android/sdk"] {
            let path: PathBuf = home.join(sdk).join("platform-tools").join("adb");
            candidates.push(path.to_string_lossy().to_string());
        }
    }
    candidates.push("/usr/local/bin/adb".to_string());
    candidates
}

/// Picks the adb program. A configured path wins outright; otherwise the first candidate
/// for which `probe` succeeds, falling back to plain `adb`.
pub fn resolve_adb_program_with(
    configured: &str,
    candidates: &[String],
    probe: impl Fn(&str) -> bool,
) -> String {
    let normalized = normalize_command_path(configured);
    if !normalized.is_empty() {
        if let Err(reason) = validate_adb_program(&normalized) {
            warn!(program = %normalized, reason = %reason, "configured adb may not run");
        }
        return normalized;
    }
    for candidate in candidates {
        if probe(candidate) {
            info!(program = %candidate, "found adb");
            return candidate.clone();
        }
    }
    warn!("adb not found in standard locations");
    "adb".to_string()
}

pub fn resolve_adb_program(configured: &str, probe_timeout: Duration, trace_id: &str) -> String {
    let version_args = vec!["version".to_string()];
    resolve_adb_program_with(configured, &candidate_programs(), |candidate| {
        run_command_with_timeout(candidate, &version_args, probe_timeout, trace_id)
            .map(|output| output.success())
            .unwrap_or(false)
    })
}
