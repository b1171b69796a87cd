use std::sync::OnceLock;

use regex::Regex;

use crate::app::models::DeviceSummary;

pub fn parse_adb_devices(output: &str) -> Vec<DeviceSummary> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let model = tokens
                .iter()
                .skip(2)
                .find_map(|token| token.strip_prefix("model:"))
                .map(str::to_string);
            Some(DeviceSummary {
                serial: tokens[0].to_string(),
                state: tokens[1].to_string(),
                info: tokens[2..].join(" "),
                model,
            })
        })
        .collect()
}

fn wm_size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)x(\d+)").expect("valid wm size regex"))
}

/// `wm size` prints "Physical size: 1080x2400" and, when overridden, a second
/// "Override size" line; the last reported size is the one in effect.
pub fn parse_wm_size(output: &str) -> Option<(u32, u32)> {
    wm_size_regex()
        .captures_iter(output)
        .filter_map(|caps| {
            let width = caps.get(1)?.as_str().parse().ok()?;
            let height = caps.get(2)?.as_str().parse().ok()?;
            Some((width, height))
        })
        .last()
}

pub fn parse_package_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.strip_prefix("package:").unwrap_or(line).to_string())
        .collect()
}

/// Version number from `adb version`, e.g. "1.0.41".
pub fn parse_adb_version(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Android Debug Bridge version")
            .map(|rest| rest.trim().to_string())
            .filter(|version| !version.is_empty())
    })
}
