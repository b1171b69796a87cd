/// The device every device-scoped tool talks to. Selection is not validated; a bad serial
/// surfaces as adb's own error on the next call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSession {
    serial: Option<String>,
}

impl DeviceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serial(serial: Option<String>) -> Self {
        Self {
            serial: serial.filter(|value| !value.trim().is_empty()),
        }
    }

    pub fn select(&mut self, serial: impl Into<String>) {
        self.serial = Some(serial.into());
    }

    pub fn current(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// `adb` arguments with `-s <serial>` in front when a device is selected.
    pub fn command_args(&self, args: &[String]) -> Vec<String> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(serial) = &self.serial {
            full.push("-s".to_string());
            full.push(serial.clone());
        }
        full.extend_from_slice(args);
        full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_then_current_round_trips() {
        let mut session = DeviceSession::new();
        assert_eq!(session.current(), None);
        for serial in ["emulator-5554", "192.168.1.20:5555", "R58M 12"] {
            session.select(serial);
            assert_eq!(session.current(), Some(serial));
        }
    }

    #[test]
    fn select_overwrites_previous_serial() {
        let mut session = DeviceSession::new();
        session.select("a");
        session.select("b");
        assert_eq!(session.current(), Some("b"));
    }

    #[test]
    fn command_args_prefixes_serial_only_when_selected() {
        let args = vec!["shell".to_string(), "wm".to_string(), "size".to_string()];
        assert_eq!(DeviceSession::new().command_args(&args), args);

        let session = DeviceSession::with_serial(Some("emulator-5554".to_string()));
        assert_eq!(
            session.command_args(&args),
            vec!["-s", "emulator-5554", "shell", "wm", "size"]
        );
    }

    #[test]
    fn with_serial_ignores_blank() {
        assert_eq!(DeviceSession::with_serial(Some("  ".to_string())).current(), None);
    }
}
