use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKey {
    Back,
    Home,
    Recent,
    Menu,
    Power,
    VolumeUp,
    VolumeDown,
}

impl SystemKey {
    pub const ALL: [SystemKey; 7] = [
        SystemKey::Back,
        SystemKey::Home,
        SystemKey::Recent,
        SystemKey::Menu,
        SystemKey::Power,
        SystemKey::VolumeUp,
        SystemKey::VolumeDown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SystemKey::Back => "back",
            SystemKey::Home => "home",
            SystemKey::Recent => "recent",
            SystemKey::Menu => "menu",
            SystemKey::Power => "power",
            SystemKey::VolumeUp => "volume_up",
            SystemKey::VolumeDown => "volume_down",
        }
    }

    /// Android `KeyEvent` code passed to `input keyevent`.
    pub fn key_code(self) -> u32 {
        match self {
            SystemKey::Back => 4,
            SystemKey::Home => 3,
            SystemKey::Recent => 187,
            SystemKey::Menu => 82,
            SystemKey::Power => 26,
            SystemKey::VolumeUp => 24,
            SystemKey::VolumeDown => 25,
        }
    }
}

impl FromStr for SystemKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SystemKey::ALL
            .into_iter()
            .find(|key| key.name() == value)
            .ok_or_else(|| format!("Unknown key: {value}"))
    }
}

impl fmt::Display for SystemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
