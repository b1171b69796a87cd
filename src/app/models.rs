use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSummary {
    pub serial: String,
    pub state: String,
    /// Everything after the state column of `adb devices -l`, verbatim.
    pub info: String,
    pub model: Option<String>,
}

impl DeviceSummary {
    pub fn is_online(&self) -> bool {
        self.state == "device"
    }
}

/// Properties reported by `get_device_info`; keys match the getprop names.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceProperties {
    #[serde(rename = "ro.product.model", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "ro.build.version.release", skip_serializing_if = "Option::is_none")]
    pub android_version: Option<String>,
    #[serde(rename = "ro.build.version.sdk", skip_serializing_if = "Option::is_none")]
    pub api_level: Option<String>,
    #[serde(rename = "ro.product.cpu.abi", skip_serializing_if = "Option::is_none")]
    pub cpu_abi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_size: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// Result of a tool call as sent back in a `tools/call` response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: true,
        }
    }

    pub fn with_image(mut self, data: String, mime_type: &str) -> Self {
        self.content.push(ToolContent::Image {
            data,
            mime_type: mime_type.to_string(),
        });
        self
    }

    /// First text block, which is where every handler puts its message.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ToolContent::Text { text } => Some(text.as_str()),
            ToolContent::Image { .. } => None,
        })
    }
}
