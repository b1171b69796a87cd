//! Scraping of `uiautomator dump` output.
//!
//! The dump is flat enough that a tag scanner is all we need: every on-screen element is a
//! `<node .../>` (or `<node ...>` with children) whose attributes carry everything we match
//! on. Text between tags, comments and the `<?xml ?>` prolog are skipped, as is the
//! "UI hierchary dumped to: /dev/tty" trailer adb appends when dumping to the terminal.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
struct XmlElement {
    tag: String,
    attrs: Vec<(String, String)>,
}

impl XmlElement {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr_name, _)| attr_name == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiNode {
    pub text: Option<String>,
    pub resource_id: Option<String>,
    pub class_name: Option<String>,
    pub content_desc: Option<String>,
    pub bounds: Option<String>,
    pub clickable: bool,
    pub enabled: bool,
}

impl UiNode {
    fn from_element(element: &XmlElement) -> Self {
        let owned = |name: &str| element.attr(name).map(str::to_string);
        Self {
            text: owned("text"),
            resource_id: owned("resource-id"),
            class_name: owned("class"),
            content_desc: owned("content-desc"),
            bounds: owned("bounds"),
            clickable: element.attr("clickable") == Some("true"),
            enabled: element.attr("enabled") == Some("true"),
        }
    }

    pub fn parsed_bounds(&self) -> Option<Bounds> {
        self.bounds.as_deref().and_then(Bounds::parse)
    }

    pub fn to_match(&self) -> ElementMatch<'_> {
        ElementMatch {
            text: self.text.as_deref(),
            resource_id: self.resource_id.as_deref(),
            class_name: self.class_name.as_deref(),
            bounds: self.bounds.as_deref(),
            clickable: flag(self.clickable),
            enabled: flag(self.enabled),
        }
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// One `find_element` hit as reported to the client. Flags keep the dump's string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElementMatch<'a> {
    pub text: Option<&'a str>,
    #[serde(rename = "resource-id")]
    pub resource_id: Option<&'a str>,
    #[serde(rename = "class")]
    pub class_name: Option<&'a str>,
    pub bounds: Option<&'a str>,
    pub clickable: &'static str,
    pub enabled: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

fn bounds_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]$").expect("valid bounds regex")
    })
}

impl Bounds {
    /// Parses the literal `[x1,y1][x2,y2]` form and nothing else.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = bounds_regex().captures(raw.trim())?;
        let value = |index: usize| caps.get(index)?.as_str().parse::<i32>().ok();
        Some(Self {
            left: value(1)?,
            top: value(2)?,
            right: value(3)?,
            bottom: value(4)?,
        })
    }

    pub fn center(&self) -> (i32, i32) {
        (midpoint(self.left, self.right), midpoint(self.top, self.bottom))
    }
}

fn midpoint(a: i32, b: i32) -> i32 {
    // Widened so absurd dump values cannot overflow; the result always fits back in i32.
    ((i64::from(a) + i64::from(b)) / 2) as i32
}

/// Exact-match filter over node attributes. Unset criteria are ignored; a selector with no
/// criteria at all matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UiSelector {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub content_desc: Option<String>,
}

impl UiSelector {
    pub fn by_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.resource_id.is_none()
            && self.class_name.is_none()
            && self.content_desc.is_none()
    }

    pub fn matches(&self, node: &UiNode) -> bool {
        if self.is_empty() {
            return false;
        }
        criterion_matches(&self.text, &node.text)
            && criterion_matches(&self.resource_id, &node.resource_id)
            && criterion_matches(&self.class_name, &node.class_name)
            && criterion_matches(&self.content_desc, &node.content_desc)
    }
}

fn criterion_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual.as_deref() == Some(wanted.as_str()),
    }
}

pub fn find_matching<'a>(nodes: &'a [UiNode], selector: &UiSelector) -> Vec<&'a UiNode> {
    nodes.iter().filter(|node| selector.matches(node)).collect()
}

pub fn parse_ui_nodes(xml: &str) -> Result<Vec<UiNode>, String> {
    if xml.trim().is_empty() {
        return Err("UI dump is empty".to_string());
    }
    let elements = scan_elements(xml)?;
    if elements.is_empty() {
        return Err("UI dump contains no elements".to_string());
    }
    Ok(elements
        .iter()
        .filter(|element| element.tag == "node")
        .map(UiNode::from_element)
        .collect())
}

fn scan_elements(xml: &str) -> Result<Vec<XmlElement>, String> {
    let bytes = xml.as_bytes();
    let mut index: usize = 0;
    let mut elements = Vec::new();

    while index < bytes.len() {
        if bytes[index] != b'<' {
            index += 1;
            continue;
        }
        if index + 1 >= bytes.len() {
            break;
        }
        match bytes[index + 1] {
            b'/' => {
                index += 2;
                while index < bytes.len() && bytes[index] != b'>' {
                    index += 1;
                }
                index = (index + 1).min(bytes.len());
            }
            b'!' => {
                index += 2;
                while index + 2 < bytes.len()
                    && !(bytes[index] == b'-' && bytes[index + 1] == b'-' && bytes[index + 2] == b'>')
                {
                    index += 1;
                }
                index = (index + 3).min(bytes.len());
            }
            b'?' => {
                index += 2;
                while index + 1 < bytes.len() && !(bytes[index] == b'?' && bytes[index + 1] == b'>')
                {
                    index += 1;
                }
                index = (index + 2).min(bytes.len());
            }
            _ => {
                let (element, next) = scan_start_tag(xml, index + 1)?;
                elements.push(element);
                index = next;
            }
        }
    }

    Ok(elements)
}

/// Scans a start tag beginning at `start` (just past `<`). Returns the element and the
/// index just past its closing `>`.
fn scan_start_tag(xml: &str, start: usize) -> Result<(XmlElement, usize), String> {
    let bytes = xml.as_bytes();
    let mut cursor = start;
    while cursor < bytes.len() {
        let ch = bytes[cursor];
        if ch == b'/' || ch == b'>' || ch.is_ascii_whitespace() {
            break;
        }
        cursor += 1;
    }
    if cursor == start {
        return Err("Malformed XML tag".to_string());
    }
    let tag = xml[start..cursor].to_string();
    let mut attrs: Vec<(String, String)> = Vec::new();

    loop {
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return Err(format!("Unterminated <{tag}> tag"));
        }
        match bytes[cursor] {
            b'>' => {
                cursor += 1;
                break;
            }
            b'/' => {
                cursor += 1;
                if cursor < bytes.len() && bytes[cursor] == b'>' {
                    cursor += 1;
                }
                break;
            }
            _ => {}
        }

        let name_start = cursor;
        while cursor < bytes.len() && bytes[cursor] != b'=' && !bytes[cursor].is_ascii_whitespace()
        {
            cursor += 1;
        }
        let name_end = cursor;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() || bytes[cursor] != b'=' {
            return Err(format!(
                "Malformed attribute assignment for '{}'",
                &xml[name_start..name_end]
            ));
        }
        cursor += 1;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return Err("Missing attribute value".to_string());
        }
        let quote = bytes[cursor];
        if quote != b'"' && quote != b'\'' {
            return Err("Attribute value must be quoted".to_string());
        }
        cursor += 1;
        let value_start = cursor;
        while cursor < bytes.len() && bytes[cursor] != quote {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return Err("Unterminated attribute value".to_string());
        }
        let name = xml[name_start..name_end].to_string();
        let value = unescape_xml(&xml[value_start..cursor]);
        attrs.push((name, value));
        cursor += 1;
    }

    Ok((XmlElement { tag, attrs }, cursor))
}

/// Decodes the five predefined entities and numeric character references. Anything that
/// does not parse as an entity is kept literally.
pub fn unescape_xml(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        output.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            }?;
            Some((ch, semi + 1))
        });
        match decoded {
            Some((ch, consumed)) => {
                output.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                output.push('&');
                rest = &tail[1..];
            }
        }
    }
    output.push_str(rest);
    output
}
