//! Target platforms and the tool table for each of them.
//!
//! Every protocol server is bound to exactly one platform. The platform decides
//! which device tools the server exposes: a fixed common subset plus a
//! platform-specific subset, both listed here as plain tables so the selection
//! is a lookup rather than a branch cascade.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// Tools every platform exposes.
pub const COMMON_TOOLS: &[&str] = &["wait", "screenshot", "drag", "type", "long_press"];

/// Tools specific to Android boxes.
pub const ANDROID_TOOLS: &[&str] = &[
    "start_android_box",
    "open_app",
    "close_app",
    "install_apk",
    "press_button",
    "swipe",
    "tap",
];

/// Tools specific to Linux desktop boxes.
pub const LINUX_TOOLS: &[&str] = &[
    "start_linux_box",
    "click",
    "scroll",
    "open_browser",
    "press_key",
];

/// Tools specific to browser boxes.
pub const BROWSER_TOOLS: &[&str] = &[
    "start_browser_box",
    "click",
    "scroll",
    "press_key",
    "list_tabs",
    "open_tab",
    "switch_tab",
    "close_tab",
];

/// Kind of remote device a server drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Android box (virtual or physical device)
    Android,
    /// Linux desktop box
    Linux,
    /// Browser-only box
    Browser,
}

impl Platform {
    /// All supported platforms.
    pub const ALL: [Platform; 3] = [Platform::Android, Platform::Linux, Platform::Browser];

    /// Get the platform name as used in routes and server names.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Linux => "linux",
            Platform::Browser => "browser",
        }
    }

    /// Tools specific to this platform, excluding the common subset.
    pub fn specific_tools(&self) -> &'static [&'static str] {
        match self {
            Platform::Android => ANDROID_TOOLS,
            Platform::Linux => LINUX_TOOLS,
            Platform::Browser => BROWSER_TOOLS,
        }
    }

    /// Every tool a server for this platform exposes.
    pub fn tool_names(&self) -> impl Iterator<Item = &'static str> {
        COMMON_TOOLS
            .iter()
            .chain(self.specific_tools().iter())
            .copied()
    }

    /// Check whether a tool belongs to this platform's table.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tool_names().any(|tool| tool == name)
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "linux" => Ok(Platform::Linux),
            "browser" => Ok(Platform::Browser),
            _ => Err(Error::UnsupportedPlatform(s.to_string())),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
