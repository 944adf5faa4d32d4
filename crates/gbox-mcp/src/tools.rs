//! MCP Tool Types
//!
//! This module defines the parameter types of every device tool. Field names
//! are camelCase on the wire; schemas are derived with schemars and field
//! docs become the argument descriptions clients see.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Common Tools
// =============================================================================

/// Parameters for wait
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WaitParams {
    /// ID of the box
    pub box_id: String,

    /// The duration to wait in milliseconds.
    pub duration: u64,
}

/// Parameters for screenshot
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotParams {
    /// ID of the box
    pub box_id: String,
}

/// Parameters for drag
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DragParams {
    /// ID of the box
    pub box_id: String,

    /// Description of the element to drag (e.g. 'app icon', 'list item').
    /// MUST be detailed enough to identify the element unambiguously.
    pub target: String,

    /// Description of the destination where the element should be dropped
    /// (e.g. 'trash bin at bottom', 'other folder icon').
    pub destination: String,
}

/// Parameters for type
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypeParams {
    /// ID of the box
    pub box_id: String,

    /// The text content to type.
    pub content: String,

    /// Whether to press the Enter key after typing the content. Defaults to false.
    #[serde(default)]
    pub press_enter_after_type: Option<bool>,

    /// If true, replace existing text; if false, append to the end of current
    /// text. Defaults to false.
    #[serde(default)]
    pub replace: Option<bool>,
}

/// Parameters for long_press
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LongPressParams {
    /// ID of the box
    pub box_id: String,

    /// Description of the element to long press (e.g. 'text input field',
    /// 'message bubble', 'app icon').
    pub target: String,

    /// How long to hold the press (e.g. '1s', '500ms', '2s'). Defaults to '1s'.
    /// Supported units: ms, s, m, h.
    #[serde(default)]
    pub duration: Option<String>,
}

// =============================================================================
// Box Startup
// =============================================================================

/// Parameters for start_android_box, start_linux_box and start_browser_box
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartBoxParams {
    /// The ID of the GBOX to start. If not provided, a new GBOX will be created.
    #[serde(default)]
    pub gbox_id: Option<String>,
}

/// Response for the start_*_box tools
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartBoxResponse {
    /// Whether the box is ready
    pub success: bool,

    /// ID of the started box
    pub box_id: String,

    /// URL for watching the box live
    pub live_view_url: String,
}

// =============================================================================
// Android Tools
// =============================================================================

/// Parameters for open_app and close_app
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppParams {
    /// ID of the box
    pub box_id: String,

    /// Android package name, for example: 'com.android.settings'
    pub package_name: String,
}

/// Parameters for install_apk
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallApkParams {
    /// ID of the box
    pub box_id: String,

    /// HTTP(S) URL or path of the APK to install. A `file://` prefix is
    /// stripped.
    pub apk: String,

    /// Whether to open the app after installation.
    #[serde(default)]
    pub open: Option<bool>,
}

/// Hardware buttons on an Android device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum HardwareButton {
    /// Power button
    Power,
    /// Volume up
    VolumeUp,
    /// Volume down
    VolumeDown,
    /// Mute
    VolumeMute,
    /// Home
    Home,
    /// Back
    Back,
    /// Menu
    Menu,
    /// Recent apps
    AppSwitch,
}

/// Parameters for press_button
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PressButtonParams {
    /// ID of the box
    pub box_id: String,

    /// Hardware buttons to press, e.g. ['power'] or ['power', 'volumeUp']
    pub buttons: Vec<HardwareButton>,
}

/// Swipe direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    /// Up
    Up,
    /// Down
    Down,
    /// Left
    Left,
    /// Right
    Right,
}

/// Gesture distance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    /// Tiny
    Tiny,
    /// Short
    Short,
    /// Medium
    #[default]
    Medium,
    /// Long
    Long,
}

impl Distance {
    /// Scroll wheel notches per 400 pixels of screen height.
    pub fn scroll_steps(self) -> i64 {
        match self {
            Distance::Tiny => 1,
            Distance::Short => 3,
            Distance::Medium => 5,
            Distance::Long => 10,
        }
    }
}

/// Parameters for swipe
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwipeParams {
    /// ID of the box
    pub box_id: String,

    /// Direction of the swipe gesture.
    pub direction: SwipeDirection,

    /// Distance of the swipe. Defaults to 'medium'.
    #[serde(default)]
    pub distance: Option<Distance>,

    /// Where on the screen to start the swipe (e.g. 'bottom half').
    /// Defaults to the centre of the screen.
    #[serde(default)]
    pub location: Option<String>,
}

/// Parameters for tap
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TapParams {
    /// ID of the box
    pub box_id: String,

    /// Description of the element to tap (e.g. 'login button', 'search field').
    /// MUST be detailed enough to identify the element unambiguously.
    pub target: String,
}

// =============================================================================
// Desktop Tools
// =============================================================================

/// Mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// Left button
    Left,
    /// Right button
    Right,
    /// Middle button
    Middle,
}

/// Parameters for click
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClickParams {
    /// ID of the box
    pub box_id: String,

    /// Description of the element to click (e.g. 'login button', 'OK button').
    pub target: String,

    /// Mouse button to click. Default is 'left'.
    #[serde(default)]
    pub button: Option<MouseButton>,

    /// Whether to double click. Default is false.
    #[serde(default)]
    pub double: Option<bool>,
}

/// Vertical scroll direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    /// Reveal content above
    Up,
    /// Reveal content below
    Down,
}

/// Parameters for scroll
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrollParams {
    /// ID of the box
    pub box_id: String,

    /// Direction to scroll.
    pub direction: ScrollDirection,

    /// Scroll distance. Default is 'medium'.
    #[serde(default)]
    pub distance: Distance,
}

/// Parameters for open_browser
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenBrowserParams {
    /// ID of the box
    pub box_id: String,
}

/// Parameters for press_key
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PressKeyParams {
    /// ID of the box
    pub box_id: String,

    /// Keys to press together, e.g. ['enter'] or ['control', 'c']
    pub keys: Vec<String>,

    /// Whether to include a screenshot taken after the key press. Default is false.
    #[serde(default)]
    pub include_screenshot: Option<bool>,

    /// Delay before the screenshot, e.g. '500ms' or '2s'. Default is '500ms'.
    #[serde(default)]
    pub screenshot_delay: Option<String>,
}

// =============================================================================
// Browser Tabs
// =============================================================================

/// Parameters for list_tabs
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListTabsParams {
    /// ID of the box
    pub box_id: String,
}

/// Parameters for open_tab
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenTabParams {
    /// ID of the box
    pub box_id: String,

    /// URL to open in the new tab
    pub url: String,
}

/// Parameters for switch_tab and close_tab
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TabParams {
    /// ID of the box
    pub box_id: String,

    /// ID of the tab, as returned by list_tabs
    pub tab_id: String,
}

/// Check a duration string such as `500ms`, `1s`, `2m` or `1h`.
pub fn is_valid_duration(value: &str) -> bool {
    let digits = value.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && matches!(&value[digits..], "ms" | "s" | "m" | "h")
}
