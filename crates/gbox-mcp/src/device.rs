//! Device-automation client for Gbox boxes.
//!
//! A thin REST client over the Gbox API. Every session owns one
//! [`GboxClient`], built from the configured [`DeviceSettings`] and, in HTTP
//! mode, the caller's own [`ClientOptions`].

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use gbox_mcp_core::{DeviceSettings, Error, Result};

/// Longest screen edge, in pixels, that actions are scaled down to.
pub const MAX_SCREEN_LENGTH: u32 = 1784;

/// Connection options supplied by a client when its session is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// API key sent as a bearer token
    pub api_key: Option<String>,

    /// Override for the API base URL
    pub base_url: Option<String>,
}

impl ClientOptions {
    /// Options carrying only an API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: None,
        }
    }
}

/// Kind of box to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    /// Android device
    Android,
    /// Linux desktop
    Linux,
}

impl BoxKind {
    fn path(self) -> &'static str {
        match self {
            BoxKind::Android => "android",
            BoxKind::Linux => "linux",
        }
    }
}

/// Box metadata returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct BoxInfo {
    /// Box ID
    pub id: String,

    /// Box type (`android` or `linux`)
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: Option<String>,
}

/// Screen resolution of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Scale factor that fits the screen within [`MAX_SCREEN_LENGTH`].
    ///
    /// Never scales up.
    pub fn resize_ratio(&self) -> f64 {
        let max = f64::from(MAX_SCREEN_LENGTH);
        let ratio = (max / f64::from(self.width.max(1))).min(max / f64::from(self.height.max(1)));
        ratio.min(1.0)
    }
}

/// Base64 image payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
}

impl ImageData {
    /// Decode a screenshot URI.
    ///
    /// `data:<mime>;base64,<payload>` URIs are split; anything else is taken
    /// to be a bare PNG payload.
    pub fn from_uri(uri: &str) -> Self {
        if let Some(rest) = uri.strip_prefix("data:") {
            if let Some((mime_type, data)) = rest.split_once(";base64,") {
                if !mime_type.is_empty() {
                    return Self {
                        mime_type: mime_type.to_string(),
                        data: data.to_string(),
                    };
                }
            }
        }

        Self {
            mime_type: "image/png".to_string(),
            data: uri.to_string(),
        }
    }

    /// Extract the post-action screenshot from an action result, if any.
    pub fn from_action_result(result: &Value) -> Option<Self> {
        result
            .pointer("/screenshot/after/uri")
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
            .map(Self::from_uri)
    }
}

/// Screenshot options asking for a base64 capture after the action.
pub fn screenshot_after(delay: &str) -> Value {
    json!({
        "screenshot": {
            "phases": ["after"],
            "outputFormat": "base64",
            "delay": delay,
        }
    })
}

/// REST client for the Gbox API.
#[derive(Debug, Clone)]
pub struct GboxClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GboxClient {
    /// Build a client from configured defaults, overridden by `options`.
    pub fn new(settings: &DeviceSettings, options: Option<ClientOptions>) -> Result<Self> {
        let options = options.unwrap_or_default();
        let base_url = options
            .base_url
            .unwrap_or_else(|| settings.base_url.clone())
            .trim_end_matches('/')
            .to_string();
        let api_key = options.api_key.or_else(|| settings.api_key.clone());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| Error::DeviceClient(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// API base URL in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether requests carry a bearer token.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        trace!("Gbox API request: {} {}", method, url);

        let mut request = self.http.request(method.clone(), &url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::DeviceClient(format!("{method} {path} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::DeviceClient(format!("{method} {path} failed: {e}")))?;

        if !status.is_success() {
            debug!("Gbox API error: {} {} -> {}", method, path, status);
            return Err(Error::DeviceClient(format!(
                "{method} {path} returned {status}: {text}"
            )));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.send(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    // =========================================================================
    // Boxes
    // =========================================================================

    /// Create a box and wait until it is running.
    pub async fn create_box(&self, kind: BoxKind, config: Value) -> Result<BoxInfo> {
        let value = self
            .post(
                &format!("/boxes/{}", kind.path()),
                json!({ "config": config, "wait": true }),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetch an existing box.
    pub async fn get_box(&self, box_id: &str) -> Result<BoxInfo> {
        let value = self.get(&format!("/boxes/{box_id}")).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Live-view URL for watching the box.
    pub async fn live_view_url(&self, box_id: &str) -> Result<String> {
        let value = self.get(&format!("/boxes/{box_id}/live-view-url")).await?;
        value
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::DeviceClient("Live view response has no url".to_string()))
    }

    /// Display resolution of the box.
    pub async fn display(&self, box_id: &str) -> Result<Resolution> {
        let value = self.get(&format!("/boxes/{box_id}/display")).await?;
        let resolution = value.get("resolution").cloned().unwrap_or(value);
        Ok(serde_json::from_value(resolution)?)
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Run a UI action such as `tap`, `click` or `long-press`.
    pub async fn action(&self, box_id: &str, action: &str, body: Value) -> Result<Value> {
        debug!("Running action: box_id={}, action={}", box_id, action);
        self.post(&format!("/boxes/{box_id}/actions/{action}"), body)
            .await
    }

    /// Capture the current screen.
    pub async fn screenshot(&self, box_id: &str) -> Result<ImageData> {
        let value = self
            .action(box_id, "screenshot", json!({ "outputFormat": "base64" }))
            .await?;
        value
            .get("uri")
            .and_then(Value::as_str)
            .map(ImageData::from_uri)
            .ok_or_else(|| Error::DeviceClient("Screenshot response has no uri".to_string()))
    }

    /// Set the scale applied to action coordinates.
    pub async fn update_action_settings(&self, box_id: &str, scale: f64) -> Result<()> {
        self.send(
            reqwest::Method::PUT,
            &format!("/boxes/{box_id}/actions/settings"),
            Some(json!({ "scale": scale })),
        )
        .await?;
        Ok(())
    }

    // =========================================================================
    // Browser
    // =========================================================================

    /// Open the desktop browser.
    pub async fn open_browser(&self, box_id: &str, maximize: bool, show_controls: bool) -> Result<()> {
        self.post(
            &format!("/boxes/{box_id}/browser/open"),
            json!({ "maximize": maximize, "showControls": show_controls }),
        )
        .await?;
        Ok(())
    }

    /// List open browser tabs.
    pub async fn list_tabs(&self, box_id: &str) -> Result<Value> {
        self.get(&format!("/boxes/{box_id}/browser/tabs")).await
    }

    /// Open a tab and return the new tab's ID.
    pub async fn open_tab(&self, box_id: &str, url: &str) -> Result<String> {
        let value = self
            .post(&format!("/boxes/{box_id}/browser/tabs"), json!({ "url": url }))
            .await?;
        match value.get("id") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(id) => Ok(id.to_string()),
            None => Err(Error::DeviceClient("Open tab response has no id".to_string())),
        }
    }

    /// Activate a tab.
    pub async fn switch_tab(&self, box_id: &str, tab_id: &str) -> Result<()> {
        self.post(
            &format!("/boxes/{box_id}/browser/tabs/{tab_id}/switch"),
            json!({}),
        )
        .await?;
        Ok(())
    }

    /// Close a tab.
    pub async fn close_tab(&self, box_id: &str, tab_id: &str) -> Result<()> {
        self.send(
            reqwest::Method::DELETE,
            &format!("/boxes/{box_id}/browser/tabs/{tab_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    // =========================================================================
    // Android apps
    // =========================================================================

    /// Launch an installed package.
    pub async fn open_app(&self, box_id: &str, package_name: &str) -> Result<()> {
        self.post(
            &format!("/boxes/{box_id}/android/packages/{package_name}/open"),
            json!({}),
        )
        .await?;
        Ok(())
    }

    /// Stop a running package.
    pub async fn close_app(&self, box_id: &str, package_name: &str) -> Result<()> {
        self.post(
            &format!("/boxes/{box_id}/android/packages/{package_name}/close"),
            json!({}),
        )
        .await?;
        Ok(())
    }

    /// Install an APK from a URL or path and return the package metadata.
    pub async fn install_apk(&self, box_id: &str, apk: &str, open: bool) -> Result<Value> {
        self.post(
            &format!("/boxes/{box_id}/android/packages"),
            json!({ "apk": apk, "open": open }),
        )
        .await
    }
}
