//! Device MCP Server Implementation
//!
//! This module implements the MCP server using rmcp 0.9's #[tool_router] pattern.
//! Tools are declared in per-platform groups and the combined router is then
//! narrowed to exactly the tool table of the server's platform.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use rmcp::{
    handler::server::{
        router::{prompt::PromptRouter, tool::ToolRouter},
        wrapper::Parameters,
    },
    model::*,
    prompt, prompt_handler, prompt_router,
    service::{RequestContext, RoleServer},
    tool, tool_handler, tool_router, ErrorData as McpError,
};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use gbox_mcp_core::{McpLogger, Platform};

use crate::device::{screenshot_after, BoxKind, GboxClient, ImageData};
use crate::protocol::factory::ServerDescriptor;
use crate::protocol::prompts::{GBOX_MANUAL_DESCRIPTION, GBOX_MANUAL_TEXT};
use crate::tools::*;

const ACTION_SCREENSHOT_DELAY: &str = "500ms";

fn image(image: ImageData) -> Content {
    Content::image(image.data, image.mime_type)
}

fn lowercase(value: impl std::fmt::Debug) -> String {
    format!("{value:?}").to_lowercase()
}

/// Device MCP Server
///
/// One instance per session. Executes tool calls against the session's
/// device client and reports through the session's logger.
#[derive(Clone)]
pub struct DeviceMcpServer {
    /// Advertised implementation name
    name: String,
    /// Logical configuration this server was built from
    descriptor: Arc<ServerDescriptor>,
    /// Device-automation client
    client: Arc<GboxClient>,
    /// Session logger
    logger: McpLogger,
    /// Tool router, narrowed to the platform's tool table
    tool_router: ToolRouter<Self>,
    /// Prompt router
    prompt_router: PromptRouter<Self>,
}

impl DeviceMcpServer {
    pub(crate) fn new(
        name: String,
        descriptor: Arc<ServerDescriptor>,
        client: Arc<GboxClient>,
        logger: McpLogger,
    ) -> Self {
        let platform = descriptor.platform;
        Self {
            name,
            descriptor,
            client,
            logger,
            tool_router: Self::platform_tools(platform),
            prompt_router: Self::prompt_router(),
        }
    }

    fn platform_tools(platform: Platform) -> ToolRouter<Self> {
        let mut router = Self::common_tools()
            + match platform {
                Platform::Android => Self::android_tools(),
                Platform::Linux => Self::linux_tools() + Self::pointer_tools(),
                Platform::Browser => Self::browser_tools() + Self::pointer_tools(),
            };
        router.map.retain(|name, _| platform.has_tool(name));
        router
    }

    /// Advertised implementation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Platform served.
    pub fn platform(&self) -> Platform {
        self.descriptor.platform
    }

    /// Session logger.
    pub fn logger(&self) -> &McpLogger {
        &self.logger
    }

    /// Names of the tools attached to this server.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        names
    }

    /// Names of the prompts attached to this server.
    pub fn prompt_names(&self) -> Vec<String> {
        self.prompt_router
            .list_all()
            .into_iter()
            .map(|prompt| prompt.name)
            .collect()
    }

    fn instructions(&self) -> String {
        let start = match self.platform() {
            Platform::Android => "start_android_box",
            Platform::Linux => "start_linux_box",
            Platform::Browser => "start_browser_box",
        };
        format!(
            "Gbox {platform} automation server. Call {start} first to create or attach a box, \
             then pass the returned boxId to every other tool. Actions return a screenshot \
             taken after they complete. See the gbox-manual prompt for a full guide.",
            platform = self.platform(),
        )
    }

    /// Log a failure and turn it into an error tool result.
    fn failure(&self, message: &str, data: Value, error: impl Display) -> CallToolResult {
        let mut data = data;
        if let Value::Object(map) = &mut data {
            map.insert("error".to_string(), Value::String(error.to_string()));
        }
        self.logger.error(message, data);
        CallToolResult::error(vec![Content::text(format!("Error: {error}"))])
    }

    /// Run a UI action and return its text plus the post-action screenshot.
    async fn run_action(
        &self,
        box_id: &str,
        action: &str,
        body: Value,
        success: impl Into<String>,
        failure: &str,
    ) -> CallToolResult {
        match self.client.action(box_id, action, body).await {
            Ok(result) => {
                let mut content = vec![Content::text(success.into())];
                if let Some(screenshot) = ImageData::from_action_result(&result) {
                    content.push(image(screenshot));
                }
                CallToolResult::success(content)
            }
            Err(e) => self.failure(failure, json!({ "boxId": box_id }), e),
        }
    }

    /// Pause, then return `text` with a fresh screenshot.
    async fn settle_and_capture(&self, box_id: &str, delay: Duration, text: String) -> CallToolResult {
        tokio::time::sleep(delay).await;
        match self.client.screenshot(box_id).await {
            Ok(screenshot) => CallToolResult::success(vec![Content::text(text), image(screenshot)]),
            Err(e) => self.failure(
                "Failed to capture screenshot",
                json!({ "boxId": box_id }),
                e,
            ),
        }
    }

    async fn start_box(
        &self,
        kind: BoxKind,
        gbox_id: Option<String>,
        open_browser: bool,
    ) -> Result<StartBoxResponse, gbox_mcp_core::Error> {
        let box_id = match gbox_id {
            Some(id) => self.client.get_box(&id).await?.id,
            None => {
                let config = match kind {
                    BoxKind::Android => json!({ "deviceType": "virtual" }),
                    BoxKind::Linux => json!({}),
                };
                let created = self.client.create_box(kind, config).await?;
                self.logger
                    .info("GBOX created successfully", json!({ "boxId": created.id }));

                if kind == BoxKind::Android {
                    let resolution = self.client.display(&created.id).await?;
                    self.client
                        .update_action_settings(&created.id, resolution.resize_ratio())
                        .await?;
                }
                created.id
            }
        };

        if open_browser {
            self.logger
                .info("Opening browser maximized", json!({ "boxId": box_id }));
            self.client.open_browser(&box_id, true, false).await?;
        }

        let live_view_url = self.client.live_view_url(&box_id).await?;
        self.logger.info(
            "GBOX started successfully",
            json!({ "boxId": box_id, "liveViewUrl": live_view_url }),
        );

        Ok(StartBoxResponse {
            success: true,
            box_id,
            live_view_url,
        })
    }

    async fn start_box_tool(
        &self,
        kind: BoxKind,
        params: StartBoxParams,
        open_browser: bool,
        failure: &str,
    ) -> Result<CallToolResult, McpError> {
        self.logger.info(
            "Starting box",
            json!({ "gboxId": params.gbox_id, "platform": self.platform() }),
        );

        match self.start_box(kind, params.gbox_id.clone(), open_browser).await {
            Ok(response) => Ok(CallToolResult::success(vec![Content::text(
                serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.box_id.clone()),
            )])),
            Err(e) => Ok(self.failure(failure, json!({ "gboxId": params.gbox_id }), e)),
        }
    }
}

// =============================================================================
// Common tools
// =============================================================================

#[tool_router(router = common_tools)]
impl DeviceMcpServer {
    /// Wait, then screenshot
    #[tool(
        description = "Waits for a specified duration before next action. Useful when you need to wait for something to load or for an action to complete."
    )]
    #[instrument(skip_all)]
    async fn wait(
        &self,
        Parameters(params): Parameters<WaitParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.duration == 0 {
            return Err(McpError::invalid_params(
                "duration must be a positive number of milliseconds",
                None,
            ));
        }

        tokio::time::sleep(Duration::from_millis(params.duration)).await;

        match self.client.screenshot(&params.box_id).await {
            Ok(screenshot) => {
                let message = format!("Finished waiting for {}ms.", params.duration);
                self.logger.info(message.clone(), json!({ "boxId": params.box_id }));
                Ok(CallToolResult::success(vec![
                    Content::text(message),
                    image(screenshot),
                ]))
            }
            Err(e) => {
                self.logger.error(
                    "Failed to capture screenshot after wait",
                    json!({ "boxId": params.box_id, "error": e.to_string() }),
                );
                Ok(CallToolResult::error(vec![
                    Content::text(format!(
                        "Finished waiting for {}ms, but failed to capture screenshot.",
                        params.duration
                    )),
                    Content::text(format!("Error: {e}")),
                ]))
            }
        }
    }

    /// Capture the screen
    #[tool(description = "Take a screenshot of the current display for a given box.")]
    #[instrument(skip_all)]
    async fn screenshot(
        &self,
        Parameters(params): Parameters<ScreenshotParams>,
    ) -> Result<CallToolResult, McpError> {
        self.logger
            .info("Taking screenshot", json!({ "boxId": params.box_id }));

        match self.client.screenshot(&params.box_id).await {
            Ok(screenshot) => {
                self.logger
                    .info("Screenshot taken successfully", json!({ "boxId": params.box_id }));
                Ok(CallToolResult::success(vec![image(screenshot)]))
            }
            Err(e) => Ok(self.failure(
                "Failed to take screenshot",
                json!({ "boxId": params.box_id }),
                e,
            )),
        }
    }

    #[tool(
        description = "Drag a UI element by long-pressing and moving it to a new location, for example reorganising home-screen icons or moving an item into a folder."
    )]
    async fn drag(
        &self,
        Parameters(params): Parameters<DragParams>,
    ) -> Result<CallToolResult, McpError> {
        self.logger.info(
            "Drag command invoked",
            json!({ "boxId": params.box_id, "target": params.target, "destination": params.destination }),
        );

        let body = json!({
            "start": params.target,
            "end": params.destination,
            "options": screenshot_after(ACTION_SCREENSHOT_DELAY),
        });
        Ok(self
            .run_action(&params.box_id, "drag", body, "Drag action completed successfully", "Failed to run drag action")
            .await)
    }

    #[tool(
        name = "type",
        description = "Type text content into the currently focused input. Optionally press Enter after typing, and choose to replace or append."
    )]
    async fn type_text(
        &self,
        Parameters(params): Parameters<TypeParams>,
    ) -> Result<CallToolResult, McpError> {
        let press_enter = params.press_enter_after_type.unwrap_or(false);
        let replace = params.replace.unwrap_or(false);
        self.logger.info(
            "Typing content",
            json!({
                "boxId": params.box_id,
                "length": params.content.chars().count(),
                "pressEnterAfterType": press_enter,
                "replace": replace,
            }),
        );

        let body = json!({
            "text": params.content,
            "pressEnter": press_enter,
            "mode": if replace { "replace" } else { "append" },
            "options": screenshot_after(ACTION_SCREENSHOT_DELAY),
        });
        Ok(self
            .run_action(&params.box_id, "type", body, "Text typed successfully", "Failed to type content")
            .await)
    }

    #[tool(
        description = "Perform a long press (press and hold) on a UI element. Useful for triggering context menus, selecting text, or initiating drag operations."
    )]
    async fn long_press(
        &self,
        Parameters(params): Parameters<LongPressParams>,
    ) -> Result<CallToolResult, McpError> {
        let duration = params.duration.unwrap_or_else(|| "1s".to_string());
        if !is_valid_duration(&duration) {
            return Err(McpError::invalid_params(
                "Invalid duration format. Must be a number followed by 'ms', 's', 'm', or 'h'.",
                None,
            ));
        }

        self.logger.info(
            "Long press command invoked",
            json!({ "boxId": params.box_id, "target": params.target, "duration": duration }),
        );

        let body = json!({
            "target": params.target,
            "duration": duration,
            "options": screenshot_after(ACTION_SCREENSHOT_DELAY),
        });
        Ok(self
            .run_action(
                &params.box_id,
                "long-press",
                body,
                "Long press action completed successfully",
                "Failed to run long press action",
            )
            .await)
    }
}

// =============================================================================
// Android tools
// =============================================================================

#[tool_router(router = android_tools)]
impl DeviceMcpServer {
    #[tool(
        description = "Start a GBOX(Android) by the given ID. If the GBOX ID is not provided, a new GBOX will be created. MUST call this tool first when starting a task."
    )]
    #[instrument(skip_all)]
    async fn start_android_box(
        &self,
        Parameters(params): Parameters<StartBoxParams>,
    ) -> Result<CallToolResult, McpError> {
        self.start_box_tool(BoxKind::Android, params, false, "Failed to start Android box")
            .await
    }

    #[tool(description = "Launch an installed application by package name on the Android box.")]
    async fn open_app(
        &self,
        Parameters(params): Parameters<AppParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = json!({ "boxId": params.box_id, "packageName": params.package_name });
        self.logger.info("Opening app", data.clone());

        if let Err(e) = self.client.open_app(&params.box_id, &params.package_name).await {
            return Ok(self.failure("Failed to open app", data, e));
        }
        self.logger.info("App opened successfully", data);

        let text = json!({ "packageName": params.package_name, "status": "opened" }).to_string();
        Ok(self
            .settle_and_capture(&params.box_id, Duration::from_secs(1), text)
            .await)
    }

    #[tool(description = "Close an installed application by package name on the Android box.")]
    async fn close_app(
        &self,
        Parameters(params): Parameters<AppParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = json!({ "boxId": params.box_id, "packageName": params.package_name });
        self.logger.info("Closing app", data.clone());

        match self.client.close_app(&params.box_id, &params.package_name).await {
            Ok(()) => {
                self.logger.info("App closed successfully", data);
                Ok(CallToolResult::success(vec![Content::text(
                    json!({ "packageName": params.package_name, "status": "closed" }).to_string(),
                )]))
            }
            Err(e) => Ok(self.failure("Failed to close app", data, e)),
        }
    }

    #[tool(description = "Install an APK file into the Gbox Android box.")]
    #[instrument(skip_all)]
    async fn install_apk(
        &self,
        Parameters(params): Parameters<InstallApkParams>,
    ) -> Result<CallToolResult, McpError> {
        let apk = params
            .apk
            .strip_prefix("file://")
            .unwrap_or(&params.apk)
            .to_string();
        let data = json!({ "boxId": params.box_id, "apk": apk });
        self.logger.info("Installing APK", data.clone());

        let installed = match self
            .client
            .install_apk(&params.box_id, &apk, params.open.unwrap_or(false))
            .await
        {
            Ok(installed) => installed,
            Err(e) => return Ok(self.failure("Failed to install APK", data, e)),
        };
        self.logger.info("APK installed successfully", data);

        let text = serde_json::to_string_pretty(&installed).unwrap_or_else(|_| installed.to_string());
        Ok(self
            .settle_and_capture(&params.box_id, Duration::from_secs(3), text)
            .await)
    }

    #[tool(
        description = "Press device hardware buttons such as power or volume controls. Use this to simulate hardware button presses on the Android device."
    )]
    async fn press_button(
        &self,
        Parameters(params): Parameters<PressButtonParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.buttons.is_empty() {
            return Err(McpError::invalid_params("buttons must not be empty", None));
        }

        self.logger.info(
            "Pressing buttons",
            json!({ "boxId": params.box_id, "buttons": params.buttons }),
        );

        let body = json!({
            "buttons": params.buttons,
            "options": screenshot_after(ACTION_SCREENSHOT_DELAY),
        });
        Ok(self
            .run_action(&params.box_id, "press-button", body, "Button pressed successfully", "Failed to press buttons")
            .await)
    }

    #[tool(
        description = "Perform a swipe gesture on the Android device. Useful for navigating carousels or moving between screens."
    )]
    async fn swipe(
        &self,
        Parameters(params): Parameters<SwipeParams>,
    ) -> Result<CallToolResult, McpError> {
        let distance = params.distance.unwrap_or_default();
        self.logger.info(
            "Swipe command invoked",
            json!({
                "boxId": params.box_id,
                "direction": params.direction,
                "distance": distance,
                "location": params.location,
            }),
        );

        let body = json!({
            "direction": params.direction,
            "distance": distance,
            "location": params.location,
            "duration": "200ms",
            "options": screenshot_after(ACTION_SCREENSHOT_DELAY),
        });
        Ok(self
            .run_action(&params.box_id, "swipe", body, "Swipe action completed successfully", "Failed to run swipe action")
            .await)
    }

    #[tool(
        description = "Tap a UI element on the Android device. Provide a clear description of the element to ensure it can be identified unambiguously."
    )]
    async fn tap(
        &self,
        Parameters(params): Parameters<TapParams>,
    ) -> Result<CallToolResult, McpError> {
        self.logger.info(
            "Tap command invoked",
            json!({ "boxId": params.box_id, "target": params.target }),
        );

        let body = json!({
            "target": params.target,
            "options": screenshot_after(ACTION_SCREENSHOT_DELAY),
        });
        Ok(self
            .run_action(&params.box_id, "tap", body, "Tap action completed successfully", "Failed to run tap action")
            .await)
    }
}

// =============================================================================
// Pointer tools (Linux and Browser)
// =============================================================================

#[tool_router(router = pointer_tools)]
impl DeviceMcpServer {
    #[tool(
        description = "Click a UI element on the desktop. Provide a clear description of the element to ensure it can be identified unambiguously."
    )]
    async fn click(
        &self,
        Parameters(params): Parameters<ClickParams>,
    ) -> Result<CallToolResult, McpError> {
        self.logger.info(
            "Click command invoked",
            json!({
                "boxId": params.box_id,
                "target": params.target,
                "button": params.button,
                "double": params.double,
            }),
        );

        let body = json!({
            "target": params.target,
            "button": params.button,
            "double": params.double,
            "options": screenshot_after(ACTION_SCREENSHOT_DELAY),
        });
        Ok(self
            .run_action(&params.box_id, "click", body, "Click action completed successfully", "Failed to run click action")
            .await)
    }

    #[tool(
        description = "Scroll the screen vertically. Scrolling is performed at the center of the screen."
    )]
    async fn scroll(
        &self,
        Parameters(params): Parameters<ScrollParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = json!({
            "boxId": params.box_id,
            "direction": params.direction,
            "distance": params.distance,
        });
        self.logger.info("Scroll command invoked", data.clone());

        let resolution = match self.client.display(&params.box_id).await {
            Ok(resolution) => resolution,
            Err(e) => return Ok(self.failure("Failed to run scroll action", data, e)),
        };

        let height = i64::from(resolution.height);
        let amount = params.distance.scroll_steps() * ((height + 200) / 400);
        let scroll_y = match params.direction {
            ScrollDirection::Up => -amount,
            ScrollDirection::Down => amount,
        };
        debug!("Scrolling by {} at screen center", scroll_y);

        let body = json!({
            "x": (resolution.width + 1) / 2,
            "y": (resolution.height + 1) / 2,
            "scrollX": 0,
            "scrollY": scroll_y,
            "options": screenshot_after("300ms"),
        });
        let text = format!(
            "Scrolled {} by {} distance",
            lowercase(params.direction),
            lowercase(params.distance)
        );
        Ok(self
            .run_action(&params.box_id, "scroll", body, text, "Failed to run scroll action")
            .await)
    }

    #[tool(
        description = "Simulates pressing a specific key by triggering the complete keyboard key event chain (keydown, keypress, keyup). Use this to activate keyboard shortcuts or form submissions."
    )]
    async fn press_key(
        &self,
        Parameters(params): Parameters<PressKeyParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.keys.is_empty() {
            return Err(McpError::invalid_params("keys must not be empty", None));
        }
        let delay = params
            .screenshot_delay
            .clone()
            .unwrap_or_else(|| ACTION_SCREENSHOT_DELAY.to_string());
        if !is_valid_duration(&delay) {
            return Err(McpError::invalid_params(
                "Invalid screenshotDelay format. Must be a number followed by 'ms', 's', 'm', or 'h'.",
                None,
            ));
        }

        self.logger.info(
            "Pressing keys",
            json!({ "boxId": params.box_id, "keys": params.keys.join(" + ") }),
        );

        let options = if params.include_screenshot.unwrap_or(false) {
            screenshot_after(&delay)
        } else {
            json!({ "screenshot": false })
        };
        let body = json!({ "keys": params.keys, "options": options });
        Ok(self
            .run_action(&params.box_id, "press-key", body, "Keys pressed successfully", "Failed to press keys")
            .await)
    }
}

// =============================================================================
// Linux tools
// =============================================================================

#[tool_router(router = linux_tools)]
impl DeviceMcpServer {
    #[tool(
        description = "Start a GBOX(Linux) by the given ID. If the GBOX ID is not provided, a new virtual Linux GBOX will be created. MUST call this tool first when starting a task."
    )]
    #[instrument(skip_all)]
    async fn start_linux_box(
        &self,
        Parameters(params): Parameters<StartBoxParams>,
    ) -> Result<CallToolResult, McpError> {
        self.start_box_tool(BoxKind::Linux, params, false, "Failed to start Linux box")
            .await
    }

    #[tool(
        description = "Open the browser on the Linux desktop. Opens maximized if no browser is currently open."
    )]
    async fn open_browser(
        &self,
        Parameters(params): Parameters<OpenBrowserParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = json!({ "boxId": params.box_id });
        self.logger.info("Open browser command invoked", data.clone());

        if let Err(e) = self.client.open_browser(&params.box_id, true, true).await {
            return Ok(self.failure("Failed to open browser", data, e));
        }
        self.logger.info("Browser opened", data);

        Ok(self
            .settle_and_capture(
                &params.box_id,
                Duration::from_secs(2),
                "Browser opened successfully".to_string(),
            )
            .await)
    }
}

// =============================================================================
// Browser tools
// =============================================================================

#[tool_router(router = browser_tools)]
impl DeviceMcpServer {
    #[tool(
        description = "Start a GBOX(Browser) by the given ID with browser pre-opened and maximized. If the GBOX ID is not provided, a new virtual Linux GBOX will be created with browser. MUST call this tool first when starting a task."
    )]
    #[instrument(skip_all)]
    async fn start_browser_box(
        &self,
        Parameters(params): Parameters<StartBoxParams>,
    ) -> Result<CallToolResult, McpError> {
        self.start_box_tool(BoxKind::Linux, params, true, "Failed to start Browser box")
            .await
    }

    #[tool(
        description = "List all browser tabs currently open in the browser. Returns tab information including tab ID, title, and URL."
    )]
    async fn list_tabs(
        &self,
        Parameters(params): Parameters<ListTabsParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = json!({ "boxId": params.box_id });
        self.logger.info("List tabs command invoked", data.clone());

        match self.client.list_tabs(&params.box_id).await {
            Ok(tabs) => {
                self.logger.info(
                    "Browser tabs retrieved",
                    json!({ "boxId": params.box_id, "tabCount": tab_count(&tabs) }),
                );
                Ok(CallToolResult::success(vec![Content::text(
                    serde_json::to_string_pretty(&tabs).unwrap_or_else(|_| tabs.to_string()),
                )]))
            }
            Err(e) => Ok(self.failure("Failed to list browser tabs", data, e)),
        }
    }

    #[tool(description = "Open a new browser tab with the specified URL.")]
    async fn open_tab(
        &self,
        Parameters(params): Parameters<OpenTabParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = json!({ "boxId": params.box_id, "url": params.url });
        self.logger.info("Open tab command invoked", data.clone());

        let tab_id = match self.client.open_tab(&params.box_id, &params.url).await {
            Ok(tab_id) => tab_id,
            Err(e) => return Ok(self.failure("Failed to open browser tab", data, e)),
        };
        self.logger.info(
            "Browser tab opened",
            json!({ "boxId": params.box_id, "url": params.url, "tabId": tab_id }),
        );

        Ok(self
            .settle_and_capture(
                &params.box_id,
                Duration::from_secs(1),
                format!("Tab opened successfully. Tab ID: {tab_id}"),
            )
            .await)
    }

    #[tool(
        description = "Switch to a different browser tab by tab ID. Use list_tabs to get available tab IDs."
    )]
    async fn switch_tab(
        &self,
        Parameters(params): Parameters<TabParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = json!({ "boxId": params.box_id, "tabId": params.tab_id });
        self.logger.info("Switch tab command invoked", data.clone());

        if let Err(e) = self.client.switch_tab(&params.box_id, &params.tab_id).await {
            return Ok(self.failure("Failed to switch browser tab", data, e));
        }
        self.logger.info("Switched to browser tab", data);

        Ok(self
            .settle_and_capture(
                &params.box_id,
                Duration::from_millis(500),
                format!("Switched to tab {} successfully", params.tab_id),
            )
            .await)
    }

    #[tool(
        description = "Close a browser tab by tab ID. Use list_tabs to get available tab IDs."
    )]
    async fn close_tab(
        &self,
        Parameters(params): Parameters<TabParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = json!({ "boxId": params.box_id, "tabId": params.tab_id });
        self.logger.info("Close tab command invoked", data.clone());

        let tabs = match self.client.list_tabs(&params.box_id).await {
            Ok(tabs) => tabs,
            Err(e) => return Ok(self.failure("Failed to close browser tab", data, e)),
        };

        // The browser must keep one tab open.
        if tab_count(&tabs) <= 1 {
            self.logger.info("Cannot close last tab", data);
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Cannot close tab {}: It is the last remaining tab. At least one tab must stay open.",
                params.tab_id
            ))]));
        }

        match self.client.close_tab(&params.box_id, &params.tab_id).await {
            Ok(()) => {
                self.logger.info("Browser tab closed", data);
                Ok(CallToolResult::success(vec![Content::text(format!(
                    "Tab {} closed successfully",
                    params.tab_id
                ))]))
            }
            Err(e) => Ok(self.failure("Failed to close browser tab", data, e)),
        }
    }
}

fn tab_count(tabs: &Value) -> usize {
    tabs.get("data")
        .and_then(Value::as_array)
        .or_else(|| tabs.as_array())
        .map_or(0, Vec::len)
}

// =============================================================================
// Prompts
// =============================================================================

#[prompt_router]
impl DeviceMcpServer {
    /// Usage guide for driving boxes
    #[prompt(name = "gbox-manual", description = "Gbox Usage Guide")]
    async fn gbox_manual(&self) -> Vec<PromptMessage> {
        debug!("Serving prompt: {}", GBOX_MANUAL_DESCRIPTION);
        vec![PromptMessage::new_text(
            PromptMessageRole::User,
            GBOX_MANUAL_TEXT,
        )]
    }
}

// Implement the ServerHandler trait to define server capabilities
#[tool_handler]
#[prompt_handler]
impl rmcp::ServerHandler for DeviceMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: self.name.clone(),
                version: self.descriptor.version.clone(),
                ..Default::default()
            },
            instructions: Some(self.instructions()),
            capabilities: self.descriptor.capabilities.to_server_capabilities(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::factory::ServerFactory;
    use crate::protocol::prompts::GBOX_MANUAL;
    use gbox_mcp_core::{DeviceSettings, ServerSettings};
    use rmcp::ServerHandler;

    fn server_for(platform: Platform, suffix: Option<&str>) -> DeviceMcpServer {
        let descriptor = ServerDescriptor::for_platform(&ServerSettings::default(), platform);
        let client = Arc::new(GboxClient::new(&DeviceSettings::default(), None).unwrap());
        ServerFactory::create_server(&descriptor, suffix, client, McpLogger::tracing("test"))
    }

    #[test]
    fn test_tools_match_platform_table() {
        for platform in Platform::ALL {
            let server = server_for(platform, None);
            let mut expected: Vec<String> = platform.tool_names().map(str::to_string).collect();
            expected.sort();
            assert_eq!(server.tool_names(), expected, "platform {platform}");
        }
    }

    #[test]
    fn test_platform_specific_tools_are_not_leaked() {
        let android = server_for(Platform::Android, None).tool_names();
        assert!(android.contains(&"tap".to_string()));
        assert!(!android.contains(&"click".to_string()));

        let linux = server_for(Platform::Linux, None).tool_names();
        assert!(linux.contains(&"open_browser".to_string()));
        assert!(!linux.contains(&"list_tabs".to_string()));

        let browser = server_for(Platform::Browser, None).tool_names();
        assert!(browser.contains(&"close_tab".to_string()));
        assert!(!browser.contains(&"open_browser".to_string()));
        assert!(browser.contains(&"type".to_string()));
    }

    #[test]
    fn test_prompt_registry() {
        let server = server_for(Platform::Linux, None);
        assert_eq!(server.prompt_names(), vec![GBOX_MANUAL.to_string()]);
    }

    #[test]
    fn test_server_info() {
        let server = server_for(Platform::Android, Some("abc"));
        let info = server.get_info();
        assert_eq!(info.server_info.name, "gbox-android-abc");
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.prompts.is_some());
        assert!(info.capabilities.logging.is_some());
        assert!(info.instructions.unwrap().contains("start_android_box"));
    }

    #[test]
    fn test_tab_count() {
        assert_eq!(tab_count(&json!({ "data": [{}, {}] })), 2);
        assert_eq!(tab_count(&json!([{}])), 1);
        assert_eq!(tab_count(&json!({})), 0);
    }
}
