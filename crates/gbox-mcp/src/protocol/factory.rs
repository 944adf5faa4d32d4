//! Server Factory
//!
//! Pure construction of protocol server instances, plus the session backend
//! that plugs the factory and the device client into a session manager.

use std::sync::Arc;

use rmcp::model::{JsonObject, PromptsCapability, ResourcesCapability, ServerCapabilities, ToolsCapability};

use gbox_mcp_core::{DeviceSettings, McpLogger, Platform, Result, ServerSettings, SessionId};
use gbox_mcp_session::SessionBackend;

use crate::device::{ClientOptions, GboxClient};
use crate::protocol::server::DeviceMcpServer;
use crate::transport::StreamableHttpTransport;

/// Capabilities a server declares during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityFlags {
    /// Tool calls
    pub tools: bool,
    /// Prompts
    pub prompts: bool,
    /// Resources
    pub resources: bool,
    /// Logging notifications
    pub logging: bool,
}

impl Default for CapabilityFlags {
    fn default() -> Self {
        Self {
            tools: true,
            prompts: true,
            resources: true,
            logging: true,
        }
    }
}

impl CapabilityFlags {
    /// Protocol capability object for these flags.
    pub fn to_server_capabilities(self) -> ServerCapabilities {
        ServerCapabilities {
            tools: self.tools.then(ToolsCapability::default),
            prompts: self.prompts.then(PromptsCapability::default),
            resources: self.resources.then(ResourcesCapability::default),
            logging: self.logging.then(JsonObject::new),
            ..Default::default()
        }
    }
}

/// Logical configuration a protocol server is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    /// Base name, already qualified with the platform (e.g. `gbox-android`)
    pub name: String,
    /// Version advertised to clients
    pub version: String,
    /// Target platform
    pub platform: Platform,
    /// Declared capabilities
    pub capabilities: CapabilityFlags,
}

impl ServerDescriptor {
    /// Descriptor for one platform, named `<name>-<platform>`.
    pub fn for_platform(settings: &ServerSettings, platform: Platform) -> Self {
        Self {
            name: format!("{}-{}", settings.name, platform),
            version: settings.version.clone(),
            platform,
            capabilities: CapabilityFlags::default(),
        }
    }
}

/// Builds protocol server instances. Holds no state.
pub struct ServerFactory;

impl ServerFactory {
    /// Deterministic server name: `<name>-<suffix>` when a suffix is given.
    pub fn server_name(descriptor: &ServerDescriptor, session_suffix: Option<&str>) -> String {
        match session_suffix {
            Some(suffix) => format!("{}-{}", descriptor.name, suffix),
            None => descriptor.name.clone(),
        }
    }

    /// Build a fresh server with the platform's tools and the prompt registry
    /// attached.
    pub fn create_server(
        descriptor: &ServerDescriptor,
        session_suffix: Option<&str>,
        client: Arc<GboxClient>,
        logger: McpLogger,
    ) -> DeviceMcpServer {
        DeviceMcpServer::new(
            Self::server_name(descriptor, session_suffix),
            Arc::new(descriptor.clone()),
            client,
            logger,
        )
    }
}

/// Session backend for HTTP sessions of one platform.
#[derive(Debug, Clone)]
pub struct GboxBackend {
    descriptor: ServerDescriptor,
    device: DeviceSettings,
}

impl GboxBackend {
    /// Create a backend.
    pub fn new(descriptor: ServerDescriptor, device: DeviceSettings) -> Self {
        Self { descriptor, device }
    }

    /// Descriptor used for every server of this backend.
    pub fn descriptor(&self) -> &ServerDescriptor {
        &self.descriptor
    }
}

impl SessionBackend for GboxBackend {
    type Server = DeviceMcpServer;
    type Client = GboxClient;
    type ClientOptions = ClientOptions;
    type Transport = StreamableHttpTransport;

    fn platform(&self) -> Platform {
        self.descriptor.platform
    }

    fn create_client(&self, options: Option<ClientOptions>) -> Result<GboxClient> {
        GboxClient::new(&self.device, options)
    }

    fn create_server(
        &self,
        session_id: &SessionId,
        client: Arc<GboxClient>,
        logger: McpLogger,
    ) -> DeviceMcpServer {
        ServerFactory::create_server(&self.descriptor, Some(session_id.as_str()), client, logger)
    }
}
