// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Registry of MCP servers
//!
//! No transport is wired up yet: every enabled configuration is served by a
//! [`StubMcpServer`] that advertises one example tool and resource.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::protocol::{McpResource, McpServerConfig, McpSettings, McpTool};
use crate::error::{AgentError, Result};

/// A running MCP server
#[async_trait]
pub trait McpServer: Send + Sync {
    fn name(&self) -> &str;

    fn tools(&self) -> Vec<McpTool>;

    fn resources(&self) -> Vec<McpResource>;

    async fn execute_tool(&self, tool_name: &str, args: Value) -> Result<Value>;

    async fn access_resource(&self, uri: &str) -> Result<String>;

    fn is_running(&self) -> bool;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

/// In-process stand-in for a real server
pub struct StubMcpServer {
    name: String,
    tools: Vec<McpTool>,
    resources: Vec<McpResource>,
    running: AtomicBool,
}

impl StubMcpServer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: vec![McpTool::new("example-tool", "An example tool", json!({}))],
            resources: vec![McpResource {
                uri: "example://resource".to_string(),
                name: "Example Resource".to_string(),
                mime_type: Some("text/plain".to_string()),
                description: Some("An example resource".to_string()),
            }],
            running: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl McpServer for StubMcpServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> Vec<McpTool> {
        self.tools.clone()
    }

    fn resources(&self) -> Vec<McpResource> {
        self.resources.clone()
    }

    async fn execute_tool(&self, tool_name: &str, _args: Value) -> Result<Value> {
        Ok(json!({ "result": format!("Tool executed: {}", tool_name) }))
    }

    async fn access_resource(&self, uri: &str) -> Result<String> {
        Ok(format!("Resource content: {}", uri))
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Name → server map plus the configurations they were registered with
#[derive(Default)]
pub struct McpHub {
    servers: RwLock<HashMap<String, Arc<dyn McpServer>>>,
    configs: RwLock<HashMap<String, McpServerConfig>>,
}

impl McpHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every server in an MCP settings file
    pub async fn from_settings(settings: &McpSettings) -> Result<Self> {
        let hub = Self::new();
        for (name, config) in &settings.mcp_servers {
            hub.register_server(name, config.clone()).await?;
        }
        Ok(hub)
    }

    /// Store `config` and start a server for it unless it is disabled
    pub async fn register_server(&self, name: &str, config: McpServerConfig) -> Result<()> {
        tracing::debug!(server = %name, command = %config.command, "registering MCP server");
        let disabled = config.disabled;
        self.configs.write().await.insert(name.to_string(), config);

        if disabled {
            tracing::debug!(server = %name, "MCP server is disabled");
            return Ok(());
        }

        let server: Arc<dyn McpServer> = Arc::new(StubMcpServer::new(name));
        server.start().await?;
        self.servers.write().await.insert(name.to_string(), server);
        Ok(())
    }

    /// Stop and forget a server. Unknown names are ignored.
    pub async fn unregister_server(&self, name: &str) -> Result<()> {
        self.configs.write().await.remove(name);
        let server = self.servers.write().await.remove(name);
        if let Some(server) = server {
            tracing::debug!(server = %name, "unregistering MCP server");
            server.stop().await?;
        }
        Ok(())
    }

    pub async fn server(&self, name: &str) -> Option<Arc<dyn McpServer>> {
        self.servers.read().await.get(name).cloned()
    }

    pub async fn servers(&self) -> Vec<Arc<dyn McpServer>> {
        self.servers.read().await.values().cloned().collect()
    }

    pub async fn config(&self, name: &str) -> Option<McpServerConfig> {
        self.configs.read().await.get(name).cloned()
    }

    /// Tools of every registered server
    pub async fn all_tools(&self) -> Vec<McpTool> {
        self.servers
            .read()
            .await
            .values()
            .flat_map(|server| server.tools())
            .collect()
    }

    pub async fn all_resources(&self) -> Vec<McpResource> {
        self.servers
            .read()
            .await
            .values()
            .flat_map(|server| server.resources())
            .collect()
    }

    pub async fn execute_tool(&self, server_name: &str, tool_name: &str, args: Value) -> Result<Value> {
        let server = self.require(server_name).await?;
        server.execute_tool(tool_name, args).await
    }

    pub async fn access_resource(&self, server_name: &str, uri: &str) -> Result<String> {
        let server = self.require(server_name).await?;
        server.access_resource(uri).await
    }

    async fn require(&self, server_name: &str) -> Result<Arc<dyn McpServer>> {
        self.server(server_name)
            .await
            .ok_or_else(|| AgentError::NotFound(format!("Server not found: {}", server_name)))
    }
}
