// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model Context Protocol (MCP) server registry

pub mod hub;
pub mod protocol;

pub use hub::{McpHub, McpServer, StubMcpServer};
pub use protocol::{McpResource, McpServerConfig, McpSettings, McpTool};
