// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Federation handshake payloads.
//!
//! Identities are taken as asserted. `public_key` and `signature` are carried
//! through so peers can send them, but nothing here verifies them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{require, require_tag, require_timestamp, LOOP_CONTEXT, SCHEMA_VERSION};
use crate::error::ValidationResult;

pub const HANDSHAKE_TYPE: &str = "NodeHandshake";
pub const HANDSHAKE_ACK_TYPE: &str = "NodeHandshakeResponse";

/// What a peer says about itself when it introduces itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "@type")]
    pub type_tag: String,
    pub schema_version: String,
    pub node_id: String,
    pub name: String,
    pub endpoint: String,
    pub capabilities: BTreeSet<String>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl NodeDescriptor {
    pub fn new(
        node_id: impl Into<String>,
        name: impl Into<String>,
        endpoint: impl Into<String>,
        capabilities: BTreeSet<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            context: Some(LOOP_CONTEXT.to_string()),
            type_tag: HANDSHAKE_TYPE.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            node_id: node_id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            capabilities,
            timestamp: timestamp.into(),
            public_key: None,
            signature: None,
            extensions: Map::new(),
        }
    }

    pub fn check(&self) -> ValidationResult<()> {
        require_tag(HANDSHAKE_TYPE, &self.type_tag)?;
        require("schema_version", &self.schema_version)?;
        require("node_id", &self.node_id)?;
        require("name", &self.name)?;
        require("endpoint", &self.endpoint)?;
        require_timestamp("timestamp", &self.timestamp)
    }
}

/// Reply to a handshake: the responding node's own identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandshakeAck {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@type")]
    pub type_tag: String,
    pub schema_version: String,
    pub status: String,
    pub peer_id: String,
    pub capabilities: BTreeSet<String>,
    pub received_at: String,
    pub lab_only: bool,
    pub message: String,
}

impl HandshakeAck {
    pub fn accepted(
        local_id: impl Into<String>,
        capabilities: BTreeSet<String>,
        remote_id: &str,
        received_at: impl Into<String>,
    ) -> Self {
        Self {
            context: LOOP_CONTEXT.to_string(),
            type_tag: HANDSHAKE_ACK_TYPE.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            status: "accepted".to_string(),
            peer_id: local_id.into(),
            capabilities,
            received_at: received_at.into(),
            lab_only: true,
            message: format!("Lab handshake accepted for {}.", remote_id),
        }
    }
}
