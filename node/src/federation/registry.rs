// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-memory registry of known nodes.
//!
//! The local node is synthesized from configuration on every read and never
//! stored. Peers live only in process memory and are forgotten on restart.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use loop_kernel::event::format_timestamp;
use loop_kernel::types::NodeDescriptor;
use parking_lot::RwLock;
use serde::Serialize;

/// This node's identity as configured.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalNode {
    pub node_id: String,
    pub name: String,
    pub endpoint: String,
    pub capabilities: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub node_id: String,
    pub name: String,
    pub endpoint: String,
    pub capabilities: BTreeSet<String>,
    pub last_seen: String,
    pub lab_only: bool,
}

pub struct NodeRegistry {
    local: LocalNode,
    peers: RwLock<HashMap<String, NodeRecord>>,
}

impl NodeRegistry {
    pub fn new(local: LocalNode) -> Self {
        Self {
            local,
            peers: RwLock::new(HashMap::new()),
        }
    }

    pub fn local(&self) -> &LocalNode {
        &self.local
    }

    pub fn local_record(&self) -> NodeRecord {
        NodeRecord {
            node_id: self.local.node_id.clone(),
            name: self.local.name.clone(),
            endpoint: self.local.endpoint.clone(),
            capabilities: self.local.capabilities.clone(),
            last_seen: format_timestamp(&Utc::now()),
            lab_only: true,
        }
    }

    /// What this node sends when it introduces itself to a peer.
    pub fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor::new(
            self.local.node_id.clone(),
            self.local.name.clone(),
            self.local.endpoint.clone(),
            self.local.capabilities.clone(),
            format_timestamp(&Utc::now()),
        )
    }

    /// Insert or replace a peer by `node_id`, refreshing `last_seen`.
    pub fn upsert(
        &self,
        node_id: &str,
        name: &str,
        endpoint: &str,
        capabilities: BTreeSet<String>,
    ) -> NodeRecord {
        let record = NodeRecord {
            node_id: node_id.to_string(),
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            capabilities,
            last_seen: format_timestamp(&Utc::now()),
            lab_only: true,
        };
        self.peers.write().insert(record.node_id.clone(), record.clone());
        record
    }

    /// Local node first, then peers by id. A peer claiming the local id is hidden.
    pub fn list(&self) -> Vec<NodeRecord> {
        let mut peers: Vec<NodeRecord> = self
            .peers
            .read()
            .values()
            .filter(|n| n.node_id != self.local.node_id)
            .cloned()
            .collect();
        peers.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        let mut nodes = Vec::with_capacity(peers.len() + 1);
        nodes.push(self.local_record());
        nodes.extend(peers);
        nodes
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }
}
