use crate::node::{NodeError, NodeResult};

/// This node's identity and the cluster it was told about in `init`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    node_id: String,
    node_ids: Vec<String>,
}

impl Membership {
    pub fn new(node_id: String, node_ids: Vec<String>) -> NodeResult<Self> {
        if node_id.is_empty() {
            return Err(NodeError::InvalidMembership("node_id is empty".to_string()));
        }
        if !node_ids.contains(&node_id) {
            return Err(NodeError::InvalidMembership(format!(
                "{} is not listed in node_ids",
                node_id
            )));
        }
        Ok(Self { node_id, node_ids })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn node_ids(&self) -> &[String] {
        &self.node_ids
    }

    /// Every node except this one, in the order given by `init`
    pub fn peers(&self) -> impl Iterator<Item = &str> + '_ {
        self.node_ids
            .iter()
            .map(String::as_str)
            .filter(move |id| *id != self.node_id)
    }
}
