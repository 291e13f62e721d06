use std::collections::HashSet;

use url::Url;

use crate::error::{Result, SchedulerError};
use crate::util::uri;

/// A local execution slot, addressed like `pnp://localhost:64738/local-node-0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub url: Url,
}

/// Fixed set of nodes tasks are launched on.
#[derive(Debug, Clone)]
pub struct NodePool {
    host: String,
    nodes: Vec<Node>,
    busy: HashSet<String>,
}

impl NodePool {
    /// `count` nodes named after the scheduler URL's host, port and protocol.
    pub fn local(base: &Url, count: usize) -> Result<Self> {
        let host = uri::host_of(base)
            .ok_or_else(|| SchedulerError::InvalidUri {
                uri: base.to_string(),
                reason: "URI has no host".into(),
            })?
            .to_string();
        let protocol = uri::protocol_of(base);
        let port = uri::port_of(base);

        let nodes = (0..count.max(1))
            .map(|i| {
                let name = format!("local-node-{i}");
                let url = uri::build_uri(&host, &name, protocol, port)?;
                Ok(Node { name, url })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            host,
            nodes,
            busy: HashSet::new(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.nodes.len() - self.busy.len()
    }

    /// Take a free node that is not in `excluded`.
    ///
    /// When `excluded` covers the whole pool the exclusions are ignored,
    /// otherwise the task could never run again.
    pub fn acquire(&mut self, excluded: &[String]) -> Option<String> {
        let all_excluded = self
            .nodes
            .iter()
            .all(|n| excluded.iter().any(|e| e == &n.name));

        let node = self
            .nodes
            .iter()
            .filter(|n| !self.busy.contains(&n.name))
            .find(|n| all_excluded || !excluded.iter().any(|e| e == &n.name))?
            .name
            .clone();
        self.busy.insert(node.clone());
        Some(node)
    }

    pub fn release(&mut self, node: &str) {
        self.busy.remove(node);
    }

    pub fn is_busy(&self, node: &str) -> bool {
        self.busy.contains(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(count: usize) -> NodePool {
        let base = uri::normalize("pnp://localhost:64738/", uri::DEFAULT_PROTOCOL).unwrap();
        NodePool::local(&base, count).unwrap()
    }

    #[test]
    fn nodes_are_named_after_scheduler_url() {
        let pool = pool(2);
        assert_eq!(pool.host(), "localhost");
        assert_eq!(pool.len(), 2);
        assert_eq!(
            pool.nodes()[1].url.as_str(),
            "pnp://localhost:64738/local-node-1"
        );
    }

    #[test]
    fn acquire_skips_busy_and_excluded_nodes() {
        let mut pool = pool(3);
        let excluded = vec!["local-node-0".to_string()];
        assert_eq!(pool.acquire(&excluded).as_deref(), Some("local-node-1"));
        assert_eq!(pool.acquire(&[]).as_deref(), Some("local-node-0"));
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.acquire(&["local-node-2".to_string()]), None);

        pool.release("local-node-1");
        assert!(!pool.is_busy("local-node-1"));
        assert_eq!(pool.acquire(&[]).as_deref(), Some("local-node-1"));
    }

    #[test]
    fn exclusions_covering_every_node_are_ignored() {
        let mut pool = pool(1);
        let excluded = vec!["local-node-0".to_string()];
        assert_eq!(pool.acquire(&excluded).as_deref(), Some("local-node-0"));
    }
}
