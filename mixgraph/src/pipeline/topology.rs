//! Links between stage ports and ordering over them.

use crate::core::VideoFormat;
use std::collections::HashSet;
use std::fmt;

/// A directed connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Upstream stage.
    pub src: String,
    /// Output port on the upstream stage.
    pub src_port: String,
    /// Downstream stage.
    pub dst: String,
    /// Input port on the downstream stage.
    pub dst_port: String,
    /// Format fixed when the graph entered Paused.
    pub format: Option<VideoFormat>,
}

impl Link {
    /// Creates a link without a negotiated format.
    #[must_use]
    pub fn new(
        src: impl Into<String>,
        src_port: impl Into<String>,
        dst: impl Into<String>,
        dst_port: impl Into<String>,
    ) -> Self {
        Self {
            src: src.into(),
            src_port: src_port.into(),
            dst: dst.into(),
            dst_port: dst_port.into(),
            format: None,
        }
    }

    /// Returns true if the link uses this port of this stage.
    #[must_use]
    pub fn touches(&self, stage: &str, port: &str) -> bool {
        (self.src == stage && self.src_port == port) || (self.dst == stage && self.dst_port == port)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}.{}", self.src, self.src_port, self.dst, self.dst_port)
    }
}

/// Finds a downstream path from `from` to `to`, both included.
pub(crate) fn find_path(links: &[Link], from: &str, to: &str) -> Option<Vec<String>> {
    fn dfs(
        links: &[Link],
        node: &str,
        to: &str,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        visited.insert(node.to_string());
        path.push(node.to_string());
        if node == to {
            return true;
        }
        for link in links.iter().filter(|l| l.src == node) {
            if !visited.contains(&link.dst) && dfs(links, &link.dst, to, visited, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    let mut visited = HashSet::new();
    let mut path = Vec::new();
    dfs(links, from, to, &mut visited, &mut path).then_some(path)
}

/// Orders stages so that every stage comes after all of its upstreams.
/// Ties keep insertion order.
pub(crate) fn upstream_order(names: &[String], links: &[Link]) -> Vec<String> {
    fn visit(node: &str, links: &[Link], visited: &mut HashSet<String>, result: &mut Vec<String>) {
        if !visited.insert(node.to_string()) {
            return;
        }
        for link in links.iter().filter(|l| l.dst == node) {
            visit(&link.src, links, visited, result);
        }
        result.push(node.to_string());
    }

    let mut result = Vec::with_capacity(names.len());
    let mut visited = HashSet::new();
    for name in names {
        visit(name, links, &mut visited, &mut result);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chain() -> Vec<Link> {
        vec![
            Link::new("bg", "src", "mixer", "sink_0"),
            Link::new("fg", "src", "alpha", "sink"),
            Link::new("alpha", "src", "mixer", "sink_1"),
            Link::new("mixer", "src", "convert", "sink"),
            Link::new("convert", "src", "out", "sink"),
        ]
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_upstream_order() {
        let order = upstream_order(
            &names(&["out", "convert", "mixer", "alpha", "fg", "bg"]),
            &chain(),
        );
        assert_eq!(order, names(&["bg", "fg", "alpha", "mixer", "convert", "out"]));
    }

    #[test]
    fn test_find_path() {
        let links = chain();
        assert_eq!(
            find_path(&links, "fg", "out"),
            Some(names(&["fg", "alpha", "mixer", "convert", "out"]))
        );
        assert_eq!(find_path(&links, "out", "fg"), None);
        assert_eq!(find_path(&links, "bg", "bg"), Some(names(&["bg"])));
    }

    #[test]
    fn test_link_display() {
        assert_eq!(
            Link::new("mixer", "src", "convert", "sink").to_string(),
            "mixer.src -> convert.sink"
        );
    }
}
