//! Tree display utilities for stream trees.

use std::fmt;

/// Something that can be rendered by [`DisplayTree`].
pub trait TreeNode {
    /// Label printed for the node.
    fn name(&self) -> &str;

    /// Children, rendered in order below the node.
    fn children(&self) -> Vec<&dyn TreeNode>;

    /// Optional annotation printed in parentheses after the label.
    fn details(&self) -> Option<String> {
        None
    }
}

/// Renders a [`TreeNode`] hierarchy with box-drawing connectors:
///
/// ```text
/// Concat (rows=60)
/// ├─ BlocksList (rows=30)
/// └─ BlocksList (rows=30)
/// ```
pub struct DisplayTree<'a> {
    root: &'a dyn TreeNode,
    show_details: bool,
}

impl<'a> DisplayTree<'a> {
    /// Render `root` and everything below it.
    pub fn new(root: &'a dyn TreeNode) -> Self {
        Self {
            root,
            show_details: true,
        }
    }

    /// Print names only, without per-node details.
    #[must_use]
    pub fn names_only(mut self) -> Self {
        self.show_details = false;
        self
    }

    fn write_label(&self, f: &mut fmt::Formatter<'_>, node: &dyn TreeNode) -> fmt::Result {
        f.write_str(node.name())?;
        match node.details() {
            Some(details) if self.show_details => writeln!(f, " ({details})"),
            _ => writeln!(f),
        }
    }

    fn write_children(
        &self,
        f: &mut fmt::Formatter<'_>,
        node: &dyn TreeNode,
        prefix: &str,
    ) -> fmt::Result {
        let children = node.children();
        let last = children.len().saturating_sub(1);
        for (i, child) in children.into_iter().enumerate() {
            let (connector, continuation) = if i == last {
                ("└─ ", "   ")
            } else {
                ("├─ ", "│  ")
            };
            write!(f, "{prefix}{connector}")?;
            self.write_label(f, child)?;
            self.write_children(f, child, &format!("{prefix}{continuation}"))?;
        }
        Ok(())
    }
}

impl fmt::Display for DisplayTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_label(f, self.root)?;
        self.write_children(f, self.root, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestNode {
        name: String,
        details: Option<String>,
        children: Vec<TestNode>,
    }

    impl TestNode {
        fn leaf(name: &str, details: Option<&str>) -> Self {
            Self {
                name: name.to_string(),
                details: details.map(str::to_string),
                children: vec![],
            }
        }
    }

    impl TreeNode for TestNode {
        fn name(&self) -> &str {
            &self.name
        }

        fn children(&self) -> Vec<&dyn TreeNode> {
            self.children.iter().map(|c| c as &dyn TreeNode).collect()
        }

        fn details(&self) -> Option<String> {
            self.details.clone()
        }
    }

    #[test]
    fn test_display_tree() {
        let tree = TestNode {
            name: "Union".to_string(),
            details: Some("rows=60".to_string()),
            children: vec![
                TestNode::leaf("BlocksList", Some("rows=30")),
                TestNode::leaf("BlocksList", None),
            ],
        };

        let output = DisplayTree::new(&tree).to_string();
        assert_eq!(
            output,
            "Union (rows=60)\n├─ BlocksList (rows=30)\n└─ BlocksList\n"
        );
    }

    #[test]
    fn test_display_tree_nested() {
        let tree = TestNode {
            name: "Concat".to_string(),
            details: None,
            children: vec![
                TestNode {
                    name: "Limit".to_string(),
                    details: None,
                    children: vec![TestNode::leaf("BlocksList", None)],
                },
                TestNode::leaf("Null", None),
            ],
        };

        let output = DisplayTree::new(&tree).to_string();
        assert_eq!(output, "Concat\n├─ Limit\n│  └─ BlocksList\n└─ Null\n");
    }

    #[test]
    fn test_display_tree_names_only() {
        let tree = TestNode {
            name: "Limit".to_string(),
            details: Some("limit=10".to_string()),
            children: vec![TestNode::leaf("Null", Some("rows=0"))],
        };

        let output = DisplayTree::new(&tree).names_only().to_string();
        assert_eq!(output, "Limit\n└─ Null\n");
    }
}
