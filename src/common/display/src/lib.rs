//! Display and visualization utilities for Tributary.
//!
//! Provides formatting for stream trees and their execution profiles.

mod tree;

pub use tree::{DisplayTree, TreeNode};

/// Format a value for display with optional truncation.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("BlocksList", 20), "BlocksList");
        assert_eq!(truncate_string("MergeSorting", 8), "Merge...");
    }
}
