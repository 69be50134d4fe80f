use crate::core::errors::BTreeError;
use crate::storage::Provider;

use super::BTree;

/// Shape of a tree as measured by [`BTree::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of levels; a lone root leaf has height 1.
    pub height: usize,
    pub node_count: usize,
    pub entry_count: usize,
}

struct Frame<K, Id> {
    id: Id,
    parent: Option<Id>,
    depth: usize,
    lower: Option<K>,
    upper: Option<K>,
}

fn violation(msg: String) -> BTreeError {
    BTreeError::InvariantViolation(msg)
}

impl<K, V, P> BTree<K, V, P>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Provider<K, V>,
{
    /// Walk every node through the provider and check the structural invariants:
    /// degree bounds, sorted entries bounded by the separators above them, one
    /// more child than entries on internal nodes, parent ids that point back at
    /// the node listing the child, and leaves all at the same depth.
    pub async fn verify(&self) -> Result<TreeStats, BTreeError> {
        let t = self.config.min_degree;
        let mut stats = TreeStats {
            height: 0,
            node_count: 0,
            entry_count: 0,
        };
        let mut leaf_depth = None;
        let mut stack = vec![Frame {
            id: self.root_id.clone(),
            parent: None,
            depth: 1,
            lower: None,
            upper: None,
        }];

        while let Some(frame) = stack.pop() {
            let node = self.provider.load(&frame.id).await?;
            stats.node_count += 1;
            stats.entry_count += node.entries.len();

            if node.id != frame.id {
                return Err(violation(format!(
                    "node loaded for {:?} carries id {:?}",
                    frame.id, node.id
                )));
            }
            if node.parent != frame.parent {
                return Err(violation(format!(
                    "node {:?} has parent {:?}, expected {:?}",
                    node.id, node.parent, frame.parent
                )));
            }

            let degree = node.degree();
            let min = if frame.parent.is_none() { 1 } else { t };
            if degree < min || degree > 2 * t {
                return Err(violation(format!(
                    "node {:?} has degree {degree}, outside [{min}, {}]",
                    node.id,
                    2 * t
                )));
            }
            node.check_child_count()?;

            if node.entries.windows(2).any(|w| w[0].key > w[1].key) {
                return Err(violation(format!("node {:?} entries are not sorted", node.id)));
            }
            let out_of_bounds = node.entries.iter().any(|e| {
                frame.lower.as_ref().is_some_and(|lo| e.key < *lo)
                    || frame.upper.as_ref().is_some_and(|hi| e.key > *hi)
            });
            if out_of_bounds {
                return Err(violation(format!(
                    "node {:?} holds keys outside its separators",
                    node.id
                )));
            }

            if node.is_leaf() {
                match leaf_depth {
                    None => leaf_depth = Some(frame.depth),
                    Some(depth) if depth != frame.depth => {
                        return Err(violation(format!(
                            "leaf {:?} at depth {}, other leaves at depth {depth}",
                            node.id, frame.depth
                        )));
                    }
                    Some(_) => {}
                }
                continue;
            }

            for (i, child_id) in node.children.iter().enumerate() {
                let lower = match i {
                    0 => frame.lower.clone(),
                    _ => Some(node.entries[i - 1].key.clone()),
                };
                let upper = match node.entries.get(i) {
                    Some(e) => Some(e.key.clone()),
                    None => frame.upper.clone(),
                };
                stack.push(Frame {
                    id: child_id.clone(),
                    parent: Some(node.id.clone()),
                    depth: frame.depth + 1,
                    lower,
                    upper,
                });
            }
        }

        stats.height = leaf_depth.unwrap_or(1);
        Ok(stats)
    }
}
