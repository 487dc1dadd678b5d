//! Relative-OID path resolution over the device tree
//!
//! A path either lands on an element, or stops at the deepest element that
//! matched a prefix. Matrices handle the unmatched remainder themselves by
//! exposing crosspoint gains as synthesized parameters, so a partial match
//! keeps the ancestor and the leftover segments together.

use crate::element::{DeviceTree, ElementIndex, ElementKind};
use crate::matrix::MatrixState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The whole path matched an element
    Found(ElementIndex),
    /// A proper prefix matched; `remaining` holds the unmatched segments
    Partial {
        ancestor: ElementIndex,
        remaining: Vec<u32>,
    },
    /// Not even the first segment matched a root
    Miss,
}

pub fn resolve(tree: &DeviceTree, path: &[u32]) -> Resolution {
    let mut current: Option<ElementIndex> = None;
    for (depth, &number) in path.iter().enumerate() {
        match tree.child_by_number(current, number) {
            Some(child) => current = Some(child),
            None => {
                return match current {
                    Some(ancestor) => Resolution::Partial {
                        ancestor,
                        remaining: path[depth..].to_vec(),
                    },
                    None => Resolution::Miss,
                }
            }
        }
    }
    match current {
        Some(index) => Resolution::Found(index),
        None => Resolution::Miss,
    }
}

/// Crosspoint gain addressed beneath a matrix as `.. matrix target source`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpointAddress {
    pub target: u32,
    pub source: u32,
}

/// Interpret a partial match's remainder as a crosspoint gain address,
/// when the ancestor is a matrix that knows both signals
pub fn xpoint_address(
    tree: &DeviceTree,
    ancestor: ElementIndex,
    remaining: &[u32],
) -> Option<XpointAddress> {
    let [target, source] = *remaining else {
        return None;
    };
    let matrix: &MatrixState = match &tree.element(ancestor)?.kind {
        ElementKind::Matrix(state) => state,
        _ => return None,
    };
    if matrix.has_xpoint(target, source) {
        Some(XpointAddress { target, source })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::DeviceTree;
    use ember_glow::MatrixType;

    fn tree_with_matrix() -> (DeviceTree, ElementIndex, ElementIndex) {
        let mut tree = DeviceTree::new();
        let device = tree.add_root(1, "device", ElementKind::Node).unwrap();
        let mut state = MatrixState::new(MatrixType::OneToN);
        for n in 0..2 {
            state.add_target(n).unwrap();
            state.add_source(n).unwrap();
        }
        let matrix = tree
            .add_child(device, 7, "router", ElementKind::Matrix(state))
            .unwrap();
        (tree, device, matrix)
    }

    #[test]
    fn test_resolve_found() {
        let (tree, device, matrix) = tree_with_matrix();
        assert_eq!(resolve(&tree, &[1]), Resolution::Found(device));
        assert_eq!(resolve(&tree, &[1, 7]), Resolution::Found(matrix));
    }

    #[test]
    fn test_resolve_miss_and_partial() {
        let (tree, device, matrix) = tree_with_matrix();
        assert_eq!(resolve(&tree, &[9]), Resolution::Miss);
        assert_eq!(resolve(&tree, &[]), Resolution::Miss);
        assert_eq!(
            resolve(&tree, &[1, 3]),
            Resolution::Partial {
                ancestor: device,
                remaining: vec![3],
            }
        );
        assert_eq!(
            resolve(&tree, &[1, 7, 0, 1]),
            Resolution::Partial {
                ancestor: matrix,
                remaining: vec![0, 1],
            }
        );
    }

    #[test]
    fn test_xpoint_address_from_partial() {
        let (tree, device, matrix) = tree_with_matrix();
        assert_eq!(
            xpoint_address(&tree, matrix, &[0, 1]),
            Some(XpointAddress {
                target: 0,
                source: 1,
            })
        );
        // unknown signal numbers do not synthesize a parameter
        assert_eq!(xpoint_address(&tree, matrix, &[0, 9]), None);
        // wrong remainder shape
        assert_eq!(xpoint_address(&tree, matrix, &[0]), None);
        // non-matrix ancestors have no dynamic children
        assert_eq!(xpoint_address(&tree, device, &[0, 1]), None);
    }
}
