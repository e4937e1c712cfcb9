//! Second-order regression trees shared by the boosted classifiers

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Growth limits and regularization for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_leaves: usize,
    pub max_depth: usize,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
}

/// Gradients and hessians for the rows a tree is fit on
pub struct GradientView<'a> {
    pub x: &'a Array2<f64>,
    pub gradients: &'a [f64],
    pub hessians: &'a [f64],
}

fn compute_leaf_weight(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g.abs() <= alpha { 0.0 } else { g - alpha * g.signum() };
    -g_adj / (h + lambda).max(1e-12)
}

fn compute_gain_single(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda).max(1e-12)
}

fn make_leaf(view: &GradientView<'_>, indices: &[usize], params: &TreeParams) -> TreeNode {
    let g: f64 = indices.iter().map(|&i| view.gradients[i]).sum();
    let h: f64 = indices.iter().map(|&i| view.hessians[i]).sum();
    TreeNode::Leaf {
        value: compute_leaf_weight(g, h, params.reg_lambda, params.reg_alpha),
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

fn best_split_for_feature(
    view: &GradientView<'_>,
    indices: &[usize],
    feature: usize,
    params: &TreeParams,
) -> Option<SplitCandidate> {
    if indices.len() < 2 {
        return None;
    }
    let mut sorted: Vec<(usize, f64)> = indices.iter().map(|&i| (i, view.x[[i, feature]])).collect();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

    let total_g: f64 = indices.iter().map(|&i| view.gradients[i]).sum();
    let total_h: f64 = indices.iter().map(|&i| view.hessians[i]).sum();
    let base_score = compute_gain_single(total_g, total_h, params.reg_lambda);

    let mut left_g = 0.0;
    let mut left_h = 0.0;
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = 0.0;
    let mut best_pos = 0;

    for i in 0..sorted.len() - 1 {
        left_g += view.gradients[sorted[i].0];
        left_h += view.hessians[sorted[i].0];

        if i + 1 < params.min_child_samples || sorted.len() - i - 1 < params.min_child_samples {
            continue;
        }
        if sorted[i].1 == sorted[i + 1].1 {
            continue;
        }

        let gain = compute_gain_single(left_g, left_h, params.reg_lambda)
            + compute_gain_single(total_g - left_g, total_h - left_h, params.reg_lambda)
            - base_score;

        if gain > best_gain {
            best_gain = gain;
            best_threshold = (sorted[i].1 + sorted[i + 1].1) / 2.0;
            best_pos = i + 1;
        }
    }

    if best_gain <= 1e-12 {
        return None;
    }

    Some(SplitCandidate {
        feature,
        threshold: best_threshold,
        gain: best_gain,
        left: sorted[..best_pos].iter().map(|&(i, _)| i).collect(),
        right: sorted[best_pos..].iter().map(|&(i, _)| i).collect(),
    })
}

fn best_split(
    view: &GradientView<'_>,
    indices: &[usize],
    features: &[usize],
    params: &TreeParams,
) -> Option<SplitCandidate> {
    if indices.len() < params.min_child_samples.max(1) * 2 {
        return None;
    }
    features
        .par_iter()
        .filter_map(|&f| best_split_for_feature(view, indices, f, params))
        .max_by(|a, b| a.gain.total_cmp(&b.gain).then_with(|| b.feature.cmp(&a.feature)))
}

/// Leaf-wise (best-first) growth bounded by `max_leaves`
pub fn build_leafwise_tree(
    view: &GradientView<'_>,
    indices: &[usize],
    features: &[usize],
    params: &TreeParams,
) -> TreeNode {
    struct Pending {
        node_id: usize,
        split: SplitCandidate,
    }
    impl PartialEq for Pending {
        fn eq(&self, other: &Self) -> bool {
            self.split.gain == other.split.gain
        }
    }
    impl Eq for Pending {}
    impl PartialOrd for Pending {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for Pending {
        fn cmp(&self, other: &Self) -> Ordering {
            self.split.gain.total_cmp(&other.split.gain)
        }
    }

    enum Slot {
        Leaf(Vec<usize>),
        Split { feature: usize, threshold: f64, left: usize, right: usize },
    }

    let mut nodes = vec![Slot::Leaf(indices.to_vec())];
    let mut depths = vec![0usize];
    let mut heap = BinaryHeap::new();

    if let Some(split) = best_split(view, indices, features, params) {
        heap.push(Pending { node_id: 0, split });
    }

    let mut n_leaves = 1usize;
    while n_leaves < params.max_leaves {
        let Some(Pending { node_id, split }) = heap.pop() else {
            break;
        };
        let depth = depths[node_id];
        if depth >= params.max_depth {
            continue;
        }

        let left_id = nodes.len();
        let right_id = left_id + 1;
        for (child_id, child) in [(left_id, &split.left), (right_id, &split.right)] {
            if depth + 1 < params.max_depth {
                if let Some(child_split) = best_split(view, child, features, params) {
                    heap.push(Pending { node_id: child_id, split: child_split });
                }
            }
        }
        nodes.push(Slot::Leaf(split.left));
        nodes.push(Slot::Leaf(split.right));
        depths.push(depth + 1);
        depths.push(depth + 1);
        nodes[node_id] = Slot::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        n_leaves += 1;
    }

    fn to_node(nodes: &[Slot], idx: usize, view: &GradientView<'_>, params: &TreeParams) -> TreeNode {
        match &nodes[idx] {
            Slot::Leaf(indices) => make_leaf(view, indices, params),
            Slot::Split { feature, threshold, left, right } => TreeNode::Split {
                feature: *feature,
                threshold: *threshold,
                left: Box::new(to_node(nodes, *left, view, params)),
                right: Box::new(to_node(nodes, *right, view, params)),
            },
        }
    }
    to_node(&nodes, 0, view, params)
}

/// Depth-wise (level-order) growth: every node splits until `max_depth`,
/// then `max_leaves` caps the total
pub fn build_depthwise_tree(
    view: &GradientView<'_>,
    indices: &[usize],
    features: &[usize],
    params: &TreeParams,
) -> TreeNode {
    fn grow(
        view: &GradientView<'_>,
        indices: &[usize],
        features: &[usize],
        params: &TreeParams,
        depth: usize,
        leaf_budget: &mut usize,
    ) -> TreeNode {
        if depth >= params.max_depth || *leaf_budget == 0 {
            return make_leaf(view, indices, params);
        }
        match best_split(view, indices, features, params) {
            Some(split) => {
                *leaf_budget -= 1;
                let left = grow(view, &split.left, features, params, depth + 1, leaf_budget);
                let right = grow(view, &split.right, features, params, depth + 1, leaf_budget);
                TreeNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            None => make_leaf(view, indices, params),
        }
    }

    let mut budget = params.max_leaves.saturating_sub(1);
    grow(view, indices, features, params, 0, &mut budget)
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Array2<f64>, Vec<f64>, Vec<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        // gradient of squared loss at 0 against a step target
        let g: Vec<f64> = (0..40).map(|i| if i < 20 { 1.0 } else { -1.0 }).collect();
        let h = vec![1.0; 40];
        (x, g, h)
    }

    fn params() -> TreeParams {
        TreeParams {
            max_leaves: 4,
            max_depth: 3,
            min_child_samples: 2,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
        }
    }

    #[test]
    fn test_leafwise_finds_step() {
        let (x, g, h) = step_data();
        let view = GradientView { x: &x, gradients: &g, hessians: &h };
        let idx: Vec<usize> = (0..40).collect();
        let tree = build_leafwise_tree(&view, &idx, &[0, 1], &params());

        match &tree {
            TreeNode::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert!((*threshold - 19.5).abs() < 1e-9);
            }
            TreeNode::Leaf { .. } => panic!("expected a split"),
        }
        assert!(tree.n_leaves() <= 4);
        assert!(tree.predict(x.row(0)) < 0.0);
        assert!(tree.predict(x.row(39)) > 0.0);
    }

    #[test]
    fn test_depthwise_respects_depth() {
        let (x, g, h) = step_data();
        let view = GradientView { x: &x, gradients: &g, hessians: &h };
        let idx: Vec<usize> = (0..40).collect();
        let p = TreeParams { max_depth: 1, max_leaves: 64, ..params() };
        let tree = build_depthwise_tree(&view, &idx, &[0, 1], &p);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_constant_gradients_give_leaf() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let g = vec![0.5; 10];
        let h = vec![1.0; 10];
        let view = GradientView { x: &x, gradients: &g, hessians: &h };
        let idx: Vec<usize> = (0..10).collect();
        let tree = build_leafwise_tree(&view, &idx, &[0], &params());
        assert!(matches!(tree, TreeNode::Leaf { .. }));
    }
}
