//! Dynamic bounding volume tree
//!
//! A self-balancing binary tree of axis-aligned boxes. Leaves carry one
//! object key each; internal nodes bound the merge of their two children.
//! Nodes live in an index arena with a free list, so removing and inserting
//! objects every frame does not grow memory without bound.
//!
//! Insertion descends greedily by surface-area cost: at each internal node
//! it compares the cost of pairing the new leaf with the whole node against
//! the cost of descending into either child. Every ancestor of a changed
//! node is refit and rebalanced with rotations, keeping the depths of two
//! siblings within one of each other.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use log::{trace, warn};

use crate::physics::collision::{BoundingSphere, OrientedBox, Ray};

use super::spatial_query::QueryShape;
use super::AABB;

/// Default ratio between the re-insertion threshold and the leaf margin
pub const DEFAULT_OVERSIZE_FACTOR: f32 = 4.0;

/// Single node in the tree arena
#[derive(Debug, Clone)]
struct TreeNode<K> {
    /// Bounds of the subtree (fattened bounds for leaves)
    aabb: AABB,
    parent: Option<usize>,
    /// Both children of an internal node, `None` for leaves and free nodes
    children: Option<[usize; 2]>,
    /// Object key of a leaf
    object: Option<K>,
    /// Height of the subtree, 0 for leaves
    depth: u32,
}

impl<K> TreeNode<K> {
    fn new(aabb: AABB, object: Option<K>) -> Self {
        Self {
            aabb,
            parent: None,
            children: None,
            object,
            depth: 0,
        }
    }
}

/// Dynamic AABB tree keyed by an object identifier
#[derive(Debug, Clone)]
pub struct BoundingTree<K> {
    nodes: Vec<TreeNode<K>>,
    free_ids: Vec<usize>,
    leaf_ids: HashMap<K, usize>,
    root: Option<usize>,
    oversize_factor: f32,
}

impl<K> Default for BoundingTree<K>
where
    K: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> BoundingTree<K>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_ids: Vec::new(),
            leaf_ids: HashMap::new(),
            root: None,
            oversize_factor: DEFAULT_OVERSIZE_FACTOR,
        }
    }

    /// Create an empty tree with a custom oversize factor for [`Self::move_object`]
    pub fn with_oversize_factor(oversize_factor: f32) -> Self {
        Self {
            oversize_factor: oversize_factor.max(1.0),
            ..Self::new()
        }
    }

    /// Bulk-build a tree from a complete set of objects.
    ///
    /// Builds top-down by median split along the longest axis of the box
    /// centers, which yields a balanced tree without any rotations.
    /// Duplicate keys after the first are ignored.
    pub fn build(items: impl IntoIterator<Item = (K, AABB)>, margin: f32) -> Self {
        let mut tree = Self::new();
        tree.rebuild(items, margin);
        tree
    }

    /// Replace the whole content of the tree, see [`Self::build`]
    pub fn rebuild(&mut self, items: impl IntoIterator<Item = (K, AABB)>, margin: f32) {
        self.clear();

        let mut leaves = Vec::new();
        for (id, aabb) in items {
            if self.leaf_ids.contains_key(&id) {
                warn!("Ignoring duplicate bounding tree object {id:?} in bulk build");
                continue;
            }
            let leaf = self.alloc_node(aabb.expanded(margin), Some(id));
            self.leaf_ids.insert(id, leaf);
            leaves.push(leaf);
        }

        if !leaves.is_empty() {
            let root = self.build_subtree(&mut leaves);
            self.root = Some(root);
        }
    }

    /// Number of objects stored in the tree
    pub fn len(&self) -> usize {
        self.leaf_ids.len()
    }

    /// True if the tree holds no objects
    pub fn is_empty(&self) -> bool {
        self.leaf_ids.is_empty()
    }

    /// Size of the node arena, including free nodes
    pub fn allocated_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Height of the tree (0 for a single leaf, 0 when empty)
    pub fn depth(&self) -> u32 {
        self.root.map_or(0, |root| self.nodes[root].depth)
    }

    /// Check if an object is stored
    pub fn contains(&self, id: K) -> bool {
        self.leaf_ids.contains_key(&id)
    }

    /// Fattened box currently stored for an object
    pub fn fat_aabb(&self, id: K) -> Option<AABB> {
        self.leaf_ids.get(&id).map(|&leaf| self.nodes[leaf].aabb)
    }

    /// Remove every object
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_ids.clear();
        self.leaf_ids.clear();
        self.root = None;
    }

    /// Insert an object, expanding its box by `margin` on every axis.
    ///
    /// Inserting a key that is already present replaces the old entry.
    pub fn insert(&mut self, id: K, aabb: AABB, margin: f32) {
        if self.leaf_ids.contains_key(&id) {
            warn!("Bounding tree object {id:?} inserted twice, replacing previous entry");
            self.remove(id);
        }

        let leaf = self.alloc_node(aabb.expanded(margin), Some(id));
        self.leaf_ids.insert(id, leaf);
        self.insert_leaf(leaf);
    }

    /// Update an object's box.
    ///
    /// Nothing happens while the stored fattened box still contains `aabb`
    /// and is not oversized; otherwise the leaf is removed and re-inserted.
    /// Returns `true` if the tree was restructured. Unknown ids are ignored.
    pub fn move_object(&mut self, id: K, aabb: AABB, margin: f32) -> bool {
        let Some(&leaf) = self.leaf_ids.get(&id) else {
            return false;
        };

        let fat = self.nodes[leaf].aabb;
        if fat.contains(&aabb) {
            let oversized_limit = aabb.expanded(margin * self.oversize_factor);
            if oversized_limit.contains(&fat) {
                return false;
            }
        }

        self.remove_leaf(leaf);
        self.nodes[leaf].aabb = aabb.expanded(margin);
        self.insert_leaf(leaf);
        true
    }

    /// Remove an object. Returns `false` if it was not present.
    pub fn remove(&mut self, id: K) -> bool {
        let Some(leaf) = self.leaf_ids.remove(&id) else {
            return false;
        };

        self.remove_leaf(leaf);
        self.free_node(leaf);
        true
    }

    /// Every object whose node box overlaps `shape` (broad phase only)
    pub fn get_bounded_object_ids(&self, shape: &QueryShape) -> Vec<K> {
        let mut ids = Vec::new();
        let Some(root) = self.root else {
            return ids;
        };

        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !shape.overlaps(&node.aabb) {
                continue;
            }

            match node.children {
                Some([first, second]) => {
                    stack.push(second);
                    stack.push(first);
                }
                None => {
                    if let Some(id) = node.object {
                        ids.push(id);
                    }
                }
            }
        }
        ids
    }

    /// Objects whose boxes a ray touches within `max_distance`
    pub fn query_ray(&self, ray: Ray, max_distance: f32) -> Vec<K> {
        self.get_bounded_object_ids(&QueryShape::ray(ray, max_distance))
    }

    /// Objects whose boxes overlap an AABB
    pub fn query_aabb(&self, aabb: AABB) -> Vec<K> {
        self.get_bounded_object_ids(&QueryShape::Aabb(aabb))
    }

    /// Objects whose boxes overlap an oriented box
    pub fn query_obb(&self, obb: OrientedBox) -> Vec<K> {
        self.get_bounded_object_ids(&QueryShape::Obb(obb))
    }

    /// Objects whose boxes overlap a sphere
    pub fn query_sphere(&self, sphere: BoundingSphere) -> Vec<K> {
        self.get_bounded_object_ids(&QueryShape::Sphere(sphere))
    }

    /// Check the structural invariants of the tree
    pub fn validate(&self) -> Result<(), String> {
        let Some(root) = self.root else {
            return if self.leaf_ids.is_empty() {
                Ok(())
            } else {
                Err("Tree has objects but no root".to_string())
            };
        };

        if self.nodes[root].parent.is_some() {
            return Err(format!("Root node {root} has a parent"));
        }

        let mut visited = 0usize;
        let mut leaves = 0usize;
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            visited += 1;
            let node = &self.nodes[index];

            match node.children {
                Some([first, second]) => {
                    for child in [first, second] {
                        if self.nodes[child].parent != Some(index) {
                            return Err(format!("Node {child} does not point back to parent {index}"));
                        }
                    }
                    let (a, b) = (&self.nodes[first], &self.nodes[second]);
                    if node.aabb != a.aabb.merged(&b.aabb) {
                        return Err(format!("Node {index} does not bound its children exactly"));
                    }
                    if node.depth != 1 + a.depth.max(b.depth) {
                        return Err(format!("Node {index} has stale depth {}", node.depth));
                    }
                    if a.depth.abs_diff(b.depth) > 1 {
                        return Err(format!(
                            "Node {index} is unbalanced: child depths {} and {}",
                            a.depth, b.depth
                        ));
                    }
                    if node.object.is_some() {
                        return Err(format!("Internal node {index} holds an object"));
                    }
                    stack.push(first);
                    stack.push(second);
                }
                None => {
                    let Some(id) = node.object else {
                        return Err(format!("Leaf {index} holds no object"));
                    };
                    if self.leaf_ids.get(&id) != Some(&index) {
                        return Err(format!("Leaf {index} is not registered for {id:?}"));
                    }
                    if node.depth != 0 {
                        return Err(format!("Leaf {index} has non-zero depth"));
                    }
                    leaves += 1;
                }
            }
        }

        if leaves != self.leaf_ids.len() {
            return Err(format!("{leaves} leaves reachable, {} registered", self.leaf_ids.len()));
        }
        if visited + self.free_ids.len() != self.nodes.len() {
            return Err("Node arena has leaked nodes".to_string());
        }
        Ok(())
    }

    fn alloc_node(&mut self, aabb: AABB, object: Option<K>) -> usize {
        if let Some(index) = self.free_ids.pop() {
            self.nodes[index] = TreeNode::new(aabb, object);
            index
        } else {
            self.nodes.push(TreeNode::new(aabb, object));
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, index: usize) {
        debug_assert!(!self.free_ids.contains(&index), "bounding tree node {index} freed twice");
        if index >= self.nodes.len() {
            return;
        }

        let node = &mut self.nodes[index];
        node.parent = None;
        node.children = None;
        node.object = None;
        node.depth = 0;
        self.free_ids.push(index);

        // Shrink to fit once nothing is in use
        if self.free_ids.len() == self.nodes.len() {
            trace!("Bounding tree emptied, releasing {} nodes", self.nodes.len());
            self.nodes.clear();
            self.free_ids.clear();
            self.root = None;
        }
    }

    fn build_subtree(&mut self, leaves: &mut [usize]) -> usize {
        if leaves.len() == 1 {
            return leaves[0];
        }

        let nodes = &self.nodes;
        let mut centers = AABB::new(nodes[leaves[0]].aabb.center(), nodes[leaves[0]].aabb.center());
        for &leaf in leaves.iter() {
            let center = nodes[leaf].aabb.center();
            centers = centers.merged(&AABB::new(center, center));
        }
        let size = centers.max - centers.min;
        let axis = if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        };

        leaves.sort_by(|&a, &b| {
            nodes[a].aabb.center()[axis]
                .total_cmp(&nodes[b].aabb.center()[axis])
                .then(a.cmp(&b))
        });

        let mid = leaves.len() / 2;
        let (left, right) = leaves.split_at_mut(mid);
        let first = self.build_subtree(left);
        let second = self.build_subtree(right);

        let parent = self.alloc_node(self.nodes[first].aabb.merged(&self.nodes[second].aabb), None);
        self.nodes[parent].children = Some([first, second]);
        self.nodes[parent].depth = 1 + self.nodes[first].depth.max(self.nodes[second].depth);
        self.nodes[first].parent = Some(parent);
        self.nodes[second].parent = Some(parent);
        parent
    }

    fn insert_leaf(&mut self, leaf: usize) {
        let Some(root) = self.root else {
            self.nodes[leaf].parent = None;
            self.root = Some(leaf);
            return;
        };

        let leaf_aabb = self.nodes[leaf].aabb;
        let sibling = self.find_best_sibling(root, &leaf_aabb);

        let old_parent = self.nodes[sibling].parent;
        let merged = leaf_aabb.merged(&self.nodes[sibling].aabb);
        let new_parent = self.alloc_node(merged, None);
        self.nodes[new_parent].parent = old_parent;
        self.nodes[new_parent].children = Some([sibling, leaf]);
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);

        match old_parent {
            Some(parent) => self.replace_child(parent, sibling, new_parent),
            None => self.root = Some(new_parent),
        }

        self.refit_upward(Some(new_parent));
    }

    /// Greedy surface-area descent. Stops when pairing with the current node
    /// is cheaper than descending into either child.
    fn find_best_sibling(&self, root: usize, leaf_aabb: &AABB) -> usize {
        let mut index = root;
        while let Some([first, second]) = self.nodes[index].children {
            let node_aabb = &self.nodes[index].aabb;
            let area = node_aabb.surface_area();
            let combined_area = node_aabb.merged(leaf_aabb).surface_area();

            // Cost of creating a new parent for this node and the new leaf
            let cost = 2.0 * combined_area;
            // Minimum cost pushed down to every ancestor
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost_first = self.descend_cost(first, leaf_aabb) + inheritance_cost;
            let cost_second = self.descend_cost(second, leaf_aabb) + inheritance_cost;

            if cost < cost_first && cost < cost_second {
                break;
            }

            index = if cost_first < cost_second {
                first
            } else if cost_second < cost_first {
                second
            } else {
                first.min(second)
            };
        }
        index
    }

    fn descend_cost(&self, child: usize, leaf_aabb: &AABB) -> f32 {
        let node = &self.nodes[child];
        let merged_area = node.aabb.merged(leaf_aabb).surface_area();
        if node.children.is_none() {
            merged_area
        } else {
            merged_area - node.aabb.surface_area()
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let Some(parent) = self.nodes[leaf].parent else {
            debug_assert!(false, "bounding tree leaf {leaf} is detached");
            return;
        };
        let Some([first, second]) = self.nodes[parent].children else {
            debug_assert!(false, "bounding tree parent {parent} has no children");
            return;
        };

        let sibling = if first == leaf { second } else { first };
        let grandparent = self.nodes[parent].parent;

        self.nodes[sibling].parent = grandparent;
        match grandparent {
            Some(grandparent) => self.replace_child(grandparent, parent, sibling),
            None => self.root = Some(sibling),
        }
        self.nodes[leaf].parent = None;
        self.free_node(parent);

        self.refit_upward(grandparent);
    }

    fn replace_child(&mut self, parent: usize, old_child: usize, new_child: usize) {
        if let Some(children) = self.nodes[parent].children.as_mut() {
            for child in children.iter_mut() {
                if *child == old_child {
                    *child = new_child;
                }
            }
        }
    }

    fn refit_node(&mut self, index: usize) {
        if let Some([first, second]) = self.nodes[index].children {
            let aabb = self.nodes[first].aabb.merged(&self.nodes[second].aabb);
            let depth = 1 + self.nodes[first].depth.max(self.nodes[second].depth);
            let node = &mut self.nodes[index];
            node.aabb = aabb;
            node.depth = depth;
        }
    }

    fn refit_upward(&mut self, start: Option<usize>) {
        let mut index = start;
        while let Some(current) = index {
            self.refit_node(current);
            let subtree_root = self.balance(current);
            index = self.nodes[subtree_root].parent;
        }
    }

    /// Rotate the deeper child of `a` above it when the child depths differ
    /// by more than one. Returns the node now at `a`'s former position.
    fn balance(&mut self, a: usize) -> usize {
        let Some([b, c]) = self.nodes[a].children else {
            return a;
        };

        let depth_b = self.nodes[b].depth;
        let depth_c = self.nodes[c].depth;
        if depth_b.abs_diff(depth_c) <= 1 {
            return a;
        }

        let (tall_slot, tall) = if depth_c > depth_b { (1, c) } else { (0, b) };
        let Some([f, g]) = self.nodes[tall].children else {
            return a;
        };

        // The deeper grandchild stays under the promoted node
        let (keep, give) = match self.nodes[f].depth.cmp(&self.nodes[g].depth) {
            std::cmp::Ordering::Greater => (f, g),
            std::cmp::Ordering::Less => (g, f),
            std::cmp::Ordering::Equal if f < g => (f, g),
            std::cmp::Ordering::Equal => (g, f),
        };

        // Promote `tall` into the slot of `a`
        let parent = self.nodes[a].parent;
        self.nodes[tall].parent = parent;
        match parent {
            Some(parent) => self.replace_child(parent, a, tall),
            None => self.root = Some(tall),
        }
        self.nodes[tall].children = Some([a, keep]);
        self.nodes[a].parent = Some(tall);

        // `a` adopts the shallower grandchild in place of `tall`
        let mut a_children = [b, c];
        a_children[tall_slot] = give;
        self.nodes[a].children = Some(a_children);
        self.nodes[give].parent = Some(a);

        self.refit_node(a);
        self.balance(a);
        self.refit_node(tall);
        tall
    }
}
