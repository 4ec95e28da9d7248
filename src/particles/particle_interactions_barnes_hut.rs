//! Barnes-Hut quadtree over the particles of one tick.
//!
//! Nodes live in a flat arena and refer to their children by index, so a rebuild is
//! a single `clear` of the arena followed by re-insertion. Every node keeps a running
//! center of mass and total mass of everything inserted beneath it.
use glam::DVec2;

use crate::particles::{pairwise_acceleration, Particle};
use crate::utils::{Rectangle, SimulationConfig, SimulationError};

/// Sentinel stored in `first_child` by leaves.
pub const NO_CHILD: u32 = u32::MAX;

const ROOT: usize = 0;

/// A particle as seen by the tree: its index in the particle slice (its identity),
/// its position and its mass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    pub index: usize,
    pub position: DVec2,
    pub mass: f64,
}

impl Body {
    pub fn from_particle(index: usize, particle: &Particle) -> Self {
        Body {
            index,
            position: particle.position(),
            mass: particle.mass(),
        }
    }
}

/// Mass-weighted center and total mass of a subtree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GravityField {
    pub center: DVec2,
    pub mass: f64,
}

impl GravityField {
    fn empty(center: DVec2) -> Self {
        GravityField { center, mass: 0.0 }
    }

    fn add(&mut self, position: DVec2, mass: f64) {
        let total = self.mass + mass;
        self.center = (self.center * self.mass + position * mass) / total;
        self.mass = total;
    }
}

/// Values the tree needs to build itself and answer force queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeParams {
    pub theta: f64,
    pub gravitational_constant: f64,
    pub softening: f64,
    pub leaf_capacity: usize,
    pub max_depth: u8,
}

impl From<&SimulationConfig> for TreeParams {
    fn from(config: &SimulationConfig) -> Self {
        TreeParams {
            theta: config.theta,
            gravitational_constant: config.gravitational_constant,
            softening: config.softening,
            leaf_capacity: config.leaf_capacity,
            max_depth: config.max_depth,
        }
    }
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams::from(&SimulationConfig::default())
    }
}

#[derive(Clone, Debug)]
struct Node {
    boundary: Rectangle,
    depth: u8,
    field: GravityField,
    first_child: u32,
    bodies: Vec<Body>,
}

impl Node {
    fn new(boundary: Rectangle, depth: u8) -> Self {
        Node {
            boundary,
            depth,
            field: GravityField::empty(boundary.center()),
            first_child: NO_CHILD,
            bodies: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.first_child == NO_CHILD
    }

    fn children(&self) -> Option<[usize; 4]> {
        if self.is_leaf() {
            return None;
        }
        let first = self.first_child as usize;
        Some([first, first + 1, first + 2, first + 3])
    }
}

/// Read-only view of one node, for debug drawing and inspection.
#[derive(Clone, Copy, Debug)]
pub struct NodeView<'a> {
    pub id: usize,
    pub boundary: Rectangle,
    pub depth: u8,
    pub mass: f64,
    pub center_of_mass: DVec2,
    /// Child node ids in NW, NE, SW, SE order, `None` for leaves.
    pub children: Option<[usize; 4]>,
    /// Bodies held directly; always empty for internal nodes.
    pub bodies: &'a [Body],
}

impl NodeView<'_> {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Shape summary of a built tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub node_count: usize,
    pub leaf_count: usize,
    pub body_count: usize,
    pub max_depth: u8,
    /// Leaves holding more bodies than the nominal capacity because they hit the depth cap.
    pub overflowing_leaves: usize,
}

/// Barnes-Hut quadtree stored in an index arena.
///
/// # Examples
///
/// ```
/// use glam::DVec2;
/// use rs_nbody::particles::{Particle, QuadTree, TreeParams};
/// use rs_nbody::utils::Rectangle;
///
/// let particles = vec![
///     Particle::new(DVec2::new(-50.0, 0.0), DVec2::ZERO, 1.0e10).unwrap(),
///     Particle::new(DVec2::new(50.0, 0.0), DVec2::ZERO, 1.0e10).unwrap(),
/// ];
/// let world = Rectangle::new(0.0, 0.0, 100.0, 100.0);
/// let tree = QuadTree::build(world, TreeParams::default(), &particles).unwrap();
///
/// assert_eq!(tree.root().mass, 2.0e10);
/// let a = tree.solve_attraction(0, particles[0].position());
/// assert!(a.x > 0.0);
/// ```
#[derive(Clone, Debug)]
pub struct QuadTree {
    nodes: Vec<Node>,
    params: TreeParams,
}

impl QuadTree {
    /// Creates a tree holding a single empty leaf covering `boundary`.
    pub fn new(boundary: Rectangle, params: TreeParams) -> Self {
        QuadTree {
            nodes: vec![Node::new(boundary, 0)],
            params,
        }
    }

    /// Creates a tree and inserts every particle in slice order.
    pub fn build(boundary: Rectangle, params: TreeParams, particles: &[Particle]) -> Result<Self, SimulationError> {
        let mut tree = QuadTree::new(boundary, params);
        tree.rebuild(particles)?;
        Ok(tree)
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn set_params(&mut self, params: TreeParams) {
        self.params = params;
    }

    pub fn boundary(&self) -> Rectangle {
        self.nodes[ROOT].boundary
    }

    /// Drops every node and inserts `particles` into a fresh root over the same region.
    ///
    /// The arena keeps its allocation between rebuilds.
    ///
    /// # Errors
    ///
    /// Returns `SimulationError::InsertionOutOfBounds` for the first particle outside the root
    /// region; the tree then holds only the particles inserted before it.
    pub fn rebuild(&mut self, particles: &[Particle]) -> Result<(), SimulationError> {
        self.reset(self.boundary());
        for (index, particle) in particles.iter().enumerate() {
            let body = Body::from_particle(index, particle);
            if !self.insert(body) {
                return Err(SimulationError::InsertionOutOfBounds {
                    index,
                    position: body.position,
                });
            }
        }
        debug_assert!(self.check_invariants(), "quadtree invariants violated after rebuild");
        Ok(())
    }

    /// Empties the arena and starts over with a single leaf covering `boundary`.
    pub fn reset(&mut self, boundary: Rectangle) {
        self.nodes.clear();
        self.nodes.push(Node::new(boundary, 0));
    }

    /// Inserts a body, returning `false` if it lies outside the root region.
    pub fn insert(&mut self, body: Body) -> bool {
        if !self.nodes[ROOT].boundary.contains(body.position) {
            return false;
        }
        self.insert_at(ROOT, body);
        true
    }

    fn insert_at(&mut self, start: usize, body: Body) {
        let mut node = start;
        loop {
            self.nodes[node].field.add(body.position, body.mass);
            if self.nodes[node].is_leaf() {
                let leaf = &mut self.nodes[node];
                if leaf.bodies.len() < self.params.leaf_capacity || leaf.depth >= self.params.max_depth {
                    leaf.bodies.push(body);
                    return;
                }
                self.subdivide(node);
            }
            node = self.child_containing(node, body.position);
        }
    }

    fn child_containing(&self, node: usize, position: DVec2) -> usize {
        let parent = &self.nodes[node];
        parent.first_child as usize + parent.boundary.quadrant_index(position)
    }

    fn subdivide(&mut self, node: usize) {
        let first = self.nodes.len();
        let depth = self.nodes[node].depth + 1;
        for quadrant in self.nodes[node].boundary.quadrants() {
            self.nodes.push(Node::new(quadrant, depth));
        }
        self.nodes[node].first_child = first as u32;

        // The parent's field already accounts for these bodies.
        let held = std::mem::take(&mut self.nodes[node].bodies);
        for body in held {
            let child = self.child_containing(node, body.position);
            self.insert_at(child, body);
        }
    }

    /// Net approximate acceleration on the body with identity `index` located at `position`.
    ///
    /// Children are visited in a fixed order, so the result depends only on the tree
    /// and never on which thread asks.
    pub fn solve_attraction(&self, index: usize, position: DVec2) -> DVec2 {
        let mut acceleration = DVec2::ZERO;
        self.solve_node(ROOT, index, position, &mut acceleration);
        acceleration
    }

    /// Adds the tree's pull on `particles[index]` to that particle's accumulator.
    pub fn apply_to(&self, index: usize, particle: &mut Particle) {
        let acceleration = self.solve_attraction(index, particle.position());
        particle.accumulate(acceleration);
    }

    fn solve_node(&self, node: usize, index: usize, position: DVec2, acceleration: &mut DVec2) {
        let TreeParams {
            theta,
            gravitational_constant: g,
            softening,
            ..
        } = self.params;
        let current = &self.nodes[node];
        match current.children() {
            None => {
                for body in &current.bodies {
                    if body.index != index {
                        *acceleration += pairwise_acceleration(position, body.position, body.mass, g, softening);
                    }
                }
            }
            Some(children) => {
                let s = current.boundary.half_width() * 2.0;
                let d = position.distance(current.field.center);
                // s / d < theta, written to stay finite when d is zero.
                if s < theta * d {
                    *acceleration += pairwise_acceleration(position, current.field.center, current.field.mass, g, softening);
                } else {
                    for child in children {
                        self.solve_node(child, index, position, acceleration);
                    }
                }
            }
        }
    }

    /// Indices of every body inside `range`.
    pub fn query(&self, range: &Rectangle) -> Vec<usize> {
        let mut found = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(node) = stack.pop() {
            let current = &self.nodes[node];
            if !current.boundary.intersects(range) {
                continue;
            }
            found.extend(
                current
                    .bodies
                    .iter()
                    .filter(|body| range.contains(body.position))
                    .map(|body| body.index),
            );
            if let Some(children) = current.children() {
                stack.extend(children);
            }
        }
        found.sort_unstable();
        found
    }

    /// Number of bodies held by the tree.
    pub fn len(&self) -> usize {
        self.nodes.iter().map(|node| node.bodies.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[ROOT].field.mass == 0.0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> NodeView<'_> {
        self.node(ROOT)
    }

    /// # Panics
    ///
    /// Panics if `id` is not a node of this tree.
    pub fn node(&self, id: usize) -> NodeView<'_> {
        let node = &self.nodes[id];
        NodeView {
            id,
            boundary: node.boundary,
            depth: node.depth,
            mass: node.field.mass,
            center_of_mass: node.field.center,
            children: node.children(),
            bodies: &node.bodies,
        }
    }

    /// Every node in arena order; a parent always precedes its children.
    pub fn nodes(&self) -> impl Iterator<Item = NodeView<'_>> + '_ {
        (0..self.nodes.len()).map(move |id| self.node(id))
    }

    /// Node rectangles and depths down to `depth_limit`, for grid overlays.
    pub fn boundaries(&self, depth_limit: u8) -> Vec<(Rectangle, u8)> {
        self.nodes
            .iter()
            .filter(|node| node.depth <= depth_limit)
            .map(|node| (node.boundary, node.depth))
            .collect()
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            node_count: self.nodes.len(),
            ..TreeStats::default()
        };
        for node in self.nodes.iter().filter(|node| node.is_leaf()) {
            stats.leaf_count += 1;
            stats.body_count += node.bodies.len();
            stats.max_depth = stats.max_depth.max(node.depth);
            if node.bodies.len() > self.params.leaf_capacity {
                stats.overflowing_leaves += 1;
            }
        }
        stats
    }

    /// Verifies that no node holds both children and bodies and that every node's mass
    /// equals the mass of its subtree.
    pub fn check_invariants(&self) -> bool {
        self.subtree_mass_checked(ROOT).is_some()
    }

    fn subtree_mass_checked(&self, node: usize) -> Option<f64> {
        let current = &self.nodes[node];
        let mass = match current.children() {
            None => current.bodies.iter().map(|body| body.mass).sum(),
            Some(children) => {
                if !current.bodies.is_empty() {
                    return None;
                }
                let mut total = 0.0;
                for child in children {
                    total += self.subtree_mass_checked(child)?;
                }
                total
            }
        };
        let tolerance = 1e-9 * mass.abs().max(1.0);
        ((current.field.mass - mass).abs() <= tolerance).then_some(mass)
    }
}

/// Exact O(N²) acceleration on `particles[index]` from every other particle.
pub fn brute_force_acceleration(particles: &[Particle], index: usize, g: f64, softening: f64) -> DVec2 {
    let target = particles[index].position();
    particles
        .iter()
        .enumerate()
        .filter(|(other, _)| *other != index)
        .fold(DVec2::ZERO, |acc, (_, other)| {
            acc + pairwise_acceleration(target, other.position(), other.mass(), g, softening)
        })
}
