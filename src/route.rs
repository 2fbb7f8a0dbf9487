//! Path search between snapped points.
//!
//! Searches start and end on virtual nodes placed on the snapped edges, so
//! partial edges at both ends are costed exactly.

use priority_queue::PriorityQueue;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::geo::haversine_distance;
use crate::snap::Snap;
use crate::weighting::Weighting;

/// Part of an edge traversed by a path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPiece {
    pub edge: u32,
    pub reverse: bool,
    /// Fractions along the edge's stored orientation; `start > end` when reversed
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub pieces: Vec<PathPiece>,
    pub weight: f64,
    /// Metres
    pub distance: f64,
    /// Seconds
    pub duration: f64,
}

impl Path {
    fn from_pieces(w: &Weighting, pieces: Vec<PathPiece>) -> Self {
        let mut path = Path {
            pieces,
            ..Default::default()
        };
        for p in &path.pieces {
            let len = piece_length(w, p);
            path.distance += len;
            path.duration += w.duration(p.edge, p.reverse, len);
            path.weight += w.weight(p.edge, p.reverse, len);
        }
        path
    }

    /// Distance shared with `other`, metres
    pub fn shared_distance(&self, w: &Weighting, other: &Path) -> f64 {
        let mine: FxHashMap<u32, f64> = self
            .pieces
            .iter()
            .map(|p| (p.edge, piece_length(w, p)))
            .collect();
        other
            .pieces
            .iter()
            .filter_map(|p| mine.get(&p.edge).map(|l| l.min(piece_length(w, p))))
            .sum()
    }
}

pub fn piece_length(w: &Weighting, p: &PathPiece) -> f64 {
    (p.end - p.start).abs() * w.graph.edges[p.edge as usize].distance
}

/// Allowed directions to leave the start snap in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub forward: bool,
    pub reverse: bool,
}

impl Default for Departure {
    fn default() -> Self {
        Self {
            forward: true,
            reverse: true,
        }
    }
}

impl Departure {
    fn allows(&self, reverse: bool) -> bool {
        if reverse {
            self.reverse
        } else {
            self.forward
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Parent {
    Start { reverse: bool },
    Edge { edge: u32, reverse: bool, prev: u32 },
}

#[derive(Clone, Copy, Debug)]
struct Label {
    weight: f64,
    parent: Parent,
}

// State for A*
#[derive(Clone, Copy, Debug)]
struct AStarState {
    node: u32,
    cost: f64,
    estimated_total: f64,
}

impl PartialEq for AStarState {
    fn eq(&self, other: &Self) -> bool {
        self.estimated_total == other.estimated_total
    }
}

impl Eq for AStarState {}

impl PartialOrd for AStarState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AStarState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other
            .estimated_total
            .partial_cmp(&self.estimated_total)
            .unwrap_or(Ordering::Equal)
    }
}

/// Multiplicative per-edge penalties, used for alternative routes
pub type Penalties = FxHashMap<u32, f64>;

/// Settled node count after which a search gives up
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_visited_nodes: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_visited_nodes: usize::MAX,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Finish {
    Direct { reverse: bool },
    ViaNode { node: u32, reverse: bool },
}

/// A* from `from` to `to`. `None` when no path exists within the limits.
pub fn find_path(
    w: &Weighting,
    from: &Snap,
    to: &Snap,
    departure: Departure,
    penalties: Option<&Penalties>,
    limits: SearchLimits,
) -> Option<Path> {
    let graph = w.graph;
    let penalty = |edge: u32| penalties.and_then(|p| p.get(&edge)).copied().unwrap_or(1.0);
    let cost = |edge: u32, reverse: bool, len: f64| w.weight(edge, reverse, len) * penalty(edge);

    let start_edge = &graph.edges[from.edge as usize];
    let target_edge = &graph.edges[to.edge as usize];

    let mut best_total = f64::INFINITY;
    let mut best_finish: Option<Finish> = None;

    // Both points on the same edge
    if from.edge == to.edge {
        let reverse = to.fraction < from.fraction;
        if departure.allows(reverse) && w.accessible(from.edge, reverse) {
            let len = (to.fraction - from.fraction).abs() * start_edge.distance;
            best_total = cost(from.edge, reverse, len);
            best_finish = Some(Finish::Direct { reverse });
        }
    }

    let target = to.location;
    let h = |node: u32| w.heuristic(haversine_distance(graph.coord(node), target));

    let mut labels: FxHashMap<u32, Label> = FxHashMap::default();
    let mut heap = BinaryHeap::new();

    for reverse in [false, true] {
        if !departure.allows(reverse) || !w.accessible(from.edge, reverse) {
            continue;
        }
        let (node, len) = if reverse {
            (start_edge.from, from.fraction * start_edge.distance)
        } else {
            (start_edge.to, (1.0 - from.fraction) * start_edge.distance)
        };
        let c = cost(from.edge, reverse, len);
        if labels.get(&node).map_or(true, |l| c < l.weight) {
            labels.insert(
                node,
                Label {
                    weight: c,
                    parent: Parent::Start { reverse },
                },
            );
            heap.push(AStarState {
                node,
                cost: c,
                estimated_total: c + h(node),
            });
        }
    }

    let mut settled = 0usize;
    while let Some(AStarState {
        node,
        cost: g,
        estimated_total,
    }) = heap.pop()
    {
        if estimated_total >= best_total {
            break;
        }
        if labels.get(&node).is_some_and(|l| g > l.weight) {
            continue;
        }
        settled += 1;
        if settled > limits.max_visited_nodes {
            tracing::debug!(settled, "search exceeded visited node limit");
            break;
        }

        // Leave the graph onto the target edge
        if node == target_edge.from && w.accessible(to.edge, false) {
            let c = g + cost(to.edge, false, to.fraction * target_edge.distance);
            if c < best_total {
                best_total = c;
                best_finish = Some(Finish::ViaNode { node, reverse: false });
            }
        }
        if node == target_edge.to && w.accessible(to.edge, true) {
            let c = g + cost(to.edge, true, (1.0 - to.fraction) * target_edge.distance);
            if c < best_total {
                best_total = c;
                best_finish = Some(Finish::ViaNode { node, reverse: true });
            }
        }

        for &edge in graph.incident(node) {
            let e = &graph.edges[edge as usize];
            let reverse = e.to == node;
            if !w.accessible(edge, reverse) {
                continue;
            }
            let next = if reverse { e.from } else { e.to };
            let c = g + cost(edge, reverse, e.distance);
            if labels.get(&next).map_or(true, |l| c < l.weight) {
                labels.insert(
                    next,
                    Label {
                        weight: c,
                        parent: Parent::Edge {
                            edge,
                            reverse,
                            prev: node,
                        },
                    },
                );
                heap.push(AStarState {
                    node: next,
                    cost: c,
                    estimated_total: c + h(next),
                });
            }
        }
    }

    let pieces = match best_finish? {
        Finish::Direct { reverse } => vec![PathPiece {
            edge: from.edge,
            reverse,
            start: from.fraction,
            end: to.fraction,
        }],
        Finish::ViaNode { node, reverse } => {
            let mut pieces = vec![PathPiece {
                edge: to.edge,
                reverse,
                start: if reverse { 1.0 } else { 0.0 },
                end: to.fraction,
            }];
            let mut current = node;
            loop {
                let label = labels.get(&current)?;
                match label.parent {
                    Parent::Start { reverse } => {
                        pieces.push(PathPiece {
                            edge: from.edge,
                            reverse,
                            start: from.fraction,
                            end: if reverse { 0.0 } else { 1.0 },
                        });
                        break;
                    }
                    Parent::Edge {
                        edge,
                        reverse,
                        prev,
                    } => {
                        pieces.push(PathPiece {
                            edge,
                            reverse,
                            start: if reverse { 1.0 } else { 0.0 },
                            end: if reverse { 0.0 } else { 1.0 },
                        });
                        current = prev;
                    }
                }
            }
            pieces.reverse();
            // Drop zero-length pieces produced by snaps at edge ends
            let last = pieces.len() - 1;
            pieces
                .into_iter()
                .enumerate()
                .filter(|(i, p)| (*i != 0 && *i != last) || (p.end - p.start).abs() > 0.0)
                .map(|(_, p)| p)
                .collect()
        }
    };

    Some(Path::from_pieces(w, pieces))
}

/// Cost of reaching a node in a one-to-many search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeLabel {
    pub weight: f64,
    pub duration: f64,
    pub distance: f64,
}

impl TreeLabel {
    fn extend(&self, w: &Weighting, edge: u32, reverse: bool, len: f64) -> TreeLabel {
        TreeLabel {
            weight: self.weight + w.weight(edge, reverse, len),
            duration: self.duration + w.duration(edge, reverse, len),
            distance: self.distance + len,
        }
    }
}

/// Settled labels of a bounded Dijkstra from (or towards) a snapped point.
pub struct ShortestPathTree {
    pub origin: Snap,
    pub labels: FxHashMap<u32, TreeLabel>,
    /// Edges traversed in the search direction towards the origin
    pub backward: bool,
    /// The search hit `max_visited_nodes` before it finished
    pub truncated: bool,
}

/// Dijkstra over all nodes with weight <= `max_weight`.
///
/// With `backward` the search follows edges against their traversal
/// direction, giving the cost from each node to the origin.
pub fn shortest_path_tree(
    w: &Weighting,
    origin: &Snap,
    max_weight: f64,
    backward: bool,
    limits: SearchLimits,
) -> ShortestPathTree {
    grow_tree(w, origin, max_weight, backward, limits, None)
}

/// Like [`shortest_path_tree`] without a weight bound, but stops once every
/// node in `targets` is settled.
pub fn shortest_path_tree_to(
    w: &Weighting,
    origin: &Snap,
    targets: &FxHashSet<u32>,
    backward: bool,
    limits: SearchLimits,
) -> ShortestPathTree {
    grow_tree(w, origin, f64::INFINITY, backward, limits, Some(targets))
}

fn grow_tree(
    w: &Weighting,
    origin: &Snap,
    max_weight: f64,
    backward: bool,
    limits: SearchLimits,
    targets: Option<&FxHashSet<u32>>,
) -> ShortestPathTree {
    let graph = w.graph;
    let mut remaining = targets.map_or(usize::MAX, |t| t.len());
    let mut truncated = false;
    let e0 = &graph.edges[origin.edge as usize];
    let mut labels: FxHashMap<u32, TreeLabel> = FxHashMap::default();
    let mut settled: FxHashMap<u32, ()> = FxHashMap::default();
    // Non-negative floats order like their bit patterns
    let mut pq: PriorityQueue<u32, Reverse<u64>> = PriorityQueue::new();

    let zero = TreeLabel {
        weight: 0.0,
        duration: 0.0,
        distance: 0.0,
    };
    // Forward: leave the origin towards e0.to (along) or e0.from (against).
    // Backward: reach the origin from e0.from (along) or e0.to (against).
    let seeds = [
        (false, if backward { e0.from } else { e0.to }, if backward { origin.fraction } else { 1.0 - origin.fraction }),
        (true, if backward { e0.to } else { e0.from }, if backward { 1.0 - origin.fraction } else { origin.fraction }),
    ];
    for (reverse, node, frac) in seeds {
        if !w.accessible(origin.edge, reverse) {
            continue;
        }
        let label = zero.extend(w, origin.edge, reverse, frac * e0.distance);
        if label.weight <= max_weight && labels.get(&node).map_or(true, |l| label.weight < l.weight) {
            labels.insert(node, label);
            pq.push_increase(node, Reverse(label.weight.to_bits()));
        }
    }

    while let Some((node, _)) = pq.pop() {
        settled.insert(node, ());
        if targets.is_some_and(|t| t.contains(&node)) {
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        if settled.len() > limits.max_visited_nodes {
            truncated = true;
            break;
        }
        let Some(current) = labels.get(&node).copied() else {
            continue;
        };
        for &edge in graph.incident(node) {
            let e = &graph.edges[edge as usize];
            let (reverse, next) = if backward {
                // Arrive at `node` over this edge
                if e.to == node {
                    (false, e.from)
                } else {
                    (true, e.to)
                }
            } else if e.from == node {
                (false, e.to)
            } else {
                (true, e.from)
            };
            if settled.contains_key(&next) || !w.accessible(edge, reverse) {
                continue;
            }
            let label = current.extend(w, edge, reverse, e.distance);
            if label.weight > max_weight {
                continue;
            }
            if labels.get(&next).map_or(true, |l| label.weight < l.weight) {
                labels.insert(next, label);
                pq.push_increase(next, Reverse(label.weight.to_bits()));
            }
        }
    }

    ShortestPathTree {
        origin: *origin,
        labels,
        backward,
        truncated,
    }
}

impl ShortestPathTree {
    /// Graph nodes whose labels [`ShortestPathTree::cost_to`] reads for `target`.
    pub fn entry_nodes(graph: &crate::graph::RouteGraph, target: &Snap) -> [u32; 2] {
        let e = &graph.edges[target.edge as usize];
        [e.from, e.to]
    }

    /// Cost between the origin and `target`, through the settled tree.
    pub fn cost_to(&self, w: &Weighting, target: &Snap) -> Option<TreeLabel> {
        let graph = w.graph;
        let e = &graph.edges[target.edge as usize];
        let zero = TreeLabel {
            weight: 0.0,
            duration: 0.0,
            distance: 0.0,
        };
        let mut best: Option<TreeLabel> = None;
        let mut consider = |label: TreeLabel| {
            if best.map_or(true, |b| label.weight < b.weight) {
                best = Some(label);
            }
        };

        if target.edge == self.origin.edge {
            let (a, b) = if self.backward {
                (target.fraction, self.origin.fraction)
            } else {
                (self.origin.fraction, target.fraction)
            };
            let reverse = b < a;
            if w.accessible(target.edge, reverse) {
                consider(zero.extend(w, target.edge, reverse, (b - a).abs() * e.distance));
            }
        }

        // Forward: arrive on the target edge from e.from (along) or e.to (against).
        // Backward: leave the target towards e.to (along) or e.from (against).
        let arcs = if self.backward {
            [(e.to, false, 1.0 - target.fraction), (e.from, true, target.fraction)]
        } else {
            [(e.from, false, target.fraction), (e.to, true, 1.0 - target.fraction)]
        };
        for (node, reverse, frac) in arcs {
            if let Some(label) = self.labels.get(&node) {
                if w.accessible(target.edge, reverse) {
                    consider(label.extend(w, target.edge, reverse, frac * e.distance));
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RouteGraph;
    use crate::parse::OsmData;
    use crate::profiles::Profile;
    use crate::snap::SpatialIndex;
    use crate::weighting::{EdgeFilter, Preference};

    /// Square block: fast detour north, slow direct street south.
    ///
    ///  3 ---- 4
    ///  |      |
    ///  1 ---- 2
    fn block() -> RouteGraph {
        let mut data = OsmData::default();
        data.add_node(1, 8.000, 49.000);
        data.add_node(2, 8.010, 49.000);
        data.add_node(3, 8.000, 49.002);
        data.add_node(4, 8.010, 49.002);
        data.add_way(1, &[1, 2], &[("highway", "living_street")]);
        data.add_way(2, &[1, 3, 4, 2], &[("highway", "primary")]);
        data.add_way(3, &[5, 6], &[("highway", "primary")]);
        RouteGraph::from_osm(&data, &[Profile::DrivingCar, Profile::FootWalking]).unwrap()
    }

    fn snap(g: &RouteGraph, p: [f64; 2]) -> Snap {
        SpatialIndex::build(g).snap(p, 500.0, |_| true).unwrap()
    }

    #[test]
    fn test_fastest_takes_detour_shortest_goes_direct() {
        let g = block();
        let a = snap(&g, [8.0, 49.0]);
        let b = snap(&g, [8.01, 49.0]);

        let fastest = Weighting::new(&g, Profile::DrivingCar, Preference::Fastest, EdgeFilter::default(), None).unwrap();
        let p = find_path(&fastest, &a, &b, Departure::default(), None, SearchLimits::default()).unwrap();
        assert_eq!(p.pieces.len(), 3);

        let shortest = Weighting::new(&g, Profile::DrivingCar, Preference::Shortest, EdgeFilter::default(), None).unwrap();
        let p = find_path(&shortest, &a, &b, Departure::default(), None, SearchLimits::default()).unwrap();
        assert_eq!(p.pieces.len(), 1);
        assert!((p.distance - 730.0).abs() < 5.0, "got {}", p.distance);
    }

    #[test]
    fn test_same_edge_direct_path() {
        let g = block();
        let w = Weighting::fastest(&g, Profile::FootWalking).unwrap();
        let a = snap(&g, [8.002, 49.0]);
        let b = snap(&g, [8.006, 49.0]);
        let p = find_path(&w, &a, &b, Departure::default(), None, SearchLimits::default()).unwrap();
        assert_eq!(p.pieces.len(), 1);
        assert!(!p.pieces[0].reverse);
        assert!((p.distance - 292.0).abs() < 2.0, "got {}", p.distance);
        // 5 km/h
        assert!((p.duration - p.distance * 3.6 / 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_departure_constraint_forces_detour() {
        let g = block();
        let w = Weighting::new(&g, Profile::FootWalking, Preference::Shortest, EdgeFilter::default(), None).unwrap();
        let a = snap(&g, [8.006, 49.0]);
        let b = snap(&g, [8.002, 49.0]);
        let only_forward = Departure {
            forward: true,
            reverse: false,
        };
        let p = find_path(&w, &a, &b, only_forward, None, SearchLimits::default()).unwrap();
        assert!(!p.pieces[0].reverse);
        assert!(p.distance > 1000.0);
    }

    #[test]
    fn test_unreachable() {
        let g = block();
        let w = Weighting::fastest(&g, Profile::DrivingCar).unwrap();
        let a = snap(&g, [8.0, 49.0]);
        // Every edge blocked
        let mut filter = EdgeFilter::default();
        filter.blocked.extend(0..g.edges.len() as u32);
        let blocked = Weighting::new(&g, Profile::DrivingCar, Preference::Fastest, filter, None).unwrap();
        let b = snap(&g, [8.01, 49.002]);
        assert!(find_path(&blocked, &a, &b, Departure::default(), None, SearchLimits::default()).is_none());
        assert!(find_path(&w, &a, &b, Departure::default(), None, SearchLimits::default()).is_some());
    }

    #[test]
    fn test_tree_matches_point_to_point() {
        let g = block();
        let w = Weighting::fastest(&g, Profile::DrivingCar).unwrap();
        let a = snap(&g, [8.003, 49.0]);
        let b = snap(&g, [8.01, 49.001]);
        let p = find_path(&w, &a, &b, Departure::default(), None, SearchLimits::default()).unwrap();
        let tree = shortest_path_tree(&w, &a, f64::INFINITY, false, SearchLimits::default());
        let label = tree.cost_to(&w, &b).unwrap();
        assert!((label.weight - p.weight).abs() < 1e-6);
        assert!((label.distance - p.distance).abs() < 1e-6);

        let back = shortest_path_tree(&w, &b, f64::INFINITY, true, SearchLimits::default());
        let label = back.cost_to(&w, &a).unwrap();
        assert!((label.weight - p.weight).abs() < 1e-6);
    }

    #[test]
    fn test_tree_stops_at_targets() {
        let g = block();
        let w = Weighting::fastest(&g, Profile::DrivingCar).unwrap();
        let a = snap(&g, [8.003, 49.0]);
        let b = snap(&g, [8.01, 49.001]);
        let full = shortest_path_tree(&w, &a, f64::INFINITY, false, SearchLimits::default());
        let targets: FxHashSet<u32> = ShortestPathTree::entry_nodes(&g, &b).into_iter().collect();
        let early = shortest_path_tree_to(&w, &a, &targets, false, SearchLimits::default());
        assert!(!early.truncated);
        assert!(early.labels.len() <= full.labels.len());
        let (x, y) = (full.cost_to(&w, &b).unwrap(), early.cost_to(&w, &b).unwrap());
        assert!((x.weight - y.weight).abs() < 1e-6);
    }

    #[test]
    fn test_tree_reports_visited_node_cap() {
        let g = block();
        let w = Weighting::fastest(&g, Profile::DrivingCar).unwrap();
        let a = snap(&g, [8.003, 49.0]);
        let limits = SearchLimits { max_visited_nodes: 1 };
        let tree = shortest_path_tree(&w, &a, f64::INFINITY, false, limits);
        assert!(tree.truncated);
        assert!(!shortest_path_tree(&w, &a, f64::INFINITY, false, SearchLimits::default()).truncated);
    }

    #[test]
    fn test_tree_respects_bound() {
        let g = block();
        let w = Weighting::fastest(&g, Profile::FootWalking).unwrap();
        let a = snap(&g, [8.0, 49.0]);
        let tree = shortest_path_tree(&w, &a, 60.0, false, SearchLimits::default());
        assert!(tree.labels.values().all(|l| l.weight <= 60.0));
        assert!(tree.labels.contains_key(&0));
    }
}
