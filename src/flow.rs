use anyhow::{anyhow as anyhow_error, ensure, Result};
use num_traits::{AsPrimitive, FromPrimitive, NumAssign, PrimInt, Signed};
use std::collections::{HashMap, VecDeque};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use tracing::{debug, trace};

/// Integer type used for capacities and flow values.
///
/// Signed because the reverse edge of every pair carries the negated flow of its forward edge.
pub trait FlowInt:
    PrimInt + Signed + Display + Debug + AsPrimitive<usize> + FromPrimitive + NumAssign
{
}

impl<T> FlowInt for T where
    T: PrimInt + Signed + Display + Debug + AsPrimitive<usize> + FromPrimitive + NumAssign
{
}

/// Handle of a forward edge returned by [`FlowNetwork::add_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(usize);

#[derive(Debug, Clone)]
struct Edge<C> {
    from: usize,
    to: usize,
    capacity: C,
    flow: C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy)]
struct ResidualArc<C> {
    to: usize,
    // index of the forward edge of the pair in the edge arena
    edge: usize,
    direction: Direction,
    residual: C,
}

/// Directed multigraph with integer capacities and Edmonds-Karp maximum flow.
///
/// Edges live in an arena in pairs: index `2k` is the forward edge inserted by the caller and
/// index `2k + 1` its zero-capacity reverse edge. Augmenting one side always updates the other,
/// so the reverse edge holds the negated flow of the forward edge at all times.
///
/// Nodes are keyed by any hashable value and interned on first use.
#[derive(Debug, Clone)]
pub struct FlowNetwork<N, C>
where
    N: Eq + Hash + Clone + Debug,
    C: FlowInt,
{
    node_index: HashMap<N, usize>,
    nodes: Vec<N>,
    edges: Vec<Edge<C>>,
    // ids of every edge (forward and reverse) leaving a node
    adjacency: Vec<Vec<usize>>,
}

impl<N, C> Default for FlowNetwork<N, C>
where
    N: Eq + Hash + Clone + Debug,
    C: FlowInt,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<N, C> FlowNetwork<N, C>
where
    N: Eq + Hash + Clone + Debug,
    C: FlowInt,
{
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            node_index: HashMap::with_capacity(node_capacity),
            nodes: Vec::with_capacity(node_capacity),
            edges: Vec::with_capacity(2 * edge_capacity),
            adjacency: Vec::with_capacity(node_capacity),
        }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges inserted through [`add_edge`](Self::add_edge), reverse edges excluded.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len() / 2
    }

    pub fn contains_node(&self, node: &N) -> bool {
        self.node_index.contains_key(node)
    }

    /// Interns a node and returns its dense index.
    pub fn add_node(&mut self, node: N) -> usize {
        if let Some(&idx) = self.node_index.get(&node) {
            return idx;
        }
        let idx = self.nodes.len();
        self.node_index.insert(node.clone(), idx);
        self.nodes.push(node);
        self.adjacency.push(Vec::new());
        idx
    }

    /// Inserts `from -> to` with the given capacity and zero flow, plus the zero-capacity
    /// reverse edge `to -> from` used to cancel flow during augmentation.
    pub fn add_edge(&mut self, from: N, to: N, capacity: C) -> EdgeId {
        debug_assert!(capacity >= C::zero(), "negative capacity {}", capacity);
        let from = self.add_node(from);
        let to = self.add_node(to);

        let forward = self.edges.len();
        self.edges.push(Edge {
            from,
            to,
            capacity,
            flow: C::zero(),
        });
        self.edges.push(Edge {
            from: to,
            to: from,
            capacity: C::zero(),
            flow: C::zero(),
        });
        self.adjacency[from].push(forward);
        self.adjacency[to].push(forward + 1);
        EdgeId(forward)
    }

    #[inline]
    pub fn flow(&self, edge: EdgeId) -> C {
        self.edges[edge.0].flow
    }

    #[inline]
    pub fn capacity(&self, edge: EdgeId) -> C {
        self.edges[edge.0].capacity
    }

    /// Forward edges leaving `node` as `(target, capacity, flow)`.
    pub fn edges_from<'a>(&'a self, node: &N) -> impl Iterator<Item = (&'a N, C, C)> + 'a {
        let edge_ids: &'a [usize] = match self.node_index.get(node) {
            Some(&idx) => self.adjacency[idx].as_slice(),
            None => &[],
        };
        edge_ids
            .iter()
            .filter(|edge_id| *edge_id % 2 == 0)
            .map(move |&edge_id| {
                let edge = &self.edges[edge_id];
                (&self.nodes[edge.to], edge.capacity, edge.flow)
            })
    }

    /// Pushes as much flow as possible from `source` to `sink` along shortest augmenting paths.
    ///
    /// Starts from the current flow values, so calling it again after adding edges only pushes
    /// the additional flow. Returns the amount pushed by this call.
    pub fn max_flow(&mut self, source: &N, sink: &N) -> Result<C> {
        let source = *self
            .node_index
            .get(source)
            .ok_or_else(|| anyhow_error!("source node {:?} is not in the network", source))?;
        let sink = *self
            .node_index
            .get(sink)
            .ok_or_else(|| anyhow_error!("sink node {:?} is not in the network", sink))?;
        ensure!(source != sink, "source and sink must be distinct nodes");

        let mut total = C::zero();
        let mut augmentations = 0_usize;
        while let Some(path) = self.augmenting_path(source, sink) {
            let bottleneck = path
                .iter()
                .map(|arc| arc.residual)
                .min()
                .ok_or_else(|| anyhow_error!("augmenting path is empty"))?;
            trace!(
                "augmenting path of {} arcs, bottleneck {}",
                path.len(),
                bottleneck
            );
            for arc in path.iter() {
                self.push(arc, bottleneck);
            }
            total += bottleneck;
            augmentations += 1;
        }
        debug!("max flow {} after {} augmentations", total, augmentations);
        Ok(total)
    }

    /// Residual graph derived from the current flow values.
    ///
    /// Every forward edge with spare capacity yields a forward arc, every forward edge carrying
    /// flow yields a backward arc with residual equal to that flow.
    fn residual_graph(&self) -> Vec<Vec<ResidualArc<C>>> {
        let mut residual = vec![Vec::new(); self.nodes.len()];
        for (edge_id, edge) in self.edges.iter().enumerate().step_by(2) {
            let spare = edge.capacity - edge.flow;
            if spare > C::zero() {
                residual[edge.from].push(ResidualArc {
                    to: edge.to,
                    edge: edge_id,
                    direction: Direction::Forward,
                    residual: spare,
                });
            }
            if edge.flow > C::zero() {
                residual[edge.to].push(ResidualArc {
                    to: edge.from,
                    edge: edge_id,
                    direction: Direction::Backward,
                    residual: edge.flow,
                });
            }
        }
        residual
    }

    /// Breadth-first search over a freshly built residual graph.
    /// Returns the arcs of a fewest-arc path from `source` to `sink`, if one exists.
    fn augmenting_path(&self, source: usize, sink: usize) -> Option<Vec<ResidualArc<C>>> {
        let residual = self.residual_graph();
        let mut via: Vec<Option<(usize, ResidualArc<C>)>> = vec![None; self.nodes.len()];
        let mut visited = vec![false; self.nodes.len()];
        visited[source] = true;

        let mut queue = VecDeque::from([source]);
        'search: while let Some(u) = queue.pop_front() {
            for arc in residual[u].iter() {
                if visited[arc.to] {
                    continue;
                }
                visited[arc.to] = true;
                via[arc.to] = Some((u, *arc));
                if arc.to == sink {
                    break 'search;
                }
                queue.push_back(arc.to);
            }
        }

        if !visited[sink] {
            return None;
        }

        let mut path = Vec::new();
        let mut v = sink;
        while v != source {
            let (u, arc) = via[v]?;
            path.push(arc);
            v = u;
        }
        path.reverse();
        Some(path)
    }

    fn push(&mut self, arc: &ResidualArc<C>, amount: C) {
        let (forward, reverse) = (arc.edge, arc.edge + 1);
        match arc.direction {
            Direction::Forward => {
                self.edges[forward].flow += amount;
                self.edges[reverse].flow -= amount;
            }
            Direction::Backward => {
                // cancels flow committed by an earlier path
                self.edges[forward].flow -= amount;
                self.edges[reverse].flow += amount;
            }
        }
        debug_assert!(self.edges[forward].flow >= C::zero());
        debug_assert!(self.edges[forward].flow <= self.edges[forward].capacity);
    }
}

#[cfg(test)]
#[generic_tests::define]
mod tests {
    use super::{EdgeId, FlowInt, FlowNetwork};

    fn c<C: FlowInt>(value: i32) -> C {
        C::from_i32(value).unwrap()
    }

    fn edge<C: FlowInt>(
        network: &mut FlowNetwork<&'static str, C>,
        from: &'static str,
        to: &'static str,
        capacity: i32,
    ) -> EdgeId {
        network.add_edge(from, to, c(capacity))
    }

    fn assert_conserved<C: FlowInt>(network: &FlowNetwork<&'static str, C>, nodes: &[&'static str]) {
        for node in nodes {
            let outflow = network
                .edges_from(node)
                .fold(C::zero(), |acc, (_, _, flow)| acc + flow);
            let inflow = network
                .edges
                .iter()
                .step_by(2)
                .filter(|edge| network.nodes[edge.to] == *node)
                .fold(C::zero(), |acc, edge| acc + edge.flow);
            assert_eq!(inflow, outflow, "flow not conserved at {}", node);
        }
    }

    #[test]
    fn test_rerouting_through_reverse_edge<C: FlowInt>() {
        let mut network = FlowNetwork::<&'static str, C>::new();
        edge(&mut network, "s", "a", 1);
        edge(&mut network, "s", "b", 1);
        // a -> y is inserted first so the first shortest path takes it
        let a_y = edge(&mut network, "a", "y", 1);
        let a_x = edge(&mut network, "a", "x", 1);
        let b_y = edge(&mut network, "b", "y", 1);
        edge(&mut network, "x", "t", 1);
        edge(&mut network, "y", "t", 1);

        let total = network.max_flow(&"s", &"t").unwrap();
        assert_eq!(total, c(2));
        assert_eq!(network.flow(a_y), C::zero());
        assert_eq!(network.flow(a_x), c(1));
        assert_eq!(network.flow(b_y), c(1));
        assert_conserved(&network, &["a", "b", "x", "y"]);
    }

    #[test]
    fn test_textbook_network<C: FlowInt>() {
        let mut network = FlowNetwork::<&'static str, C>::new();
        edge(&mut network, "s", "v1", 16);
        edge(&mut network, "s", "v2", 13);
        edge(&mut network, "v1", "v3", 12);
        edge(&mut network, "v2", "v1", 4);
        edge(&mut network, "v2", "v4", 14);
        edge(&mut network, "v3", "v2", 9);
        edge(&mut network, "v3", "t", 20);
        edge(&mut network, "v4", "v3", 7);
        edge(&mut network, "v4", "t", 4);

        assert_eq!(network.max_flow(&"s", &"t").unwrap(), c(23));
        assert_conserved(&network, &["v1", "v2", "v3", "v4"]);
        for (_, capacity, flow) in ["s", "v1", "v2", "v3", "v4"]
            .iter()
            .flat_map(|node| network.edges_from(node))
        {
            assert!(flow >= C::zero() && flow <= capacity);
        }
    }

    #[test]
    fn test_parallel_and_zero_capacity_edges<C: FlowInt>() {
        let mut network = FlowNetwork::<&'static str, C>::new();
        edge(&mut network, "s", "t", 2);
        edge(&mut network, "s", "t", 3);
        let blocked = edge(&mut network, "s", "t", 0);

        assert_eq!(network.max_flow(&"s", &"t").unwrap(), c(5));
        assert_eq!(network.flow(blocked), C::zero());
        assert_eq!(network.num_edges(), 3);
        assert_eq!(network.num_nodes(), 2);
    }

    #[test]
    fn test_disconnected_sink<C: FlowInt>() {
        let mut network = FlowNetwork::<&'static str, C>::new();
        edge(&mut network, "s", "a", 4);
        edge(&mut network, "b", "t", 4);
        assert_eq!(network.max_flow(&"s", &"t").unwrap(), C::zero());
    }

    #[test]
    fn test_incremental_max_flow<C: FlowInt>() {
        let mut network = FlowNetwork::<&'static str, C>::new();
        edge(&mut network, "s", "a", 5);
        edge(&mut network, "a", "t", 2);
        assert_eq!(network.max_flow(&"s", &"t").unwrap(), c(2));

        edge(&mut network, "a", "t", 1);
        assert_eq!(network.max_flow(&"s", &"t").unwrap(), c(1));
        assert_eq!(network.max_flow(&"s", &"t").unwrap(), C::zero());
    }

    #[test]
    fn test_unknown_terminals_are_errors<C: FlowInt>() {
        let mut network = FlowNetwork::<&'static str, C>::new();
        edge(&mut network, "s", "t", 1);
        assert!(network.max_flow(&"s", &"missing").is_err());
        assert!(network.max_flow(&"missing", &"t").is_err());
        assert!(network.max_flow(&"s", &"s").is_err());
    }

    #[instantiate_tests(<i32>)]
    mod i32 {}

    #[instantiate_tests(<i64>)]
    mod i64 {}
}
