//! Undirected weighted graphs over Euclidean points: random generation,
//! Prim minimum spanning trees, MST-based tours, Floyd–Warshall all-pairs
//! shortest paths, metric closures and an approximate Steiner-tree bound.
//! Shared by the TSP domain and the experiment generators.

use rand::rngs::SmallRng;
use rand::Rng;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

fn euclidean_distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    ((p2.0 - p1.0).powi(2) + (p2.1 - p1.1).powi(2)).sqrt()
}

/// Min-heap edge: (cost, source, destination).
#[derive(Debug, Copy, Clone, PartialEq)]
struct Edge(f64, usize, usize);

impl Eq for Edge {}
impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Edge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .total_cmp(&other.0)
            .then_with(|| (self.1, self.2).cmp(&(other.1, other.2)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<(f64, f64)>,
    edges: Vec<HashMap<usize, f64>>,
    mst: Vec<Vec<usize>>,
    mst_cost: f64,
    dist: Vec<Vec<Option<f64>>>,
    prev: Vec<Vec<Option<usize>>>,
}

impl Graph {
    pub fn new() -> Graph {
        Default::default()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_value(&self, node: usize) -> (f64, f64) {
        self.nodes[node]
    }

    pub fn add_node(&mut self, value: (f64, f64)) -> usize {
        self.nodes.push(value);
        self.edges.push(HashMap::new());
        self.nodes.len() - 1
    }

    pub fn add_edge(&mut self, n1: usize, n2: usize) {
        let cost = euclidean_distance(self.nodes[n1], self.nodes[n2]);
        self.edges[n1].insert(n2, cost);
        self.edges[n2].insert(n1, cost);
    }

    pub fn has_edge(&self, n1: usize, n2: usize) -> bool {
        self.edges[n1].contains_key(&n2)
    }

    pub fn edge_cost(&self, n1: usize, n2: usize) -> Option<f64> {
        self.edges[n1].get(&n2).copied()
    }

    pub fn add_all_possible_edges(&mut self) {
        for n1 in 0..self.num_nodes() {
            for n2 in n1 + 1..self.num_nodes() {
                if !self.has_edge(n1, n2) {
                    self.add_edge(n1, n2);
                }
            }
        }
    }

    /// Random Euclidean graph: each pair is connected with probability
    /// `edge_prob`, and isolated nodes get one random edge so the graph
    /// has no trivially unreachable parts.
    pub fn add_random_nodes_edges(
        &mut self,
        num_nodes: usize,
        edge_prob: f64,
        width: f64,
        height: f64,
        rng: &mut SmallRng,
    ) {
        for _ in 0..num_nodes {
            let x = rng.random::<f64>() * width - width / 2.0;
            let y = rng.random::<f64>() * height - height / 2.0;
            self.add_node((x, y));
        }
        for n1 in 0..self.num_nodes() {
            for n2 in n1 + 1..self.num_nodes() {
                if rng.random::<f64>() < edge_prob {
                    self.add_edge(n1, n2);
                }
            }
        }
        for n in 0..self.num_nodes() {
            if self.edges[n].is_empty() && self.num_nodes() > 1 {
                let mut other = rng.random_range(0..self.num_nodes());
                while other == n {
                    other = rng.random_range(0..self.num_nodes());
                }
                self.add_edge(n, other);
            }
        }
    }

    /// Prim's algorithm from node 0. Stores the tree as child lists and
    /// accumulates its total cost.
    pub fn minimum_spanning_tree(&mut self) {
        self.mst = vec![Vec::new(); self.num_nodes()];
        self.mst_cost = 0.0;
        if self.nodes.is_empty() {
            return;
        }
        let mut heap: BinaryHeap<Reverse<Edge>> = self.edges[0]
            .iter()
            .map(|(&dest, &cost)| Reverse(Edge(cost, 0, dest)))
            .collect();
        let mut visited = vec![false; self.num_nodes()];
        visited[0] = true;
        while let Some(Reverse(Edge(cost, src, dest))) = heap.pop() {
            if visited[dest] {
                continue;
            }
            visited[dest] = true;
            self.mst[src].push(dest);
            self.mst_cost += cost;
            for (&successor, &distance) in &self.edges[dest] {
                if !visited[successor] {
                    heap.push(Reverse(Edge(distance, dest, successor)));
                }
            }
        }
    }

    pub fn mst_ready(&self) -> bool {
        self.num_nodes() == self.mst.len()
    }

    pub fn mst_cost(&self) -> f64 {
        self.mst_cost
    }

    /// Tour visiting the nodes in MST depth-first preorder; a classic
    /// 2-approximation of the optimal tour on metric graphs.
    pub fn mst_tsp_tour(&mut self) -> Vec<usize> {
        if !self.mst_ready() {
            self.minimum_spanning_tree();
        }
        let mut tour = Vec::with_capacity(self.num_nodes());
        self.dfs_mst_from(0, &mut tour);
        tour
    }

    fn dfs_mst_from(&self, node: usize, visited: &mut Vec<usize>) {
        if visited.contains(&node) {
            return;
        }
        visited.push(node);
        for &child in &self.mst[node] {
            self.dfs_mst_from(child, visited);
        }
    }

    /// Cost of a cyclic tour (edges must exist between consecutive nodes).
    pub fn tour_cost(&self, tour: &[usize]) -> f64 {
        (0..tour.len())
            .filter_map(|i| self.edge_cost(tour[i], tour[(i + 1) % tour.len()]))
            .sum()
    }

    /// Floyd–Warshall. Fills the `dist`/`prev` tables used by
    /// [`Graph::next_step_from_to`] and [`Graph::metric_closure`].
    pub fn all_pairs_shortest_paths(&mut self) {
        let n = self.num_nodes();
        self.dist = vec![vec![None; n]; n];
        self.prev = vec![vec![None; n]; n];
        for n1 in 0..n {
            self.dist[n1][n1] = Some(0.0);
            self.prev[n1][n1] = Some(n1);
            for (&n2, &cost) in &self.edges[n1] {
                self.dist[n1][n2] = Some(cost);
                self.prev[n1][n2] = Some(n1);
            }
        }
        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    if let (Some(i2k), Some(k2j)) = (self.dist[i][k], self.dist[k][j]) {
                        if self.dist[i][j].map_or(true, |i2j| i2j > i2k + k2j) {
                            self.dist[i][j] = Some(i2k + k2j);
                            self.prev[i][j] = self.prev[k][j];
                        }
                    }
                }
            }
        }
    }

    pub fn shortest_paths_ready(&self) -> bool {
        self.dist.len() == self.num_nodes()
    }

    pub fn shortest_distance(&mut self, from: usize, to: usize) -> Option<f64> {
        if !self.shortest_paths_ready() {
            self.all_pairs_shortest_paths();
        }
        self.dist[from][to]
    }

    /// Next node on a shortest path from `current` towards `goal`.
    pub fn next_step_from_to(&mut self, current: usize, goal: usize) -> Option<usize> {
        if !self.shortest_paths_ready() {
            self.all_pairs_shortest_paths();
        }
        self.prev[goal][current]
    }

    /// Complete graph over `nodes_of_interest` whose edge costs are the
    /// shortest-path distances in this graph.
    pub fn metric_closure(&mut self, nodes_of_interest: &[usize]) -> Graph {
        if !self.shortest_paths_ready() {
            self.all_pairs_shortest_paths();
        }
        let mut closure = Graph::new();
        for &n in nodes_of_interest {
            closure.add_node(self.nodes[n]);
        }
        for (i1, &n1) in nodes_of_interest.iter().enumerate() {
            for (i2, &n2) in nodes_of_interest.iter().enumerate() {
                if n1 != n2 {
                    if let Some(d) = self.dist[n1][n2] {
                        closure.edges[i1].insert(i2, d);
                    }
                }
            }
        }
        closure
    }

    /// Cost of the metric-closure MST over the nodes of interest: an
    /// approximation of the cheapest tree connecting them in this graph.
    pub fn approximate_steiner_cost(&mut self, nodes_of_interest: &[usize]) -> f64 {
        let mut closure = self.metric_closure(nodes_of_interest);
        closure.minimum_spanning_tree();
        closure.mst_cost()
    }
}
