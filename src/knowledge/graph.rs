//! Knowledge graph built from subject-predicate-object triples, with the
//! centrality scores the cognitive-load aggregator reads.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

const EIGENVECTOR_MAX_ITER: usize = 1000;
const EIGENVECTOR_TOLERANCE: f64 = 1e-6;

/// A subject or object as models return it: one string (possibly
/// comma-separated) or a list of strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TermList {
    One(String),
    Many(Vec<String>),
}

impl Default for TermList {
    fn default() -> Self {
        TermList::One(String::new())
    }
}

impl TermList {
    fn terms(&self) -> Vec<String> {
        match self {
            TermList::One(text) => text.split(',').map(normalize_term).collect(),
            TermList::Many(items) => items.iter().map(|t| normalize_term(t)).collect(),
        }
    }
}

fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

/// Raw triple as extracted by the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    #[serde(default)]
    pub subject: TermList,
    #[serde(default)]
    pub predicate: String,
    #[serde(default)]
    pub object: TermList,
}

/// Flattened, lower-cased, de-duplicated triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

/// Expand every subject/object combination, drop empty parts and duplicates.
/// First-seen order is kept.
pub fn normalize_triples(triples: &[Triple]) -> Vec<NormalizedTriple> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();

    for triple in triples {
        let predicate = normalize_term(&triple.predicate);
        if predicate.is_empty() {
            continue;
        }
        let objects = triple.object.terms();

        for subject in triple.subject.terms() {
            for object in &objects {
                if subject.is_empty() || object.is_empty() {
                    continue;
                }
                let candidate = NormalizedTriple {
                    subject: subject.clone(),
                    predicate: predicate.clone(),
                    object: object.clone(),
                };
                if seen.insert(candidate.clone()) {
                    normalized.push(candidate);
                }
            }
        }
    }

    normalized
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: usize,
    pub label: String,
    #[serde(default = "default_group")]
    pub group: u32,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub betweenness_centrality: f64,
    #[serde(default)]
    pub eigenvector_centrality: f64,
}

fn default_group() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: usize,
    pub target: usize,
    #[serde(default)]
    pub value: u32,
}

/// Node/link document in the layout force-directed renderers expect
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

impl KnowledgeGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Directed graph with one edge per distinct subject -> object pair
    pub fn from_triples(triples: &[NormalizedTriple]) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut labels: Vec<&str> = Vec::new();
        let mut edges: Vec<(usize, usize)> = Vec::new();
        let mut edge_set: HashSet<(usize, usize)> = HashSet::new();

        for triple in triples {
            let source = *index.entry(triple.subject.as_str()).or_insert_with(|| {
                labels.push(triple.subject.as_str());
                labels.len() - 1
            });
            let target = *index.entry(triple.object.as_str()).or_insert_with(|| {
                labels.push(triple.object.as_str());
                labels.len() - 1
            });
            if edge_set.insert((source, target)) {
                edges.push((source, target));
            }
        }

        let n = labels.len();
        let adjacency = adjacency_lists(n, &edges);
        let betweenness = betweenness_centrality(&adjacency);
        let eigenvector = eigenvector_centrality(n, &edges);

        let mut degree = vec![0usize; n];
        for &(source, target) in &edges {
            degree[source] += 1;
            degree[target] += 1;
        }
        let max_degree = degree.iter().copied().max().unwrap_or(0).max(1);

        let nodes = labels
            .iter()
            .enumerate()
            .map(|(id, label)| GraphNode {
                id,
                label: label.to_string(),
                group: 1,
                value: 1.0 + degree[id] as f64 / max_degree as f64 * 9.0,
                betweenness_centrality: betweenness[id],
                eigenvector_centrality: eigenvector[id],
            })
            .collect();

        let links = edges
            .iter()
            .map(|&(source, target)| GraphLink {
                source,
                target,
                value: 1,
            })
            .collect();

        Self { nodes, links }
    }
}

fn adjacency_lists(n: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); n];
    for &(source, target) in edges {
        adjacency[source].push(target);
    }
    adjacency
}

/// Brandes' algorithm on an unweighted directed graph, normalized by
/// `1 / ((n - 1)(n - 2))`
pub fn betweenness_centrality(adjacency: &[Vec<usize>]) -> Vec<f64> {
    let n = adjacency.len();
    let mut centrality = vec![0.0; n];

    for source in 0..n {
        let mut stack = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut paths = vec![0.0f64; n];
        let mut distance = vec![-1i64; n];
        paths[source] = 1.0;
        distance[source] = 0;

        let mut queue = VecDeque::from([source]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &adjacency[v] {
                if distance[w] < 0 {
                    distance[w] = distance[v] + 1;
                    queue.push_back(w);
                }
                if distance[w] == distance[v] + 1 {
                    paths[w] += paths[v];
                    predecessors[w].push(v);
                }
            }
        }

        let mut dependency = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                dependency[v] += paths[v] / paths[w] * (1.0 + dependency[w]);
            }
            if w != source {
                centrality[w] += dependency[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for value in &mut centrality {
            *value *= scale;
        }
    }

    centrality
}

/// Power iteration on `(Aᵀ + I)`: a node scores by the scores of the nodes
/// pointing at it. L2-normalized each round.
pub fn eigenvector_centrality(n: usize, edges: &[(usize, usize)]) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }

    let mut x = vec![1.0 / n as f64; n];
    let tolerance = n as f64 * EIGENVECTOR_TOLERANCE;

    for _ in 0..EIGENVECTOR_MAX_ITER {
        let last = x.clone();
        for &(source, target) in edges {
            x[target] += last[source];
        }

        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        let norm = if norm == 0.0 { 1.0 } else { norm };
        for value in &mut x {
            *value /= norm;
        }

        let change: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if change < tolerance {
            return x;
        }
    }

    warn!(
        "⚠️ Eigenvector centrality did not converge in {} iterations, using last estimate",
        EIGENVECTOR_MAX_ITER
    );
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(subject: &str, predicate: &str, object: &str) -> NormalizedTriple {
        NormalizedTriple {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
        }
    }

    #[test]
    fn test_triples_flattened_and_deduplicated() {
        let raw: Vec<Triple> = serde_json::from_str(
            r#"[
                {"subject": "Neural Nets, CNNs", "predicate": " Use ", "object": ["Gradients"]},
                {"subject": "neural nets", "predicate": "use", "object": "gradients"},
                {"subject": "", "predicate": "is", "object": "nothing"},
                {"subject": "loss", "object": "value"}
            ]"#,
        )
        .unwrap();

        let normalized = normalize_triples(&raw);
        assert_eq!(
            normalized,
            vec![triple("neural nets", "use", "gradients"), triple("cnns", "use", "gradients")]
        );
    }

    #[test]
    fn test_graph_nodes_and_links() {
        let graph = KnowledgeGraph::from_triples(&[
            triple("a", "r", "b"),
            triple("b", "r", "c"),
            triple("a", "s", "b"),
        ]);

        let labels: Vec<&str> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
        assert_eq!(graph.links.len(), 2);
        assert_eq!(graph.nodes[1].value, 10.0);
        assert_eq!(graph.nodes[0].value, 5.5);
    }

    #[test]
    fn test_betweenness_of_path() {
        // a -> b -> c: only b lies on a shortest path
        let adjacency = vec![vec![1], vec![2], vec![]];
        let centrality = betweenness_centrality(&adjacency);
        assert_eq!(centrality, vec![0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_betweenness_splits_between_equal_paths() {
        // a -> b -> d, a -> c -> d
        let adjacency = vec![vec![1, 2], vec![3], vec![3], vec![]];
        let centrality = betweenness_centrality(&adjacency);
        let expected = 0.5 / 6.0;
        assert!((centrality[1] - expected).abs() < 1e-12);
        assert!((centrality[2] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_eigenvector_cycle_is_uniform() {
        let scores = eigenvector_centrality(3, &[(0, 1), (1, 2), (2, 0)]);
        let expected = 1.0 / 3f64.sqrt();
        for score in scores {
            assert!((score - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_eigenvector_favours_targets() {
        let scores = eigenvector_centrality(3, &[(0, 2), (1, 2)]);
        assert!(scores[2] > scores[0]);
        assert!((scores[0] - scores[1]).abs() < 1e-12);
    }

    #[test]
    fn test_empty_graph() {
        let graph = KnowledgeGraph::from_triples(&[]);
        assert!(graph.is_empty());
        assert!(graph.links.is_empty());
    }

    #[test]
    fn test_graph_document_round_trip_fields() {
        let json = r#"{"nodes": [{"id": 0, "label": "alpha", "betweenness_centrality": 0.5}], "links": []}"#;
        let graph: KnowledgeGraph = serde_json::from_str(json).unwrap();
        assert_eq!(graph.nodes[0].group, 1);
        assert_eq!(graph.nodes[0].eigenvector_centrality, 0.0);
    }
}
