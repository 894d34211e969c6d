//! Outage simulation: which circuits can take over for a failed one.
//!
//! A candidate substitutes for an offline edge when it is itself online and
//! non-structural, touches at least one endpoint of the failed edge, and
//! carries at least one load tag of the same technology.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::load_tag::normalize_load_tag;
use super::model::Edge;
use crate::CoreError;

/// One qualifying alternate for an offline edge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternateRoute {
    /// Tags of the alternate edge (original casing) that match a load of
    /// the offline edge
    pub matching_load: Vec<String>,
}

/// `offline edge id -> alternate edge id -> matching loads`
pub type AlternateMap = BTreeMap<String, BTreeMap<String, AlternateRoute>>;

/// Tags of `candidate` matching any of `wanted` (normalized forms), first
/// occurrence per normalized form, in candidate order.
fn matching_loads(wanted: &HashSet<String>, candidate: &Edge) -> Vec<String> {
    let mut seen = HashSet::new();
    candidate
        .loads
        .iter()
        .filter(|tag| {
            let norm = normalize_load_tag(tag);
            !norm.is_empty() && wanted.contains(&norm) && seen.insert(norm)
        })
        .cloned()
        .collect()
}

/// Compute alternates for every offline edge.
///
/// Offline ids that are unknown or name a structural edge produce no
/// entry; every other offline id maps to a possibly empty set.
pub fn find_alternates<I, S>(offline: I, edges: &[Edge]) -> AlternateMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let offline: HashSet<String> = offline.into_iter().map(|id| id.as_ref().to_string()).collect();
    let mut result = AlternateMap::new();

    for failed in edges.iter().filter(|e| offline.contains(&e.id)) {
        if failed.is_structural() || result.contains_key(&failed.id) {
            continue;
        }

        let wanted: HashSet<String> = failed
            .loads
            .iter()
            .map(|tag| normalize_load_tag(tag))
            .filter(|norm| !norm.is_empty())
            .collect();

        let mut alternates = BTreeMap::new();
        for candidate in edges {
            if candidate.id == failed.id
                || offline.contains(&candidate.id)
                || candidate.is_structural()
                || !candidate.shares_endpoint(failed)
            {
                continue;
            }

            let matching = matching_loads(&wanted, candidate);
            if !matching.is_empty() {
                alternates
                    .entry(candidate.id.clone())
                    .or_insert(AlternateRoute { matching_load: matching });
            }
        }

        debug!(edge_id = %failed.id, alternates = alternates.len(), "Computed alternates");
        result.insert(failed.id.clone(), alternates);
    }

    result
}

/// Offline state over a connection list, recomputing alternates on demand
#[derive(Debug, Clone, Default)]
pub struct OutageSimulation {
    edges: Vec<Edge>,
    offline: BTreeSet<String>,
}

impl OutageSimulation {
    /// Start a simulation with every edge online
    pub fn new(edges: Vec<Edge>) -> Self {
        Self {
            edges,
            offline: BTreeSet::new(),
        }
    }

    /// Replace the connection list; offline ids that no longer name a
    /// non-structural edge are dropped.
    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
        let edges = &self.edges;
        self.offline
            .retain(|id| edges.iter().any(|e| &e.id == id && !e.is_structural()));
    }

    /// Flip an edge between online and offline. Returns the new offline
    /// state; structural and unknown edges cannot be toggled.
    pub fn toggle(&mut self, edge_id: &str) -> Result<bool, CoreError> {
        let edge = self
            .edges
            .iter()
            .find(|e| e.id == edge_id)
            .ok_or_else(|| CoreError::ValidationError(format!("Unknown edge: {}", edge_id)))?;

        if edge.is_structural() {
            return Err(CoreError::ValidationError(format!(
                "Structural edge {} cannot be taken offline",
                edge_id
            )));
        }

        if self.offline.remove(edge_id) {
            Ok(false)
        } else {
            self.offline.insert(edge_id.to_string());
            Ok(true)
        }
    }

    /// Whether the edge is currently offline
    pub fn is_offline(&self, edge_id: &str) -> bool {
        self.offline.contains(edge_id)
    }

    /// Offline edge ids, sorted
    pub fn offline(&self) -> impl Iterator<Item = &str> {
        self.offline.iter().map(String::as_str)
    }

    /// Alternates for the current offline set
    pub fn alternates(&self) -> AlternateMap {
        find_alternates(self.offline.iter(), &self.edges)
    }

    /// Every edge id that is an alternate for some offline edge
    pub fn highlighted(&self) -> BTreeSet<String> {
        self.alternates()
            .into_values()
            .flat_map(|alts| alts.into_keys())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn edge(id: &str, source: &str, target: &str, loads: &[&str]) -> Edge {
        Edge::new(id, source, target).with_loads(loads.iter().copied())
    }

    #[test]
    fn test_normalized_tag_match_returns_candidate_casing() {
        let edges = vec![
            edge("ab", "A", "B", &["DWDM-1"]),
            edge("ac", "A", "C", &["dwdm-1 (pass through)"]),
        ];

        let result = find_alternates(["ab"], &edges);
        assert_eq!(
            result["ab"]["ac"].matching_load,
            vec!["dwdm-1 (pass through)".to_string()]
        );
    }

    #[test]
    fn test_disjoint_edges_never_match() {
        let edges = vec![
            edge("ab", "A", "B", &["4G"]),
            edge("cd", "C", "D", &["4G"]),
        ];

        let result = find_alternates(["ab"], &edges);
        assert!(result["ab"].is_empty());
    }

    #[test]
    fn test_single_shared_endpoint_is_enough() {
        // e2 only shares B with e1, which satisfies the adjacency rule
        let edges = vec![
            edge("e1", "A", "B", &["4G"]),
            edge("e2", "B", "C", &["4G"]),
        ];

        let result = find_alternates(["e1"], &edges);
        let mut expected = AlternateMap::new();
        expected.insert(
            "e1".to_string(),
            BTreeMap::from([(
                "e2".to_string(),
                AlternateRoute {
                    matching_load: vec!["4G".to_string()],
                },
            )]),
        );
        assert_eq!(result, expected);
    }

    #[test]
    fn test_reversed_direction_counts_as_adjacent() {
        let edges = vec![
            edge("e1", "A", "B", &["4G"]),
            edge("e2", "C", "A", &["4G"]),
        ];
        assert!(find_alternates(["e1"], &edges)["e1"].contains_key("e2"));
    }

    #[test]
    fn test_offline_and_structural_candidates_are_excluded() {
        let edges = vec![
            edge("e1", "A", "B", &["4G"]),
            edge("e2", "A", "C", &["4G"]),
            edge("e3", "A", "D", &[]),
            edge("e4", "B", "E", &["5G"]),
        ];

        let result = find_alternates(["e1", "e2"], &edges);
        assert!(result["e1"].is_empty());
        assert!(result["e2"].is_empty());
    }

    #[test]
    fn test_structural_and_unknown_offline_ids_have_no_entry() {
        let edges = vec![edge("e1", "A", "B", &[]), edge("e2", "A", "C", &["4G"])];
        let result = find_alternates(["e1", "ghost"], &edges);
        assert!(result.is_empty());
    }

    #[test]
    fn test_matching_loads_dedup_by_normalized_form() {
        let edges = vec![
            edge("e1", "A", "B", &["DWDM", "4G"]),
            edge("e2", "A", "C", &["dwdm", "DWDM (pass through)", "5G", "4g"]),
        ];

        let result = find_alternates(["e1"], &edges);
        assert_eq!(
            result["e1"]["e2"].matching_load,
            vec!["dwdm".to_string(), "4g".to_string()]
        );
    }

    #[test]
    fn test_matching_load_serializes_camel_case() {
        let route = AlternateRoute {
            matching_load: vec!["4G".into()],
        };
        assert_eq!(
            serde_json::to_value(route).unwrap(),
            serde_json::json!({"matchingLoad": ["4G"]})
        );
    }

    #[test]
    fn test_simulation_toggle_and_highlight() {
        let mut sim = OutageSimulation::new(vec![
            edge("e1", "A", "B", &["4G"]),
            edge("e2", "B", "C", &["4G"]),
            edge("e3", "C", "D", &[]),
        ]);

        assert_eq!(sim.toggle("e1"), Ok(true));
        assert!(sim.is_offline("e1"));
        assert_eq!(sim.highlighted(), BTreeSet::from(["e2".to_string()]));

        assert!(sim.toggle("e3").is_err());
        assert!(sim.toggle("nope").is_err());

        assert_eq!(sim.toggle("e1"), Ok(false));
        assert!(sim.alternates().is_empty());
    }

    #[test]
    fn test_simulation_drops_vanished_offline_edges() {
        let mut sim = OutageSimulation::new(vec![edge("e1", "A", "B", &["4G"])]);
        sim.toggle("e1").unwrap();

        // e1 became structural
        sim.set_edges(vec![edge("e1", "A", "B", &[])]);
        assert_eq!(sim.offline().count(), 0);
    }
}
