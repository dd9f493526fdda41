use std::collections::{HashMap, HashSet, VecDeque};

use searchcore_core::{ProjectId, Relationship, RelationshipKind, SearchCoreError};

/// Arena-style graph storage: nodes are indices into `node_ids`, edges live
/// in a flat `Vec`, and every adjacency list holds `usize` indices rather
/// than references or ids, per the design note in SPEC_FULL.md §9. Two
/// separate adjacency views share this one node index space: `dependencies`
/// (required acyclic) and `relationships` (may be cyclic, e.g. bidirectional
/// `imports`).
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    node_ids: Vec<ProjectId>,
    index_of: HashMap<ProjectId, usize>,

    /// `dependencies[i]` = indices of projects that `i` directly depends on.
    dependencies: Vec<Vec<usize>>,
    /// `reverse_dependencies[i]` = indices of projects that directly depend on `i`.
    reverse_dependencies: Vec<Vec<usize>>,

    /// All relationship edges, arena-stored; `edges_from[i]` indexes into this.
    edges: Vec<Relationship>,
    edges_from: Vec<Vec<usize>>,
}

impl RelationshipGraph {
    pub fn build(
        project_ids: &[ProjectId],
        dependency_pairs: &[(ProjectId, ProjectId)],
        relationships: &[Relationship],
    ) -> Result<Self, SearchCoreError> {
        let mut node_ids = Vec::with_capacity(project_ids.len());
        let mut index_of = HashMap::with_capacity(project_ids.len());
        for id in project_ids {
            index_of.insert(id.clone(), node_ids.len());
            node_ids.push(id.clone());
        }

        let n = node_ids.len();
        let mut dependencies = vec![Vec::new(); n];
        let mut reverse_dependencies = vec![Vec::new(); n];

        for (from, to) in dependency_pairs {
            let fi = *index_of
                .get(from)
                .ok_or_else(|| SearchCoreError::UnknownDependency {
                    project_id: from.to_string(),
                    dependency: to.to_string(),
                })?;
            let ti = *index_of
                .get(to)
                .ok_or_else(|| SearchCoreError::UnknownDependency {
                    project_id: from.to_string(),
                    dependency: to.to_string(),
                })?;
            dependencies[fi].push(ti);
            reverse_dependencies[ti].push(fi);
        }

        let mut edges = Vec::with_capacity(relationships.len());
        let mut edges_from = vec![Vec::new(); n];
        for rel in relationships {
            let fi = *index_of
                .get(&rel.from_id)
                .ok_or_else(|| SearchCoreError::UnknownRelationshipEndpoint(rel.from_id.to_string()))?;
            let _ti = *index_of
                .get(&rel.to_id)
                .ok_or_else(|| SearchCoreError::UnknownRelationshipEndpoint(rel.to_id.to_string()))?;
            edges_from[fi].push(edges.len());
            edges.push(rel.clone());
        }

        let graph = Self {
            node_ids,
            index_of,
            dependencies,
            reverse_dependencies,
            edges,
            edges_from,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Cycle check over just the dependency edges, with no relationship
    /// validation. Lets a caller surface `CyclicDependency` ahead of
    /// relationship-level errors without constructing a full graph twice.
    pub fn check_dependency_cycle(
        project_ids: &[ProjectId],
        dependency_pairs: &[(ProjectId, ProjectId)],
    ) -> Result<(), SearchCoreError> {
        Self::build(project_ids, dependency_pairs, &[]).map(|_| ())
    }

    fn idx(&self, id: &ProjectId) -> Option<usize> {
        self.index_of.get(id).copied()
    }

    /// Depth-first cycle detection over the `dependencies` view. On finding a
    /// cycle, returns `CyclicDependency` carrying the full cycle path.
    fn check_acyclic(&self) -> Result<(), SearchCoreError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let n = self.node_ids.len();
        let mut marks = vec![Mark::Unvisited; n];
        let mut stack = Vec::new();

        for start in 0..n {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            if let Some(cycle) = self.dfs_find_cycle(start, &mut marks, &mut stack) {
                let path = cycle
                    .iter()
                    .map(|&i| self.node_ids[i].to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(SearchCoreError::CyclicDependency(path));
            }
        }
        Ok(())
    }

    fn dfs_find_cycle(
        &self,
        node: usize,
        marks: &mut Vec<MarkState>,
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[node] = MarkState::InProgress;
        stack.push(node);

        for &next in &self.dependencies[node] {
            match marks[next] {
                MarkState::Unvisited => {
                    if let Some(cycle) = self.dfs_find_cycle(next, marks, stack) {
                        return Some(cycle);
                    }
                }
                MarkState::InProgress => {
                    let start = stack.iter().position(|&x| x == next).unwrap_or(0);
                    let mut cycle: Vec<usize> = stack[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                MarkState::Done => {}
            }
        }

        stack.pop();
        marks[node] = MarkState::Done;
        None
    }

    /// DFS with memoization; results in topological order (dependencies
    /// before dependents, root excluded).
    pub fn transitive_dependencies(&self, id: &ProjectId) -> Vec<ProjectId> {
        let Some(start) = self.idx(id) else {
            return Vec::new();
        };
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.topo_dfs(start, &mut visited, &mut order);
        order.into_iter().map(|i| self.node_ids[i].clone()).collect()
    }

    fn topo_dfs(&self, node: usize, visited: &mut HashSet<usize>, order: &mut Vec<usize>) {
        for &next in &self.dependencies[node] {
            if visited.insert(next) {
                self.topo_dfs(next, visited, order);
                order.push(next);
            }
        }
    }

    pub fn direct_dependencies(&self, id: &ProjectId) -> Vec<ProjectId> {
        let Some(i) = self.idx(id) else {
            return Vec::new();
        };
        self.dependencies[i]
            .iter()
            .map(|&j| self.node_ids[j].clone())
            .collect()
    }

    pub fn reverse_dependencies(&self, id: &ProjectId) -> Vec<ProjectId> {
        let Some(i) = self.idx(id) else {
            return Vec::new();
        };
        self.reverse_dependencies[i]
            .iter()
            .map(|&j| self.node_ids[j].clone())
            .collect()
    }

    pub fn is_dependency_of(&self, candidate: &ProjectId, of: &ProjectId) -> bool {
        self.transitive_dependencies(of).contains(candidate)
    }

    pub fn all_relationships(&self) -> &[Relationship] {
        &self.edges
    }

    /// Projects reachable via `semantic_similarity` edges from `id` whose
    /// weight meets `threshold`; BFS over the (possibly cyclic) relationship
    /// view, one hop at a time since the spec defines "related" as directly
    /// reachable, not transitively.
    pub fn related_projects(&self, id: &ProjectId, threshold: f32) -> Vec<(ProjectId, f32)> {
        let Some(i) = self.idx(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for &edge_idx in &self.edges_from[i] {
            let edge = &self.edges[edge_idx];
            if edge.kind == RelationshipKind::SemanticSimilarity {
                let weight = edge.weight.unwrap_or(0.0);
                if weight >= threshold {
                    out.push((edge.to_id.clone(), weight));
                }
            }
        }
        out
    }

    /// BFS shortest hop-count path between two projects over the
    /// relationship view, grounded on the teacher's graph traversal pattern;
    /// returns `None` if unreachable.
    pub fn shortest_relationship_path(
        &self,
        from: &ProjectId,
        to: &ProjectId,
    ) -> Option<Vec<ProjectId>> {
        let start = self.idx(from)?;
        let goal = self.idx(to)?;
        if start == goal {
            return Some(vec![from.clone()]);
        }

        let mut visited = vec![false; self.node_ids.len()];
        let mut parent = vec![usize::MAX; self.node_ids.len()];
        let mut queue = VecDeque::new();
        visited[start] = true;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            for &edge_idx in &self.edges_from[node] {
                let next = self.idx(&self.edges[edge_idx].to_id)?;
                if !visited[next] {
                    visited[next] = true;
                    parent[next] = node;
                    if next == goal {
                        let mut path = vec![next];
                        let mut cur = node;
                        loop {
                            path.push(cur);
                            if cur == start {
                                break;
                            }
                            cur = parent[cur];
                        }
                        path.reverse();
                        return Some(path.into_iter().map(|i| self.node_ids[i].clone()).collect());
                    }
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

#[derive(Clone, Copy, PartialEq)]
enum MarkState {
    Unvisited,
    InProgress,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pid(s: &str) -> ProjectId {
        ProjectId::new(s)
    }

    #[test]
    fn detects_cycle() {
        let ids = vec![pid("a"), pid("b"), pid("c")];
        let deps = vec![
            (pid("a"), pid("b")),
            (pid("b"), pid("c")),
            (pid("c"), pid("a")),
        ];
        let err = RelationshipGraph::build(&ids, &deps, &[]).unwrap_err();
        match err {
            SearchCoreError::CyclicDependency(path) => {
                assert!(path.contains("a"));
                assert!(path.contains("b"));
                assert!(path.contains("c"));
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn transitive_dependencies_topological() {
        let ids = vec![pid("a"), pid("b"), pid("c")];
        let deps = vec![(pid("a"), pid("b")), (pid("b"), pid("c"))];
        let g = RelationshipGraph::build(&ids, &deps, &[]).unwrap();
        let t = g.transitive_dependencies(&pid("a"));
        assert_eq!(t, vec![pid("c"), pid("b")]);
    }

    #[test]
    fn related_projects_respects_threshold() {
        let ids = vec![pid("frontend"), pid("backend"), pid("docs")];
        let rels = vec![
            Relationship {
                from_id: pid("frontend"),
                to_id: pid("backend"),
                kind: RelationshipKind::SemanticSimilarity,
                description: None,
                weight: Some(0.8),
            },
            Relationship {
                from_id: pid("frontend"),
                to_id: pid("docs"),
                kind: RelationshipKind::SemanticSimilarity,
                description: None,
                weight: Some(0.6),
            },
        ];
        let g = RelationshipGraph::build(&ids, &[], &rels).unwrap();
        let related = g.related_projects(&pid("frontend"), 0.7);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].0, pid("backend"));
    }

    proptest! {
        /// A strictly-increasing dependency chain is always acyclic; closing
        /// it with one edge from the tail back to the head always is not.
        #[test]
        fn chain_builds_closing_it_cycles(n in 2usize..8) {
            let ids: Vec<ProjectId> = (0..n).map(|i| pid(&format!("p{i}"))).collect();
            let chain: Vec<(ProjectId, ProjectId)> = (0..n - 1)
                .map(|i| (ids[i].clone(), ids[i + 1].clone()))
                .collect();

            prop_assert!(RelationshipGraph::build(&ids, &chain, &[]).is_ok());

            let mut closed = chain.clone();
            closed.push((ids[n - 1].clone(), ids[0].clone()));
            let err = RelationshipGraph::build(&ids, &closed, &[]);
            prop_assert!(matches!(err, Err(SearchCoreError::CyclicDependency(_))));
        }
    }
}
