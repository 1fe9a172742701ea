//! Dependency tracking between named expressions

use crate::error::{EngineError, EngineResult};
use ahash::{AHashMap, AHashSet};

/// Dependency graph over expression names
///
/// Tracks which expressions read which others, enabling dependency-ordered
/// evaluation and minimal invalidation after an edit.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Expression -> expressions that read its result (dependents)
    dependents: AHashMap<String, AHashSet<String>>,
    /// Expression -> expressions it reads (precedents)
    precedents: AHashMap<String, AHashSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: `dependent` reads `precedent`
    pub fn add_dependency(&mut self, precedent: &str, dependent: &str) {
        self.dependents
            .entry(precedent.to_string())
            .or_default()
            .insert(dependent.to_string());
        self.precedents
            .entry(dependent.to_string())
            .or_default()
            .insert(precedent.to_string());
    }

    /// Names that read `name`, directly or transitively (excluding `name`)
    pub fn downstream_of(&self, name: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = AHashSet::new();
        visited.insert(name.to_string());
        self.collect_dependents(name, &mut result, &mut visited);
        result
    }

    fn collect_dependents(
        &self,
        name: &str,
        result: &mut Vec<String>,
        visited: &mut AHashSet<String>,
    ) {
        if let Some(dependents) = self.dependents.get(name) {
            for dependent in dependents {
                if visited.insert(dependent.clone()) {
                    result.push(dependent.clone());
                    self.collect_dependents(dependent, result, visited);
                }
            }
        }
    }

    /// Order `names` so every expression follows its precedents
    ///
    /// Fails naming an expression on a reference cycle. Precedents outside
    /// `names` (session-level data, missing refs) are ignored.
    pub fn evaluation_order(&self, names: &[String]) -> EngineResult<Vec<String>> {
        let known: AHashSet<&str> = names.iter().map(String::as_str).collect();
        let mut order = Vec::with_capacity(names.len());
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();

        for name in names {
            self.visit(name, &known, &mut order, &mut visited, &mut in_stack)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        known: &AHashSet<&str>,
        order: &mut Vec<String>,
        visited: &mut AHashSet<String>,
        in_stack: &mut AHashSet<String>,
    ) -> EngineResult<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if !in_stack.insert(name.to_string()) {
            return Err(EngineError::CircularDependency(name.to_string()));
        }

        if let Some(precedents) = self.precedents.get(name) {
            for precedent in precedents {
                if known.contains(precedent.as_str()) {
                    self.visit(precedent, known, order, visited, in_stack)?;
                }
            }
        }

        in_stack.remove(name);
        visited.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_evaluation_order_respects_precedents() {
        let mut graph = DependencyGraph::new();
        // age reads ratio; wm reads age
        graph.add_dependency("ratio", "age");
        graph.add_dependency("age", "wm");

        let order = graph
            .evaluation_order(&names(&["wm", "age", "ratio"]))
            .unwrap();

        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("ratio") < pos("age"));
        assert!(pos("age") < pos("wm"));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_cycle_is_rejected_by_name() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "c");
        graph.add_dependency("c", "a");

        let err = graph.evaluation_order(&names(&["a", "b", "c"])).unwrap_err();
        assert!(matches!(err, EngineError::CircularDependency(_)));
    }

    #[test]
    fn test_downstream_of() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("ratio", "age");
        graph.add_dependency("ratio", "wm");
        graph.add_dependency("age", "report");

        let mut downstream = graph.downstream_of("ratio");
        downstream.sort();
        assert_eq!(downstream, names(&["age", "report", "wm"]));
        assert!(graph.downstream_of("report").is_empty());
    }

    #[test]
    fn test_unknown_precedents_are_ignored() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("external", "age");

        let order = graph.evaluation_order(&names(&["age"])).unwrap();
        assert_eq!(order, names(&["age"]));
    }
}
