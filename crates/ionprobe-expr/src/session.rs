//! Session orchestration
//!
//! A [`Session`] owns the spots, the parameter context and the named
//! expressions, and evaluates everything in dependency order. Edits mark the
//! touched expression and its transitive dependents dirty; evaluation only
//! recomputes the dirty set.

use crate::ast::{ExprNode, Expression, Population};
use crate::builtins::builtin_expressions;
use crate::dependency::DependencyGraph;
use crate::error::{EngineError, EngineResult};
use crate::evaluator::{evaluate_for_spot, EvaluationContext};
use crate::scan::evaluate_per_scan;
use ahash::{AHashMap, AHashSet};
use ionprobe_core::{MassStationMap, ParameterContext, Spot, SpotSummaryDetails};

/// Statistics from one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    /// Expressions recomputed this pass
    pub expressions_evaluated: usize,
    /// Per-spot evaluations performed
    pub spots_evaluated: usize,
    /// Summaries rebuilt
    pub summaries_computed: usize,
    /// Expressions skipped because they were clean
    pub skipped_clean: usize,
    /// Per-spot evaluations that produced the missing state
    pub missing_results: usize,
}

/// One reduction session: spots, parameters, expressions, summaries
pub struct Session {
    spots: Vec<Spot>,
    stations: MassStationMap,
    params: ParameterContext,
    /// Expression names in insertion order
    order: Vec<String>,
    expressions: AHashMap<String, Expression>,
    summaries: AHashMap<String, SpotSummaryDetails>,
    dirty: AHashSet<String>,
}

impl Session {
    /// Create an empty session over the given spots
    pub fn new(spots: Vec<Spot>, stations: MassStationMap, params: ParameterContext) -> Self {
        Self {
            spots,
            stations,
            params,
            order: Vec::new(),
            expressions: AHashMap::new(),
            summaries: AHashMap::new(),
            dirty: AHashSet::new(),
        }
    }

    /// Create a session preloaded with the built-in expression library
    pub fn with_builtins(
        spots: Vec<Spot>,
        stations: MassStationMap,
        params: ParameterContext,
    ) -> EngineResult<Self> {
        let mut session = Self::new(spots, stations, params);
        for expr in builtin_expressions(&session.stations)? {
            session.add_expression(expr)?;
        }
        Ok(session)
    }

    /// Add or replace a named expression
    ///
    /// The expression and everything downstream of it become dirty. Cycles
    /// are not detected here (forward references are legal while building a
    /// task); they surface from [`Session::evaluate_all`].
    pub fn add_expression(&mut self, expr: Expression) -> EngineResult<()> {
        expr.validate(self.stations.len())?;

        let name = expr.name.clone();
        if self.expressions.insert(name.clone(), expr).is_none() {
            self.order.push(name.clone());
        }
        self.mark_dirty(&name);
        Ok(())
    }

    /// Remove a named expression and every result derived from it
    pub fn remove_expression(&mut self, name: &str) -> EngineResult<()> {
        if self.expressions.remove(name).is_none() {
            return Err(EngineError::UnknownExpression(name.to_string()));
        }
        self.order.retain(|n| n != name);
        self.summaries.remove(name);
        for spot in &mut self.spots {
            spot.clear_result(name);
        }
        // Dependents now read a missing reference; they must recompute
        self.mark_dirty(name);
        self.dirty.remove(name);
        Ok(())
    }

    /// Exclude or re-include a spot
    ///
    /// Populations change, so every expression goes dirty.
    pub fn set_spot_excluded(&mut self, spot_index: usize, excluded: bool) {
        if let Some(spot) = self.spots.get_mut(spot_index) {
            if spot.excluded != excluded {
                spot.excluded = excluded;
                self.dirty.extend(self.order.iter().cloned());
            }
        }
    }

    /// Evaluate every dirty expression in dependency order
    pub fn evaluate_all(&mut self) -> EngineResult<EvaluationStats> {
        let graph = self.build_graph();
        let order = graph.evaluation_order(&self.order)?;

        let mut stats = EvaluationStats::default();
        for name in order {
            if !self.dirty.contains(&name) {
                stats.skipped_clean += 1;
                continue;
            }
            // Present in order, so present in the map
            let expr = match self.expressions.get(&name) {
                Some(expr) => expr.clone(),
                None => continue,
            };

            if expr.summary {
                self.evaluate_summary(&expr);
                stats.summaries_computed += 1;
            } else {
                self.evaluate_spots(&expr, &mut stats);
            }
            stats.expressions_evaluated += 1;
            self.dirty.remove(&name);
        }

        log::debug!(
            "evaluated {} expressions ({} summaries), {} clean",
            stats.expressions_evaluated,
            stats.summaries_computed,
            stats.skipped_clean
        );
        Ok(stats)
    }

    fn evaluate_spots(&mut self, expr: &Expression, stats: &mut EvaluationStats) {
        let ctx = EvaluationContext::new(&self.params, &self.summaries);
        let results: Vec<Option<(f64, f64)>> = self
            .spots
            .iter()
            .enumerate()
            .map(|(i, spot)| {
                if expr.eval_per_scan {
                    evaluate_per_scan(expr, spot, i, &ctx)
                } else {
                    Some(evaluate_for_spot(expr, spot, i, &ctx))
                }
            })
            .collect();

        stats.spots_evaluated += results.len();
        for (spot, result) in self.spots.iter_mut().zip(results) {
            match result {
                Some((value, sigma)) => spot.set_result(&expr.name, value, sigma),
                None => {
                    stats.missing_results += 1;
                    spot.clear_result(&expr.name);
                }
            }
        }
    }

    fn evaluate_summary(&mut self, expr: &Expression) {
        // Validation pinned the shape: Function with one plain NamedRef
        let (func, inner) = match &expr.tree {
            ExprNode::Function { func, args } => match &args[0] {
                ExprNode::NamedRef { name, .. } => (*func, name.as_str()),
                _ => return,
            },
            _ => return,
        };

        let mut spot_indices = Vec::new();
        let mut values = Vec::new();
        let mut sigmas = Vec::new();
        for (i, spot) in self.spots.iter().enumerate() {
            if spot.excluded {
                continue;
            }
            let in_population = match expr.population {
                Population::ReferenceMaterial => spot.reference_material,
                Population::Unknowns => !spot.reference_material,
            };
            if !in_population {
                continue;
            }
            // Spots in the missing state drop out of the population
            if let Some((value, sigma)) = spot.result_for(inner) {
                spot_indices.push(i);
                values.push(value);
                sigmas.push(sigma);
            }
        }

        let details = func.apply(&expr.name, &values, &sigmas, spot_indices);
        self.summaries.insert(expr.name.clone(), details);
    }

    fn build_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for name in &self.order {
            if let Some(expr) = self.expressions.get(name) {
                for referenced in expr.tree.named_references() {
                    graph.add_dependency(&referenced, name);
                }
            }
        }
        graph
    }

    fn mark_dirty(&mut self, name: &str) {
        self.dirty.insert(name.to_string());
        let graph = self.build_graph();
        for dependent in graph.downstream_of(name) {
            self.dirty.insert(dependent);
        }
    }

    /// The spots, in session order
    pub fn spots(&self) -> &[Spot] {
        &self.spots
    }

    /// The run's station map
    pub fn stations(&self) -> &MassStationMap {
        &self.stations
    }

    /// The parameter context evaluations run under
    pub fn params(&self) -> &ParameterContext {
        &self.params
    }

    /// A registered expression by name
    pub fn expression(&self, name: &str) -> Option<&Expression> {
        self.expressions.get(name)
    }

    /// Registered expression names in insertion order
    pub fn expression_names(&self) -> &[String] {
        &self.order
    }

    /// A computed summary by expression name
    pub fn summary(&self, name: &str) -> Option<&SpotSummaryDetails> {
        self.summaries.get(name)
    }

    /// Per-spot results for one expression, `None` marking missing spots
    pub fn spot_results(&self, name: &str) -> Vec<Option<(f64, f64)>> {
        self.spots.iter().map(|s| s.result_for(name)).collect()
    }
}
