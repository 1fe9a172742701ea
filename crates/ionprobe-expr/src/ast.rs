//! Expression Abstract Syntax Tree types

use crate::error::{EngineError, EngineResult};
use ionprobe_core::{SpotField, TaskMetadata};

/// Expression AST
///
/// The node set is closed: every operation the engine can perform appears
/// here, and roles that need validation (species indices, accessor keys) are
/// resolved when the tree is constructed, never at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    // === Literals and leaf references ===
    /// Numeric literal
    Constant(f64),
    /// Peak height at a mass-station index (per-scan trees only)
    Species(usize),
    /// Per-spot scalar field
    SpotField(SpotField),
    /// Task-level parameter (decay constants, reference models)
    TaskMetadata(TaskMetadata),
    /// Result of another named expression
    NamedRef {
        name: String,
        directive: Option<UncertaintyDirective>,
    },

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<ExprNode>,
    },

    // === Aggregate over a population ===
    Function {
        func: AggregateFunction,
        args: Vec<ExprNode>,
    },
}

/// What a named reference reads: the value or one of its uncertainty forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncertaintyDirective {
    /// One-sigma absolute
    Absolute,
    /// One-sigma as percent of the value
    Percent,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Pow,

    // Comparison (produce 1.0 / 0.0)
    Equal,
    GreaterThan,
    LessThan,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Exp,
    Ln,
    Sqrt,
}

/// Population aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// Correlated weighted mean with MSWD-gated rejection
    WtdAv,
    /// Tukey's biweight location/scale
    Biweight,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::WtdAv => "WtdAv",
            AggregateFunction::Biweight => "Biweight",
        }
    }
}

impl ExprNode {
    /// Convenience constructor for a value reference
    pub fn named(name: impl Into<String>) -> Self {
        ExprNode::NamedRef {
            name: name.into(),
            directive: None,
        }
    }

    /// Names of all expressions this tree references, first-seen order
    pub fn named_references(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.walk(&mut |node| {
            if let ExprNode::NamedRef { name, .. } = node {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
        });
        names
    }

    /// Mass-station indices this tree reads, ascending and deduplicated
    pub fn species_references(&self) -> Vec<usize> {
        let mut stations = Vec::new();
        self.walk(&mut |node| {
            if let ExprNode::Species(i) = node {
                if !stations.contains(i) {
                    stations.push(*i);
                }
            }
        });
        stations.sort_unstable();
        stations
    }

    /// True when any node reads a raw peak height
    pub fn contains_species(&self) -> bool {
        !self.species_references().is_empty()
    }

    fn walk(&self, visit: &mut impl FnMut(&ExprNode)) {
        visit(self);
        match self {
            ExprNode::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            ExprNode::UnaryOp { operand, .. } => operand.walk(visit),
            ExprNode::Function { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            _ => {}
        }
    }

    /// Render the tree to its audit string
    pub fn render(&self) -> String {
        match self {
            ExprNode::Constant(v) => format!("{}", v),
            ExprNode::Species(i) => format!("PK[{}]", i),
            ExprNode::SpotField(field) => field.key().to_string(),
            ExprNode::TaskMetadata(meta) => meta.key().to_string(),
            ExprNode::NamedRef { name, directive } => match directive {
                None => format!("[\"{}\"]", name),
                Some(UncertaintyDirective::Absolute) => format!("[±\"{}\"]", name),
                Some(UncertaintyDirective::Percent) => format!("[%\"{}\"]", name),
            },
            ExprNode::BinaryOp { op, left, right } => {
                let symbol = match op {
                    BinaryOperator::Add => "+",
                    BinaryOperator::Subtract => "-",
                    BinaryOperator::Multiply => "*",
                    BinaryOperator::Divide => "/",
                    BinaryOperator::Pow => "^",
                    BinaryOperator::Equal => "==",
                    BinaryOperator::GreaterThan => ">",
                    BinaryOperator::LessThan => "<",
                };
                format!("({} {} {})", left.render(), symbol, right.render())
            }
            ExprNode::UnaryOp { op, operand } => {
                let name = match op {
                    UnaryOperator::Exp => "exp",
                    UnaryOperator::Ln => "ln",
                    UnaryOperator::Sqrt => "sqrt",
                };
                format!("{}({})", name, operand.render())
            }
            ExprNode::Function { func, args } => {
                let rendered: Vec<String> = args.iter().map(ExprNode::render).collect();
                format!("{}({})", func.name(), rendered.join(", "))
            }
        }
    }
}

/// How a per-scan expression condenses its scan-pair series to a spot value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpotFit {
    /// Correlated weighted mean of the scan-pair values
    #[default]
    WeightedMean,
    /// Line fit against equivalent time, evaluated at the temporal midpoint
    /// (falls back to the weighted mean below four retained pairs)
    LinearRegression,
}

/// Which spots a summary expression aggregates over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Population {
    #[default]
    ReferenceMaterial,
    Unknowns,
}

/// A named expression plus its evaluation role
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub name: String,
    pub tree: ExprNode,
    /// True: evaluate per scan pair with error propagation, then condense.
    /// False: evaluate once per spot.
    pub eval_per_scan: bool,
    pub fit: SpotFit,
    /// True: aggregate per-spot results over a population
    pub summary: bool,
    pub population: Population,
}

impl Expression {
    /// A per-scan expression over raw peak heights
    pub fn per_scan(name: impl Into<String>, tree: ExprNode) -> Self {
        Self {
            name: name.into(),
            tree,
            eval_per_scan: true,
            fit: SpotFit::WeightedMean,
            summary: false,
            population: Population::default(),
        }
    }

    /// A per-spot expression over named results, fields and parameters
    pub fn per_spot(name: impl Into<String>, tree: ExprNode) -> Self {
        Self {
            name: name.into(),
            tree,
            eval_per_scan: false,
            fit: SpotFit::WeightedMean,
            summary: false,
            population: Population::default(),
        }
    }

    /// A summary expression aggregating a population of spots
    pub fn summary(name: impl Into<String>, tree: ExprNode, population: Population) -> Self {
        Self {
            name: name.into(),
            tree,
            eval_per_scan: false,
            fit: SpotFit::WeightedMean,
            summary: true,
            population,
        }
    }

    /// Override the per-spot condensation of a per-scan expression
    pub fn with_fit(mut self, fit: SpotFit) -> Self {
        self.fit = fit;
        self
    }

    /// Check the tree against the run's station count and this expression's
    /// declared role
    pub fn validate(&self, station_count: usize) -> EngineResult<()> {
        for station in self.tree.species_references() {
            if station >= station_count {
                return Err(EngineError::SpeciesOutOfRange {
                    expression: self.name.clone(),
                    station,
                    stations: station_count,
                });
            }
        }

        if self.summary {
            match &self.tree {
                ExprNode::Function { args, .. }
                    if args.len() == 1
                        && matches!(args[0], ExprNode::NamedRef { directive: None, .. }) => {}
                _ => {
                    return Err(EngineError::InvalidExpression {
                        expression: self.name.clone(),
                        reason: "summary must aggregate exactly one named expression".into(),
                    })
                }
            }
        } else if self.eval_per_scan {
            if !self.tree.contains_species() {
                return Err(EngineError::InvalidExpression {
                    expression: self.name.clone(),
                    reason: "per-scan expression reads no mass station".into(),
                });
            }
            if !self.tree.named_references().is_empty() {
                return Err(EngineError::InvalidExpression {
                    expression: self.name.clone(),
                    reason: "per-scan expression cannot reference other expressions".into(),
                });
            }
        } else if self.tree.contains_species() {
            return Err(EngineError::InvalidExpression {
                expression: self.name.clone(),
                reason: "per-spot expression cannot read raw mass stations".into(),
            });
        }

        Ok(())
    }
}
