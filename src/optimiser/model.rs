//! Solver-neutral hedge model
//!
//! Columns are instruments, rows are named linear constraints. The model is
//! translated to `good_lp` only when solved, so it can be inspected and
//! tested without a backend.

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError,
    Solution, SolverModel, Variable,
};
use serde::{Deserialize, Serialize};

use crate::core::{SigmaError, SigmaResult};

/// Objective direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveSense {
    Minimise,
    Maximise,
}

/// Decision variable for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Instrument id
    pub id: i64,
    /// Objective coefficient
    pub objective: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Bound type of a constraint row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RowBounds {
    /// row >= lower
    Lower(f64),
    /// row <= upper
    Upper(f64),
    /// lower <= row <= upper
    Double(f64, f64),
}

impl RowBounds {
    /// Bounds from optional limits; at least one side is required
    pub fn from_limits(lower: Option<f64>, upper: Option<f64>) -> SigmaResult<Self> {
        match (lower, upper) {
            (Some(l), Some(u)) if l > u => Err(SigmaError::invalid_input(format!(
                "Row lower bound {l} above upper bound {u}"
            ))),
            (Some(l), Some(u)) => Ok(RowBounds::Double(l, u)),
            (Some(l), None) => Ok(RowBounds::Lower(l)),
            (None, Some(u)) => Ok(RowBounds::Upper(u)),
            (None, None) => Err(SigmaError::invalid_input("Row without bounds")),
        }
    }

    pub fn lower(&self) -> Option<f64> {
        match *self {
            RowBounds::Lower(l) | RowBounds::Double(l, _) => Some(l),
            RowBounds::Upper(_) => None,
        }
    }

    pub fn upper(&self) -> Option<f64> {
        match *self {
            RowBounds::Upper(u) | RowBounds::Double(_, u) => Some(u),
            RowBounds::Lower(_) => None,
        }
    }

    /// Whether `value` satisfies the bounds within `tol`
    pub fn contains(&self, value: f64, tol: f64) -> bool {
        self.lower().map_or(true, |l| value >= l - tol)
            && self.upper().map_or(true, |u| value <= u + tol)
    }
}

/// Named linear constraint over all columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub name: String,
    pub bounds: RowBounds,
    /// One coefficient per column, in column order
    pub coefficients: Vec<f64>,
}

impl Row {
    /// Row activity for the given column values
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(c, v)| c * v)
            .sum()
    }
}

/// Raw solver output: objective value and one value per column
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSolution {
    pub objective_value: f64,
    pub values: Vec<f64>,
}

/// Linear / mixed-integer hedge model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeModel {
    pub sense: ObjectiveSense,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl HedgeModel {
    pub fn new(sense: ObjectiveSense, columns: Vec<Column>) -> Self {
        Self {
            sense,
            columns,
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Row) -> SigmaResult<()> {
        if row.coefficients.len() != self.columns.len() {
            return Err(SigmaError::invalid_input(format!(
                "Row '{}' has {} coefficients for {} columns",
                row.name,
                row.coefficients.len(),
                self.columns.len()
            )));
        }
        if let Some(c) = row.coefficients.iter().find(|c| !c.is_finite()) {
            return Err(SigmaError::invalid_input(format!(
                "Row '{}' has non-finite coefficient {c}",
                row.name
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn row(&self, name: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Objective value for the given column values
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.columns
            .iter()
            .zip(values)
            .map(|(c, v)| c.objective * v)
            .sum()
    }

    /// Solve with the default `good_lp` backend
    ///
    /// `as_mip` makes every column integer (branch-and-bound); otherwise the
    /// continuous relaxation is solved with the simplex method.
    pub fn solve(&self, as_mip: bool) -> SigmaResult<ModelSolution> {
        tracing::debug!(
            "Solving {} model: {} columns, {} rows",
            if as_mip { "MIP" } else { "LP" },
            self.columns.len(),
            self.rows.len()
        );

        let mut vars = ProblemVariables::new();
        let columns: Vec<Variable> = self
            .columns
            .iter()
            .map(|c| {
                let def = variable().min(c.lower).max(c.upper);
                vars.add(if as_mip { def.integer() } else { def })
            })
            .collect();

        let linear = |coefficients: &[f64]| -> Expression {
            columns
                .iter()
                .zip(coefficients)
                .fold(Expression::from(0.0), |acc, (&v, &c)| acc + c * v)
        };

        let objective_coefficients: Vec<f64> = self.columns.iter().map(|c| c.objective).collect();
        let objective = linear(&objective_coefficients);
        let unsolved = match self.sense {
            ObjectiveSense::Minimise => vars.minimise(objective),
            ObjectiveSense::Maximise => vars.maximise(objective),
        };
        let mut problem = unsolved.using(default_solver);

        for row in &self.rows {
            let lhs = linear(&row.coefficients);
            if let Some(l) = row.bounds.lower() {
                problem = problem.with(constraint!(lhs.clone() >= l));
            }
            if let Some(u) = row.bounds.upper() {
                problem = problem.with(constraint!(lhs <= u));
            }
        }

        let solution = problem.solve().map_err(|e| match e {
            ResolutionError::Infeasible => {
                tracing::warn!("Hedge model is infeasible");
                SigmaError::infeasible("No position set satisfies every constraint")
            }
            other => {
                tracing::error!("Solver fault: {}", other);
                SigmaError::solver_fault(other.to_string())
            }
        })?;

        // Branch and bound leaves integer columns within its tolerance of an integer
        let values: Vec<f64> = columns
            .iter()
            .map(|&v| {
                let value = solution.value(v);
                if as_mip {
                    value.round()
                } else {
                    value
                }
            })
            .collect();
        let objective_value = self.objective_value(&values);
        tracing::debug!("Solved, objective {:.6}", objective_value);

        Ok(ModelSolution {
            objective_value,
            values,
        })
    }
}
