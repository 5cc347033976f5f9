//! Greeks-constrained hedge optimizer
//!
//! Builds a [`HedgeModel`] step by step from per-instrument Greeks, solves it
//! and maps column values back onto instrument ids.
//!
//! Calls must follow `load_instruments → set_objective → add_* → solve →
//! extract_solution`; anything out of order fails with `InvalidState`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::config::{HedgeObjective, HedgePolicy, TradeDirection};
use super::model::{Column, HedgeModel, ModelSolution, ObjectiveSense, Row, RowBounds};
use crate::core::{Greeks, SigmaError, SigmaResult};

/// Optimizer input for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HedgeInstrument {
    pub id: i64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    /// Largest position the hedge may take in this instrument
    pub max_position: f64,
}

impl HedgeInstrument {
    pub fn new(id: i64, delta: f64, gamma: f64, theta: f64, max_position: f64) -> Self {
        Self {
            id,
            delta,
            gamma,
            theta,
            max_position,
        }
    }

    pub fn from_greeks(id: i64, greeks: &Greeks, max_position: f64) -> Self {
        Self::new(id, greeks.delta, greeks.gamma, greeks.theta, max_position)
    }
}

/// Target quantity for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPosition {
    pub id: i64,
    pub quantity: f64,
}

/// Solved hedge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeSolution {
    pub objective_value: f64,
    pub positions: Vec<TargetPosition>,
}

impl HedgeSolution {
    pub fn quantity(&self, id: i64) -> Option<f64> {
        self.positions
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.quantity)
    }

    /// Positions with a non-zero quantity
    pub fn open_positions(&self) -> impl Iterator<Item = &TargetPosition> {
        self.positions.iter().filter(|p| p.quantity.abs() > 1e-9)
    }
}

/// Optimizer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Created,
    ObjectiveSet,
    /// Number of rows added so far
    ConstraintsAdded(usize),
    Solved,
    Infeasible,
}

impl fmt::Display for OptimizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerState::Created => write!(f, "Created"),
            OptimizerState::ObjectiveSet => write!(f, "ObjectiveSet"),
            OptimizerState::ConstraintsAdded(n) => write!(f, "ConstraintsAdded({n})"),
            OptimizerState::Solved => write!(f, "Solved"),
            OptimizerState::Infeasible => write!(f, "Infeasible"),
        }
    }
}

/// Hedge optimizer over a fixed instrument list
#[derive(Debug, Clone)]
pub struct HedgeOptimizer {
    instruments: Vec<HedgeInstrument>,
    direction: TradeDirection,
    model: Option<HedgeModel>,
    solution: Option<ModelSolution>,
    state: OptimizerState,
}

impl Default for HedgeOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HedgeOptimizer {
    pub fn new() -> Self {
        Self::with_direction(TradeDirection::Buy)
    }

    /// With `Sell`, coefficients are negated and quantities come back negative
    pub fn with_direction(direction: TradeDirection) -> Self {
        Self {
            instruments: Vec::new(),
            direction,
            model: None,
            solution: None,
            state: OptimizerState::Created,
        }
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    pub fn instruments(&self) -> &[HedgeInstrument] {
        &self.instruments
    }

    /// The model built so far, once an objective is set
    pub fn model(&self) -> Option<&HedgeModel> {
        self.model.as_ref()
    }

    fn expect_state(&self, allowed: &[OptimizerState], op: &str) -> SigmaResult<()> {
        let ok = allowed.iter().any(|s| match (s, self.state) {
            (OptimizerState::ConstraintsAdded(_), OptimizerState::ConstraintsAdded(_)) => true,
            (a, b) => *a == b,
        });
        if ok {
            Ok(())
        } else {
            Err(SigmaError::invalid_state(format!(
                "Cannot {op} in state {}",
                self.state
            )))
        }
    }

    fn model_mut(&mut self) -> SigmaResult<&mut HedgeModel> {
        self.model
            .as_mut()
            .ok_or_else(|| SigmaError::invalid_state("No objective set"))
    }

    /// Bind the instruments; one column per instrument bounded `[0, max_position]`
    pub fn load_instruments(&mut self, instruments: Vec<HedgeInstrument>) -> SigmaResult<()> {
        self.expect_state(&[OptimizerState::Created], "load instruments")?;
        if instruments.is_empty() {
            return Err(SigmaError::invalid_input("No hedge instruments"));
        }
        for inst in &instruments {
            let finite = inst.delta.is_finite() && inst.gamma.is_finite() && inst.theta.is_finite();
            if !finite {
                return Err(SigmaError::invalid_input(format!(
                    "Instrument {} has non-finite Greeks",
                    inst.id
                )));
            }
            if !(inst.max_position.is_finite() && inst.max_position >= 0.0) {
                return Err(SigmaError::invalid_input(format!(
                    "Instrument {} has invalid max position {}",
                    inst.id, inst.max_position
                )));
            }
        }
        tracing::debug!("Loaded {} hedge instruments", instruments.len());
        self.instruments = instruments;
        Ok(())
    }

    fn coefficients(&self, coefficient: impl Fn(&HedgeInstrument) -> f64) -> Vec<f64> {
        let sign = self.direction.sign();
        self.instruments.iter().map(|i| sign * coefficient(i)).collect()
    }

    /// Set the objective over per-instrument coefficients
    pub fn set_objective(
        &mut self,
        sense: ObjectiveSense,
        coefficient: impl Fn(&HedgeInstrument) -> f64,
    ) -> SigmaResult<()> {
        self.expect_state(&[OptimizerState::Created], "set objective")?;
        if self.instruments.is_empty() {
            return Err(SigmaError::invalid_state("Instruments not loaded"));
        }

        let columns = self
            .instruments
            .iter()
            .zip(self.coefficients(coefficient))
            .map(|(inst, objective)| Column {
                id: inst.id,
                objective,
                lower: 0.0,
                upper: inst.max_position,
            })
            .collect();
        self.model = Some(HedgeModel::new(sense, columns));
        self.state = OptimizerState::ObjectiveSet;
        Ok(())
    }

    pub fn minimise_gamma(&mut self) -> SigmaResult<()> {
        self.set_objective(ObjectiveSense::Minimise, |i| i.gamma)
    }

    pub fn maximise_theta(&mut self) -> SigmaResult<()> {
        self.set_objective(ObjectiveSense::Maximise, |i| i.theta)
    }

    /// Add a named row `lower <= Σ coefficient(i)·q_i <= upper`
    pub fn add_bound_constraint(
        &mut self,
        name: &str,
        coefficient: impl Fn(&HedgeInstrument) -> f64,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> SigmaResult<()> {
        let coefficients = self.coefficients(coefficient);
        self.push_row(name, coefficients, lower, upper)
    }

    fn push_row(
        &mut self,
        name: &str,
        coefficients: Vec<f64>,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> SigmaResult<()> {
        self.expect_state(
            &[OptimizerState::ObjectiveSet, OptimizerState::ConstraintsAdded(0)],
            "add constraint",
        )?;
        let row = Row {
            name: name.to_string(),
            bounds: RowBounds::from_limits(lower, upper)?,
            coefficients,
        };
        let model = self.model_mut()?;
        model.add_row(row)?;
        let n = model.rows.len();
        self.state = OptimizerState::ConstraintsAdded(n);
        Ok(())
    }

    /// Rows `delta_up` (<= limit) and `delta_dn` (>= -limit)
    pub fn add_delta_band(&mut self, limit: f64) -> SigmaResult<()> {
        self.add_bound_constraint("delta_up", |i| i.delta, None, Some(limit))?;
        self.add_bound_constraint("delta_dn", |i| i.delta, Some(-limit), None)
    }

    /// Net theta floor given per calendar day; Greeks carry theta per year
    pub fn add_theta_floor(&mut self, per_day: f64) -> SigmaResult<()> {
        self.add_bound_constraint("theta", |i| i.theta, Some(per_day * 365.0), None)
    }

    pub fn add_gamma_ceiling(&mut self, ceiling: f64) -> SigmaResult<()> {
        self.add_bound_constraint("gamma", |i| i.gamma, None, Some(ceiling))
    }

    /// Cap on the total quantity held
    pub fn add_max_open_positions(&mut self, n: u32) -> SigmaResult<()> {
        // Counts contracts, so the trade direction does not flip it
        let ones = vec![1.0; self.instruments.len()];
        self.push_row("max_open", ones, None, Some(f64::from(n)))
    }

    /// Floor on the total quantity held
    pub fn add_min_total_quantity(&mut self, m: f64) -> SigmaResult<()> {
        let ones = vec![1.0; self.instruments.len()];
        self.push_row("min_total", ones, Some(m), None)
    }

    /// Add every row the policy asks for
    pub fn apply_policy(&mut self, policy: &HedgePolicy) -> SigmaResult<()> {
        if let Some(limit) = policy.delta_limit {
            self.add_delta_band(limit)?;
        }
        if let Some(per_day) = policy.theta_floor_per_day {
            self.add_theta_floor(per_day)?;
        }
        if let Some(ceiling) = policy.gamma_ceiling {
            self.add_gamma_ceiling(ceiling)?;
        }
        if let Some(n) = policy.max_open_positions {
            self.add_max_open_positions(n)?;
        }
        if policy.min_total_quantity > 0.0 {
            self.add_min_total_quantity(policy.min_total_quantity)?;
        }
        Ok(())
    }

    /// Solve the continuous relaxation, or the integer model when `as_mip`
    pub fn solve(&mut self, as_mip: bool) -> SigmaResult<()> {
        self.expect_state(
            &[OptimizerState::ObjectiveSet, OptimizerState::ConstraintsAdded(0)],
            "solve",
        )?;
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| SigmaError::invalid_state("No objective set"))?;

        match model.solve(as_mip) {
            Ok(solution) => {
                self.solution = Some(solution);
                self.state = OptimizerState::Solved;
                Ok(())
            }
            Err(e) => {
                if matches!(e, SigmaError::InfeasibleModel(_)) {
                    self.state = OptimizerState::Infeasible;
                }
                Err(e)
            }
        }
    }

    /// Objective value and each instrument's own quantity
    pub fn extract_solution(&self) -> SigmaResult<HedgeSolution> {
        self.expect_state(&[OptimizerState::Solved], "extract solution")?;
        let solution = self
            .solution
            .as_ref()
            .ok_or_else(|| SigmaError::invalid_state("No solution"))?;

        let sign = self.direction.sign();
        let positions = self
            .instruments
            .iter()
            .zip(&solution.values)
            .map(|(inst, &value)| TargetPosition {
                id: inst.id,
                quantity: sign * value,
            })
            .collect();

        Ok(HedgeSolution {
            objective_value: solution.objective_value,
            positions,
        })
    }

    /// Build, solve and extract in one call
    pub fn run(instruments: Vec<HedgeInstrument>, policy: &HedgePolicy) -> SigmaResult<HedgeSolution> {
        policy.validate()?;
        let capped = instruments
            .into_iter()
            .map(|i| HedgeInstrument {
                max_position: i.max_position.min(policy.max_position),
                ..i
            })
            .collect();

        let mut optimizer = Self::with_direction(policy.direction);
        optimizer.load_instruments(capped)?;
        match policy.objective {
            HedgeObjective::MinimiseGamma => optimizer.minimise_gamma()?,
            HedgeObjective::MaximiseTheta => optimizer.maximise_theta()?,
        }
        optimizer.apply_policy(policy)?;
        optimizer.solve(policy.solve_as_mip)?;

        let solution = optimizer.extract_solution()?;
        tracing::info!(
            "Hedge solved: objective {:.6}, {} open positions",
            solution.objective_value,
            solution.open_positions().count()
        );
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    fn scenario_instruments() -> Vec<HedgeInstrument> {
        vec![
            HedgeInstrument::new(1, 0.3, 0.01, -0.002, 5.0),
            HedgeInstrument::new(2, 0.5, 0.02, -0.003, 5.0),
            HedgeInstrument::new(3, -0.4, -0.015, 0.001, 5.0),
        ]
    }

    fn scenario_optimizer() -> HedgeOptimizer {
        let mut opt = HedgeOptimizer::new();
        opt.load_instruments(scenario_instruments()).unwrap();
        opt.minimise_gamma().unwrap();
        opt.add_delta_band(0.9).unwrap();
        opt.add_bound_constraint("theta", |i| i.theta, Some(-0.2 / 365.0), None)
            .unwrap();
        opt
    }

    fn check_feasible(opt: &HedgeOptimizer, sol: &HedgeSolution) {
        let values: Vec<f64> = sol.positions.iter().map(|p| p.quantity).collect();
        let model = opt.model().unwrap();
        for row in &model.rows {
            let activity = row.activity(&values);
            assert!(
                row.bounds.contains(activity, TOL),
                "row {} violated: {activity}",
                row.name
            );
        }
        for (q, inst) in values.iter().zip(opt.instruments()) {
            assert!(*q >= -TOL && *q <= inst.max_position + TOL);
        }
        let objective: f64 = opt
            .instruments()
            .iter()
            .zip(&values)
            .map(|(i, q)| i.gamma * q)
            .sum();
        assert!((sol.objective_value - objective).abs() < TOL);
    }

    #[test]
    fn test_scenario_lp() {
        let mut opt = scenario_optimizer();
        assert_eq!(opt.state(), OptimizerState::ConstraintsAdded(3));

        opt.solve(false).unwrap();
        assert_eq!(opt.state(), OptimizerState::Solved);

        let sol = opt.extract_solution().unwrap();
        assert_eq!(sol.positions.len(), 3);
        assert_eq!(
            sol.positions.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        check_feasible(&opt, &sol);
        assert!(sol.objective_value < 0.0);

        // Positions are per-instrument values, never the objective
        let distinct = sol
            .positions
            .iter()
            .any(|p| (p.quantity - sol.objective_value).abs() > TOL);
        assert!(distinct);
    }

    #[test]
    fn test_scenario_mip() {
        let mut lp = scenario_optimizer();
        lp.solve(false).unwrap();
        let relaxed = lp.extract_solution().unwrap();

        let mut mip = scenario_optimizer();
        mip.solve(true).unwrap();
        let sol = mip.extract_solution().unwrap();

        check_feasible(&mip, &sol);
        for p in &sol.positions {
            assert_eq!(p.quantity, p.quantity.round(), "id {}", p.id);
        }
        // The relaxation bounds the integer optimum from below
        assert!(relaxed.objective_value <= sol.objective_value + TOL);
        assert!(sol.objective_value < 0.0);
    }

    #[test]
    fn test_no_open_positions_is_infeasible() {
        let mut opt = scenario_optimizer();
        opt.add_max_open_positions(0).unwrap();
        opt.add_min_total_quantity(1.0).unwrap();

        let res = opt.solve(true);
        assert!(matches!(res, Err(SigmaError::InfeasibleModel(_))));
        assert_eq!(opt.state(), OptimizerState::Infeasible);
        assert!(matches!(
            opt.extract_solution(),
            Err(SigmaError::InvalidState(_))
        ));
    }

    #[test]
    fn test_run_with_policy() {
        let policy = HedgePolicy {
            theta_floor_per_day: Some(-0.2 / (365.0 * 365.0)),
            ..Default::default()
        };
        let sol = HedgeOptimizer::run(scenario_instruments(), &policy).unwrap();

        let total: f64 = sol.positions.iter().map(|p| p.quantity).sum();
        assert!(total >= 1.0 - TOL);
        for p in &sol.positions {
            assert_eq!(p.quantity, p.quantity.round(), "id {}", p.id);
        }

        let infeasible = HedgePolicy {
            max_open_positions: Some(0),
            ..policy
        };
        let res = HedgeOptimizer::run(scenario_instruments(), &infeasible);
        assert!(matches!(res, Err(SigmaError::InfeasibleModel(_))));
    }

    #[test]
    fn test_sell_direction_negates_quantities() {
        let policy = HedgePolicy {
            delta_limit: Some(2.0),
            theta_floor_per_day: None,
            gamma_ceiling: Some(0.05),
            solve_as_mip: false,
            objective: HedgeObjective::MaximiseTheta,
            direction: TradeDirection::Sell,
            ..Default::default()
        };
        let sol = HedgeOptimizer::run(scenario_instruments(), &policy).unwrap();

        for p in &sol.positions {
            assert!(p.quantity <= TOL, "sold quantity {} for {}", p.quantity, p.id);
        }
        let total: f64 = sol.positions.iter().map(|p| p.quantity).sum();
        assert!(total <= -1.0 + TOL);

        // Net theta of the short book is what was maximised
        let net_theta: f64 = scenario_instruments()
            .iter()
            .zip(&sol.positions)
            .map(|(i, p)| i.theta * p.quantity)
            .sum();
        assert!((net_theta - sol.objective_value).abs() < TOL);
        assert!(net_theta > 0.0);
    }

    #[test]
    fn test_policy_caps_positions() {
        let policy = HedgePolicy {
            max_position: 1.0,
            theta_floor_per_day: None,
            delta_limit: None,
            ..Default::default()
        };
        let sol = HedgeOptimizer::run(scenario_instruments(), &policy).unwrap();
        for p in &sol.positions {
            assert!(p.quantity <= 1.0 + TOL);
        }
        // Only instrument 3 has negative gamma
        assert!((sol.quantity(3).unwrap() - 1.0).abs() < TOL);
    }

    #[test]
    fn test_out_of_order_calls() {
        let mut opt = HedgeOptimizer::new();
        assert!(matches!(
            opt.minimise_gamma(),
            Err(SigmaError::InvalidState(_))
        ));
        assert!(matches!(opt.solve(false), Err(SigmaError::InvalidState(_))));
        assert!(matches!(
            opt.add_delta_band(1.0),
            Err(SigmaError::InvalidState(_))
        ));

        opt.load_instruments(scenario_instruments()).unwrap();
        assert!(matches!(
            opt.extract_solution(),
            Err(SigmaError::InvalidState(_))
        ));
        opt.minimise_gamma().unwrap();
        assert!(matches!(
            opt.load_instruments(scenario_instruments()),
            Err(SigmaError::InvalidState(_))
        ));
        assert!(matches!(
            opt.maximise_theta(),
            Err(SigmaError::InvalidState(_))
        ));

        // Objective only, no rows, is solvable
        opt.solve(false).unwrap();
        assert!(matches!(
            opt.add_gamma_ceiling(1.0),
            Err(SigmaError::InvalidState(_))
        ));
    }

    #[test]
    fn test_rejects_bad_instruments() {
        let mut opt = HedgeOptimizer::new();
        assert!(matches!(
            opt.load_instruments(vec![]),
            Err(SigmaError::InvalidInput(_))
        ));
        let bad = vec![HedgeInstrument::new(1, f64::NAN, 0.0, 0.0, 1.0)];
        assert!(matches!(
            opt.load_instruments(bad),
            Err(SigmaError::InvalidInput(_))
        ));
    }
}
