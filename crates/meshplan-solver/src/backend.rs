use crate::error::{Result, SolverError};
use crate::trait_def::MipSolver;
use crate::types::{status, ConstraintDescriptor, ConstraintSense, LinearExpr, ObjectiveSense, SolveOutcome, VarType, VariableDescriptor};
use good_lp::{constraint, variable, Expression, ProblemVariables, Solution, SolverModel};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// `good_lp` (HiGHS backend) is immediate-mode: there is no API for deleting
/// a constraint or variable from an already-built problem. This wrapper
/// keeps every variable and constraint as a descriptor and rebuilds the
/// concrete `good_lp` problem from scratch on every `solve()` call, which is
/// what lets `del_constraint`/`del_variable` behave as the incremental
/// interface this crate exposes requires.
#[derive(Debug, Default)]
pub struct GoodLpSolver {
    variables: Vec<Option<VariableDescriptor>>,
    constraints: Vec<Option<ConstraintDescriptor>>,
    objective: Option<(LinearExpr, ObjectiveSense)>,
    outcome: Option<SolveOutcome>,
}

impl GoodLpSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_variables(&self) -> impl Iterator<Item = (usize, &VariableDescriptor)> {
        self.variables.iter().enumerate().filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }

    fn live_constraints(&self) -> impl Iterator<Item = (usize, &ConstraintDescriptor)> {
        self.constraints.iter().enumerate().filter_map(|(i, c)| c.as_ref().map(|c| (i, c)))
    }

    fn to_good_lp_expr(expr: &LinearExpr, handles: &BTreeMap<usize, good_lp::Variable>) -> Result<Expression> {
        let mut out = Expression::from(expr.constant);
        for (&var, &coeff) in &expr.terms {
            let handle = handles.get(&var).ok_or(SolverError::UnknownVariable(var))?;
            out += coeff * *handle;
        }
        Ok(out)
    }
}

impl MipSolver for GoodLpSolver {
    fn add_variable(&mut self, name: &str, var_type: VarType, lb: f64, ub: f64) -> usize {
        let (lb, ub) = match var_type {
            VarType::Binary => (0.0, 1.0),
            VarType::Continuous => (lb, ub),
        };
        self.variables.push(Some(VariableDescriptor { name: name.to_string(), var_type, lb, ub }));
        self.outcome = None;
        self.variables.len() - 1
    }

    fn add_constraint(&mut self, name: Option<&str>, expr: LinearExpr, sense: ConstraintSense, rhs: f64) -> usize {
        self.constraints.push(Some(ConstraintDescriptor { name: name.map(str::to_string), expr, sense, rhs }));
        self.outcome = None;
        self.constraints.len() - 1
    }

    fn set_objective(&mut self, expr: LinearExpr, sense: ObjectiveSense) {
        self.objective = Some((expr, sense));
        self.outcome = None;
    }

    fn del_constraint(&mut self, idx: usize) -> Result<()> {
        let slot = self.constraints.get_mut(idx).ok_or(SolverError::UnknownConstraint(idx))?;
        if slot.take().is_none() {
            return Err(SolverError::UnknownConstraint(idx));
        }
        self.outcome = None;
        Ok(())
    }

    fn del_variable(&mut self, idx: usize) -> Result<()> {
        let slot = self.variables.get_mut(idx).ok_or(SolverError::UnknownVariable(idx))?;
        if slot.take().is_none() {
            return Err(SolverError::UnknownVariable(idx));
        }
        // Any constraint or objective referencing the deleted variable is
        // now malformed; drop the reference rather than leave a dangling
        // coefficient. Callers that reuse a variable index are expected to
        // have already removed any constraint that touched it.
        for c in self.constraints.iter_mut().flatten() {
            c.expr.terms.remove(&idx);
        }
        if let Some((expr, _)) = self.objective.as_mut() {
            expr.terms.remove(&idx);
        }
        self.outcome = None;
        Ok(())
    }

    fn reset(&mut self) {
        self.variables.clear();
        self.constraints.clear();
        self.objective = None;
        self.outcome = None;
    }

    fn write_lp(&self, path: &Path) -> Result<()> {
        let mut f = std::fs::File::create(path)?;
        let sense_word = match self.objective.as_ref().map(|(_, s)| *s) {
            Some(ObjectiveSense::Maximize) => "Maximize",
            _ => "Minimize",
        };
        writeln!(f, "\\ {sense_word}")?;
        writeln!(f, "{sense_word}")?;
        if let Some((expr, _)) = &self.objective {
            write!(f, " obj:")?;
            for (var, coeff) in &expr.terms {
                let name = self.variables[*var].as_ref().map(|v| v.name.as_str()).unwrap_or("?");
                write!(f, " {coeff:+} {name}")?;
            }
            writeln!(f)?;
        } else {
            writeln!(f, " obj: 0")?;
        }

        writeln!(f, "Subject To")?;
        for (idx, c) in self.live_constraints() {
            let label = c.name.clone().unwrap_or_else(|| format!("c{idx}"));
            write!(f, " {label}:")?;
            for (var, coeff) in &c.expr.terms {
                let name = self.variables[*var].as_ref().map(|v| v.name.as_str()).unwrap_or("?");
                write!(f, " {coeff:+} {name}")?;
            }
            let op = match c.sense {
                ConstraintSense::Le => "<=",
                ConstraintSense::Eq => "=",
                ConstraintSense::Ge => ">=",
            };
            writeln!(f, " {op} {}", c.rhs - c.expr.constant)?;
        }

        writeln!(f, "Bounds")?;
        for (_, v) in self.live_variables() {
            writeln!(f, " {} <= {} <= {}", v.lb, v.name, v.ub)?;
        }

        writeln!(f, "Generals")?;
        for (_, v) in self.live_variables() {
            if v.var_type == VarType::Binary {
                writeln!(f, " {}", v.name)?;
            }
        }
        writeln!(f, "End")?;
        Ok(())
    }

    fn solve(&mut self, rel_stop: f64, max_time_minutes: f64, threads: usize) -> Result<()> {
        let mut vars = ProblemVariables::new();
        let mut handles: BTreeMap<usize, good_lp::Variable> = BTreeMap::new();
        for (idx, v) in self.live_variables() {
            let def = match v.var_type {
                VarType::Binary => variable().min(0.0).max(1.0).integer(),
                VarType::Continuous => variable().min(v.lb).max(v.ub),
            };
            handles.insert(idx, vars.add(def));
        }

        let (sense, obj_expr) = match &self.objective {
            Some((expr, sense)) => (*sense, Self::to_good_lp_expr(expr, &handles)?),
            None => return Err(SolverError::NoObjective),
        };

        let unsolved = match sense {
            ObjectiveSense::Minimize => vars.minimise(obj_expr),
            ObjectiveSense::Maximize => vars.maximise(obj_expr),
        };

        let mut model = unsolved.using(good_lp::highs);
        model.set_threads(threads.max(1) as u32);
        if max_time_minutes > 0.0 {
            model.set_time_limit(Duration::from_secs_f64(max_time_minutes * 60.0));
        }
        model.set_mip_rel_gap(rel_stop.max(0.0));

        for (idx, c) in self.live_constraints() {
            let lhs = Self::to_good_lp_expr(&c.expr, &handles)?;
            let rhs = c.rhs;
            let built = match c.sense {
                ConstraintSense::Le => constraint!(lhs <= rhs),
                ConstraintSense::Eq => constraint!(lhs == rhs),
                ConstraintSense::Ge => constraint!(lhs >= rhs),
            };
            model = model.with(built);
            let _ = idx;
        }

        match model.solve() {
            Ok(solution) => {
                let mut values = BTreeMap::new();
                for (idx, handle) in &handles {
                    values.insert(*idx, solution.value(*handle));
                }
                let obj_value = self.objective.as_ref().map(|(expr, _)| {
                    expr.constant + expr.terms.iter().map(|(v, c)| c * values.get(v).copied().unwrap_or(0.0)).sum::<f64>()
                });
                self.outcome = Some(SolveOutcome {
                    mip_status: status::MIP_OPTIMAL,
                    lp_status: status::LP_OPTIMAL,
                    solution_count: 1,
                    objective_value: obj_value,
                    values,
                });
                Ok(())
            }
            Err(good_lp::ResolutionError::Infeasible) => {
                self.outcome = Some(SolveOutcome {
                    mip_status: status::MIP_INFEASIBLE,
                    lp_status: status::LP_INFEASIBLE,
                    solution_count: 0,
                    objective_value: None,
                    values: BTreeMap::new(),
                });
                Ok(())
            }
            Err(good_lp::ResolutionError::Unbounded) => {
                self.outcome = Some(SolveOutcome {
                    mip_status: status::MIP_UNBOUNDED,
                    lp_status: status::LP_UNBOUNDED,
                    solution_count: 0,
                    objective_value: None,
                    values: BTreeMap::new(),
                });
                Ok(())
            }
            Err(other) => {
                tracing::warn!(error = %other, "solver backend returned an error, treating as incomplete search");
                self.outcome = Some(SolveOutcome {
                    mip_status: status::MIP_TIMED_OUT_NO_SOLUTION,
                    lp_status: status::LP_UNFINISHED,
                    solution_count: 0,
                    objective_value: None,
                    values: BTreeMap::new(),
                });
                Ok(())
            }
        }
    }

    fn mip_solution_count(&self) -> usize {
        self.outcome.as_ref().map(|o| o.solution_count).unwrap_or(0)
    }

    fn mip_status(&self) -> Result<i32> {
        self.outcome.as_ref().map(|o| o.mip_status).ok_or(SolverError::NoSolution)
    }

    fn lp_status(&self) -> Result<i32> {
        self.outcome.as_ref().map(|o| o.lp_status).ok_or(SolverError::NoSolution)
    }

    fn objective_value(&self) -> Result<f64> {
        self.outcome.as_ref().and_then(|o| o.objective_value).ok_or(SolverError::NoSolution)
    }

    fn value_of(&self, var: usize) -> Result<f64> {
        self.outcome
            .as_ref()
            .ok_or(SolverError::NoSolution)?
            .values
            .get(&var)
            .copied()
            .ok_or(SolverError::UnknownVariable(var))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConstraintSense, LinearExpr, ObjectiveSense, VarType};

    #[test]
    fn simple_binary_knapsack_solves() {
        let mut solver = GoodLpSolver::new();
        let x = solver.add_variable("x", VarType::Binary, 0.0, 1.0);
        let y = solver.add_variable("y", VarType::Binary, 0.0, 1.0);

        let mut weight = LinearExpr::new();
        weight.add_term(x, 3.0);
        weight.add_term(y, 5.0);
        solver.add_constraint(Some("capacity"), weight, ConstraintSense::Le, 6.0);

        let mut value = LinearExpr::new();
        value.add_term(x, 4.0);
        value.add_term(y, 7.0);
        solver.set_objective(value, ObjectiveSense::Maximize);

        solver.solve(0.0, 1.0, 1).unwrap();
        assert_eq!(solver.mip_status().unwrap(), status::MIP_OPTIMAL);
        assert!(solver.objective_value().unwrap() >= 4.0);
    }

    #[test]
    fn deleted_constraint_relaxes_the_model() {
        let mut solver = GoodLpSolver::new();
        let x = solver.add_variable("x", VarType::Continuous, 0.0, 10.0);
        let mut expr = LinearExpr::new();
        expr.add_term(x, 1.0);
        let c = solver.add_constraint(None, expr.clone(), ConstraintSense::Le, 2.0);
        solver.set_objective(expr, ObjectiveSense::Maximize);

        solver.solve(0.0, 1.0, 1).unwrap();
        assert!((solver.objective_value().unwrap() - 2.0).abs() < 1e-6);

        solver.del_constraint(c).unwrap();
        solver.solve(0.0, 1.0, 1).unwrap();
        assert!((solver.objective_value().unwrap() - 10.0).abs() < 1e-6);
    }
}
