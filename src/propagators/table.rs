//! Table propagator (spec §4.7, component C10): an explicit list of allowed
//! tuples, enforced via an implicit selector variable ranging over tuple
//! indices.
//!
//! Posting introduces `s ∈ [0, |tuples|)` and, per tuple `t` and position
//! `i`, the clause `s ≠ t ∨ xᵢ = tuples[t][i]`. Propagation alternates two
//! directions to a fixpoint: alive tuples whose positions no longer match
//! current domains are dropped from `s`, and any value with no remaining
//! supporting tuple is removed from its variable.

use crate::{
	domain::{Contradiction, Domain},
	error::ModelError,
	inference::{Justification, ReasonKind, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	proof::{
		model::ModelWriter,
		names::{EncodingKind, ProofNameTracker},
		Comparator, PbTerm,
	},
	propagators::{PropagationContext, Propagator, SubscriptionState},
	state::State,
	variable::IntegerVariableID,
};

pub struct Table {
	vars: Vec<IntegerVariableID>,
	tuples: Vec<Vec<Integer>>,
	selector: IntegerVariableID,
}

impl Table {
	/// Create the selector variable, post its defining clauses, and build the
	/// propagator. Fails if any tuple's width does not match `vars.len()`.
	pub fn post(
		model: &mut ModelWriter,
		names: &mut ProofNameTracker,
		state: &mut State,
		vars: Vec<IntegerVariableID>,
		tuples: Vec<Vec<Integer>>,
	) -> Result<Self, ModelError> {
		if let Some(bad) = tuples.iter().find(|t| t.len() != vars.len()) {
			return Err(ModelError::MismatchedTupleWidth {
				expected: vars.len(),
				found: bad.len(),
			});
		}
		if tuples.is_empty() {
			return Err(ModelError::TrivialUnsatisfiable);
		}

		let selector_simple = state.new_variable(Domain::from_range(Integer::new(0), Integer::new(tuples.len() as i64 - 1)));
		let selector = IntegerVariableID::Simple(selector_simple);
		let domain = Domain::from_range(Integer::new(0), Integer::new(tuples.len() as i64 - 1));
		for constraint in names.register_variable(selector_simple, None, &domain, EncodingKind::Direct) {
			model.add_constraint(names, &constraint.terms, constraint.comparator, constraint.rhs);
		}

		for (t, tuple) in tuples.iter().enumerate() {
			for (i, &var) in vars.iter().enumerate() {
				let Some((selector_var, selector_cond)) =
					selector.rewrite_condition(IntegerVariableCondition::NotEqual(Integer::new(t as i64)))
				else {
					continue;
				};
				let Some((xi_var, xi_cond)) = var.rewrite_condition(IntegerVariableCondition::Equal(tuple[i])) else {
					continue;
				};
				let mut terms: Vec<PbTerm> = names.literal_for_condition(selector_var, selector_cond);
				terms.extend(names.literal_for_condition(xi_var, xi_cond));
				model.add_constraint(names, &terms, Comparator::GreaterEqual, 1);
			}
		}

		Ok(Table { vars, tuples, selector })
	}
}

impl Propagator for Table {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		let mut alive: Vec<usize> = Vec::new();
		ctx.state().for_each_value(self.selector, |t| alive.push(t.raw() as usize));

		for &t in &alive {
			let tuple = &self.tuples[t];
			let consistent = self
				.vars
				.iter()
				.zip(tuple)
				.all(|(&var, &v)| ctx.state().in_domain(var, v));
			if !consistent {
				let reason = self
					.vars
					.iter()
					.zip(tuple)
					.map(|(&var, &v)| (var, ReasonKind::NotValue(v)))
					.collect();
				ctx.infer(
					Literal::new(self.selector, IntegerVariableCondition::NotEqual(Integer::new(t as i64))),
					Justification::Rup,
					ReasonOutline::Detailed(reason),
				)?;
			}
		}

		let alive: Vec<usize> = alive
			.into_iter()
			.filter(|&t| ctx.state().in_domain(self.selector, Integer::new(t as i64)))
			.collect();

		for (i, &var) in self.vars.iter().enumerate() {
			let mut unsupported = Vec::new();
			ctx.state().for_each_value(var, |v| {
				if !alive.iter().any(|&t| self.tuples[t][i] == v) {
					unsupported.push(v);
				}
			});
			for v in unsupported {
				ctx.infer(
					Literal::new(var, IntegerVariableCondition::NotEqual(v)),
					Justification::Rup,
					ReasonOutline::BothBounds(vec![self.selector]),
				)?;
			}
		}

		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"table"
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{inference::InferenceTracker, propagators::{PropagatorRegistry, TriggerKind}};

	#[test]
	fn only_matching_tuples_survive() {
		let mut state = State::default();
		let x = IntegerVariableID::Simple(state.new_variable(Domain::from_range(Integer::new(0), Integer::new(1))));
		let y = IntegerVariableID::Simple(state.new_variable(Domain::from_range(Integer::new(0), Integer::new(1))));
		let mut names = ProofNameTracker::new(false);
		if let IntegerVariableID::Simple(s) = x {
			let _ = names.register_variable(s, None, &Domain::from_range(Integer::new(0), Integer::new(1)), EncodingKind::Direct);
		}
		if let IntegerVariableID::Simple(s) = y {
			let _ = names.register_variable(s, None, &Domain::from_range(Integer::new(0), Integer::new(1)), EncodingKind::Direct);
		}
		let mut model = ModelWriter::new();
		// Only (0,1) and (1,0) allowed: x != y.
		let tuples = vec![vec![Integer::new(0), Integer::new(1)], vec![Integer::new(1), Integer::new(0)]];
		let table = Table::post(&mut model, &mut names, &mut state, vec![x, y], tuples).unwrap();

		state.infer_equal(x, Integer::new(0)).unwrap();

		let simple_x = match x {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut registry = PropagatorRegistry::new();
		registry.register(Box::new(table), &[(simple_x, TriggerKind::Change)]);
		let mut tracker = InferenceTracker::new(None);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();

		assert_eq!(state.value(y), Some(Integer::new(1)));
	}
}
