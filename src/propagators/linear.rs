//! Linear inequality propagator (spec §4.7, component C10).
//!
//! `sum coefficient * variable <= rhs`, with bound reasoning: for each term
//! `a_j x_j`, the tightest value the other terms can leave for it is found by
//! pushing every other variable to the extreme that grows the sum least (its
//! lower bound where its coefficient is positive, its upper bound where it is
//! negative), then dividing the remaining slack by `a_j`.

use crate::{
	domain::Contradiction,
	inference::{Justification, ReasonKind, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	proof::{
		model::{LinearComparator, ModelLine, ModelWriter},
		names::ProofNameTracker,
	},
	propagators::{PropagationContext, Propagator, SubscriptionState},
	variable::IntegerVariableID,
};

/// `sum terms[i].0 * terms[i].1 <= rhs` (spec §4.7).
pub struct LinearInequality {
	terms: Vec<(i64, IntegerVariableID)>,
	rhs: Integer,
	model_line: ModelLine,
}

impl LinearInequality {
	/// Post the model constraint and build the propagator for it.
	pub fn post(
		model: &mut ModelWriter,
		names: &ProofNameTracker,
		terms: Vec<(i64, IntegerVariableID)>,
		rhs: Integer,
	) -> Self {
		let model_line = model.post_linear_constraint(names, &terms, LinearComparator::LessEqual, rhs);
		LinearInequality { terms, rhs, model_line }
	}

	/// The extreme value of `var` that makes `coefficient * var` smallest:
	/// its lower bound when `coefficient` is positive, its upper bound when
	/// `coefficient` is negative.
	fn least_contribution(ctx: &PropagationContext, coefficient: i64, var: IntegerVariableID) -> Integer {
		if coefficient > 0 {
			ctx.state().lower_bound(var)
		} else {
			ctx.state().upper_bound(var)
		}
	}

	/// `M = rhs - sum_{i != idx} a_i * least_contribution(i)`: the loosest
	/// valid upper bound on `terms[idx].0 * terms[idx].1` implied by every
	/// other term's current domain (spec §4.7).
	fn slack_excluding(&self, ctx: &PropagationContext, idx: usize) -> Integer {
		let mut m = self.rhs;
		for (other_idx, &(a, v)) in self.terms.iter().enumerate() {
			if other_idx == idx {
				continue;
			}
			m = m - Integer::new(a) * Self::least_contribution(ctx, a, v);
		}
		m
	}

	/// The reason for every term's current contribution except `idx`: the
	/// bound that was actually used to compute the slack (spec §4.7, §4.5).
	fn reason_excluding(&self, idx: usize) -> ReasonOutline {
		let items = self
			.terms
			.iter()
			.enumerate()
			.filter(|&(other_idx, _)| other_idx != idx)
			.map(|(_, &(a, v))| {
				let kind = if a > 0 {
					ReasonKind::LowerBound
				} else {
					ReasonKind::UpperBound
				};
				(v, kind)
			})
			.collect();
		ReasonOutline::Detailed(items)
	}
}

impl Propagator for LinearInequality {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		for idx in 0..self.terms.len() {
			let (coefficient, var) = self.terms[idx];
			if coefficient == 0 {
				continue;
			}
			let slack = self.slack_excluding(ctx, idx);
			if coefficient > 0 {
				let bound = Integer::new(Integer::floor_div(slack.raw(), coefficient));
				if ctx.state().upper_bound(var) > bound {
					ctx.infer(
						Literal::new(var, IntegerVariableCondition::Less(bound + Integer::new(1))),
						Justification::Rup,
						self.reason_excluding(idx),
					)?;
				}
			} else {
				let bound = Integer::new(Integer::ceil_div(-slack.raw(), -coefficient));
				if ctx.state().lower_bound(var) < bound {
					ctx.infer(
						Literal::new(var, IntegerVariableCondition::GreaterEqual(bound)),
						Justification::Rup,
						self.reason_excluding(idx),
					)?;
				}
			}
		}
		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"linear_inequality"
	}
}

/// The model line `LinearInequality::post` wrote, for propagators that
/// layer on top (e.g. a reified `<=` built from two of these).
pub fn model_line(propagator: &LinearInequality) -> ModelLine {
	propagator.model_line
}

/// `sum terms[i].0 * terms[i].1 != rhs`, the `NotEquals` reduction (spec
/// §4.7). Posts no model constraint of its own: it only has anything to say
/// once every term but one is fixed, at which point it excludes a single
/// value from the last free variable, justified directly against the other
/// terms' current (fixed) values rather than a model line.
pub struct LinearNotEqual {
	terms: Vec<(i64, IntegerVariableID)>,
	rhs: Integer,
}

impl LinearNotEqual {
	pub fn post(terms: Vec<(i64, IntegerVariableID)>, rhs: Integer) -> Self {
		LinearNotEqual { terms, rhs }
	}
}

impl Propagator for LinearNotEqual {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		let mut free_idx = None;
		let mut fixed_sum = Integer::new(0);
		for (i, &(a, v)) in self.terms.iter().enumerate() {
			match ctx.state().value(v) {
				Some(val) => fixed_sum = fixed_sum + Integer::new(a) * val,
				None => {
					if free_idx.is_some() {
						return Ok(SubscriptionState::Enable);
					}
					free_idx = Some(i);
				}
			}
		}

		let reason_for_fixed = |excluding: IntegerVariableID| {
			self.terms
				.iter()
				.filter(|&&(_, v)| v != excluding)
				.map(|&(_, v)| (v, ReasonKind::Value))
				.collect()
		};

		let Some(idx) = free_idx else {
			if fixed_sum == self.rhs {
				let reason = self.terms.iter().map(|&(_, v)| (v, ReasonKind::Value)).collect();
				return Err(ctx.contradiction(Justification::Rup, ReasonOutline::Detailed(reason)));
			}
			return Ok(SubscriptionState::Enable);
		};

		let (a, v) = self.terms[idx];
		if a == 0 {
			return Ok(SubscriptionState::Enable);
		}
		let remaining = self.rhs - fixed_sum;
		if remaining.raw() % a != 0 {
			return Ok(SubscriptionState::Enable);
		}
		let forced = Integer::new(remaining.raw() / a);
		if ctx.state().in_domain(v, forced) {
			ctx.infer(
				Literal::new(v, IntegerVariableCondition::NotEqual(forced)),
				Justification::Rup,
				ReasonOutline::Detailed(reason_for_fixed(v)),
			)?;
		}
		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"linear_not_equal"
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		domain::Domain,
		inference::InferenceTracker,
		proof::names::EncodingKind,
		propagators::PropagatorRegistry,
		state::State,
	};

	fn two_var_state(a_lo: i64, a_hi: i64, b_lo: i64, b_hi: i64) -> (State, IntegerVariableID, IntegerVariableID) {
		let mut state = State::default();
		let a = state.new_variable(Domain::from_range(Integer::new(a_lo), Integer::new(a_hi)));
		let b = state.new_variable(Domain::from_range(Integer::new(b_lo), Integer::new(b_hi)));
		(
			state,
			IntegerVariableID::Simple(a),
			IntegerVariableID::Simple(b),
		)
	}

	fn names_for(state: &State, vars: &[IntegerVariableID]) -> ProofNameTracker {
		let mut names = ProofNameTracker::new(false);
		for &v in vars {
			if let IntegerVariableID::Simple(s) = v {
				let domain = Domain::from_range(state.lower_bound(v), state.upper_bound(v));
				let _ = names.register_variable(s, None, &domain, EncodingKind::Direct);
			}
		}
		names
	}

	#[test]
	fn tightens_the_only_free_bound() {
		// x + y <= 10, x in [0,9], y in [8,8] forces x <= 2.
		let (mut state, x, y) = two_var_state(0, 9, 8, 8);
		let names = names_for(&state, &[x, y]);
		let mut model = ModelWriter::new();
		let propagator = LinearInequality::post(&mut model, &names, vec![(1, x), (1, y)], Integer::new(10));

		let simple_x = match x {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let simple_y = match y {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		use crate::propagators::TriggerKind;
		let mut registry = PropagatorRegistry::new();
		registry.register(
			Box::new(propagator),
			&[(simple_x, TriggerKind::Bounds), (simple_y, TriggerKind::Bounds)],
		);

		let mut tracker = InferenceTracker::new(None);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();
		assert_eq!(state.upper_bound(x), Integer::new(2));
	}

	#[test]
	fn negative_coefficient_tightens_a_lower_bound() {
		// x - y <= 0, y in [3,3] forces x <= 3 (coefficient on x positive) and,
		// symmetrically with x in [5,5], -y <= -5 forces y >= 5.
		let (mut state, x, y) = two_var_state(0, 9, 0, 9);
		state.infer_equal(x, Integer::new(5)).unwrap();
		let names = names_for(&state, &[x, y]);
		let mut model = ModelWriter::new();
		// x - y <= 0  <=>  x + (-1)*y <= 0
		let propagator = LinearInequality::post(&mut model, &names, vec![(1, x), (-1, y)], Integer::new(0));

		let mut tracker = InferenceTracker::new(None);
		let simple_x = match x {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let simple_y = match y {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		use crate::propagators::TriggerKind;
		let mut registry = PropagatorRegistry::new();
		registry.register(
			Box::new(propagator),
			&[(simple_x, TriggerKind::Bounds), (simple_y, TriggerKind::Bounds)],
		);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();

		assert_eq!(state.lower_bound(y), Integer::new(5));
	}

	#[test]
	fn last_free_term_is_excluded_from_the_forcing_value() {
		// x + y != 10, y fixed at 6, forces x away from 4 (leaving 0..=9 minus 4).
		let (mut state, x, y) = two_var_state(0, 9, 6, 6);
		let propagator = LinearNotEqual::post(vec![(1, x), (1, y)], Integer::new(10));

		let simple_y = match y {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		use crate::propagators::TriggerKind;
		let mut registry = PropagatorRegistry::new();
		registry.register(Box::new(propagator), &[(simple_y, TriggerKind::Change)]);
		let mut tracker = InferenceTracker::new(None);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();

		assert!(!state.in_domain(x, Integer::new(4)));
		assert!(state.in_domain(x, Integer::new(3)));
	}

	#[test]
	fn all_terms_fixed_at_the_forbidden_sum_is_a_contradiction() {
		let (mut state, x, y) = two_var_state(4, 4, 6, 6);
		let propagator = LinearNotEqual::post(vec![(1, x), (1, y)], Integer::new(10));

		use crate::propagators::TriggerKind;
		let simple_x = match x {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let simple_y = match y {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut registry = PropagatorRegistry::new();
		registry.register(
			Box::new(propagator),
			&[(simple_x, TriggerKind::Change), (simple_y, TriggerKind::Change)],
		);
		let mut tracker = InferenceTracker::new(None);
		assert!(registry.run_to_fixpoint(&mut state, &mut tracker).is_err());
	}
}
