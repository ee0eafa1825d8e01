//! Element propagator (spec §4.7, component C10): `array[idx] = var`.
//!
//! Model: one clause `idx ≠ i ∨ array[i] ≠ v ∨ var = v` per `(i, v)` in
//! `array[i]`'s initial domain. Propagation keeps `idx` within bounds, prunes
//! `var` to the union of `dom(array[idx=i])` over alive indices `i`, and
//! tightens both `var` and `array[idx]` against each other once `idx` is a
//! singleton.

use crate::{
	domain::Contradiction,
	inference::{Justification, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	proof::{model::ModelWriter, names::ProofNameTracker, Comparator},
	propagators::{PropagationContext, Propagator, SubscriptionState},
	state::State,
	variable::IntegerVariableID,
};

pub struct Element {
	var: IntegerVariableID,
	idx: IntegerVariableID,
	array: Vec<IntegerVariableID>,
}

impl Element {
	/// Post the per-`(i, v)` support clauses and build the propagator.
	pub fn post(
		model: &mut ModelWriter,
		names: &ProofNameTracker,
		state: &State,
		var: IntegerVariableID,
		idx: IntegerVariableID,
		array: Vec<IntegerVariableID>,
	) -> Self {
		for (i, &array_i) in array.iter().enumerate() {
			state.for_each_value(array_i, |v| {
				let mut terms = Vec::new();
				for (target, condition) in [
					(idx, IntegerVariableCondition::NotEqual(Integer::new(i as i64))),
					(array_i, IntegerVariableCondition::NotEqual(v)),
					(var, IntegerVariableCondition::Equal(v)),
				] {
					if let Some((simple, rewritten)) = target.rewrite_condition(condition) {
						terms.extend(names.literal_for_condition(simple, rewritten));
					}
				}
				model.add_constraint(names, &terms, Comparator::GreaterEqual, 1);
			});
		}
		Element { var, idx, array }
	}
}

impl Propagator for Element {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		ctx.infer(
			Literal::new(self.idx, IntegerVariableCondition::GreaterEqual(Integer::new(0))),
			Justification::Assertion,
			ReasonOutline::none(),
		)?;
		ctx.infer(
			Literal::new(self.idx, IntegerVariableCondition::Less(Integer::new(self.array.len() as i64))),
			Justification::Assertion,
			ReasonOutline::none(),
		)?;

		let mut alive: Vec<usize> = Vec::new();
		ctx.state().for_each_value(self.idx, |i| alive.push(i.raw() as usize));

		for &i in &alive {
			let array_i = self.array[i];
			let mut compatible = false;
			ctx.state().for_each_value(array_i, |v| {
				compatible = compatible || ctx.state().in_domain(self.var, v);
			});
			if !compatible {
				ctx.infer(
					Literal::new(self.idx, IntegerVariableCondition::NotEqual(Integer::new(i as i64))),
					Justification::Rup,
					ReasonOutline::BothBounds(vec![self.var, array_i]),
				)?;
			}
		}

		let alive: Vec<usize> = alive
			.into_iter()
			.filter(|&i| ctx.state().in_domain(self.idx, Integer::new(i as i64)))
			.collect();

		let mut unsupported = Vec::new();
		ctx.state().for_each_value(self.var, |v| {
			let supported = alive.iter().any(|&i| ctx.state().in_domain(self.array[i], v));
			if !supported {
				unsupported.push(v);
			}
		});
		for v in unsupported {
			ctx.infer(
				Literal::new(self.var, IntegerVariableCondition::NotEqual(v)),
				Justification::Rup,
				ReasonOutline::BothBounds(self.array.clone()),
			)?;
		}

		if let Some(i0) = ctx.state().value(self.idx) {
			let array_i0 = self.array[i0.raw() as usize];

			let mut remove_from_array = Vec::new();
			ctx.state().for_each_value(array_i0, |v| {
				if !ctx.state().in_domain(self.var, v) {
					remove_from_array.push(v);
				}
			});
			for v in remove_from_array {
				ctx.infer(
					Literal::new(array_i0, IntegerVariableCondition::NotEqual(v)),
					Justification::Rup,
					ReasonOutline::BothBounds(vec![self.var]),
				)?;
			}

			let mut remove_from_var = Vec::new();
			ctx.state().for_each_value(self.var, |v| {
				if !ctx.state().in_domain(array_i0, v) {
					remove_from_var.push(v);
				}
			});
			for v in remove_from_var {
				ctx.infer(
					Literal::new(self.var, IntegerVariableCondition::NotEqual(v)),
					Justification::Rup,
					ReasonOutline::BothBounds(vec![array_i0]),
				)?;
			}
		}

		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"element"
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		domain::Domain,
		inference::InferenceTracker,
		proof::names::EncodingKind,
		propagators::{PropagatorRegistry, TriggerKind},
	};

	fn simple_var(state: &mut State, lo: i64, hi: i64) -> IntegerVariableID {
		IntegerVariableID::Simple(state.new_variable(Domain::from_range(Integer::new(lo), Integer::new(hi))))
	}

	#[test]
	fn fixing_idx_propagates_in_both_directions() {
		let mut state = State::default();
		let var = simple_var(&mut state, 0, 9);
		let idx = simple_var(&mut state, 0, 1);
		let array = vec![simple_var(&mut state, 4, 4), simple_var(&mut state, 7, 7)];

		let mut names = ProofNameTracker::new(false);
		for &v in [var, idx, array[0], array[1]].iter() {
			if let IntegerVariableID::Simple(s) = v {
				let domain = Domain::from_range(state.lower_bound(v), state.upper_bound(v));
				let _ = names.register_variable(s, None, &domain, EncodingKind::Direct);
			}
		}
		let mut model = ModelWriter::new();
		let element = Element::post(&mut model, &names, &state, var, idx, array);

		state.infer_equal(idx, Integer::new(0)).unwrap();

		let simple_idx = match idx {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut registry = PropagatorRegistry::new();
		registry.register(Box::new(element), &[(simple_idx, TriggerKind::Change)]);
		let mut tracker = InferenceTracker::new(None);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();

		assert_eq!(state.value(var), Some(Integer::new(4)));
	}
}
