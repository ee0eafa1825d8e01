//! Inverse-channeling propagator (spec §4.7, component C10):
//! `yᵢ = k ⇔ x_k = i`, with `x_start`/`y_start` offsetting the index ranges
//! each array is read at.
//!
//! Two mutually-supporting passes, each shaped like
//! [`crate::propagators::element`]'s support check: a value `i` survives in
//! `dom(x_k)` only while the corresponding `y` entry still allows `k`, and
//! symmetrically for `y` against `x`.

use crate::{
	domain::Contradiction,
	inference::{Justification, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	propagators::{PropagationContext, Propagator, SubscriptionState},
	variable::IntegerVariableID,
};

pub struct Inverse {
	x: Vec<IntegerVariableID>,
	y: Vec<IntegerVariableID>,
	x_start: i64,
	y_start: i64,
}

impl Inverse {
	pub fn new(x: Vec<IntegerVariableID>, y: Vec<IntegerVariableID>, x_start: i64, y_start: i64) -> Self {
		Inverse { x, y, x_start, y_start }
	}

	fn prune_direction(
		ctx: &mut PropagationContext,
		from: &[IntegerVariableID],
		from_start: i64,
		to: &[IntegerVariableID],
		to_start: i64,
	) -> Result<(), Contradiction> {
		for (k, &var_k) in from.iter().enumerate() {
			let mut unsupported = Vec::new();
			ctx.state().for_each_value(var_k, |v| {
				let idx = v.raw() - to_start;
				let supported = idx >= 0
					&& (idx as usize) < to.len()
					&& ctx.state().in_domain(to[idx as usize], Integer::new(k as i64 + from_start));
				if !supported {
					unsupported.push(v);
				}
			});
			for v in unsupported {
				ctx.infer(
					Literal::new(var_k, IntegerVariableCondition::NotEqual(v)),
					Justification::Rup,
					ReasonOutline::BothBounds(to.to_vec()),
				)?;
			}
		}
		Ok(())
	}
}

impl Propagator for Inverse {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		Self::prune_direction(ctx, &self.x, self.x_start, &self.y, self.y_start)?;
		Self::prune_direction(ctx, &self.y, self.y_start, &self.x, self.x_start)?;
		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"inverse"
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		domain::Domain,
		inference::InferenceTracker,
		propagators::{PropagatorRegistry, TriggerKind},
		state::State,
	};

	fn simple_var(state: &mut State, lo: i64, hi: i64) -> IntegerVariableID {
		IntegerVariableID::Simple(state.new_variable(Domain::from_range(Integer::new(lo), Integer::new(hi))))
	}

	#[test]
	fn fixing_x_propagates_into_y() {
		// x_0 = 1 means y_1 = 0; other y-values for index 1 are pruned away.
		let mut state = State::default();
		let x: Vec<IntegerVariableID> = (0..2).map(|_| simple_var(&mut state, 0, 1)).collect();
		let y: Vec<IntegerVariableID> = (0..2).map(|_| simple_var(&mut state, 0, 1)).collect();
		let inverse = Inverse::new(x.clone(), y.clone(), 0, 0);

		state.infer_equal(x[0], Integer::new(1)).unwrap();

		let simple_x0 = match x[0] {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut registry = PropagatorRegistry::new();
		registry.register(Box::new(inverse), &[(simple_x0, TriggerKind::Change)]);
		let mut tracker = InferenceTracker::new(None);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();

		assert_eq!(state.value(y[1]), Some(Integer::new(0)));
	}
}
