//! Circuit propagator (spec §4.7, component C10): `succ` is a permutation
//! of `[0, n)` whose functional graph is a single `n`-cycle.
//!
//! Built on top of [`AllDifferent`] with GAC enabled (the permutation part);
//! [`SCCOptions::eliminate_short_cycles`] layers sub-tour elimination on top:
//! every node's forced chain (the path obtained by following singleton
//! `succ` assignments) is traced, and the edge that would close it before
//! all `n` nodes are visited is pruned. The justification is the sum of the
//! chain's own forced-edge literals (spec §4.7: "pruned edge as the sum of
//! the path constraints along the forced partial tour").

use crate::{
	domain::Contradiction,
	inference::{Justification, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	proof::{model::ModelWriter, names::ProofNameTracker},
	propagators::{
		all_different::{AllDifferent, Gac},
		PropagationContext, Propagator, SubscriptionState,
	},
	state::State,
	variable::IntegerVariableID,
};

/// Toggles for the sub-cycle elimination pass layered on top of the base
/// permutation constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SCCOptions {
	pub eliminate_short_cycles: bool,
}

impl Default for SCCOptions {
	fn default() -> Self {
		SCCOptions {
			eliminate_short_cycles: true,
		}
	}
}

pub struct Circuit {
	vars: Vec<IntegerVariableID>,
	all_different: AllDifferent,
	options: SCCOptions,
}

impl Circuit {
	pub fn post(
		model: &mut ModelWriter,
		names: &ProofNameTracker,
		state: &State,
		vars: Vec<IntegerVariableID>,
		options: SCCOptions,
	) -> Self {
		let all_different = AllDifferent::post(model, names, state, vars.clone(), Gac::Enabled);
		Circuit {
			vars,
			all_different,
			options,
		}
	}

	/// The node at the far end of the forced chain reachable from `node` by
	/// following singleton `succ` assignments.
	fn chain_end(&self, fixed: &[Option<usize>], node: usize) -> usize {
		let n = self.vars.len();
		let mut cur = node;
		let mut steps = 0;
		while let Some(next) = fixed[cur] {
			if next == cur || steps >= n {
				break;
			}
			cur = next;
			steps += 1;
		}
		cur
	}

	/// The node at the near end of the forced chain reaching `node`, by
	/// following backwards whichever node is forced to point at `node`.
	fn chain_start(&self, fixed: &[Option<usize>], node: usize) -> usize {
		let n = self.vars.len();
		let mut cur = node;
		let mut steps = 0;
		loop {
			let predecessor = (0..n).find(|&j| j != cur && fixed[j] == Some(cur));
			match predecessor {
				Some(p) if steps < n => {
					cur = p;
					steps += 1;
				}
				_ => break,
			}
		}
		cur
	}

	/// The number of nodes in the forced chain starting at `start`.
	fn chain_len(&self, fixed: &[Option<usize>], start: usize) -> usize {
		let n = self.vars.len();
		let mut len = 1;
		let mut cur = start;
		while let Some(next) = fixed[cur] {
			if next == cur || len >= n {
				break;
			}
			cur = next;
			len += 1;
		}
		len
	}

	fn eliminate_subtours(&self, ctx: &mut PropagationContext) -> Result<(), Contradiction> {
		let n = self.vars.len();
		let fixed: Vec<Option<usize>> = self
			.vars
			.iter()
			.map(|&v| ctx.state().value(v).map(|x| x.raw() as usize))
			.collect();

		for i in 0..n {
			let start = self.chain_start(&fixed, i);
			let end = self.chain_end(&fixed, i);
			let len = self.chain_len(&fixed, start);
			if len >= n || start == end {
				continue;
			}
			if !ctx.state().in_domain(self.vars[end], Integer::new(start as i64)) {
				continue;
			}

			let mut reason = Vec::new();
			let mut cur = start;
			while let Some(next) = fixed[cur] {
				if next == cur {
					break;
				}
				reason.push(Literal::new(self.vars[cur], IntegerVariableCondition::Equal(Integer::new(next as i64))));
				cur = next;
				if cur == end {
					break;
				}
			}

			ctx.infer(
				Literal::new(self.vars[end], IntegerVariableCondition::NotEqual(Integer::new(start as i64))),
				Justification::Rup,
				ReasonOutline::Literals(reason),
			)?;
		}
		Ok(())
	}
}

impl Propagator for Circuit {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		self.all_different.propagate(ctx)?;
		if self.options.eliminate_short_cycles {
			self.eliminate_subtours(ctx)?;
		}
		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"circuit"
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

	fn simple_var(state: &mut State, n: i64) -> IntegerVariableID {
		IntegerVariableID::Simple(state.new_variable(Domain::from_range(Integer::new(0), Integer::new(n - 1))))
	}

	#[test]
	fn forbids_closing_a_short_subtour() {
		// 4-node circuit: 0 -> 1 -> 2 forced; node 2's successor must not be 0
		// (that would close a 3-cycle, leaving node 3 stranded).
		let mut state = State::default();
		let vars: Vec<IntegerVariableID> = (0..4).map(|_| simple_var(&mut state, 4)).collect();
		let mut names = ProofNameTracker::new(false);
		for &v in &vars {
			if let IntegerVariableID::Simple(s) = v {
				let _ = names.register_variable(s, None, &Domain::from_range(Integer::new(0), Integer::new(3)), EncodingKind::Direct);
			}
		}
		let mut model = ModelWriter::new();
		let circuit = Circuit::post(&mut model, &names, &state, vars.clone(), SCCOptions::default());

		state.infer_equal(vars[0], Integer::new(1)).unwrap();
		state.infer_equal(vars[1], Integer::new(2)).unwrap();

		let simple_v0 = match vars[0] {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut registry = PropagatorRegistry::new();
		registry.register(Box::new(circuit), &[(simple_v0, TriggerKind::Change)]);
		let mut tracker = InferenceTracker::new(None);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();

		assert!(!state.in_domain(vars[2], Integer::new(0)));
	}
}
