//! Regular-language propagator (spec §4.7, component C10): `vars` spells out
//! a word accepted by a given DFA.
//!
//! Maintains a layered supports graph (Pesant 2004): per position `l`, the
//! set of states reachable from the start state by the length-`l` prefix,
//! and the set co-reachable from an accepting state by the length-`(n-l)`
//! suffix. A value survives at position `l` only if some live state at `l`
//! has an edge labelled by that value into a live state at `l+1`; deletions
//! propagate forward and backward to a fixpoint as the registry re-invokes
//! this propagator on every relevant domain change.

use std::collections::{HashMap, HashSet};

use crate::{
	domain::Contradiction,
	inference::{Justification, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	propagators::{PropagationContext, Propagator, SubscriptionState},
	variable::IntegerVariableID,
};

pub struct Regular {
	vars: Vec<IntegerVariableID>,
	transitions: HashMap<(usize, Integer), usize>,
	accepting: HashSet<usize>,
	start: usize,
	num_states: usize,
}

impl Regular {
	pub fn new(
		vars: Vec<IntegerVariableID>,
		start: usize,
		transitions: Vec<(usize, Integer, usize)>,
		accepting: HashSet<usize>,
		num_states: usize,
	) -> Self {
		Regular {
			vars,
			transitions: transitions.into_iter().map(|(s, a, t)| ((s, a), t)).collect(),
			accepting,
			start,
			num_states,
		}
	}

	fn other_vars(&self, excluding: usize) -> Vec<IntegerVariableID> {
		self.vars
			.iter()
			.enumerate()
			.filter(|&(i, _)| i != excluding)
			.map(|(_, &v)| v)
			.collect()
	}
}

impl Propagator for Regular {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		let n = self.vars.len();

		let mut reachable: Vec<HashSet<usize>> = vec![HashSet::new(); n + 1];
		reachable[0].insert(self.start);
		for l in 0..n {
			let mut next = HashSet::new();
			ctx.state().for_each_value(self.vars[l], |a| {
				for &s in &reachable[l] {
					if let Some(&t) = self.transitions.get(&(s, a)) {
						next.insert(t);
					}
				}
			});
			reachable[l + 1] = next;
		}

		let mut coreachable: Vec<HashSet<usize>> = vec![HashSet::new(); n + 1];
		coreachable[n] = self.accepting.clone();
		for l in (0..n).rev() {
			let mut prev = HashSet::new();
			ctx.state().for_each_value(self.vars[l], |a| {
				for s in 0..self.num_states {
					if let Some(&t) = self.transitions.get(&(s, a)) {
						if coreachable[l + 1].contains(&t) {
							prev.insert(s);
						}
					}
				}
			});
			coreachable[l] = prev;
		}

		if reachable[0].intersection(&coreachable[0]).next().is_none() {
			return Err(ctx.contradiction(Justification::Rup, ReasonOutline::BothBounds(self.vars.clone())));
		}

		for l in 0..n {
			let live_here: HashSet<usize> = reachable[l].intersection(&coreachable[l]).copied().collect();
			let live_next: HashSet<usize> = reachable[l + 1].intersection(&coreachable[l + 1]).copied().collect();
			let mut unsupported = Vec::new();
			ctx.state().for_each_value(self.vars[l], |a| {
				let supported = live_here
					.iter()
					.any(|&s| self.transitions.get(&(s, a)).is_some_and(|t| live_next.contains(t)));
				if !supported {
					unsupported.push(a);
				}
			});
			if unsupported.is_empty() {
				continue;
			}
			let reason = self.other_vars(l);
			for a in unsupported {
				ctx.infer(
					Literal::new(self.vars[l], IntegerVariableCondition::NotEqual(a)),
					Justification::Rup,
					ReasonOutline::BothBounds(reason.clone()),
				)?;
			}
		}

		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"regular"
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
	fn zero_star_one_star_forces_remaining_ones() {
		// states: 0 (seen only 0s, start+accepting), 1 (seen a 1, accepting).
		// transitions: 0 -0-> 0, 0 -1-> 1, 1 -1-> 1. Length 3, first symbol = 1
		// forces the remaining two to also be 1.
		let mut state = State::default();
		let vars: Vec<IntegerVariableID> = (0..3).map(|_| simple_var(&mut state, 0, 1)).collect();
		let transitions = vec![
			(0usize, Integer::new(0), 0usize),
			(0, Integer::new(1), 1),
			(1, Integer::new(1), 1),
		];
		let accepting: HashSet<usize> = [0, 1].into_iter().collect();
		let regular = Regular::new(vars.clone(), 0, transitions, accepting, 2);

		state.infer_equal(vars[0], Integer::new(1)).unwrap();

		let simple_v0 = match vars[0] {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut registry = PropagatorRegistry::new();
		registry.register(Box::new(regular), &[(simple_v0, TriggerKind::Change)]);
		let mut tracker = InferenceTracker::new(None);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();

		assert_eq!(state.value(vars[1]), Some(Integer::new(1)));
		assert_eq!(state.value(vars[2]), Some(Integer::new(1)));
	}
}
