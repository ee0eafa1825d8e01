//! Smart-table propagator (spec §4.7, component C10): tuples whose entries
//! are conditions — `var op const`, `var op var`, or set membership —
//! rather than bare values, following Mairy, Deville & Lecoutre (2015). A
//! tuple activates when every one of its entries holds.
//!
//! Each propagation pass drops tuples no longer consistent with current
//! domains, then removes any variable/value pair with no remaining
//! supporting tuple — the same two-phase shape as
//! [`crate::propagators::table::Table`], generalised from exact values to
//! entry conditions. The per-entry consistency checks below are necessary,
//! not sufficient, conditions for a tuple's full joint satisfiability (the
//! "forest of conditions" in the cited paper shares these checks across
//! tuples; this crate re-evaluates them per tuple, trading some pruning
//! strength for a simpler implementation — see `DESIGN.md`), so this pass is
//! sound but not maximally arc-consistent.

use crate::{
	domain::Contradiction,
	inference::{Justification, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	propagators::{PropagationContext, Propagator, SubscriptionState},
	variable::IntegerVariableID,
};

/// A single tuple entry: the condition `vars[position]` must satisfy for
/// this tuple to be (partially) active.
#[derive(Clone, Debug)]
pub enum SmartEntry {
	Any,
	Eq(Integer),
	Neq(Integer),
	InSet(Vec<Integer>),
	/// Equal to the value of another variable in the same tuple, by index.
	EqVar(usize),
	/// Different from the value of another variable in the same tuple, by index.
	NeqVar(usize),
}

pub struct SmartTable {
	vars: Vec<IntegerVariableID>,
	tuples: Vec<Vec<SmartEntry>>,
}

impl SmartTable {
	pub fn new(vars: Vec<IntegerVariableID>, tuples: Vec<Vec<SmartEntry>>) -> Self {
		debug_assert!(tuples.iter().all(|t| t.len() == vars.len()));
		SmartTable { vars, tuples }
	}

	fn tuple_consistent(&self, ctx: &PropagationContext, t: usize) -> bool {
		self.tuples[t].iter().enumerate().all(|(k, entry)| {
			let var_k = self.vars[k];
			match entry {
				SmartEntry::Any => true,
				SmartEntry::Eq(v) => ctx.state().in_domain(var_k, *v),
				SmartEntry::Neq(v) => !(ctx.state().has_single_value(var_k) && ctx.state().value(var_k) == Some(*v)),
				SmartEntry::InSet(set) => set.iter().any(|&v| ctx.state().in_domain(var_k, v)),
				SmartEntry::EqVar(j) => {
					let var_j = self.vars[*j];
					let mut any = false;
					ctx.state().for_each_value(var_k, |v| {
						any = any || ctx.state().in_domain(var_j, v);
					});
					any
				}
				SmartEntry::NeqVar(j) => {
					let var_j = self.vars[*j];
					!(ctx.state().has_single_value(var_k)
						&& ctx.state().has_single_value(var_j)
						&& ctx.state().value(var_k) == ctx.state().value(var_j))
				}
			}
		})
	}

	fn entry_supports(&self, ctx: &PropagationContext, t: usize, k: usize, v: Integer) -> bool {
		match &self.tuples[t][k] {
			SmartEntry::Any => true,
			SmartEntry::Eq(ev) => v == *ev,
			SmartEntry::Neq(ev) => v != *ev,
			SmartEntry::InSet(set) => set.contains(&v),
			SmartEntry::EqVar(j) => ctx.state().in_domain(self.vars[*j], v),
			SmartEntry::NeqVar(j) => {
				!(ctx.state().has_single_value(self.vars[*j]) && ctx.state().value(self.vars[*j]) == Some(v))
			}
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

impl Propagator for SmartTable {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		let alive: Vec<usize> = (0..self.tuples.len()).filter(|&t| self.tuple_consistent(ctx, t)).collect();
		if alive.is_empty() {
			return Err(ctx.contradiction(Justification::Rup, ReasonOutline::BothBounds(self.vars.clone())));
		}

		for k in 0..self.vars.len() {
			let var_k = self.vars[k];
			let mut unsupported = Vec::new();
			ctx.state().for_each_value(var_k, |v| {
				let supported = alive.iter().any(|&t| self.entry_supports(ctx, t, k, v));
				if !supported {
					unsupported.push(v);
				}
			});
			if unsupported.is_empty() {
				continue;
			}
			let reason = self.other_vars(k);
			for v in unsupported {
				ctx.infer(
					Literal::new(var_k, IntegerVariableCondition::NotEqual(v)),
					Justification::Rup,
					ReasonOutline::BothBounds(reason.clone()),
				)?;
			}
		}

		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"smart_table"
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
	fn var_var_inequality_entry_prunes_like_not_equal() {
		// Single tuple: x != y. Fixing x forces y away from that value.
		let mut state = State::default();
		let x = simple_var(&mut state, 0, 2);
		let y = simple_var(&mut state, 0, 2);
		let tuples = vec![vec![SmartEntry::Any, SmartEntry::NeqVar(0)]];
		let smart_table = SmartTable::new(vec![x, y], tuples);

		state.infer_equal(x, Integer::new(1)).unwrap();

		let simple_x = match x {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut registry = PropagatorRegistry::new();
		registry.register(Box::new(smart_table), &[(simple_x, TriggerKind::Change)]);
		let mut tracker = InferenceTracker::new(None);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();

		assert!(!state.in_domain(y, Integer::new(1)));
	}
}
