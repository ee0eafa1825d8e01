//! Knapsack propagator (spec §4.7, component C10): 0/1 `items`, each
//! contributing its `weight`/`profit` when selected, with `weight_var` and
//! `profit_var` bound to the resulting sums.
//!
//! Beyond basic sum-bound propagation, a 0/1-knapsack dynamic-programming
//! frontier over the still-free items tightens `profit_var`'s upper bound to
//! what the remaining capacity can actually buy, and the same frontier
//! recomputed with one free item excluded forces that item in whenever
//! excluding it can never reach `profit_var`'s current lower bound (spec
//! §4.7: "at tight optimisation it computes a dynamic-programming resource
//! frontier").

use crate::{
	domain::Contradiction,
	inference::{Justification, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	propagators::{PropagationContext, Propagator, SubscriptionState},
	variable::IntegerVariableID,
};

pub struct Knapsack {
	weights: Vec<i64>,
	profits: Vec<i64>,
	items: Vec<IntegerVariableID>,
	weight_var: IntegerVariableID,
	profit_var: IntegerVariableID,
}

impl Knapsack {
	pub fn new(
		weights: Vec<i64>,
		profits: Vec<i64>,
		items: Vec<IntegerVariableID>,
		weight_var: IntegerVariableID,
		profit_var: IntegerVariableID,
	) -> Self {
		debug_assert_eq!(weights.len(), items.len());
		debug_assert_eq!(profits.len(), items.len());
		Knapsack {
			weights,
			profits,
			items,
			weight_var,
			profit_var,
		}
	}

	/// `dp[c]` is the best profit achievable from `free` items using at most
	/// `c` capacity (standard 0/1 knapsack DP, items processed high-to-low so
	/// each is used at most once).
	fn dp_frontier(&self, free: &[usize], capacity: i64) -> Vec<i64> {
		let capacity = capacity.max(0) as usize;
		let mut dp = vec![0i64; capacity + 1];
		for &i in free {
			let w = self.weights[i].max(0) as usize;
			let p = self.profits[i];
			if w == 0 {
				for slot in dp.iter_mut() {
					*slot += p;
				}
				continue;
			}
			for c in (w..=capacity).rev() {
				dp[c] = dp[c].max(dp[c - w] + p);
			}
		}
		dp
	}
}

impl Propagator for Knapsack {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		let n = self.items.len();
		let mut fixed_weight = 0i64;
		let mut fixed_profit = 0i64;
		let mut free: Vec<usize> = Vec::new();
		for i in 0..n {
			match ctx.state().value(self.items[i]) {
				Some(v) if v.raw() != 0 => {
					fixed_weight += self.weights[i];
					fixed_profit += self.profits[i];
				}
				Some(_) => {}
				None => free.push(i),
			}
		}

		let free_weight_sum: i64 = free.iter().map(|&i| self.weights[i]).sum();
		let free_profit_sum: i64 = free.iter().map(|&i| self.profits[i]).sum();

		let w_lo = Integer::new(fixed_weight);
		if ctx.state().lower_bound(self.weight_var) < w_lo {
			ctx.infer(
				Literal::new(self.weight_var, IntegerVariableCondition::GreaterEqual(w_lo)),
				Justification::Rup,
				ReasonOutline::BothBounds(self.items.clone()),
			)?;
		}
		let w_hi = Integer::new(fixed_weight + free_weight_sum);
		if ctx.state().upper_bound(self.weight_var) > w_hi {
			ctx.infer(
				Literal::new(self.weight_var, IntegerVariableCondition::Less(w_hi + Integer::new(1))),
				Justification::Rup,
				ReasonOutline::BothBounds(self.items.clone()),
			)?;
		}
		let p_lo = Integer::new(fixed_profit);
		if ctx.state().lower_bound(self.profit_var) < p_lo {
			ctx.infer(
				Literal::new(self.profit_var, IntegerVariableCondition::GreaterEqual(p_lo)),
				Justification::Rup,
				ReasonOutline::BothBounds(self.items.clone()),
			)?;
		}
		let p_hi_naive = Integer::new(fixed_profit + free_profit_sum);
		if ctx.state().upper_bound(self.profit_var) > p_hi_naive {
			ctx.infer(
				Literal::new(self.profit_var, IntegerVariableCondition::Less(p_hi_naive + Integer::new(1))),
				Justification::Rup,
				ReasonOutline::BothBounds(self.items.clone()),
			)?;
		}

		let capacity = ctx.state().upper_bound(self.weight_var).raw();
		for &i in &free {
			if fixed_weight + self.weights[i] > capacity {
				ctx.infer(
					Literal::new(self.items[i], IntegerVariableCondition::Equal(Integer::new(0))),
					Justification::Rup,
					ReasonOutline::BothBounds(vec![self.weight_var]),
				)?;
			}
		}
		let free: Vec<usize> = free
			.into_iter()
			.filter(|&i| !ctx.state().has_single_value(self.items[i]))
			.collect();

		let slack = capacity - fixed_weight;
		let dp = self.dp_frontier(&free, slack);
		let dp_best = *dp.last().unwrap_or(&0);
		let p_hi = Integer::new(fixed_profit + dp_best);
		if ctx.state().upper_bound(self.profit_var) > p_hi {
			ctx.infer(
				Literal::new(self.profit_var, IntegerVariableCondition::Less(p_hi + Integer::new(1))),
				Justification::Rup,
				ReasonOutline::BothBounds(self.items.clone()),
			)?;
		}

		let required = ctx.state().lower_bound(self.profit_var).raw();
		for &i in &free {
			let without: Vec<usize> = free.iter().copied().filter(|&j| j != i).collect();
			let dp_without = self.dp_frontier(&without, slack);
			let max_without = fixed_profit + *dp_without.last().unwrap_or(&0);
			if max_without < required {
				ctx.infer(
					Literal::new(self.items[i], IntegerVariableCondition::Equal(Integer::new(1))),
					Justification::Rup,
					ReasonOutline::BothBounds(vec![self.profit_var, self.weight_var]),
				)?;
			}
		}

		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"knapsack"
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

	fn bool_var(state: &mut State) -> IntegerVariableID {
		IntegerVariableID::Simple(state.new_variable(Domain::from_range(Integer::new(0), Integer::new(1))))
	}

	#[test]
	fn capacity_forces_an_overweight_item_out() {
		let mut state = State::default();
		let items: Vec<IntegerVariableID> = (0..2).map(|_| bool_var(&mut state)).collect();
		let weight_var = IntegerVariableID::Simple(state.new_variable(Domain::from_range(Integer::new(0), Integer::new(3))));
		let profit_var = IntegerVariableID::Simple(state.new_variable(Domain::from_range(Integer::new(0), Integer::new(20))));
		let knapsack = Knapsack::new(vec![2, 5], vec![3, 10], items.clone(), weight_var, profit_var);

		state.infer_equal(items[0], Integer::new(1)).unwrap();

		let simple_item0 = match items[0] {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut registry = PropagatorRegistry::new();
		registry.register(Box::new(knapsack), &[(simple_item0, TriggerKind::Change)]);
		let mut tracker = InferenceTracker::new(None);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();

		// item0 (weight 2) leaves capacity 1; item1 (weight 5) cannot fit.
		assert_eq!(state.value(items[1]), Some(Integer::new(0)));
	}
}
