//! All-different propagator (spec §4.7, component C10).
//!
//! Value-consistent pruning (an instantiated variable's value is removed
//! from every other variable) runs unconditionally. [`Gac::Enabled`] adds a
//! bipartite-matching arc-consistency pass (Régin 1994): a maximum matching
//! between variables and values is computed, the residual graph's strongly
//! connected components identify which (variable, value) pairs can never
//! belong to any maximum matching, and those are pruned.
//!
//! The per-value at-most-one model constraint doubles as the spec's "clique
//! of pairwise not-equals": for any two variables sharing a value `v`, the
//! at-most-one over `v` already forbids both taking it, so no separate
//! pairwise constraint is posted (see `DESIGN.md`).

use std::collections::{BTreeMap, HashMap};

use crate::{
	domain::Contradiction,
	inference::{Justification, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	proof::{
		logger::PolOp,
		model::{negate_expr, ModelLine, ModelWriter},
		names::ProofNameTracker,
		Comparator, PbTerm,
	},
	propagators::{PropagationContext, Propagator, SubscriptionState},
	state::State,
	variable::IntegerVariableID,
};

/// Whether the bipartite-matching GAC pass is enabled, or only the cheaper
/// value-consistent pruning (spec §4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gac {
	Enabled,
	Disabled,
}

pub struct AllDifferent {
	vars: Vec<IntegerVariableID>,
	gac: Gac,
	/// The per-value at-most-one model line, keyed by value, used to build
	/// the Hall-set cutting-planes derivation.
	at_most_one: BTreeMap<Integer, ModelLine>,
}

impl AllDifferent {
	/// Post the per-value at-most-one constraints (spec §4.7) and build the
	/// propagator. `state` supplies each variable's initial domain.
	pub fn post(
		model: &mut ModelWriter,
		names: &ProofNameTracker,
		state: &State,
		vars: Vec<IntegerVariableID>,
		gac: Gac,
	) -> Self {
		let mut by_value: BTreeMap<Integer, Vec<PbTerm>> = BTreeMap::new();
		for &var in &vars {
			state.for_each_value(var, |v| {
				let Some((simple, rewritten)) = var.rewrite_condition(IntegerVariableCondition::Equal(v)) else {
					return;
				};
				let expr = names.literal_for_condition(simple, rewritten);
				// A direct-encoded `x = v` is always a single positive atom;
				// bits-encoded variables are skipped from the model clique
				// (still pruned at runtime) since there is no single atom to
				// contribute (see `crate::proof::names`).
				if let [term] = expr.as_slice() {
					by_value.entry(v).or_default().push(*term);
				}
			});
		}

		let mut at_most_one = BTreeMap::new();
		for (value, terms) in by_value {
			if terms.len() < 2 {
				continue;
			}
			let line = model.add_constraint(names, &negate_expr(terms), Comparator::GreaterEqual, -1);
			at_most_one.insert(value, line);
		}

		AllDifferent {
			vars,
			gac,
			at_most_one,
		}
	}

	fn value_consistent(&self, ctx: &mut PropagationContext) -> Result<(), Contradiction> {
		for (i, &vi) in self.vars.iter().enumerate() {
			let Some(v) = ctx.state().value(vi) else {
				continue;
			};
			for (j, &vj) in self.vars.iter().enumerate() {
				if i == j || !ctx.state().in_domain(vj, v) {
					continue;
				}
				ctx.infer(
					Literal::new(vj, IntegerVariableCondition::NotEqual(v)),
					Justification::Rup,
					ReasonOutline::Literals(vec![Literal::new(vi, IntegerVariableCondition::Equal(v))]),
				)?;
			}
		}
		Ok(())
	}

	/// Bipartite-matching GAC pass: build the variable/value graph from
	/// current domains, find a maximum matching, then use the residual
	/// graph's SCCs to identify (and prune) every inconsistent edge.
	fn gac_pass(&self, ctx: &mut PropagationContext) -> Result<(), Contradiction> {
		let n = self.vars.len();
		let mut value_index: HashMap<Integer, usize> = HashMap::new();
		let mut values: Vec<Integer> = Vec::new();
		let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
		for (i, &var) in self.vars.iter().enumerate() {
			ctx.state().for_each_value(var, |v| {
				let idx = *value_index.entry(v).or_insert_with(|| {
					values.push(v);
					values.len() - 1
				});
				adj[i].push(idx);
			});
		}

		let mut match_val: Vec<Option<usize>> = vec![None; values.len()];
		for u in 0..n {
			let mut visited = vec![false; values.len()];
			if !try_augment(u, &adj, &mut visited, &mut match_val) {
				return Err(ctx.contradiction(Justification::Rup, ReasonOutline::BothBounds(self.vars.clone())));
			}
		}
		let mut match_var: Vec<Option<usize>> = vec![None; n];
		for (vi, &mv) in match_val.iter().enumerate() {
			if let Some(u) = mv {
				match_var[u] = Some(vi);
			}
		}

		let node_count = n + values.len();
		let mut graph: Vec<Vec<usize>> = vec![Vec::new(); node_count];
		for u in 0..n {
			for &v in &adj[u] {
				if match_var[u] == Some(v) {
					graph[n + v].push(u);
				} else {
					graph[u].push(n + v);
				}
			}
		}
		let scc_id = strongly_connected_components(&graph);

		for u in 0..n {
			for &v in &adj[u] {
				if match_var[u] == Some(v) || match_val[v].is_none() || scc_id[u] == scc_id[n + v] {
					continue;
				}
				self.prune(ctx, &scc_id, &values, u, v)?;
			}
		}
		Ok(())
	}

	/// Prune `self.vars[var_idx] != values[value_idx]`, justified by the
	/// Hall set formed by every variable/value sharing the value's residual
	/// SCC (spec §4.7: "combine ... using saturating addition").
	fn prune(
		&self,
		ctx: &mut PropagationContext,
		scc_id: &[usize],
		values: &[Integer],
		var_idx: usize,
		value_idx: usize,
	) -> Result<(), Contradiction> {
		let n = self.vars.len();
		let target_scc = scc_id[n + value_idx];
		let hall_lines: Vec<ModelLine> = (0..values.len())
			.filter(|&vi| scc_id[n + vi] == target_scc)
			.filter_map(|vi| self.at_most_one.get(&values[vi]).copied())
			.collect();
		let var = self.vars[var_idx];
		let value = values[value_idx];

		ctx.infer(
			Literal::new(var, IntegerVariableCondition::NotEqual(value)),
			Justification::ExplicitlyBy(Box::new(move |logger, names| {
				if let [first, rest @ ..] = hall_lines.as_slice() {
					let mut postfix = vec![PolOp::Line(first.0)];
					for line in rest {
						postfix.push(PolOp::Line(line.0));
						postfix.push(PolOp::Add);
					}
					logger.cutting_planes(&postfix)?;
				}
				let Some((simple, rewritten)) = var.rewrite_condition(IntegerVariableCondition::NotEqual(value))
				else {
					return Ok(());
				};
				let expr = names.literal_for_condition(simple, rewritten);
				logger.rup(&expr, Comparator::GreaterEqual, 1, None)?;
				Ok(())
			})),
			ReasonOutline::none(),
		)?;
		Ok(())
	}
}

fn try_augment(u: usize, adj: &[Vec<usize>], visited: &mut [bool], match_val: &mut [Option<usize>]) -> bool {
	for &v in &adj[u] {
		if visited[v] {
			continue;
		}
		visited[v] = true;
		let available = match match_val[v] {
			None => true,
			Some(w) => try_augment(w, adj, visited, match_val),
		};
		if available {
			match_val[v] = Some(u);
			return true;
		}
	}
	false
}

/// Tarjan's algorithm, iterative-free (the graphs here are small enough that
/// recursion depth is not a concern). Returns an SCC id per node.
fn strongly_connected_components(graph: &[Vec<usize>]) -> Vec<usize> {
	struct Tarjan<'a> {
		graph: &'a [Vec<usize>],
		index: Vec<Option<usize>>,
		lowlink: Vec<usize>,
		on_stack: Vec<bool>,
		stack: Vec<usize>,
		scc_id: Vec<usize>,
		next_index: usize,
		next_scc: usize,
	}
	impl<'a> Tarjan<'a> {
		fn visit(&mut self, v: usize) {
			self.index[v] = Some(self.next_index);
			self.lowlink[v] = self.next_index;
			self.next_index += 1;
			self.stack.push(v);
			self.on_stack[v] = true;

			for &w in &self.graph[v] {
				if self.index[w].is_none() {
					self.visit(w);
					self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
				} else if self.on_stack[w] {
					self.lowlink[v] = self.lowlink[v].min(self.index[w].unwrap());
				}
			}

			if self.lowlink[v] == self.index[v].unwrap() {
				loop {
					let w = self.stack.pop().unwrap();
					self.on_stack[w] = false;
					self.scc_id[w] = self.next_scc;
					if w == v {
						break;
					}
				}
				self.next_scc += 1;
			}
		}
	}

	let n = graph.len();
	let mut tarjan = Tarjan {
		graph,
		index: vec![None; n],
		lowlink: vec![0; n],
		on_stack: vec![false; n],
		stack: Vec::new(),
		scc_id: vec![0; n],
		next_index: 0,
		next_scc: 0,
	};
	for v in 0..n {
		if tarjan.index[v].is_none() {
			tarjan.visit(v);
		}
	}
	tarjan.scc_id
}

impl Propagator for AllDifferent {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		self.value_consistent(ctx)?;
		if self.gac == Gac::Enabled {
			self.gac_pass(ctx)?;
		}
		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"all_different"
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

	fn var(state: &mut State, lo: i64, hi: i64) -> IntegerVariableID {
		IntegerVariableID::Simple(state.new_variable(Domain::from_range(Integer::new(lo), Integer::new(hi))))
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
	fn value_consistent_prunes_an_instantiated_value() {
		let mut state = State::default();
		let x = var(&mut state, 0, 0);
		let y = var(&mut state, 0, 2);
		let names = names_for(&state, &[x, y]);
		let mut model = ModelWriter::new();
		let propagator = AllDifferent::post(&mut model, &names, &state, vec![x, y], Gac::Disabled);

		let simple_y = match y {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut registry = PropagatorRegistry::new();
		registry.register(Box::new(propagator), &[(simple_y, TriggerKind::Change)]);
		let mut tracker = InferenceTracker::new(None);
		registry.run_to_fixpoint(&mut state, &mut tracker).unwrap();

		assert!(!state.in_domain(y, Integer::new(0)));
	}

	#[test]
	fn gac_detects_a_hall_set_violation() {
		// Three variables all confined to {0,1}: infeasible all-different.
		let mut state = State::default();
		let x = var(&mut state, 0, 1);
		let y = var(&mut state, 0, 1);
		let z = var(&mut state, 0, 1);
		let names = names_for(&state, &[x, y, z]);
		let mut model = ModelWriter::new();
		let propagator = AllDifferent::post(&mut model, &names, &state, vec![x, y, z], Gac::Enabled);

		let simple_x = match x {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut registry = PropagatorRegistry::new();
		registry.register(Box::new(propagator), &[(simple_x, TriggerKind::Change)]);
		let mut tracker = InferenceTracker::new(None);
		assert!(registry.run_to_fixpoint(&mut state, &mut tracker).is_err());
	}
}
