//! The trailed state store: domains (C1) plus trail (C2), exposed through a
//! single view-aware API that rewrites every query/mutation on a
//! [`IntegerVariableID`] (simple, constant, or view) down to the underlying
//! [`SimpleIntegerVariable`] (spec §3, §4.1-4.2).

pub mod trail;

use crate::{
	domain::{Contradiction, Domain, DomainStore, HowChanged},
	integer::Integer,
	literal::IntegerVariableCondition,
	variable::{IntegerVariableID, SimpleIntegerVariable},
};

use self::trail::{Checkpoint, Trail};

/// Whether an optimisation objective is being minimised or maximised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
	Minimise,
	Maximise,
}

/// Optional objective tracked by the solver (spec §3).
#[derive(Clone, Copy, Debug)]
pub struct ObjectiveState {
	pub variable: IntegerVariableID,
	pub sense: Sense,
	pub best_known: Option<Integer>,
}

/// The trailed state: domain store, trail, and objective (spec §3
/// "Lifecycle": search mutates only domains, trail, and objective
/// best-known).
#[derive(Clone, Debug, Default)]
pub struct State {
	domains: DomainStore,
	trail: Trail,
	objective: Option<ObjectiveState>,
}

impl State {
	/// Register a new simple variable with the given domain.
	pub fn new_variable(&mut self, domain: Domain) -> SimpleIntegerVariable {
		self.domains.create(domain)
	}

	/// Read-only access to the domain store, for code (e.g. the proof name
	/// tracker at build time) that needs to enumerate initial domains.
	pub fn domains(&self) -> &DomainStore {
		&self.domains
	}

	pub fn objective(&self) -> Option<&ObjectiveState> {
		self.objective.as_ref()
	}

	pub fn set_objective(&mut self, variable: IntegerVariableID, sense: Sense) {
		self.objective = Some(ObjectiveState {
			variable,
			sense,
			best_known: None,
		});
	}

	/// Record an improved objective value (spec §4.9 branch-and-bound).
	pub fn tighten_objective(&mut self, value: Integer) {
		if let Some(obj) = &mut self.objective {
			obj.best_known = Some(value);
		}
	}

	pub fn push_checkpoint(&self) -> Checkpoint {
		self.trail.push_checkpoint()
	}

	pub fn restore_to(&mut self, checkpoint: Checkpoint) {
		self.trail.restore_to(checkpoint, &mut self.domains);
	}

	pub fn trail_len(&self) -> usize {
		self.trail.len()
	}

	/// Translate `value` from `var`'s coordinate space into its base
	/// variable's coordinate space, per the view invariant in spec §3.
	fn to_base_value(var: IntegerVariableID, value: Integer) -> Integer {
		match var {
			IntegerVariableID::View(v) => {
				let shifted = value - v.then_add;
				if v.negate_first {
					-shifted
				} else {
					shifted
				}
			}
			_ => value,
		}
	}

	fn from_base_value(var: IntegerVariableID, value: Integer) -> Integer {
		match var {
			IntegerVariableID::View(v) => {
				let base = if v.negate_first { -value } else { value };
				base + v.then_add
			}
			_ => value,
		}
	}

	pub fn lower_bound(&self, var: IntegerVariableID) -> Integer {
		match var {
			IntegerVariableID::Constant(c) => c,
			IntegerVariableID::Simple(s) => self.domains.lower_bound(s),
			IntegerVariableID::View(v) => {
				let base_extreme = if v.negate_first {
					self.domains.upper_bound(v.base)
				} else {
					self.domains.lower_bound(v.base)
				};
				Self::from_base_value(var, base_extreme)
			}
		}
	}

	pub fn upper_bound(&self, var: IntegerVariableID) -> Integer {
		match var {
			IntegerVariableID::Constant(c) => c,
			IntegerVariableID::Simple(s) => self.domains.upper_bound(s),
			IntegerVariableID::View(v) => {
				let base_extreme = if v.negate_first {
					self.domains.lower_bound(v.base)
				} else {
					self.domains.upper_bound(v.base)
				};
				Self::from_base_value(var, base_extreme)
			}
		}
	}

	pub fn has_single_value(&self, var: IntegerVariableID) -> bool {
		match var {
			IntegerVariableID::Constant(_) => true,
			IntegerVariableID::Simple(s) => self.domains.has_single_value(s),
			IntegerVariableID::View(v) => self.domains.has_single_value(v.base),
		}
	}

	pub fn value(&self, var: IntegerVariableID) -> Option<Integer> {
		self.has_single_value(var).then(|| self.lower_bound(var))
	}

	pub fn in_domain(&self, var: IntegerVariableID, val: Integer) -> bool {
		match var {
			IntegerVariableID::Constant(c) => c == val,
			IntegerVariableID::Simple(s) => self.domains.in_domain(s, val),
			IntegerVariableID::View(_) => {
				self.domains.in_domain(self.base_of(var), Self::to_base_value(var, val))
			}
		}
	}

	pub fn domain_size(&self, var: IntegerVariableID) -> usize {
		match var {
			IntegerVariableID::Constant(_) => 1,
			IntegerVariableID::Simple(s) => self.domains.domain_size(s),
			IntegerVariableID::View(v) => self.domains.domain_size(v.base),
		}
	}

	/// Call `f` on every value currently in `var`'s domain, in increasing
	/// order from `var`'s point of view (reversed relative to the base
	/// variable if the view negates).
	pub fn for_each_value(&self, var: IntegerVariableID, mut f: impl FnMut(Integer)) {
		match var {
			IntegerVariableID::Constant(c) => f(c),
			IntegerVariableID::Simple(s) => self.domains.for_each_value(s, f),
			IntegerVariableID::View(v) => {
				if v.negate_first {
					let mut values = Vec::with_capacity(self.domains.domain_size(v.base));
					self.domains.for_each_value(v.base, |x| values.push(x));
					for x in values.into_iter().rev() {
						f(Self::from_base_value(var, x));
					}
				} else {
					self.domains.for_each_value(v.base, |x| f(Self::from_base_value(var, x)));
				}
			}
		}
	}

	fn base_of(&self, var: IntegerVariableID) -> SimpleIntegerVariable {
		match var {
			IntegerVariableID::Simple(s) => s,
			IntegerVariableID::View(v) => v.base,
			IntegerVariableID::Constant(_) => {
				unreachable!("constants have no underlying storage")
			}
		}
	}

	/// Apply a condition to a variable, dispatching to the appropriate
	/// [`DomainStore`] mutator after rewriting through any view, and recording
	/// the mutation on the trail. This is the single entry point used by
	/// [`Self::infer_equal`]/[`Self::infer_not_equal`]/[`Self::infer_ge`]/
	/// [`Self::infer_lt`] (spec §4.1).
	fn apply_condition(
		&mut self,
		var: IntegerVariableID,
		condition: IntegerVariableCondition,
	) -> Result<HowChanged, Contradiction> {
		match var {
			IntegerVariableID::Constant(c) => {
				if condition.holds_for(c) {
					Ok(HowChanged::NoChange)
				} else {
					Err(Contradiction)
				}
			}
			_ => {
				let (simple, rewritten) = var
					.rewrite_condition(condition)
					.expect("non-constant variables rewrite to a base");
				let (prior, result) = match rewritten {
					IntegerVariableCondition::Equal(v) => self.domains.infer_equal(simple, v),
					IntegerVariableCondition::NotEqual(v) => {
						self.domains.infer_not_equal(simple, v)
					}
					IntegerVariableCondition::GreaterEqual(v) => {
						self.domains.infer_ge(simple, v)
					}
					IntegerVariableCondition::Less(v) => self.domains.infer_lt(simple, v),
				};
				if result.is_ok() {
					self.trail.record(simple, prior);
				}
				result
			}
		}
	}

	pub fn infer_equal(
		&mut self,
		var: IntegerVariableID,
		val: Integer,
	) -> Result<HowChanged, Contradiction> {
		self.apply_condition(var, IntegerVariableCondition::Equal(val))
	}

	pub fn infer_not_equal(
		&mut self,
		var: IntegerVariableID,
		val: Integer,
	) -> Result<HowChanged, Contradiction> {
		self.apply_condition(var, IntegerVariableCondition::NotEqual(val))
	}

	pub fn infer_ge(
		&mut self,
		var: IntegerVariableID,
		val: Integer,
	) -> Result<HowChanged, Contradiction> {
		self.apply_condition(var, IntegerVariableCondition::GreaterEqual(val))
	}

	pub fn infer_lt(
		&mut self,
		var: IntegerVariableID,
		val: Integer,
	) -> Result<HowChanged, Contradiction> {
		self.apply_condition(var, IntegerVariableCondition::Less(val))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn view_queries_rewrite_to_base() {
		let mut st = State::default();
		let x = st.new_variable(Domain::from_range(Integer::new(0), Integer::new(9)));
		let x = IntegerVariableID::Simple(x);
		let neg = x.negate(); // -x in [-9, 0]
		assert_eq!(st.lower_bound(neg), Integer::new(-9));
		assert_eq!(st.upper_bound(neg), Integer::new(0));

		st.infer_ge(neg, Integer::new(-3)).unwrap(); // -x >= -3 <-> x <= 3
		assert_eq!(st.upper_bound(x), Integer::new(3));
	}

	#[test]
	fn view_equivalence_for_affine_offset() {
		let mut st = State::default();
		let x = st.new_variable(Domain::from_range(Integer::new(0), Integer::new(9)));
		let x = IntegerVariableID::Simple(x);
		let shifted = x.plus(Integer::new(10)); // x+10 in [10,19]
		assert!(st.in_domain(shifted, Integer::new(15)));
		st.infer_equal(shifted, Integer::new(15)).unwrap();
		assert_eq!(st.value(x), Some(Integer::new(5)));
	}

	#[test]
	fn constant_inference_is_checked_not_mutated() {
		let mut st = State::default();
		let c = IntegerVariableID::Constant(Integer::new(4));
		assert!(st.infer_equal(c, Integer::new(4)).is_ok());
		assert!(st.infer_equal(c, Integer::new(5)).is_err());
	}
}
