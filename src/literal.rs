//! The literal/condition language (spec §3-4, component C4).
//!
//! A [`IntegerVariableCondition`] names one of the four primitive shapes a
//! propagator can test or assert: `x = v`, `x != v`, `x >= v`, `x < v`. A
//! [`Literal`] pairs a condition with the variable it is about, or stands for
//! a proof-only [`ProofFlag`] that carries no domain.

use std::fmt;

use crate::{integer::Integer, variable::IntegerVariableID};

/// One of the four primitive domain tests/assertions (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntegerVariableCondition {
	/// `x = v`
	Equal(Integer),
	/// `x != v`
	NotEqual(Integer),
	/// `x >= v`
	GreaterEqual(Integer),
	/// `x < v`
	Less(Integer),
}

impl IntegerVariableCondition {
	/// Logical negation of the condition (`x = v` <-> not `x != v`, `x >= v`
	/// <-> not `x < v`).
	pub fn negate(self) -> Self {
		use IntegerVariableCondition::*;
		match self {
			Equal(v) => NotEqual(v),
			NotEqual(v) => Equal(v),
			GreaterEqual(v) => Less(v),
			Less(v) => GreaterEqual(v),
		}
	}

	/// Translate the condition's threshold by an additive offset, used when
	/// rewriting a view's condition onto its base variable (spec §3).
	pub fn translate(self, offset: Integer) -> Self {
		use IntegerVariableCondition::*;
		match self {
			Equal(v) => Equal(v - offset),
			NotEqual(v) => NotEqual(v - offset),
			GreaterEqual(v) => GreaterEqual(v - offset),
			Less(v) => Less(v - offset),
		}
	}

	/// Rewrite the condition for a negated argument (`x >= v` on `-y` becomes
	/// `y <= -v`, i.e. `y < -v+1`), used when rewriting onto a
	/// `negate_first` view's base variable (spec §3).
	pub fn negate_argument(self) -> Self {
		use IntegerVariableCondition::*;
		match self {
			Equal(v) => Equal(-v),
			NotEqual(v) => NotEqual(-v),
			GreaterEqual(v) => Less(-v + Integer::new(1)),
			Less(v) => GreaterEqual(-v + Integer::new(1)),
		}
	}

	/// Evaluate the condition against a concrete value, used for constant
	/// variables and for checking whether a found solution actually satisfies
	/// a literal.
	pub fn holds_for(self, value: Integer) -> bool {
		use IntegerVariableCondition::*;
		match self {
			Equal(v) => value == v,
			NotEqual(v) => value != v,
			GreaterEqual(v) => value >= v,
			Less(v) => value < v,
		}
	}
}

impl fmt::Display for IntegerVariableCondition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		use IntegerVariableCondition::*;
		match self {
			Equal(v) => write!(f, "= {v}"),
			NotEqual(v) => write!(f, "!= {v}"),
			GreaterEqual(v) => write!(f, ">= {v}"),
			Less(v) => write!(f, "< {v}"),
		}
	}
}

/// A proof-only Boolean flag (spec §3): an index plus a polarity, created on
/// demand by the proof tracker. Has no domain; it exists purely so
/// propagators can emit auxiliary 0/1 atoms into the proof (e.g. Hall-set
/// indicator flags in all-different).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProofFlag {
	/// Dense index assigned by [`crate::proof::names::ProofNameTracker`].
	pub index: u32,
}

/// A literal: a condition on a variable, a proof flag (with polarity), or a
/// constant truth value. This is the currency that propagators and the
/// inference tracker exchange (spec §4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
	/// A condition applied to a variable.
	IntegerVariableCondition(IntegerVariableID, IntegerVariableCondition),
	/// A proof flag, asserted true.
	ProofFlag(ProofFlag),
	/// A proof flag, asserted false.
	NegatedProofFlag(ProofFlag),
	/// A literal that is always true or always false, independent of state.
	Constant(bool),
}

impl Literal {
	/// Build the literal `variable condition`.
	pub fn new(variable: IntegerVariableID, condition: IntegerVariableCondition) -> Self {
		Literal::IntegerVariableCondition(variable, condition)
	}

	/// Logical negation.
	pub fn negate(self) -> Self {
		match self {
			Literal::IntegerVariableCondition(v, c) => {
				Literal::IntegerVariableCondition(v, c.negate())
			}
			Literal::ProofFlag(f) => Literal::NegatedProofFlag(f),
			Literal::NegatedProofFlag(f) => Literal::ProofFlag(f),
			Literal::Constant(b) => Literal::Constant(!b),
		}
	}
}

impl std::ops::Not for Literal {
	type Output = Literal;
	fn not(self) -> Self::Output {
		self.negate()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn condition_negation_round_trips() {
		use IntegerVariableCondition::*;
		for c in [Equal(Integer::new(3)), GreaterEqual(Integer::new(-1))] {
			assert_eq!(c.negate().negate(), c);
		}
	}

	#[test]
	fn negate_argument_flips_bound_direction() {
		use IntegerVariableCondition::*;
		// y >= 5 on x=-y becomes x < -4
		assert_eq!(
			GreaterEqual(Integer::new(5)).negate_argument(),
			Less(Integer::new(-4))
		);
	}
}
