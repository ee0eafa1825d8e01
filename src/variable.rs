//! Typed variable handles (spec §3, component C3).
//!
//! A variable is either a [`SimpleIntegerVariable`] (an index into the domain
//! store), a constant, or a [`View`] — an affine rewriting of a simple
//! variable. Views are pure data, not a dispatch hierarchy (spec §9: "Variable
//! views as data, not inheritance").

use std::fmt;

use crate::{integer::Integer, literal::IntegerVariableCondition};

index_vec::define_index_type! {
	/// Index into the domain store for a non-view, non-constant variable.
	///
	/// Distinct [`SimpleIntegerVariable`] indices refer to disjoint storage
	/// (spec §3 invariant).
	pub struct SimpleIntegerVariable = u32;
}

/// A tagged handle to an integer variable (spec §3).
///
/// Every query against a [`View`] rewrites to its `base` before touching
/// storage; views own nothing.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerVariableID {
	/// Index into the domain store.
	Simple(SimpleIntegerVariable),
	/// A literal value; its domain is the singleton `{value}`.
	Constant(Integer),
	/// An affine rewriting `(negate_first ? -base : base) + then_add`.
	View(View),
}

/// The affine view payload of [`IntegerVariableID::View`]: `(negate_first ?
/// -base : base) + then_add`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct View {
	/// Whether `base` is negated before the offset is added.
	pub negate_first: bool,
	/// The variable being viewed. Views are never built on top of other views;
	/// constructors flatten nested views into a single `(sign, base, offset)`
	/// triple.
	pub base: SimpleIntegerVariable,
	/// The additive offset applied after the (optional) negation.
	pub then_add: Integer,
}

impl fmt::Debug for IntegerVariableID {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IntegerVariableID::Simple(s) => write!(f, "v{}", s.raw()),
			IntegerVariableID::Constant(c) => write!(f, "{c}"),
			IntegerVariableID::View(v) => {
				let sign = if v.negate_first { "-" } else { "" };
				write!(f, "({sign}v{}+{})", v.base.raw(), v.then_add)
			}
		}
	}
}

impl IntegerVariableID {
	/// Build the view `sign * base + offset`, flattening if `base` is itself a
	/// view or a constant.
	pub fn affine(self, negate: bool, offset: Integer) -> IntegerVariableID {
		match self {
			IntegerVariableID::Constant(c) => {
				let v = if negate { -c } else { c };
				IntegerVariableID::Constant(v + offset)
			}
			IntegerVariableID::Simple(base) => {
				if !negate && offset == Integer::new(0) {
					IntegerVariableID::Simple(base)
				} else {
					IntegerVariableID::View(View {
						negate_first: negate,
						base,
						then_add: offset,
					})
				}
			}
			IntegerVariableID::View(v) => {
				// Flatten: sign2*(sign1*base + add1) + add2
				// = (sign1 xor sign2)*base + (sign2 ? -add1 : add1) + add2
				let new_negate = v.negate_first ^ negate;
				let translated_add1 = if negate { -v.then_add } else { v.then_add };
				let new_add = translated_add1 + offset;
				if !new_negate && new_add == Integer::new(0) {
					IntegerVariableID::Simple(v.base)
				} else {
					IntegerVariableID::View(View {
						negate_first: new_negate,
						base: v.base,
						then_add: new_add,
					})
				}
			}
		}
	}

	/// Negate the variable: `-x`.
	pub fn negate(self) -> IntegerVariableID {
		self.affine(true, Integer::new(0))
	}

	/// Add a constant offset: `x + k`.
	pub fn plus(self, k: Integer) -> IntegerVariableID {
		self.affine(false, k)
	}

	/// Rewrite a condition on `self` into the equivalent condition on the
	/// underlying [`SimpleIntegerVariable`], per spec §3's view invariant:
	/// `V >= c <-> x >= (c-k)/s`, with direction flip if `s = -1`.
	///
	/// Returns `None` if `self` is a [`IntegerVariableID::Constant`] (there is
	/// no underlying simple variable to rewrite to); the caller should instead
	/// evaluate the condition directly against the constant.
	pub fn rewrite_condition(
		self,
		condition: IntegerVariableCondition,
	) -> Option<(SimpleIntegerVariable, IntegerVariableCondition)> {
		match self {
			IntegerVariableID::Constant(_) => None,
			IntegerVariableID::Simple(s) => Some((s, condition)),
			IntegerVariableID::View(v) => {
				let shifted = condition.translate(v.then_add);
				let rewritten = if v.negate_first {
					shifted.negate_argument()
				} else {
					shifted
				};
				Some((v.base, rewritten))
			}
		}
	}
}

impl From<SimpleIntegerVariable> for IntegerVariableID {
	fn from(value: SimpleIntegerVariable) -> Self {
		IntegerVariableID::Simple(value)
	}
}

impl From<Integer> for IntegerVariableID {
	fn from(value: Integer) -> Self {
		IntegerVariableID::Constant(value)
	}
}

impl From<i64> for IntegerVariableID {
	fn from(value: i64) -> Self {
		IntegerVariableID::Constant(Integer::new(value))
	}
}

impl std::ops::Neg for IntegerVariableID {
	type Output = IntegerVariableID;
	fn neg(self) -> Self::Output {
		self.negate()
	}
}

impl std::ops::Add<Integer> for IntegerVariableID {
	type Output = IntegerVariableID;
	fn add(self, rhs: Integer) -> Self::Output {
		self.plus(rhs)
	}
}

impl std::ops::Sub<Integer> for IntegerVariableID {
	type Output = IntegerVariableID;
	fn sub(self, rhs: Integer) -> Self::Output {
		self.plus(-rhs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn simple(n: u32) -> IntegerVariableID {
		IntegerVariableID::Simple(SimpleIntegerVariable::from_raw(n))
	}

	#[test]
	fn views_flatten_instead_of_nesting() {
		let x = simple(0);
		let v1 = x.plus(Integer::new(3));
		let v2 = v1.negate();
		// -(x+3) = -x - 3
		match v2 {
			IntegerVariableID::View(v) => {
				assert!(v.negate_first);
				assert_eq!(v.then_add, Integer::new(-3));
				assert_eq!(v.base, SimpleIntegerVariable::from_raw(0));
			}
			_ => panic!("expected a view"),
		}
	}

	#[test]
	fn double_negation_cancels_back_to_simple() {
		let x = simple(1);
		let back = x.negate().negate();
		assert_eq!(back, x);
	}

	#[test]
	fn constant_affine_folds_immediately() {
		let c = IntegerVariableID::Constant(Integer::new(5));
		assert_eq!(
			c.plus(Integer::new(2)),
			IntegerVariableID::Constant(Integer::new(7))
		);
	}
}
