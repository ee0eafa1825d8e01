//! The proof-logging pipeline (spec §1 item 2, components C5-C7).
//!
//! [`names`] maps solver atoms to proof-level 0/1 variables and encodes
//! integer variables into them (direct or bitwise). [`model`] writes the
//! up-front pseudo-Boolean model. [`logger`] streams the in-order RUP /
//! cutting-planes derivation and the deletion-level stack.

pub mod logger;
pub mod model;
pub mod names;

/// A 0/1 proof atom (spec GLOSSARY), identified by its 1-based index in the
/// emitted model/proof files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PbAtom(pub u32);

/// A literal over a [`PbAtom`]: the atom itself, or its negation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PbLit {
	pub atom: PbAtom,
	pub negated: bool,
}

impl PbLit {
	pub fn pos(atom: PbAtom) -> Self {
		PbLit {
			atom,
			negated: false,
		}
	}

	pub fn neg(atom: PbAtom) -> Self {
		PbLit {
			atom,
			negated: true,
		}
	}
}

impl std::ops::Not for PbLit {
	type Output = PbLit;
	fn not(self) -> Self::Output {
		PbLit {
			atom: self.atom,
			negated: !self.negated,
		}
	}
}

/// One term `coefficient * literal` in a weighted-sum pseudo-Boolean
/// constraint (spec §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PbTerm {
	pub coefficient: i64,
	pub literal: PbLit,
}

/// A linear combination of [`PbTerm`]s, the payload of every pseudo-Boolean
/// constraint and of a condition that has been normalised for the proof (a
/// single-atom literal, most of the time; an explicit linear combination for
/// bits-encoded comparisons, see [`names::ProofNameTracker`]).
pub type PbExpr = Vec<PbTerm>;

/// Comparator used on the right-hand side of a pseudo-Boolean constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
	GreaterEqual,
	Equal,
}
