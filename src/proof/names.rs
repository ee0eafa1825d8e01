//! Proof-name tracker & encoder (spec §4.3, component C5).
//!
//! Maps every [`SimpleIntegerVariable`] and every [`ProofFlag`] to a string
//! name and a set of 0/1 proof atoms. Two encodings are available per integer
//! variable, chosen at variable creation:
//!
//! - **Direct**: one atom per `x = v` across the initial domain, plus the
//!   equality-to-sum constraint `sum [x=v] = 1`.
//! - **Bits**: `x = lb + sum_i 2^i b_i - 2^{k+1} s`, `s` present only if
//!   `lb < 0`.
//!
//! A condition on a variable normalises to a [`PbExpr`] by
//! [`ProofNameTracker::literal_for_condition`]: `x = v`/`x != v` on a direct
//! variable is the single corresponding eq atom (negated for `!=`); `x >= v`
//! and `x < v` on a direct variable are the linear sum of the eq atoms
//! supporting/excluding `v` rather than a dedicated atom, so that no new atom
//! is ever created once the variable is registered (the whole model is
//! written up front, per spec §6, and nothing during search may grow it). A
//! bits-encoded variable's conditions are always the weighted sum of its bit
//! atoms, offset against the threshold by the caller.

use std::collections::BTreeMap;

use index_vec::IndexVec;

use crate::{
	domain::Domain,
	integer::Integer,
	literal::{IntegerVariableCondition, ProofFlag},
	proof::{Comparator, PbAtom, PbExpr, PbLit, PbTerm},
	variable::SimpleIntegerVariable,
};

/// Which encoding a [`SimpleIntegerVariable`] uses in the proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingKind {
	Direct,
	Bits,
}

/// A pseudo-Boolean constraint to be handed to
/// [`crate::proof::model::ModelWriter`] as part of a variable's encoding.
#[derive(Clone, Debug)]
pub struct EncodingConstraint {
	pub terms: PbExpr,
	pub comparator: Comparator,
	pub rhs: i64,
}

#[derive(Clone, Debug)]
struct DirectEncoding {
	/// `x = v` atom for every `v` in the variable's initial domain, kept
	/// sorted by value so `>=`/`<` conditions can be rendered as a
	/// contiguous sum without rescanning.
	eq_atoms: BTreeMap<Integer, PbAtom>,
}

#[derive(Clone, Debug)]
struct BitsEncoding {
	lower_bound: Integer,
	/// Exponent of the highest-order bit (`2^k` is the highest bit
	/// coefficient).
	k: u32,
	/// Atoms for bits `0..=k`, in increasing order of significance.
	bit_atoms: Vec<PbAtom>,
	/// Present only if `lower_bound < 0`; coefficient is `-2^{k+1}`.
	sign_atom: Option<PbAtom>,
}

#[derive(Clone, Debug)]
enum VarEncoding {
	Direct(DirectEncoding),
	Bits(BitsEncoding),
}

/// Maps solver atoms to proof-level names and 0/1 encodings (component C5).
#[derive(Clone, Debug)]
pub struct ProofNameTracker {
	next_atom: u32,
	names: Vec<String>,
	var_names: IndexVec<SimpleIntegerVariable, String>,
	var_encodings: IndexVec<SimpleIntegerVariable, VarEncoding>,
	flag_atoms: Vec<PbAtom>,
	friendly_names: bool,
}

impl ProofNameTracker {
	pub fn new(friendly_names: bool) -> Self {
		ProofNameTracker {
			next_atom: 1,
			names: vec![String::new()], // index 0 unused; atoms are 1-based
			var_names: IndexVec::new(),
			var_encodings: IndexVec::new(),
			flag_atoms: Vec::new(),
			friendly_names,
		}
	}

	/// Total number of 0/1 proof variables created so far (for the model
	/// header's `#variable = N`).
	pub fn atom_count(&self) -> u32 {
		self.next_atom - 1
	}

	fn fresh_atom(&mut self, name: String) -> PbAtom {
		let atom = PbAtom(self.next_atom);
		self.next_atom += 1;
		self.names.push(name);
		atom
	}

	/// The display name of an atom, honouring `friendly_names`.
	pub fn atom_name(&self, atom: PbAtom) -> &str {
		&self.names[atom.0 as usize]
	}

	/// Compute the smallest `k` such that `2^(k+1) > max(|lb|, ub+1, 2)`, per
	/// the bits-encoding formula in spec §4.3.
	pub fn bits_exponent(lb: Integer, ub: Integer) -> u32 {
		let bound = lb.abs().raw().max(ub.raw() + 1).max(2);
		let mut k: u32 = 0;
		while 1i64 << (k + 1) <= bound {
			k += 1;
		}
		k
	}

	/// Register a newly created variable, choosing and materialising its
	/// encoding, and return the encoding constraints the model writer must
	/// emit (the at-least-one/at-most-one pair for direct variables, or the
	/// defining sum equation for bits variables). All atoms a variable will
	/// ever need are created here; no later call creates new atoms.
	pub fn register_variable(
		&mut self,
		simple: SimpleIntegerVariable,
		name: Option<String>,
		initial_domain: &Domain,
		kind: EncodingKind,
	) -> Vec<EncodingConstraint> {
		let base_name = name.unwrap_or_else(|| format!("x{}", simple.raw()));
		while self.var_names.len_idx() <= simple {
			self.var_names.push(String::new());
		}
		self.var_names[simple] = base_name.clone();

		match kind {
			EncodingKind::Direct => {
				let mut eq_atoms = BTreeMap::new();
				let mut values = Vec::new();
				initial_domain.for_each_value(|v| values.push(v));
				for v in &values {
					let label = self.label(&base_name, IntegerVariableCondition::Equal(*v));
					let atom = self.fresh_atom(label);
					eq_atoms.insert(*v, atom);
				}
				while self.var_encodings.len_idx() <= simple {
					self.var_encodings
						.push(VarEncoding::Direct(DirectEncoding {
							eq_atoms: BTreeMap::new(),
						}));
				}
				self.var_encodings[simple] = VarEncoding::Direct(DirectEncoding {
					eq_atoms: eq_atoms.clone(),
				});

				// `sum_v [x=v] = 1` — simultaneously the at-least-one and
				// at-most-one constraint (spec §4.4).
				let terms = values
					.iter()
					.map(|v| PbTerm {
						coefficient: 1,
						literal: PbLit::pos(eq_atoms[v]),
					})
					.collect();
				vec![EncodingConstraint {
					terms,
					comparator: Comparator::Equal,
					rhs: 1,
				}]
			}
			EncodingKind::Bits => {
				let lb = initial_domain.lower_bound();
				let ub = initial_domain.upper_bound();
				let k = Self::bits_exponent(lb, ub);
				let mut bit_atoms = Vec::with_capacity(k as usize + 1);
				for i in 0..=k {
					let label = format!(
						"{}{}_bit{i}",
						if self.friendly_names { &base_name } else { "" },
						if self.friendly_names { "_" } else { "b" }
					);
					bit_atoms.push(self.fresh_atom(label));
				}
				let sign_atom = if lb < Integer::new(0) {
					Some(self.fresh_atom(format!(
						"{}{}sign",
						if self.friendly_names { &base_name } else { "" },
						if self.friendly_names { "_" } else { "_s" }
					)))
				} else {
					None
				};
				while self.var_encodings.len_idx() <= simple {
					self.var_encodings.push(VarEncoding::Bits(BitsEncoding {
						lower_bound: lb,
						k,
						bit_atoms: Vec::new(),
						sign_atom: None,
					}));
				}
				self.var_encodings[simple] = VarEncoding::Bits(BitsEncoding {
					lower_bound: lb,
					k,
					bit_atoms: bit_atoms.clone(),
					sign_atom,
				});

				// `x - lb - sum 2^i b_i + 2^{k+1} s = 0`
				let mut terms: Vec<PbTerm> = bit_atoms
					.iter()
					.enumerate()
					.map(|(i, &atom)| PbTerm {
						coefficient: 1i64 << i,
						literal: PbLit::pos(atom),
					})
					.collect();
				if let Some(s) = sign_atom {
					terms.push(PbTerm {
						coefficient: -(1i64 << (k + 1)),
						literal: PbLit::pos(s),
					});
				}
				vec![EncodingConstraint {
					terms,
					comparator: Comparator::Equal,
					rhs: -lb.raw(),
				}]
			}
		}
	}

	/// Create a fresh proof-only flag, backed by its own atom.
	pub fn fresh_flag(&mut self, name: Option<String>) -> ProofFlag {
		let index = self.flag_atoms.len() as u32;
		let atom = self.fresh_atom(name.unwrap_or_else(|| format!("flag{index}")));
		self.flag_atoms.push(atom);
		ProofFlag { index }
	}

	/// The [`PbAtom`] backing a [`ProofFlag`] created by [`Self::fresh_flag`].
	pub fn flag_atom(&self, flag: ProofFlag) -> PbAtom {
		self.flag_atoms[flag.index as usize]
	}

	fn label(&self, base_name: &str, condition: IntegerVariableCondition) -> String {
		if !self.friendly_names {
			return format!("x{}", self.next_atom);
		}
		match condition {
			IntegerVariableCondition::Equal(v) => format!("{base_name}_eq_{v}"),
			IntegerVariableCondition::NotEqual(v) => format!("{base_name}_ne_{v}"),
			IntegerVariableCondition::GreaterEqual(v) => format!("{base_name}_ge_{v}"),
			IntegerVariableCondition::Less(v) => format!("{base_name}_lt_{v}"),
		}
	}

	/// Normalise `condition` on `simple` to a linear expression over proof
	/// atoms already created at registration time. Never creates a new atom
	/// or constraint: a direct-encoded `>=`/`<` condition is the sum of the
	/// eq atoms it spans rather than a dedicated order atom, so that the
	/// model file (written once, before search, per spec §6) never needs to
	/// grow.
	pub fn literal_for_condition(
		&self,
		simple: SimpleIntegerVariable,
		condition: IntegerVariableCondition,
	) -> PbExpr {
		match &self.var_encodings[simple] {
			VarEncoding::Direct(enc) => Self::direct_literal(enc, condition),
			VarEncoding::Bits(enc) => Self::bits_literal(enc, condition),
		}
	}

	fn direct_literal(enc: &DirectEncoding, condition: IntegerVariableCondition) -> PbExpr {
		match condition {
			IntegerVariableCondition::Equal(v) => vec![PbTerm {
				coefficient: 1,
				literal: PbLit::pos(enc.eq_atoms[&v]),
			}],
			IntegerVariableCondition::NotEqual(v) => vec![PbTerm {
				coefficient: 1,
				literal: PbLit::neg(enc.eq_atoms[&v]),
			}],
			IntegerVariableCondition::GreaterEqual(v) => enc
				.eq_atoms
				.range(v..)
				.map(|(_, &atom)| PbTerm {
					coefficient: 1,
					literal: PbLit::pos(atom),
				})
				.collect(),
			IntegerVariableCondition::Less(v) => enc
				.eq_atoms
				.range(..v)
				.map(|(_, &atom)| PbTerm {
					coefficient: 1,
					literal: PbLit::pos(atom),
				})
				.collect(),
		}
	}

	/// The linear contribution of `coefficient * simple` to a weighted-sum
	/// model constraint: the 0/1-atom terms, plus a constant folded into the
	/// constraint's right-hand side (zero for a direct-encoded variable,
	/// `coefficient * lower_bound` for a bits-encoded one, since its value is
	/// `lb + sum 2^i b_i - 2^{k+1} s`).
	pub fn linear_contribution(&self, simple: SimpleIntegerVariable, coefficient: i64) -> (PbExpr, i64) {
		match &self.var_encodings[simple] {
			VarEncoding::Direct(enc) => {
				let expr = enc
					.eq_atoms
					.iter()
					.map(|(v, &atom)| PbTerm {
						coefficient: coefficient * v.raw(),
						literal: PbLit::pos(atom),
					})
					.collect();
				(expr, 0)
			}
			VarEncoding::Bits(enc) => {
				let mut expr: Vec<PbTerm> = enc
					.bit_atoms
					.iter()
					.enumerate()
					.map(|(i, &atom)| PbTerm {
						coefficient: coefficient * (1i64 << i),
						literal: PbLit::pos(atom),
					})
					.collect();
				if let Some(s) = enc.sign_atom {
					expr.push(PbTerm {
						coefficient: coefficient * -(1i64 << (enc.k + 1)),
						literal: PbLit::pos(s),
					});
				}
				(expr, coefficient * enc.lower_bound.raw())
			}
		}
	}

	fn bits_literal(enc: &BitsEncoding, _condition: IntegerVariableCondition) -> PbExpr {
		// The value of the variable equals `lb + sum 2^i b_i - 2^{k+1} s`.
		// Every condition on a bits variable normalises to the same sum of
		// atoms (without the constant `lb` term); the caller folds `lb` and
		// the threshold into the right-hand side it derives/asserts against.
		let mut terms: Vec<PbTerm> = enc
			.bit_atoms
			.iter()
			.enumerate()
			.map(|(i, &atom)| PbTerm {
				coefficient: 1i64 << i,
				literal: PbLit::pos(atom),
			})
			.collect();
		if let Some(s) = enc.sign_atom {
			terms.push(PbTerm {
				coefficient: -(1i64 << (enc.k + 1)),
				literal: PbLit::pos(s),
			});
		}
		terms
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::variable::SimpleIntegerVariable as Simple;

	#[test]
	fn bits_exponent_matches_spec_formula() {
		// [0,9]: max(|lb|, ub+1, 2) = 10, smallest k with 2^(k+1) > 10 is k=3 (2^4=16)
		assert_eq!(
			ProofNameTracker::bits_exponent(Integer::new(0), Integer::new(9)),
			3
		);
		// [-5,5]: max(5, 6, 2) = 6, smallest k with 2^(k+1) > 6 is k=2 (2^3=8)
		assert_eq!(
			ProofNameTracker::bits_exponent(Integer::new(-5), Integer::new(5)),
			2
		);
	}

	#[test]
	fn direct_encoding_creates_one_atom_per_value() {
		let mut tracker = ProofNameTracker::new(true);
		let simple = Simple::from_raw(0);
		let domain = Domain::from_range(Integer::new(0), Integer::new(3));
		let constraints =
			tracker.register_variable(simple, Some("x".into()), &domain, EncodingKind::Direct);
		assert_eq!(constraints.len(), 1);
		assert_eq!(constraints[0].terms.len(), 4);
		assert_eq!(tracker.atom_count(), 4);
	}

	#[test]
	fn greater_equal_sums_eq_atoms_without_creating_new_ones() {
		let mut tracker = ProofNameTracker::new(false);
		let simple = Simple::from_raw(0);
		let domain = Domain::from_range(Integer::new(0), Integer::new(3));
		let _ = tracker.register_variable(simple, None, &domain, EncodingKind::Direct);
		let before = tracker.atom_count();

		let ge =
			tracker.literal_for_condition(simple, IntegerVariableCondition::GreaterEqual(Integer::new(2)));
		assert_eq!(ge.len(), 2); // values 2 and 3
		assert_eq!(tracker.atom_count(), before);

		let lt = tracker.literal_for_condition(simple, IntegerVariableCondition::Less(Integer::new(2)));
		assert_eq!(lt.len(), 2); // values 0 and 1
		assert_eq!(tracker.atom_count(), before);
	}
}
