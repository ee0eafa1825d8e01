//! The inference tracker (spec §4.5, component C8): the single choke point
//! propagators go through to mutate the domain store and, simultaneously,
//! keep the proof in lock-step.
//!
//! [`InferenceTracker::infer`] does three things, in this order, for every
//! domain change a propagator wants to make:
//!
//! 1. If a proof is being produced, materialises the [`ReasonOutline`] into
//!    concrete [`Literal`]s against the *current* state (i.e. before the
//!    mutation below), normalises them through [`crate::proof::names`], and
//!    emits exactly one proof line per [`Justification`].
//! 2. Applies the literal as a domain mutation via [`State`].
//! 3. Returns the resulting [`HowChanged`] to the caller (the propagator
//!    scheduler, component C9) unchanged.
//!
//! Step 1 happens strictly before step 2 so the proof never references a
//! domain state that has already moved past what justified it.

use crate::{
	domain::{Contradiction, HowChanged},
	error::ProofError,
	integer::Integer,
	literal::{IntegerVariableCondition, Literal, ProofFlag},
	proof::{logger::ProofLogger, names::ProofNameTracker, Comparator, PbExpr, PbLit, PbTerm},
	state::State,
	variable::IntegerVariableID,
};

/// Why a propagator believes a literal holds right now, expressed without
/// committing to concrete values until it is actually needed (proof
/// materialisation is skipped entirely when no proof is being produced).
#[derive(Clone, Copy, Debug)]
pub enum ReasonKind {
	LowerBound,
	UpperBound,
	Value,
	NotValue(Integer),
}

/// A reason for an inference, in one of three shapes a propagator can supply
/// (spec §4.5): already-concrete literals, "both current bounds of these
/// variables", or a per-variable list of which facet of the variable's
/// domain is the reason.
#[derive(Clone, Debug)]
pub enum ReasonOutline {
	/// The reason literals, already known.
	Literals(Vec<Literal>),
	/// Both the current lower and upper bound of each listed variable.
	BothBounds(Vec<IntegerVariableID>),
	/// One aspect of each listed variable's current domain.
	Detailed(Vec<(IntegerVariableID, ReasonKind)>),
}

impl ReasonOutline {
	pub fn none() -> Self {
		ReasonOutline::Literals(Vec::new())
	}
}

/// How an inference is to be justified in the proof (spec §4.5, §9).
pub enum Justification {
	/// Emit a single `rup` line; the checker re-derives it by unit
	/// propagation from the reason hints (or, failing that, the whole
	/// proof state).
	Rup,
	/// The propagator supplies its own derivation (e.g. a cutting-planes
	/// combination of several model/proof lines); it emits whatever it
	/// needs directly and this call only has to run it.
	ExplicitlyBy(Box<dyn FnOnce(&mut ProofLogger, &ProofNameTracker) -> Result<(), ProofError>>),
	/// Asserted without a reason hint (full unit propagation still applies
	/// at check time).
	Assertion,
	/// A search decision: no proof obligation, since opening a proof level
	/// already records the branch.
	Guess,
	/// The inference needs no proof line at all (e.g. re-deriving a fact the
	/// proof already entails).
	NoJustificationNeeded,
}

/// Holds the (optional) proof sink and routes every domain inference through
/// it in the order the proof format requires (component C8).
pub struct InferenceTracker {
	proof: Option<(ProofLogger, ProofNameTracker)>,
}

impl InferenceTracker {
	pub fn new(proof: Option<(ProofLogger, ProofNameTracker)>) -> Self {
		InferenceTracker { proof }
	}

	/// Whether a proof is being produced at all.
	pub fn is_proof_logging(&self) -> bool {
		self.proof.is_some()
	}

	pub fn proof_mut(&mut self) -> Option<&mut (ProofLogger, ProofNameTracker)> {
		self.proof.as_mut()
	}

	pub fn into_proof(self) -> Option<(ProofLogger, ProofNameTracker)> {
		self.proof
	}

	/// Assert `literal` and apply it as a domain mutation.
	pub fn infer(
		&mut self,
		state: &mut State,
		literal: Literal,
		justification: Justification,
		reason: ReasonOutline,
	) -> Result<HowChanged, Contradiction> {
		self.justify(state, literal, justification, &reason);
		apply_literal(state, literal)
	}

	/// Assert `literal` without any accompanying domain mutation (used for
	/// proof-only facts, e.g. a Hall-set indicator flag a propagator wants
	/// recorded but which has no domain of its own).
	pub fn infer_true(
		&mut self,
		state: &State,
		literal: Literal,
		justification: Justification,
		reason: ReasonOutline,
	) {
		self.justify(state, literal, justification, &reason);
	}

	/// Certify a contradiction: the reason literals, taken together, falsify
	/// the model. Returns the sentinel [`Contradiction`] for the caller to
	/// propagate.
	pub fn contradiction(
		&mut self,
		state: &State,
		justification: Justification,
		reason: ReasonOutline,
	) -> Contradiction {
		if let Some((logger, names)) = &mut self.proof {
			let materialised = materialise(state, &reason);
			let hints = hint_literals(names, state, &materialised);
			match justification {
				Justification::Rup | Justification::Assertion => {
					logger
						.rup(&[], Comparator::GreaterEqual, 1, Some(&hints))
						.expect("proof logger still open during search");
				}
				Justification::ExplicitlyBy(callback) => {
					callback(logger, names).expect("explicit justification failed to write the proof");
				}
				Justification::Guess | Justification::NoJustificationNeeded => {}
			}
		}
		Contradiction
	}

	fn justify(
		&mut self,
		state: &State,
		literal: Literal,
		justification: Justification,
		reason: &ReasonOutline,
	) {
		let Some((logger, names)) = &mut self.proof else {
			return;
		};
		match justification {
			Justification::Guess | Justification::NoJustificationNeeded => {}
			Justification::ExplicitlyBy(callback) => {
				callback(logger, names).expect("explicit justification failed to write the proof");
			}
			Justification::Rup | Justification::Assertion => {
				let Some((expr, rhs)) = pb_expr_for_literal(names, literal) else {
					return; // trivially true (e.g. Literal::Constant(true)); no line needed
				};
				let hints = match justification {
					Justification::Rup => {
						let materialised = materialise(state, reason);
						Some(hint_literals(names, state, &materialised))
					}
					_ => None,
				};
				logger
					.rup(&expr, Comparator::GreaterEqual, rhs, hints.as_deref())
					.expect("proof logger still open during search");
			}
		}
	}
}

/// Expand a [`ReasonOutline`] against the *current* state into concrete
/// literals, reading whichever bound/value the outline asks for.
fn materialise(state: &State, reason: &ReasonOutline) -> Vec<Literal> {
	match reason {
		ReasonOutline::Literals(lits) => lits.clone(),
		ReasonOutline::BothBounds(vars) => vars
			.iter()
			.flat_map(|&v| {
				let lb = state.lower_bound(v);
				let ub = state.upper_bound(v);
				[
					Literal::new(v, IntegerVariableCondition::GreaterEqual(lb)),
					Literal::new(v, IntegerVariableCondition::Less(ub + Integer::new(1))),
				]
			})
			.collect(),
		ReasonOutline::Detailed(items) => items
			.iter()
			.map(|&(v, kind)| match kind {
				ReasonKind::LowerBound => {
					Literal::new(v, IntegerVariableCondition::GreaterEqual(state.lower_bound(v)))
				}
				ReasonKind::UpperBound => {
					Literal::new(v, IntegerVariableCondition::Less(state.upper_bound(v) + Integer::new(1)))
				}
				ReasonKind::Value => Literal::new(
					v,
					IntegerVariableCondition::Equal(
						state
							.value(v)
							.expect("ReasonKind::Value requires a currently-instantiated variable"),
					),
				),
				ReasonKind::NotValue(val) => Literal::new(v, IntegerVariableCondition::NotEqual(val)),
			})
			.collect(),
	}
}

/// Normalise a literal to the pseudo-Boolean expression asserting it, and the
/// right-hand side (always `>= 1`; `None` when the literal is
/// [`Literal::Constant(true)`] and therefore needs no proof obligation at
/// all, and the degenerate always-false case is left to the caller, which
/// never passes `Literal::Constant(false)` to [`InferenceTracker::infer`]).
fn pb_expr_for_literal(names: &ProofNameTracker, literal: Literal) -> Option<(PbExpr, i64)> {
	match literal {
		Literal::Constant(true) => None,
		Literal::Constant(false) => {
			unreachable!("Literal::Constant(false) must go through InferenceTracker::contradiction")
		}
		Literal::ProofFlag(flag) => Some((single_flag_term(names, flag, false), 1)),
		Literal::NegatedProofFlag(flag) => Some((single_flag_term(names, flag, true), 1)),
		Literal::IntegerVariableCondition(var, condition) => {
			var.rewrite_condition(condition).map(|(simple, rewritten)| {
				(names.literal_for_condition(simple, rewritten), 1)
			})
		}
	}
}

fn single_flag_term(names: &ProofNameTracker, flag: ProofFlag, negated: bool) -> PbExpr {
	let atom = names.flag_atom(flag);
	vec![PbTerm {
		coefficient: 1,
		literal: if negated { PbLit::neg(atom) } else { PbLit::pos(atom) },
	}]
}

/// Reduce materialised reason literals to single-atom hints for the proof's
/// `reason` clause. Multi-term expressions (a `>=`/`<` condition on a
/// direct-encoded variable normalises to a sum of several eq atoms, see
/// [`crate::proof::names`]) cannot be written as one hint literal and are
/// skipped: hints are an optimisation, never a soundness requirement, since
/// the checker falls back to full unit propagation when a hint is absent or
/// incomplete.
fn hint_literals(names: &ProofNameTracker, state: &State, literals: &[Literal]) -> Vec<PbLit> {
	let _ = state;
	literals
		.iter()
		.filter_map(|&lit| match pb_expr_for_literal(names, lit) {
			Some((expr, _)) if expr.len() == 1 => Some(expr[0].literal),
			_ => None,
		})
		.collect()
}

/// Apply `literal` as a domain mutation. Proof-only literals (flags,
/// constants) have no domain to mutate; they report [`HowChanged::NoChange`].
fn apply_literal(state: &mut State, literal: Literal) -> Result<HowChanged, Contradiction> {
	match literal {
		Literal::ProofFlag(_) | Literal::NegatedProofFlag(_) => Ok(HowChanged::NoChange),
		Literal::Constant(true) => Ok(HowChanged::NoChange),
		Literal::Constant(false) => Err(Contradiction),
		Literal::IntegerVariableCondition(var, condition) => match condition {
			IntegerVariableCondition::Equal(v) => state.infer_equal(var, v),
			IntegerVariableCondition::NotEqual(v) => state.infer_not_equal(var, v),
			IntegerVariableCondition::GreaterEqual(v) => state.infer_ge(var, v),
			IntegerVariableCondition::Less(v) => state.infer_lt(var, v),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::domain::Domain;

	fn fresh_state_with_var(lb: i64, ub: i64) -> (State, IntegerVariableID) {
		let mut state = State::default();
		let simple = state.new_variable(Domain::from_range(Integer::new(lb), Integer::new(ub)));
		(state, IntegerVariableID::Simple(simple))
	}

	#[test]
	fn infer_without_proof_only_mutates_the_domain() {
		let (mut state, x) = fresh_state_with_var(0, 9);
		let mut tracker = InferenceTracker::new(None);
		let changed = tracker
			.infer(
				&mut state,
				Literal::new(x, IntegerVariableCondition::GreaterEqual(Integer::new(5))),
				Justification::Rup,
				ReasonOutline::none(),
			)
			.unwrap();
		assert_eq!(changed, HowChanged::BoundsChanged);
		assert_eq!(state.lower_bound(x), Integer::new(5));
	}

	#[test]
	fn infer_with_proof_emits_exactly_one_rup_line() {
		let (mut state, x) = fresh_state_with_var(0, 9);
		let mut names = ProofNameTracker::new(false);
		let simple = match x {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let _ = names.register_variable(
			simple,
			None,
			&Domain::from_range(Integer::new(0), Integer::new(9)),
			crate::proof::names::EncodingKind::Direct,
		);
		let logger = ProofLogger::new(0);
		let mut tracker = InferenceTracker::new(Some((logger, names)));

		tracker
			.infer(
				&mut state,
				Literal::new(x, IntegerVariableCondition::GreaterEqual(Integer::new(5))),
				Justification::Rup,
				ReasonOutline::none(),
			)
			.unwrap();

		let (logger, _) = tracker.into_proof().unwrap();
		assert_eq!(logger.text().matches("rup").count(), 1);
	}

	#[test]
	fn contradiction_emits_the_empty_sum_and_returns_the_sentinel() {
		let (state, x) = fresh_state_with_var(0, 9);
		let simple = match x {
			IntegerVariableID::Simple(s) => s,
			_ => unreachable!(),
		};
		let mut names = ProofNameTracker::new(false);
		let _ = names.register_variable(
			simple,
			None,
			&Domain::from_range(Integer::new(0), Integer::new(9)),
			crate::proof::names::EncodingKind::Direct,
		);
		let logger = ProofLogger::new(0);
		let mut tracker = InferenceTracker::new(Some((logger, names)));

		let _: Contradiction = tracker.contradiction(
			&state,
			Justification::Rup,
			ReasonOutline::BothBounds(vec![x]),
		);

		let (logger, _) = tracker.into_proof().unwrap();
		assert!(logger.text().contains("rup  >= 1"));
	}
}
