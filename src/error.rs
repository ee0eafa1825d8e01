//! Error types (spec §7, ambient stack per `SPEC_FULL.md` §B).

use thiserror::Error;

/// Errors raised while building a model, before search begins (spec §7:
/// "fail-fast before search; no proof is written").
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
	#[error("a variable named {0:?} already exists")]
	DuplicateVariableName(String),
	#[error("cannot create a variable with an empty domain")]
	EmptyDomain,
	#[error("linear constraint coefficient overflowed while normalising terms")]
	CoefficientOverflow,
	#[error("table/smart-table tuple width {found} does not match {expected} variables")]
	MismatchedTupleWidth { expected: usize, found: usize },
	#[error("the model is trivially unsatisfiable")]
	TrivialUnsatisfiable,
}

/// Errors raised by the proof-emission layer (spec §7: "fatal; the solver
/// aborts, leaving the partial proof flushed").
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofError {
	#[error("proof referenced constraint line {0} which does not exist")]
	BadLineReference(u32),
	#[error("attempted to write to the proof after it was concluded")]
	WriteAfterConclusion,
}

/// Errors raised by [`crate::solver::Solver::solve`] itself, kept separate
/// from [`ProofError`] so that enum's variants stay exactly the ones the
/// proof-emission layer can raise: writing the rendered model/proof text to
/// `ProofOptions::opb_path`/`proof_path` is ambient file I/O this crate adds
/// around the core (spec §6 names the paths but not a failure mode for them;
/// see `DESIGN.md`).
#[derive(Debug, Error)]
pub enum SolverError {
	#[error("failed to write a proof artifact: {0}")]
	Io(#[from] std::io::Error),
}
