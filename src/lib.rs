//! # pbcp - a finite-domain constraint solver with certified proofs
//!
//! `pbcp` is a finite-domain constraint-programming solver that, alongside
//! a solution, emits a pseudo-Boolean cutting-planes proof an independent
//! checker can verify. Variables are integers over bounded domains
//! ([`domain`], [`variable`]); global constraints are propagators scheduled
//! to a fixpoint ([`propagators`]) through a single choke point that keeps
//! the proof in lock-step with every domain mutation ([`inference`]). The
//! proof itself is a pseudo-Boolean model file plus an append-only
//! derivation stream ([`proof`]). [`problem`] is the public builder surface;
//! [`solver`] runs depth-first search with branch-and-bound on top of it.

pub mod domain;
pub mod error;
pub mod inference;
pub mod integer;
pub mod literal;
pub mod problem;
pub mod proof;
pub mod propagators;
pub mod solver;
pub mod state;
pub mod stats;
pub mod variable;

#[cfg(test)]
mod scenario_tests;
