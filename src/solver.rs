//! Depth-first search with branch-and-bound (spec §4.9, component C12).
//!
//! Mirrors the propagator scheduler's checkpoint discipline: every guess
//! brackets a [`State`]/[`PropagatorRegistry`] checkpoint pair (and, when a
//! proof is being written, a [`ProofLevel::Current`] level) around its
//! recursive call. A contradiction pops all three and the sibling guess is
//! tried. Branch-and-bound tightens [`State::tighten_objective`] and asserts
//! the strict improvement directly against the live state from inside that
//! same bracket, so the assertion (and its proof line) are undone by the
//! ordinary backtrack machinery once search passes the node that found it —
//! no separate bookkeeping is needed (spec §4.9, §9 "Proof deletion levels").

use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Instant,
};

use crate::{
	domain::Contradiction,
	error::SolverError,
	inference::{InferenceTracker, Justification, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	problem::Problem,
	proof::{
		logger::{ProofLevel, ProofLogger},
		names::ProofNameTracker,
		PbLit,
	},
	propagators::PropagatorRegistry,
	state::{Sense, State},
	stats::Stats,
	variable::{IntegerVariableID, SimpleIntegerVariable},
};

/// Resolve a possibly-viewed variable to the trail-backed variable its
/// domain size/degree should be read from; a bare constant has neither.
fn base_simple(var: IntegerVariableID) -> Option<SimpleIntegerVariable> {
	match var {
		IntegerVariableID::Simple(s) => Some(s),
		IntegerVariableID::View(v) => Some(v.base),
		IntegerVariableID::Constant(_) => None,
	}
}

/// A found solution: every branch variable's value (plus the objective
/// variable's, if it is not already among them), in branching order.
#[derive(Clone, Debug)]
pub struct Solution {
	values: Vec<(IntegerVariableID, Integer)>,
}

impl Solution {
	pub fn value(&self, var: IntegerVariableID) -> Option<Integer> {
		self.values.iter().find(|&&(v, _)| v == var).map(|&(_, val)| val)
	}

	pub fn iter(&self) -> impl Iterator<Item = (IntegerVariableID, Integer)> + '_ {
		self.values.iter().copied()
	}
}

/// What search decided once it ran out of work or was told to stop (spec
/// §4.9, §6).
#[derive(Debug)]
pub enum SolveOutcome {
	/// No assignment satisfies every posted constraint.
	Unsatisfiable(Stats),
	/// A decision search (no objective) accepted a solution and stopped.
	Satisfied { solution: Solution, stats: Stats },
	/// Branch-and-bound exhausted the search space; `solution` is proven
	/// optimal.
	Optimal {
		solution: Solution,
		objective: Integer,
		stats: Stats,
	},
	/// The shared abort flag tripped before search could conclude either way.
	Interrupted(Stats),
}

impl SolveOutcome {
	pub fn stats(&self) -> &Stats {
		match self {
			SolveOutcome::Unsatisfiable(s)
			| SolveOutcome::Satisfied { stats: s, .. }
			| SolveOutcome::Optimal { stats: s, .. }
			| SolveOutcome::Interrupted(s) => s,
		}
	}
}

/// Optional user hooks into the search driver (spec §6).
///
/// `branch` and `guess` default to smallest-domain/highest-degree selection
/// and `var=lb`/`var≠lb` guesses respectively when left `None`; `solution`
/// defaults to stopping at the first solution for a plain decision problem
/// and continuing (to keep improving the objective) for an optimisation one.
#[derive(Default)]
pub struct SolveCallbacks {
	/// Called with each accepted solution; return `false` to stop search.
	pub solution: Option<Box<dyn FnMut(&Solution) -> bool>>,
	/// Called with a short trace message at points of interest (branch
	/// decisions, restarts, conclusions).
	pub trace: Option<Box<dyn FnMut(&str)>>,
	/// Called with the current state and the remaining unfixed branch
	/// variables; must return one of them.
	pub branch: Option<Box<dyn FnMut(&State, &[IntegerVariableID]) -> IntegerVariableID>>,
	/// Called with the current state and the chosen branch variable; must
	/// return the ordered list of conditions to try.
	pub guess: Option<Box<dyn FnMut(&State, IntegerVariableID) -> Vec<IntegerVariableCondition>>>,
}

impl std::fmt::Debug for SolveCallbacks {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SolveCallbacks").finish_non_exhaustive()
	}
}

/// A clonable flag to request an in-progress solve stop early (spec §5:
/// "Cancellation: cooperative ... polled flag").
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
	pub fn abort(&self) {
		self.0.store(true, Ordering::Relaxed);
	}

	pub fn is_aborted(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}
}

/// Runs a [`Problem`] to completion (component C12). Consumes the problem:
/// search mutates its state and registry in place and there is nothing
/// useful to reuse afterwards (spec §5: "borrowed uniquely by whoever
/// currently holds the mutable path").
#[derive(Debug)]
pub struct Solver {
	problem: Option<Problem>,
	abort: Arc<AtomicBool>,
}

impl Solver {
	pub fn new(problem: Problem) -> Self {
		Solver {
			problem: Some(problem),
			abort: Arc::new(AtomicBool::new(false)),
		}
	}

	/// A handle a helper thread can use to request cancellation (spec §5:
	/// "Timeout: implemented as a helper thread that flips the cancellation
	/// flag").
	pub fn abort_handle(&self) -> AbortHandle {
		AbortHandle(Arc::clone(&self.abort))
	}

	/// Run depth-first search with branch-and-bound to completion (or until
	/// cancelled). May only be called once.
	pub fn solve(&mut self, callbacks: SolveCallbacks) -> Result<SolveOutcome, SolverError> {
		let problem = self.problem.take().expect("Solver::solve called more than once");
		run(problem, callbacks, &self.abort)
	}
}

enum SearchSignal {
	Continue,
	Stop,
}

/// The parts of a solve run the recursive driver needs read/write access to,
/// bundled so the recursion itself only threads `state`, `depth`, and `best`
/// (spec §9: "Cyclic constraint/variable graph ... represent both sides with
/// indices" — the same instinct applied to the search driver's own context).
struct SearchCtx<'a> {
	registry: &'a mut PropagatorRegistry,
	tracker: &'a mut InferenceTracker,
	callbacks: &'a mut SolveCallbacks,
	abort: &'a AtomicBool,
	stats: &'a mut Stats,
	branch_vars: &'a [IntegerVariableID],
}

fn run(problem: Problem, mut callbacks: SolveCallbacks, abort: &AtomicBool) -> Result<SolveOutcome, SolverError> {
	let Problem {
		mut state,
		model,
		names,
		mut registry,
		branch_vars,
		proof_options,
	} = problem;

	let proof_requested = proof_options.opb_path.is_some() || proof_options.proof_path.is_some();
	let mut tracker = if proof_requested {
		let logger = ProofLogger::new(model.constraint_count());
		InferenceTracker::new(Some((logger, names)))
	} else {
		drop(names);
		InferenceTracker::new(None)
	};

	let mut stats = Stats::default();
	let mut best: Option<Solution> = None;
	let overall_start = Instant::now();

	let root = {
		let mut ctx = SearchCtx {
			registry: &mut registry,
			tracker: &mut tracker,
			callbacks: &mut callbacks,
			abort,
			stats: &mut stats,
			branch_vars: &branch_vars,
		};
		search(&mut ctx, &mut state, 0, &mut best)
	};
	stats.add_total_time(overall_start.elapsed());

	let aborted = abort.load(Ordering::Relaxed);
	let has_objective = state.objective().is_some();

	if let Some((logger, _)) = tracker.proof_mut() {
		let conclusion = if aborted {
			logger.conclude_interrupted()
		} else {
			match (&root, has_objective, &best) {
				(Err(Contradiction), _, _) | (Ok(_), _, None) => logger.conclude_unsat(),
				(Ok(_), true, Some(solution)) => {
					let value = solution
						.value(state.objective().expect("has_objective is true").variable)
						.expect("accept_solution always records the objective variable");
					logger.conclude_bounds(value.raw(), value.raw())
				}
				(Ok(_), false, Some(_)) => logger.conclude_satisfiable(),
			}
		};
		conclusion.expect("proof logger still open during search");
	}

	if let Some((logger, names)) = tracker.into_proof() {
		if let Some(path) = &proof_options.opb_path {
			std::fs::write(path, model.render(names.atom_count()))?;
		}
		if let Some(path) = &proof_options.proof_path {
			std::fs::write(path, logger.text())?;
		}
	}

	Ok(if aborted {
		SolveOutcome::Interrupted(stats)
	} else {
		match (root, has_objective, best) {
			(Err(Contradiction), _, _) | (Ok(_), _, None) => SolveOutcome::Unsatisfiable(stats),
			(Ok(_), true, Some(solution)) => {
				let objective = solution
					.value(state.objective().expect("has_objective is true").variable)
					.expect("accept_solution always records the objective variable");
				SolveOutcome::Optimal { solution, objective, stats }
			}
			(Ok(_), false, Some(solution)) => SolveOutcome::Satisfied { solution, stats },
		}
	})
}

fn search(ctx: &mut SearchCtx, state: &mut State, depth: u32, best: &mut Option<Solution>) -> Result<SearchSignal, Contradiction> {
	if ctx.abort.load(Ordering::Relaxed) {
		return Ok(SearchSignal::Stop);
	}
	ctx.stats.record_recursion(depth);
	ctx.registry.run_to_fixpoint_timed(state, ctx.tracker, ctx.stats)?;

	if ctx.abort.load(Ordering::Relaxed) {
		return Ok(SearchSignal::Stop);
	}

	let Some(branch_var) = select_branch_variable(ctx, state) else {
		return Ok(accept_solution(ctx, state, best));
	};

	let guesses = guess_conditions(ctx, state, branch_var);
	let mut any_succeeded = false;
	for condition in guesses {
		if ctx.abort.load(Ordering::Relaxed) {
			return Ok(SearchSignal::Stop);
		}

		let checkpoint = state.push_checkpoint();
		ctx.registry.push_checkpoint();
		if let Some((logger, _)) = ctx.tracker.proof_mut() {
			logger.open_level(ProofLevel::Current).expect("proof logger still open during search");
		}

		let literal = Literal::new(branch_var, condition);
		let step = match ctx.tracker.infer(state, literal, Justification::Guess, ReasonOutline::none()) {
			Ok(_) => search(ctx, state, depth + 1, best),
			Err(Contradiction) => Err(Contradiction),
		};

		state.restore_to(checkpoint);
		ctx.registry.restore_to_last_checkpoint();
		if let Some((logger, _)) = ctx.tracker.proof_mut() {
			logger.close_level(ProofLevel::Current).expect("proof logger still open during search");
		}

		match step {
			Ok(SearchSignal::Stop) => return Ok(SearchSignal::Stop),
			Ok(SearchSignal::Continue) => any_succeeded = true,
			Err(Contradiction) => ctx.stats.record_failure(),
		}
	}

	if any_succeeded {
		Ok(SearchSignal::Continue)
	} else {
		Err(Contradiction)
	}
}

/// Every branch variable is a singleton: record the solution, tighten the
/// objective (if any), and ask the solution callback whether to keep going.
fn accept_solution(ctx: &mut SearchCtx, state: &mut State, best: &mut Option<Solution>) -> SearchSignal {
	ctx.stats.record_solution();
	let mut solution = extract_solution(state, ctx.branch_vars);

	if let Some((logger, names)) = ctx.tracker.proof_mut() {
		let witness = solution_witness(names, ctx.branch_vars, state);
		logger.record_solution(&witness).expect("proof logger still open during search");
	}

	let keep_going = if let Some(objective) = state.objective() {
		let objective = *objective;
		let value = state.lower_bound(objective.variable);
		state.tighten_objective(value);
		if solution.value(objective.variable).is_none() {
			solution.values.push((objective.variable, value));
		}
		let condition = match objective.sense {
			Sense::Minimise => IntegerVariableCondition::Less(value),
			Sense::Maximise => IntegerVariableCondition::GreaterEqual(value + Integer::new(1)),
		};
		let _ = ctx.tracker.infer(
			state,
			Literal::new(objective.variable, condition),
			Justification::Rup,
			ReasonOutline::none(),
		);
		*best = Some(solution.clone());
		ctx.callbacks.solution.as_mut().map_or(true, |f| f(&solution))
	} else {
		*best = Some(solution.clone());
		ctx.callbacks.solution.as_mut().map_or(false, |f| f(&solution))
	};

	if keep_going {
		SearchSignal::Continue
	} else {
		SearchSignal::Stop
	}
}

fn extract_solution(state: &State, branch_vars: &[IntegerVariableID]) -> Solution {
	Solution {
		values: branch_vars
			.iter()
			.map(|&v| (v, state.value(v).expect("every branch variable is a singleton at a leaf")))
			.collect(),
	}
}

fn solution_witness(names: &ProofNameTracker, branch_vars: &[IntegerVariableID], state: &State) -> Vec<PbLit> {
	branch_vars
		.iter()
		.filter_map(|&var| {
			let value = state.value(var).expect("every branch variable is a singleton at a leaf");
			var.rewrite_condition(IntegerVariableCondition::Equal(value))
		})
		.flat_map(|(simple, condition)| names.literal_for_condition(simple, condition).into_iter().map(|term| term.literal))
		.collect()
}

fn select_branch_variable(ctx: &mut SearchCtx, state: &State) -> Option<IntegerVariableID> {
	let unfixed: Vec<IntegerVariableID> = ctx.branch_vars.iter().copied().filter(|&v| !state.has_single_value(v)).collect();
	if unfixed.is_empty() {
		return None;
	}
	if let Some(branch) = &mut ctx.callbacks.branch {
		return Some(branch(state, &unfixed));
	}
	unfixed
		.into_iter()
		.map(|v| {
			let degree = base_simple(v).map_or(0, |s| ctx.registry.degree(s));
			(state.domain_size(v), std::cmp::Reverse(degree), v)
		})
		.min_by_key(|&(size, degree, _)| (size, degree))
		.map(|(_, _, v)| v)
}

fn guess_conditions(ctx: &mut SearchCtx, state: &State, branch_var: IntegerVariableID) -> Vec<IntegerVariableCondition> {
	if let Some(guess) = &mut ctx.callbacks.guess {
		return guess(state, branch_var);
	}
	let lb = state.lower_bound(branch_var);
	vec![IntegerVariableCondition::Equal(lb), IntegerVariableCondition::NotEqual(lb)]
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::problem::{Constraint, ProblemBuilder};

	#[test]
	fn decision_problem_finds_a_solution() {
		let mut builder = ProblemBuilder::default();
		let x = builder.create_integer_variable(1, 3, Some("x")).unwrap();
		let y = builder.create_integer_variable(1, 3, Some("y")).unwrap();
		builder
			.post(Constraint::AllDifferent {
				vars: vec![x, y],
				gac: crate::propagators::all_different::Gac::Enabled,
			})
			.unwrap();
		let problem = builder.build().unwrap();

		let mut solver = Solver::new(problem);
		let outcome = solver.solve(SolveCallbacks::default()).unwrap();
		match outcome {
			SolveOutcome::Satisfied { solution, .. } => {
				assert_ne!(solution.value(x), solution.value(y));
			}
			other => panic!("expected a satisfying solution, got {other:?}"),
		}
	}

	#[test]
	fn unsatisfiable_decision_problem_is_reported() {
		let mut builder = ProblemBuilder::default();
		let x = builder.create_integer_variable(1, 1, Some("x")).unwrap();
		let y = builder.create_integer_variable(1, 1, Some("y")).unwrap();
		builder
			.post(Constraint::AllDifferent {
				vars: vec![x, y],
				gac: crate::propagators::all_different::Gac::Enabled,
			})
			.unwrap();
		let problem = builder.build().unwrap();

		let mut solver = Solver::new(problem);
		let outcome = solver.solve(SolveCallbacks::default()).unwrap();
		assert!(matches!(outcome, SolveOutcome::Unsatisfiable(_)));
	}

	#[test]
	fn unsat_optimisation_reports_unsatisfiable_not_optimal() {
		// x in [0,100], x >= 200: no assignment at all, regardless of the
		// objective (spec §8 "UNSAT optimisation").
		let mut builder = ProblemBuilder::default();
		let x = builder.create_integer_variable(0, 100, Some("x")).unwrap();
		builder
			.post(Constraint::LinearGreaterEqual {
				terms: vec![(1, x)],
				rhs: Integer::new(200),
			})
			.unwrap();
		builder.maximise(x);
		let problem = builder.build().unwrap();

		let mut solver = Solver::new(problem);
		let outcome = solver.solve(SolveCallbacks::default()).unwrap();
		assert!(matches!(outcome, SolveOutcome::Unsatisfiable(_)));
	}

	#[test]
	fn optimisation_finds_the_maximum() {
		let mut builder = ProblemBuilder::default();
		let x = builder.create_integer_variable(0, 10, Some("x")).unwrap();
		builder.maximise(x);
		let problem = builder.build().unwrap();

		let mut solver = Solver::new(problem);
		let outcome = solver.solve(SolveCallbacks::default()).unwrap();
		match outcome {
			SolveOutcome::Optimal { objective, .. } => assert_eq!(objective, Integer::new(10)),
			other => panic!("expected a proven optimum, got {other:?}"),
		}
	}

	#[test]
	fn abort_handle_stops_search_before_it_concludes() {
		let mut builder = ProblemBuilder::default();
		let _ = builder.create_integer_variable_vector(6, 1, 6, Some("x")).unwrap();
		let problem = builder.build().unwrap();

		let mut solver = Solver::new(problem);
		solver.abort_handle().abort();
		let outcome = solver.solve(SolveCallbacks::default()).unwrap();
		assert!(matches!(outcome, SolveOutcome::Interrupted(_)));
	}
}
