//! Proof logger (spec §4.4, §6, component C7).
//!
//! Streams RUP assertions, cutting-planes derivations, and deletions scoped
//! to a stack of proof levels kept synchronised with the search tree. The
//! logger contracts that every literal it references was created before use
//! (spec §4.4); callers are expected to have gone through
//! [`crate::proof::names::ProofNameTracker`] first.

use tracing::{debug, trace};

use crate::{
	error::ProofError,
	proof::{Comparator, PbExpr, PbLit},
};

/// Scope at which an emitted proof line may be deleted (spec §4.4, §9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProofLevel {
	/// Never deleted.
	Top,
	/// Deleted when the search backtracks past the point the level was
	/// opened.
	Current,
	/// Deleted at the end of the current propagation round.
	Temporary,
}

/// A single step in a cutting-planes derivation postfix expression (spec
/// §4.4, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolOp {
	/// Push the constraint at this (1-based) line number onto the stack.
	Line(u32),
	/// Pop two, push their sum.
	Add,
	/// Pop one, push it scaled by a non-negative constant.
	Mul(u64),
	/// Pop one, push it divided (with rounding towards a weaker constraint).
	Div(u64),
	/// Pop one, saturate its coefficients.
	Saturate,
}

struct LevelFrame {
	level: ProofLevel,
	lines_emitted: Vec<u32>,
}

/// Streams the proof file (component C7). Owns the output sink and serialises
/// all writes; exposes no re-entrant operations (spec §5).
#[derive(Debug, Default)]
pub struct ProofLogger {
	text: String,
	next_line: u32,
	levels: Vec<LevelFrame>,
	concluded: bool,
}

impl ProofLogger {
	/// Create a logger whose first proof line continues numbering from
	/// `model_constraint_count` (the model file's constraints occupy lines
	/// `1..=model_constraint_count`).
	pub fn new(model_constraint_count: u32) -> Self {
		let mut logger = ProofLogger {
			text: String::new(),
			next_line: model_constraint_count + 1,
			levels: vec![LevelFrame {
				level: ProofLevel::Top,
				lines_emitted: Vec::new(),
			}],
			concluded: false,
		};
		logger.text.push_str("pseudo-Boolean proof version 2.0\n");
		logger.text.push_str("f\n");
		logger
	}

	fn check_open(&self) -> Result<(), ProofError> {
		if self.concluded {
			Err(ProofError::WriteAfterConclusion)
		} else {
			Ok(())
		}
	}

	/// Open a new proof level (spec §4.4: "Level lines: `# <level>` opens a
	/// level").
	pub fn open_level(&mut self, level: ProofLevel) -> Result<(), ProofError> {
		self.check_open()?;
		debug!(?level, "open proof level");
		self.levels.push(LevelFrame {
			level,
			lines_emitted: Vec::new(),
		});
		self.text.push_str(&format!("# {}\n", self.levels.len() - 1));
		Ok(())
	}

	/// Close the most recently opened level matching `level`, emitting a
	/// `del` line for every proof line recorded since it was opened (unless
	/// it is [`ProofLevel::Top`], which is never deleted).
	pub fn close_level(&mut self, level: ProofLevel) -> Result<(), ProofError> {
		self.check_open()?;
		let frame = self
			.levels
			.pop()
			.expect("close_level called with no open level");
		debug_assert_eq!(frame.level, level, "proof level stack is out of sync");
		if level != ProofLevel::Top && !frame.lines_emitted.is_empty() {
			let ids = frame
				.lines_emitted
				.iter()
				.map(|id| id.to_string())
				.collect::<Vec<_>>()
				.join(" ");
			self.text.push_str(&format!("del id {ids}\n"));
		}
		debug!(?level, "close proof level");
		Ok(())
	}

	fn record_line(&mut self) -> u32 {
		let id = self.next_line;
		self.next_line += 1;
		self.levels
			.last_mut()
			.expect("at least the Top frame is always present")
			.lines_emitted
			.push(id);
		id
	}

	fn render_expr(expr: &PbExpr) -> String {
		expr.iter()
			.map(|t| {
				let sign = if t.coefficient >= 0 { "+" } else { "-" };
				let mag = t.coefficient.unsigned_abs();
				let prefix = if t.literal.negated { "~" } else { "" };
				format!("{sign}{mag} {prefix}x{}", t.literal.atom.0)
			})
			.collect::<Vec<_>>()
			.join(" ")
	}

	fn render_lits(lits: &[PbLit]) -> String {
		lits.iter()
			.map(|l| {
				let prefix = if l.negated { "~" } else { "" };
				format!("{prefix}x{}", l.atom.0)
			})
			.collect::<Vec<_>>()
			.join(" ")
	}

	/// Emit a reverse-unit-propagation assertion, optionally tagged with a
	/// reason the checker must unit-propagate from first (spec §4.4).
	/// Returns the new constraint's line number.
	pub fn rup(
		&mut self,
		expr: &PbExpr,
		comparator: Comparator,
		rhs: i64,
		reason: Option<&[PbLit]>,
	) -> Result<u32, ProofError> {
		self.check_open()?;
		let cmp = match comparator {
			Comparator::GreaterEqual => ">=",
			Comparator::Equal => "=",
		};
		let mut line = format!("rup {} {cmp} {rhs}", Self::render_expr(expr));
		if let Some(reason) = reason {
			if !reason.is_empty() {
				line.push_str(&format!(" ; reason {}", Self::render_lits(reason)));
			}
		}
		line.push_str(" ;\n");
		trace!(line = line.trim_end(), "rup");
		self.text.push_str(&line);
		Ok(self.record_line())
	}

	/// Emit a cutting-planes derivation as a postfix expression over previous
	/// constraint line numbers (spec §4.4). Returns the new constraint's line
	/// number.
	pub fn cutting_planes(&mut self, postfix: &[PolOp]) -> Result<u32, ProofError> {
		self.check_open()?;
		let body = postfix
			.iter()
			.map(|op| match op {
				PolOp::Line(n) => n.to_string(),
				PolOp::Add => "+".to_owned(),
				PolOp::Mul(c) => format!("{c} *"),
				PolOp::Div(c) => format!("{c} d"),
				PolOp::Saturate => "s".to_owned(),
			})
			.collect::<Vec<_>>()
			.join(" ");
		let line = format!("pol {body}\n");
		trace!(line = line.trim_end(), "pol");
		self.text.push_str(&line);
		Ok(self.record_line())
	}

	/// Record a found solution as a witness (spec §4.4). The exact on-disk
	/// marker is not dictated by the wire contract in spec §6; this crate
	/// emits it as a comment line (`*`-prefixed, like the model header) so it
	/// never competes with a real `rup`/`pol`/`#`/`del` line number, a choice
	/// recorded in `DESIGN.md`.
	pub fn record_solution(&mut self, witness: &[PbLit]) -> Result<(), ProofError> {
		self.check_open()?;
		self.text
			.push_str(&format!("* solution: {}\n", Self::render_lits(witness)));
		Ok(())
	}

	/// Conclude with `output NONE` / `conclusion UNSAT`.
	pub fn conclude_unsat(&mut self) -> Result<(), ProofError> {
		self.conclude_with("output NONE\nconclusion UNSAT\n")
	}

	/// Conclude with bounds on the objective (spec §6).
	pub fn conclude_bounds(&mut self, lb: i64, ub: i64) -> Result<(), ProofError> {
		self.conclude_with(&format!("output NONE\nconclusion BOUNDS {lb} {ub}\n"))
	}

	/// Conclude a search that was cancelled before completion.
	pub fn conclude_interrupted(&mut self) -> Result<(), ProofError> {
		self.conclude_with("output NONE\nconclusion NONE\n")
	}

	/// Conclude a decision search that accepted a satisfying solution, with no
	/// UNSAT/BOUNDS claim to make: spec §6 only defines conclusion kinds for
	/// the unsatisfiable and bounded-objective outcomes, so a plain
	/// satisfiable run closes every open level and stops, its witness already
	/// on record via [`Self::record_solution`].
	pub fn conclude_satisfiable(&mut self) -> Result<(), ProofError> {
		self.conclude_with("output NONE\n")
	}

	fn conclude_with(&mut self, body: &str) -> Result<(), ProofError> {
		self.check_open()?;
		while self.levels.len() > 1 {
			let level = self.levels.last().unwrap().level;
			self.close_level(level)?;
		}
		self.text.push_str(body);
		self.text.push_str("end pseudo-Boolean proof\n");
		self.concluded = true;
		Ok(())
	}

	/// The full, rendered proof text so far.
	pub fn text(&self) -> &str {
		&self.text
	}

	/// Whether [`Self::conclude_unsat`]/[`Self::conclude_bounds`]/
	/// [`Self::conclude_interrupted`] has already been called.
	pub fn is_concluded(&self) -> bool {
		self.concluded
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::proof::PbAtom;

	fn lit(i: u32) -> PbLit {
		PbLit::pos(PbAtom(i))
	}

	#[test]
	fn lines_are_numbered_continuing_from_the_model() {
		let mut logger = ProofLogger::new(5);
		let l1 = logger.rup(&[], Comparator::GreaterEqual, 0, None).unwrap();
		let l2 = logger.rup(&[], Comparator::GreaterEqual, 0, None).unwrap();
		assert_eq!(l1, 6);
		assert_eq!(l2, 7);
	}

	#[test]
	fn current_level_lines_are_deleted_on_close() {
		let mut logger = ProofLogger::new(0);
		logger.open_level(ProofLevel::Current).unwrap();
		let _ = logger.rup(&[], Comparator::GreaterEqual, 0, None).unwrap();
		let _ = logger.rup(&[], Comparator::GreaterEqual, 0, None).unwrap();
		logger.close_level(ProofLevel::Current).unwrap();
		assert!(logger.text().contains("del id 1 2"));
	}

	#[test]
	fn top_level_lines_are_never_deleted() {
		let mut logger = ProofLogger::new(0);
		let _ = logger.rup(&[lit(1)], Comparator::GreaterEqual, 1, None);
		logger.conclude_unsat().unwrap();
		assert!(!logger.text().contains("del id"));
		assert!(logger.text().contains("conclusion UNSAT"));
	}

	#[test]
	fn writing_after_conclusion_is_an_error() {
		let mut logger = ProofLogger::new(0);
		logger.conclude_unsat().unwrap();
		assert!(matches!(
			logger.rup(&[], Comparator::GreaterEqual, 0, None),
			Err(ProofError::WriteAfterConclusion)
		));
	}
}
