//! Pseudo-Boolean model writer (spec §4.4, §6, component C6).
//!
//! Writes the up-front OPB-like model: a header with the atom and constraint
//! counts, one line per constraint (encoding constraints, the objective, and
//! every propagator-posted model constraint), numbered in emission order. The
//! line number of each constraint is returned to the caller so propagators
//! can reference it later in RUP/cutting-planes derivations (spec §4.4).

use crate::{
	integer::Integer,
	proof::{names::ProofNameTracker, Comparator, PbExpr, PbTerm},
	state::Sense,
	variable::IntegerVariableID,
};

/// Which side a linear constraint's comparator reads, before it is
/// normalised to the model's canonical `>=`/`=` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinearComparator {
	LessEqual,
	GreaterEqual,
	Equal,
}

/// Expand `sum coefficient * variable` into a 0/1-atom expression plus a
/// constant folded out of the variables' encodings (spec §4.3; views and
/// constants are rewritten in place, see [`crate::variable::IntegerVariableID`]).
pub fn linear_constraint_expr(names: &ProofNameTracker, terms: &[(i64, IntegerVariableID)]) -> (PbExpr, i64) {
	let mut expr = Vec::new();
	let mut constant = 0i64;
	for &(coefficient, var) in terms {
		match var {
			IntegerVariableID::Constant(c) => constant += coefficient * c.raw(),
			IntegerVariableID::Simple(s) => {
				let (e, c) = names.linear_contribution(s, coefficient);
				expr.extend(e);
				constant += c;
			}
			IntegerVariableID::View(v) => {
				let effective = if v.negate_first { -coefficient } else { coefficient };
				constant += coefficient * v.then_add.raw();
				let (e, c) = names.linear_contribution(v.base, effective);
				expr.extend(e);
				constant += c;
			}
		}
	}
	(expr, constant)
}

/// Flip the sign of every term's coefficient (used to turn a `<=` reading
/// into the model's canonical `>=` form).
pub fn negate_expr(expr: PbExpr) -> PbExpr {
	expr.into_iter()
		.map(|t| PbTerm {
			coefficient: -t.coefficient,
			..t
		})
		.collect()
}

/// The 1-based line number of a constraint in the model file, returned by
/// [`ModelWriter::add_constraint`] so later proof steps can reference it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelLine(pub u32);

/// Writes the pseudo-Boolean model file ahead of search (component C6).
#[derive(Clone, Debug, Default)]
pub struct ModelWriter {
	constraint_lines: Vec<String>,
	objective_line: Option<String>,
}

impl ModelWriter {
	pub fn new() -> Self {
		Self::default()
	}

	/// The number of constraints written so far.
	pub fn constraint_count(&self) -> u32 {
		self.constraint_lines.len() as u32
	}

	/// Render `expr cmp rhs` and append it as a newly numbered constraint,
	/// returning its line number.
	pub fn add_constraint(
		&mut self,
		tracker: &ProofNameTracker,
		expr: &PbExpr,
		comparator: Comparator,
		rhs: i64,
	) -> ModelLine {
		let line = render_line(tracker, expr, comparator, rhs);
		self.constraint_lines.push(line);
		ModelLine(self.constraint_lines.len() as u32)
	}

	/// Set (or overwrite) the objective line.
	pub fn set_objective(&mut self, tracker: &ProofNameTracker, expr: &PbExpr, sense: Sense) {
		let dir = match sense {
			Sense::Minimise => "min",
			Sense::Maximise => "max",
		};
		let body = render_terms(tracker, expr);
		self.objective_line = Some(format!("{dir}: {body};"));
	}

	/// Post `sum coefficient * variable <op> rhs` as a newly numbered model
	/// constraint, normalising it to the canonical `>=`/`=` form.
	pub fn post_linear_constraint(
		&mut self,
		names: &ProofNameTracker,
		terms: &[(i64, IntegerVariableID)],
		comparator: LinearComparator,
		rhs: Integer,
	) -> ModelLine {
		let (expr, constant) = linear_constraint_expr(names, terms);
		match comparator {
			LinearComparator::GreaterEqual => {
				self.add_constraint(names, &expr, Comparator::GreaterEqual, rhs.raw() - constant)
			}
			LinearComparator::LessEqual => self.add_constraint(
				names,
				&negate_expr(expr),
				Comparator::GreaterEqual,
				constant - rhs.raw(),
			),
			LinearComparator::Equal => self.add_constraint(names, &expr, Comparator::Equal, rhs.raw() - constant),
		}
	}

	/// Render the complete model file text.
	pub fn render(&self, atom_count: u32) -> String {
		let mut out = String::new();
		out.push_str(&format!(
			"* #variable= {atom_count} #constraint= {}\n",
			self.constraint_lines.len()
		));
		if let Some(obj) = &self.objective_line {
			out.push_str(obj);
			out.push('\n');
		}
		for line in &self.constraint_lines {
			out.push_str(line);
			out.push('\n');
		}
		out
	}
}

fn render_terms(tracker: &ProofNameTracker, expr: &PbExpr) -> String {
	expr.iter()
		.map(|term| {
			let sign = if term.coefficient >= 0 { "+" } else { "-" };
			let magnitude = term.coefficient.unsigned_abs();
			let lit_name = tracker.atom_name(term.literal.atom);
			let prefix = if term.literal.negated { "~" } else { "" };
			format!("{sign}{magnitude} {prefix}x{}", lit_name_suffix(lit_name, term))
		})
		.collect::<Vec<_>>()
		.join(" ")
}

/// Renders the proof-atom index portion of a term's name. When friendly
/// names are enabled `lit_name` is a human name rather than `xK`; the model
/// line still uses the positional index so the file stays valid OPB, with the
/// friendly name recoverable from the proof log's own atom table.
fn lit_name_suffix(_lit_name: &str, term: &crate::proof::PbTerm) -> u32 {
	term.literal.atom.0
}

fn render_line(
	tracker: &ProofNameTracker,
	expr: &PbExpr,
	comparator: Comparator,
	rhs: i64,
) -> String {
	let cmp = match comparator {
		Comparator::GreaterEqual => ">=",
		Comparator::Equal => "=",
	};
	format!("{} {cmp} {rhs};", render_terms(tracker, expr))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		domain::Domain,
		integer::Integer,
		proof::names::EncodingKind,
		variable::SimpleIntegerVariable,
	};

	#[test]
	fn header_reports_atom_and_constraint_counts() {
		let mut tracker = ProofNameTracker::new(false);
		let simple = SimpleIntegerVariable::from_raw(0);
		let domain = Domain::from_range(Integer::new(0), Integer::new(2));
		let encoding_constraints =
			tracker.register_variable(simple, None, &domain, EncodingKind::Direct);

		let mut writer = ModelWriter::new();
		for c in &encoding_constraints {
			let _ = writer.add_constraint(&tracker, &c.terms, c.comparator, c.rhs);
		}
		let rendered = writer.render(tracker.atom_count());
		assert!(rendered.starts_with("* #variable= 3 #constraint= 1"));
		assert!(rendered.contains(">= 1") || rendered.contains("= 1"));
	}

	#[test]
	fn constraint_lines_are_numbered_in_emission_order() {
		let tracker = ProofNameTracker::new(false);
		let mut writer = ModelWriter::new();
		let expr = vec![];
		let l1 = writer.add_constraint(&tracker, &expr, Comparator::GreaterEqual, 0);
		let l2 = writer.add_constraint(&tracker, &expr, Comparator::GreaterEqual, 0);
		assert_eq!(l1.0, 1);
		assert_eq!(l2.0, 2);
	}
}
