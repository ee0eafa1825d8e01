//! Problem builder (spec §4.8, component C11): the public surface for
//! declaring variables and constraints before search begins.
//!
//! Each [`ProblemBuilder::post`] call builds and registers its propagator
//! immediately — there is no deferred constraint graph. Variables pick their
//! proof encoding, and write whatever model constraints that encoding needs,
//! at creation time, the same pairing every propagator module's own tests
//! already perform by hand (create variable, register its encoding, post the
//! model constraint, build the propagator).

use std::collections::HashSet;
use std::path::PathBuf;

use crate::{
	domain::{Domain, SMALL_SET_WIDTH},
	error::ModelError,
	integer::Integer,
	proof::{
		model::{linear_constraint_expr, ModelWriter},
		names::{EncodingKind, ProofNameTracker},
	},
	propagators::{
		all_different::{AllDifferent, Gac},
		arithmetic::{Arithmetic, ArithmeticOp},
		circuit::Circuit,
		element::Element,
		inverse::Inverse,
		knapsack::Knapsack,
		linear::{LinearInequality, LinearNotEqual},
		regular::Regular,
		smart_table::{SmartEntry, SmartTable},
		table::Table,
		PropagatorRegistry, Propagator, TriggerKind,
	},
	state::{Sense, State},
	variable::{IntegerVariableID, SimpleIntegerVariable},
};

pub use crate::propagators::circuit::SCCOptions;

/// Options controlling how much proof a solve run writes out (spec §6).
#[derive(Clone, Debug)]
pub struct ProofOptions {
	/// Where to write the OPB model file. `None` skips proof logging
	/// entirely (search still runs, just without a proof).
	pub opb_path: Option<PathBuf>,
	/// Where to write the VeriPB-format proof.
	pub proof_path: Option<PathBuf>,
	/// Prefer `x_3` style atom names over terse `a17` names.
	pub friendly_names: bool,
	/// Request both the direct and bits encodings per variable, linked by an
	/// equation. Accepted for forward compatibility with spec §6; the
	/// encoder currently always picks one encoding per variable by domain
	/// size (see `DESIGN.md`), so this flag has no effect yet.
	pub full_encoding: bool,
}

impl Default for ProofOptions {
	fn default() -> Self {
		ProofOptions {
			opb_path: None,
			proof_path: None,
			friendly_names: false,
			full_encoding: false,
		}
	}
}

/// A global constraint not yet posted to a [`ProblemBuilder`] (spec §4.7).
pub enum Constraint {
	LinearLessEqual {
		terms: Vec<(i64, IntegerVariableID)>,
		rhs: Integer,
	},
	LinearGreaterEqual {
		terms: Vec<(i64, IntegerVariableID)>,
		rhs: Integer,
	},
	LinearEqual {
		terms: Vec<(i64, IntegerVariableID)>,
		rhs: Integer,
	},
	LinearNotEqual {
		terms: Vec<(i64, IntegerVariableID)>,
		rhs: Integer,
	},
	AllDifferent {
		vars: Vec<IntegerVariableID>,
		gac: Gac,
	},
	Table {
		vars: Vec<IntegerVariableID>,
		tuples: Vec<Vec<Integer>>,
	},
	SmartTable {
		vars: Vec<IntegerVariableID>,
		tuples: Vec<Vec<SmartEntry>>,
	},
	Regular {
		vars: Vec<IntegerVariableID>,
		start: usize,
		transitions: Vec<(usize, Integer, usize)>,
		accepting: HashSet<usize>,
		num_states: usize,
	},
	Circuit {
		vars: Vec<IntegerVariableID>,
		options: SCCOptions,
	},
	Element {
		var: IntegerVariableID,
		idx: IntegerVariableID,
		array: Vec<IntegerVariableID>,
	},
	Arithmetic {
		op: ArithmeticOp,
		a: IntegerVariableID,
		b: IntegerVariableID,
		r: IntegerVariableID,
	},
	Knapsack {
		weights: Vec<i64>,
		profits: Vec<i64>,
		items: Vec<IntegerVariableID>,
		weight_var: IntegerVariableID,
		profit_var: IntegerVariableID,
	},
	Inverse {
		x: Vec<IntegerVariableID>,
		y: Vec<IntegerVariableID>,
		x_start: i64,
		y_start: i64,
	},
}

/// Runs once before search, observing the domains variables were created
/// with and optionally posting additional (redundant) constraints. Must be
/// idempotent: a presolver may run again on an already-presolved builder
/// without changing the outcome (spec §4.8).
pub trait Presolver {
	fn presolve(&self, builder: &mut ProblemBuilder) -> Result<(), ModelError>;
}

/// Resolve a possibly-viewed variable down to the trail-backed variable a
/// propagator subscribes to; a bare constant has nothing to subscribe to.
fn base_simple(var: IntegerVariableID) -> Option<SimpleIntegerVariable> {
	match var {
		IntegerVariableID::Simple(s) => Some(s),
		IntegerVariableID::View(v) => Some(v.base),
		IntegerVariableID::Constant(_) => None,
	}
}

/// Materialises small-domain [`Constraint::Arithmetic`] constraints (`Add`
/// and `Sub`, which otherwise only get bound-consistent propagation) as a
/// redundant [`Table`] once their operand domains are small enough for a
/// full cross product to be worth the proof-size cost.
pub struct AutoTable {
	pub max_domain_product: usize,
}

impl Default for AutoTable {
	fn default() -> Self {
		AutoTable { max_domain_product: 10_000 }
	}
}

impl AutoTable {
	fn materialise(
		&self,
		builder: &mut ProblemBuilder,
		op: ArithmeticOp,
		a: IntegerVariableID,
		b: IntegerVariableID,
		r: IntegerVariableID,
	) -> Result<(), ModelError> {
		if builder.domain_size(a) * builder.domain_size(b) > self.max_domain_product {
			return Ok(());
		}
		let mut tuples = Vec::new();
		let mut va = builder.lower_bound(a);
		let hi_a = builder.upper_bound(a);
		while va <= hi_a {
			if builder.in_domain(a, va) {
				let mut vb = builder.lower_bound(b);
				let hi_b = builder.upper_bound(b);
				while vb <= hi_b {
					if builder.in_domain(b, vb) {
						if let Some(result) = op.eval(va, vb) {
							if builder.in_domain(r, result) {
								tuples.push(vec![va, vb, result]);
							}
						}
					}
					vb = vb + Integer::new(1);
				}
			}
			va = va + Integer::new(1);
		}
		if tuples.is_empty() {
			return Ok(());
		}
		builder.post(Constraint::Table { vars: vec![a, b, r], tuples })
	}
}

impl Presolver for AutoTable {
	fn presolve(&self, builder: &mut ProblemBuilder) -> Result<(), ModelError> {
		for (op, a, b, r) in builder.arithmetic_log.clone() {
			if matches!(op, ArithmeticOp::Add | ArithmeticOp::Sub) {
				self.materialise(builder, op, a, b, r)?;
			}
		}
		Ok(())
	}
}

/// A fully declared problem, ready to hand to a solver.
pub struct Problem {
	pub(crate) state: State,
	pub(crate) model: ModelWriter,
	pub(crate) names: ProofNameTracker,
	pub(crate) registry: PropagatorRegistry,
	pub(crate) branch_vars: Vec<IntegerVariableID>,
	pub(crate) proof_options: ProofOptions,
}

pub struct ProblemBuilder {
	state: State,
	model: ModelWriter,
	names: ProofNameTracker,
	registry: PropagatorRegistry,
	branch_vars: Vec<IntegerVariableID>,
	all_vars: Vec<IntegerVariableID>,
	presolvers: Vec<Box<dyn Presolver>>,
	var_names: HashSet<String>,
	arithmetic_log: Vec<(ArithmeticOp, IntegerVariableID, IntegerVariableID, IntegerVariableID)>,
	proof_options: ProofOptions,
}

impl Default for ProblemBuilder {
	fn default() -> Self {
		Self::new(ProofOptions::default())
	}
}

impl ProblemBuilder {
	pub fn new(options: ProofOptions) -> Self {
		ProblemBuilder {
			state: State::default(),
			model: ModelWriter::new(),
			names: ProofNameTracker::new(options.friendly_names),
			registry: PropagatorRegistry::new(),
			branch_vars: Vec::new(),
			all_vars: Vec::new(),
			presolvers: Vec::new(),
			var_names: HashSet::new(),
			arithmetic_log: Vec::new(),
			proof_options: options,
		}
	}

	fn create_with_domain(&mut self, domain: Domain, name: Option<&str>) -> Result<IntegerVariableID, ModelError> {
		if let Some(n) = name {
			if !self.var_names.insert(n.to_owned()) {
				return Err(ModelError::DuplicateVariableName(n.to_owned()));
			}
		}
		let simple = self.state.new_variable(domain.clone());
		let kind = if domain.domain_size() <= SMALL_SET_WIDTH as usize {
			EncodingKind::Direct
		} else {
			EncodingKind::Bits
		};
		for constraint in self.names.register_variable(simple, name.map(str::to_owned), &domain, kind) {
			self.model.add_constraint(&self.names, &constraint.terms, constraint.comparator, constraint.rhs);
		}
		let variable = IntegerVariableID::Simple(simple);
		self.all_vars.push(variable);
		Ok(variable)
	}

	/// A variable ranging over `[lo, hi]`.
	pub fn create_integer_variable(&mut self, lo: i64, hi: i64, name: Option<&str>) -> Result<IntegerVariableID, ModelError> {
		if hi < lo {
			return Err(ModelError::EmptyDomain);
		}
		self.create_with_domain(Domain::from_range(Integer::new(lo), Integer::new(hi)), name)
	}

	/// A variable ranging over an arbitrary, non-empty set of values.
	pub fn create_integer_variable_from_set(&mut self, mut values: Vec<i64>, name: Option<&str>) -> Result<IntegerVariableID, ModelError> {
		if values.is_empty() {
			return Err(ModelError::EmptyDomain);
		}
		values.sort_unstable();
		values.dedup();
		let domain = Domain::from_values(values.into_iter().map(Integer::new).collect());
		self.create_with_domain(domain, name)
	}

	/// `n` independent variables each ranging over `[lo, hi]`, named
	/// `{name}_0`..`{name}_{n-1}` when `name` is given.
	pub fn create_integer_variable_vector(
		&mut self,
		n: usize,
		lo: i64,
		hi: i64,
		name: Option<&str>,
	) -> Result<Vec<IntegerVariableID>, ModelError> {
		(0..n)
			.map(|i| {
				let indexed = name.map(|base| format!("{base}_{i}"));
				self.create_integer_variable(lo, hi, indexed.as_deref())
			})
			.collect()
	}

	fn register_with_triggers(&mut self, propagator: Box<dyn Propagator>, vars: &[IntegerVariableID], kind: TriggerKind) {
		let triggers: Vec<(SimpleIntegerVariable, TriggerKind)> =
			vars.iter().filter_map(|&v| base_simple(v)).map(|s| (s, kind)).collect();
		self.registry.register(propagator, &triggers);
	}

	pub fn post(&mut self, constraint: Constraint) -> Result<(), ModelError> {
		match constraint {
			Constraint::LinearLessEqual { terms, rhs } => {
				let propagator = LinearInequality::post(&mut self.model, &self.names, terms.clone(), rhs);
				self.register_with_triggers(Box::new(propagator), &terms.iter().map(|&(_, v)| v).collect::<Vec<_>>(), TriggerKind::Bounds);
			}
			Constraint::LinearGreaterEqual { terms, rhs } => {
				let negated: Vec<(i64, IntegerVariableID)> = terms.iter().map(|&(c, v)| (-c, v)).collect();
				let propagator = LinearInequality::post(&mut self.model, &self.names, negated, -rhs);
				self.register_with_triggers(Box::new(propagator), &terms.iter().map(|&(_, v)| v).collect::<Vec<_>>(), TriggerKind::Bounds);
			}
			Constraint::LinearEqual { terms, rhs } => {
				let vars: Vec<IntegerVariableID> = terms.iter().map(|&(_, v)| v).collect();
				let le = LinearInequality::post(&mut self.model, &self.names, terms.clone(), rhs);
				self.register_with_triggers(Box::new(le), &vars, TriggerKind::Bounds);
				let negated: Vec<(i64, IntegerVariableID)> = terms.iter().map(|&(c, v)| (-c, v)).collect();
				let ge = LinearInequality::post(&mut self.model, &self.names, negated, -rhs);
				self.register_with_triggers(Box::new(ge), &vars, TriggerKind::Bounds);
			}
			Constraint::LinearNotEqual { terms, rhs } => {
				let vars: Vec<IntegerVariableID> = terms.iter().map(|&(_, v)| v).collect();
				let propagator = LinearNotEqual::post(terms, rhs);
				self.register_with_triggers(Box::new(propagator), &vars, TriggerKind::Change);
			}
			Constraint::AllDifferent { vars, gac } => {
				let propagator = AllDifferent::post(&mut self.model, &self.names, &self.state, vars.clone(), gac);
				self.register_with_triggers(Box::new(propagator), &vars, TriggerKind::Change);
			}
			Constraint::Table { vars, tuples } => {
				let propagator = Table::post(&mut self.model, &mut self.names, &mut self.state, vars.clone(), tuples)?;
				self.register_with_triggers(Box::new(propagator), &vars, TriggerKind::Change);
			}
			Constraint::SmartTable { vars, tuples } => {
				let propagator = SmartTable::new(vars.clone(), tuples);
				self.register_with_triggers(Box::new(propagator), &vars, TriggerKind::Change);
			}
			Constraint::Regular {
				vars,
				start,
				transitions,
				accepting,
				num_states,
			} => {
				let propagator = Regular::new(vars.clone(), start, transitions, accepting, num_states);
				self.register_with_triggers(Box::new(propagator), &vars, TriggerKind::Change);
			}
			Constraint::Circuit { vars, options } => {
				let propagator = Circuit::post(&mut self.model, &self.names, &self.state, vars.clone(), options);
				self.register_with_triggers(Box::new(propagator), &vars, TriggerKind::Change);
			}
			Constraint::Element { var, idx, array } => {
				let propagator = Element::post(&mut self.model, &self.names, &self.state, var, idx, array.clone());
				let mut triggers = array;
				triggers.push(var);
				triggers.push(idx);
				self.register_with_triggers(Box::new(propagator), &triggers, TriggerKind::Change);
			}
			Constraint::Arithmetic { op, a, b, r } => {
				self.arithmetic_log.push((op, a, b, r));
				let propagator = Arithmetic::post(&mut self.model, &mut self.names, &mut self.state, op, a, b, r)?;
				self.register_with_triggers(Box::new(propagator), &[a, b, r], TriggerKind::Change);
			}
			Constraint::Knapsack {
				weights,
				profits,
				items,
				weight_var,
				profit_var,
			} => {
				let propagator = Knapsack::new(weights, profits, items.clone(), weight_var, profit_var);
				let mut triggers = items;
				triggers.push(weight_var);
				triggers.push(profit_var);
				self.register_with_triggers(Box::new(propagator), &triggers, TriggerKind::Change);
			}
			Constraint::Inverse { x, y, x_start, y_start } => {
				let propagator = Inverse::new(x.clone(), y.clone(), x_start, y_start);
				let mut triggers = x;
				triggers.extend(y);
				self.register_with_triggers(Box::new(propagator), &triggers, TriggerKind::Change);
			}
		}
		Ok(())
	}

	pub fn minimise(&mut self, variable: IntegerVariableID) {
		self.state.set_objective(variable, Sense::Minimise);
		let (expr, _) = linear_constraint_expr(&self.names, &[(1, variable)]);
		self.model.set_objective(&self.names, &expr, Sense::Minimise);
	}

	pub fn maximise(&mut self, variable: IntegerVariableID) {
		self.state.set_objective(variable, Sense::Maximise);
		let (expr, _) = linear_constraint_expr(&self.names, &[(1, variable)]);
		self.model.set_objective(&self.names, &expr, Sense::Maximise);
	}

	/// Restrict search to branch over exactly these variables, in order.
	/// Defaults to every created variable, in creation order, when never
	/// called.
	pub fn branch_on(&mut self, vars: Vec<IntegerVariableID>) {
		self.branch_vars = vars;
	}

	pub fn add_presolver(&mut self, presolver: Box<dyn Presolver>) {
		self.presolvers.push(presolver);
	}

	pub fn lower_bound(&self, var: IntegerVariableID) -> Integer {
		self.state.lower_bound(var)
	}

	pub fn upper_bound(&self, var: IntegerVariableID) -> Integer {
		self.state.upper_bound(var)
	}

	pub fn domain_size(&self, var: IntegerVariableID) -> usize {
		self.state.domain_size(var)
	}

	pub fn in_domain(&self, var: IntegerVariableID, value: Integer) -> bool {
		self.state.in_domain(var, value)
	}

	pub fn build(mut self) -> Result<Problem, ModelError> {
		let presolvers = std::mem::take(&mut self.presolvers);
		for presolver in &presolvers {
			presolver.presolve(&mut self)?;
		}
		let branch_vars = if self.branch_vars.is_empty() { self.all_vars } else { self.branch_vars };
		Ok(Problem {
			state: self.state,
			model: self.model,
			names: self.names,
			registry: self.registry,
			branch_vars,
			proof_options: self.proof_options,
		})
	}
}
