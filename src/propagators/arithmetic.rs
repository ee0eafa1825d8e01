//! Arithmetic propagator (spec §4.7, component C10): `op(a, b) = r` for
//! `{+, -, *, /, %, ^}`.
//!
//! `Add`/`Sub` get dedicated bound-consistent propagation, the same
//! three-term linear reasoning as [`crate::propagators::linear`]. The
//! remaining operators fall back to a full-relation table built once, at
//! post time, over `a` and `b`'s initial domains (see
//! [`Integer::div_trunc`]/[`Integer::rem_trunc`] for the division and modulo
//! semantics used to fill it) and enforced exactly as
//! [`crate::propagators::table::Table`] enforces any other tuple list.

use crate::{
	domain::Contradiction,
	error::ModelError,
	inference::{Justification, ReasonKind, ReasonOutline},
	integer::Integer,
	literal::{IntegerVariableCondition, Literal},
	proof::{model::ModelWriter, names::ProofNameTracker},
	propagators::{table::Table, PropagationContext, Propagator, SubscriptionState},
	state::State,
	variable::IntegerVariableID,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithmeticOp {
	Add,
	Sub,
	Mul,
	Div,
	Mod,
	Pow,
}

impl ArithmeticOp {
	/// Evaluate the operator, returning `None` for an out-of-domain result
	/// (division/modulo by zero, or a negative exponent).
	pub(crate) fn eval(self, a: Integer, b: Integer) -> Option<Integer> {
		match self {
			ArithmeticOp::Add => Some(a + b),
			ArithmeticOp::Sub => Some(a - b),
			ArithmeticOp::Mul => Some(a * b),
			ArithmeticOp::Div => {
				if b.raw() == 0 {
					None
				} else {
					Some(a.div_trunc(b))
				}
			}
			ArithmeticOp::Mod => {
				if b.raw() == 0 {
					None
				} else {
					Some(a.rem_trunc(b))
				}
			}
			ArithmeticOp::Pow => {
				if b.raw() < 0 {
					None
				} else {
					let mut acc = Integer::new(1);
					for _ in 0..b.raw() {
						acc = acc * a;
					}
					Some(acc)
				}
			}
		}
	}
}

pub struct Arithmetic {
	op: ArithmeticOp,
	a: IntegerVariableID,
	b: IntegerVariableID,
	r: IntegerVariableID,
	table: Option<Table>,
}

impl Arithmetic {
	pub fn post(
		model: &mut ModelWriter,
		names: &mut ProofNameTracker,
		state: &mut State,
		op: ArithmeticOp,
		a: IntegerVariableID,
		b: IntegerVariableID,
		r: IntegerVariableID,
	) -> Result<Self, ModelError> {
		match op {
			ArithmeticOp::Add | ArithmeticOp::Sub => Ok(Arithmetic { op, a, b, r, table: None }),
			_ => {
				let mut tuples = Vec::new();
				let lo_a = state.lower_bound(a);
				let hi_a = state.upper_bound(a);
				let lo_b = state.lower_bound(b);
				let hi_b = state.upper_bound(b);
				let mut va = lo_a;
				while va <= hi_a {
					if state.in_domain(a, va) {
						let mut vb = lo_b;
						while vb <= hi_b {
							if state.in_domain(b, vb) {
								if let Some(result) = op.eval(va, vb) {
									if state.in_domain(r, result) {
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
					return Err(ModelError::TrivialUnsatisfiable);
				}
				let table = Table::post(model, names, state, vec![a, b, r], tuples)?;
				Ok(Arithmetic { op, a, b, r, table: Some(table) })
			}
		}
	}

	fn propagate_add(&self, ctx: &mut PropagationContext) -> Result<(), Contradiction> {
		let (a, b, r) = (self.a, self.b, self.r);
		// r <= a.hi + b.hi, r >= a.lo + b.lo
		let hi = ctx.state().upper_bound(a) + ctx.state().upper_bound(b);
		if ctx.state().upper_bound(r) > hi {
			ctx.infer(
				Literal::new(r, IntegerVariableCondition::Less(hi + Integer::new(1))),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(a, ReasonKind::UpperBound), (b, ReasonKind::UpperBound)]),
			)?;
		}
		let lo = ctx.state().lower_bound(a) + ctx.state().lower_bound(b);
		if ctx.state().lower_bound(r) < lo {
			ctx.infer(
				Literal::new(r, IntegerVariableCondition::GreaterEqual(lo)),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(a, ReasonKind::LowerBound), (b, ReasonKind::LowerBound)]),
			)?;
		}
		// a = r - b, b = r - a: symmetric tightening.
		let a_hi = ctx.state().upper_bound(r) - ctx.state().lower_bound(b);
		if ctx.state().upper_bound(a) > a_hi {
			ctx.infer(
				Literal::new(a, IntegerVariableCondition::Less(a_hi + Integer::new(1))),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(r, ReasonKind::UpperBound), (b, ReasonKind::LowerBound)]),
			)?;
		}
		let a_lo = ctx.state().lower_bound(r) - ctx.state().upper_bound(b);
		if ctx.state().lower_bound(a) < a_lo {
			ctx.infer(
				Literal::new(a, IntegerVariableCondition::GreaterEqual(a_lo)),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(r, ReasonKind::LowerBound), (b, ReasonKind::UpperBound)]),
			)?;
		}
		let b_hi = ctx.state().upper_bound(r) - ctx.state().lower_bound(a);
		if ctx.state().upper_bound(b) > b_hi {
			ctx.infer(
				Literal::new(b, IntegerVariableCondition::Less(b_hi + Integer::new(1))),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(r, ReasonKind::UpperBound), (a, ReasonKind::LowerBound)]),
			)?;
		}
		let b_lo = ctx.state().lower_bound(r) - ctx.state().upper_bound(a);
		if ctx.state().lower_bound(b) < b_lo {
			ctx.infer(
				Literal::new(b, IntegerVariableCondition::GreaterEqual(b_lo)),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(r, ReasonKind::LowerBound), (a, ReasonKind::UpperBound)]),
			)?;
		}
		Ok(())
	}

	fn propagate_sub(&self, ctx: &mut PropagationContext) -> Result<(), Contradiction> {
		// a - b = r  <=>  a + (-r) = b's counterpart; reuse the Add reasoning by
		// treating this as a = r + b (an Add constraint among a, r, b).
		let (a, b, r) = (self.a, self.b, self.r);
		let a_hi = ctx.state().upper_bound(r) + ctx.state().upper_bound(b);
		if ctx.state().upper_bound(a) > a_hi {
			ctx.infer(
				Literal::new(a, IntegerVariableCondition::Less(a_hi + Integer::new(1))),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(r, ReasonKind::UpperBound), (b, ReasonKind::UpperBound)]),
			)?;
		}
		let a_lo = ctx.state().lower_bound(r) + ctx.state().lower_bound(b);
		if ctx.state().lower_bound(a) < a_lo {
			ctx.infer(
				Literal::new(a, IntegerVariableCondition::GreaterEqual(a_lo)),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(r, ReasonKind::LowerBound), (b, ReasonKind::LowerBound)]),
			)?;
		}
		let r_hi = ctx.state().upper_bound(a) - ctx.state().lower_bound(b);
		if ctx.state().upper_bound(r) > r_hi {
			ctx.infer(
				Literal::new(r, IntegerVariableCondition::Less(r_hi + Integer::new(1))),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(a, ReasonKind::UpperBound), (b, ReasonKind::LowerBound)]),
			)?;
		}
		let r_lo = ctx.state().lower_bound(a) - ctx.state().upper_bound(b);
		if ctx.state().lower_bound(r) < r_lo {
			ctx.infer(
				Literal::new(r, IntegerVariableCondition::GreaterEqual(r_lo)),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(a, ReasonKind::LowerBound), (b, ReasonKind::UpperBound)]),
			)?;
		}
		let b_hi = ctx.state().upper_bound(a) - ctx.state().lower_bound(r);
		if ctx.state().upper_bound(b) > b_hi {
			ctx.infer(
				Literal::new(b, IntegerVariableCondition::Less(b_hi + Integer::new(1))),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(a, ReasonKind::UpperBound), (r, ReasonKind::LowerBound)]),
			)?;
		}
		let b_lo = ctx.state().lower_bound(a) - ctx.state().upper_bound(r);
		if ctx.state().lower_bound(b) < b_lo {
			ctx.infer(
				Literal::new(b, IntegerVariableCondition::GreaterEqual(b_lo)),
				Justification::Rup,
				ReasonOutline::Detailed(vec![(a, ReasonKind::LowerBound), (r, ReasonKind::UpperBound)]),
			)?;
		}
		Ok(())
	}
}

impl Propagator for Arithmetic {
	fn propagate(&mut self, ctx: &mut PropagationContext) -> Result<SubscriptionState, Contradiction> {
		match self.op {
			ArithmeticOp::Add => self.propagate_add(ctx)?,
			ArithmeticOp::Sub => self.propagate_sub(ctx)?,
			_ => {
				self.table.as_mut().expect("non-linear op always builds a table").propagate(ctx)?;
			}
		}
		Ok(SubscriptionState::Enable)
	}

	fn name(&self) -> &str {
		"arithmetic"
	}
}
