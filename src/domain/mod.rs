//! The integer domain store (spec §4.1, component C1).
//!
//! Four domain shapes are used depending on size: [`Domain::Constant`],
//! [`Domain::Range`], [`Domain::SmallSet`] (bit vector, up to
//! [`SMALL_SET_WIDTH`] values), and [`Domain::LargeSet`] (a shared,
//! copy-on-write sorted vector). A domain is promoted to a larger shape as
//! holes are punched or its span grows; demotion is never performed (spec
//! §3).

use std::rc::Rc;

use index_vec::IndexVec;

use crate::{integer::Integer, variable::SimpleIntegerVariable};

/// Width, in values, of the bit vector used by [`Domain::SmallSet`].
pub const SMALL_SET_WIDTH: u32 = 128;

/// A small-set domain: a fixed-width bit vector plus the offset of bit 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmallSet {
	/// The value represented by the lowest bit.
	offset: i64,
	/// Bit `i` set means `offset + i` is in the domain.
	bits: u128,
}

impl SmallSet {
	fn from_range(lower: Integer, upper: Integer) -> Self {
		let width = (upper.raw() - lower.raw()) as u32 + 1;
		debug_assert!(width <= SMALL_SET_WIDTH);
		let bits = if width == 128 {
			u128::MAX
		} else {
			(1u128 << width) - 1
		};
		SmallSet {
			offset: lower.raw(),
			bits,
		}
	}

	fn contains(&self, v: Integer) -> bool {
		let idx = v.raw() - self.offset;
		(0..SMALL_SET_WIDTH as i64).contains(&idx) && (self.bits & (1u128 << idx)) != 0
	}

	fn lower_bound(&self) -> Integer {
		Integer::new(self.offset + self.bits.trailing_zeros() as i64)
	}

	fn upper_bound(&self) -> Integer {
		Integer::new(self.offset + (127 - self.bits.leading_zeros() as i64))
	}

	fn size(&self) -> usize {
		self.bits.count_ones() as usize
	}

	fn remove(&mut self, v: Integer) {
		let idx = v.raw() - self.offset;
		if (0..SMALL_SET_WIDTH as i64).contains(&idx) {
			self.bits &= !(1u128 << idx);
		}
	}

	fn retain_ge(&mut self, v: Integer) {
		let idx = v.raw() - self.offset;
		if idx <= 0 {
			return;
		}
		if idx >= SMALL_SET_WIDTH as i64 {
			self.bits = 0;
			return;
		}
		let mask = u128::MAX << idx;
		self.bits &= mask;
	}

	fn retain_lt(&mut self, v: Integer) {
		let idx = v.raw() - self.offset;
		if idx >= SMALL_SET_WIDTH as i64 {
			return;
		}
		if idx <= 0 {
			self.bits = 0;
			return;
		}
		let mask = (1u128 << idx) - 1;
		self.bits &= mask;
	}

	fn for_each_value(&self, mut f: impl FnMut(Integer)) {
		let mut bits = self.bits;
		while bits != 0 {
			let idx = bits.trailing_zeros();
			f(Integer::new(self.offset + idx as i64));
			bits &= bits - 1;
		}
	}

	fn to_vec(&self) -> Vec<Integer> {
		let mut out = Vec::with_capacity(self.size());
		self.for_each_value(|v| out.push(v));
		out
	}
}

/// A domain's current representation, chosen by size (spec §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Domain {
	/// A fixed singleton, set at variable creation and never mutated.
	Constant(Integer),
	/// `[lower, upper]`, no holes.
	Range(Integer, Integer),
	/// A bit vector over at most [`SMALL_SET_WIDTH`] values.
	SmallSet(SmallSet),
	/// A sorted set of integers on the heap, shared-by-clone with
	/// copy-on-write semantics via [`Rc`].
	LargeSet(Rc<Vec<Integer>>),
}

/// The result of a domain mutation, used to select which propagators get
/// re-enqueued (spec §4.1, §4.6). Ordered so that `Instantiated` dominates
/// `BoundsChanged` dominates `InteriorValuesChanged`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HowChanged {
	/// The domain was unchanged by the mutation (it was a no-op).
	NoChange,
	/// A value strictly between the bounds was removed, bounds unaffected.
	InteriorValuesChanged,
	/// A bound moved (but the variable did not become a singleton).
	BoundsChanged,
	/// The variable became a singleton.
	Instantiated,
}

impl HowChanged {
	/// Combine two changes from the same mutation, keeping the dominant one.
	pub fn merge(self, other: HowChanged) -> HowChanged {
		self.max(other)
	}
}

/// Raised by a domain mutator when the domain would become empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contradiction;

impl Domain {
	/// Construct a domain covering `[lower, upper]`, choosing the tightest
	/// shape that fits.
	pub fn from_range(lower: Integer, upper: Integer) -> Self {
		if lower == upper {
			Domain::Constant(lower)
		} else if (upper.raw() - lower.raw()) as i128 + 1 <= SMALL_SET_WIDTH as i128 {
			Domain::SmallSet(SmallSet::from_range(lower, upper))
		} else {
			Domain::Range(lower, upper)
		}
	}

	/// Construct a domain from an explicit, non-empty, sorted-on-entry set of
	/// values.
	pub fn from_values(mut values: Vec<Integer>) -> Self {
		values.sort_unstable();
		values.dedup();
		assert!(!values.is_empty(), "domain created empty (spec §7)");
		let lower = values[0];
		let upper = *values.last().unwrap();
		if values.len() == 1 {
			return Domain::Constant(lower);
		}
		if values.len() as i128 == (upper.raw() - lower.raw()) as i128 + 1 {
			return Domain::from_range(lower, upper);
		}
		if (upper.raw() - lower.raw()) as i128 + 1 <= SMALL_SET_WIDTH as i128 {
			let mut set = SmallSet::from_range(lower, upper);
			set.bits = 0;
			for v in &values {
				let idx = v.raw() - set.offset;
				set.bits |= 1u128 << idx;
			}
			Domain::SmallSet(set)
		} else {
			Domain::LargeSet(Rc::new(values))
		}
	}

	/// The smallest value in the domain.
	pub fn lower_bound(&self) -> Integer {
		match self {
			Domain::Constant(v) => *v,
			Domain::Range(lo, _) => *lo,
			Domain::SmallSet(s) => s.lower_bound(),
			Domain::LargeSet(v) => v[0],
		}
	}

	/// The largest value in the domain.
	pub fn upper_bound(&self) -> Integer {
		match self {
			Domain::Constant(v) => *v,
			Domain::Range(_, hi) => *hi,
			Domain::SmallSet(s) => s.upper_bound(),
			Domain::LargeSet(v) => *v.last().unwrap(),
		}
	}

	/// Whether the domain contains exactly one value.
	pub fn has_single_value(&self) -> bool {
		match self {
			Domain::Constant(_) => true,
			Domain::Range(lo, hi) => lo == hi,
			Domain::SmallSet(s) => s.size() == 1,
			Domain::LargeSet(v) => v.len() == 1,
		}
	}

	/// The domain's single value, if it has one.
	pub fn value(&self) -> Option<Integer> {
		self.has_single_value().then(|| self.lower_bound())
	}

	/// Whether `v` is a member of the domain.
	pub fn in_domain(&self, v: Integer) -> bool {
		match self {
			Domain::Constant(c) => *c == v,
			Domain::Range(lo, hi) => *lo <= v && v <= *hi,
			Domain::SmallSet(s) => s.contains(v),
			Domain::LargeSet(vals) => vals.binary_search(&v).is_ok(),
		}
	}

	/// The number of values currently in the domain.
	pub fn domain_size(&self) -> usize {
		match self {
			Domain::Constant(_) => 1,
			Domain::Range(lo, hi) => (hi.raw() - lo.raw() + 1) as usize,
			Domain::SmallSet(s) => s.size(),
			Domain::LargeSet(v) => v.len(),
		}
	}

	/// Call `f` on every value in the domain, in increasing order.
	pub fn for_each_value(&self, mut f: impl FnMut(Integer)) {
		match self {
			Domain::Constant(v) => f(*v),
			Domain::Range(lo, hi) => {
				let mut v = lo.raw();
				while v <= hi.raw() {
					f(Integer::new(v));
					v += 1;
				}
			}
			Domain::SmallSet(s) => s.for_each_value(f),
			Domain::LargeSet(vals) => vals.iter().for_each(|v| f(*v)),
		}
	}

	/// Materialise the domain's values into a `Vec`, in increasing order.
	pub fn to_vec(&self) -> Vec<Integer> {
		match self {
			Domain::LargeSet(v) => v.as_ref().clone(),
			Domain::SmallSet(s) => s.to_vec(),
			_ => {
				let mut out = Vec::with_capacity(self.domain_size());
				self.for_each_value(|v| out.push(v));
				out
			}
		}
	}

	/// Promote (if needed) and remove all values that do not equal `v`.
	fn set_equal(&mut self, v: Integer) -> Result<HowChanged, Contradiction> {
		if !self.in_domain(v) {
			return Err(Contradiction);
		}
		let was_single = self.has_single_value();
		*self = Domain::Constant(v);
		Ok(if was_single {
			HowChanged::NoChange
		} else {
			HowChanged::Instantiated
		})
	}

	/// Remove `v`, promoting the shape if a hole is punched into a
	/// [`Domain::Range`].
	fn set_not_equal(&mut self, v: Integer) -> Result<HowChanged, Contradiction> {
		if !self.in_domain(v) {
			return Ok(HowChanged::NoChange);
		}
		match self {
			Domain::Constant(_) => Err(Contradiction),
			Domain::Range(lo, hi) => {
				if v == *lo {
					*lo = *lo + Integer::new(1);
					if lo > hi {
						return Err(Contradiction);
					}
					Ok(after_bound_move(self))
				} else if v == *hi {
					*hi = *hi - Integer::new(1);
					if lo > hi {
						return Err(Contradiction);
					}
					Ok(after_bound_move(self))
				} else {
					// Punching an interior hole promotes the shape.
					let (lo, hi) = (*lo, *hi);
					if (hi.raw() - lo.raw()) as i128 + 1 <= SMALL_SET_WIDTH as i128 {
						let mut set = SmallSet::from_range(lo, hi);
						set.remove(v);
						*self = Domain::SmallSet(set);
					} else {
						let mut values: Vec<Integer> =
							(lo.raw()..=hi.raw()).map(Integer::new).collect();
						values.retain(|x| *x != v);
						*self = Domain::LargeSet(Rc::new(values));
					}
					Ok(HowChanged::InteriorValuesChanged)
				}
			}
			Domain::SmallSet(s) => {
				let was_bound = v == s.lower_bound() || v == s.upper_bound();
				s.remove(v);
				if s.bits == 0 {
					return Err(Contradiction);
				}
				Ok(if s.size() == 1 {
					HowChanged::Instantiated
				} else if was_bound {
					HowChanged::BoundsChanged
				} else {
					HowChanged::InteriorValuesChanged
				})
			}
			Domain::LargeSet(vals) => {
				let was_bound = v == *vals.first().unwrap() || v == *vals.last().unwrap();
				let vec = Rc::make_mut(vals);
				if let Ok(idx) = vec.binary_search(&v) {
					vec.remove(idx);
				}
				if vec.is_empty() {
					return Err(Contradiction);
				}
				Ok(if vec.len() == 1 {
					HowChanged::Instantiated
				} else if was_bound {
					HowChanged::BoundsChanged
				} else {
					HowChanged::InteriorValuesChanged
				})
			}
		}
	}

	/// Remove all values strictly less than `v`.
	fn set_ge(&mut self, v: Integer) -> Result<HowChanged, Contradiction> {
		if v <= self.lower_bound() {
			return Ok(HowChanged::NoChange);
		}
		if v > self.upper_bound() {
			return Err(Contradiction);
		}
		match self {
			Domain::Constant(_) => unreachable!("checked above"),
			Domain::Range(lo, _) => {
				*lo = v;
				Ok(after_bound_move(self))
			}
			Domain::SmallSet(s) => {
				s.retain_ge(v);
				if s.bits == 0 {
					return Err(Contradiction);
				}
				Ok(after_bound_move(self))
			}
			Domain::LargeSet(vals) => {
				let vec = Rc::make_mut(vals);
				vec.retain(|x| *x >= v);
				if vec.is_empty() {
					return Err(Contradiction);
				}
				Ok(after_bound_move(self))
			}
		}
	}

	/// Remove all values greater-than-or-equal to `v` (i.e. assert `x < v`).
	fn set_lt(&mut self, v: Integer) -> Result<HowChanged, Contradiction> {
		if v > self.upper_bound() {
			return Ok(HowChanged::NoChange);
		}
		if v <= self.lower_bound() {
			return Err(Contradiction);
		}
		match self {
			Domain::Constant(_) => unreachable!("checked above"),
			Domain::Range(_, hi) => {
				*hi = v - Integer::new(1);
				Ok(after_bound_move(self))
			}
			Domain::SmallSet(s) => {
				s.retain_lt(v);
				if s.bits == 0 {
					return Err(Contradiction);
				}
				Ok(after_bound_move(self))
			}
			Domain::LargeSet(vals) => {
				let vec = Rc::make_mut(vals);
				vec.retain(|x| *x < v);
				if vec.is_empty() {
					return Err(Contradiction);
				}
				Ok(after_bound_move(self))
			}
		}
	}
}

/// After a bound-moving mutation, report `Instantiated` if the domain
/// collapsed to a singleton, else `BoundsChanged`.
fn after_bound_move(d: &Domain) -> HowChanged {
	if d.has_single_value() {
		HowChanged::Instantiated
	} else {
		HowChanged::BoundsChanged
	}
}

/// The domain store: one [`Domain`] per [`SimpleIntegerVariable`] (component
/// C1). All mutators record on the trail (by returning the previous shape for
/// the caller to push) before mutating, per spec §4.2.
#[derive(Clone, Debug, Default)]
pub struct DomainStore {
	domains: IndexVec<SimpleIntegerVariable, Domain>,
}

impl DomainStore {
	/// Register a new variable with the given initial domain, returning its
	/// index.
	pub fn create(&mut self, domain: Domain) -> SimpleIntegerVariable {
		self.domains.push(domain)
	}

	/// Read-only access to a variable's current domain.
	pub fn domain(&self, v: SimpleIntegerVariable) -> &Domain {
		&self.domains[v]
	}

	/// Replace a variable's domain wholesale, returning the previous value so
	/// the trail can restore it. Used by [`crate::state::trail::Trail`].
	pub fn replace(&mut self, v: SimpleIntegerVariable, domain: Domain) -> Domain {
		std::mem::replace(&mut self.domains[v], domain)
	}

	pub fn lower_bound(&self, v: SimpleIntegerVariable) -> Integer {
		self.domains[v].lower_bound()
	}

	pub fn upper_bound(&self, v: SimpleIntegerVariable) -> Integer {
		self.domains[v].upper_bound()
	}

	pub fn has_single_value(&self, v: SimpleIntegerVariable) -> bool {
		self.domains[v].has_single_value()
	}

	pub fn value(&self, v: SimpleIntegerVariable) -> Option<Integer> {
		self.domains[v].value()
	}

	pub fn in_domain(&self, v: SimpleIntegerVariable, val: Integer) -> bool {
		self.domains[v].in_domain(val)
	}

	pub fn domain_size(&self, v: SimpleIntegerVariable) -> usize {
		self.domains[v].domain_size()
	}

	pub fn for_each_value(&self, v: SimpleIntegerVariable, f: impl FnMut(Integer)) {
		self.domains[v].for_each_value(f)
	}

	/// Infer `x = v`, returning the prior domain (for trailing) and the change
	/// it caused, or [`Contradiction`].
	pub fn infer_equal(
		&mut self,
		v: SimpleIntegerVariable,
		val: Integer,
	) -> (Domain, Result<HowChanged, Contradiction>) {
		let prior = self.domains[v].clone();
		let result = self.domains[v].set_equal(val);
		(prior, result)
	}

	/// Infer `x != v`.
	pub fn infer_not_equal(
		&mut self,
		v: SimpleIntegerVariable,
		val: Integer,
	) -> (Domain, Result<HowChanged, Contradiction>) {
		let prior = self.domains[v].clone();
		let result = self.domains[v].set_not_equal(val);
		(prior, result)
	}

	/// Infer `x >= v`.
	pub fn infer_ge(
		&mut self,
		v: SimpleIntegerVariable,
		val: Integer,
	) -> (Domain, Result<HowChanged, Contradiction>) {
		let prior = self.domains[v].clone();
		let result = self.domains[v].set_ge(val);
		(prior, result)
	}

	/// Infer `x < v`.
	pub fn infer_lt(
		&mut self,
		v: SimpleIntegerVariable,
		val: Integer,
	) -> (Domain, Result<HowChanged, Contradiction>) {
		let prior = self.domains[v].clone();
		let result = self.domains[v].set_lt(val);
		(prior, result)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rng(lo: i64, hi: i64) -> Domain {
		Domain::from_range(Integer::new(lo), Integer::new(hi))
	}

	#[test]
	fn range_promotes_to_small_set_on_hole() {
		let mut d = rng(0, 9);
		let (_, r) = (
			d.clone(),
			d.set_not_equal(Integer::new(5)).expect("removable"),
		);
		assert_eq!(r, HowChanged::InteriorValuesChanged);
		assert!(matches!(d, Domain::SmallSet(_)));
		assert!(!d.in_domain(Integer::new(5)));
		assert!(d.in_domain(Integer::new(4)));
	}

	#[test]
	fn small_set_promotes_to_large_set_past_width() {
		let mut d = rng(0, SMALL_SET_WIDTH as i64); // width+1 values
		assert!(matches!(d, Domain::Range(_, _)));
		let r = d.set_not_equal(Integer::new(1)).unwrap();
		assert_eq!(r, HowChanged::InteriorValuesChanged);
		assert!(matches!(d, Domain::LargeSet(_)));
	}

	#[test]
	fn emptying_is_a_contradiction() {
		let mut d = Domain::Constant(Integer::new(3));
		assert_eq!(d.set_equal(Integer::new(4)), Err(Contradiction));
	}

	#[test]
	fn bound_tightening_reports_instantiated_at_singleton() {
		let mut d = rng(0, 1);
		let r = d.set_ge(Integer::new(1)).unwrap();
		assert_eq!(r, HowChanged::Instantiated);
		assert_eq!(d.value(), Some(Integer::new(1)));
	}

	#[test]
	fn large_set_is_shared_until_written() {
		let d = Domain::from_values((0..200).map(Integer::new).collect());
		let mut d2 = d.clone();
		if let (Domain::LargeSet(a), Domain::LargeSet(b)) = (&d, &d2) {
			assert!(Rc::ptr_eq(a, b));
		} else {
			panic!("expected large sets");
		}
		let _ = d2.set_not_equal(Integer::new(100));
		if let (Domain::LargeSet(a), Domain::LargeSet(b)) = (&d, &d2) {
			assert!(!Rc::ptr_eq(a, b));
		} else {
			panic!("expected large sets");
		}
	}
}
