//! Integer and clock expressions appearing in guards, invariants and
//! statements
//!
//! Integer expressions are evaluated eagerly over a valuation of the integer
//! variables, while clock comparisons are *lowered*: their integer operands
//! are evaluated and the comparison becomes one or two atomic
//! [`ClockConstraint`]s handed to the zone layer.

use std::fmt;

use zora_dbm::{Bound, ClockConstraint, ClockId, REFERENCE};

use crate::{IntVarId, ParamId};

/// Arithmetic operators of integer expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Integer division
    Div,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    /// Less
    Lt,
    /// Less or equal
    Le,
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Greater or equal
    Ge,
    /// Greater
    Gt,
}

/// Integer expression over variables, parameters and statement locals
///
/// Locals are addressed by their de Bruijn index: `Local(0)` is the local
/// declared by the innermost enclosing `local` statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IntExpr {
    /// Integer constant
    Const(i64),
    /// Integer variable
    Var(IntVarId),
    /// Bounded parameter
    Param(ParamId),
    /// Statement-local variable by de Bruijn index
    Local(usize),
    /// Binary arithmetic expression
    Binary(Box<IntExpr>, IntOp, Box<IntExpr>),
    /// Arithmetic negation
    Neg(Box<IntExpr>),
}

/// Boolean expression over integer comparisons
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoolExpr {
    /// true
    True,
    /// false
    False,
    /// Comparison of two integer expressions
    Cmp(Box<IntExpr>, CmpOp, Box<IntExpr>),
    /// Conjunction
    And(Box<BoolExpr>, Box<BoolExpr>),
    /// Disjunction
    Or(Box<BoolExpr>, Box<BoolExpr>),
    /// Negation
    Not(Box<BoolExpr>),
}

/// Comparison of a clock difference against an integer expression
///
/// Represents `lhs - rhs (op) bound` where `rhs` may be the reference clock,
/// covering the forms `x op e` and `x - y op e`. `Ne` is not a convex
/// constraint and is rejected at declaration time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClockExpr {
    /// Left-hand side clock
    pub lhs: ClockId,
    /// Right-hand side clock, [`REFERENCE`] for single-clock comparisons
    pub rhs: ClockId,
    /// Comparison operator
    pub op: CmpOp,
    /// Integer operand, evaluated at transition time
    pub bound: IntExpr,
}

/// Atomic conjunct of a guard or invariant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// Constraint over integer variables, checked eagerly
    Int(BoolExpr),
    /// Constraint over clocks, emitted symbolically
    Clock(ClockExpr),
}

/// Failure of an eager integer evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalError {
    /// Division by zero in an integer expression
    DivisionByZero,
    /// Arithmetic overflow in an integer expression
    Overflow,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::Overflow => write!(f, "arithmetic overflow"),
        }
    }
}

impl std::error::Error for EvalError {}

/// Evaluation context for integer expressions
///
/// Bundles the current integer valuation, the fixed parameter values and the
/// stack of statement locals (innermost last).
#[derive(Debug, Clone, Copy)]
pub struct EvalCtx<'a> {
    /// Current values of the integer variables
    pub intval: &'a [i64],
    /// Fixed parameter values
    pub params: &'a [i64],
    /// Stack of statement locals
    pub locals: &'a [i64],
}

impl IntExpr {
    /// Evaluate the expression in the given context
    pub fn eval(&self, ctx: &EvalCtx<'_>) -> Result<i64, EvalError> {
        match self {
            IntExpr::Const(c) => Ok(*c),
            IntExpr::Var(v) => Ok(ctx.intval[v.0]),
            IntExpr::Param(p) => Ok(ctx.params[p.0]),
            IntExpr::Local(depth) => Ok(ctx.locals[ctx.locals.len() - 1 - depth]),
            IntExpr::Binary(lhs, op, rhs) => {
                let l = lhs.eval(ctx)?;
                let r = rhs.eval(ctx)?;
                let value = match op {
                    IntOp::Add => l.checked_add(r),
                    IntOp::Sub => l.checked_sub(r),
                    IntOp::Mul => l.checked_mul(r),
                    IntOp::Div => {
                        if r == 0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        l.checked_div(r)
                    }
                };
                value.ok_or(EvalError::Overflow)
            }
            IntExpr::Neg(e) => e.eval(ctx)?.checked_neg().ok_or(EvalError::Overflow),
        }
    }

    /// Conservative value range of the expression over the variable ranges
    ///
    /// Used by the LU-bound analysis: variables range over their declared
    /// interval, parameters over theirs, and locals are unknown (full range).
    /// The result may over-approximate but never under-approximates.
    pub fn value_range(
        &self,
        intvar_range: &dyn Fn(IntVarId) -> (i64, i64),
        param_range: &dyn Fn(ParamId) -> (i64, i64),
    ) -> (i64, i64) {
        match self {
            IntExpr::Const(c) => (*c, *c),
            IntExpr::Var(v) => intvar_range(*v),
            IntExpr::Param(p) => param_range(*p),
            IntExpr::Local(_) => (i64::MIN, i64::MAX),
            IntExpr::Binary(lhs, op, rhs) => {
                let (ll, lh) = lhs.value_range(intvar_range, param_range);
                let (rl, rh) = rhs.value_range(intvar_range, param_range);
                let corners: Vec<i64> = match op {
                    IntOp::Add => vec![ll.saturating_add(rl), lh.saturating_add(rh)],
                    IntOp::Sub => vec![ll.saturating_sub(rh), lh.saturating_sub(rl)],
                    IntOp::Mul => vec![
                        ll.saturating_mul(rl),
                        ll.saturating_mul(rh),
                        lh.saturating_mul(rl),
                        lh.saturating_mul(rh),
                    ],
                    IntOp::Div => {
                        // Quotient corners for all nonzero divisor corners;
                        // a divisor interval containing only zero divides
                        // nothing and keeps the full range.
                        let divisors: Vec<i64> =
                            [rl, rh, -1, 1].into_iter().filter(|d| *d != 0 && *d >= rl && *d <= rh).collect();
                        if divisors.is_empty() {
                            return (i64::MIN, i64::MAX);
                        }
                        divisors
                            .into_iter()
                            .flat_map(|d| [ll / d, lh / d])
                            .collect()
                    }
                };
                let lo = corners.iter().copied().min().unwrap_or(i64::MIN);
                let hi = corners.iter().copied().max().unwrap_or(i64::MAX);
                (lo, hi)
            }
            IntExpr::Neg(e) => {
                let (lo, hi) = e.value_range(intvar_range, param_range);
                (hi.saturating_neg(), lo.saturating_neg())
            }
        }
    }

    /// Collect the integer variables and parameters read by the expression
    pub fn collect_reads(&self, intvars: &mut Vec<IntVarId>, params: &mut Vec<ParamId>) {
        match self {
            IntExpr::Const(_) | IntExpr::Local(_) => {}
            IntExpr::Var(v) => intvars.push(*v),
            IntExpr::Param(p) => params.push(*p),
            IntExpr::Binary(lhs, _, rhs) => {
                lhs.collect_reads(intvars, params);
                rhs.collect_reads(intvars, params);
            }
            IntExpr::Neg(e) => e.collect_reads(intvars, params),
        }
    }
}

impl BoolExpr {
    /// Evaluate the expression in the given context
    pub fn eval(&self, ctx: &EvalCtx<'_>) -> Result<bool, EvalError> {
        match self {
            BoolExpr::True => Ok(true),
            BoolExpr::False => Ok(false),
            BoolExpr::Cmp(lhs, op, rhs) => {
                let l = lhs.eval(ctx)?;
                let r = rhs.eval(ctx)?;
                Ok(match op {
                    CmpOp::Lt => l < r,
                    CmpOp::Le => l <= r,
                    CmpOp::Eq => l == r,
                    CmpOp::Ne => l != r,
                    CmpOp::Ge => l >= r,
                    CmpOp::Gt => l > r,
                })
            }
            BoolExpr::And(lhs, rhs) => Ok(lhs.eval(ctx)? && rhs.eval(ctx)?),
            BoolExpr::Or(lhs, rhs) => Ok(lhs.eval(ctx)? || rhs.eval(ctx)?),
            BoolExpr::Not(e) => Ok(!e.eval(ctx)?),
        }
    }

    /// Collect the integer variables and parameters read by the expression
    pub fn collect_reads(&self, intvars: &mut Vec<IntVarId>, params: &mut Vec<ParamId>) {
        match self {
            BoolExpr::True | BoolExpr::False => {}
            BoolExpr::Cmp(lhs, _, rhs) => {
                lhs.collect_reads(intvars, params);
                rhs.collect_reads(intvars, params);
            }
            BoolExpr::And(lhs, rhs) | BoolExpr::Or(lhs, rhs) => {
                lhs.collect_reads(intvars, params);
                rhs.collect_reads(intvars, params);
            }
            BoolExpr::Not(e) => e.collect_reads(intvars, params),
        }
    }
}

impl ClockExpr {
    /// Create the comparison `x (op) bound`
    pub fn single(x: ClockId, op: CmpOp, bound: IntExpr) -> Self {
        ClockExpr {
            lhs: x,
            rhs: REFERENCE,
            op,
            bound,
        }
    }

    /// Create the comparison `x - y (op) bound`
    pub fn difference(x: ClockId, y: ClockId, op: CmpOp, bound: IntExpr) -> Self {
        ClockExpr {
            lhs: x,
            rhs: y,
            op,
            bound,
        }
    }

    /// Lower the comparison to atomic constraints, evaluating the integer
    /// operand in the given context
    ///
    /// `x - y <= c` and `x - y < c` lower to one constraint, `>=`/`>` to the
    /// mirrored constraint, and `==` to the pair of weak bounds.
    pub fn lower(
        &self,
        ctx: &EvalCtx<'_>,
        out: &mut Vec<ClockConstraint>,
    ) -> Result<(), EvalError> {
        let c = self.bound.eval(ctx)?;
        match self.op {
            CmpOp::Lt => out.push(ClockConstraint::new(self.lhs, self.rhs, Bound::lt(c))),
            CmpOp::Le => out.push(ClockConstraint::new(self.lhs, self.rhs, Bound::le(c))),
            CmpOp::Gt => out.push(ClockConstraint::new(self.rhs, self.lhs, Bound::lt(-c))),
            CmpOp::Ge => out.push(ClockConstraint::new(self.rhs, self.lhs, Bound::le(-c))),
            CmpOp::Eq => {
                out.push(ClockConstraint::new(self.lhs, self.rhs, Bound::le(c)));
                out.push(ClockConstraint::new(self.rhs, self.lhs, Bound::le(-c)));
            }
            CmpOp::Ne => unreachable!("disequality constraints are rejected at declaration"),
        }
        Ok(())
    }

    /// Record the constants of the comparison into the LU analysis
    ///
    /// The recorded constant is the extremal value the operand can evaluate
    /// to over the declared variable ranges, so the recorded bound is always
    /// at least as large as any constant the comparison produces at runtime.
    pub fn record_lu(
        &self,
        lu: &mut zora_dbm::LuBounds,
        intvar_range: &dyn Fn(IntVarId) -> (i64, i64),
        param_range: &dyn Fn(ParamId) -> (i64, i64),
    ) {
        let (lo, hi) = self.bound.value_range(intvar_range, param_range);
        let hi = hi.clamp(i64::MIN / 2, i64::MAX / 2);
        let lo = lo.clamp(i64::MIN / 2, i64::MAX / 2);
        match self.op {
            // lhs - rhs <= e: upper bound on lhs, lower bound -e on rhs
            CmpOp::Lt | CmpOp::Le => {
                if self.lhs != REFERENCE {
                    lu.update_upper(self.lhs, hi);
                }
                if self.rhs != REFERENCE {
                    lu.update_lower(self.rhs, -lo);
                }
            }
            // lhs - rhs >= e: lower bound on lhs, upper bound -e on rhs
            CmpOp::Gt | CmpOp::Ge => {
                if self.lhs != REFERENCE {
                    lu.update_lower(self.lhs, hi);
                }
                if self.rhs != REFERENCE {
                    lu.update_upper(self.rhs, -lo);
                }
            }
            CmpOp::Eq => {
                if self.lhs != REFERENCE {
                    lu.update_upper(self.lhs, hi);
                    lu.update_lower(self.lhs, hi);
                }
                if self.rhs != REFERENCE {
                    lu.update_lower(self.rhs, -lo);
                    lu.update_upper(self.rhs, -lo);
                }
            }
            CmpOp::Ne => unreachable!("disequality constraints are rejected at declaration"),
        }
    }
}

impl Constraint {
    /// Shorthand for an integer constraint
    pub fn int(expr: BoolExpr) -> Self {
        Constraint::Int(expr)
    }

    /// Shorthand for a clock constraint
    pub fn clock(expr: ClockExpr) -> Self {
        Constraint::Clock(expr)
    }
}

impl fmt::Display for IntOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntOp::Add => write!(f, "+"),
            IntOp::Sub => write!(f, "-"),
            IntOp::Mul => write!(f, "*"),
            IntOp::Div => write!(f, "/"),
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpOp::Lt => write!(f, "<"),
            CmpOp::Le => write!(f, "<="),
            CmpOp::Eq => write!(f, "=="),
            CmpOp::Ne => write!(f, "!="),
            CmpOp::Ge => write!(f, ">="),
            CmpOp::Gt => write!(f, ">"),
        }
    }
}

impl fmt::Display for IntExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntExpr::Const(c) => write!(f, "{c}"),
            IntExpr::Var(v) => write!(f, "v{v}"),
            IntExpr::Param(p) => write!(f, "p{p}"),
            IntExpr::Local(depth) => write!(f, "l{depth}"),
            IntExpr::Binary(lhs, op, rhs) => write!(f, "({lhs} {op} {rhs})"),
            IntExpr::Neg(e) => write!(f, "-{e}"),
        }
    }
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolExpr::True => write!(f, "true"),
            BoolExpr::False => write!(f, "false"),
            BoolExpr::Cmp(lhs, op, rhs) => write!(f, "{lhs} {op} {rhs}"),
            BoolExpr::And(lhs, rhs) => write!(f, "({lhs} && {rhs})"),
            BoolExpr::Or(lhs, rhs) => write!(f, "({lhs} || {rhs})"),
            BoolExpr::Not(e) => write!(f, "!{e}"),
        }
    }
}

impl fmt::Display for ClockExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rhs == REFERENCE {
            write!(f, "{} {} {}", self.lhs, self.op, self.bound)
        } else {
            write!(f, "{} - {} {} {}", self.lhs, self.rhs, self.op, self.bound)
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Int(e) => write!(f, "{e}"),
            Constraint::Clock(e) => write!(f, "{e}"),
        }
    }
}
