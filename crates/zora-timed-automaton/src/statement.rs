//! Update statements attached to edges
//!
//! A [`Statement`] is a sum type over the update shapes of an edge: integer
//! assignments, the clock reset forms, sequencing, conditionals, bounded
//! loops and local declarations. Integer effects are applied eagerly to the
//! valuation; clock effects are emitted as symbolic [`ClockReset`]s for the
//! zone layer. Every variant reports the variables it reads and writes, which
//! feeds the variable access analysis.

use std::fmt;

use zora_dbm::{ClockId, ClockReset, REFERENCE};

use crate::expressions::{BoolExpr, EvalCtx, EvalError, IntExpr};
use crate::{IntVarId, ParamId};

/// Update statement of an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Statement {
    /// No effect
    Nop,
    /// Integer assignment `var := value`
    IntAssign {
        /// Variable being assigned
        var: IntVarId,
        /// Right-hand side expression
        value: IntExpr,
    },
    /// Clock assignment `clock := base + value`
    ///
    /// With `base` the reference clock this is `clock := value`; a constant
    /// zero `value` makes it `clock := base`.
    ClockAssign {
        /// Clock being assigned
        clock: ClockId,
        /// Clock read on the right-hand side, possibly [`REFERENCE`]
        base: ClockId,
        /// Integer offset, evaluated eagerly
        value: IntExpr,
    },
    /// Sequential composition
    Seq(Vec<Statement>),
    /// Conditional statement
    If {
        /// Branching condition over integer variables
        condition: BoolExpr,
        /// Statement executed when the condition holds
        then_branch: Box<Statement>,
        /// Statement executed otherwise
        else_branch: Box<Statement>,
    },
    /// Loop over integer variables
    While {
        /// Loop condition over integer variables
        condition: BoolExpr,
        /// Loop body
        body: Box<Statement>,
    },
    /// Declaration of a read-only local, visible in `body` as
    /// [`IntExpr::Local`] with de Bruijn index 0
    Local {
        /// Initial value of the local
        init: IntExpr,
        /// Scope of the local
        body: Box<Statement>,
    },
}

/// Failure of a statement execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementError {
    /// An integer assignment left the declared range of the variable
    OutOfRange {
        /// Variable that was assigned
        var: IntVarId,
        /// Offending value
        value: i64,
    },
    /// An integer expression could not be evaluated
    Eval(EvalError),
    /// A loop exceeded the iteration budget derived from the integer state
    /// space
    Diverging,
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementError::OutOfRange { var, value } => {
                write!(f, "assignment of {value} to variable {var} leaves its declared range")
            }
            StatementError::Eval(e) => write!(f, "evaluation failed: {e}"),
            StatementError::Diverging => write!(f, "loop exceeded its iteration budget"),
        }
    }
}

impl std::error::Error for StatementError {}

impl From<EvalError> for StatementError {
    fn from(value: EvalError) -> Self {
        StatementError::Eval(value)
    }
}

/// Declared ranges of the integer variables, used for the range check on
/// assignment
pub trait IntVarRanges {
    /// Declared `(min, max)` range of the variable
    fn range(&self, var: IntVarId) -> (i64, i64);
}

/// Mutable execution state threaded through a statement run
pub struct ExecState<'a> {
    /// Integer valuation being updated
    pub intval: &'a mut [i64],
    /// Fixed parameter values
    pub params: &'a [i64],
    /// Stack of statement locals
    pub locals: Vec<i64>,
    /// Clock resets emitted so far, in execution order
    pub resets: &'a mut Vec<ClockReset>,
    /// Remaining loop iteration budget
    pub fuel: u64,
}

impl ExecState<'_> {
    fn ctx(&self) -> EvalCtx<'_> {
        EvalCtx {
            intval: self.intval,
            params: self.params,
            locals: &self.locals,
        }
    }
}

impl Statement {
    /// Execute the statement
    ///
    /// Integer assignments are applied to `state.intval` and range checked;
    /// clock assignments are appended to `state.resets` in execution order.
    pub fn execute(
        &self,
        ranges: &dyn IntVarRanges,
        state: &mut ExecState<'_>,
    ) -> Result<(), StatementError> {
        match self {
            Statement::Nop => Ok(()),
            Statement::IntAssign { var, value } => {
                let v = value.eval(&state.ctx())?;
                let (min, max) = ranges.range(*var);
                if v < min || v > max {
                    return Err(StatementError::OutOfRange { var: *var, value: v });
                }
                state.intval[var.0] = v;
                Ok(())
            }
            Statement::ClockAssign { clock, base, value } => {
                let v = value.eval(&state.ctx())?;
                state.resets.push(ClockReset::new(*clock, *base, v));
                Ok(())
            }
            Statement::Seq(statements) => {
                for s in statements {
                    s.execute(ranges, state)?;
                }
                Ok(())
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if condition.eval(&state.ctx())? {
                    then_branch.execute(ranges, state)
                } else {
                    else_branch.execute(ranges, state)
                }
            }
            Statement::While { condition, body } => {
                while condition.eval(&state.ctx())? {
                    if state.fuel == 0 {
                        return Err(StatementError::Diverging);
                    }
                    state.fuel -= 1;
                    body.execute(ranges, state)?;
                }
                Ok(())
            }
            Statement::Local { init, body } => {
                let v = init.eval(&state.ctx())?;
                state.locals.push(v);
                let result = body.execute(ranges, state);
                state.locals.pop();
                result
            }
        }
    }

    /// Record the variables the statement reads and writes
    pub fn collect_accesses(&self, acc: &mut VariableAccesses) {
        match self {
            Statement::Nop => {}
            Statement::IntAssign { var, value } => {
                acc.written_intvars.push(*var);
                value.collect_reads(&mut acc.read_intvars, &mut acc.read_params);
            }
            Statement::ClockAssign { clock, base, value } => {
                acc.written_clocks.push(*clock);
                if *base != REFERENCE {
                    acc.read_clocks.push(*base);
                }
                value.collect_reads(&mut acc.read_intvars, &mut acc.read_params);
            }
            Statement::Seq(statements) => {
                for s in statements {
                    s.collect_accesses(acc);
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_reads(&mut acc.read_intvars, &mut acc.read_params);
                then_branch.collect_accesses(acc);
                else_branch.collect_accesses(acc);
            }
            Statement::While { condition, body } => {
                condition.collect_reads(&mut acc.read_intvars, &mut acc.read_params);
                body.collect_accesses(acc);
            }
            Statement::Local { init, body } => {
                init.collect_reads(&mut acc.read_intvars, &mut acc.read_params);
                body.collect_accesses(acc);
            }
        }
    }
}

/// Variables read and written by a statement or expression
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VariableAccesses {
    /// Integer variables read
    pub read_intvars: Vec<IntVarId>,
    /// Integer variables written
    pub written_intvars: Vec<IntVarId>,
    /// Parameters read
    pub read_params: Vec<ParamId>,
    /// Clocks read
    pub read_clocks: Vec<ClockId>,
    /// Clocks written
    pub written_clocks: Vec<ClockId>,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Nop => write!(f, "nop"),
            Statement::IntAssign { var, value } => write!(f, "v{var} = {value}"),
            Statement::ClockAssign { clock, base, value } => {
                if *base == REFERENCE {
                    write!(f, "{clock} = {value}")
                } else {
                    write!(f, "{clock} = {base} + {value}")
                }
            }
            Statement::Seq(statements) => {
                let parts: Vec<String> = statements.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", parts.join("; "))
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "if ({condition}) {{ {then_branch} }} else {{ {else_branch} }}"),
            Statement::While { condition, body } => {
                write!(f, "while ({condition}) {{ {body} }}")
            }
            Statement::Local { init, body } => write!(f, "local = {init}; {body}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ranges;
    impl IntVarRanges for Ranges {
        fn range(&self, _: IntVarId) -> (i64, i64) {
            (0, 3)
        }
    }

    fn run(statement: &Statement, intval: &mut [i64]) -> Result<Vec<ClockReset>, StatementError> {
        let mut resets = Vec::new();
        let mut state = ExecState {
            intval,
            params: &[],
            locals: Vec::new(),
            resets: &mut resets,
            fuel: 100,
        };
        statement.execute(&Ranges, &mut state)?;
        Ok(resets)
    }

    #[test]
    fn test_int_assign_in_range() {
        let s = Statement::IntAssign {
            var: IntVarId(0),
            value: IntExpr::Const(2),
        };
        let mut intval = [0];
        assert!(run(&s, &mut intval).is_ok());
        assert_eq!(intval, [2]);
    }

    #[test]
    fn test_int_assign_out_of_range() {
        let s = Statement::IntAssign {
            var: IntVarId(0),
            value: IntExpr::Binary(
                Box::new(IntExpr::Var(IntVarId(0))),
                crate::expressions::IntOp::Add,
                Box::new(IntExpr::Const(1)),
            ),
        };
        let mut intval = [3];
        assert_eq!(
            run(&s, &mut intval),
            Err(StatementError::OutOfRange {
                var: IntVarId(0),
                value: 4
            })
        );
        // the valuation is untouched on failure
        assert_eq!(intval, [3]);
    }

    #[test]
    fn test_clock_assigns_are_emitted_in_order() {
        let x = ClockId(1);
        let y = ClockId(2);
        let s = Statement::Seq(vec![
            Statement::ClockAssign {
                clock: x,
                base: REFERENCE,
                value: IntExpr::Const(0),
            },
            Statement::ClockAssign {
                clock: y,
                base: x,
                value: IntExpr::Const(1),
            },
        ]);
        let mut intval = [0];
        let resets = run(&s, &mut intval).unwrap();
        assert_eq!(
            resets,
            vec![ClockReset::to_value(x, 0), ClockReset::new(y, x, 1)]
        );
    }

    #[test]
    fn test_if_branches() {
        let s = Statement::If {
            condition: BoolExpr::Cmp(
                Box::new(IntExpr::Var(IntVarId(0))),
                crate::expressions::CmpOp::Eq,
                Box::new(IntExpr::Const(0)),
            ),
            then_branch: Box::new(Statement::IntAssign {
                var: IntVarId(0),
                value: IntExpr::Const(1),
            }),
            else_branch: Box::new(Statement::IntAssign {
                var: IntVarId(0),
                value: IntExpr::Const(2),
            }),
        };

        let mut intval = [0];
        run(&s, &mut intval).unwrap();
        assert_eq!(intval, [1]);

        let mut intval = [1];
        run(&s, &mut intval).unwrap();
        assert_eq!(intval, [2]);
    }

    #[test]
    fn test_while_loop_terminates() {
        // while (v < 3) v = v + 1
        let s = Statement::While {
            condition: BoolExpr::Cmp(
                Box::new(IntExpr::Var(IntVarId(0))),
                crate::expressions::CmpOp::Lt,
                Box::new(IntExpr::Const(3)),
            ),
            body: Box::new(Statement::IntAssign {
                var: IntVarId(0),
                value: IntExpr::Binary(
                    Box::new(IntExpr::Var(IntVarId(0))),
                    crate::expressions::IntOp::Add,
                    Box::new(IntExpr::Const(1)),
                ),
            }),
        };
        let mut intval = [0];
        run(&s, &mut intval).unwrap();
        assert_eq!(intval, [3]);
    }

    #[test]
    fn test_diverging_while_runs_out_of_fuel() {
        let s = Statement::While {
            condition: BoolExpr::True,
            body: Box::new(Statement::Nop),
        };
        let mut intval = [0];
        assert_eq!(run(&s, &mut intval), Err(StatementError::Diverging));
    }

    #[test]
    fn test_local_scoping() {
        // local = v + 1; v = local
        let s = Statement::Local {
            init: IntExpr::Binary(
                Box::new(IntExpr::Var(IntVarId(0))),
                crate::expressions::IntOp::Add,
                Box::new(IntExpr::Const(1)),
            ),
            body: Box::new(Statement::IntAssign {
                var: IntVarId(0),
                value: IntExpr::Local(0),
            }),
        };
        let mut intval = [1];
        run(&s, &mut intval).unwrap();
        assert_eq!(intval, [2]);
    }

    #[test]
    fn test_collect_accesses() {
        let s = Statement::Seq(vec![
            Statement::IntAssign {
                var: IntVarId(0),
                value: IntExpr::Var(IntVarId(1)),
            },
            Statement::ClockAssign {
                clock: ClockId(1),
                base: ClockId(2),
                value: IntExpr::Param(ParamId(0)),
            },
        ]);
        let mut acc = VariableAccesses::default();
        s.collect_accesses(&mut acc);
        assert_eq!(acc.written_intvars, vec![IntVarId(0)]);
        assert_eq!(acc.read_intvars, vec![IntVarId(1)]);
        assert_eq!(acc.written_clocks, vec![ClockId(1)]);
        assert_eq!(acc.read_clocks, vec![ClockId(2)]);
        assert_eq!(acc.read_params, vec![ParamId(0)]);
    }
}
