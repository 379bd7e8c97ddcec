use std::fmt;

use crate::Cmaes;

/// Reason reported by the strategy's own termination test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerminationReason {
    /// The evaluation budget `stop_max_fun_evals` is used up.
    MaxFunEvals(usize),
    /// The generation budget `stop_max_iter` is used up.
    MaxIter(usize),
    /// Fitness range of the current generation and recent history below `tol_fun`.
    TolFun(f64),
    /// Range of the best-fitness history below `tol_hist_fun`.
    TolHistFun(f64),
    /// All coordinate standard deviations below `tol_x`.
    TolX(f64),
    /// Step size grew by more than `tol_up_sigma`; the initial sigma was probably too small.
    TolUpSigma(f64),
    /// Condition number of the covariance matrix exceeds the limit.
    ConditionCov(f64),
    /// Adding 0.1 standard deviation along a principal axis leaves the mean unchanged.
    NoEffectAxis(usize),
    /// Adding 0.2 standard deviation along a coordinate leaves the mean unchanged.
    NoEffectCoord(usize),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::MaxFunEvals(n) => {
                write!(f, "MaxFunEvals: reached {} function evaluations", n)
            }
            TerminationReason::MaxIter(n) => write!(f, "MaxIter: reached {} iterations", n),
            TerminationReason::TolFun(t) => write!(f, "TolFun: function value range < {:.1e}", t),
            TerminationReason::TolHistFun(t) => {
                write!(f, "TolHistFun: history of best values range < {:.1e}", t)
            }
            TerminationReason::TolX(t) => write!(f, "TolX: object variable changes < {:.1e}", t),
            TerminationReason::TolUpSigma(t) => {
                write!(f, "TolUpSigma: sigma increased by more than {:.1e}", t)
            }
            TerminationReason::ConditionCov(c) => {
                write!(f, "ConditionCov: condition number {:.2e} too large", c)
            }
            TerminationReason::NoEffectAxis(i) => {
                write!(f, "NoEffectAxis: standard deviation 0.1*sigma*D[{}] has no effect", i)
            }
            TerminationReason::NoEffectCoord(i) => {
                write!(f, "NoEffectCoord: standard deviation 0.2*sigma*sqrt(C[{0},{0}]) has no effect", i)
            }
        }
    }
}

impl Cmaes {
    pub(crate) fn termination_reason(&self) -> Option<TerminationReason> {
        let cfg = &self.config;

        if cfg.stop_max_fun_evals > 0 && self.evaluations >= cfg.stop_max_fun_evals {
            return Some(TerminationReason::MaxFunEvals(cfg.stop_max_fun_evals));
        }
        if cfg.stop_max_iter > 0 && self.generation >= cfg.stop_max_iter {
            return Some(TerminationReason::MaxIter(cfg.stop_max_iter));
        }
        if self.generation == 0 {
            return None;
        }

        let n = self.params.n;

        // current generation fitness together with the recent best values
        let (mut lo, mut hi) = self
            .fitness
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &f| {
                (lo.min(f), hi.max(f))
            });
        let (hist_lo, hist_hi) = self
            .history
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &f| {
                (lo.min(f), hi.max(f))
            });
        if self.history.len() >= self.params.history_len() && hist_hi - hist_lo < cfg.tol_hist_fun
        {
            return Some(TerminationReason::TolHistFun(cfg.tol_hist_fun));
        }
        lo = lo.min(hist_lo);
        hi = hi.max(hist_hi);
        if hi - lo <= cfg.tol_fun {
            return Some(TerminationReason::TolFun(cfg.tol_fun));
        }

        let tol_x = cfg.tol_x.unwrap_or(1e-11 * self.sigma0);
        if (0..n).all(|i| {
            self.sigma * self.p_c[i].abs().max(self.cov[[i, i]].sqrt()) < tol_x
        }) {
            return Some(TerminationReason::TolX(tol_x));
        }

        let d_max = self.d.iter().cloned().fold(0.0, f64::max);
        let d_min = self.d.iter().cloned().fold(f64::INFINITY, f64::min);
        if self.sigma / self.sigma0 > cfg.tol_up_sigma * d_max {
            return Some(TerminationReason::TolUpSigma(cfg.tol_up_sigma));
        }

        let condition = if d_min > 0.0 {
            (d_max / d_min).powi(2)
        } else {
            f64::INFINITY
        };
        if condition > cfg.max_condition {
            return Some(TerminationReason::ConditionCov(condition));
        }

        let axis = self.generation % n;
        let scale = 0.1 * self.sigma * self.d[axis];
        if (0..n).all(|i| self.mean[i] == self.mean[i] + scale * self.b[[i, axis]]) {
            return Some(TerminationReason::NoEffectAxis(axis));
        }

        for i in 0..n {
            if self.mean[i] == self.mean[i] + 0.2 * self.sigma * self.cov[[i, i]].sqrt() {
                return Some(TerminationReason::NoEffectCoord(i));
            }
        }

        None
    }
}
