use ndarray::Array1;

/// Default population size for a problem of dimension `n`: `4 + floor(3 ln n)`.
pub fn default_lambda(n: usize) -> usize {
    4 + (3.0 * (n.max(1) as f64).ln()).floor() as usize
}

/// Static strategy parameters derived from dimension and population size.
///
/// Follows the default settings of Hansen, "The CMA Evolution Strategy: A
/// Tutorial" (2016), with positive log-linear recombination weights.
#[derive(Debug, Clone)]
pub struct StrategyParameters {
    /// Problem dimension
    pub n: usize,
    /// Population size (λ)
    pub lambda: usize,
    /// Number of parents (μ)
    pub mu: usize,
    /// Recombination weights, sum to one
    pub weights: Array1<f64>,
    /// Variance effective selection mass
    pub mu_eff: f64,
    /// Cumulation constant for the step-size path
    pub c_sigma: f64,
    /// Damping for step-size adaptation
    pub d_sigma: f64,
    /// Cumulation constant for the rank-one path
    pub c_c: f64,
    /// Learning rate of the rank-one update
    pub c_1: f64,
    /// Learning rate of the rank-μ update
    pub c_mu: f64,
    /// Expected norm of a N(0, I) vector
    pub chi_n: f64,
}

impl StrategyParameters {
    /// Derive all parameters for dimension `n` and population `lambda`.
    pub fn new(n: usize, lambda: usize) -> Self {
        let nf = n as f64;
        let mu = (lambda / 2).max(1);

        let raw: Vec<f64> = (0..mu)
            .map(|i| (mu as f64 + 0.5).ln() - ((i + 1) as f64).ln())
            .collect();
        let sum: f64 = raw.iter().sum();
        let weights = Array1::from_iter(raw.into_iter().map(|w| w / sum));
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let c_sigma = (mu_eff + 2.0) / (nf + mu_eff + 5.0);
        let d_sigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (nf + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let c_c = (4.0 + mu_eff / nf) / (nf + 4.0 + 2.0 * mu_eff / nf);
        let c_1 = 2.0 / ((nf + 1.3).powi(2) + mu_eff);
        let c_mu =
            (2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((nf + 2.0).powi(2) + mu_eff)).min(1.0 - c_1);
        let chi_n = nf.sqrt() * (1.0 - 1.0 / (4.0 * nf) + 1.0 / (21.0 * nf * nf));

        Self {
            n,
            lambda,
            mu,
            weights,
            mu_eff,
            c_sigma,
            d_sigma,
            c_c,
            c_1,
            c_mu: c_mu.max(0.0),
            chi_n,
        }
    }

    /// Number of generations between two eigen-decompositions.
    pub fn eigen_gap(&self) -> usize {
        let gap = self.lambda as f64 / ((self.c_1 + self.c_mu) * self.n as f64 * 10.0);
        (gap.floor() as usize).max(1)
    }

    /// Length of the best-fitness history used by the `TolFun` tests.
    pub fn history_len(&self) -> usize {
        10 + (30.0 * self.n as f64 / self.lambda as f64).ceil() as usize
    }
}
