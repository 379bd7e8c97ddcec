use ndarray::{Array1, Zip};

use crate::{Cmaes, CmaesError, Result};

// ------------------------------ Tell step ------------------------------

impl Cmaes {
    pub(crate) fn tell(&mut self, fitness: &[f64]) -> Result<()> {
        if self.shut_down {
            return Err(CmaesError::ShutDown);
        }
        if !self.sampled {
            return Err(CmaesError::NotSampled);
        }
        let lambda = self.params.lambda;
        if fitness.len() != lambda {
            return Err(CmaesError::FitnessLengthMismatch {
                expected: lambda,
                got: fitness.len(),
            });
        }
        if let Some((index, &value)) = fitness.iter().enumerate().find(|(_, f)| !f.is_finite()) {
            return Err(CmaesError::NonFiniteFitness { index, value });
        }

        let n = self.params.n;
        let mu = self.params.mu;

        let mut order: Vec<usize> = (0..lambda).collect();
        order.sort_by(|&a, &b| fitness[a].total_cmp(&fitness[b]));

        self.evaluations += lambda;
        self.generation += 1;
        self.sampled = false;

        let best = order[0];
        self.current_f = fitness[best];
        self.current_x = self.population.row(best).to_owned();
        if self.current_f < self.best_f {
            self.best_f = self.current_f;
            self.best_x = self.current_x.clone();
        }
        self.fitness = Array1::from_iter(order.iter().map(|&k| fitness[k]));
        self.history.push_front(self.current_f);
        let hist_len = self.params.history_len();
        while self.history.len() > hist_len {
            self.history.pop_back();
        }

        // steps of the selected parents, in units of sigma
        let x_old = self.mean.clone();
        let steps: Vec<Array1<f64>> = order[..mu]
            .iter()
            .map(|&k| (&self.population.row(k) - &x_old) / self.sigma)
            .collect();

        let mut y_w = Array1::<f64>::zeros(n);
        for (w, y) in self.params.weights.iter().zip(steps.iter()) {
            y_w.scaled_add(*w, y);
        }
        self.mean = &x_old + &(&y_w * self.sigma);

        // C^{-1/2} y_w = B D^{-1} B^T y_w
        let bt_y = self.b.t().dot(&y_w);
        let inv_sqrt = self.b.dot(&(&bt_y / &self.d));

        let c_s = self.params.c_sigma;
        let mu_eff = self.params.mu_eff;
        let ps_factor = (c_s * (2.0 - c_s) * mu_eff).sqrt();
        Zip::from(&mut self.p_sigma)
            .and(&inv_sqrt)
            .for_each(|p, &v| *p = (1.0 - c_s) * *p + ps_factor * v);

        let ps_norm = self.p_sigma.dot(&self.p_sigma).sqrt();
        let decay = 1.0 - (1.0 - c_s).powi(2 * self.generation as i32);
        let h_sigma = if ps_norm / decay.max(f64::MIN_POSITIVE).sqrt() / self.params.chi_n
            < 1.4 + 2.0 / (n as f64 + 1.0)
        {
            1.0
        } else {
            0.0
        };

        let c_c = self.params.c_c;
        let pc_factor = h_sigma * (c_c * (2.0 - c_c) * mu_eff).sqrt();
        Zip::from(&mut self.p_c)
            .and(&y_w)
            .for_each(|p, &v| *p = (1.0 - c_c) * *p + pc_factor * v);

        let c_1 = self.params.c_1;
        let c_mu = self.params.c_mu;
        let delta_h = (1.0 - h_sigma) * c_c * (2.0 - c_c);
        let keep = 1.0 - c_1 - c_mu + c_1 * delta_h;
        for i in 0..n {
            for j in 0..=i {
                let mut rank_mu = 0.0;
                for (w, y) in self.params.weights.iter().zip(steps.iter()) {
                    rank_mu += w * y[i] * y[j];
                }
                let v = keep * self.cov[[i, j]]
                    + c_1 * self.p_c[i] * self.p_c[j]
                    + c_mu * rank_mu;
                self.cov[[i, j]] = v;
                self.cov[[j, i]] = v;
            }
        }

        let exponent = (c_s / self.params.d_sigma) * (ps_norm / self.params.chi_n - 1.0);
        self.sigma *= exponent.min(1.0).exp();

        Ok(())
    }
}
