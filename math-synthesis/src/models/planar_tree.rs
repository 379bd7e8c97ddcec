//! Planar articulated tree with revolute joints.
//!
//! Every link hangs off the end of its parent link (or off the fixed base at
//! the origin) through a revolute joint. For each frame the joint angles are
//! prescribed; the synthesis parameters are the link lengths followed by a
//! constant angle offset per joint. Selected links are end effectors: each
//! one is a branch of the tree whose tip must pass through a target point in
//! every frame.

use std::f64::consts::{PI, TAU};

use ndarray::{Array1, Array2, ArrayView1, array, s};

use crate::error::{Result, SynthesisError};
use crate::model::{Bounds, SynthesisModel};

/// Wrap an angle into `(-pi, pi]`.
fn wrap_angle(a: f64) -> f64 {
    if a > -PI && a <= PI {
        return a;
    }
    let w = (a + PI).rem_euclid(TAU) - PI;
    if w <= -PI { w + TAU } else { w }
}

/// Planar articulated tree, see the module documentation.
#[derive(Debug, Clone)]
pub struct PlanarTree {
    /// Links from the base to each effector, base first
    branches: Vec<Vec<usize>>,
    /// Prescribed joint angles, `frames x links`
    angles: Array2<f64>,
    /// Target tip positions, row `frame * branches + branch`
    targets: Array2<f64>,
    lengths: Array1<f64>,
    offsets: Array1<f64>,
    /// Tip positions of the last `calc`, same layout as `targets`
    tips: Array2<f64>,
    params: Array1<f64>,
    bounds: Bounds,
    analytic: bool,
}

impl PlanarTree {
    /// Build a tree.
    ///
    /// - `parents[k]` is the link `k` hangs from, `None` for the base; a
    ///   parent must come before its child;
    /// - `effectors` are the links whose tips are constrained;
    /// - `angles` holds the prescribed joint angles, one row per frame;
    /// - `targets` holds one `(x, y)` row per frame and effector, frame major;
    /// - `bounds` covers the lengths then the offsets.
    ///
    /// The model starts mapped at the centre of the bounds.
    pub fn new(
        parents: &[Option<usize>],
        effectors: &[usize],
        angles: Array2<f64>,
        targets: Array2<f64>,
        bounds: Bounds,
    ) -> Result<Self> {
        let links = parents.len();
        let invalid = |reason: String| SynthesisError::InvalidModel { reason };

        if links == 0 || effectors.is_empty() {
            return Err(SynthesisError::EmptyModel {
                dim: 2 * links,
                residuals: 2 * angles.nrows() * effectors.len(),
            });
        }
        for (k, parent) in parents.iter().enumerate() {
            if let Some(p) = *parent {
                if p >= k {
                    return Err(invalid(format!("link {} hangs from later link {}", k, p)));
                }
            }
        }
        if let Some(&e) = effectors.iter().find(|&&e| e >= links) {
            return Err(invalid(format!("effector {} is not a link", e)));
        }
        if angles.ncols() != links || angles.nrows() == 0 {
            return Err(invalid(format!(
                "angles must be frames x {}, got {:?}",
                links,
                angles.dim()
            )));
        }
        let rows = angles.nrows() * effectors.len();
        if targets.dim() != (rows, 2) {
            return Err(invalid(format!(
                "targets must be {} x 2, got {:?}",
                rows,
                targets.dim()
            )));
        }
        if bounds.len() != 2 * links {
            return Err(SynthesisError::BoundsMismatch {
                lower_len: bounds.len(),
                upper_len: 2 * links,
            });
        }

        let branches = effectors
            .iter()
            .map(|&e| {
                let mut path = vec![e];
                let mut link = e;
                while let Some(p) = parents[link] {
                    path.push(p);
                    link = p;
                }
                path.reverse();
                path
            })
            .collect();

        let centre = bounds.centre();
        let mut tree = Self {
            branches,
            angles,
            tips: Array2::zeros(targets.dim()),
            targets,
            lengths: Array1::zeros(links),
            offsets: Array1::zeros(links),
            params: Array1::zeros(2 * links),
            bounds,
            analytic: true,
        };
        tree.map_from_x(centre.view());
        tree.sync_params();
        Ok(tree)
    }

    /// Four-link tree with a shared trunk and two effectors, whose targets
    /// are reached exactly by [`demo_solution`](Self::demo_solution).
    ///
    /// ```text
    /// base - 0 - 1 -+- 2 (effector)
    ///               +- 3 (effector)
    /// ```
    ///
    /// The model is left mapped at the solution.
    pub fn two_branch_demo() -> Self {
        let parents = [None, Some(0), Some(1), Some(1)];
        let effectors = [2, 3];
        let frames = 12;
        let amplitude = [0.6, 0.9, 0.5, 0.7];
        let phase = [0.0, 1.1, 2.3, 0.4];
        let angles = Array2::from_shape_fn((frames, parents.len()), |(f, k)| {
            amplitude[k] * (TAU * f as f64 / frames as f64 + phase[k]).sin()
        });

        let mut lower = Array1::from_elem(8, -PI);
        let mut upper = Array1::from_elem(8, PI);
        lower.slice_mut(s![..4]).fill(0.2);
        upper.slice_mut(s![..4]).fill(2.0);

        let mut tree = Self {
            branches: vec![vec![0, 1, 2], vec![0, 1, 3]],
            angles,
            targets: Array2::zeros((frames * effectors.len(), 2)),
            tips: Array2::zeros((frames * effectors.len(), 2)),
            lengths: Array1::zeros(parents.len()),
            offsets: Array1::zeros(parents.len()),
            params: Array1::zeros(8),
            bounds: Bounds { lower, upper },
            analytic: true,
        };
        tree.map_from_x(Self::demo_solution().view());
        tree.calc();
        tree.targets = tree.tips.clone();
        tree.sync_params();
        tree
    }

    /// Parameters that reach the targets of [`two_branch_demo`](Self::two_branch_demo).
    pub fn demo_solution() -> Array1<f64> {
        array![1.0, 0.8, 0.5, 0.6, 0.3, -0.4, 0.8, -0.9]
    }

    /// Drop the analytic Jacobian so refiners fall back to finite differences.
    pub fn without_jacobian(mut self) -> Self {
        self.analytic = false;
        self
    }

    /// Number of links.
    pub fn links(&self) -> usize {
        self.lengths.len()
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.angles.nrows()
    }

    /// Tip positions of the last `calc`, one row per frame and effector.
    pub fn tips(&self) -> &Array2<f64> {
        &self.tips
    }

    /// Cumulative absolute angle of every link on `path` in `frame`.
    fn path_angles(&self, frame: usize, path: &[usize]) -> Vec<f64> {
        let mut phi = 0.0;
        path.iter()
            .map(|&k| {
                phi += self.angles[[frame, k]] + self.offsets[k];
                phi
            })
            .collect()
    }
}

impl SynthesisModel for PlanarTree {
    fn dim(&self) -> usize {
        2 * self.links()
    }

    fn residual_dim(&self) -> usize {
        2 * self.targets.nrows()
    }

    fn bounds(&self) -> Option<Bounds> {
        Some(self.bounds.clone())
    }

    fn map_to_x(&self, x: &mut Array1<f64>) {
        let n = self.links();
        x.slice_mut(s![..n]).assign(&self.lengths);
        for (xi, &o) in x.slice_mut(s![n..]).iter_mut().zip(self.offsets.iter()) {
            *xi = wrap_angle(o);
        }
    }

    fn map_from_x(&mut self, x: ArrayView1<f64>) {
        let n = self.links();
        self.lengths.assign(&x.slice(s![..n]));
        self.offsets.assign(&x.slice(s![n..]));
    }

    fn map_to_fvec(&self, fvec: &mut Array1<f64>) {
        for (r, (tip, target)) in self.tips.rows().into_iter().zip(self.targets.rows()).enumerate() {
            fvec[2 * r] = tip[0] - target[0];
            fvec[2 * r + 1] = tip[1] - target[1];
        }
    }

    fn calc(&mut self) {
        let nb = self.branches.len();
        for frame in 0..self.frames() {
            for (b, path) in self.branches.iter().enumerate() {
                let phis = self.path_angles(frame, path);
                let (mut px, mut py) = (0.0, 0.0);
                for (&k, phi) in path.iter().zip(phis) {
                    px += self.lengths[k] * phi.cos();
                    py += self.lengths[k] * phi.sin();
                }
                let row = frame * nb + b;
                self.tips[[row, 0]] = px;
                self.tips[[row, 1]] = py;
            }
        }
    }

    fn params(&self) -> &Array1<f64> {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Array1<f64> {
        &mut self.params
    }

    fn jacobian(&mut self) -> Option<Array2<f64>> {
        if !self.analytic {
            return None;
        }
        let n = self.links();
        let nb = self.branches.len();
        let mut jac = Array2::zeros((self.residual_dim(), self.dim()));

        for frame in 0..self.frames() {
            for (b, path) in self.branches.iter().enumerate() {
                let phis = self.path_angles(frame, path);
                let row = 2 * (frame * nb + b);
                // an offset turns every link from its joint to the tip
                let (mut ax, mut ay) = (0.0, 0.0);
                for (&k, &phi) in path.iter().zip(phis.iter()).rev() {
                    let (sin, cos) = phi.sin_cos();
                    jac[[row, k]] = cos;
                    jac[[row + 1, k]] = sin;
                    ax -= self.lengths[k] * sin;
                    ay += self.lengths[k] * cos;
                    jac[[row, n + k]] = ax;
                    jac[[row + 1, n + k]] = ay;
                }
            }
        }
        Some(jac)
    }
}
