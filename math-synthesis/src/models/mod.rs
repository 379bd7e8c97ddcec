//! Demo kinematic models used by the CLI and the tests.

mod planar_tree;
mod quadratic;

pub use planar_tree::PlanarTree;
pub use quadratic::QuadraticModel;
