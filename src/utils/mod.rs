pub mod convergence;
pub mod linalg;
