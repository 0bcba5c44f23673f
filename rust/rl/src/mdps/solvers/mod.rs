pub mod policy;
pub mod value_iteration;

use gymnasium::{Continous, Discrete};

pub trait MdpSolver {
    fn v_star(&self, s: Discrete) -> Continous;

    /// `None` for terminal states and for actions the MDP knows nothing about.
    fn q_star(&self, s: Discrete, a: Discrete) -> Option<Continous>;

    fn pi_star(&self, s: Discrete) -> Option<Discrete>;

    /// Runs until the largest change in a sweep drops below `theta` or
    /// `num_iterations` sweeps are done. Returns (converged, sweeps).
    fn exec(&mut self, theta: Option<Continous>, num_iterations: Option<usize>) -> (bool, usize);
}
