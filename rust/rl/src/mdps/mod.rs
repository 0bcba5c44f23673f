pub mod action;
pub mod empirical;
pub mod mdp;
#[cfg(test)]
pub mod simple_golf;
pub mod solvers;
