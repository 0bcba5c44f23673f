use gymnasium::*;

/// Markov Decision Process - Sutton & Barto 2018.
///
/// Rewards ride on transitions. Terminal states are absorbing and their value
/// is pinned to [`Mdp::terminal_value`].
pub trait Mdp {
    fn n_s(&self) -> usize;

    fn n_a(&self) -> usize;

    /// Outcomes of taking `a` in `s`, or `None` when nothing is known about the pair.
    fn transitions(&self, s: Discrete, a: Discrete) -> Option<Vec<Transition>>;

    fn terminal_value(&self, s: Discrete) -> Option<Continous>;
}

/// An MDP with fully known dynamics, e.g. the ground truth reported by an environment.
pub struct TabularMdp {
    n_s: usize,
    n_a: usize,
    transitions: Transitions,
}

impl TabularMdp {
    pub fn new(n_s: usize, n_a: usize, transitions: Transitions) -> Self {
        Self {
            n_s,
            n_a,
            transitions,
        }
    }
}

impl Mdp for TabularMdp {
    fn n_s(&self) -> usize {
        self.n_s
    }

    fn n_a(&self) -> usize {
        self.n_a
    }

    fn transitions(&self, s: Discrete, a: Discrete) -> Option<Vec<Transition>> {
        self.transitions.get(&(s, a)).cloned()
    }

    // A state is terminal when every way out of it is a `done` self-loop.
    fn terminal_value(&self, s: Discrete) -> Option<Continous> {
        let absorbing = (0..self.n_a as Discrete).all(|a| {
            self.transitions.get(&(s, a)).map_or(false, |ts| {
                ts.iter().all(|t| t.done && t.next_state == s)
            })
        });

        absorbing.then_some(0.)
    }
}
