use crate::error::{check_action, check_state, Result};
use crate::mdps::{action::Action, solvers::policy::GreedyPolicy};
use gymnasium::{Continous, Discrete};

/// Tabular one-step Q-learning.
///
/// Ref: Sutton & Barto 2018, section 6.5.
#[derive(Debug, Clone)]
pub struct QTable {
    n_s: usize,
    n_a: usize,
    alpha: Continous,
    gamma: Continous,
    q: Vec<Continous>,
    updated: Vec<bool>,
}

impl QTable {
    pub fn new(n_s: usize, n_a: usize, alpha: Continous, gamma: Continous) -> Self {
        Self {
            n_s,
            n_a,
            alpha,
            gamma,
            q: vec![0.; n_s * n_a],
            updated: vec![false; n_s],
        }
    }

    pub fn n_s(&self) -> usize {
        self.n_s
    }

    pub fn n_a(&self) -> usize {
        self.n_a
    }

    pub fn q(&self, s: Discrete, a: Discrete) -> Continous {
        self.q[s as usize * self.n_a + a as usize]
    }

    /// Highest action value in `s` and the first action reaching it.
    pub fn best_value_and_action(&self, s: Discrete) -> (Continous, Discrete) {
        let row = &self.q[s as usize * self.n_a..(s as usize + 1) * self.n_a];
        let mut best = (row[0], 0);
        for (a, &q) in row.iter().enumerate().skip(1) {
            if q > best.0 {
                best = (q, a as Discrete);
            }
        }

        best
    }

    /// `Q(s,a) += alpha * (r + gamma * max_a' Q(s',a') - Q(s,a))`; terminal steps do not bootstrap.
    pub fn value_update(
        &mut self,
        s: Discrete,
        a: Discrete,
        r: Continous,
        s1: Discrete,
        terminal: bool,
    ) -> Result<()> {
        check_state(s, self.n_s)?;
        check_action(a, self.n_a)?;
        check_state(s1, self.n_s)?;

        let target = if terminal {
            r
        } else {
            r + self.gamma * self.best_value_and_action(s1).0
        };
        let i = s as usize * self.n_a + a as usize;
        self.q[i] += self.alpha * (target - self.q[i]);
        self.updated[s as usize] = true;

        Ok(())
    }

    /// `max_a Q(s, a)` for every state.
    pub fn state_values(&self) -> Vec<Continous> {
        (0..self.n_s as Discrete)
            .map(|s| self.best_value_and_action(s).0)
            .collect()
    }

    /// Greedy action per state; states never updated get none.
    pub fn greedy_policy(&self) -> GreedyPolicy {
        let actions = (0..self.n_s as Discrete)
            .map(|s| {
                self.updated[s as usize]
                    .then(|| Action::try_from(self.best_value_and_action(s).1).ok())
                    .flatten()
            })
            .collect();

        GreedyPolicy::new(actions)
    }
}
