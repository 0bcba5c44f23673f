use super::MdpSolver;
use crate::mdps::mdp::Mdp;
use gymnasium::{Continous, Discrete};

/// Value iteration with in-place sweeps.
///
/// Ref: Sutton & Barto 2018, section 4.4.
pub struct ValueIteration<'a, M: Mdp + ?Sized> {
    mdp: &'a M,
    gamma: Continous,
    v: Vec<Continous>,
}

impl<'a, M: Mdp + ?Sized> ValueIteration<'a, M> {
    pub fn new(mdp: &'a M, gamma: Continous) -> Self {
        Self {
            mdp,
            gamma,
            v: vec![0.; mdp.n_s()],
        }
    }

    pub fn values(&self) -> &[Continous] {
        &self.v
    }

    pub fn into_values(self) -> Vec<Continous> {
        self.v
    }

    /// One Bellman optimality pass over every state. Returns the largest change.
    pub fn sweep(&mut self) -> Continous {
        let mut delta: Continous = 0.;
        for s in 0..self.mdp.n_s() as Discrete {
            let v = match self.mdp.terminal_value(s) {
                Some(r) => r,
                None => match self.best_action(s) {
                    Some((_, q)) => q,
                    // Nothing sampled out of `s` yet.
                    None => continue,
                },
            };

            let slot = &mut self.v[s as usize];
            delta = delta.max((v - *slot).abs());
            *slot = v;
        }

        delta
    }

    fn best_action(&self, s: Discrete) -> Option<(Discrete, Continous)> {
        let mut best: Option<(Discrete, Continous)> = None;
        for a in 0..self.mdp.n_a() as Discrete {
            if let Some(q) = self.q_value(s, a) {
                if best.map_or(true, |(_, b)| q > b) {
                    best = Some((a, q));
                }
            }
        }

        best
    }

    fn q_value(&self, s: Discrete, a: Discrete) -> Option<Continous> {
        let ts = self.mdp.transitions(s, a)?;

        Some(
            ts.iter()
                .map(|t| t.probability * (t.reward + self.gamma * self.v[t.next_state as usize]))
                .sum(),
        )
    }
}

impl<'a, M: Mdp + ?Sized> MdpSolver for ValueIteration<'a, M> {
    fn v_star(&self, s: Discrete) -> Continous {
        self.v[s as usize]
    }

    fn q_star(&self, s: Discrete, a: Discrete) -> Option<Continous> {
        if self.mdp.terminal_value(s).is_some() {
            return None;
        }

        self.q_value(s, a)
    }

    fn pi_star(&self, s: Discrete) -> Option<Discrete> {
        if self.mdp.terminal_value(s).is_some() {
            return None;
        }

        self.best_action(s).map(|(a, _)| a)
    }

    fn exec(&mut self, theta: Option<Continous>, num_iterations: Option<usize>) -> (bool, usize) {
        let theta = theta.unwrap_or(0.);
        let limit = num_iterations.unwrap_or(usize::MAX);

        let mut delta = Continous::INFINITY;
        let mut sweeps = 0;
        while sweeps < limit {
            delta = self.sweep();
            sweeps += 1;
            if delta <= theta {
                break;
            }
        }
        tracing::trace!(sweeps, delta, "value iteration finished");

        (delta <= theta, sweeps)
    }
}

/// Fresh value table for `mdp` after a fixed budget of sweeps.
pub fn solve<M: Mdp + ?Sized>(mdp: &M, gamma: Continous, sweeps: usize) -> Vec<Continous> {
    let mut vi = ValueIteration::new(mdp, gamma);
    vi.exec(None, Some(sweeps));

    vi.into_values()
}
