use super::mdp::Mdp;
use gymnasium::*;

/// https://towardsdatascience.com/reinforcement-learning-an-easy-introduction-to-value-iteration-e4cfe0731fd5
pub struct SimpleGolf {
    transitions: Transitions,
}

impl SimpleGolf {
    pub fn new() -> Self {
        let transitions = Transitions::from([
            (
                (0, 0),
                vec![
                    Transition {
                        next_state: 1,
                        probability: 0.9,
                        reward: 0.,
                        done: false,
                    },
                    Transition {
                        next_state: 0,
                        probability: 0.1,
                        reward: 0.,
                        done: false,
                    },
                ],
            ),
            (
                (1, 1),
                vec![
                    Transition {
                        next_state: 0,
                        probability: 0.9,
                        reward: 0.,
                        done: false,
                    },
                    Transition {
                        next_state: 1,
                        probability: 0.1,
                        reward: 0.,
                        done: false,
                    },
                ],
            ),
            (
                (1, 2),
                vec![
                    Transition {
                        next_state: 2,
                        probability: 0.9,
                        reward: 10.,
                        done: true,
                    },
                    Transition {
                        next_state: 1,
                        probability: 0.1,
                        reward: 0.,
                        done: false,
                    },
                ],
            ),
        ]);

        Self { transitions }
    }
}

impl Mdp for SimpleGolf {
    fn n_s(&self) -> usize {
        3
    }

    fn n_a(&self) -> usize {
        3
    }

    fn transitions(&self, s: Discrete, a: Discrete) -> Option<Vec<Transition>> {
        self.transitions.get(&(s, a)).cloned()
    }

    fn terminal_value(&self, s: Discrete) -> Option<Continous> {
        (s == 2).then_some(0.)
    }
}
