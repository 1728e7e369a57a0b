//! Generic UCB tree search over an explicit capability set.
//!
//! The search only talks to a [`SearchDomain`]: it enumerates actions, applies
//! them to private state copies and asks the domain to score a leaf against the
//! root. Trees are arena-allocated. Root parallelism runs independent trees on
//! rayon workers, each with its own seeded RNG; their root statistics are
//! combined on the calling thread.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Debug;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

/// What a tree search needs from the world it plans in.
pub trait SearchDomain: Sync {
    type State: Clone + Send + Sync;
    type Action: Copy + Ord + Debug + Send + Sync;

    /// Legal actions in `state`, in any order (the search sorts them).
    fn enumerate_actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Successor of `state` after `action`. May sample an outcome.
    fn apply_action<R: Rng + ?Sized>(
        &self,
        state: &Self::State,
        action: Self::Action,
        rng: &mut R,
    ) -> Self::State;

    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Reward of reaching `leaf` from `root`. Higher is better.
    fn reward(&self, root: &Self::State, leaf: &Self::State) -> f64;
}

#[derive(Clone, Debug)]
pub struct SearchCfg {
    pub simulations: u32,
    pub workers: usize,
    pub exploration_constant: f64,
    pub rollout_depth: usize,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for SearchCfg {
    fn default() -> Self {
        Self {
            simulations: 400,
            workers: 1,
            exploration_constant: std::f64::consts::SQRT_2,
            rollout_depth: 2,
            max_depth: 6,
            seed: 0,
        }
    }
}

#[derive(Clone, Debug)]
struct Node<A> {
    action: Option<A>,
    parent: Option<usize>,
    depth: usize,
    children: Vec<usize>,
    untried: Vec<A>,
    visits: u32,
    reward_sum: f64,
}

impl<A: Copy + Ord> Node<A> {
    fn new(action: Option<A>, parent: Option<usize>, depth: usize, mut untried: Vec<A>) -> Self {
        untried.sort();
        untried.dedup();
        Self {
            action,
            parent,
            depth,
            children: Vec::new(),
            untried,
            visits: 0,
            reward_sum: 0.0,
        }
    }

    #[inline]
    fn mean(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.reward_sum / self.visits as f64
        }
    }
}

/// Combined statistics of one root action and the best line below it.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedLine<A> {
    pub action: A,
    pub visits: u32,
    pub mean_reward: f64,
    /// Starts with `action`; follows the best-average child at every level.
    pub line: Vec<A>,
}

#[derive(Clone, Debug)]
pub struct SearchOutcome<A> {
    /// Root actions by descending mean reward, ties by lowest action.
    pub ranked: Vec<RankedLine<A>>,
    pub simulations: u32,
    pub nodes: usize,
}

impl<A: Copy> SearchOutcome<A> {
    pub fn best(&self) -> Option<&RankedLine<A>> {
        self.ranked.first()
    }
}

/// Run the search and combine every worker's tree.
pub fn search<D: SearchDomain>(
    domain: &D,
    root: &D::State,
    cfg: &SearchCfg,
) -> SearchOutcome<D::Action> {
    let workers = cfg.workers.max(1);
    let trees: Vec<Vec<Node<D::Action>>> = (0..workers)
        .into_par_iter()
        .map(|w| grow(domain, root, cfg, cfg.seed.wrapping_add(w as u64)))
        .collect();

    // Combine root children across trees.
    let mut combined: BTreeMap<D::Action, (u32, f64, usize, usize)> = BTreeMap::new();
    for (t, tree) in trees.iter().enumerate() {
        for &c in &tree[0].children {
            let node = &tree[c];
            let Some(action) = node.action else { continue };
            let e = combined.entry(action).or_insert((0, 0.0, t, c));
            e.0 += node.visits;
            e.1 += node.reward_sum;
            // Line extraction uses the tree that explored this action most.
            if node.visits > trees[e.2][e.3].visits {
                e.2 = t;
                e.3 = c;
            }
        }
    }

    let mut ranked: Vec<RankedLine<D::Action>> = combined
        .into_iter()
        .filter(|(_, (visits, ..))| *visits > 0)
        .map(|(action, (visits, sum, t, c))| RankedLine {
            action,
            visits,
            mean_reward: sum / visits as f64,
            line: best_line(&trees[t], c),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.mean_reward
            .total_cmp(&a.mean_reward)
            .then_with(|| a.action.cmp(&b.action))
    });

    SearchOutcome {
        ranked,
        simulations: cfg.simulations.saturating_mul(workers as u32),
        nodes: trees.iter().map(Vec::len).sum(),
    }
}

fn grow<D: SearchDomain>(
    domain: &D,
    root: &D::State,
    cfg: &SearchCfg,
    seed: u64,
) -> Vec<Node<D::Action>> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let root_actions = if domain.is_terminal(root) {
        Vec::new()
    } else {
        domain.enumerate_actions(root)
    };
    let mut nodes = vec![Node::new(None, None, 0, root_actions)];

    for _ in 0..cfg.simulations {
        let mut idx = 0usize;
        let mut state = root.clone();

        // Selection and expansion. The tree is open-loop: a path is replayed
        // from the root every simulation, so sampled outcomes vary.
        loop {
            if nodes[idx].depth >= cfg.max_depth || domain.is_terminal(&state) {
                break;
            }
            if !nodes[idx].untried.is_empty() {
                let action = nodes[idx].untried.remove(0);
                state = domain.apply_action(&state, action, &mut rng);
                let depth = nodes[idx].depth + 1;
                let untried = if depth >= cfg.max_depth || domain.is_terminal(&state) {
                    Vec::new()
                } else {
                    domain.enumerate_actions(&state)
                };
                nodes.push(Node::new(Some(action), Some(idx), depth, untried));
                let child = nodes.len() - 1;
                nodes[idx].children.push(child);
                idx = child;
                break;
            }
            let Some(next) = select_child(&nodes, idx, cfg.exploration_constant) else {
                break;
            };
            idx = next;
            if let Some(action) = nodes[idx].action {
                state = domain.apply_action(&state, action, &mut rng);
            }
        }

        // Rollout.
        let mut depth = nodes[idx].depth;
        for _ in 0..cfg.rollout_depth {
            if depth >= cfg.max_depth || domain.is_terminal(&state) {
                break;
            }
            let actions = domain.enumerate_actions(&state);
            if actions.is_empty() {
                break;
            }
            let action = actions[rng.gen_range(0..actions.len())];
            state = domain.apply_action(&state, action, &mut rng);
            depth += 1;
        }

        let reward = domain.reward(root, &state);
        let reward = if reward.is_finite() { reward } else { 0.0 };

        let mut cur = Some(idx);
        while let Some(i) = cur {
            nodes[i].visits += 1;
            nodes[i].reward_sum += reward;
            cur = nodes[i].parent;
        }
    }

    nodes
}

/// UCB1 over the children of `idx`. Children are created in action order and
/// a strict comparison keeps the first maximum, so ties go to the lowest action.
fn select_child<A: Copy + Ord>(nodes: &[Node<A>], idx: usize, c: f64) -> Option<usize> {
    let parent = &nodes[idx];
    let ln_n = (parent.visits.max(1) as f64).ln();
    let mut best: Option<(usize, f64)> = None;
    for &child in &parent.children {
        let node = &nodes[child];
        let score = if node.visits == 0 {
            f64::INFINITY
        } else {
            node.mean() + c * (ln_n / node.visits as f64).sqrt()
        };
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((child, score));
        }
    }
    best.map(|(i, _)| i)
}

/// Action path from `start` down the best-average visited children.
fn best_line<A: Copy + Ord>(nodes: &[Node<A>], start: usize) -> Vec<A> {
    let mut line = Vec::new();
    let mut cur = start;
    loop {
        if let Some(a) = nodes[cur].action {
            line.push(a);
        }
        let next = nodes[cur]
            .children
            .iter()
            .copied()
            .filter(|&c| nodes[c].visits > 0)
            .max_by(|&a, &b| match nodes[a].mean().total_cmp(&nodes[b].mean()) {
                // max_by keeps the last maximum; prefer the lower action on ties.
                Ordering::Equal => nodes[b].action.cmp(&nodes[a].action),
                other => other,
            });
        match next {
            Some(n) => cur = n,
            None => break,
        }
    }
    line
}
