//! Symmetric room-adjacency belief matrix.
//!
//! Entry `(i, j)` is the estimated probability that rooms `i` and `j` share a
//! door. The matrix is only ever changed by fusing evidence through
//! [`BeliefMatrix::merge`]; nothing outside this module writes entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExplorerError, Result};

/// Smallest positive normal `f64`. Entries at or below it carry no mass.
pub const FLOOR: f64 = f64::MIN_POSITIVE;

/// Clip used by [`BeliefMatrix::entropy`] so `log2` never sees 0 or 1.
pub const ENTROPY_EPS: f64 = 1e-12;

/// A sweep stops once every live row sums to 1 within this tolerance.
const ROW_TOLERANCE: f64 = 1e-12;

/// Hard cap on normalization sweeps.
const MAX_SWEEPS: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeliefMatrix {
    size: usize,
    data: Vec<f64>,
}

impl Default for BeliefMatrix {
    fn default() -> Self {
        Self::empty()
    }
}

impl BeliefMatrix {
    /// The "no evidence yet" sentinel: a 1x1 zero matrix.
    pub fn empty() -> Self {
        Self {
            size: 1,
            data: vec![0.0],
        }
    }

    /// Zero matrix of `size` rooms. `size == 0` yields the empty sentinel.
    pub fn create(size: usize) -> Self {
        Self::create_with_value(size, 0.0)
    }

    pub fn create_with_value(size: usize, value: f64) -> Self {
        if size == 0 {
            return Self::empty();
        }
        Self {
            size,
            data: vec![value; size * size],
        }
    }

    /// Build from row data. The only fallible constructor.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let size = rows.len();
        if size == 0 || rows.iter().any(|r| r.len() != size) {
            return Err(ExplorerError::NotSquare);
        }
        Ok(Self {
            size,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Evidence matrix holding a single symmetric observation `a <-> b`.
    pub fn observation(size: usize, a: usize, b: usize, weight: f64) -> Self {
        Self::observations(size, [(a, b, weight)])
    }

    /// Evidence matrix accumulating symmetric observations.
    ///
    /// Out-of-range pairs and non-finite or negative weights are ignored. A
    /// self-observation `a <-> a` adds its weight to the diagonal once.
    pub fn observations<I>(size: usize, edges: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut m = Self::create(size);
        let n = m.size;
        for (a, b, w) in edges {
            if a >= n || b >= n || !w.is_finite() || w <= 0.0 {
                continue;
            }
            m.data[a * n + b] += w;
            if a != b {
                m.data[b * n + a] += w;
            }
        }
        m
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i >= self.size || j >= self.size {
            return 0.0;
        }
        self.data[i * self.size + j]
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        if i >= self.size {
            return &[];
        }
        &self.data[i * self.size..(i + 1) * self.size]
    }

    /// True only for the canonical sentinel, not for real degenerate evidence.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 1 && self.data[0] == 0.0
    }

    /// Copy into a larger zero matrix. Shrinking is not supported; a smaller
    /// or equal `new_size` returns a plain copy.
    pub fn widen(&self, new_size: usize) -> Self {
        if new_size <= self.size {
            return self.clone();
        }
        let mut out = Self::create(new_size);
        for i in 0..self.size {
            let src = self.row(i);
            out.data[i * new_size..i * new_size + self.size].copy_from_slice(src);
        }
        out
    }

    /// Row-wise normalization that keeps the matrix symmetric.
    ///
    /// Each row is rescaled so it sums to one and mirrored into its column.
    /// Off-diagonal entries belong to two rows, so a row scale `d` multiplies
    /// them once and the diagonal twice (`d * off + d^2 * diag = 1`). Rows
    /// whose mass is at or below [`FLOOR`] are left untouched. Mirroring
    /// disturbs rows already visited, so the sweep repeats until every live
    /// row sums to 1.
    ///
    /// Entries that lie on no perfect matching of the live rows only decay
    /// under scaling and never settle. When the sweeps stall they are zeroed
    /// and the sweeps rerun, so the result is a fixed point. Exact zeros stay
    /// zero and a uniform matrix stays uniform. A pattern with no perfect
    /// matching at all (a path of three rooms) has no symmetric scaling with
    /// unit rows; it stops at the sweep cap.
    pub fn soft_max_normalize(&mut self) {
        if self.is_empty() {
            return;
        }
        if !self.sweep() && self.prune_unmatched() {
            self.sweep();
        }
    }

    /// Gauss-Seidel sweeps until every live row sums to 1. False at the cap.
    fn sweep(&mut self) -> bool {
        for _ in 0..MAX_SWEEPS {
            let mut worst = 0.0_f64;
            for i in 0..self.size {
                if let Some(mass) = self.normalize_row(i) {
                    worst = worst.max((mass - 1.0).abs());
                }
            }
            if worst <= ROW_TOLERANCE {
                return true;
            }
        }
        false
    }

    /// Zero every entry that no perfect matching of the live rows uses.
    ///
    /// Returns false (and changes nothing) when no perfect matching exists
    /// or every entry is already on one.
    fn prune_unmatched(&mut self) -> bool {
        let n = self.size;
        let live: Vec<bool> = (0..n)
            .map(|i| {
                let mass: f64 = self.row(i).iter().map(|&v| clean(v)).sum();
                mass > FLOOR && mass.is_finite()
            })
            .collect();
        let adj: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                if !live[i] {
                    return Vec::new();
                }
                (0..n)
                    .filter(|&j| live[j] && self.data[i * n + j] > FLOOR)
                    .collect()
            })
            .collect();

        // Kuhn's augmenting paths: row_of[col] is the row matched to col.
        let mut row_of: Vec<Option<usize>> = vec![None; n];
        for i in (0..n).filter(|&i| live[i]) {
            let mut visited = vec![false; n];
            if !augment(i, &adj, &mut row_of, &mut visited) {
                return false;
            }
        }
        let mut col_of = vec![usize::MAX; n];
        for (col, row) in row_of.iter().enumerate() {
            if let Some(r) = *row {
                col_of[r] = col;
            }
        }

        // Edge (i, j) outside the matching lies on another perfect matching
        // iff the row matched to j can reach i along alternating edges
        // r -> row_of[c] for every c in adj[r].
        let mut pruned = false;
        for i in 0..n {
            for &j in &adj[i] {
                if j == col_of[i] {
                    continue;
                }
                let Some(k) = row_of[j] else { continue };
                if !reaches(k, i, &adj, &row_of) {
                    self.data[i * n + j] = 0.0;
                    self.data[j * n + i] = 0.0;
                    pruned = true;
                }
            }
        }
        pruned
    }

    /// Normalize row `i` and mirror it. Returns the row mass before scaling.
    fn normalize_row(&mut self, i: usize) -> Option<f64> {
        let n = self.size;
        let mut off = 0.0_f64;
        let mut diag = 0.0_f64;
        for (j, v) in self.row(i).iter().enumerate() {
            let v = clean(*v);
            if j == i {
                diag = v;
            } else {
                off += v;
            }
        }
        let mass = off + diag;
        if mass <= FLOOR || !mass.is_finite() {
            return None;
        }

        // Positive root of diag*d^2 + off*d - 1, written to avoid cancellation.
        let d = 2.0 / (off + (off * off + 4.0 * diag).sqrt());
        for j in 0..n {
            let v = clean(self.data[i * n + j]);
            let p = if j == i { v * d * d } else { v * d };
            self.data[i * n + j] = p;
            self.data[j * n + i] = p;
        }
        Some(mass)
    }

    /// Fuse evidence: elementwise sum, then [`Self::soft_max_normalize`].
    ///
    /// The smaller operand is widened with zeros first, so this is total.
    pub fn merge(&self, other: &BeliefMatrix) -> BeliefMatrix {
        let size = self.size.max(other.size);
        let mut out = self.widen(size);
        let rhs = other.widen(size);
        for (a, b) in out.data.iter_mut().zip(rhs.data.iter()) {
            *a += *b;
        }
        out.soft_max_normalize();
        out
    }

    /// Binary Shannon entropy in bits, summed over the upper triangle.
    pub fn entropy(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mut h = 0.0;
        for i in 0..self.size {
            for j in i..self.size {
                h += binary_entropy(self.get(i, j));
            }
        }
        h
    }

    pub fn count_non_zero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0.0).count()
    }

    /// Every row and every column holds some mass above [`FLOOR`].
    pub fn is_valid(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let n = self.size;
        let rows_ok = (0..n).all(|i| self.row(i).iter().any(|&v| v > FLOOR));
        let cols_ok = (0..n).all(|j| (0..n).any(|i| self.data[i * n + j] > FLOOR));
        rows_ok && cols_ok
    }

    /// Most probable partner of room `i`; ties go to the lowest index.
    pub fn argmax_in_row(&self, i: usize) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (j, &v) in self.row(i).iter().enumerate() {
            if v <= FLOOR {
                continue;
            }
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((j, v));
            }
        }
        best.map(|(j, _)| j)
    }
}

fn augment(row: usize, adj: &[Vec<usize>], row_of: &mut [Option<usize>], visited: &mut [bool]) -> bool {
    for &col in &adj[row] {
        if visited[col] {
            continue;
        }
        visited[col] = true;
        let free = match row_of[col] {
            None => true,
            Some(other) => augment(other, adj, row_of, visited),
        };
        if free {
            row_of[col] = Some(row);
            return true;
        }
    }
    false
}

fn reaches(from: usize, to: usize, adj: &[Vec<usize>], row_of: &[Option<usize>]) -> bool {
    let mut seen = vec![false; adj.len()];
    let mut stack = vec![from];
    seen[from] = true;
    while let Some(r) = stack.pop() {
        if r == to {
            return true;
        }
        for &c in &adj[r] {
            if let Some(next) = row_of[c] {
                if !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }
    }
    false
}

/// Negative and NaN entries carry no mass.
#[inline]
fn clean(v: f64) -> f64 {
    if v > 0.0 {
        v
    } else {
        0.0
    }
}

#[inline]
fn binary_entropy(p: f64) -> f64 {
    let p = if p.is_nan() { ENTROPY_EPS } else { p.clamp(ENTROPY_EPS, 1.0 - ENTROPY_EPS) };
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

impl fmt::Display for BeliefMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "Empty matrix");
        }
        for i in 0..self.size {
            let cells: Vec<String> = self
                .row(i)
                .iter()
                .map(|&v| if v <= FLOOR { "....".to_string() } else { format!("{v:.2}") })
                .collect();
            writeln!(f, "{}", cells.join(" "))?;
        }
        Ok(())
    }
}
