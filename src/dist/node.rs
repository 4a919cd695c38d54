//! 节点分布
//!
//! 端点之间的流量概率矩阵。`m[i][j]` 是有序端点对 (i, j) 的概率质量；
//! 无序端点对 {i, j} 的概率为 `m[i][j] + m[j][i]`。

use std::collections::BTreeMap;

use crate::error::{Error, Result};

use super::value::PROB_SUM_TOLERANCE;

/// 行主序的方阵，行/列按端点顺序编号
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDistribution {
    n: usize,
    m: Vec<f64>,
}

impl NodeDistribution {
    /// 由行列表构建；要求方阵、元素非负且总和为 1（容差内）。
    pub fn from_matrix(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        if n < 2 {
            return Err(Error::InvalidDistribution(format!(
                "node distribution needs at least 2 endpoints, got {n}"
            )));
        }
        let mut m = Vec::with_capacity(n * n);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(Error::InvalidDistribution(format!(
                    "row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            m.extend(row);
        }
        if let Some(p) = m.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(Error::InvalidDistribution(format!(
                "node probability {p} is negative or not finite"
            )));
        }
        let sum: f64 = m.iter().sum();
        if (sum - 1.0).abs() > PROB_SUM_TOLERANCE {
            return Err(Error::InvalidDistribution(format!(
                "node distribution must sum to 1, but sums to {sum}"
            )));
        }
        Ok(Self { n, m })
    }

    /// 所有不同端点的有序对等概率，对角线为 0。
    pub fn uniform(n: usize) -> Result<Self> {
        if n < 2 {
            return Err(Error::InvalidDistribution(format!(
                "node distribution needs at least 2 endpoints, got {n}"
            )));
        }
        let p = 1.0 / (n * (n - 1)) as f64;
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0.0 } else { p }).collect())
            .collect();
        Self::from_matrix(rows)
    }

    /// 由已展开的无序端点对概率构建，概率在两个方向上平分。
    pub fn from_pair_probs(n: usize, pairs: &BTreeMap<(usize, usize), f64>) -> Result<Self> {
        let mut rows = vec![vec![0.0; n]; n];
        for (&(i, j), &p) in pairs {
            if i >= n || j >= n || i == j {
                return Err(Error::InvalidDistribution(format!(
                    "pair ({i}, {j}) is not a valid pair of {n} endpoints"
                )));
            }
            rows[i][j] += p / 2.0;
            rows[j][i] += p / 2.0;
        }
        Self::from_matrix(rows)
    }

    pub fn num_nodes(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.m[i * self.n + j]
    }

    pub(crate) fn set(&mut self, i: usize, j: usize, v: f64) {
        self.m[i * self.n + j] = v;
    }

    pub(crate) fn add(&mut self, i: usize, j: usize, v: f64) {
        self.m[i * self.n + j] += v;
    }

    /// 第 i 行之和：端点 i 作为源时承担的总负载比例
    pub fn row_sum(&self, i: usize) -> f64 {
        self.m[i * self.n..(i + 1) * self.n].iter().sum()
    }

    pub fn total(&self) -> f64 {
        self.m.iter().sum()
    }

    /// 所有无序端点对 (i < j) 及其概率，按 (i, j) 升序
    pub fn pair_probs(&self) -> Vec<((usize, usize), f64)> {
        let mut out = Vec::with_capacity(self.n * (self.n - 1) / 2);
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                out.push(((i, j), self.get(i, j) + self.get(j, i)));
            }
        }
        out
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.m.chunks(self.n).map(|r| r.to_vec()).collect()
    }
}
