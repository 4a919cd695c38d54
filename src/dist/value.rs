//! 数值分布与离散采样
//!
//! 分布的键在存储前先规范化到固定的有效数字位数，避免浮点误差导致的
//! 查找失败或重复键。

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rand::Rng;
use rand::distributions::{Distribution as _, WeightedIndex};

use crate::error::{Error, Result};

/// 概率之和允许的偏差
pub const PROB_SUM_TOLERANCE: f64 = 0.01;

/// 分布键保留的有效数字位数
pub const SIGNIFICANT_DIGITS: i32 = 12;

fn canonical(v: f64) -> f64 {
    if v == 0.0 || !v.is_finite() {
        return v;
    }
    let exp = SIGNIFICANT_DIGITS - 1 - v.abs().log10().floor() as i32;
    let mag = 10f64.powi(exp);
    (v * mag).round() / mag
}

/// 规范化后的分布键
#[derive(Debug, Clone, Copy)]
struct ValueKey(f64);

impl ValueKey {
    fn new(v: f64) -> Self {
        ValueKey(canonical(v))
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ValueKey {}

impl PartialOrd for ValueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

fn check_probabilities(probs: &[f64]) -> Result<()> {
    if probs.is_empty() {
        return Err(Error::InvalidDistribution("distribution is empty".into()));
    }
    if let Some(p) = probs.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(Error::InvalidDistribution(format!(
            "probability {p} is negative or not finite"
        )));
    }
    let sum: f64 = probs.iter().sum();
    if (sum - 1.0).abs() > PROB_SUM_TOLERANCE {
        return Err(Error::InvalidDistribution(format!(
            "probabilities must sum to 1, but sum to {sum}"
        )));
    }
    Ok(())
}

/// 离散概率分布：数值 -> 概率
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    probs: BTreeMap<ValueKey, f64>,
}

impl Distribution {
    /// 由 (数值, 概率) 对构建分布；重复的数值概率相加。
    pub fn new(pairs: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let mut probs: BTreeMap<ValueKey, f64> = BTreeMap::new();
        for (value, prob) in pairs {
            if !value.is_finite() {
                return Err(Error::InvalidDistribution(format!(
                    "value {value} is not finite"
                )));
            }
            *probs.entry(ValueKey::new(value)).or_insert(0.0) += prob;
        }
        let ps: Vec<f64> = probs.values().copied().collect();
        check_probabilities(&ps)?;
        Ok(Self { probs })
    }

    /// 只有一个取值的分布
    pub fn single(value: f64) -> Result<Self> {
        Self::new([(value, 1.0)])
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// 按数值升序返回所有取值
    pub fn values(&self) -> Vec<f64> {
        self.probs.keys().map(|k| k.0).collect()
    }

    /// 与 [`Distribution::values`] 顺序一致的概率
    pub fn probabilities(&self) -> Vec<f64> {
        self.probs.values().copied().collect()
    }

    /// 查询某个数值的概率（不存在则为 0）
    pub fn prob(&self, value: f64) -> f64 {
        self.probs.get(&ValueKey::new(value)).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.probs.iter().map(|(k, p)| (k.0, *p))
    }

    pub fn mean(&self) -> f64 {
        self.iter().map(|(v, p)| v * p).sum()
    }

    /// 所有取值乘以 `factor`，概率不变。
    pub fn scaled(&self, factor: f64) -> Self {
        let mut probs: BTreeMap<ValueKey, f64> = BTreeMap::new();
        for (value, prob) in self.iter() {
            *probs.entry(ValueKey::new(value * factor)).or_insert(0.0) += prob;
        }
        Self { probs }
    }

    pub fn sampler(&self) -> Result<DiscretizedSampler> {
        DiscretizedSampler::new(&self.values(), &self.probabilities())
    }

    /// 独立同分布地采样 `n` 个值
    pub fn sample_n<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>> {
        Ok(self.sampler()?.sample_n(n, rng))
    }
}

/// 经验离散分布采样器
#[derive(Debug, Clone)]
pub struct DiscretizedSampler {
    values: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl DiscretizedSampler {
    /// `values` 与 `probs` 长度必须一致，且概率之和在容差内为 1。
    pub fn new(values: &[f64], probs: &[f64]) -> Result<Self> {
        if values.len() != probs.len() {
            return Err(Error::InvalidDistribution(format!(
                "{} values but {} probabilities",
                values.len(),
                probs.len()
            )));
        }
        check_probabilities(probs)?;
        let index = WeightedIndex::new(probs)
            .map_err(|e| Error::InvalidDistribution(e.to_string()))?;
        Ok(Self {
            values: values.to_vec(),
            index,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.values[self.index.sample(rng)]
    }

    pub fn sample_n<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<f64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}
