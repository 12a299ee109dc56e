// src/sweep.rs

//! Parameter sweeps: named value domains expanded into every combination.
//!
//! A [`Sweep`] is plain data. [`Sweep::iter`] walks the Cartesian product
//! lazily and can be called any number of times.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One value of a parameter domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// One combination of parameter values.
pub type ParameterSet = BTreeMap<String, ParamValue>;

/// Ordered list of parameter domains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sweep {
    domains: Vec<(String, Vec<ParamValue>)>,
}

impl Sweep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or replace) the domain of `name`.
    pub fn param<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.set(name, values.into_iter().map(Into::into).collect());
        self
    }

    fn set(&mut self, name: &str, values: Vec<ParamValue>) {
        match self.domains.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.domains.push((name.to_string(), values)),
        }
    }

    pub fn from_map(map: &BTreeMap<String, Vec<ParamValue>>) -> Self {
        let mut sweep = Self::new();
        for (name, values) in map {
            sweep.set(name, values.clone());
        }
        sweep
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(|(n, _)| n.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.domains.iter().any(|(n, _)| n == name)
    }

    pub fn domain(&self, name: &str) -> Option<&[ParamValue]> {
        self.domains
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Number of combinations. A sweep with no parameters has exactly one
    /// (empty) combination.
    pub fn len(&self) -> usize {
        self.domains.iter().map(|(_, v)| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A sweep over only the named parameters, in this sweep's order.
    pub fn restrict<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Sweep {
        let wanted: Vec<&str> = names.into_iter().collect();
        Sweep {
            domains: self
                .domains
                .iter()
                .filter(|(n, _)| wanted.contains(&n.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// This sweep with `other`'s domains added, replacing same-named ones.
    pub fn overlay(&self, other: &Sweep) -> Sweep {
        let mut merged = self.clone();
        for (name, values) in &other.domains {
            merged.set(name, values.clone());
        }
        merged
    }

    /// Every combination; the last declared parameter varies fastest.
    pub fn iter(&self) -> SweepIter<'_> {
        SweepIter {
            domains: &self.domains,
            indices: vec![0; self.domains.len()],
            done: self.domains.iter().any(|(_, v)| v.is_empty()),
        }
    }
}

impl<'a> IntoIterator for &'a Sweep {
    type Item = ParameterSet;
    type IntoIter = SweepIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// `{bs=4k, depth=1}`
pub fn format_params(params: &ParameterSet) -> String {
    let body: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", body.join(", "))
}

/// Odometer over a [`Sweep`]'s domains.
#[derive(Debug, Clone)]
pub struct SweepIter<'a> {
    domains: &'a [(String, Vec<ParamValue>)],
    indices: Vec<usize>,
    done: bool,
}

impl Iterator for SweepIter<'_> {
    type Item = ParameterSet;

    fn next(&mut self) -> Option<ParameterSet> {
        if self.done {
            return None;
        }

        let set = self
            .domains
            .iter()
            .zip(&self.indices)
            .map(|((name, values), &i)| (name.clone(), values[i].clone()))
            .collect();

        // Advance, rightmost digit first.
        self.done = true;
        for pos in (0..self.indices.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < self.domains[pos].1.len() {
                self.done = false;
                break;
            }
            self.indices[pos] = 0;
        }

        Some(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sweep_yields_one_empty_set() {
        let sweep = Sweep::new();
        let sets: Vec<_> = sweep.iter().collect();
        assert_eq!(sets, vec![ParameterSet::new()]);
        assert_eq!(sweep.len(), 1);
    }

    #[test]
    fn cartesian_product_in_odometer_order() {
        let sweep = Sweep::new().param("bs", ["4k", "8k"]).param("depth", [1, 2, 4]);
        let sets: Vec<_> = sweep.iter().collect();
        assert_eq!(sets.len(), 6);
        assert_eq!(sweep.len(), 6);
        assert_eq!(sets[0]["bs"], ParamValue::from("4k"));
        assert_eq!(sets[0]["depth"], ParamValue::Int(1));
        assert_eq!(sets[1]["depth"], ParamValue::Int(2));
        assert_eq!(sets[3]["bs"], ParamValue::from("8k"));
        assert_eq!(sets[3]["depth"], ParamValue::Int(1));
    }

    #[test]
    fn empty_domain_yields_nothing() {
        let sweep = Sweep::new().param("a", [1]).param("b", Vec::<i64>::new());
        assert_eq!(sweep.iter().count(), 0);
        assert!(sweep.is_empty());
    }

    #[test]
    fn iteration_is_restartable() {
        let sweep = Sweep::new().param("x", [1, 2]);
        let first: Vec<_> = sweep.iter().collect();
        let second: Vec<_> = (&sweep).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn restrict_and_overlay() {
        let base = Sweep::new().param("a", [1, 2]).param("b", [3]);
        let only_b = base.restrict(["b"]);
        assert_eq!(only_b.names().collect::<Vec<_>>(), vec!["b"]);

        let merged = base.overlay(&Sweep::new().param("b", [5, 6]).param("c", [true]));
        assert_eq!(merged.domain("b"), Some(&[ParamValue::Int(5), ParamValue::Int(6)][..]));
        assert!(merged.contains("c"));
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn values_deserialize_untagged() {
        let v: Vec<ParamValue> = serde_json::from_str(r#"[1, 2.5, "x", true]"#).unwrap();
        assert_eq!(
            v,
            vec![
                ParamValue::Int(1),
                ParamValue::Float(2.5),
                ParamValue::from("x"),
                ParamValue::Bool(true)
            ]
        );
        assert_eq!(ParamValue::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn formats_params_inline() {
        let set = Sweep::new().param("depth", [1]).param("bs", ["4k"]).iter().next().unwrap();
        assert_eq!(format_params(&set), "{bs=4k, depth=1}");
        assert_eq!(format_params(&ParameterSet::new()), "{}");
    }
}
