//! Combining values found in several sources

use std::fmt;
use std::str::FromStr;

use super::error::{LookupError, LookupResult};
use crate::value::{Mapping, Value};

/// How values found in several sources are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    /// The first source containing the key wins; later sources are not read
    #[default]
    First,
    /// Every source's value is appended, in source order
    Array,
    /// Every source's mapping is deep-merged
    Hash,
}

impl ResolutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMode::First => "first",
            ResolutionMode::Array => "array",
            ResolutionMode::Hash => "hash",
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" | "priority" => Ok(ResolutionMode::First),
            "array" => Ok(ResolutionMode::Array),
            "hash" => Ok(ResolutionMode::Hash),
            other => Err(format!("unknown resolution mode '{}'", other)),
        }
    }
}

/// Whether the resolver should keep visiting sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
enum Accumulator {
    First(Option<Value>),
    Array(Vec<Value>),
    Hash(Mapping),
}

/// The in-progress answer of one lookup call
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    acc: Accumulator,
    contributions: usize,
}

impl Answer {
    /// Empty accumulator for `mode`
    pub fn new(mode: ResolutionMode) -> Self {
        let acc = match mode {
            ResolutionMode::First => Accumulator::First(None),
            ResolutionMode::Array => Accumulator::Array(Vec::new()),
            ResolutionMode::Hash => Accumulator::Hash(Mapping::new()),
        };
        Self { acc, contributions: 0 }
    }

    /// Hash accumulator pre-seeded with a partial answer from elsewhere
    ///
    /// The seed counts as a contribution, so the lookup returns it even when no
    /// source has the key.
    pub fn seeded_hash(seed: Mapping) -> Self {
        Self {
            acc: Accumulator::Hash(seed),
            contributions: 1,
        }
    }

    pub fn mode(&self) -> ResolutionMode {
        match self.acc {
            Accumulator::First(_) => ResolutionMode::First,
            Accumulator::Array(_) => ResolutionMode::Array,
            Accumulator::Hash(_) => ResolutionMode::Hash,
        }
    }

    /// Number of values folded in so far
    pub fn contributions(&self) -> usize {
        self.contributions
    }

    /// Fold the resolved value of `datasource` into the answer
    ///
    /// On a type mismatch the answer is left untouched and the error names the
    /// source, the mode and both shapes.
    pub fn fold(&mut self, datasource: &str, contributed: Value) -> LookupResult<Flow> {
        let flow = match &mut self.acc {
            Accumulator::First(slot) => {
                *slot = Some(contributed);
                Flow::Stop
            }
            Accumulator::Array(items) => {
                if !(contributed.is_scalar() || matches!(contributed, Value::Sequence(_))) {
                    return Err(LookupError::type_mismatch(
                        datasource,
                        ResolutionMode::Array,
                        "Array or String",
                        contributed.shape_name(),
                    ));
                }
                items.push(contributed);
                Flow::Continue
            }
            Accumulator::Hash(merged) => {
                let map = match contributed {
                    Value::Mapping(map) => map,
                    other => {
                        return Err(LookupError::type_mismatch(
                            datasource,
                            ResolutionMode::Hash,
                            "Hash",
                            other.shape_name(),
                        ))
                    }
                };
                let existing = std::mem::take(merged);
                *merged = merge_answer(map, existing);
                Flow::Continue
            }
        };
        self.contributions += 1;
        Ok(flow)
    }

    /// The final answer; `None` when no source contributed
    pub fn into_value(self) -> Option<Value> {
        if self.contributions == 0 {
            return None;
        }
        match self.acc {
            Accumulator::First(value) => value,
            Accumulator::Array(items) => Some(Value::Sequence(items)),
            Accumulator::Hash(map) => Some(Value::Mapping(map)),
        }
    }
}

/// Deep-merge `contributed` into `existing`
///
/// Keys present in both whose values are both mappings merge recursively;
/// otherwise the contributed value replaces the existing one. Keys only in
/// `existing` are kept, in their original position.
pub fn merge_answer(contributed: Mapping, mut existing: Mapping) -> Mapping {
    for (key, value) in contributed {
        let merged = match (existing.shift_remove_full(&key), value) {
            (Some((index, _, Value::Mapping(old))), Value::Mapping(new)) => {
                (Some(index), Value::Mapping(merge_answer(new, old)))
            }
            (Some((index, _, _)), new) => (Some(index), new),
            (None, new) => (None, new),
        };
        match merged {
            (Some(index), value) => {
                existing.shift_insert(index, key, value);
            }
            (None, value) => {
                existing.insert(key, value);
            }
        }
    }
    existing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, Value)]) -> Mapping {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("priority".parse::<ResolutionMode>(), Ok(ResolutionMode::First));
        assert_eq!("HASH".parse::<ResolutionMode>(), Ok(ResolutionMode::Hash));
        assert!("merge".parse::<ResolutionMode>().is_err());
        assert_eq!(ResolutionMode::Array.to_string(), "array");
    }

    #[test]
    fn test_empty_answers_are_absent() {
        for mode in [ResolutionMode::First, ResolutionMode::Array, ResolutionMode::Hash] {
            let answer = Answer::new(mode);
            assert_eq!(answer.mode(), mode);
            assert_eq!(answer.into_value(), None);
        }
    }

    #[test]
    fn test_first_stops() {
        let mut answer = Answer::new(ResolutionMode::First);
        assert_eq!(answer.fold("common", Value::from("x")).unwrap(), Flow::Stop);
        assert_eq!(answer.into_value(), Some(Value::from("x")));
    }

    #[test]
    fn test_array_pushes_each_contribution() {
        let mut answer = Answer::new(ResolutionMode::Array);
        answer.fold("a", Value::from("one")).unwrap();
        answer.fold("b", Value::Sequence(vec![Value::Integer(2), Value::Integer(3)])).unwrap();
        assert_eq!(answer.fold("c", Value::Bool(true)).unwrap(), Flow::Continue);

        assert_eq!(answer.contributions(), 3);
        assert_eq!(
            answer.into_value(),
            Some(Value::Sequence(vec![
                Value::from("one"),
                Value::Sequence(vec![Value::Integer(2), Value::Integer(3)]),
                Value::Bool(true),
            ]))
        );
    }

    #[test]
    fn test_array_rejects_mapping_and_null() {
        let mut answer = Answer::new(ResolutionMode::Array);
        answer.fold("a", Value::from("one")).unwrap();

        let err = answer.fold("nodes/web01", Value::Mapping(Mapping::new())).unwrap_err();
        match err {
            LookupError::TypeMismatch { datasource, mode, expected, actual } => {
                assert_eq!(datasource, "nodes/web01");
                assert_eq!(mode, ResolutionMode::Array);
                assert_eq!(expected, "Array or String");
                assert_eq!(actual, "Hash");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(answer.fold("b", Value::Null).is_err());
        assert_eq!(answer.contributions(), 1);
    }

    #[test]
    fn test_hash_rejects_scalar() {
        let mut answer = Answer::new(ResolutionMode::Hash);
        let err = answer.fold("common", Value::Integer(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Hiera type mismatch in common (hash lookup): expected Hash and got Integer"
        );
    }

    #[test]
    fn test_hash_deep_merge() {
        let mut answer = Answer::new(ResolutionMode::Hash);
        answer
            .fold("s1", Value::Mapping(map(&[
                ("a", Value::Integer(1)),
                ("b", Value::Mapping(map(&[("x", Value::Integer(1))]))),
            ])))
            .unwrap();
        answer
            .fold("s2", Value::Mapping(map(&[
                ("b", Value::Mapping(map(&[("y", Value::Integer(2))]))),
                ("c", Value::Integer(3)),
            ])))
            .unwrap();

        let expected = map(&[
            ("a", Value::Integer(1)),
            ("b", Value::Mapping(map(&[("x", Value::Integer(1)), ("y", Value::Integer(2))]))),
            ("c", Value::Integer(3)),
        ]);
        assert_eq!(answer.into_value(), Some(Value::Mapping(expected)));
    }

    #[test]
    fn test_merge_answer_contributed_wins_on_conflict() {
        let existing = map(&[
            ("keep", Value::from("old")),
            ("swap", Value::Mapping(map(&[("x", Value::Integer(1))]))),
            ("deep", Value::Mapping(map(&[("x", Value::Integer(1)), ("y", Value::Integer(1))]))),
        ]);
        let contributed = map(&[
            ("swap", Value::from("now a string")),
            ("deep", Value::Mapping(map(&[("y", Value::Integer(2))]))),
        ]);

        let merged = merge_answer(contributed, existing);
        let keys: Vec<_> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["keep", "swap", "deep"]);
        assert_eq!(merged["swap"], Value::from("now a string"));
        assert_eq!(
            merged["deep"],
            Value::Mapping(map(&[("x", Value::Integer(1)), ("y", Value::Integer(2))]))
        );
    }

    #[test]
    fn test_seeded_hash() {
        let mut answer = Answer::seeded_hash(map(&[("from_seed", Value::Bool(true))]));
        assert_eq!(answer.mode(), ResolutionMode::Hash);
        answer.fold("common", Value::Mapping(map(&[("a", Value::Integer(1))]))).unwrap();

        let value = answer.into_value().unwrap();
        let merged = value.as_mapping().unwrap();
        assert_eq!(merged["from_seed"], Value::Bool(true));
        assert_eq!(merged["a"], Value::Integer(1));
    }
}
