//! Per-slot accumulators for the eight aggregate functions.
//!
//! Numeric aggregates silently skip string data. Every accumulator is
//! finalized into a plain [`Value`] once all rows have been folded in.

use rand::Rng;
use indexmap::IndexSet;

use crate::query::spec::Aggregate;
use crate::query::value::Value;
use crate::storage::Scalar;

/// Running state of one aggregate slot.
#[derive(Clone, Debug)]
pub(crate) enum Accumulator {
    First(Scalar),
    Sum(i64),
    Max(i32),
    Min(i32),
    List(Vec<Scalar>),
    Set(IndexSet<Scalar>),
    Random {
        data: Scalar,
        n: u32,
    },
    Avg {
        sum: i64,
        n: u32,
    },
}

impl Accumulator {
    /// Starts a slot from its first datum. `None` when the aggregate cannot
    /// use the datum and has nothing to report yet.
    pub(crate) fn start(aggregate: Aggregate, datum: Scalar) -> Option<Self> {
        match aggregate {
            Aggregate::First => Some(Accumulator::First(datum)),
            Aggregate::Sum => datum.as_int().map(|v| Accumulator::Sum(i64::from(v))),
            Aggregate::Max => datum.as_int().map(Accumulator::Max),
            Aggregate::Min => datum.as_int().map(Accumulator::Min),
            Aggregate::List => Some(Accumulator::List(vec![datum])),
            Aggregate::Set => Some(Accumulator::Set(IndexSet::from([datum]))),
            Aggregate::Random => Some(Accumulator::Random { data: datum, n: 1 }),
            Aggregate::Avg => Some(match datum.as_int() {
                Some(v) => Accumulator::Avg {
                    sum: i64::from(v),
                    n: 1,
                },
                None => Accumulator::Avg { sum: 0, n: 0 },
            }),
        }
    }

    /// Folds one more datum into the slot.
    pub(crate) fn push<R: Rng>(&mut self, datum: Scalar, rng: &mut R) {
        match self {
            Accumulator::First(_) => {}
            Accumulator::Sum(sum) => {
                if let Some(v) = datum.as_int() {
                    *sum += i64::from(v);
                }
            }
            Accumulator::Max(max) => {
                if let Some(v) = datum.as_int() {
                    *max = (*max).max(v);
                }
            }
            Accumulator::Min(min) => {
                if let Some(v) = datum.as_int() {
                    *min = (*min).min(v);
                }
            }
            Accumulator::List(items) => items.push(datum),
            Accumulator::Set(items) => {
                items.insert(datum);
            }
            Accumulator::Random { data, n } => {
                *n = n.saturating_add(1);
                if rng.gen_range(0..*n) == 0 {
                    *data = datum;
                }
            }
            Accumulator::Avg { sum, n } => {
                if let Some(v) = datum.as_int() {
                    *sum += i64::from(v);
                    *n = n.saturating_add(1);
                }
            }
        }
    }

    /// Final value of the slot.
    pub(crate) fn finish(self) -> Value {
        match self {
            Accumulator::First(data) | Accumulator::Random { data, .. } => data.into(),
            Accumulator::Sum(sum) => Value::Int(saturate(sum)),
            Accumulator::Max(v) | Accumulator::Min(v) => Value::Int(v),
            Accumulator::List(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Accumulator::Set(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Accumulator::Avg { sum, n } => {
                if n == 0 {
                    Value::Int(0)
                } else {
                    Value::Int(saturate(sum / i64::from(n)))
                }
            }
        }
    }
}

fn saturate(v: i64) -> i32 {
    i32::try_from(v).unwrap_or(if v < 0 { i32::MIN } else { i32::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fold(aggregate: Aggregate, data: &[Scalar]) -> Option<Value> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut acc: Option<Accumulator> = None;
        for datum in data {
            if let Some(slot) = acc.as_mut() {
                slot.push(datum.clone(), &mut rng);
                continue;
            }
            acc = Accumulator::start(aggregate, datum.clone());
        }
        acc.map(Accumulator::finish)
    }

    fn ints(values: &[i32]) -> Vec<Scalar> {
        values.iter().copied().map(Scalar::Int).collect()
    }

    #[test]
    fn first_keeps_earliest() {
        assert_eq!(fold(Aggregate::First, &ints(&[4, 1, 9])), Some(Value::Int(4)));
    }

    #[test]
    fn numeric_aggregates() {
        let data = ints(&[4, 1, 9]);
        assert_eq!(fold(Aggregate::Sum, &data), Some(Value::Int(14)));
        assert_eq!(fold(Aggregate::Max, &data), Some(Value::Int(9)));
        assert_eq!(fold(Aggregate::Min, &data), Some(Value::Int(1)));
        assert_eq!(fold(Aggregate::Avg, &data), Some(Value::Int(4)));
    }

    #[test]
    fn numeric_aggregates_skip_strings() {
        let data = vec![Scalar::from("x"), Scalar::Int(3), Scalar::from("y")];
        assert_eq!(fold(Aggregate::Sum, &data), Some(Value::Int(3)));
        assert_eq!(fold(Aggregate::Max, &data), Some(Value::Int(3)));
        assert_eq!(fold(Aggregate::Sum, &[Scalar::from("x")]), None);
        assert_eq!(fold(Aggregate::Avg, &[Scalar::from("x")]), Some(Value::Int(0)));
    }

    #[test]
    fn sum_saturates_to_i32() {
        let data = ints(&[i32::MAX, i32::MAX]);
        assert_eq!(fold(Aggregate::Sum, &data), Some(Value::Int(i32::MAX)));
        assert_eq!(fold(Aggregate::Avg, &data), Some(Value::Int(i32::MAX)));
    }

    #[test]
    fn list_and_set() {
        let data = vec![
            Scalar::from("a"),
            Scalar::Int(1),
            Scalar::from("a".to_owned()),
            Scalar::Int(1),
        ];
        assert_eq!(
            fold(Aggregate::List, &data),
            Some(Value::List(vec!["a".into(), 1.into(), "a".into(), 1.into()]))
        );
        assert_eq!(
            fold(Aggregate::Set, &data),
            Some(Value::List(vec!["a".into(), 1.into()]))
        );
    }

    #[test]
    fn random_picks_a_seen_value() {
        let data = ints(&[10, 20, 30, 40]);
        let picked = fold(Aggregate::Random, &data).and_then(|v| v.as_int()).unwrap();
        assert!([10, 20, 30, 40].contains(&picked));
    }
}
