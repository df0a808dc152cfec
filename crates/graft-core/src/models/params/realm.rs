//! Value realms of tunable parameters

use crate::literal::{self, Value};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt::{self, Display, Formatter};

/// Rejection-sampling attempts before falling back to a uniform draw
const MAX_DRAWS: usize = 1000;

/// Set of values a parameter may take
#[derive(Debug, Clone, PartialEq)]
pub enum Realm {
    /// One of a fixed list of strings
    Categorical(Vec<String>),
    /// Float drawn uniformly from `[start, stop]`
    Uniform { start: f64, stop: f64 },
    /// Integer drawn uniformly from `[start, stop]`
    UniformInt { start: i64, stop: i64 },
    /// Float biased towards `start` (or towards 0 across a sign change)
    Exponential {
        start: f64,
        stop: f64,
        lambda: Option<f64>,
    },
    /// Integer biased towards `start` (or towards 0 across a sign change)
    Geometric {
        start: i64,
        stop: i64,
        lambda: Option<f64>,
    },
}

impl Realm {
    /// Whether `value` lies in the realm
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Categorical(values), Value::Str(s)) => values.contains(s),
            (Self::Uniform { start, stop } | Self::Exponential { start, stop, .. }, v) => {
                v.as_f64().is_some_and(|x| *start <= x && x <= *stop)
            }
            (Self::UniformInt { start, stop } | Self::Geometric { start, stop, .. }, Value::Int(i)) => {
                start <= i && i <= stop
            }
            _ => false,
        }
    }

    /// Draw a random value
    #[allow(clippy::cast_possible_truncation)]
    pub fn random_value<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            Self::Categorical(values) => values
                .choose(rng)
                .map_or(Value::None, |s| Value::Str(s.clone())),
            Self::Uniform { start, stop } => Value::Float(uniform(rng, *start, *stop)),
            Self::UniformInt { start, stop } => Value::Int(rng.gen_range(*start..=*stop)),
            Self::Exponential { start, stop, lambda } => {
                Value::Float(signed_draw(rng, *start, *stop, |rng, lo, hi| {
                    exponential(rng, lo, hi, *lambda)
                }))
            }
            Self::Geometric { start, stop, lambda } => {
                #[allow(clippy::cast_precision_loss)]
                let x = signed_draw(rng, *start as f64, *stop as f64, |rng, lo, hi| {
                    geometric(rng, lo, hi, *lambda)
                });
                Value::Int(x.round() as i64)
            }
        }
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, start: f64, stop: f64) -> f64 {
    if start < stop {
        rng.gen_range(start..=stop)
    } else {
        start
    }
}

fn expovariate<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> f64 {
    let u: f64 = rng.gen();
    -(1.0 - u).ln() / lambda
}

/// Draw on `[start, stop]` with a sampler for non-negative intervals
fn signed_draw<R, F>(rng: &mut R, start: f64, stop: f64, sample: F) -> f64
where
    R: Rng + ?Sized,
    F: Fn(&mut R, f64, f64) -> f64,
{
    if start >= 0.0 {
        sample(rng, start, stop)
    } else if stop <= 0.0 {
        -sample(rng, -stop, -start)
    } else if rng.gen_bool(0.5) {
        sample(rng, 0.0, stop)
    } else {
        -sample(rng, 0.0, -start)
    }
}

fn default_lambda(start: f64, stop: f64, lambda: Option<f64>) -> f64 {
    lambda
        .map(f64::abs)
        .filter(|l| *l > 0.0)
        .unwrap_or_else(|| 10.0 / (stop - start).max(f64::EPSILON))
}

fn exponential<R: Rng + ?Sized>(rng: &mut R, start: f64, stop: f64, lambda: Option<f64>) -> f64 {
    let lambda = default_lambda(start, stop, lambda);
    for _ in 0..MAX_DRAWS {
        let x = expovariate(rng, lambda);
        if x <= stop - start {
            return start + x;
        }
    }
    uniform(rng, start, stop)
}

fn geometric<R: Rng + ?Sized>(rng: &mut R, start: f64, stop: f64, lambda: Option<f64>) -> f64 {
    let lambda = default_lambda(start, stop, lambda);
    for _ in 0..MAX_DRAWS {
        let x = expovariate(rng, lambda).trunc();
        if x <= stop - start {
            return start + x;
        }
    }
    uniform(rng, start, stop).round()
}

impl Display for Realm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let lambda = |l: &Option<f64>| l.map(|l| format!(",{}", literal::format_float(l))).unwrap_or_default();
        match self {
            Self::Categorical(values) => write!(f, "{{{}}}", values.join(",")),
            Self::Uniform { start, stop } => {
                write!(f, "({},{})", literal::format_float(*start), literal::format_float(*stop))
            }
            Self::UniformInt { start, stop } => write!(f, "[{start},{stop}]"),
            Self::Exponential { start, stop, lambda: l } => write!(
                f,
                "e({},{}{})",
                literal::format_float(*start),
                literal::format_float(*stop),
                lambda(l)
            ),
            Self::Geometric { start, stop, lambda: l } => write!(f, "g[{start},{stop}{}]", lambda(l)),
        }
    }
}
