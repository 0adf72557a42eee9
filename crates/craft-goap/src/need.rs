//! What it takes to move one fact from its current value to a required one.

use craft_core::{evaluate, CompareOp, Condition, Effect, FactValue};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Need {
    /// Count must grow by this much.
    Raise(i64),
    /// Count must shrink by this much.
    Lower(i64),
    Flag(bool),
    Text(String),
    /// The fact is absent but any value of the right kind would do.
    Touch,
}

impl Need {
    /// `None` when `current` already satisfies `condition`.
    pub(crate) fn of(condition: &Condition, current: Option<&FactValue>) -> Option<Self> {
        if evaluate(current, condition) {
            return None;
        }

        let need = match condition {
            Condition::Bool(b) => Need::Flag(*b),
            Condition::Text(s) => Need::Text(s.clone()),
            Condition::Compare { op, value } => {
                let have = current.and_then(FactValue::as_number).unwrap_or(0);
                let present = current.and_then(FactValue::as_number).is_some();
                let value = *value;
                match op {
                    CompareOp::Ge | CompareOp::Gt => {
                        let floor = condition.numeric_floor().unwrap_or(0);
                        Need::Raise(floor.saturating_sub(have).max(1))
                    }
                    CompareOp::Eq if value > have as f64 => Need::Raise((value.ceil() as i64).saturating_sub(have).max(1)),
                    CompareOp::Eq if value < have as f64 => Need::Lower(have.saturating_sub(value.floor() as i64).max(1)),
                    CompareOp::Le | CompareOp::Lt if present => {
                        let ceiling = if *op == CompareOp::Le {
                            value.floor() as i64
                        } else {
                            (value.ceil() as i64).saturating_sub(1)
                        };
                        Need::Lower(have.saturating_sub(ceiling).max(1))
                    }
                    CompareOp::Ne if present => Need::Raise(1),
                    _ => Need::Touch,
                }
            }
        };
        Some(need)
    }

    /// How many applications of `effect` close this need, or `None` if it cannot.
    pub(crate) fn repeats(&self, effect: &Effect, current: Option<&FactValue>) -> Option<u64> {
        let have = current.and_then(FactValue::as_number).unwrap_or(0);
        match (self, effect) {
            (Need::Raise(deficit), Effect::Delta(_)) => {
                let gain = effect.gain_from(have);
                (gain > 0).then(|| div_ceil(*deficit, gain))
            }
            (Need::Raise(deficit), Effect::Set(_)) => (effect.gain_from(have) >= *deficit).then_some(1),
            (Need::Lower(excess), Effect::Delta(_)) => {
                let loss = effect.loss_from(have);
                (loss > 0).then(|| div_ceil(*excess, loss))
            }
            (Need::Lower(excess), Effect::Set(_)) => (effect.loss_from(have) >= *excess).then_some(1),
            (Need::Flag(want), Effect::Bool(b)) => (want == b).then_some(1),
            (Need::Text(want), Effect::Text(s)) => (want == s).then_some(1),
            (Need::Touch, _) => Some(1),
            _ => None,
        }
    }

    /// Units still missing, for reports.
    pub(crate) fn deficit(&self) -> Option<i64> {
        match self {
            Need::Raise(n) | Need::Lower(n) => Some(*n),
            _ => None,
        }
    }
}

fn div_ceil(a: i64, b: i64) -> u64 {
    (a / b + i64::from(a % b != 0)).max(1) as u64
}
