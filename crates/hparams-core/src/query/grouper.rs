//! Partition sessions by their canonical hyperparameter tuple.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::experiment::HParamValue;
use crate::domain::session::Session;
use crate::query::resolver::HParamColumn;

/// One component of a canonical grouping key.
///
/// Numbers are keyed by their bit pattern after folding `-0.0` into `0.0`
/// and all NaNs into one NaN, so hashing agrees with numeric equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Unset,
    Bool(bool),
    Number(u64),
    String(String),
}

impl From<Option<&HParamValue>> for KeyPart {
    fn from(value: Option<&HParamValue>) -> Self {
        match value {
            None => KeyPart::Unset,
            Some(HParamValue::Bool(b)) => KeyPart::Bool(*b),
            Some(HParamValue::Number(n)) => KeyPart::Number(canonical_bits(*n)),
            Some(HParamValue::String(s)) => KeyPart::String(s.clone()),
        }
    }
}

fn canonical_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

/// Canonical key: one part per catalog hyperparameter, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey(Vec<KeyPart>);

impl CanonicalKey {
    pub fn of(session: &Session, hparams: &[HParamColumn]) -> Self {
        CanonicalKey(
            hparams
                .iter()
                .map(|h| KeyPart::from(session.hparams.get(&h.name)))
                .collect(),
        )
    }
}

/// Sessions sharing one canonical key, before aggregation.
#[derive(Debug, Clone)]
pub struct SessionBucket {
    /// The hyperparameters the member sessions set.
    pub hparams: BTreeMap<String, HParamValue>,
    /// Member sessions in input order.
    pub sessions: Vec<Arc<Session>>,
}

/// Partition `sessions` into buckets of identical canonical keys.
///
/// Buckets come out in order of first appearance. Every input session lands
/// in exactly one bucket.
pub fn group_sessions<'a, I>(sessions: I, hparams: &[HParamColumn]) -> Vec<SessionBucket>
where
    I: IntoIterator<Item = &'a Arc<Session>>,
{
    let mut index: HashMap<CanonicalKey, usize> = HashMap::new();
    let mut buckets: Vec<SessionBucket> = Vec::new();

    for session in sessions {
        let key = CanonicalKey::of(session, hparams);
        match index.get(&key) {
            Some(&idx) => buckets[idx].sessions.push(Arc::clone(session)),
            None => {
                index.insert(key, buckets.len());
                buckets.push(SessionBucket {
                    hparams: hparams
                        .iter()
                        .filter_map(|h| {
                            session
                                .hparams
                                .get(&h.name)
                                .map(|v| (h.name.clone(), v.clone()))
                        })
                        .collect(),
                    sessions: vec![Arc::clone(session)],
                });
            }
        }
    }

    buckets
}
