//! Column catalog and per-group column resolution.
//!
//! The catalog lists every column a request may reference: declared
//! hyperparameters in declaration order, then hyperparameters only observed
//! in session data (sorted by id), plus declared and observed metrics.
//! Observed-but-undeclared fields are tolerated and flagged.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::experiment::{DataType, ExperimentInfo, HParamValue, MetricName};
use crate::domain::session::Session;
use crate::metrics::METRICS;
use crate::obs::{emit_inconsistent_value, emit_undeclared_field};
use crate::query::request::Column;
use crate::query::response::SessionGroup;

/// A hyperparameter column known to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct HParamColumn {
    pub name: String,
    pub data_type: DataType,
    pub declared: bool,
}

/// Columns addressable by a request against one snapshot.
#[derive(Debug, Clone, Default)]
pub struct ColumnCatalog {
    hparams: Vec<HParamColumn>,
    hparam_index: HashMap<String, usize>,
    metrics: BTreeMap<MetricName, bool>,
}

impl ColumnCatalog {
    /// Build the catalog from the experiment declaration and the sessions.
    pub fn build(experiment: &ExperimentInfo, sessions: &[Arc<Session>]) -> Self {
        let mut catalog = Self::default();
        for info in &experiment.hparam_infos {
            catalog.push_hparam(HParamColumn {
                name: info.name.clone(),
                data_type: info.data_type,
                declared: true,
            });
        }
        for info in &experiment.metric_infos {
            catalog.metrics.insert(info.name.clone(), true);
        }

        let mut undeclared: BTreeMap<&str, DataType> = BTreeMap::new();
        for session in sessions {
            for (id, value) in &session.hparams {
                match catalog.hparam_index.get(id.as_str()) {
                    Some(&idx) => {
                        let expected = catalog.hparams[idx].data_type;
                        if value.data_type() != expected {
                            METRICS.inc_inconsistent_values();
                            emit_inconsistent_value(&session.name, id, expected, value.data_type());
                        }
                    }
                    None => {
                        undeclared.entry(id.as_str()).or_insert_with(|| value.data_type());
                    }
                }
            }
            for obs in &session.metrics {
                if !catalog.metrics.contains_key(&obs.name) {
                    METRICS.inc_undeclared_fields();
                    emit_undeclared_field("metric", &obs.name.to_string());
                    catalog.metrics.insert(obs.name.clone(), false);
                }
            }
        }

        for (id, data_type) in undeclared {
            METRICS.inc_undeclared_fields();
            emit_undeclared_field("hparam", id);
            catalog.push_hparam(HParamColumn {
                name: id.to_string(),
                data_type,
                declared: false,
            });
        }

        catalog
    }

    fn push_hparam(&mut self, column: HParamColumn) {
        if self.hparam_index.contains_key(&column.name) {
            return;
        }
        self.hparam_index.insert(column.name.clone(), self.hparams.len());
        self.hparams.push(column);
    }

    /// Hyperparameter columns in canonical key order.
    pub fn hparams(&self) -> &[HParamColumn] {
        &self.hparams
    }

    pub fn hparam(&self, name: &str) -> Option<&HParamColumn> {
        self.hparam_index.get(name).map(|&idx| &self.hparams[idx])
    }

    pub fn has_metric(&self, name: &MetricName) -> bool {
        self.metrics.contains_key(name)
    }

    /// Declared type of a column, or `None` if the catalog does not know it.
    pub fn data_type(&self, column: &Column) -> Option<DataType> {
        match column {
            Column::Hparam(name) => self.hparam(name).map(|h| h.data_type),
            Column::Metric(name) => self.has_metric(name).then_some(DataType::Float64),
        }
    }
}

/// A present column value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    Bool(bool),
    Number(f64),
    String(&'a str),
}

impl<'a> Scalar<'a> {
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Number(a), Scalar::Number(b)) => a.total_cmp(b),
            (Scalar::String(a), Scalar::String(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Scalar::Bool(_) => 0,
            Scalar::Number(_) => 1,
            Scalar::String(_) => 2,
        }
    }

    /// Type-aware equality against a hyperparameter value; numbers compare
    /// numerically.
    pub fn equals(&self, value: &HParamValue) -> bool {
        match (self, value) {
            (Scalar::Bool(a), HParamValue::Bool(b)) => a == b,
            (Scalar::Number(a), HParamValue::Number(b)) => a == b,
            (Scalar::String(a), HParamValue::String(b)) => *a == b.as_str(),
            _ => false,
        }
    }
}

impl<'a> From<&'a HParamValue> for Scalar<'a> {
    fn from(value: &'a HParamValue) -> Self {
        match value {
            HParamValue::Bool(b) => Scalar::Bool(*b),
            HParamValue::Number(n) => Scalar::Number(*n),
            HParamValue::String(s) => Scalar::String(s),
        }
    }
}

/// A resolved column value: a concrete scalar or the missing sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnValue<'a> {
    Missing,
    Present(Scalar<'a>),
}

impl<'a> ColumnValue<'a> {
    pub fn is_missing(&self) -> bool {
        matches!(self, ColumnValue::Missing)
    }
}

/// Resolve one column against one group.
pub fn resolve<'g>(column: &Column, group: &'g SessionGroup) -> ColumnValue<'g> {
    match column {
        Column::Hparam(name) => group
            .hparams
            .get(name)
            .map_or(ColumnValue::Missing, |v| ColumnValue::Present(v.into())),
        Column::Metric(name) => group
            .metric_value(name)
            .map_or(ColumnValue::Missing, |mv| {
                ColumnValue::Present(Scalar::Number(mv.value))
            }),
    }
}

/// A group with its requested columns resolved, in request column order.
#[derive(Debug, Clone)]
pub struct ResolvedRow<'g> {
    pub group: &'g SessionGroup,
    pub values: Vec<ColumnValue<'g>>,
}

/// Resolve every requested column for every group.
pub fn resolve_rows<'g>(columns: &[Column], groups: &'g [SessionGroup]) -> Vec<ResolvedRow<'g>> {
    groups
        .iter()
        .map(|group| ResolvedRow {
            group,
            values: columns.iter().map(|c| resolve(c, group)).collect(),
        })
        .collect()
}
