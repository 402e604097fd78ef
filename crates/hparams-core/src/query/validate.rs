//! Request validation.
//!
//! Turns a [`ListSessionGroupsRequest`] into a [`ValidatedQuery`] with
//! compiled predicates, or rejects it with a field-level [`QueryError`].

use std::collections::HashSet;

use regex::Regex;

use crate::config::EngineConfig;
use crate::domain::experiment::DataType;
use crate::domain::session::SessionStatus;
use crate::query::aggregator::AggregationSpec;
use crate::query::error::{QueryError, QueryResult};
use crate::query::filter::Predicate;
use crate::query::request::{
    Column, Filter, ListSessionGroupsRequest, MissingValuesOrder, SortOrder,
};
use crate::query::resolver::ColumnCatalog;

/// One request column after validation.
#[derive(Debug, Clone)]
pub struct ValidatedColumn {
    pub column: Column,
    pub data_type: DataType,
    pub order: SortOrder,
    pub missing_values: MissingValuesOrder,
    pub predicate: Option<Predicate>,
    pub exclude_missing: bool,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    pub columns: Vec<ValidatedColumn>,
    pub aggregation: AggregationSpec,
    /// Sorted and deduplicated; empty admits every status.
    pub allowed_statuses: Vec<SessionStatus>,
    pub start_index: usize,
    pub slice_size: usize,
}

impl ValidatedQuery {
    pub fn admits_status(&self, status: SessionStatus) -> bool {
        self.allowed_statuses.is_empty() || self.allowed_statuses.binary_search(&status).is_ok()
    }

    pub fn column_refs(&self) -> Vec<Column> {
        self.columns.iter().map(|c| c.column.clone()).collect()
    }
}

/// Validate `request` against the columns of one snapshot.
pub fn validate(
    request: &ListSessionGroupsRequest,
    catalog: &ColumnCatalog,
    config: &EngineConfig,
) -> QueryResult<ValidatedQuery> {
    let start_index = non_negative("start_index", request.start_index)?;
    let slice_size = non_negative("slice_size", request.slice_size)?;
    if slice_size > config.max_slice_size {
        return Err(QueryError::SliceTooLarge {
            field: "slice_size".to_string(),
            value: slice_size,
            max: config.max_slice_size,
        });
    }

    let aggregation = AggregationSpec::new(
        request.aggregation_type,
        request.aggregation_metric.clone(),
    );
    if request.aggregation_type.needs_metric() {
        match &aggregation.metric {
            None => {
                return Err(QueryError::MissingAggregationMetric {
                    field: "aggregation_metric".to_string(),
                    aggregation: request.aggregation_type.to_string(),
                })
            }
            Some(metric) if !catalog.has_metric(metric) => {
                return Err(QueryError::UnknownAggregationMetric {
                    field: "aggregation_metric".to_string(),
                    metric: metric.to_string(),
                })
            }
            Some(_) => {}
        }
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(request.col_params.len());
    for (idx, spec) in request.col_params.iter().enumerate() {
        let field = format!("col_params[{idx}]");
        let data_type =
            catalog
                .data_type(&spec.column)
                .ok_or_else(|| QueryError::UnknownColumn {
                    field: format!("{field}.column"),
                    column: spec.column.to_string(),
                })?;
        if !seen.insert(&spec.column) {
            return Err(QueryError::DuplicateColumn {
                field: format!("{field}.column"),
                column: spec.column.to_string(),
            });
        }

        let predicate = spec
            .filter
            .as_ref()
            .map(|filter| compile_filter(&format!("{field}.filter"), &spec.column, data_type, filter))
            .transpose()?;

        columns.push(ValidatedColumn {
            column: spec.column.clone(),
            data_type,
            order: spec.order,
            missing_values: spec.missing_values,
            predicate,
            exclude_missing: spec.exclude_missing_values,
        });
    }

    let mut allowed_statuses = request.allowed_statuses.clone();
    allowed_statuses.sort();
    allowed_statuses.dedup();

    Ok(ValidatedQuery {
        columns,
        aggregation,
        allowed_statuses,
        start_index,
        slice_size,
    })
}

fn non_negative(field: &str, value: i64) -> QueryResult<usize> {
    usize::try_from(value).map_err(|_| QueryError::NegativeIndex {
        field: field.to_string(),
        value,
    })
}

fn compile_filter(
    field: &str,
    column: &Column,
    data_type: DataType,
    filter: &Filter,
) -> QueryResult<Predicate> {
    let mismatch = |kind: &str| QueryError::FilterTypeMismatch {
        field: field.to_string(),
        column: column.to_string(),
        filter: kind.to_string(),
        data_type,
    };

    match filter {
        Filter::Regexp { pattern } => {
            if data_type != DataType::String {
                return Err(mismatch("regexp"));
            }
            let re = Regex::new(pattern).map_err(|source| QueryError::InvalidRegexp {
                field: field.to_string(),
                source,
            })?;
            Ok(Predicate::Regexp(re))
        }
        Filter::Interval {
            min_value,
            max_value,
        } => {
            if data_type != DataType::Float64 {
                return Err(mismatch("interval"));
            }
            if min_value.is_nan() || max_value.is_nan() || min_value > max_value {
                return Err(QueryError::InvalidInterval {
                    field: field.to_string(),
                    min_value: *min_value,
                    max_value: *max_value,
                });
            }
            Ok(Predicate::Interval {
                min_value: *min_value,
                max_value: *max_value,
            })
        }
        Filter::Discrete { values } => {
            if let Some(bad) = values.iter().find(|v| v.data_type() != data_type) {
                return Err(QueryError::DiscreteValueTypeMismatch {
                    field: field.to_string(),
                    value: bad.to_string(),
                    data_type,
                });
            }
            Ok(Predicate::Discrete(values.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::experiment::{ExperimentInfo, HParamInfo, HParamValue, MetricInfo, MetricName};
    use crate::domain::session::Session;
    use crate::query::request::{AggregationType, ColumnSpec};

    fn catalog() -> ColumnCatalog {
        let experiment = ExperimentInfo::new("exp")
            .with_hparam(HParamInfo::new("lr", DataType::Float64))
            .with_hparam(HParamInfo::new("optimizer", DataType::String))
            .with_metric(MetricInfo::new(MetricName::tag("accuracy")));
        let sessions: Vec<Arc<Session>> = Vec::new();
        ColumnCatalog::build(&experiment, &sessions)
    }

    fn run(request: ListSessionGroupsRequest) -> QueryResult<ValidatedQuery> {
        validate(&request, &catalog(), &EngineConfig::default())
    }

    #[test]
    fn test_valid_request_compiles() {
        let query = run(ListSessionGroupsRequest::new(10)
            .with_column(ColumnSpec::new(Column::hparam("optimizer")).with_filter(
                Filter::Regexp {
                    pattern: "^ad".to_string(),
                },
            ))
            .with_column(ColumnSpec::new(Column::metric("accuracy")).descending()))
        .expect("valid");
        assert_eq!(query.columns.len(), 2);
        assert!(matches!(query.columns[0].predicate, Some(Predicate::Regexp(_))));
        assert_eq!(query.columns[1].data_type, DataType::Float64);
    }

    #[test]
    fn test_negative_start_index_rejected() {
        let err = run(ListSessionGroupsRequest::new(10).starting_at(-1)).unwrap_err();
        assert_eq!(err.field(), Some("start_index"));
    }

    #[test]
    fn test_negative_slice_size_rejected() {
        let err = run(ListSessionGroupsRequest::new(-5)).unwrap_err();
        assert_eq!(err.field(), Some("slice_size"));
    }

    #[test]
    fn test_slice_size_capped() {
        let err = run(ListSessionGroupsRequest::new(1_000_000)).unwrap_err();
        assert!(matches!(err, QueryError::SliceTooLarge { .. }));
    }

    #[test]
    fn test_median_requires_metric() {
        let err = run(ListSessionGroupsRequest::new(10).with_aggregation(AggregationType::Median, None))
            .unwrap_err();
        assert!(matches!(err, QueryError::MissingAggregationMetric { .. }));
        assert_eq!(err.field(), Some("aggregation_metric"));
    }

    #[test]
    fn test_avg_ignores_unknown_metric() {
        let query = run(ListSessionGroupsRequest::new(10)
            .with_aggregation(AggregationType::Avg, Some(MetricName::tag("nope"))))
        .expect("valid");
        assert!(query.aggregation.metric.is_none());
    }

    #[test]
    fn test_unknown_aggregation_metric() {
        let err = run(ListSessionGroupsRequest::new(10)
            .with_aggregation(AggregationType::Max, Some(MetricName::tag("nope"))))
        .unwrap_err();
        assert!(matches!(err, QueryError::UnknownAggregationMetric { .. }));
    }

    #[test]
    fn test_unknown_column() {
        let err = run(ListSessionGroupsRequest::new(10)
            .with_column(ColumnSpec::new(Column::hparam("batch_size"))))
        .unwrap_err();
        assert_eq!(err.field(), Some("col_params[0].column"));
    }

    #[test]
    fn test_duplicate_column() {
        let err = run(ListSessionGroupsRequest::new(10)
            .with_column(ColumnSpec::new(Column::hparam("lr")))
            .with_column(ColumnSpec::new(Column::hparam("lr")).ascending()))
        .unwrap_err();
        assert!(matches!(err, QueryError::DuplicateColumn { .. }));
        assert_eq!(err.field(), Some("col_params[1].column"));
    }

    #[test]
    fn test_regexp_on_numeric_column_rejected() {
        let err = run(ListSessionGroupsRequest::new(10).with_column(
            ColumnSpec::new(Column::hparam("lr")).with_filter(Filter::Regexp {
                pattern: "0.1".to_string(),
            }),
        ))
        .unwrap_err();
        assert!(matches!(err, QueryError::FilterTypeMismatch { .. }));
        assert_eq!(err.field(), Some("col_params[0].filter"));
    }

    #[test]
    fn test_interval_on_string_column_rejected() {
        let err = run(ListSessionGroupsRequest::new(10).with_column(
            ColumnSpec::new(Column::hparam("optimizer")).with_filter(Filter::Interval {
                min_value: 0.0,
                max_value: 1.0,
            }),
        ))
        .unwrap_err();
        assert!(matches!(err, QueryError::FilterTypeMismatch { .. }));
    }

    #[test]
    fn test_inverted_interval_rejected() {
        let err = run(ListSessionGroupsRequest::new(10).with_column(
            ColumnSpec::new(Column::metric("accuracy")).with_filter(Filter::Interval {
                min_value: 1.0,
                max_value: 0.0,
            }),
        ))
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidInterval { .. }));
    }

    #[test]
    fn test_bad_regexp_rejected() {
        let err = run(ListSessionGroupsRequest::new(10).with_column(
            ColumnSpec::new(Column::hparam("optimizer")).with_filter(Filter::Regexp {
                pattern: "(unclosed".to_string(),
            }),
        ))
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidRegexp { .. }));
    }

    #[test]
    fn test_discrete_value_type_checked() {
        let err = run(ListSessionGroupsRequest::new(10).with_column(
            ColumnSpec::new(Column::hparam("lr")).with_filter(Filter::Discrete {
                values: vec![HParamValue::from(0.1), HParamValue::from("0.2")],
            }),
        ))
        .unwrap_err();
        assert!(matches!(err, QueryError::DiscreteValueTypeMismatch { .. }));
    }

    #[test]
    fn test_statuses_sorted_and_deduplicated() {
        let query = run(ListSessionGroupsRequest::new(10).with_statuses(vec![
            SessionStatus::Running,
            SessionStatus::Success,
            SessionStatus::Running,
        ]))
        .expect("valid");
        assert_eq!(
            query.allowed_statuses,
            vec![SessionStatus::Success, SessionStatus::Running]
        );
        assert!(query.admits_status(SessionStatus::Running));
        assert!(!query.admits_status(SessionStatus::Failure));
    }
}
