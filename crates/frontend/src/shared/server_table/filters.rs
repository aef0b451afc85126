//! Перевод состояния таблицы в фильтры и сортировку серверного запроса.
//!
//! Pure functions. A filter value in a shape the server cannot express is
//! dropped, never turned into an error.

use contracts::shared::list_query::{FilterOperator, FilterPredicate, SortDirection, SortSpec};
use serde_json::{json, Value};

use super::state::{ColumnFilter, ColumnSort};

/// Single-column sort: only the first entry counts.
pub fn translate_sorting(sorting: &[ColumnSort]) -> Option<SortSpec> {
    sorting.first().map(|sort| SortSpec {
        field: sort.id.clone(),
        direction: if sort.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        },
    })
}

pub fn translate_filters(filters: &[ColumnFilter]) -> Vec<FilterPredicate> {
    filters.iter().flat_map(translate_filter).collect()
}

pub fn translate_filter(filter: &ColumnFilter) -> Vec<FilterPredicate> {
    let predicate = match &filter.value {
        Value::Null => None,
        Value::Array(values) => membership(&filter.id, values),
        Value::Object(object) => match (object.get("operator"), object.get("value")) {
            (Some(Value::String(operator)), Some(value)) => operator_filter(&filter.id, operator, value),
            _ => None,
        },
        scalar => Some(FilterPredicate::new(
            filter.id.as_str(),
            FilterOperator::Eq,
            scalar.clone(),
        )),
    };

    match predicate {
        Some(predicate) => vec![predicate],
        None => {
            log::debug!(
                "server_table: dropping filter '{}' with unsupported value {}",
                filter.id,
                filter.value
            );
            Vec::new()
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn membership(field: &str, values: &[Value]) -> Option<FilterPredicate> {
    if values.is_empty() || !values.iter().all(is_scalar) {
        return None;
    }
    Some(FilterPredicate::new(
        field,
        FilterOperator::In,
        Value::Array(values.to_vec()),
    ))
}

fn operator_filter(field: &str, operator: &str, value: &Value) -> Option<FilterPredicate> {
    match operator {
        "Between" | "between" => match value.as_array() {
            Some(bounds) if bounds.len() == 2 && bounds.iter().all(is_scalar) => Some(
                FilterPredicate::new(field, FilterOperator::Between, value.clone()),
            ),
            _ => None,
        },
        "Is" | "=" if is_scalar(value) => {
            Some(FilterPredicate::new(field, FilterOperator::Eq, value.clone()))
        }
        "IsNot" | "!=" if is_scalar(value) => {
            Some(FilterPredicate::new(field, FilterOperator::NotEq, value.clone()))
        }
        "Like" | "Contains" | "like" => match value.as_str() {
            Some(text) if !text.is_empty() => Some(FilterPredicate::new(
                field,
                FilterOperator::Like,
                json!(format!("%{}%", text.trim_matches('%'))),
            )),
            _ => None,
        },
        "In" | "in" => value
            .as_array()
            .and_then(|values| membership(field, values)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(filter: ColumnFilter) -> FilterPredicate {
        let mut predicates = translate_filter(&filter);
        assert_eq!(predicates.len(), 1, "expected one predicate for {:?}", filter);
        predicates.remove(0)
    }

    #[test]
    fn test_scalar_is_equality() {
        let p = one(ColumnFilter::new("status", json!("Pending")));
        assert_eq!(p.operator, FilterOperator::Eq);
        assert_eq!(p.field, "status");
        assert_eq!(p.value, json!("Pending"));

        assert_eq!(one(ColumnFilter::new("qty", json!(4))).operator, FilterOperator::Eq);
        assert_eq!(one(ColumnFilter::new("urgent", json!(true))).operator, FilterOperator::Eq);
    }

    #[test]
    fn test_array_is_membership() {
        let p = one(ColumnFilter::new("project", json!(["P-1", "P-2"])));
        assert_eq!(p.operator, FilterOperator::In);
        assert_eq!(p.value, json!(["P-1", "P-2"]));
    }

    #[test]
    fn test_between_date_range() {
        let p = one(ColumnFilter::new(
            "creation",
            json!({"operator": "Between", "value": ["2024-01-01", "2024-01-31"]}),
        ));
        assert_eq!(p.operator, FilterOperator::Between);
        assert_eq!(p.value, json!(["2024-01-01", "2024-01-31"]));
        assert_eq!(
            p.to_wire(),
            json!(["creation", "between", ["2024-01-01", "2024-01-31"]])
        );
    }

    #[test]
    fn test_other_operators() {
        let p = one(ColumnFilter::new("owner", json!({"operator": "IsNot", "value": "Administrator"})));
        assert_eq!(p.operator, FilterOperator::NotEq);

        let p = one(ColumnFilter::new("vendor", json!({"operator": "Contains", "value": "steel"})));
        assert_eq!(p.operator, FilterOperator::Like);
        assert_eq!(p.value, json!("%steel%"));

        let p = one(ColumnFilter::new("creation", json!({"operator": "Is", "value": "2024-02-01"})));
        assert_eq!(p.operator, FilterOperator::Eq);
    }

    #[test]
    fn test_unrecognized_shapes_are_dropped() {
        let dropped = [
            json!(null),
            json!([]),
            json!([{"nested": true}]),
            json!({"operator": "Between", "value": ["2024-01-01"]}),
            json!({"operator": "Timespan", "value": "last_week"}),
            json!({"value": "x"}),
            json!({"operator": 5, "value": "x"}),
        ];
        for value in dropped {
            assert!(translate_filter(&ColumnFilter::new("f", value.clone())).is_empty(), "{}", value);
        }
    }

    #[test]
    fn test_translate_filters_keeps_order_and_skips_dropped() {
        let predicates = translate_filters(&[
            ColumnFilter::new("status", json!("Pending")),
            ColumnFilter::new("junk", json!({})),
            ColumnFilter::new("project", json!(["P-1"])),
        ]);
        let fields: Vec<&str> = predicates.iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["status", "project"]);
    }

    #[test]
    fn test_sorting_uses_first_column_only() {
        let sorting = vec![ColumnSort::desc("creation"), ColumnSort::asc("name")];
        let spec = translate_sorting(&sorting).unwrap();
        assert_eq!(spec.to_order_by(), "creation desc");
        assert_eq!(
            translate_sorting(&[ColumnSort::asc("name")]).map(|s| s.to_order_by()),
            Some("name asc".to_string())
        );
        assert_eq!(translate_sorting(&[]), None);
    }
}
