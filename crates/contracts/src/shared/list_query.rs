//! Запрос списка документов с сервера: фильтры, сортировка, страница, поиск.
//!
//! [`QueryDescriptor`] is what the table state derives on every change;
//! [`ListRequest`] is its wire form for the `get_list_with_count` method.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Operator of a structured filter predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "between")]
    Between,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "!=",
            FilterOperator::In => "in",
            FilterOperator::Like => "like",
            FilterOperator::Between => "between",
        }
    }
}

/// `(field, operator, value)`, sent as a JSON triple
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPredicate {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterPredicate {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn to_wire(&self) -> Value {
        json!([self.field, self.operator.as_str(), self.value])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    /// `"creation desc"`
    pub fn to_order_by(&self) -> String {
        format!("{} {}", self.field, self.direction.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub index: usize,
    pub size: usize,
}

impl PageSpec {
    /// Size is never zero: a zero size is clamped to one row.
    pub fn new(index: usize, size: usize) -> Self {
        Self {
            index,
            size: size.max(1),
        }
    }

    /// Saturates: page indices come from shared links.
    pub fn limit_start(&self) -> usize {
        self.index.saturating_mul(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpec {
    pub term: String,
    /// Empty when `is_global`: the server searches every indexed field.
    pub fields: Vec<String>,
    pub is_global: bool,
}

/// Derived description of one outbound list query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub doctype: String,
    pub fields: Vec<String>,
    pub filters: Vec<FilterPredicate>,
    pub sort: Option<SortSpec>,
    /// Used when `sort` is absent
    pub default_sort: String,
    pub page: PageSpec,
    pub search: Option<SearchSpec>,
}

impl QueryDescriptor {
    pub fn order_by(&self) -> String {
        match &self.sort {
            Some(sort) => sort.to_order_by(),
            None => self.default_sort.clone(),
        }
    }

    pub fn to_request(&self) -> ListRequest {
        let filters: Vec<Value> = self.filters.iter().map(FilterPredicate::to_wire).collect();
        let (search_term, search_fields, global_search) = match &self.search {
            Some(search) => (
                Some(search.term.clone()),
                if search.is_global || search.fields.is_empty() {
                    None
                } else {
                    Some(Value::from(search.fields.clone()).to_string())
                },
                search.is_global,
            ),
            None => (None, None, false),
        };

        ListRequest {
            doctype: self.doctype.clone(),
            fields: Value::from(self.fields.clone()).to_string(),
            filters: Value::Array(filters).to_string(),
            limit_start: self.page.limit_start(),
            limit_page_length: self.page.size,
            order_by: self.order_by(),
            search_term,
            search_fields,
            global_search,
        }
    }
}

/// Body of the list-with-count call. Structured values are JSON strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    pub doctype: String,
    pub fields: String,
    pub filters: String,
    pub limit_start: usize,
    pub limit_page_length: usize,
    pub order_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_fields: Option<String>,
    #[serde(default)]
    pub global_search: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub total_count: usize,
}

impl<T> Default for ListResponse<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total_count: 0,
        }
    }
}

/// Server wraps method results into `message`
#[derive(Debug, Clone, Deserialize)]
pub struct ListEnvelope<T> {
    pub message: Option<ListResponse<T>>,
}

impl<T> ListEnvelope<T> {
    /// A missing `message` is an empty result, not an error.
    pub fn into_response(self) -> ListResponse<T> {
        self.message.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> QueryDescriptor {
        QueryDescriptor {
            doctype: "Procurement Requests".to_string(),
            fields: vec!["name".to_string(), "creation".to_string()],
            filters: vec![FilterPredicate::new(
                "workflow_state",
                FilterOperator::In,
                json!(["Pending", "Approved"]),
            )],
            sort: None,
            default_sort: "modified desc".to_string(),
            page: PageSpec::new(2, 10),
            search: None,
        }
    }

    #[test]
    fn test_request_without_search() {
        let request = descriptor().to_request();
        assert_eq!(request.fields, r#"["name","creation"]"#);
        assert_eq!(
            request.filters,
            r#"[["workflow_state","in",["Pending","Approved"]]]"#
        );
        assert_eq!(request.limit_start, 20);
        assert_eq!(request.limit_page_length, 10);
        assert_eq!(request.order_by, "modified desc");
        assert_eq!(request.search_term, None);
        assert_eq!(request.search_fields, None);
        assert!(!request.global_search);
    }

    #[test]
    fn test_request_with_field_search() {
        let mut d = descriptor();
        d.sort = Some(SortSpec {
            field: "creation".to_string(),
            direction: SortDirection::Asc,
        });
        d.search = Some(SearchSpec {
            term: "steel".to_string(),
            fields: vec!["name".to_string()],
            is_global: false,
        });
        let request = d.to_request();
        assert_eq!(request.order_by, "creation asc");
        assert_eq!(request.search_term.as_deref(), Some("steel"));
        assert_eq!(request.search_fields.as_deref(), Some(r#"["name"]"#));
    }

    #[test]
    fn test_global_search_omits_fields() {
        let mut d = descriptor();
        d.search = Some(SearchSpec {
            term: "pipe".to_string(),
            fields: Vec::new(),
            is_global: true,
        });
        let request = d.to_request();
        assert!(request.global_search);
        assert_eq!(request.search_fields, None);

        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("search_fields").is_none());
        assert_eq!(body["search_term"], "pipe");
    }

    #[test]
    fn test_page_size_never_zero() {
        let page = PageSpec::new(3, 0);
        assert_eq!(page.size, 1);
        assert_eq!(page.limit_start(), 3);
    }

    #[test]
    fn test_huge_page_index_saturates() {
        assert_eq!(PageSpec::new(usize::MAX / 5, 10).limit_start(), usize::MAX);
        assert_eq!(PageSpec::new(3, 25).limit_start(), 75);
    }

    #[test]
    fn test_envelope_without_message_is_empty() {
        let envelope: ListEnvelope<Value> = serde_json::from_str("{}").unwrap();
        let response = envelope.into_response();
        assert!(response.data.is_empty());
        assert_eq!(response.total_count, 0);

        let envelope: ListEnvelope<Value> = serde_json::from_str(
            r#"{"message":{"data":[{"name":"PR-0001"}],"total_count":41}}"#,
        )
        .unwrap();
        let response = envelope.into_response();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.total_count, 41);
    }
}
