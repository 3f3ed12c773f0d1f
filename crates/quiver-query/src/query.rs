//! Query descriptors: the facts about a query that optimisers gate on.

use crate::ordering::OrderSpec;
use crate::pattern::Var;
use serde::{Deserialize, Serialize};

/// Top-level form of a compiled query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryForm {
    Select,
    SelectAll,
    SelectDistinct,
    SelectAllDistinct,
    SelectReduced,
    SelectAllReduced,
    Ask,
    Construct,
    Describe,
    DescribeAll,
    /// An update request; never optimised as a query.
    Update,
}

impl QueryForm {
    pub fn is_select(self) -> bool {
        matches!(
            self,
            Self::Select
                | Self::SelectAll
                | Self::SelectDistinct
                | Self::SelectAllDistinct
                | Self::SelectReduced
                | Self::SelectAllReduced
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub form: QueryForm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderSpec>,
    #[serde(default)]
    pub projected: Vec<Var>,
}

impl QueryDescriptor {
    pub fn new(form: QueryForm) -> Self {
        Self {
            form,
            order_by: None,
            projected: Vec::new(),
        }
    }

    pub fn with_order_by(mut self, ordering: OrderSpec) -> Self {
        self.order_by = Some(ordering);
        self
    }

    pub fn with_projection<V: Into<Var>>(mut self, vars: impl IntoIterator<Item = V>) -> Self {
        self.projected = vars.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the query carries a non-empty ORDER BY clause.
    pub fn has_ordering(&self) -> bool {
        self.order_by.as_ref().is_some_and(|o| !o.is_empty())
    }
}
