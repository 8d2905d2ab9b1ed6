//! Domain filter builder for the server's boolean query DSL
//!
//! The server expresses queries as a flat sequence of `[field, operator,
//! value]` triples and Polish-prefix logical tokens (`&`, `|` with arity 2,
//! `!` with arity 1). An unbalanced sequence is a caller programming error
//! and is rejected before any network exchange.

use crate::error::{ClientError, Result};
use serde_json::{Value, json};

/// One element of a domain filter sequence
#[derive(Debug, Clone, PartialEq)]
pub enum DomainElement {
    /// A `[field, operator, value]` condition triple
    Condition {
        field: String,
        operator: String,
        value: Value,
    },
    /// Logical AND over the following two predicates
    And,
    /// Logical OR over the following two predicates
    Or,
    /// Logical NOT over the following predicate
    Not,
}

/// A boolean query over a target model.
///
/// The ergonomic constructors (`eq`, `ilike`, [`DomainFilter::and`], ...)
/// always produce balanced sequences; raw sequences built with
/// [`DomainFilter::from_elements`] are validated in [`DomainFilter::to_value`]
/// before dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainFilter {
    elements: Vec<DomainElement>,
}

impl DomainFilter {
    /// Empty filter, matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Single condition with an arbitrary operator
    pub fn condition(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            elements: vec![DomainElement::Condition {
                field: field.into(),
                operator: operator.into(),
                value: value.into(),
            }],
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(field, "=", value)
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(field, "!=", value)
    }

    /// Case-insensitive substring match
    pub fn ilike(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(field, "ilike", value)
    }

    /// Set membership
    pub fn in_(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::condition(field, "in", Value::Array(values))
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(field, ">", value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(field, "<", value)
    }

    /// Conjunction of two filters
    pub fn and(left: Self, right: Self) -> Self {
        Self::combine(DomainElement::And, left, right)
    }

    /// Disjunction of two filters
    pub fn or(left: Self, right: Self) -> Self {
        Self::combine(DomainElement::Or, left, right)
    }

    /// Negation of a filter
    pub fn not(inner: Self) -> Self {
        let mut elements = vec![DomainElement::Not];
        elements.extend(inner.elements);
        Self { elements }
    }

    /// Raw sequence, validated later at [`DomainFilter::to_value`]
    pub fn from_elements(elements: Vec<DomainElement>) -> Self {
        Self { elements }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn combine(token: DomainElement, left: Self, right: Self) -> Self {
        // Combining with an empty side would unbalance the prefix sequence
        if left.is_empty() {
            return right;
        }
        if right.is_empty() {
            return left;
        }
        let mut elements = vec![token];
        elements.extend(left.elements);
        elements.extend(right.elements);
        Self { elements }
    }

    /// Check that the sequence reduces to exactly one predicate.
    ///
    /// Scans left to right counting outstanding predicates: `&`/`|` consume
    /// two and produce one, `!` consumes one and produces one, a condition
    /// produces one.
    pub fn validate(&self) -> Result<()> {
        if self.elements.is_empty() {
            return Ok(());
        }

        let mut required: usize = 1;
        for (index, element) in self.elements.iter().enumerate() {
            if required == 0 {
                return Err(ClientError::Validation(format!(
                    "Unbalanced domain filter: trailing element at position {}",
                    index
                )));
            }
            match element {
                DomainElement::And | DomainElement::Or => required += 1,
                DomainElement::Not => {}
                DomainElement::Condition { .. } => required -= 1,
            }
        }

        if required != 0 {
            return Err(ClientError::Validation(format!(
                "Unbalanced domain filter: {} predicate(s) missing for logical prefixes",
                required
            )));
        }
        Ok(())
    }

    /// Serialize to the wire representation, rejecting unbalanced sequences
    pub fn to_value(&self) -> Result<Value> {
        self.validate()?;
        let items = self
            .elements
            .iter()
            .map(|element| match element {
                DomainElement::Condition {
                    field,
                    operator,
                    value,
                } => json!([field, operator, value]),
                DomainElement::And => json!("&"),
                DomainElement::Or => json!("|"),
                DomainElement::Not => json!("!"),
            })
            .collect();
        Ok(Value::Array(items))
    }
}
