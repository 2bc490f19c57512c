//! Criteria AST
//!
//! A criteria tree is either a constant, a single comparison against a
//! field, or an AND/OR/NOT combination of subtrees. Trees are plain data:
//! the in-memory evaluator walks them with [`Criteria::evaluate`], the
//! PostgreSQL backend renders them to SQL.
//!
//! Evaluation uses two-valued logic. A comparison involving a null (or a
//! field the entity does not have) is `false`, and `NOT` of that is `true`.
//! The SQL renderer wraps each leaf in `COALESCE(.., FALSE)` so both
//! backends agree.

use std::ops::{BitAnd, BitOr, Not};

use super::value::FieldValue;
use crate::data::Entity;

/// Comparison operator of a leaf condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Case-insensitive substring match
    Contains,
    /// Case-insensitive prefix match
    StartsWith,
    In,
    IsNull,
    IsNotNull,
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Value(FieldValue),
    List(Vec<FieldValue>),
    Field(&'static str),
}

/// A single comparison `field <op> operand`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: &'static str,
    pub op: Comparison,
    pub operand: Operand,
}

/// Boolean combination of conditions
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    Constant(bool),
    Condition(Condition),
    And(Box<Criteria>, Box<Criteria>),
    Or(Box<Criteria>, Box<Criteria>),
    Not(Box<Criteria>),
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria::Constant(true)
    }
}

impl Criteria {
    /// Matches everything
    pub fn always() -> Self {
        Criteria::Constant(true)
    }

    /// Matches nothing
    pub fn never() -> Self {
        Criteria::Constant(false)
    }

    /// Logical AND, folding constant operands
    pub fn and(self, other: Criteria) -> Criteria {
        match (self, other) {
            (Criteria::Constant(true), c) | (c, Criteria::Constant(true)) => c,
            (Criteria::Constant(false), _) | (_, Criteria::Constant(false)) => {
                Criteria::Constant(false)
            }
            (a, b) => Criteria::And(Box::new(a), Box::new(b)),
        }
    }

    /// Logical OR, folding constant operands
    pub fn or(self, other: Criteria) -> Criteria {
        match (self, other) {
            (Criteria::Constant(false), c) | (c, Criteria::Constant(false)) => c,
            (Criteria::Constant(true), _) | (_, Criteria::Constant(true)) => {
                Criteria::Constant(true)
            }
            (a, b) => Criteria::Or(Box::new(a), Box::new(b)),
        }
    }

    /// Logical NOT
    pub fn negate(self) -> Criteria {
        match self {
            Criteria::Constant(v) => Criteria::Constant(!v),
            Criteria::Not(inner) => *inner,
            c => Criteria::Not(Box::new(c)),
        }
    }

    /// Evaluates the tree against an entity
    pub fn evaluate<T: Entity>(&self, entity: &T) -> bool {
        match self {
            Criteria::Constant(v) => *v,
            Criteria::Condition(condition) => condition.evaluate(entity),
            Criteria::And(a, b) => a.evaluate(entity) && b.evaluate(entity),
            Criteria::Or(a, b) => a.evaluate(entity) || b.evaluate(entity),
            Criteria::Not(inner) => !inner.evaluate(entity),
        }
    }

    /// Every field name referenced by the tree, operands included
    pub fn referenced_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields(&self, out: &mut Vec<&'static str>) {
        match self {
            Criteria::Constant(_) => {}
            Criteria::Condition(c) => {
                out.push(c.field);
                if let Operand::Field(other) = c.operand {
                    out.push(other);
                }
            }
            Criteria::And(a, b) | Criteria::Or(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
            Criteria::Not(inner) => inner.collect_fields(out),
        }
    }
}

impl Condition {
    fn evaluate<T: Entity>(&self, entity: &T) -> bool {
        let Some(left) = entity.field(self.field) else {
            return false;
        };

        match (self.op, &self.operand) {
            (Comparison::IsNull, _) => left.is_null(),
            (Comparison::IsNotNull, _) => !left.is_null(),
            (Comparison::Contains, Operand::Value(FieldValue::Text(needle))) => left
                .as_text()
                .is_some_and(|hay| hay.to_lowercase().contains(&needle.to_lowercase())),
            (Comparison::StartsWith, Operand::Value(FieldValue::Text(prefix))) => left
                .as_text()
                .is_some_and(|hay| hay.to_lowercase().starts_with(&prefix.to_lowercase())),
            (Comparison::In, Operand::List(values)) => values
                .iter()
                .any(|v| left.compare(v) == Some(std::cmp::Ordering::Equal)),
            (op, Operand::Value(right)) => compare(op, &left, right),
            (op, Operand::Field(other)) => entity
                .field(other)
                .is_some_and(|right| compare(op, &left, &right)),
            _ => false,
        }
    }
}

fn compare(op: Comparison, left: &FieldValue, right: &FieldValue) -> bool {
    let Some(ordering) = left.compare(right) else {
        return false;
    };
    match op {
        Comparison::Eq => ordering.is_eq(),
        Comparison::Ne => ordering.is_ne(),
        Comparison::Lt => ordering.is_lt(),
        Comparison::Le => ordering.is_le(),
        Comparison::Gt => ordering.is_gt(),
        Comparison::Ge => ordering.is_ge(),
        _ => false,
    }
}

impl BitAnd for Criteria {
    type Output = Criteria;

    fn bitand(self, rhs: Criteria) -> Criteria {
        self.and(rhs)
    }
}

impl BitOr for Criteria {
    type Output = Criteria;

    fn bitor(self, rhs: Criteria) -> Criteria {
        self.or(rhs)
    }
}

impl Not for Criteria {
    type Output = Criteria;

    fn not(self) -> Criteria {
        self.negate()
    }
}

/// Starts a condition on the named field
///
/// ```text
/// field("status").eq("active") & field("unit_price").le(max_price)
/// ```
pub fn field(name: &'static str) -> FieldRef {
    FieldRef(name)
}

/// A field name awaiting its comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef(&'static str);

impl FieldRef {
    pub fn name(self) -> &'static str {
        self.0
    }

    fn leaf(self, op: Comparison, operand: Operand) -> Criteria {
        Criteria::Condition(Condition {
            field: self.0,
            op,
            operand,
        })
    }

    pub fn eq(self, value: impl Into<FieldValue>) -> Criteria {
        self.leaf(Comparison::Eq, Operand::Value(value.into()))
    }

    pub fn ne(self, value: impl Into<FieldValue>) -> Criteria {
        self.leaf(Comparison::Ne, Operand::Value(value.into()))
    }

    pub fn lt(self, value: impl Into<FieldValue>) -> Criteria {
        self.leaf(Comparison::Lt, Operand::Value(value.into()))
    }

    pub fn le(self, value: impl Into<FieldValue>) -> Criteria {
        self.leaf(Comparison::Le, Operand::Value(value.into()))
    }

    pub fn gt(self, value: impl Into<FieldValue>) -> Criteria {
        self.leaf(Comparison::Gt, Operand::Value(value.into()))
    }

    pub fn ge(self, value: impl Into<FieldValue>) -> Criteria {
        self.leaf(Comparison::Ge, Operand::Value(value.into()))
    }

    /// Inclusive range; an absent bound is not applied
    pub fn between(
        self,
        low: Option<impl Into<FieldValue>>,
        high: Option<impl Into<FieldValue>>,
    ) -> Criteria {
        let low = low.map_or(Criteria::always(), |v| self.ge(v));
        let high = high.map_or(Criteria::always(), |v| self.le(v));
        low & high
    }

    pub fn contains(self, needle: impl Into<String>) -> Criteria {
        self.leaf(
            Comparison::Contains,
            Operand::Value(FieldValue::Text(needle.into())),
        )
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Criteria {
        self.leaf(
            Comparison::StartsWith,
            Operand::Value(FieldValue::Text(prefix.into())),
        )
    }

    pub fn is_in<V: Into<FieldValue>>(self, values: impl IntoIterator<Item = V>) -> Criteria {
        self.leaf(
            Comparison::In,
            Operand::List(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn is_null(self) -> Criteria {
        self.leaf(Comparison::IsNull, Operand::None)
    }

    pub fn is_not_null(self) -> Criteria {
        self.leaf(Comparison::IsNotNull, Operand::None)
    }

    /// Field-to-field comparison, e.g. `current_balance > credit_limit`
    pub fn compared_to(self, op: Comparison, other: FieldRef) -> Criteria {
        self.leaf(op, Operand::Field(other.0))
    }
}
