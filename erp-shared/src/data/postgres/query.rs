//! Specification to SQL
//!
//! Column names come from static entity metadata and are pushed verbatim;
//! every value is a bind parameter.

use sqlx::{Postgres, QueryBuilder};

use super::PgRecord;
use crate::data::DataError;
use crate::specification::{
    Comparison, Condition, Criteria, FieldValue, Operand, SortDirection, Specification,
    SpecificationError,
};

pub(crate) type Query = QueryBuilder<'static, Postgres>;

/// `SELECT` with filter, ordering and paging
pub(crate) fn select<T: PgRecord>(spec: &Specification<T>) -> Result<Query, DataError> {
    spec.validate()?;
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM {}",
        T::COLUMNS.join(", "),
        T::TABLE
    ));
    push_where::<T>(&mut qb, spec.criteria())?;
    push_order::<T>(&mut qb, spec)?;
    if let Some(take) = spec.take_count() {
        qb.push(" LIMIT ").push_bind(to_i64(take));
    }
    if let Some(skip) = spec.skip_count() {
        qb.push(" OFFSET ").push_bind(to_i64(skip));
    }
    Ok(qb)
}

/// `SELECT COUNT(*)` over the filter only
pub(crate) fn count<T: PgRecord>(spec: &Specification<T>) -> Result<Query, DataError> {
    spec.validate()?;
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", T::TABLE));
    push_where::<T>(&mut qb, spec.criteria())?;
    Ok(qb)
}

/// `SELECT EXISTS (...)` over the filter only
pub(crate) fn exists<T: PgRecord>(spec: &Specification<T>) -> Result<Query, DataError> {
    spec.validate()?;
    let mut qb = QueryBuilder::new(format!("SELECT EXISTS (SELECT 1 FROM {}", T::TABLE));
    push_where::<T>(&mut qb, spec.criteria())?;
    qb.push(")");
    Ok(qb)
}

/// `INSERT` of one or more rows
pub(crate) fn insert<'a, T: PgRecord>(entities: impl IntoIterator<Item = &'a T>) -> Query {
    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        T::TABLE,
        T::COLUMNS.join(", ")
    ));
    qb.push_values(entities, |mut row, entity| entity.bind_columns(&mut row));
    qb
}

/// `UPDATE` of every column by id
pub(crate) fn update<T: PgRecord>(entity: &T) -> Query {
    let mut qb = QueryBuilder::new(format!(
        "UPDATE {} SET ({}) = ROW(",
        T::TABLE,
        T::COLUMNS.join(", ")
    ));
    {
        let mut row = qb.separated(", ");
        entity.bind_columns(&mut row);
    }
    qb.push(") WHERE id = ").push_bind(entity.id());
    qb
}

fn push_where<T: PgRecord>(qb: &mut Query, criteria: &Criteria) -> Result<(), DataError> {
    if *criteria == Criteria::Constant(true) {
        return Ok(());
    }
    qb.push(" WHERE ");
    push_criteria::<T>(qb, criteria)
}

fn push_criteria<T: PgRecord>(qb: &mut Query, criteria: &Criteria) -> Result<(), DataError> {
    match criteria {
        Criteria::Constant(true) => {
            qb.push("TRUE");
        }
        Criteria::Constant(false) => {
            qb.push("FALSE");
        }
        Criteria::Condition(condition) => {
            qb.push("COALESCE(");
            push_condition::<T>(qb, condition)?;
            qb.push(", FALSE)");
        }
        Criteria::And(a, b) => push_binary::<T>(qb, a, " AND ", b)?,
        Criteria::Or(a, b) => push_binary::<T>(qb, a, " OR ", b)?,
        Criteria::Not(inner) => {
            qb.push("NOT (");
            push_criteria::<T>(qb, inner)?;
            qb.push(")");
        }
    }
    Ok(())
}

fn push_binary<T: PgRecord>(
    qb: &mut Query,
    left: &Criteria,
    op: &str,
    right: &Criteria,
) -> Result<(), DataError> {
    qb.push("(");
    push_criteria::<T>(qb, left)?;
    qb.push(op);
    push_criteria::<T>(qb, right)?;
    qb.push(")");
    Ok(())
}

fn push_condition<T: PgRecord>(qb: &mut Query, condition: &Condition) -> Result<(), DataError> {
    let lhs = column::<T>(condition.field)?;
    match (condition.op, &condition.operand) {
        (Comparison::IsNull, _) => {
            qb.push(lhs).push(" IS NULL");
        }
        (Comparison::IsNotNull, _) => {
            qb.push(lhs).push(" IS NOT NULL");
        }
        (Comparison::Contains, Operand::Value(FieldValue::Text(needle))) => {
            qb.push(lhs)
                .push(" ILIKE ")
                .push_bind(format!("%{}%", escape_like(needle)))
                .push(" ESCAPE '\\'");
        }
        (Comparison::StartsWith, Operand::Value(FieldValue::Text(prefix))) => {
            qb.push(lhs)
                .push(" ILIKE ")
                .push_bind(format!("{}%", escape_like(prefix)))
                .push(" ESCAPE '\\'");
        }
        (Comparison::In, Operand::List(values)) if values.is_empty() => {
            qb.push("FALSE");
        }
        (Comparison::In, Operand::List(values)) => {
            qb.push(lhs).push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push(")");
        }
        (op, Operand::Value(value)) => match sql_operator(op) {
            Some(sql_op) => {
                qb.push(lhs).push(sql_op);
                push_value(qb, value);
            }
            None => {
                qb.push("FALSE");
            }
        },
        (op, Operand::Field(other)) => match sql_operator(op) {
            Some(sql_op) => {
                qb.push(lhs).push(sql_op).push(column::<T>(other)?);
            }
            None => {
                qb.push("FALSE");
            }
        },
        // Shapes the in-memory evaluator also treats as false
        _ => {
            qb.push("FALSE");
        }
    }
    Ok(())
}

fn push_order<T: PgRecord>(qb: &mut Query, spec: &Specification<T>) -> Result<(), DataError> {
    let mut keys = Vec::with_capacity(spec.ordering().len() + 1);
    for key in spec.ordering() {
        let direction = match key.direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };
        keys.push(format!("{} {}", column::<T>(key.field)?, direction));
    }
    if spec.is_paging_enabled() {
        keys.push("id ASC".to_string());
    }
    if !keys.is_empty() {
        qb.push(" ORDER BY ").push(keys.join(", "));
    }
    Ok(())
}

fn push_value(qb: &mut Query, value: &FieldValue) {
    match value.clone() {
        FieldValue::Null => qb.push("NULL"),
        FieldValue::Bool(v) => qb.push_bind(v),
        FieldValue::Int(v) => qb.push_bind(v),
        FieldValue::Decimal(v) => qb.push_bind(v),
        FieldValue::Text(v) => qb.push_bind(v),
        FieldValue::Uuid(v) => qb.push_bind(v),
        FieldValue::Timestamp(v) => qb.push_bind(v),
        FieldValue::Date(v) => qb.push_bind(v),
    };
}

fn sql_operator(op: Comparison) -> Option<&'static str> {
    match op {
        Comparison::Eq => Some(" = "),
        Comparison::Ne => Some(" <> "),
        Comparison::Lt => Some(" < "),
        Comparison::Le => Some(" <= "),
        Comparison::Gt => Some(" > "),
        Comparison::Ge => Some(" >= "),
        _ => None,
    }
}

fn column<T: PgRecord>(field: &str) -> Result<&'static str, DataError> {
    T::column(field).ok_or_else(|| {
        DataError::Specification(SpecificationError::UnknownField {
            entity: T::NAME,
            field: field.to_string(),
        })
    })
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::Widget;
    use crate::specification::field;

    #[test]
    fn test_select_renders_stages() {
        let spec = Specification::<Widget>::with_criteria(
            field("qty").ge(5) & !field("name").contains("50%"),
        )
        .order_by_descending(field("qty"))
        .apply_page(2, 10)
        .unwrap();

        let sql = select(&spec).unwrap().into_sql();
        assert_eq!(
            sql,
            "SELECT id, name, qty, note FROM widgets WHERE (COALESCE(qty >= $1, FALSE) AND \
             NOT (COALESCE(name ILIKE $2 ESCAPE '\\', FALSE))) ORDER BY qty DESC, id ASC \
             LIMIT $3 OFFSET $4"
        );
    }

    #[test]
    fn test_match_all_has_no_where() {
        let sql = count(&Specification::<Widget>::new()).unwrap().into_sql();
        assert_eq!(sql, "SELECT COUNT(*) FROM widgets");
    }

    #[test]
    fn test_in_and_null_checks() {
        let spec = Specification::<Widget>::with_criteria(
            field("qty").is_in([1, 2]) | field("note").is_null(),
        );
        let sql = exists(&spec).unwrap().into_sql();
        assert_eq!(
            sql,
            "SELECT EXISTS (SELECT 1 FROM widgets WHERE (COALESCE(qty IN ($1, $2), FALSE) OR \
             COALESCE(note IS NULL, FALSE)))"
        );

        let empty = Specification::<Widget>::with_criteria(field("qty").is_in(Vec::<i64>::new()));
        assert_eq!(
            select(&empty).unwrap().into_sql(),
            "SELECT id, name, qty, note FROM widgets WHERE COALESCE(FALSE, FALSE)"
        );
    }

    #[test]
    fn test_field_to_field() {
        let spec = Specification::<Widget>::with_criteria(
            field("qty").compared_to(Comparison::Gt, field("qty")),
        );
        assert!(count(&spec).unwrap().into_sql().ends_with("WHERE COALESCE(qty > qty, FALSE)"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let spec = Specification::<Widget>::with_criteria(field("colour").eq("red"));
        assert!(select(&spec).is_err());
    }

    #[test]
    fn test_insert_and_update() {
        let widget = Widget::new("Bolt", 1, None);
        assert_eq!(
            insert([&widget]).into_sql(),
            "INSERT INTO widgets (id, name, qty, note) VALUES ($1, $2, $3, $4)"
        );
        assert_eq!(
            update(&widget).into_sql(),
            "UPDATE widgets SET (id, name, qty, note) = ROW($1, $2, $3, $4) WHERE id = $5"
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
