//! WHERE-clause accumulation for all statement builders.
//!
//! [`WhereClause`] collects predicates in call order and renders them as one
//! `AND`-joined fragment. Placeholder indices are taken from the statement's
//! shared parameter list during the single rendering pass, so SET and WHERE
//! parameters of the same statement number themselves correctly without any
//! string rewriting.

use crate::value::Value;

/// A single WHERE condition plus its bound parameters.
#[derive(Clone, Debug)]
enum Predicate {
    /// `column = $n`
    Eq { column: String, value: Value },
    /// `column IS NULL`
    IsNull { column: String },
    /// `column IN ($n, $n+1, ...)`
    InList { column: String, values: Vec<Value> },
    /// Caller-supplied fragment with `?` markers, bound in order.
    Expression { sql: String, params: Vec<Value> },
    /// Matches no rows; used for empty IN lists.
    MatchNone,
}

/// Ordered accumulator for WHERE conditions.
#[derive(Clone, Debug, Default)]
pub struct WhereClause {
    predicates: Vec<Predicate>,
}

impl WhereClause {
    /// Create a new empty clause.
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Check if no predicates have been added.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Add a NULL-safe equality condition.
    ///
    /// A non-null value renders `column = $n` and binds it; a NULL (including
    /// a `None` option) renders `column IS NULL` and binds nothing.
    pub fn eq(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        if value.is_null() {
            self.predicates.push(Predicate::IsNull {
                column: column.to_string(),
            });
        } else {
            self.predicates.push(Predicate::Eq {
                column: column.to_string(),
                value,
            });
        }
    }

    /// Add a condition only if the value is present; `None` is a no-op.
    pub fn eq_opt<T: Into<Value>>(&mut self, column: &str, value: Option<T>) {
        if let Some(v) = value {
            self.eq(column, v);
        }
    }

    /// Add a caller-supplied SQL fragment with `?` markers.
    ///
    /// Each `?` is replaced with the next positional placeholder and the
    /// values are bound in order.
    pub fn expression<T: Into<Value>>(&mut self, sql: &str, values: Vec<T>) {
        self.predicates.push(Predicate::Expression {
            sql: sql.to_string(),
            params: values.into_iter().map(Into::into).collect(),
        });
    }

    /// Add a condition: `column IN (values...)`
    ///
    /// An empty list renders a clause matching no rows, never a syntax error.
    pub fn in_list<T: Into<Value>>(&mut self, column: &str, values: Vec<T>) {
        if values.is_empty() {
            self.predicates.push(Predicate::MatchNone);
            return;
        }
        self.predicates.push(Predicate::InList {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
    }

    /// Render all predicates joined with ` AND ` into `sql`, binding
    /// parameters into `params`.
    pub fn render(&self, sql: &mut String, params: &mut Vec<Value>) {
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            match predicate {
                Predicate::Eq { column, value } => {
                    params.push(value.clone());
                    sql.push_str(column);
                    sql.push_str(" = $");
                    sql.push_str(&params.len().to_string());
                }
                Predicate::IsNull { column } => {
                    sql.push_str(column);
                    sql.push_str(" IS NULL");
                }
                Predicate::InList { column, values } => {
                    sql.push_str(column);
                    sql.push_str(" IN (");
                    for (j, value) in values.iter().enumerate() {
                        if j > 0 {
                            sql.push_str(", ");
                        }
                        params.push(value.clone());
                        sql.push('$');
                        sql.push_str(&params.len().to_string());
                    }
                    sql.push(')');
                }
                Predicate::Expression {
                    sql: fragment,
                    params: fragment_params,
                } => {
                    let mut next = 0;
                    for ch in fragment.chars() {
                        if ch == '?' && next < fragment_params.len() {
                            params.push(fragment_params[next].clone());
                            sql.push('$');
                            sql.push_str(&params.len().to_string());
                            next += 1;
                        } else {
                            sql.push(ch);
                        }
                    }
                }
                Predicate::MatchNone => sql.push_str("1=0"),
            }
        }
    }

    /// Render as a standalone `(sql, params)` pair.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.render(&mut sql, &mut params);
        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_binds_one_param() {
        let mut clause = WhereClause::new();
        clause.eq("name", "alice");
        let (sql, params) = clause.build();
        assert_eq!(sql, "name = $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn conditions_join_with_and() {
        let mut clause = WhereClause::new();
        clause.eq("status", "active");
        clause.eq("code", 7i64);
        let (sql, params) = clause.build();
        assert_eq!(sql, "status = $1 AND code = $2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn eq_none_renders_is_null() {
        let mut clause = WhereClause::new();
        clause.eq("deleted_at", Option::<i64>::None);
        let (sql, params) = clause.build();
        assert_eq!(sql, "deleted_at IS NULL");
        assert_eq!(params.len(), 0);
    }

    #[test]
    fn eq_some_renders_equality() {
        let mut clause = WhereClause::new();
        clause.eq("code", Some(5i64));
        let (sql, params) = clause.build();
        assert_eq!(sql, "code = $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn eq_null_value_renders_is_null() {
        let mut clause = WhereClause::new();
        clause.eq("parent_id", Value::Null);
        let (sql, params) = clause.build();
        assert_eq!(sql, "parent_id IS NULL");
        assert_eq!(params.len(), 0);
    }

    #[test]
    fn eq_opt_none_is_noop() {
        let mut clause = WhereClause::new();
        clause.eq_opt("name", Option::<String>::None);
        clause.eq("code", 1i64);
        let (sql, params) = clause.build();
        assert_eq!(sql, "code = $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn in_list_sizes_to_values() {
        let mut clause = WhereClause::new();
        clause.in_list("id", vec![1i64, 2, 3]);
        let (sql, params) = clause.build();
        assert_eq!(sql, "id IN ($1, $2, $3)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut clause = WhereClause::new();
        clause.in_list::<i64>("id", vec![]);
        let (sql, params) = clause.build();
        assert_eq!(sql, "1=0");
        assert_eq!(params.len(), 0);
    }

    #[test]
    fn expression_substitutes_markers_in_order() {
        let mut clause = WhereClause::new();
        clause.expression("code > ? OR code < ?", vec![10i64, 2]);
        let (sql, params) = clause.build();
        assert_eq!(sql, "code > $1 OR code < $2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn render_continues_numbering_from_existing_params() {
        let mut clause = WhereClause::new();
        clause.eq("id", 9i64);
        let mut sql = String::new();
        let mut params = vec![Value::from("already-bound"), Value::from("also-bound")];
        clause.render(&mut sql, &mut params);
        assert_eq!(sql, "id = $3");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn mixed_predicates_preserve_call_order() {
        let mut clause = WhereClause::new();
        clause.eq("status", "active");
        clause.expression("created_at > ?", vec!["2024-01-01"]);
        clause.in_list("code", vec![1i64, 2]);
        let (sql, params) = clause.build();
        assert_eq!(
            sql,
            "status = $1 AND created_at > $2 AND code IN ($3, $4)"
        );
        assert_eq!(params.len(), 4);
    }
}
