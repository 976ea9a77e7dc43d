use sea_query::backend::{
    EscapeBuilder, OperLeftAssocDecider, PrecedenceDecider, QuotedBuilder, TableRefBuilder,
};
use sea_query::prepare::SqlWriter;
use sea_query::{
    BinOper, Oper, QueryStatementWriter, Quote, SimpleExpr, SubQueryStatement, Value,
};

use crate::convert::values_to_data_types;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::types::DataType;

/// A rendered statement and its session bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// SQL in the dialect's placeholder style.
    pub sql: String,
    /// Bind values in placeholder order.
    pub params: Vec<DataType>,
}

/// sea-query backend emitting `?` markers.
///
/// Custom fragments built with [`crate::Cond`] carry `?` markers of their own;
/// rendering every bound value as `?` keeps both kinds in one positional
/// sequence, which the dialect then renumbers if it needs to.
pub struct QueryBuilder {
    pub quote: Quote,
}

impl QueryBuilder {
    pub fn new(quote: u8) -> Self {
        Self {
            quote: Quote::new(quote),
        }
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(b'"')
    }
}

impl QuotedBuilder for QueryBuilder {
    fn quote(&self) -> Quote {
        self.quote
    }
}

impl EscapeBuilder for QueryBuilder {}

impl TableRefBuilder for QueryBuilder {}

impl OperLeftAssocDecider for QueryBuilder {
    fn well_known_left_associative(&self, op: &BinOper) -> bool {
        // Copied from sea-query 0.32.7 backend/query_builder.rs `common_well_known_left_associative`
        matches!(
            op,
            BinOper::And | BinOper::Or | BinOper::Add | BinOper::Sub | BinOper::Mul | BinOper::Mod
        )
    }
}

impl PrecedenceDecider for QueryBuilder {
    fn inner_expr_well_known_greater_precedence(
        &self, _inner: &SimpleExpr, _outer_oper: &Oper,
    ) -> bool {
        // Conservative approach that forces parentheses
        false
    }
}

impl sea_query::backend::QueryBuilder for QueryBuilder {
    fn prepare_query_statement(&self, query: &SubQueryStatement, sql: &mut dyn SqlWriter) {
        match query {
            SubQueryStatement::SelectStatement(s) => self.prepare_select_statement(s, sql),
            SubQueryStatement::InsertStatement(s) => self.prepare_insert_statement(s, sql),
            SubQueryStatement::UpdateStatement(s) => self.prepare_update_statement(s, sql),
            SubQueryStatement::DeleteStatement(s) => self.prepare_delete_statement(s, sql),
            SubQueryStatement::WithStatement(s) => self.prepare_with_query(s, sql),
        }
    }

    fn prepare_value(&self, value: &Value, sql: &mut dyn SqlWriter) {
        sql.push_param(value.clone(), self);
    }

    fn placeholder(&self) -> (&str, bool) {
        ("?", false)
    }
}

/// Renders `statement` for `dialect`.
pub(crate) fn render<S: QueryStatementWriter>(
    statement: &S, dialect: &dyn Dialect,
) -> Result<Query> {
    let (sql, values) = statement.build(QueryBuilder::new(dialect.identifier_quote()));
    let params = values_to_data_types(values).map_err(|e| Error::Conversion(e.to_string()))?;
    Ok(Query {
        sql: dialect.render_placeholders(sql),
        params,
    })
}

/// Rewrites `?` markers as `{prefix}1`, `{prefix}2`, .. skipping quoted text.
#[must_use]
pub fn number_placeholders(sql: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut last = 0;
    for (n, at) in marker_positions(sql).into_iter().enumerate() {
        out.push_str(&sql[last..at]);
        out.push_str(prefix);
        out.push_str(&(n + 1).to_string());
        last = at + 1;
    }
    out.push_str(&sql[last..]);
    out
}

/// Byte offsets of the `?` markers in `sql`.
///
/// Text inside `'..'`, `".."`, `` `..` `` and `[..]` is quoted, and `??` is an
/// escaped literal `?`, matching how sea-query substitutes custom expression
/// values.
pub(crate) fn marker_positions(sql: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut close: Option<char> = None;
    let mut chars = sql.char_indices().peekable();
    while let Some((at, ch)) = chars.next() {
        match (close, ch) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(end), _) if end == ch => close = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => close = Some(ch),
            (None, '[') => close = Some(']'),
            (None, '?') => {
                if chars.next_if(|(_, next)| *next == '?').is_none() {
                    positions.push(at);
                }
            }
            (None, _) => {}
        }
    }
    positions
}
