//! SQL for a compiled filter: WHERE clauses and `SELECT` statements for
//! saved find queries, in the identifier and paging style of each dialect.

use crate::compile::{self, CompileError, FilterNode, Predicate};
use crate::model::{MongoQuery, Operation, Operator};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    #[default]
    Generic,
    Postgresql,
    Mysql,
    Sqlite,
    Mssql,
    Oracle,
}

impl SqlDialect {
    pub const ALL: [SqlDialect; 6] = [
        SqlDialect::Generic,
        SqlDialect::Postgresql,
        SqlDialect::Mysql,
        SqlDialect::Sqlite,
        SqlDialect::Mssql,
        SqlDialect::Oracle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SqlDialect::Generic => "sql",
            SqlDialect::Postgresql => "postgresql",
            SqlDialect::Mysql => "mysql",
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::Mssql => "mssql",
            SqlDialect::Oracle => "oracle",
        }
    }

    fn ident(self, name: &str) -> String {
        match self {
            SqlDialect::Mysql => format!("`{}`", name.replace('`', "``")),
            SqlDialect::Postgresql | SqlDialect::Sqlite => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
            SqlDialect::Mssql => format!("[{}]", name.replace(']', "]]")),
            SqlDialect::Oracle => format!("\"{}\"", name.to_uppercase().replace('"', "\"\"")),
            SqlDialect::Generic => name.to_string(),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sql" | "generic" => Ok(SqlDialect::Generic),
            "postgresql" | "postgres" => Ok(SqlDialect::Postgresql),
            "mysql" | "mariadb" => Ok(SqlDialect::Mysql),
            "sqlite" => Ok(SqlDialect::Sqlite),
            "mssql" | "sqlserver" | "tsql" => Ok(SqlDialect::Mssql),
            "oracle" => Ok(SqlDialect::Oracle),
            other => Err(format!(
                "unknown SQL dialect '{}' (expected one of: {})",
                other,
                SqlDialect::ALL.map(SqlDialect::as_str).join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlError {
    #[error(transparent)]
    Filter(#[from] CompileError),

    #[error("{operator} has no {dialect} equivalent")]
    UnsupportedOperator {
        operator: Operator,
        dialect: SqlDialect,
    },

    #[error("field '{field}': value {value} cannot be written as a SQL literal")]
    UnsupportedValue { field: String, value: Value },

    #[error("only find queries translate to SQL, not {0}")]
    UnsupportedOperation(Operation),
}

/// Boolean expression for the tree, or `None` for the empty filter.
pub fn where_clause(node: &FilterNode, dialect: SqlDialect) -> Result<Option<String>, SqlError> {
    if node.is_empty() {
        return Ok(None);
    }
    expression(node, dialect).map(Some)
}

fn expression(node: &FilterNode, dialect: SqlDialect) -> Result<String, SqlError> {
    match node {
        FilterNode::Predicate(p) => predicate(p, dialect),
        FilterNode::And(c) if c.is_empty() => Ok("1 = 1".to_string()),
        FilterNode::Or(c) if c.is_empty() => Ok("1 = 1".to_string()),
        FilterNode::And(children) => joined(children, " AND ", dialect),
        FilterNode::Or(children) => joined(children, " OR ", dialect),
        FilterNode::Not(inner) => Ok(format!("NOT ({})", expression(inner, dialect)?)),
    }
}

fn joined(children: &[FilterNode], sep: &str, dialect: SqlDialect) -> Result<String, SqlError> {
    let parts = children
        .iter()
        .map(|child| {
            let sql = expression(child, dialect)?;
            Ok(match child {
                FilterNode::And(c) | FilterNode::Or(c) if c.len() > 1 => format!("({})", sql),
                _ => sql,
            })
        })
        .collect::<Result<Vec<_>, SqlError>>()?;
    Ok(parts.join(sep))
}

fn predicate(p: &Predicate, dialect: SqlDialect) -> Result<String, SqlError> {
    let column = dialect.ident(&p.field);
    let lit = |v: &Value| literal(&p.field, v);
    let sql = match p.operator {
        Operator::Eq if p.value.is_null() => format!("{} IS NULL", column),
        Operator::Ne if p.value.is_null() => format!("{} IS NOT NULL", column),
        Operator::Eq => format!("{} = {}", column, lit(&p.value)?),
        Operator::Ne => format!("{} <> {}", column, lit(&p.value)?),
        Operator::Gt => format!("{} > {}", column, lit(&p.value)?),
        Operator::Gte => format!("{} >= {}", column, lit(&p.value)?),
        Operator::Lt => format!("{} < {}", column, lit(&p.value)?),
        Operator::Lte => format!("{} <= {}", column, lit(&p.value)?),
        Operator::In | Operator::Nin => {
            let items = match &p.value {
                Value::Array(items) => items.as_slice(),
                other => std::slice::from_ref(other),
            };
            let negated = p.operator == Operator::Nin;
            if items.is_empty() {
                return Ok(if negated { "1 = 1" } else { "1 = 0" }.to_string());
            }
            let list = items.iter().map(lit).collect::<Result<Vec<_>, _>>()?;
            let keyword = if negated { "NOT IN" } else { "IN" };
            format!("{} {} ({})", column, keyword, list.join(", "))
        }
        Operator::Exists => match p.value {
            Value::Bool(false) => format!("{} IS NULL", column),
            _ => format!("{} IS NOT NULL", column),
        },
        Operator::Regex => {
            let pattern = lit(&p.value)?;
            let insensitive = p.options.as_deref().is_some_and(|o| o.contains('i'));
            match dialect {
                SqlDialect::Postgresql if insensitive => format!("{} ~* {}", column, pattern),
                SqlDialect::Postgresql => format!("{} ~ {}", column, pattern),
                SqlDialect::Mysql => format!("{} REGEXP {}", column, pattern),
                _ => return Err(unsupported(p.operator, dialect)),
            }
        }
        _ => return Err(unsupported(p.operator, dialect)),
    };
    Ok(sql)
}

fn unsupported(operator: Operator, dialect: SqlDialect) -> SqlError {
    SqlError::UnsupportedOperator { operator, dialect }
}

/// Scalars, plus the `$date`/`$oid` wrappers coercion produces.
fn literal(field: &str, value: &Value) -> Result<String, SqlError> {
    let quoted = |s: &str| format!("'{}'", s.replace('\'', "''"));
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(quoted(s)),
        Value::Object(m) if m.len() == 1 => match m.iter().next() {
            Some((k, Value::String(s))) if k == "$date" || k == "$oid" => Ok(quoted(s)),
            _ => Err(bad_value(field, value)),
        },
        _ => Err(bad_value(field, value)),
    }
}

fn bad_value(field: &str, value: &Value) -> SqlError {
    SqlError::UnsupportedValue {
        field: field.to_string(),
        value: value.clone(),
    }
}

/// `SELECT` for a saved find query: collection as table, inclusive
/// projection as columns, sort, skip and limit.
pub fn select_statement(query: &MongoQuery, dialect: SqlDialect) -> Result<String, SqlError> {
    if query.operation != Operation::Find {
        return Err(SqlError::UnsupportedOperation(query.operation));
    }
    let tree = match &query.filter {
        Some(input) => compile::compile(input)?,
        None => FilterNode::empty(),
    };
    let options = query.options.clone().unwrap_or_default();
    let limit = options.limit.filter(|l| *l > 0);
    let offset = options.skip.filter(|s| *s > 0);

    let mut sql = String::from("SELECT ");
    if dialect == SqlDialect::Mssql && offset.is_none() {
        if let Some(n) = limit {
            sql.push_str(&format!("TOP {} ", n));
        }
    }
    sql.push_str(&columns(options.projection.as_ref(), dialect));
    sql.push_str(&format!("\nFROM {}", dialect.ident(&query.collection)));

    if let Some(clause) = where_clause(&tree, dialect)? {
        sql.push_str(&format!("\nWHERE {}", clause));
    }

    let order = order_by(options.sort.as_ref(), dialect);
    match (&order, dialect, offset) {
        (Some(o), _, _) => sql.push_str(&format!("\nORDER BY {}", o)),
        (None, SqlDialect::Mssql, Some(_)) => sql.push_str("\nORDER BY (SELECT NULL)"),
        _ => {}
    }

    match (dialect, limit, offset) {
        (SqlDialect::Mssql | SqlDialect::Oracle, Some(n), Some(m)) => {
            sql.push_str(&format!("\nOFFSET {} ROWS FETCH NEXT {} ROWS ONLY", m, n))
        }
        (SqlDialect::Mssql | SqlDialect::Oracle, None, Some(m)) => {
            sql.push_str(&format!("\nOFFSET {} ROWS", m))
        }
        (SqlDialect::Mssql, Some(_), None) => {}
        (SqlDialect::Oracle, Some(n), None) => {
            sql.push_str(&format!("\nFETCH FIRST {} ROWS ONLY", n))
        }
        (_, Some(n), m) => {
            sql.push_str(&format!("\nLIMIT {}", n));
            if let Some(m) = m {
                sql.push_str(&format!(" OFFSET {}", m));
            }
        }
        (_, None, Some(m)) => sql.push_str(&format!("\nOFFSET {}", m)),
        (_, None, None) => {}
    }
    Ok(sql)
}

fn columns(projection: Option<&Map<String, Value>>, dialect: SqlDialect) -> String {
    let included: Vec<String> = projection
        .into_iter()
        .flatten()
        .filter(|(_, v)| compile::coerce::truthy(v))
        .map(|(k, _)| dialect.ident(k))
        .collect();
    if included.is_empty() {
        "*".to_string()
    } else {
        included.join(", ")
    }
}

fn order_by(sort: Option<&Map<String, Value>>, dialect: SqlDialect) -> Option<String> {
    let keys: Vec<String> = sort
        .into_iter()
        .flatten()
        .map(|(k, v)| {
            let desc = v.as_i64() == Some(-1)
                || v.as_str().is_some_and(|s| s.eq_ignore_ascii_case("desc"));
            format!("{} {}", dialect.ident(k), if desc { "DESC" } else { "ASC" })
        })
        .collect();
    (!keys.is_empty()).then(|| keys.join(", "))
}
