//! Bind parameters for the document queries.

use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{Query, QueryAs, QueryScalar};

/// A value bound to a PostgreSQL placeholder.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Text(String),
    Float(f64),
    Json(Value),
}

impl SqlParam {
    pub fn text(s: impl Into<String>) -> Self {
        SqlParam::Text(s.into())
    }
}

/// Bind every parameter in placeholder order.
pub fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = match p {
            SqlParam::Text(s) => query.bind(s.as_str()),
            SqlParam::Float(f) => query.bind(*f),
            SqlParam::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}

pub fn bind_params_as<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    params: &'q [SqlParam],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for p in params {
        query = match p {
            SqlParam::Text(s) => query.bind(s.as_str()),
            SqlParam::Float(f) => query.bind(*f),
            SqlParam::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}

pub fn bind_params_scalar<'q, O>(
    mut query: QueryScalar<'q, Postgres, O, PgArguments>,
    params: &'q [SqlParam],
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    for p in params {
        query = match p {
            SqlParam::Text(s) => query.bind(s.as_str()),
            SqlParam::Float(f) => query.bind(*f),
            SqlParam::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}
