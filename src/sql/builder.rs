//! Builds parameterized SQL over the JSONB documents table. Field names and values are always bound.

use crate::error::StoreError;
use crate::query::{Condition, Predicate, SortOrder};
use crate::sql::params::SqlParam;
use crate::store::{Document, FindOptions};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from settings).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, p: SqlParam) -> String {
        self.params.push(p);
        format!("${}", self.params.len())
    }

    fn field(&mut self, name: &str) -> String {
        let ph = self.push_param(SqlParam::text(name));
        format!("(doc -> {}::text)", ph)
    }

    fn field_text(&mut self, name: &str) -> String {
        let ph = self.push_param(SqlParam::text(name));
        format!("(doc ->> {}::text)", ph)
    }
}

/// `CREATE TABLE` for the documents table.
pub fn create_documents_table(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            doc JSONB NOT NULL,
            seq BIGSERIAL,
            PRIMARY KEY (collection, id)
        )
        "#,
        table
    )
}

fn where_clause(q: &mut QueryBuf, collection: &str, condition: &Condition) -> Result<String, StoreError> {
    let ph = q.push_param(SqlParam::text(collection));
    let mut parts = vec![format!("collection = {}", ph)];
    for (field, predicate) in condition.iter() {
        parts.push(predicate_sql(q, field, predicate)?);
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

fn predicate_sql(q: &mut QueryBuf, field: &str, predicate: &Predicate) -> Result<String, StoreError> {
    Ok(match predicate {
        Predicate::Exact(v) => {
            let f = q.field(field);
            let ph = q.push_param(SqlParam::Json(v.clone()));
            format!(
                "({f} = {ph}::jsonb OR (jsonb_typeof({f}) = 'array' AND {f} @> jsonb_build_array({ph}::jsonb)))",
                f = f,
                ph = ph
            )
        }
        Predicate::Pattern(source) => {
            let f = q.field_text(field);
            let ph = q.push_param(SqlParam::text(source.clone()));
            format!("{} ~ {}", f, ph)
        }
        Predicate::Range { gte, lte } => match (gte.as_f64(), lte.as_f64()) {
            (Some(lo), Some(hi)) => {
                let f = q.field(field);
                let ft = q.field_text(field);
                let lo = q.push_param(SqlParam::Float(lo));
                let hi = q.push_param(SqlParam::Float(hi));
                format!(
                    "(CASE WHEN jsonb_typeof({}) = 'number' THEN {}::float8 END) BETWEEN {}::float8 AND {}::float8",
                    f, ft, lo, hi
                )
            }
            _ => {
                let ft = q.field_text(field);
                let lo = q.push_param(SqlParam::text(value_text(gte)));
                let hi = q.push_param(SqlParam::text(value_text(lte)));
                format!("{} BETWEEN {} AND {}", ft, lo, hi)
            }
        },
        Predicate::In(values) => {
            let f = q.field(field);
            let ph = q.push_param(SqlParam::Json(Value::Array(values.clone())));
            format!("{}::jsonb @> jsonb_build_array({})", ph, f)
        }
        Predicate::Near(near) => {
            let (lng, lat, max_distance) = near.resolve()?;
            let distance = distance_sql(q, field, lng, lat);
            let max = q.push_param(SqlParam::Float(max_distance));
            format!("{} <= {}::float8", distance, max)
        }
    })
}

/// Haversine distance in meters from (lng, lat) to the field's GeoJSON point.
fn distance_sql(q: &mut QueryBuf, field: &str, lng: f64, lat: f64) -> String {
    let key = q.push_param(SqlParam::text(field));
    let lng = q.push_param(SqlParam::Float(lng));
    let lat = q.push_param(SqlParam::Float(lat));
    let plng = format!("((doc -> {}::text -> 'coordinates' ->> 0)::float8)", key);
    let plat = format!("((doc -> {}::text -> 'coordinates' ->> 1)::float8)", key);
    format!(
        "(12742000 * asin(sqrt(power(sin(radians({plat} - {lat}::float8) / 2), 2) + cos(radians({lat}::float8)) * cos(radians({plat})) * power(sin(radians({plng} - {lng}::float8) / 2), 2))))",
        plat = plat,
        plng = plng,
        lat = lat,
        lng = lng
    )
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn order_clause(q: &mut QueryBuf, condition: &Condition, options: &FindOptions) -> Result<String, StoreError> {
    let mut parts = Vec::new();
    for (field, order) in &options.sort {
        let f = q.field(field);
        let dir = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        parts.push(format!("{} {}", f, dir));
    }
    if parts.is_empty() {
        if let Some((field, near)) = condition.near() {
            let (lng, lat, _) = near.resolve()?;
            parts.push(distance_sql(q, field, lng, lat));
        }
    }
    parts.push("seq".into());
    Ok(format!(" ORDER BY {}", parts.join(", ")))
}

/// SELECT doc with condition, sort, skip and limit. Projection is applied by the caller.
pub fn select(table: &str, collection: &str, condition: &Condition, options: &FindOptions) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, collection, condition)?;
    let order_sql = order_clause(&mut q, condition, options)?;
    let limit_sql = options.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_sql = if options.skip > 0 {
        format!(" OFFSET {}", options.skip)
    } else {
        String::new()
    };
    q.sql = format!("SELECT doc FROM {}{}{}{}{}", table, where_sql, order_sql, limit_sql, offset_sql);
    Ok(q)
}

pub fn count(table: &str, collection: &str, condition: &Condition) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, collection, condition)?;
    q.sql = format!("SELECT COUNT(*) FROM {}{}", table, where_sql);
    Ok(q)
}

/// Merge `patch` into the first matching document (shallow `||`).
pub fn update_first(table: &str, collection: &str, condition: &Condition, patch: &Document) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let patch_ph = q.push_param(SqlParam::Json(Value::Object(patch.clone())));
    let coll_ph = q.push_param(SqlParam::text(collection));
    let where_sql = where_clause(&mut q, collection, condition)?;
    q.sql = format!(
        "UPDATE {t} SET doc = doc || {p}::jsonb WHERE collection = {c} AND id = (SELECT id FROM {t}{w} ORDER BY seq LIMIT 1) RETURNING doc",
        t = table,
        p = patch_ph,
        c = coll_ph,
        w = where_sql
    );
    Ok(q)
}

pub fn delete_first(table: &str, collection: &str, condition: &Condition) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let coll_ph = q.push_param(SqlParam::text(collection));
    let where_sql = where_clause(&mut q, collection, condition)?;
    q.sql = format!(
        "DELETE FROM {t} WHERE collection = {c} AND id = (SELECT id FROM {t}{w} ORDER BY seq LIMIT 1) RETURNING doc",
        t = table,
        c = coll_ph,
        w = where_sql
    );
    Ok(q)
}

pub fn upsert(table: &str, collection: &str, id: &str, document: &Document) -> QueryBuf {
    let mut q = QueryBuf::new();
    let c = q.push_param(SqlParam::text(collection));
    let i = q.push_param(SqlParam::text(id));
    let d = q.push_param(SqlParam::Json(Value::Object(document.clone())));
    q.sql = format!(
        "INSERT INTO {} (collection, id, doc) VALUES ({}, {}, {}::jsonb) ON CONFLICT (collection, id) DO UPDATE SET doc = EXCLUDED.doc",
        table, c, i, d
    );
    q
}

pub fn delete_by_id(table: &str, collection: &str, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let c = q.push_param(SqlParam::text(collection));
    let i = q.push_param(SqlParam::text(id));
    q.sql = format!("DELETE FROM {} WHERE collection = {} AND id = {}", table, c, i);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::GeoNear;
    use serde_json::json;

    const TABLE: &str = "\"schema_rest\".\"documents\"";

    #[test]
    fn select_binds_fields_and_values() {
        let mut c = Condition::new();
        c.set("name", Predicate::Pattern("(?s)^A.*$".into()));
        c.set("age", Predicate::Range { gte: json!(1), lte: json!(9) });
        let options = FindOptions {
            sort: vec![("name".into(), SortOrder::Desc)],
            skip: 5,
            limit: Some(10),
            fields: None,
        };
        let q = select(TABLE, "person", &c, &options).unwrap();
        assert!(q.sql.starts_with("SELECT doc FROM \"schema_rest\".\"documents\" WHERE collection = $1 AND (doc ->> $2::text) ~ $3"));
        assert!(q.sql.ends_with("ORDER BY (doc -> $8::text) DESC, seq LIMIT 10 OFFSET 5"));
        assert_eq!(q.params[0], SqlParam::text("person"));
        assert_eq!(q.params[1], SqlParam::text("name"));
        assert_eq!(q.params[5], SqlParam::Float(1.0));
        assert!(!q.sql.contains("'name'"));
    }

    #[test]
    fn text_ranges_and_membership() {
        let mut c = Condition::new();
        c.set("at", Predicate::Range { gte: json!("2024-01-01"), lte: json!("2024-02-01") });
        c.set("tag", Predicate::In(vec![json!("a"), json!("b")]));
        let q = count(TABLE, "post", &c).unwrap();
        assert!(q.sql.contains("(doc ->> $2::text) BETWEEN $3 AND $4"));
        assert!(q.sql.contains("$6::jsonb @> jsonb_build_array((doc -> $5::text))"));
        assert_eq!(q.params[5], SqlParam::Json(json!(["a", "b"])));
    }

    #[test]
    fn malformed_near_is_rejected_when_building() {
        let mut c = Condition::new();
        c.set("loc", Predicate::Near(GeoNear::from_input("1,2")));
        assert!(matches!(count(TABLE, "place", &c), Err(StoreError::InvalidQuery(_))));
    }

    #[test]
    fn update_targets_first_match() {
        let patch = json!({ "name": "B" }).as_object().cloned().unwrap();
        let q = update_first(TABLE, "person", &Condition::by_id("a"), &patch).unwrap();
        assert!(q.sql.starts_with("UPDATE \"schema_rest\".\"documents\" SET doc = doc || $1::jsonb WHERE collection = $2"));
        assert!(q.sql.ends_with("ORDER BY seq LIMIT 1) RETURNING doc"));
        assert_eq!(q.params.len(), 5);
    }
}
