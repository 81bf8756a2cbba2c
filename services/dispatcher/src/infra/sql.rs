//! SQL text for callback side effects.
//!
//! Identifiers are validated before they reach this module and are always
//! double-quoted. Values never appear in the text: table mutations bind one
//! JSON object per row image and let `jsonb_populate_record` coerce it to the
//! target table's column types; rpc calls bind one parameter per argument.

use serde_json::{Map, Value};

use crate::domain::types::{MutationOp, RpcCall, TableMutation};

/// SQL text plus the JSON parameters it binds, in `$n` order.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationSql {
    pub sql: String,
    pub params: Vec<Value>,
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

/// Columns are emitted in sorted order regardless of the map's iteration order.
fn column_list<'a>(cols: impl IntoIterator<Item = &'a String>) -> String {
    let mut cols = cols.into_iter().collect::<Vec<_>>();
    cols.sort();
    cols.into_iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn populate(table: &str, param: usize) -> String {
    format!("jsonb_populate_record(NULL::{}, ${param}::jsonb)", quote(table))
}

/// `match ∪ data`, with `data` winning on shared keys.
fn row_image(mutation: &TableMutation) -> Map<String, Value> {
    let mut row = mutation.match_on.clone();
    row.extend(mutation.data.clone());
    row
}

pub fn build_mutation(mutation: &TableMutation) -> MutationSql {
    let table = quote(&mutation.table);
    match mutation.op {
        MutationOp::Insert => {
            let row = row_image(mutation);
            let cols = column_list(row.keys());
            MutationSql {
                sql: format!(
                    "INSERT INTO {table} ({cols}) SELECT {cols} FROM {}",
                    populate(&mutation.table, 1)
                ),
                params: vec![Value::Object(row)],
            }
        }
        MutationOp::Update => {
            let set_cols = column_list(mutation.data.keys());
            let key_cols = column_list(mutation.match_on.keys());
            MutationSql {
                sql: format!(
                    "UPDATE {table} SET ({set_cols}) = (SELECT {set_cols} FROM {}) \
                     WHERE ({key_cols}) = (SELECT {key_cols} FROM {})",
                    populate(&mutation.table, 1),
                    populate(&mutation.table, 2)
                ),
                params: vec![
                    Value::Object(mutation.data.clone()),
                    Value::Object(mutation.match_on.clone()),
                ],
            }
        }
        MutationOp::Upsert => {
            let row = row_image(mutation);
            let cols = column_list(row.keys());
            let key_cols = column_list(mutation.match_on.keys());
            let mut updated = mutation
                .data
                .keys()
                .filter(|c| !mutation.match_on.contains_key(*c))
                .collect::<Vec<_>>();
            updated.sort();
            let assignments = updated
                .into_iter()
                .map(|c| format!("{0} = EXCLUDED.{0}", quote(c)))
                .collect::<Vec<_>>();
            let on_conflict = if assignments.is_empty() {
                "DO NOTHING".to_owned()
            } else {
                format!("DO UPDATE SET {}", assignments.join(", "))
            };
            MutationSql {
                sql: format!(
                    "INSERT INTO {table} ({cols}) SELECT {cols} FROM {} \
                     ON CONFLICT ({key_cols}) {on_conflict}",
                    populate(&mutation.table, 1)
                ),
                params: vec![Value::Object(row)],
            }
        }
    }
}

/// `SELECT to_jsonb(r) ... FROM "fn"("a" => $1, ...)`, one row per result row.
/// Arguments are bound in sorted name order.
pub fn build_rpc(call: &RpcCall) -> (String, Vec<Value>) {
    let mut named = call.args.iter().collect::<Vec<_>>();
    named.sort_by(|a, b| a.0.cmp(b.0));
    let args = named
        .iter()
        .enumerate()
        .map(|(i, (name, _))| format!("{} => ${}", quote(name), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT to_jsonb(r) AS result FROM (SELECT * FROM {}({args})) AS r",
        quote(&call.function)
    );
    (sql, named.into_iter().map(|(_, v)| v.clone()).collect())
}
