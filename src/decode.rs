//! Decoding SQLite rows into JSON values

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Row as _, TypeInfo, Value, ValueRef};

use crate::backend::Row;
use crate::{Error, Result};

/// Decode every row of a result set
pub(crate) fn decode_rows(rows: &[SqliteRow]) -> Result<Vec<Row>> {
   rows.iter().map(decode_row).collect()
}

/// Decode one row, keeping column order
pub(crate) fn decode_row(row: &SqliteRow) -> Result<Row> {
   let mut value = Row::default();
   for (i, column) in row.columns().iter().enumerate() {
      let v = row.try_get_raw(i)?;
      value.insert(column.name().to_string(), to_json(v)?);
   }
   Ok(value)
}

/// Convert a single SQLite value to JSON based on its storage class.
///
/// BLOBs become standard base64 strings. Non-finite REALs become `null`.
pub(crate) fn to_json(v: SqliteValueRef<'_>) -> Result<JsonValue> {
   if v.is_null() {
      return Ok(JsonValue::Null);
   }

   let type_name = v.type_info().name().to_string();
   let owned = ValueRef::to_owned(&v);

   let json = match type_name.as_str() {
      "INTEGER" | "NUMERIC" | "BOOLEAN" => JsonValue::from(owned.try_decode_unchecked::<i64>()?),
      "REAL" => {
         let n = owned.try_decode_unchecked::<f64>()?;
         serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
      }
      "TEXT" | "DATE" | "TIME" | "DATETIME" => {
         JsonValue::String(owned.try_decode_unchecked::<String>()?)
      }
      "BLOB" => {
         let bytes = owned.try_decode_unchecked::<Vec<u8>>()?;
         JsonValue::String(STANDARD.encode(bytes))
      }
      "NULL" => JsonValue::Null,
      other => return Err(Error::UnsupportedDatatype(other.to_string())),
   };

   Ok(json)
}

#[cfg(test)]
mod tests {
   use super::*;
   use sqlx::{Connection, SqliteConnection};

   async fn decode_select(sql: &str) -> Row {
      let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
      let row = sqlx::query(sql).fetch_one(&mut conn).await.unwrap();
      decode_row(&row).unwrap()
   }

   #[tokio::test]
   async fn test_decode_each_storage_class() {
      let row = decode_select(
         "SELECT NULL AS n, 42 AS i, 2.5 AS r, 'hi' AS t, X'48656C6C6F' AS b",
      )
      .await;

      assert_eq!(row.get("n"), Some(&JsonValue::Null));
      assert_eq!(row.get("i"), Some(&JsonValue::from(42)));
      assert_eq!(row.get("r"), Some(&JsonValue::from(2.5)));
      assert_eq!(row.get("t"), Some(&JsonValue::from("hi")));
      assert_eq!(row.get("b"), Some(&JsonValue::from("SGVsbG8=")));
   }

   #[tokio::test]
   async fn test_decode_keeps_column_order() {
      let row = decode_select("SELECT 1 AS z, 2 AS a, 3 AS m").await;
      let keys: Vec<&str> = row.keys().map(String::as_str).collect();
      assert_eq!(keys, vec!["z", "a", "m"]);
   }
}
