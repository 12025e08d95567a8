//! Pipeline wire format.
//!
//! Request: `{"requests": [{"type": "execute", "stmt": {"sql": "..."}}, ...]}`.
//! Response: `{"results": [...]}` with one element per statement, each either
//! an error object or `{"response": {"result": {"cols": [...], "rows": [...]}}}`.
//! A cell is a bare scalar or `{"value": scalar}`.
//!
//! A body that is not JSON or has no `results` array is a protocol error.
//! Any key missing below that degrades to an empty result set.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::QueryError;
use crate::movie::{format_duration, split_genres, title_hash_id, Movie};

#[derive(Debug, Serialize)]
struct PipelineRequest<'a> {
    requests: Vec<PipelineStatement<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PipelineStatement<'a> {
    Execute { stmt: Statement<'a> },
}

#[derive(Debug, Serialize)]
struct Statement<'a> {
    sql: &'a str,
}

/// Build the request document for an ordered batch of statements.
pub fn encode_request(statements: &[String]) -> Value {
    let request = PipelineRequest {
        requests: statements
            .iter()
            .map(|sql| PipelineStatement::Execute {
                stmt: Statement { sql },
            })
            .collect(),
    };
    // Serializing plain structs of strings cannot fail.
    serde_json::to_value(request).unwrap_or(Value::Null)
}

/// Column names and raw rows of one statement result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Decode a response body into one outcome per statement, in order.
pub fn decode_response(body: &str) -> Result<Vec<Result<ResultSet, QueryError>>, QueryError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| QueryError::Protocol(format!("invalid JSON: {}", e)))?;

    let results = root
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| QueryError::Protocol("response has no results array".to_string()))?;

    Ok(results.iter().map(decode_result).collect())
}

fn decode_result(element: &Value) -> Result<ResultSet, QueryError> {
    let is_error_type = element.get("type").and_then(Value::as_str) == Some("error");
    if let Some(error) = element.get("error").filter(|e| !e.is_null()) {
        return Err(QueryError::Remote(error_message(error)));
    }
    if is_error_type {
        return Err(QueryError::Remote("unspecified error".to_string()));
    }

    let Some(result) = element.get("response").and_then(|r| r.get("result")) else {
        return Ok(ResultSet::default());
    };

    let columns = result
        .get("cols")
        .and_then(Value::as_array)
        .map(|cols| {
            cols.iter()
                .map(|c| {
                    c.get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();

    let rows = result
        .get("rows")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| match row.as_array() {
                    Some(cells) => Some(cells.clone()),
                    None => {
                        warn!("Skipping non-array row in result set");
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ResultSet { columns, rows })
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

/// Positions of the semantic fields in a result set, resolved by name once
/// per response. Missing columns resolve to `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    pub id: Option<usize>,
    pub title: Option<usize>,
    pub runtime: Option<usize>,
    pub synopsis: Option<usize>,
    pub poster: Option<usize>,
    pub genres: Option<usize>,
}

impl ColumnIndex {
    pub fn resolve(columns: &[String]) -> Self {
        let find = |names: &[&str]| {
            names.iter().find_map(|name| {
                columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(name))
            })
        };

        Self {
            id: find(&["id"]),
            title: find(&["title"]),
            runtime: find(&["runtime", "duration"]),
            synopsis: find(&["overview", "synopsis"]),
            poster: find(&["poster_path", "poster_url", "poster"]),
            genres: find(&["genres", "genre"]),
        }
    }
}

/// Settings applied while turning rows into records.
#[derive(Debug, Clone)]
pub struct RecordMapping {
    /// Prefix for poster paths that are not already absolute URLs.
    pub image_base_url: String,
}

impl RecordMapping {
    pub fn new(image_base_url: impl Into<String>) -> Self {
        Self {
            image_base_url: image_base_url.into(),
        }
    }

    fn poster_url(&self, path: &str) -> String {
        if path.is_empty() || path.starts_with("http") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.image_base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }
}

impl ResultSet {
    /// Map every row to a [`Movie`] via name-resolved columns.
    pub fn into_movies(self, mapping: &RecordMapping) -> Vec<Movie> {
        let index = ColumnIndex::resolve(&self.columns);
        self.rows
            .iter()
            .map(|row| row_to_movie(row, &index, mapping))
            .collect()
    }
}

fn row_to_movie(row: &[Value], index: &ColumnIndex, mapping: &RecordMapping) -> Movie {
    let title = cell_string(row, index.title);
    let id = cell_i64(row, index.id)
        .filter(|id| *id != 0)
        .unwrap_or_else(|| title_hash_id(&title));
    let runtime = cell_i64(row, index.runtime)
        .map(|m| m.clamp(0, u32::MAX as i64) as u32)
        .unwrap_or(0);

    let mut movie = Movie::new(id, title);
    movie.synopsis = cell_string(row, index.synopsis);
    movie.poster_url = mapping.poster_url(&cell_string(row, index.poster));
    movie.duration = format_duration(runtime);
    movie.genres = split_genres(&cell_string(row, index.genres));
    movie
}

/// Cell at `index` with any `{"value": ...}` wrapper removed. Null and
/// out-of-range cells are `None`.
fn cell(row: &[Value], index: Option<usize>) -> Option<&Value> {
    let value = row.get(index?)?;
    let value = match value {
        Value::Object(obj) => obj.get("value")?,
        other => other,
    };
    (!value.is_null()).then_some(value)
}

fn cell_string(row: &[Value], index: Option<usize>) -> String {
    match cell(row, index) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn cell_i64(row: &[Value], index: Option<usize>) -> Option<i64> {
    match cell(row, index)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping() -> RecordMapping {
        RecordMapping::new("https://image.tmdb.org/t/p/w500")
    }

    #[test]
    fn test_encode_request_shape() {
        let request = encode_request(&["SELECT 1".to_string(), "SELECT 2".to_string()]);
        assert_eq!(
            request,
            json!({
                "requests": [
                    {"type": "execute", "stmt": {"sql": "SELECT 1"}},
                    {"type": "execute", "stmt": {"sql": "SELECT 2"}}
                ]
            })
        );
    }

    #[test]
    fn test_decode_columns_in_any_order_with_wrapped_cells() {
        let body = json!({
            "results": [{
                "type": "ok",
                "response": {
                    "type": "execute",
                    "result": {
                        "cols": [
                            {"name": "genres"}, {"name": "title"}, {"name": "id"},
                            {"name": "runtime"}, {"name": "overview"}, {"name": "poster_path"}
                        ],
                        "rows": [
                            [
                                {"type": "text", "value": "[\"Action\", \"Sci-Fi\"]"},
                                {"type": "text", "value": "Inception"},
                                {"type": "integer", "value": "27205"},
                                {"type": "integer", "value": "148"},
                                {"type": "text", "value": "A thief..."},
                                {"type": "text", "value": "/inception.jpg"}
                            ],
                            ["Drama", "Amélie", 194, 122, null, "https://cdn.example/amelie.jpg"]
                        ]
                    }
                }
            }]
        })
        .to_string();

        let mut results = decode_response(&body).unwrap();
        assert_eq!(results.len(), 1);
        let movies = results.remove(0).unwrap().into_movies(&mapping());

        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].id, 27205);
        assert_eq!(movies[0].title, "Inception");
        assert_eq!(movies[0].duration, "2h 28m");
        assert_eq!(movies[0].genres, vec!["Action", "Sci-Fi"]);
        assert_eq!(movies[0].poster_url, "https://image.tmdb.org/t/p/w500/inception.jpg");
        assert_eq!(movies[0].synopsis, "A thief...");

        assert_eq!(movies[1].id, 194);
        assert_eq!(movies[1].synopsis, "");
        assert_eq!(movies[1].poster_url, "https://cdn.example/amelie.jpg");
        assert_eq!(movies[1].genres, vec!["Drama"]);
    }

    #[test]
    fn test_missing_columns_default() {
        let body = json!({
            "results": [{"response": {"result": {
                "cols": [{"name": "title"}],
                "rows": [["Heat"]]
            }}}]
        })
        .to_string();

        let movies = decode_response(&body).unwrap().remove(0).unwrap().into_movies(&mapping());
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].id, title_hash_id("Heat"));
        assert_eq!(movies[0].duration, "");
        assert!(movies[0].genres.is_empty());
        assert_eq!(movies[0].poster_url, "");
    }

    #[test]
    fn test_error_element_is_remote_error() {
        let body = json!({
            "results": [
                {"type": "error", "error": {"message": "no such table: movies", "code": "SQLITE_UNKNOWN"}}
            ]
        })
        .to_string();

        let results = decode_response(&body).unwrap();
        match &results[0] {
            Err(QueryError::Remote(msg)) => assert!(msg.contains("no such table")),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_inner_keys_degrade_to_empty() {
        let body = json!({"results": [{"type": "ok"}, {"response": {}}, {"response": {"result": {}}}]})
            .to_string();
        let results = decode_response(&body).unwrap();
        assert_eq!(results.len(), 3);
        for result in results {
            assert_eq!(result.unwrap(), ResultSet::default());
        }
    }

    #[test]
    fn test_malformed_json_is_protocol_error() {
        assert!(matches!(
            decode_response("{not json"),
            Err(QueryError::Protocol(_))
        ));
    }

    #[test]
    fn test_missing_results_is_protocol_error() {
        assert!(matches!(
            decode_response(r#"{"baton": null}"#),
            Err(QueryError::Protocol(_))
        ));
    }

    #[test]
    fn test_column_index_resolution() {
        let columns: Vec<String> = ["ID", "poster", "title"].iter().map(|s| s.to_string()).collect();
        let index = ColumnIndex::resolve(&columns);
        assert_eq!(index.id, Some(0));
        assert_eq!(index.poster, Some(1));
        assert_eq!(index.title, Some(2));
        assert_eq!(index.genres, None);
    }

    #[test]
    fn test_short_rows_and_float_runtime() {
        let body = json!({
            "results": [{"response": {"result": {
                "cols": [{"name": "id"}, {"name": "runtime"}, {"name": "title"}],
                "rows": [[5, 45.0]]
            }}}]
        })
        .to_string();

        let movies = decode_response(&body).unwrap().remove(0).unwrap().into_movies(&mapping());
        assert_eq!(movies[0].id, 5);
        assert_eq!(movies[0].duration, "45m");
        assert_eq!(movies[0].title, "");
    }
}
