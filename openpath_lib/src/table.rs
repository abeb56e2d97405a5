use serde_json::{Map, Value};

use crate::columns::NamedColumn;

/// One row of an administrator table, keyed by column name.
pub type Row = Map<String, Value>;

/// Flattens nested objects into dotted keys. Arrays and scalars are leaves.
pub fn flatten(document: &Value) -> Row {
    let mut row = Row::new();
    if let Value::Object(map) = document {
        flatten_into(&mut row, None, map);
    }
    row
}

fn flatten_into(row: &mut Row, prefix: Option<&str>, map: &Map<String, Value>) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(row, Some(&path), inner),
            _ => {
                row.insert(path, value.clone());
            }
        }
    }
}

/// Keeps `columns` of a flattened document and adds each named column under
/// its label. Missing paths become `null`.
pub fn project<'a>(document: &Value, columns: impl IntoIterator<Item = &'a str>, named: &[NamedColumn]) -> Row {
    let flat = flatten(document);
    let mut row = Row::new();

    for column in columns {
        row.insert(column.to_string(), flat.get(column).cloned().unwrap_or(Value::Null));
    }
    for column in named {
        row.insert(column.label.clone(), flat.get(&column.path).cloned().unwrap_or(Value::Null));
    }

    row
}

/// Drops every column whose full path or last segment is listed in `excluded`.
pub fn drop_columns<'a>(mut row: Row, excluded: impl IntoIterator<Item = &'a str> + Clone) -> Row {
    row.retain(|key, _| {
        let last_segment = key.rsplit('.').next().unwrap_or(key);
        !excluded.clone().into_iter().any(|column| column == key || column == last_segment)
    });
    row
}
