use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt;
use tiberius::{ColumnData, FromSql};

/// A single value from a result set, already converted for display and math.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Null | Cell::Bool(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            Cell::Float(v) => Some(*v as i64),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Null | Cell::Bool(_) => None,
        }
    }

    /// Text content; `None` for NULL and for empty strings.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Text(s) if s.is_empty() => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Bool(v) => write!(f, "{v}"),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(v) => f.write_str(v),
        }
    }
}

impl From<&ColumnData<'static>> for Cell {
    fn from(data: &ColumnData<'static>) -> Self {
        let cell = match data {
            ColumnData::U8(v) => v.map(|x| Cell::Int(x.into())),
            ColumnData::I16(v) => v.map(|x| Cell::Int(x.into())),
            ColumnData::I32(v) => v.map(|x| Cell::Int(x.into())),
            ColumnData::I64(v) => v.map(Cell::Int),
            ColumnData::F32(v) => v.map(|x| Cell::Float(x.into())),
            ColumnData::F64(v) => v.map(Cell::Float),
            ColumnData::Bit(v) => v.map(Cell::Bool),
            ColumnData::String(v) => v.as_ref().map(|s| Cell::Text(s.to_string())),
            ColumnData::Guid(v) => v.as_ref().map(|g| Cell::Text(g.to_string())),
            ColumnData::Numeric(v) => v.as_ref().map(|n| {
                Cell::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale())))
            }),
            ColumnData::Binary(v) => v.as_ref().map(|bytes| {
                let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
                Cell::Text(format!("0x{hex}"))
            }),
            ColumnData::Date(_) => temporal::<NaiveDate>(data),
            ColumnData::Time(_) => temporal::<NaiveTime>(data),
            ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
                temporal::<NaiveDateTime>(data)
            }
            ColumnData::DateTimeOffset(_) => temporal::<DateTime<Utc>>(data),
            other => Some(Cell::Text(format!("{other:?}"))),
        };
        cell.unwrap_or(Cell::Null)
    }
}

fn temporal<'a, T>(data: &'a ColumnData<'static>) -> Option<Cell>
where
    T: FromSql<'a> + fmt::Display,
{
    T::from_sql(data)
        .ok()
        .flatten()
        .map(|v| Cell::Text(v.to_string()))
}

/// Column names plus rows of one result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value of the first column of the first row, e.g. for `SELECT COUNT(*)`.
    pub fn scalar(&self) -> Option<&Cell> {
        self.rows.first().and_then(|row| row.first())
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn converts_column_data() {
        assert_eq!(Cell::from(&ColumnData::I32(Some(7))), Cell::Int(7));
        assert_eq!(Cell::from(&ColumnData::I32(None)), Cell::Null);
        assert_eq!(
            Cell::from(&ColumnData::String(Some(Cow::Borrowed("Storage")))),
            Cell::Text("Storage".into())
        );
        assert_eq!(Cell::from(&ColumnData::Bit(Some(true))), Cell::Bool(true));
    }

    #[test]
    fn numeric_text_parses_as_number() {
        assert_eq!(Cell::Text(" 12.5 ".into()).as_f64(), Some(12.5));
        assert_eq!(Cell::Null.as_f64(), None);
        assert_eq!(Cell::Text(String::new()).as_text(), None);
    }

    #[test]
    fn looks_up_columns_case_insensitively() {
        let result = QueryResult {
            columns: vec!["ServiceName".into(), "TotalCost".into()],
            rows: vec![vec![Cell::Text("Storage".into()), Cell::Float(3.5)]],
        };
        assert_eq!(result.get(0, "totalcost"), Some(&Cell::Float(3.5)));
        assert_eq!(result.scalar(), Some(&Cell::Text("Storage".into())));
    }
}
