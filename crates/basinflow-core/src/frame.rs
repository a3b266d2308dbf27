/// Minimal tabular view of a hydrofabric attribute layer.
///
/// The GeoPackage reader fills this; attribute resolution only needs column
/// names and loosely typed cells.
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    /// Numeric value, parsing text cells. NaN counts as missing.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Cell::Null => return None,
            Cell::Int(i) => *i as f64,
            Cell::Real(r) => *r,
            Cell::Text(s) => s.trim().parse().ok()?,
        };
        (!v.is_nan()).then_some(v)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Rendered as an identifier (e.g. a waterbody id).
    pub fn to_id(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Int(i) => Some(i.to_string()),
            Cell::Real(r) if r.fract() == 0.0 => Some(format!("{}", *r as i64)),
            Cell::Real(r) => Some(r.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

/// Rows of one layer, each keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct AttributeFrame {
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, Cell>>,
}

impl AttributeFrame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: BTreeMap<String, Cell>) {
        self.rows.push(row);
    }

    /// Index rows by the text value of `column`.
    pub fn index_by<'a>(&'a self, column: &str) -> BTreeMap<String, &'a BTreeMap<String, Cell>> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Cell::to_id).map(|id| (id, row)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
