/// NWM soil class table (`SOILPARM.TBL`, STAS section).
///
/// Three header lines, then one comma-separated row per soil texture class:
/// `index, BB, DRYSMC, F11, MAXSMC, REFSMC, SATPSI, SATDK, SATDW, WLTSMC,
/// QTZ, BVIC, AXAJ, BXAJ, XXAJ, BDVIC, BBVIC, GDVIC, 'NAME'`.
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Header lines before the first class row.
const HEADER_LINES: usize = 3;

/// Number of soil classes in the STAS section.
pub const N_SOIL_CLASSES: usize = 19;

/// Numeric columns following the class index.
const N_NUMERIC: usize = 17;

#[derive(Debug, Clone, PartialEq)]
pub struct SoilClass {
    pub name: String,
    pub bb: f64,
    pub maxsmc: f64,
    pub satpsi: f64,
    pub satdk: f64,
    pub wltsmc: f64,
    /// Quartz fraction [-].
    pub qtz: f64,
    /// Xinanjiang inflection point parameter.
    pub axaj: f64,
    /// Xinanjiang shape parameter b.
    pub bxaj: f64,
    /// Xinanjiang shape parameter x.
    pub xxaj: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SoilClassTable {
    classes: BTreeMap<i64, SoilClass>,
}

impl SoilClassTable {
    pub fn parse(text: &str) -> Result<Self> {
        let mut classes = BTreeMap::new();
        for (lineno, line) in text
            .lines()
            .enumerate()
            .skip(HEADER_LINES)
            .take(N_SOIL_CLASSES)
        {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < N_NUMERIC + 1 {
                return Err(Error::SoilTable(format!(
                    "line {}: expected at least {} fields, got {}",
                    lineno + 1,
                    N_NUMERIC + 1,
                    fields.len()
                )));
            }
            let index: i64 = fields[0]
                .parse()
                .map_err(|_| Error::SoilTable(format!("line {}: bad class index", lineno + 1)))?;
            let mut values = [0.0; N_NUMERIC];
            for (i, raw) in fields[1..=N_NUMERIC].iter().enumerate() {
                values[i] = raw.parse().map_err(|_| {
                    Error::SoilTable(format!("line {}: bad value `{raw}`", lineno + 1))
                })?;
            }
            let name = fields
                .get(N_NUMERIC + 1)
                .map(|s| s.trim_matches('\'').to_string())
                .unwrap_or_default();
            classes.insert(
                index,
                SoilClass {
                    name,
                    bb: values[0],
                    maxsmc: values[3],
                    satpsi: values[5],
                    satdk: values[6],
                    wltsmc: values[8],
                    qtz: values[9],
                    axaj: values[11],
                    bxaj: values[12],
                    xxaj: values[13],
                },
            );
        }
        if classes.is_empty() {
            return Err(Error::SoilTable("no soil classes found".to_string()));
        }
        Ok(Self { classes })
    }

    pub fn get(&self, isltyp: i64) -> Result<&SoilClass> {
        self.classes
            .get(&isltyp)
            .ok_or(Error::UnknownSoilClass(isltyp))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = "\
Soil Parameters
STAS
19,1   'BB      DRYSMC      F11     MAXSMC   REFSMC   SATPSI  SATDK       SATDW     WLTSMC  QTZ    BVIC  AXAJ   BXAJ  XXAJ  BDVIC  BBVIC  GDVIC ISLTYP'
1,     2.79,    0.010,    -0.472,   0.339,   0.192,   0.069,  4.66E-5,  0.608E-6,   0.010,  0.92,  0.050, 0.009, 0.050, 0.050, 0.050, 0.000, 0.000, 'SAND'
2,     4.26,    0.028,    -1.044,   0.421,   0.283,   0.036,  1.41E-5,  0.514E-5,   0.028,  0.82,  0.080, 0.010, 0.060, 0.060, 0.080, 0.000, 0.000, 'LOAMY SAND'
3,     4.74,    0.047,    -0.569,   0.434,   0.312,   0.141,  5.23E-6,  0.805E-5,   0.047,  0.60,  0.090, 0.011, 0.070, 0.070, 0.090, 0.000, 0.000, 'SANDY LOAM'
";

    pub(crate) fn sample() -> SoilClassTable {
        SoilClassTable::parse(SAMPLE).unwrap()
    }

    #[test]
    fn parses_rows_after_header() {
        let t = sample();
        assert_eq!(t.len(), 3);
        let sand = t.get(1).unwrap();
        assert_eq!(sand.name, "SAND");
        assert_eq!(sand.qtz, 0.92);
        assert_eq!(sand.satdk, 4.66e-5);
    }

    #[test]
    fn xinanjiang_columns() {
        let loam = sample().get(3).unwrap().clone();
        assert_eq!(loam.axaj, 0.011);
        assert_eq!(loam.bxaj, 0.070);
        assert_eq!(loam.xxaj, 0.070);
    }

    #[test]
    fn unknown_class_is_an_error() {
        assert!(matches!(sample().get(12), Err(Error::UnknownSoilClass(12))));
    }

    #[test]
    fn short_row_is_rejected() {
        let text = "a\nb\nc\n1, 2.79, 0.01\n";
        assert!(SoilClassTable::parse(text).is_err());
    }
}
