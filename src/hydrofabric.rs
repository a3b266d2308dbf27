/// Hydrofabric GeoPackage reader.
///
/// Reads the `divides` layer (ids, centroids, drainage area), the model
/// attributes layer and the flowpath attributes layer through SQLite.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use basinflow_core::attributes::{Divide, GeoPoint, DIVIDE_ID_COLUMN};
use basinflow_core::frame::{AttributeFrame, Cell};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::geometry::{geographic_centroid, SrsRecord, ToGeographic};

pub const DIVIDES_LAYER: &str = "divides";
const MODEL_ATTRIBUTE_LAYERS: [&str; 2] = ["model-attributes", "model_attributes"];
const DRAINAGE_AREA_COLUMN: &str = "tot_drainage_areasqkm";

/// Attribute source for one basin.
pub trait Hydrofabric {
    fn divides(&self) -> Result<Vec<Divide>>;
    fn model_attributes(&self) -> Result<AttributeFrame>;
    fn flowpath_attributes(&self) -> Result<AttributeFrame>;
}

pub struct GeoPackage {
    path: PathBuf,
    conn: Connection,
    layers: Vec<String>,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_cell(value: ValueRef<'_>) -> Option<Cell> {
    Some(match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Int(i),
        ValueRef::Real(r) => Cell::Real(r),
        ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => return None,
    })
}

impl GeoPackage {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("opening geopackage {}", path.display()))?;
        let layers = {
            let mut stmt = conn
                .prepare("SELECT table_name FROM gpkg_contents ORDER BY table_name")
                .with_context(|| format!("{} is not a geopackage", path.display()))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            names
        };
        Ok(Self {
            path: path.to_path_buf(),
            conn,
            layers,
        })
    }

    fn require_layer<'a>(&'a self, wanted: &str, found: Option<&'a String>) -> Result<&'a str> {
        match found {
            Some(layer) => Ok(layer),
            None => bail!(
                "{}: no {wanted} layer (layers: {})",
                self.path.display(),
                self.layers.join(", ")
            ),
        }
    }

    /// All non-blob columns of `table`.
    pub fn read_frame(&self, table: &str) -> Result<AttributeFrame> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {}", quote_ident(table)))
            .with_context(|| format!("reading layer `{table}`"))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let mut frame = AttributeFrame::new(Vec::new());
        let mut blob_columns = vec![false; names.len()];
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut record = std::collections::BTreeMap::new();
            for (i, name) in names.iter().enumerate() {
                match to_cell(row.get_ref(i)?) {
                    Some(cell) => {
                        record.insert(name.clone(), cell);
                    }
                    None => blob_columns[i] = true,
                }
            }
            frame.push_row(record);
        }
        frame.columns = names
            .into_iter()
            .zip(blob_columns)
            .filter(|(_, blob)| !blob)
            .map(|(name, _)| name)
            .collect();
        Ok(frame)
    }

    /// Geometry column and SRS id registered for `table`.
    fn geometry_column(&self, table: &str) -> Result<(String, i64)> {
        self.conn
            .query_row(
                "SELECT column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
                [table],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .with_context(|| format!("layer `{table}` has no registered geometry column"))
    }

    /// Definition of `srs_id` from `gpkg_spatial_ref_sys`, falling back to
    /// the EPSG code of the same number when the table has no such row.
    pub fn spatial_ref(&self, srs_id: i64) -> Result<SrsRecord> {
        if !self.has_table("gpkg_spatial_ref_sys")? {
            return Ok(SrsRecord::epsg(srs_id));
        }
        let found = self
            .conn
            .query_row(
                "SELECT organization, organization_coordsys_id, definition \
                 FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
                [srs_id],
                |row| {
                    Ok(SrsRecord {
                        srs_id,
                        organization: row.get(0)?,
                        organization_coordsys_id: row.get(1)?,
                        definition: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(found.unwrap_or_else(|| SrsRecord::epsg(srs_id)))
    }

    fn has_table(&self, name: &str) -> Result<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }
}

impl Hydrofabric for GeoPackage {
    fn divides(&self) -> Result<Vec<Divide>> {
        let (geom_col, srs_id) = self.geometry_column(DIVIDES_LAYER)?;
        let to_geo = ToGeographic::new(&self.spatial_ref(srs_id)?)
            .with_context(|| format!("{}: divides layer", self.path.display()))?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {}", quote_ident(DIVIDES_LAYER)))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let position = |col: &str| names.iter().position(|n| n == col);
        let Some(id_idx) = position(DIVIDE_ID_COLUMN) else {
            bail!("{}: divides layer has no {DIVIDE_ID_COLUMN} column", self.path.display());
        };
        let Some(geom_idx) = position(&geom_col) else {
            bail!("{}: divides layer has no `{geom_col}` column", self.path.display());
        };
        let area_idx = position(DRAINAGE_AREA_COLUMN);

        let mut divides = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let Some(id) = to_cell(row.get_ref(id_idx)?).and_then(|c| c.to_id()) else {
                continue;
            };
            let centroid = match row.get_ref(geom_idx)? {
                ValueRef::Blob(blob) => geographic_centroid(blob, &to_geo)
                    .with_context(|| format!("decoding geometry of {id}"))?,
                _ => None,
            };
            let Some([lon, lat]) = centroid else {
                bail!("{}: divide {id} has an empty geometry", self.path.display());
            };
            let centroid = GeoPoint { lon, lat };
            let tot_drainage_area = match area_idx {
                Some(i) => to_cell(row.get_ref(i)?).and_then(|c| c.as_f64()),
                None => None,
            };
            divides.push(Divide {
                id,
                centroid,
                tot_drainage_area,
            });
        }
        Ok(divides)
    }

    fn model_attributes(&self) -> Result<AttributeFrame> {
        let found = self
            .layers
            .iter()
            .find(|l| MODEL_ATTRIBUTE_LAYERS.contains(&l.as_str()));
        let layer = self.require_layer("model attributes", found)?;
        self.read_frame(layer)
    }

    fn flowpath_attributes(&self) -> Result<AttributeFrame> {
        let found = self
            .layers
            .iter()
            .find(|l| l.contains("flowpath") && !l.contains("flowpaths"));
        let layer = self.require_layer("flowpath attributes", found)?;
        self.read_frame(layer)
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Minimal GeoPackages for tests.
    use super::*;
    use crate::geometry::tests::square_blob;

    pub struct FixtureDivide<'a> {
        pub id: &'a str,
        /// Lower-left corner and side of a square divide.
        pub corner: [f64; 2],
        pub side: f64,
        pub area_sqkm: f64,
        pub gage: Option<&'a str>,
    }

    const GIUH: &str = r#"[{"v": 60, "frequency": 0.7}, {"v": 120, "frequency": 0.3}]"#;

    pub fn write(path: &Path, srs_id: i64, divides: &[FixtureDivide<'_>]) -> Result<()> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE gpkg_contents (table_name TEXT PRIMARY KEY, data_type TEXT);
            CREATE TABLE gpkg_geometry_columns (table_name TEXT, column_name TEXT,
                geometry_type_name TEXT, srs_id INTEGER);
            CREATE TABLE gpkg_spatial_ref_sys (srs_name TEXT, srs_id INTEGER PRIMARY KEY,
                organization TEXT, organization_coordsys_id INTEGER, definition TEXT);
            CREATE TABLE divides (fid INTEGER PRIMARY KEY, divide_id TEXT, geom BLOB,
                tot_drainage_areasqkm REAL);
            CREATE TABLE "model-attributes" (divide_id TEXT,
                "mode.bexp_soil_layers_stag=1" REAL, "mean.elevation" REAL, giuh TEXT);
            CREATE TABLE "flowpath-attributes" (id TEXT, toid TEXT, rl_gages TEXT,
                length_m REAL, geom BLOB);
            CREATE TABLE flowpaths (id TEXT);
            INSERT INTO gpkg_contents VALUES ('divides', 'features'),
                ('model-attributes', 'attributes'), ('flowpath-attributes', 'attributes'),
                ('flowpaths', 'features');
            "#,
        )?;
        conn.execute(
            "INSERT INTO gpkg_geometry_columns VALUES ('divides', 'geom', 'POLYGON', ?1)",
            [srs_id],
        )?;
        for d in divides {
            let number = d.id.trim_start_matches("cat-");
            conn.execute(
                "INSERT INTO divides (divide_id, geom, tot_drainage_areasqkm) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    d.id,
                    square_blob(d.corner, d.side, srs_id as i32),
                    d.area_sqkm
                ],
            )?;
            conn.execute(
                r#"INSERT INTO "model-attributes" VALUES (?1, 5.5, 120.0, ?2)"#,
                [d.id, GIUH],
            )?;
            conn.execute(
                r#"INSERT INTO "flowpath-attributes" VALUES (?1, 'nex-1', ?2, 1000.0, x'00')"#,
                rusqlite::params![format!("wb-{number}"), d.gage],
            )?;
        }
        Ok(())
    }

    /// Describe `srs_id` in `gpkg_spatial_ref_sys`.
    pub fn register_srs(
        path: &Path,
        srs_id: i64,
        organization: &str,
        definition: &str,
    ) -> Result<()> {
        let conn = Connection::open(path)?;
        conn.execute(
            "INSERT INTO gpkg_spatial_ref_sys VALUES (?1, ?2, ?3, ?2, ?4)",
            rusqlite::params![format!("srs {srs_id}"), srs_id, organization, definition],
        )?;
        Ok(())
    }
}
