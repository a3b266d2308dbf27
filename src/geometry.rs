/// Divide geometries: GeoPackage blob decoding, reprojection to geographic
/// coordinates and centroids.
///
/// Blobs are decoded with geozero, centroids come from geo and projected
/// coordinates are inverted with proj4rs. A coordinate system is described
/// by a PROJ string, either stored in `gpkg_spatial_ref_sys` or looked up
/// from its EPSG code.
use anyhow::{anyhow, bail, Context, Result};
use geo::{Centroid, Coord, Geometry, MapCoordsInPlace};
use geozero::wkb::GpkgWkb;
use geozero::ToGeo;
use proj4rs::proj::Proj;

/// WGS84 longitude/latitude, the target of every reprojection.
const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// A row of `gpkg_spatial_ref_sys`, or just an EPSG code when the table
/// does not describe the layer's SRS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrsRecord {
    pub srs_id: i64,
    pub organization: Option<String>,
    pub organization_coordsys_id: Option<i64>,
    pub definition: Option<String>,
}

impl SrsRecord {
    pub fn epsg(code: i64) -> Self {
        Self {
            srs_id: code,
            organization: Some("EPSG".to_string()),
            organization_coordsys_id: Some(code),
            definition: None,
        }
    }

    /// PROJ string for this SRS.
    ///
    /// A definition that already is a PROJ string wins; otherwise the EPSG
    /// code (organization id, else the srs id) is looked up.
    pub fn proj_string(&self) -> Result<String> {
        if let Some(def) = self.definition.as_deref().map(str::trim) {
            if def.starts_with("+proj") {
                return Ok(def.to_string());
            }
        }
        let code = match (&self.organization, self.organization_coordsys_id) {
            (Some(org), Some(id)) if org.eq_ignore_ascii_case("epsg") => id,
            _ => self.srs_id,
        };
        let def = u16::try_from(code)
            .ok()
            .and_then(crs_definitions::from_code)
            .with_context(|| {
                format!("unsupported divide CRS (srs_id {}, EPSG:{code})", self.srs_id)
            })?;
        Ok(def.proj4.to_string())
    }
}

fn is_geographic(proj: &str) -> bool {
    ["+proj=longlat", "+proj=latlong", "+proj=lonlat", "+proj=latlon"]
        .iter()
        .any(|p| proj.contains(p))
}

/// Converts coordinates of one SRS to WGS84 degrees.
pub struct ToGeographic {
    /// `None` when the source already is geographic.
    projection: Option<(Proj, Proj)>,
}

impl ToGeographic {
    pub fn new(srs: &SrsRecord) -> Result<Self> {
        let def = srs.proj_string()?;
        if is_geographic(&def) {
            return Ok(Self { projection: None });
        }
        let src = Proj::from_proj_string(&def)
            .map_err(|e| anyhow!("invalid projection `{def}`: {e}"))?;
        let dst = Proj::from_proj_string(WGS84).map_err(|e| anyhow!("{e}"))?;
        Ok(Self {
            projection: Some((src, dst)),
        })
    }

    /// One coordinate to `[lon, lat]` degrees.
    pub fn coord(&self, c: Coord<f64>) -> Result<Coord<f64>> {
        let Some((src, dst)) = &self.projection else {
            return Ok(c);
        };
        let mut point = (c.x, c.y, 0.0);
        proj4rs::transform::transform(src, dst, &mut point)
            .map_err(|e| anyhow!("reprojecting ({}, {}): {e}", c.x, c.y))?;
        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    }

    pub fn geometry(&self, geom: &mut Geometry<f64>) -> Result<()> {
        if self.projection.is_none() {
            return Ok(());
        }
        geom.try_map_coords_in_place(|c| self.coord(c))
    }
}

/// Decode a GeoPackage geometry blob (header plus WKB).
pub fn decode_gpkg(blob: &[u8]) -> Result<Geometry<f64>> {
    GpkgWkb(blob.to_vec())
        .to_geo()
        .map_err(|e| anyhow!("decoding geopackage geometry: {e}"))
}

/// Geographic centroid `[lon, lat]` of a stored divide geometry.
///
/// Vertices are reprojected first, so the centroid is taken in degrees.
/// Empty geometries have none.
pub fn geographic_centroid(blob: &[u8], to_geo: &ToGeographic) -> Result<Option<[f64; 2]>> {
    let mut geom = decode_gpkg(blob)?;
    match geom {
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {}
        Geometry::GeometryCollection(ref gc) if gc.0.is_empty() => return Ok(None),
        _ => bail!("divide geometry is not a polygon"),
    }
    to_geo.geometry(&mut geom)?;
    Ok(geom.centroid().map(|p| [p.x(), p.y()]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// GPKG blob (no envelope) holding one square polygon.
    pub(crate) fn square_blob(corner: [f64; 2], side: f64, srs_id: i32) -> Vec<u8> {
        let [x0, y0] = corner;
        let ring = [
            [x0, y0],
            [x0 + side, y0],
            [x0 + side, y0 + side],
            [x0, y0 + side],
            [x0, y0],
        ];
        let mut blob = vec![b'G', b'P', 0, 0b0000_0001];
        blob.extend(srs_id.to_le_bytes());
        blob.push(1);
        blob.extend(3u32.to_le_bytes());
        blob.extend(1u32.to_le_bytes());
        blob.extend((ring.len() as u32).to_le_bytes());
        for [x, y] in ring {
            blob.extend(x.to_le_bytes());
            blob.extend(y.to_le_bytes());
        }
        blob
    }

    fn assert_close(got: [f64; 2], want: [f64; 2], tol: f64) {
        assert!(
            (got[0] - want[0]).abs() < tol && (got[1] - want[1]).abs() < tol,
            "{got:?} != {want:?}"
        );
    }

    // -- srs --

    #[test]
    fn proj_string_prefers_stored_definition() {
        let srs = SrsRecord {
            srs_id: 900_914,
            organization: Some("NONE".into()),
            organization_coordsys_id: Some(900_914),
            definition: Some("+proj=utm +zone=14 +datum=WGS84 +units=m +no_defs".into()),
        };
        assert!(srs.proj_string().unwrap().contains("+zone=14"));
    }

    #[test]
    fn epsg_codes_are_looked_up() {
        assert!(is_geographic(&SrsRecord::epsg(4326).proj_string().unwrap()));
        assert!(SrsRecord::epsg(5070).proj_string().unwrap().contains("+proj=aea"));
        assert!(SrsRecord::epsg(32614).proj_string().unwrap().contains("+proj=utm"));
        let err = SrsRecord::epsg(999_999).proj_string().unwrap_err();
        assert!(err.to_string().contains("EPSG:999999"), "{err:#}");
    }

    // -- reprojection --

    #[test]
    fn wgs84_passes_through() {
        let to_geo = ToGeographic::new(&SrsRecord::epsg(4326)).unwrap();
        let blob = square_blob([-70.0, 44.0], 0.2, 4326);
        let c = geographic_centroid(&blob, &to_geo).unwrap().unwrap();
        assert_close(c, [-69.9, 44.1], 1e-9);
    }

    #[test]
    fn conus_albers_origin() {
        let to_geo = ToGeographic::new(&SrsRecord::epsg(5070)).unwrap();
        let c = to_geo.coord(Coord { x: 0.0, y: 0.0 }).unwrap();
        assert_close([c.x, c.y], [-96.0, 23.0], 1e-6);
    }

    #[test]
    fn utm_zone_central_meridian() {
        let to_geo = ToGeographic::new(&SrsRecord::epsg(32614)).unwrap();
        let equator = to_geo.coord(Coord { x: 500_000.0, y: 0.0 }).unwrap();
        assert_close([equator.x, equator.y], [-99.0, 0.0], 1e-6);

        let blob = square_blob([499_500.0, 3_999_500.0], 1000.0, 32614);
        let [lon, lat] = geographic_centroid(&blob, &to_geo).unwrap().unwrap();
        assert!((lon + 99.0).abs() < 1e-4, "{lon}");
        assert!(lat > 36.0 && lat < 36.3, "{lat}");
    }

    // -- decoding --

    #[test]
    fn rejects_non_polygons() {
        let to_geo = ToGeographic::new(&SrsRecord::epsg(4326)).unwrap();
        let mut point = vec![b'G', b'P', 0, 0b0000_0001];
        point.extend(4326i32.to_le_bytes());
        point.push(1);
        point.extend(1u32.to_le_bytes());
        point.extend(1.0f64.to_le_bytes());
        point.extend(2.0f64.to_le_bytes());
        let err = geographic_centroid(&point, &to_geo).unwrap_err();
        assert!(err.to_string().contains("not a polygon"), "{err:#}");
    }
}
