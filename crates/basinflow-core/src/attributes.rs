/// Per-catchment attribute table.
///
/// Built once per basin from the `divides` layer and the model-attributes
/// layer: schema resolution, null-fill with documented defaults, unit
/// conversions, and the `soil_b`/elevation positivity repairs.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::{AttributeFrame, Cell};
use crate::histogram::Histogram;
use crate::schema::{resolve_model_attributes, AttributeKey, SchemaMap};
use crate::scheme::SchemaType;

// -- Conversion constants --

/// Median catchment area used to convert the baseflow coefficient [m2].
pub const MEDIAN_CATCHMENT_AREA_M2: f64 = 7.3377e6;

/// Seconds per hour.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Elevation substituted for non-positive values [m].
pub const MIN_ELEVATION_M: f64 = 1.0;

/// Column holding the catchment id in the model-attributes layer.
pub const DIVIDE_ID_COLUMN: &str = "divide_id";

/// Fill values for missing or null attributes, in hydrofabric units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeDefaults {
    /// Clapp-Hornberger b exponent [-].
    pub soil_b: f64,
    /// Saturated hydraulic conductivity [m/s].
    pub soil_dksat: f64,
    /// Saturated matric potential [m].
    pub soil_psisat: f64,
    /// Porosity [m3/m3].
    pub soil_smcmax: f64,
    /// Wilting point [m3/m3].
    pub soil_smcwlt: f64,
    /// Max groundwater storage [mm].
    pub gw_zmax: f64,
    /// Baseflow coefficient [m3/s].
    pub gw_coeff: f64,
    /// Baseflow exponent [-].
    pub gw_expon: f64,
    /// Slope [m/m].
    pub soil_slope: f64,
    pub isltyp: i64,
    pub ivgtyp: i64,
    /// Mean elevation [m] (cm for the dangermond schema).
    pub elevation: f64,
    pub refkdt: f64,
}

impl Default for AttributeDefaults {
    fn default() -> Self {
        Self {
            soil_b: 16.0,
            soil_dksat: 0.00000338,
            soil_psisat: 0.355,
            soil_smcmax: 0.439,
            soil_smcwlt: 0.066,
            gw_zmax: 0.01,
            gw_coeff: 1.8e-05,
            gw_expon: 6.0,
            soil_slope: 1.0,
            isltyp: 1,
            ivgtyp: 1,
            elevation: 4.0,
            refkdt: 3.0,
        }
    }
}

/// Geographic coordinates [degrees].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// One entry of the `divides` layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Divide {
    /// Catchment id (`cat-<n>`).
    pub id: String,
    pub centroid: GeoPoint,
    /// Total upstream drainage area [km2].
    pub tot_drainage_area: Option<f64>,
}

impl Divide {
    /// Numeric part of the id (`cat-123` -> `123`).
    pub fn number(&self) -> Option<&str> {
        self.id.rsplit('-').next().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchmentAttributes {
    pub id: String,
    pub centroid: GeoPoint,
    pub soil_b: f64,
    /// [m/s]
    pub soil_satdk: f64,
    /// [m]
    pub soil_satpsi: f64,
    /// [m/m]
    pub soil_slope: f64,
    pub soil_smcmax: f64,
    pub soil_wltsmc: f64,
    pub soil_refkdt: f64,
    /// [m]
    pub max_gw_storage: f64,
    /// [m/h]
    pub cgw: f64,
    pub gw_expon: f64,
    pub isltyp: i64,
    pub ivgtyp: i64,
    /// [m]
    pub elevation_mean: f64,
    giuh: Option<String>,
    twi: Option<String>,
    width_dist: Option<String>,
    pub n_nash_surface: Option<f64>,
    pub k_nash_surface: Option<f64>,
}

impl CatchmentAttributes {
    pub fn giuh(&self) -> Result<Histogram> {
        self.histogram(&self.giuh, "giuh")
    }

    pub fn twi(&self) -> Result<Histogram> {
        self.histogram(&self.twi, "twi")
    }

    pub fn width_dist(&self) -> Result<Histogram> {
        self.histogram(&self.width_dist, "width_dist")
    }

    fn histogram(&self, raw: &Option<String>, key: &'static str) -> Result<Histogram> {
        let raw = raw.as_deref().ok_or_else(|| Error::MissingAttribute {
            catchment: self.id.clone(),
            key,
        })?;
        Histogram::parse(raw).map_err(|source| Error::MalformedDistribution {
            catchment: self.id.clone(),
            key,
            source,
        })
    }

    pub fn require_nash(&self) -> Result<(f64, f64)> {
        let missing = |key| Error::MissingAttribute {
            catchment: self.id.clone(),
            key,
        };
        let n = self.n_nash_surface.ok_or_else(|| missing("N_nash_surface"))?;
        let k = self.k_nash_surface.ok_or_else(|| missing("K_nash_surface"))?;
        Ok((n, k))
    }
}

/// Catchment attributes of one basin, in `divides` order.
#[derive(Debug, Clone)]
pub struct CatchmentTable {
    catchments: Vec<CatchmentAttributes>,
    index: BTreeMap<String, usize>,
    /// Columns resolved for each canonical key.
    pub schema: SchemaMap,
    /// Catchments whose `soil_b` was remapped.
    pub remapped_soil_b: usize,
    /// Catchments whose elevation was clamped.
    pub clamped_elevation: usize,
}

impl CatchmentTable {
    /// Build the table for `divides` from the model-attributes layer.
    ///
    /// Catchments absent from the attribute layer receive all defaults.
    pub fn build(
        divides: &[Divide],
        attributes: &AttributeFrame,
        schema_type: SchemaType,
        defaults: &AttributeDefaults,
    ) -> Self {
        let schema = resolve_model_attributes(&attributes.columns);
        let rows = attributes.index_by(DIVIDE_ID_COLUMN);
        let empty = BTreeMap::new();

        let mut catchments: Vec<CatchmentAttributes> = divides
            .iter()
            .map(|divide| {
                let row = rows.get(&divide.id).copied().unwrap_or(&empty);
                let lookup = |key: AttributeKey| -> Option<&Cell> {
                    schema.get(&key).and_then(|column| row.get(column))
                };
                let num = |key, default: f64| lookup(key).and_then(Cell::as_f64).unwrap_or(default);
                let text = |key| lookup(key).and_then(Cell::as_str).map(str::to_string);

                let mut elevation_mean = num(AttributeKey::ElevationMean, defaults.elevation);
                if schema_type == SchemaType::Dangermond {
                    elevation_mean /= 100.0;
                }

                CatchmentAttributes {
                    id: divide.id.clone(),
                    centroid: divide.centroid,
                    soil_b: num(AttributeKey::SoilB, defaults.soil_b),
                    soil_satdk: num(AttributeKey::SoilDksat, defaults.soil_dksat),
                    soil_satpsi: num(AttributeKey::SoilPsisat, defaults.soil_psisat),
                    soil_slope: lookup(AttributeKey::SoilSlope)
                        .and_then(Cell::as_f64)
                        .or_else(|| lookup(AttributeKey::SlopeMean).and_then(Cell::as_f64))
                        .unwrap_or(defaults.soil_slope),
                    soil_smcmax: num(AttributeKey::SoilSmcmax, defaults.soil_smcmax),
                    soil_wltsmc: num(AttributeKey::SoilSmcwlt, defaults.soil_smcwlt),
                    soil_refkdt: num(AttributeKey::SoilRefkdt, defaults.refkdt),
                    max_gw_storage: num(AttributeKey::GwZmax, defaults.gw_zmax) / 1000.0,
                    cgw: num(AttributeKey::GwCoeff, defaults.gw_coeff) * SECONDS_PER_HOUR
                        / MEDIAN_CATCHMENT_AREA_M2,
                    gw_expon: num(AttributeKey::GwExpon, defaults.gw_expon),
                    isltyp: num(AttributeKey::Isltyp, defaults.isltyp as f64) as i64,
                    ivgtyp: num(AttributeKey::Ivgtyp, defaults.ivgtyp as f64) as i64,
                    elevation_mean,
                    giuh: text(AttributeKey::Giuh),
                    twi: text(AttributeKey::Twi),
                    width_dist: text(AttributeKey::WidthDist),
                    n_nash_surface: lookup(AttributeKey::NNashSurface).and_then(Cell::as_f64),
                    k_nash_surface: lookup(AttributeKey::KNashSurface).and_then(Cell::as_f64),
                }
            })
            .collect();

        // soil_b must stay positive: borrow the smallest positive value in the basin.
        let min_positive_b = catchments
            .iter()
            .map(|c| c.soil_b)
            .filter(|b| *b > 0.0)
            .min_by(f64::total_cmp)
            .unwrap_or(defaults.soil_b);
        let mut remapped_soil_b = 0;
        let mut clamped_elevation = 0;
        for c in &mut catchments {
            if c.soil_b <= 0.0 {
                c.soil_b = min_positive_b;
                remapped_soil_b += 1;
            }
            if c.elevation_mean <= 0.0 {
                c.elevation_mean = MIN_ELEVATION_M;
                clamped_elevation += 1;
            }
        }

        let index = catchments
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        Self {
            catchments,
            index,
            schema,
            remapped_soil_b,
            clamped_elevation,
        }
    }

    pub fn get(&self, id: &str) -> Option<&CatchmentAttributes> {
        self.index.get(id).map(|&i| &self.catchments[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatchmentAttributes> {
        self.catchments.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.catchments.iter().map(|c| c.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.catchments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catchments.is_empty()
    }
}
