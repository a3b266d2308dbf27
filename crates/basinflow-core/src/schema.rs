/// Hydrofabric attribute schema resolution.
///
/// Column names differ between hydrofabric releases (`mode.bexp_soil_layers_stag=1`,
/// `bexp_soil_layers_stag=1_mean`, ...). These functions map whatever columns
/// exist onto canonical keys. Missing keys are left out; callers fall back to
/// defaults.
use std::collections::BTreeMap;

use serde::Serialize;

/// Canonical model-attribute keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeKey {
    SoilB,
    SoilDksat,
    SoilPsisat,
    SoilSmcmax,
    SoilSmcwlt,
    Isltyp,
    Ivgtyp,
    SoilRefkdt,
    GwCoeff,
    GwZmax,
    GwExpon,
    SlopeMean,
    SoilSlope,
    ElevationMean,
    TwiDist,
    Twi,
    WidthDist,
    Giuh,
    NNashSurface,
    KNashSurface,
}

impl AttributeKey {
    pub fn canonical_name(self) -> &'static str {
        match self {
            AttributeKey::SoilB => "soil_b",
            AttributeKey::SoilDksat => "soil_dksat",
            AttributeKey::SoilPsisat => "soil_psisat",
            AttributeKey::SoilSmcmax => "soil_smcmax",
            AttributeKey::SoilSmcwlt => "soil_smcwlt",
            AttributeKey::Isltyp => "ISLTYP",
            AttributeKey::Ivgtyp => "IVGTYP",
            AttributeKey::SoilRefkdt => "soil_refkdt",
            AttributeKey::GwCoeff => "gw_Coeff",
            AttributeKey::GwZmax => "gw_Zmax",
            AttributeKey::GwExpon => "gw_Expon",
            AttributeKey::SlopeMean => "slope_mean",
            AttributeKey::SoilSlope => "soil_slope",
            AttributeKey::ElevationMean => "elevation_mean",
            AttributeKey::TwiDist => "twi_dist",
            AttributeKey::Twi => "twi",
            AttributeKey::WidthDist => "width_dist",
            AttributeKey::Giuh => "giuh",
            AttributeKey::NNashSurface => "N_nash_surface",
            AttributeKey::KNashSurface => "K_nash_surface",
        }
    }
}

/// Canonical key to the column name that carries it.
pub type SchemaMap = BTreeMap<AttributeKey, String>;

// -- Fragment table --

/// Plain substring fragments, checked in order for every column.
const FRAGMENTS: &[(&str, AttributeKey)] = &[
    ("bexp_soil_layers_stag=1", AttributeKey::SoilB),
    ("dksat_soil_layers_stag=1", AttributeKey::SoilDksat),
    ("psisat_soil_layers_stag=1", AttributeKey::SoilPsisat),
    ("smcmax_soil_layers_stag=1", AttributeKey::SoilSmcmax),
    ("smcwlt_soil_layers_stag=1", AttributeKey::SoilSmcwlt),
    ("ISLTYP", AttributeKey::Isltyp),
    ("IVGTYP", AttributeKey::Ivgtyp),
    ("refkdt", AttributeKey::SoilRefkdt),
    ("Coeff", AttributeKey::GwCoeff),
    ("Zmax", AttributeKey::GwZmax),
    ("Expon", AttributeKey::GwExpon),
    ("elevation", AttributeKey::ElevationMean),
    ("width_dist", AttributeKey::WidthDist),
    ("giuh", AttributeKey::Giuh),
    ("N_nash", AttributeKey::NNashSurface),
    ("K_nash", AttributeKey::KNashSurface),
];

fn classify(column: &str) -> Option<AttributeKey> {
    if let Some((_, key)) = FRAGMENTS.iter().find(|(frag, _)| column.contains(frag)) {
        return Some(*key);
    }
    if column.contains("slope") {
        return Some(if column.contains("slope_mean") {
            AttributeKey::SlopeMean
        } else {
            AttributeKey::SoilSlope
        });
    }
    if column.contains("twi") {
        return Some(if column.contains("twi_dist") {
            AttributeKey::TwiDist
        } else {
            AttributeKey::Twi
        });
    }
    None
}

/// Resolve model-attribute columns. The first column matching a key wins.
pub fn resolve_model_attributes<S: AsRef<str>>(columns: &[S]) -> SchemaMap {
    let mut map = SchemaMap::new();
    for column in columns {
        let column = column.as_ref();
        if let Some(key) = classify(column) {
            map.entry(key).or_insert_with(|| column.to_string());
        }
    }
    map
}

/// t-route `columns` block resolved from the flowpath-attributes layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowpathColumns {
    pub key: String,
    pub downstream: String,
    pub mainstem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ncc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waterbody: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twcc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub musk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub musx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cs: Option<String>,
    pub alt: String,
}

impl Default for FlowpathColumns {
    fn default() -> Self {
        Self {
            key: "id".to_string(),
            downstream: "toid".to_string(),
            mainstem: "mainstem".to_string(),
            dx: None,
            n: None,
            ncc: None,
            s0: None,
            bw: None,
            waterbody: None,
            gages: None,
            tw: None,
            twcc: None,
            musk: None,
            musx: None,
            cs: None,
            alt: "alt".to_string(),
        }
    }
}

impl FlowpathColumns {
    /// Names of required routing columns that were not found.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("dx", &self.dx),
            ("n", &self.n),
            ("ncc", &self.ncc),
            ("s0", &self.s0),
            ("bw", &self.bw),
            ("tw", &self.tw),
            ("twcc", &self.twcc),
            ("musk", &self.musk),
            ("musx", &self.musx),
            ("cs", &self.cs),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Resolve flowpath-attribute columns by exact name.
///
/// With `gage_id`, the waterbody key may also come from a `link` column,
/// which is how gage-bearing segments are identified for calibration.
pub fn resolve_flowpath_attributes<S: AsRef<str>>(columns: &[S], gage_id: bool) -> FlowpathColumns {
    let mut out = FlowpathColumns::default();
    for column in columns {
        let column = column.as_ref();
        let slot = match column {
            "length_m" | "Length_m" => &mut out.dx,
            "n" => &mut out.n,
            "nCC" => &mut out.ncc,
            "So" => &mut out.s0,
            "BtmWdth" => &mut out.bw,
            "rl_NHDWaterbodyComID" | "WaterbodyID" => &mut out.waterbody,
            "rl_gages" | "gage" => &mut out.gages,
            "TopWdth" => &mut out.tw,
            "TopWdthCC" => &mut out.twcc,
            "MusK" => &mut out.musk,
            "MusX" => &mut out.musx,
            "ChSlp" => &mut out.cs,
            "alt" => {
                out.alt = column.to_string();
                continue;
            }
            "id" | "link" if gage_id => {
                out.key = column.to_string();
                continue;
            }
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(column.to_string());
        }
    }
    out
}
