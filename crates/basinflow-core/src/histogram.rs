/// Distribution curves stored as JSON strings in the hydrofabric
/// (`[{"v": 0.1, "frequency": 0.25}, ...]`): GIUH ordinates, TWI and
/// width-function histograms.
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bin {
    pub v: f64,
    pub frequency: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub bins: Vec<Bin>,
}

impl Histogram {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let bins: Vec<Bin> = serde_json::from_str(raw)?;
        Ok(Self { bins })
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.frequency).collect()
    }

    /// Bins ordered by value, largest first.
    pub fn sorted_desc(&self) -> Vec<Bin> {
        let mut bins = self.bins.clone();
        bins.sort_by(|a, b| b.v.total_cmp(&a.v));
        bins
    }

    /// Running sum of frequencies paired with each bin's value.
    pub fn cumulative(&self) -> Vec<(f64, f64)> {
        let mut acc = 0.0;
        self.bins
            .iter()
            .map(|b| {
                acc += b.frequency;
                (acc, b.v)
            })
            .collect()
    }
}
