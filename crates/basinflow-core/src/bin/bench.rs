/// Core benchmarks: attribute table build, parameter derivation and
/// realization assembly on synthetic basins.
///
/// Uses std::time::Instant for timing, a deterministic LCG PRNG for data generation,
/// and std::hint::black_box to prevent dead-code elimination.
use std::collections::BTreeMap;
use std::hint::black_box;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use basinflow_core::attributes::{AttributeDefaults, CatchmentTable, Divide, GeoPoint};
use basinflow_core::coupling::Coupling;
use basinflow_core::frame::{AttributeFrame, Cell};
use basinflow_core::library::LibraryIndex;
use basinflow_core::params::ParameterEngine;
use basinflow_core::realization::{assemble, ForcingDescriptor, RealizationRequest};
use basinflow_core::scheme::{PartitioningScheme, RunoffScheme, SchemaType};
use basinflow_core::soil_class::SoilClassTable;
use basinflow_core::submodel::SubModel;
use basinflow_core::window::SimulationWindow;

const REPEATS: usize = 7;

struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as f64 / (1u64 << 31) as f64
    }

    fn histogram(&mut self, bins: usize, scale: f64) -> String {
        let raw: Vec<f64> = (0..bins).map(|_| 0.05 + self.next_f64()).collect();
        let total: f64 = raw.iter().sum();
        let entries: Vec<String> = raw
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let v = (i + 1) as f64 * scale;
                format!(r#"{{"v": {v:?}, "frequency": {:?}}}"#, f / total)
            })
            .collect();
        format!("[{}]", entries.join(", "))
    }
}

/// Synthetic divides and model-attributes frame for `n` catchments.
fn make_basin(n: usize, seed: u64) -> (Vec<Divide>, AttributeFrame) {
    let mut rng = Lcg(seed);
    let columns = [
        "divide_id",
        "mode.bexp_soil_layers_stag=1",
        "geom_mean.dksat_soil_layers_stag=1",
        "geom_mean.psisat_soil_layers_stag=1",
        "mean.smcmax_soil_layers_stag=1",
        "mean.smcwlt_soil_layers_stag=1",
        "mode.ISLTYP",
        "mode.IVGTYP",
        "mean.refkdt",
        "mean.Coeff",
        "mean.Zmax",
        "mode.Expon",
        "mean.slope",
        "mean.elevation",
        "giuh",
        "twi",
        "width_dist",
    ];
    let mut frame = AttributeFrame::new(columns.iter().map(|c| c.to_string()).collect());
    let mut divides = Vec::with_capacity(n);

    for i in 0..n {
        let id = format!("cat-{}", 1000 + i);
        divides.push(Divide {
            id: id.clone(),
            centroid: GeoPoint {
                lon: -110.0 + rng.next_f64() * 20.0,
                lat: 30.0 + rng.next_f64() * 15.0,
            },
            tot_drainage_area: Some(rng.next_f64() * 500.0),
        });
        let values = [
            Cell::Text(id),
            Cell::Real(rng.next_f64() * 12.0 - 1.0),
            Cell::Real(1e-6 + rng.next_f64() * 1e-5),
            Cell::Real(0.05 + rng.next_f64() * 0.7),
            Cell::Real(0.35 + rng.next_f64() * 0.15),
            Cell::Real(0.02 + rng.next_f64() * 0.1),
            Cell::Int(1 + (rng.next_f64() * 3.0) as i64),
            Cell::Int(1 + (rng.next_f64() * 20.0) as i64),
            Cell::Real(0.5 + rng.next_f64() * 3.0),
            Cell::Real(rng.next_f64() * 0.01),
            Cell::Real(rng.next_f64() * 100.0),
            Cell::Real(1.0 + rng.next_f64() * 7.0),
            Cell::Real(rng.next_f64() * 0.3),
            Cell::Real(rng.next_f64() * 3000.0 - 50.0),
            Cell::Text(rng.histogram(8, 60.0)),
            Cell::Text(rng.histogram(30, 0.5)),
            Cell::Text(rng.histogram(20, 150.0)),
        ];
        frame.push_row(
            columns
                .iter()
                .map(|c| c.to_string())
                .zip(values)
                .collect::<BTreeMap<String, Cell>>(),
        );
    }
    (divides, frame)
}

const SOIL_TABLE: &str = "\
Soil Parameters
STAS
19,1   'BB DRYSMC F11 MAXSMC REFSMC SATPSI SATDK SATDW WLTSMC QTZ BVIC AXAJ BXAJ XXAJ BDVIC BBVIC GDVIC ISLTYP'
1, 2.79, 0.010, -0.472, 0.339, 0.192, 0.069, 4.66E-5, 0.608E-6, 0.010, 0.92, 0.050, 0.009, 0.050, 0.050, 0.050, 0.000, 0.000, 'SAND'
2, 4.26, 0.028, -1.044, 0.421, 0.283, 0.036, 1.41E-5, 0.514E-5, 0.028, 0.82, 0.080, 0.010, 0.060, 0.060, 0.080, 0.000, 0.000, 'LOAMY SAND'
3, 4.74, 0.047, -0.569, 0.434, 0.312, 0.141, 5.23E-6, 0.805E-5, 0.047, 0.60, 0.090, 0.011, 0.070, 0.070, 0.090, 0.000, 0.000, 'SANDY LOAM'
";

/// Run a closure `REPEATS` times, return the median duration.
fn median_time<F: FnMut()>(mut f: F) -> Duration {
    let mut times: Vec<Duration> = (0..REPEATS)
        .map(|_| {
            let start = Instant::now();
            f();
            start.elapsed()
        })
        .collect();
    times.sort();
    times[REPEATS / 2]
}

fn window() -> SimulationWindow {
    SimulationWindow::parse("2010-10-01 00:00:00", "2011-10-01 00:00:00")
        .expect("valid benchmark window")
}

fn bench_table(sizes: &[usize]) -> Vec<(&'static str, usize, Duration)> {
    let defaults = AttributeDefaults::default();
    let mut results = Vec::new();
    for &n in sizes {
        let (divides, frame) = make_basin(n, 42);
        black_box(CatchmentTable::build(&divides, &frame, SchemaType::NoaaOwp, &defaults));
        let dur = median_time(|| {
            black_box(CatchmentTable::build(&divides, &frame, SchemaType::NoaaOwp, &defaults));
        });
        results.push(("attribute table", n, dur));
    }
    results
}

fn bench_derive(
    sizes: &[usize],
    coupling: Coupling,
    label: &'static str,
) -> Vec<(&'static str, usize, Duration)> {
    let soil = SoilClassTable::parse(SOIL_TABLE).expect("valid soil table");
    let mut results = Vec::new();
    for &n in sizes {
        let (divides, frame) = make_basin(n, 42);
        let table = CatchmentTable::build(
            &divides,
            &frame,
            SchemaType::NoaaOwp,
            &AttributeDefaults::default(),
        );
        let engine = ParameterEngine::new(
            coupling,
            PartitioningScheme::Schaake,
            RunoffScheme::Giuh,
            window(),
            Path::new("/bench/configs"),
            Path::new("/bench/forcing"),
        )
        .with_soil_classes(&soil);
        let run = || {
            for c in table.iter() {
                black_box(engine.derive(c).expect("derivation"));
            }
        };
        run();
        let dur = median_time(run);
        results.push((label, n, dur));
    }
    results
}

fn bench_assemble() -> Vec<(&'static str, usize, Duration)> {
    let libs = LibraryIndex::from_paths(
        PathBuf::from("/ngen/extern"),
        SubModel::ALL.map(|m| (m, PathBuf::from(format!("/ngen/extern/{m}/cmake_build/lib{m}")))),
    );
    let request = |coupling| RealizationRequest {
        coupling,
        runoff: RunoffScheme::Giuh,
        partitioning: PartitioningScheme::Schaake,
        window: window(),
        config_dir: PathBuf::from("/bench/configs"),
        forcing: ForcingDescriptor::csv_per_feature(Path::new("/bench/forcing")),
        routing: true,
        calibration: false,
        output_dir: PathBuf::from("/bench/outputs"),
    };
    let requests: Vec<RealizationRequest> = Coupling::ALL.iter().map(|c| request(*c)).collect();
    let dur = median_time(|| {
        for req in &requests {
            let r = assemble(req, &libs).expect("assembly");
            black_box(r.to_json().expect("serialization"));
        }
    });
    vec![("realization x7", requests.len(), dur)]
}

fn main() {
    println!("basinflow-core benchmarks");
    println!("============================================================");
    println!("{:<18} {:>6}   {:>12}", "Stage", "N", "Median (ms)");
    println!("--------------------------------------------");

    let mut all_results: Vec<(&str, usize, Duration)> = Vec::new();

    all_results.extend(bench_table(&[100, 1000, 10000]));
    all_results.extend(bench_derive(&[100, 1000], Coupling::NomCfe, "derive nom_cfe"));
    all_results.extend(bench_derive(&[100, 1000], Coupling::NomCfeSmpSft, "derive ncss"));
    all_results.extend(bench_assemble());

    for (stage, n, dur) in &all_results {
        let ms = dur.as_secs_f64() * 1000.0;
        println!("{:<18} {:>6}      {:>8.2}", stage, n, ms);
    }

    println!("============================================================");
}
