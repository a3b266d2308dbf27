/// TOPMODEL input files: run control, parameters and subcatchment
/// topography (TWI histogram plus cumulative width function).
use std::path::PathBuf;

use super::constants::TOPMODEL_PARAMS;
use crate::attributes::CatchmentAttributes;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct TopmodelOptions {
    pub forcing_dir: PathBuf,
    /// Directory the three files are written to.
    pub topmodel_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopmodelFiles {
    /// `topmod_<id>.run`
    pub run: String,
    /// `params_<id>.dat`
    pub params: String,
    /// `subcat_<id>.dat`
    pub subcat: String,
}

pub fn params_file_name(id: &str) -> String {
    format!("params_{id}.dat")
}

pub fn subcat_file_name(id: &str) -> String {
    format!("subcat_{id}.dat")
}

pub fn derive(c: &CatchmentAttributes, opts: &TopmodelOptions) -> Result<TopmodelFiles> {
    let id = c.id.as_str();
    let dir = &opts.topmodel_dir;

    let run = [
        "0".to_string(),
        id.to_string(),
        opts.forcing_dir.join(format!("{id}.csv")).display().to_string(),
        dir.join(subcat_file_name(id)).display().to_string(),
        dir.join(params_file_name(id)).display().to_string(),
        dir.join(format!("topmod_{id}.out")).display().to_string(),
        dir.join(format!("hyd_{id}.out")).display().to_string(),
    ]
    .join("\n");

    let title = format!("Extracted study basin: {id}");
    let params = format!("{title}\n{TOPMODEL_PARAMS}");

    let twi = c.twi()?.sorted_desc();
    let width = c.width_dist()?.cumulative();
    let twi_lines = twi
        .iter()
        .map(|b| format!("{:.6} {:.6}", b.frequency, b.v))
        .collect::<Vec<_>>()
        .join("\n");
    let width_line = width
        .iter()
        .map(|(cum, v)| format!("{cum:.6} {v:.6}"))
        .collect::<Vec<_>>()
        .join(" ");
    let subcat = [
        "1 1 1".to_string(),
        title,
        format!("{} 1", twi.len()),
        twi_lines,
        width.len().to_string(),
        width_line,
        "$mapfile.dat".to_string(),
    ]
    .join("\n");

    Ok(TopmodelFiles { run, params, subcat })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::tests::sample_table;

    fn files() -> TopmodelFiles {
        let table = sample_table();
        let opts = TopmodelOptions {
            forcing_dir: PathBuf::from("/basin/forcing"),
            topmodel_dir: PathBuf::from("/basin/configs/topmodel"),
        };
        derive(table.get("cat-1").unwrap(), &opts).unwrap()
    }

    #[test]
    fn run_file_points_at_basin_paths() {
        let run = files().run;
        let lines: Vec<&str> = run.lines().collect();
        assert_eq!(lines[0], "0");
        assert_eq!(lines[1], "cat-1");
        assert_eq!(lines[2], "/basin/forcing/cat-1.csv");
        assert_eq!(lines[3], "/basin/configs/topmodel/subcat_cat-1.dat");
        assert_eq!(lines[6], "/basin/configs/topmodel/hyd_cat-1.out");
    }

    #[test]
    fn subcat_twi_descending_and_width_cumulative() {
        let subcat = files().subcat;
        let lines: Vec<&str> = subcat.lines().collect();
        assert_eq!(
            lines,
            [
                "1 1 1",
                "Extracted study basin: cat-1",
                "2 1",
                "0.750000 9.000000",
                "0.250000 3.000000",
                "2",
                "0.500000 100.000000 1.000000 250.000000",
                "$mapfile.dat",
            ]
        );
    }

    #[test]
    fn params_carry_fixed_constants() {
        let params = files().params;
        assert!(params.starts_with("Extracted study basin: cat-1\n0.032  5.0  50."));
    }
}
