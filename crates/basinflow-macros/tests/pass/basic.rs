use basinflow_core::config_file::ConfigLines;
use basinflow_macros::ConfigLines;

#[derive(Debug, Clone, ConfigLines)]
pub struct TestConfig {
    pub verbosity: &'static str,
    #[config(key = "soil_params.b", unit = "[]")]
    pub soil_b: f64,
    #[config(unit = "[m]")]
    pub soil_z: Vec<f64>,
}

fn main() {
    let c = TestConfig {
        verbosity: "none",
        soil_b: 4.05,
        soil_z: vec![0.1, 0.3],
    };
    assert_eq!(
        c.lines(),
        vec!["verbosity=none", "soil_params.b=4.05[]", "soil_z=0.1,0.3[m]"]
    );
    assert_eq!(TestConfig::keys(), &["verbosity", "soil_params.b", "soil_z"]);
}
