use basinflow_core::config_file::ConfigLines;
use basinflow_macros::ConfigLines;

#[derive(Debug, ConfigLines)]
pub struct TailConfig {
    pub num_timesteps: u32,
    pub sft_coupled: Option<bool>,
    #[config(unit = "[h-1]")]
    pub k_nash: Option<f64>,
}

fn main() {
    let c = TailConfig {
        num_timesteps: 1,
        sft_coupled: Some(true),
        k_nash: None,
    };
    assert_eq!(c.lines(), vec!["num_timesteps=1", "sft_coupled=true"]);
    assert_eq!(c.render(), "num_timesteps=1\nsft_coupled=true");
}
