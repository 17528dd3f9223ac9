use crate::core::race::RacePars;
use anyhow::Context;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// SimPars is used to store all parameter structs. The default carries the built-in race setup
/// so the simulator runs without any parameter file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SimPars {
    pub race_pars: RacePars,
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!("Failed to open parameter file {:?}!", filepath))?;

    let pars = serde_json::from_reader(&fh)
        .context(format!("Failed to parse parameter file {:?}!", filepath))?;

    Ok(pars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::race::RaceMode;
    use std::io::Write;

    #[test]
    fn default_pars_are_usable() {
        let sim_pars = SimPars::default();
        let race_pars = &sim_pars.race_pars;

        assert!(!race_pars.names.is_empty());
        assert!(!race_pars.colors.is_empty());
        assert!(race_pars.min_speed > 0.0);
        assert!(race_pars.speed_init_range[0] <= race_pars.speed_init_range[1]);
        assert!(race_pars.accel_range[0] <= race_pars.accel_range[1]);
        assert!((0.0..=1.0).contains(&race_pars.p_accel_resample));
        assert!((0.0..=1.0).contains(&race_pars.hazard_pars.p_arm));
        assert!(race_pars.t_grace > 0.0);
    }

    #[test]
    fn read_sim_pars_parses_a_parameter_file() {
        let json = r##"{
            "race_pars": {
                "names": ["Testudo"],
                "colors": ["#ff0000", "#00ff00"],
                "speed_init_range": [0.1, 0.5],
                "accel_init_range": [-0.05, 0.05],
                "accel_range": [-0.05, 0.02],
                "p_accel_resample": 0.2,
                "min_speed": 0.1,
                "mode": "FirstAcrossLine",
                "t_grace": 30.0,
                "hazard_pars": {
                    "enabled": false,
                    "p_arm": 0.0,
                    "countdown_s": 3,
                    "s_offset": 0.0
                }
            }
        }"##;

        let filepath =
            std::env::temp_dir().join(format!("race_pars_test_{}.json", std::process::id()));
        let mut fh = std::fs::File::create(&filepath).unwrap();
        fh.write_all(json.as_bytes()).unwrap();

        let sim_pars = read_sim_pars(&filepath).unwrap();
        std::fs::remove_file(&filepath).unwrap();

        assert_eq!(sim_pars.race_pars.names, vec![String::from("Testudo")]);
        assert_eq!(sim_pars.race_pars.colors.len(), 2);
        assert_eq!(sim_pars.race_pars.mode, RaceMode::FirstAcrossLine);
        assert!(!sim_pars.race_pars.hazard_pars.enabled);
    }

    #[test]
    fn read_sim_pars_rejects_a_missing_file() {
        let filepath = std::env::temp_dir().join("does_not_exist_race_pars.json");

        assert!(read_sim_pars(&filepath).is_err());
    }
}
