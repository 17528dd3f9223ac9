use crate::core::race::RacePars;
use crate::interfaces::tui_interface::{FINISH_MARGIN, ROWS_PER_LANE, TRACK_START_COL, TRACK_TOP_ROW};
use helpers::general::ConfigError;

/// Virtual display width assumed in headless mode, where no terminal is queried.
pub const DEFAULT_HEADLESS_COLS: u16 = 80;

/// required_rows returns the number of terminal rows the lane layout occupies, including the two
/// prompt lines at the bottom.
pub fn required_rows(no_racers: usize) -> u16 {
    TRACK_TOP_ROW + no_racers as u16 * ROWS_PER_LANE + 2
}

/// calc_finish_line derives the finish-line distance from the display width, leaving the name
/// column on the left and a fixed margin on the right.
pub fn calc_finish_line(display_cols: u16) -> f64 {
    (display_cols as i32 - TRACK_START_COL as i32 - FINISH_MARGIN as i32) as f64
}

/// validate_setup checks the race configuration before the simulation starts. `display` is the
/// terminal size as (cols, rows) in TUI mode and None in headless mode. All violations are fatal,
/// once running the simulation cannot fail.
pub fn validate_setup(
    race_pars: &RacePars,
    no_racers: usize,
    timestep_size: f64,
    display: Option<(u16, u16)>,
) -> Result<(), ConfigError> {
    if no_racers == 0 {
        return Err(ConfigError::new("at least one racer is required"));
    }

    if !(0.001..=1.0).contains(&timestep_size) {
        return Err(ConfigError::new(
            "timestep size must be in the range [0.001, 1.0] seconds",
        ));
    }

    if race_pars.names.is_empty() {
        return Err(ConfigError::new("the racer name pool must not be empty"));
    }

    if race_pars.colors.is_empty() {
        return Err(ConfigError::new("the color palette must not be empty"));
    }

    if race_pars.speed_init_range[0] > race_pars.speed_init_range[1]
        || race_pars.accel_init_range[0] > race_pars.accel_init_range[1]
        || race_pars.accel_range[0] > race_pars.accel_range[1]
    {
        return Err(ConfigError::new(
            "random ranges must be given as [lower, upper]",
        ));
    }

    if !(0.0..=1.0).contains(&race_pars.p_accel_resample)
        || !(0.0..=1.0).contains(&race_pars.hazard_pars.p_arm)
    {
        return Err(ConfigError::new("probabilities must be in [0.0, 1.0]"));
    }

    if race_pars.min_speed <= 0.0 {
        return Err(ConfigError::new("the speed floor must be positive"));
    }

    if let Some((display_cols, display_rows)) = display {
        if display_rows < required_rows(no_racers) {
            return Err(ConfigError::new(&format!(
                "the terminal height is too small for {} racers ({} rows required, {} available)",
                no_racers,
                required_rows(no_racers),
                display_rows
            )));
        }

        if calc_finish_line(display_cols) <= 0.0 {
            return Err(ConfigError::new(&format!(
                "the terminal width is too small for a race track ({} columns available)",
                display_cols
            )));
        }
    }

    Ok(())
}
