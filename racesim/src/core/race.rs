use crate::core::racer::{HazardState, Racer, RacerStatus};
use crate::post::race_result::{ClassificationEntry, RaceEvent, RaceResult};
use helpers::general::{argsort, SortOrder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// * `enabled` - Whether random bombs can be armed at all
/// * `p_arm` - Per-tick probability of arming a bomb on a racer that has none yet
/// * `countdown_s` - (s) Bomb countdown, decremented once per simulated second
/// * `s_offset` - (cells) Distance in front of the racer at which the bomb is placed
#[derive(Debug, Deserialize, Clone)]
pub struct HazardPars {
    pub enabled: bool,
    pub p_arm: f64,
    pub countdown_s: u32,
    pub s_offset: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub enum RaceMode {
    /// The race ends the instant the first racer crosses the finish line.
    FirstAcrossLine,
    /// The race runs until every racer is finished or out, bounded by the grace period after the
    /// first finisher.
    FullClassification,
}

/// * `names` - Name pool, cycled with a 1-based suffix to form the racer names
/// * `colors` - Hex color palette, each racer draws a random entry at creation
/// * `speed_init_range` - (cells/tick) Range of the randomized initial speed
/// * `accel_init_range` - (cells/tick²) Range of the randomized initial acceleration
/// * `accel_range` - (cells/tick²) Range used whenever the acceleration is resampled
/// * `p_accel_resample` - Per-tick probability of resampling the acceleration
/// * `min_speed` - (cells/tick) Speed floor, prevents stalling and reversal
/// * `t_grace` - (s) Grace period after the first finisher (FullClassification mode only)
#[derive(Debug, Deserialize, Clone)]
pub struct RacePars {
    pub names: Vec<String>,
    pub colors: Vec<String>,
    pub speed_init_range: [f64; 2],
    pub accel_init_range: [f64; 2],
    pub accel_range: [f64; 2],
    pub p_accel_resample: f64,
    pub min_speed: f64,
    pub mode: RaceMode,
    pub t_grace: f64,
    pub hazard_pars: HazardPars,
}

impl Default for RacePars {
    fn default() -> RacePars {
        RacePars {
            names: vec![
                "Angelo", "Giacomo", "SALSALSAL", "Ludo", "Arianna", "Matteo", "nonba", "Mancini",
                "G B", "Quaglia", "Dash", "Zoom", "Swift", "Blaze", "Thunder", "Rocket", "Comet",
                "SERSE",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            colors: vec![
                "#cc0000", "#4e9a06", "#c4a000", "#3465a4", "#75507b", "#06989a", "#d3d7cf",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            speed_init_range: [0.1, 0.5],
            accel_init_range: [-0.05, 0.05],
            accel_range: [-0.05, 0.02],
            p_accel_resample: 0.2,
            min_speed: 0.1,
            mode: RaceMode::FullClassification,
            t_grace: 60.0,
            hazard_pars: HazardPars {
                enabled: true,
                p_arm: 0.001,
                countdown_s: 3,
                s_offset: 0.0,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum RaceOutcome {
    /// A racer crossed the finish line first.
    Winner { name: String },
    /// Every racer was taken out before any crossed the line.
    NoWinner,
    /// The user quit before the race was decided.
    Interrupted,
}

#[derive(Debug)]
pub struct Race {
    pub timestep_size: f64,
    pub cur_racetime: f64,
    pub tick: u64,
    ticks_per_sec: u64,
    pub finish_line: f64,
    mode: RaceMode,
    t_grace: f64,
    t_first_finish: Option<f64>,
    next_rank: u32,
    interrupted: bool,
    min_speed: f64,
    p_accel_resample: f64,
    accel_dist: Uniform<f64>,
    hazard_pars: HazardPars,
    pub racers_list: Vec<Racer>,
    pub events: Vec<RaceEvent>,
    pub print_events: bool,
    rng: StdRng,
}

impl Race {
    pub fn new(
        race_pars: &RacePars,
        no_racers: usize,
        finish_line: f64,
        timestep_size: f64,
        seed: Option<u64>,
    ) -> Race {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // create racers with randomized initial speed, acceleration, and color
        let speed_init_dist =
            Uniform::new_inclusive(race_pars.speed_init_range[0], race_pars.speed_init_range[1]);
        let accel_init_dist =
            Uniform::new_inclusive(race_pars.accel_init_range[0], race_pars.accel_init_range[1]);

        let mut racers_list: Vec<Racer> = Vec::with_capacity(no_racers);

        for i in 0..no_racers {
            let name = format!("{} {}", race_pars.names[i % race_pars.names.len()], i + 1);
            let color = race_pars.colors[rng.gen_range(0..race_pars.colors.len())].to_owned();

            racers_list.push(Racer::new(
                &name,
                i,
                &color,
                speed_init_dist.sample(&mut rng),
                accel_init_dist.sample(&mut rng),
            ));
        }

        Race {
            timestep_size,
            cur_racetime: 0.0,
            tick: 0,
            ticks_per_sec: ((1.0 / timestep_size).round() as u64).max(1),
            finish_line,
            mode: race_pars.mode,
            t_grace: race_pars.t_grace,
            t_first_finish: None,
            next_rank: 1,
            interrupted: false,
            min_speed: race_pars.min_speed,
            p_accel_resample: race_pars.p_accel_resample,
            accel_dist: Uniform::new_inclusive(
                race_pars.accel_range[0],
                race_pars.accel_range[1],
            ),
            hazard_pars: race_pars.hazard_pars.to_owned(),
            racers_list,
            events: Vec::new(),
            print_events: false,
            rng,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// simulate_timestep advances all running racers by exactly one discrete time step and
    /// handles bomb countdowns, finish detection, and the grace period. Racers are processed in
    /// lane order, which is also the tie-break for two racers crossing the line in the same tick.
    pub fn simulate_timestep(&mut self) {
        // increment discretization variables
        self.tick += 1;
        self.cur_racetime += self.timestep_size;

        // bomb timers run on whole simulated seconds, i.e., once per ticks_per_sec ticks
        let on_second = self.tick % self.ticks_per_sec == 0;

        for idx in 0..self.racers_list.len() {
            if self.racers_list[idx].status != RacerStatus::Running {
                continue;
            }

            // arm a bomb with a small per-tick probability
            if self.hazard_pars.enabled
                && self.racers_list[idx].hazard.is_none()
                && self.rng.gen_bool(self.hazard_pars.p_arm)
            {
                let (s_offset, countdown_s) =
                    (self.hazard_pars.s_offset, self.hazard_pars.countdown_s);
                self.racers_list[idx].arm_hazard(s_offset, countdown_s);
                self.push_event("BombArmed", idx);
            }

            // bomb countdown
            let mut detonates = false;

            if let Some(hazard) = self.racers_list[idx].hazard.as_mut() {
                if hazard.state == HazardState::Armed {
                    if on_second && hazard.countdown_s > 0 {
                        hazard.countdown_s -= 1;
                    }
                    if hazard.countdown_s == 0 {
                        detonates = true;
                    }
                }
            }

            if detonates {
                self.racers_list[idx].detonate_hazard();
                self.push_event("Explosion", idx);

                if self.print_events {
                    println!(
                        "BOOM: {} has been taken out of the race!",
                        self.racers_list[idx].name
                    );
                }

                // a detonated racer never moves again, skip the motion update for this tick
                continue;
            }

            // acceleration drift: resample with a fixed per-tick probability
            if self.rng.gen_bool(self.p_accel_resample) {
                self.racers_list[idx].accel = self.accel_dist.sample(&mut self.rng);
            }

            // speed and position update
            let min_speed = self.min_speed;
            self.racers_list[idx].update_motion(min_speed);

            // finish detection
            if self.racers_list[idx].s_track >= self.finish_line {
                self.racers_list[idx].status = RacerStatus::Finished;
                self.racers_list[idx].rank = Some(self.next_rank);
                self.next_rank += 1;

                if self.t_first_finish.is_none() {
                    self.t_first_finish = Some(self.cur_racetime);
                }

                self.push_event("Finish", idx);

                if self.print_events {
                    println!(
                        "INFO: {} finished in position {}",
                        self.racers_list[idx].name,
                        self.racers_list[idx].rank.unwrap()
                    );
                }

                // winner-takes-all: the first racer across the line ends the race, racers in
                // later lanes do not move in this tick anymore
                if self.mode == RaceMode::FirstAcrossLine {
                    break;
                }
            }
        }

        // grace period: once the first finisher is home, the remaining racers get t_grace
        // simulated seconds before they are taken out without a rank
        if self.mode == RaceMode::FullClassification {
            if let Some(t_first_finish) = self.t_first_finish {
                if self.cur_racetime - t_first_finish >= self.t_grace {
                    for idx in 0..self.racers_list.len() {
                        if self.racers_list[idx].status == RacerStatus::Running {
                            self.racers_list[idx].status = RacerStatus::Dnf;
                            self.push_event("GraceExpired", idx);
                        }
                    }
                }
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (RACE STATE) ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// get_race_over returns true as soon as the race-end condition of the configured mode holds.
    pub fn get_race_over(&self) -> bool {
        if self.interrupted {
            return true;
        }

        match self.mode {
            RaceMode::FirstAcrossLine => {
                self.racers_list
                    .iter()
                    .any(|racer| racer.status == RacerStatus::Finished)
                    || self
                        .racers_list
                        .iter()
                        .all(|racer| racer.status != RacerStatus::Running)
            }
            RaceMode::FullClassification => self
                .racers_list
                .iter()
                .all(|racer| racer.status != RacerStatus::Running),
        }
    }

    /// outcome returns None while the race is running. A race in which every racer was taken out
    /// before any crossed the line is a distinct NoWinner outcome.
    pub fn outcome(&self) -> Option<RaceOutcome> {
        if !self.get_race_over() {
            return None;
        }

        if self.interrupted {
            return Some(RaceOutcome::Interrupted);
        }

        match self.racers_list.iter().find(|racer| racer.rank == Some(1)) {
            Some(winner) => Some(RaceOutcome::Winner {
                name: winner.name.to_owned(),
            }),
            None => Some(RaceOutcome::NoWinner),
        }
    }

    /// abort stops the race without a classification, e.g., when the user quits mid-race.
    pub fn abort(&mut self) {
        self.interrupted = true;
    }

    /// get_running_order returns the racer indices sorted by distance covered, leader first.
    pub fn get_running_order(&self) -> Vec<usize> {
        let s_tracks_cur: Vec<f64> = self.racers_list.iter().map(|racer| racer.s_track).collect();

        argsort(&s_tracks_cur, SortOrder::Descending)
    }

    /// get_race_result builds the final classification: finishers ordered by rank, then the
    /// rankless racers in lane order.
    pub fn get_race_result(&self) -> RaceResult {
        let rank_keys: Vec<u32> = self
            .racers_list
            .iter()
            .map(|racer| racer.rank.unwrap_or(u32::MAX))
            .collect();

        let mut classification: Vec<ClassificationEntry> =
            Vec::with_capacity(self.racers_list.len());

        for idx in argsort(&rank_keys, SortOrder::Ascending) {
            let racer = &self.racers_list[idx];

            classification.push(ClassificationEntry {
                rank: racer.rank,
                name: racer.name.to_owned(),
                exploded: racer.exploded(),
            });
        }

        RaceResult {
            classification,
            outcome: self.outcome(),
            tot_ticks: self.tick,
            racetime: self.cur_racetime,
            events: self.events.to_owned(),
        }
    }

    fn push_event(&mut self, kind: &str, idx: usize) {
        self.events.push(RaceEvent {
            kind: kind.to_owned(),
            tick: self.tick,
            time_s: self.cur_racetime,
            racer: self.racers_list[idx].name.to_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::racer::Hazard;
    use approx::assert_relative_eq;

    /// Parameters without any randomness so single-racer scenarios are fully deterministic.
    fn fixed_pars() -> RacePars {
        RacePars {
            names: vec![String::from("Testudo")],
            colors: vec![String::from("#cc0000")],
            speed_init_range: [0.1, 0.1],
            accel_init_range: [0.0, 0.0],
            accel_range: [0.0, 0.0],
            p_accel_resample: 0.0,
            min_speed: 0.1,
            mode: RaceMode::FullClassification,
            t_grace: 60.0,
            hazard_pars: HazardPars {
                enabled: false,
                p_arm: 0.0,
                countdown_s: 3,
                s_offset: 0.0,
            },
        }
    }

    fn run_to_completion(race: &mut Race, max_ticks: u64) {
        while !race.get_race_over() {
            race.simulate_timestep();
            if race.tick > max_ticks {
                panic!("Race did not end within {} ticks!", max_ticks);
            }
        }
    }

    #[test]
    fn single_racer_finishes_at_floor_speed() {
        let mut pars = fixed_pars();
        pars.mode = RaceMode::FirstAcrossLine;

        let mut race = Race::new(&pars, 1, 10.0, 0.1, Some(42));
        run_to_completion(&mut race, 10_000);

        // 10.0 cells at 0.1 cells/tick cannot be covered in fewer than 100 ticks
        assert!(race.tick >= 100);
        assert_eq!(race.racers_list[0].status, RacerStatus::Finished);
        assert_eq!(race.racers_list[0].rank, Some(1));
        assert_eq!(
            race.outcome(),
            Some(RaceOutcome::Winner {
                name: String::from("Testudo 1")
            })
        );
    }

    #[test]
    fn speed_never_drops_below_the_floor() {
        let mut pars = RacePars::default();
        pars.hazard_pars.enabled = false;

        let mut race = Race::new(&pars, 5, f64::INFINITY, 0.1, Some(7));

        for _ in 0..500 {
            race.simulate_timestep();

            for racer in race.racers_list.iter() {
                assert!(
                    racer.speed >= pars.min_speed,
                    "speed {} below floor {}",
                    racer.speed,
                    pars.min_speed
                );
            }
        }
    }

    #[test]
    fn fixed_seed_reproduces_the_race() {
        let pars = RacePars::default();

        let mut race_a = Race::new(&pars, 5, 40.0, 0.1, Some(1234));
        let mut race_b = Race::new(&pars, 5, 40.0, 0.1, Some(1234));

        for _ in 0..300 {
            race_a.simulate_timestep();
            race_b.simulate_timestep();

            for (racer_a, racer_b) in race_a.racers_list.iter().zip(race_b.racers_list.iter()) {
                assert_eq!(racer_a.name, racer_b.name);
                assert_eq!(racer_a.color, racer_b.color);
                assert_eq!(racer_a.s_track, racer_b.s_track);
                assert_eq!(racer_a.speed, racer_b.speed);
                assert_eq!(racer_a.accel, racer_b.accel);
                assert_eq!(racer_a.status, racer_b.status);
            }
        }

        assert_eq!(race_a.events.len(), race_b.events.len());
    }

    #[test]
    fn ranks_are_a_permutation_of_finish_positions() {
        let mut pars = RacePars::default();
        pars.hazard_pars.enabled = false;

        let mut race = Race::new(&pars, 5, 5.0, 0.1, Some(99));
        run_to_completion(&mut race, 100_000);

        let mut ranks: Vec<u32> = race
            .racers_list
            .iter()
            .filter(|racer| racer.status == RacerStatus::Finished)
            .map(|racer| racer.rank.unwrap())
            .collect();
        ranks.sort_unstable();

        let expected: Vec<u32> = (1..=ranks.len() as u32).collect();
        assert_eq!(ranks, expected);

        // racers without a finish carry no rank
        for racer in race.racers_list.iter() {
            if racer.status != RacerStatus::Finished {
                assert_eq!(racer.rank, None);
            }
        }
    }

    #[test]
    fn exploded_racer_gets_no_rank_and_the_rest_race_on() {
        let pars = fixed_pars();
        let mut race = Race::new(&pars, 3, 30.0, 0.1, Some(5));

        // arm a bomb on the first racer by hand, it detonates within one simulated second
        race.racers_list[0].hazard = Some(Hazard {
            s_trigger: 2.0,
            countdown_s: 1,
            state: HazardState::Armed,
        });

        run_to_completion(&mut race, 10_000);

        assert_eq!(race.racers_list[0].status, RacerStatus::Dnf);
        assert!(race.racers_list[0].exploded());
        assert_eq!(race.racers_list[0].rank, None);

        // the two survivors run at the identical floor speed and cross in the same tick, the
        // lane order breaks the tie
        assert_eq!(race.racers_list[1].rank, Some(1));
        assert_eq!(race.racers_list[2].rank, Some(2));
        assert_eq!(
            race.outcome(),
            Some(RaceOutcome::Winner {
                name: race.racers_list[1].name.to_owned()
            })
        );
    }

    #[test]
    fn all_racers_out_is_a_distinct_no_winner_outcome() {
        let pars = fixed_pars();
        let mut race = Race::new(&pars, 2, 1_000.0, 0.1, Some(5));

        for racer in race.racers_list.iter_mut() {
            racer.hazard = Some(Hazard {
                s_trigger: 1.0,
                countdown_s: 1,
                state: HazardState::Armed,
            });
        }

        run_to_completion(&mut race, 10_000);

        assert_eq!(race.outcome(), Some(RaceOutcome::NoWinner));
        for racer in race.racers_list.iter() {
            assert_eq!(racer.status, RacerStatus::Dnf);
            assert_eq!(racer.rank, None);
        }
    }

    #[test]
    fn terminal_states_never_revert() {
        let pars = fixed_pars();
        let mut race = Race::new(&pars, 2, 1_000.0, 0.1, Some(5));

        for racer in race.racers_list.iter_mut() {
            racer.hazard = Some(Hazard {
                s_trigger: 1.0,
                countdown_s: 1,
                state: HazardState::Armed,
            });
        }

        run_to_completion(&mut race, 10_000);
        let s_tracks: Vec<f64> = race.racers_list.iter().map(|racer| racer.s_track).collect();

        // further ticks must neither move nor revive anybody
        for _ in 0..50 {
            race.simulate_timestep();
        }

        for (racer, s_before) in race.racers_list.iter().zip(s_tracks.iter()) {
            assert_eq!(racer.status, RacerStatus::Dnf);
            assert_relative_eq!(racer.s_track, *s_before);
        }
    }

    #[test]
    fn grace_period_takes_out_the_stragglers() {
        let mut pars = fixed_pars();
        pars.t_grace = 2.0;

        let mut race = Race::new(&pars, 2, 50.0, 0.1, Some(5));
        race.racers_list[0].speed = 1.0;

        run_to_completion(&mut race, 10_000);

        // the fast racer finishes after ~50 ticks, the straggler covers far less than 50 cells
        // within the 2 s grace window and is taken out without a rank
        assert_eq!(race.racers_list[0].status, RacerStatus::Finished);
        assert_eq!(race.racers_list[0].rank, Some(1));
        assert_eq!(race.racers_list[1].status, RacerStatus::Dnf);
        assert_eq!(race.racers_list[1].rank, None);
        assert!(!race.racers_list[1].exploded());
        assert!(race.events.iter().any(|event| event.kind == "GraceExpired"));
    }

    #[test]
    fn first_across_line_mode_stops_the_race_instantly() {
        let mut pars = fixed_pars();
        pars.mode = RaceMode::FirstAcrossLine;

        let mut race = Race::new(&pars, 3, 10.0, 0.1, Some(5));
        run_to_completion(&mut race, 10_000);

        // all racers run at the same speed, the first lane wins by iteration order and the
        // remaining racers never get to cross
        assert_eq!(race.racers_list[0].rank, Some(1));
        assert_eq!(race.racers_list[1].status, RacerStatus::Running);
        assert_eq!(race.racers_list[2].status, RacerStatus::Running);
    }

    #[test]
    fn classification_lists_finishers_first() {
        let pars = fixed_pars();
        let mut race = Race::new(&pars, 3, 20.0, 0.1, Some(5));

        race.racers_list[1].hazard = Some(Hazard {
            s_trigger: 2.0,
            countdown_s: 1,
            state: HazardState::Armed,
        });

        run_to_completion(&mut race, 10_000);
        let result = race.get_race_result();

        assert_eq!(result.classification.len(), 3);
        assert_eq!(result.classification[0].rank, Some(1));
        assert_eq!(result.classification[1].rank, Some(2));
        assert_eq!(result.classification[2].rank, None);
        assert!(result.classification[2].exploded);
        assert_eq!(result.classification[2].name, race.racers_list[1].name);
    }

    #[test]
    fn position_advances_by_speed_each_tick() {
        let pars = fixed_pars();
        let mut race = Race::new(&pars, 1, 1_000.0, 0.1, Some(5));

        for _ in 0..10 {
            race.simulate_timestep();
        }

        assert_relative_eq!(race.racers_list[0].s_track, 1.0, epsilon = 1e-9);
        assert_relative_eq!(race.cur_racetime, 1.0, epsilon = 1e-9);
    }
}
