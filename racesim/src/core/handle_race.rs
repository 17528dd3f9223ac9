use crate::core::race::{Race, RaceOutcome, RacePars};
use crate::core::racer::HazardState;
use crate::interfaces::tui_interface::{
    HazardSnapshot, RaceSnapshot, RacerSnapshot, RgbColor, MAX_TUI_UPDATE_FREQUENCY,
};
use crate::post::race_result::RaceResult;
use anyhow::Context;
use flume::{Receiver, Sender};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// handle_race creates and simulates a race on the basis of the inserted parameters, and returns
/// the result for post-processing. If a sender is inserted, the race is simulated in real time
/// and render snapshots are sent for the TUI: an initial lineup snapshot first, then the tick
/// loop starts as soon as the start receiver fires. The quit receiver stops the tick loop as
/// soon as the user quits, which is the only cancellation mechanism.
#[allow(clippy::too_many_arguments)]
pub fn handle_race(
    race_pars: &RacePars,
    no_racers: usize,
    finish_line: f64,
    timestep_size: f64,
    seed: Option<u64>,
    print_debug: bool,
    tx: Option<&Sender<RaceSnapshot>>,
    start_rx: Option<&Receiver<()>>,
    quit_rx: Option<&Receiver<()>>,
    realtime_factor: f64,
) -> anyhow::Result<RaceResult> {
    let mut race = Race::new(race_pars, no_racers, finish_line, timestep_size, seed);
    race.print_events = print_debug;

    // check if sender was inserted -> in that case use real-time simulation for the TUI
    let sim_realtime = tx.is_some();

    if !sim_realtime {
        let mut t_race_update_print = 0.0;

        while !race.get_race_over() {
            race.simulate_timestep();

            if print_debug && race.cur_racetime > t_race_update_print + 0.9999 {
                let leader_idx = race.get_running_order()[0];
                println!(
                    "DEBUG: Simulating... Current race time is {:.3}s, leader is {} at {:.1} cells",
                    race.cur_racetime,
                    race.racers_list[leader_idx].name,
                    race.racers_list[leader_idx].s_track
                );
                t_race_update_print = race.cur_racetime;
            }
        }
    } else {
        // send the lineup snapshot and block until the TUI signals the race start
        tx.unwrap()
            .send(build_snapshot(&race, None)?)
            .context("Failed to send lineup snapshot to the TUI!")?;

        if let Some(start_rx) = start_rx {
            if start_rx.recv().is_err() {
                // the TUI went away before the start, there is no race to run
                race.abort();
            }
        }

        let mut t_race_update_tui = 0.0;
        let mut no_ticks_behind = 0u64;

        while !race.get_race_over() {
            let t_start = Instant::now();

            // stop issuing ticks as soon as the user quit in the TUI
            if let Some(quit_rx) = quit_rx {
                if quit_rx.try_recv().is_ok() {
                    race.abort();
                    break;
                }
            }

            race.simulate_timestep();

            if race.cur_racetime > t_race_update_tui + 1.0 / MAX_TUI_UPDATE_FREQUENCY - 0.001 {
                tx.unwrap()
                    .send(build_snapshot(&race, None)?)
                    .context("Failed to send race snapshot to the TUI!")?;
                t_race_update_tui = race.cur_racetime;
            }

            // sleep until the time step is finished in real time as well (calculation in ms)
            let t_sleep = (race.timestep_size * 1000.0 / realtime_factor) as i64
                - t_start.elapsed().as_millis() as i64;

            if t_sleep > 0 {
                sleep(Duration::from_millis(t_sleep as u64));
            } else {
                no_ticks_behind += 1;
            }
        }

        // after the real-time loop finishes, send the final snapshot with the result once (an
        // interrupted race has no receiver anymore, the TUI left on its own)
        if race.outcome() != Some(RaceOutcome::Interrupted) {
            tx.unwrap()
                .send(build_snapshot(&race, Some(race.get_race_result()))?)
                .context("Failed to send final race snapshot to the TUI!")?;
        }

        if no_ticks_behind > 0 {
            println!(
                "WARNING: Could not keep up with real-time in {} of {} ticks!",
                no_ticks_behind, race.tick
            );
        }
    }

    // return race result
    Ok(race.get_race_result())
}

/// build_snapshot converts the current race state into the render snapshot sent to the TUI,
/// resolving the hex color strings into RGB.
fn build_snapshot(race: &Race, final_result: Option<RaceResult>) -> anyhow::Result<RaceSnapshot> {
    let mut racer_states = Vec::with_capacity(race.racers_list.len());

    for racer in race.racers_list.iter() {
        let tmp_color = racer
            .color
            .parse::<css_color_parser::Color>()
            .context("Could not parse hex color!")?;

        racer_states.push(RacerSnapshot {
            name: racer.name.to_owned(),
            lane: racer.lane,
            s_track: racer.s_track,
            status: racer.status,
            rank: racer.rank,
            color: RgbColor {
                r: tmp_color.r,
                g: tmp_color.g,
                b: tmp_color.b,
            },
            hazard: racer.hazard.map(|hazard| HazardSnapshot {
                s_trigger: hazard.s_trigger,
                countdown_s: hazard.countdown_s,
                detonated: hazard.state == HazardState::Detonated,
            }),
        });
    }

    Ok(RaceSnapshot {
        racer_states,
        finish_line: race.finish_line,
        tick: race.tick,
        race_over: race.get_race_over(),
        final_result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::race::{HazardPars, RaceMode};

    fn quick_pars() -> RacePars {
        RacePars {
            names: vec![String::from("Testudo")],
            colors: vec![String::from("#cc0000")],
            speed_init_range: [0.5, 0.5],
            accel_init_range: [0.0, 0.0],
            accel_range: [0.0, 0.0],
            p_accel_resample: 0.0,
            min_speed: 0.1,
            mode: RaceMode::FirstAcrossLine,
            t_grace: 60.0,
            hazard_pars: HazardPars {
                enabled: false,
                p_arm: 0.0,
                countdown_s: 3,
                s_offset: 0.0,
            },
        }
    }

    #[test]
    fn headless_race_runs_to_a_result() {
        let result = handle_race(
            &quick_pars(),
            2,
            5.0,
            0.1,
            Some(3),
            false,
            None,
            None,
            None,
            1.0,
        )
        .unwrap();

        assert_eq!(
            result.outcome,
            Some(RaceOutcome::Winner {
                name: String::from("Testudo 1")
            })
        );
        assert_eq!(result.classification.len(), 2);
    }

    #[test]
    fn dropping_the_start_sender_aborts_the_race() {
        let (tx, rx) = flume::unbounded();
        let (start_tx, start_rx) = flume::bounded::<()>(1);
        let (_quit_tx, quit_rx) = flume::bounded::<()>(1);

        // never signal the start
        drop(start_tx);

        let result = handle_race(
            &quick_pars(),
            2,
            5.0,
            0.1,
            Some(3),
            false,
            Some(&tx),
            Some(&start_rx),
            Some(&quit_rx),
            1.0,
        )
        .unwrap();

        assert_eq!(result.outcome, Some(RaceOutcome::Interrupted));

        // only the lineup snapshot was sent, no ticks ran
        let lineup = rx.try_recv().unwrap();
        assert_eq!(lineup.tick, 0);
        assert!(rx.try_recv().is_err());
    }
}
