use clap::Parser;
use racesim::core::handle_race::handle_race;
use racesim::post::race_result::RaceResult;
use racesim::pre::read_sim_pars::{read_sim_pars, SimPars};
use racesim::pre::sim_opts::SimOpts;
use racesim::pre::validate::{calc_finish_line, validate_setup, DEFAULT_HEADLESS_COLS};
use std::thread;
use std::time::Instant;
use tui::core::race_view::RaceView;
use tui::interfaces::racesim_interface::RacesimInterface;

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    // get simulation parameters
    let sim_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        println!("INFO: Reading simulation parameters from {:?}", parfile_path);
        read_sim_pars(parfile_path)?
    } else {
        SimPars::default()
    };

    // EXECUTION -----------------------------------------------------------------------------------
    if sim_opts.headless {
        // HEADLESS CASE - the race is simulated at full speed without visualization
        validate_setup(
            &sim_pars.race_pars,
            sim_opts.no_racers,
            sim_opts.timestep_size,
            None,
        )?;
        let finish_line = calc_finish_line(DEFAULT_HEADLESS_COLS);

        println!(
            "INFO: Simulating a race with {} racers over {:.0} cells with a time step size of {:.3}s",
            sim_opts.no_racers, finish_line, sim_opts.timestep_size
        );

        let t_start = Instant::now();
        let race_result = handle_race(
            &sim_pars.race_pars,
            sim_opts.no_racers,
            finish_line,
            sim_opts.timestep_size,
            sim_opts.seed,
            sim_opts.debug,
            None,
            None,
            None,
            1.0,
        )?;
        println!("INFO: Execution time: {}ms", t_start.elapsed().as_millis());

        race_result.print_classification();
        let out_path = race_result.write_csv(None)?;
        println!("INFO: Results saved to {}", out_path);
    } else {
        // TUI CASE - the race is simulated in real time with terminal visualization
        let (term_cols, term_rows) = crossterm::terminal::size()?;
        validate_setup(
            &sim_pars.race_pars,
            sim_opts.no_racers,
            sim_opts.timestep_size,
            Some((term_cols, term_rows)),
        )?;
        let finish_line = calc_finish_line(term_cols);

        // channels: snapshots flow simulator -> TUI, start and quit signals TUI -> simulator
        let (tx, rx) = flume::unbounded();
        let (start_tx, start_rx) = flume::bounded(1);
        let (quit_tx, quit_rx) = flume::bounded(1);

        // run the simulator in its own thread, the TUI stays on the main thread
        let race_pars_thread = sim_pars.race_pars.clone();
        let sim_opts_thread = sim_opts.clone();

        let sim_handle = thread::spawn(move || {
            handle_race(
                &race_pars_thread,
                sim_opts_thread.no_racers,
                finish_line,
                sim_opts_thread.timestep_size,
                sim_opts_thread.seed,
                false,
                Some(&tx),
                Some(&start_rx),
                Some(&quit_rx),
                sim_opts_thread.realtime_factor,
            )
        });

        let mut view = RaceView::new(term_cols, term_rows, sim_opts.debug);
        view.enter()?;
        let view_result = run_view(&mut view, rx, start_tx, &quit_tx);

        // always try to restore the terminal state before reporting anything
        let _ = view.exit();
        let shown_result = view_result?;

        let race_result = match sim_handle.join() {
            Ok(result) => result?,
            Err(_) => anyhow::bail!("The simulator thread panicked!"),
        };

        if shown_result.is_some() {
            race_result.print_classification();
            let out_path = race_result.write_csv(None)?;
            println!("INFO: Results saved to {}", out_path);
        } else {
            println!("INFO: Race aborted, no results were saved.");
        }
    }

    Ok(())
}

/// run_view drives the TUI through its screens: lineup with start prompt, countdown, race
/// animation, result screen. Returns the shown result, or None if the user quit early.
fn run_view(
    view: &mut RaceView,
    rx: flume::Receiver<racesim::interfaces::tui_interface::RaceSnapshot>,
    start_tx: flume::Sender<()>,
    quit_tx: &flume::Sender<()>,
) -> anyhow::Result<Option<RaceResult>> {
    let mut iface = RacesimInterface::new(rx);

    // wait for the lineup snapshot of the freshly created race
    while !iface.update_snapshot() {
        if iface.disconnected() {
            return Ok(None);
        }
        if view.poll_quit(std::time::Duration::from_millis(25))? {
            return Ok(None);
        }
    }

    view.draw_lineup(&iface.snapshot)?;

    // any key starts the race, the quit keys leave without racing (dropping start_tx on return
    // makes the blocked simulator thread abort)
    let key = view.wait_key()?;
    if tui::core::race_view::is_quit_key(&key) {
        return Ok(None);
    }

    view.run_countdown()?;
    let _ = start_tx.send(());

    view.run(&mut iface, quit_tx)
}
