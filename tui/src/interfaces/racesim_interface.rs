use flume::Receiver;
use racesim::interfaces::tui_interface::RaceSnapshot;

/// RacesimInterface wraps the receiving end of the simulator channel and keeps the latest
/// snapshot. The channel is drained on every update so the TUI always draws the newest state,
/// even when the simulator outpaces the frame rate.
#[derive(Debug)]
pub struct RacesimInterface {
    pub rx: Receiver<RaceSnapshot>,
    pub snapshot: RaceSnapshot,
}

impl RacesimInterface {
    pub fn new(rx: Receiver<RaceSnapshot>) -> RacesimInterface {
        RacesimInterface {
            rx,
            snapshot: Default::default(),
        }
    }

    /// update_snapshot drains the channel and keeps the most recent snapshot. Returns true if at
    /// least one new snapshot arrived.
    pub fn update_snapshot(&mut self) -> bool {
        let mut updated = false;

        while let Ok(snapshot) = self.rx.try_recv() {
            self.snapshot = snapshot;
            updated = true;
        }

        updated
    }

    /// disconnected returns true once the simulator dropped its sender and no snapshots are
    /// pending anymore.
    pub fn disconnected(&self) -> bool {
        self.rx.is_disconnected() && self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_snapshot_keeps_only_the_newest() {
        let (tx, rx) = flume::unbounded();
        let mut iface = RacesimInterface::new(rx);

        for tick in 1..=3u64 {
            let snapshot = RaceSnapshot {
                tick,
                ..Default::default()
            };
            tx.send(snapshot).unwrap();
        }

        assert!(iface.update_snapshot());
        assert_eq!(iface.snapshot.tick, 3);
        assert!(!iface.update_snapshot());
    }

    #[test]
    fn disconnected_waits_for_pending_snapshots() {
        let (tx, rx) = flume::unbounded();
        let mut iface = RacesimInterface::new(rx);

        tx.send(RaceSnapshot {
            tick: 1,
            ..Default::default()
        })
        .unwrap();
        drop(tx);

        assert!(!iface.disconnected());
        iface.update_snapshot();
        assert!(iface.disconnected());
    }
}
