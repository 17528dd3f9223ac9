use crate::core::race::RaceOutcome;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// ClassificationEntry is one line of the final classification: finishers carry their rank,
/// racers that never crossed the line carry none.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClassificationEntry {
    pub rank: Option<u32>,
    pub name: String,
    pub exploded: bool,
}

/// RaceEvent records a noteworthy moment of the race for post-processing.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RaceEvent {
    pub kind: String, // "BombArmed", "Explosion", "Finish", "GraceExpired"
    pub tick: u64,
    pub time_s: f64,
    pub racer: String,
}

/// RaceResult contains all race information that is required for post-processing the results.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RaceResult {
    pub classification: Vec<ClassificationEntry>,
    pub outcome: Option<RaceOutcome>,
    pub tot_ticks: u64,
    pub racetime: f64,
    pub events: Vec<RaceEvent>,
}

impl RaceResult {
    /// print_classification prints the race outcome and the final classification to the console
    /// output.
    pub fn print_classification(&self) {
        match &self.outcome {
            Some(RaceOutcome::Winner { name }) => println!("RESULT: The winner is: {}!", name),
            Some(RaceOutcome::NoWinner) => println!("RESULT: All racers exploded! No winner."),
            Some(RaceOutcome::Interrupted) => println!("RESULT: Race interrupted!"),
            None => println!("RESULT: Race still running!"),
        }

        for entry in self.classification.iter() {
            let pos = match entry.rank {
                Some(rank) => format!("{:3}", rank),
                None => String::from("DNF"),
            };
            let suffix = if entry.exploded { " (Exploded)" } else { "" };

            println!("RESULT: {} {}{}", pos, entry.name, suffix);
        }
    }

    /// write_csv writes the classification as delimited text with a `Position,Name,Exploded`
    /// header. Without an explicit path the file goes to output/race_results_{timestamp}.csv.
    /// Returns the path of the written file.
    pub fn write_csv(&self, path: Option<&Path>) -> anyhow::Result<String> {
        let out_path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let out_dir = Path::new("output");
                std::fs::create_dir_all(out_dir)?;
                let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
                out_dir.join(format!("race_results_{}.csv", timestamp))
            }
        };

        let mut writer = csv::Writer::from_path(&out_path)
            .context(format!("Failed to open results file {:?}!", out_path))?;

        writer.write_record(&["Position", "Name", "Exploded"])?;

        for entry in self.classification.iter() {
            let pos = match entry.rank {
                Some(rank) => rank.to_string(),
                None => String::from("DNF"),
            };
            let exploded = if entry.exploded { "Yes" } else { "No" };

            writer.write_record(&[pos.as_str(), entry.name.as_str(), exploded])?;
        }

        writer.flush()?;

        Ok(out_path.to_string_lossy().into_owned())
    }
}
