mod session;

use std::env;
use std::io::{self, Write};
use std::process;

use airnode_core::cycle::CycleOutcome;
use crossterm::style::Stylize;

use session::{CycleSummary, Session, SimulationOptions};

const USAGE: &str = "Usage: airnode-emulator [--cycles <n>] [--fail <reference|gas|selftest|co2>] \
[--reference-read-fails] [--co2-never-ready] [--drop-every <n>]";

fn main() -> io::Result<()> {
    let options = SimulationOptions::parse(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options);

    writeln!(
        writer,
        "Airnode emulator: simulating {} wake cycle(s) on a virtual clock.",
        session.options().cycles
    )?;

    while !session.is_finished() {
        let summary = session.run_cycle();
        print_summary(&mut writer, &summary)?;
    }

    writeln!(
        writer,
        "Done. {} state record write(s) reached flash.",
        session.flash().writes
    )?;
    Ok(())
}

fn print_summary(writer: &mut impl Write, summary: &CycleSummary) -> io::Result<()> {
    let header = format!(
        "cycle {} at +{}ms",
        summary.number, summary.started_at_ms
    );
    writeln!(writer, "{}", header.bold())?;

    for record in &summary.events {
        writeln!(
            writer,
            "  [{:>6}ms] {}",
            record.timestamp_ms.saturating_sub(summary.started_at_ms),
            record.event
        )?;
    }

    match &summary.outcome {
        CycleOutcome::Completed { report, sleep } => {
            writeln!(writer, "  {} {report}", "OK".green())?;
            writeln!(writer, "  sleeping {}s", sleep.as_secs())?;
        }
        CycleOutcome::Aborted { error, sleep } => {
            writeln!(writer, "  {} {error} (code {})", "ABORT".red(), error.code())?;
            writeln!(writer, "  sleeping {}s", sleep.as_secs())?;
        }
    }

    if summary.rail_left_on {
        writeln!(writer, "  {}", "sensor rail left powered".yellow())?;
    }
    Ok(())
}
