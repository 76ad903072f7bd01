//! SapTuner CLI - System optimisation management for SAP workloads
//!
//! Thin dispatcher over the reconciliation engine: resolves the catalogs
//! for the current platform, runs one engine operation and renders the
//! result.

use clap::Parser;
use console::style;
use saptuner::catalog::{NoteCatalog, SolutionCatalog, INTERNAL_BLOCK_NOTE};
use saptuner::config::{
    CliArgs, Commands, DaemonAction, EngineConfig, NoteAction, SolutionAction,
};
use saptuner::compare::NoteComparison;
use saptuner::engine::TuneApp;
use saptuner::error::Result;
use saptuner::service;
use saptuner::system::SystemFacts;
use tracing_subscriber::EnvFilter;

const EXIT_TUNED_STOPPED: i32 = 1;
const EXIT_TUNED_WRONG_PROFILE: i32 = 2;
const EXIT_NOT_TUNED: i32 = 3;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    // All actions mutate or inspect system-wide state
    #[cfg(unix)]
    if !nix::unistd::geteuid().is_root() {
        fail("Please run saptuner with root privilege.");
    }

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn run(args: CliArgs) -> Result<()> {
    let config = EngineConfig::from_cli(&args);
    let facts = SystemFacts::collect();
    let notes = NoteCatalog::load(&facts, &config.extra_sheets_dir);
    let solutions = SolutionCatalog::load(&facts, &config.extra_sheets_dir);
    let app = TuneApp::new(config, notes, solutions);

    match &args.command {
        Commands::Daemon { action } => daemon_action(&app, action),
        Commands::Note { action } => note_action(&app, action),
        Commands::Solution { action } => solution_action(&app, action),
    }
}

fn daemon_action(app: &TuneApp, action: &DaemonAction) -> Result<()> {
    match action {
        DaemonAction::Start => {
            println!("Starting daemon (tuned.service), this may take several seconds...");
            // Do not error out when the conflicting service is absent
            let _ = service::systemctl_disable_stop(service::SAPCONF_SERVICE);
            service::write_tuned_profile(service::TUNED_PROFILE_NAME)?;
            service::systemctl_enable_start(service::TUNED_SERVICE)?;
            println!("Daemon (tuned.service) has been enabled and started.");
            let state = app.state_snapshot()?;
            if state.active_notes.is_empty() && state.active_solutions.is_empty() {
                println!(
                    "Your system has not yet been tuned. Please visit `saptuner note` and `saptuner solution` to start tuning."
                );
            }
            Ok(())
        }
        DaemonAction::Apply => {
            // Invoked by the tuned profile script after reboot
            app.tune_all()
        }
        DaemonAction::Status => {
            if !service::systemctl_is_running(service::TUNED_SERVICE) {
                eprintln!("Daemon (tuned.service) is stopped. If you wish to start the daemon, run `saptuner daemon start`.");
                std::process::exit(EXIT_TUNED_STOPPED);
            }
            println!("Daemon (tuned.service) is running.");
            if service::tuned_profile() != service::TUNED_PROFILE_NAME {
                eprintln!("tuned.service profile is incorrect. If you wish to correct it, run `saptuner daemon start`.");
                std::process::exit(EXIT_TUNED_WRONG_PROFILE);
            }
            let state = app.state_snapshot()?;
            if state.active_notes.is_empty() && state.active_solutions.is_empty() {
                eprintln!("Your system has not yet been tuned. Please visit `saptuner note` and `saptuner solution` to start tuning.");
                std::process::exit(EXIT_NOT_TUNED);
            }
            println!("The system has been tuned for the following solutions and notes:");
            for name in &state.active_solutions {
                println!("\t{name}");
            }
            for id in &state.active_notes {
                println!("\t{id}");
            }
            Ok(())
        }
        DaemonAction::Stop => {
            println!("Stopping daemon (tuned.service), this may take several seconds...");
            service::systemctl_disable_stop(service::TUNED_SERVICE)?;
            println!("Daemon (tuned.service) has been disabled and stopped.");
            println!("All tuned parameters have been reverted to default.");
            Ok(())
        }
        DaemonAction::Revert => {
            // Invoked by the tuned profile script; keeps the activation
            // lists so the next `daemon apply` restores tuning
            app.revert_all(false)
        }
    }
}

fn note_action(app: &TuneApp, action: &NoteAction) -> Result<()> {
    match action {
        NoteAction::Apply { id } => {
            app.tune_note(id)?;
            println!("The note has been applied successfully.");
            print_daemon_reminder();
            Ok(())
        }
        NoteAction::List => {
            println!(
                "All notes ({} denotes manually enabled notes, {} denotes notes enabled by solutions):",
                style("+").bold(),
                style("*").bold()
            );
            let solution_ids = app.sorted_solution_enabled_notes()?;
            let state = app.state_snapshot()?;
            for id in app.note_catalog().sorted_ids() {
                if id == INTERNAL_BLOCK_NOTE {
                    // Internal note referenced by the ASE solution
                    continue;
                }
                let note = app.get_note_by_id(&id)?;
                let marker = if solution_ids.binary_search(&id).is_ok() {
                    "*"
                } else if state.active_notes.iter().any(|n| n == &id) {
                    "+"
                } else {
                    " "
                };
                println!("{marker}\t{id}\t{}", note.name);
            }
            print_daemon_reminder();
            Ok(())
        }
        NoteAction::Verify { id: None } => verify_all_parameters(app),
        NoteAction::Verify { id: Some(id) } => {
            // Check the system against the note whether or not it is tuned
            let (conforming, comparison) = app.verify_note(id)?;
            if conforming {
                println!("The system fully conforms to the specified note.");
                Ok(())
            } else {
                print_note_fields(app, id, &comparison, true);
                fail("The parameters listed above have deviated from the specified note.");
            }
        }
        NoteAction::Simulate { id } => {
            let (_, comparison) = app.verify_note(id)?;
            println!(
                "If you run `saptuner note apply {id}`, the following changes will be applied to your system:"
            );
            print_note_fields(app, id, &comparison, false);
            Ok(())
        }
        NoteAction::Revert { id } => {
            app.revert_note(id, true)?;
            println!("Parameters tuned by the note have been successfully reverted.");
            println!("Please note: the reverted note may still show up in list of enabled notes, if an enabled solution refers to it.");
            Ok(())
        }
    }
}

fn solution_action(app: &TuneApp, action: &SolutionAction) -> Result<()> {
    match action {
        SolutionAction::Apply { name } => {
            let absorbed = app.tune_solution(name)?;
            println!("All tuning options for the SAP solution have been applied successfully.");
            if !absorbed.is_empty() {
                println!("The following previously-enabled notes are now tuned by the SAP solution:");
                for id in &absorbed {
                    let note_name = app
                        .get_note_by_id(id)
                        .map(|n| n.name.clone())
                        .unwrap_or_default();
                    println!("\t{id}\t{note_name}");
                }
            }
            print_daemon_reminder();
            Ok(())
        }
        SolutionAction::List => {
            println!(
                "All solutions ({} denotes enabled solution):",
                style("*").bold()
            );
            let state = app.state_snapshot()?;
            for name in app.solution_catalog().sorted_names() {
                let marker = if state.active_solutions.iter().any(|s| s == &name) {
                    "*"
                } else {
                    " "
                };
                println!("{marker}\t{name}");
            }
            print_daemon_reminder();
            Ok(())
        }
        SolutionAction::Verify { name: None } => verify_all_parameters(app),
        SolutionAction::Verify { name: Some(name) } => {
            let (unsatisfied, comparisons) = app.verify_solution(name)?;
            if unsatisfied.is_empty() {
                println!("The system fully conforms to the tuning guidelines of the specified SAP solution.");
                Ok(())
            } else {
                for id in &unsatisfied {
                    print_note_fields(app, id, &comparisons[id], true);
                }
                fail("The parameters listed above have deviated from the specified SAP solution recommendations.");
            }
        }
        SolutionAction::Simulate { name } => {
            let (_, comparisons) = app.verify_solution(name)?;
            println!(
                "If you run `saptuner solution apply {name}`, the following changes will be applied to your system:"
            );
            for (id, comparison) in &comparisons {
                print_note_fields(app, id, comparison, false);
            }
            Ok(())
        }
        SolutionAction::Revert { name } => {
            app.revert_solution(name)?;
            println!("Parameters tuned by the notes referred by the SAP solution have been successfully reverted.");
            Ok(())
        }
    }
}

/// Verify that system parameters do not deviate from any enabled
/// solution or note
fn verify_all_parameters(app: &TuneApp) -> Result<()> {
    let (unsatisfied, comparisons) = app.verify_all()?;
    if unsatisfied.is_empty() {
        println!("The running system is currently well-tuned according to all of the enabled notes.");
        Ok(())
    } else {
        for id in &unsatisfied {
            print_note_fields(app, id, &comparisons[id], true);
        }
        fail("The parameters listed above have deviated from SAP/SUSE recommendations.");
    }
}

/// Print the mismatching fields of a note comparison
fn print_note_fields(app: &TuneApp, note_id: &str, comparison: &NoteComparison, print_actual: bool) {
    let note_name = app
        .get_note_by_id(note_id)
        .map(|n| n.name.clone())
        .unwrap_or_default();
    println!("{note_id} - {note_name} -");
    let mut has_diff = false;
    for (key, field) in comparison {
        if field.matches {
            continue;
        }
        has_diff = true;
        if print_actual {
            println!("\t{key} Expected: {}", field.expected);
            println!("\t{key} Actual  : {}", style(&field.actual).yellow());
        } else {
            println!("\t{key} : {}", field.expected);
        }
    }
    if !has_diff {
        println!("\t(no change)");
    }
}

/// Remind the operator to configure the daemon when tuning would not
/// survive a reboot
fn print_daemon_reminder() {
    if !service::systemctl_is_running(service::TUNED_SERVICE)
        || service::tuned_profile() != service::TUNED_PROFILE_NAME
    {
        println!(
            "\nRemember: if you wish to automatically activate the note's tuning options after a reboot, you must instruct saptuner to configure \"tuned\" daemon by running:\n    saptuner daemon start"
        );
    }
}
