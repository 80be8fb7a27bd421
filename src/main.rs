#![allow(non_snake_case)]
use RustedODE::Examples::dual_solver_examples::{SCENARIOS, dual_solver_examples};
use RustedODE::Utils::logger::{init_logger, timestamped_log_name};
use RustedODE::dual_solver::config::Task;
use RustedODE::dual_solver::errors::DualSolverError;
use RustedODE::dual_solver::reconciler::{DualSolution, solve_request};
use simplelog::LevelFilter;
use std::path::Path;

/// `RustedODE` runs the four example requests, `RustedODE 1` runs the second one and
/// `RustedODE task.txt` runs a task document.
fn main() {
    let result = match std::env::args().nth(1) {
        Some(arg) => match arg.parse::<usize>() {
            Ok(example) => run_examples(example..example.saturating_add(1)),
            Err(_) => run_task(Path::new(&arg)),
        },
        None => run_examples(0..SCENARIOS.len()),
    };
    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_task(path: &Path) -> Result<(), DualSolverError> {
    let task = Task::from_file(path)?;
    let log_file = task.output.log_file.clone();
    if let Err(e) = init_logger(task.output.loglevel, log_file.as_deref()) {
        eprintln!("cannot create log file: {}", e);
    }
    let solution = solve_request(&task.request, &task.solver, &task.output)?;
    solution.export(&task.output)?;
    report(&path.display().to_string(), &solution);
    Ok(())
}

fn run_examples(examples: std::ops::Range<usize>) -> Result<(), DualSolverError> {
    let log_file = timestamped_log_name();
    if let Err(e) = init_logger(LevelFilter::Info, Some(log_file.as_path())) {
        eprintln!("cannot create log file: {}", e);
    }
    for example in examples {
        let solution = dual_solver_examples(example)?;
        report(SCENARIOS[example].name, &solution);
    }
    Ok(())
}

fn report(name: &str, solution: &DualSolution) {
    println!("==== {} ====", name);
    println!("{}", solution.sym_solution);
    println!("{}", solution.summary_table());
    println!("image_base64: {} characters", solution.image_base64.len());
}
