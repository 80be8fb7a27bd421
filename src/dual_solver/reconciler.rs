//! Runs both pipelines on a request and merges what they produce.
use crate::Utils::logger::save_trajectory_to_csv;
use crate::Utils::plots::{PngRenderer, TrajectoryRenderer, save_png};
use crate::dual_solver::binding::TIME;
use crate::dual_solver::config::{OutputConfig, SolverConfig};
use crate::dual_solver::errors::DualSolverError;
use crate::dual_solver::numeric_pipeline::{self, DiagnosticSink, LogSink, NumericTrajectory};
use crate::dual_solver::request::OdeRequest;
use crate::dual_solver::symbolic_pipeline::{self, SymbolicSolution};
use crate::numerical::NonStiff_api::{IvpSolve, NonStiffSolver};
use crate::symbolic::dsolve::{ClosedFormSolve, Dsolve};
use crate::symbolic::symbolic_engine::{Equation, Expr};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{info, warn};
use std::time::Instant;
use tabled::builder::Builder;
use tabled::settings::Style;

pub const MISMATCH_MESSAGE: &str = "⚠️ Error: Mismatch between ODEs and initial conditions!";

/// What a request returns
#[derive(Debug, Clone)]
pub struct DualSolution {
    pub trajectory: NumericTrajectory,
    pub symbolic: SymbolicSolution,
    /// text shown to the user: the solutions or an error message
    pub sym_solution: String,
    pub image_png: Vec<u8>,
    /// `image_png` in standard base64
    pub image_base64: String,
    /// largest `|closed form - numeric|` per variable, when every solution can be evaluated
    pub deviations: Option<Vec<f64>>,
}

impl DualSolution {
    /// Per variable: initial, final, min and max sample and the closed-form deviation
    pub fn summary_table(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(["variable", "initial", "final", "min", "max", "closed-form deviation"]);
        for (i, label) in self.trajectory.labels.iter().enumerate() {
            let column = self.trajectory.column(i);
            let first = column.first().copied().unwrap_or(f64::NAN);
            let last = column.last().copied().unwrap_or(f64::NAN);
            let min = column.iter().copied().fold(f64::INFINITY, f64::min);
            let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let deviation = self
                .deviations
                .as_ref()
                .and_then(|d| d.get(i))
                .map_or("-".to_string(), |d| format!("{:.3e}", d));
            builder.push_record([
                label.clone(),
                format!("{:.6}", first),
                format!("{:.6}", last),
                format!("{:.6}", min),
                format!("{:.6}", max),
                deviation,
            ]);
        }
        let mut table = builder.build();
        table.with(Style::modern());
        table.to_string()
    }

    /// Saves the CSV and the PNG wherever `output` asks for them
    pub fn export(&self, output: &OutputConfig) -> Result<(), DualSolverError> {
        if let Some(path) = &output.csv {
            save_trajectory_to_csv(
                &self.trajectory.t,
                &self.trajectory.y,
                &self.trajectory.labels,
                TIME,
                path,
            )?;
        }
        if let Some(path) = &output.png {
            save_png(&self.image_png, path)?;
        }
        Ok(())
    }
}

/// Largest absolute difference between each closed-form solution and its numeric samples.
/// `None` as soon as one solution is implicit or holds something that cannot be evaluated.
pub fn cross_check(solutions: &[Equation], trajectory: &NumericTrajectory) -> Option<Vec<f64>> {
    if solutions.len() != trajectory.y.ncols() {
        return None;
    }
    let t: Vec<f64> = trajectory.t.iter().copied().collect();
    solutions
        .iter()
        .enumerate()
        .map(|(i, solution)| {
            if !matches!(solution.lhs, Expr::Func(..)) {
                return None;
            }
            let exact = solution.rhs.calc_vector_lambdified1D(TIME, &t)?;
            if exact.iter().any(|v| !v.is_finite()) {
                return None;
            }
            Some(
                exact
                    .iter()
                    .zip(trajectory.y.column(i).iter())
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0, f64::max),
            )
        })
        .collect()
}

/// The two pipelines and the renderer, wired with the collaborators they should use
pub struct DualSolver<'a> {
    pub config: SolverConfig,
    ivp: &'a dyn IvpSolve,
    closed_form: &'a dyn ClosedFormSolve,
    renderer: &'a dyn TrajectoryRenderer,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> DualSolver<'a> {
    pub fn new(
        config: SolverConfig,
        ivp: &'a dyn IvpSolve,
        closed_form: &'a dyn ClosedFormSolve,
        renderer: &'a dyn TrajectoryRenderer,
        sink: &'a dyn DiagnosticSink,
    ) -> Self {
        DualSolver {
            config,
            ivp,
            closed_form,
            renderer,
            sink,
        }
    }

    /// Numeric pipeline, then the symbolic one when the counts agree, then the plot.
    /// Numeric and render failures end the request; symbolic ones end up in `sym_solution`.
    pub fn solve(&self, request: &OdeRequest) -> Result<DualSolution, DualSolverError> {
        let start = Instant::now();
        let t_eval = request.sample_grid(self.config.samples);
        let trajectory = numeric_pipeline::integrate(
            &request.equations,
            &request.initial_state,
            &t_eval,
            self.config.method,
            self.ivp,
            self.sink,
        )?;

        let symbolic = if request.is_consistent() {
            symbolic_pipeline::solve(&request.equations, &request.initial_state, self.closed_form)
        } else {
            warn!(
                "{} equations but {} initial values, closed form skipped",
                request.equations.len(),
                request.initial_state.len()
            );
            SymbolicSolution::Failed(MISMATCH_MESSAGE.to_string())
        };

        let labels: Vec<String> = trajectory
            .labels
            .iter()
            .map(|label| format!("solve_ivp: {}", label))
            .collect();
        let image_png = self.renderer.render(&trajectory.t, &trajectory.y, &labels)?;
        let image_base64 = STANDARD.encode(&image_png);

        let deviations = match &symbolic {
            SymbolicSolution::Solved(solutions) => cross_check(solutions, &trajectory),
            SymbolicSolution::Failed(_) => None,
        };
        let solution = DualSolution {
            sym_solution: symbolic.to_string(),
            trajectory,
            symbolic,
            image_png,
            image_base64,
            deviations,
        };
        info!("\n{}", solution.summary_table());
        info!("request solved in {} ms", start.elapsed().as_millis());
        Ok(solution)
    }
}

/// Solves `request` with the built-in collaborators: the Runge-Kutta solver, the closed-form
/// solver, the PNG renderer and diagnostics written to the log.
pub fn solve_request(
    request: &OdeRequest,
    solver: &SolverConfig,
    output: &OutputConfig,
) -> Result<DualSolution, DualSolverError> {
    let ivp = NonStiffSolver::new(solver.ivp_options());
    let closed_form = Dsolve::default();
    let renderer = PngRenderer {
        width: output.width,
        height: output.height,
        ..PngRenderer::default()
    };
    let sink = LogSink::default();
    DualSolver::new(solver.clone(), &ivp, &closed_form, &renderer, &sink).solve(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Utils::plots::RenderError;
    use crate::dual_solver::numeric_pipeline::CollectingSink;
    use crate::symbolic::dsolve::DsolveError;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};
    use std::cell::{Cell, RefCell};

    /// Answers with fixed bytes and remembers the labels it was given
    #[derive(Default)]
    struct StubRenderer {
        labels: RefCell<Vec<String>>,
    }

    impl TrajectoryRenderer for StubRenderer {
        fn render(
            &self,
            _t: &DVector<f64>,
            _y: &DMatrix<f64>,
            labels: &[String],
        ) -> Result<Vec<u8>, RenderError> {
            *self.labels.borrow_mut() = labels.to_vec();
            Ok(b"png".to_vec())
        }
    }

    struct FailingRenderer;

    impl TrajectoryRenderer for FailingRenderer {
        fn render(
            &self,
            _t: &DVector<f64>,
            _y: &DMatrix<f64>,
            _labels: &[String],
        ) -> Result<Vec<u8>, RenderError> {
            Err(RenderError::Drawing("no canvas".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingSolver {
        calls: Cell<usize>,
    }

    impl ClosedFormSolve for CountingSolver {
        fn dsolve(
            &self,
            _equation: &Equation,
            unknown: &Expr,
            initial_value: f64,
        ) -> Result<Equation, DsolveError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Equation::new(unknown.clone(), Expr::Const(initial_value)))
        }
    }

    fn run(
        request: &OdeRequest,
        closed_form: &dyn ClosedFormSolve,
        renderer: &dyn TrajectoryRenderer,
    ) -> Result<DualSolution, DualSolverError> {
        let ivp = NonStiffSolver::default();
        let sink = CollectingSink::default();
        DualSolver::new(SolverConfig::default(), &ivp, closed_form, renderer, &sink).solve(request)
    }

    #[test]
    fn test_symbolic_side_runs_only_for_matching_counts() {
        let renderer = StubRenderer::default();
        let counting = CountingSolver::default();
        let request = OdeRequest::parse("y1;y2", "1", Some("5")).unwrap();
        let solution = run(&request, &counting, &renderer).unwrap();
        assert_eq!(counting.calls.get(), 0);
        assert_eq!(solution.sym_solution, MISMATCH_MESSAGE);
        assert_eq!(solution.trajectory.y.shape(), (100, 1));

        let request = OdeRequest::parse("y2;-y1", "1,0", None).unwrap();
        run(&request, &counting, &renderer).unwrap();
        assert_eq!(counting.calls.get(), 2);
    }

    #[test]
    fn test_plot_labels_and_base64() {
        let renderer = StubRenderer::default();
        let request = OdeRequest::parse("y2;-y1", "1,0", None).unwrap();
        let solution = run(&request, &Dsolve::default(), &renderer).unwrap();
        assert_eq!(
            *renderer.labels.borrow(),
            vec!["solve_ivp: y1".to_string(), "solve_ivp: y2".to_string()]
        );
        assert_eq!(solution.image_png, b"png".to_vec());
        assert_eq!(solution.image_base64, "cG5n");
    }

    #[test]
    fn test_render_failure_is_fatal() {
        let request = OdeRequest::parse("-y1", "1", None).unwrap();
        let result = run(&request, &Dsolve::default(), &FailingRenderer);
        assert!(matches!(result, Err(DualSolverError::Render(_))));
    }

    #[test]
    fn test_cross_check_of_decay() {
        let request = OdeRequest::parse("-0.5*y1", "10", Some("5")).unwrap();
        let solution = run(&request, &Dsolve::default(), &StubRenderer::default()).unwrap();
        let deviations = solution.deviations.unwrap();
        assert_eq!(deviations.len(), 1);
        assert!(deviations[0] < 0.1, "deviation {}", deviations[0]);
    }

    #[test]
    fn test_cross_check_skips_integral_forms() {
        let request = OdeRequest::parse("y2;-y1", "1,0", None).unwrap();
        let solution = run(&request, &Dsolve::default(), &StubRenderer::default()).unwrap();
        assert!(solution.symbolic.is_solved());
        assert_eq!(solution.deviations, None);
    }

    #[test]
    fn test_cross_check_values() {
        let trajectory = NumericTrajectory {
            t: DVector::from_vec(vec![0.0, 1.0, 2.0]),
            y: DMatrix::from_column_slice(3, 1, &[0.0, 1.5, 2.0]),
            labels: vec!["y1".to_string()],
            stats: Default::default(),
        };
        let solution = Equation::new(
            Expr::function("y1", Expr::Var("t".to_string())),
            Expr::Var("t".to_string()),
        );
        let deviations = cross_check(&[solution.clone()], &trajectory).unwrap();
        assert_relative_eq!(deviations[0], 0.5);
        let implicit = Equation::new(Expr::Var("t".to_string()), Expr::Const(0.0));
        assert_eq!(cross_check(&[implicit], &trajectory), None);
        assert_eq!(cross_check(&[solution.clone(), solution], &trajectory), None);
    }

    #[test]
    fn test_summary_table_and_export() {
        let request = OdeRequest::parse("-0.5*y1", "10", Some("5")).unwrap();
        let solution = run(&request, &Dsolve::default(), &StubRenderer::default()).unwrap();
        let table = solution.summary_table();
        assert!(table.contains("closed-form deviation"));
        assert!(table.contains("10.000000"));

        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig {
            csv: Some(dir.path().join("decay.csv")),
            png: Some(dir.path().join("decay.png")),
            ..OutputConfig::default()
        };
        solution.export(&output).unwrap();
        let csv = std::fs::read_to_string(dir.path().join("decay.csv")).unwrap();
        assert_eq!(csv.lines().next(), Some("t,y1"));
        assert_eq!(csv.lines().count(), 101);
        assert_eq!(std::fs::read(dir.path().join("decay.png")).unwrap(), b"png".to_vec());
    }
}
