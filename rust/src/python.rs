//! Python bindings. Snapshots and results cross the boundary as JSON.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::GenerationOptions;
use crate::interval::Minute;
use crate::scheduler::SchedulerError;

fn to_py_err(err: SchedulerError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Tunables for one generation run (PyO3 wrapper).
#[pyclass(name = "GenerationOptions")]
#[derive(Clone, Debug)]
pub struct PyGenerationOptions {
    #[pyo3(get, set)]
    pub retry_budget: u32,
    #[pyo3(get, set)]
    pub max_gap_minutes: Minute,
    #[pyo3(get, set)]
    pub step_minutes: Option<Minute>,
    #[pyo3(get, set)]
    pub relaxed_step_minutes: Minute,
    #[pyo3(get, set)]
    pub require_room: bool,
    #[pyo3(get, set)]
    pub min_room_capacity: Option<u32>,
    #[pyo3(get, set)]
    pub time_budget_ms: Option<u64>,
    #[pyo3(get, set)]
    pub max_placement_attempts: Option<u64>,
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl From<&PyGenerationOptions> for GenerationOptions {
    fn from(o: &PyGenerationOptions) -> Self {
        Self {
            retry_budget: o.retry_budget,
            max_gap_minutes: o.max_gap_minutes,
            step_minutes: o.step_minutes,
            relaxed_step_minutes: o.relaxed_step_minutes,
            require_room: o.require_room,
            min_room_capacity: o.min_room_capacity,
            time_budget_ms: o.time_budget_ms,
            max_placement_attempts: o.max_placement_attempts,
            verbosity: o.verbosity,
        }
    }
}

#[pymethods]
impl PyGenerationOptions {
    #[new]
    #[pyo3(signature = (
        retry_budget=None,
        max_gap_minutes=None,
        step_minutes=None,
        relaxed_step_minutes=None,
        require_room=None,
        min_room_capacity=None,
        time_budget_ms=None,
        max_placement_attempts=None,
        verbosity=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        retry_budget: Option<u32>,
        max_gap_minutes: Option<Minute>,
        step_minutes: Option<Minute>,
        relaxed_step_minutes: Option<Minute>,
        require_room: Option<bool>,
        min_room_capacity: Option<u32>,
        time_budget_ms: Option<u64>,
        max_placement_attempts: Option<u64>,
        verbosity: Option<u8>,
    ) -> Self {
        let defaults = GenerationOptions::default();
        Self {
            retry_budget: retry_budget.unwrap_or(defaults.retry_budget),
            max_gap_minutes: max_gap_minutes.unwrap_or(defaults.max_gap_minutes),
            step_minutes: step_minutes.or(defaults.step_minutes),
            relaxed_step_minutes: relaxed_step_minutes.unwrap_or(defaults.relaxed_step_minutes),
            require_room: require_room.unwrap_or(defaults.require_room),
            min_room_capacity: min_room_capacity.or(defaults.min_room_capacity),
            time_budget_ms: time_budget_ms.or(defaults.time_budget_ms),
            max_placement_attempts: max_placement_attempts.or(defaults.max_placement_attempts),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "GenerationOptions(retry_budget={}, max_gap_minutes={}, step_minutes={:?}, require_room={}, verbosity={})",
            self.retry_budget,
            self.max_gap_minutes,
            self.step_minutes,
            self.require_room,
            self.verbosity
        )
    }
}

/// Generate a timetable from a JSON snapshot.
///
/// Returns the result (slots, conflicts, repairs, summary) as JSON.
///
/// # Raises
/// * ValueError on malformed JSON, invalid input or invalid options
#[pyfunction]
#[pyo3(signature = (snapshot_json, options=None))]
fn generate_timetable(
    py: Python<'_>,
    snapshot_json: &str,
    options: Option<PyGenerationOptions>,
) -> PyResult<String> {
    let options = options
        .as_ref()
        .map(GenerationOptions::from)
        .unwrap_or_default();
    py.allow_threads(|| crate::generate_json(snapshot_json, options))
        .map_err(to_py_err)
}

/// Check proposed slots against a JSON snapshot. Returns conflicts as JSON.
#[pyfunction]
fn validate_timetable(py: Python<'_>, snapshot_json: &str, slots_json: &str) -> PyResult<String> {
    py.allow_threads(|| crate::validate_json(snapshot_json, slots_json))
        .map_err(to_py_err)
}

/// The timetabler_rust Python module.
#[pymodule]
fn timetabler_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyGenerationOptions>()?;
    m.add_function(wrap_pyfunction!(generate_timetable, m)?)?;
    m.add_function(wrap_pyfunction!(validate_timetable, m)?)?;
    Ok(())
}
