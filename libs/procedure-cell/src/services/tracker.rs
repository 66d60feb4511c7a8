// libs/procedure-cell/src/services/tracker.rs
//! Step state machine. Every function takes `now` explicitly; elapsed time
//! is derived from the timestamps recorded at each transition.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    ProcedureError, ProcedureSession, ProcedureStatus, Step, StepStatus, Vitals, VitalsRequest,
};

fn step_mut(procedure: &mut ProcedureSession, index: usize) -> Result<&mut Step, ProcedureError> {
    if procedure.is_completed() {
        return Err(ProcedureError::ProcedureCompleted);
    }
    let len = procedure.steps.len();
    procedure
        .steps
        .get_mut(index)
        .ok_or(ProcedureError::StepOutOfRange { index, len })
}

/// Folds the current run into `elapsed_seconds` and clears `started_at`.
fn halt(step: &mut Step, now: DateTime<Utc>) {
    step.elapsed_seconds = step.live_elapsed(now);
    step.started_at = None;
}

pub fn start_step(
    procedure: &mut ProcedureSession,
    index: usize,
    now: DateTime<Utc>,
) -> Result<(), ProcedureError> {
    let step = step_mut(procedure, index)?;

    match step.status {
        StepStatus::InProgress => return Ok(()),
        StepStatus::Completed => {
            return Err(ProcedureError::InvalidStepTransition {
                from: StepStatus::Completed,
                to: StepStatus::InProgress,
            })
        }
        StepStatus::Pending => {
            step.status = StepStatus::InProgress;
            step.started_at = Some(now);
            debug!("Step '{}' started with {}s already elapsed", step.name, step.elapsed_seconds);
        }
    }

    if procedure.status == ProcedureStatus::Pending {
        procedure.status = ProcedureStatus::InProgress;
        procedure.start_time.get_or_insert(now);
    }
    Ok(())
}

/// Halts the step's timer and returns it to pending. With `reset` the
/// accumulated time is discarded too, whatever the step's status was.
pub fn stop_or_reset_step(
    procedure: &mut ProcedureSession,
    index: usize,
    reset: bool,
    now: DateTime<Utc>,
) -> Result<(), ProcedureError> {
    let step = step_mut(procedure, index)?;

    if reset {
        step.status = StepStatus::Pending;
        step.elapsed_seconds = 0;
        step.started_at = None;
        step.completed_at = None;
        debug!("Step '{}' reset", step.name);
        return Ok(());
    }

    match step.status {
        StepStatus::Pending => Ok(()),
        StepStatus::InProgress => {
            halt(step, now);
            step.status = StepStatus::Pending;
            debug!("Step '{}' stopped at {}s", step.name, step.elapsed_seconds);
            Ok(())
        }
        StepStatus::Completed => Err(ProcedureError::InvalidStepTransition {
            from: StepStatus::Completed,
            to: StepStatus::Pending,
        }),
    }
}

pub fn complete_step(
    procedure: &mut ProcedureSession,
    index: usize,
    now: DateTime<Utc>,
) -> Result<(), ProcedureError> {
    let step = step_mut(procedure, index)?;

    match step.status {
        StepStatus::Completed => Ok(()),
        StepStatus::Pending => Err(ProcedureError::InvalidStepTransition {
            from: StepStatus::Pending,
            to: StepStatus::Completed,
        }),
        StepStatus::InProgress => {
            halt(step, now);
            step.status = StepStatus::Completed;
            step.completed_at = Some(now);
            debug!("Step '{}' completed after {}s", step.name, step.elapsed_seconds);
            Ok(())
        }
    }
}

/// Marks the whole procedure completed. Running steps are halted but keep
/// their status as pending. Returns `false` if it was already completed, in
/// which case nothing changes.
pub fn complete_procedure(procedure: &mut ProcedureSession, now: DateTime<Utc>) -> bool {
    if procedure.is_completed() {
        return false;
    }

    for step in procedure
        .steps
        .iter_mut()
        .filter(|s| s.status == StepStatus::InProgress)
    {
        halt(step, now);
        step.status = StepStatus::Pending;
    }

    procedure.status = ProcedureStatus::Completed;
    procedure.start_time.get_or_insert(now);
    procedure.end_time = Some(now);
    true
}

pub fn add_vitals(
    procedure: &mut ProcedureSession,
    request: VitalsRequest,
    recorded_by: Uuid,
    now: DateTime<Utc>,
) -> Result<Vitals, ProcedureError> {
    let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
    if blank(&request.pulse)
        && blank(&request.blood_pressure)
        && blank(&request.temperature)
        && blank(&request.remarks)
    {
        return Err(ProcedureError::ValidationError("Vitals entry is empty".to_string()));
    }

    let vitals = Vitals {
        pulse: request.pulse,
        blood_pressure: request.blood_pressure,
        temperature: request.temperature,
        remarks: request.remarks,
        recorded_at: now,
        recorded_by,
    };
    procedure.vitals.push(vitals.clone());
    Ok(vitals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn procedure(step_count: usize) -> ProcedureSession {
        let now = Utc::now();
        ProcedureSession {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            therapist_id: Uuid::new_v4(),
            session_id: None,
            therapy_type: "Abhyanga".to_string(),
            steps: (0..step_count)
                .map(|i| Step::new(&format!("Step {}", i + 1), None))
                .collect(),
            vitals: Vec::new(),
            status: ProcedureStatus::Pending,
            start_time: None,
            end_time: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    fn finish(p: &mut ProcedureSession, index: usize, at: DateTime<Utc>) {
        start_step(p, index, at).unwrap();
        complete_step(p, index, at + Duration::seconds(60)).unwrap();
    }

    #[test]
    fn progress_follows_completed_steps() {
        let t0 = Utc::now();
        let mut p = procedure(4);
        assert_eq!(p.progress(), 0);

        finish(&mut p, 0, t0);
        assert_eq!(p.progress(), 25);

        finish(&mut p, 1, t0);
        assert_eq!(p.progress(), 50);
        assert!(!p.all_steps_completed());
    }

    #[test]
    fn progress_rounds_and_handles_empty() {
        let t0 = Utc::now();
        assert_eq!(procedure(0).progress(), 0);

        let mut p = procedure(3);
        finish(&mut p, 0, t0);
        assert_eq!(p.progress(), 33);
        finish(&mut p, 1, t0);
        assert_eq!(p.progress(), 67);
    }

    #[test]
    fn elapsed_time_comes_from_timestamps() {
        let t0 = Utc::now();
        let mut p = procedure(2);

        start_step(&mut p, 0, t0).unwrap();
        assert_eq!(p.steps[0].live_elapsed(t0 + Duration::seconds(90)), 90);
        assert_eq!(p.status, ProcedureStatus::InProgress);
        assert_eq!(p.start_time, Some(t0));

        stop_or_reset_step(&mut p, 0, false, t0 + Duration::seconds(100)).unwrap();
        assert_eq!(p.steps[0].status, StepStatus::Pending);
        assert_eq!(p.steps[0].elapsed_seconds, 100);
        // a stopped step does not keep counting
        assert_eq!(p.steps[0].live_elapsed(t0 + Duration::seconds(500)), 100);

        // resuming continues from the stored value
        start_step(&mut p, 0, t0 + Duration::seconds(200)).unwrap();
        assert_eq!(p.steps[0].live_elapsed(t0 + Duration::seconds(230)), 130);
    }

    #[test]
    fn reset_zeroes_and_leaves_other_steps_alone() {
        let t0 = Utc::now();
        let mut p = procedure(3);
        finish(&mut p, 0, t0);

        start_step(&mut p, 1, t0).unwrap();
        stop_or_reset_step(&mut p, 1, true, t0 + Duration::seconds(45)).unwrap();

        assert_eq!(p.steps[1].status, StepStatus::Pending);
        assert_eq!(p.steps[1].elapsed_seconds, 0);
        assert_eq!(p.steps[1].started_at, None);
        assert_eq!(p.steps[0].status, StepStatus::Completed);
        assert_eq!(p.steps[0].elapsed_seconds, 60);
        assert_eq!(p.steps[2], Step::new("Step 3", None));
    }

    #[test]
    fn reset_reopens_a_completed_step() {
        let t0 = Utc::now();
        let mut p = procedure(1);
        finish(&mut p, 0, t0);

        stop_or_reset_step(&mut p, 0, true, t0).unwrap();
        assert_eq!(p.steps[0].status, StepStatus::Pending);
        assert_eq!(p.steps[0].elapsed_seconds, 0);
        assert_eq!(p.steps[0].completed_at, None);
    }

    #[test]
    fn invalid_transitions_are_refused() {
        let t0 = Utc::now();
        let mut p = procedure(2);

        assert_eq!(
            complete_step(&mut p, 0, t0),
            Err(ProcedureError::InvalidStepTransition { from: StepStatus::Pending, to: StepStatus::Completed })
        );

        finish(&mut p, 0, t0);
        assert_eq!(
            start_step(&mut p, 0, t0),
            Err(ProcedureError::InvalidStepTransition { from: StepStatus::Completed, to: StepStatus::InProgress })
        );
        assert!(stop_or_reset_step(&mut p, 0, false, t0).is_err());

        assert_eq!(
            start_step(&mut p, 5, t0),
            Err(ProcedureError::StepOutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn starting_a_running_step_is_a_no_op() {
        let t0 = Utc::now();
        let mut p = procedure(1);
        start_step(&mut p, 0, t0).unwrap();
        start_step(&mut p, 0, t0 + Duration::seconds(30)).unwrap();
        assert_eq!(p.steps[0].started_at, Some(t0));
    }

    #[test]
    fn completing_the_procedure_is_idempotent_and_freezes_steps() {
        let t0 = Utc::now();
        let mut p = procedure(2);
        start_step(&mut p, 1, t0).unwrap();

        assert!(complete_procedure(&mut p, t0 + Duration::seconds(20)));
        assert_eq!(p.status, ProcedureStatus::Completed);
        assert_eq!(p.end_time, Some(t0 + Duration::seconds(20)));
        assert_eq!(p.steps[1].status, StepStatus::Pending);
        assert_eq!(p.steps[1].elapsed_seconds, 20);

        assert!(!complete_procedure(&mut p, t0 + Duration::seconds(99)));
        assert_eq!(p.end_time, Some(t0 + Duration::seconds(20)));

        assert_eq!(start_step(&mut p, 0, t0), Err(ProcedureError::ProcedureCompleted));
        assert_eq!(stop_or_reset_step(&mut p, 0, true, t0), Err(ProcedureError::ProcedureCompleted));
    }

    #[test]
    fn vitals_are_appended_verbatim() {
        let t0 = Utc::now();
        let mut p = procedure(1);
        let nurse = Uuid::new_v4();

        let entry = add_vitals(
            &mut p,
            VitalsRequest { pulse: Some("72".into()), blood_pressure: Some("120/80".into()), ..Default::default() },
            nurse,
            t0,
        )
        .unwrap();
        assert_eq!(entry.recorded_by, nurse);
        assert_eq!(p.vitals.len(), 1);

        add_vitals(&mut p, VitalsRequest { temperature: Some("very warm".into()), ..Default::default() }, nurse, t0)
            .unwrap();
        assert_eq!(p.vitals[1].temperature.as_deref(), Some("very warm"));

        assert!(add_vitals(&mut p, VitalsRequest::default(), nurse, t0).is_err());
    }
}
