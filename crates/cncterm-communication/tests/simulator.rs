use cncterm_communication::{MachineSimulator, SimulationOutcome, ESTOP_REASON};
use cncterm_core::{MachineError, MachineState};
use cncterm_settings::MachineSettings;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn settings(steps: u32, interval_ms: u64) -> MachineSettings {
    MachineSettings {
        motion_steps: steps,
        step_interval_ms: interval_ms,
        ..MachineSettings::default()
    }
}

fn fast() -> MachineSimulator {
    MachineSimulator::new(&settings(3, 1))
}

fn slow() -> MachineSimulator {
    MachineSimulator::new(&settings(40, 10))
}

async fn wait_for_state(sim: &MachineSimulator, state: MachineState) {
    let mut rx = sim.watch_state();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == state))
        .await
        .expect("state not reached in time")
        .expect("state channel closed");
}

/// Start a move in the background and wait until it is running.
async fn start_move(
    sim: &MachineSimulator,
    line: &'static str,
    token: CancellationToken,
) -> tokio::task::JoinHandle<Result<SimulationOutcome, MachineError>> {
    let runner = sim.clone();
    let handle = tokio::spawn(async move { runner.execute(line, &token).await });
    wait_for_state(sim, MachineState::Run).await;
    handle
}

#[tokio::test]
async fn test_move_commits_target() {
    let sim = fast();
    let outcome = sim
        .execute("G1 X10 Y20 Z5 F300 S8000", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SimulationOutcome::Completed("Moved to X:10.00 Y:20.00 Z:5.00".to_string())
    );

    let status = sim.status();
    assert_eq!(status.position(), (10.0, 20.0, 5.0));
    assert_eq!(status.feed, 300.0);
    assert_eq!(status.speed, 8000.0);
    assert_eq!(status.state, MachineState::Idle);
}

#[tokio::test]
async fn test_omitted_axes_keep_current_position() {
    let sim = fast();
    let token = CancellationToken::new();
    sim.execute("G0 X10 Y20 Z5", &token).await.unwrap();
    sim.execute("G0 Y40", &token).await.unwrap();
    assert_eq!(sim.status().position(), (10.0, 40.0, 5.0));
}

#[tokio::test]
async fn test_soft_limit_raises_alarm_without_moving() {
    let sim = fast();
    let token = CancellationToken::new();
    sim.execute("G0 X100", &token).await.unwrap();

    let outcome = sim.execute("G0 X600", &token).await.unwrap();
    assert!(matches!(outcome, SimulationOutcome::Rejected(_)));

    let status = sim.status();
    assert_eq!(status.state, MachineState::Alarm);
    assert!(status.alarm.contains("X:600.00"));
    assert_eq!(status.position(), (100.0, 0.0, 0.0));
}

#[tokio::test]
async fn test_soft_limit_follows_parameter_changes() {
    let sim = fast();
    sim.set_parameter("X_MAX", 50.0).unwrap();
    let outcome = sim.execute("G0 X60", &CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, SimulationOutcome::Rejected(_)));
    assert_eq!(sim.state(), MachineState::Alarm);
}

#[tokio::test]
async fn test_soft_limits_disabled() {
    let sim = MachineSimulator::new(&MachineSettings {
        soft_limits: false,
        ..settings(2, 1)
    });
    let outcome = sim.execute("G0 X600", &CancellationToken::new()).await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(sim.status().x, 600.0);
}

#[tokio::test]
async fn test_estop_from_idle_and_reset() {
    let sim = fast();
    sim.emergency_stop();
    let status = sim.status();
    assert_eq!(status.state, MachineState::Alarm);
    assert_eq!(status.alarm, ESTOP_REASON);

    let outcome = sim.execute("G0 X10", &CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, SimulationOutcome::Rejected(_)));
    assert_eq!(sim.status().x, 0.0);

    let outcome = sim.execute("HOME", &CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, SimulationOutcome::Rejected(_)));

    assert!(sim.reset());
    assert_eq!(sim.state(), MachineState::Idle);
    assert!(sim.status().alarm.is_empty());
    assert!(!sim.reset());

    let outcome = sim.execute("G0 X10", &CancellationToken::new()).await.unwrap();
    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_estop_during_run_aborts_motion() {
    let sim = slow();
    let handle = start_move(&sim, "G0 X100", CancellationToken::new()).await;

    sim.emergency_stop();
    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, SimulationOutcome::Aborted(ESTOP_REASON.to_string()));
    assert_eq!(sim.status().position(), (0.0, 0.0, 0.0));
    assert_eq!(sim.state(), MachineState::Alarm);
}

#[tokio::test]
async fn test_estop_during_hold_aborts_motion() {
    let sim = slow();
    let handle = start_move(&sim, "G0 X100", CancellationToken::new()).await;

    assert_eq!(sim.feed_hold(), MachineState::Hold);
    sim.emergency_stop();

    let outcome = handle.await.unwrap().unwrap();
    assert!(matches!(outcome, SimulationOutcome::Aborted(_)));
    assert_eq!(sim.status().x, 0.0);
    assert_eq!(sim.state(), MachineState::Alarm);
}

#[tokio::test]
async fn test_feed_hold_toggles_and_resumes() {
    let sim = slow();
    let handle = start_move(&sim, "G0 X42", CancellationToken::new()).await;

    assert_eq!(sim.feed_hold(), MachineState::Hold);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sim.state(), MachineState::Hold);
    assert_eq!(sim.status().x, 0.0);

    assert_eq!(sim.feed_hold(), MachineState::Run);
    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.is_completed());
    assert_eq!(sim.status().x, 42.0);
    assert_eq!(sim.state(), MachineState::Idle);
}

#[tokio::test]
async fn test_feed_hold_is_noop_when_idle_or_alarm() {
    let sim = fast();
    assert_eq!(sim.feed_hold(), MachineState::Idle);

    sim.emergency_stop();
    assert_eq!(sim.feed_hold(), MachineState::Alarm);
}

#[tokio::test]
async fn test_cancel_leaves_position_unchanged() {
    let sim = slow();
    let token = CancellationToken::new();
    let handle = start_move(&sim, "G0 X100 Y100", token.clone()).await;

    token.cancel();
    let result = handle.await.unwrap();
    assert_eq!(result, Err(MachineError::Cancelled));
    assert_eq!(sim.status().position(), (0.0, 0.0, 0.0));
    assert_eq!(sim.state(), MachineState::Idle);
}

#[tokio::test]
async fn test_dropped_move_returns_to_idle() {
    let sim = slow();
    let token = CancellationToken::new();

    let elapsed = tokio::time::timeout(Duration::from_millis(50), sim.execute("G0 X100", &token)).await;
    assert!(elapsed.is_err());
    assert_eq!(sim.state(), MachineState::Idle);
    assert_eq!(sim.status().position(), (0.0, 0.0, 0.0));
    assert_eq!(sim.feed_hold(), MachineState::Idle);

    let outcome = sim.execute("G0 X1", &token).await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(sim.status().x, 1.0);
}

#[tokio::test]
async fn test_cancel_while_held() {
    let sim = slow();
    let token = CancellationToken::new();
    let handle = start_move(&sim, "G0 X100", token.clone()).await;

    sim.feed_hold();
    token.cancel();
    assert_eq!(handle.await.unwrap(), Err(MachineError::Cancelled));
    assert_eq!(sim.state(), MachineState::Idle);
}

#[tokio::test]
async fn test_builtin_macros() {
    let sim = fast();
    let token = CancellationToken::new();
    sim.execute("G0 X10 Y10 Z10", &token).await.unwrap();

    let outcome = sim.execute("home", &token).await.unwrap();
    assert_eq!(outcome, SimulationOutcome::Completed("Homing complete".to_string()));
    assert_eq!(sim.status().position(), (0.0, 0.0, 0.0));

    sim.execute("G0 X5", &token).await.unwrap();
    let outcome = sim.execute("ZERO", &token).await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(sim.status().position(), (0.0, 0.0, 0.0));

    let outcome = sim.execute("DANCE", &token).await.unwrap();
    assert_eq!(outcome, SimulationOutcome::Rejected("Unknown command: DANCE".to_string()));
}

#[tokio::test]
async fn test_configured_macro_runs_lines_in_order() {
    let sim = fast();
    let token = CancellationToken::new();
    sim.execute("G0 X50 Y50 Z10", &token).await.unwrap();

    let outcome = sim.execute("park", &token).await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(sim.status().position(), (0.0, 0.0, 90.0));
}

#[tokio::test]
async fn test_configured_macro_stops_at_alarm() {
    let mut machine = settings(2, 1);
    machine.macros.insert(
        "RUNAWAY".to_string(),
        vec!["G0 X600".to_string(), "G0 Y10".to_string()],
    );
    let sim = MachineSimulator::new(&machine);

    let outcome = sim.execute("RUNAWAY", &CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, SimulationOutcome::Rejected(_)));
    assert_eq!(sim.status().y, 0.0);
}

#[tokio::test]
async fn test_temperature_stays_in_band() {
    let sim = fast();
    let token = CancellationToken::new();
    for _ in 0..10 {
        sim.execute("G1 X400 S12000", &token).await.unwrap();
        sim.execute("G1 X0", &token).await.unwrap();
    }
    let hot = sim.status().temp;
    assert!(hot > 35.0 && hot <= 55.0);

    for _ in 0..500 {
        sim.sample_status();
    }
    let cooled = sim.status().temp;
    assert!(cooled >= 32.0 && cooled < hot);
}
