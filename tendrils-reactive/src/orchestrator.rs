//! Tick orchestrator - the per-frame sequence
//!
//! Each tick: draw the simulation, age out and advance the flow feedback,
//! apply finished acquisitions, run the decision cascade and dispatch its
//! action. An optional sweep respawns from the camera on a fixed interval.

use crate::cascade::{Action, Decision, DecisionCascade};
use crate::flow::{flow_window, FlowFeedback};
use crate::session::Session;
use crate::simulation::Simulation;
use tracing::{debug, info};

/// Default extra age granted to flow input beyond `1 / flow_decay`
pub const DEFAULT_FLOW_MARGIN: f32 = 100.0;

/// Fires camera respawns every `interval` of simulation time
#[derive(Debug, Clone, Copy, PartialEq)]
struct CameraSweep {
    interval: f32,
    next_at: Option<f32>,
}

impl CameraSweep {
    fn due(&mut self, now: f32) -> bool {
        match self.next_at {
            None => {
                self.next_at = Some(now + self.interval);
                false
            }
            Some(at) if now >= at => {
                self.next_at = Some(now + self.interval);
                true
            }
            Some(_) => false,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Rule that fired, if any
    pub decision: Option<Decision>,
    /// Whether the decision's action reached the simulation
    pub dispatched: bool,
    /// Whether the periodic camera sweep fired
    pub swept: bool,
    /// Flow entries aged out this tick
    pub trimmed: usize,
}

pub struct TickOrchestrator {
    cascade: DecisionCascade,
    flow_margin: f32,
    sweep: Option<CameraSweep>,
    ticks: u64,
}

impl TickOrchestrator {
    pub fn new(cascade: DecisionCascade) -> Self {
        Self {
            cascade,
            flow_margin: DEFAULT_FLOW_MARGIN,
            sweep: None,
            ticks: 0,
        }
    }

    pub fn with_flow_margin(mut self, margin: f32) -> Self {
        self.flow_margin = margin;
        self
    }

    /// Respawn from the camera every `interval`; zero or less disables it
    pub fn with_camera_sweep(mut self, interval: f32) -> Self {
        self.sweep = (interval > 0.0 && interval.is_finite()).then_some(CameraSweep {
            interval,
            next_at: None,
        });
        self
    }

    pub fn cascade(&self) -> &DecisionCascade {
        &self.cascade
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one render tick
    pub fn tick<S, F>(
        &mut self,
        session: &mut Session,
        simulation: &mut S,
        flow: &mut F,
    ) -> TickReport
    where
        S: Simulation + ?Sized,
        F: FlowFeedback + ?Sized,
    {
        self.ticks += 1;
        simulation.draw();

        // Window follows live flow decay, never cached
        let max_age = flow_window(simulation.flow_decay(), self.flow_margin);
        let trimmed = flow.trim_old(max_age, simulation.time());
        flow.update();

        session.poll();

        let decision = self.cascade.run(session, simulation.dt());
        let dispatched = match &decision {
            Some(d) => {
                info!(
                    source = %d.source,
                    rule = self.cascade.label(d),
                    action = ?d.action,
                    value = d.value,
                    "reacting"
                );
                dispatch(d.action, session, simulation)
            }
            None => false,
        };

        let now = simulation.time();
        let swept = self.sweep.as_mut().is_some_and(|sweep| sweep.due(now))
            && dispatch(Action::RespawnFromCamera, session, simulation);

        TickReport {
            decision,
            dispatched,
            swept,
            trimmed,
        }
    }
}

/// Forward an action to the simulation, returning whether it was applied
fn dispatch<S>(action: Action, session: &mut Session, simulation: &mut S) -> bool
where
    S: Simulation + ?Sized,
{
    match action {
        Action::RespawnFromCamera => match session.camera_frame() {
            Some(frame) => {
                simulation.respawn_from_camera(frame);
                true
            }
            None => {
                debug!("no camera frame yet, skipping camera respawn");
                false
            }
        },
        Action::RespawnFromFlow => {
            simulation.respawn_from_flow();
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::Policy;
    use crate::flow::FlowLine;
    use crate::session::tests::still_camera;
    use crate::simulation::VideoFrame;
    use crate::source::tests::ready_bridge;
    use crate::source::{Acquired, AcquisitionError, Acquisition, SourceId, SourcePhase};
    use tendrils_analysis::OrderLogLayout;

    /// Simulation double that records every command
    #[derive(Default)]
    struct RecordingSimulation {
        time: f32,
        dt: f32,
        flow_decay: f32,
        draws: usize,
        camera_respawns: usize,
        flow_respawns: usize,
        clears: usize,
    }

    impl RecordingSimulation {
        fn new(dt: f32) -> Self {
            Self {
                dt,
                flow_decay: 0.001,
                ..Default::default()
            }
        }
    }

    impl Simulation for RecordingSimulation {
        fn time(&self) -> f32 {
            self.time
        }
        fn dt(&self) -> f32 {
            self.dt
        }
        fn flow_decay(&self) -> f32 {
            self.flow_decay
        }
        fn draw(&mut self) {
            self.draws += 1;
            self.time += self.dt;
        }
        fn respawn_from_camera(&mut self, _frame: &VideoFrame) {
            self.camera_respawns += 1;
        }
        fn respawn_from_flow(&mut self) {
            self.flow_respawns += 1;
        }
        fn clear(&mut self) {
            self.clears += 1;
        }
    }

    fn orchestrator(layout: OrderLogLayout, fallback_only: bool) -> TickOrchestrator {
        let policy = Policy::default().with_microphone_fallback_only(fallback_only);
        TickOrchestrator::new(DecisionCascade::new(policy, layout, layout).unwrap())
    }

    #[test]
    fn test_unready_microphone_across_many_ticks() {
        let layout = OrderLogLayout::new(1);
        let mut orchestrator = orchestrator(layout, true);
        let mut session = Session::new(layout, layout);
        session.track = ready_bridge(SourceId::Track, 1, vec![vec![0.0; 16]]);
        session.request(
            SourceId::Microphone,
            Acquisition::resolved(Acquired::Failed(AcquisitionError::Denied("no".into()))),
        );
        let mut sim = RecordingSimulation::new(16.0);
        let mut flow = FlowLine::new();

        for _ in 0..1000 {
            let report = orchestrator.tick(&mut session, &mut sim, &mut flow);
            assert_eq!(report.decision, None);
        }

        assert_eq!(session.microphone.phase(), SourcePhase::Unready);
        assert_eq!(sim.draws, 1000);
        assert_eq!(sim.camera_respawns + sim.flow_respawns, 0);
        assert_eq!(orchestrator.ticks(), 1000);
    }

    #[test]
    fn test_acquisition_completing_mid_run() {
        let layout = OrderLogLayout::new(1);
        let mut orchestrator = orchestrator(layout, false);
        let mut session = Session::new(layout, layout);
        let (tx, acquisition) = Acquisition::channel();
        session.request(SourceId::Track, acquisition);
        let mut sim = RecordingSimulation::new(1.0);
        let mut flow = FlowLine::new();

        for _ in 0..50 {
            orchestrator.tick(&mut session, &mut sim, &mut flow);
            assert_eq!(session.track.phase(), SourcePhase::Acquiring);
        }

        let analyser = crate::source::tests::ScriptedAnalyser::boxed(vec![
            vec![0.0; 4],
            vec![0.0; 4],
            vec![50.0; 4],
        ]);
        tx.send(Acquired::Ready(analyser)).unwrap();

        // Ready on the next tick; rates need two captures, the jump a third
        let reports: Vec<TickReport> = (0..3)
            .map(|_| orchestrator.tick(&mut session, &mut sim, &mut flow))
            .collect();
        assert!(session.track.is_ready());
        assert_eq!(reports[0].decision, None);
        assert_eq!(reports[1].decision, None);
        let fired = reports[2].decision.as_ref().unwrap();
        assert_eq!(fired.action, Action::RespawnFromCamera);
        // No camera attached: decided but not dispatched
        assert!(!reports[2].dispatched);
        assert_eq!(sim.camera_respawns, 0);
    }

    #[test]
    fn test_camera_respawn_dispatch() {
        let layout = OrderLogLayout::new(1);
        let mut orchestrator = orchestrator(layout, true);
        let mut session = Session::new(layout, layout);
        session.track = ready_bridge(SourceId::Track, 1, vec![vec![0.0; 4], vec![50.0; 4]]);
        session.request_camera(still_camera());
        let mut sim = RecordingSimulation::new(1.0);
        let mut flow = FlowLine::new();

        orchestrator.tick(&mut session, &mut sim, &mut flow);
        let report = orchestrator.tick(&mut session, &mut sim, &mut flow);

        assert!(report.dispatched);
        assert_eq!(sim.camera_respawns, 1);
    }

    #[test]
    fn test_flow_trim_follows_live_decay() {
        let layout = OrderLogLayout::new(1);
        let mut orchestrator = orchestrator(layout, true).with_flow_margin(100.0);
        let mut session = Session::new(layout, layout);
        let mut sim = RecordingSimulation::new(100.0);
        let mut flow = FlowLine::new();
        flow.push(0.0, [0.0, 0.0]);
        flow.push(500.0, [0.1, 0.1]);

        // Decay 0 never trims
        sim.flow_decay = 0.0;
        sim.time = 10_000.0;
        assert_eq!(orchestrator.tick(&mut session, &mut sim, &mut flow).trimmed, 0);

        // Window 1/0.01 + 100 = 200 at t = 10200
        sim.flow_decay = 0.01;
        let report = orchestrator.tick(&mut session, &mut sim, &mut flow);
        assert_eq!(report.trimmed, 2);
        assert!(flow.is_empty());
        assert_eq!(flow.updates(), 2);
    }

    #[test]
    fn test_camera_sweep() {
        let layout = OrderLogLayout::new(1);
        let mut orchestrator = orchestrator(layout, true).with_camera_sweep(500.0);
        let mut session = Session::new(layout, layout);
        session.request_camera(still_camera());
        let mut sim = RecordingSimulation::new(100.0);
        let mut flow = FlowLine::new();

        let swept: usize = (0..20)
            .map(|_| orchestrator.tick(&mut session, &mut sim, &mut flow).swept as usize)
            .sum();

        // 2000 ms of simulation time, first due 500 ms after the first tick
        assert_eq!(swept, 3);
        assert_eq!(sim.camera_respawns, 3);
    }

    #[test]
    fn test_sweep_without_camera_is_skipped_but_rearmed() {
        let layout = OrderLogLayout::new(1);
        let mut orchestrator = orchestrator(layout, true).with_camera_sweep(500.0);
        let mut session = Session::new(layout, layout);
        let mut sim = RecordingSimulation::new(100.0);
        let mut flow = FlowLine::new();

        for _ in 0..10 {
            assert!(!orchestrator.tick(&mut session, &mut sim, &mut flow).swept);
        }
        // Still armed for the next interval once a camera shows up
        session.request_camera(still_camera());
        let swept: usize = (0..10)
            .map(|_| orchestrator.tick(&mut session, &mut sim, &mut flow).swept as usize)
            .sum();
        assert_eq!(swept, 2);
        assert_eq!(sim.camera_respawns, 2);
    }

    #[test]
    fn test_disabled_sweep() {
        let layout = OrderLogLayout::new(1);
        let orchestrator = orchestrator(layout, true).with_camera_sweep(0.0);
        assert!(orchestrator.sweep.is_none());
    }

    #[test]
    fn test_restart_clears_simulation_and_history() {
        let layout = OrderLogLayout::new(1);
        let mut session = Session::new(layout, layout);
        session.track = ready_bridge(SourceId::Track, 1, vec![vec![1.0; 2]]);
        session.track.capture_tick(1.0);
        let mut sim = RecordingSimulation::new(1.0);

        session.restart(&mut sim);

        assert_eq!(sim.clears, 1);
        assert!(session.track.order_log().unwrap().raw().is_empty());
    }
}
