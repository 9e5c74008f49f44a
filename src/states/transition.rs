//! Timed screen fade. Fades to full opacity, reports its apex for one
//! frame window, then fades back in and pops itself. Teleports started
//! during a transition are applied by the engine exactly at the apex, so
//! the player never sees the map swap.

use std::any::Any;

use crate::components::InputEvent;
use crate::states::{GameState, StateContext, StateSink};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum FadePhase {
    Out,
    In,
}

pub struct FadeTransitionState {
    duration: f32,
    elapsed: f32,
    phase: FadePhase,
    apex_announced: bool,
}

impl FadeTransitionState {
    /// `duration` is the fade-out time; the fade-in takes the same again.
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.01),
            elapsed: 0.0,
            phase: FadePhase::Out,
            apex_announced: false,
        }
    }

    /// True once the screen is fully opaque. Deferred teleports fire here.
    pub fn at_apex(&self) -> bool {
        self.phase == FadePhase::In
    }

    /// Screen opacity in [0, 1] for the renderer.
    pub fn opacity(&self) -> f32 {
        let t = (self.elapsed / self.duration).clamp(0.0, 1.0);
        match self.phase {
            FadePhase::Out => t,
            FadePhase::In => 1.0 - t,
        }
    }
}

impl GameState for FadeTransitionState {
    fn name(&self) -> &'static str {
        "FadeTransitionState"
    }

    fn update(&mut self, dt: f32, ctx: &mut StateContext, sink: &mut StateSink) {
        self.elapsed += dt;
        match self.phase {
            FadePhase::Out => {
                if self.elapsed >= self.duration {
                    self.phase = FadePhase::In;
                    self.elapsed = 0.0;
                }
            }
            FadePhase::In => {
                if !self.apex_announced {
                    self.apex_announced = true;
                    ctx.bus
                        .emit("transition_apex", serde_json::Value::Null, None);
                }
                if self.elapsed >= self.duration {
                    ctx.session.in_transition = false;
                    ctx.bus
                        .emit("transition_finished", serde_json::Value::Null, None);
                    sink.pop();
                }
            }
        }
    }

    fn process_event(
        &mut self,
        _input: InputEvent,
        _ctx: &mut StateContext,
        _sink: &mut StateSink,
    ) -> Option<InputEvent> {
        // Controls are locked while the screen fades.
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::test_support::test_ctx_parts;
    use crate::states::StateStack;

    fn pump(stack: &mut StateStack, dt: f32) {
        let (mut session, db, mut rng, clock, mut bus) = test_ctx_parts();
        let mut ctx = StateContext {
            session: &mut session,
            db: &db,
            rng: &mut rng,
            clock: &clock,
            bus: &mut bus,
        };
        stack.update(dt, &mut ctx);
    }

    #[test]
    fn fade_reaches_apex_then_pops() {
        let mut stack = StateStack::default();
        stack.push(Box::new(crate::states::WorldState));
        stack.push(Box::new(FadeTransitionState::new(0.2)));

        pump(&mut stack, 0.1);
        assert!(!stack
            .find_state_mut::<FadeTransitionState>()
            .unwrap()
            .at_apex());

        pump(&mut stack, 0.15);
        assert!(stack
            .find_state_mut::<FadeTransitionState>()
            .unwrap()
            .at_apex());

        pump(&mut stack, 0.25);
        assert_eq!(stack.current_name(), Some("WorldState"));
    }

    #[test]
    fn opacity_rises_then_falls() {
        let mut fade = FadeTransitionState::new(1.0);
        assert_eq!(fade.opacity(), 0.0);
        fade.elapsed = 0.5;
        assert!((fade.opacity() - 0.5).abs() < 1e-6);
        fade.phase = FadePhase::In;
        fade.elapsed = 0.25;
        assert!((fade.opacity() - 0.75).abs() < 1e-6);
    }
}
