//! Stack-managed presentation states: menus, dialogs, transitions, combat
//! and the world itself. The stack owns the states; exactly one (the top)
//! receives input, every stacked state receives `update`.
//!
//! Lifecycle: `resume -> (update | process_event)* -> pause -> shutdown`.
//! A push pauses the previous top and defers the new state's `resume` to
//! the next update pass, so an action that pushes a state can still poke
//! at it in the same frame before it goes live.

pub mod combat;
pub mod dialog;
pub mod transition;

use std::any::Any;
use std::collections::VecDeque;

use bevy::prelude::*;

use crate::bus::GameEventBus;
use crate::clock::GameClock;
use crate::components::{GameRng, InputEvent};
use crate::db::ContentDb;
use crate::session::Session;

/// World access handed to states during `update`/`process_event`.
pub struct StateContext<'a> {
    pub session: &'a mut Session,
    pub db: &'a ContentDb,
    pub rng: &'a mut GameRng,
    pub clock: &'a GameClock,
    pub bus: &'a mut GameEventBus,
}

/// Deferred stack operations. States cannot touch the stack while it is
/// iterating them, so they record intents here; the stack applies them
/// after the pass.
#[derive(Default)]
pub struct StateSink {
    ops: Vec<StackOp>,
}

enum StackOp {
    Push(Box<dyn GameState>),
    Pop,
    Queue(Box<dyn GameState>),
}

impl StateSink {
    pub fn push(&mut self, state: Box<dyn GameState>) {
        self.ops.push(StackOp::Push(state));
    }

    pub fn pop(&mut self) {
        self.ops.push(StackOp::Pop);
    }

    pub fn queue(&mut self, state: Box<dyn GameState>) {
        self.ops.push(StackOp::Queue(state));
    }
}

pub trait GameState: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once before the state starts receiving updates, and again
    /// each time it becomes the top state after a pop above it.
    fn resume(&mut self) {}

    /// Called when another state is pushed on top, and before shutdown.
    fn pause(&mut self) {}

    fn update(&mut self, _dt: f32, _ctx: &mut StateContext, _sink: &mut StateSink) {}

    /// Input offered to the top state only. Return `None` to consume the
    /// event, or hand it back to let it fall through to the event engine.
    fn process_event(
        &mut self,
        input: InputEvent,
        _ctx: &mut StateContext,
        _sink: &mut StateSink,
    ) -> Option<InputEvent> {
        Some(input)
    }

    /// Called exactly once when the state leaves the stack.
    fn shutdown(&mut self) {}

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct StackEntry {
    state: Box<dyn GameState>,
    needs_resume: bool,
}

/// The state stack. Index 0 is the top.
#[derive(Resource, Default)]
pub struct StateStack {
    entries: Vec<StackEntry>,
    queued: VecDeque<Box<dyn GameState>>,
}

impl StateStack {
    /// Pause the current top and put `state` above it. The new state is
    /// resumed on the next update pass, not synchronously.
    pub fn push(&mut self, state: Box<dyn GameState>) {
        if let Some(top) = self.entries.first_mut() {
            top.state.pause();
        }
        self.entries.insert(
            0,
            StackEntry {
                state,
                needs_resume: true,
            },
        );
    }

    /// Pop the current state. A queued state consumes the pop as a
    /// replace, so the stack is never left without a current state in
    /// between. Popping an empty stack is a programming error.
    pub fn pop(&mut self) {
        if let Some(queued) = self.queued.pop_front() {
            self.replace(queued);
            return;
        }
        if self.entries.is_empty() {
            panic!("popped an empty state stack");
        }
        let mut top = self.entries.remove(0);
        top.state.pause();
        top.state.shutdown();
        if let Some(new_top) = self.entries.first_mut() {
            new_top.needs_resume = true;
        }
    }

    /// Replace the current state with `state`: a push followed by removal
    /// of the previous top, which gets `shutdown` only (push already
    /// paused it).
    pub fn replace(&mut self, state: Box<dyn GameState>) {
        self.push(state);
        if self.entries.len() > 1 {
            let mut previous = self.entries.remove(1);
            previous.state.shutdown();
        }
    }

    /// Defer a push until the next pop consumes it. Used to chain "pop the
    /// current state, then run this one" without an intermediate frame
    /// where nothing is current.
    pub fn queue(&mut self, state: Box<dyn GameState>) {
        self.queued.push_back(state);
    }

    /// Remove the first state with this name, wherever it sits. Removing
    /// the top is a plain pop; removing a buried state only shuts it down.
    /// Asking for a state that is not on the stack is a programming error.
    pub fn remove_named(&mut self, name: &str) {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.state.name() == name)
            .unwrap_or_else(|| panic!("removed state '{}' not on the stack", name));
        if index == 0 {
            self.pop();
        } else {
            let mut entry = self.entries.remove(index);
            entry.state.shutdown();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True while a queued state is waiting for the next pop.
    pub fn has_queued(&self) -> bool {
        !self.queued.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn current_name(&self) -> Option<&'static str> {
        self.entries.first().map(|entry| entry.state.name())
    }

    /// Downcast access to the first state of a concrete type, searching
    /// from the top.
    pub fn find_state_mut<T: GameState + 'static>(&mut self) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find_map(|entry| entry.state.as_any_mut().downcast_mut::<T>())
    }

    pub fn has_state<T: GameState + 'static>(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.state.as_any().is::<T>())
    }

    /// One cooperative frame: deliver the top state's pending resume, then
    /// update every state top-down, then apply whatever the states asked
    /// for. A buried state keeps its pending resume until it surfaces.
    pub fn update(&mut self, dt: f32, ctx: &mut StateContext) {
        let mut sink = StateSink::default();
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if index == 0 && entry.needs_resume {
                entry.needs_resume = false;
                entry.state.resume();
            }
            entry.state.update(dt, ctx, &mut sink);
        }
        self.apply(sink);
    }

    /// Offer one input event to the top state. Returns the event if the
    /// state declined it.
    pub fn process_event(
        &mut self,
        input: InputEvent,
        ctx: &mut StateContext,
    ) -> Option<InputEvent> {
        let mut sink = StateSink::default();
        let result = match self.entries.first_mut() {
            Some(top) => top.state.process_event(input, ctx, &mut sink),
            None => Some(input),
        };
        self.apply(sink);
        result
    }

    fn apply(&mut self, sink: StateSink) {
        for op in sink.ops {
            match op {
                StackOp::Push(state) => self.push(state),
                StackOp::Pop => self.pop(),
                StackOp::Queue(state) => self.queue(state),
            }
        }
    }
}

/// The base gameplay state: the overworld. Movement and map simulation
/// run as their own systems; this state exists so the stack always has a
/// current state and so input falls through to the event engine.
#[derive(Default)]
pub struct WorldState;

impl GameState for WorldState {
    fn name(&self) -> &'static str {
        "WorldState"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub struct StateStackPlugin;

impl Plugin for StateStackPlugin {
    fn build(&self, app: &mut App) {
        let mut stack = StateStack::default();
        stack.push(Box::new(WorldState));
        app.insert_resource(stack).add_systems(
            FixedUpdate,
            update_state_stack.before(crate::event::engine::run_event_engine),
        );
    }
}

fn update_state_stack(
    mut stack: ResMut<StateStack>,
    mut session: ResMut<Session>,
    db: Res<ContentDb>,
    mut rng: ResMut<GameRng>,
    clock: Res<GameClock>,
    mut bus: ResMut<GameEventBus>,
    time: Res<Time<Fixed>>,
) {
    let mut ctx = StateContext {
        session: &mut session,
        db: &db,
        rng: &mut rng,
        clock: &clock,
        bus: &mut bus,
    };
    stack.update(time.delta_secs(), &mut ctx);
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Counts lifecycle calls so tests can assert on them.
    pub struct ProbeState {
        pub label: &'static str,
        pub resumes: Arc<AtomicU32>,
        pub pauses: Arc<AtomicU32>,
        pub shutdowns: Arc<AtomicU32>,
    }

    impl ProbeState {
        pub fn new(label: &'static str) -> (Self, Arc<AtomicU32>, Arc<AtomicU32>, Arc<AtomicU32>) {
            let resumes = Arc::new(AtomicU32::new(0));
            let pauses = Arc::new(AtomicU32::new(0));
            let shutdowns = Arc::new(AtomicU32::new(0));
            (
                Self {
                    label,
                    resumes: resumes.clone(),
                    pauses: pauses.clone(),
                    shutdowns: shutdowns.clone(),
                },
                resumes,
                pauses,
                shutdowns,
            )
        }
    }

    impl GameState for ProbeState {
        fn name(&self) -> &'static str {
            self.label
        }

        fn resume(&mut self) {
            self.resumes.fetch_add(1, Ordering::SeqCst);
        }

        fn pause(&mut self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }

        fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    pub fn test_ctx_parts() -> (Session, ContentDb, GameRng, GameClock, GameEventBus) {
        use crate::components::GameConfig;
        let config = GameConfig {
            rng_seed: Some(1),
            ..GameConfig::default()
        };
        (
            Session::default(),
            ContentDb::default(),
            GameRng::from_config(&config),
            GameClock::new(&config),
            GameEventBus::default(),
        )
    }

    /// Run one stack update with throwaway world parts.
    pub fn pump(stack: &mut StateStack) {
        let (mut session, db, mut rng, clock, mut bus) = test_ctx_parts();
        let mut ctx = StateContext {
            session: &mut session,
            db: &db,
            rng: &mut rng,
            clock: &clock,
            bus: &mut bus,
        };
        stack.update(1.0 / 60.0, &mut ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{pump, ProbeState};
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn push_update_pop_scenario() {
        let mut stack = StateStack::default();
        let (a, a_resumes, a_pauses, _) = ProbeState::new("a");
        let (b, b_resumes, _, b_shutdowns) = ProbeState::new("b");

        stack.push(Box::new(a));
        stack.push(Box::new(b));
        assert_eq!(stack.current_name(), Some("b"));
        // Resume is deferred to the first update pass.
        assert_eq!(b_resumes.load(Ordering::SeqCst), 0);
        pump(&mut stack);
        assert_eq!(b_resumes.load(Ordering::SeqCst), 1);
        assert_eq!(a_pauses.load(Ordering::SeqCst), 1);

        let a_resumed_before = a_resumes.load(Ordering::SeqCst);
        stack.pop();
        pump(&mut stack);
        assert_eq!(stack.current_name(), Some("a"));
        assert_eq!(a_resumes.load(Ordering::SeqCst), a_resumed_before + 1);
        assert_eq!(b_shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "popped an empty state stack")]
    fn popping_an_empty_stack_panics() {
        let mut stack = StateStack::default();
        let (a, ..) = ProbeState::new("a");
        stack.push(Box::new(a));
        stack.pop();
        stack.pop();
    }

    #[test]
    fn queued_state_consumes_the_next_pop() {
        let mut stack = StateStack::default();
        let (base, ..) = ProbeState::new("base");
        let (top, _, _, top_shutdowns) = ProbeState::new("top");
        let (queued, queued_resumes, _, _) = ProbeState::new("queued");

        stack.push(Box::new(base));
        stack.push(Box::new(top));
        stack.queue(Box::new(queued));

        // The pop is consumed as a replace: "top" leaves, "queued" becomes
        // current, "base" is never exposed in between.
        stack.pop();
        assert_eq!(stack.current_name(), Some("queued"));
        assert_eq!(stack.len(), 2);
        assert_eq!(top_shutdowns.load(Ordering::SeqCst), 1);
        pump(&mut stack);
        assert_eq!(queued_resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removing_a_buried_state_only_shuts_it_down() {
        let mut stack = StateStack::default();
        let (base, base_resumes, _, base_shutdowns) = ProbeState::new("base");
        let (top, ..) = ProbeState::new("top");
        stack.push(Box::new(base));
        stack.push(Box::new(top));
        pump(&mut stack);

        let resumed_before = base_resumes.load(Ordering::SeqCst);
        stack.remove_named("base");
        assert_eq!(base_shutdowns.load(Ordering::SeqCst), 1);
        // The top state is untouched; no resume fires.
        assert_eq!(stack.current_name(), Some("top"));
        pump(&mut stack);
        assert_eq!(base_resumes.load(Ordering::SeqCst), resumed_before);
    }

    #[test]
    #[should_panic(expected = "not on the stack")]
    fn removing_a_missing_state_panics() {
        let mut stack = StateStack::default();
        let (a, ..) = ProbeState::new("a");
        stack.push(Box::new(a));
        stack.remove_named("ghost");
    }
}
