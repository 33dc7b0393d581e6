//! Incremental turtle-graphics interpretation of a grammar production.
//!
//! ## Symbols
//!
//! | Symbol  | Effect                                                        |
//! |---------|---------------------------------------------------------------|
//! | `F`     | draw `draw_length` along the heading, reset the multiplier    |
//! | `+`     | `heading += theta * multiplier`, reset the multiplier         |
//! | `-`     | `heading -= theta * multiplier`, reset the multiplier         |
//! | `[`     | push a copy of the pose                                       |
//! | `]`     | pop and restore the pose; ignored (and counted) when empty    |
//! | `0`-`9` | multiplier for the next turn                                  |
//!
//! Anything else is inert. Symbols are addressed by byte offset into the
//! production, which is how the cursor counts steps.
//!
//! Three entry points share [`TurtleState::apply`], so they cannot drift apart:
//! [`interpret`] (full, emitting), [`replay`] (state only, for a cold restart)
//! and [`TurtleInterpreter::advance`] (keeps the state at its cursor and only
//! walks the new symbols).

use std::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::{GeometryBuffer, LineSegment};
use crate::grammar::{GrammarEngine, DRAW, POP, PUSH, TURN_LEFT, TURN_RIGHT};
use crate::math::Point2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurtlePose {
    pub position: Point2,
    pub heading: f64,
}

/// Origin and starting heading supplied by whoever drives the interpreter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub position: Point2,
    pub rotation: f64,
}

impl Location {
    pub fn new(position: Point2, rotation: f64) -> Self {
        Location { position, rotation }
    }

    pub fn pose(&self) -> TurtlePose {
        TurtlePose { position: self.position, heading: self.rotation }
    }
}

/// Location handle shared between interpreters that live in one rotating frame.
/// Interpreters never read it themselves; the driver snapshots it per call.
pub type SharedLocation = Arc<Mutex<Location>>;

pub fn shared_location(location: Location) -> SharedLocation {
    Arc::new(Mutex::new(location))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn start_width(&self) -> f32 {
        match self {
            Theme::Dark => 0.01,
            Theme::Light => 0.99,
        }
    }

    /// Width change applied after every drawn segment.
    pub fn width_step(&self) -> f32 {
        match self {
            Theme::Dark => 0.01,
            Theme::Light => -0.01,
        }
    }

    /// 1.0 for dark, 0.0 for light; feeds the line shading.
    pub fn color(&self) -> f32 {
        match self {
            Theme::Dark => 1.0,
            Theme::Light => 0.0,
        }
    }

    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Per-production constants the turtle needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurtleConfig {
    pub draw_length: f64,
    pub theta: f64,
    pub theme: Theme,
}

impl TurtleConfig {
    pub fn from_engine(engine: &GrammarEngine, theme: Theme) -> Self {
        TurtleConfig { draw_length: engine.draw_length(), theta: engine.theta(), theme }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurtleState {
    pub pose: TurtlePose,
    pub stack: Vec<TurtlePose>,
    pub repeat: u32,
    pub width: f32,
    /// `]` symbols seen while the stack was empty.
    pub unmatched_pops: usize,
}

impl TurtleState {
    pub fn new(origin: Location, theme: Theme) -> Self {
        TurtleState {
            pose: origin.pose(),
            stack: Vec::new(),
            repeat: 1,
            width: theme.start_width(),
            unmatched_pops: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Executes one symbol, returning the segment it draws, if any.
    pub fn apply(&mut self, symbol: char, config: &TurtleConfig) -> Option<LineSegment> {
        match symbol {
            DRAW => {
                let start = self.pose.position;
                let end = start.step(self.pose.heading, config.draw_length);
                let segment = LineSegment::new(start, end, self.width);
                self.pose.position = end;
                self.repeat = 1;
                self.width += config.theme.width_step();
                return Some(segment);
            }
            TURN_LEFT => {
                self.pose.heading += config.theta * f64::from(self.repeat);
                self.repeat = 1;
            }
            TURN_RIGHT => {
                self.pose.heading -= config.theta * f64::from(self.repeat);
                self.repeat = 1;
            }
            PUSH => self.stack.push(self.pose),
            POP => match self.stack.pop() {
                Some(pose) => self.pose = pose,
                None => {
                    self.unmatched_pops += 1;
                    debug!(unmatched = self.unmatched_pops, "pop on empty turtle stack ignored");
                }
            },
            '0'..='9' => {
                self.repeat = symbol.to_digit(10).unwrap_or(1);
            }
            _ => {}
        }
        None
    }
}

fn clamp_steps(production: &str, steps: usize) -> usize {
    steps.min(production.len())
}

/// Interprets `production[..steps]` from a fresh pose, emitting every segment.
pub fn interpret(
    production: &str,
    steps: usize,
    origin: Location,
    config: &TurtleConfig,
) -> (TurtleState, Vec<LineSegment>) {
    let steps = clamp_steps(production, steps);
    let mut state = TurtleState::new(origin, config.theme);
    let mut segments = Vec::new();
    for &symbol in &production.as_bytes()[..steps] {
        if let Some(segment) = state.apply(char::from(symbol), config) {
            segments.push(segment);
        }
    }
    (state, segments)
}

/// Rebuilds the turtle state reached after `production[..steps]` without emitting.
pub fn replay(
    production: &str,
    steps: usize,
    origin: Location,
    config: &TurtleConfig,
) -> TurtleState {
    let steps = clamp_steps(production, steps);
    let mut state = TurtleState::new(origin, config.theme);
    for &symbol in &production.as_bytes()[..steps] {
        state.apply(char::from(symbol), config);
    }
    state
}

/// Walks a production a step budget at a time, appending only new geometry.
#[derive(Clone, Debug)]
pub struct TurtleInterpreter {
    theme: Theme,
    buffer: GeometryBuffer,
    /// State at `buffer.cursor()`; `None` until the first advance after a reset.
    state: Option<TurtleState>,
}

impl TurtleInterpreter {
    pub fn new(theme: Theme) -> Self {
        TurtleInterpreter { theme, buffer: GeometryBuffer::new(), state: None }
    }

    /// Resumes from a buffer built earlier for the same production and origin by
    /// replaying `0..buffer.cursor()` silently.
    pub fn resume(
        theme: Theme,
        engine: &GrammarEngine,
        origin: Location,
        buffer: GeometryBuffer,
    ) -> Self {
        let config = TurtleConfig::from_engine(engine, theme);
        let state = replay(engine.production(), buffer.cursor(), origin, &config);
        TurtleInterpreter { theme, buffer, state: Some(state) }
    }

    /// Moves the cursor to `target` (clamped to the production length) and returns
    /// the segments drawn on the way. Never rewinds: a target at or behind the
    /// cursor is a no-op, use [`TurtleInterpreter::reset`] to start over.
    ///
    /// `origin` is only consulted when starting from cursor 0.
    pub fn advance(
        &mut self,
        engine: &GrammarEngine,
        origin: Location,
        target: usize,
    ) -> &[LineSegment] {
        let production = engine.production();
        let cursor = self.buffer.cursor();
        let target = clamp_steps(production, target);
        if target <= cursor {
            return &[];
        }

        let config = TurtleConfig::from_engine(engine, self.theme);
        let theme = self.theme;
        let state = self.state.get_or_insert_with(|| TurtleState::new(origin, theme));
        let first = self.buffer.len();
        for &symbol in &production.as_bytes()[cursor..target] {
            if let Some(segment) = state.apply(char::from(symbol), &config) {
                self.buffer.push(segment);
            }
        }
        self.buffer.set_cursor(target);

        debug!(cursor = target, total = production.len(), new_segments = self.buffer.len() - first, "turtle advanced");
        self.buffer.since(first)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = None;
    }

    /// Width evolution depends on the theme, so switching it starts over.
    pub fn set_theme(&mut self, theme: Theme) {
        if theme != self.theme {
            self.theme = theme;
            self.reset();
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn buffer(&self) -> &GeometryBuffer {
        &self.buffer
    }

    pub fn state(&self) -> Option<&TurtleState> {
        self.state.as_ref()
    }

    pub fn cursor(&self) -> usize {
        self.buffer.cursor()
    }

    pub fn is_complete(&self, engine: &GrammarEngine) -> bool {
        self.cursor() >= engine.len()
    }

    /// `(cursor, total)` for "step X of Y" displays.
    pub fn progress(&self, engine: &GrammarEngine) -> (usize, usize) {
        (self.cursor(), engine.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use crate::math::{normalize_angle, to_degrees};

    fn koch_engine() -> GrammarEngine {
        let mut engine = GrammarEngine::new(Grammar::new("F", &[('F', "F+F--F+F")], 60.0, 1.0, 1.0));
        engine.expand(1);
        engine
    }

    fn engine_for(production_axiom: &str) -> GrammarEngine {
        GrammarEngine::new(Grammar::new(production_axiom, &[], 90.0, 1.0, 1.0))
    }

    #[test]
    fn koch_headings_follow_turns() {
        let engine = koch_engine();
        let config = TurtleConfig::from_engine(&engine, Theme::Dark);
        let (_, segments) = interpret(engine.production(), engine.len(), Location::default(), &config);

        let headings: Vec<i64> = segments
            .iter()
            .map(|s| to_degrees(normalize_angle(s.heading())).round() as i64)
            .collect();
        assert_eq!(headings, vec![0, 60, -60, 0]);
        assert!(segments.iter().all(|s| (s.length() - 1.0).abs() < 1e-12));
        assert_eq!(segments[0].start, Point2::ORIGIN);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn brackets_restore_origin_between_branches() {
        let mut engine = GrammarEngine::new(Grammar::new("[X]++[X]", &[('X', "F")], 36.0, 1.0, 1.0));
        engine.expand(1);
        assert_eq!(engine.production(), "[F]++[F]");

        let config = TurtleConfig::from_engine(&engine, Theme::Dark);
        let after_first = replay(engine.production(), 3, Location::default(), &config);
        assert_eq!(after_first.depth(), 0);
        assert_eq!(after_first.pose, Location::default().pose());

        let (end, segments) = interpret(engine.production(), engine.len(), Location::default(), &config);
        assert_eq!(end.depth(), 0);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].start, Point2::ORIGIN);
        assert!((segments[1].heading() - 2.0 * config.theta).abs() < 1e-12);
    }

    #[test]
    fn pop_on_empty_stack_is_ignored() {
        let engine = engine_for("]F");
        let config = TurtleConfig::from_engine(&engine, Theme::Dark);
        let (state, segments) = interpret(engine.production(), 2, Location::default(), &config);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, Point2::ORIGIN);
        assert_eq!(state.unmatched_pops, 1);
    }

    #[test]
    fn digit_multiplies_only_the_next_turn() {
        let engine = engine_for("3+F+F");
        let config = TurtleConfig::from_engine(&engine, Theme::Dark);
        let (state, segments) = interpret(engine.production(), engine.len(), Location::default(), &config);
        assert!((segments[0].heading() - normalize_angle(3.0 * config.theta)).abs() < 1e-12);
        assert!((state.pose.heading - 4.0 * config.theta).abs() < 1e-12);
        assert_eq!(state.repeat, 1);
    }

    #[test]
    fn draw_resets_pending_multiplier() {
        let engine = engine_for("2F+");
        let config = TurtleConfig::from_engine(&engine, Theme::Dark);
        let state = replay(engine.production(), engine.len(), Location::default(), &config);
        assert!((state.pose.heading - config.theta).abs() < 1e-12);
    }

    #[test]
    fn width_evolves_with_theme() {
        let engine = engine_for("FFF");
        let dark = TurtleConfig::from_engine(&engine, Theme::Dark);
        let light = TurtleConfig::from_engine(&engine, Theme::Light);
        let (_, d) = interpret(engine.production(), 3, Location::default(), &dark);
        let (_, l) = interpret(engine.production(), 3, Location::default(), &light);
        for (seg, expected) in d.iter().zip([0.01, 0.02, 0.03]) {
            assert!((seg.width - expected).abs() < 1e-6);
        }
        assert!((l[2].width - 0.97).abs() < 1e-6);
    }

    #[test]
    fn advance_is_incremental_and_matches_full_run() {
        let mut engine = GrammarEngine::new(Grammar::penrose());
        engine.expand(3);
        let config = TurtleConfig::from_engine(&engine, Theme::Dark);
        let (full_state, full) = interpret(engine.production(), engine.len(), Location::default(), &config);

        let mut turtle = TurtleInterpreter::new(Theme::Dark);
        let mut collected = Vec::new();
        let mut target = 0;
        while !turtle.is_complete(&engine) {
            target += 24;
            collected.extend_from_slice(turtle.advance(&engine, Location::default(), target));
        }
        assert_eq!(collected, full);
        assert_eq!(turtle.buffer().all(), full.as_slice());
        assert_eq!(turtle.state(), Some(&full_state));
    }

    #[test]
    fn advance_to_cursor_is_a_noop() {
        let engine = koch_engine();
        let mut turtle = TurtleInterpreter::new(Theme::Dark);
        turtle.advance(&engine, Location::default(), 3);
        let before = turtle.state().cloned();
        assert!(turtle.advance(&engine, Location::default(), 3).is_empty());
        assert!(turtle.advance(&engine, Location::default(), 1).is_empty());
        assert_eq!(turtle.state().cloned(), before);
        assert_eq!(turtle.cursor(), 3);
    }

    #[test]
    fn advance_clamps_to_production_length() {
        let engine = koch_engine();
        let mut turtle = TurtleInterpreter::new(Theme::Dark);
        assert_eq!(turtle.advance(&engine, Location::default(), 10_000).len(), 4);
        assert_eq!(turtle.progress(&engine), (8, 8));
    }

    #[test]
    fn empty_production_yields_nothing() {
        let engine = engine_for("");
        let mut turtle = TurtleInterpreter::new(Theme::Dark);
        assert!(turtle.advance(&engine, Location::default(), 5).is_empty());
        assert_eq!(turtle.cursor(), 0);
    }

    #[test]
    fn origin_is_fixed_after_first_advance() {
        let engine = koch_engine();
        let origin = Location::new(Point2::new(5.0, -2.0), 0.0);
        let mut turtle = TurtleInterpreter::new(Theme::Dark);
        let first = turtle.advance(&engine, origin, 1).to_vec();
        assert_eq!(first[0].start, origin.position);

        let moved = turtle.advance(&engine, Location::default(), 3).to_vec();
        assert_eq!(moved[0].start, first[0].end);
    }

    #[test]
    fn resume_rebuilds_state_from_buffer() {
        let mut engine = GrammarEngine::new(Grammar::penrose());
        engine.expand(2);
        let origin = Location::new(Point2::ORIGIN, 0.3);

        let mut warm = TurtleInterpreter::new(Theme::Light);
        warm.advance(&engine, origin, 100);
        let mut cold = TurtleInterpreter::resume(Theme::Light, &engine, origin, warm.buffer().clone());
        assert_eq!(cold.state(), warm.state());

        let a = warm.advance(&engine, origin, 250).to_vec();
        let b = cold.advance(&engine, origin, 250).to_vec();
        assert_eq!(a, b);
    }

    #[test]
    fn set_theme_starts_over() {
        let engine = koch_engine();
        let mut turtle = TurtleInterpreter::new(Theme::Dark);
        turtle.advance(&engine, Location::default(), 8);
        turtle.set_theme(Theme::Dark);
        assert_eq!(turtle.cursor(), 8);
        turtle.set_theme(Theme::Light);
        assert_eq!(turtle.cursor(), 0);
        assert!(turtle.buffer().is_empty());
    }
}
