//! Frame-by-frame driver for one or two turtle interpreters over a shared grammar.
//!
//! The driver never interprets symbols itself: each [`Playback::tick`] picks a target
//! step for every interpreter, collects the segments they emit, and reports what the
//! rendering surface has to upload. Parameter changes raise flags that the next tick
//! acts on. Changing the grammar or the generation count also drops both interpreters
//! on the spot, so progress never points past the end of the new production.

use std::sync::PoisonError;
use tracing::{debug, info};

use crate::buffer::LineSegment;
use crate::config::Config;
use crate::error::Result;
use crate::grammar::{Grammar, GrammarEngine};
use crate::math::Point2;
use crate::turtle::{shared_location, Location, SharedLocation, Theme, TurtleInterpreter};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackParams {
    pub generations: u32,
    /// Starting heading (radians) of the patterns.
    pub rotation_offset: f64,
    /// Radians per tick the secondary frame spins; 0 pins it to `rotation_offset`.
    pub rotation_speed: f64,
    pub step_budget: usize,
    /// Draw the whole production on the next tick instead of `step_budget` at a time.
    pub instant: bool,
    /// Overlay a second pattern in its own rotating frame.
    pub dual: bool,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        PlaybackParams::from(&Config::default())
    }
}

impl From<&Config> for PlaybackParams {
    fn from(config: &Config) -> Self {
        PlaybackParams {
            generations: config.generations,
            rotation_offset: config.rotation_offset,
            rotation_speed: config.rotation_speed,
            step_budget: config.step_budget,
            instant: config.instant,
            dual: config.dual,
        }
    }
}

/// Grammar plus the knobs a UI can turn, and the flags those knobs raise.
#[derive(Clone, Debug)]
pub struct PlaygroundController {
    engine: GrammarEngine,
    params: PlaybackParams,
    reset_flag: bool,
    rotate_flag: bool,
}

impl PlaygroundController {
    pub fn new(grammar: Grammar, params: PlaybackParams) -> Self {
        let mut engine = GrammarEngine::new(grammar);
        engine.regenerate(params.generations);
        PlaygroundController { engine, params, reset_flag: true, rotate_flag: params.dual }
    }

    pub fn engine(&self) -> &GrammarEngine {
        &self.engine
    }

    pub fn params(&self) -> &PlaybackParams {
        &self.params
    }

    pub fn set_generations(&mut self, generations: u32) {
        self.params.generations = generations;
        self.engine.regenerate(generations);
        self.reset_flag = true;
    }

    pub fn set_grammar(&mut self, grammar: Grammar) {
        self.engine = GrammarEngine::new(grammar);
        self.engine.regenerate(self.params.generations);
        self.reset_flag = true;
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.params.rotation_offset = rotation;
        self.rotate_flag = true;
    }

    /// Negative speeds are treated as 0 (pinned frame).
    pub fn set_rotation_speed(&mut self, speed: f64) {
        self.params.rotation_speed = speed.max(0.0);
        self.rotate_flag = true;
    }

    /// A zero budget would never move the cursor; at least one step per tick.
    pub fn set_step_budget(&mut self, budget: usize) {
        self.params.step_budget = budget.max(1);
    }

    pub fn set_instant(&mut self, instant: bool) {
        self.params.instant = instant;
        self.reset_flag = true;
    }

    pub fn set_dual(&mut self, dual: bool) {
        self.params.dual = dual;
        self.rotate_flag = dual;
        self.reset_flag = true;
    }

    pub fn request_reset(&mut self) {
        self.reset_flag = true;
    }

    fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset_flag)
    }
}

/// What changed during one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub primary: Vec<LineSegment>,
    pub secondary: Vec<LineSegment>,
    /// Spin applied to the whole secondary frame at render time.
    pub secondary_rotation: f64,
    /// Previously uploaded geometry is stale; redraw everything.
    pub full_redraw: bool,
    pub cursor: usize,
    pub total: usize,
    pub generation: u32,
}

pub struct Playback {
    controller: PlaygroundController,
    primary: TurtleInterpreter,
    secondary: TurtleInterpreter,
    location: SharedLocation,
    secondary_location: SharedLocation,
    spin: f64,
}

fn snapshot(location: &SharedLocation) -> Location {
    *location.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_heading(location: &SharedLocation, rotation: f64) {
    location.lock().unwrap_or_else(PoisonError::into_inner).rotation = rotation;
}

impl Playback {
    pub fn new(grammar: Grammar, params: PlaybackParams, theme: Theme) -> Self {
        let origin = Location::new(Point2::ORIGIN, params.rotation_offset);
        Playback {
            controller: PlaygroundController::new(grammar, params),
            primary: TurtleInterpreter::new(theme),
            secondary: TurtleInterpreter::new(theme),
            location: shared_location(origin),
            secondary_location: shared_location(origin),
            spin: 0.0,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Playback::new(config.grammar()?, PlaybackParams::from(config), config.theme))
    }

    /// Handle to the primary origin, for callers that move the pattern around.
    pub fn location(&self) -> SharedLocation {
        self.location.clone()
    }

    pub fn secondary_location(&self) -> SharedLocation {
        self.secondary_location.clone()
    }

    pub fn controller(&self) -> &PlaygroundController {
        &self.controller
    }

    pub fn engine(&self) -> &GrammarEngine {
        self.controller.engine()
    }

    pub fn primary(&self) -> &TurtleInterpreter {
        &self.primary
    }

    pub fn secondary(&self) -> &TurtleInterpreter {
        &self.secondary
    }

    pub fn theme(&self) -> Theme {
        self.primary.theme()
    }

    pub fn spin(&self) -> f64 {
        self.spin
    }

    pub fn progress(&self) -> (usize, usize) {
        self.primary.progress(self.engine())
    }

    /// The old geometry belongs to the old production, so both interpreters
    /// start over right away; the next tick still reports a full redraw.
    pub fn set_generations(&mut self, generations: u32) {
        self.controller.set_generations(generations);
        self.restart_interpreters();
    }

    pub fn set_grammar(&mut self, grammar: Grammar) {
        self.controller.set_grammar(grammar);
        self.restart_interpreters();
    }

    fn restart_interpreters(&mut self) {
        self.primary.reset();
        self.secondary.reset();
        self.spin = 0.0;
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.controller.set_rotation(rotation);
        set_heading(&self.location, rotation);
    }

    pub fn set_rotation_speed(&mut self, speed: f64) {
        self.controller.set_rotation_speed(speed);
    }

    pub fn set_step_budget(&mut self, budget: usize) {
        self.controller.set_step_budget(budget);
    }

    pub fn set_instant(&mut self, instant: bool) {
        self.controller.set_instant(instant);
    }

    pub fn set_dual(&mut self, dual: bool) {
        self.controller.set_dual(dual);
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.primary.set_theme(theme);
        self.secondary.set_theme(theme);
        self.controller.request_reset();
    }

    pub fn reset(&mut self) {
        self.controller.request_reset();
    }

    fn target(&self, interpreter: &TurtleInterpreter) -> usize {
        let params = self.controller.params();
        if params.instant {
            self.engine().len()
        } else {
            interpreter.cursor().saturating_add(params.step_budget)
        }
    }

    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if self.controller.take_reset() {
            self.primary.reset();
            self.secondary.reset();
            self.spin = 0.0;
            report.full_redraw = true;
            info!(generation = self.engine().generation(), total = self.engine().len(), "playback reset");
        }

        let target = self.target(&self.primary);
        let origin = snapshot(&self.location);
        report.primary = self.primary.advance(self.controller.engine(), origin, target).to_vec();

        let params = *self.controller.params();
        if params.dual {
            let mut target = self.target(&self.secondary);
            if self.controller.rotate_flag {
                if params.rotation_speed > 0.0 {
                    self.spin += params.rotation_speed;
                } else {
                    set_heading(&self.secondary_location, params.rotation_offset);
                    self.secondary.reset();
                    self.spin = 0.0;
                    self.controller.rotate_flag = false;
                    target = self.engine().len();
                    report.full_redraw = true;
                }
            }
            let origin = snapshot(&self.secondary_location);
            report.secondary = self.secondary.advance(self.controller.engine(), origin, target).to_vec();
            report.secondary_rotation = self.spin;
        }

        let (cursor, total) = self.progress();
        report.cursor = cursor;
        report.total = total;
        report.generation = self.engine().generation();
        debug!(cursor, total, primary = report.primary.len(), secondary = report.secondary.len(), "tick");
        report
    }
}
