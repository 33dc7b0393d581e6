//! Symbolic rewrite grammar (L-system) and its generation-by-generation expansion.
//!
//! A [`GrammarEngine`] owns one [`Grammar`] and the production derived from it.
//! Every pass rewrites the previous production left to right in a single scan:
//! rule-bearing symbols are replaced, symbols listed in [`Grammar::dropped`] are
//! consumed, everything else is copied through untouched.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PenroseError, Result};
use crate::math::to_radians;

/// Symbol that draws a segment when interpreted.
pub const DRAW: char = 'F';
pub const TURN_LEFT: char = '+';
pub const TURN_RIGHT: char = '-';
pub const PUSH: char = '[';
pub const POP: char = ']';

pub const PRESET_NAMES: [&str; 3] = ["penrose", "triangle", "koch"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    pub axiom: String,
    pub rules: BTreeMap<char, String>,
    /// Symbols without a rule that are consumed instead of copied forward.
    #[serde(default)]
    pub dropped: String,
    pub theta_degrees: f64,
    pub start_length: f64,
    pub scale_factor: f64,
}

impl Grammar {
    pub fn new(
        axiom: &str,
        rules: &[(char, &str)],
        theta_degrees: f64,
        start_length: f64,
        scale_factor: f64,
    ) -> Self {
        Grammar {
            axiom: axiom.to_string(),
            rules: rules.iter().map(|&(s, r)| (s, r.to_string())).collect(),
            dropped: String::new(),
            theta_degrees,
            start_length,
            scale_factor,
        }
    }

    pub fn with_dropped(mut self, dropped: &str) -> Self {
        self.dropped = dropped.to_string();
        self
    }

    /// Five-fold Penrose P3 rhombus tiling.
    pub fn penrose() -> Self {
        Grammar::new(
            "[X]++[X]++[X]++[X]++[X]",
            &[
                ('W', "YF++ZF4-XF[-YF4-WF]++"),
                ('X', "+YF--ZF[3-WF--XF]+"),
                ('Y', "-WF++XF[+++YF++ZF]-"),
                ('Z', "--YF++++WF[+ZF++++XF]--XF"),
            ],
            36.0,
            460.0,
            0.5,
        ).with_dropped("F")
    }

    pub fn triangle() -> Self {
        Grammar::new("F", &[('F', "F+F-F")], 120.0, 190.0, 0.6)
    }

    pub fn koch() -> Self {
        Grammar::new("F", &[('F', "F+F--F+F")], 60.0, 1.0, 1.0 / 3.0)
    }

    pub fn preset(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "penrose" => Ok(Grammar::penrose()),
            "triangle" => Ok(Grammar::triangle()),
            "koch" => Ok(Grammar::koch()),
            other => Err(PenroseError::UnknownPreset(other.to_string())),
        }
    }

    pub fn theta(&self) -> f64 {
        to_radians(self.theta_degrees)
    }

    /// One rewrite pass over `production`.
    pub fn rewrite(&self, production: &str) -> String {
        let mut next = String::with_capacity(production.len() * 2);
        for symbol in production.chars() {
            if let Some(replacement) = self.rules.get(&symbol) {
                next.push_str(replacement);
            } else if !self.dropped.contains(symbol) {
                next.push(symbol);
            }
        }
        next
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Grammar::penrose()
    }
}

#[derive(Clone, Debug)]
pub struct GrammarEngine {
    grammar: Grammar,
    production: String,
    generation: u32,
    draw_length: f64,
}

impl GrammarEngine {
    pub fn new(grammar: Grammar) -> Self {
        let production = grammar.axiom.clone();
        let draw_length = grammar.start_length;
        GrammarEngine { grammar, production, generation: 0, draw_length }
    }

    pub fn reset(&mut self) {
        self.production = self.grammar.axiom.clone();
        self.generation = 0;
        self.draw_length = self.grammar.start_length;
    }

    /// Rewrites until `generations` passes have been applied. Never rewinds;
    /// the caller bounds `generations` since production length grows exponentially.
    pub fn expand(&mut self, generations: u32) {
        while self.generation < generations {
            self.iterate();
        }
    }

    /// Full re-expansion from the axiom.
    pub fn regenerate(&mut self, generations: u32) {
        self.reset();
        self.expand(generations);
        info!(
            generation = self.generation,
            symbols = self.production.len(),
            draw_length = self.draw_length,
            "grammar regenerated"
        );
    }

    pub fn iterate(&mut self) {
        self.production = self.grammar.rewrite(&self.production);
        self.draw_length *= self.grammar.scale_factor;
        self.generation += 1;
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn production(&self) -> &str {
        &self.production
    }

    pub fn len(&self) -> usize {
        self.production.len()
    }

    pub fn is_empty(&self) -> bool {
        self.production.is_empty()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn draw_length(&self) -> f64 {
        self.draw_length
    }

    pub fn theta(&self) -> f64 {
        self.grammar.theta()
    }
}

impl Default for GrammarEngine {
    fn default() -> Self {
        GrammarEngine::new(Grammar::default())
    }
}
