// SPDX-License-Identifier: GPL-3.0-only

//! Image effects
//!
//! An effect is an opaque transform plus a capability record the scheduler
//! uses to pick a draw mode. Effects are shared as `Arc<dyn Effect>`
//! identities: selecting or randomizing swaps the `Arc`, it never mutates an
//! effect a processor is already holding. Ribbon previews render their own
//! [`Effect::duplicate`], so per-effect state such as a frame accumulator is
//! never shared with the main view.

pub mod filters;
pub mod temporal;

pub use filters::{ColorEffect, ColorFilter};
pub use temporal::{Pixelate, Spotlight, Trails};

use crate::app::detector::TrackerState;
use crate::errors::{AppError, AppResult};
use image::RgbaImage;
use rand::RngCore;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// What the scheduler needs to know about an effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EffectCapabilities {
    /// Reads the head tracker; detection runs every eligible frame
    pub uses_head_tracker: bool,
    /// Accumulates several frames; forces BEST quality
    pub is_multiframe: bool,
    /// Expensive; forces FAST quality
    pub is_slow: bool,
}

/// An image transform
pub trait Effect: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    fn capabilities(&self) -> EffectCapabilities;

    /// Transform one frame
    fn process(&self, input: &RgbaImage, tracker: &TrackerState) -> RgbaImage;

    /// A separate identity with the same parameters and fresh state
    fn duplicate(&self) -> SharedEffect;

    /// A new identity with randomized parameters, if the effect has any
    fn randomized(&self, _rng: &mut dyn RngCore) -> Option<SharedEffect> {
        None
    }
}

pub type SharedEffect = Arc<dyn Effect>;

/// Indexed set of effects with one current selection
pub struct EffectLibrary {
    effects: Vec<SharedEffect>,
    current: usize,
}

impl std::fmt::Debug for EffectLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectLibrary")
            .field("effects", &self.names())
            .field("current", &self.current)
            .finish()
    }
}

impl EffectLibrary {
    pub fn new(effects: Vec<SharedEffect>) -> AppResult<Self> {
        if effects.is_empty() {
            return Err(AppError::Config("effect library is empty".to_string()));
        }
        Ok(Self {
            effects,
            current: 0,
        })
    }

    /// The built-in effects, "Normal" first
    pub fn builtin() -> Self {
        let effects: Vec<SharedEffect> = vec![
            Arc::new(ColorEffect::new(ColorFilter::Normal)),
            Arc::new(ColorEffect::new(ColorFilter::Mono)),
            Arc::new(ColorEffect::new(ColorFilter::Sepia)),
            Arc::new(ColorEffect::new(ColorFilter::Negative)),
            Arc::new(ColorEffect::new(ColorFilter::Posterize { levels: 4 })),
            Arc::new(Trails::new(0.8)),
            Arc::new(Pixelate::new(12)),
            Arc::new(Spotlight::new(0.25)),
        ];
        Self {
            effects,
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SharedEffect> {
        self.effects.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedEffect> {
        self.effects.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.effects.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> SharedEffect {
        Arc::clone(&self.effects[self.current])
    }

    /// Make `index` current and return its identity
    pub fn select(&mut self, index: usize) -> AppResult<SharedEffect> {
        let effect = self.effects.get(index).ok_or_else(|| {
            AppError::Other(format!(
                "effect index {} out of range (0-{})",
                index,
                self.effects.len() - 1
            ))
        })?;
        self.current = index;
        info!(index, effect = effect.name(), "Effect selected");
        Ok(Arc::clone(effect))
    }

    /// Replace the current effect with a randomized identity
    ///
    /// Effects without parameters are returned unchanged.
    pub fn randomize_current(&mut self, rng: &mut dyn RngCore) -> SharedEffect {
        if let Some(randomized) = self.effects[self.current].randomized(rng) {
            info!(effect = randomized.name(), "Effect randomized");
            self.effects[self.current] = randomized;
        }
        self.current()
    }
}
