//! Creation, tracking and retirement of virtual springs.
//!
//! # Update sequence
//!
//! ```text
//! 1. Track:  re-project every anchor onto the current needle
//! 2. Retire: drop springs whose anchor lies beyond the tip or behind
//!            the base
//! 3. Add:    body springs every Δb from the entry point,
//!            tip springs every Δt towards the tip,
//!            then clamp the tip count into [min, max]
//! ```
//!
//! Springs only exist once a tissue surface is defined. Attachment
//! distances are measured from the needle base, so the inserted part of
//! the needle is `[entry, length]`.

use tracing::{debug, trace};

use crate::config::SpringConfig;
use crate::needle::Needle;
use crate::spring::{SpringKind, VirtualSpring};
use crate::surface::TissueSurface;
use crate::{NeedleError, Result};

/// Distance past the tip or behind the base beyond which an anchor is
/// considered off the needle.
const RETIRE_TOLERANCE: f64 = 1e-9;

/// Spring counts changed by one network update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkUpdate {
    /// Springs created.
    pub added: usize,
    /// Springs removed, by withdrawal or by the tip count bound.
    pub retired: usize,
}

/// Ordered body and tip springs plus the policy that maintains them.
#[derive(Debug, Clone, PartialEq)]
pub struct SpringNetwork {
    config: SpringConfig,
    surface: Option<TissueSurface>,
    body: Vec<VirtualSpring>,
    tip: Vec<VirtualSpring>,
}

impl Default for SpringNetwork {
    fn default() -> Self {
        Self {
            config: SpringConfig::default(),
            surface: None,
            body: Vec::new(),
            tip: Vec::new(),
        }
    }
}

impl SpringNetwork {
    /// Create an empty network.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: SpringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Spring policy.
    #[must_use]
    pub fn config(&self) -> &SpringConfig {
        &self.config
    }

    /// Replace the spring policy and restiffen existing springs.
    pub fn set_config(&mut self, config: SpringConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.refresh_stiffness();
        Ok(())
    }

    /// Tissue surface, if one has been defined.
    #[must_use]
    pub fn surface(&self) -> Option<&TissueSurface> {
        self.surface.as_ref()
    }

    /// Define or remove the tissue surface.
    pub fn set_surface(&mut self, surface: Option<TissueSurface>) {
        self.surface = surface;
    }

    /// Body springs ordered by attachment distance.
    #[must_use]
    pub fn body_springs(&self) -> &[VirtualSpring] {
        &self.body
    }

    /// Tip springs ordered by attachment distance.
    #[must_use]
    pub fn tip_springs(&self) -> &[VirtualSpring] {
        &self.tip
    }

    /// All springs, body first.
    pub fn springs(&self) -> impl Iterator<Item = &VirtualSpring> {
        self.body.iter().chain(&self.tip)
    }

    /// Total number of springs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len() + self.tip.len()
    }

    /// True if there are no springs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.tip.is_empty()
    }

    /// Remove every spring. The surface is kept.
    pub fn clear(&mut self) {
        self.body.clear();
        self.tip.clear();
    }

    /// Elastic energy stored in all springs.
    #[must_use]
    pub fn total_energy(&self, needle: &Needle) -> f64 {
        self.springs().map(|s| s.energy(needle)).sum()
    }

    /// Entry distance of the needle into the tissue.
    #[must_use]
    pub fn entry_distance(&self, needle: &Needle) -> Option<f64> {
        self.surface
            .as_ref()
            .and_then(|surface| needle.surface_entry_distance(surface))
    }

    /// Length of needle past the tissue surface.
    #[must_use]
    pub fn inserted_length(&self, needle: &Needle) -> f64 {
        self.entry_distance(needle)
            .map_or(0.0, |entry| (needle.length() - entry).max(0.0))
    }

    /// Insert a spring manually, keeping its list ordered.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::InvalidArgument`] for a distance outside the
    /// needle or a non-positive stiffness.
    pub fn insert(&mut self, needle: &Needle, spring: VirtualSpring) -> Result<()> {
        let d = spring.distance();
        if !(d.is_finite() && (0.0..=needle.length()).contains(&d)) {
            return Err(NeedleError::invalid_argument(format!(
                "spring distance {d} outside [0, {}]",
                needle.length()
            )));
        }
        if !(spring.stiffness().is_finite() && spring.stiffness() > 0.0) {
            return Err(NeedleError::invalid_argument(format!(
                "spring stiffness must be positive, got {}",
                spring.stiffness()
            )));
        }
        let list = match spring.kind() {
            SpringKind::Body => &mut self.body,
            SpringKind::Tip => &mut self.tip,
        };
        let index = list.partition_point(|s| s.distance() <= d);
        list.insert(index, spring);
        Ok(())
    }

    /// Apply the configured stiffness to every existing spring.
    pub fn refresh_stiffness(&mut self) {
        let body = self.config.body_stiffness();
        let tip = self.config.tip_stiffness();
        for spring in &mut self.body {
            spring.set_stiffness(body);
        }
        for spring in &mut self.tip {
            spring.set_stiffness(tip);
        }
    }

    /// Run the full track, retire, add sequence against `needle`.
    pub fn update(&mut self, needle: &Needle, samples: usize) -> NetworkUpdate {
        self.track(needle, samples);
        let retired = self.retire(needle);
        let change = self.add(needle);
        let update = NetworkUpdate {
            added: change.added,
            retired: retired + change.retired,
        };
        if update != NetworkUpdate::default() {
            debug!(
                added = update.added,
                retired = update.retired,
                body = self.body.len(),
                tip = self.tip.len(),
                "spring network updated"
            );
        }
        update
    }

    /// Re-attach every spring to the needle point closest to its anchor.
    pub fn track(&mut self, needle: &Needle, samples: usize) {
        for spring in self.body.iter_mut().chain(self.tip.iter_mut()) {
            let distance = needle.closest_distance(&spring.anchor(), samples);
            spring.set_distance(distance);
        }
        self.body.sort_by(|a, b| a.distance().total_cmp(&b.distance()));
        self.tip.sort_by(|a, b| a.distance().total_cmp(&b.distance()));
    }

    /// Remove springs that no longer sit on the needle.
    ///
    /// A spring is withdrawn when its anchor lies beyond the tip along the
    /// tip direction, and passed when it lies behind the base along the
    /// base direction (the base has been pushed past it).
    ///
    /// Returns the number of springs removed.
    pub fn retire(&mut self, needle: &Needle) -> usize {
        let tip = needle.tip_position();
        let tip_direction = needle.tip_direction();
        let base = needle.base_position();
        let base_direction = needle.base_direction();
        let attached = |s: &VirtualSpring| {
            (s.anchor() - tip).dot(&tip_direction) <= RETIRE_TOLERANCE
                && (s.anchor() - base).dot(&base_direction) >= -RETIRE_TOLERANCE
        };

        let before = self.len();
        self.body.retain(attached);
        self.tip.retain(attached);
        let retired = before - self.len();
        if retired > 0 {
            trace!(retired, "retired springs off the needle");
        }
        retired
    }

    /// Create springs on the inserted part of the needle.
    fn add(&mut self, needle: &Needle) -> NetworkUpdate {
        let mut update = NetworkUpdate::default();
        if !self.config.automatic_addition {
            return update;
        }
        let Some(entry) = self.entry_distance(needle) else {
            return update;
        };
        let length = needle.length();

        // Body springs: first one at the entry point, then every Δb.
        let spacing = self.config.inter_spring_distance;
        let stiffness = self.config.body_stiffness();
        let mut last = match self.body.last() {
            Some(spring) => spring.distance(),
            None if length - entry >= spacing => {
                self.body.push(VirtualSpring::at_distance(
                    needle,
                    entry,
                    stiffness,
                    SpringKind::Body,
                ));
                update.added += 1;
                entry
            }
            None => length,
        };
        while length - last >= spacing {
            last += spacing;
            self.body.push(VirtualSpring::at_distance(
                needle,
                last,
                stiffness,
                SpringKind::Body,
            ));
            update.added += 1;
        }

        let max = self.config.max_tip_springs;
        if max == 0 {
            update.retired += self.tip.len();
            self.tip.clear();
            return update;
        }

        // Tip springs: every Δt towards the tip.
        let spacing = self.config.inter_tip_spring_distance;
        let stiffness = self.config.tip_stiffness();
        let mut last = self.tip.last().map_or(entry, VirtualSpring::distance).max(entry);
        while length - last >= spacing {
            last += spacing;
            self.tip.push(VirtualSpring::at_distance(
                needle,
                last,
                stiffness,
                SpringKind::Tip,
            ));
            update.added += 1;
        }

        if self.tip.len() > max {
            let excess = self.tip.len() - max;
            self.tip.drain(..excess);
            update.retired += excess;
        }

        // Backfill proximally while there is room past the entry point.
        while self.tip.len() < self.config.min_tip_springs {
            let first = self.tip.first().map_or(length, VirtualSpring::distance);
            let distance = first - spacing;
            if distance <= entry + RETIRE_TOLERANCE {
                break;
            }
            self.tip.insert(
                0,
                VirtualSpring::at_distance(needle, distance, stiffness, SpringKind::Tip),
            );
            update.added += 1;
        }

        update
    }
}
