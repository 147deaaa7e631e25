// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! The particle record owned by the caller's particle store.
//!
//! `Particle` carries everything the IAS15 integrator needs to read and
//! write across a step: the usual position/velocity/acceleration triple,
//! plus the per-particle bookkeeping the adaptive, hierarchical step
//! scheme depends on (`tdone`, `dtdone`, `dtexp`, and the past-position
//! cache used when a coarser-class particle is evaluated at a finer
//! class's collocation nodes).

/// Cached positions for a particle that is not being advanced at the
/// current (finer) sub-step class.
///
/// Indexed `[level][sub_index]`. `level` corresponds to `-dtexp` of the
/// class that *wrote* the entry (range `0..=2`, since `dtexp` ranges
/// `[-2, 0]`), but the predictor reads one level past the writer's level
/// (`-dtexp + 1`) when looking up a coarser particle's position at a
/// finer node — see the Open Question recorded in `DESIGN.md` about this
/// off-by-one in the original scheme's hierarchical bookkeeping. The cache
/// is therefore sized one level deeper than the write side alone would
/// need. `sub_index` is the Gauss-Radau node index, `0..8`.
#[derive(Debug, Clone)]
pub struct PastCache {
    data: [[[f64; 3]; 8]; 4],
}

impl PastCache {
    /// Create a cache with all entries at the origin.
    pub fn new() -> Self {
        PastCache {
            data: [[[0.0; 3]; 8]; 4],
        }
    }

    /// Read back a cached position.
    pub fn get(&self, level: usize, sub_index: usize) -> [f64; 3] {
        self.data[level][sub_index]
    }

    /// Store a position for later lookup by a coarser class.
    pub fn set(&mut self, level: usize, sub_index: usize, position: [f64; 3]) {
        self.data[level][sub_index] = position;
    }
}

impl Default for PastCache {
    fn default() -> Self {
        PastCache::new()
    }
}

/// A single point mass tracked by the integrator.
///
/// The integrator borrows a `&mut [Particle]` for the duration of a step;
/// it does not own the particle store. Callers must not resize or reorder
/// the slice between `Ias15Integrator::part1`/`part2` calls.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Position in arbitrary consistent units.
    pub position: [f64; 3],
    /// Velocity.
    pub velocity: [f64; 3],
    /// Acceleration, written by the caller-supplied `ForceField` before and
    /// during a step.
    pub acceleration: [f64; 3],
    /// Simulation time at which this particle's state was last fully
    /// advanced by a committed step.
    pub tdone: f64,
    /// Length of the last successful step applied to this particle. A
    /// value of `0.0` is the sentinel for "no previous step" (it fails the
    /// `f64::is_normal` check the warm-start predictor uses to decide
    /// whether a previous step exists, matching the reference scheme's use
    /// of `isnormal` on this field).
    pub dtdone: f64,
    /// Step-class exponent, always in `[-2, 0]`. The particle's step size
    /// is `max_dt * 8^dtexp` (floor).
    pub dtexp: i32,
    /// Cached positions for use by coarser step classes.
    pub past: PastCache,
}

impl Particle {
    /// Create a particle at rest in its step-class history: `tdone` and
    /// `dtdone` both zero (no previous step), `dtexp` zero (finest/default
    /// class), acceleration zero until the first force evaluation.
    pub fn new(position: [f64; 3], velocity: [f64; 3]) -> Self {
        Particle {
            position,
            velocity,
            acceleration: [0.0; 3],
            tdone: 0.0,
            dtdone: 0.0,
            dtexp: 0,
            past: PastCache::new(),
        }
    }

    /// `true` if position, velocity, and acceleration are all finite.
    pub fn is_valid(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.velocity.iter().all(|v| v.is_finite())
            && self.acceleration.iter().all(|v| v.is_finite())
    }
}
