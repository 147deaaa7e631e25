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
//! # IAS15
//!
//! A 15th-order Gauss-Radau integrator (Everhart 1985; Rein & Spiegel
//! 2014) for N-body gravitational dynamics, with adaptive per-particle
//! step-size control, compensated (Kahan) summation, and hierarchical
//! sub-stepping across particles running at different natural cadences.
//!
//! ## What this crate is
//!
//! The time-stepping engine only: coefficient algebra, the
//! predictor-corrector iteration, compensated state accumulation, and
//! adaptive step selection. It does not implement a gravity kernel, a
//! tree code, or restart-file I/O — those are the caller's concern,
//! reached through the [`forces::ForceField`] and
//! [`forces::AdditionalForces`] traits.
//!
//! ## Example
//!
//! ```rust
//! use ias15::{Ias15Config, Ias15Integrator, Particle, ForceField};
//!
//! struct TwoBodyGravity { g: f64 }
//!
//! impl ForceField for TwoBodyGravity {
//!     fn evaluate(&self, particles: &mut [Particle]) {
//!         let n = particles.len();
//!         for i in 0..n {
//!             particles[i].acceleration = [0.0; 3];
//!         }
//!         for i in 0..n {
//!             for j in 0..n {
//!                 if i == j {
//!                     continue;
//!                 }
//!                 let dx = [
//!                     particles[j].position[0] - particles[i].position[0],
//!                     particles[j].position[1] - particles[i].position[1],
//!                     particles[j].position[2] - particles[i].position[2],
//!                 ];
//!                 let r2 = dx[0] * dx[0] + dx[1] * dx[1] + dx[2] * dx[2] + 1e-12;
//!                 let f = self.g / (r2 * r2.sqrt());
//!                 for k in 0..3 {
//!                     particles[i].acceleration[k] += f * dx[k];
//!                 }
//!             }
//!         }
//!     }
//! }
//!
//! let config = Ias15Config::new(0.001).unwrap();
//! let mut integrator = Ias15Integrator::new(config);
//! let mut particles = vec![
//!     Particle::new([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
//!     Particle::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
//! ];
//! let gravity = TwoBodyGravity { g: 1.0 };
//! let mut t = 0.0;
//!
//! integrator.part1();
//! let report = integrator.part2(&mut t, &mut particles, &gravity, None);
//! assert!(report.dt > 0.0);
//! ```

#![warn(missing_docs)]

/// The particle record the integrator reads and writes.
pub mod particle;

/// The force-evaluation collaborator boundary.
pub mod forces;

/// The IAS15 time-stepping engine itself.
pub mod integrator;

pub use forces::{AdditionalForces, ForceField};
pub use integrator::{Ias15Config, Ias15Integrator, StepReport};
pub use particle::{Particle, PastCache};
