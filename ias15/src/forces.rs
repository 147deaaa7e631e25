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
//! The collaborator boundary between the integrator and whatever computes
//! accelerations.
//!
//! The integrator owns none of the physics: it calls out to a
//! caller-supplied [`ForceField`] at every Gauss-Radau sub-node, and
//! optionally an [`AdditionalForces`] hook after it. Neither trait is
//! implemented by this crate for anything beyond tests and examples — a
//! gravity kernel, a tree code, a softened N-body sum, are all someone
//! else's concern.

use crate::particle::Particle;

/// Computes acceleration from the current position (and, for
/// velocity-dependent force laws, velocity) of every particle.
///
/// Implementations must be synchronous and side-effect-free beyond writing
/// `particles[i].acceleration`: the integrator calls `evaluate` multiple
/// times per step at predicted, not yet committed, positions, and assumes
/// each call is a pure function of the particle slice it is handed.
/// Internal parallelism (for example a `rayon`-parallel pairwise sum) is
/// fine; the integrator itself never calls `evaluate` from more than one
/// thread at a time.
pub trait ForceField: Send + Sync {
    /// Write `particles[i].acceleration` for every particle, from the
    /// particles' current `position` (and `velocity`, if applicable).
    fn evaluate(&self, particles: &mut [Particle]);
}

/// An optional force contribution applied after [`ForceField::evaluate`].
///
/// Corresponds to a problem's supplementary forces: drag, radiation
/// pressure, a user-defined perturbation. `is_velocity_dependent` tells the
/// integrator whether it must predict velocities (at real extra cost) at
/// every sub-node before calling `apply`, or whether it can skip that work
/// because `apply` only reads position.
pub trait AdditionalForces: Send + Sync {
    /// Add to `particles[i].acceleration` for every particle that this
    /// force law affects. Called after the primary [`ForceField`].
    fn apply(&self, particles: &mut [Particle]);

    /// `true` if `apply` reads `particles[i].velocity`. Defaults to `false`
    /// (the common case: position-dependent perturbations).
    fn is_velocity_dependent(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ZeroField;
    impl ForceField for ZeroField {
        fn evaluate(&self, particles: &mut [Particle]) {
            for p in particles {
                p.acceleration = [0.0; 3];
            }
        }
    }

    struct Drag {
        coefficient: f64,
    }
    impl AdditionalForces for Drag {
        fn apply(&self, particles: &mut [Particle]) {
            for p in particles {
                for k in 0..3 {
                    p.acceleration[k] -= self.coefficient * p.velocity[k];
                }
            }
        }

        fn is_velocity_dependent(&self) -> bool {
            true
        }
    }

    #[test]
    fn zero_field_clears_acceleration() {
        let mut particles = vec![Particle::new([1.0, 2.0, 3.0], [0.0; 3])];
        particles[0].acceleration = [9.0, 9.0, 9.0];
        ZeroField.evaluate(&mut particles);
        assert_eq!(particles[0].acceleration, [0.0; 3]);
    }

    #[test]
    fn drag_is_velocity_dependent_and_opposes_motion() {
        let drag = Drag { coefficient: 0.5 };
        assert!(drag.is_velocity_dependent());
        let mut particles = vec![Particle::new([0.0; 3], [2.0, 0.0, 0.0])];
        drag.apply(&mut particles);
        assert_eq!(particles[0].acceleration, [-1.0, 0.0, 0.0]);
    }
}
