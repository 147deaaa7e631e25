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
//! A 15th-order Gauss-Radau (IAS15) integrator.
//!
//! # Algorithm
//!
//! IAS15 (Everhart 1985; Rein & Spiegel 2014) advances a particle set over
//! a step by fitting a degree-7 Taylor-like polynomial to the acceleration
//! across eight unevenly spaced Gauss-Radau nodes on `[0, 1]`, refining the
//! polynomial's coefficients (`b`) with a predictor-corrector iteration
//! that re-evaluates the force law at each node, and finally integrating
//! the fitted polynomial in closed form to produce the new position and
//! velocity. Per-particle step-size control and a hierarchy of
//! sub-stepping classes let particles in different dynamical regimes
//! (a tight binary vs. a wide, slow orbit) advance at their own natural
//! cadence within a single call.
//!
//! # Properties
//!
//! - Non-symplectic: no claim is made about long-term energy conservation
//!   beyond what the per-step error tolerance (`epsilon`) bounds.
//! - A committed step is atomic: either every particle in the active class
//!   is advanced and its state is internally consistent, or (on a fatal
//!   allocation failure) the process aborts. A step never partially
//!   commits.
//! - Single-threaded and synchronous by itself; a caller-supplied
//!   [`crate::forces::ForceField`] may parallelize its own evaluation.
//!
//! # References
//!
//! Everhart, E. (1985), "An efficient integrator that uses Gauss-Radau
//! spacings". Rein, H. & Spiegel, D. S. (2014), "IAS15: A fast, adaptive,
//! high-order integrator for gravitational dynamics, accurate to machine
//! precision over a billion orbits", MNRAS.

mod coefficients;
mod finalize;
mod predictor_corrector;
mod stepcontrol;

pub use coefficients::{C, D, H, R};

use crate::forces::{AdditionalForces, ForceField};
use crate::particle::Particle;

/// Tunable parameters for an [`Ias15Integrator`].
///
/// Constructed with [`Ias15Config::new`], which validates `max_dt` up
/// front; the `with_*` builders validate their own argument and return the
/// config unchanged (as an `Err`) on an invalid value, mirroring this
/// workspace's `Integrator::validate_timestep` convention rather than
/// panicking on bad input.
#[derive(Debug, Clone, Copy)]
pub struct Ias15Config {
    epsilon: f64,
    min_dt: f64,
    max_dt: f64,
    safety_factor: f64,
    force_is_velocity_dependent: bool,
    iterations_max: u32,
    iterations_warning_threshold: u64,
}

impl Ias15Config {
    /// Create a config with the reference defaults: `epsilon = 1e-5`,
    /// `min_dt = 0.0`, `safety_factor = 0.25`, `iterations_max = 12`,
    /// `iterations_warning_threshold = 10`.
    ///
    /// `max_dt` is also the class-0 (coarsest) step length and the upper
    /// clamp on every adaptively chosen step; it must be finite and
    /// strictly positive.
    pub fn new(max_dt: f64) -> Result<Self, String> {
        if !(max_dt.is_finite() && max_dt > 0.0) {
            return Err(format!(
                "max_dt must be finite and positive, got {max_dt}"
            ));
        }
        Ok(Ias15Config {
            epsilon: 1e-5,
            min_dt: 0.0,
            max_dt,
            safety_factor: 0.25,
            force_is_velocity_dependent: false,
            iterations_max: 12,
            iterations_warning_threshold: 10,
        })
    }

    /// Set the per-particle accuracy target driving adaptive step
    /// selection. A value of `0.0` disables adaptive control entirely
    /// (every particle stays in its current class).
    pub fn with_epsilon(mut self, epsilon: f64) -> Result<Self, String> {
        if !(epsilon.is_finite() && epsilon >= 0.0) {
            return Err(format!("epsilon must be finite and non-negative, got {epsilon}"));
        }
        self.epsilon = epsilon;
        Ok(self)
    }

    /// Set the lower clamp on the adaptively chosen step length.
    pub fn with_min_dt(mut self, min_dt: f64) -> Result<Self, String> {
        if !(min_dt.is_finite() && min_dt >= 0.0) {
            return Err(format!("min_dt must be finite and non-negative, got {min_dt}"));
        }
        self.min_dt = min_dt;
        Ok(self)
    }

    /// Set the damping factor applied to the raw step-size estimate
    /// (reference value `0.25`).
    pub fn with_safety_factor(mut self, safety_factor: f64) -> Result<Self, String> {
        if !(safety_factor.is_finite() && safety_factor > 0.0) {
            return Err(format!(
                "safety_factor must be finite and positive, got {safety_factor}"
            ));
        }
        self.safety_factor = safety_factor;
        Ok(self)
    }

    /// Declare whether the force law this integrator will be driven with
    /// reads velocity. Combined at call time with
    /// [`AdditionalForces::is_velocity_dependent`] — the integrator only
    /// pays for the extra velocity prediction when both agree it is
    /// needed.
    pub fn with_velocity_dependent_forces(mut self, enabled: bool) -> Self {
        self.force_is_velocity_dependent = enabled;
        self
    }

    /// Set the predictor-corrector iteration cap before a step is accepted
    /// regardless of convergence (reference value `12`).
    pub fn with_iterations_max(mut self, iterations_max: u32) -> Result<Self, String> {
        if iterations_max == 0 {
            return Err("iterations_max must be at least 1".to_string());
        }
        self.iterations_max = iterations_max;
        Ok(self)
    }

    /// Set how many iteration-cap hits accumulate before a single warning
    /// is printed (reference value `10`).
    pub fn with_iterations_warning_threshold(mut self, threshold: u64) -> Self {
        self.iterations_warning_threshold = threshold;
        self
    }

    /// Current accuracy target.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Current lower step clamp.
    pub fn min_dt(&self) -> f64 {
        self.min_dt
    }

    /// Current upper step clamp / class-0 step length.
    pub fn max_dt(&self) -> f64 {
        self.max_dt
    }
}

/// Outcome of a single accepted step.
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    /// Step length actually applied to the committed class.
    pub dt: f64,
    /// Number of predictor-corrector iterations performed.
    pub iterations: u32,
    /// `true` if the iteration converged below `1e-16` before the
    /// iteration cap was reached.
    pub converged: bool,
    /// The largest per-component relative correction seen on the final
    /// iteration (`max |Δb6 / a|`).
    pub predictor_corrector_error: f64,
}

/// Owns every scratch buffer the predictor-corrector scheme needs across a
/// step, plus the hierarchical sub-stepping bookkeeping.
///
/// All buffers are indexed `3 * particle_index + component`, growing
/// lazily with [`Ias15Integrator::ensure_capacity`]. Growing the buffers
/// resets every `b`/`g`/`e`/`br`/`er`/`csx`/`csv` entry to zero, including
/// ones belonging to particles that already existed — a new particle
/// entering the simulation costs every other particle its warm-start
/// history for one step.
pub struct Ias15Integrator {
    config: Ias15Config,
    n3_allocated: usize,
    b: [Vec<f64>; 7],
    g: [Vec<f64>; 7],
    e: [Vec<f64>; 7],
    br: [Vec<f64>; 7],
    er: [Vec<f64>; 7],
    x0: Vec<f64>,
    v0: Vec<f64>,
    a0: Vec<f64>,
    at: Vec<f64>,
    csx: Vec<f64>,
    csv: Vec<f64>,
    dtexp: i32,
    dtexp_substep: [u8; 64],
    dtexp_min: i32,
    iterations_max_exceeded: u64,
}

impl Ias15Integrator {
    /// Create an integrator with no history: `dtexp == 0` (coarsest
    /// class), no buffers allocated yet.
    pub fn new(config: Ias15Config) -> Self {
        Ias15Integrator {
            config,
            n3_allocated: 0,
            b: std::array::from_fn(|_| Vec::new()),
            g: std::array::from_fn(|_| Vec::new()),
            e: std::array::from_fn(|_| Vec::new()),
            br: std::array::from_fn(|_| Vec::new()),
            er: std::array::from_fn(|_| Vec::new()),
            x0: Vec::new(),
            v0: Vec::new(),
            a0: Vec::new(),
            at: Vec::new(),
            csx: Vec::new(),
            csv: Vec::new(),
            dtexp: 0,
            dtexp_substep: [0; 64],
            dtexp_min: 0,
            iterations_max_exceeded: 0,
        }
    }

    /// The config this integrator was built with.
    pub fn config(&self) -> &Ias15Config {
        &self.config
    }

    /// Record one more iteration-cap hit, printing a one-time warning the
    /// moment the running count first reaches the configured threshold.
    pub(super) fn note_iteration_cap_hit(&mut self) {
        self.iterations_max_exceeded += 1;
        if self.iterations_max_exceeded == self.config.iterations_warning_threshold {
            eprintln!(
                "ias15: at least {} predictor-corrector iterations failed to converge below the target error; \
                 consider a smaller max_dt or a looser epsilon",
                self.config.iterations_warning_threshold
            );
        }
    }

    /// How many times the predictor-corrector iteration has hit
    /// `iterations_max` without converging, across the integrator's
    /// lifetime.
    pub fn iterations_max_exceeded(&self) -> u64 {
        self.iterations_max_exceeded
    }

    /// Grow every scratch buffer to hold `n3 = 3 * particle_count` entries,
    /// zeroing all of them (including existing entries) if growth was
    /// needed. A no-op if the buffers are already at least this large.
    fn ensure_capacity(&mut self, n3: usize) {
        if n3 <= self.n3_allocated {
            return;
        }
        for k in 0..7 {
            self.b[k] = vec![0.0; n3];
            self.g[k] = vec![0.0; n3];
            self.e[k] = vec![0.0; n3];
            self.br[k] = vec![0.0; n3];
            self.er[k] = vec![0.0; n3];
        }
        self.x0 = vec![0.0; n3];
        self.v0 = vec![0.0; n3];
        self.a0 = vec![0.0; n3];
        self.at = vec![0.0; n3];
        self.csx = vec![0.0; n3];
        self.csv = vec![0.0; n3];
        self.n3_allocated = n3;
    }

    /// The step length the current sub-stepping class would apply, derived
    /// from `max_dt` scaled down by every level of the sub-step hierarchy
    /// currently active.
    fn current_dt(&self) -> f64 {
        let mut dt = self.config.max_dt;
        for i in 0..(-self.dtexp) as usize {
            let st = self.dtexp_substep[i] as usize;
            dt *= H[st + 1] - H[st];
        }
        dt
    }

    /// No-op kept for symmetry with split (predict/correct) integrator
    /// APIs elsewhere in this workspace; IAS15 has nothing useful to do
    /// between `part1` and `part2` since the whole predictor-corrector
    /// cycle runs within a single call.
    pub fn part1(&mut self) {}

    /// Advance `particles` (and `*t`) by one step, calling `force_field`
    /// (and, if present, `additional`) as many times as the
    /// predictor-corrector iteration requires.
    ///
    /// Loops until the step reports success; in this implementation a step
    /// always succeeds — exhausting the iteration cap degrades accuracy
    /// for that step rather than rejecting it — so the loop runs exactly
    /// once. It is kept in this shape because the reference scheme is
    /// written as a retry loop around the step routine, and a future
    /// extension that can genuinely reject a step (e.g. a collision
    /// hook) would slot in here without changing this function's contract.
    pub fn part2(
        &mut self,
        t: &mut f64,
        particles: &mut [Particle],
        force_field: &dyn ForceField,
        additional: Option<&dyn AdditionalForces>,
    ) -> StepReport {
        loop {
            let (report, success) = self.step(t, particles, force_field, additional);
            if success {
                return report;
            }
        }
    }

    fn step(
        &mut self,
        t: &mut f64,
        particles: &mut [Particle],
        force_field: &dyn ForceField,
        additional: Option<&dyn AdditionalForces>,
    ) -> (StepReport, bool) {
        let n = particles.len();
        let n3 = 3 * n;
        self.ensure_capacity(n3);

        let dt = self.current_dt();

        self.predict_b_e(particles, dt);

        for i in 0..n {
            for k in 0..3 {
                let kk = 3 * i + k;
                self.x0[kk] = particles[i].position[k];
                self.v0[kk] = particles[i].velocity[k];
                self.a0[kk] = particles[i].acceleration[k];
            }
        }

        self.compute_g_from_b(n3);

        let velocity_dependent = self.config.force_is_velocity_dependent
            && additional.map_or(false, |a| a.is_velocity_dependent());

        let (iterations, predictor_corrector_error) = self.run_predictor_corrector(
            particles,
            force_field,
            additional,
            velocity_dependent,
            *t,
            dt,
        );

        self.finalize_step(particles, *t, dt);

        self.update_step_control(particles, t, dt);

        let report = StepReport {
            dt,
            iterations,
            converged: predictor_corrector_error < 1e-16,
            predictor_corrector_error,
        };
        (report, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_non_positive_max_dt() {
        assert!(Ias15Config::new(0.0).is_err());
        assert!(Ias15Config::new(-1.0).is_err());
        assert!(Ias15Config::new(f64::NAN).is_err());
        assert!(Ias15Config::new(0.01).is_ok());
    }

    #[test]
    fn config_rejects_negative_epsilon() {
        let config = Ias15Config::new(0.01).unwrap();
        assert!(config.with_epsilon(-1e-6).is_err());
        assert!(config.with_epsilon(0.0).is_ok());
    }

    #[test]
    fn ensure_capacity_grows_and_zeroes_buffers() {
        let config = Ias15Config::new(0.01).unwrap();
        let mut integrator = Ias15Integrator::new(config);
        integrator.ensure_capacity(6);
        integrator.b[0][0] = 42.0;
        integrator.ensure_capacity(9);
        assert_eq!(integrator.b[0][0], 0.0, "growth must reset existing history");
        assert_eq!(integrator.b[0].len(), 9);
    }

    #[test]
    fn current_dt_defaults_to_max_dt_at_class_zero() {
        let config = Ias15Config::new(0.05).unwrap();
        let integrator = Ias15Integrator::new(config);
        assert_eq!(integrator.current_dt(), 0.05);
    }
}
