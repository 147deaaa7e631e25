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
//! Per-particle step-size re-estimation and the hierarchical sub-stepping
//! bookkeeping that lets different particles run at different effective
//! step sizes within a single call.

use super::{Ias15Integrator, H};
use crate::particle::Particle;

impl Ias15Integrator {
    /// Re-estimate every particle's step class from the error the just-
    /// finalized step achieved, then advance the sub-step hierarchy and
    /// the caller's clock.
    ///
    /// A particle whose relative error (`|b6 / a|`, maximized over its
    /// three components) comes out non-finite, zero, or subnormal — the
    /// force evaluator returned something unusable, or the acceleration
    /// itself vanished — falls back to class `0`, matching the reference
    /// scheme's behavior when its step-size heuristic cannot be trusted,
    /// realized here with `f64::is_normal` instead of that scheme's
    /// `isnormal`-on-an-integer pattern (which is vacuous: the comparison
    /// it guards, `dtexp_i < dtexp_min` starting from `dtexp_min == 0`,
    /// can only ever be true for a nonzero `dtexp_i` in the first place).
    ///
    /// Before the raw error-based estimate is turned into a class index,
    /// `safety_factor` clamps its ratio to the step just taken to
    /// `[safety_factor, 1 / safety_factor]`, and `min_dt` floors it —
    /// both bound the class the particle can be reassigned to this call.
    pub(super) fn update_step_control(&mut self, particles: &mut [Particle], t: &mut f64, dt: f64) {
        let n = particles.len();
        let active_class = self.dtexp;

        if self.config.epsilon > 0.0 {
            for i in 0..n {
                if particles[i].dtexp != active_class {
                    continue;
                }
                let mut errork_max = 0.0_f64;
                for k in 0..3 {
                    let a = self.at[3 * i + k];
                    let b6 = self.b[6][3 * i + k];
                    let errork = (b6 / a).abs();
                    if errork > errork_max {
                        errork_max = errork;
                    }
                }

                particles[i].dtexp = if errork_max.is_normal() {
                    let raw = (self.config.epsilon / errork_max).powf(1.0 / 7.0) * dt;

                    // safety_factor bounds how much the estimate may swing a
                    // consecutive timestep: the ratio to the step just taken
                    // is clamped to [safety_factor, 1/safety_factor].
                    let shrink_bound = dt * self.config.safety_factor;
                    let grow_bound = dt / self.config.safety_factor;
                    let (lo, hi) = if shrink_bound <= grow_bound {
                        (shrink_bound, grow_bound)
                    } else {
                        (grow_bound, shrink_bound)
                    };
                    let mut dtparticle = raw.max(lo).min(hi);

                    if dtparticle < self.config.min_dt {
                        dtparticle = self.config.min_dt;
                    }

                    let mut dtexp_i = (dtparticle / self.config.max_dt).log(8.0).floor() as i32;
                    if dtexp_i > 0 {
                        dtexp_i = 0;
                    }
                    if dtexp_i < -2 {
                        dtexp_i = -2;
                    }
                    dtexp_i
                } else {
                    0
                };
            }
        }

        self.dtexp_min = 0;
        for particle in particles.iter() {
            if particle.dtexp < self.dtexp_min {
                self.dtexp_min = particle.dtexp;
            }
        }

        let level = (-self.dtexp) as usize;
        self.dtexp_substep[level] += 1;
        *t += dt;

        if self.dtexp_substep[level] == 8 {
            self.dtexp_substep[level] = 0;
            self.dtexp += 1;
            if self.dtexp > 0 {
                self.dtexp = self.dtexp_min;
            } else {
                let mut dtt = self.config.max_dt;
                for i in 0..(-self.dtexp) as usize {
                    let st = self.dtexp_substep[i] as usize;
                    dtt *= H[st + 1] - H[st];
                }
                *t -= dtt;
            }
        } else {
            self.dtexp = self.dtexp_min;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Ias15Config, Ias15Integrator};
    use crate::particle::Particle;

    #[test]
    fn falls_back_to_class_zero_on_non_finite_error() {
        let config = Ias15Config::new(0.01).unwrap();
        let mut integrator = Ias15Integrator::new(config);
        let mut particles = vec![Particle::new([0.0; 3], [0.0; 3])];
        particles[0].dtexp = -2;
        integrator.ensure_capacity(3);
        integrator.dtexp = -2;
        integrator.at[0] = 0.0; // acceleration of zero makes b6/a non-finite
        integrator.b[6][0] = 1.0;

        let mut t = 0.0;
        integrator.update_step_control(&mut particles, &mut t, 0.01);

        assert_eq!(particles[0].dtexp, 0);
    }

    fn reclassify_with(safety_factor: f64, min_dt: f64) -> i32 {
        let config = Ias15Config::new(0.01)
            .unwrap()
            .with_safety_factor(safety_factor)
            .unwrap()
            .with_min_dt(min_dt)
            .unwrap();
        let mut integrator = Ias15Integrator::new(config);
        let mut particles = vec![Particle::new([0.0; 3], [0.0; 3])];
        integrator.ensure_capacity(3);
        integrator.at[0] = 1.0;
        integrator.b[6][0] = 1e10; // huge relative error: the raw estimate wants a far finer step

        let mut t = 0.0;
        integrator.update_step_control(&mut particles, &mut t, 0.01);
        particles[0].dtexp
    }

    #[test]
    fn safety_factor_bounds_how_far_the_step_class_can_shrink() {
        // A looser bound (closer to 1) lets the class shrink less per call
        // than a tighter one, for the same raw error estimate.
        let loose = reclassify_with(0.9, 0.0);
        let tight = reclassify_with(0.1, 0.0);
        assert!(
            loose > tight,
            "looser safety_factor ({loose}) should shrink the class less than a tighter one ({tight})"
        );
    }

    #[test]
    fn min_dt_floors_the_reassigned_step_class() {
        let unfloored = reclassify_with(0.25, 0.0);
        let floored = reclassify_with(0.25, 0.01); // min_dt == max_dt forces class 0
        assert_eq!(floored, 0, "min_dt == max_dt must force the coarsest class");
        assert!(
            floored > unfloored,
            "a nonzero min_dt should raise the class relative to no floor at all"
        );
    }

    #[test]
    fn advances_clock_by_dt() {
        let config = Ias15Config::new(0.01).unwrap();
        let mut integrator = Ias15Integrator::new(config.with_epsilon(0.0).unwrap());
        let mut particles = vec![Particle::new([0.0; 3], [0.0; 3])];
        integrator.ensure_capacity(3);

        let mut t = 1.0;
        integrator.update_step_control(&mut particles, &mut t, 0.01);

        assert!((t - 1.01).abs() < 1e-15);
    }
}
