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
//! Committing a converged (or cap-exhausted) predictor-corrector result
//! back into the particle store.

use super::Ias15Integrator;
use crate::particle::Particle;

impl Ias15Integrator {
    /// Integrate the fitted polynomial across the full step for every
    /// particle in the currently active class, using Kahan-compensated
    /// summation so the position/velocity residual below `f64` precision
    /// is not silently dropped step after step. Particles outside the
    /// active class are left where the last predictor iteration put them
    /// (their `x0` does not change) but still get a cache entry recorded
    /// for coarser-class lookups.
    pub(super) fn finalize_step(&mut self, particles: &mut [Particle], t: f64, dt: f64) {
        let dt2 = dt * dt;
        let active_class = self.dtexp;

        for (i, particle) in particles.iter_mut().enumerate() {
            if particle.dtexp == active_class {
                for k in 0..3 {
                    let kk = 3 * i + k;

                    let previous_x = self.x0[kk];
                    self.csx[kk] += (self.b[6][kk] / 72.0
                        + self.b[5][kk] / 56.0
                        + self.b[4][kk] / 42.0
                        + self.b[3][kk] / 30.0
                        + self.b[2][kk] / 20.0
                        + self.b[1][kk] / 12.0
                        + self.b[0][kk] / 6.0
                        + self.a0[kk] / 2.0)
                        * dt2
                        + self.v0[kk] * dt;
                    self.x0[kk] = previous_x + self.csx[kk];
                    self.csx[kk] += previous_x - self.x0[kk];

                    let previous_v = self.v0[kk];
                    self.csv[kk] += (self.b[6][kk] / 8.0
                        + self.b[5][kk] / 7.0
                        + self.b[4][kk] / 6.0
                        + self.b[3][kk] / 5.0
                        + self.b[2][kk] / 4.0
                        + self.b[1][kk] / 3.0
                        + self.b[0][kk] / 2.0
                        + self.a0[kk])
                        * dt;
                    self.v0[kk] = previous_v + self.csv[kk];
                    self.csv[kk] += previous_v - self.v0[kk];

                    for c in 0..7 {
                        self.er[c][kk] = self.e[c][kk];
                        self.br[c][kk] = self.b[c][kk];
                    }
                }

                particle.position = [self.x0[3 * i], self.x0[3 * i + 1], self.x0[3 * i + 2]];
                particle.velocity = [self.v0[3 * i], self.v0[3 * i + 1], self.v0[3 * i + 2]];
                particle.tdone = t + dt;
                particle.dtdone = dt;
            } else {
                particle.position = [self.x0[3 * i], self.x0[3 * i + 1], self.x0[3 * i + 2]];
            }

            let level = (-active_class) as usize;
            let sub_index = self.dtexp_substep[level] as usize;
            particle.past.set(level, sub_index, particle.position);
        }
    }
}
