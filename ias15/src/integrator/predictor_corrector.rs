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
//! The warm-start, prediction, and Newton divided-difference correction
//! that make up the bulk of a step.

use super::{Ias15Integrator, C, D, H, R};
use crate::forces::{AdditionalForces, ForceField};
use crate::particle::Particle;

impl Ias15Integrator {
    /// Seed `b` and `e` for this step.
    ///
    /// If the particle completed a previous step (`dtdone` is a normal,
    /// nonzero number), `b` and `e` are extrapolated from the previous
    /// step's retained `br`/`er` scaled by the ratio of step lengths — this
    /// is the warm-start that lets the predictor-corrector loop converge
    /// in far fewer iterations than starting from zero. Otherwise both are
    /// zeroed and the first iteration starts cold.
    pub(super) fn predict_b_e(&mut self, particles: &[Particle], dt: f64) {
        for (i, particle) in particles.iter().enumerate() {
            let dtdone = particle.dtdone;
            if dtdone.is_normal() {
                let q1 = dt / dtdone;
                let q2 = q1 * q1;
                let q3 = q1 * q2;
                let q4 = q2 * q2;
                let q5 = q2 * q3;
                let q6 = q3 * q3;
                let q7 = q3 * q4;

                for k in 0..3 {
                    let kk = 3 * i + k;
                    let br = &self.br;
                    let er = &self.er;

                    let e0 = q1
                        * (br[6][kk] * 7.0
                            + br[5][kk] * 6.0
                            + br[4][kk] * 5.0
                            + br[3][kk] * 4.0
                            + br[2][kk] * 3.0
                            + br[1][kk] * 2.0
                            + br[0][kk]);
                    let e1 = q2
                        * (br[6][kk] * 21.0
                            + br[5][kk] * 15.0
                            + br[4][kk] * 10.0
                            + br[3][kk] * 6.0
                            + br[2][kk] * 3.0
                            + br[1][kk]);
                    let e2 = q3
                        * (br[6][kk] * 35.0 + br[5][kk] * 20.0 + br[4][kk] * 10.0 + br[3][kk] * 4.0
                            + br[2][kk]);
                    let e3 = q4 * (br[6][kk] * 35.0 + br[5][kk] * 15.0 + br[4][kk] * 5.0 + br[3][kk]);
                    let e4 = q5 * (br[6][kk] * 21.0 + br[5][kk] * 6.0 + br[4][kk]);
                    let e5 = q6 * (br[6][kk] * 7.0 + br[5][kk]);
                    let e6 = q7 * br[6][kk];

                    let be0 = br[0][kk] - er[0][kk];
                    let be1 = br[1][kk] - er[1][kk];
                    let be2 = br[2][kk] - er[2][kk];
                    let be3 = br[3][kk] - er[3][kk];
                    let be4 = br[4][kk] - er[4][kk];
                    let be5 = br[5][kk] - er[5][kk];
                    let be6 = br[6][kk] - er[6][kk];

                    self.e[0][kk] = e0;
                    self.e[1][kk] = e1;
                    self.e[2][kk] = e2;
                    self.e[3][kk] = e3;
                    self.e[4][kk] = e4;
                    self.e[5][kk] = e5;
                    self.e[6][kk] = e6;

                    self.b[0][kk] = e0 + be0;
                    self.b[1][kk] = e1 + be1;
                    self.b[2][kk] = e2 + be2;
                    self.b[3][kk] = e3 + be3;
                    self.b[4][kk] = e4 + be4;
                    self.b[5][kk] = e5 + be5;
                    self.b[6][kk] = e6 + be6;
                }
            } else {
                for k in 0..3 {
                    let kk = 3 * i + k;
                    for c in 0..7 {
                        self.e[c][kk] = 0.0;
                        self.b[c][kk] = 0.0;
                    }
                }
            }
        }
    }

    /// Newton-form `g` coefficients implied by the current `b`, via the `D`
    /// table. Recomputed once per step right after `predict_b_e`; the
    /// predictor-corrector loop then updates `g` incrementally node by
    /// node.
    pub(super) fn compute_g_from_b(&mut self, n3: usize) {
        for k in 0..n3 {
            self.g[0][k] = self.b[6][k] * D[15]
                + self.b[5][k] * D[10]
                + self.b[4][k] * D[6]
                + self.b[3][k] * D[3]
                + self.b[2][k] * D[1]
                + self.b[1][k] * D[0]
                + self.b[0][k];
            self.g[1][k] = self.b[6][k] * D[16]
                + self.b[5][k] * D[11]
                + self.b[4][k] * D[7]
                + self.b[3][k] * D[4]
                + self.b[2][k] * D[2]
                + self.b[1][k];
            self.g[2][k] =
                self.b[6][k] * D[17] + self.b[5][k] * D[12] + self.b[4][k] * D[8] + self.b[3][k] * D[5]
                    + self.b[2][k];
            self.g[3][k] = self.b[6][k] * D[18] + self.b[5][k] * D[13] + self.b[4][k] * D[9] + self.b[3][k];
            self.g[4][k] = self.b[6][k] * D[19] + self.b[5][k] * D[14] + self.b[4][k];
            self.g[5][k] = self.b[6][k] * D[20] + self.b[5][k];
            self.g[6][k] = self.b[6][k];
        }
    }

    /// Run the predictor-corrector iteration to convergence (or until it
    /// oscillates, or the iteration cap is reached), returning the number
    /// of iterations performed and the convergence error on the last one.
    pub(super) fn run_predictor_corrector(
        &mut self,
        particles: &mut [Particle],
        force_field: &dyn ForceField,
        additional: Option<&dyn AdditionalForces>,
        velocity_dependent: bool,
        t: f64,
        dt: f64,
    ) -> (u32, f64) {
        let n = particles.len();
        let mut predictor_corrector_error = 1e300_f64;
        let mut predictor_corrector_error_last = 2.0_f64;
        let mut iterations: u32 = 0;

        loop {
            if predictor_corrector_error < 1e-16 {
                break;
            }
            if iterations > 2 && predictor_corrector_error_last <= predictor_corrector_error {
                // Error stopped improving: accept the best iteration seen.
                break;
            }
            if iterations >= self.config.iterations_max {
                self.note_iteration_cap_hit();
                break;
            }
            predictor_corrector_error_last = predictor_corrector_error;
            predictor_corrector_error = 0.0;
            iterations += 1;

            for node in 1..=7usize {
                self.predict_positions(particles, node, t, dt);

                if velocity_dependent {
                    self.predict_velocities(particles, node, dt);
                }

                force_field.evaluate(particles);
                if let Some(add) = additional {
                    add.apply(particles);
                }

                for i in 0..n {
                    if particles[i].dtexp != self.dtexp {
                        continue;
                    }
                    for k in 0..3 {
                        self.at[3 * i + k] = particles[i].acceleration[k];
                    }
                }

                let err = self.newton_update(particles, node);
                if err > predictor_corrector_error {
                    predictor_corrector_error = err;
                }
            }
        }

        (iterations, predictor_corrector_error)
    }

    fn predict_positions(&self, particles: &mut [Particle], node: usize, t: f64, dt: f64) {
        for i in 0..particles.len() {
            if particles[i].dtexp < self.dtexp {
                // This particle is in a coarser class than the one being
                // advanced right now: reuse the position cached the last
                // time this node was visited rather than predicting fresh.
                let level = (-self.dtexp + 1) as usize;
                particles[i].position = particles[i].past.get(level, node);
                continue;
            }

            let hn = H[node] + (t - particles[i].tdone) / dt;
            let s = position_step_constants(dt, hn);
            for k in 0..3 {
                let kk = 3 * i + k;
                let delta = s[8] * self.b[6][kk]
                    + s[7] * self.b[5][kk]
                    + s[6] * self.b[4][kk]
                    + s[5] * self.b[3][kk]
                    + s[4] * self.b[2][kk]
                    + s[3] * self.b[1][kk]
                    + s[2] * self.b[0][kk]
                    + s[1] * self.a0[kk]
                    + s[0] * self.v0[kk];
                particles[i].position[k] = self.x0[kk] + delta;
            }
        }
    }

    fn predict_velocities(&self, particles: &mut [Particle], node: usize, dt: f64) {
        let s = velocity_step_constants(dt, H[node]);
        for i in 0..particles.len() {
            for k in 0..3 {
                let kk = 3 * i + k;
                let delta = s[7] * self.b[6][kk]
                    + s[6] * self.b[5][kk]
                    + s[5] * self.b[4][kk]
                    + s[4] * self.b[3][kk]
                    + s[3] * self.b[2][kk]
                    + s[2] * self.b[1][kk]
                    + s[1] * self.b[0][kk]
                    + s[0] * self.a0[kk];
                particles[i].velocity[k] = self.v0[kk] + delta;
            }
        }
    }

    /// Fold the acceleration sampled at `node` into `g[node - 1]` (Newton
    /// divided-difference form) and propagate the change into
    /// `b[0..node]`. Returns the largest `|Δb6 / a|` seen this call (only
    /// meaningful, and only computed, at `node == 7`).
    fn newton_update(&mut self, particles: &[Particle], node: usize) -> f64 {
        let n = particles.len();
        let mut max_err = 0.0_f64;
        let dtexp = self.dtexp;

        match node {
            1 => {
                for i in 0..n {
                    if particles[i].dtexp != dtexp {
                        continue;
                    }
                    for k in 0..3 {
                        let kk = 3 * i + k;
                        let tmp = self.g[0][kk];
                        self.g[0][kk] = (self.at[kk] - self.a0[kk]) / R[0];
                        self.b[0][kk] += self.g[0][kk] - tmp;
                    }
                }
            }
            2 => {
                for i in 0..n {
                    if particles[i].dtexp != dtexp {
                        continue;
                    }
                    for k in 0..3 {
                        let kk = 3 * i + k;
                        let tmp = self.g[1][kk];
                        let gk = self.at[kk] - self.a0[kk];
                        self.g[1][kk] = (gk / R[1] - self.g[0][kk]) / R[2];
                        let delta = self.g[1][kk] - tmp;
                        self.b[0][kk] += delta * C[0];
                        self.b[1][kk] += delta;
                    }
                }
            }
            3 => {
                for i in 0..n {
                    if particles[i].dtexp != dtexp {
                        continue;
                    }
                    for k in 0..3 {
                        let kk = 3 * i + k;
                        let tmp = self.g[2][kk];
                        let gk = self.at[kk] - self.a0[kk];
                        self.g[2][kk] = ((gk / R[3] - self.g[0][kk]) / R[4] - self.g[1][kk]) / R[5];
                        let delta = self.g[2][kk] - tmp;
                        self.b[0][kk] += delta * C[1];
                        self.b[1][kk] += delta * C[2];
                        self.b[2][kk] += delta;
                    }
                }
            }
            4 => {
                for i in 0..n {
                    if particles[i].dtexp != dtexp {
                        continue;
                    }
                    for k in 0..3 {
                        let kk = 3 * i + k;
                        let tmp = self.g[3][kk];
                        let gk = self.at[kk] - self.a0[kk];
                        self.g[3][kk] = (((gk / R[6] - self.g[0][kk]) / R[7] - self.g[1][kk]) / R[8]
                            - self.g[2][kk])
                            / R[9];
                        let delta = self.g[3][kk] - tmp;
                        self.b[0][kk] += delta * C[3];
                        self.b[1][kk] += delta * C[4];
                        self.b[2][kk] += delta * C[5];
                        self.b[3][kk] += delta;
                    }
                }
            }
            5 => {
                for i in 0..n {
                    if particles[i].dtexp != dtexp {
                        continue;
                    }
                    for k in 0..3 {
                        let kk = 3 * i + k;
                        let tmp = self.g[4][kk];
                        let gk = self.at[kk] - self.a0[kk];
                        self.g[4][kk] = ((((gk / R[10] - self.g[0][kk]) / R[11] - self.g[1][kk]) / R[12]
                            - self.g[2][kk])
                            / R[13]
                            - self.g[3][kk])
                            / R[14];
                        let delta = self.g[4][kk] - tmp;
                        self.b[0][kk] += delta * C[6];
                        self.b[1][kk] += delta * C[7];
                        self.b[2][kk] += delta * C[8];
                        self.b[3][kk] += delta * C[9];
                        self.b[4][kk] += delta;
                    }
                }
            }
            6 => {
                for i in 0..n {
                    if particles[i].dtexp != dtexp {
                        continue;
                    }
                    for k in 0..3 {
                        let kk = 3 * i + k;
                        let tmp = self.g[5][kk];
                        let gk = self.at[kk] - self.a0[kk];
                        self.g[5][kk] = (((((gk / R[15] - self.g[0][kk]) / R[16] - self.g[1][kk]) / R[17]
                            - self.g[2][kk])
                            / R[18]
                            - self.g[3][kk])
                            / R[19]
                            - self.g[4][kk])
                            / R[20];
                        let delta = self.g[5][kk] - tmp;
                        self.b[0][kk] += delta * C[10];
                        self.b[1][kk] += delta * C[11];
                        self.b[2][kk] += delta * C[12];
                        self.b[3][kk] += delta * C[13];
                        self.b[4][kk] += delta * C[14];
                        self.b[5][kk] += delta;
                    }
                }
            }
            7 => {
                for i in 0..n {
                    if particles[i].dtexp != dtexp {
                        continue;
                    }
                    for k in 0..3 {
                        let kk = 3 * i + k;
                        let tmp = self.g[6][kk];
                        let gk = self.at[kk] - self.a0[kk];
                        self.g[6][kk] = ((((((gk / R[21] - self.g[0][kk]) / R[22] - self.g[1][kk])
                            / R[23]
                            - self.g[2][kk])
                            / R[24]
                            - self.g[3][kk])
                            / R[25]
                            - self.g[4][kk])
                            / R[26]
                            - self.g[5][kk])
                            / R[27];
                        let delta = self.g[6][kk] - tmp;
                        self.b[0][kk] += delta * C[15];
                        self.b[1][kk] += delta * C[16];
                        self.b[2][kk] += delta * C[17];
                        self.b[3][kk] += delta * C[18];
                        self.b[4][kk] += delta * C[19];
                        self.b[5][kk] += delta * C[20];
                        self.b[6][kk] += delta;

                        let errork = (delta / self.at[kk]).abs();
                        if errork.is_normal() && errork > max_err {
                            max_err = errork;
                        }
                    }
                }
            }
            _ => unreachable!("Gauss-Radau sub-node index out of range"),
        }

        max_err
    }
}

/// Position-prediction weights `s[0..=8]` at normalized offset `hn`.
fn position_step_constants(dt: f64, hn: f64) -> [f64; 9] {
    let mut s = [0.0; 9];
    s[0] = dt * hn;
    s[1] = s[0] * s[0] / 2.0;
    s[2] = s[1] * hn / 3.0;
    s[3] = s[2] * hn / 2.0;
    s[4] = 3.0 * s[3] * hn / 5.0;
    s[5] = 2.0 * s[4] * hn / 3.0;
    s[6] = 5.0 * s[5] * hn / 7.0;
    s[7] = 3.0 * s[6] * hn / 4.0;
    s[8] = 7.0 * s[7] * hn / 9.0;
    s
}

/// Velocity-prediction weights `s[0..=7]` at normalized offset `hn`.
fn velocity_step_constants(dt: f64, hn: f64) -> [f64; 8] {
    let mut s = [0.0; 8];
    s[0] = dt * hn;
    s[1] = s[0] * hn / 2.0;
    s[2] = 2.0 * s[1] * hn / 3.0;
    s[3] = 3.0 * s[2] * hn / 4.0;
    s[4] = 4.0 * s[3] * hn / 5.0;
    s[5] = 5.0 * s[4] * hn / 6.0;
    s[6] = 6.0 * s[5] * hn / 7.0;
    s[7] = 7.0 * s[6] * hn / 8.0;
    s
}
