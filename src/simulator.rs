use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::orientation::Quaternion;
use crate::sensor::{DeviceInfo, SensorEvent};
use crate::types::{Arm, EMG_CHANNELS};

/// Duración de cada pose sintética
const POSE_PERIOD_SECS: f64 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub emg_rate_hz: f64,
    pub orientation_rate_hz: f64,
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            emg_rate_hz: 200.0,
            orientation_rate_hz: 50.0,
            seed: None,
        }
    }
}

/// Poses que la banda simulada recorre en bucle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticPose {
    Rest,
    Fist,
    Spread,
}

impl SyntheticPose {
    pub fn at(t: f64) -> Self {
        match ((t / POSE_PERIOD_SECS) as u64) % 3 {
            0 => SyntheticPose::Rest,
            1 => SyntheticPose::Fist,
            _ => SyntheticPose::Spread,
        }
    }

    /// Amplitud típica por canal
    fn envelope(self) -> [f32; EMG_CHANNELS] {
        match self {
            SyntheticPose::Rest => [3.0; EMG_CHANNELS],
            SyntheticPose::Fist => [60.0, 55.0, 50.0, 45.0, 8.0, 6.0, 6.0, 8.0],
            SyntheticPose::Spread => [6.0, 6.0, 8.0, 10.0, 50.0, 60.0, 55.0, 45.0],
        }
    }
}

/// Generador de EMG y orientación sintéticos
pub struct SimulatedBand {
    rng: StdRng,
}

impl SimulatedBand {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn emg_at(&mut self, t: f64) -> [i8; EMG_CHANNELS] {
        let envelope = SyntheticPose::at(t).envelope();
        let mut out = [0i8; EMG_CHANNELS];
        for (dst, amp) in out.iter_mut().zip(envelope) {
            let v: f32 = self.rng.gen_range(-amp..=amp);
            *dst = v.round().clamp(-128.0, 127.0) as i8;
        }
        out
    }

    /// Rotación lenta alrededor del antebrazo, inclinada según la pose
    pub fn orientation_at(&mut self, t: f64) -> Quaternion {
        let roll = (t * 0.4).sin() as f32 * 1.2;
        let pitch = match SyntheticPose::at(t) {
            SyntheticPose::Rest => 0.0,
            SyntheticPose::Fist => 0.5,
            SyntheticPose::Spread => -0.5,
        };
        let jitter: f32 = self.rng.gen_range(-0.02..=0.02);

        let q_roll = Quaternion::from_axis_angle(1.0, 0.0, 0.0, roll + jitter);
        let q_pitch = Quaternion::from_axis_angle(0.0, 1.0, 0.0, pitch);
        hamilton(q_pitch, q_roll).normalized()
    }
}

fn hamilton(a: Quaternion, b: Quaternion) -> Quaternion {
    Quaternion {
        w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
        y: a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
        z: a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
    }
}

/// Lanza el hilo productor de la banda simulada. Termina cuando el
/// receptor se cierra.
pub fn start_simulated_band(
    config: SimulatorConfig,
    tx: Sender<SensorEvent>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("simulated-band".into())
        .spawn(move || run_simulated_band(config, tx))
}

fn run_simulated_band(config: SimulatorConfig, tx: Sender<SensorEvent>) {
    let mut band = SimulatedBand::new(config.seed);
    let interval = Duration::from_secs_f64(1.0 / config.emg_rate_hz.max(1.0));
    let orientation_every =
        ((config.emg_rate_hz / config.orientation_rate_hz.max(1.0)).round() as u64).max(1);

    let paired = SensorEvent::Paired(DeviceInfo {
        name: "simulated-band".to_string(),
        firmware: "sim-1".to_string(),
    });
    if tx.send(paired).is_err() || tx.send(SensorEvent::ArmSync(Arm::Right)).is_err() {
        return;
    }
    log::info!(
        "Banda simulada emitiendo EMG a {} Hz y orientación cada {} muestras",
        config.emg_rate_hz,
        orientation_every
    );

    let start = Instant::now();
    let mut tick: u64 = 0;
    loop {
        let tick_start = Instant::now();
        let t = start.elapsed().as_secs_f64();
        let timestamp_us = (t * 1e6) as u64;

        let emg = SensorEvent::Emg {
            timestamp_us,
            samples: band.emg_at(t),
        };
        if tx.send(emg).is_err() {
            break;
        }

        if tick % orientation_every == 0 {
            let quat = SensorEvent::Orientation {
                timestamp_us,
                quat: band.orientation_at(t),
            };
            if tx.send(quat).is_err() {
                break;
            }
        }
        tick += 1;

        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
    log::debug!("Banda simulada detenida tras {} muestras", tick);
}
