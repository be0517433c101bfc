use crate::emg_window::EmgAggregator;
use crate::orientation::{self, Quaternion};
use crate::sensor::{DeviceInfo, EventSink};
use crate::types::{Arm, SensorFrame, EMG_CHANNELS, EMG_SAMPLE_RATE};

/// Estado actual de la banda y su ventana de energía EMG.
///
/// Es el único que escribe en `SensorFrame`; el resto del pipeline solo lo
/// lee dentro de cada ciclo.
#[derive(Debug, Clone)]
pub struct SensorFrameBuffer {
    frame: SensorFrame,
    energy: EmgAggregator,
    on_arm: Option<Arm>,
    emg_events: u64,
    orientation_events: u64,
}

impl SensorFrameBuffer {
    pub fn new() -> Self {
        Self::with_sample_rate(EMG_SAMPLE_RATE)
    }

    pub fn with_sample_rate(sample_rate_hz: f64) -> Self {
        Self {
            frame: SensorFrame::default(),
            energy: EmgAggregator::with_sample_rate(sample_rate_hz),
            on_arm: None,
            emg_events: 0,
            orientation_events: 0,
        }
    }

    /// Copia literal de las 8 amplitudes (sin suavizado)
    pub fn update_emg(&mut self, samples: &[i8; EMG_CHANNELS]) {
        self.frame.emg = *samples;
        self.energy.push(samples);
        self.emg_events += 1;
    }

    pub fn update_orientation(&mut self, quat: Quaternion) {
        let buckets = orientation::resolve(quat);
        self.frame.roll = buckets.roll;
        self.frame.pitch = buckets.pitch;
        self.frame.yaw = buckets.yaw;
        self.orientation_events += 1;
    }

    /// Todo a cero; la rejilla temporal vuelve a empezar en t=0
    pub fn reset(&mut self) {
        self.frame = SensorFrame::default();
        self.energy.reset();
        self.on_arm = None;
    }

    pub fn frame(&self) -> &SensorFrame {
        &self.frame
    }

    pub fn energy(&self) -> &EmgAggregator {
        &self.energy
    }

    pub fn on_arm(&self) -> Option<Arm> {
        self.on_arm
    }

    pub fn emg_events(&self) -> u64 {
        self.emg_events
    }

    pub fn orientation_events(&self) -> u64 {
        self.orientation_events
    }
}

impl Default for SensorFrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for SensorFrameBuffer {
    fn on_paired(&mut self, info: &DeviceInfo) {
        log::debug!("Frame buffer enlazado a {}", info.name);
    }

    fn on_emg(&mut self, _timestamp_us: u64, samples: &[i8; EMG_CHANNELS]) {
        self.update_emg(samples);
    }

    fn on_orientation(&mut self, _timestamp_us: u64, quat: Quaternion) {
        self.update_orientation(quat);
    }

    fn on_arm_sync(&mut self, arm: Arm) {
        self.on_arm = Some(arm);
    }

    fn on_arm_unsync(&mut self) {
        self.on_arm = None;
    }

    fn on_unpair(&mut self) {
        self.reset();
    }
}
