use std::collections::VecDeque;

use crate::types::{EMG_BUFFER_SIZE, EMG_CHANNELS, EMG_SAMPLE_RATE};

/// Ventana deslizante de energía EMG (suma de |amplitud| de los 8 canales).
///
/// Mantiene siempre `EMG_BUFFER_SIZE` slots: cada evento descarta el más
/// antiguo y añade el nuevo al final. Junto a ella vive la rejilla temporal
/// de la ventana, reconstruida desde t=0 en cada reset.
#[derive(Debug, Clone)]
pub struct EmgAggregator {
    energy: VecDeque<u32>,
    time_grid: Vec<f64>,
    sample_interval: f64,
}

impl EmgAggregator {
    pub fn new() -> Self {
        Self::with_sample_rate(EMG_SAMPLE_RATE)
    }

    pub fn with_sample_rate(sample_rate_hz: f64) -> Self {
        let mut agg = Self {
            energy: VecDeque::with_capacity(EMG_BUFFER_SIZE),
            time_grid: Vec::with_capacity(EMG_BUFFER_SIZE),
            sample_interval: 1.0 / sample_rate_hz,
        };
        agg.reset();
        agg
    }

    /// Añade la energía de un evento EMG
    pub fn push(&mut self, samples: &[i8; EMG_CHANNELS]) -> u32 {
        let sum = energy_of(samples);
        self.energy.pop_front();
        self.energy.push_back(sum);
        sum
    }

    /// Ventana a cero y rejilla temporal reconstruida (desconexión)
    pub fn reset(&mut self) {
        self.energy.clear();
        self.energy.resize(EMG_BUFFER_SIZE, 0);

        self.time_grid.clear();
        let mut t = 0.0;
        for _ in 0..EMG_BUFFER_SIZE {
            self.time_grid.push(t);
            t += self.sample_interval;
        }
    }

    /// Energías en orden cronológico (la más reciente al final)
    pub fn window(&self) -> Vec<u32> {
        self.energy.iter().copied().collect()
    }

    pub fn latest(&self) -> u32 {
        self.energy.back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    pub fn time_grid(&self) -> &[f64] {
        &self.time_grid
    }

    pub fn sample_interval(&self) -> f64 {
        self.sample_interval
    }
}

impl Default for EmgAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Σ|amplitud| sobre los canales
pub fn energy_of(samples: &[i8; EMG_CHANNELS]) -> u32 {
    samples.iter().map(|&v| (v as i32).unsigned_abs()).sum()
}
