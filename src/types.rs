use std::fmt;

/// Canales EMG de la banda
pub const EMG_CHANNELS: usize = 8;

/// Slots de la ventana de energía EMG (una por evento EMG)
pub const EMG_BUFFER_SIZE: usize = 10;

/// Valor máximo de un ángulo discretizado (rango [0, 18])
pub const ANGLE_BUCKETS: u8 = 18;

/// Frecuencia de muestreo EMG de la banda
pub const EMG_SAMPLE_RATE: f64 = 200.0; // Hz

/// Frecuencia objetivo del lazo de control
pub const CONTROL_RATE_HZ: u32 = 50;

/// Número de etiquetas que el operador puede asignar (teclas 0..9)
pub const NUM_LABELS: u8 = 10;

/// Tamaño del vector de características: 8 EMG + roll, pitch, yaw
pub const NUM_FEATURES: usize = EMG_CHANNELS + 3;

/// Estado instantáneo de la banda. No es un histórico: se sobrescribe
/// con cada evento del sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorFrame {
    pub emg: [i8; EMG_CHANNELS],
    pub roll: u8,
    pub pitch: u8,
    pub yaw: u8,
}

impl SensorFrame {
    /// Vector plano [emg0..emg7, roll, pitch, yaw] para el clasificador
    pub fn features(&self) -> [f32; NUM_FEATURES] {
        let mut out = [0.0f32; NUM_FEATURES];
        for (dst, &v) in out.iter_mut().zip(self.emg.iter()) {
            *dst = v as f32;
        }
        out[EMG_CHANNELS] = self.roll as f32;
        out[EMG_CHANNELS + 1] = self.pitch as f32;
        out[EMG_CHANNELS + 2] = self.yaw as f32;
        out
    }

    /// Línea de estado compacta: "roll, pitch, yaw [e0][e1]..."
    pub fn status_line(&self) -> String {
        let mut line = format!("{}, {}, {} ", self.roll, self.pitch, self.yaw);
        for v in self.emg {
            line.push_str(&format!("[{}]", v));
        }
        line
    }
}

/// Identificador de clase de gesto en [0, 9].
///
/// La ausencia de clase ("ninguna", -1 en el protocolo del operador) se
/// representa como `Option<GestureLabel>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GestureLabel(u8);

impl GestureLabel {
    pub fn new(id: u8) -> Option<Self> {
        (id < NUM_LABELS).then_some(Self(id))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    /// Convierte el entero del protocolo (-1 = ninguna) en etiqueta
    pub fn from_raw(raw: i32) -> Option<Self> {
        u8::try_from(raw).ok().and_then(Self::new)
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Brazo en el que se sincronizó la banda
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arm {
    Left,
    Right,
}
