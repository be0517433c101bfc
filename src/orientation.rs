use std::f64::consts::{FRAC_PI_2, PI};

use crate::types::ANGLE_BUCKETS;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    pub fn normalized(self) -> Self {
        let norm = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z)
            .sqrt()
            .max(1e-9);

        Self {
            w: self.w / norm,
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
        }
    }

    /// Rotación de `angle` radianes alrededor del eje (ax, ay, az)
    pub fn from_axis_angle(ax: f32, ay: f32, az: f32, angle: f32) -> Self {
        let len = (ax * ax + ay * ay + az * az).sqrt().max(1e-9);
        let half = angle * 0.5;
        let s = half.sin() / len;
        Self::new(half.cos(), ax * s, ay * s, az * s)
    }

    /// Ángulos de Euler (roll, pitch, yaw) en radianes.
    /// El argumento del arcoseno se recorta a [-1, 1] para absorber el
    /// error numérico de cuaterniones casi unitarios.
    pub fn to_euler(self) -> EulerAngles {
        let (w, x, y, z) = (self.w as f64, self.x as f64, self.y as f64, self.z as f64);

        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
        let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin();
        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));

        EulerAngles { roll, pitch, yaw }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Ángulos discretizados en [0, 18]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AngleBuckets {
    pub roll: u8,
    pub pitch: u8,
    pub yaw: u8,
}

/// Convierte una orientación en cubetas de ángulo.
///
/// roll y yaw viven en [-π, π], pitch en [-π/2, π/2]; cada rango se
/// reescala linealmente a [0, 18] y se trunca hacia abajo.
pub fn resolve(quat: Quaternion) -> AngleBuckets {
    let euler = quat.to_euler();
    AngleBuckets {
        roll: bucket((euler.roll + PI) / (2.0 * PI)),
        pitch: bucket((euler.pitch + FRAC_PI_2) / PI),
        yaw: bucket((euler.yaw + PI) / (2.0 * PI)),
    }
}

/// `unit` es la posición relativa dentro del rango natural del ángulo
fn bucket(unit: f64) -> u8 {
    let max = ANGLE_BUCKETS as f64;
    // NaN -> 0 con `as`; el clamp mantiene el rango aunque la entrada no sea unitaria
    (unit * max).floor().clamp(0.0, max) as u8
}
