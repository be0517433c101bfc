use std::ops::{Deref, DerefMut};

use thiserror::Error;

use crate::types::{GestureLabel, SensorFrame};

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Etiqueta fuera de rango: {0}")]
    InvalidLabel(i64),

    #[error("k debe ser mayor que cero")]
    InvalidK,

    #[error("No hay muestras grabadas para entrenar")]
    NotTrained,

    #[error("El servicio ya fue cerrado")]
    ShutDown,
}

/// Servicio de clasificación consumido por el lazo de control.
///
/// Todas las llamadas bloquean el hilo de control. `classify` nunca propaga
/// errores: si no puede decidir devuelve `None`.
pub trait ClassificationService {
    /// Guarda una muestra etiquetada para el próximo entrenamiento
    fn record(&mut self, frame: &SensorFrame, label: GestureLabel) -> Result<(), ClassifierError>;

    /// Reajusta el modelo con todas las muestras grabadas
    fn train(&mut self) -> Result<(), ClassifierError>;

    fn classify(&mut self, frame: &SensorFrame) -> Option<GestureLabel>;

    /// Libera los recursos del servicio
    fn shutdown(&mut self) -> Result<(), ClassifierError>;
}

/// Posee el servicio y garantiza una única llamada a `shutdown`,
/// también cuando se abandona por un error.
pub struct ServiceGuard<S: ClassificationService> {
    service: S,
    closed: bool,
}

impl<S: ClassificationService> ServiceGuard<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            closed: false,
        }
    }

    /// Cierre explícito; consume el guard
    pub fn close(mut self) -> Result<(), ClassifierError> {
        self.closed = true;
        self.service.shutdown()
    }
}

impl<S: ClassificationService> Deref for ServiceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.service
    }
}

impl<S: ClassificationService> DerefMut for ServiceGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.service
    }
}

impl<S: ClassificationService> Drop for ServiceGuard<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.service.shutdown() {
            log::error!("Error cerrando el clasificador: {}", e);
        }
    }
}
