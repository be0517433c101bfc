use crate::classifier::ClassificationService;
use crate::types::{GestureLabel, SensorFrame};

/// Estados de la máquina de grabación
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    /// Ninguna tecla de etiqueta pulsada
    Idle,
    /// El operador mantiene una etiqueta; se graba cada ciclo
    Recording { label: GestureLabel, cycles: u32 },
}

/// Acción tomada en un ciclo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingAction {
    None,
    Record(GestureLabel),
    Train,
}

/// Graba mientras el operador mantiene una etiqueta y reentrena una sola
/// vez en el primer ciclo sin etiqueta tras la grabación.
#[derive(Debug, Clone)]
pub struct TrainingController {
    state: TrainingState,
    episodes: u32,
}

impl TrainingController {
    pub fn new() -> Self {
        Self {
            state: TrainingState::Idle,
            episodes: 0,
        }
    }

    /// Transición pura: decide la acción del ciclo según la etiqueta pulsada
    pub fn step(&mut self, asserted: Option<GestureLabel>) -> TrainingAction {
        match (self.state, asserted) {
            (TrainingState::Idle, Some(label)) => {
                self.state = TrainingState::Recording { label, cycles: 1 };
                TrainingAction::Record(label)
            }
            (TrainingState::Recording { cycles, .. }, Some(label)) => {
                // Cambiar de etiqueta sin soltar continúa el mismo episodio
                self.state = TrainingState::Recording {
                    label,
                    cycles: cycles.saturating_add(1),
                };
                TrainingAction::Record(label)
            }
            (TrainingState::Recording { .. }, None) => {
                self.state = TrainingState::Idle;
                self.episodes += 1;
                TrainingAction::Train
            }
            (TrainingState::Idle, None) => TrainingAction::None,
        }
    }

    /// Ejecuta la acción del ciclo contra el servicio. Los fallos de
    /// grabación o entrenamiento se registran y no detienen el control.
    pub fn drive<S: ClassificationService + ?Sized>(
        &mut self,
        asserted: Option<GestureLabel>,
        frame: &SensorFrame,
        service: &mut S,
    ) -> TrainingAction {
        let action = self.step(asserted);
        match action {
            TrainingAction::Record(label) => {
                if let Err(e) = service.record(frame, label) {
                    log::warn!("Muestra descartada (clase {}): {}", label, e);
                }
            }
            TrainingAction::Train => {
                log::info!("Grabación terminada, reentrenando...");
                if let Err(e) = service.train() {
                    log::warn!("Entrenamiento fallido: {}", e);
                }
            }
            TrainingAction::None => {}
        }
        action
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, TrainingState::Recording { .. })
    }

    /// Episodios de grabación completados (cada uno con su entrenamiento)
    pub fn episodes(&self) -> u32 {
        self.episodes
    }
}

impl Default for TrainingController {
    fn default() -> Self {
        Self::new()
    }
}
