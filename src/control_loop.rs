use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::classifier::{ClassificationService, ClassifierError, ServiceGuard};
use crate::dispatch::{ControlDispatcher, ControlSink, DispatchOutcome};
use crate::frame_buffer::SensorFrameBuffer;
use crate::operator::LabelInput;
use crate::sensor::{SensorError, SensorHub};
use crate::training::{TrainingAction, TrainingController};
use crate::types::GestureLabel;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Sensor: {0}")]
    Sensor(#[from] SensorError),

    #[error("Clasificador: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Contadores de una ejecución del lazo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub records: u64,
    pub trainings: u64,
    pub sent: u64,
    pub send_failures: u64,
    /// Ciclos en que el clasificador no devolvió clase
    pub misses: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ciclos, {} muestras, {} entrenamientos, {} mensajes ({} fallidos), {} sin clase",
            self.cycles, self.records, self.trainings, self.sent, self.send_failures, self.misses
        )
    }
}

/// Lo ocurrido en un ciclo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub action: TrainingAction,
    pub classified: Option<GestureLabel>,
    pub outcome: DispatchOutcome,
}

/// Contexto propio del hilo de control: frame, máquina de grabación,
/// clasificador y despacho. Nada de esto se comparte con otros hilos.
pub struct Pipeline<C: ClassificationService, S: ControlSink> {
    buffer: SensorFrameBuffer,
    training: TrainingController,
    service: ServiceGuard<C>,
    dispatcher: ControlDispatcher<S>,
    summary: RunSummary,
}

impl<C: ClassificationService, S: ControlSink> Pipeline<C, S> {
    pub fn new(buffer: SensorFrameBuffer, service: C, sink: S) -> Self {
        Self::from_guard(buffer, ServiceGuard::new(service), sink)
    }

    /// Para servicios que ya se protegieron antes de montar el pipeline
    pub fn from_guard(buffer: SensorFrameBuffer, service: ServiceGuard<C>, sink: S) -> Self {
        Self {
            buffer,
            training: TrainingController::new(),
            service,
            dispatcher: ControlDispatcher::new(sink),
            summary: RunSummary::default(),
        }
    }

    /// Grabación/entrenamiento, clasificación y despacho sobre el frame actual
    pub fn cycle(&mut self, asserted: Option<GestureLabel>) -> CycleReport {
        let frame = *self.buffer.frame();

        let action = self.training.drive(asserted, &frame, &mut *self.service);
        let classified = self.service.classify(&frame);
        let outcome = self.dispatcher.dispatch(classified);

        self.summary.cycles += 1;
        match action {
            TrainingAction::Record(_) => self.summary.records += 1,
            TrainingAction::Train => self.summary.trainings += 1,
            TrainingAction::None => {}
        }
        match outcome {
            DispatchOutcome::Sent(_) => self.summary.sent += 1,
            DispatchOutcome::Failed(_) => self.summary.send_failures += 1,
            DispatchOutcome::Silent => {}
        }
        if classified.is_none() {
            self.summary.misses += 1;
        }

        log::trace!(
            "{} -> {}",
            frame.status_line(),
            classified.map_or_else(|| "-".to_string(), |l| l.to_string())
        );

        CycleReport {
            action,
            classified,
            outcome,
        }
    }

    pub fn buffer(&self) -> &SensorFrameBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut SensorFrameBuffer {
        &mut self.buffer
    }

    pub fn training(&self) -> &TrainingController {
        &self.training
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Cierra el clasificador y devuelve los contadores
    pub fn finish(self) -> Result<RunSummary, ClassifierError> {
        let Pipeline {
            service, summary, ..
        } = self;
        service.close()?;
        Ok(summary)
    }
}

/// Lazo de cadencia fija: bombea eventos de la banda durante lo que queda
/// del intervalo, consulta al operador y ejecuta un ciclo del pipeline.
pub struct ControlLoop<H, I, C, S>
where
    H: SensorHub,
    I: LabelInput,
    C: ClassificationService,
    S: ControlSink,
{
    hub: H,
    input: I,
    pipeline: Pipeline<C, S>,
    interval: Duration,
    max_cycles: Option<u64>,
}

impl<H, I, C, S> ControlLoop<H, I, C, S>
where
    H: SensorHub,
    I: LabelInput,
    C: ClassificationService,
    S: ControlSink,
{
    pub fn new(hub: H, input: I, pipeline: Pipeline<C, S>, interval: Duration) -> Self {
        Self {
            hub,
            input,
            pipeline,
            interval,
            max_cycles: None,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Corre hasta que el operador pide salir, la fuente de eventos se
    /// agota o se alcanza `max_cycles`. El clasificador se cierra una vez
    /// en todos los caminos de salida, también con error.
    pub fn run(self) -> Result<RunSummary, ControlError> {
        let ControlLoop {
            mut hub,
            mut input,
            mut pipeline,
            interval,
            max_cycles,
        } = self;

        let mut deadline = Instant::now() + interval;
        loop {
            if max_cycles.is_some_and(|max| pipeline.summary().cycles >= max) {
                log::info!("Límite de ciclos alcanzado");
                break;
            }

            let budget = deadline.saturating_duration_since(Instant::now());
            match hub.run(budget, pipeline.buffer_mut()) {
                Ok(()) => {}
                Err(SensorError::Disconnected) => {
                    log::info!("Fuente de eventos agotada, terminando");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            deadline += interval;
            if deadline < now {
                // Ciclo atrasado (entrenamiento lento): se retoma la cadencia
                deadline = now + interval;
            }

            let operator = input.poll();
            if operator.quit {
                log::info!("Salida pedida por el operador");
                break;
            }

            let report = pipeline.cycle(operator.label);
            if report.action == TrainingAction::Train {
                log::info!(
                    "Episodio {} entrenado",
                    pipeline.training().episodes()
                );
            }
        }

        Ok(pipeline.finish()?)
    }
}
