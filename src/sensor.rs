use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use crate::orientation::Quaternion;
use crate::types::{Arm, EMG_CHANNELS};

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("No se encontró ninguna banda en {0:?}")]
    NotFound(Duration),

    #[error("La fuente de eventos se desconectó")]
    Disconnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Fila {line} inválida: {msg}")]
    Parse { line: usize, msg: String },
}

/// Identidad de la banda emparejada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub firmware: String,
}

/// Evento entregado por la banda, en el orden en que se produjo
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Paired(DeviceInfo),
    Emg {
        timestamp_us: u64,
        samples: [i8; EMG_CHANNELS],
    },
    Orientation {
        timestamp_us: u64,
        quat: Quaternion,
    },
    ArmSync(Arm),
    ArmUnsync,
    Unpaired,
}

impl SensorEvent {
    /// Despacha el evento al método correspondiente del receptor
    pub fn deliver(&self, sink: &mut dyn EventSink) {
        match self {
            SensorEvent::Paired(info) => sink.on_paired(info),
            SensorEvent::Emg {
                timestamp_us,
                samples,
            } => sink.on_emg(*timestamp_us, samples),
            SensorEvent::Orientation { timestamp_us, quat } => {
                sink.on_orientation(*timestamp_us, *quat)
            }
            SensorEvent::ArmSync(arm) => sink.on_arm_sync(*arm),
            SensorEvent::ArmUnsync => sink.on_arm_unsync(),
            SensorEvent::Unpaired => sink.on_unpair(),
        }
    }
}

/// Receptor de eventos de la banda. Cada método es opcional: un receptor
/// implementa solo los eventos que le interesan.
pub trait EventSink {
    fn on_paired(&mut self, _info: &DeviceInfo) {}
    fn on_emg(&mut self, _timestamp_us: u64, _samples: &[i8; EMG_CHANNELS]) {}
    fn on_orientation(&mut self, _timestamp_us: u64, _quat: Quaternion) {}
    fn on_arm_sync(&mut self, _arm: Arm) {}
    fn on_arm_unsync(&mut self) {}
    fn on_unpair(&mut self) {}
}

/// Colaborador que entrega los eventos de la banda.
pub trait SensorHub {
    /// Bloquea hasta que aparece una banda o vence `timeout`
    fn wait_for_device(&mut self, timeout: Duration) -> Result<DeviceInfo, SensorError>;

    /// Entrega los eventos pendientes a `sink` durante como máximo `budget`.
    /// Bloquea hasta agotar el presupuesto.
    fn run(&mut self, budget: Duration, sink: &mut dyn EventSink) -> Result<(), SensorError>;
}

/// Hub alimentado por un hilo productor a través de un canal acotado.
/// El orden de entrega es el orden de envío.
pub struct ChannelHub {
    rx: Receiver<SensorEvent>,
    device: Option<DeviceInfo>,
    /// Eventos llegados antes del emparejamiento
    early: Vec<SensorEvent>,
}

impl ChannelHub {
    /// Crea el hub y el extremo emisor para el productor
    pub fn new(capacity: usize) -> (Sender<SensorEvent>, Self) {
        let (tx, rx) = bounded(capacity);
        (
            tx,
            Self {
                rx,
                device: None,
                early: Vec::new(),
            },
        )
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }
}

impl SensorHub for ChannelHub {
    fn wait_for_device(&mut self, timeout: Duration) -> Result<DeviceInfo, SensorError> {
        if let Some(info) = &self.device {
            return Ok(info.clone());
        }

        let deadline = Instant::now() + timeout;
        loop {
            match self.rx.recv_deadline(deadline) {
                Ok(SensorEvent::Paired(info)) => {
                    log::info!("Banda emparejada: {} ({})", info.name, info.firmware);
                    self.device = Some(info.clone());
                    return Ok(info);
                }
                Ok(other) => self.early.push(other),
                Err(RecvTimeoutError::Timeout) => return Err(SensorError::NotFound(timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(SensorError::Disconnected),
            }
        }
    }

    fn run(&mut self, budget: Duration, sink: &mut dyn EventSink) -> Result<(), SensorError> {
        for event in self.early.drain(..) {
            event.deliver(sink);
        }

        let deadline = Instant::now() + budget;
        loop {
            // recv_deadline entrega lo que haya en cola aunque el plazo haya
            // vencido; con un productor más rápido no se saldría nunca
            if Instant::now() >= deadline {
                return Ok(());
            }
            match self.rx.recv_deadline(deadline) {
                Ok(event) => {
                    if let SensorEvent::Paired(info) = &event {
                        self.device = Some(info.clone());
                    }
                    if matches!(event, SensorEvent::Unpaired) {
                        log::warn!("Banda desconectada");
                        self.device = None;
                    }
                    event.deliver(sink);
                }
                Err(RecvTimeoutError::Timeout) => return Ok(()),
                Err(RecvTimeoutError::Disconnected) => return Err(SensorError::Disconnected),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collector {
        emg: Vec<[i8; EMG_CHANNELS]>,
        orientations: usize,
        order: Vec<&'static str>,
    }

    impl EventSink for Collector {
        fn on_emg(&mut self, _ts: u64, samples: &[i8; EMG_CHANNELS]) {
            self.emg.push(*samples);
            self.order.push("emg");
        }

        fn on_orientation(&mut self, _ts: u64, _quat: Quaternion) {
            self.orientations += 1;
            self.order.push("quat");
        }

        fn on_unpair(&mut self) {
            self.order.push("unpair");
        }
    }

    fn band() -> DeviceInfo {
        DeviceInfo {
            name: "test-band".to_string(),
            firmware: "1.0".to_string(),
        }
    }

    #[test]
    fn discovery_times_out_without_device() {
        let (_tx, mut hub) = ChannelHub::new(8);
        let err = hub.wait_for_device(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, SensorError::NotFound(_)));
    }

    #[test]
    fn events_are_delivered_in_order() {
        let (tx, mut hub) = ChannelHub::new(16);
        tx.send(SensorEvent::Emg {
            timestamp_us: 0,
            samples: [1; EMG_CHANNELS],
        })
        .unwrap();
        tx.send(SensorEvent::Paired(band())).unwrap();
        tx.send(SensorEvent::Orientation {
            timestamp_us: 1,
            quat: Quaternion::IDENTITY,
        })
        .unwrap();
        tx.send(SensorEvent::Unpaired).unwrap();
        tx.send(SensorEvent::Emg {
            timestamp_us: 2,
            samples: [2; EMG_CHANNELS],
        })
        .unwrap();

        assert_eq!(hub.wait_for_device(Duration::from_millis(50)).unwrap(), band());

        let mut sink = Collector::default();
        hub.run(Duration::from_millis(10), &mut sink).unwrap();
        assert_eq!(sink.order, vec!["emg", "quat", "unpair", "emg"]);
        assert_eq!(sink.emg, vec![[1; EMG_CHANNELS], [2; EMG_CHANNELS]]);
        assert!(hub.device().is_none());
    }

    #[test]
    fn run_respects_budget_when_idle() {
        let (_tx, mut hub) = ChannelHub::new(8);
        let mut sink = Collector::default();
        let start = Instant::now();
        hub.run(Duration::from_millis(15), &mut sink).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(15));
        assert_eq!(sink.orientations, 0);
    }

    #[test]
    fn flooding_producer_cannot_stall_the_pump() {
        let (tx, mut hub) = ChannelHub::new(1024);
        let producer = std::thread::spawn(move || {
            let event = SensorEvent::Emg {
                timestamp_us: 0,
                samples: [3; EMG_CHANNELS],
            };
            while tx.send(event.clone()).is_ok() {}
        });
        // Cola llena antes de bombear
        while hub.rx.len() < 1024 {
            std::thread::sleep(Duration::from_millis(1));
        }

        let mut sink = Collector::default();
        let start = Instant::now();
        hub.run(Duration::from_millis(20), &mut sink).unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed < Duration::from_millis(500), "elapsed={:?}", elapsed);
        assert!(!sink.emg.is_empty());

        drop(hub);
        producer.join().unwrap();
    }

    #[test]
    fn producer_hangup_is_reported() {
        let (tx, mut hub) = ChannelHub::new(8);
        drop(tx);
        let mut sink = Collector::default();
        let err = hub.run(Duration::from_millis(10), &mut sink).unwrap_err();
        assert!(matches!(err, SensorError::Disconnected));
    }
}
