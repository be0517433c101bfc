use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use csv::{ReaderBuilder, StringRecord};

use crate::orientation::Quaternion;
use crate::sensor::{DeviceInfo, SensorError, SensorEvent};
use crate::types::{Arm, EMG_CHANNELS};

/// Evento de una sesión grabada con su instante relativo
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub t_ms: u64,
    pub event: SensorEvent,
}

/// Carga una sesión en el formato t_ms,kind,v0..v7.
///
/// kind: `emg` (8 amplitudes), `quat` (w,x,y,z), `pair` (nombre opcional),
/// `sync` (L|R), `unsync`, `unpair`. Las filas deben venir ordenadas por t_ms.
pub fn load_session(path: impl AsRef<Path>) -> Result<Vec<TimedEvent>, SensorError> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut events = Vec::new();
    let mut last_t = 0u64;
    for (row_idx, result) in reader.records().enumerate() {
        let line = row_idx + 2;
        let record = result?;
        let timed = parse_record(&record, line)?;
        if timed.t_ms < last_t {
            return Err(SensorError::Parse {
                line,
                msg: format!("t_ms {} anterior a {}", timed.t_ms, last_t),
            });
        }
        last_t = timed.t_ms;
        events.push(timed);
    }

    log::info!("Sesión {:?}: {} eventos, {} ms", path, events.len(), last_t);
    Ok(events)
}

fn parse_record(record: &StringRecord, line: usize) -> Result<TimedEvent, SensorError> {
    let bad = |msg: &str| SensorError::Parse {
        line,
        msg: msg.to_string(),
    };

    if record.len() < 2 {
        return Err(bad("se esperan al menos t_ms,kind"));
    }
    let t_ms: u64 = record[0].parse().map_err(|_| bad("t_ms inválido"))?;
    let field = |idx: usize| record.get(2 + idx).filter(|s| !s.is_empty());
    let timestamp_us = || t_ms.checked_mul(1000).ok_or_else(|| bad("t_ms fuera de rango"));

    let event = match record[1].to_ascii_lowercase().as_str() {
        "emg" => {
            let mut samples = [0i8; EMG_CHANNELS];
            for (ch, dst) in samples.iter_mut().enumerate() {
                *dst = field(ch)
                    .ok_or_else(|| bad("faltan canales EMG"))?
                    .parse()
                    .map_err(|_| bad("amplitud EMG inválida"))?;
            }
            SensorEvent::Emg {
                timestamp_us: timestamp_us()?,
                samples,
            }
        }
        "quat" => {
            let mut q = [0.0f32; 4];
            for (i, dst) in q.iter_mut().enumerate() {
                *dst = field(i)
                    .ok_or_else(|| bad("faltan componentes del cuaternión"))?
                    .parse()
                    .map_err(|_| bad("componente de cuaternión inválida"))?;
            }
            SensorEvent::Orientation {
                timestamp_us: timestamp_us()?,
                quat: Quaternion::new(q[0], q[1], q[2], q[3]),
            }
        }
        "pair" => SensorEvent::Paired(DeviceInfo {
            name: field(0).unwrap_or("replay").to_string(),
            firmware: field(1).unwrap_or("log").to_string(),
        }),
        "sync" => match field(0) {
            Some("L") | Some("l") => SensorEvent::ArmSync(Arm::Left),
            _ => SensorEvent::ArmSync(Arm::Right),
        },
        "unsync" => SensorEvent::ArmUnsync,
        "unpair" => SensorEvent::Unpaired,
        other => return Err(bad(&format!("tipo de evento desconocido '{}'", other))),
    };

    Ok(TimedEvent { t_ms, event })
}

/// Reproduce la sesión por el canal respetando los tiempos (o tan rápido
/// como acepte el receptor si `realtime` es falso). Si la sesión no empieza
/// emparejando, se antepone un emparejamiento sintético.
pub fn start_replay(
    events: Vec<TimedEvent>,
    tx: Sender<SensorEvent>,
    realtime: bool,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("session-replay".into())
        .spawn(move || {
            let starts_paired = matches!(
                events.first(),
                Some(TimedEvent {
                    event: SensorEvent::Paired(_),
                    ..
                })
            );
            if !starts_paired {
                let info = DeviceInfo {
                    name: "replay".to_string(),
                    firmware: "log".to_string(),
                };
                if tx.send(SensorEvent::Paired(info)).is_err() {
                    return;
                }
            }

            let start = Instant::now();
            let total = events.len();
            for (sent, timed) in events.into_iter().enumerate() {
                if realtime {
                    let due = Duration::from_millis(timed.t_ms);
                    let elapsed = start.elapsed();
                    if due > elapsed {
                        thread::sleep(due - elapsed);
                    }
                }
                if tx.send(timed.event).is_err() {
                    log::debug!("Reproducción interrumpida en el evento {}/{}", sent, total);
                    return;
                }
            }
            log::info!("Sesión reproducida ({} eventos)", total);
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{ChannelHub, SensorHub};

    fn scratch(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "myoscopio_session_{}_{}.csv",
            name,
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    const SESSION: &str = "t_ms,kind,v0,v1,v2,v3,v4,v5,v6,v7
0,pair,band-A,1.2
0,sync,L
5,emg,1,-2,3,-4,5,-6,7,-8
10,quat,1,0,0,0
15,unsync
20,unpair
";

    #[test]
    fn parses_every_kind() {
        let path = scratch("kinds", SESSION);
        let events = load_session(&path).unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[0].event,
            SensorEvent::Paired(DeviceInfo {
                name: "band-A".to_string(),
                firmware: "1.2".to_string()
            })
        );
        assert_eq!(events[1].event, SensorEvent::ArmSync(Arm::Left));
        assert_eq!(
            events[2].event,
            SensorEvent::Emg {
                timestamp_us: 5000,
                samples: [1, -2, 3, -4, 5, -6, 7, -8]
            }
        );
        assert_eq!(
            events[3].event,
            SensorEvent::Orientation {
                timestamp_us: 10_000,
                quat: Quaternion::IDENTITY
            }
        );
        assert_eq!(events[5].event, SensorEvent::Unpaired);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_short_emg_and_unknown_kind() {
        let path = scratch("short", "t_ms,kind,v0\n0,emg,1,2,3\n");
        assert!(matches!(
            load_session(&path),
            Err(SensorError::Parse { line: 2, .. })
        ));
        let path2 = scratch("unknown", "t_ms,kind\n0,pose\n");
        assert!(matches!(
            load_session(&path2),
            Err(SensorError::Parse { line: 2, .. })
        ));
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(&path2);
    }

    #[test]
    fn rejects_timestamp_overflow() {
        let path = scratch(
            "overflow",
            "t_ms,kind,v0,v1,v2,v3,v4,v5,v6,v7\n18446744073709551615,emg,1,2,3,4,5,6,7,8\n",
        );
        assert!(matches!(
            load_session(&path),
            Err(SensorError::Parse { line: 2, .. })
        ));
        let path2 = scratch("overflow_quat", "t_ms,kind,v0,v1,v2,v3\n18446744073709552,quat,1,0,0,0\n");
        assert!(matches!(
            load_session(&path2),
            Err(SensorError::Parse { line: 2, .. })
        ));
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(&path2);
    }

    #[test]
    fn rejects_time_going_backwards() {
        let path = scratch("backwards", "t_ms,kind\n10,unsync\n5,unsync\n");
        assert!(matches!(
            load_session(&path),
            Err(SensorError::Parse { line: 3, .. })
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn replay_prepends_pairing_and_keeps_order() {
        let events = vec![
            TimedEvent {
                t_ms: 0,
                event: SensorEvent::ArmUnsync,
            },
            TimedEvent {
                t_ms: 1,
                event: SensorEvent::Unpaired,
            },
        ];
        let (tx, mut hub) = ChannelHub::new(16);
        let handle = start_replay(events, tx, false).unwrap();
        let info = hub.wait_for_device(Duration::from_secs(1)).unwrap();
        assert_eq!(info.name, "replay");
        handle.join().unwrap();

        let mut buffer = crate::frame_buffer::SensorFrameBuffer::new();
        // El productor ya terminó: se entregan los eventos y luego Disconnected
        let result = hub.run(Duration::from_millis(20), &mut buffer);
        assert!(matches!(result, Err(SensorError::Disconnected)));
        assert!(hub.device().is_none());
    }
}
