use std::io;
use std::net::{SocketAddr, UdpSocket};

use crate::osc;
use crate::types::GestureLabel;

/// Destino fijo del actuador (loopback)
pub const CONTROL_ENDPOINT: &str = "127.0.0.1:12000";

/// Dirección OSC del canal de control
pub const CONTROL_ADDRESS: &str = "/dxl/0/G";

/// Tabla estática clase → valor de control. Las clases que no aparecen
/// aquí no generan mensaje.
pub const CONTROL_TABLE: [(u8, f32); 3] = [(1, -1.0), (2, 1.0), (3, 0.0)];

/// Valor de control para una clasificación, si la clase tiene uno
pub fn control_value(label: Option<GestureLabel>) -> Option<f32> {
    let id = label?.id();
    CONTROL_TABLE
        .iter()
        .find(|(class, _)| *class == id)
        .map(|&(_, value)| value)
}

/// Transporte de paquetes ya codificados
pub trait ControlSink {
    fn send(&mut self, packet: &[u8]) -> io::Result<usize>;
}

impl<T: ControlSink + ?Sized> ControlSink for &mut T {
    fn send(&mut self, packet: &[u8]) -> io::Result<usize> {
        (**self).send(packet)
    }
}

pub struct UdpControlSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpControlSink {
    pub fn new(target: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(("127.0.0.1", 0))?;
        Ok(Self { socket, target })
    }

    /// Socket hacia `CONTROL_ENDPOINT`
    pub fn loopback() -> io::Result<Self> {
        let target: SocketAddr = CONTROL_ENDPOINT
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Self::new(target)
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl ControlSink for UdpControlSink {
    fn send(&mut self, packet: &[u8]) -> io::Result<usize> {
        self.socket.send_to(packet, self.target)
    }
}

/// Resultado de un ciclo de despacho
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchOutcome {
    Sent(f32),
    /// Clase sin entrada en la tabla o sin clasificación
    Silent,
    /// Fallo de red; no se reintenta en este ciclo
    Failed(f32),
}

pub struct ControlDispatcher<S: ControlSink> {
    sink: S,
    sent: u64,
    failed: u64,
}

impl<S: ControlSink> ControlDispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            sent: 0,
            failed: 0,
        }
    }

    /// Un mensaje como máximo por ciclo
    pub fn dispatch(&mut self, label: Option<GestureLabel>) -> DispatchOutcome {
        let Some(value) = control_value(label) else {
            return DispatchOutcome::Silent;
        };

        let packet = osc::encode_bundle_immediate(CONTROL_ADDRESS, value);
        match self.sink.send(&packet) {
            Ok(_) => {
                self.sent += 1;
                DispatchOutcome::Sent(value)
            }
            Err(e) => {
                self.failed += 1;
                log::warn!("Error enviando control {}: {}", value, e);
                DispatchOutcome::Failed(value)
            }
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
