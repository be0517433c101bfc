use std::collections::VecDeque;
use std::fs;
use std::io;

use evdev::{Device, Key};

use crate::types::{GestureLabel, NUM_LABELS};

/// Lo que el operador indica en un ciclo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatorInput {
    pub label: Option<GestureLabel>,
    pub quit: bool,
}

impl OperatorInput {
    pub fn hold(id: u8) -> Self {
        Self {
            label: GestureLabel::new(id),
            quit: false,
        }
    }

    pub fn release() -> Self {
        Self::default()
    }

    pub fn quit() -> Self {
        Self {
            label: None,
            quit: true,
        }
    }
}

/// Fuente de etiquetas consultada una vez por ciclo de control
pub trait LabelInput {
    fn poll(&mut self) -> OperatorInput;
}

impl<T: LabelInput + ?Sized> LabelInput for Box<T> {
    fn poll(&mut self) -> OperatorInput {
        (**self).poll()
    }
}

/// Primera etiqueta pulsada en orden 0..9. Si hay varias teclas a la vez
/// gana la de menor índice.
pub fn first_asserted(is_held: impl Fn(u8) -> bool) -> Option<GestureLabel> {
    (0..NUM_LABELS).find(|&id| is_held(id)).and_then(GestureLabel::new)
}

const DIGIT_KEYS: [Key; NUM_LABELS as usize] = [
    Key::KEY_0,
    Key::KEY_1,
    Key::KEY_2,
    Key::KEY_3,
    Key::KEY_4,
    Key::KEY_5,
    Key::KEY_6,
    Key::KEY_7,
    Key::KEY_8,
    Key::KEY_9,
];

/// Teclado global leído por evdev. Consulta el estado de las teclas (no
/// eventos), así que una tecla mantenida se ve en todos los ciclos.
pub struct KeyboardInput {
    device: Device,
    name: String,
}

impl KeyboardInput {
    /// Busca el primer teclado en /dev/input
    pub fn discover() -> io::Result<Self> {
        for entry in fs::read_dir("/dev/input")?.flatten() {
            let path = entry.path();
            let is_event = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with("event"))
                .unwrap_or(false);
            if !is_event {
                continue;
            }
            let Ok(device) = Device::open(&path) else {
                continue;
            };
            let Some(dev_name) = device.name().map(str::to_string) else {
                continue;
            };
            if is_keyboard_name(&dev_name) {
                log::info!("Teclado encontrado: {} ({})", dev_name, path.display());
                return Ok(Self {
                    device,
                    name: dev_name,
                });
            }
        }

        Err(io::Error::new(
            io::ErrorKind::NotFound,
            "No se encontró ningún dispositivo de teclado en /dev/input",
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn is_keyboard_name(name: &str) -> bool {
    let lc = name.to_lowercase();
    lc.contains("keyboard") || lc.contains("at translated")
}

impl LabelInput for KeyboardInput {
    fn poll(&mut self) -> OperatorInput {
        let keys = match self.device.get_key_state() {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("No se pudo leer el teclado: {}", e);
                return OperatorInput::release();
            }
        };

        OperatorInput {
            label: first_asserted(|id| keys.contains(DIGIT_KEYS[id as usize])),
            quit: keys.contains(Key::KEY_Q) || keys.contains(Key::KEY_ESC),
        }
    }
}

/// Entrada guionizada: una entrada por ciclo; al agotarse no pulsa nada
/// y, si `quit_when_done`, pide salir.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: VecDeque<OperatorInput>,
    quit_when_done: bool,
}

impl ScriptedInput {
    pub fn new(script: impl IntoIterator<Item = OperatorInput>) -> Self {
        Self {
            script: script.into_iter().collect(),
            quit_when_done: false,
        }
    }

    pub fn quit_when_done(mut self) -> Self {
        self.quit_when_done = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl LabelInput for ScriptedInput {
    fn poll(&mut self) -> OperatorInput {
        match self.script.pop_front() {
            Some(input) => input,
            None if self.quit_when_done => OperatorInput::quit(),
            None => OperatorInput::release(),
        }
    }
}

/// Sin teclado: nunca hay etiqueta ni salida
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl LabelInput for NoInput {
    fn poll(&mut self) -> OperatorInput {
        OperatorInput::release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_held_key_wins() {
        assert_eq!(first_asserted(|id| id == 3 || id == 7), GestureLabel::new(3));
        assert_eq!(first_asserted(|id| id == 0 || id == 9), GestureLabel::new(0));
        assert_eq!(first_asserted(|_| false), None);
    }

    #[test]
    fn script_runs_in_order_then_idles() {
        let mut input = ScriptedInput::new([OperatorInput::hold(2), OperatorInput::release()]);
        assert_eq!(input.poll().label, GestureLabel::new(2));
        assert_eq!(input.poll(), OperatorInput::release());
        assert_eq!(input.poll(), OperatorInput::release());
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn exhausted_script_can_request_quit() {
        let mut input = ScriptedInput::new([OperatorInput::hold(1)]).quit_when_done();
        assert!(!input.poll().quit);
        assert!(input.poll().quit);
    }

    #[test]
    fn keyboard_names() {
        assert!(is_keyboard_name("AT Translated Set 2 keyboard"));
        assert!(is_keyboard_name("Logitech USB Keyboard"));
        assert!(!is_keyboard_name("Logitech USB Optical Mouse"));
    }

    #[test]
    fn no_input_is_always_idle() {
        let mut input = NoInput;
        assert_eq!(input.poll(), OperatorInput::release());
    }
}
