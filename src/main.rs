/*
Myoscopio - control en tiempo real a partir de EMG + orientación

Cada ciclo (50 Hz):
1. Bombea los eventos de la banda (EMG 8 canales + cuaternión)
2. Lee las teclas 0-9 del operador: mientras se mantiene una, se graba
   la muestra con esa etiqueta; al soltar se reentrena el k-NN
3. Clasifica el frame actual
4. Envía el valor de control por OSC a 127.0.0.1:12000 (/dxl/0/G)

Fuente de eventos: banda simulada (por defecto) o sesión grabada:
    ./target/release/myoscopio --replay sesion.csv --no-keyboard

Para leer el teclado global:
    sg input -c './target/release/myoscopio'
*/

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use myoscopio::classifier::ServiceGuard;
use myoscopio::config::AppConfig;
use myoscopio::control_loop::{ControlLoop, Pipeline};
use myoscopio::dispatch::{UdpControlSink, CONTROL_ADDRESS, CONTROL_TABLE};
use myoscopio::frame_buffer::SensorFrameBuffer;
use myoscopio::knn::KnnService;
use myoscopio::logger::init_logger;
use myoscopio::operator::{KeyboardInput, LabelInput, NoInput};
use myoscopio::sensor::{ChannelHub, SensorHub};
use myoscopio::session_log::{load_session, start_replay};
use myoscopio::simulator::start_simulated_band;

const USAGE: &str =
    "Uso: myoscopio [--config FILE] [--replay SESSION.csv | --simulate] [--fresh] [--no-keyboard]";

enum Source {
    Simulate,
    Replay(PathBuf),
}

struct Options {
    config: Option<PathBuf>,
    source: Source,
    fresh: bool,
    no_keyboard: bool,
}

fn parse_args() -> Result<Options> {
    let mut config = None;
    let mut source = None;
    let mut fresh = false;
    let mut no_keyboard = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!("--config necesita un fichero"))?;
                config = Some(PathBuf::from(path));
            }
            "--replay" => {
                let path = args.next().ok_or_else(|| anyhow!("--replay necesita un fichero"))?;
                if source.is_some() {
                    bail!("{}", USAGE);
                }
                source = Some(Source::Replay(PathBuf::from(path)));
            }
            "--simulate" => {
                if source.is_some() {
                    bail!("{}", USAGE);
                }
                source = Some(Source::Simulate);
            }
            "--fresh" => fresh = true,
            "--no-keyboard" => no_keyboard = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("Argumento desconocido '{}'\n{}", other, USAGE),
        }
    }

    Ok(Options {
        config,
        source: source.unwrap_or(Source::Simulate),
        fresh,
        no_keyboard,
    })
}

fn main() -> Result<()> {
    init_logger();
    let opts = parse_args()?;

    println!("🎯 Myoscopio - EMG + orientación → control OSC\n");

    let config = AppConfig::load_or_default(opts.config.as_deref())
        .context("No se pudo cargar la configuración")?;

    let (tx, mut hub) = ChannelHub::new(config.sensor.channel_capacity);
    let _producer = match &opts.source {
        Source::Simulate => {
            println!("🔧 Modo: banda simulada");
            start_simulated_band(config.simulator.clone(), tx)?
        }
        Source::Replay(path) => {
            println!("🔧 Modo: reproducción de {}", path.display());
            let events = load_session(path)
                .with_context(|| format!("No se pudo leer la sesión {}", path.display()))?;
            start_replay(events, tx, true)?
        }
    };

    println!("🔍 Buscando banda...");
    let device = hub
        .wait_for_device(config.discovery_timeout())
        .context("No se pudo conectar con la banda")?;
    println!("✅ Banda conectada: {} ({})\n", device.name, device.firmware);

    let sink = UdpControlSink::loopback()?;
    println!("📡 Control OSC → {} {}", sink.target(), CONTROL_ADDRESS);

    let input: Box<dyn LabelInput> = if opts.no_keyboard {
        println!("⌨️  Sin teclado: solo clasificación\n");
        Box::new(NoInput)
    } else {
        let keyboard = KeyboardInput::discover()
            .map_err(|e| anyhow!("{} (usa --no-keyboard para ejecutar sin teclado)", e))?;
        println!("✅ Teclado: {}\n", keyboard.name());
        Box::new(keyboard)
    };

    let mut service = ServiceGuard::new(
        KnnService::open(&config.classifier.dataset_path, config.classifier.k)
            .context("No se pudo abrir el dataset de entrenamiento")?,
    );
    if opts.fresh {
        service.clear()?;
        println!("🧹 Dataset vaciado");
    }
    println!(
        "✅ Clasificador k-NN listo ({} muestras{})\n",
        service.samples().len(),
        if service.is_trained() { ", entrenado" } else { "" }
    );

    println!("Mantén pulsada una tecla para grabar el gesto actual:");
    println!("  0-9 → etiqueta del gesto (al soltar se reentrena)");
    for (class, value) in CONTROL_TABLE {
        println!("  clase {} → {:+.1}", class, value);
    }
    println!("  q/Esc → salir\n");

    let buffer = SensorFrameBuffer::with_sample_rate(config.sensor.emg_sample_rate_hz);
    let pipeline = Pipeline::from_guard(buffer, service, sink);
    let summary = ControlLoop::new(hub, input, pipeline, config.control_interval()).run()?;

    log::info!("Resumen: {}", summary);
    println!("\n👋 Saliendo...");
    Ok(())
}
