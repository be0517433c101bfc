use std::io::Write;

use env_logger::Builder;
use log::{Level, Record};

/// Inicializa env_logger con nivel `info` salvo que RUST_LOG diga otra cosa
pub fn init_logger() {
    Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let level_color = match record.level() {
                Level::Error => "\x1b[31m\x1b[1m",
                Level::Warn => "\x1b[33m\x1b[1m",
                Level::Info => "\x1b[32m\x1b[1m",
                Level::Debug => "\x1b[36m\x1b[1m",
                Level::Trace => "\x1b[90m\x1b[1m",
            };
            writeln!(
                buf,
                "{} {}{:5}\x1b[0m [{}] {}",
                buf.timestamp_millis(),
                level_color,
                record.level(),
                location(record),
                record.args(),
            )
        })
        .init();
}

/// "fichero:línea" del punto de log
fn location(record: &Record) -> String {
    format!(
        "{}:{}",
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0)
    )
}
