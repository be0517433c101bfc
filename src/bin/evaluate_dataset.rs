use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use myoscopio::dataset::load_dataset;
use myoscopio::knn::{class_counts, leave_one_out, DEFAULT_K};
use myoscopio::types::NUM_LABELS;

const USAGE: &str = "Uso: evaluate_dataset [--k N] <dataset.csv>";

fn parse_args() -> Result<(PathBuf, usize)> {
    let mut k = DEFAULT_K;
    let mut csv_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--k" => {
                let value = args.next().ok_or_else(|| anyhow!("--k necesita un valor"))?;
                k = value
                    .parse()
                    .with_context(|| format!("k inválido: '{}'", value))?;
            }
            _ => {
                if csv_path.is_some() {
                    bail!(USAGE);
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("Debes especificar un dataset\n{}", USAGE))?;
    Ok((csv_path, k))
}

fn main() -> Result<()> {
    let (csv_path, k) = parse_args()?;
    println!("📂 Dataset: {:?}", csv_path);

    let samples = load_dataset(&csv_path)?;
    if samples.is_empty() {
        bail!("El dataset está vacío o no existe");
    }

    println!("\nMuestras por clase:");
    for (label, n) in class_counts(&samples).iter().enumerate() {
        if *n > 0 {
            println!("  {:>2}: {:>6}", label, n);
        }
    }

    println!("\n🧪 Leave-one-out con k={} sobre {} muestras...", k, samples.len());
    let eval = leave_one_out(&samples, k)?;

    println!(
        "\n🥇 Precisión: {:.1}% ({}/{}, {} sin evaluar)",
        eval.accuracy() * 100.0,
        eval.correct,
        eval.total - eval.skipped,
        eval.skipped
    );

    println!("\nConfusión (fila = real, columna = predicha):");
    print!("     ");
    for col in 0..NUM_LABELS {
        print!("{:>6}", col);
    }
    println!();
    for (real, row) in eval.confusion.iter().enumerate() {
        if row.iter().all(|&n| n == 0) {
            continue;
        }
        print!("  {:>2} ", real);
        for n in row {
            print!("{:>6}", n);
        }
        println!();
    }

    // Errores más frecuentes
    let mut mistakes: Vec<(usize, usize, usize)> = Vec::new();
    for (real, row) in eval.confusion.iter().enumerate() {
        for (pred, &n) in row.iter().enumerate() {
            if real != pred && n > 0 {
                mistakes.push((real, pred, n));
            }
        }
    }
    mistakes.sort_by(|a, b| b.2.cmp(&a.2));
    if !mistakes.is_empty() {
        println!("\nConfusiones más frecuentes:");
        for (real, pred, n) in mistakes.iter().take(5) {
            println!("  {} → {}: {}", real, pred, n);
        }
    }

    Ok(())
}
