use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};

use crate::classifier::ClassifierError;
use crate::types::{GestureLabel, SensorFrame, ANGLE_BUCKETS, EMG_CHANNELS, NUM_FEATURES};

/// Cabecera del dataset: label,emg0..emg7,roll,pitch,yaw
pub const DATASET_HEADER: [&str; NUM_FEATURES + 1] = [
    "label", "emg0", "emg1", "emg2", "emg3", "emg4", "emg5", "emg6", "emg7", "roll", "pitch",
    "yaw",
];

/// Una muestra grabada por el operador
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledSample {
    pub label: GestureLabel,
    pub frame: SensorFrame,
}

impl LabeledSample {
    fn to_record(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(NUM_FEATURES + 1);
        row.push(self.label.to_string());
        row.extend(self.frame.emg.iter().map(|v| v.to_string()));
        row.push(self.frame.roll.to_string());
        row.push(self.frame.pitch.to_string());
        row.push(self.frame.yaw.to_string());
        row
    }

    fn from_record(record: &StringRecord, line: usize) -> Result<Self, ClassifierError> {
        if record.len() < NUM_FEATURES + 1 {
            return Err(invalid_row(line, "faltan columnas"));
        }

        let raw_label: i64 = record[0]
            .trim()
            .parse()
            .map_err(|_| invalid_row(line, "label inválido"))?;
        let label = u8::try_from(raw_label)
            .ok()
            .and_then(GestureLabel::new)
            .ok_or(ClassifierError::InvalidLabel(raw_label))?;

        let mut frame = SensorFrame::default();
        for ch in 0..EMG_CHANNELS {
            frame.emg[ch] = record[1 + ch]
                .trim()
                .parse()
                .map_err(|_| invalid_row(line, "emg inválido"))?;
        }
        let angle = |idx: usize| -> Result<u8, ClassifierError> {
            let value: u8 = record[idx]
                .trim()
                .parse()
                .map_err(|_| invalid_row(line, "ángulo inválido"))?;
            if value > ANGLE_BUCKETS {
                return Err(invalid_row(line, "ángulo fuera de rango"));
            }
            Ok(value)
        };
        frame.roll = angle(EMG_CHANNELS + 1)?;
        frame.pitch = angle(EMG_CHANNELS + 2)?;
        frame.yaw = angle(EMG_CHANNELS + 3)?;

        Ok(Self { label, frame })
    }
}

fn invalid_row(line: usize, msg: &str) -> ClassifierError {
    ClassifierError::IoError(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("fila {}: {}", line, msg),
    ))
}

/// Carga todas las muestras del dataset. Un fichero inexistente es un
/// dataset vacío.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<LabeledSample>, ClassifierError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut samples = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        // +2: cabecera y numeración desde 1
        samples.push(LabeledSample::from_record(&record, row_idx + 2)?);
    }
    Ok(samples)
}

/// Escritor en modo append; cada fila se vuelca a disco al momento
pub struct DatasetWriter {
    path: PathBuf,
    writer: Writer<File>,
}

impl DatasetWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if is_empty {
            writer.write_record(DATASET_HEADER)?;
            writer.flush()?;
        }

        Ok(Self { path, writer })
    }

    /// Vacía el fichero y deja solo la cabecera
    pub fn truncate(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        File::create(path.as_ref())?;
        Self::open(path)
    }

    pub fn append(&mut self, sample: &LabeledSample) -> Result<(), ClassifierError> {
        self.writer.write_record(sample.to_record())?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ClassifierError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "myoscopio_dataset_{}_{}.csv",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn sample(label: u8, base: i8) -> LabeledSample {
        LabeledSample {
            label: GestureLabel::new(label).unwrap(),
            frame: SensorFrame {
                emg: [base, -base, 1, 2, 3, 4, 5, 6],
                roll: 1,
                pitch: 9,
                yaw: 18,
            },
        }
    }

    #[test]
    fn missing_file_is_empty_dataset() {
        let path = scratch("missing");
        assert!(load_dataset(&path).unwrap().is_empty());
    }

    #[test]
    fn appended_rows_survive_reopen() {
        let path = scratch("append");
        {
            let mut writer = DatasetWriter::open(&path).unwrap();
            writer.append(&sample(3, 10)).unwrap();
        }
        {
            // Reabrir no duplica la cabecera
            let mut writer = DatasetWriter::open(&path).unwrap();
            writer.append(&sample(7, -20)).unwrap();
        }
        let loaded = load_dataset(&path).unwrap();
        assert_eq!(loaded, vec![sample(3, 10), sample(7, -20)]);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("label").count(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn truncate_keeps_only_header() {
        let path = scratch("truncate");
        DatasetWriter::open(&path)
            .unwrap()
            .append(&sample(1, 1))
            .unwrap();
        DatasetWriter::truncate(&path).unwrap();
        assert!(load_dataset(&path).unwrap().is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        let path = scratch("bad_label");
        std::fs::write(
            &path,
            "label,emg0,emg1,emg2,emg3,emg4,emg5,emg6,emg7,roll,pitch,yaw\n12,0,0,0,0,0,0,0,0,9,9,9\n",
        )
        .unwrap();
        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidLabel(12)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn out_of_range_angle_is_rejected() {
        let path = scratch("bad_angle");
        std::fs::write(
            &path,
            "label,emg0,emg1,emg2,emg3,emg4,emg5,emg6,emg7,roll,pitch,yaw\n1,0,0,0,0,0,0,0,0,200,9,9\n",
        )
        .unwrap();
        let err = load_dataset(&path).unwrap_err();
        assert!(err.to_string().contains("fila 2"), "{}", err);
        let _ = std::fs::remove_file(&path);

        let path = scratch("edge_angle");
        std::fs::write(
            &path,
            "label,emg0,emg1,emg2,emg3,emg4,emg5,emg6,emg7,roll,pitch,yaw\n1,0,0,0,0,0,0,0,0,18,0,9\n",
        )
        .unwrap();
        let samples = load_dataset(&path).unwrap();
        assert_eq!(samples[0].frame.roll, 18);
        let _ = std::fs::remove_file(&path);
    }
}
