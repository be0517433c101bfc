use std::path::{Path, PathBuf};

use crate::classifier::{ClassificationService, ClassifierError};
use crate::dataset::{load_dataset, DatasetWriter, LabeledSample};
use crate::types::{GestureLabel, SensorFrame, NUM_FEATURES, NUM_LABELS};

pub const DEFAULT_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: GestureLabel,
    /// Fracción de vecinos que votaron por `label`
    pub confidence: f32,
    /// Distancia (escalada) al vecino más cercano de esa clase
    pub distance: f32,
}

/// k-NN sobre características escaladas min-max
#[derive(Debug, Clone)]
pub struct KnnModel {
    k: usize,
    min: [f32; NUM_FEATURES],
    scale: [f32; NUM_FEATURES],
    points: Vec<([f32; NUM_FEATURES], GestureLabel)>,
}

impl KnnModel {
    pub fn fit(samples: &[LabeledSample], k: usize) -> Result<Self, ClassifierError> {
        if k == 0 {
            return Err(ClassifierError::InvalidK);
        }
        if samples.is_empty() {
            return Err(ClassifierError::NotTrained);
        }

        let mut min = [f32::INFINITY; NUM_FEATURES];
        let mut max = [f32::NEG_INFINITY; NUM_FEATURES];
        for sample in samples {
            for (i, v) in sample.frame.features().into_iter().enumerate() {
                min[i] = min[i].min(v);
                max[i] = max[i].max(v);
            }
        }

        let mut scale = [0.0f32; NUM_FEATURES];
        for i in 0..NUM_FEATURES {
            let range = max[i] - min[i];
            // Característica constante: no aporta distancia
            scale[i] = if range > 0.0 { 1.0 / range } else { 0.0 };
        }

        let mut model = Self {
            k,
            min,
            scale,
            points: Vec::with_capacity(samples.len()),
        };
        model.points = samples
            .iter()
            .map(|s| (model.scaled(&s.frame.features()), s.label))
            .collect();

        Ok(model)
    }

    fn scaled(&self, features: &[f32; NUM_FEATURES]) -> [f32; NUM_FEATURES] {
        let mut out = [0.0f32; NUM_FEATURES];
        for i in 0..NUM_FEATURES {
            out[i] = (features[i] - self.min[i]) * self.scale[i];
        }
        out
    }

    /// Voto mayoritario entre los k vecinos más cercanos. En empate gana la
    /// clase cuyo vecino está más cerca.
    pub fn predict(&self, features: &[f32; NUM_FEATURES]) -> Option<Prediction> {
        let query = self.scaled(features);

        let mut dists: Vec<(f32, GestureLabel)> = self
            .points
            .iter()
            .map(|(p, label)| (euclidean_distance(&query, p), *label))
            .collect();
        dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let effective_k = self.k.min(dists.len());
        if effective_k == 0 {
            return None;
        }

        let mut votes = [0usize; NUM_LABELS as usize];
        let mut nearest: [Option<(usize, f32)>; NUM_LABELS as usize] = [None; NUM_LABELS as usize];
        for (rank, &(dist, label)) in dists[..effective_k].iter().enumerate() {
            let idx = label.id() as usize;
            votes[idx] += 1;
            if nearest[idx].is_none() {
                nearest[idx] = Some((rank, dist));
            }
        }

        let (winner, _) = nearest
            .iter()
            .enumerate()
            .filter_map(|(idx, n)| n.map(|(rank, _)| (idx, rank)))
            .max_by(|&(a, rank_a), &(b, rank_b)| {
                votes[a].cmp(&votes[b]).then(rank_b.cmp(&rank_a))
            })?;

        let label = GestureLabel::new(winner as u8)?;
        let distance = nearest[winner].map(|(_, d)| d).unwrap_or(0.0);
        Some(Prediction {
            label,
            confidence: votes[winner] as f32 / effective_k as f32,
            distance,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

fn euclidean_distance(a: &[f32; NUM_FEATURES], b: &[f32; NUM_FEATURES]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Muestras por clase, indexadas por etiqueta
pub fn class_counts(samples: &[LabeledSample]) -> [usize; NUM_LABELS as usize] {
    let mut counts = [0usize; NUM_LABELS as usize];
    for s in samples {
        counts[s.label.id() as usize] += 1;
    }
    counts
}

/// Resultado de una validación leave-one-out
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub total: usize,
    pub correct: usize,
    /// Muestras que no pudieron evaluarse (única muestra del dataset)
    pub skipped: usize,
    /// confusion[real][predicha]
    pub confusion: [[usize; NUM_LABELS as usize]; NUM_LABELS as usize],
}

impl Evaluation {
    pub fn accuracy(&self) -> f32 {
        let evaluated = self.total - self.skipped;
        if evaluated == 0 {
            return 0.0;
        }
        self.correct as f32 / evaluated as f32
    }
}

/// Cada muestra se clasifica con un modelo ajustado sobre todas las demás
pub fn leave_one_out(samples: &[LabeledSample], k: usize) -> Result<Evaluation, ClassifierError> {
    if k == 0 {
        return Err(ClassifierError::InvalidK);
    }

    let mut eval = Evaluation {
        total: samples.len(),
        correct: 0,
        skipped: 0,
        confusion: [[0; NUM_LABELS as usize]; NUM_LABELS as usize],
    };

    let mut rest: Vec<LabeledSample> = Vec::with_capacity(samples.len().saturating_sub(1));
    for (i, held_out) in samples.iter().enumerate() {
        rest.clear();
        rest.extend(
            samples
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, s)| *s),
        );
        if rest.is_empty() {
            eval.skipped += 1;
            continue;
        }

        let model = KnnModel::fit(&rest, k)?;
        match model.predict(&held_out.frame.features()) {
            Some(p) => {
                eval.confusion[held_out.label.id() as usize][p.label.id() as usize] += 1;
                if p.label == held_out.label {
                    eval.correct += 1;
                }
            }
            None => eval.skipped += 1,
        }
    }
    Ok(eval)
}

/// Clasificador k-NN en proceso con dataset persistente en CSV.
///
/// Cada muestra grabada se añade al fichero al momento; al abrir se carga
/// y se ajusta lo que hubiera de sesiones anteriores.
pub struct KnnService {
    k: usize,
    path: PathBuf,
    samples: Vec<LabeledSample>,
    writer: Option<DatasetWriter>,
    model: Option<KnnModel>,
}

impl KnnService {
    pub fn open(path: impl AsRef<Path>, k: usize) -> Result<Self, ClassifierError> {
        if k == 0 {
            return Err(ClassifierError::InvalidK);
        }

        let path = path.as_ref().to_path_buf();
        let samples = load_dataset(&path)?;
        let writer = DatasetWriter::open(&path)?;

        let model = if samples.is_empty() {
            None
        } else {
            Some(KnnModel::fit(&samples, k)?)
        };

        log::info!(
            "Dataset {:?}: {} muestras{}",
            path,
            samples.len(),
            if model.is_some() { ", modelo ajustado" } else { "" }
        );

        Ok(Self {
            k,
            path,
            samples,
            writer: Some(writer),
            model,
        })
    }

    /// Descarta todas las muestras grabadas y el modelo
    pub fn clear(&mut self) -> Result<(), ClassifierError> {
        if self.writer.is_none() {
            return Err(ClassifierError::ShutDown);
        }
        self.writer = Some(DatasetWriter::truncate(&self.path)?);
        self.samples.clear();
        self.model = None;
        log::info!("Dataset {:?} vaciado", self.path);
        Ok(())
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn predict(&self, frame: &SensorFrame) -> Option<Prediction> {
        self.model.as_ref()?.predict(&frame.features())
    }
}

impl ClassificationService for KnnService {
    fn record(&mut self, frame: &SensorFrame, label: GestureLabel) -> Result<(), ClassifierError> {
        let writer = self.writer.as_mut().ok_or(ClassifierError::ShutDown)?;
        let sample = LabeledSample {
            label,
            frame: *frame,
        };
        self.samples.push(sample);
        writer.append(&sample)
    }

    fn train(&mut self) -> Result<(), ClassifierError> {
        if self.writer.is_none() {
            return Err(ClassifierError::ShutDown);
        }

        let model = KnnModel::fit(&self.samples, self.k)?;
        let counts = class_counts(&self.samples);
        let summary: Vec<String> = counts
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n > 0)
            .map(|(label, n)| format!("{}:{}", label, n))
            .collect();
        log::info!(
            "Modelo reentrenado con {} muestras (k={}) [{}]",
            model.len(),
            model.k(),
            summary.join(" ")
        );

        self.model = Some(model);
        Ok(())
    }

    fn classify(&mut self, frame: &SensorFrame) -> Option<GestureLabel> {
        if self.writer.is_none() {
            return None;
        }
        let prediction = self.predict(frame)?;
        log::trace!(
            "k-NN: clase {} (conf {:.2}, d={:.3})",
            prediction.label,
            prediction.confidence,
            prediction.distance
        );
        Some(prediction.label)
    }

    fn shutdown(&mut self) -> Result<(), ClassifierError> {
        let mut writer = self.writer.take().ok_or(ClassifierError::ShutDown)?;
        writer.flush()?;
        log::info!(
            "Clasificador cerrado ({} muestras en {:?})",
            self.samples.len(),
            writer.path()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EMG_CHANNELS;

    fn scratch(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "myoscopio_knn_{}_{}.csv",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn frame(emg: i8, roll: u8) -> SensorFrame {
        SensorFrame {
            emg: [emg; EMG_CHANNELS],
            roll,
            pitch: 9,
            yaw: 9,
        }
    }

    fn labeled(label: u8, emg: i8, roll: u8) -> LabeledSample {
        LabeledSample {
            label: GestureLabel::new(label).unwrap(),
            frame: frame(emg, roll),
        }
    }

    #[test]
    fn fit_rejects_empty_and_zero_k() {
        assert!(matches!(
            KnnModel::fit(&[], 3),
            Err(ClassifierError::NotTrained)
        ));
        assert!(matches!(
            KnnModel::fit(&[labeled(1, 0, 0)], 0),
            Err(ClassifierError::InvalidK)
        ));
    }

    #[test]
    fn separates_two_clusters() {
        let mut samples = Vec::new();
        for i in 0..5 {
            samples.push(labeled(1, i, 2));
            samples.push(labeled(2, 100 + i, 16));
        }
        let model = KnnModel::fit(&samples, 3).unwrap();

        let p = model.predict(&frame(3, 3).features()).unwrap();
        assert_eq!(p.label.id(), 1);
        assert_eq!(p.confidence, 1.0);

        let p = model.predict(&frame(101, 15).features()).unwrap();
        assert_eq!(p.label.id(), 2);
    }

    #[test]
    fn tie_goes_to_nearest_neighbour() {
        let samples = vec![labeled(4, 10, 9), labeled(6, 20, 9)];
        let model = KnnModel::fit(&samples, 2).unwrap();
        // Un voto cada una; 12 está más cerca de 10
        assert_eq!(model.predict(&frame(12, 9).features()).unwrap().label.id(), 4);
        assert_eq!(model.predict(&frame(19, 9).features()).unwrap().label.id(), 6);
    }

    #[test]
    fn service_is_untrained_until_train() {
        let path = scratch("untrained");
        let mut service = KnnService::open(&path, 1).unwrap();
        let l5 = GestureLabel::new(5).unwrap();

        service.record(&frame(50, 4), l5).unwrap();
        assert_eq!(service.classify(&frame(50, 4)), None);

        service.train().unwrap();
        assert_eq!(service.classify(&frame(49, 4)), Some(l5));
        service.shutdown().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn training_survives_restart_and_clear_discards_it() {
        let path = scratch("restart");
        {
            let mut service = KnnService::open(&path, 1).unwrap();
            service
                .record(&frame(-40, 2), GestureLabel::new(2).unwrap())
                .unwrap();
            service.train().unwrap();
            service.shutdown().unwrap();
        }

        let mut service = KnnService::open(&path, 1).unwrap();
        assert!(service.is_trained());
        assert_eq!(service.samples().len(), 1);
        assert_eq!(service.classify(&frame(-40, 2)).map(GestureLabel::id), Some(2));

        service.clear().unwrap();
        assert!(!service.is_trained());
        assert!(matches!(service.train(), Err(ClassifierError::NotTrained)));
        service.shutdown().unwrap();
        assert!(load_dataset(&path).unwrap().is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn calls_after_shutdown_are_refused() {
        let path = scratch("closed");
        let mut service = KnnService::open(&path, 3).unwrap();
        service.shutdown().unwrap();
        assert!(matches!(service.shutdown(), Err(ClassifierError::ShutDown)));
        assert!(matches!(
            service.record(&frame(1, 1), GestureLabel::new(0).unwrap()),
            Err(ClassifierError::ShutDown)
        ));
        assert_eq!(service.classify(&frame(1, 1)), None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn leave_one_out_on_separable_clusters() {
        let mut samples = Vec::new();
        for i in 0..6 {
            samples.push(labeled(1, i, 2));
            samples.push(labeled(3, 90 + i, 15));
        }
        let eval = leave_one_out(&samples, 3).unwrap();
        assert_eq!(eval.total, 12);
        assert_eq!(eval.correct, 12);
        assert_eq!(eval.accuracy(), 1.0);
        assert_eq!(eval.confusion[1][1], 6);
        assert_eq!(eval.confusion[3][3], 6);
        assert_eq!(eval.confusion[1][3], 0);
    }

    #[test]
    fn leave_one_out_skips_lonely_sample() {
        let eval = leave_one_out(&[labeled(2, 0, 0)], 1).unwrap();
        assert_eq!(eval.skipped, 1);
        assert_eq!(eval.accuracy(), 0.0);
    }
}
