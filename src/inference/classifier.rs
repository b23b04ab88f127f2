// src/inference/classifier.rs
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::Linear;
use log::{debug, info};
use std::collections::HashMap;
use std::path::Path;

use crate::errors::{WeatherError, WeatherResult};

/// Fixed-shape forward pass from a feature vector to a class distribution.
///
/// Implementations must be safe to call from several threads at once. Any
/// scratch state a forward pass needs is allocated per call.
pub trait Classifier: Send + Sync {
    fn input_width(&self) -> usize;
    fn output_width(&self) -> usize;
    /// Returns one probability per class, in label-vocabulary order.
    fn forward(&self, input: &[f32]) -> WeatherResult<Vec<f32>>;
}

const DEFAULT_ZERO_POINT: f32 = 128.0;

/// Feed-forward network stored as safetensors:
///
/// - `layers.{i}.weight`: `[out, in]`, f32/f16/bf16, or u8 with
///   `layers.{i}.weight_scale` (`[out]`) and optional scalar
///   `layers.{i}.weight_zero_point` (defaults to 128)
/// - `layers.{i}.bias`: `[out]`, optional
///
/// Quantized weights are expanded to f32 once, at load. Hidden layers use
/// ReLU; the last layer's output goes through softmax.
pub struct DenseClassifier {
    layers: Vec<Linear>,
    input_width: usize,
    output_width: usize,
    device: Device,
}

impl DenseClassifier {
    pub fn load(path: impl AsRef<Path>, device: &Device) -> WeatherResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WeatherError::configuration(format!(
                "classifier artifact not found at: {}",
                path.display()
            )));
        }
        let tensors = candle_core::safetensors::load(path, &Device::Cpu).map_err(|e| {
            WeatherError::configuration(format!(
                "Failed to read classifier artifact {}: {}",
                path.display(),
                e
            ))
        })?;
        let classifier = Self::from_tensors(tensors, device)?;
        info!(
            "Loaded classifier {} ({} layers, {} -> {})",
            path.display(),
            classifier.layers.len(),
            classifier.input_width,
            classifier.output_width
        );
        Ok(classifier)
    }

    pub fn from_tensors(
        mut tensors: HashMap<String, Tensor>,
        device: &Device,
    ) -> WeatherResult<Self> {
        let layer_count = count_layers(&tensors)?;
        let mut layers = Vec::with_capacity(layer_count);
        let mut input_width = 0;
        let mut previous_out: Option<usize> = None;

        for i in 0..layer_count {
            let weight = take_weight(&mut tensors, i)?;
            let (out_dim, in_dim) = weight.dims2().map_err(|e| {
                WeatherError::configuration(format!("layers.{}.weight must be 2-D: {}", i, e))
            })?;

            match previous_out {
                None => input_width = in_dim,
                Some(prev) if prev != in_dim => {
                    return Err(WeatherError::configuration(format!(
                        "layers.{} expects {} inputs but layers.{} produces {}",
                        i,
                        in_dim,
                        i - 1,
                        prev
                    )))
                }
                Some(_) => {}
            }

            let bias = match tensors.remove(&format!("layers.{}.bias", i)) {
                Some(b) => {
                    let len = b.dims1().map_err(|e| {
                        WeatherError::configuration(format!("layers.{}.bias must be 1-D: {}", i, e))
                    })?;
                    if len != out_dim {
                        return Err(WeatherError::configuration(format!(
                            "layers.{}.bias has {} entries, expected {}",
                            i, len, out_dim
                        )));
                    }
                    Some(to_device_f32(b, device).map_err(load_err(i))?)
                }
                None => None,
            };

            let weight = weight.to_device(device).map_err(load_err(i))?;
            debug!("layers.{}: {} -> {}", i, in_dim, out_dim);
            layers.push(Linear::new(weight, bias));
            previous_out = Some(out_dim);
        }

        let output_width = previous_out.unwrap_or(0);
        if output_width == 0 || input_width == 0 {
            return Err(WeatherError::configuration(
                "Classifier artifact has zero-width layers",
            ));
        }

        Ok(Self {
            layers,
            input_width,
            output_width,
            device: device.clone(),
        })
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn forward_tensor(&self, input: &[f32]) -> candle_core::Result<Vec<Vec<f32>>> {
        // Single-row batch, allocated per call.
        let mut x = Tensor::from_slice(input, (1, input.len()), &self.device)?;
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x)?;
            if i < last {
                x = x.relu()?;
            }
        }
        candle_nn::ops::softmax(&x, D::Minus1)?.to_vec2::<f32>()
    }
}

impl Classifier for DenseClassifier {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn output_width(&self) -> usize {
        self.output_width
    }

    fn forward(&self, input: &[f32]) -> WeatherResult<Vec<f32>> {
        if input.len() != self.input_width {
            return Err(WeatherError::validation(
                "<vector>",
                format!(
                    "Expected {} inputs, got {} for",
                    self.input_width,
                    input.len()
                ),
            ));
        }
        let rows = self
            .forward_tensor(input)
            .map_err(|e| WeatherError::inference(format!("Forward pass failed: {}", e)))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| WeatherError::inference("Forward pass returned an empty batch"))
    }
}

fn load_err(layer: usize) -> impl Fn(candle_core::Error) -> WeatherError {
    move |e| WeatherError::configuration(format!("Failed to prepare layers.{}: {}", layer, e))
}

/// Number of layers, rejecting gaps in the `layers.{i}` numbering.
fn count_layers(tensors: &HashMap<String, Tensor>) -> WeatherResult<usize> {
    let mut indices: Vec<usize> = tensors
        .keys()
        .filter_map(|k| k.strip_prefix("layers."))
        .filter_map(|rest| rest.split('.').next())
        .filter_map(|idx| idx.parse::<usize>().ok())
        .collect();
    indices.sort_unstable();
    indices.dedup();

    if indices.is_empty() {
        return Err(WeatherError::configuration(
            "Classifier artifact contains no layers.{i}.weight tensors",
        ));
    }
    for (expected, found) in indices.iter().enumerate() {
        if expected != *found {
            return Err(WeatherError::configuration(format!(
                "Classifier artifact is missing layers.{}",
                expected
            )));
        }
    }
    Ok(indices.len())
}

/// Removes `layers.{i}.weight` from the map and returns it as f32,
/// dequantizing u8 storage with its per-row scale and zero point.
fn take_weight(tensors: &mut HashMap<String, Tensor>, i: usize) -> WeatherResult<Tensor> {
    let weight = tensors
        .remove(&format!("layers.{}.weight", i))
        .ok_or_else(|| {
            WeatherError::configuration(format!("Classifier artifact is missing layers.{}.weight", i))
        })?;

    match weight.dtype() {
        DType::F32 => Ok(weight),
        DType::F16 | DType::BF16 | DType::F64 => {
            weight.to_dtype(DType::F32).map_err(load_err(i))
        }
        DType::U8 => {
            let scale = tensors
                .remove(&format!("layers.{}.weight_scale", i))
                .ok_or_else(|| {
                    WeatherError::configuration(format!(
                        "layers.{}.weight is quantized but layers.{}.weight_scale is missing",
                        i, i
                    ))
                })?;
            let zero_point = match tensors.remove(&format!("layers.{}.weight_zero_point", i)) {
                Some(zp) => scalar_f32(&zp).map_err(load_err(i))?,
                None => DEFAULT_ZERO_POINT,
            };
            dequantize(&weight, &scale, zero_point).map_err(load_err(i))
        }
        other => Err(WeatherError::configuration(format!(
            "Unsupported dtype {:?} for layers.{}.weight",
            other, i
        ))),
    }
}

fn dequantize(q: &Tensor, scale: &Tensor, zero_point: f32) -> candle_core::Result<Tensor> {
    let (rows, _) = q.dims2()?;
    let scale = scale.to_dtype(DType::F32)?.reshape((rows, 1))?;
    q.to_dtype(DType::F32)?
        .affine(1.0, -(zero_point as f64))?
        .broadcast_mul(&scale)
}

fn scalar_f32(t: &Tensor) -> candle_core::Result<f32> {
    let values = t.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
    values
        .first()
        .copied()
        .ok_or_else(|| candle_core::Error::Msg("empty zero point tensor".to_string()))
}

fn to_device_f32(t: Tensor, device: &Device) -> candle_core::Result<Tensor> {
    t.to_dtype(DType::F32)?.to_device(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu() -> Device {
        Device::Cpu
    }

    /// One zero-weight layer whose bias fixes the output distribution.
    fn fixed_distribution(inputs: usize, probs: &[f32]) -> HashMap<String, Tensor> {
        let logits: Vec<f32> = probs.iter().map(|p| p.ln()).collect();
        let mut tensors = HashMap::new();
        tensors.insert(
            "layers.0.weight".to_string(),
            Tensor::zeros((probs.len(), inputs), DType::F32, &cpu()).unwrap(),
        );
        tensors.insert(
            "layers.0.bias".to_string(),
            Tensor::from_slice(&logits, (probs.len(),), &cpu()).unwrap(),
        );
        tensors
    }

    #[test]
    fn test_bias_only_network_reproduces_distribution() {
        let clf = DenseClassifier::from_tensors(fixed_distribution(3, &[0.2, 0.5, 0.3]), &cpu())
            .unwrap();
        assert_eq!(clf.input_width(), 3);
        assert_eq!(clf.output_width(), 3);

        let out = clf.forward(&[1.0, -1.0, 0.5]).unwrap();
        assert_eq!(out.len(), 3);
        for (got, want) in out.iter().zip([0.2f32, 0.5, 0.3]) {
            assert!((got - want).abs() < 1e-5, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_two_layer_relu_network() {
        // Hidden layer copies x0 and -x0; ReLU keeps only the positive one.
        let mut tensors = HashMap::new();
        tensors.insert(
            "layers.0.weight".to_string(),
            Tensor::from_slice(&[1.0f32, 0.0, -1.0, 0.0], (2, 2), &cpu()).unwrap(),
        );
        tensors.insert(
            "layers.1.weight".to_string(),
            Tensor::from_slice(&[1.0f32, 0.0, 0.0, 1.0], (2, 2), &cpu()).unwrap(),
        );
        let clf = DenseClassifier::from_tensors(tensors, &cpu()).unwrap();
        assert_eq!(clf.layer_count(), 2);

        // x0 = 2 -> hidden [2, 0] -> logits [2, 0]
        let out = clf.forward(&[2.0, 7.0]).unwrap();
        assert!(out[0] > out[1]);
        // x0 = -2 -> hidden [0, 2] -> logits [0, 2]
        let out = clf.forward(&[-2.0, 7.0]).unwrap();
        assert!(out[1] > out[0]);
        assert!((out.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_u8_weights_are_dequantized() {
        // q = 138, zp = 128, scale = 0.1 -> w = 1.0
        let mut tensors = HashMap::new();
        tensors.insert(
            "layers.0.weight".to_string(),
            Tensor::from_slice(&[138u8, 128, 128, 138], (2, 2), &cpu()).unwrap(),
        );
        tensors.insert(
            "layers.0.weight_scale".to_string(),
            Tensor::from_slice(&[0.1f32, 0.1], (2,), &cpu()).unwrap(),
        );
        let clf = DenseClassifier::from_tensors(tensors, &cpu()).unwrap();

        let out = clf.forward(&[3.0, 0.0]).unwrap();
        let expected = 1.0 / (1.0 + (-3.0f32).exp());
        assert!((out[0] - expected).abs() < 1e-4);
    }

    #[test]
    fn test_quantized_weight_without_scale_fails() {
        let mut tensors = HashMap::new();
        tensors.insert(
            "layers.0.weight".to_string(),
            Tensor::from_slice(&[1u8, 2, 3, 4], (2, 2), &cpu()).unwrap(),
        );
        let err = DenseClassifier::from_tensors(tensors, &cpu()).err().unwrap();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_layer_gap_and_shape_mismatch() {
        let mut gap = fixed_distribution(2, &[0.5, 0.5]);
        gap.insert(
            "layers.2.weight".to_string(),
            Tensor::zeros((2, 2), DType::F32, &cpu()).unwrap(),
        );
        assert!(DenseClassifier::from_tensors(gap, &cpu()).is_err());

        let mut mismatch = fixed_distribution(2, &[0.5, 0.5]);
        mismatch.insert(
            "layers.1.weight".to_string(),
            Tensor::zeros((2, 3), DType::F32, &cpu()).unwrap(),
        );
        let err = DenseClassifier::from_tensors(mismatch, &cpu()).err().unwrap();
        assert!(err.to_string().contains("expects 3 inputs"));

        let empty = HashMap::new();
        assert!(DenseClassifier::from_tensors(empty, &cpu()).is_err());
    }

    #[test]
    fn test_wrong_input_width_is_validation_error() {
        let clf = DenseClassifier::from_tensors(fixed_distribution(3, &[0.4, 0.6]), &cpu())
            .unwrap();
        let err = clf.forward(&[1.0]).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn test_load_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather_model.safetensors");
        candle_core::safetensors::save(&fixed_distribution(4, &[0.1, 0.9]), &path).unwrap();

        let clf = DenseClassifier::load(&path, &cpu()).unwrap();
        assert_eq!((clf.input_width(), clf.output_width()), (4, 2));

        let missing = DenseClassifier::load(dir.path().join("nope.safetensors"), &cpu());
        assert_eq!(missing.err().unwrap().kind(), "ConfigurationError");
    }

    #[test]
    fn test_concurrent_forward_is_deterministic() {
        let clf = DenseClassifier::from_tensors(fixed_distribution(3, &[0.2, 0.5, 0.3]), &cpu())
            .unwrap();
        let baseline = clf.forward(&[0.1, 0.2, 0.3]).unwrap();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..25 {
                        assert_eq!(clf.forward(&[0.1, 0.2, 0.3]).unwrap(), baseline);
                    }
                });
            }
        });
    }
}
