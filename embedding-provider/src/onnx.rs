//! Local ONNX embedder, grounded in the teacher's `embedder::OnnxStdIoEmbedder`:
//! a tokenizer + ONNX Runtime session, exposed behind the async
//! [`EmbeddingProvider`] trait. Inference is CPU-bound and runs to
//! completion within the `embed` call, the same tradeoff the teacher's
//! synchronous embedder makes.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};

use crate::{reject_empty, EmbedError, EmbeddingProvider};

#[derive(Debug, Clone)]
pub struct OnnxEmbeddingConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub dimension: usize,
    pub max_input_tokens: usize,
}

pub struct OnnxEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    pad_id: i64,
    dimension: usize,
    max_input_tokens: usize,
}

impl OnnxEmbeddingProvider {
    pub fn new(config: OnnxEmbeddingConfig) -> Result<Self, EmbedError> {
        if config.dimension == 0 {
            return Err(EmbedError::Malformed("dimension must be greater than zero".into()));
        }
        let session = Session::builder()
            .map_err(|e| EmbedError::Malformed(format!("create ONNX session builder: {e}")))?
            .commit_from_file(&config.model_path)
            .map_err(|e| EmbedError::Malformed(format!("load ONNX model: {e}")))?;
        let tokenizer = Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| EmbedError::Malformed(format!("load tokenizer: {e}")))?;
        let pad_id = tokenizer
            .token_to_id("<pad>")
            .ok_or_else(|| EmbedError::Malformed("tokenizer has no <pad> token".into()))? as i64;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            pad_id,
            dimension: config.dimension,
            max_input_tokens: config.max_input_tokens,
        })
    }

    fn embed_batch_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings: Vec<Encoding> = refs
            .iter()
            .map(|t| self.tokenizer.encode(*t, true))
            .collect::<Result<_, _>>()
            .map_err(|e| EmbedError::Malformed(format!("tokenize: {e}")))?;

        let seq_len = encodings.iter().map(Encoding::len).max().unwrap_or(0);
        if seq_len > self.max_input_tokens {
            return Err(EmbedError::Malformed(format!(
                "input exceeds {} tokens (got {seq_len})",
                self.max_input_tokens
            )));
        }

        let batch = encodings.len();
        let mut input_ids = Array2::<i64>::zeros((batch, seq_len));
        let mut attention_mask = Array2::<i64>::zeros((batch, seq_len));
        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            for col in 0..seq_len {
                if col < ids.len() {
                    input_ids[(row, col)] = ids[col] as i64;
                    attention_mask[(row, col)] = mask[col] as i64;
                } else {
                    input_ids[(row, col)] = self.pad_id;
                    attention_mask[(row, col)] = 0;
                }
            }
        }

        let input_ids = Tensor::from_array(input_ids).map_err(|e| EmbedError::Malformed(e.to_string()))?;
        let attention_mask_tensor =
            Tensor::from_array(attention_mask.clone()).map_err(|e| EmbedError::Malformed(e.to_string()))?;

        let mut session = self.session.lock().expect("onnx session mutex poisoned");
        let outputs = session
            .run(ort::inputs![input_ids, attention_mask_tensor])
            .map_err(|e| EmbedError::Malformed(format!("run ONNX session: {e}")))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedError::Malformed(format!("extract output tensor: {e}")))?;
        if shape.len() != 3 {
            return Err(EmbedError::Malformed(format!(
                "model output must be rank-3 [batch, seq_len, hidden], got {shape:?}"
            )));
        }
        let hidden: usize = shape[2].try_into().unwrap();

        let mut results = Vec::with_capacity(batch);
        for row in 0..batch {
            let mut sum = vec![0f32; hidden];
            let mut count = 0f32;
            for col in 0..seq_len {
                if attention_mask[(row, col)] == 1 {
                    let base = (row * seq_len + col) * hidden;
                    for h in 0..hidden {
                        sum[h] += data[base + h];
                    }
                    count += 1.0;
                }
            }
            if count > 0.0 {
                for v in &mut sum {
                    *v /= count;
                }
            }
            if sum.len() != self.dimension {
                return Err(EmbedError::Malformed(format!(
                    "pooled embedding has dimension {}, expected {}",
                    sum.len(),
                    self.dimension
                )));
            }
            results.push(sum);
        }
        Ok(results)
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        reject_empty(texts)?;
        self.embed_batch_blocking(texts)
    }
}
