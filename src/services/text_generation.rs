// src/services/text_generation.rs
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::phi::{Config as PhiConfig, Model as Phi};
use hf_hub::{Repo, RepoType, api::sync::Api};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::error::GenerationError;

pub const MODEL_ID: &str = "microsoft/phi-1_5";
pub const MODEL_REVISION: &str = "main";

const END_OF_TEXT: &str = "<|endoftext|>";

// Greedy decoding never draws from the rng.
const GREEDY_SEED: u64 = 299792458;

/// Fixed generation settings for the Phi family.
///
/// `pad_token_id` is Phi's `<|endoftext|>` id (inherited from the GPT-2
/// vocabulary). It has no meaning for other model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Cap on the whole sequence, prompt tokens included.
    pub max_length: usize,
    pub num_return_sequences: usize,
    pub pad_token_id: u32,
}

impl GenerationConfig {
    pub const PHI: Self = Self {
        max_length: 100,
        num_return_sequences: 1,
        pad_token_id: 50256,
    };

    /// How many tokens may still be generated after a prompt of `prompt_len`.
    pub fn new_token_budget(&self, prompt_len: usize) -> usize {
        self.max_length.saturating_sub(prompt_len)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::PHI
    }
}

/// Something that turns a prompt into full generated text.
///
/// Returned candidates include the prompt echo, the way text-generation
/// pipelines report `generated_text`. Calls are blocking.
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<Vec<String>, GenerationError>;
}

pub fn select_device(force_cpu: bool) -> Result<Device, GenerationError> {
    if force_cpu {
        return Ok(Device::Cpu);
    }
    Ok(Device::cuda_if_available(0)?)
}

/// Phi-1.5 loaded once and shared read-only between requests.
pub struct PhiGenerator {
    model: Phi,
    tokenizer: Tokenizer,
    device: Device,
}

impl PhiGenerator {
    /// Fetch (or reuse the hub cache for) config, tokenizer and weights, then
    /// build the model on `device`.
    pub fn load(device: Device) -> Result<Self, GenerationError> {
        let started = Instant::now();
        info!(model = MODEL_ID, revision = MODEL_REVISION, ?device, "loading model");

        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            MODEL_ID.to_string(),
            RepoType::Model,
            MODEL_REVISION.to_string(),
        ));

        let config_path = repo.get("config.json")?;
        let tokenizer_path = repo.get("tokenizer.json")?;
        let weights_path = repo.get("model.safetensors")?;

        let cfg: PhiConfig = serde_json::from_slice(&std::fs::read(&config_path)?)?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(tokenizer_error)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)?
        };
        let model = Phi::new(&cfg, vb)?;

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "model ready");

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    fn generate_one(
        &self,
        prompt: &str,
        prompt_ids: &[u32],
        config: &GenerationConfig,
    ) -> Result<String, GenerationError> {
        let started = Instant::now();
        let eos = self
            .tokenizer
            .token_to_id(END_OF_TEXT)
            .unwrap_or(config.pad_token_id);

        let mut tokens = initial_tokens(prompt_ids, eos);
        let seeded = tokens.len();
        let budget = config.new_token_budget(seeded);

        // The clone shares weight storage; only the KV cache is private.
        let mut model = self.model.clone();
        model.clear_kv_cache();

        extend_greedy(&mut tokens, budget, eos, |ctx| {
            let input = Tensor::new(ctx, &self.device)?.unsqueeze(0)?;
            Ok(model.forward(&input)?.squeeze(0)?.to_dtype(DType::F32)?)
        })?;

        debug!(
            prompt_tokens = prompt_ids.len(),
            new_tokens = tokens.len() - seeded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation finished"
        );

        decode_generated(&self.tokenizer, prompt, prompt_ids, &tokens, config.pad_token_id)
    }
}

impl TextGenerator for PhiGenerator {
    fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<Vec<String>, GenerationError> {
        let encoding = self.tokenizer.encode(prompt, true).map_err(tokenizer_error)?;
        let prompt_ids = encoding.get_ids();

        (0..config.num_return_sequences)
            .map(|_| self.generate_one(prompt, prompt_ids, config))
            .collect()
    }
}

/// Starting sequence for the model. An empty prompt starts from the
/// beginning-of-text token, which for Phi is `<|endoftext|>`.
fn initial_tokens(prompt_ids: &[u32], bos: u32) -> Vec<u32> {
    if prompt_ids.is_empty() {
        vec![bos]
    } else {
        prompt_ids.to_vec()
    }
}

/// Append up to `budget` argmax tokens to `tokens`, stopping after `eos`.
///
/// `forward` receives the ids not yet fed to the model (the whole prompt on
/// the first step, then one token) and returns 1-D logits.
fn extend_greedy<F>(
    tokens: &mut Vec<u32>,
    budget: usize,
    eos: u32,
    mut forward: F,
) -> Result<(), GenerationError>
where
    F: FnMut(&[u32]) -> Result<Tensor, GenerationError>,
{
    let mut logits_processor = LogitsProcessor::new(GREEDY_SEED, None, None);
    let mut fed = 0usize;

    for _ in 0..budget {
        let logits = forward(&tokens[fed..])?;
        fed = tokens.len();

        let next = logits_processor.sample(&logits)?;
        tokens.push(next);
        if next == eos {
            break;
        }
    }
    Ok(())
}

/// Rebuild `generated_text` the way text-generation pipelines report it: the
/// caller's prompt verbatim, then whatever the model added after it.
fn decode_generated(
    tokenizer: &Tokenizer,
    prompt: &str,
    prompt_ids: &[u32],
    tokens: &[u32],
    pad_token_id: u32,
) -> Result<String, GenerationError> {
    let content: Vec<u32> = tokens
        .iter()
        .copied()
        .filter(|&id| id != pad_token_id)
        .collect();
    let prompt_content: Vec<u32> = prompt_ids
        .iter()
        .copied()
        .filter(|&id| id != pad_token_id)
        .collect();

    let full = decode(tokenizer, &content)?;
    let decoded_prompt = decode(tokenizer, &prompt_content)?;

    // Byte-level merges can make the decoded prompt end mid-character.
    let continuation = match full.get(decoded_prompt.len()..) {
        Some(rest) => rest.to_string(),
        None => decode(tokenizer, &content[prompt_content.len().min(content.len())..])?,
    };

    Ok(format!("{prompt}{continuation}"))
}

fn decode(tokenizer: &Tokenizer, ids: &[u32]) -> Result<String, GenerationError> {
    tokenizer.decode(ids, true).map_err(tokenizer_error)
}

fn tokenizer_error(e: tokenizers::Error) -> GenerationError {
    GenerationError::Tokenizer(e.to_string())
}
