//! Miniature transformer fixtures
//!
//! Each family pairs a real architecture from `candle-transformers` with a
//! config shrunk to two layers and a couple of attention heads, so session
//! setup stays fast while tests still exercise genuine model code. Weights
//! are freshly initialized; nothing here touches the network except
//! [`llama_tokenizer`], which goes through the model hub.

use std::collections::HashMap;

use candle_core::{DType, Device, Var};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::bert::{self, BertModel};
use candle_transformers::models::distilbert::{self, DistilBertModel};
use candle_transformers::models::llama::{self, Llama, LlamaConfig};
use candle_transformers::models::t5::{self, T5ForConditionalGeneration};
use tokenizers::models::wordlevel::WordLevel;
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::{AddedToken, Tokenizer};

use super::deep_copy_varmap;
use crate::checkout::Checkout;
use crate::error::{Error, Result};
use crate::hub::HubClient;
use crate::retry::{retry, DEFAULT_ATTEMPTS};

const LLAMA_REPO: &str = "huggyllama/llama-7b";

const BERT_SPECIALS: [&str; 5] = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"];
const T5_SPECIALS: [&str; 3] = ["<pad>", "</s>", "<unk>"];

const TINY_WORDS: [&str; 16] = [
    "the", "a", "model", "train", "test", "loss", "data", "batch", "epoch", "sample", "learning",
    "rate", "tiny", "state", "run", "step",
];

/// Two-layer BERT config with a 128-wide hidden state
pub fn bert_config() -> Result<bert::Config> {
    let config = serde_json::from_value(serde_json::json!({
        "architectures": ["BertForMaskedLM"],
        "attention_probs_dropout_prob": 0.1,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.1,
        "hidden_size": 128,
        "initializer_range": 0.02,
        "intermediate_size": 512,
        "layer_norm_eps": 1e-12,
        "max_position_embeddings": 512,
        "model_type": "bert",
        "num_attention_heads": 2,
        "num_hidden_layers": 2,
        "pad_token_id": 0,
        "type_vocab_size": 2,
        "vocab_size": 30522
    }))?;
    Ok(config)
}

/// Two-layer DistilBERT config with a 128-wide hidden state
pub fn distilbert_config() -> Result<distilbert::Config> {
    let config = serde_json::from_value(serde_json::json!({
        "activation": "gelu",
        "architectures": ["DistilBertForMaskedLM"],
        "attention_dropout": 0.1,
        "dim": 128,
        "dropout": 0.1,
        "hidden_dim": 512,
        "initializer_range": 0.02,
        "max_position_embeddings": 512,
        "model_type": "distilbert",
        "n_heads": 2,
        "n_layers": 2,
        "pad_token_id": 0,
        "qa_dropout": 0.1,
        "seq_classif_dropout": 0.2,
        "sinusoidal_pos_embds": false,
        "vocab_size": 30522
    }))?;
    Ok(config)
}

/// Two-layer encoder/decoder T5 config with a 64-wide model dimension
pub fn t5_config() -> Result<t5::Config> {
    let config = serde_json::from_value(serde_json::json!({
        "architectures": ["T5ForConditionalGeneration"],
        "d_ff": 128,
        "d_kv": 32,
        "d_model": 64,
        "decoder_start_token_id": 0,
        "dropout_rate": 0.1,
        "eos_token_id": 1,
        "feed_forward_proj": "relu",
        "initializer_factor": 1.0,
        "is_encoder_decoder": true,
        "layer_norm_epsilon": 1e-6,
        "model_type": "t5",
        "num_decoder_layers": 2,
        "num_heads": 2,
        "num_layers": 2,
        "pad_token_id": 0,
        "relative_attention_num_buckets": 32,
        "vocab_size": 32128
    }))?;
    Ok(config)
}

/// Two-layer decoder-only Llama config with a 64-wide hidden state
pub fn llama_config() -> Result<llama::Config> {
    let config: LlamaConfig = serde_json::from_value(serde_json::json!({
        "architectures": ["LlamaForCausalLM"],
        "bos_token_id": 1,
        "eos_token_id": 2,
        "hidden_act": "silu",
        "hidden_size": 64,
        "initializer_range": 0.02,
        "intermediate_size": 128,
        "max_position_embeddings": 512,
        "model_type": "llama",
        "num_attention_heads": 2,
        "num_hidden_layers": 2,
        "num_key_value_heads": 2,
        "pad_token_id": 0,
        "rms_norm_eps": 1e-6,
        "rope_theta": 10000.0,
        "tie_word_embeddings": false,
        "vocab_size": 32000
    }))?;
    Ok(config.into_config(false))
}

/// Miniature BERT encoder with freshly initialized weights
pub struct TinyBert {
    config: bert::Config,
    device: Device,
    vars: VarMap,
    model: BertModel,
}

impl TinyBert {
    /// Build a tiny BERT on `device`
    pub fn new(device: &Device) -> Result<Self> {
        Self::from_vars(bert_config()?, device, VarMap::new())
    }

    fn from_vars(config: bert::Config, device: &Device, vars: VarMap) -> Result<Self> {
        let vb = VarBuilder::from_varmap(&vars, DType::F32, device);
        let model = BertModel::load(vb, &config)?;
        Ok(Self {
            config,
            device: device.clone(),
            vars,
            model,
        })
    }

    /// The shrunken architecture description
    pub fn config(&self) -> &bert::Config {
        &self.config
    }

    /// The underlying candle model
    pub fn model(&self) -> &BertModel {
        &self.model
    }

    /// Device the weights live on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// All weight tensors
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.vars.all_vars()
    }
}

impl Checkout for TinyBert {
    fn checkout(&self) -> Result<Self> {
        let vars = deep_copy_varmap(&self.vars)?;
        Self::from_vars(self.config.clone(), &self.device, vars)
    }
}

/// Miniature DistilBERT encoder with freshly initialized weights
pub struct TinyDistilBert {
    config: distilbert::Config,
    device: Device,
    vars: VarMap,
    model: DistilBertModel,
}

impl TinyDistilBert {
    /// Build a tiny DistilBERT on `device`
    pub fn new(device: &Device) -> Result<Self> {
        Self::from_vars(distilbert_config()?, device, VarMap::new())
    }

    fn from_vars(config: distilbert::Config, device: &Device, vars: VarMap) -> Result<Self> {
        let vb = VarBuilder::from_varmap(&vars, DType::F32, device);
        let model = DistilBertModel::load(vb, &config)?;
        Ok(Self {
            config,
            device: device.clone(),
            vars,
            model,
        })
    }

    /// The shrunken architecture description
    pub fn config(&self) -> &distilbert::Config {
        &self.config
    }

    /// The underlying candle model
    pub fn model(&self) -> &DistilBertModel {
        &self.model
    }

    /// Device the weights live on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// All weight tensors
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.vars.all_vars()
    }
}

impl Checkout for TinyDistilBert {
    fn checkout(&self) -> Result<Self> {
        let vars = deep_copy_varmap(&self.vars)?;
        Self::from_vars(self.config.clone(), &self.device, vars)
    }
}

/// Miniature T5 encoder/decoder with freshly initialized weights
pub struct TinyT5 {
    config: t5::Config,
    device: Device,
    vars: VarMap,
    model: T5ForConditionalGeneration,
}

impl TinyT5 {
    /// Build a tiny T5 on `device`
    pub fn new(device: &Device) -> Result<Self> {
        Self::from_vars(t5_config()?, device, VarMap::new())
    }

    fn from_vars(config: t5::Config, device: &Device, vars: VarMap) -> Result<Self> {
        let vb = VarBuilder::from_varmap(&vars, DType::F32, device);
        let model = T5ForConditionalGeneration::load(vb, &config)?;
        Ok(Self {
            config,
            device: device.clone(),
            vars,
            model,
        })
    }

    /// The shrunken architecture description
    pub fn config(&self) -> &t5::Config {
        &self.config
    }

    /// The underlying candle model
    pub fn model(&self) -> &T5ForConditionalGeneration {
        &self.model
    }

    /// Device the weights live on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// All weight tensors
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.vars.all_vars()
    }
}

impl Checkout for TinyT5 {
    fn checkout(&self) -> Result<Self> {
        let vars = deep_copy_varmap(&self.vars)?;
        Self::from_vars(self.config.clone(), &self.device, vars)
    }
}

/// Miniature decoder-only Llama with freshly initialized weights
pub struct TinyLlama {
    config: llama::Config,
    device: Device,
    vars: VarMap,
    model: Llama,
}

impl TinyLlama {
    /// Build a tiny Llama on `device`
    pub fn new(device: &Device) -> Result<Self> {
        Self::from_vars(llama_config()?, device, VarMap::new())
    }

    fn from_vars(config: llama::Config, device: &Device, vars: VarMap) -> Result<Self> {
        let vb = VarBuilder::from_varmap(&vars, DType::F32, device);
        let model = Llama::load(vb, &config)?;
        Ok(Self {
            config,
            device: device.clone(),
            vars,
            model,
        })
    }

    /// The shrunken architecture description
    pub fn config(&self) -> &llama::Config {
        &self.config
    }

    /// The underlying candle model
    pub fn model(&self) -> &Llama {
        &self.model
    }

    /// Device the weights live on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Empty KV cache sized for this config; forward passes need one
    pub fn new_cache(&self) -> Result<llama::Cache> {
        Ok(llama::Cache::new(true, DType::F32, &self.config, &self.device)?)
    }

    /// All weight tensors
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.vars.all_vars()
    }
}

impl Checkout for TinyLlama {
    fn checkout(&self) -> Result<Self> {
        let vars = deep_copy_varmap(&self.vars)?;
        Self::from_vars(self.config.clone(), &self.device, vars)
    }
}

impl Checkout for bert::Config {
    fn checkout(&self) -> Result<Self> {
        Ok(self.clone())
    }
}

impl Checkout for distilbert::Config {
    fn checkout(&self) -> Result<Self> {
        Ok(self.clone())
    }
}

impl Checkout for t5::Config {
    fn checkout(&self) -> Result<Self> {
        Ok(self.clone())
    }
}

impl Checkout for llama::Config {
    fn checkout(&self) -> Result<Self> {
        Ok(self.clone())
    }
}

impl Checkout for Tokenizer {
    fn checkout(&self) -> Result<Self> {
        // Tokenizer owns its vocab and state; clone is already deep.
        Ok(self.clone())
    }
}

fn word_level_tokenizer(specials: &[&str], unk: &str) -> Result<Tokenizer> {
    let mut vocab = HashMap::new();
    for (id, token) in specials.iter().chain(TINY_WORDS.iter()).enumerate() {
        vocab.insert(token.to_string(), id as u32);
    }

    let model = WordLevel::builder()
        .vocab(vocab)
        .unk_token(unk.to_string())
        .build()
        .map_err(|e| Error::tokenizer(e.to_string()))?;

    let mut tokenizer = Tokenizer::new(model);
    tokenizer.with_pre_tokenizer(PreTokenizerWrapper::Whitespace(Whitespace {}));

    let added: Vec<AddedToken> = specials
        .iter()
        .map(|token| AddedToken::from(token.to_string(), true))
        .collect();
    tokenizer.add_special_tokens(&added);

    Ok(tokenizer)
}

/// Word-level tokenizer with BERT-style special tokens
pub fn bert_tokenizer() -> Result<Tokenizer> {
    word_level_tokenizer(&BERT_SPECIALS, "[UNK]")
}

/// Word-level tokenizer with T5-style special tokens
pub fn t5_tokenizer() -> Result<Tokenizer> {
    word_level_tokenizer(&T5_SPECIALS, "<unk>")
}

/// Real Llama tokenizer fetched through the model hub.
///
/// Downloads are retried before the failure is surfaced; without the `hub`
/// feature the fetch reports unavailability instead.
pub fn llama_tokenizer(hub: &HubClient) -> Result<Tokenizer> {
    let path = retry(|| hub.fetch(LLAMA_REPO, "tokenizer.json"), DEFAULT_ATTEMPTS)?;
    Tokenizer::from_file(&path).map_err(|e| Error::tokenizer(e.to_string()))
}
