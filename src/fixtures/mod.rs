//! The named fixtures test suites build on
//!
//! Naming is the contract: suites ask for `minimal_state`, a
//! `tiny_bert_model`, or the `test_session_name` and get the same semantics
//! everywhere. Session-scoped fixtures go through a [`SessionCache`] and
//! hand out per-test checkouts; state fixtures are cheap enough to build
//! fresh each time.

use candle_nn::{Optimizer, SGD};
use candle_transformers::models::{bert, distilbert, llama, t5};
use chrono::Utc;
use rand::Rng;
use tokenizers::Tokenizer;

use crate::cache::SessionCache;
use crate::data::{Loader, RandomClassificationConfig, RandomClassificationDataset};
use crate::device;
use crate::dist::{broadcast_value, Collective};
use crate::error::Result;
use crate::hub::HubClient;
use crate::loggers::Logger;
use crate::models::tiny::{self, TinyBert, TinyDistilBert, TinyLlama, TinyT5};
use crate::models::{LoraAdapterConfig, SimpleModel, SimpleModelConfig};
use crate::options::{self, TestMarkers};
use crate::state::{LrSchedule, Precision, RunState};
use crate::time::TimeBudget;
use crate::tracking::{self, TrackingGuard};

pub use crate::options::rank_zero_seed;

#[cfg(test)]
mod tests;

/// Session cache keys for the fixtures in this module
mod keys {
    pub const SESSION_NAME: &str = "test_session_name";
    pub const TINY_BERT_CONFIG: &str = "tiny_bert_config";
    pub const TINY_BERT_MODEL: &str = "tiny_bert_model";
    pub const TINY_BERT_TOKENIZER: &str = "tiny_bert_tokenizer";
    pub const TINY_DISTILBERT_CONFIG: &str = "tiny_distilbert_config";
    pub const TINY_DISTILBERT_MODEL: &str = "tiny_distilbert_model";
    pub const TINY_DISTILBERT_TOKENIZER: &str = "tiny_distilbert_tokenizer";
    pub const TINY_T5_CONFIG: &str = "tiny_t5_config";
    pub const TINY_T5_MODEL: &str = "tiny_t5_model";
    pub const TINY_T5_TOKENIZER: &str = "tiny_t5_tokenizer";
    pub const TINY_LLAMA_CONFIG: &str = "tiny_llama_config";
    pub const TINY_LLAMA_MODEL: &str = "tiny_llama_model";
    pub const TINY_LLAMA_TOKENIZER: &str = "tiny_llama_tokenizer";
    pub const TINY_LORA_CONFIG: &str = "tiny_lora_config";
}

/// Environment variable that overrides the remote bucket name
pub const S3_BUCKET_VAR: &str = "S3_BUCKET";

const DEFAULT_REMOTE_BUCKET: &str = "mosaicml-internal-integration-testing";
const LOCAL_PLACEHOLDER_BUCKET: &str = "my-bucket";

const LABEL_ADJECTIVES: [&str; 16] = [
    "amber", "brisk", "calm", "daring", "eager", "fuzzy", "gentle", "hardy", "ivory", "jolly",
    "keen", "lively", "mellow", "nimble", "opal", "quiet",
];

const LABEL_NOUNS: [&str; 16] = [
    "falcon", "harbor", "juniper", "kestrel", "lagoon", "meadow", "nebula", "orchard", "pebble",
    "quarry", "redwood", "sparrow", "thicket", "umber", "walnut", "yarrow",
];

/// The smallest state a trainer-shaped test can run against
pub fn minimal_state(markers: &TestMarkers) -> Result<RunState> {
    let seed = options::rank_zero_seed()?;
    let device = device::for_markers(markers)?;
    let model = SimpleModel::new(SimpleModelConfig::default(), &device)?;

    let mut state = RunState::new(
        "minimal_run_name",
        device.clone(),
        seed,
        TimeBudget::epochs(100),
        model,
    );
    let dataset = RandomClassificationDataset::generate(
        &RandomClassificationConfig {
            seed,
            ..Default::default()
        },
        &device,
    )?;
    state.set_dataloader(Loader::new(&dataset, 4)?, "train");
    Ok(state)
}

/// A state with everything populated: optimizer, schedule, precision, and
/// a capped microbatch size
pub fn dummy_state(markers: &TestMarkers) -> Result<RunState> {
    let seed = options::rank_zero_seed()?;
    let device = device::for_markers(markers)?;
    let model = SimpleModel::new(SimpleModelConfig::default(), &device)?;
    let optimizer = SGD::new(model.trainable_vars(), 0.001)?;

    let mut state = RunState::new(
        "dummy_run_name",
        device.clone(),
        seed,
        TimeBudget::epochs(10),
        model,
    );
    state.optimizer = Some(optimizer);
    state.lr_schedule = Some(LrSchedule::Constant(1.0));
    state.precision = Precision::Fp32;
    state.device_train_microbatch_size = Some(1);

    let dataset = RandomClassificationDataset::generate(
        &RandomClassificationConfig {
            seed,
            ..Default::default()
        },
        &device,
    )?;
    state.set_dataloader(Loader::new(&dataset, 4)?, "train");
    Ok(state)
}

/// Logger with no destinations attached
pub fn empty_logger() -> Logger {
    Logger::empty()
}

/// Name shared by every rank for one suite invocation.
///
/// Rank zero composes `<unix-seconds>-<adjective>-<noun>` and broadcasts
/// it. The readable suffix keeps concurrent suite runs tellable apart when
/// scanning a shared bucket.
pub fn test_session_name(cache: &SessionCache, comm: &dyn Collective) -> Result<String> {
    let name = cache.get_or_create(keys::SESSION_NAME, || generate_session_name(comm))?;
    Ok(name.as_ref().clone())
}

fn generate_session_name(comm: &dyn Collective) -> Result<String> {
    let proposal = if comm.rank() == 0 {
        let mut rng = rand::rng();
        let adjective = LABEL_ADJECTIVES[rng.random_range(0..LABEL_ADJECTIVES.len())];
        let noun = LABEL_NOUNS[rng.random_range(0..LABEL_NOUNS.len())];
        Some(format!("{}-{}-{}", Utc::now().timestamp(), adjective, noun))
    } else {
        None
    };
    broadcast_value(comm, proposal, 0)
}

/// URI of the throwaway SFTP endpoint integration tests target
pub fn sftp_uri() -> String {
    "sftp://localhost".to_string()
}

/// Object-storage bucket a test should talk to.
///
/// Tests without the `remote` marker get a placeholder name that no client
/// should ever resolve; `remote` tests read `S3_BUCKET` with an
/// integration-testing default.
pub fn s3_bucket(markers: &TestMarkers) -> String {
    if markers.remote {
        std::env::var(S3_BUCKET_VAR).unwrap_or_else(|_| DEFAULT_REMOTE_BUCKET.to_string())
    } else {
        LOCAL_PLACEHOLDER_BUCKET.to_string()
    }
}

/// Key prefix for objects a test may create and delete
pub fn s3_ephemeral_prefix() -> &'static str {
    "ephemeral"
}

/// Key prefix for long-lived objects tests read but never write
pub fn s3_read_only_prefix() -> &'static str {
    "read_only"
}

/// Per-test copy of the session-scoped tiny BERT config
pub fn tiny_bert_config(cache: &SessionCache) -> Result<bert::Config> {
    cache.checkout(keys::TINY_BERT_CONFIG, tiny::bert_config)
}

/// Per-test copy of the session-scoped tiny BERT model
pub fn tiny_bert_model(cache: &SessionCache) -> Result<TinyBert> {
    cache.checkout(keys::TINY_BERT_MODEL, || TinyBert::new(&device::cpu()))
}

/// Per-test copy of the session-scoped tiny BERT tokenizer
pub fn tiny_bert_tokenizer(cache: &SessionCache) -> Result<Tokenizer> {
    cache.checkout(keys::TINY_BERT_TOKENIZER, tiny::bert_tokenizer)
}

/// Per-test copy of the session-scoped tiny DistilBERT config
pub fn tiny_distilbert_config(cache: &SessionCache) -> Result<distilbert::Config> {
    cache.checkout(keys::TINY_DISTILBERT_CONFIG, tiny::distilbert_config)
}

/// Per-test copy of the session-scoped tiny DistilBERT model
pub fn tiny_distilbert_model(cache: &SessionCache) -> Result<TinyDistilBert> {
    cache.checkout(keys::TINY_DISTILBERT_MODEL, || {
        TinyDistilBert::new(&device::cpu())
    })
}

/// Per-test copy of the session-scoped tiny DistilBERT tokenizer
pub fn tiny_distilbert_tokenizer(cache: &SessionCache) -> Result<Tokenizer> {
    // DistilBERT shares BERT's vocabulary and specials.
    cache.checkout(keys::TINY_DISTILBERT_TOKENIZER, tiny::bert_tokenizer)
}

/// Per-test copy of the session-scoped tiny T5 config
pub fn tiny_t5_config(cache: &SessionCache) -> Result<t5::Config> {
    cache.checkout(keys::TINY_T5_CONFIG, tiny::t5_config)
}

/// Per-test copy of the session-scoped tiny T5 model
pub fn tiny_t5_model(cache: &SessionCache) -> Result<TinyT5> {
    cache.checkout(keys::TINY_T5_MODEL, || TinyT5::new(&device::cpu()))
}

/// Per-test copy of the session-scoped tiny T5 tokenizer
pub fn tiny_t5_tokenizer(cache: &SessionCache) -> Result<Tokenizer> {
    cache.checkout(keys::TINY_T5_TOKENIZER, tiny::t5_tokenizer)
}

/// Per-test copy of the session-scoped tiny Llama config
pub fn tiny_llama_config(cache: &SessionCache) -> Result<llama::Config> {
    cache.checkout(keys::TINY_LLAMA_CONFIG, tiny::llama_config)
}

/// Per-test copy of the session-scoped tiny Llama model
pub fn tiny_llama_model(cache: &SessionCache) -> Result<TinyLlama> {
    cache.checkout(keys::TINY_LLAMA_MODEL, || TinyLlama::new(&device::cpu()))
}

/// Per-test copy of the session-scoped Llama tokenizer.
///
/// Needs the `hub` feature and network access; otherwise requests for it
/// skip.
pub fn tiny_llama_tokenizer(cache: &SessionCache) -> Result<Tokenizer> {
    cache.checkout(keys::TINY_LLAMA_TOKENIZER, || {
        let hub = HubClient::new()?;
        tiny::llama_tokenizer(&hub)
    })
}

/// Per-test copy of the session-scoped LoRA adapter config
pub fn tiny_lora_config(cache: &SessionCache) -> Result<LoraAdapterConfig> {
    cache.checkout(keys::TINY_LORA_CONFIG, || Ok(LoraAdapterConfig::default()))
}

/// Guard that keeps experiment-tracking state from leaking across tests.
///
/// Flushes the global tracking session's active runs when created and again
/// when dropped. With no backend installed and no active runs this does
/// nothing.
pub fn clean_tracking_runs() -> TrackingGuard<'static> {
    tracking::global().clean_runs()
}

/// Route `tracing` output through the test harness.
///
/// Safe to call from every test; only the first call installs a
/// subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("crucible=debug")
        .with_test_writer()
        .try_init();
}

/// Unwrap a fixture result inside a `#[test]`.
///
/// Returns early (skipping the rest of the test body) when the fixture is
/// unavailable in this build or environment, and panics on real failures.
#[macro_export]
macro_rules! require_fixture {
    ($fixture:expr) => {
        match $fixture {
            Ok(value) => value,
            Err($crate::Error::Unavailable { what, reason }) => {
                eprintln!("skipping test: {} unavailable: {}", what, reason);
                return;
            }
            Err(err) => panic!("fixture setup failed: {}", err),
        }
    };
}
