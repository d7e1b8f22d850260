use crate::error::ProviderError;
use crate::provider::EncryptionProvider;
use crate::record::Record;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

const SEAL_PREFIX: &str = "sealed:";

// Reversible stand-in cipher: the blob is the payload JSON behind a prefix.
#[derive(Default)]
pub struct SealingProvider {
    pub encrypt_calls: AtomicUsize,
    pub decrypt_calls: AtomicUsize,
}

impl SealingProvider {
    pub fn encrypt_count(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_count(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }
}

impl EncryptionProvider for SealingProvider {
    fn encrypt(&self, payload: &Map<String, Value>) -> Result<Value, ProviderError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Value::String(format!("{SEAL_PREFIX}{}", serde_json::to_string(payload)?)))
    }

    fn decrypt(&self, blob: &Value) -> Result<Map<String, Value>, ProviderError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        let sealed = blob
            .as_str()
            .and_then(|text| text.strip_prefix(SEAL_PREFIX))
            .ok_or_else(|| ProviderError::InvalidBlob("not sealed".into()))?;
        Ok(serde_json::from_str(sealed)?)
    }

    fn scheme_name(&self) -> &str {
        "sealing"
    }
}

pub struct FailingProvider;

impl EncryptionProvider for FailingProvider {
    fn encrypt(&self, _payload: &Map<String, Value>) -> Result<Value, ProviderError> {
        Err(ProviderError::EncryptionFailed("hsm offline".into()))
    }

    fn decrypt(&self, _blob: &Value) -> Result<Map<String, Value>, ProviderError> {
        Err(ProviderError::DecryptionFailed("hsm offline".into()))
    }
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(object) => Record::from_object(object),
        other => panic!("expected an object, got {other}"),
    }
}

pub fn object(record: &Record) -> Value {
    Value::Object(record.to_object())
}
