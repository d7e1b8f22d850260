//! Basic usage example for `Veilstore`.

use serde_json::json;
use std::sync::Arc;
use veilstore::constants::ENVELOPE_FIELD;
use veilstore::prelude::*;
use veilstore_aead::AeadProvider;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Veilstore Basic Usage Example");
    println!("=============================\n");

    // Declare the schema before installing the layer
    let store = MemoryStore::new();
    store.declare(1, &[("users", "++id, email")])?;
    println!("✓ Schema declared: users(++id, email)\n");

    let provider = Arc::new(AeadProvider::generate());
    let config = EncryptionConfig::new(provider).with_table("users");
    let session = veilstore::install(&store, config)?;
    println!("✓ Encryption layer installed, ready = {}\n", session.is_ready());

    store.open().await?;
    println!("✓ Store opened, ready = {}\n", session.is_ready());

    let user = json!({"email": "alice@example.com", "ssn": "123-45-6789", "name": "Alice"});
    let Some(user) = user.as_object().cloned() else {
        return Err("user is not an object".into());
    };
    let key = store.add("users", Record::from_object(user)).await?;
    println!("✓ User created with key {key}\n");

    if let Some(raw) = store.raw("users", &key)? {
        println!("Stored representation:");
        println!("  - id: {:?}", raw.get("id"));
        println!("  - email: {:?}", raw.get("email"));
        println!("  - ssn: {:?}", raw.get("ssn"));
        println!("  - {ENVELOPE_FIELD}: {:?}\n", raw.get(ENVELOPE_FIELD));
    }

    if let Some(read) = store.get("users", &key).await? {
        println!("Decrypted read:");
        println!("  {}", serde_json::Value::Object(read.to_object()));
    }

    Ok(())
}
