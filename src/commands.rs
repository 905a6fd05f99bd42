//! Operator commands run by the `catalog-cache` binary.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;

use crate::cache::{CachedValue, TieredCache};
use crate::config::{Command, FingerprintArgs, SetArgs};
use crate::error::AppError;
use crate::fingerprint::fingerprint;

/// Run a cache command, writing its result to `out`.
pub async fn execute<W: Write>(
    cache: &TieredCache,
    command: Command,
    out: &mut W,
) -> Result<(), AppError> {
    match command {
        Command::Stats => {
            let mut stats = cache.stats();
            stats.remote_available = cache.is_remote_available().await;
            print_json(out, &stats)
        }
        Command::Get(args) => {
            let value = cache.get(&args.key).await;
            match value {
                Some(value) => print_value(out, &value),
                None => Err(AppError::NotFound(args.key)),
            }
        }
        Command::Set(args) => run_set(cache, args, out).await,
        Command::Delete(args) => {
            let existed = cache.delete(&args.key).await;
            print_json(out, &json!({ "key": args.key, "deleted": existed }))
        }
        Command::Invalidate(args) => {
            let removed = cache.invalidate_pattern(&args.prefix).await;
            print_json(out, &json!({ "prefix": args.prefix, "removed": removed }))
        }
        Command::Clear => {
            let remote_cleared = cache.clear().await;
            print_json(out, &json!({ "remote_cleared": remote_cleared }))
        }
        Command::Fingerprint(args) => run_fingerprint(args, out).await,
    }
}

async fn run_set<W: Write>(cache: &TieredCache, args: SetArgs, out: &mut W) -> Result<(), AppError> {
    let ttl = match args.ttl_seconds {
        Some(0) => return Err(AppError::validation("--ttl must be greater than zero")),
        Some(seconds) => Duration::from_secs(seconds),
        None => cache.default_ttl(),
    };

    let value = match serde_json::from_str::<Value>(&args.value) {
        Ok(parsed) => CachedValue::from(parsed),
        Err(_) => CachedValue::from(args.value),
    };

    let stored = cache.set(&args.key, value, ttl).await;
    print_json(
        out,
        &json!({ "key": args.key, "stored": stored, "ttl_seconds": ttl.as_secs() }),
    )
}

async fn run_fingerprint<W: Write>(args: FingerprintArgs, out: &mut W) -> Result<(), AppError> {
    let raw = match args.file.as_deref() {
        Some(path) => read_file(path).await?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer
        }
    };

    let payload: Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::validation(format!("input is not valid JSON: {err}")))?;
    let token = fingerprint(&payload);
    writeln!(out, "{token}")?;
    Ok(())
}

async fn read_file(path: &Path) -> Result<String, AppError> {
    tokio::fs::read_to_string(path).await.map_err(|err| {
        AppError::validation(format!("failed to read `{}`: {err}", path.display()))
    })
}

fn print_value<W: Write>(out: &mut W, value: &CachedValue) -> Result<(), AppError> {
    match value {
        CachedValue::Structured(json) => print_json(out, json),
        CachedValue::Binary(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => {
                writeln!(out, "{text}")?;
                Ok(())
            }
            Err(_) => {
                writeln!(out, "<{} bytes of binary data>", bytes.len())?;
                Ok(())
            }
        },
    }
}

fn print_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    writeln!(out, "{rendered}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::config::{InvalidateArgs, KeyArgs};

    fn cache() -> TieredCache {
        TieredCache::local_only(&CacheConfig::default())
    }

    async fn run(cache: &TieredCache, command: Command) -> Result<String, AppError> {
        let mut out = Vec::new();
        execute(cache, command, &mut out).await?;
        Ok(String::from_utf8(out).expect("utf-8 output"))
    }

    fn key(key: &str) -> KeyArgs {
        KeyArgs {
            key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn set_parses_json_and_falls_back_to_text() {
        let cache = cache();
        run(
            &cache,
            Command::Set(SetArgs {
                key: "books:1:20".to_string(),
                value: "{\"total\": 40}".to_string(),
                ttl_seconds: Some(60),
            }),
        )
        .await
        .expect("set json");
        run(
            &cache,
            Command::Set(SetArgs {
                key: "note".to_string(),
                value: "not json".to_string(),
                ttl_seconds: None,
            }),
        )
        .await
        .expect("set text");

        let listing = run(&cache, Command::Get(key("books:1:20"))).await.expect("get");
        let parsed: Value = serde_json::from_str(&listing).expect("json output");
        assert_eq!(parsed, json!({"total": 40}));

        let note = run(&cache, Command::Get(key("note"))).await.expect("get");
        assert_eq!(note.trim(), "\"not json\"");
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let err = run(
            &cache(),
            Command::Set(SetArgs {
                key: "k".to_string(),
                value: "1".to_string(),
                ttl_seconds: Some(0),
            }),
        )
        .await
        .expect_err("zero ttl");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn get_miss_is_not_found() {
        let err = run(&cache(), Command::Get(key("cover:9:S")))
            .await
            .expect_err("miss");
        assert!(matches!(err, AppError::NotFound(ref missing) if missing == "cover:9:S"));
    }

    #[tokio::test]
    async fn binary_values_are_summarized() {
        let cache = cache();
        cache
            .set("cover:123:L", vec![0xff_u8, 0xd8, 0xff], Duration::from_secs(60))
            .await;
        let output = run(&cache, Command::Get(key("cover:123:L"))).await.expect("get");
        assert_eq!(output.trim(), "<3 bytes of binary data>");
    }

    #[tokio::test]
    async fn invalidate_and_stats_report_json() {
        let cache = cache();
        for page in 1..=2 {
            cache
                .set(&format!("books:{page}:20"), json!({"page": page}), Duration::from_secs(60))
                .await;
        }

        let output = run(
            &cache,
            Command::Invalidate(InvalidateArgs {
                prefix: "books:*".to_string(),
            }),
        )
        .await
        .expect("invalidate");
        let parsed: Value = serde_json::from_str(&output).expect("json output");
        assert_eq!(parsed["removed"], json!(2));

        let stats = run(&cache, Command::Stats).await.expect("stats");
        let parsed: Value = serde_json::from_str(&stats).expect("json output");
        assert_eq!(parsed["remote_available"], json!(false));
        assert_eq!(parsed["local_entries"], json!(0));
    }

    #[tokio::test]
    async fn clear_empties_local_tier_and_reports_remote_status() {
        let cache = cache();
        cache
            .set("ai_summary:42", "A short summary", Duration::from_secs(60))
            .await;

        let output = run(&cache, Command::Clear).await.expect("clear");
        let parsed: Value = serde_json::from_str(&output).expect("json output");
        assert_eq!(parsed, json!({"remote_cleared": false}));
        assert_eq!(cache.local_len(), 0);
    }

    #[tokio::test]
    async fn fingerprint_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{\"b\": 2, \"a\": \"1\"}}").expect("write payload");

        let output = run(
            &cache(),
            Command::Fingerprint(FingerprintArgs {
                file: Some(file.path().to_path_buf()),
            }),
        )
        .await
        .expect("fingerprint");

        assert_eq!(output.trim(), fingerprint(&json!({"a": 1, "b": 2})).as_str());
    }

    #[tokio::test]
    async fn fingerprint_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{not json").expect("write payload");

        let err = run(
            &cache(),
            Command::Fingerprint(FingerprintArgs {
                file: Some(file.path().to_path_buf()),
            }),
        )
        .await
        .expect_err("invalid json");
        assert!(matches!(err, AppError::Validation(_)));
    }
}
