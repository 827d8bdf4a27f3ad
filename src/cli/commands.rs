use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use crate::{
    app::{init_config, Config},
    cache::{narration_key, voice_key_for_file, CacheKind, FileStore, GenerationCache},
    narration::{ElevenLabsClient, NarrationService, NarrationSettings},
};

use super::{CacheArg, Commands};

/// Open one cache as configured
pub fn open_cache(config: &Config, kind: CacheKind) -> Result<GenerationCache> {
    let path = match kind {
        CacheKind::Voice => config.cache.voice_cache_path(),
        CacheKind::Narration => config.cache.narration_cache_path(),
    };

    let cache = GenerationCache::load(FileStore::new(&path, kind), config.cache.on_corrupt)
        .with_context(|| format!("Failed to open {} cache", kind))?
        .with_eviction(config.cache.eviction_policy());

    if let Some(e) = cache.load_error() {
        eprintln!("{} {}", "[WARNING]".yellow(), e);
    }

    Ok(cache)
}

/// Write a default config file, at `path` if given
pub fn handle_init(path: Option<&Path>) -> Result<()> {
    let (config_file, created) = init_config(path)?;
    if created {
        println!("Created default configuration at: {}", config_file.display());
    } else {
        println!("Configuration already exists at: {}", config_file.display());
    }
    Ok(())
}

/// Handle CLI subcommands
pub async fn handle_command(command: &Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Init => handle_init(None),
        Commands::Stats => show_stats(config),
        Commands::Hash { file } => {
            println!("{}", voice_key_for_file(file)?);
            Ok(())
        }
        Commands::Key {
            story,
            narrator,
            page,
        } => {
            println!("{}", narration_key(story, narrator, *page)?);
            Ok(())
        }
        Commands::Lookup { cache, key } => lookup(config, *cache, key),
        Commands::Prune => prune(config),
        Commands::Clear { cache } => clear(config, *cache),
        Commands::Narrate {
            story,
            narrator,
            voice_sample,
            texts,
        } => narrate(config, story, narrator, voice_sample.as_deref(), texts).await,
    }
}

fn show_stats(config: &Config) -> Result<()> {
    for kind in [CacheKind::Voice, CacheKind::Narration] {
        let cache = open_cache(config, kind)?;
        println!("{}", cache.stats().format());
        println!("File: {}", cache.path().display());
        println!();
    }
    Ok(())
}

fn lookup(config: &Config, cache: CacheArg, key: &str) -> Result<()> {
    let cache = open_cache(config, cache.into())?;
    match cache.lookup(key) {
        Some(entry) => {
            println!("{} {}", "[HIT]".green(), entry.value);
            println!("      created at {}", entry.created_at);
        }
        None => println!("{} {}", "[MISS]".yellow(), key),
    }
    Ok(())
}

fn prune(config: &Config) -> Result<()> {
    let policy = config.cache.eviction_policy();
    if policy.is_unbounded() {
        println!("No max_age_days or max_entries configured; nothing to prune");
        return Ok(());
    }

    for kind in [CacheKind::Voice, CacheKind::Narration] {
        let removed = open_cache(config, kind)?.evict(&policy)?;
        println!("  • {} cache: {} entries removed", kind, removed);
    }
    Ok(())
}

fn clear(config: &Config, cache: Option<CacheArg>) -> Result<()> {
    let kinds = match cache {
        Some(arg) => vec![arg.into()],
        None => vec![CacheKind::Voice, CacheKind::Narration],
    };

    for kind in kinds {
        let cache = open_cache(config, kind)?;
        let count = cache.len();
        cache.clear()?;
        println!("  • {} cache: cleared {} entries", kind, count);
    }
    Ok(())
}

async fn narrate(
    config: &Config,
    story: &str,
    narrator: &str,
    voice_sample: Option<&Path>,
    texts: &[String],
) -> Result<()> {
    let sample = match voice_sample {
        Some(path) => Some(
            std::fs::read(path)
                .with_context(|| format!("Failed to read voice sample {}", path.display()))?,
        ),
        None => None,
    };

    let client = Arc::new(ElevenLabsClient::new(&config.elevenlabs, &config.narration)?);
    let service = NarrationService::new(
        Arc::new(open_cache(config, CacheKind::Voice)?),
        Arc::new(open_cache(config, CacheKind::Narration)?),
        client.clone(),
        client,
        NarrationSettings::from_config(config),
    );

    let narrations = service
        .narrate_story(story, narrator, sample.as_deref(), texts)
        .await?;

    let mut failed = 0;
    for (page, narration) in narrations.iter().enumerate() {
        match narration {
            Some(url) => println!("  [{}] {}", page + 1, url.green()),
            None => {
                failed += 1;
                println!("  [{}] {}", page + 1, "failed".red());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} pages failed to narrate", failed, narrations.len());
    }
    Ok(())
}
