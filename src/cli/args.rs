use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cache::CacheKind;

#[derive(Parser, Debug)]
#[command(name = "storycache")]
#[command(version)]
#[command(about = "Inspect and drive the storybook voice and narration caches", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init,
    /// Show statistics for both caches
    Stats,
    /// Print the voice cache key of a voice sample
    Hash {
        /// Voice sample file
        file: PathBuf,
    },
    /// Print the narration cache key of a story page
    Key {
        #[arg(long)]
        story: String,
        #[arg(long)]
        narrator: String,
        /// Zero-based page index
        #[arg(long)]
        page: usize,
    },
    /// Look up a key in one cache
    Lookup {
        #[arg(long, value_enum)]
        cache: CacheArg,
        key: String,
    },
    /// Drop entries beyond the configured age and size bounds
    Prune,
    /// Remove cached entries (both caches unless one is named)
    Clear {
        #[arg(long, value_enum)]
        cache: Option<CacheArg>,
    },
    /// Narrate story pages, reusing cached voices and audio
    Narrate {
        #[arg(long)]
        story: String,
        #[arg(long)]
        narrator: String,
        /// Voice sample to clone; the default voice is used without one
        #[arg(long)]
        voice_sample: Option<PathBuf>,
        /// Page texts, in order
        #[arg(required = true)]
        texts: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CacheArg {
    /// Voice clone cache
    Voice,
    /// Narration audio cache
    Narration,
}

impl From<CacheArg> for CacheKind {
    fn from(arg: CacheArg) -> Self {
        match arg {
            CacheArg::Voice => CacheKind::Voice,
            CacheArg::Narration => CacheKind::Narration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_narrate() {
        let cli = Cli::parse_from([
            "storycache",
            "-v",
            "narrate",
            "--story",
            "s1",
            "--narrator",
            "n1",
            "page one",
            "page two",
        ]);

        assert!(cli.verbose);
        match cli.command {
            Commands::Narrate {
                story,
                narrator,
                voice_sample,
                texts,
            } => {
                assert_eq!(story, "s1");
                assert_eq!(narrator, "n1");
                assert!(voice_sample.is_none());
                assert_eq!(texts, vec!["page one", "page two"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_narrate_requires_text() {
        let result = Cli::try_parse_from(["storycache", "narrate", "--story", "s", "--narrator", "n"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_lookup() {
        let cli = Cli::parse_from(["storycache", "lookup", "--cache", "voice", "abc"]);
        match cli.command {
            Commands::Lookup { cache, key } => {
                assert_eq!(CacheKind::from(cache), CacheKind::Voice);
                assert_eq!(key, "abc");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
