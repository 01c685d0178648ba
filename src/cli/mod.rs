use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dubber",
    about = "Video Dubber - Dub online videos into another language",
    version,
    long_about = "Downloads the audio of a video with yt-dlp, transcribes and translates it with an OpenAI-compatible API, and synthesizes dubbed speech with edge-tts. Runs as an HTTP service or as a one-shot command."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a YAML config file
    #[arg(short, long, global = true, value_name = "FILE", env = "DUBBER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind (overrides config)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on (overrides config and PORT)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Dub a single video and write the result to a file
    Dub {
        /// Video URL (YouTube or anything yt-dlp supports)
        #[arg(value_name = "URL")]
        url: String,

        /// Target language, e.g. "english" or "hindi"
        #[arg(short, long, value_name = "LANG")]
        language: String,

        /// Output file path
        #[arg(short, long, value_name = "FILE", default_value = "dubbed_audio.mp3")]
        output: PathBuf,

        /// Fall back to the default voice for unsupported languages
        #[arg(long)]
        lenient: bool,
    },

    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(short, long, conflicts_with = "init")]
        show: bool,

        /// Write a default config file to the user config directory
        #[arg(long)]
        init: bool,
    },

    /// List supported languages and their voices
    Voices,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dub_defaults() {
        let cli = Cli::parse_from(["dubber", "dub", "https://youtu.be/abc", "-l", "hindi"]);
        match cli.command {
            Commands::Dub {
                url,
                language,
                output,
                lenient,
            } => {
                assert_eq!(url, "https://youtu.be/abc");
                assert_eq!(language, "hindi");
                assert_eq!(output, PathBuf::from("dubbed_audio.mp3"));
                assert!(!lenient);
            }
            _ => panic!("expected dub command"),
        }
    }

    #[test]
    fn test_show_and_init_conflict() {
        assert!(Cli::try_parse_from(["dubber", "config", "--show", "--init"]).is_err());
    }
}
