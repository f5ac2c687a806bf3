use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::{
    io::{self, Write},
    path::PathBuf,
    str::FromStr,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;

use vocab_deck::sources::{AnySource, EmbeddedSource};
use vocab_deck::storage::{DirectorySink, FileStore};
use vocab_deck::translate::Translator;
use vocab_deck::words::extract_words;
use vocab_deck::{Card, Config, LinksConfig, QuickLinks, Selection, Status, StudyMode, Trainer};

type Input = Lines<BufReader<Stdin>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Page,
    All,
    Custom,
}

#[derive(Parser, Debug)]
#[command(name = "vocab-deck", about = "Vocabulary flash cards in the terminal", version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Directory or http(s) URL holding `<folder>/csv/<n>.csv`; the bundled deck if omitted
    #[arg(short, long)]
    source: Option<String>,
    #[arg(long)]
    folder: Option<String>,
    /// Number of pages in the source
    #[arg(long)]
    pages: Option<usize>,
    #[arg(short, long, value_enum, default_value_t = ModeArg::All)]
    mode: ModeArg,
    #[arg(short, long, default_value = "1")]
    page: usize,
    /// Comma-separated words for custom mode
    #[arg(short, long, value_delimiter = ',')]
    words: Vec<String>,
    /// Text whose words are studied in custom mode
    #[arg(long)]
    text_file: Option<PathBuf>,
    /// Where progress is kept
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,
}

enum Commands {
    Next,
    Previous,
    Flip,
    Mark(Status),
    Stats,
    Export,
    Import(PathBuf),
    Clear,
    Translate,
    Links,
    Help,
    Quit,
}

impl Commands {
    fn help() {
        println!("Available commands:");
        println!("  <enter>, n  - Next card");
        println!("  p           - Previous card");
        println!("  f           - Flip the card");
        println!("  k / u / r   - Mark as known / unknown / review and move on");
        println!("  \\s          - Show statistics");
        println!("  \\e          - Export progress as JSON");
        println!("  \\i <file>   - Import progress from an exported JSON file");
        println!("  \\c          - Clear all progress");
        println!("  \\t          - Translate the current word");
        println!("  \\l          - Dictionary, Wiktionary and audio links");
        println!("  \\h          - Show this help message");
        println!("  \\q          - Quit the study session");
    }
}

impl FromStr for Commands {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "n" => Ok(Commands::Next),
            "p" => Ok(Commands::Previous),
            "f" => Ok(Commands::Flip),
            "k" | "u" | "r" => s.parse().map(Commands::Mark),
            "\\s" => Ok(Commands::Stats),
            "\\e" => Ok(Commands::Export),
            "\\c" => Ok(Commands::Clear),
            "\\t" => Ok(Commands::Translate),
            "\\l" => Ok(Commands::Links),
            "\\h" => Ok(Commands::Help),
            "\\q" => Ok(Commands::Quit),
            _ if s.starts_with("\\i ") => Ok(Commands::Import(PathBuf::from(s[3..].trim()))),
            _ => Err("Unknown command".to_string()),
        }
    }
}

fn print_card(card: &Card, flipped: bool, position: Option<(usize, usize)>) {
    if let Some((shown, total)) = position {
        println!("\nCard {shown} of {total}");
    }
    if !flipped {
        println!("{}", card.display_word());
        return;
    }
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    println!("{}", card.word);
    println!("  pronunciation: {}", or_dash(&card.pronunciation));
    println!("  meaning:       {}", or_dash(&card.translation_primary));
    println!("  english:       {}", or_dash(&card.translation_secondary));
    println!("  example:       {}", or_dash(&card.example_sentence));
}

fn print_links(card: &Card, config: &LinksConfig) {
    match QuickLinks::for_card(card, config) {
        Ok(links) => {
            println!("  dict.cc:    {}", links.dictionary);
            println!("  wiktionary: {}", links.wiktionary);
            println!("  audio:      {}", links.audio);
        }
        Err(e) => eprintln!("Unable to build links: {e}"),
    }
}

fn print_stats<S, K>(trainer: &Trainer<S, K>)
where
    S: vocab_deck::PageSource,
    K: vocab_deck::KeyValueStore,
{
    let stats = trainer.stats();
    println!(
        "Total: {} | Known: {} | Unknown: {} | Review: {} | Progress: {}%",
        stats.total, stats.known, stats.unknown, stats.review, stats.completion
    );
}

async fn prompt(input: &mut Input, text: &str) -> Result<Option<String>> {
    print!("{text}");
    io::stdout().flush().context("Failed to flush stdout")?;
    input
        .next_line()
        .await
        .context("Failed to read line from stdin")
}

async fn run_session(
    trainer: &mut Trainer<AnySource, FileStore>,
    input: &mut Input,
    translator: &Translator,
    sink: &mut DirectorySink,
) -> Result<()> {
    let mut flipped = false;
    let mut show = true;

    loop {
        let Some(card) = trainer.current() else {
            println!("No cards available. Exiting session.");
            break Ok(());
        };
        if show {
            let position = trainer.snapshot().map(|s| (s.shown, s.total_cards));
            print_card(&card, flipped, position);
        }
        show = true;

        let Some(line) = prompt(input, "|> ").await? else {
            println!("Quitting...");
            break Ok(());
        };

        match Commands::from_str(line.trim()) {
            Ok(Commands::Next) => {
                flipped = false;
                if trainer.next().await? == Selection::Exhausted {
                    println!("No cards available. Choose another mode to continue.");
                    break Ok(());
                }
            }
            Ok(Commands::Previous) => {
                flipped = false;
                if trainer.previous()?.is_none() {
                    println!("Already at the first card.");
                    show = false;
                }
            }
            Ok(Commands::Flip) => flipped = !flipped,
            Ok(Commands::Mark(status)) => {
                trainer.mark(status)?;
                println!("Marked '{}' as {status}.", card.word);
                print_stats(trainer);
                flipped = false;
                if trainer.next().await? == Selection::Exhausted {
                    println!("No cards available. Choose another mode to continue.");
                    break Ok(());
                }
            }
            Ok(Commands::Stats) => {
                print_stats(trainer);
                show = false;
            }
            Ok(Commands::Export) => {
                let path = trainer.export(sink)?;
                println!("Progress exported to {}", path.display());
                show = false;
            }
            Ok(Commands::Import(path)) => {
                let imported = std::fs::read_to_string(&path)
                    .map_err(vocab_deck::Error::from)
                    .and_then(|json| trainer.import(&json));
                match imported {
                    Ok(count) => println!("Imported progress for {count} words."),
                    Err(e) => eprintln!("Could not import {}: {e}", path.display()),
                }
                show = false;
            }
            Ok(Commands::Clear) => {
                let answer = prompt(
                    input,
                    "Are you sure you want to clear all progress? This cannot be undone. [y/N] ",
                )
                .await?;
                if matches!(answer.as_deref().map(str::trim), Some("y" | "Y")) {
                    trainer.clear()?;
                    println!("Progress cleared.");
                }
                show = false;
            }
            Ok(Commands::Translate) => {
                match translator.translate(card.display_word()).await {
                    Ok(Some(text)) => println!("{} → {text}", card.display_word()),
                    Ok(None) => println!("No translation found."),
                    Err(e) => eprintln!("Unable to fetch translation: {e}"),
                }
                show = false;
            }
            Ok(Commands::Links) => {
                print_links(&card, &trainer.config().links);
                show = false;
            }
            Ok(Commands::Help) => {
                Commands::help();
                show = false;
            }
            Ok(Commands::Quit) => {
                println!("Quitting...");
                break Ok(());
            }
            Err(e) => {
                eprintln!("Invalid command: {}. Type \\h for help.", e);
                show = false;
            }
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(folder) = &args.folder {
        config.folder = folder.clone();
    }
    match args.pages {
        Some(pages) => config.total_pages = pages,
        None if args.source.is_none() => config.total_pages = EmbeddedSource::page_count(),
        None => {}
    }
    Ok(config)
}

fn study_mode(args: &Args) -> Result<StudyMode> {
    Ok(match args.mode {
        ModeArg::Page => StudyMode::Page(args.page),
        ModeArg::All => StudyMode::All,
        ModeArg::Custom => {
            let mut words = args.words.clone();
            if let Some(path) = &args.text_file {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                words.extend(extract_words(&text));
            }
            if words.is_empty() {
                anyhow::bail!("Custom mode needs --words or --text-file");
            }
            StudyMode::Custom(words)
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let mode = study_mode(&args)?;
    let source = AnySource::from_location(args.source.as_deref(), &config.folder);
    let store = match &args.data_dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::in_default_dir(),
    };
    let translator = Translator::new(config.translation.clone());
    let mut sink = DirectorySink::new(&args.export_dir);

    let mut trainer = Trainer::new(source, store, config);
    let source_name = trainer.source_name();

    let mut events = trainer.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log::debug!("{event:?}"),
                Err(RecvError::Lagged(skipped)) => log::debug!("Skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    trainer
        .select_mode(mode.clone())
        .await
        .with_context(|| format!("Failed to start {mode} from {source_name}"))?;

    println!(
        "Starting {mode} from {source_name} ({} pages).",
        trainer.config().total_pages
    );
    print_stats(&trainer);
    println!("Type '\\h' for commands.");

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    run_session(&mut trainer, &mut input, &translator, &mut sink).await?;

    Ok(())
}
