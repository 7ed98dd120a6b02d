//! Cricket Match Prediction CLI
//!
//! Ingests ball-by-ball history, trains the tree ensemble and predicts the
//! outcome from a first-innings score state.

use clap::{Parser, Subcommand};
use cricket::{Config, Result};

#[derive(Parser)]
#[command(name = "cricket")]
#[command(about = "Cricket match win prediction from ball-by-ball history", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Build profiles and train the ensemble from stored matches
    Train,
    /// Predict the winner from the batting-first side's score
    Predict {
        /// Team batting first
        #[arg(long)]
        team1: String,
        /// Team chasing
        #[arg(long)]
        team2: String,
        #[arg(long)]
        venue: String,
        /// Match format (t20, odi, league)
        #[arg(long, default_value = "t20")]
        format: String,
        /// Runs scored so far
        #[arg(long)]
        runs: u32,
        /// Wickets lost so far
        #[arg(long)]
        wickets: u32,
        /// Current run rate; derived from --overs when omitted
        #[arg(long)]
        run_rate: Option<f64>,
        /// Overs bowled so far, in cricket notation (15.3 = 15 overs and 3 balls)
        #[arg(long)]
        overs: Option<f64>,
        /// Output format
        #[arg(long, default_value = "table")]
        output: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Extract match summaries from the configured CSV directories
    Ingest {
        /// Override the extraction policy (quality or max-recall)
        #[arg(long)]
        policy: Option<String>,
    },
    /// Show database status
    Status,
    /// Export stored matches to a flat CSV
    Export {
        /// Output path
        output: String,
        /// Only export one format
        #[arg(long)]
        format: Option<String>,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show model information
    Info,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table or json.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Ingest { policy } => commands::data_ingest(&config, policy),
            DataCommands::Status => commands::data_status(&config),
            DataCommands::Export { output, format } => commands::data_export(&config, &output, format),
        },
        Commands::Train => commands::train(&config),
        Commands::Predict {
            team1,
            team2,
            venue,
            format,
            runs,
            wickets,
            run_rate,
            overs,
            output,
        } => commands::predict(
            &config,
            commands::StateArgs {
                team1,
                team2,
                venue,
                format,
                runs,
                wickets,
                run_rate,
                overs,
            },
            output,
        ),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use cricket::data::export::export_csv;
    use cricket::data::{Database, ExtractionPolicy, Ingestor};
    use cricket::features::{FeatureAssembler, FeatureSchema, MatchState, ProfileBuilder};
    use cricket::model::EnsembleModel;
    use cricket::predict::{format_prediction, Predictor};
    use cricket::training::Trainer;
    use cricket::{decimal_overs, CricketError, MatchFormat};

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        // Create data directories
        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        for source in &config.data.sources {
            std::fs::create_dir_all(&source.dir)?;
        }
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Copy ball-by-ball CSV files into the [[data.sources]] directories");
        println!("  2. Run 'cricket data ingest' to extract match summaries");
        println!("  3. Run 'cricket train' to build profiles and train the model");
        println!(
            "  4. Run 'cricket predict --team1 A --team2 B --venue V --runs 180 --wickets 4 --overs 20'"
        );

        Ok(())
    }

    pub fn data_ingest(config: &Config, policy: Option<String>) -> Result<()> {
        let mut config = config.clone();
        if let Some(policy) = policy {
            config.ingest.policy = match policy.to_lowercase().replace('_', "-").as_str() {
                "quality" => ExtractionPolicy::Quality,
                "max-recall" | "recall" => ExtractionPolicy::MaxRecall,
                other => {
                    return Err(CricketError::Config(format!(
                        "Unknown policy: {}. Use quality or max-recall.",
                        other
                    )))
                }
            };
        }

        let ingestor = Ingestor::new(&config);
        println!("Ingesting with {:?} policy...", config.ingest.policy);
        let (summaries, report) = ingestor.ingest_sources(&config.data.sources)?;

        let mut db = Database::open(&config.data.database_path)?;
        let inserted = db.insert_matches(&summaries)?;
        db.record_ingest(&report, inserted)?;

        println!("Ingest Report");
        println!("───────────────────────────────");
        println!("  Files:      {}", report.attempted);
        println!("  Extracted:  {}", report.extracted);
        println!("  Skipped:    {}", report.skipped_total());
        for (reason, count) in &report.skipped {
            println!("    {:<18}{}", reason, count);
        }
        for (format, counts) in &report.per_format {
            println!(
                "  {:<11} {} of {} files",
                format!("{}:", format),
                counts.extracted,
                counts.attempted
            );
        }
        println!("  Success:    {:.1}%", report.success_rate() * 100.0);
        println!("  New in DB:  {}", inserted);

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.database_path);
        println!("  Matches:  {}", stats.match_count);
        println!("  Teams:    {}", stats.team_count);
        println!("  Venues:   {}", stats.venue_count);
        for (format, count) in &stats.per_format {
            println!("    {:<8}{}", format, count);
        }
        if let Some(last) = stats.last_ingest {
            println!("  Last ingest: {}", last);
        }

        Ok(())
    }

    pub fn data_export(config: &Config, output: &str, format: Option<String>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let matches = match format {
            Some(f) => db.get_matches_by_format(f.parse::<MatchFormat>()?)?,
            None => db.get_all_matches()?,
        };
        let count = export_csv(output, &matches)?;
        println!("Exported {} matches to {}", count, output);
        Ok(())
    }

    pub fn train(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let summaries = db.get_all_matches()?;
        if summaries.is_empty() {
            return Err(CricketError::NoData);
        }
        println!("Loaded {} matches from database", summaries.len());

        let profiles = ProfileBuilder::new(&config.profiles).build(&summaries);
        println!(
            "Built profiles: {} teams, {} venues",
            profiles.teams.len(),
            profiles.venues.len()
        );

        let assembler = FeatureAssembler::new(config.formats.clone());
        let trainer = Trainer::new(&config.training, assembler);
        println!("\nTraining {} ensemble...\n", config.training.combiner);
        let model = trainer.train(&summaries, &profiles)?;

        // The predictor refuses a model paired with any other profile snapshot,
        // so a failure between these two writes leaves nothing servable
        model.save(&config.data.model_path)?;
        profiles.save(&config.data.profiles_path)?;

        println!("\n{}", model.report);
        println!("\nSaved profiles to {}", config.data.profiles_path);
        println!("Saved model to {}", config.data.model_path);

        Ok(())
    }

    pub struct StateArgs {
        pub team1: String,
        pub team2: String,
        pub venue: String,
        pub format: String,
        pub runs: u32,
        pub wickets: u32,
        pub run_rate: Option<f64>,
        pub overs: Option<f64>,
    }

    impl StateArgs {
        fn into_state(self) -> Result<MatchState> {
            let current_run_rate = match (self.run_rate, self.overs) {
                (Some(rr), _) => rr,
                (None, Some(overs)) if overs > 0.0 => self.runs as f64 / decimal_overs(overs)?,
                _ => {
                    return Err(CricketError::InvalidInput(
                        "either --run-rate or a positive --overs is required".to_string(),
                    ))
                }
            };
            Ok(MatchState {
                team1: self.team1,
                team2: self.team2,
                venue: self.venue,
                format: self.format.parse()?,
                current_runs: self.runs,
                current_wickets: self.wickets,
                current_run_rate,
            })
        }
    }

    pub fn predict(config: &Config, args: StateArgs, output: OutputFormat) -> Result<()> {
        let state = args.into_state()?;
        let predictor = Predictor::load(
            &config.data.profiles_path,
            &config.data.model_path,
            FeatureAssembler::new(config.formats.clone()),
        )?;
        let prediction = predictor.predict(&state)?;

        match output {
            OutputFormat::Table => {
                print!("{}", format_prediction(&prediction, &state));
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
            }
        }

        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let model = EnsembleModel::load(&config.data.model_path, &FeatureSchema::current())?;

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Path:       {}", config.data.model_path);
        println!("  Version:    {}", model.version);
        println!("  Trained:    {}", model.created_at.format("%Y-%m-%d %H:%M UTC"));
        println!("  Schema:     {} ({} features)", model.schema.version, model.schema.len());
        println!("  Combiner:   {}", model.combiner.kind());
        println!("  Threshold:  {}", model.threshold);
        for (learner, weight) in model.learners.iter().zip(model.combiner.weights()) {
            println!("    {:<16} weight {:.3}", learner.name(), weight);
        }
        println!("\n{}", model.report);

        Ok(())
    }
}
