//! CLI for morphvip: variant-impact calls from morphology-profile correlations.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "morphvip")]
#[command(about = "morphvip: classify variants as GOF / LOF / COF / NT / NI from cell-morphology correlations")]
#[command(version = morphvip_core::VERSION)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate mutants against their wild types and matched controls,
    /// then correct p-values and label each mutant.
    Evaluate {
        /// Sample metadata JSON: [{id, perturbation, sample_type, plate}, ...]
        #[arg(long)]
        metadata: String,

        /// Precomputed correlation matrix JSON: {ids, values}
        #[arg(long, conflicts_with = "profiles", required_unless_present = "profiles")]
        matrix: Option<String>,

        /// Morphology profiles JSON: {ids, features}; correlated on load
        #[arg(long)]
        profiles: Option<String>,

        /// Comma-separated mutant labels (default: every non-control, non-wild-type perturbation)
        #[arg(long, conflicts_with = "alleles_file")]
        alleles: Option<String>,

        /// File with one mutant label per line
        #[arg(long)]
        alleles_file: Option<String>,

        /// Configuration JSON; flags below override its fields
        #[arg(long)]
        config: Option<String>,

        /// Test battery
        #[arg(long, value_parser = ["classic", "cnn", "classic_raw", "classic-raw"])]
        battery: Option<String>,

        /// Significance policy: fdr (Benjamini-Hochberg) or raw threshold
        #[arg(long, value_parser = ["fdr", "raw"])]
        significance: Option<String>,

        /// FDR level for --significance fdr
        #[arg(long)]
        q: Option<f64>,

        /// P-value threshold for --significance raw
        #[arg(long)]
        threshold: Option<f64>,

        /// Random seed for subsampling and control matching
        #[arg(long)]
        seed: Option<u64>,

        /// Replicates drawn per wild type and per mutant
        #[arg(long)]
        treatment_samples: Option<usize>,

        /// Matched controls drawn per treated replicate
        #[arg(long)]
        control_samples: Option<usize>,

        /// Compare each mutant against a disjoint half of itself
        #[arg(long)]
        false_positives: bool,

        /// Precomputed null distribution JSON for the CNN power test
        #[arg(long)]
        null: Option<String>,

        /// Write classified results as JSON
        #[arg(long)]
        output: Option<String>,

        /// Write classified results as CSV
        #[arg(long)]
        csv: Option<String>,

        /// Write the wild type → mutant index tree as JSON
        #[arg(long)]
        index: Option<String>,
    },

    /// Build a null distribution of median correlations of random sample groups
    Null {
        #[arg(long)]
        metadata: String,

        #[arg(long, conflicts_with = "profiles", required_unless_present = "profiles")]
        matrix: Option<String>,

        #[arg(long)]
        profiles: Option<String>,

        /// Samples per random group
        #[arg(long, default_value = "4")]
        group_size: usize,

        /// Reshuffles of the sample pool
        #[arg(long, default_value = "30")]
        repeats: usize,

        /// Random seed (the null stream is derived from it)
        #[arg(long, default_value = "8")]
        seed: u64,

        /// Value of sample_type that marks a control (excluded from the pool)
        #[arg(long, default_value = "control")]
        controls_value: String,

        /// Write the distribution as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Fraction of treatments whose replicates correlate above the null's 95th percentile
    Strength {
        #[arg(long)]
        metadata: String,

        #[arg(long, conflicts_with = "profiles", required_unless_present = "profiles")]
        matrix: Option<String>,

        #[arg(long)]
        profiles: Option<String>,

        /// Replicates drawn per treatment, also the null group size
        #[arg(long, default_value = "4")]
        sample_size: usize,

        /// Reshuffles of the sample pool for the null
        #[arg(long, default_value = "30")]
        repeats: usize,

        #[arg(long, default_value = "8")]
        seed: u64,

        #[arg(long, default_value = "control")]
        controls_value: String,

        /// Write the report as JSON
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Evaluate {
            metadata,
            matrix,
            profiles,
            alleles,
            alleles_file,
            config,
            battery,
            significance,
            q,
            threshold,
            seed,
            treatment_samples,
            control_samples,
            false_positives,
            null,
            output,
            csv,
            index,
        } => commands::evaluate::run(commands::evaluate::EvaluateCommandConfig {
            inputs: commands::InputPaths {
                metadata: &metadata,
                matrix: matrix.as_deref(),
                profiles: profiles.as_deref(),
            },
            alleles: alleles.as_deref(),
            alleles_file: alleles_file.as_deref(),
            config_path: config.as_deref(),
            overrides: commands::ConfigOverrides {
                battery: battery.as_deref(),
                significance: significance.as_deref(),
                q,
                threshold,
                seed,
                treatment_samples,
                control_samples,
                false_positives,
            },
            null_path: null.as_deref(),
            output_path: output.as_deref(),
            csv_path: csv.as_deref(),
            index_path: index.as_deref(),
        }),
        Commands::Null {
            metadata,
            matrix,
            profiles,
            group_size,
            repeats,
            seed,
            controls_value,
            output,
        } => commands::null::run(commands::null::NullCommandConfig {
            inputs: commands::InputPaths {
                metadata: &metadata,
                matrix: matrix.as_deref(),
                profiles: profiles.as_deref(),
            },
            group_size,
            repeats,
            seed,
            controls_value: &controls_value,
            output_path: output.as_deref(),
        }),
        Commands::Strength {
            metadata,
            matrix,
            profiles,
            sample_size,
            repeats,
            seed,
            controls_value,
            output,
        } => commands::strength::run(commands::strength::StrengthCommandConfig {
            inputs: commands::InputPaths {
                metadata: &metadata,
                matrix: matrix.as_deref(),
                profiles: profiles.as_deref(),
            },
            sample_size,
            repeats,
            seed,
            controls_value: &controls_value,
            output_path: output.as_deref(),
        }),
    }
}
