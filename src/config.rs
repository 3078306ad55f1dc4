//! Command-line interface, best-known bounds, and the resolved configuration.

use clap::Parser;

use crate::error::ConfigError;

/// Best known (length, depth) for one network size.
#[derive(Clone, Copy, Debug)]
pub struct Bounds {
    pub length: usize,
    pub depth: usize,
}

/// Best known values at build time.
/// See: https://bertdobbelaere.github.io/sorting_networks.html
pub const fn known_bounds(n: u32) -> Option<Bounds> {
    let (length, depth) = match n {
        2 => (1, 1),
        3 => (3, 3),
        4 => (5, 3),
        5 => (9, 5),
        6 => (12, 5),
        7 => (16, 6),
        8 => (19, 6),
        9 => (25, 7),
        10 => (29, 7),
        11 => (35, 8),
        12 => (39, 8),
        13 => (45, 9),
        14 => (51, 9),
        15 => (56, 9),
        16 => (60, 9),
        17 => (71, 10),
        18 => (77, 11),
        19 => (85, 11),
        20 => (91, 11),
        21 => (99, 12),
        22 => (106, 12),
        23 => (114, 12),
        24 => (120, 12),
        25 => (130, 13),
        26 => (138, 13),
        27 => (147, 13),
        28 => (155, 13),
        29 => (164, 14),
        30 => (172, 14),
        31 => (180, 14),
        32 => (185, 14),
        _ => return None,
    };
    Some(Bounds { length, depth })
}

#[derive(Parser, Debug)]
#[command(
    name = "sortnet",
    about = "Stochastic parallel beam search for short sorting networks",
    after_help = "Examples:\n  \
        sortnet -n 8                    # Search for a size-8 network\n  \
        sortnet -n 12 -b 500 -t 5       # Search with a larger beam\n  \
        sortnet -n 17 -s                # Force symmetry for an odd size\n  \
        sortnet -n 16 -S                # Disable symmetry for an even size"
)]
pub struct Cli {
    /// Network size (number of wires), 2-32. Sizes above 20 need
    /// significant memory (2^n patterns).
    #[arg(short = 'n', long = "net-size", default_value_t = 8)]
    pub net_size: u32,

    /// Beam width.
    #[arg(short = 'b', long = "beam-size", default_value_t = 100)]
    pub beam_size: usize,

    /// Monte-Carlo rollouts per scoring round.
    #[arg(short = 't', long = "scoring-iterations", default_value_t = 5)]
    pub scoring_iterations: usize,

    /// Number of elite rollouts averaged into a score.
    #[arg(short = 'e', long = "elites", default_value_t = 1)]
    pub elites: usize,

    /// Weight of depth against length in the score, 0.0-1.0.
    #[arg(short = 'w', long = "depth-weight", default_value_t = 0.0001)]
    pub depth_weight: f64,

    /// Enable the symmetry heuristic (default: on for even sizes).
    #[arg(short = 's', long = "symmetry", overrides_with = "no_symmetry")]
    pub symmetry: bool,

    /// Disable the symmetry heuristic.
    #[arg(short = 'S', long = "no-symmetry", overrides_with = "symmetry")]
    pub no_symmetry: bool,

    /// Maximum number of independent searches.
    #[arg(short = 'i', long = "max-iterations", default_value_t = 1)]
    pub max_iterations: usize,
}

/// Validated search parameters plus everything derived from them.
#[derive(Clone, Debug)]
pub struct Config {
    pub max_iterations: usize,
    pub net_size: usize,
    pub max_beam_size: usize,
    pub num_scoring_tests: usize,
    pub num_elites: usize,
    pub use_symmetry: bool,
    pub depth_weight: f64,

    pub num_patterns: usize,
    pub length_lower_bound: usize,
    pub length_upper_bound: usize,
    pub depth_lower_bound: usize,
    pub branching_factor: usize,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let symmetry = if cli.symmetry {
            Some(true)
        } else if cli.no_symmetry {
            Some(false)
        } else {
            None
        };
        Config::resolve(
            cli.net_size,
            cli.beam_size,
            cli.scoring_iterations,
            cli.elites,
            symmetry,
            cli.depth_weight,
            cli.max_iterations,
        )
    }

    /// Validate raw parameters and derive the computed fields.
    /// `symmetry = None` picks the default: on for even net sizes.
    pub fn resolve(
        net_size: u32,
        max_beam_size: usize,
        num_scoring_tests: usize,
        num_elites: usize,
        symmetry: Option<bool>,
        depth_weight: f64,
        max_iterations: usize,
    ) -> Result<Self, ConfigError> {
        if !(2..=32).contains(&net_size) {
            return Err(ConfigError::NetSize(net_size));
        }
        let bounds = known_bounds(net_size).ok_or(ConfigError::UnknownBounds(net_size))?;
        if max_beam_size < 1 {
            return Err(ConfigError::BeamSize);
        }
        if num_scoring_tests < 1 {
            return Err(ConfigError::ScoringIterations);
        }
        if num_elites < 1 || num_elites > num_scoring_tests {
            return Err(ConfigError::Elites);
        }
        if !(0.0..=1.0).contains(&depth_weight) {
            return Err(ConfigError::DepthWeight(depth_weight));
        }
        if max_iterations < 1 {
            return Err(ConfigError::MaxIterations);
        }

        let net_size = net_size as usize;
        Ok(Config {
            max_iterations,
            net_size,
            max_beam_size,
            num_scoring_tests,
            num_elites,
            use_symmetry: symmetry.unwrap_or(net_size % 2 == 0),
            depth_weight,
            num_patterns: 1usize << net_size,
            length_lower_bound: bounds.length,
            length_upper_bound: bounds.length * 2,
            depth_lower_bound: bounds.depth,
            branching_factor: net_size * (net_size - 1) / 2,
        })
    }

    /// Echo the effective configuration before searching.
    pub fn print(&self) {
        println!("MAX_ITERATIONS          = {}", self.max_iterations);
        println!("NET_SIZE                = {}", self.net_size);
        println!("MAX_BEAM_SIZE           = {}", self.max_beam_size);
        println!("NUM_SCORING_TESTS       = {}", self.num_scoring_tests);
        println!("NUM_ELITE_TESTS         = {}", self.num_elites);
        println!(
            "USE_SYMMETRY_HEURISTIC  = {}",
            if self.use_symmetry { "Yes" } else { "No" }
        );
        println!("DEPTH_WEIGHT            = {}", self.depth_weight);
        println!("NUM_INPUT_PATTERNS      = {}", self.num_patterns);
        println!("LENGTH_LOWER_BOUND      = {}", self.length_lower_bound);
        println!("LENGTH_UPPER_BOUND      = {}", self.length_upper_bound);
        println!("DEPTH_LOWER_BOUND       = {}", self.depth_lower_bound);
        println!();
    }
}
