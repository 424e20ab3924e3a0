// Command-line arguments for asyncdpctl

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use asyncdp_core::{Algorithm, RunConfig, SampleStyle};

#[derive(Debug, Parser)]
#[command(name = "asyncdpctl")]
#[command(about = "Solve the sailing problem with asynchronous dynamic programming", version)]
#[command(allow_negative_numbers = true)]
pub struct Args {
    /// Algorithm: 0 AsyncQVI, 1 Q-learning, 2 VRVI
    #[arg(long, default_value_t = 0)]
    pub algo: i64,

    /// Sampling style: 0 uniform, 1 cyclic, 2 markovian
    #[arg(long, default_value_t = 0)]
    pub style: i64,

    /// Number of worker threads
    #[arg(long = "nthreads", default_value_t = 1)]
    pub num_threads: usize,

    /// Number of states (8 · side²)
    #[arg(long = "len_state")]
    pub len_state: usize,

    /// Number of actions (8)
    #[arg(long = "len_action")]
    pub len_action: usize,

    /// Discount factor
    #[arg(long, default_value_t = 0.99)]
    pub gamma: f64,

    /// Bias parameter of AsyncQVI
    #[arg(long, default_value_t = 0.0)]
    pub epsilon: f64,

    /// Exploration rate for markovian Q-learning
    #[arg(long, default_value_t = 0.3)]
    pub explore: f64,

    /// Scale of the Q-learning rate t^-0.51
    #[arg(long, default_value_t = 1.0)]
    pub alpha: f64,

    /// Iteration budget; outer iterations for VRVI
    #[arg(long = "max_outer_iter", default_value_t = 1)]
    pub max_outer_iter: u64,

    /// Samples per probe for AsyncQVI; inner rounds for VRVI
    #[arg(long = "max_inner_iter", default_value_t = 1)]
    pub max_inner_iter: u64,

    /// VRVI samples per pair, both phases
    #[arg(long = "sample_num")]
    pub sample_num: Option<u64>,

    /// VRVI recentering samples, overrides --sample_num
    #[arg(long = "sample_num_1")]
    pub sample_num_1: Option<u64>,

    /// VRVI inner-round samples, overrides --sample_num
    #[arg(long = "sample_num_2")]
    pub sample_num_2: Option<u64>,

    /// Iterations between checkpoints
    #[arg(long = "check_step", default_value_t = 1)]
    pub check_step: u64,

    /// Rollouts per policy evaluation
    #[arg(long = "test_max_episode", default_value_t = 100)]
    pub test_max_episode: usize,

    /// Steps per evaluation rollout
    #[arg(long = "test_max_step", default_value_t = 200)]
    pub test_max_step: usize,

    /// Vortex probability of the sailing problem
    #[arg(long, default_value_t = 0.0)]
    pub probs: f64,

    /// Reward scale of the sailing problem
    #[arg(long = "d", default_value_t = 0.05)]
    pub d: f64,

    /// Base random seed; unseeded runs draw from OS entropy
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the final policy when set to 1
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub save: u8,

    /// Policy file written by --save 1
    #[arg(long, default_value = "policy.txt")]
    pub output: PathBuf,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Args {
    /// Parse `argv`, accepting the single-dash `-name value` form
    pub fn parse_from_argv<I, T>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize(argv))
    }

    /// Run configuration described by these arguments
    pub fn run_config(&self) -> Result<RunConfig> {
        Ok(RunConfig {
            algorithm: Algorithm::from_code(self.algo)?,
            style: SampleStyle::from_code(self.style)?,
            num_threads: self.num_threads,
            len_state: self.len_state,
            len_action: self.len_action,
            gamma: self.gamma,
            epsilon: self.epsilon,
            explore: self.explore,
            alpha: self.alpha,
            max_outer_iter: self.max_outer_iter,
            max_inner_iter: self.max_inner_iter,
            sample_num_1: self.sample_num_1.or(self.sample_num).unwrap_or(1),
            sample_num_2: self.sample_num_2.or(self.sample_num).unwrap_or(1),
            check_step: self.check_step,
            test_max_episode: self.test_max_episode,
            test_max_step: self.test_max_step,
            probs: self.probs,
            d: self.d,
            seed: self.seed,
        })
    }

    /// Whether the policy should be written on exit
    pub fn save_policy(&self) -> bool {
        self.save == 1
    }
}

/// Rewrite `-name` flags as `--name`.
///
/// Negative numbers and the short `-h` / `-V` flags pass through untouched.
fn normalize<I, T>(argv: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    argv.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(index, arg)| match arg.to_str() {
            Some(text) if index > 0 && is_single_dash_flag(text) => format!("-{text}").into(),
            _ => arg,
        })
        .collect()
}

fn is_single_dash_flag(arg: &str) -> bool {
    let Some(name) = arg.strip_prefix('-') else {
        return false;
    };
    name.starts_with(|c: char| c.is_ascii_alphabetic()) && !matches!(name, "h" | "V")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Args, clap::Error> {
        Args::parse_from_argv(std::iter::once("asyncdpctl").chain(line.split_whitespace()))
    }

    #[test]
    fn test_single_dash_flags() {
        let args = parse(
            "-algo 1 -style 2 -nthreads 4 -len_state 392 -len_action 8 -gamma 0.9 \
             -epsilon 0.1 -explore 0.25 -max_outer_iter 1000 -check_step 100 -d 0.1 -save 1",
        )
        .unwrap();
        let config = args.run_config().unwrap();
        assert_eq!(config.algorithm, Algorithm::QLearning);
        assert_eq!(config.style, SampleStyle::Markovian);
        assert_eq!(config.num_threads, 4);
        assert_eq!(config.len_state, 392);
        assert_eq!(config.gamma, 0.9);
        assert_eq!(config.epsilon, 0.1);
        assert_eq!(config.explore, 0.25);
        assert_eq!(config.d, 0.1);
        assert_eq!(config.max_outer_iter, 1000);
        assert!(args.save_policy());
        assert_eq!(args.output, PathBuf::from("policy.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_double_dash_and_defaults() {
        let args = parse("--len_state 8 --len_action 8").unwrap();
        let config = args.run_config().unwrap();
        assert_eq!(config, RunConfig {
            len_state: 8,
            len_action: 8,
            ..RunConfig::default()
        });
        assert_eq!(config.explore, 0.3);
        assert!(!args.save_policy());
        assert!(args.report.is_none());
    }

    #[test]
    fn test_sample_num_sets_both_phases() {
        let config = parse("-len_state 8 -len_action 8 -sample_num 5")
            .unwrap()
            .run_config()
            .unwrap();
        assert_eq!((config.sample_num_1, config.sample_num_2), (5, 5));

        let config = parse("-len_state 8 -len_action 8 -sample_num 5 -sample_num_2 2")
            .unwrap()
            .run_config()
            .unwrap();
        assert_eq!((config.sample_num_1, config.sample_num_2), (5, 2));
    }

    #[test]
    fn test_strict_rejections() {
        // missing required sizes
        assert!(parse("-algo 0").is_err());
        // unknown flag
        assert!(parse("-len_state 8 -len_action 8 -bogus 1").is_err());
        // malformed number
        assert!(parse("-len_state eight -len_action 8").is_err());
        // missing value
        assert!(parse("-len_state 8 -len_action").is_err());
        // save outside 0..=1
        assert!(parse("-len_state 8 -len_action 8 -save 2").is_err());
        // out-of-range codes parse but do not convert
        assert!(parse("-len_state 8 -len_action 8 -algo 3")
            .unwrap()
            .run_config()
            .is_err());
    }

    #[test]
    fn test_negative_values_reach_validation() {
        let config = parse("-len_state 8 -len_action 8 -gamma -0.5")
            .unwrap()
            .run_config()
            .unwrap();
        assert_eq!(config.gamma, -0.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalize_leaves_values_alone() {
        let argv: Vec<OsString> = normalize(["bin", "-len_state", "-3", "--gamma", "-h", "x"]);
        assert_eq!(argv, vec!["bin", "--len_state", "-3", "--gamma", "-h", "x"]);
    }
}
