use clap::{command, value_parser, Arg, ArgAction, ArgMatches, Command};
use log::warn;
use std::path::PathBuf;

use crate::experiment::{ExperimentConfig, DATASET_SIZES};
use crate::visuals::chart::{AxisMode, ChartConfig};

#[derive(Debug)]
pub struct CliArgs {
    pub inputpath: PathBuf,
    pub outputpath: PathBuf,
    pub axis: AxisMode,
    pub dpi: u32,
    pub markers: bool,
    pub flamegraph: bool,
}

impl CliArgs {
    pub fn chart_config(&self) -> ChartConfig {
        ChartConfig {
            dpi: self.dpi,
            axis: self.axis,
            markers: self.markers,
            ..ChartConfig::default()
        }
    }

    /// The flamegraph lands next to the chart.
    pub fn flamegraph_path(&self) -> PathBuf {
        self.outputpath.with_file_name("flamegraph.html")
    }
}

pub fn plot_command() -> Command {
    command!("AVL Plot")
        .version("1.0")
        .about("Plots best, average and worst case comparison counts of AVL tree insert and search against O(log n). Give the results CSV as first argument, the image path as second argument.")
        .arg(
            Arg::new("input")
                .help("Specify the results CSV file.")
                .value_parser(value_parser!(PathBuf))
                .default_value("results.csv")
                .index(1),
        )
        .arg(
            Arg::new("output")
                .help("Specify the output PNG file.")
                .value_parser(value_parser!(PathBuf))
                .default_value("avl_performance.png")
                .index(2),
        )
        .arg(
            Arg::new("axis")
                .help("Specify the x axis: indexed (evenly spaced, labelled with n) or log")
                .long("axis")
                .short('a')
                .default_value("indexed"),
        )
        .arg(
            Arg::new("dpi")
                .help("Resolution of the 15x6 inch canvas")
                .long("dpi")
                .short('r')
                .default_value("300")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("no_markers")
                .help("Draws plain lines without point markers")
                .long("no-markers")
                .short('m')
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("flamegraph")
                .help("Specify whether to create a flamegraph")
                .long("flamegraph")
                .short('f')
                .action(ArgAction::SetTrue),
        )
}

pub fn plot_args(arguments: &ArgMatches) -> CliArgs {
    let axis = match arguments.get_one::<String>("axis") {
        Some(axis) => match axis.parse::<AxisMode>() {
            Ok(axis) => axis,
            Err(err) => {
                warn!("{} Using indexed", err);
                AxisMode::Indexed
            }
        },
        None => AxisMode::Indexed,
    };

    // Defaults are supplied by clap, so these lookups always succeed.
    CliArgs {
        inputpath: arguments.get_one::<PathBuf>("input").cloned().unwrap_or_default(),
        outputpath: arguments.get_one::<PathBuf>("output").cloned().unwrap_or_default(),
        axis,
        dpi: arguments.get_one::<u32>("dpi").copied().unwrap_or_default(),
        markers: !arguments.get_flag("no_markers"),
        flamegraph: arguments.get_flag("flamegraph"),
    }
}

pub fn cli() -> CliArgs {
    plot_args(&plot_command().get_matches())
}

pub fn experiment_command() -> Command {
    Command::new("AVL Experiment")
        .version("1.0")
        .about("Inserts random subsets of a knowledge base into an AVL tree, runs the queries against it and writes min/avg/max comparison counts per dataset size to a results CSV.")
        .arg(
            Arg::new("data")
                .help("Tab separated knowledge base: term, statement, confidence.")
                .value_parser(value_parser!(PathBuf))
                .default_value("GenericsKB.txt")
                .index(1),
        )
        .arg(
            Arg::new("queries")
                .help("One query term per line.")
                .value_parser(value_parser!(PathBuf))
                .default_value("GenericsKB-queries.txt")
                .index(2),
        )
        .arg(
            Arg::new("output")
                .help("Specify the results CSV file.")
                .long("output")
                .short('o')
                .value_parser(value_parser!(PathBuf))
                .default_value("results.csv"),
        )
        .arg(
            Arg::new("sizes")
                .help("Dataset sizes to measure")
                .long("sizes")
                .short('n')
                .value_delimiter(',')
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("seed")
                .help("Seed for the subset shuffle, random when omitted")
                .long("seed")
                .short('s')
                .value_parser(value_parser!(u64)),
        )
}

pub fn experiment_args(arguments: &ArgMatches) -> ExperimentConfig {
    let sizes = match arguments.get_many::<u64>("sizes") {
        Some(sizes) => sizes.map(|&n| n as usize).collect(),
        None => DATASET_SIZES.to_vec(),
    };

    ExperimentConfig {
        data: arguments.get_one::<PathBuf>("data").cloned().unwrap_or_default(),
        queries: arguments.get_one::<PathBuf>("queries").cloned().unwrap_or_default(),
        output: arguments.get_one::<PathBuf>("output").cloned().unwrap_or_default(),
        sizes,
        seed: arguments.get_one::<u64>("seed").copied(),
    }
}

#[test]
fn plot_defaults_without_arguments() {
    let matches = plot_command().try_get_matches_from(["avlplot"]).unwrap();
    let args = plot_args(&matches);
    assert_eq!(args.inputpath, PathBuf::from("results.csv"));
    assert_eq!(args.outputpath, PathBuf::from("avl_performance.png"));
    assert_eq!(args.axis, AxisMode::Indexed);
    assert_eq!(args.dpi, 300);
    assert!(args.markers);
    assert!(!args.flamegraph);
    assert_eq!(args.chart_config().pixel_size(), (4500, 1800));
}

#[test]
fn plot_flags_are_read() {
    let matches = plot_command()
        .try_get_matches_from([
            "avlplot", "in.csv", "out/chart.png", "--axis", "log", "-r", "100", "-m", "-f",
        ])
        .unwrap();
    let args = plot_args(&matches);
    assert_eq!(args.inputpath, PathBuf::from("in.csv"));
    assert_eq!(args.axis, AxisMode::Log);
    assert_eq!(args.dpi, 100);
    assert!(!args.markers);
    assert!(args.flamegraph);
    assert_eq!(args.flamegraph_path(), PathBuf::from("out/flamegraph.html"));
}

#[test]
fn unknown_axis_falls_back_to_indexed() {
    let matches = plot_command()
        .try_get_matches_from(["avlplot", "--axis", "linear"])
        .unwrap();
    assert_eq!(plot_args(&matches).axis, AxisMode::Indexed);
}

#[test]
fn zero_dpi_is_rejected() {
    assert!(plot_command()
        .try_get_matches_from(["avlplot", "--dpi", "0"])
        .is_err());
    assert!(plot_command()
        .try_get_matches_from(["avlplot", "--dpi", "abc"])
        .is_err());
}

#[test]
fn experiment_defaults_and_sizes() {
    let matches = experiment_command()
        .try_get_matches_from(["experiment"])
        .unwrap();
    let config = experiment_args(&matches);
    assert_eq!(config.sizes, vec![5, 50, 500, 5000, 50000]);
    assert_eq!(config.output, PathBuf::from("results.csv"));
    assert_eq!(config.seed, None);

    let matches = experiment_command()
        .try_get_matches_from(["experiment", "kb.txt", "q.txt", "-n", "10,20", "-s", "7"])
        .unwrap();
    let config = experiment_args(&matches);
    assert_eq!(config.data, PathBuf::from("kb.txt"));
    assert_eq!(config.queries, PathBuf::from("q.txt"));
    assert_eq!(config.sizes, vec![10, 20]);
    assert_eq!(config.seed, Some(7));
}

#[test]
fn experiment_rejects_zero_size() {
    assert!(experiment_command()
        .try_get_matches_from(["experiment", "-n", "0"])
        .is_err());
}
