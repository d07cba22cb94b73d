use avl_plot::{cli, experiment};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let config = cli::experiment_args(&cli::experiment_command().get_matches());

    let rows = experiment::run(&config)?;

    println!("n,InsertMinComps,InsertAvgComps,InsertMaxComps,SearchMinComps,SearchAvgComps,SearchMaxComps");
    for row in &rows {
        println!(
            "{},{},{},{},{},{},{}",
            row.n,
            row.insert_min_comps,
            row.insert_avg_comps,
            row.insert_max_comps,
            row.search_min_comps,
            row.search_avg_comps,
            row.search_max_comps
        );
    }
    println!("\nResults have been written to {}", config.output.display());
    Ok(())
}
