use avl_plot::{cli, parse, reference::ReferenceCurves, visuals::chart};
use flame;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let arguments = cli::cli();

    if arguments.flamegraph {
        flame::start("main");
    }

    let rows = parse::load(&arguments.inputpath)?;
    let curves = ReferenceCurves::compute(&rows)?;
    chart::render(
        &rows,
        &curves,
        &arguments.outputpath,
        &arguments.chart_config(),
    )?;

    println!("Chart saved to {}", arguments.outputpath.display());

    if arguments.flamegraph {
        flame::end("main");
        flame::dump_html(std::fs::File::create(arguments.flamegraph_path())?)?;
    }

    Ok(())
}
