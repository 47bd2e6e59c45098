use clap::{load_yaml, App};
use peakdb::Store;
use peakdb_tools::AppResult;
use std::path::Path;

fn main(args: Vec<String>) -> AppResult<()> {
    let yaml = load_yaml!("cli.yml");
    let matches = App::from_yaml(yaml)
        .version(peakdb_tools::VERSION)
        .get_matches_from(args);

    let mut store = Store::open(matches.value_of("store").unwrap())?;
    let inserted = store.add_data(
        Path::new(matches.value_of("input-file").unwrap()),
        matches.value_of("assembly").unwrap(),
        matches.value_of("condition"),
    )?;
    println!("{}", inserted);

    Ok(())
}

pub fn entry_point(args: Vec<String>) -> AppResult<()> {
    main(args)
}
