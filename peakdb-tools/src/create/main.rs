use clap::{load_yaml, App};
use peakdb::Store;
use peakdb_tools::AppResult;
use std::path::Path;

fn main(args: Vec<String>) -> AppResult<()> {
    let yaml = load_yaml!("cli.yml");
    let matches = App::from_yaml(yaml)
        .version(peakdb_tools::VERSION)
        .get_matches_from(args);

    let inputs: Vec<_> = matches.values_of("input-file").unwrap().collect();
    let name = matches.value_of("name");
    let species = matches.value_of("species");
    if name.is_some() && inputs.len() > 1 {
        return Err("--name only makes sense with a single FASTA file".into());
    }

    let mut store = Store::open(matches.value_of("store").unwrap())?;
    for input in inputs {
        let id = store.add_assembly(Path::new(input), name, species)?;
        println!("{}\t{}", id, input);
    }

    Ok(())
}

pub fn entry_point(args: Vec<String>) -> AppResult<()> {
    main(args)
}
