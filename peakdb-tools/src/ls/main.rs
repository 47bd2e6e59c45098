use clap::{load_yaml, App};
use peakdb::{Selection, Store};
use peakdb_tools::AppResult;
use serde_json::json;

fn main(args: Vec<String>) -> AppResult<()> {
    let yaml = load_yaml!("cli.yml");
    let matches = App::from_yaml(yaml)
        .version(peakdb_tools::VERSION)
        .get_matches_from(args);

    let store = Store::open(matches.value_of("store").unwrap())?;
    let assemblies = store.assemblies()?;
    let conditions = store.conditions()?;

    if matches.is_present("json") {
        let mut listing = Vec::new();
        for assembly in &assemblies {
            let chroms = store.chromosomes(&Selection::all().assembly(&assembly.name))?;
            listing.push(json!({
                "name": assembly.name,
                "species": assembly.species,
                "path": assembly.path.display().to_string(),
                "size": assembly.size,
                "chromosomes": chroms
                    .iter()
                    .map(|(_, _, chrom)| json!(chrom))
                    .collect::<Vec<_>>(),
            }));
        }
        let output = json!({
            "assemblies": listing,
            "conditions": conditions
                .iter()
                .map(|condition| json!({
                    "id": condition.id,
                    "name": condition.name,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for assembly in &assemblies {
        println!(
            "{}\t{}\t{} bp\t{}",
            assembly.name,
            assembly.species,
            assembly.size,
            assembly.path.display()
        );
        for (_, _, chrom) in store.chromosomes(&Selection::all().assembly(&assembly.name))? {
            println!("\t{}\t{} bp\toffset {}", chrom.name, chrom.size, chrom.offset);
        }
    }
    for condition in &conditions {
        println!(
            "condition {}\t{}",
            condition.id,
            condition.name.as_deref().unwrap_or("<none>")
        );
    }

    Ok(())
}

pub fn entry_point(args: Vec<String>) -> AppResult<()> {
    main(args)
}
