use clap::{load_yaml, App};
use peakdb::{Selection, Store};
use peakdb_tools::{parse_region_spec, AppResult};
use std::collections::HashMap;

fn main(args: Vec<String>) -> AppResult<()> {
    let yaml = load_yaml!("cli.yml");
    let matches = App::from_yaml(yaml)
        .version(peakdb_tools::VERSION)
        .get_matches_from(args);

    let store = Store::open(matches.value_of("store").unwrap())?;
    let assembly = matches.value_of("assembly").unwrap();
    store.assembly_id(assembly)?;

    let conditions: HashMap<i64, String> = store
        .conditions()?
        .into_iter()
        .map(|condition| {
            (
                condition.id,
                condition.name.unwrap_or_else(|| ".".to_string()),
            )
        })
        .collect();

    let regions: Vec<(String, Option<(u64, u64)>)> = match matches.value_of("region") {
        Some(spec) => {
            let region = parse_region_spec(spec)
                .ok_or_else(|| format!("invalid region spec: {}", spec))?;
            vec![region]
        }
        None => store
            .chromosomes(&Selection::all().assembly(assembly))?
            .into_iter()
            .map(|(_, _, chrom)| (chrom.name, None))
            .collect(),
    };

    for (name, range) in regions {
        let (chromosome_id, chrom) = store.chromosome(assembly, &name)?;
        let (from, to) = match range {
            Some((from, to)) => (from, to.min(chrom.size)),
            None => (0, chrom.size),
        };
        if from >= to {
            continue;
        }

        let hits = store.query_overlap(chrom.offset + from, chrom.offset + to)?;
        for hit in hits.iter().filter(|hit| hit.chromosome_id == chromosome_id) {
            let summit = hit
                .summit
                .map_or_else(|| ".".to_string(), |summit| summit.to_string());
            let value = hit
                .value
                .map_or_else(|| ".".to_string(), |value| value.to_string());
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                chrom.name,
                hit.start - chrom.offset,
                hit.end - chrom.offset,
                conditions
                    .get(&hit.condition_id)
                    .map(String::as_str)
                    .unwrap_or("."),
                summit,
                value
            );
        }
    }

    Ok(())
}

pub fn entry_point(args: Vec<String>) -> AppResult<()> {
    main(args)
}
