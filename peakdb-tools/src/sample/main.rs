use clap::{load_yaml, App, ArgMatches};
use log::info;
use peakdb::{Aggregate, Dataset, DatasetBuilder, Label, LabelKind, Selection};
use peakdb_tools::{setup_thread_pool, AppResult};
use rayon::prelude::*;

fn format_label(label: &Label) -> String {
    match label {
        Label::Mask(mask) => mask
            .iter()
            .map(|set| if *set { '1' } else { '0' })
            .collect(),
        // one mean per condition row for quantitative tracks
        Label::Dense(dense) => dense
            .rows()
            .into_iter()
            .map(|row| format!("{:.3}", row.iter().sum::<f32>() / row.len().max(1) as f32))
            .collect::<Vec<_>>()
            .join(","),
    }
}

fn describe(dataset: &Dataset, index: usize) -> Result<String, String> {
    let site = dataset.resolve(index).map_err(|e| e.to_string())?;
    let (sequence, label) = dataset.get(index).map_err(|e| e.to_string())?;
    Ok(format!(
        "{}\t{}:{}:{}-{}\t{}bp\t{}",
        index,
        site.assembly,
        site.chrom,
        site.start,
        site.end,
        sequence.dim().0,
        format_label(&label)
    ))
}

fn main_impl(matches: ArgMatches<'_>) -> AppResult<()> {
    setup_thread_pool(&matches)?;

    let mut selection = Selection::all();
    if let Some(assembly) = matches.value_of("assembly") {
        selection = selection.assembly(assembly);
    }
    if let Some(species) = matches.value_of("species") {
        selection = selection.species(species);
    }

    let kind = LabelKind::from_name(matches.value_of("kind").unwrap_or("regions"))?;
    let aggregate = Aggregate::from_config(
        matches.value_of("aggregate").unwrap_or("any"),
        matches
            .value_of("inner-half-width")
            .map(str::parse)
            .transpose()?,
        matches
            .value_of("fraction-threshold")
            .map(str::parse)
            .transpose()?,
    )?;

    let mut builder = DatasetBuilder::new(matches.value_of("store").unwrap())
        .selection(selection)
        .window(matches.value_of("window").unwrap_or("200").parse()?)
        .kind(kind)
        .aggregate(aggregate)
        .in_memory(matches.is_present("in-memory"));
    if let Some(stride) = matches.value_of("stride") {
        builder = builder.stride(stride.parse()?);
    }
    if let Some(count) = matches.value_of("random") {
        builder = builder.random_count(count.parse()?);
    }

    let dataset = builder.build()?;
    info!("dataset holds {} windows", dataset.len());
    if dataset.is_empty() {
        eprintln!("The selection matches no chromosome, nothing to sample");
        return Ok(());
    }

    let count: usize = matches.value_of("count").unwrap_or("10").parse()?;
    let count = count.min(dataset.len());
    let step = (dataset.len() / count).max(1);
    let indices: Vec<usize> = (0..dataset.len()).step_by(step).take(count).collect();

    let lines = indices
        .into_par_iter()
        .map(|index| describe(&dataset, index))
        .collect::<Result<Vec<_>, String>>()?;
    for line in lines {
        println!("{}", line);
    }

    Ok(())
}

pub fn entry_point(args: Vec<String>) -> AppResult<()> {
    let yaml = load_yaml!("cli.yml");
    let matches = App::from_yaml(yaml)
        .version(peakdb_tools::VERSION)
        .get_matches_from(args);
    main_impl(matches)
}
