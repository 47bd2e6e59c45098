use clap::ArgMatches;
use rayon::ThreadPoolBuildError;
use regex::Regex;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Parse a `chr`, `chr:from-to` region spec into the chromosome name and the
/// optional half-open range.
pub fn parse_region_spec(spec: &str) -> Option<(String, Option<(u64, u64)>)> {
    let pattern = Regex::new(r"^(?P<CHR>[^:]+)(:(?P<FROM>\d+)-(?P<TO>\d+))?$").unwrap();
    let captures = pattern.captures(spec)?;
    let chrom = captures.name("CHR")?.as_str().to_string();
    let range = match (captures.name("FROM"), captures.name("TO")) {
        (Some(from), Some(to)) => Some((
            from.as_str().parse().ok()?,
            to.as_str().parse().ok()?,
        )),
        _ => None,
    };
    Some((chrom, range))
}

pub fn setup_thread_pool(matches: &ArgMatches) -> Result<(), ThreadPoolBuildError> {
    if let Some(threads) = matches.value_of("threads") {
        if let Ok(threads) = threads.parse() {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()?;
        }
    }
    Ok(())
}
