#[path = "create/main.rs"]
mod create;
#[path = "load/main.rs"]
mod load;
#[path = "ls/main.rs"]
mod ls;
#[path = "sample/main.rs"]
mod sample;
#[path = "show/main.rs"]
mod show;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "warn"),
    );
    let args: Vec<_> = std::env::args().skip(1).collect();
    let ret = match args.first().map(AsRef::as_ref) {
        Some("create") => create::entry_point(args),
        Some("load") => load::entry_point(args),
        Some("ls") => ls::entry_point(args),
        Some("sample") => sample::entry_point(args),
        Some("show") => show::entry_point(args),
        _ => {
            eprintln!(
                "PeakDB Utilities Program {}(library version: {})",
                peakdb_tools::VERSION,
                peakdb::VERSION
            );
            eprintln!("Usage: peakdb <subcommand> <args>");
            eprintln!("Possible subcommands are:");
            eprintln!("\tcreate\tRegister reference assemblies in a store");
            eprintln!("\tload  \tLoad an annotation file into a store");
            eprintln!("\tls    \tList assemblies, chromosomes and conditions");
            eprintln!("\tsample\tDraw (sequence, label) samples from a store");
            eprintln!("\tshow  \tPrint the intervals overlapping a region");
            eprintln!();
            eprintln!("Type 'peakdb <subcommand> --help' to learn more about each subcommands.");
            Ok(())
        }
    };

    if let Some(io_error) = ret
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<std::io::Error>())
    {
        if io_error.kind() == std::io::ErrorKind::BrokenPipe {
            return Ok(());
        }
    }
    ret
}
