use std::io::{BufRead, BufReader};

use clap::Parser;
use need::{
    Actions,
    Document,
    Error,
    IndexRegistry,
    ManagerKind,
    Need,
    NeedConfig,
    Result,
    Settings,
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, SearchArgs, WriteArgs};

/// Log to stderr. `NEED_LOG` takes a full filter directive; otherwise the
/// crate logs at a level picked by `-q`/`-v` and Tantivy only warns.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_env("NEED_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,need={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let settings = Settings::resolve(cli.index_dir.as_deref())?;
    let config = NeedConfig::load(&cli.config)?;
    let registry = IndexRegistry::new();

    let index = match &cli.command {
        Command::Init => return cmd_init(&config, &settings, &registry),
        Command::Schema { index }
        | Command::Delete { index, .. }
        | Command::DeleteWhen { index, .. }
        | Command::Count { index }
        | Command::Clear { index }
        | Command::Optimize { index } => index,
        Command::Add(args) | Command::Merge(args) => &args.index,
        Command::Search(args) => &args.index,
    };

    let (def, kind) = config.definition(index)?;
    match kind {
        ManagerKind::Unlocked => {
            run(&Need::resolve(&def, &settings)?, cli.command)
        }
        ManagerKind::Blocking => run(
            &Need::resolve_blocking(&def, &settings, &registry)?,
            cli.command,
        ),
    }
}

fn cmd_init(
    config: &NeedConfig,
    settings: &Settings,
    registry: &IndexRegistry,
) -> Result<()> {
    for (def, kind) in config.definitions()? {
        let options = match kind {
            ManagerKind::Unlocked => {
                Need::resolve(&def, settings)?.options().clone()
            }
            ManagerKind::Blocking => {
                Need::resolve_blocking(&def, settings, registry)?
                    .options()
                    .clone()
            }
        };
        println!(
            "{} -> {}",
            options.qualified_name(),
            options.index_dir().display()
        );
    }
    Ok(())
}

fn run<M: Actions>(need: &Need<M>, command: Command) -> Result<()> {
    let actions = need.actions();
    match command {
        Command::Init => {
            return Err(Error::Config("init does not act on one index".into()));
        }
        Command::Schema { .. } => {
            println!("{}", need.options());
            for (name, decl) in need.options().schema.fields() {
                println!(
                    "  {name}: {}{}{}{}",
                    decl.kind.label(),
                    if decl.stored { " stored" } else { "" },
                    if decl.unique { " unique" } else { "" },
                    if decl.sortable { " sortable" } else { "" },
                );
            }
        }
        Command::Add(args) => {
            let docs = read_documents(&args)?;
            actions.bulk_add(&docs)?;
            println!("Added {} document(s)", docs.len());
        }
        Command::Merge(args) => {
            let docs = read_documents(&args)?;
            for doc in &docs {
                actions.merge(doc)?;
            }
            println!("Merged {} document(s)", docs.len());
        }
        Command::Delete { key, .. } => {
            actions.delete(&key)?;
            println!("Deleted '{key}'");
        }
        Command::DeleteWhen { field, value, .. } => {
            actions.delete_when(&field, &value)?;
            println!("Deleted documents where {field} = '{value}'");
        }
        Command::Search(args) => cmd_search(actions, &args)?,
        Command::Count { .. } => println!("{}", actions.size()?),
        Command::Clear { index } => {
            actions.clear()?;
            println!("Cleared '{index}'");
        }
        Command::Optimize { index } => {
            actions.optimize()?;
            println!("Optimized '{index}'");
        }
    }
    Ok(())
}

fn cmd_search<M: Actions>(actions: &M, args: &SearchArgs) -> Result<()> {
    let fields: Vec<&str> = args.fields.iter().map(String::as_str).collect();
    let hits = actions
        .read_limited(&fields, &args.query, args.count, |hits| hits.to_vec())??;

    if args.json {
        let results: Vec<_> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                serde_json::json!({
                    "rank": i + 1,
                    "score": hit.score,
                    "fields": hit.fields.clone().into_inner(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "query": args.query,
                "result_count": hits.len(),
                "results": results,
            })
        );
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{:>3}. [{:.3}]", i + 1, hit.score);
        for (name, value) in hit.fields.iter() {
            println!("     {name}: {value}");
        }
    }
    println!("\n{} result(s)", hits.len());
    Ok(())
}

fn read_documents(args: &WriteArgs) -> Result<Vec<Document>> {
    let Some(path) = &args.json else {
        let mut doc = Document::new();
        for pair in &args.set {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                Error::Config(format!("expected NAME=VALUE, got '{pair}'"))
            })?;
            doc.insert(name, value);
        }
        return Ok(vec![doc]);
    };

    let reader: Box<dyn BufRead> = if path.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        Box::new(BufReader::new(std::fs::File::open(path)?))
    };

    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        docs.push(Document::from_json(&serde_json::from_str(&line)?)?);
    }
    Ok(docs)
}
