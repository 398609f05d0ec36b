use clap::Parser;
use fabric_nester::config::PackingConfig;
use fabric_nester::piece::FabricSheet;
use fabric_nester::rules::RuleBook;
use fabric_nester::wire::{self, DesignRef, OutlineSpec, PackRequest, PackResponse, PieceSpec};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "fabric_nester",
    about = "Nests garment pattern pieces onto a fabric sheet"
)]
struct Cli {
    /// Fabric dimensions (WxH, e.g. 150x300)
    #[arg(long, required_unless_present = "request")]
    fabric: Option<String>,

    /// Rectangular pieces as WxH:qty (e.g. 50x60:2 24x42:4)
    #[arg(long = "pieces", num_args = 1..)]
    pieces: Vec<String>,

    /// Disable piece rotation for --pieces
    #[arg(long)]
    no_rotate: bool,

    /// JSON packing request file; other flags override its budget
    #[arg(long, conflicts_with_all = ["fabric", "pieces"])]
    request: Option<String>,

    /// Pattern rule book (JSON) used with --sleeves/--neckline/--size
    #[arg(long)]
    rules: Option<String>,

    #[arg(long, requires_all = ["neckline", "size", "rules"])]
    sleeves: Option<String>,

    #[arg(long)]
    neckline: Option<String>,

    #[arg(long)]
    size: Option<String>,

    /// Population size of the genetic search
    #[arg(long)]
    population: Option<usize>,

    /// Maximum number of generations
    #[arg(long)]
    generations: Option<usize>,

    /// Time budget in milliseconds
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Log search progress to stderr
    #[arg(long, short)]
    verbose: bool,
}

fn parse_dimensions(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("invalid dimensions '{}', expected WxH", s))?;
    let width = w
        .parse::<f64>()
        .map_err(|_| format!("invalid width in '{}'", s))?;
    let height = h
        .parse::<f64>()
        .map_err(|_| format!("invalid height in '{}'", s))?;
    if !(width > 0.0 && height > 0.0) {
        return Err(format!("dimensions must be positive in '{}'", s));
    }
    Ok((width, height))
}

fn parse_piece(index: usize, s: &str, allow_rotate: bool) -> Result<PieceSpec, String> {
    let (dims, qty) = match s.split_once(':') {
        Some((dims, qty)) => (
            dims,
            qty.parse::<u32>()
                .map_err(|_| format!("invalid quantity in '{}'", s))?,
        ),
        None => (s, 1),
    };
    if qty == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    let (width, height) = parse_dimensions(dims)?;
    Ok(PieceSpec {
        piece_id: format!("piece-{}", index + 1),
        qty,
        outline: OutlineSpec::Rect { width, height },
        rotations: (!allow_rotate).then(|| vec![0.0]),
    })
}

fn build_request(cli: &Cli) -> Result<PackRequest, String> {
    let mut request = match &cli.request {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read '{}': {}", path, e))?;
            serde_json::from_str::<PackRequest>(&json)
                .map_err(|e| format!("invalid request '{}': {}", path, e))?
        }
        None => {
            let fabric = cli.fabric.as_deref().ok_or("--fabric is required")?;
            let (width, height) = parse_dimensions(fabric)?;
            let pieces = cli
                .pieces
                .iter()
                .enumerate()
                .map(|(i, p)| parse_piece(i, p, !cli.no_rotate))
                .collect::<Result<Vec<_>, _>>()?;
            PackRequest {
                fabric_id: None,
                fabric: FabricSheet { width, height },
                pieces,
                design: None,
                config: None,
            }
        }
    };

    if let (Some(sleeves), Some(neckline), Some(size)) = (&cli.sleeves, &cli.neckline, &cli.size) {
        request.design = Some(DesignRef {
            sleeves: sleeves.clone(),
            neckline: neckline.clone(),
            size: size.clone(),
        });
    }

    let mut config: PackingConfig = request.config.take().unwrap_or_default();
    if let Some(population) = cli.population {
        config = config.with_population_size(population);
    }
    if let Some(generations) = cli.generations {
        config = config.with_max_generations(generations);
    }
    if let Some(ms) = cli.time_limit_ms {
        config.time_limit_ms = ms;
    }
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    request.config = Some(config);
    Ok(request)
}

fn print(response: &PackResponse) {
    match serde_json::to_string_pretty(response) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: {}", e),
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let request = build_request(&cli).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let rules = match &cli.rules {
        Some(path) => RuleBook::load(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }),
        None => RuleBook::default(),
    };

    match wire::handle(&request, &rules) {
        Ok(result) => {
            eprintln!("{}", result);
            print(&PackResponse::from(&result));
        }
        Err(e) => {
            print(&PackResponse::failure(&e));
            std::process::exit(1);
        }
    }
}
