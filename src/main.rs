// CLI entry point: interactive menu and batch mode.
//
// Interactive mode keeps the load / generate menu: option [1] loads and
// normalizes the spreadsheet once, option [2] prints every report, option
// [3] changes the commission rate and recomputes. `--batch` runs a single
// analysis and exits.
use clap::Parser;
use commission_report::{
    load_goals, load_sheet, output, spawn_recompute, util, AnalysisFilter, AnalysisRequest,
    AnalysisResult, LatestSlot, MappingOverride, Pipeline, Prepared, SynonymTable, ViewOptions,
};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "commission_report")]
#[command(about = "Commission analytics for per-client sales spreadsheets")]
struct Args {
    /// Spreadsheet to analyze (.csv, .xlsx, .xlsm, .xls, .ods)
    #[arg(short, long, default_value = "ventas.xlsx")]
    file: PathBuf,

    /// Worksheet name (default: first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Commission rate in percent
    #[arg(short, long, default_value = "5")]
    rate: Decimal,

    /// Only these salespersons (repeatable)
    #[arg(short = 's', long = "salesperson")]
    salespersons: Vec<String>,

    /// Only these periods, e.g. "enero 2025" (repeatable)
    #[arg(short = 'p', long = "period")]
    periods: Vec<String>,

    /// JSON object of salesperson -> commission goal
    #[arg(long)]
    goals: Option<PathBuf>,

    /// Saved column mapping to use instead of detection
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Save the mapping used for this sheet to a JSON file
    #[arg(long)]
    save_mapping: Option<PathBuf>,

    /// Extra header synonyms (JSON)
    #[arg(long)]
    synonyms: Option<PathBuf>,

    /// Clients shown in the ranking
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Write the filtered rows as a semicolon CSV
    #[arg(long)]
    export: Option<String>,

    /// Write the full analysis as JSON
    #[arg(long)]
    json: Option<String>,

    /// Run once and exit instead of showing the menu
    #[arg(long)]
    batch: bool,
}

type Published = Result<AnalysisResult, String>;

// Loaded sheet and current rate; the sheet is normalized once and analyzed
// many times.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        prepared: None,
        rate: Decimal::from(5),
    })
});

static RESULTS: Lazy<Arc<LatestSlot<Published>>> = Lazy::new(|| Arc::new(LatestSlot::new()));

struct AppState {
    prepared: Option<Arc<Prepared>>,
    rate: Decimal,
}

struct Session {
    args: Args,
    pipeline: Pipeline,
    options: ViewOptions,
}

impl Session {
    fn from_args(args: Args) -> commission_report::Result<Self> {
        let synonyms = match &args.synonyms {
            Some(path) => SynonymTable::load(path)?,
            None => SynonymTable::default(),
        };
        let saved = args.mapping.as_ref().map(|p| MappingOverride::load(p)).transpose()?;
        let goals = match &args.goals {
            Some(path) => load_goals(path)?,
            None => Default::default(),
        };
        Ok(Self {
            pipeline: Pipeline::new(synonyms).with_override(saved),
            options: ViewOptions {
                goals,
                top_n: Some(args.top),
            },
            args,
        })
    }

    fn filter(&self) -> AnalysisFilter {
        AnalysisFilter {
            salespersons: self.args.salespersons.clone(),
            periods: self.args.periods.clone(),
        }
    }

    fn load(&self) -> commission_report::Result<Prepared> {
        let sheet = load_sheet(&self.args.file, self.args.sheet.as_deref())?;
        let prepared = self.pipeline.prepare(&sheet)?;
        if let Some(path) = &self.args.save_mapping {
            MappingOverride::from_mapping(&prepared.mapping, &sheet.headers).save(path)?;
            info!("mapping saved to {}", path.display());
        }
        Ok(prepared)
    }

    /// Recompute on a worker thread through the shared slot and wait for it.
    fn recompute(&self, prepared: Arc<Prepared>, rate: Decimal) -> Option<Arc<Published>> {
        let request = AnalysisRequest {
            rate,
            filter: self.filter(),
        };
        let options = self.options.clone();
        let handle = spawn_recompute(Arc::clone(&RESULTS), move || {
            prepared
                .analyze(&request)
                .map(|analysis| AnalysisResult::compute(&analysis, &options))
                .map_err(|e| e.to_string())
        });
        if !handle.join().unwrap_or(false) {
            info!("recompute superseded by a newer request");
        }
        RESULTS.latest()
    }

    fn write_outputs(&self, result: &AnalysisResult) -> commission_report::Result<()> {
        if let Some(path) = &self.args.export {
            output::write_export_csv(path, &result.rows)?;
            println!("(Filas exportadas a {})\n", path);
        }
        if let Some(path) = &self.args.json {
            output::write_json(path, result)?;
        }
        Ok(())
    }
}

/// Read a single line of input after printing the common "Opción:" prompt.
fn read_choice(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask whether to go back to the menu after printing reports.
fn prompt_back_to_menu() -> bool {
    loop {
        match read_choice("¿Volver al menú? (S/N): ").to_uppercase().as_str() {
            "S" | "Y" => return true,
            "N" => return false,
            _ => println!("Opción no válida. Responde S o N."),
        }
    }
}

/// Option [1]: load and normalize the spreadsheet.
fn handle_load(session: &Session) {
    match session.load() {
        Ok(prepared) => {
            println!(
                "Formato {} detectado ({} filas normalizadas)",
                prepared.format,
                util::format_int(prepared.rows.len())
            );
            if !prepared.warnings.is_empty() {
                println!(
                    "Nota: {} filas con avisos (omitidas o sin fecha).",
                    util::format_int(prepared.warnings.len())
                );
            }
            println!();
            let mut state = APP_STATE.lock().unwrap();
            state.prepared = Some(Arc::new(prepared));
        }
        Err(e) => {
            eprintln!("No se pudo cargar el fichero: {}\n", e);
        }
    }
}

/// Option [2] and [3]: recompute with the current rate and print reports.
fn handle_generate_reports(session: &Session) {
    let (prepared, rate) = {
        let state = APP_STATE.lock().unwrap();
        (state.prepared.clone(), state.rate)
    };
    let Some(prepared) = prepared else {
        println!("Error: no hay datos. Carga primero el fichero (opción 1).\n");
        return;
    };
    match session.recompute(Arc::clone(&prepared), rate).as_deref() {
        Some(Ok(result)) => {
            output::print_analysis(result, session.args.top);
            if let Err(e) = session.write_outputs(result) {
                eprintln!("Write error: {}", e);
            }
        }
        Some(Err(e)) => eprintln!("Error: {}\n", e),
        None => eprintln!("Error: sin resultados\n"),
    }
}

fn handle_change_rate() {
    let input = read_choice("Nueva comisión (%): ");
    match Decimal::from_str(&input.replace(',', ".")) {
        Ok(rate) if !rate.is_sign_negative() || rate.is_zero() => {
            APP_STATE.lock().unwrap().rate = rate;
            println!("Comisión fijada en {}%\n", rate);
        }
        _ => println!("Comisión no válida: debe ser un número >= 0.\n"),
    }
}

fn run_batch(session: &Session) -> commission_report::Result<()> {
    let prepared = session.load()?;
    for w in &prepared.warnings {
        tracing::warn!("{}", w);
    }
    let request = AnalysisRequest {
        rate: session.args.rate,
        filter: session.filter(),
    };
    let analysis = prepared.analyze(&request)?;
    let result = AnalysisResult::compute(&analysis, &session.options);
    output::print_analysis(&result, session.args.top);
    session.write_outputs(&result)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let rate = args.rate;
    let batch = args.batch;
    let session = match Session::from_args(args) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    if batch {
        if let Err(e) = run_batch(&session) {
            error!("{}", e);
            std::process::exit(1);
        }
        return;
    }

    APP_STATE.lock().unwrap().rate = rate;
    loop {
        println!("Informe de comisiones:");
        println!("[1] Cargar el fichero");
        println!("[2] Generar informes");
        println!("[3] Cambiar comisión");
        println!("[4] Salir\n");
        match read_choice("Opción: ").as_str() {
            "1" => handle_load(&session),
            "2" => {
                println!();
                handle_generate_reports(&session);
                if !prompt_back_to_menu() {
                    println!("Saliendo.");
                    break;
                }
            }
            "3" => {
                handle_change_rate();
                handle_generate_reports(&session);
            }
            "4" => {
                println!("Saliendo.");
                break;
            }
            _ => println!("Opción no válida. Elige 1, 2, 3 o 4.\n"),
        }
    }
}
