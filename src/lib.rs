//! # Commission Report
//!
//! Turns a per-client sales spreadsheet into commission analytics.
//!
//! The sheet may come in *long* layout (one row per salesperson, client and
//! month) or *wide* layout (one row per client, one column per month). The
//! pipeline detects the layout from the headers, normalizes every row into
//! `(salesperson, client, period, gross_revenue)`, applies a percentage
//! commission and derives the analytical views: monthly series,
//! salesperson distribution, client ranking, grouped detail, period
//! comparison, drop alerts and goal attainment.
//!
//! ```rust,ignore
//! use commission_report::*;
//!
//! let sheet = load_sheet("ventas.xlsx", None)?;
//! let prepared = Pipeline::default().prepare(&sheet)?;
//! let analysis = prepared.analyze(&AnalysisRequest::default())?;
//! let result = AnalysisResult::compute(&analysis, &ViewOptions::default());
//! ```

pub mod commission;
pub mod config;
pub mod detect;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod period;
pub mod pipeline;
pub mod recompute;
pub mod reports;
pub mod types;
pub mod util;

pub use commission::{apply_commission, commission_amount, totals, validate_rate};
pub use config::{load_goals, MappingOverride, SynonymTable};
pub use detect::{detect_format, resolve_override};
pub use error::{CommissionError, Result};
pub use loader::load_sheet;
pub use normalize::{normalize_rows, Normalized};
pub use period::{parse_period, PeriodKey};
pub use pipeline::{
    Analysis, AnalysisRequest, AnalysisResult, Inspection, Pipeline, Prepared, ViewOptions,
};
pub use recompute::{spawn_recompute, LatestSlot, Ticket};
pub use reports::AnalysisFilter;
pub use types::*;
