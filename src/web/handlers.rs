//! Page handlers. Dataset reads and the remote fetch run on the blocking pool.

use askama::Template;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::Query;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::catalogue::{CatalogueResult, CatalogueService};
use crate::chart::{ChartOptions, bar_chart, horizontal_bar_chart, line_chart};
use crate::datasets::{
    ALL_SPECIES, DEFAULT_HOST, DEFAULT_REGION, DEFAULT_TOP, DataStore, Series, TimelineMode,
    YearRange, validate_top,
};
use crate::domain::MoleculeType;
use crate::error::DashError;
use crate::table::CsvTable;
use crate::upload;
use crate::web::state::AppState;
use crate::web::templates::{
    BaltimoreTemplate, CatalogueTemplate, CatalogueView, Choice, DateTemplate, ErrorTemplate,
    GeographyTemplate, HostTemplate, IndexTemplate, SpeciesTemplate, molecule_choices,
    mode_choices, top_choices,
};

/// Shown for every rejected upload, whatever the cause.
pub const UPLOAD_ERROR_MESSAGE: &str = "There was an error processing this file.";

/// Catalogue charts keep only the largest countries and hosts.
const CATALOGUE_TOP: usize = 10;

fn page_title(name: &str) -> String {
    format!("{name} - VIROMEdash")
}

/// [`DashError`] rendered as an HTML error page.
#[derive(Debug)]
pub struct WebError(pub DashError);

impl From<DashError> for WebError {
    fn from(err: DashError) -> Self {
        Self(err)
    }
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_input_error() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_remote_error() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        let page = ErrorTemplate {
            title: page_title(status.canonical_reason().unwrap_or("Error")),
            status: status.as_u16(),
            message: self.0.to_string(),
        };
        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(_) => (status, self.0.to_string()).into_response(),
        }
    }
}

async fn with_datasets<T, F>(state: &AppState, query: F) -> Result<T, WebError>
where
    F: FnOnce(&DataStore) -> Result<T, DashError> + Send + 'static,
    T: Send + 'static,
{
    let datasets = state.datasets().clone();
    let value = tokio::task::spawn_blocking(move || query(&datasets))
        .await
        .map_err(|err| DashError::Server(err.to_string()))??;
    Ok(value)
}

fn csv_download(file_name: &str, table: &CsvTable) -> Result<Response, WebError> {
    let body = table.to_csv()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response())
}

fn resolve_range(
    bounds: YearRange,
    from: Option<i32>,
    to: Option<i32>,
) -> Result<YearRange, DashError> {
    YearRange::new(from.unwrap_or(bounds.from), to.unwrap_or(bounds.to))
}

pub async fn index() -> IndexTemplate {
    IndexTemplate {
        title: page_title("Global Virome Sequence Metadata Visualizer"),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeciesParams {
    #[serde(default)]
    pub taxonomy: Vec<String>,
    #[serde(default)]
    pub sequence: MoleculeType,
    #[serde(default)]
    pub mode: TimelineMode,
}

impl SpeciesParams {
    fn taxa(&self) -> Vec<String> {
        let taxa = self
            .taxonomy
            .iter()
            .map(|taxon| taxon.trim().to_string())
            .filter(|taxon| !taxon.is_empty())
            .collect::<Vec<_>>();
        if taxa.is_empty() {
            vec![ALL_SPECIES.to_string()]
        } else {
            taxa
        }
    }
}

pub async fn species(
    State(state): State<AppState>,
    Query(params): Query<SpeciesParams>,
) -> Result<SpeciesTemplate, WebError> {
    let taxa = params.taxa();
    let SpeciesParams { sequence, mode, .. } = params;
    let query_taxa = taxa.clone();
    let (options, report) = with_datasets(&state, move |datasets| {
        Ok((
            datasets.taxonomy_options()?,
            datasets.species_report(&query_taxa, sequence, mode)?,
        ))
    })
    .await?;

    let selection = taxa.join(", ");
    let timeline_label = match mode {
        TimelineMode::Cumulative => format!("Cumulative number of {sequence} sequences"),
        TimelineMode::OneYear => format!("Annual {sequence} sequences"),
    };
    let timeline_svg = line_chart(
        &ChartOptions::new(
            format!("Timeline of reported viral sequences for {selection}"),
            "Collection year",
            &timeline_label,
        ),
        &report.timeline,
    )?;
    let countries_svg = horizontal_bar_chart(
        &ChartOptions::new(
            format!("Top countries reported viral sequences for {selection}"),
            "Cumulative number of sequences",
            "Country",
        )
        .size(560, 420),
        &report.countries.bars(),
    )?;
    let hosts_svg = horizontal_bar_chart(
        &ChartOptions::new(
            format!("Top host species for {selection}"),
            "Cumulative number of sequences",
            "Host",
        )
        .size(560, 420),
        &report.hosts.bars(),
    )?;
    let isolation_svg = bar_chart(
        &ChartOptions::new(
            format!("Top isolation sources for {selection}"),
            "Isolation source",
            "Count",
        ),
        &report.isolation_sources.bars(),
    )?;

    Ok(SpeciesTemplate {
        title: page_title("Species/Genus/Family"),
        taxa: Choice::list(options, |value| taxa.iter().any(|taxon| taxon == value)),
        molecules: molecule_choices(sequence),
        modes: mode_choices(mode),
        selection,
        total_sequences: report.total_sequences,
        timeline_svg,
        countries_svg,
        hosts_svg,
        isolation_svg,
    })
}

pub async fn species_download(
    State(state): State<AppState>,
    Query(params): Query<SpeciesParams>,
) -> Result<Response, WebError> {
    let taxa = params.taxa();
    let SpeciesParams { sequence, mode, .. } = params;
    let report = with_datasets(&state, move |datasets| {
        datasets.species_report(&taxa, sequence, mode)
    })
    .await?;
    csv_download("species-year.csv", &report.download)
}

#[derive(Debug, Default, Deserialize)]
pub struct HostParams {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub sequence: MoleculeType,
    #[serde(default)]
    pub top: Option<usize>,
}

impl HostParams {
    fn host(&self) -> String {
        non_empty(self.host.as_deref()).unwrap_or(DEFAULT_HOST).to_string()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub async fn host(
    State(state): State<AppState>,
    Query(params): Query<HostParams>,
) -> Result<HostTemplate, WebError> {
    let host = params.host();
    let top = validate_top(params.top.unwrap_or(DEFAULT_TOP))?;
    let sequence = params.sequence;
    let query_host = host.clone();
    let (options, report) = with_datasets(&state, move |datasets| {
        Ok((
            datasets.host_options()?,
            datasets.host_report(&query_host, sequence, top)?,
        ))
    })
    .await?;

    let chart_svg = bar_chart(
        &ChartOptions::new(
            format!("Reported viral sequences for {host}"),
            "Species",
            "Count",
        ),
        &report.species.bars(),
    )?;
    Ok(HostTemplate {
        title: page_title("Host and environmental source"),
        hosts: Choice::list(options, |value| value == host),
        molecules: molecule_choices(sequence),
        tops: top_choices(top),
        chart_svg,
    })
}

pub async fn host_download(
    State(state): State<AppState>,
    Query(params): Query<HostParams>,
) -> Result<Response, WebError> {
    let host = params.host();
    let top = validate_top(params.top.unwrap_or(DEFAULT_TOP))?;
    let sequence = params.sequence;
    let report =
        with_datasets(&state, move |datasets| datasets.host_report(&host, sequence, top)).await?;
    csv_download("host.csv", &report.download)
}

#[derive(Debug, Default, Deserialize)]
pub struct GeographyParams {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub sequence: MoleculeType,
    #[serde(default)]
    pub from: Option<i32>,
    #[serde(default)]
    pub to: Option<i32>,
    #[serde(default)]
    pub top: Option<usize>,
}

pub async fn geography(
    State(state): State<AppState>,
    Query(params): Query<GeographyParams>,
) -> Result<GeographyTemplate, WebError> {
    let region = non_empty(params.region.as_deref())
        .unwrap_or(DEFAULT_REGION)
        .to_string();
    let top = validate_top(params.top.unwrap_or(DEFAULT_TOP))?;
    let GeographyParams {
        sequence, from, to, ..
    } = params;
    let query_region = region.clone();
    let (options, bounds, range, report) = with_datasets(&state, move |datasets| {
        let bounds = datasets.geography_bounds(sequence)?;
        let range = resolve_range(bounds, from, to)?;
        let report = datasets.geography_report(&query_region, sequence, range, top)?;
        Ok((datasets.region_options()?, bounds, range, report))
    })
    .await?;

    let chart_svg = bar_chart(
        &ChartOptions::new(
            format!("Reported viral sequences for {region}"),
            "Species",
            "Count",
        ),
        &report.species.bars(),
    )?;
    Ok(GeographyTemplate {
        title: page_title("Country and geographic region"),
        regions: Choice::list(options, |value| value == region),
        molecules: molecule_choices(sequence),
        tops: top_choices(top),
        range,
        bounds,
        chart_svg,
    })
}

pub async fn geography_download(
    State(state): State<AppState>,
    Query(params): Query<GeographyParams>,
) -> Result<Response, WebError> {
    let region = non_empty(params.region.as_deref())
        .unwrap_or(DEFAULT_REGION)
        .to_string();
    let top = validate_top(params.top.unwrap_or(DEFAULT_TOP))?;
    let GeographyParams {
        sequence, from, to, ..
    } = params;
    let report = with_datasets(&state, move |datasets| {
        let range = resolve_range(datasets.geography_bounds(sequence)?, from, to)?;
        datasets.geography_report(&region, sequence, range, top)
    })
    .await?;
    csv_download("geography.csv", &report.download)
}

#[derive(Debug, Default, Deserialize)]
pub struct DateParams {
    #[serde(default)]
    pub sequence: MoleculeType,
    #[serde(default)]
    pub from: Option<i32>,
    #[serde(default)]
    pub to: Option<i32>,
    #[serde(default)]
    pub top: Option<usize>,
}

pub async fn date(
    State(state): State<AppState>,
    Query(params): Query<DateParams>,
) -> Result<DateTemplate, WebError> {
    let top = validate_top(params.top.unwrap_or(DEFAULT_TOP))?;
    let DateParams { sequence, from, to, .. } = params;
    let (bounds, range, report) = with_datasets(&state, move |datasets| {
        let bounds = datasets.date_bounds(sequence)?;
        let range = resolve_range(bounds, from, to)?;
        Ok((bounds, range, datasets.date_report(sequence, range, top)?))
    })
    .await?;

    let chart_svg = bar_chart(
        &ChartOptions::new(
            format!("Reported viral sequences between {}-{}", range.from, range.to),
            "Species",
            "Count",
        ),
        &report.species.bars(),
    )?;
    Ok(DateTemplate {
        title: page_title("Collection and release date"),
        molecules: molecule_choices(sequence),
        tops: top_choices(top),
        range,
        bounds,
        chart_svg,
    })
}

pub async fn date_download(
    State(state): State<AppState>,
    Query(params): Query<DateParams>,
) -> Result<Response, WebError> {
    let top = validate_top(params.top.unwrap_or(DEFAULT_TOP))?;
    let DateParams { sequence, from, to, .. } = params;
    let report = with_datasets(&state, move |datasets| {
        let range = resolve_range(datasets.date_bounds(sequence)?, from, to)?;
        datasets.date_report(sequence, range, top)
    })
    .await?;
    csv_download("date.csv", &report.download)
}

pub async fn baltimore(State(state): State<AppState>) -> Result<BaltimoreTemplate, WebError> {
    let report = with_datasets(&state, |datasets| datasets.baltimore_report()).await?;
    let chart_svg = bar_chart(
        &ChartOptions::new(
            "Reported viral sequences per Baltimore class",
            "Baltimore class",
            "Count",
        ),
        &report.classes.bars(),
    )?;
    Ok(BaltimoreTemplate {
        title: page_title("Baltimore Classification"),
        chart_svg,
        rows: report.rows,
    })
}

pub async fn baltimore_download(State(state): State<AppState>) -> Result<Response, WebError> {
    let report = with_datasets(&state, |datasets| datasets.baltimore_report()).await?;
    csv_download("baltimore.csv", &report.download)
}

fn catalogue_page(
    molecule: MoleculeType,
    error: Option<String>,
    result: Option<CatalogueView>,
) -> CatalogueTemplate {
    CatalogueTemplate {
        title: page_title("Make a self catalogue"),
        molecules: molecule_choices(molecule),
        error,
        result,
    }
}

pub async fn catalogue_form() -> CatalogueTemplate {
    catalogue_page(MoleculeType::default(), None, None)
}

struct UploadForm {
    molecule: MoleculeType,
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_upload(multipart: &mut Multipart) -> Result<UploadForm, DashError> {
    let mut molecule = MoleculeType::default();
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| DashError::UploadParse(err.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("molecule") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| DashError::UploadParse(err.to_string()))?;
                molecule = value.parse()?;
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| DashError::UploadParse(err.to_string()))?;
                file = Some((file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }
    let (file_name, bytes) =
        file.ok_or_else(|| DashError::UploadParse("no file uploaded".to_string()))?;
    Ok(UploadForm {
        molecule,
        file_name,
        bytes,
    })
}

fn upload_failed(molecule: MoleculeType, err: DashError) -> Response {
    warn!(error = %err, "upload rejected");
    (
        StatusCode::BAD_REQUEST,
        catalogue_page(molecule, Some(UPLOAD_ERROR_MESSAGE.to_string()), None),
    )
        .into_response()
}

pub async fn catalogue_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, WebError> {
    let form = match read_upload(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return Ok(upload_failed(MoleculeType::default(), err)),
    };
    let accessions = match upload::parse_upload(&form.file_name, &form.bytes) {
        Ok(accessions) => accessions,
        Err(err) => return Ok(upload_failed(form.molecule, err)),
    };
    let molecule = form.molecule;
    info!(
        file = %form.file_name,
        accessions = accessions.len(),
        %molecule,
        "catalogue upload"
    );

    let client = state.client();
    let result = tokio::task::spawn_blocking(move || {
        CatalogueService::new(client).run(&accessions, molecule)
    })
    .await
    .map_err(|err| DashError::Server(err.to_string()))??;

    let view = catalogue_view(&result)?;
    Ok(catalogue_page(molecule, None, Some(view)).into_response())
}

fn catalogue_view(result: &CatalogueResult) -> Result<CatalogueView, DashError> {
    let per_year = Series {
        name: "Per year".to_string(),
        points: result
            .years
            .rows
            .iter()
            .map(|row| (row.year, row.count))
            .collect(),
    };
    let per_year_svg = line_chart(
        &ChartOptions::new(
            "Figure 1. Timeline of reported sequences",
            "Collection year",
            "Per year number of sequences",
        ),
        &[per_year],
    )?;
    let cumulative = Series {
        name: "Cumulative".to_string(),
        points: result
            .years
            .rows
            .iter()
            .map(|row| (row.year, row.cumulative))
            .collect(),
    };
    let cumulative_svg = line_chart(
        &ChartOptions::new(
            "Figure 2. Timeline of reported sequences",
            "Collection year",
            "Cumulative number of sequences",
        ),
        &[cumulative],
    )?;
    let countries_svg = bar_chart(
        &ChartOptions::new("Figure 3. Top Countries", "Country", "Count"),
        &result.countries.top(CATALOGUE_TOP).bars(),
    )?;
    let hosts_svg = bar_chart(
        &ChartOptions::new("Figure 4. Top Hosts", "Host", "Count"),
        &result.hosts.top(CATALOGUE_TOP).bars(),
    )?;
    let metaframe = result.merged.to_table().to_csv()?;

    Ok(CatalogueView {
        requested: result.requested,
        unresolved: result
            .unresolved
            .iter()
            .map(|accession| accession.to_string())
            .collect(),
        unparsed_dates: result.unparsed_dates,
        per_year_svg,
        cumulative_svg,
        countries_svg,
        hosts_svg,
        rows: result.merged.rows.clone(),
        metaframe_href: format!(
            "data:text/csv;charset=utf-8;base64,{}",
            STANDARD.encode(metaframe)
        ),
    })
}
