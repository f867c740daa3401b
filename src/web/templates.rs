//! Askama page templates and the small view models they render.

use askama::Template;
use askama_web::WebTemplate;

use crate::catalogue::MergedRow;
use crate::datasets::{BaltimoreRow, TOP_CHOICES, TimelineMode, YearRange};
use crate::domain::MoleculeType;

/// One entry of a select list or radio group.
#[derive(Debug, Clone)]
pub struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl Choice {
    pub fn list<I>(values: I, is_selected: impl Fn(&str) -> bool) -> Vec<Choice>
    where
        I: IntoIterator<Item = String>,
    {
        values
            .into_iter()
            .map(|value| Choice {
                selected: is_selected(&value),
                label: value.clone(),
                value,
            })
            .collect()
    }
}

pub fn molecule_choices(selected: MoleculeType) -> Vec<Choice> {
    MoleculeType::all()
        .into_iter()
        .map(|molecule| Choice {
            value: molecule.to_string(),
            label: molecule.label().to_string(),
            selected: molecule == selected,
        })
        .collect()
}

pub fn mode_choices(selected: TimelineMode) -> Vec<Choice> {
    [
        (TimelineMode::Cumulative, "Cumulative"),
        (TimelineMode::OneYear, "One-Year"),
    ]
    .into_iter()
    .map(|(mode, label)| Choice {
        value: mode.as_str().to_string(),
        label: label.to_string(),
        selected: mode == selected,
    })
    .collect()
}

pub fn top_choices(selected: usize) -> Vec<Choice> {
    Choice::list(TOP_CHOICES.iter().map(usize::to_string), |value| {
        value == selected.to_string()
    })
}

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "species.html")]
pub struct SpeciesTemplate {
    pub title: String,
    pub taxa: Vec<Choice>,
    pub molecules: Vec<Choice>,
    pub modes: Vec<Choice>,
    pub selection: String,
    pub total_sequences: u64,
    pub timeline_svg: String,
    pub countries_svg: String,
    pub hosts_svg: String,
    pub isolation_svg: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "host.html")]
pub struct HostTemplate {
    pub title: String,
    pub hosts: Vec<Choice>,
    pub molecules: Vec<Choice>,
    pub tops: Vec<Choice>,
    pub chart_svg: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "geography.html")]
pub struct GeographyTemplate {
    pub title: String,
    pub regions: Vec<Choice>,
    pub molecules: Vec<Choice>,
    pub tops: Vec<Choice>,
    pub range: YearRange,
    pub bounds: YearRange,
    pub chart_svg: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "date.html")]
pub struct DateTemplate {
    pub title: String,
    pub molecules: Vec<Choice>,
    pub tops: Vec<Choice>,
    pub range: YearRange,
    pub bounds: YearRange,
    pub chart_svg: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "baltimore.html")]
pub struct BaltimoreTemplate {
    pub title: String,
    pub chart_svg: String,
    pub rows: Vec<BaltimoreRow>,
}

/// Rendered outcome of one catalogue upload.
pub struct CatalogueView {
    pub requested: usize,
    pub unresolved: Vec<String>,
    pub unparsed_dates: u64,
    pub per_year_svg: String,
    pub cumulative_svg: String,
    pub countries_svg: String,
    pub hosts_svg: String,
    pub rows: Vec<MergedRow>,
    /// `data:` URI of `metaframe.csv`.
    pub metaframe_href: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "catalogue.html")]
pub struct CatalogueTemplate {
    pub title: String,
    pub molecules: Vec<Choice>,
    pub error: Option<String>,
    pub result: Option<CatalogueView>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub status: u16,
    pub message: String,
}
