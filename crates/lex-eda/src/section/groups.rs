//! Built-in section groups.

use super::{
    Autocorrelation, ContingencyTable, Correlation, GroupAnalysis, PairPlot, Section, Umap,
};

/// Correlation, pair plot and contingency tables.
pub fn bivariate_analysis() -> Section {
    Section::group(
        "Bivariate Analysis",
        vec![
            Section::leaf(Correlation),
            Section::leaf(PairPlot),
            Section::leaf(ContingencyTable),
        ],
    )
}

/// UMAP embedding.
pub fn multivariate_analysis() -> Section {
    Section::group("Multivariate Analysis", vec![Section::leaf(Umap)])
}

pub fn timeseries_analysis() -> Section {
    Section::group("Timeseries Analysis", vec![Section::leaf(Autocorrelation)])
}

/// Group analysis split by the given columns.
pub fn group_analysis(groupby: &[&str]) -> Section {
    Section::leaf(GroupAnalysis).with_option(
        "groupby",
        groupby.iter().map(|g| g.to_string()).collect::<Vec<_>>(),
    )
}

/// Constructor for a built-in group kind used in report definitions.
pub fn group_for_kind(kind: &str) -> Option<Section> {
    match kind {
        "bivariate_analysis" => Some(bivariate_analysis()),
        "multivariate_analysis" => Some(multivariate_analysis()),
        "timeseries_analysis" => Some(timeseries_analysis()),
        _ => None,
    }
}

pub const GROUP_KINDS: &[&str] = &[
    "bivariate_analysis",
    "multivariate_analysis",
    "timeseries_analysis",
];
