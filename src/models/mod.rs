mod criteria;
mod filter;
mod program;
mod university;

pub use criteria::{CriteriaConfig, CriteriaView, Criterion, CriterionView, CRITERIA_CONFIG_TYPE};
pub use filter::{RatingFilter, TableFilter};
pub use program::{
    drop_shadowed_aliases, join_lines, split_lines, validate_criterios, Calificacion,
    CiudadMetrics, Coords, Criterios, LinesInput, NewProgram, Program, ProgramPatch, Stats, Status,
    FIELD_ALIASES, LINE_SEPARATOR, RESTRICTED_FIELDS,
};
pub(crate) use program::status_or_default;
pub use university::{
    AnalysisResponse, NewUniversity, ProgramView, UniversitiesResponse, UniversityAnalysis, UniversityPlaceholder,
    UniversityTree, UniversityView,
};
