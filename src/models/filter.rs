use super::program::{Program, Status};

/// Rating presence filter used by the table and rating views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatingFilter {
    #[default]
    All,
    Rated,
    Unrated,
}

impl RatingFilter {
    pub fn matches(&self, program: &Program) -> bool {
        let rated = program
            .calificacion
            .as_ref()
            .is_some_and(|c| c.valor >= 1);
        match self {
            RatingFilter::All => true,
            RatingFilter::Rated => rated,
            RatingFilter::Unrated => !rated,
        }
    }
}

/// The one table filter contract: rating presence plus optional status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableFilter {
    pub rating: RatingFilter,
    pub status: Option<Status>,
}

impl TableFilter {
    pub fn matches(&self, program: &Program) -> bool {
        self.rating.matches(program) && self.status.map_or(true, |s| program.status == s)
    }
}
