//! University → programs tree built from the flat program list.

use std::collections::HashMap;
use std::fmt::Debug;

use tracing::warn;

use crate::models::{Program, ProgramView, UniversityAnalysis, UniversityView};

/// Group programs by identical (universidad, ciudad), in order of first
/// appearance. Programs missing either field each form their own group.
pub fn group_by_university(programs: &[Program]) -> Vec<Vec<&Program>> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut groups: Vec<Vec<&Program>> = Vec::new();

    for program in programs {
        let Some(key) = program.university_key() else {
            groups.push(vec![program]);
            continue;
        };
        match index.get(&key) {
            Some(&i) => groups[i].push(program),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![program]);
            }
        }
    }

    groups
}

/// First non-null value wins; later values that differ are logged.
pub fn merge_first<'a, T>(
    field: &str,
    group: &str,
    values: impl IntoIterator<Item = Option<&'a T>>,
) -> Option<T>
where
    T: Clone + PartialEq + Debug + 'a,
{
    let mut chosen: Option<&T> = None;
    for value in values.into_iter().flatten() {
        match chosen {
            None => chosen = Some(value),
            Some(first) if first != value => {
                warn!(
                    "Conflicting {} in group '{}': keeping {:?}, ignoring {:?}",
                    field, group, first, value
                );
            }
            Some(_) => {}
        }
    }
    chosen.cloned()
}

fn university_view(group: &[&Program]) -> Option<UniversityView> {
    let first = group.first()?;
    let label = format!("{} ({})", first.universidad, first.ciudad);

    let coords = merge_first("coords", &label, group.iter().map(|p| p.coords.as_ref()));
    let stats = merge_first("stats", &label, group.iter().map(|p| p.stats.as_ref()));
    let ciudad_metrics = merge_first(
        "ciudad_metrics",
        &label,
        group.iter().map(|p| p.ciudad_metrics.as_ref()),
    );

    let programas = group
        .iter()
        .map(|program| {
            let mut view = ProgramView::from_program(program);
            view.stats = view.stats.or(stats);
            if view.ciudad_metrics.is_none() {
                view.ciudad_metrics = ciudad_metrics.clone();
            }
            view
        })
        .collect();

    Some(UniversityView {
        nombre: first.universidad.clone(),
        ciudad: first.ciudad.clone(),
        coords,
        stats,
        ciudad_metrics,
        programas,
    })
}

/// Build the nested view. Output order follows first appearance; it is not
/// sorted.
pub fn build_universities(programs: &[Program]) -> Vec<UniversityView> {
    group_by_university(programs)
        .iter()
        .filter_map(|group| university_view(group))
        .collect()
}

/// Per-university summary, grouped by `universidad` alone.
pub fn build_analysis(programs: &[Program]) -> Vec<UniversityAnalysis> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Program>> = Vec::new();
    for program in programs {
        match index.get(program.universidad.as_str()) {
            Some(&i) => groups[i].push(program),
            None => {
                index.insert(program.universidad.as_str(), groups.len());
                groups.push(vec![program]);
            }
        }
    }

    groups
        .into_iter()
        .filter_map(|group| {
            let first = group.first()?;
            let label = first.universidad.as_str();
            Some(UniversityAnalysis {
                nombre: first.universidad.clone(),
                ciudad: first.ciudad.clone(),
                stats: merge_first("stats", label, group.iter().map(|p| p.stats.as_ref())),
                ciudad_metrics: merge_first(
                    "ciudad_metrics",
                    label,
                    group.iter().map(|p| p.ciudad_metrics.as_ref()),
                ),
                coords: merge_first("coords", label, group.iter().map(|p| p.coords.as_ref())),
                program_count: group.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coords, NewProgram, Stats};

    fn program(id: &str, universidad: &str, ciudad: &str, nombre: &str) -> Program {
        let mut p = NewProgram::new("u", "c", nombre).into_program().unwrap();
        p.id = id.to_string();
        p.universidad = universidad.to_string();
        p.ciudad = ciudad.to_string();
        p
    }

    fn sample() -> Vec<Program> {
        let mut a = program("1", "Universidad de Salamanca", "Salamanca", "Historia");
        let mut b = program("2", "Universidad de Oviedo", "Oviedo", "Química");
        let c = program("3", "Universidad de Salamanca", "Salamanca", "Lingüística");
        a.coords = None;
        b.coords = Some(Coords { lat: 43.36, lon: -5.84 });
        let mut d = program("4", "Universidad de Salamanca", "Salamanca", "Derecho");
        d.coords = Some(Coords { lat: 40.96, lon: -5.66 });
        d.stats = Some(Stats::default());
        vec![a, b, c, d]
    }

    #[test]
    fn groups_in_first_appearance_order() {
        let universities = build_universities(&sample());
        assert_eq!(universities.len(), 2);
        assert_eq!(universities[0].nombre, "Universidad de Salamanca");
        assert_eq!(universities[0].programas.len(), 3);
        assert_eq!(universities[1].nombre, "Universidad de Oviedo");
    }

    #[test]
    fn first_non_null_enrichment_wins_and_fills_programs() {
        let universities = build_universities(&sample());
        let salamanca = &universities[0];
        assert_eq!(salamanca.coords, Some(Coords { lat: 40.96, lon: -5.66 }));
        assert!(salamanca.programas.iter().all(|p| p.stats == Some(Stats::default())));
    }

    #[test]
    fn merge_keeps_first_on_disagreement() {
        let a = Coords { lat: 1.0, lon: 1.0 };
        let b = Coords { lat: 2.0, lon: 2.0 };
        assert_eq!(merge_first("coords", "g", [None, Some(&a), Some(&b)]), Some(a));
        assert_eq!(merge_first::<Coords>("coords", "g", [None, None]), None);
    }

    #[test]
    fn missing_university_or_city_is_a_singleton() {
        let programs = vec![
            program("1", "", "Madrid", "A"),
            program("2", "", "Madrid", "B"),
            program("3", "UAM", "Madrid", "C"),
        ];
        assert_eq!(group_by_university(&programs).len(), 3);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let programs = sample();
        assert_eq!(build_universities(&programs), build_universities(&programs));
    }

    #[test]
    fn analysis_counts_programs_per_university() {
        let analysis = build_analysis(&sample());
        assert_eq!(analysis.len(), 2);
        assert_eq!(analysis[0].program_count, 3);
        assert_eq!(analysis[1].program_count, 1);
        assert!(analysis[0].stats.is_some());
    }
}
