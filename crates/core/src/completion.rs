//! Rolls per-task validations up into set- and student-level completion.
//!
//! Aggregation is order-independent over the validation map: only the
//! task catalog's declared section order shows up in the output, as the
//! ordering of per-set task summaries.

use std::collections::BTreeMap;

use crate::model::student::Gender;
use crate::model::survey::{LogicalTask, TaskCatalog};
use crate::model::validation::{
    CompletionStatus, SetStatus, TaskSummary, TaskValidation, TerminationSummary,
};

/// Everything the aggregation step derives for one student.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub set_statuses: Vec<SetStatus>,
    pub overall_status: CompletionStatus,
    pub completion_percentage: f64,
    pub termination_summary: TerminationSummary,
}

/// Computes set, overall and termination rollups from one student's
/// validation map, keyed by raw task name as the validator reports it.
#[must_use]
pub fn aggregate(
    catalog: &TaskCatalog,
    gender: Option<Gender>,
    validations: &BTreeMap<String, TaskValidation>,
) -> CompletionReport {
    let mut set_statuses = Vec::with_capacity(catalog.sets().len());
    let mut termination_summary = TerminationSummary::default();
    let mut complete_tasks = 0u32;
    let mut observed_tasks = 0u32;

    for set in catalog.sets() {
        let mut tasks = Vec::new();
        for logical in &set.tasks {
            let Some(validation) = resolve_variant(logical, gender, validations) else {
                continue;
            };
            if validation.terminated {
                termination_summary.terminated_tasks += 1;
            }
            if validation.has_post_termination_answers {
                termination_summary.tasks_with_post_termination_answers += 1;
            }
            tasks.push(TaskSummary {
                task_id: logical.id.clone(),
                complete: validation.is_complete(),
                answered_count: validation.answered_count,
                total_count: validation.total_count,
                terminated: validation.terminated,
            });
        }

        let tasks_total = u32::try_from(tasks.len()).unwrap_or(u32::MAX);
        let tasks_complete =
            u32::try_from(tasks.iter().filter(|task| task.complete).count()).unwrap_or(u32::MAX);
        observed_tasks += tasks_total;
        complete_tasks += tasks_complete;

        set_statuses.push(SetStatus {
            set_id: set.set_id.clone(),
            status: set_status(tasks_complete, tasks_total),
            tasks_complete,
            tasks_total,
            tasks,
        });
    }

    let overall_status = overall_status(&set_statuses);
    let completion_percentage = if observed_tasks == 0 {
        0.0
    } else {
        f64::from(complete_tasks) / f64::from(observed_tasks)
    };

    CompletionReport {
        set_statuses,
        overall_status,
        completion_percentage,
        termination_summary,
    }
}

/// Picks the validation entry for one logical task.
///
/// With a known gender only variants matching it (or unconditional ones)
/// are eligible; without one, every variant is checked in declared order
/// and the first found wins.
#[must_use]
pub fn resolve_variant<'a>(
    task: &LogicalTask,
    gender: Option<Gender>,
    validations: &'a BTreeMap<String, TaskValidation>,
) -> Option<&'a TaskValidation> {
    task.variants
        .iter()
        .filter(|variant| match (gender, variant.gender) {
            (Some(g), Some(variant_gender)) => g == variant_gender,
            _ => true,
        })
        .find_map(|variant| validations.get(&variant.name))
}

/// Status law: Complete ⇔ `complete == total > 0`; NotStarted ⇔
/// `complete == 0` (any total, including 0); otherwise Incomplete.
#[must_use]
pub fn set_status(tasks_complete: u32, tasks_total: u32) -> CompletionStatus {
    if tasks_total > 0 && tasks_complete == tasks_total {
        CompletionStatus::Complete
    } else if tasks_complete == 0 {
        CompletionStatus::NotStarted
    } else {
        CompletionStatus::Incomplete
    }
}

fn overall_status(sets: &[SetStatus]) -> CompletionStatus {
    let all_complete = !sets.is_empty()
        && sets
            .iter()
            .all(|set| set.status == CompletionStatus::Complete);
    if all_complete {
        return CompletionStatus::Complete;
    }
    let any_progress = sets.iter().any(|set| {
        set.status == CompletionStatus::Complete || set.tasks_complete > 0
    });
    if any_progress {
        CompletionStatus::Incomplete
    } else {
        CompletionStatus::NotStarted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{SetId, TaskId};
    use crate::model::survey::{
        GenderRule, SectionDef, SetDef, SurveyStructure, TaskMeta,
    };

    fn validation(name: &str, answered: u32, total: u32) -> (String, TaskValidation) {
        (
            name.to_string(),
            TaskValidation {
                task_id: TaskId::from(name),
                answered_count: answered,
                total_count: total,
                terminated: false,
                has_post_termination_answers: false,
            },
        )
    }

    fn section(file: &str, order: u32, gender: Option<Gender>) -> SectionDef {
        SectionDef {
            file: file.into(),
            order,
            show_if: gender.map(|gender| GenderRule { gender }),
        }
    }

    fn catalog(sets: Vec<SetDef>, aliases: Vec<(&str, Vec<&str>)>) -> TaskCatalog {
        let task_metadata = aliases
            .into_iter()
            .map(|(canonical, names)| {
                (
                    canonical.to_string(),
                    TaskMeta {
                        aliases: names.into_iter().map(String::from).collect(),
                    },
                )
            })
            .collect();
        TaskCatalog::from_structure(&SurveyStructure {
            sets,
            task_metadata,
        })
    }

    fn plain_catalog(set_id: &str, files: &[&str]) -> TaskCatalog {
        let sections = files
            .iter()
            .enumerate()
            .map(|(idx, file)| section(file, u32::try_from(idx).unwrap(), None))
            .collect();
        catalog(
            vec![SetDef {
                id: SetId::from(set_id),
                sections,
            }],
            Vec::new(),
        )
    }

    #[test]
    fn set_status_law() {
        assert_eq!(set_status(0, 0), CompletionStatus::NotStarted);
        assert_eq!(set_status(0, 3), CompletionStatus::NotStarted);
        assert_eq!(set_status(1, 3), CompletionStatus::Incomplete);
        assert_eq!(set_status(3, 3), CompletionStatus::Complete);
    }

    #[test]
    fn zero_observed_tasks_reads_not_started_never_complete() {
        // Scenario: the student never reached set3 at all.
        let catalog = plain_catalog("set3", &["A", "B"]);
        let report = aggregate(&catalog, None, &BTreeMap::new());
        let set = &report.set_statuses[0];
        assert_eq!(set.tasks_total, 0);
        assert_eq!(set.status, CompletionStatus::NotStarted);
        assert_eq!(report.overall_status, CompletionStatus::NotStarted);
        assert_eq!(report.completion_percentage, 0.0);
    }

    #[test]
    fn tasks_total_counts_only_observed_tasks() {
        let catalog = plain_catalog("set1", &["A", "B", "C"]);
        let validations: BTreeMap<_, _> =
            [validation("A", 5, 5), validation("B", 2, 4)].into();
        let report = aggregate(&catalog, None, &validations);
        let set = &report.set_statuses[0];
        assert_eq!(set.tasks_total, 2);
        assert_eq!(set.tasks_complete, 1);
        assert_eq!(set.status, CompletionStatus::Incomplete);
        assert_eq!(report.overall_status, CompletionStatus::Incomplete);
        assert_eq!(report.completion_percentage, 0.5);
    }

    #[test]
    fn all_sets_complete_means_overall_complete() {
        let sets = vec![
            SetDef {
                id: SetId::from("set1"),
                sections: vec![section("A", 1, None)],
            },
            SetDef {
                id: SetId::from("set2"),
                sections: vec![section("B", 1, None)],
            },
        ];
        let catalog = catalog(sets, Vec::new());
        let validations: BTreeMap<_, _> =
            [validation("A", 3, 3), validation("B", 7, 7)].into();
        let report = aggregate(&catalog, None, &validations);
        assert_eq!(report.overall_status, CompletionStatus::Complete);
        assert_eq!(report.completion_percentage, 1.0);
    }

    #[test]
    fn one_complete_set_among_untouched_sets_is_incomplete_overall() {
        let sets = vec![
            SetDef {
                id: SetId::from("set1"),
                sections: vec![section("A", 1, None)],
            },
            SetDef {
                id: SetId::from("set2"),
                sections: vec![section("B", 1, None)],
            },
        ];
        let catalog = catalog(sets, Vec::new());
        let validations: BTreeMap<_, _> = [validation("A", 3, 3)].into();
        let report = aggregate(&catalog, None, &validations);
        assert_eq!(report.set_statuses[0].status, CompletionStatus::Complete);
        assert_eq!(report.set_statuses[1].status, CompletionStatus::NotStarted);
        assert_eq!(report.overall_status, CompletionStatus::Incomplete);
    }

    fn gendered_catalog() -> TaskCatalog {
        catalog(
            vec![SetDef {
                id: SetId::from("set1"),
                sections: vec![
                    section("TaskMale", 1, Some(Gender::Male)),
                    section("TaskFemale", 2, Some(Gender::Female)),
                ],
            }],
            vec![("Task", vec!["TaskMale", "TaskFemale"])],
        )
    }

    #[test]
    fn known_gender_selects_matching_variant_only() {
        let catalog = gendered_catalog();
        // Both variants present; a female student must resolve to the
        // female variant even though the male one sorts first.
        let validations: BTreeMap<_, _> =
            [validation("TaskMale", 5, 5), validation("TaskFemale", 1, 4)].into();
        let report = aggregate(&catalog, Some(Gender::Female), &validations);
        let set = &report.set_statuses[0];
        assert_eq!(set.tasks_total, 1);
        assert_eq!(set.tasks[0].answered_count, 1);
        assert!(!set.tasks[0].complete);
    }

    #[test]
    fn known_gender_with_absent_variant_observes_nothing() {
        let catalog = gendered_catalog();
        let validations: BTreeMap<_, _> = [validation("TaskMale", 5, 5)].into();
        let report = aggregate(&catalog, Some(Gender::Female), &validations);
        assert_eq!(report.set_statuses[0].tasks_total, 0);
        assert_eq!(report.set_statuses[0].status, CompletionStatus::NotStarted);
    }

    #[test]
    fn unknown_gender_falls_back_to_declared_order() {
        let catalog = gendered_catalog();
        let validations: BTreeMap<_, _> =
            [validation("TaskMale", 2, 2), validation("TaskFemale", 0, 4)].into();
        let report = aggregate(&catalog, None, &validations);
        let set = &report.set_statuses[0];
        // First variant in declared order wins.
        assert_eq!(set.tasks[0].answered_count, 2);
        assert!(set.tasks[0].complete);

        let only_female: BTreeMap<_, _> = [validation("TaskFemale", 4, 4)].into();
        let report = aggregate(&catalog, None, &only_female);
        assert_eq!(report.set_statuses[0].tasks[0].total_count, 4);
    }

    #[test]
    fn termination_summary_tallies_flags() {
        let catalog = plain_catalog("set1", &["A", "B"]);
        let mut validations: BTreeMap<_, _> =
            [validation("A", 2, 4), validation("B", 4, 4)].into();
        validations.get_mut("A").unwrap().terminated = true;
        validations.get_mut("A").unwrap().has_post_termination_answers = true;
        validations.get_mut("B").unwrap().terminated = true;

        let report = aggregate(&catalog, None, &validations);
        assert_eq!(report.termination_summary.terminated_tasks, 2);
        assert_eq!(
            report.termination_summary.tasks_with_post_termination_answers,
            1
        );
    }
}
