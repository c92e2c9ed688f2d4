//! Survey structure resource and the task catalog derived from it.
//!
//! The structure file is an external, static resource: sets group
//! sections, a section names the task file it presents, and a section
//! may be gender-conditional. The pipeline never mutates the structure;
//! it derives a [`TaskCatalog`] mapping raw section names to logical
//! tasks and their set membership.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::ids::{SetId, TaskId};
use super::student::Gender;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyStructure {
    pub sets: Vec<SetDef>,
    #[serde(default)]
    pub task_metadata: BTreeMap<String, TaskMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDef {
    pub id: SetId,
    pub sections: Vec<SectionDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDef {
    /// Task file presented by this section; also the raw task name the
    /// external validator reports results under.
    pub file: String,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if: Option<GenderRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderRule {
    pub gender: Gender,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMeta {
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// One conceptual assessment activity. Gender-conditional sections and
/// declared aliases collapse into a single logical task with ordered
/// variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalTask {
    pub id: TaskId,
    pub variants: Vec<TaskVariant>,
}

/// A concrete rendition of a logical task: the raw name the validator
/// reports under, plus the gender it is shown to (if conditional).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskVariant {
    pub name: String,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetTasks {
    pub set_id: SetId,
    pub tasks: Vec<LogicalTask>,
}

/// Task→set membership and alias resolution, derived once per build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCatalog {
    sets: Vec<SetTasks>,
    aliases: HashMap<String, TaskId>,
}

impl TaskCatalog {
    /// Derives the catalog from a survey structure.
    ///
    /// Sections are ordered by their declared `order` within each set;
    /// sections resolving to the same logical id (via alias declarations)
    /// become variants of one logical task, in that same order.
    #[must_use]
    pub fn from_structure(structure: &SurveyStructure) -> Self {
        let mut aliases = HashMap::new();
        for (canonical, meta) in &structure.task_metadata {
            for alias in &meta.aliases {
                aliases.insert(alias.clone(), TaskId::new(canonical.clone()));
            }
        }

        let mut sets = Vec::with_capacity(structure.sets.len());
        for set in &structure.sets {
            let mut sections: Vec<&SectionDef> = set.sections.iter().collect();
            sections.sort_by_key(|section| section.order);

            let mut tasks: Vec<LogicalTask> = Vec::new();
            let mut index_of: HashMap<TaskId, usize> = HashMap::new();
            for section in sections {
                let logical = aliases
                    .get(&section.file)
                    .cloned()
                    .unwrap_or_else(|| TaskId::new(section.file.clone()));
                let variant = TaskVariant {
                    name: section.file.clone(),
                    gender: section.show_if.map(|rule| rule.gender),
                };
                match index_of.get(&logical) {
                    Some(&idx) => tasks[idx].variants.push(variant),
                    None => {
                        index_of.insert(logical.clone(), tasks.len());
                        tasks.push(LogicalTask {
                            id: logical,
                            variants: vec![variant],
                        });
                    }
                }
            }
            sets.push(SetTasks {
                set_id: set.id.clone(),
                tasks,
            });
        }

        Self { sets, aliases }
    }

    #[must_use]
    pub fn sets(&self) -> &[SetTasks] {
        &self.sets
    }

    /// Resolves a raw task name to its logical id (identity when no
    /// alias is declared).
    #[must_use]
    pub fn resolve(&self, name: &str) -> TaskId {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| TaskId::new(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gendered_structure() -> SurveyStructure {
        let mut task_metadata = BTreeMap::new();
        task_metadata.insert(
            "Task".to_string(),
            TaskMeta {
                aliases: vec!["TaskMale".into(), "TaskFemale".into()],
            },
        );
        SurveyStructure {
            sets: vec![SetDef {
                id: SetId::from("set1"),
                sections: vec![
                    SectionDef {
                        file: "TaskFemale".into(),
                        order: 2,
                        show_if: Some(GenderRule {
                            gender: Gender::Female,
                        }),
                    },
                    SectionDef {
                        file: "TaskMale".into(),
                        order: 1,
                        show_if: Some(GenderRule {
                            gender: Gender::Male,
                        }),
                    },
                    SectionDef {
                        file: "Reading".into(),
                        order: 3,
                        show_if: None,
                    },
                ],
            }],
            task_metadata,
        }
    }

    #[test]
    fn gender_variants_collapse_to_one_logical_task() {
        let catalog = TaskCatalog::from_structure(&gendered_structure());
        let set = &catalog.sets()[0];
        assert_eq!(set.tasks.len(), 2);

        let task = &set.tasks[0];
        assert_eq!(task.id, TaskId::from("Task"));
        // Section order 1 before 2, regardless of declaration order.
        assert_eq!(task.variants[0].name, "TaskMale");
        assert_eq!(task.variants[0].gender, Some(Gender::Male));
        assert_eq!(task.variants[1].name, "TaskFemale");
        assert_eq!(task.variants[1].gender, Some(Gender::Female));
    }

    #[test]
    fn unconditional_section_is_single_variant() {
        let catalog = TaskCatalog::from_structure(&gendered_structure());
        let reading = &catalog.sets()[0].tasks[1];
        assert_eq!(reading.id, TaskId::from("Reading"));
        assert_eq!(reading.variants.len(), 1);
        assert_eq!(reading.variants[0].gender, None);
    }

    #[test]
    fn resolve_uses_aliases_then_identity() {
        let catalog = TaskCatalog::from_structure(&gendered_structure());
        assert_eq!(catalog.resolve("TaskFemale"), TaskId::from("Task"));
        assert_eq!(catalog.resolve("Reading"), TaskId::from("Reading"));
    }
}
