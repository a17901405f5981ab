//! Conflict records: validated creation and listing with resolved entity names.

use crate::error::PlannerError;
use crate::model::{Conflict, ConflictEntityType, Id, Student, Teacher};
use crate::store::{self, SharedStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Payload for a new conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConflict {
    #[serde(rename = "type")]
    pub conflict_type: String,
    #[serde(default)]
    pub entity_type: Option<ConflictEntityType>,
    #[serde(default)]
    pub entity_id: Option<Id>,
    pub description: String,
}

/// Narrows a conflict listing; empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictFilter {
    #[serde(default, rename = "type")]
    pub conflict_type: Option<String>,
    #[serde(default)]
    pub entity_type: Option<ConflictEntityType>,
    #[serde(default)]
    pub entity_id: Option<Id>,
}

impl ConflictFilter {
    fn matches(&self, conflict: &Conflict) -> bool {
        self.conflict_type
            .as_ref()
            .map_or(true, |t| t == &conflict.conflict_type)
            && self
                .entity_type
                .map_or(true, |t| conflict.entity_type == Some(t))
            && self.entity_id.map_or(true, |id| conflict.entity_id == Some(id))
    }
}

/// A conflict as shown to users: the stored record plus the referenced entity's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictView {
    #[serde(flatten)]
    pub conflict: Conflict,
    pub entity_name: Option<String>,
}

/// Validates and persists conflicts.
#[derive(Clone)]
pub struct ConflictRecorder {
    store: SharedStore,
}

impl ConflictRecorder {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Records a conflict. Submitting the same payload twice creates two records.
    pub async fn create(&self, new: NewConflict) -> Result<Conflict, PlannerError> {
        let conflict_type = new.conflict_type.trim();
        if conflict_type.is_empty() {
            return Err(PlannerError::validation("type", "conflict type is required"));
        }
        let description = new.description.trim();
        if description.is_empty() {
            return Err(PlannerError::validation(
                "description",
                "conflict description is required",
            ));
        }

        match (new.entity_type, new.entity_id) {
            (Some(entity_type), Some(entity_id)) => {
                self.ensure_entity_exists(entity_type, entity_id).await?
            }
            (Some(_), None) => {
                return Err(PlannerError::validation(
                    "entity_id",
                    "entity_id is required when entity_type is set",
                ))
            }
            (None, Some(_)) => {
                return Err(PlannerError::validation(
                    "entity_type",
                    "entity_type is required when entity_id is set",
                ))
            }
            (None, None) => {}
        }

        let conflict = Conflict {
            id: 0,
            conflict_type: conflict_type.to_string(),
            entity_type: new.entity_type,
            entity_id: new.entity_id,
            description: description.to_string(),
            created_at: Some(Utc::now()),
        };

        let created = store::insert(self.store.as_ref(), &conflict).await?;
        info!(
            conflict_id = created.id,
            conflict_type = %created.conflict_type,
            "Recorded conflict"
        );
        Ok(created)
    }

    async fn ensure_entity_exists(
        &self,
        entity_type: ConflictEntityType,
        entity_id: Id,
    ) -> Result<(), PlannerError> {
        let store = self.store.as_ref();
        let exists = match entity_type {
            ConflictEntityType::Professor => store::find::<Teacher>(store, entity_id).await?.is_some(),
            ConflictEntityType::Student => store::find::<Student>(store, entity_id).await?.is_some(),
        };

        if exists {
            Ok(())
        } else {
            Err(PlannerError::validation(
                "entity_id",
                format!(
                    "no {} record with id {entity_id}",
                    entity_type.collection()
                ),
            ))
        }
    }

    /// Lists conflicts in store order, resolving `entity_name` against teachers and students.
    pub async fn list(&self, filter: &ConflictFilter) -> Result<Vec<ConflictView>, PlannerError> {
        let store = self.store.as_ref();
        let (conflicts, teachers, students) = futures::try_join!(
            store::fetch_all::<Conflict>(store),
            store::fetch_all::<Teacher>(store),
            store::fetch_all::<Student>(store),
        )?;

        let teacher_names: HashMap<Id, &str> =
            teachers.iter().map(|t| (t.id, t.name.as_str())).collect();
        let student_names: HashMap<Id, &str> =
            students.iter().map(|s| (s.id, s.name.as_str())).collect();

        Ok(conflicts
            .into_iter()
            .filter(|c| filter.matches(c))
            .map(|conflict| {
                let names = match conflict.entity_type {
                    Some(ConflictEntityType::Professor) => Some(&teacher_names),
                    Some(ConflictEntityType::Student) => Some(&student_names),
                    None => None,
                };
                let entity_name = names
                    .zip(conflict.entity_id)
                    .and_then(|(names, id)| names.get(&id))
                    .map(|name| name.to_string());
                ConflictView {
                    conflict,
                    entity_name,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteEntityStore;
    use std::sync::Arc;

    async fn recorder_with_people() -> (ConflictRecorder, Id, Id) {
        let store = Arc::new(SqliteEntityStore::in_memory().unwrap());
        let teacher = store::insert(
            store.as_ref(),
            &Teacher {
                id: 0,
                name: "Marta Ruiz".to_string(),
                email: None,
            },
        )
        .await
        .unwrap();
        let student = store::insert(
            store.as_ref(),
            &Student {
                id: 0,
                name: "Luis Pena".to_string(),
                email: None,
            },
        )
        .await
        .unwrap();
        (ConflictRecorder::new(store), teacher.id, student.id)
    }

    fn conflict(entity_type: Option<ConflictEntityType>, entity_id: Option<Id>) -> NewConflict {
        NewConflict {
            conflict_type: "Aula ocupada".to_string(),
            entity_type,
            entity_id,
            description: "Room already taken on Tuesday".to_string(),
        }
    }

    #[tokio::test]
    async fn test_blank_fields_rejected() {
        let (recorder, _, _) = recorder_with_people().await;

        let mut blank_type = conflict(None, None);
        blank_type.conflict_type = "  ".to_string();
        assert!(matches!(
            recorder.create(blank_type).await,
            Err(PlannerError::Validation { field: "type", .. })
        ));

        let mut blank_description = conflict(None, None);
        blank_description.description = String::new();
        assert!(matches!(
            recorder.create(blank_description).await,
            Err(PlannerError::Validation {
                field: "description",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_entity_reference_must_resolve() {
        let (recorder, teacher_id, student_id) = recorder_with_people().await;

        // A student id is not a professor id.
        let err = recorder
            .create(conflict(Some(ConflictEntityType::Professor), Some(student_id)))
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Validation { field: "entity_id", .. }));

        assert!(recorder
            .create(conflict(Some(ConflictEntityType::Professor), Some(teacher_id)))
            .await
            .is_ok());
        assert!(matches!(
            recorder
                .create(conflict(Some(ConflictEntityType::Student), None))
                .await,
            Err(PlannerError::Validation { field: "entity_id", .. })
        ));
        assert!(matches!(
            recorder.create(conflict(None, Some(teacher_id))).await,
            Err(PlannerError::Validation {
                field: "entity_type",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_list_resolves_names_and_keeps_duplicates() {
        let (recorder, teacher_id, student_id) = recorder_with_people().await;

        recorder
            .create(conflict(Some(ConflictEntityType::Professor), Some(teacher_id)))
            .await
            .unwrap();
        recorder
            .create(conflict(Some(ConflictEntityType::Professor), Some(teacher_id)))
            .await
            .unwrap();
        recorder
            .create(conflict(Some(ConflictEntityType::Student), Some(student_id)))
            .await
            .unwrap();
        recorder.create(conflict(None, None)).await.unwrap();

        let all = recorder.list(&ConflictFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_ne!(all[0].conflict.id, all[1].conflict.id);
        assert_eq!(all[0].entity_name.as_deref(), Some("Marta Ruiz"));
        assert_eq!(all[2].entity_name.as_deref(), Some("Luis Pena"));
        assert_eq!(all[3].entity_name, None);
        assert!(all[0].conflict.created_at.is_some());

        let students = recorder
            .list(&ConflictFilter {
                entity_type: Some(ConflictEntityType::Student),
                ..ConflictFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(students.len(), 1);
    }

    #[test]
    fn test_view_serializes_flat() {
        let view = ConflictView {
            conflict: Conflict {
                id: 3,
                conflict_type: "Aula ocupada".to_string(),
                entity_type: Some(ConflictEntityType::Professor),
                entity_id: Some(7),
                description: "x".to_string(),
                created_at: None,
            },
            entity_name: Some("Marta Ruiz".to_string()),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["type"], "Aula ocupada");
        assert_eq!(json["entity_name"], "Marta Ruiz");
    }
}
