use crate::model::default_true;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseType {
    Weight,
    BodyWeight,
    CountUp,
    CountDown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetSubCategory {
    #[default]
    WorkSet,
    WarmupSet,
}

/// One timed, counted or weighted entry in an exercise's set sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SetRecord {
    #[serde(rename_all = "camelCase")]
    WeightSet {
        #[serde(default)]
        id: String,
        reps: u32,
        weight: f64,
        #[serde(default)]
        sub_category: SetSubCategory,
    },
    #[serde(rename_all = "camelCase")]
    BodyWeightSet {
        #[serde(default)]
        id: String,
        reps: u32,
        #[serde(default)]
        additional_weight: f64,
        #[serde(default)]
        sub_category: SetSubCategory,
    },
    #[serde(rename_all = "camelCase")]
    TimedDurationSet {
        #[serde(default)]
        id: String,
        time_in_millis: u64,
    },
    #[serde(rename_all = "camelCase")]
    EnduranceSet {
        #[serde(default)]
        id: String,
        time_in_millis: u64,
    },
    #[serde(rename_all = "camelCase")]
    RestSet {
        #[serde(default)]
        id: String,
        time_in_seconds: u32,
    },
}

impl SetRecord {
    pub fn id(&self) -> &str {
        match self {
            SetRecord::WeightSet { id, .. }
            | SetRecord::BodyWeightSet { id, .. }
            | SetRecord::TimedDurationSet { id, .. }
            | SetRecord::EnduranceSet { id, .. }
            | SetRecord::RestSet { id, .. } => id,
        }
    }

    pub fn set_id(&mut self, new_id: String) {
        match self {
            SetRecord::WeightSet { id, .. }
            | SetRecord::BodyWeightSet { id, .. }
            | SetRecord::TimedDurationSet { id, .. }
            | SetRecord::EnduranceSet { id, .. }
            | SetRecord::RestSet { id, .. } => *id = new_id,
        }
    }

    pub fn rest_seconds(&self) -> Option<u32> {
        match self {
            SetRecord::RestSet {
                time_in_seconds, ..
            } => Some(*time_in_seconds),
            _ => None,
        }
    }

    /// Warmups and rests are not work sets.
    pub fn is_work_set(&self) -> bool {
        match self {
            SetRecord::WeightSet { sub_category, .. }
            | SetRecord::BodyWeightSet { sub_category, .. } => {
                *sub_category == SetSubCategory::WorkSet
            }
            SetRecord::TimedDurationSet { .. } | SetRecord::EnduranceSet { .. } => true,
            SetRecord::RestSet { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    pub exercise_type: ExerciseType,
    #[serde(default)]
    pub equipment_id: Option<String>,
    #[serde(default)]
    pub required_accessory_equipment_ids: Vec<String>,
    pub min_reps: u32,
    pub max_reps: u32,
    #[serde(default)]
    pub sets: Vec<SetRecord>,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ExerciseDefinition {
    pub fn work_set_count(&self) -> usize {
        self.sets.iter().filter(|s| s.is_work_set()).count()
    }

    /// Rest between each consecutive pair of work sets, in order.
    ///
    /// `None` marks a gap with no rest set; several rests in one gap are summed.
    pub fn inter_set_rests(&self) -> Vec<Option<u32>> {
        let mut rests = Vec::new();
        let mut seen_work = false;
        let mut pending: Option<u32> = None;
        for set in &self.sets {
            if let Some(seconds) = set.rest_seconds() {
                if seen_work {
                    pending = Some(pending.unwrap_or(0) + seconds);
                }
            } else if set.is_work_set() {
                if seen_work {
                    rests.push(pending.take());
                }
                seen_work = true;
                pending = None;
            }
        }
        rests
    }
}
