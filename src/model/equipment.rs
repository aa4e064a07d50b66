use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentKind {
    Barbell,
    Dumbbells,
    Machine,
    WeightVest,
    Generic,
}

/// One loadable weight (plate, dumbbell, stack step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub weight: f64,
}

impl WeightEntry {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

/// Equipment definition, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Equipment {
    #[serde(rename_all = "camelCase")]
    Barbell {
        id: String,
        name: String,
        bar_weight: f64,
        #[serde(default)]
        available_plates: Vec<WeightEntry>,
    },
    #[serde(rename_all = "camelCase")]
    Dumbbells {
        id: String,
        name: String,
        #[serde(default)]
        available_dumbbells: Vec<WeightEntry>,
    },
    #[serde(rename_all = "camelCase")]
    Machine {
        id: String,
        name: String,
        #[serde(default)]
        available_weights: Vec<WeightEntry>,
    },
    #[serde(rename_all = "camelCase")]
    WeightVest {
        id: String,
        name: String,
        #[serde(default)]
        available_weights: Vec<WeightEntry>,
    },
    #[serde(rename_all = "camelCase")]
    Generic { id: String, name: String },
}

impl Equipment {
    pub fn id(&self) -> &str {
        match self {
            Equipment::Barbell { id, .. }
            | Equipment::Dumbbells { id, .. }
            | Equipment::Machine { id, .. }
            | Equipment::WeightVest { id, .. }
            | Equipment::Generic { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Equipment::Barbell { name, .. }
            | Equipment::Dumbbells { name, .. }
            | Equipment::Machine { name, .. }
            | Equipment::WeightVest { name, .. }
            | Equipment::Generic { name, .. } => name,
        }
    }

    pub fn kind(&self) -> EquipmentKind {
        match self {
            Equipment::Barbell { .. } => EquipmentKind::Barbell,
            Equipment::Dumbbells { .. } => EquipmentKind::Dumbbells,
            Equipment::Machine { .. } => EquipmentKind::Machine,
            Equipment::WeightVest { .. } => EquipmentKind::WeightVest,
            Equipment::Generic { .. } => EquipmentKind::Generic,
        }
    }

    pub fn set_id(&mut self, new_id: String) {
        match self {
            Equipment::Barbell { id, .. }
            | Equipment::Dumbbells { id, .. }
            | Equipment::Machine { id, .. }
            | Equipment::WeightVest { id, .. }
            | Equipment::Generic { id, .. } => *id = new_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryEquipment {
    pub id: String,
    pub name: String,
}

/// Caller-supplied equipment carrying durable ids. Never altered by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedEquipment {
    #[serde(default)]
    pub equipments: Vec<Equipment>,
    #[serde(default)]
    pub accessory_equipments: Vec<AccessoryEquipment>,
}

impl ProvidedEquipment {
    pub fn is_empty(&self) -> bool {
        self.equipments.is_empty() && self.accessory_equipments.is_empty()
    }
}
