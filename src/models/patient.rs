use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub const ALL: [Sex; 3] = [Sex::Male, Sex::Female, Sex::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Some(Sex::Male),
            "female" | "f" => Some(Sex::Female),
            "other" | "o" => Some(Sex::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: String,
    pub name: String,
    pub contact_number: String,
}

/// Outcome of looking a contact number up in the patient directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatientLookup {
    Known(PatientRecord),
    New { patient_id: String },
}

impl PatientLookup {
    pub fn patient_id(&self) -> &str {
        match self {
            PatientLookup::Known(record) => &record.patient_id,
            PatientLookup::New { patient_id } => patient_id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            PatientLookup::Known(record) => Some(&record.name),
            PatientLookup::New { .. } => None,
        }
    }
}
