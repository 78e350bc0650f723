use std::collections::HashMap;

use crate::ids::{self, IdTag};
use crate::models::{PatientLookup, PatientRecord};

/// Mock patient records keyed by contact number.
#[derive(Debug, Default)]
pub struct PatientDirectory {
    by_contact: HashMap<String, PatientRecord>,
}

impl PatientDirectory {
    pub fn seeded() -> Self {
        let mut directory = Self::default();
        directory.register(PatientRecord {
            patient_id: "PT10001".to_string(),
            name: "Rahul Sharma".to_string(),
            contact_number: "9876543210".to_string(),
        });
        directory
    }

    pub fn register(&mut self, record: PatientRecord) {
        self.by_contact.insert(record.contact_number.clone(), record);
    }

    fn id_taken(&self, candidate: &str) -> bool {
        self.by_contact.values().any(|r| r.patient_id == candidate)
    }

    /// Known contacts resolve to their record; anyone else gets a fresh
    /// patient id that is not yet registered.
    pub fn lookup(&self, contact_number: &str) -> PatientLookup {
        match self.by_contact.get(contact_number) {
            Some(record) => PatientLookup::Known(record.clone()),
            None => PatientLookup::New {
                patient_id: ids::generate_unique(IdTag::Patient, |candidate| self.id_taken(candidate)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_contact_is_known() {
        let directory = PatientDirectory::seeded();
        let lookup = directory.lookup("9876543210");
        assert_eq!(lookup.patient_id(), "PT10001");
        assert_eq!(lookup.name(), Some("Rahul Sharma"));
    }

    #[test]
    fn unknown_contact_gets_new_id_until_registered() {
        let mut directory = PatientDirectory::seeded();
        let lookup = directory.lookup("9000000001");
        assert!(matches!(lookup, PatientLookup::New { .. }));
        assert!(lookup.patient_id().starts_with("PT"));
        assert_ne!(lookup.patient_id(), "PT10001");

        directory.register(PatientRecord {
            patient_id: lookup.patient_id().to_string(),
            name: "Kavya Nair".to_string(),
            contact_number: "9000000001".to_string(),
        });
        assert_eq!(directory.lookup("9000000001"), PatientLookup::Known(PatientRecord {
            patient_id: lookup.patient_id().to_string(),
            name: "Kavya Nair".to_string(),
            contact_number: "9000000001".to_string(),
        }));
        assert_eq!(directory.lookup("9876543210").patient_id(), "PT10001");
    }
}
