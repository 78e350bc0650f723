use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Doctor {
    pub id: &'static str,
    pub name: &'static str,
    pub specialty: &'static str,
    pub fee: u32,
}

const ROSTER: &[Doctor] = &[
    Doctor { id: "DR01", name: "Dr. Meera Iyer", specialty: "General Medicine", fee: 500 },
    Doctor { id: "DR02", name: "Dr. Vikram Rao", specialty: "Cardiology", fee: 800 },
    Doctor { id: "DR03", name: "Dr. Anjali Deshmukh", specialty: "Pediatrics", fee: 600 },
    Doctor { id: "DR04", name: "Dr. Sanjay Gupta", specialty: "Orthopedics", fee: 700 },
];

impl Doctor {
    pub fn roster() -> &'static [Doctor] {
        ROSTER
    }

    pub fn find_by_id(id: &str) -> Option<&'static Doctor> {
        ROSTER.iter().find(|d| d.id == id)
    }
}
