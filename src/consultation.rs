//! Consultation read model consumed by the SOAP pipeline
//!
//! These types mirror the fields the clinic application exposes for a visit and
//! its patient. Persistence belongs to the surrounding application; the pipeline
//! only reads through [`ConsultationSource`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Kg,
    Lbs,
}

impl WeightUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::Lbs => "lbs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HeightUnit {
    #[default]
    Cm,
    In,
}

impl HeightUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Cm => "cm",
            Self::In => "in",
        }
    }
}

/// Vital signs recorded during a visit. Every reading is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vitals {
    pub bp_systolic: Option<u32>,
    pub bp_diastolic: Option<u32>,
    pub temperature: Option<f64>,
    pub temperature_unit: TemperatureUnit,
    pub heart_rate: Option<u32>,
    pub respiratory_rate: Option<u32>,
    pub oxygen_saturation: Option<u32>,
    pub weight: Option<f64>,
    pub weight_unit: WeightUnit,
    pub height: Option<f64>,
    pub height_unit: HeightUnit,
}

/// A single patient visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: u64,
    pub patient_id: u64,
    pub consultation_date: NaiveDate,
    #[serde(default)]
    pub chief_complaint: String,
    /// Working diagnosis recorded by the physician
    #[serde(default)]
    pub diagnosis: String,
    /// Assessment section of a previously saved SOAP note
    #[serde(default)]
    pub soap_assessment: String,
    #[serde(flatten)]
    pub vitals: Vitals,
}

/// Medical information of the patient attached to a consultation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: u64,
    #[serde(default)]
    pub allergies: Option<Vec<String>>,
    #[serde(default)]
    pub medical_conditions: Option<Vec<String>>,
    #[serde(default)]
    pub current_medications: Option<String>,
    #[serde(default)]
    pub blood_type: Option<String>,
}

/// The current visit together with its patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRecord {
    pub consultation: Consultation,
    pub patient: Patient,
}

/// Read access to consultations, provided by the surrounding application
#[async_trait]
pub trait ConsultationSource: Send + Sync {
    /// Look up a consultation and its patient
    async fn consultation(&self, id: u64) -> Result<Option<ConsultationRecord>>;

    /// Prior visits of the same patient, newest first, excluding `exclude_id`,
    /// at most `limit` entries
    async fn prior_visits(
        &self,
        patient_id: u64,
        exclude_id: u64,
        limit: usize,
    ) -> Result<Vec<Consultation>>;
}

/// On-disk layout of a consultation data file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsultationData {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub consultations: Vec<Consultation>,
}

/// Consultation source held entirely in memory, typically loaded from a JSON file
#[derive(Debug, Clone, Default)]
pub struct InMemoryConsultations {
    patients: HashMap<u64, Patient>,
    consultations: Vec<Consultation>,
}

impl InMemoryConsultations {
    pub fn new(data: ConsultationData) -> Self {
        let patients = data.patients.into_iter().map(|p| (p.id, p)).collect();
        Self {
            patients,
            consultations: data.consultations,
        }
    }

    /// Load from a JSON file of the form `{"patients": [...], "consultations": [...]}`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read consultation data file {:?}", path))?;
        let data: ConsultationData = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse consultation data file {:?}", path))?;
        info!(
            "Loaded {} patients and {} consultations from {:?}",
            data.patients.len(),
            data.consultations.len(),
            path
        );
        Ok(Self::new(data))
    }

    pub fn len(&self) -> usize {
        self.consultations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consultations.is_empty()
    }
}

#[async_trait]
impl ConsultationSource for InMemoryConsultations {
    async fn consultation(&self, id: u64) -> Result<Option<ConsultationRecord>> {
        let Some(consultation) = self.consultations.iter().find(|c| c.id == id) else {
            debug!("Consultation {} not found", id);
            return Ok(None);
        };

        let patient = self
            .patients
            .get(&consultation.patient_id)
            .cloned()
            .with_context(|| {
                format!(
                    "Consultation {} references unknown patient {}",
                    id, consultation.patient_id
                )
            })?;

        Ok(Some(ConsultationRecord {
            consultation: consultation.clone(),
            patient,
        }))
    }

    async fn prior_visits(
        &self,
        patient_id: u64,
        exclude_id: u64,
        limit: usize,
    ) -> Result<Vec<Consultation>> {
        let mut visits: Vec<Consultation> = self
            .consultations
            .iter()
            .filter(|c| c.patient_id == patient_id && c.id != exclude_id)
            .cloned()
            .collect();

        // Newest first; id breaks ties between visits on the same day
        visits.sort_by(|a, b| {
            b.consultation_date
                .cmp(&a.consultation_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        visits.truncate(limit);
        Ok(visits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn visit(id: u64, patient_id: u64, date: &str) -> Consultation {
        Consultation {
            id,
            patient_id,
            consultation_date: date.parse().unwrap(),
            chief_complaint: format!("complaint {}", id),
            diagnosis: String::new(),
            soap_assessment: String::new(),
            vitals: Vitals::default(),
        }
    }

    fn sample_source() -> InMemoryConsultations {
        InMemoryConsultations::new(ConsultationData {
            patients: vec![
                Patient { id: 1, ..Default::default() },
                Patient { id: 2, ..Default::default() },
            ],
            consultations: vec![
                visit(10, 1, "2026-01-05"),
                visit(11, 1, "2026-03-01"),
                visit(12, 2, "2026-03-02"),
                visit(13, 1, "2026-02-10"),
                visit(14, 1, "2026-03-10"),
            ],
        })
    }

    #[test]
    fn test_vitals_units_deserialize() {
        let json = r#"{
            "id": 1, "patient_id": 1, "consultation_date": "2026-03-10",
            "chief_complaint": "fever", "temperature": 101.2, "temperature_unit": "F",
            "weight": 150.0, "weight_unit": "lbs", "height": 65.0, "height_unit": "in"
        }"#;
        let c: Consultation = serde_json::from_str(json).unwrap();
        assert_eq!(c.vitals.temperature, Some(101.2));
        assert_eq!(c.vitals.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(c.vitals.weight_unit, WeightUnit::Lbs);
        assert_eq!(c.vitals.height_unit, HeightUnit::In);
        assert!(c.vitals.bp_systolic.is_none());
    }

    #[test]
    fn test_units_default_when_absent() {
        let json = r#"{"id": 1, "patient_id": 1, "consultation_date": "2026-03-10"}"#;
        let c: Consultation = serde_json::from_str(json).unwrap();
        assert_eq!(c.vitals.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(c.vitals.weight_unit, WeightUnit::Kg);
        assert_eq!(c.vitals.height_unit, HeightUnit::Cm);
        assert!(c.chief_complaint.is_empty());
    }

    #[tokio::test]
    async fn test_prior_visits_newest_first_excluding_current() {
        let source = sample_source();
        let visits = source.prior_visits(1, 14, 5).await.unwrap();
        let ids: Vec<u64> = visits.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![11, 13, 10]);
    }

    #[tokio::test]
    async fn test_prior_visits_respects_limit() {
        let source = sample_source();
        let visits = source.prior_visits(1, 999, 2).await.unwrap();
        let ids: Vec<u64> = visits.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![14, 11]);
    }

    #[tokio::test]
    async fn test_consultation_lookup() {
        let source = sample_source();
        let record = source.consultation(12).await.unwrap().unwrap();
        assert_eq!(record.patient.id, 2);
        assert!(source.consultation(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consultation_with_unknown_patient_is_error() {
        let source = InMemoryConsultations::new(ConsultationData {
            patients: vec![],
            consultations: vec![visit(1, 77, "2026-03-01")],
        });
        let err = source.consultation(1).await.unwrap_err();
        assert!(err.to_string().contains("unknown patient 77"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"patients": [{{"id": 1, "allergies": ["Penicillin"]}}],
                "consultations": [{{"id": 5, "patient_id": 1, "consultation_date": "2026-10-09"}}]}}"#
        )
        .unwrap();

        let source = InMemoryConsultations::load(file.path()).unwrap();
        assert_eq!(source.len(), 1);
        assert!(!source.is_empty());
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = InMemoryConsultations::load(Path::new("/nonexistent/data.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read consultation data file"));
    }
}
