//! Clinical context builder for SOAP generation
//!
//! Flattens the current consultation and a bounded window of prior visits into a
//! serializable context. Pure data transformation: no I/O, no errors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::consultation::{Consultation, ConsultationRecord, Vitals};

/// Maximum number of prior visits carried into the context
pub const HISTORY_WINDOW: usize = 5;

/// Formatted vital signs. A vital that was not recorded is absent, never null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalSigns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
}

impl VitalSigns {
    /// Recorded vitals as `(name, value)` pairs in clinical order
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("blood_pressure", &self.blood_pressure),
            ("temperature", &self.temperature),
            ("heart_rate", &self.heart_rate),
            ("respiratory_rate", &self.respiratory_rate),
            ("oxygen_saturation", &self.oxygen_saturation),
            ("weight", &self.weight),
            ("height", &self.height),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Patient medical information relevant to medication safety
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalInfo {
    pub allergies: Vec<String>,
    pub medical_conditions: Vec<String>,
    pub current_medications: String,
    pub blood_type: String,
}

/// Summary of a prior visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub assessment: String,
}

/// Context handed to the prompt formatter. Built fresh on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationContext {
    pub chief_complaint: String,
    pub vital_signs: VitalSigns,
    pub patient_medical_info: MedicalInfo,
    /// Newest first, at most [`HISTORY_WINDOW`] entries
    pub patient_history: Vec<HistoryEntry>,
}

/// Build the context for the current visit.
///
/// `prior_visits` must already be ordered newest first; anything past
/// [`HISTORY_WINDOW`] is dropped.
pub fn build_context(current: &ConsultationRecord, prior_visits: &[Consultation]) -> ConsultationContext {
    let patient = &current.patient;

    ConsultationContext {
        chief_complaint: current.consultation.chief_complaint.trim().to_string(),
        vital_signs: format_vitals(&current.consultation.vitals),
        patient_medical_info: MedicalInfo {
            allergies: patient.allergies.clone().unwrap_or_default(),
            medical_conditions: patient.medical_conditions.clone().unwrap_or_default(),
            current_medications: patient.current_medications.clone().unwrap_or_default(),
            blood_type: patient.blood_type.clone().unwrap_or_default(),
        },
        patient_history: prior_visits
            .iter()
            .take(HISTORY_WINDOW)
            .map(|visit| HistoryEntry {
                date: visit.consultation_date,
                chief_complaint: visit.chief_complaint.clone(),
                diagnosis: visit.diagnosis.clone(),
                assessment: visit.soap_assessment.clone(),
            })
            .collect(),
    }
}

/// Format recorded vitals. Zero readings count as not recorded.
pub fn format_vitals(vitals: &Vitals) -> VitalSigns {
    let count = |v: Option<u32>| v.filter(|n| *n != 0);
    let measure = |v: Option<f64>| v.filter(|n| n.is_finite() && *n != 0.0);

    let blood_pressure = match (count(vitals.bp_systolic), count(vitals.bp_diastolic)) {
        (Some(sys), Some(dia)) => Some(format!("{}/{} mmHg", sys, dia)),
        _ => None,
    };

    VitalSigns {
        blood_pressure,
        temperature: measure(vitals.temperature)
            .map(|t| format!("{:.1}°{}", t, vitals.temperature_unit.symbol())),
        heart_rate: count(vitals.heart_rate).map(|n| format!("{} bpm", n)),
        respiratory_rate: count(vitals.respiratory_rate).map(|n| format!("{}/min", n)),
        oxygen_saturation: count(vitals.oxygen_saturation).map(|n| format!("{}%", n)),
        weight: measure(vitals.weight).map(|w| format!("{:.1} {}", w, vitals.weight_unit.symbol())),
        height: measure(vitals.height).map(|h| format!("{:.1} {}", h, vitals.height_unit.symbol())),
    }
}
